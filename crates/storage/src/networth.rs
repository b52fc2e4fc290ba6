use anyhow::Result;
use chrono::{NaiveDate, Utc};
use shared::domain::{ManualAsset, NetWorthSnapshot};
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

use crate::{enum_col, id_text, uuid_col, Storage};

impl Storage {
    pub async fn insert_manual_asset(&self, asset: &ManualAsset) -> Result<()> {
        sqlx::query(
            "INSERT INTO manual_assets (id, name, asset_type, asset_class, current_value, notes,
                 created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id_text(asset.id))
        .bind(&asset.name)
        .bind(asset.asset_type.as_str())
        .bind(asset.asset_class.as_str())
        .bind(asset.current_value)
        .bind(&asset.notes)
        .bind(asset.created_at)
        .bind(asset.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_manual_asset(&self, asset: &ManualAsset) -> Result<()> {
        sqlx::query(
            "UPDATE manual_assets SET name = ?, asset_type = ?, asset_class = ?, current_value = ?,
                 notes = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&asset.name)
        .bind(asset.asset_type.as_str())
        .bind(asset.asset_class.as_str())
        .bind(asset.current_value)
        .bind(&asset.notes)
        .bind(Utc::now())
        .bind(id_text(asset.id))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_manual_asset(&self, asset_id: Uuid) -> Result<Option<ManualAsset>> {
        let row = sqlx::query("SELECT * FROM manual_assets WHERE id = ?")
            .bind(id_text(asset_id))
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(asset_from_row).transpose()
    }

    pub async fn list_manual_assets(&self) -> Result<Vec<ManualAsset>> {
        let rows = sqlx::query("SELECT * FROM manual_assets ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(asset_from_row).collect()
    }

    pub async fn delete_manual_asset(&self, asset_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM manual_assets WHERE id = ?")
            .bind(id_text(asset_id))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// One snapshot per date: a second capture on the same day overwrites the figures.
    pub async fn upsert_net_worth_snapshot(&self, snapshot: &NetWorthSnapshot) -> Result<NetWorthSnapshot> {
        sqlx::query(
            "INSERT INTO net_worth_snapshots (id, snapshot_date, liquid_assets, credit_card_debt,
                 manual_assets, manual_liabilities, net_worth, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(snapshot_date) DO UPDATE SET
                 liquid_assets = excluded.liquid_assets,
                 credit_card_debt = excluded.credit_card_debt,
                 manual_assets = excluded.manual_assets,
                 manual_liabilities = excluded.manual_liabilities,
                 net_worth = excluded.net_worth",
        )
        .bind(id_text(snapshot.id))
        .bind(snapshot.snapshot_date)
        .bind(snapshot.liquid_assets)
        .bind(snapshot.credit_card_debt)
        .bind(snapshot.manual_assets)
        .bind(snapshot.manual_liabilities)
        .bind(snapshot.net_worth)
        .bind(snapshot.created_at)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query("SELECT * FROM net_worth_snapshots WHERE snapshot_date = ?")
            .bind(snapshot.snapshot_date)
            .fetch_one(&self.pool)
            .await?;
        snapshot_from_row(&row)
    }

    /// The most recent snapshots, newest first.
    pub async fn recent_net_worth_snapshots(&self, limit: i64) -> Result<Vec<NetWorthSnapshot>> {
        let rows = sqlx::query(
            "SELECT * FROM net_worth_snapshots ORDER BY snapshot_date DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(snapshot_from_row).collect()
    }

    /// Snapshots within the inclusive range, oldest first.
    pub async fn net_worth_snapshots_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<NetWorthSnapshot>> {
        let rows = sqlx::query(
            "SELECT * FROM net_worth_snapshots
             WHERE snapshot_date >= ? AND snapshot_date <= ?
             ORDER BY snapshot_date ASC",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(snapshot_from_row).collect()
    }
}

fn asset_from_row(row: &SqliteRow) -> Result<ManualAsset> {
    Ok(ManualAsset {
        id: uuid_col(row, "id")?,
        name: row.try_get("name")?,
        asset_type: enum_col(row, "asset_type")?,
        asset_class: enum_col(row, "asset_class")?,
        current_value: row.try_get("current_value")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn snapshot_from_row(row: &SqliteRow) -> Result<NetWorthSnapshot> {
    Ok(NetWorthSnapshot {
        id: uuid_col(row, "id")?,
        snapshot_date: row.try_get("snapshot_date")?,
        liquid_assets: row.try_get("liquid_assets")?,
        credit_card_debt: row.try_get("credit_card_debt")?,
        manual_assets: row.try_get("manual_assets")?,
        manual_liabilities: row.try_get("manual_liabilities")?,
        net_worth: row.try_get("net_worth")?,
        created_at: row.try_get("created_at")?,
    })
}
