use anyhow::Result;
use chrono::{NaiveDate, Utc};
use shared::domain::AccountBalanceSnapshot;
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

use crate::{id_text, uuid_col, Storage};

impl Storage {
    /// Records `balance` for `account_id` on `date`, replacing an earlier capture from the same day.
    pub async fn upsert_balance_snapshot(
        &self,
        account_id: Uuid,
        date: NaiveDate,
        balance: f64,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO account_balance_snapshots (id, account_id, snapshot_date, balance, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(account_id, snapshot_date) DO UPDATE SET balance = excluded.balance",
        )
        .bind(id_text(Uuid::new_v4()))
        .bind(id_text(account_id))
        .bind(date)
        .bind(balance)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Snapshots strictly after `after`, oldest first.
    pub async fn balance_history(
        &self,
        account_id: Uuid,
        after: NaiveDate,
    ) -> Result<Vec<AccountBalanceSnapshot>> {
        let rows = sqlx::query(
            "SELECT * FROM account_balance_snapshots
             WHERE account_id = ? AND snapshot_date > ?
             ORDER BY snapshot_date ASC",
        )
        .bind(id_text(account_id))
        .bind(after)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(balance_snapshot_from_row).collect()
    }
}

fn balance_snapshot_from_row(row: &SqliteRow) -> Result<AccountBalanceSnapshot> {
    Ok(AccountBalanceSnapshot {
        id: uuid_col(row, "id")?,
        account_id: uuid_col(row, "account_id")?,
        snapshot_date: row.try_get("snapshot_date")?,
        balance: row.try_get("balance")?,
        created_at: row.try_get("created_at")?,
    })
}
