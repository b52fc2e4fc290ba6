use anyhow::Result;
use shared::domain::Subscription;
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

use crate::{id_text, opt_enum_col, opt_id_text, opt_uuid_col, uuid_col, Storage};

impl Storage {
    pub async fn insert_subscription(&self, subscription: &Subscription) -> Result<()> {
        sqlx::query(
            "INSERT INTO subscriptions (id, merchant_name, normalized_name, amount, frequency,
                 account_id, first_seen_date, last_charged_date, next_expected_date, times_charged,
                 annual_cost, category, is_active, is_duplicate, duplicate_of, notes, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id_text(subscription.id))
        .bind(&subscription.merchant_name)
        .bind(&subscription.normalized_name)
        .bind(subscription.amount)
        .bind(subscription.frequency.map(|f| f.as_str()))
        .bind(opt_id_text(subscription.account_id))
        .bind(subscription.first_seen_date)
        .bind(subscription.last_charged_date)
        .bind(subscription.next_expected_date)
        .bind(subscription.times_charged)
        .bind(subscription.annual_cost)
        .bind(&subscription.category)
        .bind(subscription.is_active)
        .bind(subscription.is_duplicate)
        .bind(opt_id_text(subscription.duplicate_of))
        .bind(&subscription.notes)
        .bind(subscription.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_subscription(&self, subscription_id: Uuid) -> Result<Option<Subscription>> {
        let row = sqlx::query("SELECT * FROM subscriptions WHERE id = ?")
            .bind(id_text(subscription_id))
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(subscription_from_row).transpose()
    }

    /// Active subscriptions, most expensive per year first.
    pub async fn list_active_subscriptions(&self) -> Result<Vec<Subscription>> {
        let rows = sqlx::query(
            "SELECT * FROM subscriptions WHERE is_active = 1
             ORDER BY COALESCE(annual_cost, 0) DESC, merchant_name ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(subscription_from_row).collect()
    }

    pub async fn list_duplicate_subscriptions(&self) -> Result<Vec<Subscription>> {
        let rows = sqlx::query(
            "SELECT * FROM subscriptions WHERE is_duplicate = 1 ORDER BY merchant_name ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(subscription_from_row).collect()
    }

    /// Every subscription in creation order.
    pub async fn list_all_subscriptions(&self) -> Result<Vec<Subscription>> {
        let rows = sqlx::query("SELECT * FROM subscriptions ORDER BY created_at ASC, rowid ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(subscription_from_row).collect()
    }

    pub async fn subscription_exists_for_account(
        &self,
        normalized_name: &str,
        account_id: Option<Uuid>,
    ) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM subscriptions WHERE normalized_name = ? AND account_id IS ?",
        )
        .bind(normalized_name)
        .bind(opt_id_text(account_id))
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn update_subscription(&self, subscription: &Subscription) -> Result<()> {
        sqlx::query(
            "UPDATE subscriptions SET is_active = ?, notes = ?, is_duplicate = ?, duplicate_of = ?
             WHERE id = ?",
        )
        .bind(subscription.is_active)
        .bind(&subscription.notes)
        .bind(subscription.is_duplicate)
        .bind(opt_id_text(subscription.duplicate_of))
        .bind(id_text(subscription.id))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_all_subscriptions(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM subscriptions")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn subscription_from_row(row: &SqliteRow) -> Result<Subscription> {
    Ok(Subscription {
        id: uuid_col(row, "id")?,
        merchant_name: row.try_get("merchant_name")?,
        normalized_name: row.try_get("normalized_name")?,
        amount: row.try_get("amount")?,
        frequency: opt_enum_col(row, "frequency")?,
        account_id: opt_uuid_col(row, "account_id")?,
        first_seen_date: row.try_get("first_seen_date")?,
        last_charged_date: row.try_get("last_charged_date")?,
        next_expected_date: row.try_get("next_expected_date")?,
        times_charged: row.try_get("times_charged")?,
        annual_cost: row.try_get("annual_cost")?,
        category: row.try_get("category")?,
        is_active: row.try_get("is_active")?,
        is_duplicate: row.try_get("is_duplicate")?,
        duplicate_of: opt_uuid_col(row, "duplicate_of")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
    })
}
