use anyhow::Result;
use chrono::{DateTime, Utc};
use shared::domain::{Insight, InsightType};
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

use crate::{enum_col, id_text, uuid_col, Storage};

impl Storage {
    pub async fn insert_insight(&self, insight: &Insight) -> Result<()> {
        sqlx::query(
            "INSERT INTO insights (id, insight_type, title, description, action_text, impact_amount,
                 severity, merchant_name, category, is_dismissed, generated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id_text(insight.id))
        .bind(insight.insight_type.as_str())
        .bind(&insight.title)
        .bind(&insight.description)
        .bind(&insight.action_text)
        .bind(insight.impact_amount)
        .bind(insight.severity.as_str())
        .bind(&insight.merchant_name)
        .bind(&insight.category)
        .bind(insight.is_dismissed)
        .bind(insight.generated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_open_insights(&self) -> Result<Vec<Insight>> {
        let rows =
            sqlx::query("SELECT * FROM insights WHERE is_dismissed = 0 ORDER BY generated_at DESC")
                .fetch_all(&self.pool)
                .await?;
        rows.iter().map(insight_from_row).collect()
    }

    pub async fn count_open_insights(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM insights WHERE is_dismissed = 0")
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    pub async fn get_insight(&self, insight_id: Uuid) -> Result<Option<Insight>> {
        let row = sqlx::query("SELECT * FROM insights WHERE id = ?")
            .bind(id_text(insight_id))
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(insight_from_row).transpose()
    }

    pub async fn dismiss_insight(&self, insight_id: Uuid) -> Result<bool> {
        let result = sqlx::query("UPDATE insights SET is_dismissed = 1 WHERE id = ?")
            .bind(id_text(insight_id))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// True when an insight of this type about the same merchant or category exists since `since`.
    /// Dismissed insights count, so a dismissal also silences the rule for the window.
    pub async fn insight_generated_since(
        &self,
        insight_type: InsightType,
        key: Option<&str>,
        since: DateTime<Utc>,
    ) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM insights
             WHERE insight_type = ? AND generated_at >= ?
               AND (? IS NULL OR merchant_name = ? OR category = ?)",
        )
        .bind(insight_type.as_str())
        .bind(since)
        .bind(key)
        .bind(key)
        .bind(key)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn purge_insights_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM insights WHERE generated_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn insight_from_row(row: &SqliteRow) -> Result<Insight> {
    Ok(Insight {
        id: uuid_col(row, "id")?,
        insight_type: enum_col(row, "insight_type")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        action_text: row.try_get("action_text")?,
        impact_amount: row.try_get("impact_amount")?,
        severity: enum_col(row, "severity")?,
        merchant_name: row.try_get("merchant_name")?,
        category: row.try_get("category")?,
        is_dismissed: row.try_get("is_dismissed")?,
        generated_at: row.try_get("generated_at")?,
    })
}
