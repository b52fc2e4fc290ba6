use anyhow::Result;
use chrono::{DateTime, Utc};
use shared::domain::{Alert, AlertSeverity, AlertType};
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

use crate::{enum_col, id_text, opt_id_text, opt_uuid_col, uuid_col, Storage};

const ALERT_SELECT: &str = "SELECT al.id, al.alert_type, al.severity, al.title, al.message,
        al.ai_explanation, al.account_id, a.name AS account_name, al.transaction_id, al.is_read,
        al.is_resolved, al.resolved_at, al.created_at
     FROM alerts al
     LEFT JOIN accounts a ON a.id = al.account_id";

#[derive(Debug, Clone)]
pub struct NewAlert {
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    pub account_id: Option<Uuid>,
    pub transaction_id: Option<Uuid>,
}

impl NewAlert {
    pub fn new(
        alert_type: AlertType,
        severity: AlertSeverity,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            alert_type,
            severity,
            title: title.into(),
            message: message.into(),
            account_id: None,
            transaction_id: None,
        }
    }

    pub fn for_account(mut self, account_id: Uuid) -> Self {
        self.account_id = Some(account_id);
        self
    }

    pub fn for_transaction(mut self, transaction_id: Uuid) -> Self {
        self.transaction_id = Some(transaction_id);
        self
    }
}

impl Storage {
    pub async fn insert_alert(&self, alert: &NewAlert) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO alerts (id, alert_type, severity, title, message, account_id,
                 transaction_id, is_read, is_resolved, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, 0, 0, ?)",
        )
        .bind(id_text(id))
        .bind(alert.alert_type.as_str())
        .bind(alert.severity.as_str())
        .bind(&alert.title)
        .bind(&alert.message)
        .bind(opt_id_text(alert.account_id))
        .bind(opt_id_text(alert.transaction_id))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn get_alert(&self, alert_id: Uuid) -> Result<Option<Alert>> {
        let row = sqlx::query(&format!("{ALERT_SELECT} WHERE al.id = ?"))
            .bind(id_text(alert_id))
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(alert_from_row).transpose()
    }

    /// Unresolved alerts, newest first.
    pub async fn list_open_alerts(&self, limit: Option<i64>) -> Result<Vec<Alert>> {
        let rows = sqlx::query(&format!(
            "{ALERT_SELECT} WHERE al.is_resolved = 0 ORDER BY al.created_at DESC LIMIT ?"
        ))
        .bind(limit.unwrap_or(-1))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(alert_from_row).collect()
    }

    pub async fn count_unread_alerts(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM alerts WHERE is_read = 0 AND is_resolved = 0",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    pub async fn count_open_alerts(
        &self,
        alert_type: AlertType,
        severity: AlertSeverity,
    ) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM alerts WHERE alert_type = ? AND severity = ? AND is_resolved = 0",
        )
        .bind(alert_type.as_str())
        .bind(severity.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// True when an alert with the same type, title and account was raised at or after `since`.
    pub async fn alert_raised_since(&self, alert: &NewAlert, since: DateTime<Utc>) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM alerts
             WHERE alert_type = ? AND title = ? AND account_id IS ? AND created_at >= ?",
        )
        .bind(alert.alert_type.as_str())
        .bind(&alert.title)
        .bind(opt_id_text(alert.account_id))
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn mark_alert_read(&self, alert_id: Uuid) -> Result<bool> {
        let result = sqlx::query("UPDATE alerts SET is_read = 1 WHERE id = ?")
            .bind(id_text(alert_id))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn resolve_alert(&self, alert_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE alerts SET is_resolved = 1, is_read = 1, resolved_at = ? WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(id_text(alert_id))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_alert(&self, alert_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM alerts WHERE id = ?")
            .bind(id_text(alert_id))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn alert_from_row(row: &SqliteRow) -> Result<Alert> {
    Ok(Alert {
        id: uuid_col(row, "id")?,
        alert_type: enum_col(row, "alert_type")?,
        severity: enum_col(row, "severity")?,
        title: row.try_get("title")?,
        message: row.try_get("message")?,
        ai_explanation: row.try_get("ai_explanation")?,
        account_id: opt_uuid_col(row, "account_id")?,
        account_name: row.try_get("account_name")?,
        transaction_id: opt_uuid_col(row, "transaction_id")?,
        is_read: row.try_get("is_read")?,
        is_resolved: row.try_get("is_resolved")?,
        resolved_at: row.try_get("resolved_at")?,
        created_at: row.try_get("created_at")?,
    })
}
