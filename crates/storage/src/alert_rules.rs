use anyhow::Result;
use chrono::Utc;
use shared::domain::AlertRule;
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

use crate::{enum_col, id_text, opt_id_text, opt_uuid_col, uuid_col, Storage};

impl Storage {
    pub async fn insert_alert_rule(&self, rule: &AlertRule) -> Result<()> {
        sqlx::query(
            "INSERT INTO alert_rules (id, name, rule_type, condition_operator, threshold_amount,
                 category, account_id, is_active, last_triggered_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id_text(rule.id))
        .bind(&rule.name)
        .bind(rule.rule_type.as_str())
        .bind(&rule.condition_operator)
        .bind(rule.threshold_amount)
        .bind(&rule.category)
        .bind(opt_id_text(rule.account_id))
        .bind(rule.is_active)
        .bind(rule.last_triggered_at)
        .bind(rule.created_at)
        .bind(rule.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_alert_rule(&self, rule: &AlertRule) -> Result<()> {
        sqlx::query(
            "UPDATE alert_rules SET name = ?, threshold_amount = ?, category = ?, is_active = ?,
                 updated_at = ?
             WHERE id = ?",
        )
        .bind(&rule.name)
        .bind(rule.threshold_amount)
        .bind(&rule.category)
        .bind(rule.is_active)
        .bind(Utc::now())
        .bind(id_text(rule.id))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_alert_rule(&self, rule_id: Uuid) -> Result<Option<AlertRule>> {
        let row = sqlx::query("SELECT * FROM alert_rules WHERE id = ?")
            .bind(id_text(rule_id))
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(alert_rule_from_row).transpose()
    }

    pub async fn list_active_alert_rules(&self) -> Result<Vec<AlertRule>> {
        let rows =
            sqlx::query("SELECT * FROM alert_rules WHERE is_active = 1 ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?;
        rows.iter().map(alert_rule_from_row).collect()
    }

    pub async fn touch_alert_rule_triggered(&self, rule_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE alert_rules SET last_triggered_at = ?, updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(Utc::now())
            .bind(id_text(rule_id))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_alert_rule(&self, rule_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM alert_rules WHERE id = ?")
            .bind(id_text(rule_id))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn alert_rule_from_row(row: &SqliteRow) -> Result<AlertRule> {
    Ok(AlertRule {
        id: uuid_col(row, "id")?,
        name: row.try_get("name")?,
        rule_type: enum_col(row, "rule_type")?,
        condition_operator: row.try_get("condition_operator")?,
        threshold_amount: row.try_get("threshold_amount")?,
        category: row.try_get("category")?,
        account_id: opt_uuid_col(row, "account_id")?,
        is_active: row.try_get("is_active")?,
        last_triggered_at: row.try_get("last_triggered_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
