use anyhow::Result;
use chrono::Utc;
use shared::domain::SavingsGoal;
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

use crate::{id_text, opt_id_text, opt_uuid_col, uuid_col, Storage};

impl Storage {
    pub async fn insert_goal(&self, goal: &SavingsGoal) -> Result<()> {
        sqlx::query(
            "INSERT INTO savings_goals (id, name, category, target_amount, current_amount,
                 target_date, linked_account_id, color, notes, is_active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id_text(goal.id))
        .bind(&goal.name)
        .bind(&goal.category)
        .bind(goal.target_amount)
        .bind(goal.current_amount)
        .bind(goal.target_date)
        .bind(opt_id_text(goal.linked_account_id))
        .bind(&goal.color)
        .bind(&goal.notes)
        .bind(goal.is_active)
        .bind(goal.created_at)
        .bind(goal.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_goal(&self, goal: &SavingsGoal) -> Result<()> {
        sqlx::query(
            "UPDATE savings_goals SET name = ?, category = ?, target_amount = ?, current_amount = ?,
                 target_date = ?, linked_account_id = ?, color = ?, notes = ?, is_active = ?,
                 updated_at = ?
             WHERE id = ?",
        )
        .bind(&goal.name)
        .bind(&goal.category)
        .bind(goal.target_amount)
        .bind(goal.current_amount)
        .bind(goal.target_date)
        .bind(opt_id_text(goal.linked_account_id))
        .bind(&goal.color)
        .bind(&goal.notes)
        .bind(goal.is_active)
        .bind(Utc::now())
        .bind(id_text(goal.id))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Adds `amount` to the stored balance in one UPDATE.
    pub async fn add_goal_progress(&self, goal_id: Uuid, amount: f64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE savings_goals SET current_amount = current_amount + ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(amount)
        .bind(Utc::now())
        .bind(id_text(goal_id))
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_goal(&self, goal_id: Uuid) -> Result<Option<SavingsGoal>> {
        let row = sqlx::query("SELECT * FROM savings_goals WHERE id = ?")
            .bind(id_text(goal_id))
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(goal_from_row).transpose()
    }

    pub async fn list_active_goals(&self) -> Result<Vec<SavingsGoal>> {
        let rows =
            sqlx::query("SELECT * FROM savings_goals WHERE is_active = 1 ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?;
        rows.iter().map(goal_from_row).collect()
    }

    pub async fn delete_goal(&self, goal_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM savings_goals WHERE id = ?")
            .bind(id_text(goal_id))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn goal_from_row(row: &SqliteRow) -> Result<SavingsGoal> {
    Ok(SavingsGoal {
        id: uuid_col(row, "id")?,
        name: row.try_get("name")?,
        category: row.try_get("category")?,
        target_amount: row.try_get("target_amount")?,
        current_amount: row.try_get("current_amount")?,
        target_date: row.try_get("target_date")?,
        linked_account_id: opt_uuid_col(row, "linked_account_id")?,
        color: row.try_get("color")?,
        notes: row.try_get("notes")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
