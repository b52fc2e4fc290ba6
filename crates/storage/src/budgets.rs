use anyhow::Result;
use chrono::Utc;
use shared::domain::Budget;
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

use crate::{id_text, uuid_col, Storage};

impl Storage {
    /// Inserts or replaces the budget for `budget.category`; the stored row keeps its original id.
    pub async fn upsert_budget(&self, budget: &Budget) -> Result<Budget> {
        sqlx::query(
            "INSERT INTO budgets (id, category, monthly_limit, is_active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(category) DO UPDATE SET
                 monthly_limit = excluded.monthly_limit,
                 is_active = excluded.is_active,
                 updated_at = excluded.updated_at",
        )
        .bind(id_text(budget.id))
        .bind(&budget.category)
        .bind(budget.monthly_limit)
        .bind(budget.is_active)
        .bind(budget.created_at)
        .bind(budget.updated_at)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query("SELECT * FROM budgets WHERE category = ?")
            .bind(&budget.category)
            .fetch_one(&self.pool)
            .await?;
        budget_from_row(&row)
    }

    pub async fn update_budget(&self, budget: &Budget) -> Result<()> {
        sqlx::query(
            "UPDATE budgets SET category = ?, monthly_limit = ?, is_active = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&budget.category)
        .bind(budget.monthly_limit)
        .bind(budget.is_active)
        .bind(Utc::now())
        .bind(id_text(budget.id))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_budget(&self, budget_id: Uuid) -> Result<Option<Budget>> {
        let row = sqlx::query("SELECT * FROM budgets WHERE id = ?")
            .bind(id_text(budget_id))
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(budget_from_row).transpose()
    }

    pub async fn list_active_budgets(&self) -> Result<Vec<Budget>> {
        let rows = sqlx::query("SELECT * FROM budgets WHERE is_active = 1 ORDER BY category ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(budget_from_row).collect()
    }

    pub async fn delete_budget(&self, budget_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM budgets WHERE id = ?")
            .bind(id_text(budget_id))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn budget_from_row(row: &SqliteRow) -> Result<Budget> {
    Ok(Budget {
        id: uuid_col(row, "id")?,
        category: row.try_get("category")?,
        monthly_limit: row.try_get("monthly_limit")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
