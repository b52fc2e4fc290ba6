use anyhow::{Context, Result};
use shared::domain::AnalysisResult;
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

use crate::{enum_col, id_text, uuid_col, Storage};

/// Model output for one transaction; `None` fields leave the stored value alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Categorization {
    pub transaction_id: Uuid,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub merchant_name: Option<String>,
}

impl Storage {
    pub async fn insert_analysis_result(&self, result: &AnalysisResult) -> Result<()> {
        let data = serde_json::to_string(&result.result_data)?;
        sqlx::query(
            "INSERT INTO analysis_results (id, statement_id, analysis_type, result_data, model_used,
                 processing_ms, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id_text(result.id))
        .bind(id_text(result.statement_id))
        .bind(result.analysis_type.as_str())
        .bind(data)
        .bind(&result.model_used)
        .bind(result.processing_ms)
        .bind(result.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Newest first.
    pub async fn list_analysis_results(&self, statement_id: Uuid) -> Result<Vec<AnalysisResult>> {
        let rows = sqlx::query(
            "SELECT * FROM analysis_results WHERE statement_id = ?
             ORDER BY created_at DESC, rowid DESC",
        )
        .bind(id_text(statement_id))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(analysis_from_row).collect()
    }

    /// Applies model categorizations atomically and returns how many rows changed.
    pub async fn apply_categorizations(&self, items: &[Categorization]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut changed = 0;
        for item in items {
            let result = sqlx::query(
                "UPDATE transactions SET category = COALESCE(?, category),
                     subcategory = COALESCE(?, subcategory),
                     merchant_name = COALESCE(?, merchant_name)
                 WHERE id = ?",
            )
            .bind(&item.category)
            .bind(&item.subcategory)
            .bind(&item.merchant_name)
            .bind(id_text(item.transaction_id))
            .execute(&mut *tx)
            .await?;
            changed += result.rows_affected();
        }
        tx.commit().await?;
        Ok(changed)
    }
}

fn analysis_from_row(row: &SqliteRow) -> Result<AnalysisResult> {
    let raw: String = row.try_get("result_data")?;
    Ok(AnalysisResult {
        id: uuid_col(row, "id")?,
        statement_id: uuid_col(row, "statement_id")?,
        analysis_type: enum_col(row, "analysis_type")?,
        result_data: serde_json::from_str(&raw).context("analysis result holds invalid json")?,
        model_used: row.try_get("model_used")?,
        processing_ms: row.try_get("processing_ms")?,
        created_at: row.try_get("created_at")?,
    })
}
