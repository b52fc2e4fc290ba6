use anyhow::Result;
use chrono::NaiveDate;
use shared::domain::{AccountRef, Statement, StatementStatus};
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

use crate::{enum_col, id_text, opt_id_text, opt_uuid_col, uuid_col, Storage};

const STATEMENT_SELECT: &str = "SELECT s.id, s.account_id, a.name AS account_name, s.file_name,
        s.file_path, s.statement_month, s.start_date, s.end_date, s.opening_balance,
        s.closing_balance, s.total_credits, s.total_debits, s.minimum_payment, s.payment_due_date,
        s.ytd_total_fees, s.ytd_total_interest, s.ytd_year, s.status, s.error_message, s.created_at
     FROM statements s
     LEFT JOIN accounts a ON a.id = s.account_id";

/// Values extracted from a statement's text by a successful parse.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedStatementFields {
    pub account_id: Option<Uuid>,
    pub statement_month: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub opening_balance: Option<f64>,
    pub closing_balance: Option<f64>,
    pub total_credits: Option<f64>,
    pub total_debits: Option<f64>,
    pub minimum_payment: Option<f64>,
    pub payment_due_date: Option<NaiveDate>,
    pub ytd_total_fees: Option<f64>,
    pub ytd_total_interest: Option<f64>,
    pub ytd_year: Option<i32>,
}

impl Storage {
    pub async fn insert_statement(&self, statement: &Statement) -> Result<()> {
        sqlx::query(
            "INSERT INTO statements (id, account_id, file_name, file_path, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id_text(statement.id))
        .bind(opt_id_text(statement.account_id))
        .bind(&statement.file_name)
        .bind(&statement.file_path)
        .bind(statement.status.as_str())
        .bind(statement.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_statement(&self, statement_id: Uuid) -> Result<Option<Statement>> {
        let row = sqlx::query(&format!("{STATEMENT_SELECT} WHERE s.id = ?"))
            .bind(id_text(statement_id))
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(statement_from_row).transpose()
    }

    pub async fn list_statements(&self) -> Result<Vec<Statement>> {
        let rows = sqlx::query(&format!("{STATEMENT_SELECT} ORDER BY s.created_at DESC"))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(statement_from_row).collect()
    }

    /// Moves a statement to `next` only when its current status allows it.
    /// Returns false when the row was missing or the transition was refused.
    pub async fn transition_statement(
        &self,
        statement_id: Uuid,
        next: StatementStatus,
        error_message: Option<&str>,
    ) -> Result<bool> {
        let allowed_from: Vec<&str> = StatementStatus::ALL
            .iter()
            .copied()
            .filter(|from| from.can_transition_to(next))
            .map(StatementStatus::as_str)
            .collect();
        let mut builder = sqlx::QueryBuilder::<sqlx::Sqlite>::new("UPDATE statements SET status = ");
        builder
            .push_bind(next.as_str())
            .push(", error_message = ")
            .push_bind(error_message.map(str::to_string))
            .push(" WHERE id = ")
            .push_bind(id_text(statement_id))
            .push(" AND status IN (");
        let mut separated = builder.separated(", ");
        for status in allowed_from {
            separated.push_bind(status);
        }
        separated.push_unseparated(")");
        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn save_parsed_statement(
        &self,
        statement_id: Uuid,
        fields: &ParsedStatementFields,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE statements SET account_id = COALESCE(?, account_id), statement_month = ?,
                 start_date = ?, end_date = ?, opening_balance = ?, closing_balance = ?,
                 total_credits = ?, total_debits = ?, minimum_payment = ?, payment_due_date = ?,
                 ytd_total_fees = ?, ytd_total_interest = ?, ytd_year = ?
             WHERE id = ?",
        )
        .bind(opt_id_text(fields.account_id))
        .bind(fields.statement_month)
        .bind(fields.start_date)
        .bind(fields.end_date)
        .bind(fields.opening_balance)
        .bind(fields.closing_balance)
        .bind(fields.total_credits)
        .bind(fields.total_debits)
        .bind(fields.minimum_payment)
        .bind(fields.payment_due_date)
        .bind(fields.ytd_total_fees)
        .bind(fields.ytd_total_interest)
        .bind(fields.ytd_year)
        .bind(id_text(statement_id))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Clears everything a previous parse produced and puts the statement back in PENDING.
    pub async fn reset_statement_for_reprocess(&self, statement_id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM transactions WHERE statement_id = ?")
            .bind(id_text(statement_id))
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query(
            "UPDATE statements SET status = 'PENDING', error_message = NULL, statement_month = NULL,
                 start_date = NULL, end_date = NULL, opening_balance = NULL, closing_balance = NULL,
                 total_credits = NULL, total_debits = NULL, minimum_payment = NULL,
                 payment_due_date = NULL, ytd_total_fees = NULL, ytd_total_interest = NULL,
                 ytd_year = NULL
             WHERE id = ? AND status IN ('COMPLETED', 'FAILED')",
        )
        .bind(id_text(statement_id))
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }
        tx.commit().await?;
        Ok(true)
    }

    /// Marks every PROCESSING statement FAILED. Returns how many were touched.
    pub async fn fail_processing_statements(&self, message: &str) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE statements SET status = 'FAILED', error_message = ? WHERE status = 'PROCESSING'",
        )
        .bind(message)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn pending_statement_ids(&self) -> Result<Vec<Uuid>> {
        let rows = sqlx::query("SELECT id FROM statements WHERE status = 'PENDING' ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(|row| uuid_col(row, "id")).collect()
    }

    pub async fn delete_statement(&self, statement_id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM transactions WHERE statement_id = ?")
            .bind(id_text(statement_id))
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM statements WHERE id = ?")
            .bind(id_text(statement_id))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_statement_account(&self, statement_id: Uuid, account_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE statements SET account_id = ? WHERE id = ?")
            .bind(id_text(account_id))
            .bind(id_text(statement_id))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn latest_completed_statement(&self, account_id: Uuid) -> Result<Option<Statement>> {
        let row = sqlx::query(&format!(
            "{STATEMENT_SELECT}
             WHERE s.account_id = ? AND s.status = 'COMPLETED'
             ORDER BY COALESCE(s.end_date, s.created_at) DESC
             LIMIT 1"
        ))
        .bind(id_text(account_id))
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(statement_from_row).transpose()
    }
}

fn statement_from_row(row: &SqliteRow) -> Result<Statement> {
    let account_id = opt_uuid_col(row, "account_id")?;
    let account_name: Option<String> = row.try_get("account_name")?;
    let account = match (account_id, account_name) {
        (Some(id), Some(name)) => Some(AccountRef { id, name }),
        _ => None,
    };
    Ok(Statement {
        id: uuid_col(row, "id")?,
        account_id,
        account,
        file_name: row.try_get("file_name")?,
        file_path: row.try_get("file_path")?,
        statement_month: row.try_get("statement_month")?,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        opening_balance: row.try_get("opening_balance")?,
        closing_balance: row.try_get("closing_balance")?,
        total_credits: row.try_get("total_credits")?,
        total_debits: row.try_get("total_debits")?,
        minimum_payment: row.try_get("minimum_payment")?,
        payment_due_date: row.try_get("payment_due_date")?,
        ytd_total_fees: row.try_get("ytd_total_fees")?,
        ytd_total_interest: row.try_get("ytd_total_interest")?,
        ytd_year: row.try_get("ytd_year")?,
        status: enum_col(row, "status")?,
        error_message: row.try_get("error_message")?,
        created_at: row.try_get("created_at")?,
    })
}
