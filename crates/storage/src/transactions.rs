use anyhow::{Context, Result};
use chrono::NaiveDate;
use shared::domain::{Transaction, TransactionType};
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite};
use uuid::Uuid;

use crate::{id_text, opt_enum_col, opt_id_text, opt_uuid_col, uuid_col, Storage};

const TRANSACTION_SELECT: &str = "SELECT t.id, t.account_id, a.name AS account_name, t.statement_id,
        t.transaction_date, t.post_date, t.description, t.merchant_name, t.category, t.subcategory,
        t.amount, t.transaction_type, t.reference_number, t.is_recurring, t.is_flagged,
        t.flag_reason, t.notes, t.created_at
     FROM transactions t
     LEFT JOIN accounts a ON a.id = t.account_id";

/// Filter shared by listing, counting and aggregate queries. Every field narrows the result set.
#[derive(Debug, Clone, Default)]
pub struct TransactionQuery {
    pub account_id: Option<Uuid>,
    pub statement_id: Option<Uuid>,
    /// Case-insensitive exact match.
    pub category: Option<String>,
    /// Inclusive.
    pub start_date: Option<NaiveDate>,
    /// Inclusive.
    pub end_date: Option<NaiveDate>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    /// Case-insensitive substring of merchant or description.
    pub search: Option<String>,
    /// Like `search` but also matches the category.
    pub keyword: Option<String>,
    pub merchant: Option<String>,
    /// Case-insensitive membership in any of these categories.
    pub categories: Vec<String>,
    pub types: Vec<TransactionType>,
    pub flagged: Option<bool>,
    /// Fee rows plus anything whose description mentions an ATM.
    pub fees_or_atm: bool,
}

impl TransactionQuery {
    pub fn debits_between(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start_date: Some(start),
            end_date: Some(end),
            types: vec![TransactionType::Debit],
            ..Self::default()
        }
    }

    pub fn of_types_between(types: &[TransactionType], start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start_date: Some(start),
            end_date: Some(end),
            types: types.to_vec(),
            ..Self::default()
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_account(mut self, account_id: Uuid) -> Self {
        self.account_id = Some(account_id);
        self
    }

    fn push_filters<'q>(&'q self, builder: &mut QueryBuilder<'q, Sqlite>) {
        builder.push(" WHERE 1 = 1");
        if let Some(account_id) = self.account_id {
            builder.push(" AND t.account_id = ").push_bind(id_text(account_id));
        }
        if let Some(statement_id) = self.statement_id {
            builder.push(" AND t.statement_id = ").push_bind(id_text(statement_id));
        }
        if let Some(category) = &self.category {
            builder
                .push(" AND lower(t.category) = ")
                .push_bind(category.trim().to_lowercase());
        }
        if let Some(start) = self.start_date {
            builder.push(" AND t.transaction_date >= ").push_bind(start);
        }
        if let Some(end) = self.end_date {
            builder.push(" AND t.transaction_date <= ").push_bind(end);
        }
        if let Some(min) = self.min_amount {
            builder.push(" AND t.amount >= ").push_bind(min);
        }
        if let Some(max) = self.max_amount {
            builder.push(" AND t.amount <= ").push_bind(max);
        }
        if let Some(search) = self.search.as_deref().map(like_pattern) {
            builder
                .push(" AND (lower(coalesce(t.merchant_name, '')) LIKE ")
                .push_bind(search.clone())
                .push(" OR lower(coalesce(t.description, '')) LIKE ")
                .push_bind(search)
                .push(")");
        }
        if let Some(keyword) = self.keyword.as_deref().map(like_pattern) {
            builder
                .push(" AND (lower(coalesce(t.merchant_name, '')) LIKE ")
                .push_bind(keyword.clone())
                .push(" OR lower(coalesce(t.description, '')) LIKE ")
                .push_bind(keyword.clone())
                .push(" OR lower(coalesce(t.category, '')) LIKE ")
                .push_bind(keyword)
                .push(")");
        }
        if let Some(merchant) = &self.merchant {
            builder
                .push(" AND lower(t.merchant_name) = ")
                .push_bind(merchant.trim().to_lowercase());
        }
        if !self.categories.is_empty() {
            builder.push(" AND upper(t.category) IN (");
            let mut separated = builder.separated(", ");
            for category in &self.categories {
                separated.push_bind(category.trim().to_uppercase());
            }
            separated.push_unseparated(")");
        }
        if !self.types.is_empty() {
            builder.push(" AND t.transaction_type IN (");
            let mut separated = builder.separated(", ");
            for kind in &self.types {
                separated.push_bind(kind.as_str());
            }
            separated.push_unseparated(")");
        }
        if let Some(flagged) = self.flagged {
            builder.push(" AND t.is_flagged = ").push_bind(flagged);
        }
        if self.fees_or_atm {
            builder.push(
                " AND (t.transaction_type = 'FEE' OR upper(coalesce(t.description, '')) LIKE '%ATM%')",
            );
        }
    }
}

fn like_pattern(raw: &str) -> String {
    format!("%{}%", raw.trim().to_lowercase())
}

/// Spend at one merchant spread over several accounts.
#[derive(Debug, Clone, PartialEq)]
pub struct MerchantAccountSpread {
    pub merchant: String,
    pub account_count: i64,
    pub total: f64,
}

impl Storage {
    pub async fn insert_transactions(&self, transactions: &[Transaction]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for t in transactions {
            sqlx::query(
                "INSERT INTO transactions (id, account_id, statement_id, transaction_date, post_date,
                     description, merchant_name, category, subcategory, amount, transaction_type,
                     reference_number, is_recurring, is_flagged, flag_reason, notes, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(id_text(t.id))
            .bind(opt_id_text(t.account_id))
            .bind(opt_id_text(t.statement_id))
            .bind(t.transaction_date)
            .bind(t.post_date)
            .bind(&t.description)
            .bind(&t.merchant_name)
            .bind(&t.category)
            .bind(&t.subcategory)
            .bind(t.amount)
            .bind(t.transaction_type.map(|kind| kind.as_str()))
            .bind(&t.reference_number)
            .bind(t.is_recurring)
            .bind(t.is_flagged)
            .bind(&t.flag_reason)
            .bind(&t.notes)
            .bind(t.created_at)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to insert transaction {}", t.id))?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn get_transaction(&self, transaction_id: Uuid) -> Result<Option<Transaction>> {
        let row = sqlx::query(&format!("{TRANSACTION_SELECT} WHERE t.id = ?"))
            .bind(id_text(transaction_id))
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(transaction_from_row).transpose()
    }

    /// Newest first; `limit = None` returns every match.
    pub async fn find_transactions(
        &self,
        query: &TransactionQuery,
        limit: Option<i64>,
        offset: i64,
    ) -> Result<Vec<Transaction>> {
        let mut builder = QueryBuilder::<Sqlite>::new(TRANSACTION_SELECT);
        query.push_filters(&mut builder);
        builder.push(" ORDER BY t.transaction_date DESC, t.created_at DESC");
        if let Some(limit) = limit {
            builder
                .push(" LIMIT ")
                .push_bind(limit)
                .push(" OFFSET ")
                .push_bind(offset);
        }
        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(transaction_from_row).collect()
    }

    /// Oldest first, for detectors that walk a merchant's history forward.
    pub async fn find_transactions_ascending(
        &self,
        query: &TransactionQuery,
    ) -> Result<Vec<Transaction>> {
        let mut builder = QueryBuilder::<Sqlite>::new(TRANSACTION_SELECT);
        query.push_filters(&mut builder);
        builder.push(" ORDER BY t.transaction_date ASC, t.created_at ASC");
        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(transaction_from_row).collect()
    }

    pub async fn count_transactions(&self, query: &TransactionQuery) -> Result<u64> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM transactions t");
        query.push_filters(&mut builder);
        let count: i64 = builder.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    pub async fn sum_transactions(&self, query: &TransactionQuery) -> Result<f64> {
        let mut builder =
            QueryBuilder::<Sqlite>::new("SELECT COALESCE(SUM(t.amount), 0.0) FROM transactions t");
        query.push_filters(&mut builder);
        let total: f64 = builder.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(total)
    }

    /// Totals per category, largest first. Uncategorized rows are left out.
    pub async fn category_totals(&self, query: &TransactionQuery) -> Result<Vec<(String, f64)>> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT t.category AS category, SUM(t.amount) AS total FROM transactions t",
        );
        query.push_filters(&mut builder);
        builder.push(
            " AND t.category IS NOT NULL AND t.category <> ''
              GROUP BY t.category ORDER BY total DESC, t.category ASC",
        );
        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|r| Ok((r.try_get("category")?, r.try_get("total")?)))
            .collect()
    }

    /// Totals per merchant with charge counts, largest first.
    pub async fn merchant_totals(
        &self,
        query: &TransactionQuery,
        limit: i64,
    ) -> Result<Vec<(String, f64, i64)>> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT t.merchant_name AS merchant, SUM(t.amount) AS total, COUNT(*) AS charges
             FROM transactions t",
        );
        query.push_filters(&mut builder);
        builder.push(
            " AND t.merchant_name IS NOT NULL AND t.merchant_name <> ''
              GROUP BY t.merchant_name ORDER BY total DESC LIMIT ",
        );
        builder.push_bind(limit);
        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|r| Ok((r.try_get("merchant")?, r.try_get("total")?, r.try_get("charges")?)))
            .collect()
    }

    /// Totals keyed by `YYYY-MM`, oldest month first. Months without rows are absent.
    pub async fn monthly_totals(&self, query: &TransactionQuery) -> Result<Vec<(String, f64)>> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT substr(t.transaction_date, 1, 7) AS month, SUM(t.amount) AS total
             FROM transactions t",
        );
        query.push_filters(&mut builder);
        builder.push(" GROUP BY month ORDER BY month ASC");
        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|r| Ok((r.try_get("month")?, r.try_get("total")?)))
            .collect()
    }

    pub async fn daily_totals(&self, query: &TransactionQuery) -> Result<Vec<(NaiveDate, f64, i64)>> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT t.transaction_date AS day, SUM(t.amount) AS total, COUNT(*) AS charges
             FROM transactions t",
        );
        query.push_filters(&mut builder);
        builder.push(" GROUP BY t.transaction_date ORDER BY t.transaction_date ASC");
        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|r| Ok((r.try_get("day")?, r.try_get("total")?, r.try_get("charges")?)))
            .collect()
    }

    /// Merchants charged on more than one account within the query window.
    pub async fn merchants_on_multiple_accounts(
        &self,
        query: &TransactionQuery,
    ) -> Result<Vec<MerchantAccountSpread>> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT t.merchant_name AS merchant, COUNT(DISTINCT t.account_id) AS accounts,
                    SUM(t.amount) AS total
             FROM transactions t",
        );
        query.push_filters(&mut builder);
        builder.push(
            " AND t.merchant_name IS NOT NULL AND t.account_id IS NOT NULL
              GROUP BY t.merchant_name
              HAVING COUNT(DISTINCT t.account_id) > 1
              ORDER BY total DESC",
        );
        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter()
            .map(|r| {
                Ok(MerchantAccountSpread {
                    merchant: r.try_get("merchant")?,
                    account_count: r.try_get("accounts")?,
                    total: r.try_get("total")?,
                })
            })
            .collect()
    }

    /// Persists the user-editable fields of a transaction.
    pub async fn update_transaction(&self, transaction: &Transaction) -> Result<()> {
        sqlx::query(
            "UPDATE transactions SET category = ?, notes = ?, is_flagged = ?, flag_reason = ?
             WHERE id = ?",
        )
        .bind(&transaction.category)
        .bind(&transaction.notes)
        .bind(transaction.is_flagged)
        .bind(&transaction.flag_reason)
        .bind(id_text(transaction.id))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn flag_transaction(&self, transaction_id: Uuid, reason: &str) -> Result<()> {
        sqlx::query("UPDATE transactions SET is_flagged = 1, flag_reason = ? WHERE id = ?")
            .bind(reason)
            .bind(id_text(transaction_id))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn mark_transactions_recurring(&self, ids: &[Uuid]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for id in ids {
            sqlx::query("UPDATE transactions SET is_recurring = 1 WHERE id = ?")
                .bind(id_text(*id))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Applies every assignment atomically and returns how many rows changed.
    pub async fn bulk_set_category(&self, assignments: &[(Uuid, String)]) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut changed = 0;
        for (id, category) in assignments {
            let result = sqlx::query("UPDATE transactions SET category = ? WHERE id = ?")
                .bind(category)
                .bind(id_text(*id))
                .execute(&mut *tx)
                .await?;
            changed += result.rows_affected();
        }
        tx.commit().await?;
        Ok(changed)
    }

    pub async fn assign_statement_transactions(
        &self,
        statement_id: Uuid,
        account_id: Uuid,
    ) -> Result<u64> {
        let result = sqlx::query("UPDATE transactions SET account_id = ? WHERE statement_id = ?")
            .bind(id_text(account_id))
            .bind(id_text(statement_id))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn list_accounts_with_transactions(&self) -> Result<Vec<Uuid>> {
        let rows = sqlx::query(
            "SELECT DISTINCT account_id FROM transactions WHERE account_id IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(|r| uuid_col(r, "account_id")).collect()
    }
}

pub(crate) fn transaction_from_row(row: &SqliteRow) -> Result<Transaction> {
    Ok(Transaction {
        id: uuid_col(row, "id")?,
        account_id: opt_uuid_col(row, "account_id")?,
        account_name: row.try_get("account_name")?,
        statement_id: opt_uuid_col(row, "statement_id")?,
        transaction_date: row.try_get("transaction_date")?,
        post_date: row.try_get("post_date")?,
        description: row.try_get("description")?,
        merchant_name: row.try_get("merchant_name")?,
        category: row.try_get("category")?,
        subcategory: row.try_get("subcategory")?,
        amount: row.try_get("amount")?,
        transaction_type: opt_enum_col(row, "transaction_type")?,
        reference_number: row.try_get("reference_number")?,
        is_recurring: row.try_get("is_recurring")?,
        is_flagged: row.try_get("is_flagged")?,
        flag_reason: row.try_get("flag_reason")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
    })
}
