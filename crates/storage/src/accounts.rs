use anyhow::Result;
use chrono::Utc;
use shared::domain::{Account, AccountType};
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

use crate::{enum_col, id_text, uuid_col, Storage};

const ACCOUNT_COLUMNS: &str = "id, name, institution, account_type, last4, credit_limit, current_balance,
     available_credit, apr, promo_apr, promo_apr_end_date, payment_due_day, min_payment,
     rewards_program, color, is_active, created_at, updated_at";

impl Storage {
    pub async fn insert_account(&self, account: &Account) -> Result<()> {
        sqlx::query(
            "INSERT INTO accounts (id, name, institution, account_type, last4, credit_limit,
                 current_balance, available_credit, apr, promo_apr, promo_apr_end_date,
                 payment_due_day, min_payment, rewards_program, color, is_active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id_text(account.id))
        .bind(&account.name)
        .bind(&account.institution)
        .bind(account.account_type.as_str())
        .bind(&account.last4)
        .bind(account.credit_limit)
        .bind(account.current_balance)
        .bind(account.available_credit)
        .bind(account.apr)
        .bind(account.promo_apr)
        .bind(account.promo_apr_end_date)
        .bind(account.payment_due_day.map(i64::from))
        .bind(account.min_payment)
        .bind(&account.rewards_program)
        .bind(&account.color)
        .bind(account.is_active)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn update_account(&self, account: &Account) -> Result<()> {
        sqlx::query(
            "UPDATE accounts SET name = ?, institution = ?, account_type = ?, last4 = ?,
                 credit_limit = ?, current_balance = ?, available_credit = ?, apr = ?, promo_apr = ?,
                 promo_apr_end_date = ?, payment_due_day = ?, min_payment = ?, rewards_program = ?,
                 color = ?, is_active = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&account.name)
        .bind(&account.institution)
        .bind(account.account_type.as_str())
        .bind(&account.last4)
        .bind(account.credit_limit)
        .bind(account.current_balance)
        .bind(account.available_credit)
        .bind(account.apr)
        .bind(account.promo_apr)
        .bind(account.promo_apr_end_date)
        .bind(account.payment_due_day.map(i64::from))
        .bind(account.min_payment)
        .bind(&account.rewards_program)
        .bind(&account.color)
        .bind(account.is_active)
        .bind(Utc::now())
        .bind(id_text(account.id))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_account(&self, account_id: Uuid) -> Result<Option<Account>> {
        let row = sqlx::query(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?"))
            .bind(id_text(account_id))
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(account_from_row).transpose()
    }

    pub async fn list_active_accounts(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE is_active = 1 ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(account_from_row).collect()
    }

    pub async fn list_active_accounts_of_type(&self, account_type: AccountType) -> Result<Vec<Account>> {
        let rows = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts
             WHERE is_active = 1 AND account_type = ?
             ORDER BY name ASC"
        ))
        .bind(account_type.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(account_from_row).collect()
    }

    pub async fn find_account_by_institution_last4(
        &self,
        institution: &str,
        last4: &str,
    ) -> Result<Option<Account>> {
        let row = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts
             WHERE institution = ? AND last4 = ? AND is_active = 1
             ORDER BY created_at ASC
             LIMIT 1"
        ))
        .bind(institution)
        .bind(last4)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(account_from_row).transpose()
    }

    pub async fn deactivate_account(&self, account_id: Uuid) -> Result<bool> {
        let result = sqlx::query("UPDATE accounts SET is_active = 0, updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id_text(account_id))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

pub(crate) fn account_from_row(row: &SqliteRow) -> Result<Account> {
    let due_day: Option<i64> = row.try_get("payment_due_day")?;
    Ok(Account {
        id: uuid_col(row, "id")?,
        name: row.try_get("name")?,
        institution: row.try_get("institution")?,
        account_type: enum_col(row, "account_type")?,
        last4: row.try_get("last4")?,
        credit_limit: row.try_get("credit_limit")?,
        current_balance: row.try_get("current_balance")?,
        available_credit: row.try_get("available_credit")?,
        apr: row.try_get("apr")?,
        promo_apr: row.try_get("promo_apr")?,
        promo_apr_end_date: row.try_get("promo_apr_end_date")?,
        payment_due_day: due_day.and_then(|d| u32::try_from(d).ok()),
        min_payment: row.try_get("min_payment")?,
        rewards_program: row.try_get("rewards_program")?,
        color: row.try_get("color")?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
