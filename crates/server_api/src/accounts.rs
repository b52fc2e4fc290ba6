use chrono::{Duration, NaiveDate, Utc};
use shared::{
    domain::{
        percent_of, round_money, Account, AccountBalanceSnapshot, AccountType, AlertSeverity,
        AlertType, Transaction,
    },
    error::ApiError,
    protocol::{AccountRequest, AccountResponse, Page},
};
use storage::{NewAlert, TransactionQuery};
use tracing::info;
use uuid::Uuid;

use crate::{days_between, internal, required_text, today, transactions::page_bounds, ApiContext};

const LOW_BALANCE_THRESHOLD: f64 = 500.0;

pub fn account_response(mut account: Account, today: NaiveDate) -> AccountResponse {
    if let (Some(limit), Some(balance)) = (account.credit_limit, account.current_balance) {
        account.available_credit = Some(round_money(limit - balance));
    }
    let utilization_percent = match (account.current_balance, account.credit_limit) {
        (Some(balance), Some(limit)) => percent_of(balance, limit),
        _ => None,
    };
    let days_until_promo_apr_expiry = account
        .promo_apr_end_date
        .map(|end| days_between(today, end));
    AccountResponse {
        account,
        utilization_percent,
        days_until_promo_apr_expiry,
    }
}

pub async fn list_accounts(ctx: &ApiContext) -> Result<Vec<AccountResponse>, ApiError> {
    let today = today();
    let accounts = ctx.storage.list_active_accounts().await.map_err(internal)?;
    Ok(accounts
        .into_iter()
        .map(|account| account_response(account, today))
        .collect())
}

pub async fn get_account(ctx: &ApiContext, account_id: Uuid) -> Result<AccountResponse, ApiError> {
    let account = load_account(ctx, account_id).await?;
    Ok(account_response(account, today()))
}

pub async fn create_account(
    ctx: &ApiContext,
    request: AccountRequest,
) -> Result<AccountResponse, ApiError> {
    let name = required_text(request.name.clone(), "name")?;
    let now = Utc::now();
    let mut account = Account {
        id: Uuid::new_v4(),
        name,
        institution: None,
        account_type: request.account_type.unwrap_or(AccountType::Checking),
        last4: None,
        credit_limit: None,
        current_balance: None,
        available_credit: None,
        apr: None,
        promo_apr: None,
        promo_apr_end_date: None,
        payment_due_day: None,
        min_payment: None,
        rewards_program: None,
        color: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    apply_request(&mut account, request)?;
    ctx.storage.insert_account(&account).await.map_err(internal)?;
    info!(account_id = %account.id, name = %account.name, "account created");
    Ok(account_response(account, today()))
}

pub async fn update_account(
    ctx: &ApiContext,
    account_id: Uuid,
    request: AccountRequest,
) -> Result<AccountResponse, ApiError> {
    let mut account = load_account(ctx, account_id).await?;
    if let Some(name) = request.name.as_deref() {
        if name.trim().is_empty() {
            return Err(ApiError::validation("name must not be blank"));
        }
        account.name = name.trim().to_string();
    }
    if let Some(kind) = request.account_type {
        account.account_type = kind;
    }
    apply_request(&mut account, request)?;
    account.updated_at = Utc::now();
    ctx.storage.update_account(&account).await.map_err(internal)?;
    Ok(account_response(account, today()))
}

/// Copies every provided optional field onto the account.
fn apply_request(account: &mut Account, request: AccountRequest) -> Result<(), ApiError> {
    if let Some(day) = request.payment_due_day {
        if !(1..=31).contains(&day) {
            return Err(ApiError::validation("paymentDueDay must be between 1 and 31"));
        }
        account.payment_due_day = Some(day);
    }
    if request.institution.is_some() {
        account.institution = request.institution;
    }
    if request.last4.is_some() {
        account.last4 = request.last4;
    }
    if request.credit_limit.is_some() {
        account.credit_limit = request.credit_limit;
    }
    if request.current_balance.is_some() {
        account.current_balance = request.current_balance;
    }
    if request.available_credit.is_some() {
        account.available_credit = request.available_credit;
    }
    if request.apr.is_some() {
        account.apr = request.apr;
    }
    if request.promo_apr.is_some() {
        account.promo_apr = request.promo_apr;
    }
    if request.promo_apr_end_date.is_some() {
        account.promo_apr_end_date = request.promo_apr_end_date;
    }
    if request.min_payment.is_some() {
        account.min_payment = request.min_payment;
    }
    if request.rewards_program.is_some() {
        account.rewards_program = request.rewards_program;
    }
    if request.color.is_some() {
        account.color = request.color;
    }
    Ok(())
}

pub async fn delete_account(ctx: &ApiContext, account_id: Uuid) -> Result<(), ApiError> {
    let found = ctx
        .storage
        .deactivate_account(account_id)
        .await
        .map_err(internal)?;
    if !found {
        return Err(ApiError::not_found("Account", account_id));
    }
    info!(%account_id, "account deactivated");
    Ok(())
}

pub async fn account_transactions(
    ctx: &ApiContext,
    account_id: Uuid,
    page: Option<i64>,
    size: Option<i64>,
) -> Result<Page<Transaction>, ApiError> {
    load_account(ctx, account_id).await?;
    let query = TransactionQuery {
        account_id: Some(account_id),
        ..TransactionQuery::default()
    };
    crate::transactions::page_of(ctx, &query, page_bounds(page, size)).await
}

pub async fn balance_history(
    ctx: &ApiContext,
    account_id: Uuid,
    days: Option<i64>,
) -> Result<Vec<AccountBalanceSnapshot>, ApiError> {
    let days = days.unwrap_or(90).max(0);
    let since = today() - Duration::days(days);
    ctx.storage
        .balance_history(account_id, since)
        .await
        .map_err(internal)
}

/// Records today's balance for every active account that has one and returns how many were captured.
pub async fn capture_balances(ctx: &ApiContext) -> Result<u64, ApiError> {
    let today = today();
    let accounts = ctx.storage.list_active_accounts().await.map_err(internal)?;
    let mut captured = 0;
    for account in accounts {
        let Some(balance) = account.current_balance else {
            continue;
        };
        ctx.storage
            .upsert_balance_snapshot(account.id, today, balance)
            .await
            .map_err(internal)?;
        captured += 1;

        if account.is_cash() && balance < LOW_BALANCE_THRESHOLD {
            let alert = NewAlert::new(
                AlertType::Anomaly,
                AlertSeverity::High,
                format!("Low Balance: {}", account.name),
                format!(
                    "{} balance is ${balance:.2}, below the ${LOW_BALANCE_THRESHOLD:.0} threshold.",
                    account.name
                ),
            )
            .for_account(account.id);
            ctx.storage.insert_alert(&alert).await.map_err(internal)?;
        }
    }
    info!(captured, "balance snapshots captured");
    Ok(captured)
}

pub(crate) async fn load_account(ctx: &ApiContext, account_id: Uuid) -> Result<Account, ApiError> {
    ctx.storage
        .get_account(account_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("Account", account_id))
}

#[cfg(test)]
#[path = "tests/accounts_tests.rs"]
mod tests;
