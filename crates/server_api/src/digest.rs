use chrono::{Duration, NaiveDate};
use shared::{
    domain::{percent_of, round_money, Account},
    error::ApiError,
    protocol::{CategoryAmount, DigestPayment, DigestTransaction, WeeklyDigestResponse},
};
use storage::TransactionQuery;

use crate::{
    add_months, analytics::debit_total, budgets::budget_statuses_at, clamp_day, internal, today,
    ApiContext,
};

const TOP_LIMIT: usize = 5;
const PAYMENT_WINDOW_DAYS: i64 = 7;

/// Credit cards whose next due day falls within the coming week.
pub fn payments_due_within_week(accounts: &[Account], today: NaiveDate) -> Vec<DigestPayment> {
    let horizon = today + Duration::days(PAYMENT_WINDOW_DAYS);
    accounts
        .iter()
        .filter(|a| a.is_credit_card())
        .filter_map(|a| {
            let day = a.payment_due_day?;
            let mut due = clamp_day(today, day);
            if due < today {
                due = clamp_day(add_months(due, 1), day);
            }
            (due <= horizon).then(|| DigestPayment {
                account: a.name.clone(),
                due_date: due,
                balance: a.current_balance,
            })
        })
        .collect()
}

pub async fn weekly_digest(ctx: &ApiContext) -> Result<WeeklyDigestResponse, ApiError> {
    weekly_digest_at(ctx, today()).await
}

pub(crate) async fn weekly_digest_at(
    ctx: &ApiContext,
    today: NaiveDate,
) -> Result<WeeklyDigestResponse, ApiError> {
    let week_start = today - Duration::days(6);
    let prior_start = week_start - Duration::days(7);
    let prior_end = week_start - Duration::days(1);

    let total_spend = round_money(debit_total(ctx, week_start, today).await?);
    let prior_week_spend = round_money(debit_total(ctx, prior_start, prior_end).await?);
    let spending_change_percent =
        percent_of(total_spend - prior_week_spend, prior_week_spend).unwrap_or(0.0);

    let mut week = ctx
        .storage
        .find_transactions(
            &TransactionQuery {
                flagged: Some(false),
                ..TransactionQuery::debits_between(week_start, today)
            },
            None,
            0,
        )
        .await
        .map_err(internal)?;
    week.sort_by(|a, b| b.amount.total_cmp(&a.amount));
    let top_transactions = week
        .into_iter()
        .take(TOP_LIMIT)
        .map(|t| DigestTransaction {
            merchant: t.merchant_name,
            amount: t.amount,
            date: t.transaction_date,
            category: t.category,
        })
        .collect();

    let category_breakdown = ctx
        .storage
        .category_totals(&TransactionQuery::debits_between(week_start, today))
        .await
        .map_err(internal)?
        .into_iter()
        .take(TOP_LIMIT)
        .map(|(category, amount)| CategoryAmount {
            category,
            amount: round_money(amount),
        })
        .collect();

    let accounts = ctx.storage.list_active_accounts().await.map_err(internal)?;

    Ok(WeeklyDigestResponse {
        week_start,
        week_end: today,
        total_spend,
        prior_week_spend,
        spending_change_percent,
        top_transactions,
        budget_statuses: budget_statuses_at(ctx, today).await?,
        upcoming_payments: payments_due_within_week(&accounts, today),
        category_breakdown,
        unread_insight_count: ctx.storage.count_open_insights().await.map_err(internal)?,
    })
}

#[cfg(test)]
#[path = "tests/digest_tests.rs"]
mod tests;
