//! Scheduled checks. Each job returns how many records it produced.

use chrono::{Datelike, Duration, NaiveDate, Utc};
use shared::{
    domain::{percent_of, AlertSeverity, AlertType},
    error::ApiError,
};
use storage::NewAlert;
use tracing::{error, info};

use crate::{
    accounts, add_months, alert_rules, budgets, clamp_day, days_between, insights, internal, networth,
    ApiContext,
};

const DUE_DATE_NOTICE_DAYS: [i64; 3] = [7, 3, 1];
const PROMO_NOTICE_DAYS: [i64; 3] = [30, 14, 7];
const UTILIZATION_WARNING: f64 = 30.0;
const UTILIZATION_HIGH: f64 = 70.0;
const RENEWAL_WINDOW_DAYS: i64 = 3;

/// Raises `alert` unless an identical one was raised within `window`.
async fn raise_once(ctx: &ApiContext, alert: NewAlert, window: Duration) -> Result<bool, ApiError> {
    let since = Utc::now() - window;
    if ctx
        .storage
        .alert_raised_since(&alert, since)
        .await
        .map_err(internal)?
    {
        return Ok(false);
    }
    ctx.storage.insert_alert(&alert).await.map_err(internal)?;
    Ok(true)
}

/// The next date on or after `today` that falls on the due day.
fn upcoming_due(today: NaiveDate, due_day: u32) -> NaiveDate {
    let due = clamp_day(today, due_day);
    if due < today {
        clamp_day(add_months(due, 1), due_day)
    } else {
        due
    }
}

pub async fn due_date_alerts(ctx: &ApiContext, today: NaiveDate) -> Result<u64, ApiError> {
    let accounts = ctx.storage.list_active_accounts().await.map_err(internal)?;
    let mut raised = 0;
    for account in accounts {
        let Some(due_day) = account.payment_due_day else {
            continue;
        };
        let due = upcoming_due(today, due_day);
        let days = days_between(today, due);
        if !DUE_DATE_NOTICE_DAYS.contains(&days) {
            continue;
        }
        let severity = if days == 1 {
            AlertSeverity::High
        } else {
            AlertSeverity::Medium
        };
        let plural = if days == 1 { "" } else { "s" };
        let alert = NewAlert::new(
            AlertType::DueDate,
            severity,
            format!("Payment Due in {days} day{plural}"),
            format!(
                "{} payment due on {due}. Balance: ${:.2}, Min payment: ${:.2}",
                account.name,
                account.current_balance.unwrap_or(0.0),
                account.min_payment.unwrap_or(0.0)
            ),
        )
        .for_account(account.id);
        if raise_once(ctx, alert, Duration::days(1)).await? {
            info!(account = %account.name, days, "due date alert raised");
            raised += 1;
        }
    }
    Ok(raised)
}

pub async fn promo_expiry_alerts(ctx: &ApiContext, today: NaiveDate) -> Result<u64, ApiError> {
    let accounts = ctx.storage.list_active_accounts().await.map_err(internal)?;
    let mut raised = 0;
    for account in accounts {
        let Some(end) = account.promo_apr_end_date else {
            continue;
        };
        let days = days_between(today, end);
        if !PROMO_NOTICE_DAYS.contains(&days) {
            continue;
        }
        let severity = if days <= 7 {
            AlertSeverity::High
        } else {
            AlertSeverity::Medium
        };
        let alert = NewAlert::new(
            AlertType::AprExpiry,
            severity,
            format!("Promo APR Expiring in {days} days"),
            format!(
                "{} promo APR ({:.2}%) expires on {end}. Regular APR {:.2}% will apply. Balance: ${:.2}. \
                 Consider paying down the balance before the promo APR expires.",
                account.name,
                account.promo_apr.unwrap_or(0.0),
                account.apr.unwrap_or(0.0),
                account.current_balance.unwrap_or(0.0)
            ),
        )
        .for_account(account.id);
        if raise_once(ctx, alert, Duration::days(1)).await? {
            info!(account = %account.name, days, "promo expiry alert raised");
            raised += 1;
        }
    }
    Ok(raised)
}

/// Cards above 30% utilization, at most once a week per card.
pub async fn utilization_alerts(ctx: &ApiContext) -> Result<u64, ApiError> {
    let accounts = ctx.storage.list_active_accounts().await.map_err(internal)?;
    let mut raised = 0;
    for card in accounts.iter().filter(|a| a.is_credit_card()) {
        let (Some(balance), Some(limit)) = (card.current_balance, card.credit_limit) else {
            continue;
        };
        let Some(utilization) = percent_of(balance, limit) else {
            continue;
        };
        if utilization <= UTILIZATION_WARNING {
            continue;
        }
        let severity = if utilization > UTILIZATION_HIGH {
            AlertSeverity::High
        } else {
            AlertSeverity::Medium
        };
        let alert = NewAlert::new(
            AlertType::HighUtilization,
            severity,
            "High Credit Utilization",
            format!(
                "{} is at {utilization:.1}% utilization (${balance:.2} / ${limit:.2}). \
                 Keep utilization below 30% for a healthy credit score.",
                card.name
            ),
        )
        .for_account(card.id);
        if raise_once(ctx, alert, Duration::days(7)).await? {
            raised += 1;
        }
    }
    Ok(raised)
}

pub async fn subscription_renewal_alerts(ctx: &ApiContext, today: NaiveDate) -> Result<u64, ApiError> {
    let horizon = today + Duration::days(RENEWAL_WINDOW_DAYS);
    let subscriptions = ctx.storage.list_active_subscriptions().await.map_err(internal)?;
    let mut raised = 0;
    for subscription in subscriptions {
        let Some(next) = subscription
            .next_expected_date
            .filter(|next| (today..=horizon).contains(next))
        else {
            continue;
        };
        let mut alert = NewAlert::new(
            AlertType::Subscription,
            AlertSeverity::Low,
            format!("Upcoming Subscription Charge: {}", subscription.merchant_name),
            format!(
                "{} (${:.2}) expected on {next}",
                subscription.merchant_name,
                subscription.amount.unwrap_or(0.0)
            ),
        );
        alert.account_id = subscription.account_id;
        if raise_once(ctx, alert, Duration::days(1)).await? {
            raised += 1;
        }
    }
    Ok(raised)
}

fn report(job: &str, outcome: Result<u64, ApiError>) {
    match outcome {
        Ok(count) => info!(job, count, "scheduled job finished"),
        Err(error) => error!(job, %error, "scheduled job failed"),
    }
}

/// Runs the daily batch. A failing job is logged and does not stop the others.
pub async fn run_daily(ctx: &ApiContext, today: NaiveDate) {
    report("due-date alerts", due_date_alerts(ctx, today).await);
    report("promo expiry alerts", promo_expiry_alerts(ctx, today).await);
    report("utilization alerts", utilization_alerts(ctx).await);
    report("subscription renewals", subscription_renewal_alerts(ctx, today).await);
    report("balance snapshots", accounts::capture_balances(ctx).await);
    report("budget checks", budgets::check_budgets(ctx).await);
    report("alert rules", alert_rules::evaluate_rules(ctx).await);
    report(
        "insight engine",
        insights::run_at(ctx, today).await.map(|summary| summary.generated),
    );
    if today.day() == 1 {
        report(
            "net worth snapshot",
            networth::capture_snapshot_on(ctx, today).await.map(|_| 1),
        );
    }
}

#[cfg(test)]
#[path = "tests/jobs_tests.rs"]
mod tests;
