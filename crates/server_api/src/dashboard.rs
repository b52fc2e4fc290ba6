//! The one-call overview behind the home screen.

use chrono::{Datelike, Duration, NaiveDate};
use shared::{
    domain::{percent_of, round_money, round_to, Account, AccountType, TransactionType},
    error::ApiError,
    protocol::{
        CategoryShare, DashboardResponse, ExpiringPromoApr, MerchantTotal, MonthAmount,
        PaycheckSlice, UpcomingPayment,
    },
};
use storage::TransactionQuery;

use crate::{
    accounts::account_response,
    add_months,
    analytics::{debit_total, zero_filled_months, CreditUsage},
    clamp_day, days_between, first_of, internal, month_start, sub_months, today, ApiContext,
};

const RECENT_ALERT_LIMIT: i64 = 10;
const TREND_MONTHS: u32 = 6;
const TOP_CATEGORY_LIMIT: usize = 8;
const TOP_MERCHANT_LIMIT: i64 = 5;
const PROMO_WINDOW_DAYS: i64 = 60;
const INCOME_CREDIT_MINIMUM: f64 = 200.0;

const THINGS: [&str; 6] = [
    "SHOPPING",
    "CLOTHING",
    "ELECTRONICS",
    "HOME_IMPROVEMENT",
    "PERSONAL_CARE",
    "HOBBIES",
];
const EXPERIENCES: [&str; 8] = [
    "RESTAURANTS",
    "DINING",
    "FOOD",
    "ENTERTAINMENT",
    "TRAVEL",
    "RECREATION",
    "FITNESS",
    "EVENTS",
];
const NECESSITIES: [&str; 14] = [
    "RENT",
    "MORTGAGE",
    "HOUSING",
    "UTILITIES",
    "INSURANCE",
    "HEALTHCARE",
    "MEDICAL",
    "GAS",
    "AUTO",
    "TRANSPORTATION",
    "GROCERIES",
    "PHONE",
    "INTERNET",
    "CHILDCARE",
];

/// THINGS, EXPERIENCES, NECESSITIES or OTHER, by substring of the upper-cased category.
pub fn spending_bucket(category: &str) -> &'static str {
    let upper = category.to_uppercase();
    let matches = |names: &[&str]| names.iter().any(|name| upper.contains(name));
    if matches(&THINGS) {
        "THINGS"
    } else if matches(&EXPERIENCES) {
        "EXPERIENCES"
    } else if matches(&NECESSITIES) {
        "NECESSITIES"
    } else {
        "OTHER"
    }
}

/// Rough years until financial independence at a savings rate, assuming 5% real returns.
pub fn years_to_retirement(savings_rate_percent: f64) -> Option<i64> {
    if savings_rate_percent <= 0.0 {
        return None;
    }
    let rate = savings_rate_percent / 100.0;
    if rate >= 1.0 {
        return Some(0);
    }
    let years = (1.0 / rate).ln() / 1.05_f64.ln() * (1.0 - rate);
    if years > 100.0 {
        return None;
    }
    Some(years.max(0.0).round() as i64)
}

/// The statement due date when it has not passed yet, else the next occurrence of the due day.
pub fn next_due_date(
    today: NaiveDate,
    statement_due: Option<NaiveDate>,
    due_day: Option<u32>,
) -> Option<NaiveDate> {
    if let Some(due) = statement_due.filter(|due| *due >= today) {
        return Some(due);
    }
    let day = due_day?;
    let this_month = clamp_day(today, day);
    if this_month > today {
        Some(this_month)
    } else {
        Some(clamp_day(add_months(month_start(today), 1), day))
    }
}

pub fn expiring_promos(accounts: &[Account], today: NaiveDate) -> Vec<ExpiringPromoApr> {
    let cutoff = today + Duration::days(PROMO_WINDOW_DAYS);
    let mut promos: Vec<ExpiringPromoApr> = accounts
        .iter()
        .filter_map(|a| {
            let end_date = a.promo_apr_end_date.filter(|end| *end < cutoff)?;
            Some(ExpiringPromoApr {
                account_id: a.id,
                account_name: a.name.clone(),
                promo_apr: a.promo_apr,
                regular_apr: a.apr,
                end_date,
                days_left: days_between(today, end_date),
                balance: a.current_balance,
            })
        })
        .collect();
    promos.sort_by_key(|p| p.days_left);
    promos
}

fn paycheck_breakdown(income: f64, categories: &[CategoryShare]) -> Vec<PaycheckSlice> {
    categories
        .iter()
        .filter_map(|c| {
            Some(PaycheckSlice {
                label: c.category.clone(),
                amount: c.amount,
                pct_of_income: percent_of(c.amount, income)?,
                bucket: spending_bucket(&c.category).to_string(),
            })
        })
        .collect()
}

struct Balances {
    checking: f64,
    savings: f64,
    credit: CreditUsage,
}

impl Balances {
    fn of(accounts: &[Account]) -> Self {
        let sum = |kind: AccountType| {
            accounts
                .iter()
                .filter(|a| a.account_type == kind)
                .filter_map(|a| a.current_balance)
                .sum::<f64>()
        };
        Self {
            checking: sum(AccountType::Checking),
            savings: sum(AccountType::Savings),
            credit: CreditUsage::of(accounts),
        }
    }
}

pub async fn dashboard(ctx: &ApiContext) -> Result<DashboardResponse, ApiError> {
    dashboard_at(ctx, today()).await
}

pub(crate) async fn dashboard_at(ctx: &ApiContext, today: NaiveDate) -> Result<DashboardResponse, ApiError> {
    let storage = &ctx.storage;
    let accounts = storage.list_active_accounts().await.map_err(internal)?;
    let balances = Balances::of(&accounts);

    let start_of_month = month_start(today);
    let start_of_last_month = sub_months(start_of_month, 1);
    let end_of_last_month = start_of_month.pred_opt().unwrap_or(start_of_month);
    let current_month_spend = spend(ctx, start_of_month, today).await?;
    let last_month_spend = spend(ctx, start_of_last_month, end_of_last_month).await?;
    let spending_change_percent =
        percent_of(current_month_spend - last_month_spend, last_month_spend).unwrap_or(0.0);

    let ytd_start = first_of(today.year(), 1)?;
    let monthly_spending_trend = spending_trend(ctx, today).await?;
    let category_breakdown = category_shares(ctx, ytd_start, today).await?;
    let top_merchants = storage
        .merchant_totals(&TransactionQuery::debits_between(ytd_start, today), TOP_MERCHANT_LIMIT)
        .await
        .map_err(internal)?
        .into_iter()
        .map(|(merchant, amount, count)| MerchantTotal {
            merchant,
            amount: round_money(amount),
            count: u64::try_from(count).unwrap_or_default(),
        })
        .collect();

    let subscriptions = storage.list_active_subscriptions().await.map_err(internal)?;
    let duplicates = storage.list_duplicate_subscriptions().await.map_err(internal)?;
    let monthly_subscription_cost = round_money(subscriptions.iter().map(|s| s.monthly_cost()).sum());

    let mut upcoming_payments = Vec::new();
    for card in accounts.iter().filter(|a| a.is_credit_card()) {
        let latest = storage.latest_completed_statement(card.id).await.map_err(internal)?;
        let statement_due = latest.as_ref().and_then(|s| s.payment_due_date);
        let Some(due_date) = next_due_date(today, statement_due, card.payment_due_day) else {
            continue;
        };
        upcoming_payments.push(UpcomingPayment {
            account_id: card.id,
            account_name: card.name.clone(),
            due_date,
            days_until_due: days_between(today, due_date),
            balance: card.current_balance,
            min_payment: card.min_payment.or(latest.and_then(|s| s.minimum_payment)),
        });
    }
    upcoming_payments.sort_by_key(|p| p.days_until_due);
    let expiring_promo_aprs = expiring_promos(&accounts, today);

    let estimated_monthly_income = monthly_income(ctx, start_of_month, today).await?;
    let monthly_savings_rate = if current_month_spend > 0.0 {
        percent_of(estimated_monthly_income - current_month_spend, estimated_monthly_income).unwrap_or(0.0)
    } else {
        0.0
    };
    let avg_savings_rate6_month = average_savings_rate(ctx, today).await?;

    let liquid = balances.checking + balances.savings;
    let monthly_expenses = if current_month_spend > 0.0 {
        current_month_spend
    } else {
        last_month_spend
    };
    let freedom_months = if monthly_expenses > 0.0 {
        round_money(liquid / monthly_expenses)
    } else {
        0.0
    };

    let things_spend = bucket_spend(ctx, &THINGS, start_of_month, today).await?;
    let material_spend_last_month =
        bucket_spend(ctx, &THINGS, start_of_last_month, end_of_last_month).await?;
    let experiences_spend = bucket_spend(ctx, &EXPERIENCES, start_of_month, today).await?;
    let necessities_spend = bucket_spend(ctx, &NECESSITIES, start_of_month, today).await?;
    let paycheck_breakdown = paycheck_breakdown(estimated_monthly_income, &category_breakdown);

    let unread_alert_count = storage.count_unread_alerts().await.map_err(internal)?;
    let recent_alerts = storage
        .list_open_alerts(Some(RECENT_ALERT_LIMIT))
        .await
        .map_err(internal)?;

    Ok(DashboardResponse {
        total_credit_card_balance: round_money(balances.credit.balance),
        total_credit_limit: round_money(balances.credit.limit),
        total_available_credit: round_money(balances.credit.limit - balances.credit.balance),
        overall_utilization_percent: balances.credit.percent().unwrap_or(0.0),
        total_checking_balance: round_money(balances.checking),
        total_savings_balance: round_money(balances.savings),
        unread_alert_count,
        recent_alerts,
        current_month_spend,
        last_month_spend,
        spending_change_percent,
        monthly_spending_trend,
        category_breakdown,
        top_merchants,
        accounts: accounts
            .into_iter()
            .map(|account| account_response(account, today))
            .collect(),
        upcoming_payments,
        expiring_promo_aprs,
        monthly_subscription_cost,
        active_subscription_count: subscriptions.len() as u64,
        duplicate_subscription_count: duplicates.len() as u64,
        estimated_monthly_income,
        monthly_savings_rate,
        avg_savings_rate6_month,
        years_to_retirement_at_current_rate: years_to_retirement(avg_savings_rate6_month),
        freedom_months,
        freedom_months_trend: round_money(estimated_monthly_income - current_month_spend),
        material_spend_this_month: things_spend,
        material_spend_last_month,
        things_spend,
        experiences_spend,
        necessities_spend,
        paycheck_breakdown,
    })
}

async fn spend(ctx: &ApiContext, start: NaiveDate, end: NaiveDate) -> Result<f64, ApiError> {
    debit_total(ctx, start, end).await.map(round_money)
}

async fn bucket_spend(
    ctx: &ApiContext,
    categories: &[&str],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<f64, ApiError> {
    let query = TransactionQuery {
        categories: categories.iter().map(|c| c.to_string()).collect(),
        ..TransactionQuery::debits_between(start, end)
    };
    ctx.storage
        .sum_transactions(&query)
        .await
        .map(round_money)
        .map_err(internal)
}

/// The profile's income when set, otherwise credits of at least $200 in the window.
async fn monthly_income(ctx: &ApiContext, start: NaiveDate, end: NaiveDate) -> Result<f64, ApiError> {
    let profile = ctx.storage.get_or_create_profile().await.map_err(internal)?;
    if let Some(income) = profile.monthly_income.filter(|income| *income > 0.0) {
        return Ok(income);
    }
    let query = TransactionQuery {
        min_amount: Some(INCOME_CREDIT_MINIMUM),
        ..TransactionQuery::of_types_between(&[TransactionType::Credit], start, end)
    };
    ctx.storage
        .sum_transactions(&query)
        .await
        .map(round_money)
        .map_err(internal)
}

/// Mean savings rate over the six full months before this one, skipping months without data.
async fn average_savings_rate(ctx: &ApiContext, today: NaiveDate) -> Result<f64, ApiError> {
    let this_month = month_start(today);
    let mut rates = Vec::new();
    for back in 1..=6 {
        let start = sub_months(this_month, back);
        let end = add_months(start, 1).pred_opt().unwrap_or(start);
        let spent = spend(ctx, start, end).await?;
        let income = monthly_income(ctx, start, end).await?;
        if spent > 0.0 {
            if let Some(rate) = percent_of(income - spent, income) {
                rates.push(rate);
            }
        }
    }
    if rates.is_empty() {
        return Ok(0.0);
    }
    Ok(round_to(rates.iter().sum::<f64>() / rates.len() as f64, 1))
}

async fn spending_trend(ctx: &ApiContext, today: NaiveDate) -> Result<Vec<MonthAmount>, ApiError> {
    let first = sub_months(month_start(today), TREND_MONTHS - 1);
    let totals = ctx
        .storage
        .monthly_totals(&TransactionQuery::debits_between(first, today))
        .await
        .map_err(internal)?;
    Ok(zero_filled_months(first, TREND_MONTHS, totals))
}

async fn category_shares(
    ctx: &ApiContext,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<CategoryShare>, ApiError> {
    let totals = ctx
        .storage
        .category_totals(&TransactionQuery::debits_between(start, end))
        .await
        .map_err(internal)?;
    let grand_total: f64 = totals.iter().map(|(_, amount)| amount).sum();
    Ok(totals
        .into_iter()
        .take(TOP_CATEGORY_LIMIT)
        .map(|(category, amount)| CategoryShare {
            percent: percent_of(amount, grand_total).unwrap_or(0.0),
            amount: round_money(amount),
            category,
        })
        .collect())
}

#[cfg(test)]
#[path = "tests/dashboard_tests.rs"]
mod tests;
