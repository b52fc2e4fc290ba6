use std::collections::{BTreeMap, HashMap};

use chrono::{Days, NaiveDate};
use shared::{
    domain::{round_money, Transaction},
    error::ApiError,
    protocol::{DuplicateTransactionGroup, HeatmapDay, MerchantTrendResponse, SpendingHeatmapResponse},
};
use storage::TransactionQuery;

use crate::{
    analytics::zero_filled_months, days_between, internal, month_start, sub_months, today, year_bounds,
    ApiContext,
};

pub const DUPLICATE_WINDOW_DAYS: u32 = 7;
const DUPLICATE_LOOKBACK_DAYS: u64 = 30;
const TREND_MONTHS: u32 = 12;

/// Buckets a day's spend relative to the busiest day: 0 for none, then 1 to 4.
pub fn intensity(spend: f64, max_daily: f64) -> u8 {
    if spend <= 0.0 || max_daily <= 0.0 {
        return 0;
    }
    match spend / max_daily {
        r if r < 0.2 => 1,
        r if r < 0.4 => 2,
        r if r < 0.7 => 3,
        _ => 4,
    }
}

/// One entry per calendar day from `start` through `end`, including days without spend.
pub fn heatmap_days(start: NaiveDate, end: NaiveDate, totals: &[(NaiveDate, f64, i64)]) -> (Vec<HeatmapDay>, f64) {
    let by_day: HashMap<NaiveDate, (f64, i64)> = totals
        .iter()
        .map(|(day, total, count)| (*day, (*total, *count)))
        .collect();
    let max_daily = totals.iter().map(|(_, total, _)| *total).fold(0.0, f64::max);
    let days = start
        .iter_days()
        .take_while(|day| *day <= end)
        .map(|date| {
            let (total, count) = by_day.get(&date).copied().unwrap_or((0.0, 0));
            HeatmapDay {
                date,
                total_spend: round_money(total),
                transaction_count: u64::try_from(count).unwrap_or_default(),
                intensity: intensity(total, max_daily),
            }
        })
        .collect();
    (days, round_money(max_daily))
}

pub async fn spending_heatmap(ctx: &ApiContext, year: i32) -> Result<SpendingHeatmapResponse, ApiError> {
    spending_heatmap_at(ctx, year, today()).await
}

pub(crate) async fn spending_heatmap_at(
    ctx: &ApiContext,
    year: i32,
    today: NaiveDate,
) -> Result<SpendingHeatmapResponse, ApiError> {
    let (start, year_end) = year_bounds(year)?;
    let end = year_end.min(today);
    let totals = ctx
        .storage
        .daily_totals(&TransactionQuery::debits_between(start, end))
        .await
        .map_err(internal)?;
    let total_annual_spend = round_money(totals.iter().map(|(_, total, _)| total).sum());
    let (days, max_daily_spend) = heatmap_days(start, end, &totals);
    Ok(SpendingHeatmapResponse {
        year,
        days,
        max_daily_spend,
        total_annual_spend,
    })
}

/// INCREASING or DECREASING when the last three months average more than 10% away from the three before.
pub fn trend_direction(amounts: &[f64]) -> &'static str {
    if amounts.len() < 6 {
        return "STABLE";
    }
    let n = amounts.len();
    let recent = round_money(amounts[n - 3..].iter().sum::<f64>() / 3.0);
    let prior = round_money(amounts[n - 6..n - 3].iter().sum::<f64>() / 3.0);
    if prior <= 0.0 {
        return "STABLE";
    }
    match (recent - prior) / prior {
        change if change > 0.1 => "INCREASING",
        change if change < -0.1 => "DECREASING",
        _ => "STABLE",
    }
}

pub async fn merchant_trend(ctx: &ApiContext, merchant: &str) -> Result<MerchantTrendResponse, ApiError> {
    merchant_trend_at(ctx, merchant, today()).await
}

pub(crate) async fn merchant_trend_at(
    ctx: &ApiContext,
    merchant: &str,
    today: NaiveDate,
) -> Result<MerchantTrendResponse, ApiError> {
    let merchant = merchant.trim();
    if merchant.is_empty() {
        return Err(ApiError::validation("merchant is required"));
    }
    let first_month = sub_months(month_start(today), TREND_MONTHS - 1);
    let query = TransactionQuery {
        merchant: Some(merchant.to_string()),
        ..TransactionQuery::debits_between(first_month, today)
    };
    let totals = ctx.storage.monthly_totals(&query).await.map_err(internal)?;
    let months = zero_filled_months(first_month, TREND_MONTHS, totals);
    let amounts: Vec<f64> = months.iter().map(|m| m.amount).collect();
    let total_annual = round_money(amounts.iter().sum());

    Ok(MerchantTrendResponse {
        merchant_name: merchant.to_string(),
        trend: trend_direction(&amounts).to_string(),
        avg_monthly: round_money(total_annual / f64::from(TREND_MONTHS)),
        total_annual,
        months,
    })
}

/// Groups same-merchant, same-amount debits where at least two fall within the duplicate window.
pub fn duplicate_groups(transactions: Vec<Transaction>) -> Vec<DuplicateTransactionGroup> {
    let mut groups: BTreeMap<(String, i64), Vec<Transaction>> = BTreeMap::new();
    for t in transactions {
        let Some(merchant) = t.merchant_name.as_deref() else {
            continue;
        };
        let key = (merchant.to_lowercase(), (t.amount * 100.0).round() as i64);
        groups.entry(key).or_default().push(t);
    }

    groups
        .into_values()
        .filter(|group| {
            group.iter().enumerate().any(|(i, a)| {
                group[i + 1..].iter().any(|b| {
                    days_between(a.transaction_date, b.transaction_date).abs()
                        <= i64::from(DUPLICATE_WINDOW_DAYS)
                })
            })
        })
        .map(|group| DuplicateTransactionGroup {
            merchant_name: group[0].merchant_name.clone().unwrap_or_default(),
            amount: group[0].amount,
            within_days: DUPLICATE_WINDOW_DAYS,
            transactions: group,
        })
        .collect()
}

pub async fn duplicate_transactions(ctx: &ApiContext) -> Result<Vec<DuplicateTransactionGroup>, ApiError> {
    duplicate_transactions_at(ctx, today()).await
}

pub(crate) async fn duplicate_transactions_at(
    ctx: &ApiContext,
    today: NaiveDate,
) -> Result<Vec<DuplicateTransactionGroup>, ApiError> {
    let since = today
        .checked_sub_days(Days::new(DUPLICATE_LOOKBACK_DAYS))
        .unwrap_or(today);
    let query = TransactionQuery {
        flagged: Some(false),
        ..TransactionQuery::debits_between(since, today)
    };
    let recent = ctx
        .storage
        .find_transactions(&query, None, 0)
        .await
        .map_err(internal)?;
    Ok(duplicate_groups(recent))
}

#[cfg(test)]
#[path = "tests/spending_tests.rs"]
mod tests;
