use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Utc};
use shared::{
    domain::{round_money, FinancialProfile, PayFrequency, TransactionType},
    error::ApiError,
    protocol::{DetectedIncome, FinancialProfileRequest},
};
use storage::TransactionQuery;
use tracing::info;

use crate::{internal, parse_enum, sub_months, today, ApiContext};

/// Deposits smaller than this are not treated as pay.
const INCOME_FLOOR: f64 = 500.0;

pub async fn get_profile(ctx: &ApiContext) -> Result<FinancialProfile, ApiError> {
    ctx.storage.get_or_create_profile().await.map_err(internal)
}

pub async fn update_profile(
    ctx: &ApiContext,
    request: FinancialProfileRequest,
) -> Result<FinancialProfile, ApiError> {
    let mut profile = get_profile(ctx).await?;
    if let Some(income) = request.monthly_income {
        if income < 0.0 {
            return Err(ApiError::validation("monthlyIncome cannot be negative"));
        }
        profile.monthly_income = Some(income);
    }
    if let Some(source) = request.income_source {
        profile.income_source = source;
    }
    if let Some(frequency) = request.pay_frequency.as_deref() {
        profile.pay_frequency = parse_enum::<PayFrequency>(frequency)?;
    }
    if let Some(months) = request.emergency_fund_target_months {
        profile.emergency_fund_target_months = months;
    }
    if request.notes.is_some() {
        profile.notes = request.notes;
    }
    if request.age.is_some() {
        profile.age = request.age;
    }
    if request.target_retirement_age.is_some() {
        profile.target_retirement_age = request.target_retirement_age;
    }
    if request.current_investments.is_some() {
        profile.current_investments = request.current_investments;
    }
    profile.updated_at = Utc::now();
    ctx.storage.update_profile(&profile).await.map_err(internal)?;
    Ok(profile)
}

/// Median of the monthly totals of large deposits, or 0 when there are none.
pub fn median_monthly_income(deposits: &[(NaiveDate, f64)]) -> f64 {
    let mut by_month: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for (day, amount) in deposits {
        *by_month.entry((day.year(), day.month())).or_default() += amount;
    }
    let mut totals: Vec<f64> = by_month.into_values().collect();
    if totals.is_empty() {
        return 0.0;
    }
    totals.sort_by(f64::total_cmp);
    round_money(totals[totals.len() / 2])
}

pub async fn detect_income(ctx: &ApiContext) -> Result<DetectedIncome, ApiError> {
    detect_income_at(ctx, today()).await
}

pub(crate) async fn detect_income_at(
    ctx: &ApiContext,
    today: NaiveDate,
) -> Result<DetectedIncome, ApiError> {
    let query = TransactionQuery {
        min_amount: Some(INCOME_FLOOR),
        ..TransactionQuery::of_types_between(
            &[TransactionType::Credit, TransactionType::Payment],
            sub_months(today, 3),
            today,
        )
    };
    let deposits: Vec<(NaiveDate, f64)> = ctx
        .storage
        .find_transactions(&query, None, 0)
        .await
        .map_err(internal)?
        .into_iter()
        .map(|t| (t.transaction_date, t.amount))
        .collect();
    let detected = median_monthly_income(&deposits);
    info!(deposits = deposits.len(), detected, "monthly income detected");
    Ok(DetectedIncome {
        monthly_income: detected,
    })
}

#[cfg(test)]
#[path = "tests/profile_tests.rs"]
mod tests;
