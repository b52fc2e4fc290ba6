use chrono::NaiveDate;
use shared::{
    domain::{
        percent_of, round_money, Account, AccountType, AlertSeverity, AlertType, FinancialProfile,
    },
    error::ApiError,
    protocol::{HealthScoreResponse, ScorePillar},
};

use crate::{
    analytics::{debit_total, CreditUsage},
    internal, month_start, sub_months, today, ApiContext,
};

const FALLBACK_MONTHLY_SPEND: f64 = 3000.0;

/// Figures the six pillars are scored from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HealthInputs {
    /// `None` when no card reports a limit.
    pub utilization_percent: Option<f64>,
    pub savings_balance: f64,
    pub spend_last_six_months: f64,
    pub monthly_income: Option<f64>,
    pub spend_this_month: f64,
    pub spend_last_month: f64,
    /// Spend from the first of last month through today.
    pub spend_recent: f64,
    /// Spend over the three whole months before last month.
    pub spend_prior_quarter: f64,
    pub open_high_due_alerts: u64,
    pub emergency_fund_target_months: i64,
}

fn pillar(name: &str, score: u32, max_score: u32, explanation: String) -> ScorePillar {
    ScorePillar {
        name: name.to_string(),
        score,
        max_score,
        explanation,
    }
}

pub fn grade(total: u32) -> &'static str {
    match total {
        85.. => "A",
        70..=84 => "B",
        55..=69 => "C",
        40..=54 => "D",
        _ => "F",
    }
}

pub fn score(inputs: &HealthInputs) -> HealthScoreResponse {
    let utilization = inputs.utilization_percent.unwrap_or(50.0);
    let utilization_score = match utilization {
        u if u <= 10.0 => 25,
        u if u <= 30.0 => 18,
        u if u <= 70.0 => 10,
        _ => 3,
    };

    let avg_monthly_spend = if inputs.spend_last_six_months > 0.0 {
        round_money(inputs.spend_last_six_months / 6.0)
    } else {
        FALLBACK_MONTHLY_SPEND
    };
    let emergency_fund_months = round_money(inputs.savings_balance / avg_monthly_spend);
    let emergency_score = match emergency_fund_months {
        m if m >= 6.0 => 20,
        m if m >= 3.0 => 14,
        m if m >= 1.0 => 8,
        _ => 2,
    };

    let (savings_rate, savings_score, savings_text) = match inputs.monthly_income.filter(|i| *i > 0.0) {
        Some(income) => {
            let rate = percent_of(income - inputs.spend_this_month, income).unwrap_or(0.0);
            let points = match rate {
                r if r >= 20.0 => 20,
                r if r >= 10.0 => 15,
                r if r >= 5.0 => 8,
                r if r > 0.0 => 3,
                _ => 0,
            };
            (rate, points, format!("{rate:.1}% savings rate this month."))
        }
        None => (
            0.0,
            10,
            "Set your income to calculate savings rate.".to_string(),
        ),
    };

    let prior_average = if inputs.spend_prior_quarter > 0.0 {
        round_money(inputs.spend_prior_quarter / 3.0)
    } else {
        0.0
    };
    let (debt_score, debt_text) = if prior_average == 0.0 {
        (8, "Not enough history to assess spending trend.")
    } else if inputs.spend_recent < prior_average {
        (15, "Spending trending down vs 3-month average, a sign of good debt management.")
    } else if inputs.spend_recent <= prior_average * 1.10 {
        (8, "Spending stable vs 3-month average. Maintain your payment habits.")
    } else {
        (2, "Spending up >10% vs 3-month average. Watch your credit card balances.")
    };

    let (discipline_score, discipline_text) = if inputs.spend_last_month > 0.0 {
        let change =
            percent_of(inputs.spend_this_month - inputs.spend_last_month, inputs.spend_last_month)
                .unwrap_or(0.0);
        let points = match change.abs() {
            c if c <= 10.0 => 10,
            c if c <= 25.0 => 6,
            _ => 3,
        };
        (points, format!("Spending {change:.1}% vs last month."))
    } else {
        (10, "Good spending discipline.".to_string())
    };

    let (history_score, history_text) = match inputs.open_high_due_alerts {
        0 => (10, "No overdue payments detected.".to_string()),
        n @ 1..=2 => (5, format!("{n} overdue payment alerts.")),
        n => (0, format!("{n} overdue payment alerts.")),
    };

    let pillars = vec![
        pillar(
            "Credit Utilization",
            utilization_score,
            25,
            format!("{utilization:.1}% utilization. Keep below 30% for good score."),
        ),
        pillar(
            "Emergency Fund",
            emergency_score,
            20,
            format!(
                "{emergency_fund_months:.1} months covered (target: {} months).",
                inputs.emergency_fund_target_months
            ),
        ),
        pillar("Savings Rate", savings_score, 20, savings_text),
        pillar("Debt Trend", debt_score, 15, debt_text.to_string()),
        pillar("Spending Discipline", discipline_score, 10, discipline_text),
        pillar("Payment History", history_score, 10, history_text),
    ];
    let total_score = pillars.iter().map(|p| p.score).sum();

    HealthScoreResponse {
        total_score,
        grade: grade(total_score).to_string(),
        pillars,
        emergency_fund_months,
        emergency_fund_target: inputs.emergency_fund_target_months,
        utilization_percent: utilization,
        savings_rate,
    }
}

async fn gather_inputs(
    ctx: &ApiContext,
    accounts: &[Account],
    profile: &FinancialProfile,
    today: NaiveDate,
) -> Result<HealthInputs, ApiError> {
    let this_month = month_start(today);
    let last_month = sub_months(this_month, 1);
    let savings_balance = accounts
        .iter()
        .filter(|a| a.account_type == AccountType::Savings)
        .filter_map(|a| a.current_balance)
        .sum();
    let prior_quarter_start = sub_months(this_month, 4);
    let prior_quarter_end = last_month.pred_opt().unwrap_or(last_month);

    Ok(HealthInputs {
        utilization_percent: CreditUsage::of(accounts).percent(),
        savings_balance,
        spend_last_six_months: debit_total(ctx, sub_months(today, 6), today).await?,
        monthly_income: profile.monthly_income,
        spend_this_month: debit_total(ctx, this_month, today).await?,
        spend_last_month: debit_total(ctx, last_month, this_month.pred_opt().unwrap_or(this_month))
            .await?,
        spend_recent: debit_total(ctx, last_month, today).await?,
        spend_prior_quarter: debit_total(ctx, prior_quarter_start, prior_quarter_end).await?,
        open_high_due_alerts: ctx
            .storage
            .count_open_alerts(AlertType::DueDate, AlertSeverity::High)
            .await
            .map_err(internal)?,
        emergency_fund_target_months: profile.emergency_fund_target_months,
    })
}

pub async fn health_score(ctx: &ApiContext) -> Result<HealthScoreResponse, ApiError> {
    health_score_at(ctx, today()).await
}

pub(crate) async fn health_score_at(
    ctx: &ApiContext,
    today: NaiveDate,
) -> Result<HealthScoreResponse, ApiError> {
    let accounts = ctx.storage.list_active_accounts().await.map_err(internal)?;
    let profile = ctx.storage.get_or_create_profile().await.map_err(internal)?;
    let inputs = gather_inputs(ctx, &accounts, &profile, today).await?;
    Ok(score(&inputs))
}

#[cfg(test)]
#[path = "tests/health_tests.rs"]
mod tests;
