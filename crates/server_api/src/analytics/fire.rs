use chrono::{Datelike, Months, NaiveDate};
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal, NormalError};
use shared::{
    domain::{percent_of, round_money},
    error::{ApiError, ErrorCode},
    protocol::{FireCalculatorResponse, FireQuery, YearProjection},
};
use tracing::debug;

use crate::{analytics::debit_total, internal, sub_months, today, ApiContext};

pub const EXPECTED_RETURN: f64 = 0.07;
pub const RETURN_VOLATILITY: f64 = 0.15;
/// Annual expenses times this is the portfolio that sustains a 4% withdrawal.
pub const FI_MULTIPLE: f64 = 25.0;
pub const SIMULATION_RUNS: usize = 100;
pub const SIMULATION_YEARS: usize = 40;
pub const SIMULATION_SEED: u64 = 42;
const MAX_SEARCH_YEARS: u32 = 60;
/// Reported when savings never reach the FI number.
const UNREACHABLE_YEARS: f64 = 360.0;
const FALLBACK_MONTHLY_EXPENSES: f64 = 3000.0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FireInputs {
    pub age: Option<f64>,
    pub target_retirement_age: Option<f64>,
    pub current_investments: f64,
    pub monthly_expenses: f64,
    pub monthly_income: f64,
}

/// First whole year in which compounding savings reach `target`.
pub fn years_to_target(current: f64, annual_savings: f64, target: f64) -> f64 {
    if current >= target {
        return 0.0;
    }
    if annual_savings <= 0.0 {
        return UNREACHABLE_YEARS;
    }
    (0..=MAX_SEARCH_YEARS)
        .find(|&n| {
            let growth = (1.0 + EXPECTED_RETURN).powi(n as i32);
            current * growth + annual_savings * (growth - 1.0) / EXPECTED_RETURN >= target
        })
        .map_or(f64::from(MAX_SEARCH_YEARS), f64::from)
}

/// Extra monthly saving needed to reach `target` by retirement age, 0 when already on pace.
pub fn monthly_savings_gap(inputs: &FireInputs, target: f64, monthly_savings: f64) -> f64 {
    let (Some(age), Some(retire_at)) = (inputs.age, inputs.target_retirement_age) else {
        return 0.0;
    };
    let years = retire_at - age;
    if years <= 0.0 || inputs.current_investments >= target {
        return 0.0;
    }
    let monthly_rate = EXPECTED_RETURN / 12.0;
    let grown = inputs.current_investments * (1.0 + EXPECTED_RETURN).powf(years);
    let required =
        (target - grown) * monthly_rate / ((1.0 + monthly_rate).powf(years * 12.0) - 1.0);
    round_money((required - monthly_savings).max(0.0))
}

/// Percentile paths of portfolio value per year, from year 0 through `SIMULATION_YEARS`.
#[derive(Debug, Clone, PartialEq)]
pub struct MonteCarloBands {
    pub p10: Vec<f64>,
    pub p50: Vec<f64>,
    pub p90: Vec<f64>,
}

pub fn monte_carlo(current: f64, annual_savings: f64, seed: u64) -> Result<MonteCarloBands, NormalError> {
    let returns = Normal::new(EXPECTED_RETURN, RETURN_VOLATILITY)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let runs: Vec<Vec<f64>> = (0..SIMULATION_RUNS)
        .map(|_| {
            let mut value = current;
            let mut path = Vec::with_capacity(SIMULATION_YEARS + 1);
            path.push(value);
            for _ in 0..SIMULATION_YEARS {
                value = value * (1.0 + returns.sample(&mut rng)) + annual_savings;
                path.push(value.max(0.0));
            }
            path
        })
        .collect();

    let mut bands = MonteCarloBands {
        p10: Vec::with_capacity(SIMULATION_YEARS + 1),
        p50: Vec::with_capacity(SIMULATION_YEARS + 1),
        p90: Vec::with_capacity(SIMULATION_YEARS + 1),
    };
    for year in 0..=SIMULATION_YEARS {
        let mut values: Vec<f64> = runs.iter().map(|path| path[year]).collect();
        values.sort_by(f64::total_cmp);
        bands.p10.push(nearest_rank(&values, 0.10).round());
        bands.p50.push(nearest_rank(&values, 0.50).round());
        bands.p90.push(nearest_rank(&values, 0.90).round());
    }
    Ok(bands)
}

/// Nearest-rank percentile of an ascending slice.
fn nearest_rank(sorted: &[f64], p: f64) -> f64 {
    let rank = (sorted.len() as f64 * p).ceil() as usize;
    let index = rank.saturating_sub(1).min(sorted.len().saturating_sub(1));
    sorted.get(index).copied().unwrap_or(0.0)
}

pub fn calculate(inputs: &FireInputs, today: NaiveDate) -> Result<FireCalculatorResponse, NormalError> {
    let annual_expenses = inputs.monthly_expenses * 12.0;
    let fi_number = annual_expenses * FI_MULTIPLE;
    let monthly_savings = (inputs.monthly_income - inputs.monthly_expenses).max(0.0);
    let savings_rate = percent_of(monthly_savings, inputs.monthly_income).unwrap_or(0.0);
    let annual_savings = monthly_savings * 12.0;
    let current = inputs.current_investments;
    let years_to_fire = years_to_target(current, annual_savings, fi_number);
    let fire_date = today
        .checked_add_months(Months::new(years_to_fire as u32 * 12))
        .unwrap_or(today);

    let horizon = (years_to_fire as i32 + 5).min(SIMULATION_YEARS as i32);
    let mut portfolio = current;
    let projections = (0..=horizon)
        .map(|offset| {
            let point = YearProjection {
                year: today.year() + offset,
                portfolio_value: portfolio.round(),
                annual_contribution: annual_savings.round(),
            };
            portfolio = portfolio * (1.0 + EXPECTED_RETURN) + annual_savings;
            point
        })
        .collect();

    let bands = monte_carlo(current, annual_savings, SIMULATION_SEED)?;
    Ok(FireCalculatorResponse {
        fi_number: fi_number.round(),
        current_savings: current.round(),
        annual_expenses: round_money(annual_expenses),
        monthly_savings: round_money(monthly_savings),
        years_to_fire,
        fire_date,
        savings_rate,
        monthly_savings_gap: monthly_savings_gap(inputs, fi_number, monthly_savings),
        projections,
        monte_carlo_p10: bands.p10,
        monte_carlo_p50: bands.p50,
        monte_carlo_p90: bands.p90,
    })
}

/// Fills omitted query values from the profile, and expenses from the last three months of spend.
pub async fn fire_calculator(ctx: &ApiContext, query: FireQuery) -> Result<FireCalculatorResponse, ApiError> {
    let today = today();
    let profile = ctx.storage.get_or_create_profile().await.map_err(internal)?;
    let monthly_expenses = match query.monthly_expenses.filter(|e| *e > 0.0) {
        Some(expenses) => expenses,
        None => {
            let spend = debit_total(ctx, sub_months(today, 3), today).await?;
            if spend > 0.0 {
                round_money(spend / 3.0)
            } else {
                FALLBACK_MONTHLY_EXPENSES
            }
        }
    };
    let inputs = FireInputs {
        age: query.age.or(profile.age.map(|a| a as f64)),
        target_retirement_age: query
            .target_retirement_age
            .or(profile.target_retirement_age.map(|a| a as f64)),
        current_investments: query
            .current_investments
            .or(profile.current_investments)
            .unwrap_or(0.0),
        monthly_expenses,
        monthly_income: profile.monthly_income.unwrap_or(0.0),
    };
    debug!(?inputs, "running fire projection");
    calculate(&inputs, today).map_err(|err| ApiError::new(ErrorCode::Internal, err.to_string()))
}

#[cfg(test)]
#[path = "tests/fire_tests.rs"]
mod tests;
