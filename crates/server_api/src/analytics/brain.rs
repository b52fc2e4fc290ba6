//! Retirement-readiness report: where current saving leads, what extra saving buys, and which
//! categories run over their share-of-income benchmark.

use std::fmt::Write as _;

use chrono::{Datelike, NaiveDate};
use shared::{
    domain::{percent_of, round_money, round_to, ActionType, SpendingStatus},
    error::ApiError,
    protocol::{AgeProjection, ActionItem, BrainReportResponse, CategoryInsight, ScenarioResult},
};
use tracing::{debug, warn};

use crate::{
    analytics::{
        category_monthly_averages, debit_total, deposit_total,
        fire::{monthly_savings_gap, FireInputs, EXPECTED_RETURN, FI_MULTIPLE},
        CreditUsage,
    },
    internal, sub_months, today, ApiContext,
};

const DEFAULT_AGE: i64 = 35;
const DEFAULT_RETIREMENT_AGE: i64 = 65;
const PROJECTION_END_AGE: i64 = 85;
const MAX_SEARCH_YEARS: i64 = 50;
const FALLBACK_MONTHLY_INCOME: f64 = 4000.0;
const FALLBACK_MONTHLY_SPEND: f64 = 3000.0;
const INCOME_FLOOR: f64 = 500.0;
const LOOKBACK_MONTHS: u32 = 3;
/// The savings rate the optimal path assumes.
const OPTIMAL_SAVINGS_RATE: f64 = 0.20;
const SCENARIOS: [(f64, &str); 3] = [(200.0, "gold"), (500.0, "green"), (1000.0, "blue")];
const TOP_CATEGORIES: usize = 10;
const MAX_SPENDING_ACTIONS: u32 = 5;
const MIN_ACTION_SAVING: f64 = 15.0;
const AUTOMATED_TRANSFER: f64 = 200.0;
/// A card balance above this puts debt payoff on the roadmap.
const CARD_DEBT_THRESHOLD: f64 = 1000.0;
/// Replies this short are treated as the model having nothing to say.
const MIN_NARRATIVE_CHARS: usize = 50;

/// Share of monthly income each category should stay under.
const BENCHMARKS: &[(&str, f64)] = &[
    ("HOUSING", 0.28),
    ("RENT", 0.28),
    ("GROCERIES", 0.10),
    ("FOOD", 0.10),
    ("DINING", 0.05),
    ("RESTAURANTS", 0.05),
    ("TRANSPORTATION", 0.10),
    ("AUTO", 0.10),
    ("GAS", 0.04),
    ("UTILITIES", 0.05),
    ("PHONE", 0.02),
    ("INTERNET", 0.01),
    ("HEALTHCARE", 0.05),
    ("SUBSCRIPTIONS", 0.02),
    ("ENTERTAINMENT", 0.03),
    ("SHOPPING", 0.05),
    ("CLOTHING", 0.03),
    ("FITNESS", 0.02),
    ("COFFEE", 0.01),
    ("EDUCATION", 0.05),
    ("TRAVEL", 0.05),
    ("PERSONAL_CARE", 0.02),
    ("INSURANCE", 0.05),
    ("AMAZON", 0.03),
    ("ELECTRONICS", 0.02),
];
const DEFAULT_BENCHMARK: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BrainInputs {
    pub age: Option<i64>,
    pub target_retirement_age: Option<i64>,
    pub monthly_income: f64,
    pub monthly_spend: f64,
    /// Cash accounts minus card balances.
    pub net_worth: f64,
    pub current_investments: f64,
    /// Upper-cased category and its monthly average, largest first.
    pub category_monthly: Vec<(String, f64)>,
    pub carries_card_debt: bool,
}

pub fn benchmark(category: &str) -> f64 {
    BENCHMARKS
        .iter()
        .find(|(name, _)| *name == category)
        .map_or(DEFAULT_BENCHMARK, |(_, pct)| *pct)
}

/// Portfolio after `years` of annual compounding with end-of-year contributions.
pub fn future_value(portfolio: f64, annual_savings: f64, years: i64) -> f64 {
    let growth = (1.0 + EXPECTED_RETURN).powi(years as i32);
    let contributions = if annual_savings > 0.0 {
        annual_savings * (growth - 1.0) / EXPECTED_RETURN
    } else {
        0.0
    };
    portfolio * growth + contributions
}

/// First age at which the portfolio covers `fi_number`, capped fifty years out.
pub fn retirement_age(age: i64, portfolio: f64, annual_savings: f64, fi_number: f64) -> i64 {
    if portfolio >= fi_number {
        return age;
    }
    if annual_savings <= 0.0 {
        return age + MAX_SEARCH_YEARS;
    }
    (1..=MAX_SEARCH_YEARS)
        .find(|&n| future_value(portfolio, annual_savings, n) >= fi_number)
        .map_or(age + MAX_SEARCH_YEARS, |n| age + n)
}

/// Coverage of the FI number (40), savings rate (30) and retiring on time (30).
pub fn readiness_score(coverage: f64, savings_rate: f64, years_early_or_late: i64) -> u32 {
    let coverage_points = (coverage.max(0.0) * 40.0).min(40.0) as u32;
    let savings_points = match savings_rate {
        r if r >= 20.0 => 30,
        r if r >= 15.0 => 22,
        r if r >= 10.0 => 15,
        r if r >= 5.0 => 8,
        _ => 0,
    };
    let timing_points = match years_early_or_late {
        d if d >= 0 => 30,
        d if d >= -5 => 18,
        d if d >= -10 => 10,
        _ => 3,
    };
    (coverage_points + savings_points + timing_points).min(100)
}

pub fn grade(score: u32) -> &'static str {
    match score {
        s if s >= 85 => "A",
        s if s >= 70 => "B",
        s if s >= 55 => "C",
        s if s >= 40 => "D",
        _ => "F",
    }
}

fn path(age: i64, this_year: i32, portfolio: f64, annual_savings: f64) -> Vec<AgeProjection> {
    let mut value = portfolio;
    (age..=PROJECTION_END_AGE)
        .map(|at| {
            let point = AgeProjection {
                age: at,
                year: this_year + (at - age) as i32,
                portfolio_value: value.max(0.0).round(),
            };
            value = value * (1.0 + EXPECTED_RETURN) + annual_savings;
            point
        })
        .collect()
}

fn category_insights(category_monthly: &[(String, f64)], income: f64) -> Vec<CategoryInsight> {
    // Monthly contributions over ten years at the expected return.
    let ten_year_factor = ((1.0 + EXPECTED_RETURN).powi(10) - 1.0) / (EXPECTED_RETURN / 12.0);
    let mut insights: Vec<CategoryInsight> = category_monthly
        .iter()
        .map(|(category, monthly)| {
            let bench = benchmark(category);
            let share = if income > 0.0 { monthly / income } else { 0.0 };
            let status = if share > bench * 1.2 {
                SpendingStatus::Over
            } else if share > bench * 0.8 {
                SpendingStatus::Ok
            } else {
                SpendingStatus::Good
            };
            let overspend = (monthly - income * bench).max(0.0);
            CategoryInsight {
                category: category.clone(),
                monthly_average: round_money(*monthly),
                annual_cost: round_money(monthly * 12.0),
                pct_of_income: round_to(share * 100.0, 1),
                benchmark_pct: round_to(bench * 100.0, 2),
                status,
                retirement_impact_10yr: (overspend * ten_year_factor).round(),
            }
        })
        .collect();
    insights.sort_by(|a, b| b.monthly_average.total_cmp(&a.monthly_average));
    insights.truncate(TOP_CATEGORIES);
    insights
}

/// "DINING" becomes "Dining", "PERSONAL_CARE" becomes "Personal care".
fn display_name(category: &str) -> String {
    let lower = category.to_lowercase().replace('_', " ");
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

struct Trajectory {
    age: i64,
    portfolio: f64,
    monthly_savings: f64,
    fi_number: f64,
    projected_age: i64,
}

fn roadmap(
    insights: &[CategoryInsight],
    income: f64,
    trajectory: &Trajectory,
    carries_card_debt: bool,
) -> Vec<ActionItem> {
    let mut actions = Vec::new();
    let mut rank = 1;
    for insight in insights.iter().filter(|i| i.status == SpendingStatus::Over) {
        let target = income * insight.benchmark_pct / 100.0;
        let saving = insight.monthly_average - target;
        if saving < MIN_ACTION_SAVING {
            continue;
        }
        let new_age = retirement_age(
            trajectory.age,
            trajectory.portfolio,
            (trajectory.monthly_savings + saving) * 12.0,
            trajectory.fi_number,
        );
        actions.push(ActionItem {
            rank,
            title: format!("Reduce {} spending", display_name(&insight.category)),
            description: format!(
                "Cut from ${:.0} to ${target:.0}/month (benchmark: {:.0}% of income). Saves ${saving:.0}/month.",
                insight.monthly_average, insight.benchmark_pct
            ),
            monthly_impact: round_money(saving),
            years_earlier: trajectory.projected_age - new_age,
            action_type: ActionType::Spending,
        });
        rank += 1;
        if rank > MAX_SPENDING_ACTIONS {
            break;
        }
    }

    actions.push(ActionItem {
        rank,
        title: "Automate savings transfer on payday".to_string(),
        description: "Set up an automatic transfer to a high-yield savings or investment account \
                      on the day your paycheck lands. $200/month invested at 7% grows to about \
                      $104K in 20 years."
            .to_string(),
        monthly_impact: AUTOMATED_TRANSFER,
        years_earlier: 0,
        action_type: ActionType::Saving,
    });
    rank += 1;

    if carries_card_debt {
        actions.push(ActionItem {
            rank,
            title: "Eliminate credit card debt".to_string(),
            description: "Card interest at 18-25% APR outpaces any investment return. Pay off \
                          balances before investing beyond an employer match."
                .to_string(),
            monthly_impact: 0.0,
            years_earlier: 1,
            action_type: ActionType::Debt,
        });
    }
    actions
}

fn scenarios(trajectory: &Trajectory, years_to_target: i64) -> Vec<ScenarioResult> {
    SCENARIOS
        .iter()
        .map(|(extra, color)| {
            let annual = (trajectory.monthly_savings + extra) * 12.0;
            let new_age =
                retirement_age(trajectory.age, trajectory.portfolio, annual, trajectory.fi_number);
            let years_earlier = trajectory.projected_age - new_age;
            let headline = match years_earlier {
                n if n > 1 => format!("Retire at {new_age}, {n} years earlier"),
                1 => format!("Retire at {new_age}, 1 year earlier"),
                _ => format!("Retire at {new_age} (same timeline)"),
            };
            ScenarioResult {
                id: format!("save_{extra:.0}"),
                label: format!("Save ${extra:.0} more/month"),
                extra_monthly: *extra,
                color: color.to_string(),
                projected_retirement_age: new_age,
                years_earlier,
                portfolio_at_target_age: future_value(trajectory.portfolio, annual, years_to_target)
                    .round(),
                headline,
            }
        })
        .collect()
}

/// Everything except the model narrative, which [`brain_report`] fills in when it can.
pub fn calculate(inputs: &BrainInputs, today: NaiveDate) -> BrainReportResponse {
    let age = inputs.age.unwrap_or(DEFAULT_AGE);
    let target_age = inputs.target_retirement_age.unwrap_or(DEFAULT_RETIREMENT_AGE);
    let profile_complete = inputs.age.is_some();
    let income = inputs.monthly_income;
    let monthly_savings = (income - inputs.monthly_spend).max(0.0);
    let savings_rate = percent_of(monthly_savings, income).unwrap_or(0.0);
    let annual_savings = monthly_savings * 12.0;
    let portfolio = inputs.net_worth.max(0.0) + inputs.current_investments;
    let fi_number = inputs.monthly_spend * 12.0 * FI_MULTIPLE;

    let years_to_target = (target_age - age).max(1);
    let portfolio_at_target = future_value(portfolio, annual_savings, years_to_target);
    let projected_age = retirement_age(age, portfolio, annual_savings, fi_number);
    let on_track = projected_age <= target_age;
    let years_early_or_late = target_age - projected_age;

    let monthly_gap = if on_track {
        0.0
    } else {
        let fire_inputs = FireInputs {
            age: Some(age as f64),
            target_retirement_age: Some((age + years_to_target) as f64),
            current_investments: portfolio,
            monthly_expenses: inputs.monthly_spend,
            monthly_income: income,
        };
        monthly_savings_gap(&fire_inputs, fi_number, monthly_savings)
    };

    let coverage = if fi_number > 0.0 { portfolio_at_target / fi_number } else { 0.0 };
    let score = readiness_score(coverage, savings_rate, years_early_or_late);

    let headline = if !profile_complete {
        "Set your age in your profile to see your retirement projection".to_string()
    } else if projected_age <= age {
        "You are already financially independent!".to_string()
    } else if on_track {
        format!("On track to retire at {projected_age}, {years_early_or_late} years early!")
    } else {
        format!(
            "At current rate, you'll retire at {projected_age}, {} years later than your goal of {target_age}",
            -years_early_or_late
        )
    };

    let trajectory = Trajectory {
        age,
        portfolio,
        monthly_savings,
        fi_number,
        projected_age,
    };
    let category_insights = category_insights(&inputs.category_monthly, income);
    let roadmap = roadmap(&category_insights, income, &trajectory, inputs.carries_card_debt);

    let mut report = BrainReportResponse {
        score,
        grade: grade(score).to_string(),
        headline,
        narrative: String::new(),
        ai_available: false,
        profile_complete,
        age,
        target_retirement_age: target_age,
        monthly_income: round_money(income),
        monthly_spend: round_money(inputs.monthly_spend),
        monthly_savings: round_money(monthly_savings),
        savings_rate,
        net_worth: round_money(inputs.net_worth),
        current_portfolio: round_money(portfolio),
        fi_number: fi_number.round(),
        portfolio_at_target_age: portfolio_at_target.round(),
        projected_retirement_age: projected_age,
        on_track,
        years_early_or_late,
        monthly_gap,
        current_path: path(age, today.year(), portfolio, annual_savings),
        optimal_path: path(age, today.year(), portfolio, income * OPTIMAL_SAVINGS_RATE * 12.0),
        scenarios: scenarios(&trajectory, years_to_target),
        category_insights,
        roadmap,
    };
    report.narrative = fallback_narrative(&report);
    report
}

fn fallback_narrative(report: &BrainReportResponse) -> String {
    let coverage = percent_of(report.portfolio_at_target_age, report.fi_number).unwrap_or(0.0);
    let ten_years = report.monthly_savings * 12.0 * ((1.0 + EXPECTED_RETURN).powi(10) - 1.0)
        / EXPECTED_RETURN;
    let outlook = if report.on_track {
        format!(
            "You are projected to reach financial independence at age {}, {} years ahead of your goal. Keep the momentum.",
            report.projected_retirement_age, report.years_early_or_late
        )
    } else {
        format!(
            "To retire at your target age of {} instead of {}, you need to save an additional ${:.0}/month. \
             That is {:.1}% of your income, reachable through targeted cuts in your top categories.",
            report.target_retirement_age,
            report.projected_retirement_age,
            report.monthly_gap,
            percent_of(report.monthly_gap, report.monthly_income).unwrap_or(0.0)
        )
    };
    format!(
        "At your current savings rate of {:.1}% (${:.0}/month), you are on track to build a portfolio of ${:.0} \
         by age {}, covering {coverage:.0}% of your retirement target of ${:.0} (25x your annual expenses).\n\n\
         {outlook}\n\n\
         Your 3-month average spending is ${:.0}/month. Investing your current savings at 7% for the next \
         10 years grows to ${ten_years:.0}. Your savings rate is the strongest lever you have: every 1% \
         increase adds roughly one to two years of freedom.",
        report.savings_rate,
        report.monthly_savings,
        report.portfolio_at_target_age,
        report.target_retirement_age,
        report.fi_number,
        report.monthly_spend,
    )
}

fn narrative_prompt(report: &BrainReportResponse) -> String {
    let mut out = String::from(
        "You are a sharp, direct personal financial advisor. Be specific with numbers. No generic advice.\n\
         Analyze this person's finances and give them a direct, personalized 4-paragraph assessment.\n\n",
    );
    let _ = writeln!(
        out,
        "AGE: {} | TARGET RETIREMENT AGE: {}",
        report.age, report.target_retirement_age
    );
    let _ = writeln!(
        out,
        "MONTHLY INCOME: ${:.0} | MONTHLY SPEND: ${:.0} | MONTHLY SAVINGS: ${:.0} ({:.1}% rate)",
        report.monthly_income, report.monthly_spend, report.monthly_savings, report.savings_rate
    );
    let _ = writeln!(out, "CURRENT NET WORTH: ${:.0}", report.net_worth);
    let _ = writeln!(out, "FI NUMBER (retirement target): ${:.0}", report.fi_number);
    let _ = writeln!(
        out,
        "PROJECTED CORPUS AT AGE {}: ${:.0}",
        report.target_retirement_age, report.portfolio_at_target_age
    );
    let _ = writeln!(
        out,
        "PROJECTED RETIREMENT AGE (current rate): {}",
        report.projected_retirement_age
    );
    if report.monthly_gap > 0.0 {
        let _ = writeln!(
            out,
            "MONTHLY GAP TO RETIRE ON TIME: ${:.0} more needed per month",
            report.monthly_gap
        );
    }
    out.push_str("\nTOP SPENDING CATEGORIES (monthly avg, last 3 months):\n");
    for insight in report.category_insights.iter().take(6) {
        let _ = writeln!(
            out,
            "  {}: ${:.0}/mo ({:.1}% of income, benchmark: {:.0}%) -- {}",
            insight.category,
            insight.monthly_average,
            insight.pct_of_income,
            insight.benchmark_pct,
            insight.status
        );
    }
    out.push_str(
        "\nWrite 4 paragraphs:\n\
         1. Where they stand right now (be direct about whether this is good or bad)\n\
         2. What retirement looks like at current trajectory (specific numbers)\n\
         3. The single biggest change that would help most (cite exact dollar amounts)\n\
         4. One specific thing they can do TODAY to improve their situation\n\
         Be encouraging but brutally honest. Use their actual numbers throughout.",
    );
    out
}

pub async fn brain_report(ctx: &ApiContext) -> Result<BrainReportResponse, ApiError> {
    brain_report_at(ctx, today()).await
}

pub(crate) async fn brain_report_at(
    ctx: &ApiContext,
    today: NaiveDate,
) -> Result<BrainReportResponse, ApiError> {
    let profile = ctx.storage.get_or_create_profile().await.map_err(internal)?;
    let start = sub_months(today, LOOKBACK_MONTHS);
    let months = f64::from(LOOKBACK_MONTHS);

    let monthly_income = match profile.monthly_income.filter(|income| *income > 0.0) {
        Some(income) => income,
        None => {
            let deposits = deposit_total(ctx, start, today, INCOME_FLOOR).await?;
            if deposits > 0.0 {
                round_money(deposits / months)
            } else {
                FALLBACK_MONTHLY_INCOME
            }
        }
    };
    let spend = debit_total(ctx, start, today).await?;
    let monthly_spend = if spend > 0.0 {
        round_money(spend / months)
    } else {
        FALLBACK_MONTHLY_SPEND
    };

    let accounts = ctx.storage.list_active_accounts().await.map_err(internal)?;
    let cash: f64 = accounts
        .iter()
        .filter(|a| a.is_cash())
        .filter_map(|a| a.current_balance)
        .sum();
    let card_debt = CreditUsage::of(&accounts).balance;
    let carries_card_debt = accounts.iter().any(|a| {
        a.is_credit_card() && a.current_balance.unwrap_or(0.0) > CARD_DEBT_THRESHOLD
    });

    let inputs = BrainInputs {
        age: profile.age,
        target_retirement_age: profile.target_retirement_age,
        monthly_income,
        monthly_spend,
        net_worth: round_money(cash - card_debt),
        current_investments: profile.current_investments.unwrap_or(0.0),
        category_monthly: category_monthly_averages(ctx, start, today, LOOKBACK_MONTHS).await?,
        carries_card_debt,
    };
    debug!(?inputs, "building brain report");
    let mut report = calculate(&inputs, today);

    match ctx.llm.generate(&narrative_prompt(&report)).await {
        Ok(reply) if reply.trim().chars().count() > MIN_NARRATIVE_CHARS => {
            report.narrative = reply.trim().to_string();
            report.ai_available = true;
        }
        Ok(_) => debug!("model narrative too short; keeping the computed one"),
        Err(error) => warn!(error = %error.message, "brain report narrative unavailable"),
    }
    Ok(report)
}

#[cfg(test)]
#[path = "tests/brain_tests.rs"]
mod tests;
