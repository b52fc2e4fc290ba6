//! Plans where an extra monthly savings target can come from: categories furthest over their
//! benchmark and easiest to cut are trimmed first until the target is covered.

use std::fmt::Write as _;

use chrono::NaiveDate;
use shared::{
    domain::{percent_of, round_money, round_to, CutDifficulty, SpendingStatus},
    error::ApiError,
    protocol::{
        CategoryRecommendation, SavingsPlanQuery, SavingsPlanResponse, SpendingCategory, TopMerchant,
    },
};
use storage::TransactionQuery;
use tracing::{debug, warn};

use crate::{
    analytics::{category_monthly_averages, deposit_total},
    internal, sub_months, today, ApiContext,
};

pub const DEFAULT_TARGET: f64 = 300.0;
const LOOKBACK_MONTHS: u32 = 3;
const INCOME_FLOOR: f64 = 200.0;
/// Overspend at or below this is noise, not a cut worth suggesting.
const MIN_OVERSPEND: f64 = 10.0;
const MIN_CUT: f64 = 15.0;
const TOP_MERCHANTS: i64 = 3;
const NARRATIVE_CATEGORIES: usize = 10;

/// Benchmark share of income and how easy the category is to cut, 1 (hard) to 5 (easy).
const BENCHMARKS: &[(&str, f64, u8)] = &[
    ("HOUSING", 0.28, 1),
    ("RENT", 0.28, 1),
    ("MORTGAGE", 0.28, 1),
    ("GROCERIES", 0.10, 2),
    ("DINING", 0.05, 4),
    ("RESTAURANTS", 0.05, 4),
    ("FOOD", 0.08, 3),
    ("COFFEE", 0.01, 5),
    ("TRANSPORTATION", 0.12, 2),
    ("AUTO", 0.12, 2),
    ("GAS", 0.04, 2),
    ("UTILITIES", 0.05, 1),
    ("ENTERTAINMENT", 0.04, 4),
    ("SHOPPING", 0.05, 3),
    ("CLOTHING", 0.03, 3),
    ("ELECTRONICS", 0.02, 3),
    ("SUBSCRIPTIONS", 0.02, 5),
    ("FITNESS", 0.02, 3),
    ("PERSONAL_CARE", 0.02, 3),
    ("TRAVEL", 0.04, 3),
    ("HEALTHCARE", 0.06, 1),
    ("INSURANCE", 0.06, 1),
    ("PHONE", 0.02, 3),
    ("INTERNET", 0.01, 2),
    ("AMAZON", 0.03, 3),
];
const DEFAULT_BENCHMARK: (f64, u8) = (0.05, 3);

/// Exact name first, then either name containing the other, e.g. "HEALTH & FITNESS".
pub fn benchmark(category: &str) -> (f64, u8) {
    BENCHMARKS
        .iter()
        .find(|(name, _, _)| *name == category)
        .or_else(|| {
            BENCHMARKS
                .iter()
                .find(|(name, _, _)| category.contains(name) || name.contains(category))
        })
        .map_or(DEFAULT_BENCHMARK, |(_, pct, ease)| (*pct, *ease))
}

pub fn difficulty(ease: u8) -> CutDifficulty {
    match ease {
        1 | 2 => CutDifficulty::Hard,
        4 | 5 => CutDifficulty::Easy,
        _ => CutDifficulty::Medium,
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlanInputs {
    pub monthly_income: f64,
    pub target_additional: f64,
    /// Upper-cased category and its monthly average.
    pub category_monthly: Vec<(String, f64)>,
    pub top_merchants: Vec<TopMerchant>,
    pub active_subscriptions: usize,
}

fn status_of(pct_of_income: f64, bench: f64) -> SpendingStatus {
    if pct_of_income > bench * 100.0 * 1.2 {
        SpendingStatus::Over
    } else if pct_of_income > bench * 100.0 * 0.8 {
        SpendingStatus::Ok
    } else {
        SpendingStatus::Good
    }
}

fn share_of(amount: f64, income: f64) -> f64 {
    if income > 0.0 {
        amount / income * 100.0
    } else {
        0.0
    }
}

fn breakdown(category_monthly: &[(String, f64)], income: f64) -> Vec<SpendingCategory> {
    let mut rows: Vec<SpendingCategory> = category_monthly
        .iter()
        .map(|(category, monthly)| {
            let (bench, _) = benchmark(category);
            let pct = share_of(*monthly, income);
            SpendingCategory {
                category: category.clone(),
                monthly_amount: round_money(*monthly),
                pct_of_income: round_to(pct, 1),
                benchmark_pct: round_to(bench * 100.0, 2),
                status: status_of(pct, bench),
            }
        })
        .collect();
    rows.sort_by(|a, b| b.monthly_amount.total_cmp(&a.monthly_amount));
    rows
}

fn actions_for(
    category: &str,
    current: f64,
    target: f64,
    merchants: &[TopMerchant],
    active_subscriptions: usize,
) -> Vec<String> {
    let cut = current - target;
    match category {
        "DINING" | "RESTAURANTS" => {
            let meals = (cut / 20.0).ceil() as i64;
            let mut actions = vec![
                format!("Cook {meals} more meals at home per week, about $20 saved each time"),
                format!(
                    "Cap restaurant visits to {} per week (currently ${cut:.0}/month over)",
                    ((target / 60.0) as i64).max(1)
                ),
            ];
            if let Some(top) = merchants.first() {
                actions.push(format!(
                    "Review your top expense: {} (~${:.0}/month), consider limiting it to once a week",
                    top.merchant, top.monthly_amount
                ));
            }
            actions
        }
        "COFFEE" | "CAFE" => vec![
            format!("Make coffee at home: about $4/day saved, ${cut:.0}/month"),
            "A home espresso machine pays for itself in about two months".to_string(),
        ],
        "SUBSCRIPTIONS" => vec![
            format!(
                "Review all {active_subscriptions} active subscriptions and cancel anything unused in the last 60 days"
            ),
            "Bundle streaming services or share family plans instead of paying for each".to_string(),
            format!("Target: eliminate ${cut:.0} in unused subscriptions this week"),
        ],
        "SHOPPING" | "AMAZON" => vec![
            "Wait 72 hours before any non-essential purchase over $30".to_string(),
            "Remove saved payment details from shopping sites so impulse buys take effort".to_string(),
            format!("Set a weekly shopping budget of ${:.0}", target / 4.0),
        ],
        "ENTERTAINMENT" => vec![
            "Use your library card for movies, audiobooks and events".to_string(),
            "Look for free local events twice a month".to_string(),
            format!("Cap entertainment at ${target:.0}/month"),
        ],
        "CLOTHING" => vec![
            "Try a 30-day no-buy challenge for clothing".to_string(),
            "Buy second-hand for clothing needs, typically 50-70% cheaper than retail".to_string(),
            format!("The ${cut:.0}/month cut frees up ${:.0}/year", cut * 12.0),
        ],
        "FOOD" | "GROCERIES" => vec![
            "Plan meals for the week to cut waste and impulse purchases".to_string(),
            "Shop with a list and never on an empty stomach".to_string(),
            "Switch staples like pasta, rice and canned goods to store brands".to_string(),
        ],
        "TRANSPORTATION" | "GAS" => vec![
            "Combine errands into one or two trips a week".to_string(),
            "Compare fuel prices nearby before filling up".to_string(),
            "Carpool or take transit two days a week where possible".to_string(),
        ],
        _ => vec![
            format!(
                "Reduce {} spending from ${current:.0} to ${target:.0}/month, saving ${cut:.0}",
                category.to_lowercase()
            ),
            "Track every purchase in this category for two weeks; awareness alone trims spending"
                .to_string(),
        ],
    }
}

struct Candidate {
    category: String,
    current: f64,
    bench_amount: f64,
    bench_pct: f64,
    ease: u8,
    overspend: f64,
}

/// Everything except the model narrative, which [`savings_plan`] fills in when it can.
pub fn calculate(inputs: &PlanInputs) -> SavingsPlanResponse {
    let income = inputs.monthly_income;
    let target = inputs.target_additional;
    let total_spend: f64 = inputs.category_monthly.iter().map(|(_, m)| m).sum();
    let current_savings = (income - total_spend).max(0.0);
    let target_savings = current_savings + target;

    let mut candidates: Vec<Candidate> = inputs
        .category_monthly
        .iter()
        .filter_map(|(category, monthly)| {
            let (bench_pct, ease) = benchmark(category);
            let bench_amount = round_money(income * bench_pct);
            let overspend = (monthly - bench_amount).max(0.0);
            (overspend > MIN_OVERSPEND).then(|| Candidate {
                category: category.clone(),
                current: *monthly,
                bench_amount,
                bench_pct,
                ease,
                overspend,
            })
        })
        .collect();
    candidates.sort_by(|a, b| {
        (b.overspend * f64::from(b.ease)).total_cmp(&(a.overspend * f64::from(a.ease)))
    });

    let mut remaining = target;
    let mut recommendations = Vec::new();
    for candidate in &candidates {
        if remaining <= 0.0 {
            break;
        }
        let cut = candidate.overspend.min(remaining);
        if cut < MIN_CUT {
            continue;
        }
        let new_target = candidate.current - cut;
        recommendations.push(CategoryRecommendation {
            category: candidate.category.clone(),
            current_monthly: round_money(candidate.current),
            target_monthly: round_money(new_target),
            monthly_savings: round_money(cut),
            benchmark_amount: candidate.bench_amount,
            benchmark_pct: round_to(candidate.bench_pct * 100.0, 2),
            difficulty: difficulty(candidate.ease),
            ease_score: candidate.ease,
            top_merchants: inputs.top_merchants.clone(),
            specific_actions: actions_for(
                &candidate.category,
                candidate.current,
                new_target,
                &inputs.top_merchants,
                inputs.active_subscriptions,
            ),
            reasoning: format!(
                "You spend {:.1}% of income on {} (advisor benchmark: {:.0}%)",
                share_of(candidate.current, income),
                candidate.category.to_lowercase(),
                candidate.bench_pct * 100.0
            ),
        });
        remaining -= cut;
    }

    let total_recommended = round_money(target - remaining.max(0.0));
    let mut plan = SavingsPlanResponse {
        monthly_income: round_money(income),
        current_monthly_spend: round_money(total_spend),
        current_monthly_savings: round_money(current_savings),
        current_savings_rate: percent_of(current_savings, income).unwrap_or(0.0),
        target_additional_savings: round_money(target),
        target_monthly_savings: round_money(target_savings),
        target_savings_rate: percent_of(target_savings, income).unwrap_or(0.0),
        total_recommended_savings: total_recommended,
        coverage_pct: percent_of(total_recommended, target).unwrap_or(0.0),
        goal_achievable: remaining <= 0.0,
        recommendations,
        spending_breakdown: breakdown(&inputs.category_monthly, income),
        narrative: String::new(),
        ai_available: false,
    };
    plan.narrative = fallback_narrative(&plan);
    plan
}

fn fallback_narrative(plan: &SavingsPlanResponse) -> String {
    let mut out = format!(
        "Based on your income of ${:.0}/month, you're currently saving ${:.0}/month ({:.1}% savings rate). ",
        plan.monthly_income, plan.current_monthly_savings, plan.current_savings_rate
    );
    let target = plan.target_additional_savings;
    if plan.recommendations.is_empty() {
        let _ = write!(
            out,
            "To save an additional ${target:.0}/month you'll need to review your spending; your \
             categories are close to or under benchmark. Subscriptions and dining are usually the \
             easiest wins."
        );
        return out;
    }
    let _ = write!(out, "To save an additional ${target:.0}/month, here's your plan: ");
    for rec in plan.recommendations.iter().take(3) {
        let _ = write!(
            out,
            "cut {} from ${:.0} to ${:.0}/month (saves ${:.0}); ",
            rec.category.to_lowercase(),
            rec.current_monthly,
            rec.target_monthly,
            rec.monthly_savings
        );
    }
    let yearly = target * 12.0;
    let ten_years = yearly * ((1.07f64).powi(10) - 1.0) / 0.07;
    let _ = write!(
        out,
        "That ${target:.0}/month adds up to ${yearly:.0}/year; invested at 7%, it becomes ${ten_years:.0} in 10 years."
    );
    out
}

fn narrative_prompt(plan: &SavingsPlanResponse) -> String {
    let mut out = String::from(
        "You are a trusted personal financial advisor reviewing a client's actual transaction data.\n\n\
         CLIENT FINANCIAL SNAPSHOT:\n",
    );
    let _ = writeln!(out, "- Monthly take-home income: ${:.0}", plan.monthly_income);
    let _ = writeln!(out, "- Current monthly spending: ${:.0}", plan.current_monthly_spend);
    let _ = writeln!(
        out,
        "- Current monthly savings: ${:.0} ({:.1}% savings rate)",
        plan.current_monthly_savings, plan.current_savings_rate
    );
    let _ = writeln!(
        out,
        "- Goal: save an additional ${:.0}/month (target: ${:.0}/month = {:.1}% savings rate)\n",
        plan.target_additional_savings, plan.target_monthly_savings, plan.target_savings_rate
    );
    out.push_str("SPENDING BREAKDOWN (last 3 months avg/month):\n");
    for row in plan.spending_breakdown.iter().take(NARRATIVE_CATEGORIES) {
        let flag = if row.status == SpendingStatus::Over {
            " <- OVER BENCHMARK"
        } else {
            ""
        };
        let _ = writeln!(
            out,
            "- {}: ${:.0}/month ({:.1}% of income, benchmark: {:.0}%){flag}",
            row.category, row.monthly_amount, row.pct_of_income, row.benchmark_pct
        );
    }
    if !plan.recommendations.is_empty() {
        out.push_str("\nRECOMMENDED CUTS:\n");
        for rec in &plan.recommendations {
            let _ = writeln!(
                out,
                "- Cut {} from ${:.0} to ${:.0}/month, saves ${:.0}",
                rec.category, rec.current_monthly, rec.target_monthly, rec.monthly_savings
            );
        }
    }
    let _ = write!(
        out,
        "\nWrite a 3-paragraph personalized response. Acknowledge their current situation with \
         specific numbers, give a clear path to the ${:.0} goal naming categories and amounts, and \
         end with one motivating insight about what the extra savings means in 5 years. Be direct \
         and supportive, use their actual numbers, no bullet points or headers, at most 200 words.\n\n\
         Response:",
        plan.target_additional_savings
    );
    out
}

pub async fn savings_plan(
    ctx: &ApiContext,
    query: SavingsPlanQuery,
) -> Result<SavingsPlanResponse, ApiError> {
    savings_plan_at(ctx, query, today()).await
}

pub(crate) async fn savings_plan_at(
    ctx: &ApiContext,
    query: SavingsPlanQuery,
    today: NaiveDate,
) -> Result<SavingsPlanResponse, ApiError> {
    let target = query.target.unwrap_or(DEFAULT_TARGET);
    if !target.is_finite() || target < 0.0 {
        return Err(ApiError::validation("target must be a non-negative amount"));
    }
    let start = sub_months(today, LOOKBACK_MONTHS);
    let months = f64::from(LOOKBACK_MONTHS);

    let profile = ctx.storage.get_or_create_profile().await.map_err(internal)?;
    let monthly_income = match profile.monthly_income.filter(|income| *income > 0.0) {
        Some(income) => income,
        None => round_money(deposit_total(ctx, start, today, INCOME_FLOOR).await? / months),
    };

    let top_merchants = ctx
        .storage
        .merchant_totals(&TransactionQuery::debits_between(start, today), TOP_MERCHANTS)
        .await
        .map_err(internal)?
        .into_iter()
        .map(|(merchant, total, charges)| TopMerchant {
            merchant,
            monthly_amount: round_money(total / months),
            monthly_count: round_to(charges as f64 / months, 1),
        })
        .collect();
    let active_subscriptions = ctx
        .storage
        .list_active_subscriptions()
        .await
        .map_err(internal)?
        .len();

    let inputs = PlanInputs {
        monthly_income,
        target_additional: target,
        category_monthly: category_monthly_averages(ctx, start, today, LOOKBACK_MONTHS).await?,
        top_merchants,
        active_subscriptions,
    };
    debug!(?inputs, "building savings plan");
    let mut plan = calculate(&inputs);

    match ctx.llm.generate(&narrative_prompt(&plan)).await {
        Ok(reply) if !reply.trim().is_empty() => {
            plan.narrative = reply.trim().to_string();
            plan.ai_available = true;
        }
        Ok(_) => debug!("model returned an empty savings narrative"),
        Err(error) => warn!(error = %error.message, "savings plan narrative unavailable"),
    }
    Ok(plan)
}

#[cfg(test)]
#[path = "tests/savings_plan_tests.rs"]
mod tests;
