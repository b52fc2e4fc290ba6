use std::sync::OnceLock;

use regex::Regex;
use shared::{
    domain::{percent_of, round_money, TransactionType},
    error::ApiError,
    protocol::{AnnualReviewResponse, CategoryAmount},
};
use storage::TransactionQuery;
use tracing::warn;

use crate::{analytics::debit_total, internal, year_bounds, ApiContext};

pub const FALLBACK_RECOMMENDATIONS: [&str; 3] = [
    "Review your top spending categories and set budgets.",
    "Consider automating savings to reach your emergency fund goal.",
    "Negotiate your recurring bills for better rates.",
];

fn numbered_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*[1-3]\.\s*(.+)$").expect("numbered line regex"))
}

/// Keeps the lines of a reply that start with `1.`, `2.` or `3.`, without the number.
pub fn parse_recommendations(reply: &str) -> Vec<String> {
    reply
        .lines()
        .filter_map(|line| numbered_line_re().captures(line))
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

fn recommendation_prompt(
    total_spending: f64,
    subscription_annual_cost: f64,
    savings_rate: f64,
    categories: &[CategoryAmount],
) -> String {
    let top = categories
        .iter()
        .take(5)
        .map(|c| format!("{}: ${:.2}", c.category, c.amount))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "As a financial advisor, provide 3 specific, actionable recommendations based on these annual figures:\n\
         - Total spending: ${total_spending:.2}\n\
         - Annual subscription cost: ${subscription_annual_cost:.2}\n\
         - Savings rate: {savings_rate:.1}%\n\
         Top categories: {top}\n\n\
         Format: Return exactly 3 recommendations, one per line, starting with a number (1. 2. 3.). \
         Be specific and actionable."
    )
}

pub async fn annual_review(ctx: &ApiContext, year: i32) -> Result<AnnualReviewResponse, ApiError> {
    let (start, end) = year_bounds(year)?;
    let total_spending = round_money(debit_total(ctx, start, end).await?);
    let interest_paid = ctx
        .storage
        .sum_transactions(&TransactionQuery::of_types_between(
            &[TransactionType::Interest],
            start,
            end,
        ))
        .await
        .map_err(internal)?;
    let fees_paid = ctx
        .storage
        .sum_transactions(&TransactionQuery {
            start_date: Some(start),
            end_date: Some(end),
            fees_or_atm: true,
            ..TransactionQuery::default()
        })
        .await
        .map_err(internal)?;

    let subscription_annual_cost = ctx
        .storage
        .list_active_subscriptions()
        .await
        .map_err(internal)?
        .iter()
        .filter_map(|s| s.annual_cost)
        .sum::<f64>();

    let profile = ctx.storage.get_or_create_profile().await.map_err(internal)?;
    let estimated_income = profile.monthly_income.map_or(0.0, |m| m * 12.0);
    let savings_rate = percent_of(estimated_income - total_spending, estimated_income).unwrap_or(0.0);

    let snapshots = ctx
        .storage
        .net_worth_snapshots_between(start, end)
        .await
        .map_err(internal)?;
    let net_worth_change = match (snapshots.first(), snapshots.last()) {
        (Some(first), Some(last)) if snapshots.len() >= 2 => round_money(last.net_worth - first.net_worth),
        _ => 0.0,
    };

    let category_breakdown: Vec<CategoryAmount> = ctx
        .storage
        .category_totals(&TransactionQuery::debits_between(start, end))
        .await
        .map_err(internal)?
        .into_iter()
        .map(|(category, amount)| CategoryAmount {
            category,
            amount: round_money(amount),
        })
        .collect();

    let prompt = recommendation_prompt(
        total_spending,
        subscription_annual_cost,
        savings_rate,
        &category_breakdown,
    );
    let ai_recommendations = match ctx.llm.generate(&prompt).await {
        Ok(reply) => {
            let parsed = parse_recommendations(&reply);
            if parsed.is_empty() {
                FALLBACK_RECOMMENDATIONS.map(String::from).to_vec()
            } else {
                parsed
            }
        }
        Err(error) => {
            warn!(%error, year, "annual review recommendations unavailable");
            FALLBACK_RECOMMENDATIONS.map(String::from).to_vec()
        }
    };

    Ok(AnnualReviewResponse {
        year,
        total_spending,
        estimated_income: round_money(estimated_income),
        savings_rate,
        interest_paid: round_money(interest_paid),
        fees_paid: round_money(fees_paid),
        subscription_annual_cost: round_money(subscription_annual_cost),
        net_worth_change,
        category_breakdown,
        ai_recommendations,
    })
}

#[cfg(test)]
#[path = "tests/annual_review_tests.rs"]
mod tests;
