use shared::{
    domain::{percent_of, round_money, round_to, Account, AccountType},
    error::ApiError,
    protocol::{CardUtilizationDetail, CreditScoreResponse, CreditWhatIf},
};

use crate::{analytics::CreditUsage, internal, ApiContext};

const BASE_SCORE: u32 = 650;
const MAX_SCORE: u32 = 850;
pub const TARGET_UTILIZATION: f64 = 30.0;

/// Utilization-only estimate: a 650 baseline plus a bonus that shrinks as utilization grows.
pub fn estimate_score(utilization_percent: f64) -> u32 {
    let bonus = match utilization_percent {
        p if p <= 1.0 => 150,
        p if p <= 10.0 => 130,
        p if p <= 30.0 => 90,
        p if p <= 50.0 => 40,
        p if p <= 75.0 => 10,
        _ => 0,
    };
    (BASE_SCORE + bonus).min(MAX_SCORE)
}

pub fn utilization_impact(utilization_percent: f64) -> &'static str {
    match utilization_percent {
        p if p <= 10.0 => "EXCELLENT",
        p if p <= 30.0 => "GOOD",
        p if p <= 50.0 => "FAIR",
        _ => "POOR",
    }
}

pub fn optimize(cards: &[Account]) -> CreditScoreResponse {
    let usage = CreditUsage::of(cards);
    let overall = usage.percent().unwrap_or(0.0);
    let estimated_score = estimate_score(overall);

    let mut details = Vec::new();
    let mut recommendations = Vec::new();
    let mut what_if_scenarios = Vec::new();
    for card in cards.iter().filter(|c| c.is_credit_card()) {
        let (Some(balance), Some(limit)) = (card.current_balance, card.credit_limit) else {
            continue;
        };
        let utilization = percent_of(balance, limit).unwrap_or(0.0);
        let recommended_payment = round_money((balance - limit * TARGET_UTILIZATION / 100.0).max(0.0));
        details.push(CardUtilizationDetail {
            account_id: card.id,
            account_name: card.name.clone(),
            balance,
            credit_limit: limit,
            utilization_pct: utilization,
            recommended_payment,
            target_utilization: TARGET_UTILIZATION,
        });
        if utilization > TARGET_UTILIZATION {
            recommendations.push(format!(
                "Pay ${recommended_payment:.2} on {} to reduce utilization from {utilization:.1}% to 30%",
                card.name
            ));
        }
        if recommended_payment > 0.0 {
            let new_utilization =
                percent_of(usage.balance - recommended_payment, usage.limit).unwrap_or(0.0);
            what_if_scenarios.push(CreditWhatIf {
                description: format!("Pay {} to 30% utilization", card.name),
                payment_amount: recommended_payment,
                new_utilization_pct: new_utilization,
                estimated_score_impact: estimate_score(new_utilization) as i32
                    - estimated_score as i32,
            });
        }
    }

    let worst = cards
        .iter()
        .filter(|c| c.is_credit_card())
        .filter_map(|c| match (c.current_balance, c.credit_limit) {
            (Some(balance), Some(limit)) if limit > 0.0 => Some((c, round_to(balance / limit, 4))),
            _ => None,
        })
        .max_by(|a, b| a.1.total_cmp(&b.1));
    if let Some((card, _)) = worst {
        recommendations.insert(
            0,
            format!(
                "Focus first on {} (highest utilization card) for maximum credit score impact.",
                card.name
            ),
        );
    }
    if overall <= TARGET_UTILIZATION {
        recommendations.push(format!(
            "Great job! Overall utilization is {overall:.1}%, and below 30% is ideal."
        ));
    }
    recommendations.push(
        "Pay your balance BEFORE the statement closing date to report a lower balance to credit bureaus."
            .to_string(),
    );

    CreditScoreResponse {
        estimated_score,
        utilization_impact: utilization_impact(overall).to_string(),
        cards: details,
        recommendations,
        what_if_scenarios,
    }
}

pub async fn credit_score(ctx: &ApiContext) -> Result<CreditScoreResponse, ApiError> {
    let cards = ctx
        .storage
        .list_active_accounts_of_type(AccountType::CreditCard)
        .await
        .map_err(internal)?;
    Ok(optimize(&cards))
}

#[cfg(test)]
#[path = "tests/credit_score_tests.rs"]
mod tests;
