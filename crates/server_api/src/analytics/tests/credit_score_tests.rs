use super::*;
use crate::test_support::account;

#[test]
fn score_bands_follow_utilization() {
    assert_eq!(estimate_score(0.5), 800);
    assert_eq!(estimate_score(10.0), 780);
    assert_eq!(estimate_score(25.0), 740);
    assert_eq!(estimate_score(45.0), 690);
    assert_eq!(estimate_score(70.0), 660);
    assert_eq!(estimate_score(95.0), 650);
    assert_eq!(utilization_impact(8.0), "EXCELLENT");
    assert_eq!(utilization_impact(30.0), "GOOD");
    assert_eq!(utilization_impact(50.0), "FAIR");
    assert_eq!(utilization_impact(50.1), "POOR");
}

#[test]
fn high_utilization_card_gets_paydown_advice() {
    let cards = [
        account("Freedom", AccountType::CreditCard, Some(4000.0), Some(5000.0)),
        account("Sapphire", AccountType::CreditCard, Some(500.0), Some(5000.0)),
    ];
    let response = optimize(&cards);
    assert_eq!(response.estimated_score, 690);
    assert_eq!(response.utilization_impact, "FAIR");
    assert_eq!(response.cards.len(), 2);
    assert_eq!(response.cards[0].utilization_pct, 80.0);
    assert_eq!(response.cards[0].recommended_payment, 2500.0);
    assert_eq!(response.cards[1].recommended_payment, 0.0);
    assert!(response.recommendations[0].starts_with("Focus first on Freedom"));
    assert!(response
        .recommendations
        .iter()
        .any(|r| r == "Pay $2500.00 on Freedom to reduce utilization from 80.0% to 30%"));

    assert_eq!(response.what_if_scenarios.len(), 1);
    let scenario = &response.what_if_scenarios[0];
    assert_eq!(scenario.new_utilization_pct, 20.0);
    assert_eq!(scenario.estimated_score_impact, 50);
}

#[test]
fn low_utilization_is_praised() {
    let cards = [account("Visa", AccountType::CreditCard, Some(100.0), Some(10000.0))];
    let response = optimize(&cards);
    assert_eq!(response.estimated_score, 800);
    assert!(response.recommendations.iter().any(|r| r.starts_with("Great job")));
    assert!(response
        .recommendations
        .last()
        .is_some_and(|r| r.contains("statement closing date")));
}

#[test]
fn cards_without_a_limit_are_skipped() {
    let cards = [account("Charge", AccountType::CreditCard, Some(900.0), None)];
    let response = optimize(&cards);
    assert!(response.cards.is_empty());
    assert_eq!(response.estimated_score, 800);
}
