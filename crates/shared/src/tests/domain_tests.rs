use super::*;
use std::str::FromStr;

#[test]
fn enums_round_trip_through_wire_names() {
    assert_eq!(AccountType::CreditCard.as_str(), "CREDIT_CARD");
    assert_eq!(
        AccountType::from_str("credit_card").expect("parse"),
        AccountType::CreditCard
    );
    let json = serde_json::to_string(&StatementStatus::Processing).expect("json");
    assert_eq!(json, "\"PROCESSING\"");
}

#[test]
fn unknown_variant_names_the_enum() {
    let err = AssetClass::from_str("yacht").expect_err("should fail");
    assert_eq!(err.kind, "AssetClass");
    assert!(err.to_string().contains("yacht"));
}

#[test]
fn statement_reprocess_only_after_settling() {
    assert!(!StatementStatus::Pending.can_reprocess());
    assert!(!StatementStatus::Processing.can_reprocess());
    assert!(StatementStatus::Completed.can_reprocess());
    assert!(StatementStatus::Failed.can_reprocess());
    assert!(StatementStatus::Pending.can_transition_to(StatementStatus::Processing));
    assert!(!StatementStatus::Pending.can_transition_to(StatementStatus::Completed));
    assert!(!StatementStatus::Completed.can_transition_to(StatementStatus::Processing));
}

#[test]
fn budget_status_bands() {
    assert_eq!(BudgetStatus::from_percent_used(0.0), BudgetStatus::Green);
    assert_eq!(BudgetStatus::from_percent_used(79.99), BudgetStatus::Green);
    assert_eq!(BudgetStatus::from_percent_used(80.0), BudgetStatus::Yellow);
    assert_eq!(BudgetStatus::from_percent_used(99.9), BudgetStatus::Yellow);
    assert_eq!(BudgetStatus::from_percent_used(100.0), BudgetStatus::Red);
}

#[test]
fn subscription_costs_normalize_by_frequency() {
    assert_eq!(SubscriptionFrequency::Quarterly.monthly_cost(30.0), 10.0);
    assert_eq!(SubscriptionFrequency::Annual.annual_cost(120.0), 120.0);
    assert_eq!(SubscriptionFrequency::Weekly.annual_cost(10.0), 520.0);
    assert!((SubscriptionFrequency::Weekly.monthly_cost(10.0) - 43.3).abs() < 1e-9);
}

#[test]
fn percent_rounds_ratio_before_scaling() {
    assert_eq!(percent_of(1500.0, 5000.0), Some(30.0));
    assert_eq!(percent_of(1.0, 3.0), Some(33.33));
    assert_eq!(percent_of(10.0, 0.0), None);
    assert_eq!(round_money(2.005_000_1), 2.01);
}
