use shared::error::ErrorCode;

use super::*;
use crate::test_support::{account, context, date, seed_account};

fn card(name: &str, balance: f64, apr: Option<f64>, min_payment: Option<f64>) -> Account {
    let mut card = account(name, AccountType::CreditCard, Some(balance), Some(10000.0));
    card.apr = apr;
    card.min_payment = min_payment;
    card
}

#[test]
fn single_card_pays_off_with_its_minimum() {
    let start = date(2024, 1, 15);
    let cards = [card("Visa", 1000.0, Some(12.0), Some(100.0))];
    let plan = simulate(&cards, 0.0, PayoffOrder::Avalanche, start);
    assert_eq!(plan.strategy, "AVALANCHE");
    assert_eq!(plan.total_months, 11);
    assert_eq!(plan.payoff_date, date(2024, 12, 15));
    assert!(plan.total_interest > 50.0 && plan.total_interest < 60.0);
    assert_eq!(plan.total_paid, round_money(1000.0 + plan.total_interest));
    assert_eq!(plan.card_order[0].payoff_order, 1);
}

#[test]
fn strategies_order_cards_differently() {
    let start = date(2024, 1, 1);
    let cards = [
        card("Small", 500.0, Some(10.0), None),
        card("Pricey", 3000.0, Some(29.0), None),
        card("Zero", 0.0, Some(25.0), None),
    ];
    let plan = payoff_plan(&cards, 200.0, start);
    assert_eq!(plan.total_current_debt, 3500.0);
    let avalanche: Vec<_> = plan.avalanche.card_order.iter().map(|c| c.account_name.as_str()).collect();
    let snowball: Vec<_> = plan.snowball.card_order.iter().map(|c| c.account_name.as_str()).collect();
    assert_eq!(avalanche, ["Pricey", "Small"]);
    assert_eq!(snowball, ["Small", "Pricey"]);
    assert!(plan.avalanche.total_interest <= plan.snowball.total_interest);
}

#[test]
fn missing_apr_uses_the_default_rate() {
    let plan = simulate(&[card("Store", 1000.0, None, None)], 0.0, PayoffOrder::Snowball, date(2024, 1, 1));
    assert_eq!(plan.card_order[0].apr, DEFAULT_APR);
    assert_eq!(plan.card_order[0].min_payment, None);
}

#[test]
fn simulation_stops_at_the_cap() {
    let plan = simulate(
        &[card("Runaway", 50000.0, Some(30.0), Some(25.0))],
        0.0,
        PayoffOrder::Avalanche,
        date(2024, 1, 1),
    );
    assert_eq!(plan.total_months, MAX_MONTHS);
    assert_eq!(plan.payoff_date, date(2054, 1, 1));
}

#[test]
fn more_extra_never_takes_longer() {
    let cards = [
        card("A", 4000.0, Some(24.0), None),
        card("B", 1200.0, Some(18.0), None),
    ];
    let points = what_if_range(&cards, date(2024, 1, 1));
    assert_eq!(points.len(), WHAT_IF_EXTRAS.len());
    assert!(points
        .windows(2)
        .all(|w| w[1].avalanche_months <= w[0].avalanche_months));
}

#[tokio::test]
async fn endpoint_rejects_negative_extra() {
    let ctx = context().await;
    seed_account(&ctx, &card("Visa", 800.0, Some(20.0), None)).await;
    let plan = debt_payoff(&ctx, 100.0).await.expect("plan");
    assert_eq!(plan.avalanche.card_order.len(), 1);
    let err = debt_payoff(&ctx, -5.0).await.expect_err("negative");
    assert_eq!(err.code, ErrorCode::Validation);
    assert_eq!(what_if(&ctx).await.expect("what if").len(), 10);
}
