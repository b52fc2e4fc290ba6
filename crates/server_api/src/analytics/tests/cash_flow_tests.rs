use chrono::Utc;
use shared::{domain::SubscriptionFrequency, error::ErrorCode};
use uuid::Uuid;

use super::*;
use crate::test_support::{account, context, date};

fn profile(income: Option<f64>, frequency: PayFrequency) -> FinancialProfile {
    FinancialProfile {
        id: Uuid::new_v4(),
        monthly_income: income,
        income_source: "MANUAL".into(),
        pay_frequency: frequency,
        emergency_fund_target_months: 6,
        notes: None,
        age: None,
        target_retirement_age: None,
        current_investments: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn subscription(name: &str, amount: f64, next: NaiveDate) -> Subscription {
    Subscription {
        id: Uuid::new_v4(),
        merchant_name: name.into(),
        normalized_name: Some(name.to_lowercase()),
        amount: Some(amount),
        frequency: Some(SubscriptionFrequency::Monthly),
        account_id: None,
        first_seen_date: None,
        last_charged_date: None,
        next_expected_date: Some(next),
        times_charged: 2,
        annual_cost: Some(amount * 12.0),
        category: None,
        is_active: true,
        is_duplicate: false,
        duplicate_of: None,
        notes: None,
        created_at: Utc::now(),
    }
}

#[test]
fn events_are_ordered_with_a_running_balance() {
    let first = date(2024, 2, 1);
    let mut card = account("Visa", AccountType::CreditCard, Some(3000.0), Some(9000.0));
    card.payment_due_day = Some(31);
    card.min_payment = Some(1200.0);
    let accounts = [
        account("Checking", AccountType::Checking, Some(1000.0), None),
        account("Savings", AccountType::Savings, Some(50000.0), None),
        card,
    ];
    let subs = [
        subscription("Netflix", 15.49, date(2024, 2, 10)),
        subscription("Spotify", 10.99, date(2024, 3, 10)),
    ];
    let response = project(first, &accounts, &profile(Some(3000.0), PayFrequency::Monthly), &subs);

    assert_eq!(response.starting_balance, 1000.0);
    let kinds: Vec<_> = response.events.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(kinds, ["INCOME", "SUBSCRIPTION", "PAYMENT"]);
    assert_eq!(response.events[0].running_balance, 4000.0);
    assert_eq!(response.events[1].running_balance, 3984.51);
    let payment = &response.events[2];
    assert_eq!(payment.date, date(2024, 2, 29));
    assert_eq!(payment.description, "Visa Payment");
    assert_eq!(payment.running_balance, 2784.51);
    assert!(!payment.is_danger_day);
}

#[test]
fn biweekly_pay_lands_every_fourteen_days() {
    let first = date(2024, 3, 1);
    let response = project(first, &[], &profile(Some(2600.0), PayFrequency::Biweekly), &[]);
    let days: Vec<_> = response.events.iter().map(|e| e.date).collect();
    assert_eq!(days, [date(2024, 3, 1), date(2024, 3, 15), date(2024, 3, 29)]);
    assert!(response.events.iter().all(|e| e.amount == 1200.0));
}

#[test]
fn low_balance_days_are_flagged() {
    let first = date(2024, 4, 1);
    let mut card = account("Visa", AccountType::CreditCard, Some(900.0), Some(2000.0));
    card.payment_due_day = Some(5);
    let accounts = [account("Checking", AccountType::Checking, Some(510.0), None), card];
    let response = project(first, &accounts, &profile(None, PayFrequency::Monthly), &[]);
    assert_eq!(response.events.len(), 1);
    assert_eq!(response.events[0].amount, -25.0);
    assert!(response.events[0].is_danger_day);
}

#[tokio::test]
async fn invalid_month_is_rejected() {
    let ctx = context().await;
    let err = cash_flow(&ctx, 2024, 13).await.expect_err("month 13");
    assert_eq!(err.code, ErrorCode::Validation);
    let empty = cash_flow(&ctx, 2024, 5).await.expect("empty");
    assert!(empty.events.is_empty());
}
