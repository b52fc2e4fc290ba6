use chrono::{Duration, Utc};
use shared::{
    domain::{AccountType, Subscription, SubscriptionFrequency, TransactionType},
    error::ErrorCode,
};

use super::*;
use crate::test_support::{account, categorized, context, date, seed, seed_account, txn};

async fn seed_month(ctx: &ApiContext) {
    let visa = account("Visa", AccountType::CreditCard, Some(500.0), Some(5000.0));
    let amex = account("Amex", AccountType::CreditCard, Some(200.0), Some(8000.0));
    seed_account(ctx, &visa).await;
    seed_account(ctx, &amex).await;

    let mut rows = vec![
        txn(None, date(2024, 5, 10), "Netflix", 15.0, TransactionType::Debit),
        txn(None, date(2024, 6, 10), "Netflix", 20.0, TransactionType::Debit),
        txn(Some(visa.id), date(2024, 6, 3), "Uber", 12.0, TransactionType::Debit),
        txn(Some(amex.id), date(2024, 6, 4), "Uber", 12.0, TransactionType::Debit),
        txn(None, date(2024, 3, 15), "ATM withdrawal fee", 25.0, TransactionType::Fee),
        categorized(txn(None, date(2023, 6, 12), "Chipotle", 200.0, TransactionType::Debit), "Dining"),
        categorized(txn(None, date(2024, 6, 5), "Chipotle", 300.0, TransactionType::Debit), "Dining"),
        categorized(txn(None, date(2024, 6, 15), "City Power", 150.0, TransactionType::Debit), "Utilities"),
    ];
    for month in 3..=5 {
        rows.push(categorized(
            txn(None, date(2024, month, 25), "City Power", 100.0, TransactionType::Debit),
            "Utilities",
        ));
    }
    seed(ctx, &rows).await;
}

#[tokio::test]
async fn every_rule_fires_once_then_is_suppressed() {
    let ctx = context().await;
    seed_month(&ctx).await;

    let summary = run_at(&ctx, date(2024, 6, 20)).await.expect("run");
    assert_eq!(summary.generated, 6);

    let insights = list_insights(&ctx).await.expect("list");
    let count = |kind: InsightType| insights.iter().filter(|i| i.insight_type == kind).count();
    assert_eq!(count(InsightType::PriceIncrease), 2);
    assert_eq!(count(InsightType::DuplicateCrossCard), 1);
    assert_eq!(count(InsightType::AtmFeeWaste), 1);
    assert_eq!(count(InsightType::CategoryYoySpike), 1);
    assert_eq!(count(InsightType::BillIncrease), 1);

    let netflix = insights
        .iter()
        .find(|i| i.merchant_name.as_deref() == Some("Netflix"))
        .expect("netflix");
    assert_eq!(netflix.impact_amount, Some(60.0));
    assert!(netflix.description.contains("33.3%"));
    let bill = insights
        .iter()
        .find(|i| i.insight_type == InsightType::BillIncrease)
        .expect("bill");
    assert_eq!(bill.category.as_deref(), Some("UTILITIES"));
    assert_eq!(bill.impact_amount, Some(600.0));

    let again = run_at(&ctx, date(2024, 6, 20)).await.expect("second run");
    assert_eq!(again.generated, 0);
}

#[tokio::test]
async fn subscription_creep_compares_with_last_year() {
    let ctx = context().await;
    let subscription = Subscription {
        id: Uuid::new_v4(),
        merchant_name: "Netflix".into(),
        normalized_name: Some("netflix".into()),
        amount: Some(10.0),
        frequency: Some(SubscriptionFrequency::Monthly),
        account_id: None,
        first_seen_date: None,
        last_charged_date: None,
        next_expected_date: None,
        times_charged: 2,
        annual_cost: Some(120.0),
        category: None,
        is_active: true,
        is_duplicate: false,
        duplicate_of: None,
        notes: None,
        created_at: Utc::now(),
    };
    ctx.storage.insert_subscription(&subscription).await.expect("subscription");
    seed(
        &ctx,
        &[
            txn(None, date(2023, 12, 5), "Netflix", 10.0, TransactionType::Debit),
            txn(None, date(2024, 1, 5), "Netflix", 80.0, TransactionType::Debit),
        ],
    )
    .await;

    let summary = run_at(&ctx, date(2024, 3, 1)).await.expect("run");
    assert_eq!(summary.generated, 1);
    let insights = list_insights(&ctx).await.expect("list");
    assert_eq!(insights[0].insight_type, InsightType::SubscriptionCreep);
    assert_eq!(insights[0].severity, InsightSeverity::Opportunity);
    assert_eq!(insights[0].impact_amount, Some(13.77));
}

#[tokio::test]
async fn stale_insights_are_purged() {
    let ctx = context().await;
    let mut stale = draft(
        InsightType::AtmFeeWaste,
        InsightSeverity::Info,
        "Old".into(),
        "Old news".into(),
        "Ignore",
    );
    stale.generated_at = Utc::now() - Duration::days(100);
    ctx.storage.insert_insight(&stale).await.expect("insert");
    assert_eq!(list_insights(&ctx).await.expect("before").len(), 1);

    let summary = run_at(&ctx, date(2024, 6, 20)).await.expect("run");
    assert_eq!(summary.generated, 0);
    assert!(list_insights(&ctx).await.expect("after").is_empty());
}

#[tokio::test]
async fn dismissed_insights_leave_the_list() {
    let ctx = context().await;
    seed_month(&ctx).await;
    run_at(&ctx, date(2024, 6, 20)).await.expect("run");
    let insights = list_insights(&ctx).await.expect("list");

    let dismissed = dismiss(&ctx, insights[0].id).await.expect("dismiss");
    assert_eq!(dismissed.id, insights[0].id);
    assert!(dismissed.is_dismissed);
    assert_eq!(list_insights(&ctx).await.expect("after").len(), insights.len() - 1);
    assert_eq!(ctx.storage.count_open_insights().await.expect("count"), 5);

    let err = dismiss(&ctx, Uuid::new_v4()).await.expect_err("unknown");
    assert_eq!(err.code, ErrorCode::NotFound);
}
