use shared::error::ErrorCode;

use super::*;
use crate::test_support::{account, categorized, context, seed, seed_account, txn};

fn request(name: &str, rule_type: &str, threshold: f64) -> AlertRuleRequest {
    AlertRuleRequest {
        name: Some(name.into()),
        rule_type: Some(rule_type.into()),
        threshold_amount: Some(threshold),
        ..AlertRuleRequest::default()
    }
}

#[tokio::test]
async fn create_validates_type_and_defaults_operator() {
    let ctx = context().await;
    let err = create_rule(&ctx, request("bad", "SOMETHING_ELSE", 1.0))
        .await
        .expect_err("unknown type");
    assert_eq!(err.code, ErrorCode::Validation);

    let err = create_rule(
        &ctx,
        AlertRuleRequest {
            rule_type: Some("BALANCE_BELOW".into()),
            ..AlertRuleRequest::default()
        },
    )
    .await
    .expect_err("missing name");
    assert_eq!(err.code, ErrorCode::Validation);

    let rule = create_rule(&ctx, request("Low cash", "balance_below", 100.0))
        .await
        .expect("create");
    assert_eq!(rule.rule_type, AlertRuleType::BalanceBelow);
    assert_eq!(rule.condition_operator, "GREATER_THAN");

    let updated = update_rule(
        &ctx,
        rule.id,
        AlertRuleRequest {
            threshold_amount: Some(250.0),
            ..AlertRuleRequest::default()
        },
    )
    .await
    .expect("update");
    assert_eq!(updated.name, "Low cash");
    assert_eq!(updated.threshold_amount, Some(250.0));
}

#[tokio::test]
async fn rules_fire_once_per_day() {
    let ctx = context().await;
    let today = today();
    seed_account(&ctx, &account("Checking", AccountType::Checking, Some(80.0), None)).await;
    seed_account(
        &ctx,
        &account("Visa", AccountType::CreditCard, Some(900.0), Some(1000.0)),
    )
    .await;
    seed(
        &ctx,
        &[
            txn(None, today, "Best Buy", 700.0, TransactionType::Debit),
            categorized(txn(None, today, "Chipotle", 60.0, TransactionType::Debit), "Dining"),
        ],
    )
    .await;

    create_rule(&ctx, request("Big purchase", "TRANSACTION_AMOUNT", 500.0))
        .await
        .expect("rule");
    create_rule(&ctx, request("Low cash", "BALANCE_BELOW", 100.0))
        .await
        .expect("rule");
    create_rule(&ctx, request("Maxed", "UTILIZATION_ABOVE", 80.0))
        .await
        .expect("rule");
    let mut dining = request("Dining cap", "MONTHLY_CATEGORY_SPEND", 50.0);
    dining.category = Some("dining".into());
    create_rule(&ctx, dining).await.expect("rule");
    create_rule(&ctx, request("Quiet", "BALANCE_BELOW", 10.0))
        .await
        .expect("rule");

    let fired = evaluate_rules(&ctx).await.expect("evaluate");
    assert_eq!(fired, 4);

    let alerts = ctx.storage.list_open_alerts(None).await.expect("alerts");
    let titles: Vec<_> = alerts.iter().map(|a| a.title.as_str()).collect();
    assert!(titles.contains(&"Custom Rule: Big purchase"));
    assert!(titles.contains(&"Custom Rule: Maxed"));
    let maxed = alerts
        .iter()
        .find(|a| a.title == "Custom Rule: Maxed")
        .expect("maxed");
    assert_eq!(
        maxed.message,
        "Credit utilization (90.0%) exceeded your 80% alert threshold."
    );

    assert_eq!(evaluate_rules(&ctx).await.expect("again"), 0);
}
