use shared::{domain::TransactionType, error::ErrorCode};

use super::*;
use crate::test_support::{categorized, context, date, seed, txn};

fn budget(category: &str, limit: f64) -> Budget {
    Budget {
        id: Uuid::new_v4(),
        category: category.to_string(),
        monthly_limit: limit,
        is_active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[test]
fn status_bands_and_projection() {
    let mid_june = date(2024, 6, 15);
    let green = budget_status(&budget("Dining", 400.0), 100.0, mid_june);
    assert_eq!(green.status, BudgetStatus::Green);
    assert_eq!(green.percent_used, 25.0);
    assert_eq!(green.projected_month_end, 200.0);

    let yellow = budget_status(&budget("Dining", 400.0), 320.0, mid_june);
    assert_eq!(yellow.status, BudgetStatus::Yellow);
    assert_eq!(yellow.percent_used, 80.0);

    let red = budget_status(&budget("Dining", 400.0), 400.0, mid_june);
    assert_eq!(red.status, BudgetStatus::Red);
    assert_eq!(red.percent_used, 100.0);

    let unlimited = budget_status(&budget("Misc", 0.0), 50.0, mid_june);
    assert_eq!(unlimited.percent_used, 0.0);
    assert_eq!(unlimited.status, BudgetStatus::Green);
}

#[tokio::test]
async fn list_orders_worst_first_and_matches_category_case_insensitively() {
    let ctx = context().await;
    let today = today();
    seed(
        &ctx,
        &[
            categorized(txn(None, today, "Chipotle", 450.0, TransactionType::Debit), "dining"),
            categorized(txn(None, today, "Shell", 85.0, TransactionType::Debit), "Gas"),
            categorized(txn(None, today, "Refund", 500.0, TransactionType::Credit), "Gas"),
        ],
    )
    .await;
    for (category, limit) in [("Gas", 100.0), ("Dining", 400.0), ("Books", 50.0)] {
        upsert_budget(
            &ctx,
            BudgetRequest {
                category: Some(category.into()),
                monthly_limit: Some(limit),
                is_active: None,
            },
        )
        .await
        .expect("budget");
    }

    let statuses = list_budgets(&ctx).await.expect("statuses");
    let order: Vec<_> = statuses.iter().map(|s| s.category.as_str()).collect();
    assert_eq!(order, ["Dining", "Gas", "Books"]);
    assert_eq!(statuses[0].actual_spend, 450.0);
    assert_eq!(statuses[1].status, BudgetStatus::Yellow);
    assert_eq!(statuses[2].actual_spend, 0.0);
}

#[tokio::test]
async fn upsert_replaces_the_limit_for_a_category() {
    let ctx = context().await;
    let first = upsert_budget(
        &ctx,
        BudgetRequest {
            category: Some("Groceries".into()),
            monthly_limit: Some(500.0),
            is_active: None,
        },
    )
    .await
    .expect("create");
    let second = upsert_budget(
        &ctx,
        BudgetRequest {
            category: Some("Groceries".into()),
            monthly_limit: Some(650.0),
            is_active: None,
        },
    )
    .await
    .expect("replace");
    assert_eq!(first.id, second.id);
    assert_eq!(second.monthly_limit, 650.0);

    let err = upsert_budget(&ctx, BudgetRequest::default())
        .await
        .expect_err("category required");
    assert_eq!(err.code, ErrorCode::Validation);

    let updated = update_budget(
        &ctx,
        first.id,
        BudgetRequest {
            is_active: Some(false),
            ..BudgetRequest::default()
        },
    )
    .await
    .expect("update");
    assert!(!updated.is_active);
    assert!(list_budgets(&ctx).await.expect("list").is_empty());

    delete_budget(&ctx, first.id).await.expect("delete");
    let err = delete_budget(&ctx, first.id).await.expect_err("gone");
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn check_raises_one_alert_per_band_per_day() {
    let ctx = context().await;
    let today = today();
    seed(
        &ctx,
        &[
            categorized(txn(None, today, "Chipotle", 120.0, TransactionType::Debit), "Dining"),
            categorized(txn(None, today, "Shell", 90.0, TransactionType::Debit), "Gas"),
        ],
    )
    .await;
    for (category, limit) in [("Dining", 100.0), ("Gas", 100.0)] {
        upsert_budget(
            &ctx,
            BudgetRequest {
                category: Some(category.into()),
                monthly_limit: Some(limit),
                is_active: None,
            },
        )
        .await
        .expect("budget");
    }

    assert_eq!(check_budgets(&ctx).await.expect("check"), 2);
    let alerts = ctx.storage.list_open_alerts(None).await.expect("alerts");
    let exceeded = alerts
        .iter()
        .find(|a| a.alert_type == AlertType::BudgetExceeded)
        .expect("exceeded");
    assert_eq!(exceeded.title, "Budget Exceeded: Dining");
    assert_eq!(
        exceeded.message,
        "Dining budget exceeded: $120.00 spent of $100.00 limit (120%)"
    );
    assert!(alerts.iter().any(|a| a.alert_type == AlertType::BudgetWarning));

    assert_eq!(check_budgets(&ctx).await.expect("again"), 0);
}
