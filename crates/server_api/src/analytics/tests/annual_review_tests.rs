use std::sync::Arc;

use super::*;
use crate::{
    networth::capture_snapshot_on,
    test_support::{
        account, categorized, context, context_with_llm, date, seed, seed_account, txn, CannedLlm,
    },
};
use shared::domain::AccountType;

#[test]
fn numbered_lines_are_extracted() {
    let reply = "Here you go:\n1. Cut dining out by $100.\n2.Cancel unused streaming\n\n3. \n4. Ignored";
    assert_eq!(
        parse_recommendations(reply),
        ["Cut dining out by $100.", "Cancel unused streaming"]
    );
    assert!(parse_recommendations("no numbers here").is_empty());
}

async fn seed_year(ctx: &ApiContext) {
    seed(
        ctx,
        &[
            categorized(txn(None, date(2023, 2, 1), "Whole Foods", 400.0, TransactionType::Debit), "Groceries"),
            categorized(txn(None, date(2023, 7, 9), "Chipotle", 100.0, TransactionType::Debit), "Dining"),
            txn(None, date(2023, 3, 1), "Interest charge", 35.5, TransactionType::Interest),
            txn(None, date(2023, 4, 1), "Late fee", 29.0, TransactionType::Fee),
            txn(None, date(2024, 1, 2), "Whole Foods", 999.0, TransactionType::Debit),
        ],
    )
    .await;
}

#[tokio::test]
async fn review_totals_the_year_and_falls_back_without_llm() {
    let ctx = context().await;
    seed_year(&ctx).await;
    ctx.storage
        .update_profile(&{
            let mut profile = ctx.storage.get_or_create_profile().await.expect("profile");
            profile.monthly_income = Some(1000.0);
            profile
        })
        .await
        .expect("income");

    let review = annual_review(&ctx, 2023).await.expect("review");
    assert_eq!(review.total_spending, 500.0);
    assert_eq!(review.estimated_income, 12000.0);
    assert_eq!(review.savings_rate, 95.83);
    assert_eq!(review.interest_paid, 35.5);
    assert_eq!(review.fees_paid, 29.0);
    assert_eq!(review.category_breakdown.len(), 2);
    assert_eq!(review.category_breakdown[0].category, "Groceries");
    assert_eq!(review.ai_recommendations, FALLBACK_RECOMMENDATIONS);
    assert_eq!(review.net_worth_change, 0.0);
}

#[tokio::test]
async fn review_uses_llm_recommendations_and_snapshots() {
    let llm = Arc::new(CannedLlm {
        reply: Some("1. Spend less on groceries\n2. Build a buffer\n3. Refinance".into()),
        ..CannedLlm::default()
    });
    let ctx = context_with_llm(llm.clone()).await;
    seed_year(&ctx).await;
    let checking = account("Checking", AccountType::Checking, Some(1000.0), None);
    seed_account(&ctx, &checking).await;
    capture_snapshot_on(&ctx, date(2023, 1, 1)).await.expect("january");
    let mut richer = checking.clone();
    richer.current_balance = Some(4000.0);
    ctx.storage.update_account(&richer).await.expect("update");
    capture_snapshot_on(&ctx, date(2023, 12, 1)).await.expect("december");

    let review = annual_review(&ctx, 2023).await.expect("review");
    assert_eq!(review.ai_recommendations.len(), 3);
    assert_eq!(review.ai_recommendations[2], "Refinance");
    assert_eq!(review.net_worth_change, 3000.0);
    let prompts = llm.prompts.lock().expect("prompts");
    assert!(prompts[0].contains("Groceries: $400.00"));
}
