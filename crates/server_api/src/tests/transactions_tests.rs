use shared::{
    domain::{AccountType, TransactionType},
    error::ErrorCode,
};

use super::*;
use crate::test_support::{account, categorized, context, date, seed, seed_account, txn};

#[test]
fn page_bounds_clamp_size_and_page() {
    assert_eq!(page_bounds(None, None), PageBounds { page: 0, size: 50 });
    assert_eq!(page_bounds(Some(-3), Some(0)), PageBounds { page: 0, size: 1 });
    assert_eq!(page_bounds(Some(2), Some(10_000)), PageBounds { page: 2, size: 500 });

    let huge = page_bounds(Some(i64::MAX), Some(i64::MAX));
    assert!(huge.page.checked_mul(huge.size).is_some());
}

#[test]
fn last_page_is_zero_based() {
    assert_eq!(last_page(0, 10), 0);
    assert_eq!(last_page(1, 10), 0);
    assert_eq!(last_page(10, 10), 0);
    assert_eq!(last_page(11, 10), 1);
}

#[tokio::test]
async fn list_filters_and_pages_newest_first() {
    let ctx = context().await;
    let acct = account("Checking", AccountType::Checking, None, None);
    seed_account(&ctx, &acct).await;
    seed(
        &ctx,
        &[
            categorized(
                txn(Some(acct.id), date(2024, 1, 5), "Kroger", 80.0, TransactionType::Debit),
                "Groceries",
            ),
            categorized(
                txn(Some(acct.id), date(2024, 1, 9), "Whole Foods", 45.0, TransactionType::Debit),
                "Groceries",
            ),
            txn(Some(acct.id), date(2024, 1, 12), "Netflix", 15.49, TransactionType::Debit),
        ],
    )
    .await;

    let groceries = list_transactions(
        &ctx,
        TransactionFilter {
            category: Some("groceries".into()),
            ..TransactionFilter::default()
        },
    )
    .await
    .expect("list");
    assert_eq!(groceries.total_elements, 2);
    assert_eq!(groceries.content[0].merchant_name.as_deref(), Some("Whole Foods"));
    assert_eq!(groceries.content[0].account_name.as_deref(), Some("Checking"));

    let found = search_transactions(&ctx, "NETF".into(), None, None)
        .await
        .expect("search");
    assert_eq!(found.total_elements, 1);

    let capped = list_transactions(
        &ctx,
        TransactionFilter {
            min_amount: Some(40.0),
            max_amount: Some(50.0),
            size: Some(1),
            ..TransactionFilter::default()
        },
    )
    .await
    .expect("amount window");
    assert_eq!(capped.total_elements, 1);
    assert_eq!(capped.total_pages, 1);
    assert_eq!(capped.size, 1);
}

#[tokio::test]
async fn update_only_touches_present_fields() {
    let ctx = context().await;
    let row = categorized(
        txn(None, date(2024, 2, 1), "Shell", 40.0, TransactionType::Debit),
        "Gas",
    );
    seed(&ctx, std::slice::from_ref(&row)).await;

    let updated = update_transaction(
        &ctx,
        row.id,
        TransactionUpdate {
            notes: Some("road trip".into()),
            is_flagged: Some(true),
            ..TransactionUpdate::default()
        },
    )
    .await
    .expect("update");
    assert_eq!(updated.category.as_deref(), Some("Gas"));
    assert_eq!(updated.notes.as_deref(), Some("road trip"));

    let anomalies = list_anomalies(&ctx).await.expect("anomalies");
    assert_eq!(anomalies.len(), 1);

    let err = get_transaction(&ctx, Uuid::new_v4())
        .await
        .expect_err("missing");
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn bulk_categorize_skips_unknown_ids() {
    let ctx = context().await;
    let row = txn(None, date(2024, 2, 1), "Target", 25.0, TransactionType::Debit);
    seed(&ctx, std::slice::from_ref(&row)).await;

    let changed = bulk_categorize(
        &ctx,
        vec![
            CategoryAssignment {
                id: row.id,
                category: "Shopping".into(),
            },
            CategoryAssignment {
                id: Uuid::new_v4(),
                category: "Other".into(),
            },
        ],
    )
    .await
    .expect("bulk");
    assert_eq!(changed, 1);
    let stored = get_transaction(&ctx, row.id).await.expect("row");
    assert_eq!(stored.category.as_deref(), Some("Shopping"));
}
