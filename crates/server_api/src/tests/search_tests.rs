use shared::domain::{AccountType, TransactionType};

use super::*;
use crate::test_support::{account, categorized, context, date, seed, seed_account, txn};

#[tokio::test]
async fn blank_query_returns_nothing() {
    let ctx = context().await;
    let result = search_at(&ctx, Some("   ".into()), date(2024, 6, 1)).await.expect("blank");
    assert_eq!(result.total_results, 0);
    assert!(result.transactions.is_empty());
    let missing = search_at(&ctx, None, date(2024, 6, 1)).await.expect("missing");
    assert_eq!(missing.query, None);
}

#[tokio::test]
async fn query_matches_every_kind_of_record() {
    let ctx = context().await;
    let mut card = account("Sapphire", AccountType::CreditCard, Some(10.0), Some(100.0));
    card.institution = Some("Chase".into());
    seed_account(&ctx, &card).await;
    seed_account(&ctx, &account("Everyday", AccountType::Checking, Some(10.0), None)).await;

    let mut rows: Vec<_> = (1..=7)
        .map(|day| txn(None, date(2024, 5, day), "Chase Bank Fee", 5.0, TransactionType::Fee))
        .collect();
    rows.push(txn(None, date(2024, 5, 20), "Purchase Chase", 12.0, TransactionType::Debit));
    rows.push(categorized(
        txn(None, date(2024, 5, 21), "Target", 30.0, TransactionType::Debit),
        "Chasers",
    ));
    rows.push(txn(None, date(2022, 1, 1), "Old Chase Store", 40.0, TransactionType::Debit));
    seed(&ctx, &rows).await;

    let result = search_at(&ctx, Some(" CHASE ".into()), date(2024, 6, 1)).await.expect("search");
    assert_eq!(result.query.as_deref(), Some("CHASE"));
    assert_eq!(result.transactions.len(), 5);
    assert_eq!(result.transactions[0].merchant_name.as_deref(), Some("Target"));
    assert_eq!(result.accounts.len(), 1);
    assert_eq!(result.accounts[0].account.name, "Sapphire");
    assert_eq!(result.merchants, ["Purchase Chase"]);
    assert_eq!(result.total_results, 7);
}
