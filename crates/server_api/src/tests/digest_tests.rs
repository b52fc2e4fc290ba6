use shared::domain::{AccountType, TransactionType};

use super::*;
use crate::test_support::{account, categorized, context, date, seed, seed_account, txn};

fn card(name: &str, due_day: u32) -> Account {
    let mut card = account(name, AccountType::CreditCard, Some(250.0), Some(1000.0));
    card.payment_due_day = Some(due_day);
    card
}

#[test]
fn only_payments_due_this_week_are_listed() {
    let today = date(2024, 6, 20);
    let accounts = [
        card("Soon", 25),
        card("Passed", 10),
        card("Month end", 31),
        account("Checking", AccountType::Checking, Some(1.0), None),
    ];
    let due = payments_due_within_week(&accounts, today);
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].account, "Soon");
    assert_eq!(due[0].due_date, date(2024, 6, 25));

    let rollover = payments_due_within_week(&[card("Early", 2)], date(2024, 1, 30));
    assert_eq!(rollover[0].due_date, date(2024, 2, 2));
}

#[tokio::test]
async fn digest_compares_the_week_with_the_one_before() {
    let ctx = context().await;
    seed_account(&ctx, &card("Visa", 25)).await;
    let mut rows: Vec<_> = (0..6)
        .map(|i| {
            let category = if i % 2 == 0 { "Dining" } else { "Groceries" };
            categorized(
                txn(None, date(2024, 6, 14 + i), "Shop", f64::from(i + 1) * 10.0, TransactionType::Debit),
                category,
            )
        })
        .collect();
    rows.push(txn(None, date(2024, 6, 10), "Shop", 100.0, TransactionType::Debit));
    rows.push(txn(None, date(2024, 6, 18), "Refund", 500.0, TransactionType::Credit));
    seed(&ctx, &rows).await;

    let digest = weekly_digest_at(&ctx, date(2024, 6, 20)).await.expect("digest");
    assert_eq!(digest.week_start, date(2024, 6, 14));
    assert_eq!(digest.week_end, date(2024, 6, 20));
    assert_eq!(digest.total_spend, 210.0);
    assert_eq!(digest.prior_week_spend, 100.0);
    assert_eq!(digest.spending_change_percent, 110.0);

    let amounts: Vec<_> = digest.top_transactions.iter().map(|t| t.amount).collect();
    assert_eq!(amounts, [60.0, 50.0, 40.0, 30.0, 20.0]);
    assert_eq!(digest.category_breakdown[0].category, "Groceries");
    assert_eq!(digest.category_breakdown[0].amount, 120.0);
    assert_eq!(digest.upcoming_payments.len(), 1);
    assert!(digest.budget_statuses.is_empty());
    assert_eq!(digest.unread_insight_count, 0);
}
