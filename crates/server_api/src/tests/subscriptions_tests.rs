use shared::domain::AccountType;

use super::*;
use crate::test_support::{account, context, date, seed, seed_account, txn};

#[test]
fn rough_normalize_strips_suffixes_and_punctuation() {
    assert_eq!(rough_normalize("SQ *BLUE BOTTLE #12"), "sq");
    assert_eq!(rough_normalize("Gym-Co  Monthly!!"), "gymco monthly");
    assert_eq!(rough_normalize("  "), "");
}

#[test]
fn frequency_follows_mean_gap() {
    let monthly = [date(2024, 1, 3), date(2024, 2, 3), date(2024, 3, 4)];
    assert_eq!(detect_frequency(&monthly), Some(SubscriptionFrequency::Monthly));
    let weekly = [date(2024, 1, 1), date(2024, 1, 8)];
    assert_eq!(detect_frequency(&weekly), Some(SubscriptionFrequency::Weekly));
    let quarterly = [date(2024, 1, 1), date(2024, 4, 1)];
    assert_eq!(detect_frequency(&quarterly), Some(SubscriptionFrequency::Quarterly));
    let annual = [date(2023, 1, 1), date(2024, 1, 1)];
    assert_eq!(detect_frequency(&annual), Some(SubscriptionFrequency::Annual));
    let erratic = [date(2024, 1, 1), date(2024, 1, 20)];
    assert_eq!(detect_frequency(&erratic), None);
    assert_eq!(detect_frequency(&[date(2024, 1, 1)]), None);
}

#[test]
fn amounts_must_stay_within_ten_percent() {
    assert!(is_consistent_amount(&[10.0, 10.5, 9.6]));
    assert!(!is_consistent_amount(&[10.0, 14.0]));
    assert!(!is_consistent_amount(&[0.0, 0.0]));
}

#[test]
fn known_services_match_description_too() {
    let mut t = txn(None, date(2024, 1, 1), "PAYPAL", 9.99, TransactionType::Debit);
    t.description = Some("PAYPAL *SPOTIFY USA".into());
    assert_eq!(
        match_known_service(&t).map(|s| s.display_name),
        Some("Spotify")
    );
}

#[tokio::test]
async fn detect_all_finds_known_and_recurring_and_marks_duplicates() {
    let ctx = context().await;
    let visa = account("Visa", AccountType::CreditCard, None, None);
    let amex = account("Amex", AccountType::CreditCard, None, None);
    seed_account(&ctx, &visa).await;
    seed_account(&ctx, &amex).await;
    seed(
        &ctx,
        &[
            txn(Some(visa.id), date(2024, 1, 15), "NETFLIX.COM", 15.49, TransactionType::Debit),
            txn(Some(visa.id), date(2024, 2, 15), "NETFLIX.COM", 15.49, TransactionType::Debit),
            txn(Some(amex.id), date(2024, 1, 20), "Netflix", 15.49, TransactionType::Debit),
            txn(Some(visa.id), date(2024, 1, 2), "IRON GYM", 40.0, TransactionType::Debit),
            txn(Some(visa.id), date(2024, 2, 1), "IRON GYM", 41.0, TransactionType::Debit),
            txn(Some(visa.id), date(2024, 3, 2), "IRON GYM", 40.0, TransactionType::Debit),
            txn(Some(visa.id), date(2024, 3, 5), "REFUND NETFLIX", 15.49, TransactionType::Credit),
        ],
    )
    .await;

    let summary = detect_all(&ctx).await.expect("detect");
    let subs = list_subscriptions(&ctx).await.expect("list");
    let names: Vec<_> = subs
        .iter()
        .filter_map(|s| s.normalized_name.as_deref())
        .collect();
    assert!(names.contains(&"netflix"));
    assert!(names.contains(&"iron gym"));

    let gym = subs
        .iter()
        .find(|s| s.normalized_name.as_deref() == Some("iron gym"))
        .expect("gym");
    assert_eq!(gym.frequency, Some(SubscriptionFrequency::Monthly));
    assert_eq!(gym.amount, Some(40.33));
    assert_eq!(gym.times_charged, 3);
    assert_eq!(gym.next_expected_date, Some(date(2024, 4, 2)));
    assert_eq!(gym.category.as_deref(), Some("Subscriptions"));

    let duplicates = list_duplicates(&ctx).await.expect("duplicates");
    assert_eq!(duplicates.len(), 1);
    assert_eq!(duplicates[0].normalized_name.as_deref(), Some("netflix"));
    assert!(duplicates[0].duplicate_of.is_some());
    assert_eq!(summary.detected as usize, subs.len());

    // Rerunning starts from scratch rather than piling up records.
    let again = detect_all(&ctx).await.expect("detect again");
    assert_eq!(again.detected, summary.detected);
}

#[tokio::test]
async fn update_toggles_active_and_notes() {
    let ctx = context().await;
    seed(
        &ctx,
        &[txn(None, date(2024, 1, 5), "Spotify", 11.99, TransactionType::Debit)],
    )
    .await;
    let rows = ctx
        .storage
        .find_transactions(&TransactionQuery::default(), None, 0)
        .await
        .expect("rows");
    detect_for_account(&ctx, None, &rows).await.expect("detect");
    let sub = list_subscriptions(&ctx).await.expect("list").remove(0);

    let updated = update_subscription(
        &ctx,
        sub.id,
        SubscriptionUpdate {
            is_active: Some(false),
            notes: Some("shared with family".into()),
        },
    )
    .await
    .expect("update");
    assert!(!updated.is_active);
    assert!(list_subscriptions(&ctx).await.expect("list").is_empty());
}
