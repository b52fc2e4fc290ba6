use shared::{domain::TransactionType, error::ErrorCode};

use super::*;
use crate::test_support::{account, context, date, seed, seed_account, txn};

#[test]
fn response_derives_utilization_available_credit_and_promo_days() {
    let mut card = account("Visa", AccountType::CreditCard, Some(1500.0), Some(5000.0));
    card.promo_apr_end_date = Some(date(2024, 7, 1));
    let response = account_response(card, date(2024, 6, 1));
    assert_eq!(response.utilization_percent, Some(30.0));
    assert_eq!(response.account.available_credit, Some(3500.0));
    assert_eq!(response.days_until_promo_apr_expiry, Some(30));

    let checking = account_response(
        account("Checking", AccountType::Checking, Some(900.0), None),
        date(2024, 6, 1),
    );
    assert_eq!(checking.utilization_percent, None);
    assert_eq!(checking.account.available_credit, None);

    let zero_limit = account_response(
        account("Odd", AccountType::CreditCard, Some(10.0), Some(0.0)),
        date(2024, 6, 1),
    );
    assert_eq!(zero_limit.utilization_percent, None);
}

#[tokio::test]
async fn available_credit_follows_the_latest_balance() {
    let ctx = context().await;
    let card = create_account(
        &ctx,
        AccountRequest {
            name: Some("Freedom".into()),
            account_type: Some(AccountType::CreditCard),
            credit_limit: Some(5000.0),
            current_balance: Some(1000.0),
            available_credit: Some(4000.0),
            ..AccountRequest::default()
        },
    )
    .await
    .expect("create");
    assert_eq!(card.account.available_credit, Some(4000.0));

    let updated = update_account(
        &ctx,
        card.account.id,
        AccountRequest {
            current_balance: Some(2500.0),
            ..AccountRequest::default()
        },
    )
    .await
    .expect("update");
    assert_eq!(updated.account.available_credit, Some(2500.0));
    assert_eq!(
        get_account(&ctx, card.account.id).await.expect("get").account.available_credit,
        Some(2500.0)
    );
}

#[tokio::test]
async fn create_requires_name_and_update_is_partial() {
    let ctx = context().await;
    let err = create_account(&ctx, AccountRequest::default())
        .await
        .expect_err("missing name");
    assert_eq!(err.code, ErrorCode::Validation);

    let created = create_account(
        &ctx,
        AccountRequest {
            name: Some("Sapphire".into()),
            account_type: Some(AccountType::CreditCard),
            credit_limit: Some(10000.0),
            current_balance: Some(2500.0),
            apr: Some(21.49),
            ..AccountRequest::default()
        },
    )
    .await
    .expect("create");
    assert_eq!(created.utilization_percent, Some(25.0));

    let updated = update_account(
        &ctx,
        created.account.id,
        AccountRequest {
            current_balance: Some(5000.0),
            ..AccountRequest::default()
        },
    )
    .await
    .expect("update");
    assert_eq!(updated.account.name, "Sapphire");
    assert_eq!(updated.account.apr, Some(21.49));
    assert_eq!(updated.utilization_percent, Some(50.0));
}

#[tokio::test]
async fn deleted_accounts_leave_the_active_list() {
    let ctx = context().await;
    let acct = account("Old", AccountType::Checking, Some(10.0), None);
    seed_account(&ctx, &acct).await;
    delete_account(&ctx, acct.id).await.expect("delete");
    assert!(list_accounts(&ctx).await.expect("list").is_empty());

    let err = delete_account(&ctx, Uuid::new_v4())
        .await
        .expect_err("unknown");
    assert_eq!(err.code, ErrorCode::NotFound);
}

#[tokio::test]
async fn account_transactions_are_paged() {
    let ctx = context().await;
    let acct = account("Checking", AccountType::Checking, None, None);
    seed_account(&ctx, &acct).await;
    let rows: Vec<_> = (1..=5)
        .map(|d| txn(Some(acct.id), date(2024, 3, d), "Shop", 10.0, TransactionType::Debit))
        .collect();
    seed(&ctx, &rows).await;

    let page = account_transactions(&ctx, acct.id, Some(1), Some(2))
        .await
        .expect("page");
    assert_eq!(page.total_elements, 5);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.content.len(), 2);
    assert_eq!(page.content[0].transaction_date, date(2024, 3, 3));
}

#[tokio::test]
async fn capture_balances_snapshots_and_warns_on_low_cash() {
    let ctx = context().await;
    seed_account(&ctx, &account("Checking", AccountType::Checking, Some(320.5), None)).await;
    seed_account(&ctx, &account("Visa", AccountType::CreditCard, Some(100.0), Some(1000.0))).await;
    seed_account(&ctx, &account("Unknown", AccountType::Savings, None, None)).await;

    let captured = capture_balances(&ctx).await.expect("capture");
    assert_eq!(captured, 2);

    let alerts = ctx.storage.list_open_alerts(None).await.expect("alerts");
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].title, "Low Balance: Checking");
    assert_eq!(alerts[0].severity, AlertSeverity::High);
    assert!(alerts[0].message.contains("$320.50"));

    // A second capture on the same day overwrites rather than duplicating.
    capture_balances(&ctx).await.expect("recapture");
    let accounts = ctx.storage.list_active_accounts().await.expect("accounts");
    let checking = accounts.iter().find(|a| a.name == "Checking").expect("checking");
    let history = balance_history(&ctx, checking.id, Some(3))
        .await
        .expect("history");
    assert_eq!(history.len(), 1);
}
