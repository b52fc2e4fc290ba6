use shared::error::ErrorCode;

use super::*;
use crate::test_support::{account, context, date, seed_account};

fn asset_request(name: &str, kind: &str, class: &str, value: f64) -> ManualAssetRequest {
    ManualAssetRequest {
        name: Some(name.into()),
        asset_type: Some(kind.into()),
        asset_class: Some(class.into()),
        current_value: Some(value),
        notes: None,
    }
}

#[tokio::test]
async fn net_worth_combines_accounts_and_manual_assets() {
    let ctx = context().await;
    seed_account(&ctx, &account("Checking", AccountType::Checking, Some(5000.0), None)).await;
    seed_account(&ctx, &account("Savings", AccountType::Savings, Some(10000.0), None)).await;
    seed_account(&ctx, &account("Visa", AccountType::CreditCard, Some(2000.0), Some(10000.0))).await;
    create_asset(&ctx, asset_request("House", "asset", "real_estate", 300000.0))
        .await
        .expect("house");
    create_asset(&ctx, asset_request("Mortgage", "LIABILITY", "LOAN", 250000.0))
        .await
        .expect("mortgage");

    let response = get_net_worth(&ctx).await.expect("net worth");
    assert_eq!(response.liquid_assets, 15000.0);
    assert_eq!(response.credit_card_debt, 2000.0);
    assert_eq!(response.manual_assets_total, 300000.0);
    assert_eq!(response.manual_liabilities, 250000.0);
    assert_eq!(response.net_worth, 63000.0);
    assert_eq!(response.monthly_change, 0.0);
    assert_eq!(response.yearly_change, 0.0);
    assert_eq!(response.assets.len(), 2);
}

#[tokio::test]
async fn changes_are_measured_against_snapshots() {
    let ctx = context().await;
    let checking = account("Checking", AccountType::Checking, Some(1000.0), None);
    seed_account(&ctx, &checking).await;
    for month in 1..=12 {
        capture_snapshot_on(&ctx, date(2023, month, 1)).await.expect("snapshot");
    }
    let mut richer = checking.clone();
    richer.current_balance = Some(1600.0);
    ctx.storage.update_account(&richer).await.expect("update");

    let response = get_net_worth(&ctx).await.expect("net worth");
    assert_eq!(response.net_worth, 1600.0);
    assert_eq!(response.monthly_change, 600.0);
    assert_eq!(response.yearly_change, 600.0);
    assert_eq!(history(&ctx).await.expect("history").len(), 12);
}

#[tokio::test]
async fn snapshot_for_the_same_day_is_replaced() {
    let ctx = context().await;
    let checking = account("Checking", AccountType::Checking, Some(100.0), None);
    seed_account(&ctx, &checking).await;
    let day = date(2024, 3, 1);
    capture_snapshot_on(&ctx, day).await.expect("first");
    let mut updated = checking.clone();
    updated.current_balance = Some(250.0);
    ctx.storage.update_account(&updated).await.expect("update");
    let second = capture_snapshot_on(&ctx, day).await.expect("second");

    let snapshots = history(&ctx).await.expect("history");
    assert_eq!(snapshots.len(), 1);
    assert_eq!(second.net_worth, 250.0);
    assert_eq!(snapshots[0].net_worth, 250.0);
}

#[tokio::test]
async fn asset_crud_validates_enums() {
    let ctx = context().await;
    let err = create_asset(&ctx, asset_request("Boat", "THING", "VEHICLE", 1.0))
        .await
        .expect_err("unknown type");
    assert_eq!(err.code, ErrorCode::Validation);
    let err = create_asset(
        &ctx,
        ManualAssetRequest {
            current_value: None,
            ..asset_request("Boat", "ASSET", "VEHICLE", 1.0)
        },
    )
    .await
    .expect_err("missing value");
    assert_eq!(err.code, ErrorCode::Validation);

    let boat = create_asset(&ctx, asset_request("Boat", "ASSET", "vehicle", 12000.0))
        .await
        .expect("create");
    let updated = update_asset(
        &ctx,
        boat.id,
        ManualAssetRequest {
            current_value: Some(11000.0),
            ..ManualAssetRequest::default()
        },
    )
    .await
    .expect("update");
    assert_eq!(updated.name, "Boat");
    assert_eq!(updated.asset_class, AssetClass::Vehicle);
    assert_eq!(updated.current_value, 11000.0);

    delete_asset(&ctx, boat.id).await.expect("delete");
    let err = delete_asset(&ctx, boat.id).await.expect_err("gone");
    assert_eq!(err.code, ErrorCode::NotFound);
}
