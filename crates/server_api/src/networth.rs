use chrono::{NaiveDate, Utc};
use shared::{
    domain::{round_money, Account, AccountType, AssetClass, AssetType, ManualAsset, NetWorthSnapshot},
    error::ApiError,
    protocol::{ManualAssetRequest, NetWorthResponse},
};
use tracing::info;
use uuid::Uuid;

use crate::{internal, parse_enum, required, required_text, today, ApiContext};

const HISTORY_LENGTH: i64 = 12;

/// Point-in-time totals that make up net worth.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NetWorthTotals {
    pub liquid_assets: f64,
    pub credit_card_debt: f64,
    pub manual_assets: f64,
    pub manual_liabilities: f64,
}

impl NetWorthTotals {
    pub fn compute(accounts: &[Account], assets: &[ManualAsset]) -> Self {
        let mut totals = Self::default();
        for account in accounts {
            let Some(balance) = account.current_balance else {
                continue;
            };
            match account.account_type {
                AccountType::Checking | AccountType::Savings => totals.liquid_assets += balance,
                AccountType::CreditCard => totals.credit_card_debt += balance,
                AccountType::Loan => {}
            }
        }
        for asset in assets {
            match asset.asset_type {
                AssetType::Asset => totals.manual_assets += asset.current_value,
                AssetType::Liability => totals.manual_liabilities += asset.current_value,
            }
        }
        totals
    }

    pub fn net_worth(&self) -> f64 {
        round_money(
            self.liquid_assets - self.credit_card_debt + self.manual_assets
                - self.manual_liabilities,
        )
    }
}

pub(crate) async fn current_totals(ctx: &ApiContext) -> Result<(NetWorthTotals, Vec<ManualAsset>), ApiError> {
    let accounts = ctx.storage.list_active_accounts().await.map_err(internal)?;
    let assets = ctx.storage.list_manual_assets().await.map_err(internal)?;
    Ok((NetWorthTotals::compute(&accounts, &assets), assets))
}

pub async fn get_net_worth(ctx: &ApiContext) -> Result<NetWorthResponse, ApiError> {
    let (totals, assets) = current_totals(ctx).await?;
    let net_worth = totals.net_worth();
    let history = ctx
        .storage
        .recent_net_worth_snapshots(HISTORY_LENGTH)
        .await
        .map_err(internal)?;
    let monthly_change = history
        .first()
        .map(|latest| round_money(net_worth - latest.net_worth))
        .unwrap_or(0.0);
    let yearly_change = match history.last() {
        Some(oldest) if history.len() as i64 >= HISTORY_LENGTH => {
            round_money(net_worth - oldest.net_worth)
        }
        _ => 0.0,
    };
    Ok(NetWorthResponse {
        net_worth,
        liquid_assets: round_money(totals.liquid_assets),
        credit_card_debt: round_money(totals.credit_card_debt),
        manual_assets_total: round_money(totals.manual_assets),
        manual_liabilities: round_money(totals.manual_liabilities),
        monthly_change,
        yearly_change,
        assets,
    })
}

/// Newest first.
pub async fn history(ctx: &ApiContext) -> Result<Vec<NetWorthSnapshot>, ApiError> {
    ctx.storage
        .recent_net_worth_snapshots(HISTORY_LENGTH)
        .await
        .map_err(internal)
}

pub async fn capture_snapshot(ctx: &ApiContext) -> Result<NetWorthSnapshot, ApiError> {
    capture_snapshot_on(ctx, today()).await
}

/// Records the current totals under `date`, replacing a snapshot already taken that day.
pub(crate) async fn capture_snapshot_on(
    ctx: &ApiContext,
    date: NaiveDate,
) -> Result<NetWorthSnapshot, ApiError> {
    let (totals, _) = current_totals(ctx).await?;
    let snapshot = NetWorthSnapshot {
        id: Uuid::new_v4(),
        snapshot_date: date,
        liquid_assets: round_money(totals.liquid_assets),
        credit_card_debt: round_money(totals.credit_card_debt),
        manual_assets: round_money(totals.manual_assets),
        manual_liabilities: round_money(totals.manual_liabilities),
        net_worth: totals.net_worth(),
        created_at: Utc::now(),
    };
    let stored = ctx
        .storage
        .upsert_net_worth_snapshot(&snapshot)
        .await
        .map_err(internal)?;
    info!(date = %stored.snapshot_date, net_worth = stored.net_worth, "net worth snapshot captured");
    Ok(stored)
}

pub async fn list_assets(ctx: &ApiContext) -> Result<Vec<ManualAsset>, ApiError> {
    ctx.storage.list_manual_assets().await.map_err(internal)
}

pub async fn create_asset(
    ctx: &ApiContext,
    request: ManualAssetRequest,
) -> Result<ManualAsset, ApiError> {
    let name = required_text(request.name, "name")?;
    let asset_type: AssetType = parse_enum(&required(request.asset_type, "assetType")?)?;
    let asset_class: AssetClass = parse_enum(&required(request.asset_class, "assetClass")?)?;
    let current_value = required(request.current_value, "currentValue")?;
    let now = Utc::now();
    let asset = ManualAsset {
        id: Uuid::new_v4(),
        name,
        asset_type,
        asset_class,
        current_value,
        notes: request.notes,
        created_at: now,
        updated_at: now,
    };
    ctx.storage.insert_manual_asset(&asset).await.map_err(internal)?;
    Ok(asset)
}

pub async fn update_asset(
    ctx: &ApiContext,
    asset_id: Uuid,
    request: ManualAssetRequest,
) -> Result<ManualAsset, ApiError> {
    let mut asset = ctx
        .storage
        .get_manual_asset(asset_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("ManualAsset", asset_id))?;
    if let Some(name) = request.name.filter(|n| !n.trim().is_empty()) {
        asset.name = name.trim().to_string();
    }
    if let Some(value) = request.current_value {
        asset.current_value = value;
    }
    if request.notes.is_some() {
        asset.notes = request.notes;
    }
    if let Some(raw) = request.asset_type.as_deref() {
        asset.asset_type = parse_enum(raw)?;
    }
    if let Some(raw) = request.asset_class.as_deref() {
        asset.asset_class = parse_enum(raw)?;
    }
    asset.updated_at = Utc::now();
    ctx.storage.update_manual_asset(&asset).await.map_err(internal)?;
    Ok(asset)
}

pub async fn delete_asset(ctx: &ApiContext, asset_id: Uuid) -> Result<(), ApiError> {
    if !ctx
        .storage
        .delete_manual_asset(asset_id)
        .await
        .map_err(internal)?
    {
        return Err(ApiError::not_found("ManualAsset", asset_id));
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/networth_tests.rs"]
mod tests;
