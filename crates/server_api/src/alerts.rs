use shared::{domain::Alert, error::ApiError, protocol::UnreadCount};
use uuid::Uuid;

use crate::{internal, ApiContext};

pub async fn list_alerts(ctx: &ApiContext) -> Result<Vec<Alert>, ApiError> {
    ctx.storage.list_open_alerts(None).await.map_err(internal)
}

pub async fn unread_count(ctx: &ApiContext) -> Result<UnreadCount, ApiError> {
    let count = ctx.storage.count_unread_alerts().await.map_err(internal)?;
    Ok(UnreadCount { count })
}

pub async fn mark_read(ctx: &ApiContext, alert_id: Uuid) -> Result<Alert, ApiError> {
    let found = ctx.storage.mark_alert_read(alert_id).await.map_err(internal)?;
    reload(ctx, alert_id, found).await
}

pub async fn resolve(ctx: &ApiContext, alert_id: Uuid) -> Result<Alert, ApiError> {
    let found = ctx.storage.resolve_alert(alert_id).await.map_err(internal)?;
    reload(ctx, alert_id, found).await
}

pub async fn delete_alert(ctx: &ApiContext, alert_id: Uuid) -> Result<(), ApiError> {
    if ctx.storage.delete_alert(alert_id).await.map_err(internal)? {
        Ok(())
    } else {
        Err(ApiError::not_found("Alert", alert_id))
    }
}

async fn reload(ctx: &ApiContext, alert_id: Uuid, found: bool) -> Result<Alert, ApiError> {
    if !found {
        return Err(ApiError::not_found("Alert", alert_id));
    }
    ctx.storage
        .get_alert(alert_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("Alert", alert_id))
}

#[cfg(test)]
#[path = "tests/alerts_tests.rs"]
mod tests;
