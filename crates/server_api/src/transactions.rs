use shared::{
    domain::Transaction,
    error::ApiError,
    protocol::{CategoryAssignment, Page, TransactionFilter, TransactionUpdate},
};
use storage::TransactionQuery;
use tracing::info;
use uuid::Uuid;

use crate::{internal, ApiContext};

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 500;

/// Zero-based page number and page size after clamping. `page * size` never overflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageBounds {
    pub page: i64,
    pub size: i64,
}

pub fn page_bounds(page: Option<i64>, size: Option<i64>) -> PageBounds {
    PageBounds {
        page: page.unwrap_or(0).clamp(0, i64::MAX / MAX_PAGE_SIZE),
        size: size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
    }
}

pub(crate) async fn page_of(
    ctx: &ApiContext,
    query: &TransactionQuery,
    bounds: PageBounds,
) -> Result<Page<Transaction>, ApiError> {
    let total = ctx
        .storage
        .count_transactions(query)
        .await
        .map_err(internal)?;
    let page = bounds.page.min(last_page(total, bounds.size));
    let content = ctx
        .storage
        .find_transactions(query, Some(bounds.size), page * bounds.size)
        .await
        .map_err(internal)?;
    Ok(Page::new(
        content,
        total,
        page.unsigned_abs(),
        bounds.size.unsigned_abs(),
    ))
}

/// Index of the last non-empty page, or 0 when there are no rows.
pub(crate) fn last_page(total: u64, size: i64) -> i64 {
    let total = i64::try_from(total).unwrap_or(i64::MAX);
    if total == 0 || size <= 0 {
        0
    } else {
        (total - 1) / size
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub async fn list_transactions(
    ctx: &ApiContext,
    filter: TransactionFilter,
) -> Result<Page<Transaction>, ApiError> {
    let bounds = page_bounds(filter.page, filter.size);
    let query = TransactionQuery {
        account_id: filter.account_id,
        category: non_blank(filter.category),
        start_date: filter.start_date,
        end_date: filter.end_date,
        min_amount: filter.min_amount,
        max_amount: filter.max_amount,
        search: non_blank(filter.search),
        ..TransactionQuery::default()
    };
    page_of(ctx, &query, bounds).await
}

pub async fn search_transactions(
    ctx: &ApiContext,
    q: String,
    page: Option<i64>,
    size: Option<i64>,
) -> Result<Page<Transaction>, ApiError> {
    list_transactions(
        ctx,
        TransactionFilter {
            search: Some(q),
            page,
            size,
            ..TransactionFilter::default()
        },
    )
    .await
}

pub async fn get_transaction(ctx: &ApiContext, transaction_id: Uuid) -> Result<Transaction, ApiError> {
    ctx.storage
        .get_transaction(transaction_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("Transaction", transaction_id))
}

pub async fn update_transaction(
    ctx: &ApiContext,
    transaction_id: Uuid,
    update: TransactionUpdate,
) -> Result<Transaction, ApiError> {
    let mut transaction = get_transaction(ctx, transaction_id).await?;
    if update.category.is_some() {
        transaction.category = update.category;
    }
    if update.notes.is_some() {
        transaction.notes = update.notes;
    }
    if let Some(flagged) = update.is_flagged {
        transaction.is_flagged = flagged;
    }
    if update.flag_reason.is_some() {
        transaction.flag_reason = update.flag_reason;
    }
    ctx.storage
        .update_transaction(&transaction)
        .await
        .map_err(internal)?;
    Ok(transaction)
}

/// Flagged transactions, newest first.
pub async fn list_anomalies(ctx: &ApiContext) -> Result<Vec<Transaction>, ApiError> {
    let query = TransactionQuery {
        flagged: Some(true),
        ..TransactionQuery::default()
    };
    ctx.storage
        .find_transactions(&query, None, 0)
        .await
        .map_err(internal)
}

pub async fn bulk_categorize(
    ctx: &ApiContext,
    assignments: Vec<CategoryAssignment>,
) -> Result<u64, ApiError> {
    if assignments.iter().any(|a| a.category.trim().is_empty()) {
        return Err(ApiError::validation("category must not be blank"));
    }
    let pairs: Vec<(Uuid, String)> = assignments
        .into_iter()
        .map(|a| (a.id, a.category.trim().to_string()))
        .collect();
    let changed = ctx
        .storage
        .bulk_set_category(&pairs)
        .await
        .map_err(internal)?;
    info!(requested = pairs.len(), changed, "bulk categorize");
    Ok(changed)
}

#[cfg(test)]
#[path = "tests/transactions_tests.rs"]
mod tests;
