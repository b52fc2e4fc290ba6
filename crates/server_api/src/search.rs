use chrono::NaiveDate;
use shared::{error::ApiError, protocol::SearchResult};
use storage::TransactionQuery;

use crate::{accounts::account_response, internal, sub_months, today, ApiContext};

const RESULT_LIMIT: usize = 5;
const MERCHANT_SCAN_LIMIT: i64 = 500;

pub async fn search(ctx: &ApiContext, q: Option<String>) -> Result<SearchResult, ApiError> {
    search_at(ctx, q, today()).await
}

/// Matches transactions, accounts and recent merchants against one free-text query.
pub(crate) async fn search_at(
    ctx: &ApiContext,
    q: Option<String>,
    today: NaiveDate,
) -> Result<SearchResult, ApiError> {
    let trimmed = q.as_deref().map(str::trim).filter(|q| !q.is_empty());
    let Some(q) = trimmed.map(str::to_string) else {
        return Ok(SearchResult {
            query: q,
            transactions: Vec::new(),
            accounts: Vec::new(),
            merchants: Vec::new(),
            total_results: 0,
        });
    };
    let needle = q.to_lowercase();

    let transactions = ctx
        .storage
        .find_transactions(
            &TransactionQuery {
                keyword: Some(q.clone()),
                ..TransactionQuery::default()
            },
            Some(RESULT_LIMIT as i64),
            0,
        )
        .await
        .map_err(internal)?;

    let accounts: Vec<_> = ctx
        .storage
        .list_active_accounts()
        .await
        .map_err(internal)?
        .into_iter()
        .filter(|a| {
            a.name.to_lowercase().contains(&needle)
                || a
                    .institution
                    .as_deref()
                    .is_some_and(|i| i.to_lowercase().contains(&needle))
        })
        .take(RESULT_LIMIT)
        .map(|a| account_response(a, today))
        .collect();

    let merchants: Vec<String> = ctx
        .storage
        .merchant_totals(
            &TransactionQuery::debits_between(sub_months(today, 12), today),
            MERCHANT_SCAN_LIMIT,
        )
        .await
        .map_err(internal)?
        .into_iter()
        .map(|(merchant, _, _)| merchant)
        .filter(|merchant| merchant.to_lowercase().contains(&needle))
        .take(RESULT_LIMIT)
        .collect();

    let total_results = (transactions.len() + accounts.len() + merchants.len()) as u64;
    Ok(SearchResult {
        query: Some(q),
        transactions,
        accounts,
        merchants,
        total_results,
    })
}

#[cfg(test)]
#[path = "tests/search_tests.rs"]
mod tests;
