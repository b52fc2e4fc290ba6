//! Read-only financial analyses computed from accounts, transactions and snapshots.

pub mod annual_review;
pub mod brain;
pub mod cash_flow;
pub mod credit_score;
pub mod debt_payoff;
pub mod fire;
pub mod health;
pub mod savings_plan;
pub mod spending;

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use shared::{
    domain::{percent_of, round_money, Account, TransactionType},
    error::ApiError,
    protocol::MonthAmount,
};
use storage::TransactionQuery;

use crate::{add_months, internal, ApiContext};

/// Summed balance and limit of the credit cards in a list of accounts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CreditUsage {
    pub balance: f64,
    pub limit: f64,
}

impl CreditUsage {
    pub fn of(cards: &[Account]) -> Self {
        cards
            .iter()
            .filter(|card| card.is_credit_card())
            .fold(Self { balance: 0.0, limit: 0.0 }, |acc, card| Self {
                balance: acc.balance + card.current_balance.unwrap_or(0.0),
                limit: acc.limit + card.credit_limit.unwrap_or(0.0),
            })
    }

    pub fn percent(&self) -> Option<f64> {
        percent_of(self.balance, self.limit)
    }
}

pub(crate) async fn debit_total(
    ctx: &ApiContext,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<f64, ApiError> {
    ctx.storage
        .sum_transactions(&TransactionQuery::debits_between(start, end))
        .await
        .map_err(internal)
}

/// Deposits of at least `floor` between the dates, the way income is recognized.
pub(crate) async fn deposit_total(
    ctx: &ApiContext,
    start: NaiveDate,
    end: NaiveDate,
    floor: f64,
) -> Result<f64, ApiError> {
    let query = TransactionQuery {
        min_amount: Some(floor),
        ..TransactionQuery::of_types_between(
            &[TransactionType::Credit, TransactionType::Payment],
            start,
            end,
        )
    };
    ctx.storage.sum_transactions(&query).await.map_err(internal)
}

/// Average monthly debit spend per upper-cased category over `months` months, largest first.
pub(crate) async fn category_monthly_averages(
    ctx: &ApiContext,
    start: NaiveDate,
    end: NaiveDate,
    months: u32,
) -> Result<Vec<(String, f64)>, ApiError> {
    let totals = ctx
        .storage
        .category_totals(&TransactionQuery::debits_between(start, end))
        .await
        .map_err(internal)?;
    let mut by_key: Vec<(String, f64)> = Vec::with_capacity(totals.len());
    for (category, total) in totals {
        let key = category.to_uppercase();
        let monthly = total / f64::from(months.max(1));
        match by_key.iter_mut().find(|(k, _)| *k == key) {
            Some((_, amount)) => *amount += monthly,
            None => by_key.push((key, monthly)),
        }
    }
    for (_, amount) in &mut by_key {
        *amount = round_money(*amount);
    }
    by_key.sort_by(|a, b| b.1.total_cmp(&a.1));
    Ok(by_key)
}

/// `count` consecutive `YYYY-MM` entries from `first`, with months absent from `totals` at zero.
pub(crate) fn zero_filled_months(first: NaiveDate, count: u32, totals: Vec<(String, f64)>) -> Vec<MonthAmount> {
    let totals: HashMap<String, f64> = totals.into_iter().collect();
    (0..count)
        .map(|offset| {
            let month = add_months(first, offset);
            let key = format!("{:04}-{:02}", month.year(), month.month());
            let amount = round_money(totals.get(&key).copied().unwrap_or(0.0));
            MonthAmount { month: key, amount }
        })
        .collect()
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
