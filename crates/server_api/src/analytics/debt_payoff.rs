use chrono::NaiveDate;
use shared::{
    domain::{round_money, Account, AccountType},
    error::ApiError,
    protocol::{CardPayoffDetail, DebtPayoffResponse, PayoffStrategy, WhatIfDataPoint},
};
use uuid::Uuid;

use crate::{add_months, internal, today, ApiContext};

/// Longest simulation, in months.
pub const MAX_MONTHS: u32 = 360;
/// APR assumed for cards that do not report one.
pub const DEFAULT_APR: f64 = 20.0;
const MIN_PAYMENT_FLOOR: f64 = 25.0;
const MIN_PAYMENT_RATE: f64 = 0.02;

pub const WHAT_IF_EXTRAS: [f64; 10] = [
    0.0, 50.0, 100.0, 200.0, 300.0, 500.0, 750.0, 1000.0, 1500.0, 2000.0,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoffOrder {
    /// Highest APR first.
    Avalanche,
    /// Smallest balance first.
    Snowball,
}

impl PayoffOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            PayoffOrder::Avalanche => "AVALANCHE",
            PayoffOrder::Snowball => "SNOWBALL",
        }
    }
}

#[derive(Debug, Clone)]
struct CardState {
    account_id: Uuid,
    name: String,
    original_balance: f64,
    balance: f64,
    apr: f64,
    min_payment: Option<f64>,
    interest_paid: f64,
    paid_off_after: Option<u32>,
}

impl CardState {
    fn from_account(account: &Account) -> Option<Self> {
        let balance = account.current_balance.filter(|b| *b > 0.0)?;
        Some(Self {
            account_id: account.id,
            name: account.name.clone(),
            original_balance: balance,
            balance,
            apr: account.apr.unwrap_or(DEFAULT_APR),
            min_payment: account.min_payment,
            interest_paid: 0.0,
            paid_off_after: None,
        })
    }

    fn is_open(&self) -> bool {
        self.balance > 0.0
    }
}

/// Month-by-month payoff of every card with a positive balance.
///
/// Each month accrues `balance * apr / 1200` of interest on every open card and pays its minimum,
/// then the whole `extra` goes to open cards in strategy order.
pub fn simulate(cards: &[Account], extra: f64, order: PayoffOrder, start: NaiveDate) -> PayoffStrategy {
    let mut states: Vec<CardState> = cards.iter().filter_map(CardState::from_account).collect();
    match order {
        PayoffOrder::Avalanche => states.sort_by(|a, b| b.apr.total_cmp(&a.apr)),
        PayoffOrder::Snowball => states.sort_by(|a, b| a.balance.total_cmp(&b.balance)),
    }

    let mut months = 0;
    let mut total_interest = 0.0;
    while months < MAX_MONTHS && states.iter().any(CardState::is_open) {
        months += 1;
        for card in states.iter_mut().filter(|c| c.is_open()) {
            let interest = round_money(card.balance * card.apr / 1200.0);
            card.balance += interest;
            card.interest_paid += interest;
            total_interest += interest;
            let minimum = card
                .min_payment
                .unwrap_or_else(|| (card.balance * MIN_PAYMENT_RATE).max(MIN_PAYMENT_FLOOR));
            card.balance -= minimum.min(card.balance);
        }

        let mut remaining = extra;
        for card in states.iter_mut().filter(|c| c.is_open()) {
            if remaining <= 0.0 {
                break;
            }
            let payment = remaining.min(card.balance);
            card.balance -= payment;
            remaining -= payment;
        }

        for card in states.iter_mut() {
            if !card.is_open() && card.paid_off_after.is_none() {
                card.paid_off_after = Some(months);
            }
        }
    }

    let payoff_date = add_months(start, months);
    let total_paid = states
        .iter()
        .map(|c| c.original_balance + c.interest_paid)
        .sum::<f64>();
    let card_order = states
        .into_iter()
        .enumerate()
        .map(|(index, card)| CardPayoffDetail {
            account_id: card.account_id,
            account_name: card.name,
            current_balance: card.original_balance,
            apr: card.apr,
            min_payment: card.min_payment,
            payoff_date: card
                .paid_off_after
                .map_or(payoff_date, |m| add_months(start, m)),
            interest_paid: round_money(card.interest_paid),
            payoff_order: index as u32 + 1,
        })
        .collect();

    PayoffStrategy {
        strategy: order.as_str().to_string(),
        total_months: months,
        payoff_date,
        total_interest: round_money(total_interest),
        total_paid: round_money(total_paid),
        card_order,
    }
}

pub fn payoff_plan(cards: &[Account], extra: f64, start: NaiveDate) -> DebtPayoffResponse {
    let total_current_debt = cards
        .iter()
        .filter_map(|c| c.current_balance.filter(|b| *b > 0.0))
        .sum::<f64>();
    DebtPayoffResponse {
        extra_payment: extra,
        total_current_debt: round_money(total_current_debt),
        avalanche: simulate(cards, extra, PayoffOrder::Avalanche, start),
        snowball: simulate(cards, extra, PayoffOrder::Snowball, start),
    }
}

pub fn what_if_range(cards: &[Account], start: NaiveDate) -> Vec<WhatIfDataPoint> {
    WHAT_IF_EXTRAS
        .iter()
        .map(|&extra| {
            let plan = payoff_plan(cards, extra, start);
            WhatIfDataPoint {
                extra_payment: extra,
                avalanche_months: plan.avalanche.total_months,
                avalanche_total_interest: plan.avalanche.total_interest,
                avalanche_payoff_date: plan.avalanche.payoff_date,
                snowball_months: plan.snowball.total_months,
            }
        })
        .collect()
}

async fn credit_cards(ctx: &ApiContext) -> Result<Vec<Account>, ApiError> {
    ctx.storage
        .list_active_accounts_of_type(AccountType::CreditCard)
        .await
        .map_err(internal)
}

pub async fn debt_payoff(ctx: &ApiContext, extra: f64) -> Result<DebtPayoffResponse, ApiError> {
    if !extra.is_finite() || extra < 0.0 {
        return Err(ApiError::validation("extra must be a non-negative amount"));
    }
    let cards = credit_cards(ctx).await?;
    Ok(payoff_plan(&cards, extra, today()))
}

pub async fn what_if(ctx: &ApiContext) -> Result<Vec<WhatIfDataPoint>, ApiError> {
    let cards = credit_cards(ctx).await?;
    Ok(what_if_range(&cards, today()))
}

#[cfg(test)]
#[path = "tests/debt_payoff_tests.rs"]
mod tests;
