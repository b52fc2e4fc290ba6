use chrono::{Datelike, Days, NaiveDate};
use shared::{
    domain::{round_money, Account, AccountType, FinancialProfile, PayFrequency, Subscription},
    error::ApiError,
    protocol::{CashFlowEvent, CashFlowResponse},
};

use crate::{clamp_day, first_of, internal, month_end, ApiContext};

/// A running balance below this marks the day as a danger day.
pub const DANGER_THRESHOLD: f64 = 500.0;
const FALLBACK_CARD_PAYMENT: f64 = 25.0;

fn event(date: NaiveDate, kind: &str, description: impl Into<String>, amount: f64) -> CashFlowEvent {
    CashFlowEvent {
        date,
        event_type: kind.to_string(),
        description: description.into(),
        amount,
        running_balance: 0.0,
        is_danger_day: false,
    }
}

/// Paydays inside the month. Weekly and biweekly pay spread the yearly income over 52 or 26 checks.
fn income_events(profile: &FinancialProfile, first: NaiveDate, last: NaiveDate) -> Vec<CashFlowEvent> {
    let Some(income) = profile.monthly_income.filter(|i| *i > 0.0) else {
        return Vec::new();
    };
    let (label, amount, step) = match profile.pay_frequency {
        PayFrequency::Monthly => return vec![event(first, "INCOME", "Monthly Salary", income)],
        PayFrequency::Biweekly => ("Biweekly Pay", round_money(income * 12.0 / 26.0), 14),
        PayFrequency::Weekly => ("Weekly Pay", round_money(income * 12.0 / 52.0), 7),
    };
    std::iter::successors(Some(first), |day| day.checked_add_days(Days::new(step)))
        .take_while(|day| *day <= last)
        .map(|day| event(day, "INCOME", label, amount))
        .collect()
}

/// Projects the month that starts on `first` from checking balances, paydays, card payments and subscriptions.
pub fn project(
    first: NaiveDate,
    accounts: &[Account],
    profile: &FinancialProfile,
    subscriptions: &[Subscription],
) -> CashFlowResponse {
    let last = month_end(first);
    let starting_balance = round_money(
        accounts
            .iter()
            .filter(|a| a.account_type == AccountType::Checking)
            .filter_map(|a| a.current_balance)
            .sum(),
    );

    let mut events = income_events(profile, first, last);
    for card in accounts.iter().filter(|a| a.is_credit_card()) {
        if let Some(due_day) = card.payment_due_day {
            let payment = card.min_payment.unwrap_or(FALLBACK_CARD_PAYMENT);
            events.push(event(
                clamp_day(first, due_day),
                "PAYMENT",
                format!("{} Payment", card.name),
                -payment,
            ));
        }
    }
    for sub in subscriptions {
        if let Some(next) = sub.next_expected_date.filter(|d| (first..=last).contains(d)) {
            events.push(event(
                next,
                "SUBSCRIPTION",
                sub.merchant_name.clone(),
                -sub.amount.unwrap_or(0.0),
            ));
        }
    }

    events.sort_by_key(|e| e.date);
    let mut running = starting_balance;
    for e in &mut events {
        running = round_money(running + e.amount);
        e.running_balance = running;
        e.is_danger_day = running < DANGER_THRESHOLD;
    }

    CashFlowResponse {
        year: first.year(),
        month: first.month(),
        starting_balance,
        events,
    }
}

pub async fn cash_flow(ctx: &ApiContext, year: i32, month: u32) -> Result<CashFlowResponse, ApiError> {
    let first = first_of(year, month)?;
    let accounts = ctx.storage.list_active_accounts().await.map_err(internal)?;
    let profile = ctx.storage.get_or_create_profile().await.map_err(internal)?;
    let subscriptions = ctx
        .storage
        .list_active_subscriptions()
        .await
        .map_err(internal)?;
    Ok(project(first, &accounts, &profile, &subscriptions))
}

#[cfg(test)]
#[path = "tests/cash_flow_tests.rs"]
mod tests;
