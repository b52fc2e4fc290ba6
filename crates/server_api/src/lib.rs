use std::{path::PathBuf, str::FromStr, sync::Arc};

use chrono::{Datelike, Local, Months, NaiveDate};
use shared::{
    domain::UnknownVariant,
    error::{ApiError, ErrorCode},
};
use storage::Storage;

pub mod accounts;
pub mod alert_rules;
pub mod alerts;
pub mod analysis;
pub mod analytics;
pub mod anomalies;
pub mod budgets;
pub mod chat;
pub mod dashboard;
pub mod digest;
pub mod export;
pub mod goals;
pub mod insights;
pub mod jobs;
pub mod networth;
pub mod profile;
pub mod search;
pub mod statements;
pub mod subscriptions;
pub mod transactions;

pub use chat::{LlmClient, OllamaClient};

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub llm: Arc<dyn LlmClient>,
    /// Uploaded statement PDFs are written here as `{uuid}_{fileName}`.
    pub upload_dir: PathBuf,
}

impl ApiContext {
    pub fn new(storage: Storage, llm: Arc<dyn LlmClient>, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage,
            llm,
            upload_dir: upload_dir.into(),
        }
    }
}

/// The local calendar date every "this month" and "days until" figure is measured from.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub(crate) fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, err.to_string())
}

pub(crate) fn required<T>(value: Option<T>, field: &str) -> Result<T, ApiError> {
    value.ok_or_else(|| ApiError::validation(format!("{field} is required")))
}

pub(crate) fn required_text(value: Option<String>, field: &str) -> Result<String, ApiError> {
    match value {
        Some(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        _ => Err(ApiError::validation(format!("{field} is required"))),
    }
}

pub(crate) fn parse_enum<T>(raw: &str) -> Result<T, ApiError>
where
    T: FromStr<Err = UnknownVariant>,
{
    raw.parse::<T>().map_err(ApiError::from)
}

pub(crate) fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub(crate) fn month_end(date: NaiveDate) -> NaiveDate {
    let start = month_start(date);
    start
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(date)
}

pub(crate) fn days_in_month(date: NaiveDate) -> u32 {
    month_end(date).day()
}

/// Shifts by whole months, clamping the day to the target month's length.
pub(crate) fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months)).unwrap_or(date)
}

pub(crate) fn sub_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_sub_months(Months::new(months)).unwrap_or(date)
}

pub(crate) fn first_of(year: i32, month: u32) -> Result<NaiveDate, ApiError> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| ApiError::validation(format!("invalid month {year}-{month:02}")))
}

pub(crate) fn year_bounds(year: i32) -> Result<(NaiveDate, NaiveDate), ApiError> {
    let start = first_of(year, 1)?;
    let end = NaiveDate::from_ymd_opt(year, 12, 31)
        .ok_or_else(|| ApiError::validation(format!("invalid year {year}")))?;
    Ok((start, end))
}

pub(crate) fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    to.signed_duration_since(from).num_days()
}

/// A day-of-month clamped into the given month, e.g. the 31st in February.
pub(crate) fn clamp_day(month: NaiveDate, day: u32) -> NaiveDate {
    let day = day.clamp(1, days_in_month(month));
    month_start(month).with_day(day).unwrap_or(month)
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
