use std::{fmt::Write as _, time::Duration};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use chrono::NaiveDate;
use shared::{
    domain::{percent_of, round_money},
    error::{ApiError, ApiException, ErrorCode},
    protocol::{ChatRequest, ChatResponse},
};
use tracing::{debug, warn};

use crate::{
    analytics::{category_monthly_averages, deposit_total},
    internal, sub_months, today, ApiContext,
};

const OLLAMA_TIMEOUT: Duration = Duration::from_secs(120);
const SNAPSHOT_MONTHS: u32 = 3;
const INCOME_FLOOR: f64 = 200.0;

pub const SUGGESTED_QUESTIONS: [&str; 10] = [
    "How much did I spend last month?",
    "Which account has the highest utilization?",
    "What subscriptions am I paying for?",
    "Do I have any unusual charges?",
    "Which credit card should I pay off first?",
    "How much am I spending on dining and food?",
    "Are there any duplicate subscriptions?",
    "What are my upcoming payment due dates?",
    "How does my spending this month compare to last month?",
    "Which card has the best rewards for my spending pattern?",
];

/// Text generation backend for the advisor.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ApiException>;

    /// Model name recorded next to generated results.
    fn model(&self) -> Option<&str> {
        None
    }
}

/// Talks to a local Ollama daemon through its non-streaming `/api/generate` endpoint.
pub struct OllamaClient {
    http: Client,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f64,
    top_p: f64,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> anyhow::Result<Self> {
        let http = Client::builder().timeout(OLLAMA_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String, ApiException> {
        let url = format!("{}/api/generate", self.base_url);
        debug!(model = %self.model, prompt_len = prompt.len(), "sending prompt to ollama");
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: 0.3,
                top_p: 0.9,
                num_predict: 2048,
            },
        };
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(|error| {
                warn!(%error, "ollama request failed");
                unavailable(&error.to_string())
            })?;
        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|error| unavailable(&error.to_string()))?;
        Ok(parsed.response)
    }

    fn model(&self) -> Option<&str> {
        Some(&self.model)
    }
}

fn unavailable(detail: &str) -> ApiException {
    ApiException::new(
        ErrorCode::Unavailable,
        format!(
            "The AI advisor is unavailable. Make sure Ollama is running and the model is pulled. ({detail})"
        ),
    )
}

pub async fn chat(ctx: &ApiContext, request: ChatRequest) -> Result<ChatResponse, ApiError> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(ApiError::validation("message is required"));
    }
    let context = advisor_context(ctx).await?;
    let prompt = format!("{context}\n\nUser question: {message}\n\nAnswer:");
    let response = ctx.llm.generate(&prompt).await?;
    Ok(ChatResponse { response })
}

/// Like [`chat`], but the prompt also carries income, average spend per category and the
/// resulting savings rate over the last three months.
pub async fn chat_enriched(ctx: &ApiContext, request: ChatRequest) -> Result<ChatResponse, ApiError> {
    chat_enriched_at(ctx, request, today()).await
}

pub(crate) async fn chat_enriched_at(
    ctx: &ApiContext,
    request: ChatRequest,
    today: NaiveDate,
) -> Result<ChatResponse, ApiError> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(ApiError::validation("message is required"));
    }
    let snapshot = financial_snapshot(ctx, today).await?;
    let context = advisor_context(ctx).await?;
    let prompt = format!(
        "{context}\n{snapshot}\nUse the numbers above. Name specific categories and amounts.\n\n\
         User question: {message}\n\nAnswer:"
    );
    let response = ctx.llm.generate(&prompt).await?;
    Ok(ChatResponse { response })
}

/// Income (from the profile, else recent deposits), category averages and savings rate.
pub(crate) async fn financial_snapshot(ctx: &ApiContext, today: NaiveDate) -> Result<String, ApiError> {
    let start = sub_months(today, SNAPSHOT_MONTHS);
    let months = f64::from(SNAPSHOT_MONTHS);
    let profile = ctx.storage.get_or_create_profile().await.map_err(internal)?;
    let (income, source) = match profile.monthly_income.filter(|income| *income > 0.0) {
        Some(income) => (income, "profile"),
        None => (
            round_money(deposit_total(ctx, start, today, INCOME_FLOOR).await? / months),
            "detected from deposits",
        ),
    };
    let categories = category_monthly_averages(ctx, start, today, SNAPSHOT_MONTHS).await?;
    let spend: f64 = categories.iter().map(|(_, amount)| amount).sum();
    let savings = income - spend;

    let mut out = String::from("FINANCIAL SNAPSHOT (last 3 months):\n");
    if income > 0.0 {
        let _ = writeln!(out, "- Monthly income: ${income:.2} ({source})");
    } else {
        out.push_str("- Monthly income: unknown\n");
    }
    let _ = writeln!(out, "- Average monthly spending: ${spend:.2}");
    if let Some(rate) = percent_of(savings, income) {
        let _ = writeln!(out, "- Monthly savings: ${savings:.2} ({rate:.1}% savings rate)");
    }
    if !categories.is_empty() {
        out.push_str("SPENDING BY CATEGORY (monthly average):\n");
        for (category, amount) in &categories {
            let _ = write!(out, "- {category}: ${amount:.2}");
            if let Some(pct) = percent_of(*amount, income) {
                let _ = write!(out, " ({pct:.1}% of income)");
            }
            out.push('\n');
        }
    }
    Ok(out)
}

pub fn suggestions() -> Vec<String> {
    SUGGESTED_QUESTIONS.iter().map(|q| q.to_string()).collect()
}

/// Accounts, active subscriptions and today's date as a plain-text preamble.
pub(crate) async fn advisor_context(ctx: &ApiContext) -> Result<String, ApiError> {
    let accounts = ctx.storage.list_active_accounts().await.map_err(internal)?;
    let subscriptions = ctx
        .storage
        .list_active_subscriptions()
        .await
        .map_err(internal)?;

    let mut out = String::from(
        "You are a personal financial advisor AI. You have access to the user's financial data. \
         Be concise, practical, and focused. Provide specific actionable advice.\n\nACCOUNTS:\n",
    );
    for account in &accounts {
        let _ = write!(
            out,
            "- {} ({}): Balance ${:.2}",
            account.name,
            account.account_type,
            account.current_balance.unwrap_or_default()
        );
        if let Some(limit) = account.credit_limit {
            let _ = write!(out, ", Limit ${limit:.2}");
        }
        if let Some(apr) = account.apr {
            let _ = write!(out, ", APR {apr:.2}%");
        }
        if let (Some(promo), Some(end)) = (account.promo_apr, account.promo_apr_end_date) {
            let _ = write!(out, ", Promo APR {promo:.2}% until {end}");
        }
        if let Some(day) = account.payment_due_day {
            let _ = write!(out, ", Due day {day}");
        }
        out.push('\n');
    }

    if !subscriptions.is_empty() {
        out.push_str("\nACTIVE SUBSCRIPTIONS:\n");
        let mut total_monthly = 0.0;
        for sub in &subscriptions {
            total_monthly += sub.monthly_cost();
            let _ = writeln!(
                out,
                "- {}: ${:.2}/{} (Annual: ${:.2})",
                sub.merchant_name,
                sub.amount.unwrap_or_default(),
                sub.frequency.map(|f| f.as_str()).unwrap_or("UNKNOWN"),
                sub.annual_cost.unwrap_or_default()
            );
        }
        let _ = writeln!(out, "Total monthly subscriptions: ${total_monthly:.2}");
    }

    let _ = writeln!(out, "\nToday's date: {}", today());
    Ok(out)
}

#[cfg(test)]
#[path = "tests/chat_tests.rs"]
mod tests;
