//! Model-assisted statement review: categorization, anomaly spotting and a written summary.
//! Each step is stored as its own result; a failing step is logged and the rest still run.

use std::{collections::BTreeMap, time::Instant};

use chrono::Utc;
use serde_json::{json, Value};
use shared::{
    domain::{round_money, AnalysisResult, AnalysisType, Transaction, TransactionType},
    error::ApiError,
    protocol::AnalysisStarted,
};
use storage::{Categorization, TransactionQuery};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{internal, statements::get_statement, ApiContext};

pub const STARTED_MESSAGE: &str = "AI analysis started. Results will be available shortly.";
const CATEGORIZE_BATCH: usize = 100;
const ANOMALY_BATCH: usize = 50;
const JSON_ONLY: &str = "Respond ONLY with valid JSON. No explanation, no markdown.";

/// Confirms the statement exists. The caller runs [`run_analysis`] off the request path.
pub async fn begin_analysis(ctx: &ApiContext, statement_id: Uuid) -> Result<AnalysisStarted, ApiError> {
    get_statement(ctx, statement_id).await?;
    Ok(AnalysisStarted {
        status: "STARTED".to_string(),
        message: STARTED_MESSAGE.to_string(),
    })
}

pub async fn list_analysis(ctx: &ApiContext, statement_id: Uuid) -> Result<Vec<AnalysisResult>, ApiError> {
    ctx.storage
        .list_analysis_results(statement_id)
        .await
        .map_err(internal)
}

/// Runs every step over the statement's transactions and returns how many results were stored.
pub async fn run_analysis(ctx: &ApiContext, statement_id: Uuid) -> Result<usize, ApiError> {
    let query = TransactionQuery {
        statement_id: Some(statement_id),
        ..TransactionQuery::default()
    };
    let rows = ctx
        .storage
        .find_transactions_ascending(&query)
        .await
        .map_err(internal)?;
    if rows.is_empty() {
        warn!(%statement_id, "statement has no transactions to analyze");
        return Ok(0);
    }

    let mut stored = 0;
    for step in [AnalysisType::Categorization, AnalysisType::Anomaly, AnalysisType::Summary] {
        let started = Instant::now();
        let outcome = match step {
            AnalysisType::Categorization => categorize(ctx, &rows).await,
            AnalysisType::Anomaly => find_anomalies(ctx, &rows).await.map(Some),
            AnalysisType::Summary => summarize(ctx, &rows).await.map(Some),
            // Recurring charges are handled by subscription detection during import.
            AnalysisType::Subscription => continue,
        };
        let data = match outcome {
            Ok(Some(data)) => data,
            Ok(None) => continue,
            Err(error) => {
                warn!(%statement_id, step = %step, error = %error.message, "analysis step failed");
                continue;
            }
        };
        let result = AnalysisResult {
            id: Uuid::new_v4(),
            statement_id,
            analysis_type: step,
            result_data: data,
            model_used: ctx.llm.model().map(str::to_string),
            processing_ms: i64::try_from(started.elapsed().as_millis()).ok(),
            created_at: Utc::now(),
        };
        ctx.storage
            .insert_analysis_result(&result)
            .await
            .map_err(internal)?;
        stored += 1;
    }
    info!(%statement_id, stored, "statement analysis finished");
    Ok(stored)
}

/// Asks the model to categorize rows the keyword rules left blank, and applies its answers.
async fn categorize(ctx: &ApiContext, rows: &[Transaction]) -> Result<Option<Value>, ApiError> {
    let pending: Vec<&Transaction> = rows
        .iter()
        .filter(|t| t.category.as_deref().map_or(true, |c| c.trim().is_empty()))
        .take(CATEGORIZE_BATCH)
        .collect();
    if pending.is_empty() {
        debug!("every transaction already has a category");
        return Ok(None);
    }
    let items: Vec<Value> = pending
        .iter()
        .map(|t| {
            json!({
                "id": t.id,
                "merchant": t.merchant_name.as_deref().or(t.description.as_deref()).unwrap_or_default(),
                "amount": t.amount,
                "date": t.transaction_date,
            })
        })
        .collect();
    let prompt = format!(
        "Categorize these credit card transactions. Use categories such as Groceries, Dining, \
         Shopping, Travel, Transportation, Gas, Healthcare, Utilities, Entertainment, \
         Subscriptions, Education or Other.\n\
         Return {{\"categorizations\":[{{\"id\":\"...\",\"category\":\"...\",\"subcategory\":\"...\",\
         \"normalizedMerchant\":\"...\"}}]}}\n\nTransactions:\n{}",
        Value::Array(items)
    );
    let data = generate_json(ctx, &prompt).await?;

    let updates = categorizations(&data, &pending);
    let changed = ctx
        .storage
        .apply_categorizations(&updates)
        .await
        .map_err(internal)?;
    debug!(requested = pending.len(), changed, "model categorizations applied");
    Ok(Some(data))
}

/// Model answers that name a transaction from the batch.
fn categorizations(data: &Value, batch: &[&Transaction]) -> Vec<Categorization> {
    let text = |item: &Value, key: &str| {
        item.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    data.get("categorizations")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|item| {
            let id = Uuid::parse_str(item.get("id")?.as_str()?).ok()?;
            batch.iter().any(|t| t.id == id).then(|| Categorization {
                transaction_id: id,
                category: text(item, "category"),
                subcategory: text(item, "subcategory"),
                merchant_name: text(item, "normalizedMerchant"),
            })
        })
        .collect()
}

async fn find_anomalies(ctx: &ApiContext, rows: &[Transaction]) -> Result<Value, ApiError> {
    let items: Vec<Value> = rows
        .iter()
        .take(ANOMALY_BATCH)
        .map(|t| {
            json!({
                "merchant": t.merchant_name.as_deref().unwrap_or_default(),
                "amount": t.amount,
                "date": t.transaction_date,
                "category": t.category.as_deref().unwrap_or("Uncategorized"),
            })
        })
        .collect();
    let prompt = format!(
        "Review these transactions for anything unusual: duplicate charges, unexpected fees, \
         unusually large purchases or unfamiliar merchants.\n\
         Return {{\"anomalies\":[{{\"merchant\":\"...\",\"amount\":0,\"reason\":\"...\",\
         \"severity\":\"LOW|MEDIUM|HIGH\"}}],\"summary\":\"...\"}}\n\nTransactions:\n{}",
        Value::Array(items)
    );
    generate_json(ctx, &prompt).await
}

async fn summarize(ctx: &ApiContext, rows: &[Transaction]) -> Result<Value, ApiError> {
    let debits = rows
        .iter()
        .filter(|t| t.transaction_type == Some(TransactionType::Debit));
    let mut by_category: BTreeMap<&str, f64> = BTreeMap::new();
    let mut total = 0.0;
    for t in debits {
        total += t.amount;
        *by_category
            .entry(t.category.as_deref().unwrap_or("Uncategorized"))
            .or_default() += t.amount;
    }
    let mut categories: Vec<(&str, f64)> = by_category.into_iter().collect();
    categories.sort_by(|a, b| b.1.total_cmp(&a.1));
    let breakdown: Vec<String> = categories
        .iter()
        .map(|(category, amount)| format!("- {category}: ${amount:.2}"))
        .collect();

    let prompt = format!(
        "Summarize this credit card statement for its owner.\n\
         Total spending: ${:.2}\nSpending by category:\n{}\n\n\
         Return {{\"summary\":\"...\",\"topInsight\":\"...\",\"recommendation\":\"...\"}}",
        round_money(total),
        breakdown.join("\n")
    );
    generate_json(ctx, &prompt).await
}

/// Prompts for JSON and extracts the first object from the reply.
pub(crate) async fn generate_json(ctx: &ApiContext, prompt: &str) -> Result<Value, ApiError> {
    let reply = ctx.llm.generate(&format!("{prompt}\n\n{JSON_ONLY}")).await?;
    Ok(extract_json(&reply))
}

/// The span from the first `{` to the last `}` parsed as JSON. Unparseable replies are kept as
/// `{"raw_response", "parse_error"}` so the stored result still shows what the model said.
pub fn extract_json(reply: &str) -> Value {
    let span = match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => reply,
    };
    serde_json::from_str(span).unwrap_or_else(|error| {
        json!({
            "raw_response": reply,
            "parse_error": error.to_string(),
        })
    })
}

#[cfg(test)]
#[path = "tests/analysis_tests.rs"]
mod tests;
