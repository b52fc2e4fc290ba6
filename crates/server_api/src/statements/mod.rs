/// Declares `fn $name() -> &'static Regex`, compiled on first use.
macro_rules! static_re {
    ($fn_name:ident, $pattern:literal) => {
        fn $fn_name() -> &'static regex::Regex {
            static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
            RE.get_or_init(|| regex::Regex::new($pattern).expect(stringify!($fn_name)))
        }
    };
}

pub mod banks;
pub mod parser;

use std::path::Path;

use chrono::{Datelike, Utc};
use shared::{
    domain::{round_money, Account, AccountType, Statement, StatementStatus, Transaction, TransactionType},
    error::ApiError,
    protocol::StatementRawText,
};
use storage::{ParsedStatementFields, TransactionQuery};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    accounts::load_account, anomalies, internal, month_start, subscriptions, today, ApiContext,
};
use parser::{Institution, ParsedLine, StatementSummary};

pub const INTERRUPTED_MESSAGE: &str = "processing interrupted";

/// Stores an uploaded PDF and records it as PENDING. The caller schedules processing.
pub async fn upload_statement(
    ctx: &ApiContext,
    file_name: &str,
    bytes: &[u8],
    account_id: Option<Uuid>,
) -> Result<Statement, ApiError> {
    if bytes.is_empty() {
        return Err(ApiError::validation("File is empty"));
    }
    let file_name = Path::new(file_name)
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or("statement.pdf")
        .to_string();
    if !file_name.to_lowercase().ends_with(".pdf") && !bytes.starts_with(b"%PDF") {
        return Err(ApiError::validation("Only PDF files are accepted"));
    }
    if let Some(account_id) = account_id {
        load_account(ctx, account_id).await?;
    }

    tokio::fs::create_dir_all(&ctx.upload_dir)
        .await
        .map_err(|e| internal(e.into()))?;
    let path = ctx.upload_dir.join(format!("{}_{file_name}", Uuid::new_v4()));
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| internal(e.into()))?;

    let statement = Statement {
        id: Uuid::new_v4(),
        account_id,
        account: None,
        file_name,
        file_path: path.to_string_lossy().into_owned(),
        statement_month: None,
        start_date: None,
        end_date: None,
        opening_balance: None,
        closing_balance: None,
        total_credits: None,
        total_debits: None,
        minimum_payment: None,
        payment_due_date: None,
        ytd_total_fees: None,
        ytd_total_interest: None,
        ytd_year: None,
        status: StatementStatus::Pending,
        error_message: None,
        created_at: Utc::now(),
    };
    ctx.storage
        .insert_statement(&statement)
        .await
        .map_err(internal)?;
    info!(statement_id = %statement.id, file = %statement.file_name, size = bytes.len(), "statement uploaded");
    load_statement(ctx, statement.id).await
}

/// Runs a PENDING statement through extraction. Parse failures end in FAILED, not in an error.
pub async fn process_statement(
    ctx: &ApiContext,
    statement_id: Uuid,
) -> Result<StatementStatus, ApiError> {
    let statement = load_statement(ctx, statement_id).await?;
    if !ctx
        .storage
        .transition_statement(statement_id, StatementStatus::Processing, None)
        .await
        .map_err(internal)?
    {
        return Err(ApiError::validation(format!(
            "Statement {statement_id} cannot be processed from {}",
            statement.status
        )));
    }
    info!(%statement_id, file = %statement.file_name, "processing statement");

    let outcome = match extract_pdf_text(&statement.file_path).await {
        Ok(text) => ingest_text(ctx, &statement, &text).await,
        Err(err) => Err(err),
    };
    finish(ctx, statement_id, outcome).await
}

/// Parses already-extracted text for a statement that is in PROCESSING.
pub(crate) async fn ingest_text(
    ctx: &ApiContext,
    statement: &Statement,
    text: &str,
) -> Result<(), ApiError> {
    let summary = parser::parse_summary(text);
    let institution = parser::detect_institution(text);

    let account = match statement.account_id {
        Some(id) => ctx.storage.get_account(id).await.map_err(internal)?,
        None => resolve_account(ctx, institution, text).await?,
    };
    let account_id = account.as_ref().map(|a| a.id);

    let lines = banks::parse_statement(institution, text, &summary, today());
    let transactions: Vec<Transaction> = lines
        .into_iter()
        .map(|line| to_transaction(line, account_id, statement.id))
        .collect();
    info!(
        statement_id = %statement.id,
        institution = institution.as_str(),
        transactions = transactions.len(),
        "statement text parsed"
    );

    if let Some(account) = account {
        apply_account_metadata(ctx, account, &summary).await?;
    }

    let fields = parsed_fields(account_id, &summary, &transactions);
    ctx.storage
        .save_parsed_statement(statement.id, &fields)
        .await
        .map_err(internal)?;
    ctx.storage
        .insert_transactions(&transactions)
        .await
        .map_err(internal)?;

    anomalies::detect_anomalies(ctx, account_id, &transactions).await?;
    let history = match account_id {
        Some(id) => ctx
            .storage
            .find_transactions_ascending(&TransactionQuery::default().with_account(id))
            .await
            .map_err(internal)?,
        None => transactions,
    };
    subscriptions::detect_for_account(ctx, account_id, &history).await?;
    subscriptions::mark_duplicates(ctx).await?;
    Ok(())
}

async fn finish(
    ctx: &ApiContext,
    statement_id: Uuid,
    outcome: Result<(), ApiError>,
) -> Result<StatementStatus, ApiError> {
    let (status, message) = match outcome {
        Ok(()) => (StatementStatus::Completed, None),
        Err(err) => {
            error!(%statement_id, error = %err.message, "statement processing failed");
            (StatementStatus::Failed, Some(err.message))
        }
    };
    ctx.storage
        .transition_statement(statement_id, status, message.as_deref())
        .await
        .map_err(internal)?;
    if status == StatementStatus::Completed {
        info!(%statement_id, "statement processing complete");
    }
    Ok(status)
}

async fn extract_pdf_text(file_path: &str) -> Result<String, ApiError> {
    let bytes = tokio::fs::read(file_path)
        .await
        .map_err(|e| ApiError::validation(format!("Could not read {file_path}: {e}")))?;
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| ApiError::validation(format!("PDF extraction aborted: {e}")))?
        .map_err(|e| ApiError::validation(format!("Could not extract text from PDF: {e}")))?;
    if text.trim().is_empty() {
        return Err(ApiError::validation("PDF contains no extractable text"));
    }
    Ok(text)
}

/// Finds the card this statement belongs to by institution and last 4, creating it when new.
/// Unrecognized institutions leave the statement unassigned.
async fn resolve_account(
    ctx: &ApiContext,
    institution: Institution,
    text: &str,
) -> Result<Option<Account>, ApiError> {
    if institution == Institution::Generic {
        info!("institution not recognized; statement left without an account");
        return Ok(None);
    }
    let last4 = parser::extract_last4(text);
    if let Some(last4) = last4.as_deref() {
        if let Some(existing) = ctx
            .storage
            .find_account_by_institution_last4(institution.as_str(), last4)
            .await
            .map_err(internal)?
        {
            info!(account = %existing.name, "statement matched existing account");
            return Ok(Some(existing));
        }
    }

    let now = Utc::now();
    let account = Account {
        id: Uuid::new_v4(),
        name: parser::account_display_name(institution, last4.as_deref()),
        institution: Some(institution.as_str().to_string()),
        account_type: AccountType::CreditCard,
        last4,
        credit_limit: None,
        current_balance: None,
        available_credit: None,
        apr: None,
        promo_apr: None,
        promo_apr_end_date: None,
        payment_due_day: None,
        min_payment: None,
        rewards_program: None,
        color: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    ctx.storage.insert_account(&account).await.map_err(internal)?;
    info!(account = %account.name, "auto-created account for statement");
    Ok(Some(account))
}

/// Carries printed balances and terms onto the account. Existing limits and rates are kept.
async fn apply_account_metadata(
    ctx: &ApiContext,
    mut account: Account,
    summary: &StatementSummary,
) -> Result<(), ApiError> {
    if let Some(due) = summary.payment_due_date {
        account.payment_due_day = Some(due.day());
    }
    if summary.closing_balance.is_some() {
        account.current_balance = summary.closing_balance;
    }
    if summary.minimum_payment.is_some() {
        account.min_payment = summary.minimum_payment;
    }
    account.credit_limit = account.credit_limit.or(summary.credit_limit);
    account.available_credit = summary.available_credit.or(account.available_credit);
    account.apr = account.apr.or(summary.apr);
    if let (None, Some((rate, ends))) = (account.promo_apr, summary.promo_apr) {
        account.promo_apr = Some(rate);
        account.promo_apr_end_date = Some(ends);
    }
    account.updated_at = Utc::now();
    ctx.storage.update_account(&account).await.map_err(internal)
}

fn to_transaction(line: ParsedLine, account_id: Option<Uuid>, statement_id: Uuid) -> Transaction {
    Transaction {
        id: Uuid::new_v4(),
        account_id,
        account_name: None,
        statement_id: Some(statement_id),
        transaction_date: line.date,
        post_date: None,
        description: Some(line.description),
        merchant_name: Some(line.merchant),
        category: line.category,
        subcategory: None,
        amount: line.amount,
        transaction_type: Some(line.transaction_type),
        reference_number: None,
        is_recurring: false,
        is_flagged: false,
        flag_reason: None,
        notes: None,
        created_at: Utc::now(),
    }
}

fn parsed_fields(
    account_id: Option<Uuid>,
    summary: &StatementSummary,
    transactions: &[Transaction],
) -> ParsedStatementFields {
    let start = transactions.iter().map(|t| t.transaction_date).min();
    let end = transactions.iter().map(|t| t.transaction_date).max();
    let sum_of = |pred: fn(TransactionType) -> bool| {
        round_money(
            transactions
                .iter()
                .filter(|t| t.transaction_type.is_some_and(pred))
                .map(|t| t.amount)
                .sum(),
        )
    };
    let total_debits = sum_of(|kind| {
        matches!(
            kind,
            TransactionType::Debit | TransactionType::Fee | TransactionType::Interest
        )
    });
    let total_credits =
        sum_of(|kind| matches!(kind, TransactionType::Credit | TransactionType::Payment));
    let closing_balance = summary.closing_balance.unwrap_or_else(|| {
        round_money(summary.opening_balance.unwrap_or(0.0) + total_debits - total_credits)
    });

    ParsedStatementFields {
        account_id,
        statement_month: start.map(month_start),
        start_date: start,
        end_date: end,
        opening_balance: summary.opening_balance,
        closing_balance: Some(closing_balance),
        total_credits: Some(total_credits),
        total_debits: Some(total_debits),
        minimum_payment: summary.minimum_payment,
        payment_due_date: summary.payment_due_date,
        ytd_total_fees: summary.ytd_total_fees,
        ytd_total_interest: summary.ytd_total_interest,
        ytd_year: summary.ytd_year,
    }
}

pub async fn list_statements(ctx: &ApiContext) -> Result<Vec<Statement>, ApiError> {
    ctx.storage.list_statements().await.map_err(internal)
}

pub async fn get_statement(ctx: &ApiContext, statement_id: Uuid) -> Result<Statement, ApiError> {
    load_statement(ctx, statement_id).await
}

/// Discards a finished parse and queues the statement again. Only COMPLETED or FAILED qualify.
pub async fn reprocess_statement(ctx: &ApiContext, statement_id: Uuid) -> Result<(), ApiError> {
    let statement = load_statement(ctx, statement_id).await?;
    if !statement.status.can_reprocess() {
        return Err(ApiError::validation(format!(
            "Statement is {}; only COMPLETED or FAILED statements can be reprocessed",
            statement.status
        )));
    }
    if !ctx
        .storage
        .reset_statement_for_reprocess(statement_id)
        .await
        .map_err(internal)?
    {
        return Err(ApiError::validation("Statement is already being processed"));
    }
    info!(%statement_id, "statement reset for reprocessing");
    Ok(())
}

/// Settles statements left mid-flight by a previous run. PROCESSING ones become FAILED; the
/// PENDING ones are returned so the caller can queue them again.
pub async fn recover_interrupted(ctx: &ApiContext) -> Result<Vec<Uuid>, ApiError> {
    let failed = ctx
        .storage
        .fail_processing_statements(INTERRUPTED_MESSAGE)
        .await
        .map_err(internal)?;
    let pending = ctx.storage.pending_statement_ids().await.map_err(internal)?;
    if failed > 0 || !pending.is_empty() {
        warn!(failed, pending = pending.len(), "recovered interrupted statements");
    }
    Ok(pending)
}

pub async fn delete_statement(ctx: &ApiContext, statement_id: Uuid) -> Result<(), ApiError> {
    let statement = load_statement(ctx, statement_id).await?;
    ctx.storage
        .delete_statement(statement_id)
        .await
        .map_err(internal)?;
    if let Err(err) = tokio::fs::remove_file(&statement.file_path).await {
        warn!(%statement_id, error = %err, "could not remove statement file");
    }
    info!(%statement_id, "statement deleted");
    Ok(())
}

pub async fn assign_account(
    ctx: &ApiContext,
    statement_id: Uuid,
    account_id: Uuid,
) -> Result<Statement, ApiError> {
    load_statement(ctx, statement_id).await?;
    load_account(ctx, account_id).await?;
    ctx.storage
        .set_statement_account(statement_id, account_id)
        .await
        .map_err(internal)?;
    let moved = ctx
        .storage
        .assign_statement_transactions(statement_id, account_id)
        .await
        .map_err(internal)?;
    info!(%statement_id, %account_id, moved, "statement assigned to account");
    load_statement(ctx, statement_id).await
}

pub async fn raw_text(ctx: &ApiContext, statement_id: Uuid) -> Result<StatementRawText, ApiError> {
    let statement = load_statement(ctx, statement_id).await?;
    let text = extract_pdf_text(&statement.file_path).await?;
    Ok(StatementRawText {
        statement_id,
        file_name: statement.file_name,
        length: text.chars().count(),
        text,
    })
}

async fn load_statement(ctx: &ApiContext, statement_id: Uuid) -> Result<Statement, ApiError> {
    ctx.storage
        .get_statement(statement_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("Statement", statement_id))
}

#[cfg(test)]
#[path = "tests/statements_tests.rs"]
mod tests;
