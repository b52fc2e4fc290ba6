use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use shared::{
    domain::{Account, AccountType, Transaction, TransactionType},
    error::{ApiException, ErrorCode},
};
use storage::Storage;
use uuid::Uuid;

use crate::{ApiContext, LlmClient};

/// Replies with a canned answer and remembers the prompts it saw.
#[derive(Default)]
pub struct CannedLlm {
    pub reply: Option<String>,
    pub prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl LlmClient for CannedLlm {
    async fn generate(&self, prompt: &str) -> Result<String, ApiException> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        self.reply.clone().ok_or_else(|| {
            ApiException::new(ErrorCode::Unavailable, "Make sure Ollama is running")
        })
    }
}

pub async fn context() -> ApiContext {
    context_with_llm(Arc::new(CannedLlm::default())).await
}

pub async fn context_with_llm(llm: Arc<dyn LlmClient>) -> ApiContext {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let upload_dir = std::env::temp_dir().join(format!("statements-{}", Uuid::new_v4()));
    ApiContext::new(storage, llm, upload_dir)
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("date")
}

pub fn account(name: &str, kind: AccountType, balance: Option<f64>, limit: Option<f64>) -> Account {
    Account {
        id: Uuid::new_v4(),
        name: name.to_string(),
        institution: None,
        account_type: kind,
        last4: None,
        credit_limit: limit,
        current_balance: balance,
        available_credit: None,
        apr: None,
        promo_apr: None,
        promo_apr_end_date: None,
        payment_due_day: None,
        min_payment: None,
        rewards_program: None,
        color: None,
        is_active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn txn(
    account_id: Option<Uuid>,
    day: NaiveDate,
    merchant: &str,
    amount: f64,
    kind: TransactionType,
) -> Transaction {
    Transaction {
        id: Uuid::new_v4(),
        account_id,
        account_name: None,
        statement_id: None,
        transaction_date: day,
        post_date: None,
        description: Some(merchant.to_string()),
        merchant_name: Some(merchant.to_string()),
        category: None,
        subcategory: None,
        amount,
        transaction_type: Some(kind),
        reference_number: None,
        is_recurring: false,
        is_flagged: false,
        flag_reason: None,
        notes: None,
        created_at: Utc::now(),
    }
}

pub fn categorized(mut t: Transaction, category: &str) -> Transaction {
    t.category = Some(category.to_string());
    t
}

pub async fn seed_account(ctx: &ApiContext, account: &Account) {
    ctx.storage.insert_account(account).await.expect("account");
}

pub async fn seed(ctx: &ApiContext, transactions: &[Transaction]) {
    ctx.storage
        .insert_transactions(transactions)
        .await
        .expect("transactions");
}
