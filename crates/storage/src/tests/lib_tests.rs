use super::*;
use chrono::{NaiveDate, Utc};
use shared::domain::{
    Account, AccountType, AlertSeverity, AnalysisResult, AnalysisType, AlertType, Budget, Insight, InsightSeverity, InsightType,
    NetWorthSnapshot, SavingsGoal, Statement, StatementStatus, Transaction, TransactionType,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn account(name: &str, account_type: AccountType) -> Account {
    let now = Utc::now();
    Account {
        id: Uuid::new_v4(),
        name: name.to_string(),
        institution: Some("Chase".to_string()),
        account_type,
        last4: Some("1234".to_string()),
        credit_limit: None,
        current_balance: Some(1000.0),
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
    }
}

fn txn(account_id: Uuid, on: NaiveDate, merchant: &str, category: &str, amount: f64) -> Transaction {
    Transaction {
        id: Uuid::new_v4(),
        account_id: Some(account_id),
        account_name: None,
        statement_id: None,
        transaction_date: on,
        post_date: None,
        description: Some(format!("{merchant} purchase")),
        merchant_name: Some(merchant.to_string()),
        category: Some(category.to_string()),
        subcategory: None,
        amount,
        transaction_type: Some(TransactionType::Debit),
        reference_number: None,
        is_recurring: false,
        is_flagged: false,
        flag_reason: None,
        notes: None,
        created_at: Utc::now(),
    }
}

fn statement(status: StatementStatus) -> Statement {
    Statement {
        id: Uuid::new_v4(),
        account_id: None,
        account: None,
        file_name: "march.pdf".to_string(),
        file_path: "/tmp/march.pdf".to_string(),
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
        status,
        error_message: None,
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("finance.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[test]
fn sqlite_path_ignores_memory_and_query_string() {
    assert_eq!(sqlite_path("sqlite::memory:"), None);
    assert_eq!(
        sqlite_path("sqlite://./data/finance.db?mode=rwc"),
        Some(PathBuf::from("./data/finance.db"))
    );
}

#[tokio::test]
async fn account_round_trips_and_soft_deletes() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let mut card = account("Sapphire", AccountType::CreditCard);
    card.credit_limit = Some(5000.0);
    card.payment_due_day = Some(21);
    storage.insert_account(&card).await.expect("insert");

    let loaded = storage
        .get_account(card.id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(loaded.name, "Sapphire");
    assert_eq!(loaded.payment_due_day, Some(21));
    assert_eq!(loaded.account_type, AccountType::CreditCard);

    assert!(storage.deactivate_account(card.id).await.expect("deactivate"));
    assert!(storage.list_active_accounts().await.expect("list").is_empty());
    assert!(storage.get_account(card.id).await.expect("get").is_some());
}

#[tokio::test]
async fn finds_account_by_institution_and_last4() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let checking = account("Everyday", AccountType::Checking);
    storage.insert_account(&checking).await.expect("insert");

    let found = storage
        .find_account_by_institution_last4("Chase", "1234")
        .await
        .expect("lookup");
    assert_eq!(found.map(|a| a.id), Some(checking.id));
    assert!(storage
        .find_account_by_institution_last4("Chase", "9999")
        .await
        .expect("lookup")
        .is_none());
}

#[tokio::test]
async fn transaction_query_filters_pages_and_sums() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let card = account("Card", AccountType::CreditCard);
    storage.insert_account(&card).await.expect("account");

    let rows = vec![
        txn(card.id, date(2024, 3, 1), "Starbucks", "Dining", 5.5),
        txn(card.id, date(2024, 3, 5), "Whole Foods", "Groceries", 80.0),
        txn(card.id, date(2024, 3, 9), "STARBUCKS #12", "Dining", 6.5),
        txn(card.id, date(2024, 4, 2), "Shell", "Gas", 40.0),
    ];
    storage.insert_transactions(&rows).await.expect("insert");

    let march = TransactionQuery::debits_between(date(2024, 3, 1), date(2024, 3, 31));
    assert_eq!(storage.count_transactions(&march).await.expect("count"), 3);
    assert_eq!(storage.sum_transactions(&march).await.expect("sum"), 92.0);

    let coffee = TransactionQuery {
        search: Some("starbucks".to_string()),
        ..TransactionQuery::default()
    };
    let page = storage
        .find_transactions(&coffee, Some(1), 0)
        .await
        .expect("page");
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].transaction_date, date(2024, 3, 9));
    assert_eq!(page[0].account_name.as_deref(), Some("Card"));
    assert_eq!(storage.count_transactions(&coffee).await.expect("count"), 2);

    let dining = march.clone().with_category("dining");
    assert_eq!(storage.sum_transactions(&dining).await.expect("sum"), 12.0);

    let categories = storage.category_totals(&march).await.expect("categories");
    assert_eq!(categories[0], ("Groceries".to_string(), 80.0));

    let months = storage
        .monthly_totals(&TransactionQuery::default())
        .await
        .expect("months");
    assert_eq!(
        months,
        vec![("2024-03".to_string(), 92.0), ("2024-04".to_string(), 40.0)]
    );
}

#[tokio::test]
async fn bulk_category_update_skips_unknown_ids() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let card = account("Card", AccountType::CreditCard);
    storage.insert_account(&card).await.expect("account");
    let row = txn(card.id, date(2024, 3, 1), "Target", "Shopping", 25.0);
    storage
        .insert_transactions(std::slice::from_ref(&row))
        .await
        .expect("insert");

    let changed = storage
        .bulk_set_category(&[
            (row.id, "Household".to_string()),
            (Uuid::new_v4(), "Ignored".to_string()),
        ])
        .await
        .expect("bulk");
    assert_eq!(changed, 1);
    let loaded = storage
        .get_transaction(row.id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(loaded.category.as_deref(), Some("Household"));
}

#[tokio::test]
async fn merchants_spread_over_accounts_are_reported() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let first = account("First", AccountType::CreditCard);
    let second = account("Second", AccountType::CreditCard);
    storage.insert_account(&first).await.expect("first");
    storage.insert_account(&second).await.expect("second");
    storage
        .insert_transactions(&[
            txn(first.id, date(2024, 3, 1), "Netflix", "Entertainment", 15.49),
            txn(second.id, date(2024, 3, 2), "Netflix", "Entertainment", 15.49),
            txn(first.id, date(2024, 3, 3), "Shell", "Gas", 30.0),
        ])
        .await
        .expect("insert");

    let spread = storage
        .merchants_on_multiple_accounts(&TransactionQuery::default())
        .await
        .expect("spread");
    assert_eq!(spread.len(), 1);
    assert_eq!(spread[0].merchant, "Netflix");
    assert_eq!(spread[0].account_count, 2);
}

#[tokio::test]
async fn statement_transitions_follow_lifecycle() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let pending = statement(StatementStatus::Pending);
    storage.insert_statement(&pending).await.expect("insert");

    assert!(!storage
        .transition_statement(pending.id, StatementStatus::Completed, None)
        .await
        .expect("skip processing"));
    assert!(storage
        .transition_statement(pending.id, StatementStatus::Processing, None)
        .await
        .expect("processing"));
    assert!(!storage
        .reset_statement_for_reprocess(pending.id)
        .await
        .expect("reprocess while processing"));
    assert!(storage
        .transition_statement(pending.id, StatementStatus::Failed, Some("no text"))
        .await
        .expect("failed"));

    let failed = storage
        .get_statement(pending.id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(failed.status, StatementStatus::Failed);
    assert_eq!(failed.error_message.as_deref(), Some("no text"));

    assert!(storage
        .reset_statement_for_reprocess(pending.id)
        .await
        .expect("reprocess"));
    let reset = storage
        .get_statement(pending.id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(reset.status, StatementStatus::Pending);
    assert!(reset.error_message.is_none());
}

#[tokio::test]
async fn deleting_statement_removes_its_transactions() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let card = account("Card", AccountType::CreditCard);
    storage.insert_account(&card).await.expect("account");
    let stmt = statement(StatementStatus::Pending);
    storage.insert_statement(&stmt).await.expect("statement");
    let mut row = txn(card.id, date(2024, 3, 1), "Target", "Shopping", 25.0);
    row.statement_id = Some(stmt.id);
    storage.insert_transactions(&[row]).await.expect("insert");

    assert!(storage.delete_statement(stmt.id).await.expect("delete"));
    assert_eq!(
        storage
            .count_transactions(&TransactionQuery::default())
            .await
            .expect("count"),
        0
    );
}

#[tokio::test]
async fn budget_upsert_by_category_keeps_original_id() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let now = Utc::now();
    let first = Budget {
        id: Uuid::new_v4(),
        category: "Dining".to_string(),
        monthly_limit: 200.0,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    let stored = storage.upsert_budget(&first).await.expect("insert");
    let again = storage
        .upsert_budget(&Budget {
            id: Uuid::new_v4(),
            monthly_limit: 350.0,
            ..first.clone()
        })
        .await
        .expect("upsert");

    assert_eq!(stored.id, again.id);
    assert_eq!(again.monthly_limit, 350.0);
    assert_eq!(storage.list_active_budgets().await.expect("list").len(), 1);
}

#[tokio::test]
async fn goal_progress_accumulates() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let now = Utc::now();
    let goal = SavingsGoal {
        id: Uuid::new_v4(),
        name: "Vacation".to_string(),
        category: "VACATION".to_string(),
        target_amount: 1000.0,
        current_amount: 400.0,
        target_date: None,
        linked_account_id: None,
        color: None,
        notes: None,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    storage.insert_goal(&goal).await.expect("insert");
    assert!(storage.add_goal_progress(goal.id, 100.0).await.expect("progress"));

    let loaded = storage
        .get_goal(goal.id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(loaded.current_amount, 500.0);
}

#[tokio::test]
async fn profile_is_created_once_with_defaults() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let first = storage.get_or_create_profile().await.expect("profile");
    let second = storage.get_or_create_profile().await.expect("profile");

    assert_eq!(first.id, second.id);
    assert_eq!(first.income_source, "MANUAL");
    assert_eq!(first.emergency_fund_target_months, 6);
}

#[tokio::test]
async fn same_day_snapshots_overwrite() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let checking = account("Everyday", AccountType::Checking);
    storage.insert_account(&checking).await.expect("account");
    let today = date(2024, 5, 10);

    storage
        .upsert_balance_snapshot(checking.id, today, 100.0)
        .await
        .expect("first");
    storage
        .upsert_balance_snapshot(checking.id, today, 250.0)
        .await
        .expect("second");
    let history = storage
        .balance_history(checking.id, date(2024, 5, 1))
        .await
        .expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].balance, 250.0);

    let snapshot = NetWorthSnapshot {
        id: Uuid::new_v4(),
        snapshot_date: today,
        liquid_assets: 250.0,
        credit_card_debt: 0.0,
        manual_assets: 0.0,
        manual_liabilities: 0.0,
        net_worth: 250.0,
        created_at: Utc::now(),
    };
    storage
        .upsert_net_worth_snapshot(&snapshot)
        .await
        .expect("snapshot");
    storage
        .upsert_net_worth_snapshot(&NetWorthSnapshot {
            id: Uuid::new_v4(),
            net_worth: 300.0,
            ..snapshot
        })
        .await
        .expect("snapshot again");
    let recent = storage.recent_net_worth_snapshots(12).await.expect("recent");
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].net_worth, 300.0);
}

#[tokio::test]
async fn alert_lifecycle_counts() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let id = storage
        .insert_alert(&NewAlert::new(
            AlertType::DueDate,
            AlertSeverity::High,
            "Payment due",
            "Card payment due in 1 day",
        ))
        .await
        .expect("alert");
    assert_eq!(storage.count_unread_alerts().await.expect("unread"), 1);

    assert!(storage.resolve_alert(id).await.expect("resolve"));
    let alert = storage.get_alert(id).await.expect("get").expect("exists");
    assert!(alert.is_read && alert.is_resolved && alert.resolved_at.is_some());
    assert_eq!(storage.count_unread_alerts().await.expect("unread"), 0);
    assert!(storage.list_open_alerts(None).await.expect("open").is_empty());
}

#[tokio::test]
async fn insight_suppression_window_matches_key() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let insight = Insight {
        id: Uuid::new_v4(),
        insight_type: InsightType::PriceIncrease,
        title: "Netflix went up".to_string(),
        description: "Netflix charged 20% more".to_string(),
        action_text: None,
        impact_amount: Some(3.0),
        severity: InsightSeverity::Warning,
        merchant_name: Some("Netflix".to_string()),
        category: None,
        is_dismissed: false,
        generated_at: Utc::now(),
    };
    storage.insert_insight(&insight).await.expect("insert");

    let week_ago = Utc::now() - chrono::Duration::days(7);
    assert!(storage
        .insight_generated_since(InsightType::PriceIncrease, Some("Netflix"), week_ago)
        .await
        .expect("lookup"));
    assert!(!storage
        .insight_generated_since(InsightType::PriceIncrease, Some("Spotify"), week_ago)
        .await
        .expect("lookup"));
}

#[tokio::test]
async fn analysis_results_list_newest_first_and_follow_their_statement() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let stmt = statement(StatementStatus::Completed);
    storage.insert_statement(&stmt).await.expect("statement");
    let earlier = Utc::now() - chrono::Duration::seconds(5);
    for (analysis_type, created_at) in [
        (AnalysisType::Categorization, earlier),
        (AnalysisType::Summary, Utc::now()),
    ] {
        let result = AnalysisResult {
            id: Uuid::new_v4(),
            statement_id: stmt.id,
            analysis_type,
            result_data: serde_json::json!({ "summary": "ok", "count": 2 }),
            model_used: Some("llama3.2".to_string()),
            processing_ms: Some(40),
            created_at,
        };
        storage.insert_analysis_result(&result).await.expect("insert");
    }

    let listed = storage.list_analysis_results(stmt.id).await.expect("list");
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].analysis_type, AnalysisType::Summary);
    assert_eq!(listed[1].result_data["count"], 2);

    storage.delete_statement(stmt.id).await.expect("delete");
    assert!(storage.list_analysis_results(stmt.id).await.expect("list").is_empty());
}

#[tokio::test]
async fn categorizations_only_overwrite_supplied_fields() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let card = account("Card", AccountType::CreditCard);
    storage.insert_account(&card).await.expect("account");
    let row = txn(card.id, date(2024, 3, 1), "SQ *BLUE BOTTLE", "Other", 6.5);
    storage.insert_transactions(&[row.clone()]).await.expect("insert");

    let changed = storage
        .apply_categorizations(&[
            Categorization {
                transaction_id: row.id,
                category: Some("Dining".to_string()),
                subcategory: Some("Coffee".to_string()),
                merchant_name: None,
            },
            Categorization {
                transaction_id: Uuid::new_v4(),
                ..Categorization::default()
            },
        ])
        .await
        .expect("apply");
    assert_eq!(changed, 1);

    let stored = storage
        .get_transaction(row.id)
        .await
        .expect("get")
        .expect("row");
    assert_eq!(stored.category.as_deref(), Some("Dining"));
    assert_eq!(stored.subcategory.as_deref(), Some("Coffee"));
    assert_eq!(stored.merchant_name.as_deref(), Some("SQ *BLUE BOTTLE"));
}
