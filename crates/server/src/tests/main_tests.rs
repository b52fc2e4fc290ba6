use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
};
use chrono::{NaiveDate, Utc};
use serde_json::{json, Value};
use server_api::LlmClient;
use shared::{
    domain::{InsightSeverity, InsightType, StatementStatus, TransactionType},
    error::ApiException,
};
use tower::ServiceExt;

use super::*;
use crate::scheduler::DailyGate;

struct OfflineLlm;

#[async_trait]
impl LlmClient for OfflineLlm {
    async fn generate(&self, _prompt: &str) -> Result<String, ApiException> {
        Err(ApiException::new(
            ErrorCode::Unavailable,
            "Could not reach Ollama. Make sure Ollama is running.",
        ))
    }
}

async fn test_app() -> (Router, ApiContext, tempfile::TempDir) {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let uploads = tempfile::tempdir().expect("upload dir");
    let api = ApiContext::new(storage, Arc::new(OfflineLlm), uploads.path());
    let app = build_router(Arc::new(AppState {
        api: api.clone(),
        max_upload_bytes: 1024 * 1024,
    }));
    (app, api, uploads)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, body)
}

fn get_req(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("request")
}

fn json_req(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn upload_req(file_name: &str, bytes: &[u8]) -> Request<Body> {
    let boundary = "statement-boundary";
    let mut body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
         Content-Type: application/pdf\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    Request::post("/api/statements/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .expect("request")
}

fn spend(day: NaiveDate, merchant: &str, amount: f64, category: &str) -> Transaction {
    Transaction {
        id: Uuid::new_v4(),
        account_id: None,
        account_name: None,
        statement_id: None,
        transaction_date: day,
        post_date: None,
        description: Some(merchant.to_string()),
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

async fn wait_for_status(app: &Router, id: &str, wanted: &str) -> Value {
    for _ in 0..200 {
        let (status, body) = send(app, get_req(&format!("/api/statements/{id}"))).await;
        assert_eq!(status, StatusCode::OK);
        if body["status"] == wanted {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("statement {id} never reached {wanted}");
}

#[tokio::test]
async fn utilization_is_card_balance_over_card_limit() {
    let (app, _api, _dir) = test_app().await;
    for account in [
        json!({"name": "Visa", "type": "CREDIT_CARD", "creditLimit": 1000.0, "currentBalance": 250.0}),
        json!({"name": "Amex", "type": "CREDIT_CARD", "creditLimit": 3000.0, "currentBalance": 750.0}),
        json!({"name": "Checking", "type": "CHECKING", "currentBalance": 5000.0}),
    ] {
        let (status, _) = send(&app, json_req(Method::POST, "/api/accounts", account)).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, dashboard) = send(&app, get_req("/api/dashboard")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dashboard["totalCreditCardBalance"], 1000.0);
    assert_eq!(dashboard["totalCreditLimit"], 4000.0);
    assert_eq!(dashboard["totalAvailableCredit"], 3000.0);
    assert_eq!(dashboard["overallUtilizationPercent"], 25.0);
    assert_eq!(dashboard["totalCheckingBalance"], 5000.0);

    let (_, accounts) = send(&app, get_req("/api/accounts")).await;
    let cards: Vec<&Value> = accounts
        .as_array()
        .expect("array")
        .iter()
        .filter(|a| a["type"] == "CREDIT_CARD")
        .collect();
    assert_eq!(cards.len(), 2);
    assert!(cards.iter().all(|c| c["utilizationPercent"] == 25.0));
}

#[tokio::test]
async fn transaction_pages_are_consistent() {
    let (app, api, _dir) = test_app().await;
    let rows: Vec<Transaction> = (1..=7)
        .map(|day| {
            spend(
                NaiveDate::from_ymd_opt(2024, 5, day).expect("date"),
                "Store",
                f64::from(day),
                "Shopping",
            )
        })
        .collect();
    api.storage.insert_transactions(&rows).await.expect("seed");

    let (status, page) = send(&app, get_req("/api/transactions?page=1&size=3")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["totalElements"], 7);
    assert_eq!(page["totalPages"], 3);
    assert_eq!(page["number"], 1);
    assert_eq!(page["size"], 3);
    let dates: Vec<&str> = page["content"]
        .as_array()
        .expect("content")
        .iter()
        .map(|t| t["transactionDate"].as_str().expect("date"))
        .collect();
    assert_eq!(dates, ["2024-05-04", "2024-05-03", "2024-05-02"]);

    let (_, last) = send(&app, get_req("/api/transactions?page=2&size=3")).await;
    assert_eq!(last["content"].as_array().expect("content").len(), 1);

    let (_, clamped) = send(&app, get_req("/api/transactions?page=-4&size=0")).await;
    assert_eq!(clamped["number"], 0);
    assert_eq!(clamped["size"], 1);
    assert_eq!(clamped["totalPages"], 7);

    let (_, searched) = send(&app, get_req("/api/transactions/search?q=STORE&size=50")).await;
    assert_eq!(searched["totalElements"], 7);

    let (status, beyond) = send(&app, get_req("/api/transactions?page=5&size=10")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(beyond["number"], 0);
    assert_eq!(beyond["totalPages"], 1);
    assert_eq!(beyond["content"].as_array().expect("content").len(), 7);

    let (status, huge) = send(&app, get_req("/api/transactions?page=9223372036854775807&size=500")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(huge["number"], 0);

    let uri = "/api/transactions/search?q=store&page=9223372036854775807&size=3";
    let (status, searched) = send(&app, get_req(uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(searched["number"], 2);
}

#[tokio::test]
async fn dismissing_an_insight_returns_it() {
    let (app, api, _dir) = test_app().await;
    let insight = Insight {
        id: Uuid::new_v4(),
        insight_type: InsightType::PriceIncrease,
        title: "Netflix costs more".into(),
        description: "Netflix went from $15.49 to $17.99.".into(),
        action_text: None,
        impact_amount: Some(2.5),
        severity: InsightSeverity::Warning,
        merchant_name: Some("Netflix".into()),
        category: None,
        is_dismissed: false,
        generated_at: Utc::now(),
    };
    api.storage.insert_insight(&insight).await.expect("seed");

    let uri = format!("/api/insights/{}/dismiss", insight.id);
    let (status, body) = send(&app, json_req(Method::PUT, &uri, Value::Null)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], insight.id.to_string());
    assert_eq!(body["isDismissed"], true);

    let (_, open) = send(&app, get_req("/api/insights")).await;
    assert!(open.as_array().expect("array").is_empty());

    let uri = format!("/api/insights/{}/dismiss", Uuid::new_v4());
    let (status, _) = send(&app, json_req(Method::PUT, &uri, Value::Null)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn detected_income_reports_monthly_income() {
    let (app, _api, _dir) = test_app().await;
    let (status, body) = send(&app, json_req(Method::POST, "/api/profile/detect-income", Value::Null)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["monthlyIncome"], 0.0);
}

#[tokio::test]
async fn statement_moves_through_processing_states() {
    let (app, api, _dir) = test_app().await;

    let (status, body) = send(&app, upload_req("notes.txt", b"just text")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation");

    let (status, uploaded) = send(&app, upload_req("statement.pdf", b"%PDF-1.4\nnot really a pdf\n")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(uploaded["status"], "PENDING");
    let id = uploaded["id"].as_str().expect("id").to_string();

    let failed = wait_for_status(&app, &id, "FAILED").await;
    assert!(failed["errorMessage"].as_str().is_some_and(|m| !m.is_empty()));

    let (status, body) = send(&app, json_req(Method::POST, &format!("/api/statements/{id}/reprocess"), Value::Null)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, Value::Null);
    wait_for_status(&app, &id, "FAILED").await;

    let pending = Statement {
        id: Uuid::new_v4(),
        account_id: None,
        account: None,
        file_name: "queued.pdf".into(),
        file_path: "queued.pdf".into(),
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
    api.storage.insert_statement(&pending).await.expect("pending");
    let uri = format!("/api/statements/{}/reprocess", pending.id);
    let (status, _) = send(&app, json_req(Method::POST, &uri, Value::Null)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let uri = format!("/api/statements/{}/reprocess", Uuid::new_v4());
    let (status, body) = send(&app, json_req(Method::POST, &uri, Value::Null)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");

    let delete = Request::delete(format!("/api/statements/{id}"))
        .body(Body::empty())
        .expect("request");
    let (status, _) = send(&app, delete).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, get_req(&format!("/api/statements/{id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn budget_statuses_follow_the_bands() {
    let (app, api, _dir) = test_app().await;
    for (category, limit) in [("Dining", 100.0), ("Groceries", 50.0), ("Gas", 100.0)] {
        let (status, _) = send(
            &app,
            json_req(
                Method::POST,
                "/api/budgets",
                json!({"category": category, "monthlyLimit": limit}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
    let day = today();
    api.storage
        .insert_transactions(&[
            spend(day, "Bistro", 80.0, "Dining"),
            spend(day, "Market", 50.0, "Groceries"),
            spend(day, "Shell", 10.0, "Gas"),
        ])
        .await
        .expect("seed");

    let (status, budgets) = send(&app, get_req("/api/budgets")).await;
    assert_eq!(status, StatusCode::OK);
    let rows: Vec<(&str, &str, f64)> = budgets
        .as_array()
        .expect("array")
        .iter()
        .map(|b| {
            (
                b["category"].as_str().expect("category"),
                b["status"].as_str().expect("status"),
                b["percentUsed"].as_f64().expect("percent"),
            )
        })
        .collect();
    assert_eq!(
        rows,
        [
            ("Groceries", "RED", 100.0),
            ("Dining", "YELLOW", 80.0),
            ("Gas", "GREEN", 10.0),
        ]
    );
}

#[tokio::test]
async fn goal_progress_adds_to_current_amount() {
    let (app, _api, _dir) = test_app().await;
    let (status, goal) = send(
        &app,
        json_req(
            Method::POST,
            "/api/goals",
            json!({"name": "Trip", "targetAmount": 1000.0, "currentAmount": 400.0}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = goal["id"].as_str().expect("id");

    let uri = format!("/api/goals/{id}/progress");
    let (status, updated) = send(&app, json_req(Method::POST, &uri, json!({"amount": 100.0}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["currentAmount"], 500.0);
    assert_eq!(updated["percentComplete"], 50.0);

    let (status, _) = send(
        &app,
        json_req(Method::POST, "/api/goals", json!({"name": "Nothing", "targetAmount": 0.0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let uri = format!("/api/goals/{}/progress", Uuid::new_v4());
    let (status, _) = send(&app, json_req(Method::POST, &uri, json!({"amount": 5.0}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn errors_map_to_http_statuses() {
    let (app, _api, _dir) = test_app().await;

    let (status, body) = send(&app, get_req(&format!("/api/accounts/{}", Uuid::new_v4()))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");

    let (status, body) = send(&app, json_req(Method::POST, "/api/chat", json!({"message": "How am I doing?"}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "unavailable");

    let (status, suggestions) = send(&app, get_req("/api/chat/suggestions")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(suggestions.as_array().expect("array").len(), 10);
}

#[tokio::test]
async fn csv_export_is_an_attachment() {
    let (app, _api, _dir) = test_app().await;
    let response = app
        .clone()
        .oneshot(get_req("/api/export/transactions/csv?from=2024-01-01&to=2024-01-31"))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().expect("type");
    assert!(content_type.starts_with("text/csv"));
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .expect("disposition");
    assert!(disposition.starts_with("attachment"));
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    assert!(bytes.starts_with(b"Date,Merchant,Category,Amount,Type,Account,Description"));

    let (status, _) = send(&app, get_req("/api/export/transactions/csv?from=2024-02-01&to=2024-01-01")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[test]
fn every_error_code_has_a_status() {
    assert_eq!(status_for(ErrorCode::NotFound), StatusCode::NOT_FOUND);
    assert_eq!(status_for(ErrorCode::Validation), StatusCode::BAD_REQUEST);
    assert_eq!(status_for(ErrorCode::Unavailable), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(status_for(ErrorCode::Internal), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn daily_gate_runs_once_per_date() {
    let mut gate = DailyGate::default();
    let monday = NaiveDate::from_ymd_opt(2024, 6, 3).expect("date");
    assert!(gate.claim(monday));
    assert!(!gate.claim(monday));
    assert!(gate.claim(monday.succ_opt().expect("tuesday")));
}

#[tokio::test]
async fn analysis_routes_check_the_statement() {
    let (app, _api, _dir) = test_app().await;
    let missing = Uuid::new_v4();
    let (status, body) = send(
        &app,
        json_req(Method::POST, &format!("/api/analysis/run/{missing}"), Value::Null),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");

    let (status, body) = send(&app, upload_req("march.pdf", b"%PDF-1.4 test")).await;
    assert_eq!(status, StatusCode::OK);
    let id = body["id"].as_str().expect("id").to_string();

    let (status, body) = send(
        &app,
        json_req(Method::POST, &format!("/api/analysis/run/{id}"), Value::Null),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "STARTED");

    let (status, body) = send(&app, get_req(&format!("/api/analysis/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_array());
}

#[tokio::test]
async fn reports_fall_back_when_the_model_is_offline() {
    let (app, _api, _dir) = test_app().await;

    let (status, brain) = send(&app, get_req("/api/brain")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(brain["aiAvailable"], false);
    assert_eq!(brain["monthlyIncome"], 4000.0);
    assert_eq!(brain["scenarios"].as_array().map(Vec::len), Some(3));

    let (status, plan) = send(
        &app,
        json_req(Method::POST, "/api/chat/savings-plan?target=450", Value::Null),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(plan["targetAdditionalSavings"], 450.0);
    assert_eq!(plan["aiAvailable"], false);

    let (status, _) = send(
        &app,
        json_req(Method::POST, "/api/chat/savings-plan?target=-5", Value::Null),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        json_req(Method::POST, "/api/chat/enriched", json!({"message": "Where can I save?"})),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "unavailable");
}
