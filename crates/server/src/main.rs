use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::Datelike;
use serde::Deserialize;
use server_api::{
    accounts, alert_rules, alerts, analysis, analytics, budgets, chat, dashboard, digest, export,
    goals, insights, networth, profile, search, statements, subscriptions, today, transactions,
    ApiContext, OllamaClient,
};
use shared::{
    domain::{
        AccountBalanceSnapshot, Alert, AlertRule, AnalysisResult, Budget, FinancialProfile, Insight,
        ManualAsset, NetWorthSnapshot, Statement, Subscription, Transaction,
    },
    error::{ApiError, ErrorCode},
    protocol::{
        AccountRequest, AccountResponse, AlertRuleRequest, AnalysisStarted, AnnualReviewResponse,
        BrainReportResponse, BudgetRequest, BudgetStatusResponse, CashFlowResponse,
        CategoryAssignment, ChatRequest, ChatResponse, CreditScoreResponse, CsvExportQuery, DashboardResponse, DebtPayoffResponse,
        DetectedIncome, DetectionSummary, DuplicateTransactionGroup, FinancialProfileRequest,
        FireCalculatorResponse, FireQuery, GoalProgressRequest, HealthScoreResponse,
        InsightRunSummary, ManualAssetRequest, MerchantTrendResponse, MonthQuery,
        NetWorthResponse, Page, SavingsGoalRequest, SavingsGoalResponse, SavingsPlanQuery,
        SavingsPlanResponse, SearchResult, SpendingHeatmapResponse, StatementRawText, SubscriptionUpdate, TransactionFilter,
        TransactionUpdate, UnreadCount, WeeklyDigestResponse, WhatIfDataPoint,
    },
};
use storage::Storage;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod app_state;
mod config;
mod scheduler;

use app_state::AppState;
use config::{load_settings, prepare_database_url};

type HttpError = (StatusCode, Json<ApiError>);
type HttpResult<T> = Result<T, HttpError>;

#[derive(Debug, Deserialize)]
struct PageQuery {
    page: Option<i64>,
    size: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    q: Option<String>,
    page: Option<i64>,
    size: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    days: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ExtraQuery {
    extra: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct YearQuery {
    year: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct CashFlowQuery {
    year: Option<i32>,
    month: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct MerchantQuery {
    merchant: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let ollama_url = url::Url::parse(&settings.ollama_url)?;
    let llm = OllamaClient::new(ollama_url.as_str().trim_end_matches('/'), &settings.ollama_model)?;
    let api = ApiContext::new(storage, Arc::new(llm), &settings.upload_dir);
    info!(
        upload_dir = %settings.upload_dir.display(),
        ollama = %ollama_url,
        model = %settings.ollama_model,
        "api context ready"
    );

    for statement_id in statements::recover_interrupted(&api)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?
    {
        spawn_processing(api.clone(), statement_id);
    }

    if settings.scheduler_enabled {
        scheduler::spawn(api.clone());
    } else {
        warn!("scheduler disabled; daily alerts and snapshots will not run");
    }

    let state = AppState {
        api,
        max_upload_bytes: settings.max_upload_bytes,
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    let max_upload_bytes = state.max_upload_bytes;
    let api = Router::new()
        .route("/accounts", get(list_accounts).post(create_account))
        .route("/accounts/capture-balances", post(capture_balances))
        .route(
            "/accounts/:id",
            get(get_account).put(update_account).delete(delete_account),
        )
        .route("/accounts/:id/transactions", get(account_transactions))
        .route("/accounts/:id/balance-history", get(balance_history))
        .route("/statements", get(list_statements))
        .route("/statements/upload", post(upload_statement))
        .route("/statements/:id", get(get_statement).delete(delete_statement))
        .route("/statements/:id/reprocess", post(reprocess_statement))
        .route("/statements/:id/raw-text", get(statement_raw_text))
        .route(
            "/statements/:id/assign-account/:account_id",
            put(assign_statement_account),
        )
        .route("/transactions", get(list_transactions))
        .route("/transactions/anomalies", get(list_anomalies))
        .route("/transactions/search", get(search_transactions))
        .route("/transactions/bulk-categorize", post(bulk_categorize))
        .route(
            "/transactions/:id",
            get(get_transaction).put(update_transaction),
        )
        .route("/alerts", get(list_alerts))
        .route("/alerts/unread-count", get(unread_alert_count))
        .route("/alerts/:id", delete(delete_alert))
        .route("/alerts/:id/read", put(mark_alert_read))
        .route("/alerts/:id/resolve", put(resolve_alert))
        .route("/alert-rules", get(list_alert_rules).post(create_alert_rule))
        .route(
            "/alert-rules/:id",
            put(update_alert_rule).delete(delete_alert_rule),
        )
        .route("/subscriptions", get(list_subscriptions))
        .route("/subscriptions/duplicates", get(list_duplicate_subscriptions))
        .route("/subscriptions/detect", post(detect_subscriptions))
        .route("/subscriptions/:id", put(update_subscription))
        .route("/budgets", get(list_budgets).post(upsert_budget))
        .route("/budgets/:id", put(update_budget).delete(delete_budget))
        .route("/profile", get(get_profile).put(update_profile))
        .route("/profile/detect-income", post(detect_income))
        .route("/goals", get(list_goals).post(create_goal))
        .route("/goals/:id", put(update_goal).delete(delete_goal))
        .route("/goals/:id/progress", post(add_goal_progress))
        .route("/networth", get(get_net_worth))
        .route("/networth/history", get(net_worth_history))
        .route("/networth/snapshot", post(capture_net_worth))
        .route("/networth/assets", get(list_assets).post(create_asset))
        .route(
            "/networth/assets/:id",
            put(update_asset).delete(delete_asset),
        )
        .route("/insights", get(list_insights))
        .route("/insights/run", post(run_insights))
        .route("/insights/:id/dismiss", put(dismiss_insight))
        .route("/insights/debt-payoff", get(debt_payoff))
        .route("/insights/debt-payoff/what-if", get(debt_payoff_what_if))
        .route("/insights/health-score", get(health_score))
        .route("/insights/cash-flow", get(cash_flow))
        .route("/insights/annual-review", get(annual_review))
        .route("/insights/spending-heatmap", get(spending_heatmap))
        .route("/insights/merchant-trend", get(merchant_trend))
        .route("/insights/credit-score", get(credit_score))
        .route("/insights/fire-calculator", get(fire_calculator))
        .route("/insights/duplicates", get(duplicate_transactions))
        .route("/analysis/run/:statement_id", post(run_analysis))
        .route("/analysis/:statement_id", get(list_analysis))
        .route("/brain", get(brain_report))
        .route("/chat", post(ask_advisor))
        .route("/chat/enriched", post(ask_advisor_enriched))
        .route("/chat/savings-plan", post(savings_plan))
        .route("/chat/suggestions", get(chat_suggestions))
        .route("/dashboard", get(get_dashboard))
        .route("/search", get(global_search))
        .route("/digest", get(weekly_digest))
        .route("/export/transactions/csv", get(export_transactions_csv))
        .route("/export/monthly-pdf", get(export_monthly_pdf));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/api", api)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(err: ApiError) -> HttpError {
    let status = status_for(err.code);
    if status.is_server_error() {
        error!(code = ?err.code, message = %err.message, "request failed");
    }
    (status, Json(err))
}

fn bad_request(message: impl Into<String>) -> HttpError {
    reject(ApiError::validation(message))
}

/// Runs model analysis off the request path. Results are read back from `/analysis/:id`.
fn spawn_analysis(api: ApiContext, statement_id: Uuid) {
    tokio::spawn(async move {
        if let Err(error) = analysis::run_analysis(&api, statement_id).await {
            error!(%statement_id, %error, "statement analysis aborted");
        }
    });
}

/// Processes the statement off the request path. The outcome lands on the statement itself.
fn spawn_processing(api: ApiContext, statement_id: Uuid) {
    tokio::spawn(async move {
        if let Err(error) = statements::process_statement(&api, statement_id).await {
            error!(%statement_id, %error, "statement processing aborted");
        }
    });
}

async fn healthz(State(state): State<Arc<AppState>>) -> HttpResult<&'static str> {
    state
        .api
        .storage
        .health_check()
        .await
        .map_err(|e| reject(ApiError::new(ErrorCode::Internal, e.to_string())))?;
    Ok("ok")
}

// Accounts

async fn list_accounts(
    State(state): State<Arc<AppState>>,
) -> HttpResult<Json<Vec<AccountResponse>>> {
    accounts::list_accounts(&state.api).await.map(Json).map_err(reject)
}

async fn get_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> HttpResult<Json<AccountResponse>> {
    accounts::get_account(&state.api, id).await.map(Json).map_err(reject)
}

async fn create_account(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AccountRequest>,
) -> HttpResult<Json<AccountResponse>> {
    accounts::create_account(&state.api, req).await.map(Json).map_err(reject)
}

async fn update_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<AccountRequest>,
) -> HttpResult<Json<AccountResponse>> {
    accounts::update_account(&state.api, id, req)
        .await
        .map(Json)
        .map_err(reject)
}

async fn delete_account(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> HttpResult<StatusCode> {
    accounts::delete_account(&state.api, id).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn account_transactions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(q): Query<PageQuery>,
) -> HttpResult<Json<Page<Transaction>>> {
    accounts::account_transactions(&state.api, id, q.page, q.size)
        .await
        .map(Json)
        .map_err(reject)
}

async fn balance_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(q): Query<HistoryQuery>,
) -> HttpResult<Json<Vec<AccountBalanceSnapshot>>> {
    accounts::balance_history(&state.api, id, q.days)
        .await
        .map(Json)
        .map_err(reject)
}

async fn capture_balances(State(state): State<Arc<AppState>>) -> HttpResult<StatusCode> {
    let captured = accounts::capture_balances(&state.api).await.map_err(reject)?;
    info!(captured, "balance snapshots captured");
    Ok(StatusCode::NO_CONTENT)
}

// Statements

async fn upload_statement(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> HttpResult<Json<Statement>> {
    let mut upload = None;
    let mut account_id = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(e.body_text()))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or("statement.pdf").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(e.body_text()))?;
                upload = Some((file_name, bytes));
            }
            Some("accountId") => {
                let raw = field.text().await.map_err(|e| bad_request(e.body_text()))?;
                let raw = raw.trim();
                if !raw.is_empty() {
                    let id = Uuid::parse_str(raw)
                        .map_err(|_| bad_request(format!("accountId is not a valid id: {raw}")))?;
                    account_id = Some(id);
                }
            }
            _ => {}
        }
    }
    let Some((file_name, bytes)) = upload else {
        return Err(bad_request("file is required"));
    };

    let statement = statements::upload_statement(&state.api, &file_name, &bytes, account_id)
        .await
        .map_err(reject)?;
    spawn_processing(state.api.clone(), statement.id);
    Ok(Json(statement))
}

async fn list_statements(State(state): State<Arc<AppState>>) -> HttpResult<Json<Vec<Statement>>> {
    statements::list_statements(&state.api).await.map(Json).map_err(reject)
}

async fn get_statement(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> HttpResult<Json<Statement>> {
    statements::get_statement(&state.api, id).await.map(Json).map_err(reject)
}

async fn reprocess_statement(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> HttpResult<StatusCode> {
    statements::reprocess_statement(&state.api, id)
        .await
        .map_err(reject)?;
    spawn_processing(state.api.clone(), id);
    Ok(StatusCode::ACCEPTED)
}

async fn delete_statement(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> HttpResult<StatusCode> {
    statements::delete_statement(&state.api, id).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn assign_statement_account(
    State(state): State<Arc<AppState>>,
    Path((id, account_id)): Path<(Uuid, Uuid)>,
) -> HttpResult<Json<Statement>> {
    statements::assign_account(&state.api, id, account_id)
        .await
        .map(Json)
        .map_err(reject)
}

async fn statement_raw_text(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> HttpResult<Json<StatementRawText>> {
    statements::raw_text(&state.api, id).await.map(Json).map_err(reject)
}

// Transactions

async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<TransactionFilter>,
) -> HttpResult<Json<Page<Transaction>>> {
    transactions::list_transactions(&state.api, filter)
        .await
        .map(Json)
        .map_err(reject)
}

async fn search_transactions(
    State(state): State<Arc<AppState>>,
    Query(q): Query<SearchQuery>,
) -> HttpResult<Json<Page<Transaction>>> {
    transactions::search_transactions(&state.api, q.q.unwrap_or_default(), q.page, q.size)
        .await
        .map(Json)
        .map_err(reject)
}

async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> HttpResult<Json<Transaction>> {
    transactions::get_transaction(&state.api, id)
        .await
        .map(Json)
        .map_err(reject)
}

async fn update_transaction(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(update): Json<TransactionUpdate>,
) -> HttpResult<Json<Transaction>> {
    transactions::update_transaction(&state.api, id, update)
        .await
        .map(Json)
        .map_err(reject)
}

async fn list_anomalies(State(state): State<Arc<AppState>>) -> HttpResult<Json<Vec<Transaction>>> {
    transactions::list_anomalies(&state.api).await.map(Json).map_err(reject)
}

async fn bulk_categorize(
    State(state): State<Arc<AppState>>,
    Json(assignments): Json<Vec<CategoryAssignment>>,
) -> HttpResult<StatusCode> {
    transactions::bulk_categorize(&state.api, assignments)
        .await
        .map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

// Alerts and rules

async fn list_alerts(State(state): State<Arc<AppState>>) -> HttpResult<Json<Vec<Alert>>> {
    alerts::list_alerts(&state.api).await.map(Json).map_err(reject)
}

async fn unread_alert_count(State(state): State<Arc<AppState>>) -> HttpResult<Json<UnreadCount>> {
    alerts::unread_count(&state.api).await.map(Json).map_err(reject)
}

async fn mark_alert_read(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> HttpResult<Json<Alert>> {
    alerts::mark_read(&state.api, id).await.map(Json).map_err(reject)
}

async fn resolve_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> HttpResult<Json<Alert>> {
    alerts::resolve(&state.api, id).await.map(Json).map_err(reject)
}

async fn delete_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> HttpResult<StatusCode> {
    alerts::delete_alert(&state.api, id).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_alert_rules(State(state): State<Arc<AppState>>) -> HttpResult<Json<Vec<AlertRule>>> {
    alert_rules::list_rules(&state.api).await.map(Json).map_err(reject)
}

async fn create_alert_rule(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AlertRuleRequest>,
) -> HttpResult<Json<AlertRule>> {
    alert_rules::create_rule(&state.api, req).await.map(Json).map_err(reject)
}

async fn update_alert_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<AlertRuleRequest>,
) -> HttpResult<Json<AlertRule>> {
    alert_rules::update_rule(&state.api, id, req)
        .await
        .map(Json)
        .map_err(reject)
}

async fn delete_alert_rule(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> HttpResult<StatusCode> {
    alert_rules::delete_rule(&state.api, id).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

// Subscriptions and budgets

async fn list_subscriptions(
    State(state): State<Arc<AppState>>,
) -> HttpResult<Json<Vec<Subscription>>> {
    subscriptions::list_subscriptions(&state.api)
        .await
        .map(Json)
        .map_err(reject)
}

async fn list_duplicate_subscriptions(
    State(state): State<Arc<AppState>>,
) -> HttpResult<Json<Vec<Subscription>>> {
    subscriptions::list_duplicates(&state.api)
        .await
        .map(Json)
        .map_err(reject)
}

async fn update_subscription(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(update): Json<SubscriptionUpdate>,
) -> HttpResult<Json<Subscription>> {
    subscriptions::update_subscription(&state.api, id, update)
        .await
        .map(Json)
        .map_err(reject)
}

async fn detect_subscriptions(
    State(state): State<Arc<AppState>>,
) -> HttpResult<Json<DetectionSummary>> {
    subscriptions::detect_all(&state.api).await.map(Json).map_err(reject)
}

async fn list_budgets(
    State(state): State<Arc<AppState>>,
) -> HttpResult<Json<Vec<BudgetStatusResponse>>> {
    budgets::list_budgets(&state.api).await.map(Json).map_err(reject)
}

async fn upsert_budget(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BudgetRequest>,
) -> HttpResult<Json<Budget>> {
    budgets::upsert_budget(&state.api, req).await.map(Json).map_err(reject)
}

async fn update_budget(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<BudgetRequest>,
) -> HttpResult<Json<Budget>> {
    budgets::update_budget(&state.api, id, req)
        .await
        .map(Json)
        .map_err(reject)
}

async fn delete_budget(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> HttpResult<StatusCode> {
    budgets::delete_budget(&state.api, id).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

// Profile, goals and net worth

async fn get_profile(State(state): State<Arc<AppState>>) -> HttpResult<Json<FinancialProfile>> {
    profile::get_profile(&state.api).await.map(Json).map_err(reject)
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FinancialProfileRequest>,
) -> HttpResult<Json<FinancialProfile>> {
    profile::update_profile(&state.api, req).await.map(Json).map_err(reject)
}

async fn detect_income(State(state): State<Arc<AppState>>) -> HttpResult<Json<DetectedIncome>> {
    profile::detect_income(&state.api).await.map(Json).map_err(reject)
}

async fn list_goals(
    State(state): State<Arc<AppState>>,
) -> HttpResult<Json<Vec<SavingsGoalResponse>>> {
    goals::list_goals(&state.api).await.map(Json).map_err(reject)
}

async fn create_goal(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SavingsGoalRequest>,
) -> HttpResult<Json<SavingsGoalResponse>> {
    goals::create_goal(&state.api, req).await.map(Json).map_err(reject)
}

async fn update_goal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<SavingsGoalRequest>,
) -> HttpResult<Json<SavingsGoalResponse>> {
    goals::update_goal(&state.api, id, req).await.map(Json).map_err(reject)
}

async fn add_goal_progress(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<GoalProgressRequest>,
) -> HttpResult<Json<SavingsGoalResponse>> {
    goals::add_progress(&state.api, id, req).await.map(Json).map_err(reject)
}

async fn delete_goal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> HttpResult<StatusCode> {
    goals::delete_goal(&state.api, id).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_net_worth(State(state): State<Arc<AppState>>) -> HttpResult<Json<NetWorthResponse>> {
    networth::get_net_worth(&state.api).await.map(Json).map_err(reject)
}

async fn net_worth_history(
    State(state): State<Arc<AppState>>,
) -> HttpResult<Json<Vec<NetWorthSnapshot>>> {
    networth::history(&state.api).await.map(Json).map_err(reject)
}

async fn capture_net_worth(
    State(state): State<Arc<AppState>>,
) -> HttpResult<Json<NetWorthSnapshot>> {
    networth::capture_snapshot(&state.api).await.map(Json).map_err(reject)
}

async fn list_assets(State(state): State<Arc<AppState>>) -> HttpResult<Json<Vec<ManualAsset>>> {
    networth::list_assets(&state.api).await.map(Json).map_err(reject)
}

async fn create_asset(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ManualAssetRequest>,
) -> HttpResult<Json<ManualAsset>> {
    networth::create_asset(&state.api, req).await.map(Json).map_err(reject)
}

async fn update_asset(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<ManualAssetRequest>,
) -> HttpResult<Json<ManualAsset>> {
    networth::update_asset(&state.api, id, req)
        .await
        .map(Json)
        .map_err(reject)
}

async fn delete_asset(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> HttpResult<StatusCode> {
    networth::delete_asset(&state.api, id).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

// Insights and analytics

async fn list_insights(State(state): State<Arc<AppState>>) -> HttpResult<Json<Vec<Insight>>> {
    insights::list_insights(&state.api).await.map(Json).map_err(reject)
}

async fn run_insights(State(state): State<Arc<AppState>>) -> HttpResult<Json<InsightRunSummary>> {
    insights::run(&state.api).await.map(Json).map_err(reject)
}

async fn dismiss_insight(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> HttpResult<Json<Insight>> {
    insights::dismiss(&state.api, id).await.map(Json).map_err(reject)
}

async fn debt_payoff(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ExtraQuery>,
) -> HttpResult<Json<DebtPayoffResponse>> {
    analytics::debt_payoff::debt_payoff(&state.api, q.extra.unwrap_or(0.0))
        .await
        .map(Json)
        .map_err(reject)
}

async fn debt_payoff_what_if(
    State(state): State<Arc<AppState>>,
) -> HttpResult<Json<Vec<WhatIfDataPoint>>> {
    analytics::debt_payoff::what_if(&state.api)
        .await
        .map(Json)
        .map_err(reject)
}

async fn health_score(State(state): State<Arc<AppState>>) -> HttpResult<Json<HealthScoreResponse>> {
    analytics::health::health_score(&state.api)
        .await
        .map(Json)
        .map_err(reject)
}

async fn cash_flow(
    State(state): State<Arc<AppState>>,
    Query(q): Query<CashFlowQuery>,
) -> HttpResult<Json<CashFlowResponse>> {
    let now = today();
    analytics::cash_flow::cash_flow(
        &state.api,
        q.year.unwrap_or(now.year()),
        q.month.unwrap_or(now.month()),
    )
    .await
    .map(Json)
    .map_err(reject)
}

async fn annual_review(
    State(state): State<Arc<AppState>>,
    Query(q): Query<YearQuery>,
) -> HttpResult<Json<AnnualReviewResponse>> {
    let year = q.year.unwrap_or_else(|| today().year());
    analytics::annual_review::annual_review(&state.api, year)
        .await
        .map(Json)
        .map_err(reject)
}

async fn spending_heatmap(
    State(state): State<Arc<AppState>>,
    Query(q): Query<YearQuery>,
) -> HttpResult<Json<SpendingHeatmapResponse>> {
    let year = q.year.unwrap_or_else(|| today().year());
    analytics::spending::spending_heatmap(&state.api, year)
        .await
        .map(Json)
        .map_err(reject)
}

async fn merchant_trend(
    State(state): State<Arc<AppState>>,
    Query(q): Query<MerchantQuery>,
) -> HttpResult<Json<MerchantTrendResponse>> {
    let merchant = q
        .merchant
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| bad_request("merchant is required"))?;
    analytics::spending::merchant_trend(&state.api, &merchant)
        .await
        .map(Json)
        .map_err(reject)
}

async fn credit_score(State(state): State<Arc<AppState>>) -> HttpResult<Json<CreditScoreResponse>> {
    analytics::credit_score::credit_score(&state.api)
        .await
        .map(Json)
        .map_err(reject)
}

async fn fire_calculator(
    State(state): State<Arc<AppState>>,
    Query(q): Query<FireQuery>,
) -> HttpResult<Json<FireCalculatorResponse>> {
    analytics::fire::fire_calculator(&state.api, q)
        .await
        .map(Json)
        .map_err(reject)
}

async fn duplicate_transactions(
    State(state): State<Arc<AppState>>,
) -> HttpResult<Json<Vec<DuplicateTransactionGroup>>> {
    analytics::spending::duplicate_transactions(&state.api)
        .await
        .map(Json)
        .map_err(reject)
}

// Analysis and reports

async fn run_analysis(
    State(state): State<Arc<AppState>>,
    Path(statement_id): Path<Uuid>,
) -> HttpResult<Json<AnalysisStarted>> {
    let started = analysis::begin_analysis(&state.api, statement_id)
        .await
        .map_err(reject)?;
    spawn_analysis(state.api.clone(), statement_id);
    Ok(Json(started))
}

async fn list_analysis(
    State(state): State<Arc<AppState>>,
    Path(statement_id): Path<Uuid>,
) -> HttpResult<Json<Vec<AnalysisResult>>> {
    analysis::list_analysis(&state.api, statement_id)
        .await
        .map(Json)
        .map_err(reject)
}

async fn brain_report(State(state): State<Arc<AppState>>) -> HttpResult<Json<BrainReportResponse>> {
    analytics::brain::brain_report(&state.api)
        .await
        .map(Json)
        .map_err(reject)
}

async fn savings_plan(
    State(state): State<Arc<AppState>>,
    Query(q): Query<SavingsPlanQuery>,
) -> HttpResult<Json<SavingsPlanResponse>> {
    analytics::savings_plan::savings_plan(&state.api, q)
        .await
        .map(Json)
        .map_err(reject)
}

// Chat, dashboard, search, digest

async fn ask_advisor(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> HttpResult<Json<ChatResponse>> {
    chat::chat(&state.api, req).await.map(Json).map_err(reject)
}

async fn ask_advisor_enriched(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> HttpResult<Json<ChatResponse>> {
    chat::chat_enriched(&state.api, req).await.map(Json).map_err(reject)
}

async fn chat_suggestions() -> Json<Vec<String>> {
    Json(chat::suggestions())
}

async fn get_dashboard(State(state): State<Arc<AppState>>) -> HttpResult<Json<DashboardResponse>> {
    dashboard::dashboard(&state.api).await.map(Json).map_err(reject)
}

async fn global_search(
    State(state): State<Arc<AppState>>,
    Query(q): Query<SearchQuery>,
) -> HttpResult<Json<SearchResult>> {
    search::search(&state.api, q.q).await.map(Json).map_err(reject)
}

async fn weekly_digest(
    State(state): State<Arc<AppState>>,
) -> HttpResult<Json<WeeklyDigestResponse>> {
    digest::weekly_digest(&state.api).await.map(Json).map_err(reject)
}

// Exports

async fn export_transactions_csv(
    State(state): State<Arc<AppState>>,
    Query(q): Query<CsvExportQuery>,
) -> HttpResult<impl IntoResponse> {
    let disposition = format!("attachment; filename=\"transactions_{}_{}.csv\"", q.from, q.to);
    let body = export::transactions_csv(&state.api, q).await.map_err(reject)?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

async fn export_monthly_pdf(
    State(state): State<Arc<AppState>>,
    Query(q): Query<MonthQuery>,
) -> HttpResult<impl IntoResponse> {
    let body = export::monthly_summary_pdf(&state.api, q.year, q.month)
        .await
        .map_err(reject)?;
    let disposition = format!(
        "attachment; filename=\"summary_{}_{:02}.pdf\"",
        q.year, q.month
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
