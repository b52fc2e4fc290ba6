use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    Account, AccountType, ActionType, Alert, BudgetStatus, CutDifficulty, ManualAsset,
    SpendingStatus, Transaction,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub total_elements: u64,
    pub total_pages: u64,
    pub number: u64,
    pub size: u64,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, total_elements: u64, number: u64, size: u64) -> Self {
        let total_pages = if size == 0 {
            0
        } else {
            total_elements.div_ceil(size)
        };
        Self {
            content,
            total_elements,
            total_pages,
            number,
            size,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    #[serde(flatten)]
    pub account: Account,
    pub utilization_percent: Option<f64>,
    pub days_until_promo_apr_expiry: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRequest {
    pub name: Option<String>,
    pub institution: Option<String>,
    #[serde(rename = "type")]
    pub account_type: Option<AccountType>,
    pub last4: Option<String>,
    pub credit_limit: Option<f64>,
    pub current_balance: Option<f64>,
    pub available_credit: Option<f64>,
    pub apr: Option<f64>,
    pub promo_apr: Option<f64>,
    pub promo_apr_end_date: Option<NaiveDate>,
    pub payment_due_day: Option<u32>,
    pub min_payment: Option<f64>,
    pub rewards_program: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionFilter {
    pub account_id: Option<Uuid>,
    pub category: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub size: Option<i64>,
}

/// Fields a user may edit on an imported transaction; absent fields stay unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionUpdate {
    pub category: Option<String>,
    pub notes: Option<String>,
    pub is_flagged: Option<bool>,
    pub flag_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryAssignment {
    pub id: Uuid,
    pub category: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnreadCount {
    pub count: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRuleRequest {
    pub name: Option<String>,
    pub rule_type: Option<String>,
    pub condition_operator: Option<String>,
    pub threshold_amount: Option<f64>,
    pub category: Option<String>,
    pub account_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionUpdate {
    pub is_active: Option<bool>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionSummary {
    pub detected: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetRequest {
    pub category: Option<String>,
    pub monthly_limit: Option<f64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetStatusResponse {
    pub id: Uuid,
    pub category: String,
    pub monthly_limit: f64,
    pub actual_spend: f64,
    pub percent_used: f64,
    pub status: BudgetStatus,
    pub projected_month_end: f64,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialProfileRequest {
    pub monthly_income: Option<f64>,
    pub income_source: Option<String>,
    pub pay_frequency: Option<String>,
    pub emergency_fund_target_months: Option<i64>,
    pub notes: Option<String>,
    pub age: Option<i64>,
    pub target_retirement_age: Option<i64>,
    pub current_investments: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedIncome {
    pub monthly_income: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsGoalRequest {
    pub name: Option<String>,
    pub category: Option<String>,
    pub target_amount: Option<f64>,
    pub current_amount: Option<f64>,
    pub target_date: Option<NaiveDate>,
    pub linked_account_id: Option<Uuid>,
    pub color: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalProgressRequest {
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsGoalResponse {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub target_amount: f64,
    pub current_amount: f64,
    pub target_date: Option<NaiveDate>,
    pub linked_account_id: Option<Uuid>,
    pub color: Option<String>,
    pub is_active: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub percent_complete: f64,
    pub monthly_required: f64,
    pub projected_date: Option<NaiveDate>,
    pub months_remaining: i64,
    pub is_on_track: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualAssetRequest {
    pub name: Option<String>,
    pub asset_type: Option<String>,
    pub asset_class: Option<String>,
    pub current_value: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetWorthResponse {
    pub net_worth: f64,
    pub liquid_assets: f64,
    pub credit_card_debt: f64,
    pub manual_assets_total: f64,
    pub manual_liabilities: f64,
    pub monthly_change: f64,
    pub yearly_change: f64,
    pub assets: Vec<ManualAsset>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightRunSummary {
    pub generated: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthAmount {
    pub month: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryShare {
    pub category: String,
    pub amount: f64,
    pub percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAmount {
    pub category: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantTotal {
    pub merchant: String,
    pub amount: f64,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingPayment {
    pub account_id: Uuid,
    pub account_name: String,
    pub due_date: NaiveDate,
    pub days_until_due: i64,
    pub balance: Option<f64>,
    pub min_payment: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpiringPromoApr {
    pub account_id: Uuid,
    pub account_name: String,
    pub promo_apr: Option<f64>,
    pub regular_apr: Option<f64>,
    pub end_date: NaiveDate,
    pub days_left: i64,
    pub balance: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaycheckSlice {
    pub label: String,
    pub amount: f64,
    pub pct_of_income: f64,
    pub bucket: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub total_credit_card_balance: f64,
    pub total_credit_limit: f64,
    pub total_available_credit: f64,
    pub overall_utilization_percent: f64,
    pub total_checking_balance: f64,
    pub total_savings_balance: f64,
    pub unread_alert_count: u64,
    pub recent_alerts: Vec<Alert>,
    pub current_month_spend: f64,
    pub last_month_spend: f64,
    pub spending_change_percent: f64,
    pub monthly_spending_trend: Vec<MonthAmount>,
    pub category_breakdown: Vec<CategoryShare>,
    pub top_merchants: Vec<MerchantTotal>,
    pub accounts: Vec<AccountResponse>,
    pub upcoming_payments: Vec<UpcomingPayment>,
    pub expiring_promo_aprs: Vec<ExpiringPromoApr>,
    pub monthly_subscription_cost: f64,
    pub active_subscription_count: u64,
    pub duplicate_subscription_count: u64,
    pub estimated_monthly_income: f64,
    pub monthly_savings_rate: f64,
    pub avg_savings_rate6_month: f64,
    pub years_to_retirement_at_current_rate: Option<i64>,
    pub freedom_months: f64,
    pub freedom_months_trend: f64,
    pub material_spend_this_month: f64,
    pub material_spend_last_month: f64,
    pub things_spend: f64,
    pub experiences_spend: f64,
    pub necessities_spend: f64,
    pub paycheck_breakdown: Vec<PaycheckSlice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPayoffDetail {
    pub account_id: Uuid,
    pub account_name: String,
    pub current_balance: f64,
    pub apr: f64,
    pub min_payment: Option<f64>,
    pub payoff_date: NaiveDate,
    pub interest_paid: f64,
    pub payoff_order: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoffStrategy {
    pub strategy: String,
    pub total_months: u32,
    pub payoff_date: NaiveDate,
    pub total_interest: f64,
    pub total_paid: f64,
    pub card_order: Vec<CardPayoffDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtPayoffResponse {
    pub extra_payment: f64,
    pub total_current_debt: f64,
    pub avalanche: PayoffStrategy,
    pub snowball: PayoffStrategy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatIfDataPoint {
    pub extra_payment: f64,
    pub avalanche_months: u32,
    pub avalanche_total_interest: f64,
    pub avalanche_payoff_date: NaiveDate,
    pub snowball_months: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScorePillar {
    pub name: String,
    pub score: u32,
    pub max_score: u32,
    pub explanation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthScoreResponse {
    pub total_score: u32,
    pub grade: String,
    pub pillars: Vec<ScorePillar>,
    pub emergency_fund_months: f64,
    pub emergency_fund_target: i64,
    pub utilization_percent: f64,
    pub savings_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashFlowEvent {
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub event_type: String,
    pub description: String,
    pub amount: f64,
    pub running_balance: f64,
    pub is_danger_day: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashFlowResponse {
    pub year: i32,
    pub month: u32,
    pub starting_balance: f64,
    pub events: Vec<CashFlowEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnualReviewResponse {
    pub year: i32,
    pub total_spending: f64,
    pub estimated_income: f64,
    pub savings_rate: f64,
    pub interest_paid: f64,
    pub fees_paid: f64,
    pub subscription_annual_cost: f64,
    pub net_worth_change: f64,
    pub category_breakdown: Vec<CategoryAmount>,
    pub ai_recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapDay {
    pub date: NaiveDate,
    pub total_spend: f64,
    pub transaction_count: u64,
    pub intensity: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendingHeatmapResponse {
    pub year: i32,
    pub days: Vec<HeatmapDay>,
    pub max_daily_spend: f64,
    pub total_annual_spend: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantTrendResponse {
    pub merchant_name: String,
    pub months: Vec<MonthAmount>,
    pub total_annual: f64,
    pub avg_monthly: f64,
    pub trend: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardUtilizationDetail {
    pub account_id: Uuid,
    pub account_name: String,
    pub balance: f64,
    pub credit_limit: f64,
    pub utilization_pct: f64,
    pub recommended_payment: f64,
    pub target_utilization: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditWhatIf {
    pub description: String,
    pub payment_amount: f64,
    pub new_utilization_pct: f64,
    pub estimated_score_impact: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditScoreResponse {
    pub estimated_score: u32,
    pub utilization_impact: String,
    pub cards: Vec<CardUtilizationDetail>,
    pub recommendations: Vec<String>,
    pub what_if_scenarios: Vec<CreditWhatIf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FireQuery {
    pub age: Option<f64>,
    pub target_retirement_age: Option<f64>,
    pub current_investments: Option<f64>,
    pub monthly_expenses: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearProjection {
    pub year: i32,
    pub portfolio_value: f64,
    pub annual_contribution: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FireCalculatorResponse {
    pub fi_number: f64,
    pub current_savings: f64,
    pub annual_expenses: f64,
    pub monthly_savings: f64,
    pub years_to_fire: f64,
    pub fire_date: NaiveDate,
    pub savings_rate: f64,
    pub monthly_savings_gap: f64,
    pub projections: Vec<YearProjection>,
    pub monte_carlo_p10: Vec<f64>,
    pub monte_carlo_p50: Vec<f64>,
    pub monte_carlo_p90: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateTransactionGroup {
    pub merchant_name: String,
    pub amount: f64,
    pub transactions: Vec<Transaction>,
    pub within_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisStarted {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeProjection {
    pub age: i64,
    pub year: i32,
    pub portfolio_value: f64,
}

/// Retirement outcome of saving `extra_monthly` more than today.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioResult {
    pub id: String,
    pub label: String,
    pub extra_monthly: f64,
    pub color: String,
    pub projected_retirement_age: i64,
    pub years_earlier: i64,
    pub portfolio_at_target_age: f64,
    pub headline: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryInsight {
    pub category: String,
    pub monthly_average: f64,
    pub annual_cost: f64,
    pub pct_of_income: f64,
    pub benchmark_pct: f64,
    pub status: SpendingStatus,
    /// What the overspend above benchmark would have grown to over ten years.
    pub retirement_impact_10yr: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionItem {
    pub rank: u32,
    pub title: String,
    pub description: String,
    pub monthly_impact: f64,
    pub years_earlier: i64,
    #[serde(rename = "type")]
    pub action_type: ActionType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrainReportResponse {
    pub score: u32,
    pub grade: String,
    pub headline: String,
    pub narrative: String,
    pub ai_available: bool,
    pub profile_complete: bool,
    pub age: i64,
    pub target_retirement_age: i64,
    pub monthly_income: f64,
    pub monthly_spend: f64,
    pub monthly_savings: f64,
    pub savings_rate: f64,
    pub net_worth: f64,
    pub current_portfolio: f64,
    pub fi_number: f64,
    pub portfolio_at_target_age: f64,
    pub projected_retirement_age: i64,
    pub on_track: bool,
    pub years_early_or_late: i64,
    pub monthly_gap: f64,
    pub current_path: Vec<AgeProjection>,
    pub optimal_path: Vec<AgeProjection>,
    pub scenarios: Vec<ScenarioResult>,
    pub category_insights: Vec<CategoryInsight>,
    pub roadmap: Vec<ActionItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SavingsPlanQuery {
    pub target: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopMerchant {
    pub merchant: String,
    pub monthly_amount: f64,
    pub monthly_count: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRecommendation {
    pub category: String,
    pub current_monthly: f64,
    pub target_monthly: f64,
    pub monthly_savings: f64,
    pub benchmark_amount: f64,
    pub benchmark_pct: f64,
    pub difficulty: CutDifficulty,
    pub ease_score: u8,
    pub top_merchants: Vec<TopMerchant>,
    pub specific_actions: Vec<String>,
    pub reasoning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendingCategory {
    pub category: String,
    pub monthly_amount: f64,
    pub pct_of_income: f64,
    pub benchmark_pct: f64,
    pub status: SpendingStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsPlanResponse {
    pub monthly_income: f64,
    pub current_monthly_spend: f64,
    pub current_monthly_savings: f64,
    pub current_savings_rate: f64,
    pub target_additional_savings: f64,
    pub target_monthly_savings: f64,
    pub target_savings_rate: f64,
    pub total_recommended_savings: f64,
    pub coverage_pct: f64,
    pub goal_achievable: bool,
    pub recommendations: Vec<CategoryRecommendation>,
    pub spending_breakdown: Vec<SpendingCategory>,
    pub narrative: String,
    pub ai_available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub query: Option<String>,
    pub transactions: Vec<Transaction>,
    pub accounts: Vec<AccountResponse>,
    pub merchants: Vec<String>,
    pub total_results: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestTransaction {
    pub merchant: Option<String>,
    pub amount: f64,
    pub date: NaiveDate,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigestPayment {
    pub account: String,
    pub due_date: NaiveDate,
    pub balance: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyDigestResponse {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub total_spend: f64,
    pub prior_week_spend: f64,
    pub spending_change_percent: f64,
    pub top_transactions: Vec<DigestTransaction>,
    pub budget_statuses: Vec<BudgetStatusResponse>,
    pub upcoming_payments: Vec<DigestPayment>,
    pub category_breakdown: Vec<CategoryAmount>,
    pub unread_insight_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementRawText {
    pub statement_id: Uuid,
    pub file_name: String,
    pub text: String,
    pub length: usize,
}

/// Query for the CSV export; dates are inclusive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvExportQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub account_id: Option<Uuid>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthQuery {
    pub year: i32,
    pub month: u32,
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
