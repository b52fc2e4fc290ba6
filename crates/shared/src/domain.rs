use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a wire enum stored as its SCREAMING_SNAKE_CASE name in both JSON and SQLite.
macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                let wanted = raw.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| UnknownVariant {
                        kind: stringify!($name),
                        value: raw.to_string(),
                    })
            }
        }
    };
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

string_enum!(AccountType {
    Checking => "CHECKING",
    Savings => "SAVINGS",
    CreditCard => "CREDIT_CARD",
    Loan => "LOAN",
});

string_enum!(TransactionType {
    Debit => "DEBIT",
    Credit => "CREDIT",
    Payment => "PAYMENT",
    Fee => "FEE",
    Interest => "INTEREST",
});

string_enum!(AlertType {
    DueDate => "DUE_DATE",
    AprExpiry => "APR_EXPIRY",
    DuplicateCharge => "DUPLICATE_CHARGE",
    Anomaly => "ANOMALY",
    Subscription => "SUBSCRIPTION",
    HighUtilization => "HIGH_UTILIZATION",
    Overcharge => "OVERCHARGE",
    UnusualMerchant => "UNUSUAL_MERCHANT",
    LargeTransaction => "LARGE_TRANSACTION",
    BudgetWarning => "BUDGET_WARNING",
    BudgetExceeded => "BUDGET_EXCEEDED",
});

string_enum!(AlertSeverity {
    Low => "LOW",
    Medium => "MEDIUM",
    High => "HIGH",
    Critical => "CRITICAL",
});

string_enum!(StatementStatus {
    Pending => "PENDING",
    Processing => "PROCESSING",
    Completed => "COMPLETED",
    Failed => "FAILED",
});

impl StatementStatus {
    /// Reprocessing restarts the pipeline only once the previous run settled.
    pub fn can_reprocess(self) -> bool {
        matches!(self, StatementStatus::Completed | StatementStatus::Failed)
    }

    pub fn can_transition_to(self, next: StatementStatus) -> bool {
        matches!(
            (self, next),
            (StatementStatus::Pending, StatementStatus::Processing)
                | (StatementStatus::Processing, StatementStatus::Completed)
                | (StatementStatus::Processing, StatementStatus::Failed)
                | (StatementStatus::Completed, StatementStatus::Pending)
                | (StatementStatus::Failed, StatementStatus::Pending)
        )
    }
}

string_enum!(SubscriptionFrequency {
    Weekly => "WEEKLY",
    Monthly => "MONTHLY",
    Quarterly => "QUARTERLY",
    Annual => "ANNUAL",
});

impl SubscriptionFrequency {
    pub fn monthly_cost(self, amount: f64) -> f64 {
        match self {
            SubscriptionFrequency::Monthly => amount,
            SubscriptionFrequency::Quarterly => amount / 3.0,
            SubscriptionFrequency::Annual => amount / 12.0,
            SubscriptionFrequency::Weekly => amount * 4.33,
        }
    }

    pub fn annual_cost(self, amount: f64) -> f64 {
        match self {
            SubscriptionFrequency::Monthly => amount * 12.0,
            SubscriptionFrequency::Quarterly => amount * 4.0,
            SubscriptionFrequency::Annual => amount,
            SubscriptionFrequency::Weekly => amount * 52.0,
        }
    }
}

string_enum!(BudgetStatus {
    Green => "GREEN",
    Yellow => "YELLOW",
    Red => "RED",
});

impl BudgetStatus {
    pub fn from_percent_used(percent_used: f64) -> Self {
        if percent_used >= 100.0 {
            BudgetStatus::Red
        } else if percent_used >= 80.0 {
            BudgetStatus::Yellow
        } else {
            BudgetStatus::Green
        }
    }

    pub fn rank(self) -> u8 {
        match self {
            BudgetStatus::Red => 0,
            BudgetStatus::Yellow => 1,
            BudgetStatus::Green => 2,
        }
    }
}

string_enum!(AlertRuleType {
    TransactionAmount => "TRANSACTION_AMOUNT",
    MonthlyCategorySpend => "MONTHLY_CATEGORY_SPEND",
    BalanceBelow => "BALANCE_BELOW",
    UtilizationAbove => "UTILIZATION_ABOVE",
});

string_enum!(InsightType {
    PriceIncrease => "PRICE_INCREASE",
    DuplicateCrossCard => "DUPLICATE_CROSS_CARD",
    SubscriptionCreep => "SUBSCRIPTION_CREEP",
    AtmFeeWaste => "ATM_FEE_WASTE",
    RewardsOpportunity => "REWARDS_OPPORTUNITY",
    CategoryYoySpike => "CATEGORY_YOY_SPIKE",
    BillIncrease => "BILL_INCREASE",
    SpendingYourRaise => "SPENDING_YOUR_RAISE",
});

string_enum!(InsightSeverity {
    Info => "INFO",
    Warning => "WARNING",
    Opportunity => "OPPORTUNITY",
    Critical => "CRITICAL",
});

string_enum!(AnalysisType {
    Categorization => "CATEGORIZATION",
    Anomaly => "ANOMALY",
    Subscription => "SUBSCRIPTION",
    Summary => "SUMMARY",
});

/// Where a category's monthly spend sits against its share-of-income benchmark.
string_enum!(SpendingStatus {
    Over => "OVER",
    Ok => "OK",
    Good => "GOOD",
});

string_enum!(CutDifficulty {
    Hard => "HARD",
    Medium => "MEDIUM",
    Easy => "EASY",
});

string_enum!(ActionType {
    Spending => "SPENDING",
    Saving => "SAVING",
    Debt => "DEBT",
});

string_enum!(AssetType {
    Asset => "ASSET",
    Liability => "LIABILITY",
});

string_enum!(AssetClass {
    RealEstate => "REAL_ESTATE",
    Vehicle => "VEHICLE",
    Investment => "INVESTMENT",
    Loan => "LOAN",
    Retirement => "RETIREMENT",
    Other => "OTHER",
});

string_enum!(PayFrequency {
    Weekly => "WEEKLY",
    Biweekly => "BIWEEKLY",
    Monthly => "MONTHLY",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub institution: Option<String>,
    #[serde(rename = "type")]
    pub account_type: AccountType,
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
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn is_credit_card(&self) -> bool {
        self.account_type == AccountType::CreditCard
    }

    pub fn is_cash(&self) -> bool {
        matches!(
            self.account_type,
            AccountType::Checking | AccountType::Savings
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    pub account_id: Option<Uuid>,
    pub account_name: Option<String>,
    pub statement_id: Option<Uuid>,
    pub transaction_date: NaiveDate,
    pub post_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub merchant_name: Option<String>,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub amount: f64,
    #[serde(rename = "type")]
    pub transaction_type: Option<TransactionType>,
    pub reference_number: Option<String>,
    pub is_recurring: bool,
    pub is_flagged: bool,
    pub flag_reason: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRef {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statement {
    pub id: Uuid,
    pub account_id: Option<Uuid>,
    pub account: Option<AccountRef>,
    pub file_name: String,
    pub file_path: String,
    pub statement_month: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub opening_balance: Option<f64>,
    pub closing_balance: Option<f64>,
    pub total_credits: Option<f64>,
    pub total_debits: Option<f64>,
    pub minimum_payment: Option<f64>,
    pub payment_due_date: Option<NaiveDate>,
    pub ytd_total_fees: Option<f64>,
    pub ytd_total_interest: Option<f64>,
    pub ytd_year: Option<i32>,
    pub status: StatementStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    pub ai_explanation: Option<String>,
    pub account_id: Option<Uuid>,
    pub account_name: Option<String>,
    pub transaction_id: Option<Uuid>,
    pub is_read: bool,
    pub is_resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRule {
    pub id: Uuid,
    pub name: String,
    pub rule_type: AlertRuleType,
    pub condition_operator: String,
    pub threshold_amount: Option<f64>,
    pub category: Option<String>,
    pub account_id: Option<Uuid>,
    pub is_active: bool,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: Uuid,
    pub merchant_name: String,
    pub normalized_name: Option<String>,
    pub amount: Option<f64>,
    pub frequency: Option<SubscriptionFrequency>,
    pub account_id: Option<Uuid>,
    pub first_seen_date: Option<NaiveDate>,
    pub last_charged_date: Option<NaiveDate>,
    pub next_expected_date: Option<NaiveDate>,
    pub times_charged: i64,
    pub annual_cost: Option<f64>,
    pub category: Option<String>,
    pub is_active: bool,
    pub is_duplicate: bool,
    pub duplicate_of: Option<Uuid>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Subscription {
    pub fn monthly_cost(&self) -> f64 {
        match (self.amount, self.frequency) {
            (Some(amount), Some(freq)) => freq.monthly_cost(amount),
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    pub id: Uuid,
    pub category: String,
    pub monthly_limit: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavingsGoal {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub target_amount: f64,
    pub current_amount: f64,
    pub target_date: Option<NaiveDate>,
    pub linked_account_id: Option<Uuid>,
    pub color: Option<String>,
    pub notes: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialProfile {
    pub id: Uuid,
    pub monthly_income: Option<f64>,
    pub income_source: String,
    pub pay_frequency: PayFrequency,
    pub emergency_fund_target_months: i64,
    pub notes: Option<String>,
    pub age: Option<i64>,
    pub target_retirement_age: Option<i64>,
    pub current_investments: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualAsset {
    pub id: Uuid,
    pub name: String,
    pub asset_type: AssetType,
    pub asset_class: AssetClass,
    pub current_value: f64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetWorthSnapshot {
    pub id: Uuid,
    pub snapshot_date: NaiveDate,
    pub liquid_assets: f64,
    pub credit_card_debt: f64,
    pub manual_assets: f64,
    pub manual_liabilities: f64,
    pub net_worth: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalanceSnapshot {
    pub id: Uuid,
    pub account_id: Uuid,
    pub snapshot_date: NaiveDate,
    pub balance: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub insight_type: InsightType,
    pub title: String,
    pub description: String,
    pub action_text: Option<String>,
    pub impact_amount: Option<f64>,
    pub severity: InsightSeverity,
    pub merchant_name: Option<String>,
    pub category: Option<String>,
    pub is_dismissed: bool,
    pub generated_at: DateTime<Utc>,
}

/// One step of a model-assisted statement review. `result_data` is whatever JSON the step produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub id: Uuid,
    pub statement_id: Uuid,
    pub analysis_type: AnalysisType,
    pub result_data: serde_json::Value,
    pub model_used: Option<String>,
    pub processing_ms: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Rounds half away from zero to `places` decimals.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

pub fn round_money(value: f64) -> f64 {
    round_to(value, 2)
}

/// `part / whole * 100` with the ratio rounded to 4 decimals first, or `None` when `whole` is not positive.
pub fn percent_of(part: f64, whole: f64) -> Option<f64> {
    (whole > 0.0).then(|| round_to(round_to(part / whole, 4) * 100.0, 2))
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
