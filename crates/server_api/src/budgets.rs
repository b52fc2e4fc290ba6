use chrono::{Datelike, Duration, NaiveDate, Utc};
use shared::{
    domain::{percent_of, round_money, round_to, AlertSeverity, AlertType, Budget, BudgetStatus},
    error::ApiError,
    protocol::{BudgetRequest, BudgetStatusResponse},
};
use storage::{NewAlert, TransactionQuery};
use tracing::info;
use uuid::Uuid;

use crate::{days_in_month, internal, month_start, required, required_text, today, ApiContext};

/// Month-to-date standing of one budget, projected linearly to the end of the month.
pub fn budget_status(budget: &Budget, actual_spend: f64, today: NaiveDate) -> BudgetStatusResponse {
    let actual_spend = round_money(actual_spend);
    let percent_used = percent_of(actual_spend, budget.monthly_limit)
        .map(|p| round_to(p, 1))
        .unwrap_or(0.0);
    let projected_month_end =
        round_money(actual_spend / f64::from(today.day()) * f64::from(days_in_month(today)));
    BudgetStatusResponse {
        id: budget.id,
        category: budget.category.clone(),
        monthly_limit: budget.monthly_limit,
        actual_spend,
        percent_used,
        status: BudgetStatus::from_percent_used(percent_used),
        projected_month_end,
        is_active: budget.is_active,
    }
}

pub async fn list_budgets(ctx: &ApiContext) -> Result<Vec<BudgetStatusResponse>, ApiError> {
    budget_statuses_at(ctx, today()).await
}

/// Worst first: RED, then YELLOW, then GREEN, alphabetical within a band.
pub async fn budget_statuses_at(
    ctx: &ApiContext,
    today: NaiveDate,
) -> Result<Vec<BudgetStatusResponse>, ApiError> {
    let budgets = ctx.storage.list_active_budgets().await.map_err(internal)?;
    let mut statuses = Vec::with_capacity(budgets.len());
    for budget in &budgets {
        let spend = month_to_date_spend(ctx, &budget.category, today).await?;
        statuses.push(budget_status(budget, spend, today));
    }
    statuses.sort_by(|a, b| {
        a.status
            .rank()
            .cmp(&b.status.rank())
            .then_with(|| a.category.cmp(&b.category))
    });
    Ok(statuses)
}

async fn month_to_date_spend(
    ctx: &ApiContext,
    category: &str,
    today: NaiveDate,
) -> Result<f64, ApiError> {
    let query = TransactionQuery::debits_between(month_start(today), today).with_category(category);
    ctx.storage.sum_transactions(&query).await.map_err(internal)
}

/// Creates the budget for a category, or replaces the limit of the existing one.
pub async fn upsert_budget(ctx: &ApiContext, request: BudgetRequest) -> Result<Budget, ApiError> {
    let category = required_text(request.category, "category")?;
    let monthly_limit = required(request.monthly_limit, "monthlyLimit")?;
    if monthly_limit <= 0.0 {
        return Err(ApiError::validation("monthlyLimit must be positive"));
    }
    let now = Utc::now();
    let budget = Budget {
        id: Uuid::new_v4(),
        category,
        monthly_limit,
        is_active: request.is_active.unwrap_or(true),
        created_at: now,
        updated_at: now,
    };
    let stored = ctx.storage.upsert_budget(&budget).await.map_err(internal)?;
    info!(category = %stored.category, limit = stored.monthly_limit, "budget saved");
    Ok(stored)
}

pub async fn update_budget(
    ctx: &ApiContext,
    budget_id: Uuid,
    request: BudgetRequest,
) -> Result<Budget, ApiError> {
    let mut budget = load_budget(ctx, budget_id).await?;
    if let Some(category) = request.category.filter(|c| !c.trim().is_empty()) {
        budget.category = category.trim().to_string();
    }
    if let Some(limit) = request.monthly_limit {
        if limit <= 0.0 {
            return Err(ApiError::validation("monthlyLimit must be positive"));
        }
        budget.monthly_limit = limit;
    }
    if let Some(active) = request.is_active {
        budget.is_active = active;
    }
    budget.updated_at = Utc::now();
    ctx.storage.update_budget(&budget).await.map_err(internal)?;
    Ok(budget)
}

pub async fn delete_budget(ctx: &ApiContext, budget_id: Uuid) -> Result<(), ApiError> {
    if !ctx.storage.delete_budget(budget_id).await.map_err(internal)? {
        return Err(ApiError::not_found("Budget", budget_id));
    }
    Ok(())
}

/// Raises exceeded/warning alerts for budgets at or past 80%; one per budget per day.
pub async fn check_budgets(ctx: &ApiContext) -> Result<u64, ApiError> {
    let since = Utc::now() - Duration::hours(24);
    let mut raised = 0;
    for status in budget_statuses_at(ctx, today()).await? {
        let alert = match status.status {
            BudgetStatus::Red => NewAlert::new(
                AlertType::BudgetExceeded,
                AlertSeverity::High,
                format!("Budget Exceeded: {}", status.category),
                format!(
                    "{} budget exceeded: ${:.2} spent of ${:.2} limit ({:.0}%)",
                    status.category, status.actual_spend, status.monthly_limit, status.percent_used
                ),
            ),
            BudgetStatus::Yellow => NewAlert::new(
                AlertType::BudgetWarning,
                AlertSeverity::Medium,
                format!("Budget Warning: {}", status.category),
                format!(
                    "{} budget at {:.0}%: ${:.2} spent of ${:.2} limit",
                    status.category, status.percent_used, status.actual_spend, status.monthly_limit
                ),
            ),
            BudgetStatus::Green => continue,
        };
        if ctx
            .storage
            .alert_raised_since(&alert, since)
            .await
            .map_err(internal)?
        {
            continue;
        }
        ctx.storage.insert_alert(&alert).await.map_err(internal)?;
        raised += 1;
    }
    Ok(raised)
}

async fn load_budget(ctx: &ApiContext, budget_id: Uuid) -> Result<Budget, ApiError> {
    ctx.storage
        .get_budget(budget_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("Budget", budget_id))
}

#[cfg(test)]
#[path = "tests/budgets_tests.rs"]
mod tests;
