use chrono::{Datelike, NaiveDate, Utc};
use shared::{
    domain::{round_money, round_to, SavingsGoal},
    error::ApiError,
    protocol::{GoalProgressRequest, SavingsGoalRequest, SavingsGoalResponse},
};
use tracing::info;
use uuid::Uuid;

use crate::{add_months, days_between, internal, required, required_text, today, ApiContext};

/// Pace assumed for goals without a target date.
const UNDATED_MONTHLY_PACE: f64 = 500.0;

/// Whole calendar months from `from` to `to`; a partial month does not count.
pub fn whole_months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    let mut months =
        i64::from(to.year() - from.year()) * 12 + i64::from(to.month()) - i64::from(from.month());
    if to.day() < from.day() {
        months -= 1;
    }
    months
}

pub fn goal_response(goal: SavingsGoal, today: NaiveDate) -> SavingsGoalResponse {
    let remaining = (goal.target_amount - goal.current_amount).max(0.0);
    let saved_fraction = if goal.target_amount > 0.0 {
        goal.current_amount / goal.target_amount
    } else {
        0.0
    };
    let percent_complete = round_to(saved_fraction * 100.0, 1).min(100.0);

    let (months_remaining, monthly_required, projected_date, is_on_track) = match goal.target_date
    {
        Some(target) => {
            let months = whole_months_between(today, target).max(1);
            let lifetime = days_between(goal.created_at.date_naive(), target);
            let elapsed = days_between(goal.created_at.date_naive(), today);
            let on_track = lifetime <= 0 || (elapsed as f64 / lifetime as f64) <= saved_fraction;
            (
                months,
                round_money(remaining / months as f64),
                Some(target),
                on_track,
            )
        }
        None => {
            let months = (remaining / UNDATED_MONTHLY_PACE).ceil() as i64;
            (months, 0.0, Some(add_months(today, months as u32)), true)
        }
    };

    SavingsGoalResponse {
        id: goal.id,
        name: goal.name,
        category: goal.category,
        target_amount: goal.target_amount,
        current_amount: goal.current_amount,
        target_date: goal.target_date,
        linked_account_id: goal.linked_account_id,
        color: goal.color,
        is_active: goal.is_active,
        notes: goal.notes,
        created_at: goal.created_at,
        updated_at: goal.updated_at,
        percent_complete,
        monthly_required,
        projected_date,
        months_remaining,
        is_on_track,
    }
}

pub async fn list_goals(ctx: &ApiContext) -> Result<Vec<SavingsGoalResponse>, ApiError> {
    let today = today();
    let goals = ctx.storage.list_active_goals().await.map_err(internal)?;
    Ok(goals.into_iter().map(|g| goal_response(g, today)).collect())
}

pub async fn create_goal(
    ctx: &ApiContext,
    request: SavingsGoalRequest,
) -> Result<SavingsGoalResponse, ApiError> {
    let name = required_text(request.name, "name")?;
    let target_amount = required(request.target_amount, "targetAmount")?;
    if target_amount <= 0.0 {
        return Err(ApiError::validation("targetAmount must be positive"));
    }
    let now = Utc::now();
    let goal = SavingsGoal {
        id: Uuid::new_v4(),
        name,
        category: request.category.unwrap_or_else(|| "OTHER".to_string()),
        target_amount,
        current_amount: request.current_amount.unwrap_or(0.0),
        target_date: request.target_date,
        linked_account_id: request.linked_account_id,
        color: request.color,
        notes: request.notes,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    ctx.storage.insert_goal(&goal).await.map_err(internal)?;
    info!(goal = %goal.name, target = goal.target_amount, "savings goal created");
    Ok(goal_response(goal, today()))
}

pub async fn update_goal(
    ctx: &ApiContext,
    goal_id: Uuid,
    request: SavingsGoalRequest,
) -> Result<SavingsGoalResponse, ApiError> {
    let mut goal = load_goal(ctx, goal_id).await?;
    if let Some(name) = request.name.filter(|n| !n.trim().is_empty()) {
        goal.name = name.trim().to_string();
    }
    if let Some(target) = request.target_amount {
        if target <= 0.0 {
            return Err(ApiError::validation("targetAmount must be positive"));
        }
        goal.target_amount = target;
    }
    if let Some(current) = request.current_amount {
        goal.current_amount = current;
    }
    if request.target_date.is_some() {
        goal.target_date = request.target_date;
    }
    if let Some(category) = request.category {
        goal.category = category;
    }
    if request.linked_account_id.is_some() {
        goal.linked_account_id = request.linked_account_id;
    }
    if request.color.is_some() {
        goal.color = request.color;
    }
    if request.notes.is_some() {
        goal.notes = request.notes;
    }
    ctx.storage.update_goal(&goal).await.map_err(internal)?;
    let goal = load_goal(ctx, goal_id).await?;
    Ok(goal_response(goal, today()))
}

pub async fn add_progress(
    ctx: &ApiContext,
    goal_id: Uuid,
    request: GoalProgressRequest,
) -> Result<SavingsGoalResponse, ApiError> {
    if !request.amount.is_finite() {
        return Err(ApiError::validation("amount must be a number"));
    }
    if !ctx
        .storage
        .add_goal_progress(goal_id, request.amount)
        .await
        .map_err(internal)?
    {
        return Err(ApiError::not_found("Goal", goal_id));
    }
    let goal = load_goal(ctx, goal_id).await?;
    info!(goal = %goal.name, amount = request.amount, current = goal.current_amount, "goal progress added");
    Ok(goal_response(goal, today()))
}

pub async fn delete_goal(ctx: &ApiContext, goal_id: Uuid) -> Result<(), ApiError> {
    if !ctx.storage.delete_goal(goal_id).await.map_err(internal)? {
        return Err(ApiError::not_found("Goal", goal_id));
    }
    Ok(())
}

async fn load_goal(ctx: &ApiContext, goal_id: Uuid) -> Result<SavingsGoal, ApiError> {
    ctx.storage
        .get_goal(goal_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("Goal", goal_id))
}

#[cfg(test)]
#[path = "tests/goals_tests.rs"]
mod tests;
