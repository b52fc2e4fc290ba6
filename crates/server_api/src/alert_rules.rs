use chrono::{DateTime, Duration, NaiveDate, Utc};
use shared::{
    domain::{
        round_to, AccountType, AlertRule, AlertRuleType, AlertSeverity, AlertType, TransactionType,
    },
    error::ApiError,
    protocol::AlertRuleRequest,
};
use storage::{NewAlert, TransactionQuery};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{internal, month_start, parse_enum, required_text, today, ApiContext};

const DEFAULT_OPERATOR: &str = "GREATER_THAN";

pub async fn list_rules(ctx: &ApiContext) -> Result<Vec<AlertRule>, ApiError> {
    ctx.storage.list_active_alert_rules().await.map_err(internal)
}

pub async fn create_rule(ctx: &ApiContext, request: AlertRuleRequest) -> Result<AlertRule, ApiError> {
    let name = required_text(request.name, "name")?;
    let raw_type = required_text(request.rule_type, "ruleType")?;
    let rule_type: AlertRuleType = parse_enum(&raw_type)?;
    let now = Utc::now();
    let rule = AlertRule {
        id: Uuid::new_v4(),
        name,
        rule_type,
        condition_operator: request
            .condition_operator
            .filter(|op| !op.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_OPERATOR.to_string()),
        threshold_amount: request.threshold_amount,
        category: request.category,
        account_id: request.account_id,
        is_active: request.is_active.unwrap_or(true),
        last_triggered_at: None,
        created_at: now,
        updated_at: now,
    };
    ctx.storage.insert_alert_rule(&rule).await.map_err(internal)?;
    Ok(rule)
}

pub async fn update_rule(
    ctx: &ApiContext,
    rule_id: Uuid,
    request: AlertRuleRequest,
) -> Result<AlertRule, ApiError> {
    let mut rule = ctx
        .storage
        .get_alert_rule(rule_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("Alert rule", rule_id))?;
    if let Some(name) = request.name.filter(|n| !n.trim().is_empty()) {
        rule.name = name;
    }
    if request.threshold_amount.is_some() {
        rule.threshold_amount = request.threshold_amount;
    }
    if request.category.is_some() {
        rule.category = request.category;
    }
    if let Some(active) = request.is_active {
        rule.is_active = active;
    }
    rule.updated_at = Utc::now();
    ctx.storage.update_alert_rule(&rule).await.map_err(internal)?;
    Ok(rule)
}

pub async fn delete_rule(ctx: &ApiContext, rule_id: Uuid) -> Result<(), ApiError> {
    if ctx.storage.delete_alert_rule(rule_id).await.map_err(internal)? {
        Ok(())
    } else {
        Err(ApiError::not_found("Alert rule", rule_id))
    }
}

/// Checks every active rule and raises one alert per rule that fires. Returns the number triggered.
pub async fn evaluate_rules(ctx: &ApiContext) -> Result<u64, ApiError> {
    evaluate_rules_at(ctx, Utc::now(), today()).await
}

pub(crate) async fn evaluate_rules_at(
    ctx: &ApiContext,
    now: DateTime<Utc>,
    today: NaiveDate,
) -> Result<u64, ApiError> {
    let rules = ctx.storage.list_active_alert_rules().await.map_err(internal)?;
    let mut triggered = 0;
    for rule in rules {
        if rule
            .last_triggered_at
            .is_some_and(|at| at > now - Duration::hours(24))
        {
            continue;
        }
        let Some(threshold) = rule.threshold_amount else {
            warn!(rule_id = %rule.id, "alert rule has no threshold, skipping");
            continue;
        };
        let Some(message) = check_rule(ctx, &rule, threshold, today).await? else {
            continue;
        };

        let alert = NewAlert::new(
            AlertType::Anomaly,
            AlertSeverity::Medium,
            format!("Custom Rule: {}", rule.name),
            message,
        );
        ctx.storage.insert_alert(&alert).await.map_err(internal)?;
        ctx.storage
            .touch_alert_rule_triggered(rule.id)
            .await
            .map_err(internal)?;
        triggered += 1;
    }
    info!(triggered, "alert rules evaluated");
    Ok(triggered)
}

async fn check_rule(
    ctx: &ApiContext,
    rule: &AlertRule,
    threshold: f64,
    today: NaiveDate,
) -> Result<Option<String>, ApiError> {
    match rule.rule_type {
        AlertRuleType::TransactionAmount => {
            let query = TransactionQuery {
                start_date: Some(today - Duration::days(1)),
                types: vec![TransactionType::Debit],
                flagged: Some(false),
                ..TransactionQuery::default()
            };
            let recent = ctx
                .storage
                .find_transactions(&query, None, 0)
                .await
                .map_err(internal)?;
            Ok(recent.iter().find(|t| t.amount > threshold).map(|t| {
                format!(
                    "Transaction of ${:.2} at {} exceeded your ${threshold:.2} alert rule.",
                    t.amount,
                    t.merchant_name.as_deref().unwrap_or("unknown merchant")
                )
            }))
        }
        AlertRuleType::MonthlyCategorySpend => {
            let Some(category) = rule.category.as_deref() else {
                return Ok(None);
            };
            let query = TransactionQuery::debits_between(month_start(today), today)
                .with_category(category);
            let spent = ctx.storage.sum_transactions(&query).await.map_err(internal)?;
            Ok((spent > threshold).then(|| {
                format!(
                    "{category} spending this month (${spent:.2}) exceeded your ${threshold:.2} alert rule."
                )
            }))
        }
        AlertRuleType::BalanceBelow => {
            let accounts = ctx.storage.list_active_accounts().await.map_err(internal)?;
            Ok(accounts
                .iter()
                .filter(|a| a.is_cash())
                .find_map(|a| {
                    let balance = a.current_balance?;
                    (balance < threshold).then(|| {
                        format!(
                            "{} balance (${balance:.2}) is below your ${threshold:.2} alert threshold.",
                            a.name
                        )
                    })
                }))
        }
        AlertRuleType::UtilizationAbove => {
            let cards = ctx
                .storage
                .list_active_accounts_of_type(AccountType::CreditCard)
                .await
                .map_err(internal)?;
            let balance: f64 = cards.iter().filter_map(|c| c.current_balance).sum();
            let limit: f64 = cards.iter().filter_map(|c| c.credit_limit).sum();
            if limit <= 0.0 {
                return Ok(None);
            }
            let utilization = round_to(balance / limit, 4) * 100.0;
            Ok((utilization > threshold).then(|| {
                format!(
                    "Credit utilization ({utilization:.1}%) exceeded your {threshold:.0}% alert threshold."
                )
            }))
        }
    }
}

#[cfg(test)]
#[path = "tests/alert_rules_tests.rs"]
mod tests;
