use chrono::{Datelike, Duration, NaiveDate, Utc};
use shared::{
    domain::{percent_of, round_money, Insight, InsightSeverity, InsightType},
    error::ApiError,
    protocol::InsightRunSummary,
};
use storage::TransactionQuery;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{first_of, internal, month_end, month_start, sub_months, today, ApiContext};

const SUPPRESSION_DAYS: i64 = 7;
const RETENTION_DAYS: i64 = 90;
const MERCHANT_SCAN_LIMIT: i64 = 50;
const PRICE_INCREASE_PERCENT: f64 = 10.0;
const SUBSCRIPTION_CREEP_DOLLARS: f64 = 50.0;
const FEE_WASTE_DOLLARS: f64 = 20.0;
const CATEGORY_SPIKE_PERCENT: f64 = 20.0;
const BILL_INCREASE_PERCENT: f64 = 15.0;
const BILL_CATEGORIES: [&str; 4] = ["UTILITIES", "PHONE", "INTERNET", "TELECOM"];

pub async fn list_insights(ctx: &ApiContext) -> Result<Vec<Insight>, ApiError> {
    ctx.storage.list_open_insights().await.map_err(internal)
}

pub async fn dismiss(ctx: &ApiContext, insight_id: Uuid) -> Result<Insight, ApiError> {
    if !ctx.storage.dismiss_insight(insight_id).await.map_err(internal)? {
        return Err(ApiError::not_found("Insight", insight_id));
    }
    ctx.storage
        .get_insight(insight_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("Insight", insight_id))
}

pub async fn run(ctx: &ApiContext) -> Result<InsightRunSummary, ApiError> {
    run_at(ctx, today()).await
}

/// Runs every rule against the calendar as of `today`, then purges stale insights.
pub(crate) async fn run_at(ctx: &ApiContext, today: NaiveDate) -> Result<InsightRunSummary, ApiError> {
    let mut engine = Engine { ctx, today, generated: 0 };
    engine.price_increases().await?;
    engine.duplicate_cross_card().await?;
    engine.subscription_creep().await?;
    engine.fee_waste().await?;
    engine.category_spikes().await?;
    engine.bill_increases().await?;

    let cutoff = Utc::now() - Duration::days(RETENTION_DAYS);
    let purged = ctx.storage.purge_insights_before(cutoff).await.map_err(internal)?;
    info!(generated = engine.generated, purged, "insight engine finished");
    Ok(InsightRunSummary {
        generated: engine.generated,
    })
}

fn change_percent(current: f64, previous: f64) -> Option<f64> {
    percent_of(current - previous, previous)
}

fn draft(
    insight_type: InsightType,
    severity: InsightSeverity,
    title: String,
    description: String,
    action_text: &str,
) -> Insight {
    Insight {
        id: Uuid::new_v4(),
        insight_type,
        title,
        description,
        action_text: Some(action_text.to_string()),
        impact_amount: None,
        severity,
        merchant_name: None,
        category: None,
        is_dismissed: false,
        generated_at: Utc::now(),
    }
}

struct Engine<'a> {
    ctx: &'a ApiContext,
    today: NaiveDate,
    generated: u64,
}

impl Engine<'_> {
    fn this_month(&self) -> TransactionQuery {
        TransactionQuery::debits_between(month_start(self.today), self.today)
    }

    async fn suppressed(&self, insight_type: InsightType, key: Option<&str>) -> Result<bool, ApiError> {
        let since = Utc::now() - Duration::days(SUPPRESSION_DAYS);
        let recent = self
            .ctx
            .storage
            .insight_generated_since(insight_type, key, since)
            .await
            .map_err(internal)?;
        if recent {
            debug!(%insight_type, ?key, "insight suppressed");
        }
        Ok(recent)
    }

    async fn save(&mut self, insight: Insight) -> Result<(), ApiError> {
        self.ctx.storage.insert_insight(&insight).await.map_err(internal)?;
        self.generated += 1;
        Ok(())
    }

    async fn sum(&self, query: TransactionQuery) -> Result<f64, ApiError> {
        self.ctx.storage.sum_transactions(&query).await.map_err(internal)
    }

    async fn price_increases(&mut self) -> Result<(), ApiError> {
        let start_this = month_start(self.today);
        let start_last = sub_months(start_this, 1);
        let end_last = month_end(start_last);
        let merchants = self
            .ctx
            .storage
            .merchant_totals(&self.this_month(), MERCHANT_SCAN_LIMIT)
            .await
            .map_err(internal)?;

        for (merchant, this_amount, _) in merchants {
            let last_amount = self
                .sum(TransactionQuery {
                    merchant: Some(merchant.clone()),
                    ..TransactionQuery::debits_between(start_last, end_last)
                })
                .await?;
            let Some(change) = change_percent(this_amount, last_amount) else {
                continue;
            };
            if change <= PRICE_INCREASE_PERCENT
                || self.suppressed(InsightType::PriceIncrease, Some(&merchant)).await?
            {
                continue;
            }
            let mut insight = draft(
                InsightType::PriceIncrease,
                InsightSeverity::Warning,
                format!("Price Increase Detected: {merchant}"),
                format!(
                    "{merchant} charges increased {change:.1}% this month (${this_amount:.2} vs ${last_amount:.2} last month)."
                ),
                "Review if this is a price increase or one-time charge.",
            );
            insight.impact_amount = Some(round_money((this_amount - last_amount) * 12.0));
            insight.merchant_name = Some(merchant);
            self.save(insight).await?;
        }
        Ok(())
    }

    async fn duplicate_cross_card(&mut self) -> Result<(), ApiError> {
        let spreads = self
            .ctx
            .storage
            .merchants_on_multiple_accounts(&self.this_month())
            .await
            .map_err(internal)?;
        for spread in spreads {
            if self
                .suppressed(InsightType::DuplicateCrossCard, Some(&spread.merchant))
                .await?
            {
                continue;
            }
            let mut insight = draft(
                InsightType::DuplicateCrossCard,
                InsightSeverity::Warning,
                format!("Possible Duplicate Charge: {}", spread.merchant),
                format!(
                    "{} was charged on {} different cards this month.",
                    spread.merchant, spread.account_count
                ),
                "Check if these are legitimate separate charges or duplicates.",
            );
            insight.merchant_name = Some(spread.merchant);
            self.save(insight).await?;
        }
        Ok(())
    }

    async fn subscription_creep(&mut self) -> Result<(), ApiError> {
        if self.suppressed(InsightType::SubscriptionCreep, None).await? {
            return Ok(());
        }
        let ytd_start = first_of(self.today.year(), 1)?;
        let last_year_start = sub_months(ytd_start, 12);
        let last_year_end = ytd_start.pred_opt().unwrap_or(ytd_start);

        let subscriptions = self.ctx.storage.list_active_subscriptions().await.map_err(internal)?;
        let mut this_year = 0.0;
        let mut last_year = 0.0;
        for subscription in &subscriptions {
            let merchant = Some(subscription.merchant_name.clone());
            last_year += self
                .sum(TransactionQuery {
                    merchant: merchant.clone(),
                    ..TransactionQuery::debits_between(last_year_start, last_year_end)
                })
                .await?;
            this_year += self
                .sum(TransactionQuery {
                    merchant,
                    ..TransactionQuery::debits_between(ytd_start, self.today)
                })
                .await?;
        }

        let increase = this_year - last_year;
        if last_year <= 0.0 || increase <= SUBSCRIPTION_CREEP_DOLLARS {
            return Ok(());
        }
        let day_of_year = f64::from(self.today.ordinal());
        let mut insight = draft(
            InsightType::SubscriptionCreep,
            InsightSeverity::Opportunity,
            "Subscription Costs Rising".to_string(),
            format!("Your subscription spending is up ${increase:.2} compared to same period last year."),
            "Review and cancel subscriptions you no longer use.",
        );
        insight.impact_amount = Some(round_money(increase * 12.0 / day_of_year));
        self.save(insight).await
    }

    async fn fee_waste(&mut self) -> Result<(), ApiError> {
        if self.suppressed(InsightType::AtmFeeWaste, None).await? {
            return Ok(());
        }
        let total = self
            .sum(TransactionQuery {
                start_date: Some(sub_months(self.today, 12)),
                fees_or_atm: true,
                ..TransactionQuery::default()
            })
            .await?;
        if total <= FEE_WASTE_DOLLARS {
            return Ok(());
        }
        let mut insight = draft(
            InsightType::AtmFeeWaste,
            InsightSeverity::Opportunity,
            "ATM Fees Detected".to_string(),
            format!("You paid ${total:.2} in fees over the past 12 months."),
            "Switch to a bank with no ATM fees or find in-network ATMs.",
        );
        insight.impact_amount = Some(round_money(total));
        self.save(insight).await
    }

    async fn category_spikes(&mut self) -> Result<(), ApiError> {
        let same_month_last_year = sub_months(month_start(self.today), 12);
        let categories = self
            .ctx
            .storage
            .category_totals(&self.this_month())
            .await
            .map_err(internal)?;

        for (category, this_amount) in categories {
            let last_amount = self
                .sum(
                    TransactionQuery::debits_between(same_month_last_year, month_end(same_month_last_year))
                        .with_category(category.clone()),
                )
                .await?;
            let Some(change) = change_percent(this_amount, last_amount) else {
                continue;
            };
            if change <= CATEGORY_SPIKE_PERCENT
                || self.suppressed(InsightType::CategoryYoySpike, Some(&category)).await?
            {
                continue;
            }
            let mut insight = draft(
                InsightType::CategoryYoySpike,
                InsightSeverity::Warning,
                format!("Spending Spike: {category}"),
                format!(
                    "{category} spending is up {change:.1}% vs same month last year (${this_amount:.2} vs ${last_amount:.2})."
                ),
                &format!("Review what's driving the increase in {category} spending."),
            );
            insight.impact_amount = Some(round_money((this_amount - last_amount) * 12.0));
            insight.category = Some(category);
            self.save(insight).await?;
        }
        Ok(())
    }

    async fn bill_increases(&mut self) -> Result<(), ApiError> {
        let start_this = month_start(self.today);
        let window_start = sub_months(self.today, 3);
        let window_end = start_this.pred_opt().unwrap_or(start_this);

        for category in BILL_CATEGORIES {
            let this_month = self.sum(self.this_month().with_category(category)).await?;
            let prior = self
                .sum(TransactionQuery::debits_between(window_start, window_end).with_category(category))
                .await?;
            if this_month <= 0.0 || prior <= 0.0 {
                continue;
            }
            let average = round_money(prior / 3.0);
            let Some(change) = change_percent(this_month, average) else {
                continue;
            };
            if change <= BILL_INCREASE_PERCENT
                || self.suppressed(InsightType::BillIncrease, Some(category)).await?
            {
                continue;
            }
            let mut insight = draft(
                InsightType::BillIncrease,
                InsightSeverity::Warning,
                format!("Bill Increase: {category}"),
                format!(
                    "{category} bill increased {change:.1}% vs 3-month average (${this_month:.2} vs avg ${average:.2})."
                ),
                "Call provider to negotiate or shop for better rates.",
            );
            insight.impact_amount = Some(round_money((this_month - average) * 12.0));
            insight.category = Some(category.to_string());
            self.save(insight).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/insights_tests.rs"]
mod tests;
