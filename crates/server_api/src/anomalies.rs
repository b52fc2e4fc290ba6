use std::collections::{BTreeMap, HashSet};

use shared::{
    domain::{round_money, round_to, AlertSeverity, AlertType, Transaction, TransactionType},
    error::ApiError,
};
use storage::{NewAlert, TransactionQuery};
use tracing::info;
use uuid::Uuid;

use crate::{days_between, internal, sub_months, ApiContext};

pub const LARGE_TRANSACTION_THRESHOLD: f64 = 500.0;
pub const DUPLICATE_WINDOW_DAYS: i64 = 7;
pub const SPIKE_MULTIPLIER: f64 = 2.5;
const MIN_SPIKE_HISTORY: usize = 3;

/// One transaction judged suspicious, with the flag reason and the alert to raise.
#[derive(Debug, Clone)]
pub struct Finding {
    pub transaction_id: Uuid,
    pub reason: String,
    pub alert: NewAlert,
}

pub fn large_transactions(transactions: &[Transaction]) -> Vec<Finding> {
    transactions
        .iter()
        .filter(|t| t.transaction_type == Some(TransactionType::Debit))
        .filter(|t| t.amount > LARGE_TRANSACTION_THRESHOLD)
        .map(|t| {
            let severity = if t.amount > 1000.0 {
                AlertSeverity::High
            } else {
                AlertSeverity::Medium
            };
            Finding {
                transaction_id: t.id,
                reason: format!("Large transaction: ${:.2}", t.amount),
                alert: NewAlert::new(
                    AlertType::LargeTransaction,
                    severity,
                    "Large Transaction Detected",
                    format!(
                        "${:.2} charge at {} on {}",
                        t.amount,
                        merchant_label(t),
                        t.transaction_date
                    ),
                )
                .for_transaction(t.id),
            }
        })
        .collect()
}

/// Same merchant and amount within the duplicate window; the later charge of each pair is flagged.
pub fn duplicate_charges(transactions: &[Transaction]) -> Vec<Finding> {
    let mut groups: BTreeMap<(String, String), Vec<&Transaction>> = BTreeMap::new();
    for t in transactions {
        if let Some(merchant) = t.merchant_name.as_deref() {
            groups
                .entry((merchant.to_string(), format!("{:.2}", t.amount)))
                .or_default()
                .push(t);
        }
    }

    let mut findings = Vec::new();
    for group in groups.values().filter(|g| g.len() > 1) {
        for (i, first) in group.iter().enumerate() {
            for second in &group[i + 1..] {
                let gap = days_between(first.transaction_date, second.transaction_date).abs();
                if gap > DUPLICATE_WINDOW_DAYS {
                    continue;
                }
                findings.push(Finding {
                    transaction_id: second.id,
                    reason: format!(
                        "Possible duplicate charge (same as {})",
                        first.transaction_date
                    ),
                    alert: NewAlert::new(
                        AlertType::DuplicateCharge,
                        AlertSeverity::High,
                        "Possible Duplicate Charge",
                        format!(
                            "${:.2} at {} appears twice within {gap} days ({} and {})",
                            second.amount,
                            merchant_label(second),
                            first.transaction_date,
                            second.transaction_date
                        ),
                    )
                    .for_transaction(second.id),
                });
            }
        }
    }
    findings
}

/// Charges above `SPIKE_MULTIPLIER` times the merchant's historical mean.
pub fn spending_spikes(merchant: &str, new: &[&Transaction], history: &[f64]) -> Vec<Finding> {
    if history.len() < MIN_SPIKE_HISTORY {
        return Vec::new();
    }
    let avg = round_money(history.iter().sum::<f64>() / history.len() as f64);
    if avg <= 0.0 {
        return Vec::new();
    }
    new.iter()
        .filter(|t| t.amount > avg * SPIKE_MULTIPLIER)
        .map(|t| Finding {
            transaction_id: t.id,
            reason: format!("Spending spike: ${:.2} vs avg ${avg:.2}", t.amount),
            alert: NewAlert::new(
                AlertType::Overcharge,
                AlertSeverity::High,
                "Spending Spike Detected",
                format!(
                    "${:.2} at {merchant} is {:.1}x your usual amount of ${avg:.2}",
                    t.amount,
                    round_to(t.amount / avg, 1)
                ),
            )
            .for_transaction(t.id),
        })
        .collect()
}

fn merchant_label(t: &Transaction) -> &str {
    t.merchant_name
        .as_deref()
        .or(t.description.as_deref())
        .unwrap_or("unknown merchant")
}

/// Screens freshly imported transactions, flags them and raises alerts. Returns the number flagged.
pub async fn detect_anomalies(
    ctx: &ApiContext,
    account_id: Option<Uuid>,
    new_transactions: &[Transaction],
) -> Result<u64, ApiError> {
    let mut findings = large_transactions(new_transactions);
    findings.extend(duplicate_charges(new_transactions));
    findings.extend(spike_findings(ctx, account_id, new_transactions).await?);

    let mut flagged = HashSet::new();
    for finding in findings {
        let alert = match account_id {
            Some(id) => finding.alert.for_account(id),
            None => finding.alert,
        };
        ctx.storage
            .flag_transaction(finding.transaction_id, &finding.reason)
            .await
            .map_err(internal)?;
        ctx.storage.insert_alert(&alert).await.map_err(internal)?;
        flagged.insert(finding.transaction_id);
    }
    if !flagged.is_empty() {
        info!(?account_id, flagged = flagged.len(), "anomalies flagged");
    }
    Ok(flagged.len() as u64)
}

async fn spike_findings(
    ctx: &ApiContext,
    account_id: Option<Uuid>,
    new_transactions: &[Transaction],
) -> Result<Vec<Finding>, ApiError> {
    let Some(account_id) = account_id else {
        return Ok(Vec::new());
    };
    let Some(anchor) = new_transactions.iter().map(|t| t.transaction_date).max() else {
        return Ok(Vec::new());
    };
    let batch: HashSet<Uuid> = new_transactions.iter().map(|t| t.id).collect();

    let mut by_merchant: BTreeMap<&str, Vec<&Transaction>> = BTreeMap::new();
    for t in new_transactions {
        if let Some(merchant) = t.merchant_name.as_deref() {
            by_merchant.entry(merchant).or_default().push(t);
        }
    }

    let mut findings = Vec::new();
    for (merchant, new) in by_merchant {
        let query = TransactionQuery {
            account_id: Some(account_id),
            merchant: Some(merchant.to_string()),
            start_date: Some(sub_months(anchor, 6)),
            ..TransactionQuery::default()
        };
        let history: Vec<f64> = ctx
            .storage
            .find_transactions(&query, None, 0)
            .await
            .map_err(internal)?
            .into_iter()
            .filter(|t| !batch.contains(&t.id))
            .map(|t| t.amount)
            .collect();
        findings.extend(spending_spikes(merchant, &new, &history));
    }
    Ok(findings)
}

#[cfg(test)]
#[path = "tests/anomalies_tests.rs"]
mod tests;
