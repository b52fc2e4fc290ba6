use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, Utc};
use shared::{
    domain::{
        round_money, Subscription, SubscriptionFrequency, Transaction, TransactionType,
    },
    error::ApiError,
    protocol::{DetectionSummary, SubscriptionUpdate},
};
use storage::TransactionQuery;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{add_months, days_between, internal, ApiContext};

/// A service recognised by a keyword in the merchant or description text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownService {
    pub keyword: &'static str,
    pub display_name: &'static str,
    pub category: &'static str,
}

const fn known(keyword: &'static str, display_name: &'static str, category: &'static str) -> KnownService {
    KnownService {
        keyword,
        display_name,
        category,
    }
}

pub const KNOWN_SERVICES: &[KnownService] = &[
    known("netflix", "Netflix", "Entertainment"),
    known("spotify", "Spotify", "Entertainment"),
    known("hulu", "Hulu", "Entertainment"),
    known("disney+", "Disney+", "Entertainment"),
    known("disneyplus", "Disney+", "Entertainment"),
    known("hbomax", "HBO Max", "Entertainment"),
    known("max.com", "HBO Max", "Entertainment"),
    known("paramount", "Paramount+", "Entertainment"),
    known("peacock", "Peacock", "Entertainment"),
    known("crunchyroll", "Crunchyroll", "Entertainment"),
    known("fubo", "FuboTV", "Entertainment"),
    known("apple.com/bill", "Apple Services", "Subscriptions"),
    known("apple music", "Apple Music", "Entertainment"),
    known("youtube premium", "YouTube Premium", "Entertainment"),
    known("youtube music", "YouTube Music", "Entertainment"),
    known("amazon prime", "Amazon Prime", "Shopping"),
    known("prime video", "Prime Video", "Entertainment"),
    known("amazon music", "Amazon Music", "Entertainment"),
    known("audible", "Audible", "Entertainment"),
    known("kindle unlimited", "Kindle Unlimited", "Entertainment"),
    known("openai", "ChatGPT Plus", "Technology"),
    known("chatgpt", "ChatGPT Plus", "Technology"),
    known("google one", "Google One", "Technology"),
    known("google *google", "Google Services", "Technology"),
    known("microsoft 365", "Microsoft 365", "Technology"),
    known("microsoft*", "Microsoft", "Technology"),
    known("adobe", "Adobe Creative Cloud", "Technology"),
    known("dropbox", "Dropbox", "Technology"),
    known("icloud", "iCloud", "Technology"),
    known("github", "GitHub", "Technology"),
    known("zoom", "Zoom", "Technology"),
    known("slack", "Slack", "Technology"),
    known("1password", "1Password", "Technology"),
    known("lastpass", "LastPass", "Technology"),
    known("nordvpn", "NordVPN", "Technology"),
    known("expressvpn", "ExpressVPN", "Technology"),
    known("nytimes", "NY Times", "News"),
    known("wsj.com", "Wall Street Journal", "News"),
    known("wapo", "Washington Post", "News"),
    known("duolingo", "Duolingo", "Education"),
    known("coursera", "Coursera", "Education"),
    known("udemy", "Udemy", "Education"),
    known("linkedin learning", "LinkedIn Learning", "Education"),
    known("skillshare", "Skillshare", "Education"),
    known("masterclass", "MasterClass", "Education"),
    known("planet fitness", "Planet Fitness", "Health & Fitness"),
    known("equinox", "Equinox", "Health & Fitness"),
    known("peloton", "Peloton", "Health & Fitness"),
    known("headspace", "Headspace", "Health & Fitness"),
    known("calm", "Calm", "Health & Fitness"),
    known("noom", "Noom", "Health & Fitness"),
    known("myfitnesspal", "MyFitnessPal", "Health & Fitness"),
    known("xfinity", "Xfinity", "Utilities"),
    known("comcast", "Comcast", "Utilities"),
    known("spectrum", "Spectrum", "Utilities"),
    known("verizon", "Verizon", "Utilities"),
    known("t-mobile", "T-Mobile", "Utilities"),
    known("at&t", "AT&T", "Utilities"),
    known("att.com", "AT&T", "Utilities"),
    known("directv", "DirecTV", "Utilities"),
    known("dish network", "Dish Network", "Utilities"),
];

/// First known service whose keyword occurs in the transaction's merchant or description.
pub fn match_known_service(transaction: &Transaction) -> Option<&'static KnownService> {
    let haystack = format!(
        "{} {}",
        transaction.merchant_name.as_deref().unwrap_or_default(),
        transaction.description.as_deref().unwrap_or_default()
    )
    .to_lowercase();
    KNOWN_SERVICES
        .iter()
        .find(|service| haystack.contains(service.keyword))
}

/// Lowercases, drops everything after `*`, strips punctuation and collapses whitespace.
pub fn rough_normalize(merchant: &str) -> String {
    let lowered = merchant.to_lowercase();
    let head = lowered.split('*').next().unwrap_or_default();
    let kept: String = head
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == ' ')
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Classifies the mean gap between the first and last charge.
pub fn detect_frequency(dates: &[NaiveDate]) -> Option<SubscriptionFrequency> {
    if dates.len() < 2 {
        return None;
    }
    let first = dates.iter().min()?;
    let last = dates.iter().max()?;
    let gap = days_between(*first, *last) as f64 / (dates.len() - 1) as f64;
    if (25.0..=35.0).contains(&gap) {
        Some(SubscriptionFrequency::Monthly)
    } else if (85.0..=100.0).contains(&gap) {
        Some(SubscriptionFrequency::Quarterly)
    } else if (350.0..=380.0).contains(&gap) {
        Some(SubscriptionFrequency::Annual)
    } else if (5.0..=10.0).contains(&gap) {
        Some(SubscriptionFrequency::Weekly)
    } else {
        None
    }
}

pub fn average_amount(amounts: &[f64]) -> f64 {
    if amounts.is_empty() {
        return 0.0;
    }
    round_money(amounts.iter().sum::<f64>() / amounts.len() as f64)
}

/// Every amount sits within 10% of the mean.
pub fn is_consistent_amount(amounts: &[f64]) -> bool {
    let avg = average_amount(amounts);
    if avg == 0.0 {
        return false;
    }
    let tolerance = avg * 0.10;
    amounts.iter().all(|a| (a - avg).abs() <= tolerance + 1e-9)
}

pub fn next_expected_date(last: NaiveDate, frequency: SubscriptionFrequency) -> NaiveDate {
    match frequency {
        SubscriptionFrequency::Weekly => last + Duration::weeks(1),
        SubscriptionFrequency::Monthly => add_months(last, 1),
        SubscriptionFrequency::Quarterly => add_months(last, 3),
        SubscriptionFrequency::Annual => add_months(last, 12),
    }
}

fn is_spend(transaction: &Transaction) -> bool {
    !matches!(
        transaction.transaction_type,
        Some(TransactionType::Credit | TransactionType::Payment)
    )
}

/// Runs both detection passes over one account's transactions and returns the number of new records.
pub async fn detect_for_account(
    ctx: &ApiContext,
    account_id: Option<Uuid>,
    transactions: &[Transaction],
) -> Result<u64, ApiError> {
    let known = detect_known(ctx, account_id, transactions).await?;
    let patterned = detect_patterns(ctx, account_id, transactions).await?;
    debug!(?account_id, known, patterned, "subscription detection pass");
    Ok(known + patterned)
}

async fn detect_known(
    ctx: &ApiContext,
    account_id: Option<Uuid>,
    transactions: &[Transaction],
) -> Result<u64, ApiError> {
    let mut found = 0;
    for transaction in transactions.iter().filter(|t| is_spend(t)) {
        let Some(service) = match_known_service(transaction) else {
            continue;
        };
        let normalized = service.display_name.to_lowercase();
        if ctx
            .storage
            .subscription_exists_for_account(&normalized, account_id)
            .await
            .map_err(internal)?
        {
            continue;
        }
        let day = transaction.transaction_date;
        let subscription = Subscription {
            id: Uuid::new_v4(),
            merchant_name: transaction
                .merchant_name
                .clone()
                .unwrap_or_else(|| service.display_name.to_string()),
            normalized_name: Some(normalized),
            amount: Some(transaction.amount),
            frequency: Some(SubscriptionFrequency::Monthly),
            account_id,
            first_seen_date: Some(day),
            last_charged_date: Some(day),
            next_expected_date: Some(add_months(day, 1)),
            times_charged: 1,
            annual_cost: Some(round_money(transaction.amount * 12.0)),
            category: Some(service.category.to_string()),
            is_active: true,
            is_duplicate: false,
            duplicate_of: None,
            notes: None,
            created_at: Utc::now(),
        };
        ctx.storage
            .insert_subscription(&subscription)
            .await
            .map_err(internal)?;
        ctx.storage
            .mark_transactions_recurring(&[transaction.id])
            .await
            .map_err(internal)?;
        info!(service = service.display_name, amount = transaction.amount, "known subscription detected");
        found += 1;
    }
    Ok(found)
}

async fn detect_patterns(
    ctx: &ApiContext,
    account_id: Option<Uuid>,
    transactions: &[Transaction],
) -> Result<u64, ApiError> {
    let mut groups: BTreeMap<String, Vec<&Transaction>> = BTreeMap::new();
    for transaction in transactions.iter().filter(|t| is_spend(t)) {
        let Some(merchant) = transaction.merchant_name.as_deref() else {
            continue;
        };
        groups
            .entry(rough_normalize(merchant))
            .or_default()
            .push(transaction);
    }

    let mut found = 0;
    for (normalized, group) in groups {
        if group.len() < 2 || normalized.is_empty() {
            continue;
        }
        if ctx
            .storage
            .subscription_exists_for_account(&normalized, account_id)
            .await
            .map_err(internal)?
        {
            continue;
        }
        let amounts: Vec<f64> = group.iter().map(|t| t.amount).collect();
        if !is_consistent_amount(&amounts) {
            continue;
        }
        let dates: Vec<NaiveDate> = group.iter().map(|t| t.transaction_date).collect();
        let Some(frequency) = detect_frequency(&dates) else {
            continue;
        };
        let (Some(first), Some(last)) = (dates.iter().min(), dates.iter().max()) else {
            continue;
        };
        let amount = average_amount(&amounts);
        let subscription = Subscription {
            id: Uuid::new_v4(),
            merchant_name: group[0].merchant_name.clone().unwrap_or_else(|| normalized.clone()),
            normalized_name: Some(normalized.clone()),
            amount: Some(amount),
            frequency: Some(frequency),
            account_id,
            first_seen_date: Some(*first),
            last_charged_date: Some(*last),
            next_expected_date: Some(next_expected_date(*last, frequency)),
            times_charged: group.len() as i64,
            annual_cost: Some(round_money(frequency.annual_cost(amount))),
            category: Some("Subscriptions".to_string()),
            is_active: true,
            is_duplicate: false,
            duplicate_of: None,
            notes: None,
            created_at: Utc::now(),
        };
        ctx.storage
            .insert_subscription(&subscription)
            .await
            .map_err(internal)?;
        let ids: Vec<Uuid> = group.iter().map(|t| t.id).collect();
        ctx.storage
            .mark_transactions_recurring(&ids)
            .await
            .map_err(internal)?;
        info!(%normalized, amount, %frequency, "recurring charge detected");
        found += 1;
    }
    Ok(found)
}

/// Marks every later record sharing a normalized name as a duplicate of the first one.
pub async fn mark_duplicates(ctx: &ApiContext) -> Result<u64, ApiError> {
    let all = ctx.storage.list_all_subscriptions().await.map_err(internal)?;
    let mut primaries: BTreeMap<String, Uuid> = BTreeMap::new();
    let mut marked = 0;
    for mut subscription in all {
        let Some(name) = subscription.normalized_name.clone() else {
            continue;
        };
        match primaries.get(&name) {
            None => {
                primaries.insert(name, subscription.id);
            }
            Some(primary) => {
                subscription.is_duplicate = true;
                subscription.duplicate_of = Some(*primary);
                ctx.storage
                    .update_subscription(&subscription)
                    .await
                    .map_err(internal)?;
                marked += 1;
            }
        }
    }
    Ok(marked)
}

/// Clears every subscription and rebuilds the set from all accounts' transactions.
pub async fn detect_all(ctx: &ApiContext) -> Result<DetectionSummary, ApiError> {
    ctx.storage
        .delete_all_subscriptions()
        .await
        .map_err(internal)?;
    let accounts = ctx
        .storage
        .list_accounts_with_transactions()
        .await
        .map_err(internal)?;
    let mut detected = 0;
    for account_id in accounts {
        let query = TransactionQuery {
            account_id: Some(account_id),
            ..TransactionQuery::default()
        };
        let transactions = ctx
            .storage
            .find_transactions_ascending(&query)
            .await
            .map_err(internal)?;
        detected += detect_for_account(ctx, Some(account_id), &transactions).await?;
    }
    mark_duplicates(ctx).await?;
    info!(detected, "subscription detection finished");
    Ok(DetectionSummary { detected })
}

pub async fn list_subscriptions(ctx: &ApiContext) -> Result<Vec<Subscription>, ApiError> {
    ctx.storage
        .list_active_subscriptions()
        .await
        .map_err(internal)
}

pub async fn list_duplicates(ctx: &ApiContext) -> Result<Vec<Subscription>, ApiError> {
    ctx.storage
        .list_duplicate_subscriptions()
        .await
        .map_err(internal)
}

pub async fn update_subscription(
    ctx: &ApiContext,
    subscription_id: Uuid,
    update: SubscriptionUpdate,
) -> Result<Subscription, ApiError> {
    let mut subscription = ctx
        .storage
        .get_subscription(subscription_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("Subscription", subscription_id))?;
    if let Some(active) = update.is_active {
        subscription.is_active = active;
    }
    if update.notes.is_some() {
        subscription.notes = update.notes;
    }
    ctx.storage
        .update_subscription(&subscription)
        .await
        .map_err(internal)?;
    Ok(subscription)
}

#[cfg(test)]
#[path = "tests/subscriptions_tests.rs"]
mod tests;
