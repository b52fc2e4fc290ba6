//! Text-level statement parsing: institution detection, summary figures and the generic
//! line-oriented transaction scanner used when no issuer layout applies.

use std::sync::OnceLock;

use chrono::{Datelike, Duration, NaiveDate};
use regex::Regex;
use shared::domain::{round_money, TransactionType};

/// Only the head of the document is trusted for branding; footers often name partner banks.
const HEADER_CHARS: usize = 1500;

/// Due dates missing from the text are assumed to fall this long after the period closes.
const INFERRED_DUE_DAYS: i64 = 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Institution {
    Amex,
    BankOfAmerica,
    WellsFargo,
    Citi,
    CapitalOne,
    Chase,
    Discover,
    GoldmanSachs,
    Generic,
}

impl Institution {
    pub fn as_str(self) -> &'static str {
        match self {
            Institution::Amex => "AMEX",
            Institution::BankOfAmerica => "BANK_OF_AMERICA",
            Institution::WellsFargo => "WELLS_FARGO",
            Institution::Citi => "CITI",
            Institution::CapitalOne => "CAPITAL_ONE",
            Institution::Chase => "CHASE",
            Institution::Discover => "DISCOVER",
            Institution::GoldmanSachs => "GOLDMAN_SACHS",
            Institution::Generic => "GENERIC",
        }
    }

    fn card_name(self) -> &'static str {
        match self {
            Institution::Amex => "American Express Card",
            Institution::BankOfAmerica => "Bank of America Card",
            Institution::WellsFargo => "Wells Fargo Card",
            Institution::Citi => "Citi Card",
            Institution::CapitalOne => "Capital One Card",
            Institution::Chase => "Chase Card",
            Institution::Discover => "Discover Card",
            Institution::GoldmanSachs => "Apple Card",
            Institution::Generic => "GENERIC Card",
        }
    }
}

/// Name for an auto-created account, e.g. "Chase ···7844".
pub fn account_display_name(institution: Institution, last4: Option<&str>) -> String {
    let name = institution.card_name();
    match last4 {
        Some(last4) => name.replace(" Card", &format!(" ···{last4}")),
        None => name.to_string(),
    }
}

pub fn detect_institution(text: &str) -> Institution {
    let lower = text.to_lowercase();
    let header: String = lower.chars().take(HEADER_CHARS).collect();
    match_institution(&header, true).unwrap_or_else(|| {
        match_institution(&lower, false).unwrap_or(Institution::Generic)
    })
}

fn match_institution(lower: &str, header: bool) -> Option<Institution> {
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));
    if has(&["american express", "americanexpress.com"]) {
        Some(Institution::Amex)
    } else if has(&["bank of america", "bankofamerica"]) {
        Some(Institution::BankOfAmerica)
    } else if has(&["wells fargo"]) {
        Some(Institution::WellsFargo)
    } else if has(&["citibank", "citi card"]) || (header && lower.contains("citicards")) {
        Some(Institution::Citi)
    } else if has(&["capital one", "capitalone.com"]) {
        Some(Institution::CapitalOne)
    } else if has(&["chase", "jpmorgan"]) {
        Some(Institution::Chase)
    } else if has(&["discover", "dfs services"]) {
        Some(Institution::Discover)
    } else if has(&["goldman sachs", "apple card", "applecard.apple.com"]) {
        Some(Institution::GoldmanSachs)
    } else {
        None
    }
}

static_re!(
    masked_last4_re,
    r"(?i)(?:account|card)\s*(?:number|ending|#)[:\s]+(?:[Xx*•·]{4}[\s-]*){2,3}(\d{4})"
);
static_re!(ending_last4_re, r"(?i)(?:account|card)\s+ending(?:\s+in)?[:\s]+[\d-]*(\d{4})\b");
static_re!(grouped_last4_re, r"(?i)account\s*#?\s*(?:\d{4}\s+){2,3}(\d{4})\b");

/// Last four digits of the card, from masked numbers, "ending in" phrases or grouped numbers.
pub fn extract_last4(text: &str) -> Option<String> {
    [masked_last4_re(), ending_last4_re(), grouped_last4_re()]
        .into_iter()
        .find_map(|re| re.captures(text)?.get(1))
        .map(|m| m.as_str().to_string())
}

/// Figures printed in a statement's summary box. Everything is optional; layouts vary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatementSummary {
    pub period: Option<(NaiveDate, NaiveDate)>,
    pub opening_balance: Option<f64>,
    pub closing_balance: Option<f64>,
    pub minimum_payment: Option<f64>,
    pub payment_due_date: Option<NaiveDate>,
    pub ytd_year: Option<i32>,
    pub ytd_total_fees: Option<f64>,
    pub ytd_total_interest: Option<f64>,
    pub credit_limit: Option<f64>,
    pub available_credit: Option<f64>,
    pub apr: Option<f64>,
    /// Introductory purchase rate and the day it ends.
    pub promo_apr: Option<(f64, NaiveDate)>,
}

static_re!(
    new_balance_re,
    r"(?im)^(?:total\s+)?(?:new|total)\s+balance(?:\s+total)?[:\s]+\$?([\d,]+\.\d{2})\s*$"
);
static_re!(previous_balance_re, r"(?im)^previous\s+balance\s+\$?(-?[\d,]+\.\d{2})");
static_re!(due_date_re, r"(?i)payment\s+due\s+date.*?(\d{1,2}/\d{1,2}/\d{2,4})");
static_re!(min_payment_re, r"(?i)minimum\s+payment\s+due.*?\$?([\d,]+\.\d{2})");
static_re!(
    ytd_fees_re,
    r"(?i)total\s+fees\s+(?:charged\s+)?in\s+(\d{4})\s+\$?([\d,]+\.\d{2})"
);
static_re!(
    ytd_interest_re,
    r"(?i)total\s+interest\s+(?:charged\s+)?in\s+(\d{4})\s+\$?([\d,]+\.\d{2})"
);
static_re!(
    period_re,
    r"(?i)opening/closing\s+date\s+(\d{1,2}/\d{1,2}/\d{2,4})\s*[-–]\s*(\d{1,2}/\d{1,2}/\d{2,4})"
);
static_re!(
    labelled_period_re,
    r"(?i)(?:statement|billing)\s+period[:\s]+(\d{1,2}/\d{1,2}/\d{2,4})\s*(?:to|through|-|–)\s*(\d{1,2}/\d{1,2}/\d{2,4})"
);
static_re!(
    split_period_re,
    r"(?i)open(?:ing)?\s+date[:\s]+(\d{1,2}/\d{1,2}/\d{2,4})[^\n]*?clos(?:e|ing)\s+date[:\s]+(\d{1,2}/\d{1,2}/\d{2,4})"
);
static_re!(
    month_name_period_re,
    r"([A-Z][a-z]{2}\.?\s+\d{1,2},\s+\d{4})\s*[-–]\s*([A-Z][a-z]{2}\.?\s+\d{1,2},\s+\d{4})"
);
static_re!(
    through_period_re,
    r"(\d{1,2}/\d{1,2}/\d{2,4})\s+(?:through|to)\s+(\d{1,2}/\d{1,2}/\d{2,4})"
);
static_re!(
    credit_limit_re,
    r"(?i)(?:credit\s+limit|credit\s+access\s+line|credit\s+line)[:\s]+\$?([\d,]+(?:\.\d{2})?)"
);
static_re!(
    available_credit_re,
    r"(?i)a\W?vailable\s+(?:credit|for\s+purchase)[:\s]+\$?([\d,]+(?:\.\d{2})?)"
);
static_re!(purchase_apr_re, r"(?im)^purchases\s+(\d{1,2}\.\d{2})%");
static_re!(labelled_apr_re, r"(?i)purchase\s+apr[:\s]+(\d{1,2}\.\d{2})%");
static_re!(
    promo_row_re,
    r"(?im)^purchases\s+(\d{1,2}\.\d{2})%[^\n]*?(\d{1,2}/\d{1,2}/\d{2,4})"
);
static_re!(
    intro_apr_re,
    r"(?i)(\d{1,2}\.\d{2})%\s+intro(?:ductory)?\s+apr[^\n]*?(\d{1,2}/\d{1,2}/\d{2,4})"
);

/// Rates at or below this are introductory offers, not the card's regular APR.
const PROMO_APR_CEILING: f64 = 5.0;

pub fn parse_summary(text: &str) -> StatementSummary {
    let amount_of = |re: &Regex| {
        re.captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| parse_amount(m.as_str()))
    };

    let mut summary = StatementSummary {
        opening_balance: amount_of(previous_balance_re()),
        closing_balance: amount_of(new_balance_re()),
        minimum_payment: amount_of(min_payment_re()),
        credit_limit: amount_of(credit_limit_re()),
        available_credit: amount_of(available_credit_re()),
        ..StatementSummary::default()
    };

    summary.payment_due_date = due_date_re()
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| parse_short_date(m.as_str()));

    summary.period = [
        period_re(),
        labelled_period_re(),
        split_period_re(),
        month_name_period_re(),
        through_period_re(),
    ]
    .into_iter()
    .find_map(|re| {
        let c = re.captures(text)?;
        let start = parse_printed_date(c.get(1)?.as_str())?;
        let end = parse_printed_date(c.get(2)?.as_str())?;
        (start <= end).then_some((start, end))
    });

    if let Some(c) = ytd_fees_re().captures(text) {
        summary.ytd_year = c.get(1).and_then(|m| m.as_str().parse().ok());
        summary.ytd_total_fees = c.get(2).and_then(|m| parse_amount(m.as_str()));
    }
    if let Some(c) = ytd_interest_re().captures(text) {
        if summary.ytd_year.is_none() {
            summary.ytd_year = c.get(1).and_then(|m| m.as_str().parse().ok());
        }
        summary.ytd_total_interest = c.get(2).and_then(|m| parse_amount(m.as_str()));
    }

    // The last plausible purchase rate is the regular one; promo rows come first and sit near 0%.
    summary.apr = purchase_apr_re()
        .captures_iter(text)
        .chain(labelled_apr_re().captures_iter(text))
        .filter_map(|c| c.get(1)?.as_str().parse::<f64>().ok())
        .filter(|rate| *rate > PROMO_APR_CEILING)
        .last();

    summary.promo_apr = promo_row_re()
        .captures_iter(text)
        .chain(intro_apr_re().captures_iter(text))
        .find_map(|c| {
            let rate = c.get(1)?.as_str().parse::<f64>().ok()?;
            let ends = parse_short_date(c.get(2)?.as_str())?;
            (rate <= PROMO_APR_CEILING).then_some((rate, ends))
        });

    if summary.payment_due_date.is_none() {
        if let Some((_, end)) = summary.period {
            summary.payment_due_date = Some(end + Duration::days(INFERRED_DUE_DAYS));
        }
    }
    summary
}

/// A full date as printed in headers: `MM/DD/YY`, `MM/DD/YYYY` or `Jan. 15, 2026`.
pub fn parse_printed_date(raw: &str) -> Option<NaiveDate> {
    if raw.contains('/') {
        parse_short_date(raw)
    } else {
        parse_date(&raw.replace('.', ""), 0)
    }
}

/// One transaction line recognized in the statement text.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLine {
    pub date: NaiveDate,
    pub description: String,
    pub merchant: String,
    pub amount: f64,
    pub transaction_type: TransactionType,
    pub category: Option<String>,
}

fn transaction_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(\d{1,2}/\d{1,2}(?:/\d{2,4})?|[A-Za-z]{3}\s+\d{1,2},?\s*\d{4})\s+(.{10,60}?)\s+(-?\$?\d{1,3}(?:,\d{3})*\.\d{2})",
        )
        .expect("transaction regex")
    })
}

/// Scans every line for `date  description  amount`. Dates without a year take `default_year`.
pub fn parse_transactions(text: &str, default_year: i32) -> Vec<ParsedLine> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| parse_line(line, default_year))
        .collect()
}

fn parse_line(line: &str, default_year: i32) -> Option<ParsedLine> {
    let caps = transaction_re().captures(line)?;
    let date = parse_date(caps.get(1)?.as_str().trim(), default_year)?;
    let description = caps.get(2)?.as_str().trim().to_string();
    let signed = parse_amount(caps.get(3)?.as_str())?;

    let transaction_type = classify(&description, signed);
    let merchant = normalize_merchant(&description);
    let category = categorize(&merchant, transaction_type).map(str::to_string);
    Some(ParsedLine {
        date,
        description,
        merchant,
        amount: signed.abs(),
        transaction_type,
        category,
    })
}

pub(crate) fn classify(description: &str, signed_amount: f64) -> TransactionType {
    let lower = description.to_lowercase();
    if signed_amount < 0.0 || lower.contains("refund") || lower.contains("credit adjustment") {
        TransactionType::Credit
    } else if lower.contains("payment") || lower.contains("autopay") {
        TransactionType::Payment
    } else if lower.contains("interest") {
        TransactionType::Interest
    } else if lower.contains("fee") {
        TransactionType::Fee
    } else {
        TransactionType::Debit
    }
}

pub fn parse_date(raw: &str, default_year: i32) -> Option<NaiveDate> {
    if raw.contains('/') {
        return parse_slash_date(raw, default_year);
    }
    ["%Y-%m-%d", "%b %d, %Y", "%b %d %Y", "%d %b %Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// `MM/DD/YY` or `MM/DD/YYYY`; two-digit years are 20xx.
pub fn parse_short_date(raw: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = raw.split('/').collect();
    if parts.len() != 3 {
        return None;
    }
    parse_slash_date(raw, 0)
}

fn parse_slash_date(raw: &str, default_year: i32) -> Option<NaiveDate> {
    let mut parts = raw.split('/');
    let month: u32 = parts.next()?.trim().parse().ok()?;
    let day: u32 = parts.next()?.trim().parse().ok()?;
    let year = match parts.next() {
        Some(y) if y.len() == 2 => 2000 + y.parse::<i32>().ok()?,
        Some(y) if y.len() == 4 => y.parse::<i32>().ok()?,
        Some(_) => return None,
        None => default_year,
    };
    if parts.next().is_some() {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Strips `$` and thousands separators. A lone `d,dd` is read as a decimal comma.
pub fn parse_amount(raw: &str) -> Option<f64> {
    static DECIMAL_COMMA: OnceLock<Regex> = OnceLock::new();
    let cleaned = raw.replace('$', "");
    let cleaned = cleaned.trim();
    let re = DECIMAL_COMMA.get_or_init(|| Regex::new(r"^-?\d{1,3},\d{2}$").expect("decimal comma"));
    let normalized = if re.is_match(cleaned) {
        cleaned.replace(',', ".")
    } else {
        cleaned.replace(',', "")
    };
    normalized.parse::<f64>().ok().map(round_money)
}

fn trailing_reference_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+\d{5,}.*$").expect("reference regex"))
}

fn bank_code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(?:POS |DDA |ACH |PPD |CCD )").expect("bank code regex"))
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace regex"))
}

/// Drops trailing reference numbers and leading bank codes, and collapses whitespace.
pub fn normalize_merchant(description: &str) -> String {
    let trimmed = trailing_reference_re().replace(description, "");
    let trimmed = bank_code_re().replace(&trimmed, "");
    whitespace_re().replace_all(&trimmed, " ").trim().to_string()
}

const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "Groceries",
        &[
            "wholefds", "whole foods", "kroger", "trader joe", "safeway", "publix", "aldi",
            "patel brothers", "patel brother", "harris teeter", "fresh market", "food lion",
            "wegman", "sprouts", "h-e-b", "market basket", "giant", "stop shop", "meijer",
            "albertsons", "vons", "ralph", "piggly", "grocery", "supermarket", "food mart",
            "fresh fare", "compare foods",
        ],
    ),
    (
        "Dining",
        &[
            "restaurant", "kitchen", "grill", "pizza", "sushi", "ramen", "taco", "burger",
            "mcdonald", "chipotle", "panera", "subway", "chick-fil", "domino", "doordash",
            "grubhub", "ubereats", "door dash", "uber eats", "postmates", "seamless",
            "starbucks", "dunkin", "coffee", "cafe", "diner", "bistro", "eatery", "barbeque",
            "bbq", "thai", "chinese", "indian restaurant", "desi district", "pho", "wingstop",
            "five guys", "shake shack", "in-n-out", "popeyes", "kfc", "sonic drive",
            "dairy queen", "applebee", "chilis", "olive garden", "red lobster", "ihop", "denny",
            "tst*", "toast", "benihana", "buffalo wild", "outback", "cracker barrel",
            "cheesecake factory", "texas roadhouse", "hooters", "legal sea",
        ],
    ),
    (
        "Subscriptions",
        &[
            "netflix", "spotify", "hulu", "disney+", "apple.com/bill", "google play",
            "google one", "google *google", "youtube premium", "youtube music", "paramount",
            "peacock", "hbo", "max.com", "showtime", "audible", "amazon prime", "apple music",
            "pandora", "tidal", "crunchyroll", "fubo", "microsoft 365", "dropbox", "icloud",
            "adobe", "1password", "lastpass",
        ],
    ),
    (
        "Shopping",
        &[
            "amazon", "walmart", "target", "costco", "best buy", "ebay", "etsy", "apple store",
            "apple retail", "ikea", "home depot", "lowe", "tj maxx", "marshalls", "ross",
            "nordstrom", "macy", "gap", "old navy", "h&m", "zara", "forever 21", "bath body",
            "victoria secret", "sephora", "ulta", "chewy", "petco", "pet smart", "staples",
            "office depot", "dollar tree", "dollar general", "five below", "nautica",
            "gap factory", "banana republic", "j.crew", "ann taylor", "dsw", "rack room",
            "shoe carnival", "famous footwear", "foot locker", "burlington coat",
            "tuesday morning",
        ],
    ),
    (
        "Travel",
        &[
            "airline", "airways", "united air", "delta air", "american air", "southwest",
            "jetblue", "alaska air", "spirit air", "frontier air", "hotel", "hilton", "marriott",
            "hyatt", "westin", "sheraton", "ihg", "hampton inn", "holiday inn", "airbnb", "vrbo",
            "expedia", "priceline", "booking.com", "hotels.com", "kayak", "travelocity", "hertz",
            "enterprise rent", "avis", "national car", "budget car", "amtrak", "greyhound",
        ],
    ),
    (
        "Transportation",
        &[
            "uber", "lyft", "taxi", "transit", "metro", "mta", "bart", "parking", "parkmobile",
            "spothero", "divvy", "citi bike", "lime", "bird scooter",
        ],
    ),
    (
        "Gas",
        &[
            "bp oil", "bp #", "shell oil", "exxon", "mobil", "chevron", "sunoco", "marathon",
            "citgo", "getty", "speedway", "wawa", "sheetz", "kwik trip", "casey", "circle k",
            "racetrac", "gas station", "fuel", "quiktrip", "7-eleven", "pilot flying",
        ],
    ),
    (
        "Healthcare",
        &[
            "pharmacy", "cvs", "walgreen", "rite aid", "hospital", "medical", "doctor", "dental",
            "dentist", "vision", "optometric", "health", "urgent care", "clinic", "laboratory",
            "quest diagnostics", "labcorp", "kaiser", "blue cross", "aetna", "cigna", "humana",
            "insurance",
        ],
    ),
    (
        "Utilities",
        &[
            "electric", "gas utility", "water utility", "sewage", "waste", "comcast", "xfinity",
            "spectrum", "cox comm", "at&t", "att.com", "verizon", "t-mobile", "sprint",
            "dish network", "directv", "internet service", "phone bill",
        ],
    ),
    (
        "Entertainment",
        &[
            "amc theatre", "regal cinema", "cinemark", "movie", "concert", "ticketmaster",
            "eventbrite", "live nation", "stub hub", "sports ticket", "golf", "bowling",
            "escape room", "dave buster", "arcade", "museum", "zoo", "aquarium", "sea life",
            "theme park", "six flags", "disney world", "legoland", "universal studios",
            "seaworld",
        ],
    ),
    (
        "Health & Fitness",
        &[
            "planet fitness", "la fitness", "equinox", "gold gym", "ymca", "anytime fitness",
            "crossfit", "peloton", "beachbody", "gym", "fitness", "yoga", "pilates", "sport",
            "athletic",
        ],
    ),
    (
        "Education",
        &[
            "tuition", "university", "college", "school", "coursera", "udemy",
            "linkedin learning", "skillshare", "pluralsight", "books", "textbook", "education",
            "tutoring", "chegg",
        ],
    ),
];

/// Keyword categorization. Credits and payments stay uncategorized; fees and interest are "Fees".
pub fn categorize(merchant: &str, transaction_type: TransactionType) -> Option<&'static str> {
    match transaction_type {
        TransactionType::Fee | TransactionType::Interest => return Some("Fees"),
        TransactionType::Credit | TransactionType::Payment => return None,
        TransactionType::Debit => {}
    }
    let lower = merchant.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(category, _)| *category)
}

/// Year to assume for `MM/DD` dates: the closing year of the printed period, else `fallback`.
pub fn default_year(summary: &StatementSummary, fallback: NaiveDate) -> i32 {
    summary
        .period
        .map(|(_, end)| end.year())
        .unwrap_or_else(|| fallback.year())
}

#[cfg(test)]
#[path = "tests/parser_tests.rs"]
mod tests;
