//! Issuer-specific transaction layouts. Each scanner returns nothing when the text does not look
//! like its layout, and the caller then falls back to the generic scanner.

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use shared::domain::TransactionType;
use tracing::debug;

use super::parser::{
    self, categorize, classify, normalize_merchant, parse_amount, parse_printed_date, Institution,
    ParsedLine, StatementSummary,
};

static_re!(mmdd_strict_re, r"^(\d{2}/\d{2})\s{2,}(.+?)\s{2,}(-?[\d,]+\.\d{2})\s*$");
static_re!(mmdd_re, r"^(\d{2}/\d{2})\s+(.+?)\s+(-?\$?[\d,]+[.,]\d{2})\s*$");
static_re!(
    mmdd_two_date_re,
    r"^(\d{2}/\d{2})\s+\d{2}/\d{2}\s+(.+?)\s+(-?\$?[\d,]+[.,]\d{2})\s*$"
);
static_re!(amex_re, r"^(\d{2}/\d{2}/\d{2})\*?\s+(.+?)\s+(-?\$[\d,]+\.\d{2})\s*$");
static_re!(
    full_two_date_re,
    r"^(\d{2}/\d{2}/\d{2,4})\s+\d{2}/\d{2}/\d{2,4}\s+(.+?)\s+(-?\$?[\d,]+\.\d{2})\s*$"
);
static_re!(full_date_re, r"^(\d{1,2}/\d{1,2}/\d{2,4})\s+(.+?)\s+(-?\$?[\d,]+\.\d{2})\s*$");
static_re!(
    month_pair_re,
    r"^([A-Z][a-z]{2}\s+\d{1,2})\s+[A-Z][a-z]{2}\s+\d{1,2}\s+(.+?)\s+(-\s*\$[\d,]+\.\d{2}|\$[\d,]+\.\d{2})\s*$"
);
static_re!(
    month_name_re,
    r"^([A-Z][a-z]{2}\.?\s+\d{1,2},\s+\d{4})\s+(.+?)\s+(\(\$?[\d,]+\.\d{2}\)|-?\$?[\d,]+\.\d{2})\s*$"
);
static_re!(aplpay_re, r"(?i)^AplPay\s+");
static_re!(amex_location_re, r"(?:\s+[A-Z][A-Za-z]{2,}){0,2}\s+[A-Z]{2}\s*$");
static_re!(long_reference_re, r"\s+\d{15,20}\s*$");
static_re!(upc_re, r"(?i)\s+UPC#?\s*\d+");
static_re!(card_digits_re, r"(?:\s+\d{4}){1,2}\s*$");
static_re!(caps_location_re, r"(?:\s+[A-Z]{3,}){0,2}\s+[A-Z]{2}\s*$");
static_re!(starts_with_date_re, r"^\d{2}/\d{2}");

/// Which part of the statement a line sits in. Some layouts only say a row is interest or a
/// payment through the heading above it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Unknown,
    Purchases,
    Credits,
    Fees,
    Interest,
}

/// Transaction rows of a statement from `institution`, falling back to the generic scanner when
/// the issuer layout matches nothing.
pub fn parse_statement(
    institution: Institution,
    text: &str,
    summary: &StatementSummary,
    today: NaiveDate,
) -> Vec<ParsedLine> {
    let year = parser::default_year(summary, today);
    let period = summary.period;
    let lines = match institution {
        Institution::Amex => amex(text),
        Institution::Chase => chase(text, period, year),
        Institution::Citi => citi(text, period, year),
        Institution::Discover => discover(text),
        Institution::CapitalOne => capital_one(text, period, year),
        Institution::GoldmanSachs => goldman_sachs(text),
        Institution::BankOfAmerica => bank_of_america(text, period, year),
        Institution::WellsFargo | Institution::Generic => Vec::new(),
    };
    if lines.is_empty() {
        debug!(institution = institution.as_str(), "issuer layout matched nothing, using generic scan");
        return parser::parse_transactions(text, year);
    }
    lines
}

fn trimmed_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|line| !line.is_empty())
}

fn fields<'t>(re: &Regex, line: &'t str) -> Option<(&'t str, &'t str, &'t str)> {
    let caps = re.captures(line)?;
    Some((
        caps.get(1)?.as_str(),
        caps.get(2)?.as_str().trim(),
        caps.get(3)?.as_str(),
    ))
}

fn first_fields<'t>(patterns: &[&Regex], line: &'t str) -> Option<(&'t str, &'t str, &'t str)> {
    patterns.iter().find_map(|re| fields(re, line))
}

/// `$1.00`, `-$1.00`, `- $1.00` and `($1.00)`; parentheses mean a credit.
fn signed_amount(raw: &str) -> Option<f64> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    match compact.strip_prefix('(').and_then(|inner| inner.strip_suffix(')')) {
        Some(inner) => parse_amount(inner).map(|amount| -amount),
        None => parse_amount(&compact),
    }
}

/// Places an `MM/DD` or `Mon DD` date in the statement period. A date after the close belongs to
/// the previous year when that lands inside the period, as on December-to-January statements.
fn resolve_day(raw: &str, period: Option<(NaiveDate, NaiveDate)>, fallback_year: i32) -> Option<NaiveDate> {
    let in_year = |year: i32| {
        if raw.contains('/') {
            parser::parse_date(raw, year)
        } else {
            parser::parse_date(&format!("{raw} {year}"), year)
        }
    };
    let year = period.map_or(fallback_year, |(_, end)| end.year());
    let candidate = in_year(year)?;
    match period {
        Some((start, end)) if candidate > end => match in_year(year - 1) {
            Some(prior) if prior >= start => Some(prior),
            _ => Some(candidate),
        },
        _ => Some(candidate),
    }
}

fn is_summary_row(description: &str) -> bool {
    let lower = description.to_lowercase();
    lower == "description" || lower == "amount" || lower.starts_with("total ") || lower.starts_with("new balance")
}

fn entry(
    date: NaiveDate,
    description: &str,
    raw_amount: &str,
    section: Section,
    clean: fn(&str) -> String,
) -> Option<ParsedLine> {
    if is_summary_row(description) {
        return None;
    }
    let signed = signed_amount(raw_amount)?;
    let kind = classify(description, signed);
    let transaction_type = match section {
        Section::Interest if signed >= 0.0 => TransactionType::Interest,
        Section::Fees if signed >= 0.0 => TransactionType::Fee,
        Section::Credits if kind == TransactionType::Debit => TransactionType::Credit,
        _ => kind,
    };
    let merchant = match clean(description) {
        cleaned if cleaned.is_empty() => normalize_merchant(description),
        cleaned => cleaned,
    };
    let category = categorize(&merchant, transaction_type).map(str::to_string);
    Some(ParsedLine {
        date,
        description: description.to_string(),
        merchant,
        amount: signed.abs(),
        transaction_type,
        category,
    })
}

fn chase(text: &str, period: Option<(NaiveDate, NaiveDate)>, year: i32) -> Vec<ParsedLine> {
    const OPENERS: [&str; 4] = ["date of", "transaction merchant", "account activity", "transaction detail"];
    const CLOSERS: [&str; 4] = ["totals year", "total fees", "total interest", "your annual percentage"];
    let mut in_activity = false;
    let mut out = Vec::new();
    for line in trimmed_lines(text) {
        let lower = line.to_lowercase();
        if OPENERS.iter().any(|marker| lower.contains(marker)) {
            in_activity = true;
            continue;
        }
        if CLOSERS.iter().any(|marker| lower.starts_with(marker)) {
            in_activity = false;
        }
        if !in_activity {
            continue;
        }
        let Some((day, description, amount)) = first_fields(&[mmdd_strict_re(), mmdd_re()], line) else {
            continue;
        };
        let Some(date) = resolve_day(day, period, year) else {
            continue;
        };
        out.extend(entry(date, description, amount, Section::Unknown, normalize_merchant));
    }
    out
}

fn amex_merchant(description: &str) -> String {
    let without_wallet = aplpay_re().replace(description, "");
    let without_location = amex_location_re().replace(&without_wallet, "");
    normalize_merchant(&without_location)
}

fn amex(text: &str) -> Vec<ParsedLine> {
    let mut section = Section::Unknown;
    let mut out = Vec::new();
    for line in trimmed_lines(text) {
        let lower = line.to_lowercase();
        if lower.starts_with("new charges") || lower.starts_with("charges") {
            section = Section::Purchases;
            continue;
        }
        if lower.starts_with("payments") {
            section = Section::Credits;
            continue;
        }
        if lower.starts_with("interest charged") {
            section = Section::Interest;
            continue;
        }
        if lower.starts_with("fees") {
            section = Section::Fees;
            continue;
        }
        if lower.starts_with("about trailing interest") || lower.starts_with("important notices") {
            section = Section::Unknown;
        }
        let Some((day, description, amount)) = fields(amex_re(), line) else {
            continue;
        };
        let Some(date) = parser::parse_short_date(day) else {
            continue;
        };
        out.extend(entry(date, description, amount, section, amex_merchant));
    }
    out
}

fn citi(text: &str, period: Option<(NaiveDate, NaiveDate)>, year: i32) -> Vec<ParsedLine> {
    trimmed_lines(text)
        .filter_map(|line| {
            let (day, description, amount) = first_fields(&[mmdd_two_date_re(), mmdd_re()], line)?;
            let date = resolve_day(day, period, year)?;
            entry(date, description, amount, Section::Unknown, normalize_merchant)
        })
        .collect()
}

fn discover(text: &str) -> Vec<ParsedLine> {
    trimmed_lines(text)
        .filter_map(|line| {
            let (day, description, amount) = first_fields(&[full_two_date_re(), full_date_re()], line)?;
            let date = parser::parse_short_date(day)?;
            entry(date, description, amount, Section::Unknown, normalize_merchant)
        })
        .collect()
}

/// Column headings and page furniture that can still look like a dated row.
fn is_furniture(line: &str) -> bool {
    let lower = line.to_lowercase();
    ["trans date", "post date", "date", "description", "transaction", "amount"]
        .iter()
        .any(|heading| lower.starts_with(heading))
        || ["page ", "continued", "year-to-date", "interest charge on"]
            .iter()
            .any(|marker| lower.contains(marker))
}

fn capital_one(text: &str, period: Option<(NaiveDate, NaiveDate)>, year: i32) -> Vec<ParsedLine> {
    trimmed_lines(text)
        .filter(|line| !is_furniture(line))
        .filter_map(|line| {
            let date_and_fields = match fields(month_pair_re(), line) {
                Some((day, description, amount)) => (resolve_day(day, period, year)?, description, amount),
                None => {
                    let (day, description, amount) = first_fields(&[month_name_re(), full_date_re()], line)?;
                    (parse_printed_date(day)?, description, amount)
                }
            };
            let (date, description, amount) = date_and_fields;
            entry(date, description, amount, Section::Unknown, normalize_merchant)
        })
        .collect()
}

fn goldman_sachs(text: &str) -> Vec<ParsedLine> {
    trimmed_lines(text)
        .filter(|line| !is_furniture(line))
        .filter_map(|line| {
            let (day, description, amount) = first_fields(&[month_name_re(), full_date_re()], line)?;
            let date = parse_printed_date(day)?;
            entry(date, description, amount, Section::Unknown, normalize_merchant)
        })
        .collect()
}

fn bank_of_america_merchant(description: &str) -> String {
    let cleaned = long_reference_re().replace(description, "");
    let cleaned = upc_re().replace_all(&cleaned, "");
    let cleaned = card_digits_re().replace(&cleaned, "");
    let cleaned = caps_location_re().replace(&cleaned, "");
    normalize_merchant(&cleaned)
}

/// Section headings are any undated line naming purchases, payments, fees or interest.
fn bank_of_america_section(lower: &str) -> Option<Section> {
    if lower.contains("total") {
        return None;
    }
    let has_word = |word: &str| lower.split(|c: char| !c.is_alphanumeric()).any(|w| w == word);
    if has_word("purchases") {
        Some(Section::Purchases)
    } else if ["payments", "payment", "credits", "credit"].iter().any(|w| has_word(w)) {
        Some(Section::Credits)
    } else if (has_word("fees") || has_word("fee")) && !lower.contains("no fee") && !lower.contains("annual fee") {
        Some(Section::Fees)
    } else if lower.contains("interest charged") {
        Some(Section::Interest)
    } else {
        None
    }
}

fn bank_of_america(text: &str, period: Option<(NaiveDate, NaiveDate)>, year: i32) -> Vec<ParsedLine> {
    let mut section = Section::Unknown;
    let mut out = Vec::new();
    for line in trimmed_lines(text) {
        if !starts_with_date_re().is_match(line) {
            if let Some(heading) = bank_of_america_section(&line.to_lowercase()) {
                section = heading;
            }
            continue;
        }
        let parsed = match fields(mmdd_two_date_re(), line) {
            Some(row) => Some(row),
            None if section != Section::Unknown => fields(mmdd_re(), line),
            None => None,
        };
        let Some((day, description, amount)) = parsed else {
            continue;
        };
        let Some(date) = resolve_day(day, period, year) else {
            continue;
        };
        if let Some(row) = entry(date, description, amount, section, bank_of_america_merchant) {
            if row.amount > 0.0 {
                out.push(row);
            }
        }
    }
    out
}

#[cfg(test)]
#[path = "tests/banks_tests.rs"]
mod tests;
