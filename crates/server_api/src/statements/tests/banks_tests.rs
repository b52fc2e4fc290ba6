use super::*;
use crate::statements::parser::{detect_institution, extract_last4, parse_summary};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("date")
}

fn scan(text: &str) -> Vec<ParsedLine> {
    let institution = detect_institution(text);
    parse_statement(institution, text, &parse_summary(text), date(2026, 6, 1))
}

#[test]
fn amex_uses_sections_and_strips_wallet_and_location() {
    let text = "\
American Express
Account Ending 9-04001
Payments
01/05/26* AUTOPAY PAYMENT RECEIVED - THANK YOU -$250.00
New Charges
01/09/26 AplPay STARBUCKS SEATTLE WA $6.45
01/12/26 NETFLIX.COM LOS GATOS CA $15.49
Interest Charged
01/31/26 Interest Charge on Purchases $12.08
Total Fees in 2026 $0.00
";
    assert_eq!(extract_last4(text).as_deref(), Some("4001"));
    let lines = scan(text);
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0].transaction_type, TransactionType::Credit);
    assert_eq!(lines[0].amount, 250.0);
    assert_eq!(lines[1].merchant, "STARBUCKS");
    assert_eq!(lines[1].category.as_deref(), Some("Dining"));
    assert_eq!(lines[2].merchant, "NETFLIX.COM");
    assert_eq!(lines[3].transaction_type, TransactionType::Interest);
    assert_eq!(lines[3].date, date(2026, 1, 31));

    let summary = parse_summary(text);
    assert_eq!(summary.ytd_year, Some(2026));
    assert_eq!(summary.ytd_total_fees, Some(0.0));
}

#[test]
fn chase_only_reads_the_activity_block() {
    let text = "\
Chase Sapphire
Opening/Closing Date 12/16/25 - 01/15/26
01/02     NOT A ROW BEFORE ACTIVITY     99.99
ACCOUNT ACTIVITY
12/20     TRADER JOE S #552     64.10
01/03     SHELL OIL 5744     41.00
Totals Year-to-Date
01/04     NOT A ROW AFTER TOTALS     12.00
";
    let lines = scan(text);
    assert_eq!(lines.len(), 2);
    // December rows on a statement closing in January belong to the prior year.
    assert_eq!(lines[0].date, date(2025, 12, 20));
    assert_eq!(lines[0].category.as_deref(), Some("Groceries"));
    assert_eq!(lines[1].date, date(2026, 1, 3));
}

#[test]
fn citi_reads_two_date_rows() {
    let text = "\
Citi Card Statement
Billing Period: 02/01/26 - 02/28/26
02/03  02/04  WHOLE FOODS MARKET #10    88.20
02/10  PAYMENT THANK YOU    -300.00
";
    let lines = scan(text);
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].date, date(2026, 2, 3));
    assert_eq!(lines[0].description, "WHOLE FOODS MARKET #10");
    assert_eq!(lines[1].transaction_type, TransactionType::Credit);
}

#[test]
fn discover_reads_full_dates() {
    let text = "\
Discover it Card
Account ending in 7731
Statement Period: 03/01/2026 - 03/31/2026
03/04/26  03/05/26  AMAZON MARKETPLACE  $23.99
03/18/26  INTERNET PAYMENT - THANK YOU  -$150.00
";
    assert_eq!(extract_last4(text).as_deref(), Some("7731"));
    let summary = parse_summary(text);
    assert_eq!(summary.period, Some((date(2026, 3, 1), date(2026, 3, 31))));
    let lines = scan(text);
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].category.as_deref(), Some("Shopping"));
    assert_eq!(lines[1].amount, 150.0);
}

#[test]
fn capital_one_reads_month_name_rows() {
    let text = "\
Capital One Quicksilver
Jan 21, 2026 - Feb 17, 2026 | 28 days in Billing Cycle
Trans Date Post Date Description Amount
Feb 14 Feb 14 AMAZON MKTPL $10.70
Jan 30 Jan 31 CAPITAL ONE MOBILE PYMT - $63.00
";
    let summary = parse_summary(text);
    assert_eq!(summary.period, Some((date(2026, 1, 21), date(2026, 2, 17))));
    let lines = scan(text);
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].date, date(2026, 2, 14));
    assert_eq!(lines[0].amount, 10.70);
    assert_eq!(lines[1].date, date(2026, 1, 30));
    assert_eq!(lines[1].transaction_type, TransactionType::Credit);
    assert_eq!(lines[1].amount, 63.0);
}

#[test]
fn goldman_reads_parenthesized_credits() {
    let text = "\
Apple Card issued by Goldman Sachs Bank USA
Date  Description  Amount
Mar 3, 2026  UBER TRIP HELP.UBER.COM  $18.40
Mar 9, 2026  ACH DEPOSIT INTERNET TRANSFER  ($500.00)
Total Balance $1,204.11
";
    let lines = scan(text);
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].date, date(2026, 3, 3));
    assert_eq!(lines[0].category.as_deref(), Some("Transportation"));
    assert_eq!(lines[1].transaction_type, TransactionType::Credit);
    assert_eq!(lines[1].amount, 500.0);
    assert_eq!(parse_summary(text).closing_balance, Some(1204.11));
}

#[test]
fn bank_of_america_cleans_merchants_and_drops_zero_rows() {
    let text = "\
Bank of America
Account# 5524 3317 8442 3266
Statement Closing Date 04/22/2026
New Balance Total $842.10
Payments and Other Credits
04/02 04/02 PAYMENT - THANKYOU 84473401234567890123 -200.00
Purchases and Adjustments
04/05 04/06 KROGER #123 AUSTIN TX 4412 56.78
04/07 04/08 FREEBIE ZERO DOLLAR 0.00
04/09 TARGET 00012345 DALLAS TX 19.99
";
    assert_eq!(extract_last4(text).as_deref(), Some("3266"));
    assert_eq!(parse_summary(text).closing_balance, Some(842.10));
    let lines = scan(text);
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0].transaction_type, TransactionType::Credit);
    assert_eq!(lines[0].amount, 200.0);
    assert_eq!(lines[1].merchant, "KROGER #123");
    assert_eq!(lines[1].category.as_deref(), Some("Groceries"));
    assert_eq!(lines[2].date, date(2026, 4, 9));
    assert_eq!(lines[2].transaction_type, TransactionType::Debit);
}

#[test]
fn unmatched_layouts_fall_back_to_the_generic_scan() {
    let text = "Chase\n03/02/2026  CORNER GROCERY STORE   42.00\n";
    let lines = scan(text);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].amount, 42.0);
}

#[test]
fn amounts_accept_issuer_notations() {
    assert_eq!(signed_amount("($12.50)"), Some(-12.5));
    assert_eq!(signed_amount("- $63.00"), Some(-63.0));
    assert_eq!(signed_amount("$1,204.11"), Some(1204.11));
    assert_eq!(signed_amount("n/a"), None);
}
