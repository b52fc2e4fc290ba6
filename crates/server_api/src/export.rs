//! CSV and PDF downloads.

use std::io::BufWriter;

use chrono::{Local, NaiveDate};
use printpdf::{BuiltinFont, Mm, PdfDocument};
use shared::{
    domain::{round_money, Transaction},
    error::{ApiError, ErrorCode},
    protocol::CsvExportQuery,
};
use storage::TransactionQuery;

use crate::{analytics::debit_total, first_of, internal, month_end, ApiContext};

pub const CSV_HEADER: [&str; 7] = [
    "Date",
    "Merchant",
    "Category",
    "Amount",
    "Type",
    "Account",
    "Description",
];

// A4 in millimetres.
const PAGE_W: f32 = 210.0;
const PAGE_H: f32 = 297.0;
const MARGIN_LEFT: f32 = 18.0;
const TITLE_SIZE: f32 = 20.0;
const HEADING_SIZE: f32 = 14.0;
const BODY_SIZE: f32 = 12.0;

fn export_error(context: &str, err: impl std::fmt::Display) -> ApiError {
    ApiError::new(ErrorCode::Internal, format!("{context}: {err}"))
}

pub fn write_transactions_csv(transactions: &[Transaction]) -> Result<Vec<u8>, ApiError> {
    let mut csv = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    csv.write_record(CSV_HEADER)
        .map_err(|e| export_error("CSV write error", e))?;
    for t in transactions {
        csv.write_record([
            t.transaction_date.format("%Y-%m-%d").to_string().as_str(),
            t.merchant_name.as_deref().unwrap_or(""),
            t.category.as_deref().unwrap_or(""),
            format!("{:.2}", t.amount).as_str(),
            t.transaction_type.map(|kind| kind.as_str()).unwrap_or(""),
            t.account_name.as_deref().unwrap_or(""),
            t.description.as_deref().unwrap_or(""),
        ])
        .map_err(|e| export_error("CSV write error", e))?;
    }
    csv.into_inner()
        .map_err(|e| export_error("CSV flush error", e.error()))
}

/// Transactions in the date range, newest first, as CSV.
pub async fn transactions_csv(ctx: &ApiContext, query: CsvExportQuery) -> Result<Vec<u8>, ApiError> {
    if query.from > query.to {
        return Err(ApiError::validation("from must not be after to"));
    }
    let filter = TransactionQuery {
        account_id: query.account_id,
        category: query.category.filter(|c| !c.trim().is_empty()),
        start_date: Some(query.from),
        end_date: Some(query.to),
        ..TransactionQuery::default()
    };
    let transactions = ctx
        .storage
        .find_transactions(&filter, None, 0)
        .await
        .map_err(internal)?;
    write_transactions_csv(&transactions)
}

/// Lays out the single-page monthly summary.
pub fn render_monthly_summary(
    month: NaiveDate,
    total_spend: f64,
    categories: &[(String, f64)],
    generated: NaiveDate,
) -> Result<Vec<u8>, ApiError> {
    let title = format!("Monthly Financial Summary - {}", month.format("%B %Y"));
    let (doc, page, layer) = PdfDocument::new(&title, Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
    let font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| export_error("PDF font error", format!("{e:?}")))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| export_error("PDF font error", format!("{e:?}")))?;
    let layer = doc.get_page(page).get_layer(layer);

    let mut y = PAGE_H - 20.0;
    layer.use_text(&title, TITLE_SIZE, Mm(MARGIN_LEFT), Mm(y), &bold);
    y -= 12.0;
    layer.use_text(
        format!("Total Spending: ${total_spend:.2}"),
        BODY_SIZE,
        Mm(MARGIN_LEFT),
        Mm(y),
        &font,
    );
    y -= 7.0;
    layer.use_text(format!("Generated: {generated}"), BODY_SIZE, Mm(MARGIN_LEFT), Mm(y), &font);
    y -= 12.0;
    layer.use_text("Spending by Category:", HEADING_SIZE, Mm(MARGIN_LEFT), Mm(y), &bold);
    y -= 4.0;
    for (category, amount) in categories {
        y -= 6.5;
        if y < 15.0 {
            break;
        }
        layer.use_text(
            format!("  {category}: ${amount:.2}"),
            BODY_SIZE,
            Mm(MARGIN_LEFT),
            Mm(y),
            &font,
        );
    }

    let mut buf = BufWriter::new(Vec::new());
    doc.save(&mut buf)
        .map_err(|e| export_error("PDF write error", format!("{e:?}")))?;
    buf.into_inner()
        .map_err(|e| export_error("PDF write error", e.error()))
}

pub async fn monthly_summary_pdf(ctx: &ApiContext, year: i32, month: u32) -> Result<Vec<u8>, ApiError> {
    let start = first_of(year, month)?;
    let end = month_end(start);
    let total_spend = round_money(debit_total(ctx, start, end).await?);
    let categories = ctx
        .storage
        .category_totals(&TransactionQuery::debits_between(start, end))
        .await
        .map_err(internal)?;
    render_monthly_summary(start, total_spend, &categories, Local::now().date_naive())
}

#[cfg(test)]
#[path = "tests/export_tests.rs"]
mod tests;
