use super::{DEFAULT_UNIT, InvoiceAnalysis, LineItem, UNKNOWN_INVOICE_ID};
use crate::xml::{children_named, is_named, named, parent_is, text_of};
use roxmltree::{Document, Node};
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::{debug, warn};

/// Main extraction entry point. Detection fields are left at their defaults.
pub fn extract(doc: &Document<'_>) -> InvoiceAnalysis {
    let root = doc.root_element();
    let mut analysis = InvoiceAnalysis {
        invoice_id: extract_invoice_id(root).unwrap_or_else(|| UNKNOWN_INVOICE_ID.to_string()),
        ..InvoiceAnalysis::default()
    };

    extract_timecards(root, &mut analysis);
    extract_totals(root, &mut analysis);
    extract_lines(root, &mut analysis);

    analysis
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

fn extract_invoice_id(root: Node<'_, '_>) -> Option<String> {
    named(root, "Id")
        .filter(|n| parent_is(*n, "DocumentIds"))
        .find_map(text_of)
        .map(|id| id.trim().to_string())
}

// ---------------------------------------------------------------------------
// Time record (RAF)
// ---------------------------------------------------------------------------

fn extract_timecards(root: Node<'_, '_>, analysis: &mut InvoiceAnalysis) {
    for timecard in named(root, "TimeCard") {
        for node in timecard.descendants().filter(|n| n.is_element()) {
            match node.tag_name().name() {
                "PeriodStartDate" => {
                    if let Some(text) = text_of(node) {
                        analysis.period_start = Some(text.trim().to_string());
                    }
                }
                "PeriodEndDate" => {
                    if let Some(text) = text_of(node) {
                        analysis.period_end = Some(text.trim().to_string());
                    }
                }
                "TimeInterval" => {
                    analysis.raf_hours =
                        add_or_skip(analysis.raf_hours, interval_hours(node), "TimeInterval");
                }
                _ => {}
            }
        }
    }
}

/// Hours carried by one `TimeInterval`; zero unless its type is an hour type.
fn interval_hours(interval: Node<'_, '_>) -> Decimal {
    let kind = interval.attribute("type").unwrap_or_default().to_lowercase();
    if !(kind.contains("heure") || kind.contains("hour")) {
        return Decimal::ZERO;
    }

    children_named(interval, "Duration")
        .filter_map(text_of)
        .filter_map(|text| parse_decimal(text, "Duration"))
        .fold(Decimal::ZERO, |total, value| add_or_skip(total, value, "Duration"))
}

// ---------------------------------------------------------------------------
// Invoice totals and lines
// ---------------------------------------------------------------------------

fn extract_totals(root: Node<'_, '_>, analysis: &mut InvoiceAnalysis) {
    for node in root.descendants().filter(|n| n.is_element()) {
        let name = node.tag_name().name();
        let field = match name {
            "TotalCharges" => &mut analysis.total_charges,
            "TotalTax" => &mut analysis.total_tax,
            "TotalAmount" => &mut analysis.total_amount,
            _ => continue,
        };
        if let Some(value) = text_of(node).and_then(|t| parse_decimal(t, name)) {
            *field = value;
        }
    }
}

fn extract_lines(root: Node<'_, '_>, analysis: &mut InvoiceAnalysis) {
    for line in named(root, "Line") {
        let Some(item) = extract_line(line) else {
            continue;
        };
        if item.is_hours() {
            analysis.invoice_hours =
                add_or_skip(analysis.invoice_hours, item.quantity, "ItemQuantity");
        }
        debug!(
            desc = %item.description,
            qty = %item.quantity,
            unit = %item.unit,
            total = %item.total,
            "Line item"
        );
        analysis.lines.push(item);
    }
}

/// Build a line from a `Line` element; `None` when its total is not positive.
fn extract_line(line: Node<'_, '_>) -> Option<LineItem> {
    let mut item = LineItem {
        description: String::new(),
        quantity: Decimal::ZERO,
        unit: DEFAULT_UNIT.to_string(),
        total: Decimal::ZERO,
    };

    for node in line.descendants() {
        if is_named(node, "Description") {
            if node.attribute("owner").is_none() {
                if let Some(text) = text_of(node) {
                    item.description = text.to_string();
                }
            }
        } else if is_named(node, "ItemQuantity") {
            if let Some(text) = text_of(node) {
                item.quantity = parse_decimal(text, "ItemQuantity").unwrap_or_default();
                item.unit = node.attribute("uom").unwrap_or(DEFAULT_UNIT).to_string();
            }
        } else if is_named(node, "Total") && parent_is(node, "Charge") {
            if let Some(value) = text_of(node).and_then(|t| parse_decimal(t, "Total")) {
                item.total = value;
            }
        }
    }

    (item.total > Decimal::ZERO).then_some(item)
}

/// Running sum that drops a value instead of overflowing.
fn add_or_skip(total: Decimal, value: Decimal, field: &str) -> Decimal {
    total.checked_add(value).unwrap_or_else(|| {
        warn!(field, value = %value, total = %total, "Value overflows the running sum, ignored");
        total
    })
}

/// Lenient numeric parsing: a bad value is logged and skipped.
fn parse_decimal(text: &str, field: &str) -> Option<Decimal> {
    let text = text.trim();
    match Decimal::from_str(text).or_else(|_| Decimal::from_scientific(text)) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(field, value = %text, error = %e, "Non-numeric value ignored");
            None
        }
    }
}
