// src/invoice/mod.rs

mod detect;
mod extract;

pub use detect::{HOURS_TOLERANCE, detect, parse_period_date};
pub use extract::extract;

use rust_decimal::Decimal;
use serde::Serialize;

/// Flat VAT rate applied to corrected invoices (20%).
pub const VAT_RATE: Decimal = Decimal::from_parts(20, 0, 0, false, 2);

pub const UNKNOWN_INVOICE_ID: &str = "UNKNOWN";

pub const DEFAULT_UNIT: &str = "PCE";

/// A single invoice line. Only lines with a positive total are kept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItem {
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    pub unit: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
}

impl LineItem {
    /// Invoiced hours: unit `HUR` and a description that talks about hours.
    pub fn is_hours(&self) -> bool {
        matches!(self.unit.as_str(), "HUR" | "hur") && mentions_hours(&self.description)
    }
}

/// Everything we know about one invoice after extraction and detection.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceAnalysis {
    pub invoice_id: String,
    pub period_start: Option<String>,
    pub period_end: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub raf_hours: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub invoice_hours: Decimal,
    pub lines: Vec<LineItem>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_charges: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_tax: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub vat_rate: Decimal,
    pub has_issue: bool,
    pub issue_message: String,
    /// Label of the encoding the text was decoded with.
    pub encoding: String,
    /// The decoded document, untouched. Corrections are applied to this.
    #[serde(skip)]
    pub source: String,
}

impl Default for InvoiceAnalysis {
    fn default() -> Self {
        Self {
            invoice_id: UNKNOWN_INVOICE_ID.to_string(),
            period_start: None,
            period_end: None,
            raf_hours: Decimal::ZERO,
            invoice_hours: Decimal::ZERO,
            lines: Vec::new(),
            total_charges: Decimal::ZERO,
            total_tax: Decimal::ZERO,
            total_amount: Decimal::ZERO,
            vat_rate: VAT_RATE,
            has_issue: false,
            issue_message: String::new(),
            encoding: String::new(),
            source: String::new(),
        }
    }
}

impl InvoiceAnalysis {
    pub fn with_source(mut self, source: String, encoding: String) -> Self {
        self.source = source;
        self.encoding = encoding;
        self
    }

    /// RAF hours over invoiced hours, `1` when nothing was invoiced in hours.
    /// `None` when the quotient does not fit a `Decimal`.
    pub fn hour_ratio(&self) -> Option<Decimal> {
        if self.invoice_hours > Decimal::ZERO {
            self.raf_hours.checked_div(self.invoice_hours)
        } else {
            Some(Decimal::ONE)
        }
    }

    /// How many scalar fields were actually found in the document.
    pub fn coverage(&self) -> (usize, usize) {
        let total = 8;
        let filled = [
            self.invoice_id != UNKNOWN_INVOICE_ID,
            self.period_start.is_some(),
            self.period_end.is_some(),
            !self.raf_hours.is_zero(),
            !self.invoice_hours.is_zero(),
            !self.total_charges.is_zero(),
            !self.total_tax.is_zero(),
            !self.total_amount.is_zero(),
        ]
        .iter()
        .filter(|&&v| v)
        .count();
        (filled, total)
    }

    pub fn summary(&self) -> InvoiceSummary {
        InvoiceSummary {
            invoice_id: self.invoice_id.clone(),
            period: format!(
                "{} → {}",
                self.period_start.as_deref().unwrap_or("N/A"),
                self.period_end.as_deref().unwrap_or("N/A")
            ),
            raf_hours: self.raf_hours,
            invoice_hours: self.invoice_hours,
            total_ht: self.total_charges,
            lines_count: self.lines.len(),
            has_issue: self.has_issue,
            issue: self.issue_message.clone(),
        }
    }
}

/// Short, display-oriented view of an analysis.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceSummary {
    pub invoice_id: String,
    pub period: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub raf_hours: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub invoice_hours: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_ht: Decimal,
    pub lines_count: usize,
    pub has_issue: bool,
    pub issue: String,
}

/// Round to cents (banker's rounding) and always print two decimals.
pub fn two_decimals(value: Decimal) -> String {
    format!("{:.2}", value.round_dp(2))
}

fn mentions_hours(label: &str) -> bool {
    let label = label.to_lowercase();
    label.contains("heure") || label.contains("hour")
}
