// src/correct.rs

//! Text-level correction of a flagged invoice.
//!
//! The corrected document goes back to PIXID, which rejects anything whose
//! structure moved: attribute order, quoting, whitespace, comments. So the
//! document is never re-serialised. Each physical line is rewritten on its
//! own with targeted substitutions, and a line that matches nothing comes out
//! byte-identical.

use crate::invoice::{InvoiceAnalysis, VAT_RATE, two_decimals};
use regex::{Captures, Regex};
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

/// Replaces an overtime/RTT line that falls outside the corrected period.
pub const REMOVED_LINE_MARKER: &str = "<!-- Ligne supprimée: HS/RTT hors période -->";

/// Markers of lines that only make sense over the full week.
const OUT_OF_PERIOD_MARKERS: [&str; 2] = ["Supplémentaire", "RTT"];

static TOTAL_CHARGES: LazyLock<Regex> = LazyLock::new(|| element_value("TotalCharges"));
static TOTAL_TAX: LazyLock<Regex> = LazyLock::new(|| element_value("TotalTax"));
static TOTAL_AMOUNT: LazyLock<Regex> = LazyLock::new(|| element_value("TotalAmount"));
static ITEM_QUANTITY: LazyLock<Regex> = LazyLock::new(|| element_value("ItemQuantity"));

static BILLED_HOURS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(owner=["']NbHeuresFacturees["']>)[\d.]+(<)"#).expect("valid billed hours pattern")
});
static PERIOD_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(owner=["']DEB_PER["']>)[^<]+(<)"#).expect("valid period start pattern")
});
static PERIOD_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(owner=["']FIN_PER["']>)[^<]+(<)"#).expect("valid period end pattern")
});
static LINE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(?:[\w.-]+:)?Line[\s>]").expect("valid line pattern"));

/// `<tag ...>number</tag>` with an optional namespace prefix. The open tag is
/// group 1, the number group 2, the close tag group 3.
fn element_value(tag: &str) -> Regex {
    Regex::new(&format!(
        r"(<(?:[\w.-]+:)?{tag}\b[^>]*>)([\d.]+)(</(?:[\w.-]+:)?{tag}>)"
    ))
    .expect("valid element pattern")
}

/// Figures a correction writes into the document, computed from the analysis
/// alone so they can be previewed before anything is rewritten.
#[derive(Debug, Clone, Serialize)]
pub struct Correction {
    /// RAF hours over invoiced hours.
    #[serde(with = "rust_decimal::serde::float")]
    pub ratio: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub hours: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_charges: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_tax: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    /// Single day the invoice is collapsed onto, when the time record has one.
    pub period: Option<String>,
    /// Corrected net over original net; scales hour quantities.
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity_ratio: Decimal,
}

impl Correction {
    /// `None` when a corrected figure does not fit a `Decimal`.
    pub fn from_analysis(analysis: &InvoiceAnalysis) -> Option<Self> {
        let ratio = analysis.hour_ratio()?;
        let total_charges = analysis.total_charges.checked_mul(ratio)?;
        let quantity_ratio = if analysis.total_charges.is_zero() {
            ratio
        } else {
            total_charges.checked_div(analysis.total_charges)?
        };

        Some(Self {
            ratio,
            hours: analysis.raf_hours,
            total_charges,
            total_tax: total_charges.checked_mul(VAT_RATE)?,
            total_amount: total_charges.checked_mul(Decimal::ONE + VAT_RATE)?,
            period: analysis.period_start.clone(),
            quantity_ratio,
        })
    }

    /// Overtime and RTT lines go when the invoice collapses onto one day.
    /// Without a start date nothing is collapsed, so they stay.
    fn drops_out_of_period_lines(&self) -> bool {
        self.period.is_some()
    }
}

/// Rewrite `original` so its quantities and totals match the RAF hours.
/// Returns `original` unchanged when no issue was detected, or when a
/// corrected figure would overflow.
pub fn fix(original: &str, analysis: &InvoiceAnalysis) -> String {
    if !analysis.has_issue {
        return original.to_string();
    }

    Correction::from_analysis(analysis)
        .and_then(|correction| apply(original, &correction))
        .unwrap_or_else(|| {
            warn!(
                invoice_id = %analysis.invoice_id,
                "Corrected figures overflow, document left unchanged"
            );
            original.to_string()
        })
}

/// Apply a correction line by line; `None` if a scaled quantity overflows.
pub fn apply(original: &str, correction: &Correction) -> Option<String> {
    info!(
        ratio = %correction.ratio.round_dp(4),
        total_ht = %two_decimals(correction.total_charges),
        tva = %two_decimals(correction.total_tax),
        ttc = %two_decimals(correction.total_amount),
        period = ?correction.period,
        "Applying correction"
    );

    let lines = original
        .split('\n')
        .enumerate()
        .map(|(idx, line)| {
            let corrected = correct_line(line, correction)?;
            if corrected != line {
                debug!(line = idx + 1, "Line rewritten");
            }
            Some(corrected)
        })
        .collect::<Option<Vec<_>>>()?;
    Some(lines.join("\n"))
}

fn correct_line(line: &str, correction: &Correction) -> Option<String> {
    if correction.drops_out_of_period_lines() && is_out_of_period_line(line) {
        return Some(REMOVED_LINE_MARKER.to_string());
    }

    let mut out = substitute(line, &TOTAL_CHARGES, &two_decimals(correction.total_charges));
    out = substitute(&out, &TOTAL_TAX, &two_decimals(correction.total_tax));
    out = substitute(&out, &TOTAL_AMOUNT, &two_decimals(correction.total_amount));
    out = substitute(&out, &BILLED_HOURS, &two_decimals(correction.hours));

    if let Some(period) = &correction.period {
        out = substitute(&out, &PERIOD_START, period);
        out = substitute(&out, &PERIOD_END, period);
    }

    if line.contains("ItemQuantity") && line.contains(r#"uom="HUR""#) {
        out = scale_quantities(&out, correction.quantity_ratio)?;
    }

    Some(out)
}

/// A compact `<Line>` carrying an overtime or RTT description.
fn is_out_of_period_line(line: &str) -> bool {
    LINE_OPEN.is_match(line) && OUT_OF_PERIOD_MARKERS.iter().any(|m| line.contains(m))
}

/// Replace the value between the first and last capture group.
fn substitute(text: &str, pattern: &Regex, value: &str) -> String {
    pattern
        .replace_all(text, |caps: &Captures| {
            let close = &caps[caps.len() - 1];
            format!("{}{value}{close}", &caps[1])
        })
        .into_owned()
}

fn scale_quantities(text: &str, ratio: Decimal) -> Option<String> {
    let mut overflow = false;
    let scaled = ITEM_QUANTITY.replace_all(text, |caps: &Captures| {
        let scaled = Decimal::from_str(&caps[2])
            .ok()
            .map(|quantity| quantity.checked_mul(ratio));
        match scaled {
            Some(Some(quantity)) => format!("{}{}{}", &caps[1], two_decimals(quantity), &caps[3]),
            Some(None) => {
                overflow = true;
                caps[0].to_string()
            }
            None => caps[0].to_string(),
        }
    });
    (!overflow).then(|| scaled.into_owned())
}
