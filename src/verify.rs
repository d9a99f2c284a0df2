// src/verify.rs

use crate::invoice::{HOURS_TOLERANCE, VAT_RATE};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

/// Cent-level slack between a total and the value derived from the net.
const AMOUNT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Checks run on a corrected document by analysing it again.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verification {
    pub well_formed: bool,
    /// RAF hours equal invoiced hours.
    pub hours_match: bool,
    /// Tax is 20% of the net total.
    pub tax_consistent: bool,
    /// Gross is net plus tax.
    pub gross_consistent: bool,
    pub line_count_preserved: bool,
}

impl Verification {
    pub fn passed(&self) -> bool {
        self.checks().iter().all(|(_, ok)| *ok)
    }

    /// Labelled checks, in display order.
    pub fn checks(&self) -> [(&'static str, bool); 5] {
        [
            ("RAF = Lignes", self.hours_match),
            ("TVA correcte", self.tax_consistent),
            ("TTC = HT + TVA", self.gross_consistent),
            ("Structure XML préservée", self.well_formed),
            ("Nombre de lignes conservé", self.line_count_preserved),
        ]
    }
}

pub fn verify_correction(original: &str, corrected: &str) -> Verification {
    let line_count_preserved = original.split('\n').count() == corrected.split('\n').count();

    let analysis = match crate::analyze(corrected) {
        Ok(analysis) => analysis,
        Err(e) => {
            warn!(error = %e, "Corrected document no longer parses");
            return Verification {
                well_formed: false,
                hours_match: false,
                tax_consistent: false,
                gross_consistent: false,
                line_count_preserved,
            };
        }
    };

    let net = analysis.total_charges;
    let verification = Verification {
        well_formed: true,
        hours_match: within(analysis.raf_hours, analysis.invoice_hours, HOURS_TOLERANCE),
        tax_consistent: net
            .checked_mul(VAT_RATE)
            .is_some_and(|tax| within(analysis.total_tax, tax, AMOUNT_TOLERANCE)),
        gross_consistent: net
            .checked_add(analysis.total_tax)
            .is_some_and(|gross| within(analysis.total_amount, gross, AMOUNT_TOLERANCE)),
        line_count_preserved,
    };
    info!(passed = verification.passed(), ?verification, "Verification");
    verification
}

/// `|a - b| <= tolerance`; false when the difference overflows.
fn within(a: Decimal, b: Decimal, tolerance: Decimal) -> bool {
    a.checked_sub(b).is_some_and(|diff| diff.abs() <= tolerance)
}
