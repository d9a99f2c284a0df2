use super::{InvoiceAnalysis, two_decimals};
use rust_decimal::Decimal;
use time::Date;
use time::macros::format_description;
use tracing::{info, warn};

/// Hour gaps up to this size are rounding noise from the source system.
pub const HOURS_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// More invoiced hours than this for a one-day period means a full week was billed.
const SINGLE_DAY_MAX_HOURS: Decimal = Decimal::from_parts(12, 0, 0, false, 0);

/// Flag RAF/invoice inconsistencies. Messages from several rules accumulate.
pub fn detect(mut analysis: InvoiceAnalysis) -> InvoiceAnalysis {
    let gap = analysis.raf_hours.checked_sub(analysis.invoice_hours);
    // a gap too large to represent is still a gap
    if gap.is_none_or(|gap| gap.abs() > HOURS_TOLERANCE) {
        analysis.has_issue = true;
        analysis.issue_message = format!(
            "Écart détecté: RAF {}h vs Facture {}h",
            two_decimals(analysis.raf_hours),
            two_decimals(analysis.invoice_hours)
        );
    }

    if let (Some(start), Some(end)) = (&analysis.period_start, &analysis.period_end) {
        match (parse_period_date(start), parse_period_date(end)) {
            (Some(start), Some(end)) => {
                if start == end && analysis.invoice_hours > SINGLE_DAY_MAX_HOURS {
                    analysis.has_issue = true;
                    analysis.issue_message.push_str(" | Semaine à cheval détectée");
                }
            }
            _ => warn!(start = %start, end = %end, "Unparseable period dates — week check skipped"),
        }
    }

    info!(
        invoice_id = %analysis.invoice_id,
        has_issue = analysis.has_issue,
        issue = %analysis.issue_message,
        "Detection complete"
    );
    analysis
}

/// Accepts `YYYY-MM-DD` (optionally followed by a time part) and `DD/MM/YYYY`.
pub fn parse_period_date(text: &str) -> Option<Date> {
    let text = text.trim();
    let head = text.get(..10).unwrap_or(text);
    Date::parse(head, format_description!("[year]-[month]-[day]"))
        .or_else(|_| Date::parse(head, format_description!("[day]/[month]/[year]")))
        .ok()
}
