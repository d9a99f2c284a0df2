use pixid_fixer::correct::REMOVED_LINE_MARKER;
use pixid_fixer::encoding::Strategy;
use pixid_fixer::verify::verify_correction;
use pixid_fixer::{FixerError, analyze, fix};
use rust_decimal::Decimal;
use std::str::FromStr;

const WEEK_ACROSS_MONTHS: &str = include_str!("fixtures/week_across_months.xml");
const CONSISTENT: &str = include_str!("fixtures/consistent.xml");

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

#[test]
fn test_week_across_months_is_detected() {
    let analysis = analyze(WEEK_ACROSS_MONTHS).unwrap();

    assert_eq!(analysis.invoice_id, "FA-2024-0815");
    assert_eq!(analysis.period_start.as_deref(), Some("2024-08-30"));
    assert_eq!(analysis.period_end.as_deref(), Some("2024-08-30"));
    assert_eq!(analysis.raf_hours, dec("8"));
    assert_eq!(analysis.invoice_hours, dec("38"));
    assert_eq!(analysis.lines.len(), 1);
    assert!(analysis.has_issue);
    assert_eq!(
        analysis.issue_message,
        "Écart détecté: RAF 8.00h vs Facture 38.00h | Semaine à cheval détectée"
    );
}

#[test]
fn test_week_across_months_is_corrected() {
    let analysis = analyze(WEEK_ACROSS_MONTHS).unwrap();
    let corrected = fix(&analysis);

    assert!(corrected.contains("<TotalCharges>179.95</TotalCharges>"));
    assert!(corrected.contains("<TotalTax>35.99</TotalTax>"));
    assert!(corrected.contains("<TotalAmount>215.94</TotalAmount>"));
    assert!(corrected.contains(r#"<AdditionalData owner="NbHeuresFacturees">8.00</AdditionalData>"#));
    assert!(corrected.contains(r#"<AdditionalData owner="DEB_PER">2024-08-30</AdditionalData>"#));
    assert!(corrected.contains(r#"<AdditionalData owner="FIN_PER">2024-08-30</AdditionalData>"#));
    assert!(corrected.contains(r#"<ItemQuantity uom="HUR">8.00</ItemQuantity>"#));
    assert_eq!(corrected.matches(REMOVED_LINE_MARKER).count(), 2);

    // untouched text stays byte-identical
    assert!(corrected.contains("<!-- période facturée par le logiciel de paie -->"));
    assert!(corrected.contains(r#"<Price><Amount currency="EUR">22.494</Amount></Price>"#));
    assert!(corrected.contains("            <Total>854.76</Total>"));
    assert_eq!(
        corrected.split('\n').count(),
        WEEK_ACROSS_MONTHS.split('\n').count()
    );
}

#[test]
fn test_corrected_totals_follow_hour_ratio() {
    let original = analyze(WEEK_ACROSS_MONTHS).unwrap();
    let corrected = analyze(fix(&original)).unwrap();

    let money_ratio = corrected.total_charges / original.total_charges;
    let hour_ratio = original.raf_hours / original.invoice_hours;
    assert!((money_ratio - hour_ratio).abs() <= dec("0.01"));
    assert_eq!(corrected.total_tax, (corrected.total_charges * dec("0.20")).round_dp(2));
    assert_eq!(corrected.total_amount, (corrected.total_charges * dec("1.20")).round_dp(2));
}

#[test]
fn test_second_pass_is_a_no_op() {
    let first = fix(&analyze(WEEK_ACROSS_MONTHS).unwrap());
    let reanalysed = analyze(first.as_str()).unwrap();

    assert!(!reanalysed.has_issue, "{}", reanalysed.issue_message);
    assert_eq!(fix(&reanalysed), first);
}

#[test]
fn test_correction_verifies() {
    let corrected = fix(&analyze(WEEK_ACROSS_MONTHS).unwrap());
    let verification = verify_correction(WEEK_ACROSS_MONTHS, &corrected);
    assert!(verification.passed(), "{verification:?}");
}

#[test]
fn test_consistent_invoice_is_returned_unchanged() {
    let analysis = analyze(CONSISTENT.as_bytes()).unwrap();

    assert!(!analysis.has_issue);
    assert!(analysis.issue_message.is_empty());
    assert_eq!(analysis.raf_hours, analysis.invoice_hours);
    assert_eq!(fix(&analysis), CONSISTENT);
}

#[test]
fn test_missing_timecard_zeroes_totals() {
    let start = WEEK_ACROSS_MONTHS.find("<TimeCard>").unwrap();
    let end = WEEK_ACROSS_MONTHS.find("</TimeCard>").unwrap() + "</TimeCard>".len();
    let xml = format!("{}{}", &WEEK_ACROSS_MONTHS[..start], &WEEK_ACROSS_MONTHS[end..]);

    let analysis = analyze(xml.as_str()).unwrap();
    assert_eq!(analysis.raf_hours, Decimal::ZERO);
    assert!(analysis.has_issue);

    let corrected = fix(&analysis);
    assert!(corrected.contains("<TotalCharges>0.00</TotalCharges>"));
    assert!(corrected.contains("<TotalTax>0.00</TotalTax>"));
    assert!(corrected.contains("<TotalAmount>0.00</TotalAmount>"));
    assert!(corrected.contains(r#"<ItemQuantity uom="HUR">0.00</ItemQuantity>"#));
    // no authoritative period: dates are left alone
    assert!(corrected.contains(r#"<AdditionalData owner="DEB_PER">2024-08-26</AdditionalData>"#));
}

#[test]
fn test_malformed_xml_is_a_parse_error() {
    let result = analyze("<Invoice><Line></Invoice>");
    assert!(matches!(result, Err(FixerError::Parse(_))));
}

#[test]
fn test_declared_encoding_has_priority() {
    let xml = WEEK_ACROSS_MONTHS.replacen(r#"encoding="UTF-8""#, r#"encoding="ISO-8859-1""#, 1);
    let analysis = analyze(xml.into_bytes()).unwrap();

    assert_eq!(analysis.encoding, "latin-1");
    assert_eq!(analysis.invoice_id, "FA-2024-0815");
    assert!(analysis.has_issue);
}

#[test]
fn test_latin1_bytes_are_decoded() {
    let mut bytes = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n<Invoice><DocumentIds><Id>FA-".to_vec();
    bytes.push(0xC9); // 'É'
    bytes.extend_from_slice(b"</Id></DocumentIds></Invoice>");

    let analysis = analyze(bytes).unwrap();
    assert_eq!(analysis.invoice_id, "FA-É");
}

#[test]
fn test_resolver_strategy_is_exposed() {
    let decoded = pixid_fixer::decode_best_effort(CONSISTENT.as_bytes());
    assert_eq!(decoded.strategy, Strategy::Declared);
    assert_eq!(decoded.encoding, "utf-8");
    assert_eq!(decoded.text, CONSISTENT);
}

#[test]
fn test_overflowing_durations_do_not_abort_analysis() {
    let xml = r#"<Invoice>
  <TimeCard>
    <TimeInterval type="heures"><Duration>79228162514264337593543950335</Duration></TimeInterval>
    <TimeInterval type="heures"><Duration>79228162514264337593543950335</Duration></TimeInterval>
  </TimeCard>
  <Line><Description>Heures</Description><ItemQuantity uom="HUR">8</ItemQuantity><Charge><Total>100</Total></Charge></Line>
</Invoice>"#;
    let analysis = analyze(xml).unwrap();
    assert_eq!(analysis.raf_hours, Decimal::MAX);
    assert!(analysis.has_issue);
}

#[test]
fn test_unrepresentable_correction_returns_original() {
    let xml = r#"<Invoice>
  <TimeCard><TimeInterval type="heures"><Duration>1e20</Duration></TimeInterval></TimeCard>
  <TotalCharges>100</TotalCharges>
  <Line><Description>Heures</Description><ItemQuantity uom="HUR">0.000000001</ItemQuantity><Charge><Total>100</Total></Charge></Line>
</Invoice>"#;
    let analysis = analyze(xml).unwrap();
    assert!(analysis.has_issue);
    assert_eq!(fix(&analysis), xml);
}
