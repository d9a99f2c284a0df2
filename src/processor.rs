// src/processor.rs

use crate::config::Config;
use crate::correct::{self, Correction};
use crate::encoding::{ensure_utf8_declaration, is_utf8_label};
use crate::error::{FixerError, Result};
use crate::invoice::InvoiceAnalysis;
use crate::report::CorrectionReport;
use crate::verify::{Verification, verify_correction};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Result of running the fixer over one file.
#[derive(Debug)]
pub enum FixOutcome {
    /// Hours and totals agree; nothing was written.
    Consistent(InvoiceAnalysis),
    Corrected(CorrectedInvoice),
    /// Flagged, but a corrected figure does not fit a `Decimal`; nothing was written.
    Uncorrectable(InvoiceAnalysis),
}

#[derive(Debug)]
pub struct CorrectedInvoice {
    pub analysis: InvoiceAnalysis,
    pub correction: Correction,
    pub verification: Verification,
    pub xml_path: PathBuf,
    pub report_path: Option<PathBuf>,
}

/// Read and analyse one invoice file.
pub fn analyze_file(path: &Path) -> Result<InvoiceAnalysis> {
    let span = tracing::info_span!("invoice", file = %path.display());
    let _guard = span.enter();
    read_and_analyze(path)
}

/// Analyse one invoice file and, when it is inconsistent, write the corrected
/// XML (and the JSON report if enabled) into `cfg.output_dir`.
pub fn fix_file(path: &Path, cfg: &Config) -> Result<FixOutcome> {
    let span = tracing::info_span!("invoice", file = %path.display());
    let _guard = span.enter();

    let analysis = read_and_analyze(path)?;
    if !analysis.has_issue {
        info!("Invoice is consistent — nothing to correct");
        return Ok(FixOutcome::Consistent(analysis));
    }

    let corrected = Correction::from_analysis(&analysis).and_then(|correction| {
        let text = correct::apply(&analysis.source, &correction)?;
        Some((correction, text))
    });
    let Some((correction, corrected)) = corrected else {
        warn!(invoice_id = %analysis.invoice_id, "Corrected figures overflow, nothing written");
        return Ok(FixOutcome::Uncorrectable(analysis));
    };
    let verification = verify_correction(&analysis.source, &corrected);

    let output = if cfg.normalize_declaration && !is_utf8_label(&analysis.encoding) {
        info!(encoding = %analysis.encoding, "Rewriting XML declaration to UTF-8");
        ensure_utf8_declaration(&corrected)
    } else {
        corrected
    };

    let name = file_name(path);
    fs::create_dir_all(&cfg.output_dir).map_err(|e| FixerError::io(&cfg.output_dir, e))?;

    let xml_path = cfg.output_dir.join(corrected_file_name(&name));
    fs::write(&xml_path, &output).map_err(|e| FixerError::io(&xml_path, e))?;
    info!(path = %xml_path.display(), bytes = output.len(), "Corrected XML written");

    let report_path = if cfg.write_report {
        let report = CorrectionReport::now(&analysis, &correction, &output);
        let report_path = cfg.output_dir.join(report_file_name(&name));
        fs::write(&report_path, report.to_json()?)
            .map_err(|e| FixerError::io(&report_path, e))?;
        info!(path = %report_path.display(), "Report written");
        Some(report_path)
    } else {
        None
    };

    Ok(FixOutcome::Corrected(CorrectedInvoice {
        analysis,
        correction,
        verification,
        xml_path,
        report_path,
    }))
}

pub fn corrected_file_name(name: &str) -> String {
    format!("corrected_{name}")
}

pub fn report_file_name(name: &str) -> String {
    if name.contains(".xml") {
        format!("report_{}", name.replace(".xml", ".json"))
    } else {
        format!("report_{name}.json")
    }
}

fn read_and_analyze(path: &Path) -> Result<InvoiceAnalysis> {
    let bytes = fs::read(path).map_err(|e| FixerError::io(path, e))?;
    info!(bytes = bytes.len(), "Read invoice");
    crate::analyze(bytes)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "invoice.xml".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLAGGED: &str = r#"<?xml version="1.0" encoding="ISO-8859-1"?>
<Invoice>
  <TimeCard>
    <PeriodStartDate>2024-08-30</PeriodStartDate>
    <PeriodEndDate>2024-08-30</PeriodEndDate>
    <TimeInterval type="Heures normales"><Duration>8</Duration></TimeInterval>
  </TimeCard>
  <DocumentIds><Id>FA-77</Id></DocumentIds>
  <TotalCharges>854.76</TotalCharges>
  <TotalTax>170.95</TotalTax>
  <TotalAmount>1025.71</TotalAmount>
  <Line>
    <Description>Heures normales</Description>
    <ItemQuantity uom="HUR">38</ItemQuantity>
    <Charge><Total>854.76</Total></Charge>
  </Line>
</Invoice>"#;

    #[test]
    fn test_file_names() {
        assert_eq!(corrected_file_name("fa.xml"), "corrected_fa.xml");
        assert_eq!(report_file_name("fa.xml"), "report_fa.json");
        assert_eq!(report_file_name("fa"), "report_fa.json");
    }

    #[test]
    fn test_fix_file_writes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("fa.xml");
        fs::write(&input, FLAGGED).unwrap();
        let cfg = Config {
            output_dir: dir.path().join("out"),
            ..Config::default()
        };

        let FixOutcome::Corrected(result) = fix_file(&input, &cfg).unwrap() else {
            panic!("expected a correction");
        };

        let xml = fs::read_to_string(&result.xml_path).unwrap();
        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains("<TotalCharges>179.95</TotalCharges>"));
        assert!(xml.contains(r#"<ItemQuantity uom="HUR">8.00</ItemQuantity>"#));
        assert!(result.verification.passed(), "{:?}", result.verification);

        let report_path = result.report_path.unwrap();
        assert!(report_path.ends_with("report_fa.json"));
        let report: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(report_path).unwrap()).unwrap();
        assert_eq!(report["invoice_id"], "FA-77");
    }

    #[test]
    fn test_consistent_file_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("ok.xml");
        fs::write(&input, FLAGGED.replace(">38<", ">8<")).unwrap();
        let cfg = Config {
            output_dir: dir.path().join("out"),
            ..Config::default()
        };

        assert!(matches!(
            fix_file(&input, &cfg).unwrap(),
            FixOutcome::Consistent(_)
        ));
        assert!(!cfg.output_dir.exists());
    }

    #[test]
    fn test_overflowing_correction_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("huge.xml");
        let xml = FLAGGED
            .replace("<Duration>8</Duration>", "<Duration>100000000000000000000</Duration>")
            .replace(">38<", ">0.000000001<");
        fs::write(&input, xml).unwrap();
        let cfg = Config {
            output_dir: dir.path().join("out"),
            ..Config::default()
        };

        let FixOutcome::Uncorrectable(analysis) = fix_file(&input, &cfg).unwrap() else {
            panic!("expected the correction to be refused");
        };
        assert!(analysis.has_issue);
        assert!(!cfg.output_dir.exists());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            analyze_file(Path::new("no/such/invoice.xml")),
            Err(FixerError::Io { .. })
        ));
    }
}
