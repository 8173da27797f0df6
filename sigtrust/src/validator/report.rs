//! Validation report model: ordered, certificate-attributed findings and the derived overall result

use core::fmt;

use serde::{Deserialize, Serialize};
use x509_cert::Certificate;

use crate::util::cert_utilities::{name_to_string, serial_to_hex};

/// Check name used for validity period, trust and issuer findings
pub const CERTIFICATE_CHECK: &str = "Certificate check.";
/// Check name used for required extension findings
pub const EXTENSIONS_CHECK: &str = "Required certificate extensions check.";
/// Check name used by the revocation data validator
pub const REVOCATION_DATA_CHECK: &str = "Revocation data check.";
/// Check name used by the OCSP validator
pub const OCSP_CHECK: &str = "OCSP response check.";
/// Check name used by the CRL validator
pub const CRL_CHECK: &str = "CRL response check.";

/// Severity of an individual report item
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum ReportItemStatus {
    /// Informational, does not affect the overall result
    Info,
    /// The check could not reach a conclusive result
    Indeterminate,
    /// The check established a failure
    Invalid,
}

impl fmt::Display for ReportItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportItemStatus::Info => write!(f, "INFO"),
            ReportItemStatus::Indeterminate => write!(f, "INDETERMINATE"),
            ReportItemStatus::Invalid => write!(f, "INVALID"),
        }
    }
}

/// Overall result of a validation report
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum ValidationResult {
    /// No item is INDETERMINATE or INVALID
    Valid,
    /// At least one item is INDETERMINATE and none is INVALID
    Indeterminate,
    /// At least one item is INVALID
    Invalid,
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationResult::Valid => write!(f, "VALID"),
            ValidationResult::Indeterminate => write!(f, "INDETERMINATE"),
            ValidationResult::Invalid => write!(f, "INVALID"),
        }
    }
}

/// A single finding. Items that concern a specific certificate carry its subject and serial number.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ReportItem {
    /// Subject name of the certificate the finding concerns, if any
    pub certificate_subject: Option<String>,
    /// Hex serial number of the certificate the finding concerns, if any
    pub certificate_serial: Option<String>,
    /// Name of the check that produced the finding
    pub check_name: String,
    /// Human readable description of the finding
    pub message: String,
    /// Severity of the finding
    pub status: ReportItemStatus,
    /// Underlying cause, i.e., a collaborator error rendered as text
    pub cause: Option<String>,
}

impl ReportItem {
    /// Creates an item that is not attributed to a certificate
    pub fn new(check_name: &str, message: impl Into<String>, status: ReportItemStatus) -> Self {
        ReportItem {
            certificate_subject: None,
            certificate_serial: None,
            check_name: check_name.to_string(),
            message: message.into(),
            status,
            cause: None,
        }
    }

    /// Creates an item attributed to the given certificate
    pub fn for_certificate(
        certificate: &Certificate,
        check_name: &str,
        message: impl Into<String>,
        status: ReportItemStatus,
    ) -> Self {
        ReportItem {
            certificate_subject: Some(name_to_string(&certificate.tbs_certificate.subject)),
            certificate_serial: Some(serial_to_hex(&certificate.tbs_certificate.serial_number)),
            ..ReportItem::new(check_name, message, status)
        }
    }

    /// Attaches a cause to the item
    pub fn with_cause(mut self, cause: impl fmt::Display) -> Self {
        self.cause = Some(cause.to_string());
        self
    }

    /// Returns a copy of the item with a different status
    pub fn with_status(&self, status: ReportItemStatus) -> Self {
        ReportItem {
            status,
            ..self.clone()
        }
    }

    /// Returns true if the item is attributed to the given certificate
    pub fn is_for(&self, certificate: &Certificate) -> bool {
        self.certificate_subject.as_deref()
            == Some(name_to_string(&certificate.tbs_certificate.subject).as_str())
            && self.certificate_serial.as_deref()
                == Some(serial_to_hex(&certificate.tbs_certificate.serial_number).as_str())
    }
}

impl fmt::Display for ReportItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} {}", self.status, self.check_name, self.message)?;
        if let Some(subject) = &self.certificate_subject {
            write!(f, " (certificate: {})", subject)?;
        }
        if let Some(cause) = &self.cause {
            write!(f, " cause: {}", cause)?;
        }
        Ok(())
    }
}

/// Ordered, append-only list of report items. The overall result is derived from the items.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    items: Vec<ReportItem>,
}

impl ValidationReport {
    /// Creates an empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an item
    pub fn add_report_item(&mut self, item: ReportItem) {
        self.items.push(item);
    }

    /// All items in the order they were added
    pub fn items(&self) -> &[ReportItem] {
        &self.items
    }

    /// Items with INDETERMINATE or INVALID status
    pub fn failures(&self) -> Vec<&ReportItem> {
        self.items
            .iter()
            .filter(|i| i.status != ReportItemStatus::Info)
            .collect()
    }

    /// Items with INFO status
    pub fn logs(&self) -> Vec<&ReportItem> {
        self.items
            .iter()
            .filter(|i| i.status == ReportItemStatus::Info)
            .collect()
    }

    /// The worst severity present: INVALID dominates INDETERMINATE dominates VALID.
    pub fn validation_result(&self) -> ValidationResult {
        match self.items.iter().map(|i| i.status).max() {
            Some(ReportItemStatus::Invalid) => ValidationResult::Invalid,
            Some(ReportItemStatus::Indeterminate) => ValidationResult::Indeterminate,
            _ => ValidationResult::Valid,
        }
    }

    /// Appends all items from another report at their original severities
    pub fn merge(&mut self, other: &ValidationReport) {
        self.items.extend(other.items.iter().cloned());
    }

    /// Appends all items from another report with their status replaced
    pub fn merge_with_different_status(
        &mut self,
        other: &ValidationReport,
        status: ReportItemStatus,
    ) {
        self.items
            .extend(other.items.iter().map(|i| i.with_status(status)));
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Validation result: {}", self.validation_result())?;
        for item in &self.items {
            writeln!(f, "  {}", item)?;
        }
        Ok(())
    }
}

#[test]
fn worst_status_wins() {
    let mut report = ValidationReport::new();
    assert_eq!(ValidationResult::Valid, report.validation_result());

    report.add_report_item(ReportItem::new(CERTIFICATE_CHECK, "a", ReportItemStatus::Info));
    assert_eq!(ValidationResult::Valid, report.validation_result());

    report.add_report_item(ReportItem::new(
        REVOCATION_DATA_CHECK,
        "b",
        ReportItemStatus::Indeterminate,
    ));
    assert_eq!(ValidationResult::Indeterminate, report.validation_result());

    report.add_report_item(ReportItem::new(CRL_CHECK, "c", ReportItemStatus::Invalid));
    report.add_report_item(ReportItem::new(OCSP_CHECK, "d", ReportItemStatus::Indeterminate));
    assert_eq!(ValidationResult::Invalid, report.validation_result());
    assert_eq!(3, report.failures().len());
    assert_eq!(1, report.logs().len());
}

#[test]
fn merge_preserves_order_and_demotes() {
    let mut scratch = ValidationReport::new();
    scratch.add_report_item(ReportItem::new(OCSP_CHECK, "first", ReportItemStatus::Indeterminate));
    scratch.add_report_item(
        ReportItem::new(OCSP_CHECK, "second", ReportItemStatus::Invalid).with_cause("bad"),
    );

    let mut report = ValidationReport::new();
    report.merge_with_different_status(&scratch, ReportItemStatus::Info);
    report.merge(&scratch);
    let messages: Vec<&str> = report.items().iter().map(|i| i.message.as_str()).collect();
    assert_eq!(vec!["first", "second", "first", "second"], messages);
    assert_eq!(ReportItemStatus::Info, report.items()[1].status);
    assert_eq!(Some("bad".to_string()), report.items()[1].cause);
    assert_eq!(ValidationResult::Invalid, report.validation_result());
}
