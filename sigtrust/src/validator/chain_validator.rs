//! Walks a certification path from a certificate toward a trusted certificate, checking required
//! extensions, validity period and revocation status of each certificate along the way.

use log::debug;
use x509_cert::Certificate;

use crate::builder::issuing_cert_retriever::IssuingCertificateRetriever;
use crate::environment::validation_environment::ValidationEnvironment;
use crate::environment::validation_environment_traits::SignedObject;
use crate::util::cert_utilities::{name_to_string, oid_lookup, valid_at_time, ValidityPeriodError};
use crate::util::time_of_interest::TimeOfInterest;
use crate::validator::context::{CertificateSource, ValidationContext, ValidatorContext};
use crate::validator::extensions::CertificateExtension;
use crate::validator::report::*;

/// Validates certificates against the trust anchors, policy and revocation sources held by a
/// [`ValidationEnvironment`].
///
/// ```
/// use sigtrust::*;
/// use x509_cert::ext::pkix::KeyUsages;
/// use x509_cert::Certificate;
///
/// fn signer_is_valid(env: &ValidationEnvironment, signer_cert: &Certificate) -> bool {
///     let report = CertificateChainValidator::new(env).validate_certificate(
///         ValidationContext::signer_present(),
///         signer_cert,
///         TimeOfInterest::now(),
///         &[CertificateExtension::key_usage(KeyUsages::DigitalSignature)],
///     );
///     ValidationResult::Valid == report.validation_result()
/// }
/// ```
#[derive(Clone, Copy)]
pub struct CertificateChainValidator<'a> {
    env: &'a ValidationEnvironment,
}

impl<'a> CertificateChainValidator<'a> {
    /// Creates a validator over `env`
    pub fn new(env: &'a ValidationEnvironment) -> Self {
        CertificateChainValidator { env }
    }

    /// `validate_certificate` validates `certificate` and the chain above it at `reference_time`,
    /// returning a fresh report. `required_extensions` apply to `certificate` only, in addition to
    /// any extensions the policy requires for the context.
    pub fn validate_certificate(
        &self,
        context: ValidationContext,
        certificate: &Certificate,
        reference_time: TimeOfInterest,
        required_extensions: &[CertificateExtension],
    ) -> ValidationReport {
        let mut report = ValidationReport::new();
        self.validate(
            &mut report,
            context,
            certificate,
            reference_time,
            required_extensions,
        );
        report
    }

    /// `validate` is [`CertificateChainValidator::validate_certificate`] with an accumulator
    /// supplied by the caller, as used when validating the signers of revocation evidence.
    pub fn validate(
        &self,
        report: &mut ValidationReport,
        context: ValidationContext,
        certificate: &Certificate,
        reference_time: TimeOfInterest,
        required_extensions: &[CertificateExtension],
    ) {
        let context = context.with_validator(ValidatorContext::CertificateChainValidator);
        self.validate_at(
            report,
            context,
            certificate,
            reference_time,
            required_extensions,
            &[],
        );
    }

    fn stop_validation(&self, report: &ValidationReport, context: &ValidationContext) -> bool {
        !self
            .env
            .properties()
            .get_continue_after_failure(context)
            && report.validation_result() == ValidationResult::Invalid
    }

    fn validate_at(
        &self,
        report: &mut ValidationReport,
        context: ValidationContext,
        certificate: &Certificate,
        reference_time: TimeOfInterest,
        required_extensions: &[CertificateExtension],
        path: &[Certificate],
    ) {
        self.check_required_extensions(report, &context, certificate, required_extensions);
        if self.stop_validation(report, &context) {
            return;
        }

        if self
            .env
            .store()
            .is_trusted_for(certificate, context.certificate_source())
        {
            report.add_report_item(ReportItem::for_certificate(
                certificate,
                CERTIFICATE_CHECK,
                format!(
                    "Certificate {} is trusted, revocation checks not required.",
                    name_to_string(&certificate.tbs_certificate.subject)
                ),
                ReportItemStatus::Info,
            ));
            return;
        }

        self.check_validity_period(report, certificate, &reference_time);
        if self.stop_validation(report, &context) {
            return;
        }

        self.env
            .check_revocation(report, context, certificate, reference_time);
        if self.stop_validation(report, &context) {
            return;
        }

        self.validate_issuer(report, context, certificate, reference_time, path);
    }

    fn check_required_extensions(
        &self,
        report: &mut ValidationReport,
        context: &ValidationContext,
        certificate: &Certificate,
        required_extensions: &[CertificateExtension],
    ) {
        for ext in required_extensions {
            if !ext.matches(certificate) {
                report.add_report_item(ReportItem::for_certificate(
                    certificate,
                    EXTENSIONS_CHECK,
                    format!(
                        "Required certificate extension {} is missing or incorrect: {}.",
                        oid_lookup(&ext.oid()),
                        ext.describe_mismatch(certificate)
                    ),
                    ReportItemStatus::Invalid,
                ));
            }
        }

        for ext in self.env.properties().get_required_extensions(context) {
            if !ext.matches(certificate) {
                report.add_report_item(ReportItem::for_certificate(
                    certificate,
                    EXTENSIONS_CHECK,
                    format!(
                        "Globally required certificate extension {} is missing or incorrect: {}.",
                        oid_lookup(&ext.oid()),
                        ext.describe_mismatch(certificate)
                    ),
                    ReportItemStatus::Invalid,
                ));
            }
        }
    }

    fn check_validity_period(
        &self,
        report: &mut ValidationReport,
        certificate: &Certificate,
        reference_time: &TimeOfInterest,
    ) {
        let subject = name_to_string(&certificate.tbs_certificate.subject);
        let message = match valid_at_time(certificate, reference_time) {
            Ok(_) => return,
            Err(ValidityPeriodError::NotYetValid) => format!(
                "Certificate {} is not yet valid at {}, validity starts {}.",
                subject,
                reference_time,
                certificate.tbs_certificate.validity.not_before.to_date_time()
            ),
            Err(ValidityPeriodError::Expired) => format!(
                "Certificate {} has expired at {}, validity ended {}.",
                subject,
                reference_time,
                certificate.tbs_certificate.validity.not_after.to_date_time()
            ),
        };
        report.add_report_item(ReportItem::for_certificate(
            certificate,
            CERTIFICATE_CHECK,
            message,
            ReportItemStatus::Invalid,
        ));
    }

    fn validate_issuer(
        &self,
        report: &mut ValidationReport,
        context: ValidationContext,
        certificate: &Certificate,
        reference_time: TimeOfInterest,
        path: &[Certificate],
    ) {
        let subject = name_to_string(&certificate.tbs_certificate.subject);
        let candidates = IssuingCertificateRetriever::new(self.env).issuer_candidates(certificate);
        if candidates.is_empty() {
            report.add_report_item(ReportItem::for_certificate(
                certificate,
                CERTIFICATE_CHECK,
                format!("Issuer certificate of {} is not available.", subject),
                ReportItemStatus::Indeterminate,
            ));
            return;
        }

        let mut path = path.to_vec();
        path.push(certificate.clone());
        let issuer_context = context.with_certificate_source(CertificateSource::CertIssuer);

        let mut candidate_reports = vec![];
        for issuer in candidates {
            let mut candidate_report = ValidationReport::new();
            if !self
                .env
                .is_signature_valid(SignedObject::Certificate(certificate), &issuer)
            {
                candidate_report.add_report_item(ReportItem::for_certificate(
                    certificate,
                    CERTIFICATE_CHECK,
                    format!(
                        "Certificate {} cannot be verified using the public key of issuer {}.",
                        subject,
                        name_to_string(&issuer.tbs_certificate.subject)
                    ),
                    ReportItemStatus::Invalid,
                ));
                candidate_reports.push(candidate_report);
                continue;
            }

            if path.contains(&issuer) {
                debug!("Issuer loop detected while validating {}", subject);
                candidate_report.add_report_item(ReportItem::for_certificate(
                    &issuer,
                    CERTIFICATE_CHECK,
                    format!(
                        "Certificate {} appears more than once in the chain and is not trusted.",
                        name_to_string(&issuer.tbs_certificate.subject)
                    ),
                    ReportItemStatus::Indeterminate,
                ));
                candidate_reports.push(candidate_report);
                continue;
            }

            self.validate_at(
                &mut candidate_report,
                issuer_context,
                &issuer,
                reference_time,
                &[],
                &path,
            );
            if candidate_report.validation_result() == ValidationResult::Valid {
                report.merge(&candidate_report);
                return;
            }
            candidate_reports.push(candidate_report);
        }

        for r in &candidate_reports {
            report.merge(r);
        }
    }
}
