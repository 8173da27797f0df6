//! Judges one CRL for one certificate

use const_oid::db::rfc5912::{
    ID_CE_AUTHORITY_KEY_IDENTIFIER, ID_CE_CRL_NUMBER, ID_CE_DELTA_CRL_INDICATOR,
    ID_CE_FRESHEST_CRL, ID_CE_ISSUING_DISTRIBUTION_POINT, ID_PE_AUTHORITY_INFO_ACCESS,
};
use der::Decode;
use log::debug;
use x509_cert::crl::CertificateList;
use x509_cert::ext::pkix::IssuingDistributionPoint;
use x509_cert::Certificate;

use crate::builder::issuing_cert_retriever::IssuingCertificateRetriever;
use crate::environment::validation_environment::ValidationEnvironment;
use crate::revocation::ocsp_validator::merge_demoting_invalid;
use crate::util::cert_utilities::{compare_names, name_to_string};
use crate::util::error::{Error, Result};
use crate::util::time_of_interest::TimeOfInterest;
use crate::validator::chain_validator::CertificateChainValidator;
use crate::validator::context::{CertificateSource, ValidationContext, ValidatorContext};
use crate::validator::report::*;

/// `parse_crl` decodes a DER or PEM encoded CRL
pub fn parse_crl(bytes: &[u8]) -> Result<CertificateList> {
    if bytes.starts_with(b"-----BEGIN") {
        let (label, der) = match pem_rfc7468::decode_vec(bytes) {
            Ok(decoded) => decoded,
            Err(e) => {
                debug!("Failed to decode PEM encoded CRL: {}", e);
                return Err(Error::ParseError);
            }
        };
        if label != "X509 CRL" {
            debug!("Unexpected PEM label for CRL: {}", label);
            return Err(Error::ParseError);
        }
        return Ok(CertificateList::from_der(&der)?);
    }
    Ok(CertificateList::from_der(bytes)?)
}

/// supported_crl_extensions returns false if the CRL carries a critical extension that is not
/// understood
fn supported_crl_extensions(crl: &CertificateList) -> bool {
    let understood = [
        ID_CE_ISSUING_DISTRIBUTION_POINT,
        ID_CE_DELTA_CRL_INDICATOR,
        ID_CE_FRESHEST_CRL,
        ID_CE_CRL_NUMBER,
        ID_CE_AUTHORITY_KEY_IDENTIFIER,
        ID_PE_AUTHORITY_INFO_ACCESS,
    ];
    !crl.tbs_cert_list
        .crl_extensions
        .iter()
        .flatten()
        .any(|e| e.critical && !understood.contains(&e.extn_id))
}

fn is_delta_crl(crl: &CertificateList) -> bool {
    crl.tbs_cert_list
        .crl_extensions
        .iter()
        .flatten()
        .any(|e| e.extn_id == ID_CE_DELTA_CRL_INDICATOR)
}

fn covers_only_some_reasons(crl: &CertificateList) -> bool {
    crl.tbs_cert_list
        .crl_extensions
        .iter()
        .flatten()
        .filter(|e| e.extn_id == ID_CE_ISSUING_DISTRIBUTION_POINT)
        .filter_map(|e| IssuingDistributionPoint::from_der(e.extn_value.as_bytes()).ok())
        .any(|idp| idp.only_some_reasons.is_some())
}

/// Validates CRL evidence. The check is stateless, all inputs come from the environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct CrlValidator;

impl CrlValidator {
    /// `validate` judges `crl` as evidence of the revocation status of `certificate` at
    /// `reference_time`.
    pub fn validate(
        &self,
        env: &ValidationEnvironment,
        report: &mut ValidationReport,
        context: ValidationContext,
        certificate: &Certificate,
        crl: &CertificateList,
        reference_time: TimeOfInterest,
    ) {
        let context = context.with_validator(ValidatorContext::CrlValidator);
        let item = |message: String, status: ReportItemStatus| {
            ReportItem::for_certificate(certificate, CRL_CHECK, message, status)
        };
        let tbs = &crl.tbs_cert_list;

        if !compare_names(&tbs.issuer, &certificate.tbs_certificate.issuer) {
            report.add_report_item(item(
                format!(
                    "CRL issuer {} does not match the certificate issuer {}.",
                    name_to_string(&tbs.issuer),
                    name_to_string(&certificate.tbs_certificate.issuer)
                ),
                ReportItemStatus::Indeterminate,
            ));
            return;
        }

        if is_delta_crl(crl) {
            report.add_report_item(item(
                "Delta CRLs are not supported.".to_string(),
                ReportItemStatus::Indeterminate,
            ));
            return;
        }

        if !supported_crl_extensions(crl) {
            report.add_report_item(item(
                "CRL contains an unsupported critical extension.".to_string(),
                ReportItemStatus::Invalid,
            ));
            return;
        }

        let partial = covers_only_some_reasons(crl);
        if partial {
            report.add_report_item(item(
                "CRL only covers some revocation reasons, only some reasons checked.".to_string(),
                ReportItemStatus::Info,
            ));
        }

        let this_update = tbs.this_update.to_unix_duration().as_secs();
        let freshness = env.properties().get_freshness(&context);
        if reference_time.is_beyond_window(this_update, freshness) {
            report.add_report_item(item(
                format!(
                    "CRL is not fresh enough: this update {} is older than {} seconds before {}.",
                    tbs.this_update.to_date_time(),
                    freshness.as_secs(),
                    reference_time
                ),
                ReportItemStatus::Indeterminate,
            ));
            return;
        }

        if let Some(next_update) = &tbs.next_update {
            if reference_time > *next_update {
                report.add_report_item(item(
                    format!(
                        "CRL is no longer valid, next update {} precedes {}.",
                        next_update.to_date_time(),
                        reference_time
                    ),
                    ReportItemStatus::Indeterminate,
                ));
                return;
            }
        }

        if !self.verify_crl_signer(env, report, context, certificate, crl, reference_time) {
            return;
        }

        let serial = &certificate.tbs_certificate.serial_number;
        let entry = tbs
            .revoked_certificates
            .iter()
            .flatten()
            .find(|rc| rc.serial_number == *serial);
        match entry {
            Some(rc) if reference_time >= rc.revocation_date => {
                report.add_report_item(item(
                    format!(
                        "Certificate was revoked on {}.",
                        rc.revocation_date.to_date_time()
                    ),
                    ReportItemStatus::Invalid,
                ));
            }
            Some(rc) => {
                report.add_report_item(item(
                    format!(
                        "Certificate was revoked on {}, after the validation time {}.",
                        rc.revocation_date.to_date_time(),
                        reference_time
                    ),
                    ReportItemStatus::Info,
                ));
            }
            None if partial => {
                report.add_report_item(item(
                    "Certificate is not listed on a CRL that covers only some reasons, status cannot be determined.".to_string(),
                    ReportItemStatus::Indeterminate,
                ));
            }
            None => {
                report.add_report_item(item(
                    "Certificate is not revoked.".to_string(),
                    ReportItemStatus::Info,
                ));
            }
        }
    }

    /// Returns true when the CRL is signed by an acceptable issuer. Findings are added to `report`
    /// otherwise.
    fn verify_crl_signer(
        &self,
        env: &ValidationEnvironment,
        report: &mut ValidationReport,
        context: ValidationContext,
        certificate: &Certificate,
        crl: &CertificateList,
        reference_time: TimeOfInterest,
    ) -> bool {
        let chain = IssuingCertificateRetriever::new(env).crl_issuer_chain(crl);
        if chain.contains(certificate) {
            report.add_report_item(ReportItem::for_certificate(
                certificate,
                CRL_CHECK,
                "CRL is signed by the certificate being validated or by a certificate in its issuer chain: certificate in issuer chain.",
                ReportItemStatus::Invalid,
            ));
            return false;
        }

        let signer = match chain.first() {
            Some(signer) => signer,
            None => {
                report.add_report_item(ReportItem::for_certificate(
                    certificate,
                    CRL_CHECK,
                    format!(
                        "CRL could not be verified: no certificate issued to {} verifies its signature.",
                        name_to_string(&crl.tbs_cert_list.issuer)
                    ),
                    ReportItemStatus::Invalid,
                ));
                return false;
            }
        };

        if env
            .store()
            .is_trusted_for(signer, CertificateSource::CrlIssuer)
        {
            return true;
        }

        let mut signer_report = ValidationReport::new();
        CertificateChainValidator::new(env).validate(
            &mut signer_report,
            context.with_certificate_source(CertificateSource::CrlIssuer),
            signer,
            reference_time,
            &[],
        );
        if signer_report.validation_result() == ValidationResult::Valid {
            report.merge(&signer_report);
            return true;
        }

        merge_demoting_invalid(report, &signer_report);
        report.add_report_item(ReportItem::for_certificate(
            certificate,
            CRL_CHECK,
            format!(
                "CRL issuer certificate {} could not be validated.",
                name_to_string(&signer.tbs_certificate.subject)
            ),
            ReportItemStatus::Indeterminate,
        ));
        false
    }
}
