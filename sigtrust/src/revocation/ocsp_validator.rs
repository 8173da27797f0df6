//! Judges one OCSP SingleResponse for one certificate

use const_oid::db::rfc5912::{ID_SHA_1, ID_SHA_256};
use const_oid::db::rfc6960::{ID_PKIX_OCSP_BASIC, ID_PKIX_OCSP_NONCE};
use der::{Decode, Encode};
use log::debug;
use sha1::{Digest, Sha1};
use sha2::Sha256;
use x509_cert::Certificate;
use x509_ocsp::{
    BasicOcspResponse, CertId, CertStatus, OcspResponse, OcspResponseStatus, ResponderId,
    SingleResponse,
};

use crate::builder::issuing_cert_retriever::IssuingCertificateRetriever;
use crate::environment::validation_environment::ValidationEnvironment;
use crate::environment::validation_environment_traits::SignedObject;
use crate::util::cert_utilities::{compare_names, name_to_string};
use crate::util::error::{Error, Result};
use crate::util::time_of_interest::TimeOfInterest;
use crate::validator::chain_validator::CertificateChainValidator;
use crate::validator::context::{CertificateSource, ValidationContext, ValidatorContext};
use crate::validator::report::*;

/// `parse_ocsp_response` accepts either an OCSPResponse carrying a basic response or a bare
/// BasicOCSPResponse and returns the basic response.
pub fn parse_ocsp_response(bytes: &[u8]) -> Result<BasicOcspResponse> {
    if let Ok(resp) = OcspResponse::from_der(bytes) {
        if resp.response_status != OcspResponseStatus::Successful {
            debug!(
                "OCSP response status is {:?}, not successful",
                resp.response_status
            );
            return Err(Error::ParseError);
        }
        let rb = match resp.response_bytes {
            Some(rb) => rb,
            None => return Err(Error::ParseError),
        };
        if rb.response_type != ID_PKIX_OCSP_BASIC {
            debug!("Unsupported OCSP response type: {}", rb.response_type);
            return Err(Error::Unsupported);
        }
        return Ok(BasicOcspResponse::from_der(rb.response.as_bytes())?);
    }
    Ok(BasicOcspResponse::from_der(bytes)?)
}

/// Hashes the issuer name of `cert` and the public key of `issuer` with the algorithm named in the
/// CertId, returning None for unsupported algorithms.
fn cert_id_hashes(
    cert_id: &CertId,
    cert: &Certificate,
    issuer: &Certificate,
) -> Option<(Vec<u8>, Vec<u8>)> {
    let enc_name = cert.tbs_certificate.issuer.to_der().ok()?;
    let key = issuer
        .tbs_certificate
        .subject_public_key_info
        .subject_public_key
        .raw_bytes();
    let oid = cert_id.hash_algorithm.oid;
    if oid == ID_SHA_1 {
        Some((Sha1::digest(&enc_name).to_vec(), Sha1::digest(key).to_vec()))
    } else if oid == ID_SHA_256 {
        Some((
            Sha256::digest(&enc_name).to_vec(),
            Sha256::digest(key).to_vec(),
        ))
    } else {
        debug!("Unsupported CertId hash algorithm: {}", oid);
        None
    }
}

/// `cert_id_matches` returns true if the serial number and issuer hashes of `cert_id` identify
/// `cert` as issued by `issuer`.
pub fn cert_id_matches(cert_id: &CertId, cert: &Certificate, issuer: &Certificate) -> bool {
    if cert_id.serial_number != cert.tbs_certificate.serial_number {
        return false;
    }
    match cert_id_hashes(cert_id, cert, issuer) {
        Some((name_hash, key_hash)) => {
            cert_id.issuer_name_hash.as_bytes() == name_hash.as_slice()
                && cert_id.issuer_key_hash.as_bytes() == key_hash.as_slice()
        }
        None => false,
    }
}

/// unsupported_critical_extensions_present returns true if a critical extension other than nonce
/// appears in the response data or the single response
fn unsupported_critical_extensions_present(
    bor: &BasicOcspResponse,
    single: &SingleResponse,
) -> bool {
    let in_response = bor
        .tbs_response_data
        .response_extensions
        .iter()
        .flatten()
        .any(|e| e.critical && e.extn_id != ID_PKIX_OCSP_NONCE);
    let in_single = single
        .single_extensions
        .iter()
        .flatten()
        .any(|e| e.critical);
    in_response || in_single
}

/// Validates OCSP evidence. The check is stateless, all inputs come from the environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct OcspValidator;

impl OcspValidator {
    /// `validate` judges `single`, taken from `response`, as evidence of the revocation status of
    /// `certificate` issued by `issuer` at `reference_time`.
    #[allow(clippy::too_many_arguments)]
    pub fn validate(
        &self,
        env: &ValidationEnvironment,
        report: &mut ValidationReport,
        context: ValidationContext,
        certificate: &Certificate,
        issuer: &Certificate,
        single: &SingleResponse,
        response: &BasicOcspResponse,
        reference_time: TimeOfInterest,
    ) {
        let context = context.with_validator(ValidatorContext::OcspValidator);
        let item = |message: String, status: ReportItemStatus| {
            ReportItem::for_certificate(certificate, OCSP_CHECK, message, status)
        };

        if !cert_id_matches(&single.cert_id, certificate, issuer) {
            report.add_report_item(item(
                "OCSP response does not apply to the certificate being validated.".to_string(),
                ReportItemStatus::Indeterminate,
            ));
            return;
        }

        if unsupported_critical_extensions_present(response, single) {
            report.add_report_item(item(
                "OCSP response contains an unsupported critical extension.".to_string(),
                ReportItemStatus::Indeterminate,
            ));
            return;
        }

        let this_update = single.this_update.0.to_unix_duration().as_secs();
        let freshness = env.properties().get_freshness(&context);
        if reference_time.is_beyond_window(this_update, freshness) {
            report.add_report_item(item(
                format!(
                    "OCSP response is not fresh enough: this update {} is older than {} seconds before {}.",
                    single.this_update.0.to_date_time(),
                    freshness.as_secs(),
                    reference_time
                ),
                ReportItemStatus::Indeterminate,
            ));
            return;
        }

        if let Some(next_update) = &single.next_update {
            if reference_time > *next_update {
                report.add_report_item(item(
                    format!(
                        "OCSP response is no longer valid, next update {} precedes {}.",
                        next_update.0.to_date_time(),
                        reference_time
                    ),
                    ReportItemStatus::Indeterminate,
                ));
                return;
            }
        }

        match &single.cert_status {
            CertStatus::Good(_) => {
                if self.verify_responder(
                    env,
                    report,
                    context,
                    certificate,
                    issuer,
                    response,
                    reference_time,
                ) {
                    report.add_report_item(item(
                        "OCSP response indicates the certificate is good.".to_string(),
                        ReportItemStatus::Info,
                    ));
                }
            }
            CertStatus::Revoked(info) => {
                if !self.verify_responder(
                    env,
                    report,
                    context,
                    certificate,
                    issuer,
                    response,
                    reference_time,
                ) {
                    return;
                }
                if reference_time >= info.revocation_time {
                    report.add_report_item(item(
                        format!(
                            "Certificate was revoked on {}.",
                            info.revocation_time.0.to_date_time()
                        ),
                        ReportItemStatus::Invalid,
                    ));
                } else {
                    report.add_report_item(item(
                        format!(
                            "Certificate was revoked on {}, after the validation time {}.",
                            info.revocation_time.0.to_date_time(),
                            reference_time
                        ),
                        ReportItemStatus::Info,
                    ));
                }
            }
            CertStatus::Unknown(_) => {
                report.add_report_item(item(
                    "OCSP response indicates the certificate status is unknown.".to_string(),
                    ReportItemStatus::Indeterminate,
                ));
            }
        }
    }

    /// Candidate responder certificates: embedded certificates, then store certificates named by the
    /// responder id, then the issuer of the certificate under validation
    fn responder_candidates(
        &self,
        env: &ValidationEnvironment,
        issuer: &Certificate,
        response: &BasicOcspResponse,
    ) -> Vec<Certificate> {
        let mut candidates: Vec<Certificate> = response.certs.clone().unwrap_or_default();
        if let ResponderId::ByName(name) = &response.tbs_response_data.responder_id {
            for c in env.store().get_certificates_by_name(name) {
                if !candidates.contains(c) {
                    candidates.push(c.clone());
                }
            }
        }
        if !candidates.contains(issuer) {
            candidates.push(issuer.clone());
        }
        candidates
    }

    /// Returns true when the response is signed by an acceptable responder. Findings are added to
    /// `report` otherwise.
    #[allow(clippy::too_many_arguments)]
    fn verify_responder(
        &self,
        env: &ValidationEnvironment,
        report: &mut ValidationReport,
        context: ValidationContext,
        certificate: &Certificate,
        issuer: &Certificate,
        response: &BasicOcspResponse,
        reference_time: TimeOfInterest,
    ) -> bool {
        let signer = self
            .responder_candidates(env, issuer, response)
            .into_iter()
            .find(|c| env.is_signature_valid(SignedObject::OcspResponse(response), c));
        let signer = match signer {
            Some(signer) => signer,
            None => {
                report.add_report_item(ReportItem::for_certificate(
                    certificate,
                    OCSP_CHECK,
                    "OCSP response could not be verified: no candidate responder certificate verifies its signature.",
                    ReportItemStatus::Invalid,
                ));
                return false;
            }
        };

        // a response vouched for by the certificate itself or one of its issuers would send
        // validation of the responder back to this certificate
        let signer_chain = IssuingCertificateRetriever::new(env)
            .complete_chain(&[signer.clone()])
            .unwrap_or_default();
        if signer_chain.contains(certificate) {
            report.add_report_item(ReportItem::for_certificate(
                certificate,
                OCSP_CHECK,
                "OCSP response is signed by the certificate being validated or by a certificate in its issuer chain: certificate in issuer chain.",
                ReportItemStatus::Invalid,
            ));
            return false;
        }

        if env
            .store()
            .is_trusted_for(&signer, CertificateSource::OcspIssuer)
            || signer == *issuer
        {
            return true;
        }

        if !(compare_names(
            &signer.tbs_certificate.issuer,
            &issuer.tbs_certificate.subject,
        ) && env.is_signature_valid(SignedObject::Certificate(&signer), issuer))
        {
            report.add_report_item(ReportItem::for_certificate(
                certificate,
                OCSP_CHECK,
                format!(
                    "OCSP responder {} is not authorized by the issuer of the certificate.",
                    name_to_string(&signer.tbs_certificate.subject)
                ),
                ReportItemStatus::Invalid,
            ));
            return false;
        }

        let mut responder_report = ValidationReport::new();
        CertificateChainValidator::new(env).validate(
            &mut responder_report,
            context.with_certificate_source(CertificateSource::OcspIssuer),
            &signer,
            reference_time,
            &[],
        );
        if responder_report.validation_result() == ValidationResult::Valid {
            report.merge(&responder_report);
            return true;
        }

        merge_demoting_invalid(report, &responder_report);
        report.add_report_item(ReportItem::for_certificate(
            certificate,
            OCSP_CHECK,
            format!(
                "OCSP responder certificate {} could not be validated.",
                name_to_string(&signer.tbs_certificate.subject)
            ),
            ReportItemStatus::Indeterminate,
        ));
        false
    }
}

/// Appends the items of a signer's chain report with INVALID findings reduced to INDETERMINATE: a
/// failed signer chain makes the evidence unusable, not the certificate invalid.
pub(crate) fn merge_demoting_invalid(report: &mut ValidationReport, signer_report: &ValidationReport) {
    for i in signer_report.items() {
        if i.status == ReportItemStatus::Invalid {
            report.add_report_item(i.with_status(ReportItemStatus::Indeterminate));
        } else {
            report.add_report_item(i.clone());
        }
    }
}
