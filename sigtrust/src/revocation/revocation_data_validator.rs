//! Collects OCSP and CRL evidence for a certificate, orders it by recency and submits it to the
//! evidence validators until one produces a conclusive result.

use std::rc::Rc;

use log::{debug, info};
use x509_cert::crl::CertificateList;
use x509_cert::Certificate;
use x509_ocsp::BasicOcspResponse;

use crate::builder::issuing_cert_retriever::IssuingCertificateRetriever;
use crate::environment::validation_environment::ValidationEnvironment;
use crate::environment::validation_environment_traits::RevocationChecker;
use crate::revocation::crl_validator::{parse_crl, CrlValidator};
use crate::revocation::ocsp_validator::{parse_ocsp_response, OcspValidator};
use crate::util::cert_utilities::{
    has_ocsp_no_check, has_validity_assured_short_term, name_to_string,
};
use crate::util::time_of_interest::TimeOfInterest;
use crate::validator::context::{CertificateSource, ValidationContext, ValidatorContext};
use crate::validator::properties::{OnlineFetching, RevocationEvidencePreference};
use crate::validator::report::*;

/// One SingleResponse within a basic OCSP response
struct OcspEvidence {
    response: Rc<BasicOcspResponse>,
    index: usize,
}

impl OcspEvidence {
    fn this_update(&self) -> u64 {
        self.response.tbs_response_data.responses[self.index]
            .this_update
            .0
            .to_unix_duration()
            .as_secs()
    }
}

fn crl_this_update(crl: &CertificateList) -> u64 {
    crl.tbs_cert_list.this_update.to_unix_duration().as_secs()
}

/// Default [`RevocationChecker`]. Evidence comes from the OCSP and CRL clients configured in the
/// [`ValidationEnvironment`] and, as the online fetching policy allows, from its online clients.
#[derive(Clone, Copy, Debug, Default)]
pub struct RevocationDataValidator;

impl RevocationDataValidator {
    fn add_ocsp_bytes(
        &self,
        report: &mut ValidationReport,
        certificate: &Certificate,
        bytes: &[u8],
        evidence: &mut Vec<OcspEvidence>,
    ) {
        match parse_ocsp_response(bytes) {
            Ok(bor) => {
                let response = Rc::new(bor);
                for index in 0..response.tbs_response_data.responses.len() {
                    evidence.push(OcspEvidence {
                        response: response.clone(),
                        index,
                    });
                }
            }
            Err(e) => {
                report.add_report_item(
                    ReportItem::for_certificate(
                        certificate,
                        REVOCATION_DATA_CHECK,
                        "OCSP response could not be parsed and was skipped.",
                        ReportItemStatus::Info,
                    )
                    .with_cause(e),
                );
            }
        }
    }

    fn add_crl_bytes(
        &self,
        report: &mut ValidationReport,
        certificate: &Certificate,
        bytes: &[u8],
        evidence: &mut Vec<CertificateList>,
    ) {
        match parse_crl(bytes) {
            Ok(crl) => evidence.push(crl),
            Err(e) => {
                report.add_report_item(
                    ReportItem::for_certificate(
                        certificate,
                        REVOCATION_DATA_CHECK,
                        "CRL could not be parsed and was skipped.",
                        ReportItemStatus::Info,
                    )
                    .with_cause(e),
                );
            }
        }
    }

    /// Returns the reason revocation checking is unnecessary for the certificate, if any
    fn skip_reason(
        &self,
        env: &ValidationEnvironment,
        context: &ValidationContext,
        certificate: &Certificate,
    ) -> Option<&'static str> {
        if env.is_self_signed(certificate) {
            Some("Certificate is self-signed, revocation data check skipped.")
        } else if has_validity_assured_short_term(certificate) {
            Some("Certificate is a short-term certificate with assured validity, revocation data check skipped.")
        } else if context.certificate_source() == CertificateSource::OcspIssuer
            && has_ocsp_no_check(certificate)
        {
            Some("OCSP responder certificate carries id-pkix-ocsp-nocheck, revocation data check skipped.")
        } else {
            None
        }
    }
}

impl RevocationChecker for RevocationDataValidator {
    fn validate(
        &self,
        env: &ValidationEnvironment,
        report: &mut ValidationReport,
        context: ValidationContext,
        certificate: &Certificate,
        reference_time: TimeOfInterest,
    ) {
        let context = context.with_validator(ValidatorContext::RevocationDataValidator);
        if let Some(reason) = self.skip_reason(env, &context, certificate) {
            info!(
                "{} ({})",
                reason,
                name_to_string(&certificate.tbs_certificate.subject)
            );
            report.add_report_item(ReportItem::for_certificate(
                certificate,
                REVOCATION_DATA_CHECK,
                reason,
                ReportItemStatus::Info,
            ));
            return;
        }

        let properties = env.properties();
        let fetching = properties.get_online_fetching(&context);
        let issuer = IssuingCertificateRetriever::new(env).issuer_of(certificate);
        if issuer.is_none() {
            debug!(
                "No issuer available for {}, OCSP evidence cannot be matched",
                name_to_string(&certificate.tbs_certificate.subject)
            );
        }

        let mut ocsp: Vec<OcspEvidence> = vec![];
        let mut crls: Vec<CertificateList> = vec![];

        if let Some(issuer) = &issuer {
            for client in env.ocsp_clients() {
                if let Some(bytes) = client.get_encoded(certificate, issuer, None) {
                    self.add_ocsp_bytes(report, certificate, &bytes, &mut ocsp);
                }
            }
        }
        for client in env.crl_clients() {
            for bytes in client.get_encoded(certificate, None) {
                self.add_crl_bytes(report, certificate, &bytes, &mut crls);
            }
        }

        let fetch = |have_evidence: bool| match fetching {
            OnlineFetching::AlwaysFetch => true,
            OnlineFetching::FetchIfNoOtherDataAvailable => !have_evidence,
            OnlineFetching::NeverFetch => false,
        };

        if fetch(!ocsp.is_empty() || !crls.is_empty()) {
            if let (Some(client), Some(issuer)) = (env.online_ocsp_client(), &issuer) {
                if let Some(bytes) = client.get_encoded(certificate, issuer, None) {
                    self.add_ocsp_bytes(report, certificate, &bytes, &mut ocsp);
                }
            }
        }
        if fetch(!ocsp.is_empty() || !crls.is_empty()) {
            if let Some(client) = env.online_crl_client() {
                for bytes in client.get_encoded(certificate, None) {
                    self.add_crl_bytes(report, certificate, &bytes, &mut crls);
                }
            }
        }

        // most recent first, stable for equal times
        ocsp.sort_by_key(|e| std::cmp::Reverse(e.this_update()));
        crls.sort_by_key(|c| std::cmp::Reverse(crl_this_update(c)));

        let prefer_ocsp =
            properties.get_evidence_preference(&context) == RevocationEvidencePreference::PreferOcsp;
        let mut ocsp_iter = ocsp.iter().peekable();
        let mut crl_iter = crls.iter().peekable();
        loop {
            let take_ocsp = match (ocsp_iter.peek(), crl_iter.peek()) {
                (Some(o), Some(c)) => {
                    let (ot, ct) = (o.this_update(), crl_this_update(c));
                    if ot == ct {
                        prefer_ocsp
                    } else {
                        ot > ct
                    }
                }
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => break,
            };

            let mut scratch = ValidationReport::new();
            if take_ocsp {
                if let (Some(e), Some(issuer)) = (ocsp_iter.next(), &issuer) {
                    OcspValidator.validate(
                        env,
                        &mut scratch,
                        context,
                        certificate,
                        issuer,
                        &e.response.tbs_response_data.responses[e.index],
                        &e.response,
                        reference_time,
                    );
                }
            } else if let Some(crl) = crl_iter.next() {
                CrlValidator.validate(env, &mut scratch, context, certificate, crl, reference_time);
            }

            if scratch.validation_result() != ValidationResult::Indeterminate {
                report.merge(&scratch);
                return;
            }
            report.merge_with_different_status(&scratch, ReportItemStatus::Info);
        }

        report.add_report_item(ReportItem::for_certificate(
            certificate,
            REVOCATION_DATA_CHECK,
            "No revocation data available or status cannot be determined.",
            ReportItemStatus::Indeterminate,
        ));
    }
}
