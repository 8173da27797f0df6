//! In-memory OCSP and CRL clients over revocation data collected ahead of validation, i.e., from
//! the document security store of a signed PDF.

use der::Decode;
use log::debug;
use x509_cert::crl::CertificateList;
use x509_cert::Certificate;

use crate::environment::validation_environment_traits::{CrlClient, OcspClient};
use crate::revocation::ocsp_validator::parse_ocsp_response;
use crate::util::cert_utilities::compare_names;

/// Serves encoded OCSP responses. The first response holding a SingleResponse for the serial
/// number of the requested certificate is returned.
#[derive(Clone, Debug, Default)]
pub struct StaticOcspClient {
    responses: Vec<Vec<u8>>,
}

impl StaticOcspClient {
    /// Creates a client over encoded OCSPResponse or BasicOCSPResponse values
    pub fn new(responses: Vec<Vec<u8>>) -> Self {
        StaticOcspClient { responses }
    }

    /// Adds an encoded response
    pub fn add_response(&mut self, response: Vec<u8>) {
        self.responses.push(response);
    }
}

impl OcspClient for StaticOcspClient {
    fn get_encoded(
        &self,
        certificate: &Certificate,
        _issuer: &Certificate,
        _url: Option<&str>,
    ) -> Option<Vec<u8>> {
        let serial = &certificate.tbs_certificate.serial_number;
        self.responses
            .iter()
            .find(|enc| match parse_ocsp_response(enc) {
                Ok(bor) => bor
                    .tbs_response_data
                    .responses
                    .iter()
                    .any(|sr| sr.cert_id.serial_number == *serial),
                Err(e) => {
                    debug!("Skipping unparseable stored OCSP response: {}", e);
                    false
                }
            })
            .cloned()
    }
}

/// Serves encoded CRLs. CRLs whose issuer matches the issuer of the requested certificate are
/// returned, as are values that do not parse so that they surface in the validation report.
#[derive(Clone, Debug, Default)]
pub struct StaticCrlClient {
    crls: Vec<Vec<u8>>,
}

impl StaticCrlClient {
    /// Creates a client over DER encoded CRLs
    pub fn new(crls: Vec<Vec<u8>>) -> Self {
        StaticCrlClient { crls }
    }

    /// Adds an encoded CRL
    pub fn add_crl(&mut self, crl: Vec<u8>) {
        self.crls.push(crl);
    }
}

impl CrlClient for StaticCrlClient {
    fn get_encoded(&self, certificate: &Certificate, _url: Option<&str>) -> Vec<Vec<u8>> {
        self.crls
            .iter()
            .filter(|enc| match CertificateList::from_der(enc) {
                Ok(crl) => compare_names(
                    &crl.tbs_cert_list.issuer,
                    &certificate.tbs_certificate.issuer,
                ),
                Err(_) => true,
            })
            .cloned()
            .collect()
    }
}
