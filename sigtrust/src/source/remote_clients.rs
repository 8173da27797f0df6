//! HTTP implementations of the issuer fetching, OCSP and CRL retrieval interfaces using
//! `reqwest::blocking`. Only http and https URIs are followed.

use core::time::Duration;

use const_oid::db::rfc5912::ID_SHA_1;
use der::asn1::OctetString;
use der::Encode;
use log::{debug, error, info};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use sha1::{Digest, Sha1};
use spki::AlgorithmIdentifierOwned;
use x509_cert::Certificate;
use x509_ocsp::{CertId, OcspRequest, Request, TbsRequest, Version};

use crate::environment::validation_environment_traits::{
    CrlClient, IssuerCertificateFetcher, OcspClient,
};
use crate::util::cert_utilities::{collect_crl_dp_uris, collect_ocsp_uris};
use crate::util::error::{Error, Result};

/// Timeout applied to every request unless configured otherwise
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

fn build_client(timeout: Duration) -> Result<Client> {
    match Client::builder().timeout(timeout).build() {
        Ok(c) => Ok(c),
        Err(e) => {
            error!("Failed to prepare HTTP client: {}", e);
            Err(Error::NetworkError)
        }
    }
}

fn check_scheme(uri: &str) -> Result<()> {
    if uri.starts_with("http://") || uri.starts_with("https://") {
        Ok(())
    } else {
        debug!("Ignored non-HTTP URI: {}", uri);
        Err(Error::InvalidUriScheme)
    }
}

/// fetch_to_buffer retrieves the resource at `uri` with a GET request
fn fetch_to_buffer(uri: &str, timeout: Duration) -> Result<Vec<u8>> {
    check_scheme(uri)?;
    let client = build_client(timeout)?;
    info!("Downloading {}", uri);
    let response = match client.get(uri).send() {
        Ok(r) => r,
        Err(e) => {
            debug!("Failed to fetch {}: {}", uri, e);
            return Err(Error::NetworkError);
        }
    };
    if !response.status().is_success() {
        debug!("Fetching {} returned status {}", uri, response.status());
        return Err(Error::NetworkError);
    }
    match response.bytes() {
        Ok(b) => Ok(b.to_vec()),
        Err(e) => {
            debug!("Failed to read body from {}: {}", uri, e);
            Err(Error::NetworkError)
        }
    }
}

/// post_ocsp sends an encoded OCSP request to `uri`
fn post_ocsp(uri: &str, enc_ocsp_req: &[u8], timeout: Duration) -> Result<Vec<u8>> {
    check_scheme(uri)?;
    let client = build_client(timeout)?;
    let response = match client
        .post(uri)
        .body(enc_ocsp_req.to_vec())
        .header(CONTENT_TYPE, "application/ocsp-request")
        .send()
    {
        Ok(r) => r,
        Err(e) => {
            debug!("OCSP request send failed with {}: {}", e, uri);
            return Err(Error::NetworkError);
        }
    };
    match response.bytes() {
        Ok(b) => Ok(b.to_vec()),
        Err(e) => {
            error!("Failed to read OCSP response with {}: {}", e, uri);
            Err(Error::NetworkError)
        }
    }
}

/// `prepare_ocsp_request` returns an encoded OCSP request for `target` using a SHA-1 CertId
/// computed from the issuer name of `target` and the public key of `issuer`.
pub fn prepare_ocsp_request(target: &Certificate, issuer: &Certificate) -> Result<Vec<u8>> {
    let name_hash = Sha1::digest(target.tbs_certificate.issuer.to_der()?);
    let key_hash = Sha1::digest(
        issuer
            .tbs_certificate
            .subject_public_key_info
            .subject_public_key
            .raw_bytes(),
    );
    let req_cert = CertId {
        hash_algorithm: AlgorithmIdentifierOwned {
            oid: ID_SHA_1,
            parameters: None,
        },
        issuer_name_hash: OctetString::new(name_hash.to_vec())?,
        issuer_key_hash: OctetString::new(key_hash.to_vec())?,
        serial_number: target.tbs_certificate.serial_number.clone(),
    };
    let ocsp_req = OcspRequest {
        tbs_request: TbsRequest {
            version: Version::V1,
            requestor_name: None,
            request_list: vec![Request {
                req_cert,
                single_request_extensions: None,
            }],
            request_extensions: None,
        },
        optional_signature: None,
    };
    Ok(ocsp_req.to_der()?)
}

/// Retrieves the resources named by AIA id-ad-caIssuers URIs
#[derive(Clone, Debug)]
pub struct HttpIssuerFetcher {
    timeout: Duration,
}

impl Default for HttpIssuerFetcher {
    fn default() -> Self {
        HttpIssuerFetcher {
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl HttpIssuerFetcher {
    /// Creates a fetcher with the given request timeout
    pub fn new(timeout: Duration) -> Self {
        HttpIssuerFetcher { timeout }
    }
}

impl IssuerCertificateFetcher for HttpIssuerFetcher {
    fn fetch_issuer_certificates(&self, uri: &str) -> Result<Vec<u8>> {
        fetch_to_buffer(uri, self.timeout)
    }
}

/// Queries the OCSP responder named by `url` or, failing that, by the AIA id-ad-ocsp URIs of the
/// certificate. The first response received is returned.
#[derive(Clone, Debug)]
pub struct OnlineOcspClient {
    timeout: Duration,
}

impl Default for OnlineOcspClient {
    fn default() -> Self {
        OnlineOcspClient {
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl OnlineOcspClient {
    /// Creates a client with the given request timeout
    pub fn new(timeout: Duration) -> Self {
        OnlineOcspClient { timeout }
    }
}

impl OcspClient for OnlineOcspClient {
    fn get_encoded(
        &self,
        certificate: &Certificate,
        issuer: &Certificate,
        url: Option<&str>,
    ) -> Option<Vec<u8>> {
        let uris = match url {
            Some(u) => vec![u.to_string()],
            None => collect_ocsp_uris(certificate),
        };
        if uris.is_empty() {
            return None;
        }
        let request = match prepare_ocsp_request(certificate, issuer) {
            Ok(r) => r,
            Err(e) => {
                error!("Failed to prepare OCSP request: {}", e);
                return None;
            }
        };
        uris.iter()
            .find_map(|uri| post_ocsp(uri, &request, self.timeout).ok())
    }
}

/// Downloads CRLs from `url` or, failing that, from the CRL distribution point URIs of the
/// certificate
#[derive(Clone, Debug)]
pub struct OnlineCrlClient {
    timeout: Duration,
}

impl Default for OnlineCrlClient {
    fn default() -> Self {
        OnlineCrlClient {
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl OnlineCrlClient {
    /// Creates a client with the given request timeout
    pub fn new(timeout: Duration) -> Self {
        OnlineCrlClient { timeout }
    }
}

impl CrlClient for OnlineCrlClient {
    fn get_encoded(&self, certificate: &Certificate, url: Option<&str>) -> Vec<Vec<u8>> {
        let uris = match url {
            Some(u) => vec![u.to_string()],
            None => collect_crl_dp_uris(certificate),
        };
        uris.iter()
            .filter_map(|uri| fetch_to_buffer(uri, self.timeout).ok())
            .collect()
    }
}

#[test]
fn non_http_uris_are_ignored() {
    assert_eq!(
        Err(Error::InvalidUriScheme),
        HttpIssuerFetcher::default().fetch_issuer_certificates("ldap://example.com/cn=ca")
    );
    assert_eq!(
        Err(Error::InvalidUriScheme),
        HttpIssuerFetcher::default().fetch_issuer_certificates("file:///etc/passwd")
    );
}
