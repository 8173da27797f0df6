//! The validation_environment_traits module features trait definitions for the capabilities a
//! [`ValidationEnvironment`] aggregates: signature verification, certificate parsing, issuer
//! certificate fetching, OCSP and CRL retrieval and revocation checking.

use der::Encode;
use spki::AlgorithmIdentifierOwned;
use x509_cert::crl::CertificateList;
use x509_cert::Certificate;
use x509_ocsp::BasicOcspResponse;

use crate::util::error::*;
use crate::{TimeOfInterest, ValidationContext, ValidationEnvironment, ValidationReport};

/// A signed artifact whose signature is to be checked against a candidate signer
#[derive(Clone, Copy, Debug)]
pub enum SignedObject<'a> {
    /// A certificate
    Certificate(&'a Certificate),
    /// A CRL
    Crl(&'a CertificateList),
    /// A basic OCSP response
    OcspResponse(&'a BasicOcspResponse),
}

impl SignedObject<'_> {
    /// DER encoding of the to-be-signed portion of the object
    pub fn tbs_der(&self) -> Result<Vec<u8>> {
        let enc = match self {
            SignedObject::Certificate(c) => c.tbs_certificate.to_der()?,
            SignedObject::Crl(crl) => crl.tbs_cert_list.to_der()?,
            SignedObject::OcspResponse(bor) => bor.tbs_response_data.to_der()?,
        };
        Ok(enc)
    }

    /// Signature algorithm from the outer structure
    pub fn signature_algorithm(&self) -> &AlgorithmIdentifierOwned {
        match self {
            SignedObject::Certificate(c) => &c.signature_algorithm,
            SignedObject::Crl(crl) => &crl.signature_algorithm,
            SignedObject::OcspResponse(bor) => &bor.signature_algorithm,
        }
    }

    /// Signature value
    pub fn signature(&self) -> &[u8] {
        match self {
            SignedObject::Certificate(c) => c.signature.raw_bytes(),
            SignedObject::Crl(crl) => crl.signature.raw_bytes(),
            SignedObject::OcspResponse(bor) => bor.signature.raw_bytes(),
        }
    }
}

/// Signature verification primitive. Implementations return true only when the public key of
/// `signer` verifies the signature on `signed`.
pub trait SignatureVerifier {
    /// Checks the signature on `signed` using the public key from `signer`
    fn is_signature_valid(&self, signed: SignedObject<'_>, signer: &Certificate) -> bool;
}

/// Retrieves the resource referenced by an AIA id-ad-caIssuers URI
pub trait IssuerCertificateFetcher {
    /// Returns the bytes at `uri`, notionally one or more certificates
    fn fetch_issuer_certificates(&self, uri: &str) -> Result<Vec<u8>>;
}

/// Decodes one or more certificates from a buffer
pub trait CertificateParser {
    /// Parses `bytes`, which may hold a DER certificate, PEM certificates or a certs-only bag
    fn parse_certificates(&self, bytes: &[u8]) -> Result<Vec<Certificate>>;
}

/// Source of OCSP responses
pub trait OcspClient {
    /// Returns an encoded BasicOCSPResponse (or OCSPResponse wrapping one) for `certificate`,
    /// or None when nothing is available. `url` optionally names a responder.
    fn get_encoded(
        &self,
        certificate: &Certificate,
        issuer: &Certificate,
        url: Option<&str>,
    ) -> Option<Vec<u8>>;
}

/// Source of CRLs
pub trait CrlClient {
    /// Returns zero or more encoded CRLs that may cover `certificate`. `url` optionally names a
    /// distribution point.
    fn get_encoded(&self, certificate: &Certificate, url: Option<&str>) -> Vec<Vec<u8>>;
}

/// Determines the revocation status of one certificate, adding findings to `report`.
///
/// [`RevocationDataValidator`](crate::RevocationDataValidator) is the implementation used by default.
/// Callers may install an alternative via
/// [`ValidationEnvironment::set_revocation_checker`].
pub trait RevocationChecker {
    /// Checks revocation status of `certificate` at `reference_time`
    fn validate(
        &self,
        env: &ValidationEnvironment,
        report: &mut ValidationReport,
        context: ValidationContext,
        certificate: &Certificate,
        reference_time: TimeOfInterest,
    );
}
