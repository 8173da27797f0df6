//! Programmatic certificates, CRLs and OCSP responses plus mock collaborators shared by the
//! integration tests.
//!
//! Signatures are simulated: a structure counts as signed by a certificate when its signature
//! value equals the raw public key bytes of that certificate. [`MockVerifier`] checks exactly that.

#![allow(dead_code)]

use core::str::FromStr;
use core::time::Duration;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use const_oid::db::rfc5912::{
    ID_AD_CA_ISSUERS, ID_CE_BASIC_CONSTRAINTS, ID_CE_CRL_NUMBER, ID_CE_DELTA_CRL_INDICATOR,
    ID_CE_EXT_KEY_USAGE, ID_CE_ISSUING_DISTRIBUTION_POINT, ID_CE_KEY_USAGE,
    ID_PE_AUTHORITY_INFO_ACCESS, ID_SHA_1, RSA_ENCRYPTION, SHA_256_WITH_RSA_ENCRYPTION,
};
use const_oid::db::rfc6960::{ID_PKIX_OCSP_BASIC, ID_PKIX_OCSP_NOCHECK};
use der::asn1::{BitString, GeneralizedTime, Ia5String, Null, ObjectIdentifier, OctetString, Uint};
use der::Encode;
use flagset::FlagSet;
use sha1::{Digest, Sha1};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::crl::{CertificateList, RevokedCert, TbsCertList};
use x509_cert::ext::pkix::crl::dp::{IssuingDistributionPoint, Reasons};
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{
    AccessDescription, AuthorityInfoAccessSyntax, BasicConstraints, CrlNumber, ExtendedKeyUsage,
    KeyUsage, KeyUsages,
};
use x509_cert::ext::Extension;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::{Time, Validity};
use x509_cert::{Certificate, TbsCertificate, Version};
use x509_ocsp::{
    BasicOcspResponse, CertId, CertStatus, OcspGeneralizedTime, OcspResponse, OcspResponseStatus,
    ResponderId, ResponseBytes, ResponseData, RevokedInfo, SingleResponse,
};

use sigtrust::*;

/// Reference time used throughout the tests, 2023-11-14T22:13:20Z
pub const NOW: u64 = 1_700_000_000;
pub const HOUR: u64 = 60 * 60;
pub const DAY: u64 = 24 * HOUR;

pub fn toi() -> TimeOfInterest {
    TimeOfInterest::from_unix_secs(NOW).unwrap()
}

pub fn gtime(secs: u64) -> GeneralizedTime {
    GeneralizedTime::from_unix_duration(Duration::from_secs(secs)).unwrap()
}

pub fn time(secs: u64) -> Time {
    Time::GeneralTime(gtime(secs))
}

pub fn ocsp_time(secs: u64) -> OcspGeneralizedTime {
    OcspGeneralizedTime(gtime(secs))
}

/// Distinct public key bytes for each key id
pub fn key_bytes(id: u8) -> Vec<u8> {
    vec![id; 16]
}

fn key_of(cert: &Certificate) -> Vec<u8> {
    cert.tbs_certificate
        .subject_public_key_info
        .subject_public_key
        .raw_bytes()
        .to_vec()
}

fn rsa_sha256() -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid: SHA_256_WITH_RSA_ENCRYPTION,
        parameters: None,
    }
}

pub fn extension<T: Encode>(oid: ObjectIdentifier, critical: bool, value: &T) -> Extension {
    Extension {
        extn_id: oid,
        critical,
        extn_value: OctetString::new(value.to_der().unwrap()).unwrap(),
    }
}

pub fn key_usage_ext(usages: impl Into<FlagSet<KeyUsages>>) -> Extension {
    extension(ID_CE_KEY_USAGE, true, &KeyUsage(usages.into()))
}

pub fn basic_constraints_ext(ca: bool) -> Extension {
    extension(
        ID_CE_BASIC_CONSTRAINTS,
        true,
        &BasicConstraints {
            ca,
            path_len_constraint: None,
        },
    )
}

pub fn eku_ext(purposes: Vec<ObjectIdentifier>) -> Extension {
    extension(ID_CE_EXT_KEY_USAGE, false, &ExtendedKeyUsage(purposes))
}

pub fn ca_issuers_ext(uri: &str) -> Extension {
    extension(
        ID_PE_AUTHORITY_INFO_ACCESS,
        false,
        &AuthorityInfoAccessSyntax(vec![AccessDescription {
            access_method: ID_AD_CA_ISSUERS,
            access_location: GeneralName::UniformResourceIdentifier(Ia5String::new(uri).unwrap()),
        }]),
    )
}

pub fn ocsp_nocheck_ext() -> Extension {
    extension(ID_PKIX_OCSP_NOCHECK, false, &Null)
}

/// Builds a certificate. Unless `issued_by` is called the certificate is self-signed.
pub struct CertBuilder {
    subject: Name,
    issuer: Name,
    serial: u8,
    key: Vec<u8>,
    signer_key: Vec<u8>,
    not_before: u64,
    not_after: u64,
    extensions: Vec<Extension>,
}

impl CertBuilder {
    /// A certificate for `subject` whose key id is its serial number, valid for a year either side
    /// of [`NOW`]
    pub fn new(subject: &str, serial: u8) -> Self {
        let name = Name::from_str(subject).unwrap();
        CertBuilder {
            subject: name.clone(),
            issuer: name,
            serial,
            key: key_bytes(serial),
            signer_key: key_bytes(serial),
            not_before: NOW - 365 * DAY,
            not_after: NOW + 365 * DAY,
            extensions: vec![],
        }
    }

    pub fn key(mut self, id: u8) -> Self {
        let self_signed = self.signer_key == self.key;
        self.key = key_bytes(id);
        if self_signed {
            self.signer_key = self.key.clone();
        }
        self
    }

    pub fn issued_by(mut self, issuer: &Certificate) -> Self {
        self.issuer = issuer.tbs_certificate.subject.clone();
        self.signer_key = key_of(issuer);
        self
    }

    pub fn validity(mut self, not_before: u64, not_after: u64) -> Self {
        self.not_before = not_before;
        self.not_after = not_after;
        self
    }

    /// keyCertSign, cRLSign and cA true
    pub fn ca(self) -> Self {
        self.extension(key_usage_ext(KeyUsages::KeyCertSign | KeyUsages::CRLSign))
            .extension(basic_constraints_ext(true))
    }

    pub fn extension(mut self, ext: Extension) -> Self {
        self.extensions.push(ext);
        self
    }

    pub fn build(self) -> Certificate {
        let tbs_certificate = TbsCertificate {
            version: Version::V3,
            serial_number: SerialNumber::new(&[self.serial]).unwrap(),
            signature: rsa_sha256(),
            issuer: self.issuer,
            validity: Validity {
                not_before: time(self.not_before),
                not_after: time(self.not_after),
            },
            subject: self.subject,
            subject_public_key_info: SubjectPublicKeyInfoOwned {
                algorithm: AlgorithmIdentifierOwned {
                    oid: RSA_ENCRYPTION,
                    parameters: None,
                },
                subject_public_key: BitString::from_bytes(&self.key).unwrap(),
            },
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: if self.extensions.is_empty() {
                None
            } else {
                Some(self.extensions)
            },
        };
        Certificate {
            tbs_certificate,
            signature_algorithm: rsa_sha256(),
            signature: BitString::from_bytes(&self.signer_key).unwrap(),
        }
    }
}

/// Builds a CRL issued and signed by the certificate passed to `new` unless `signed_by` is called
pub struct CrlBuilder {
    issuer: Name,
    signer_key: Vec<u8>,
    this_update: u64,
    next_update: Option<u64>,
    revoked: Vec<RevokedCert>,
    extensions: Vec<Extension>,
}

impl CrlBuilder {
    pub fn new(issuer: &Certificate) -> Self {
        CrlBuilder {
            issuer: issuer.tbs_certificate.subject.clone(),
            signer_key: key_of(issuer),
            this_update: NOW - HOUR,
            next_update: Some(NOW + 6 * DAY),
            revoked: vec![],
            extensions: vec![extension(
                ID_CE_CRL_NUMBER,
                false,
                &CrlNumber(Uint::new(&[1]).unwrap()),
            )],
        }
    }

    pub fn signed_by(mut self, signer: &Certificate) -> Self {
        self.signer_key = key_of(signer);
        self
    }

    pub fn this_update(mut self, secs: u64) -> Self {
        self.this_update = secs;
        self
    }

    pub fn next_update(mut self, secs: Option<u64>) -> Self {
        self.next_update = secs;
        self
    }

    pub fn revoke(mut self, cert: &Certificate, at: u64) -> Self {
        self.revoked.push(RevokedCert {
            serial_number: cert.tbs_certificate.serial_number.clone(),
            revocation_date: time(at),
            crl_entry_extensions: None,
        });
        self
    }

    /// Adds a critical issuingDistributionPoint limited to keyCompromise
    pub fn only_key_compromise(self) -> Self {
        let idp = IssuingDistributionPoint {
            distribution_point: None,
            only_contains_user_certs: false,
            only_contains_ca_certs: false,
            only_some_reasons: Some(Reasons::KeyCompromise.into()),
            indirect_crl: false,
            only_contains_attribute_certs: false,
        };
        self.extension(extension(ID_CE_ISSUING_DISTRIBUTION_POINT, true, &idp))
    }

    pub fn delta(self) -> Self {
        self.extension(extension(
            ID_CE_DELTA_CRL_INDICATOR,
            true,
            &CrlNumber(Uint::new(&[1]).unwrap()),
        ))
    }

    pub fn extension(mut self, ext: Extension) -> Self {
        self.extensions.push(ext);
        self
    }

    pub fn build(self) -> CertificateList {
        CertificateList {
            tbs_cert_list: TbsCertList {
                version: Version::V2,
                signature: rsa_sha256(),
                issuer: self.issuer,
                this_update: time(self.this_update),
                next_update: self.next_update.map(time),
                revoked_certificates: if self.revoked.is_empty() {
                    None
                } else {
                    Some(self.revoked)
                },
                crl_extensions: Some(self.extensions),
            },
            signature_algorithm: rsa_sha256(),
            signature: BitString::from_bytes(&self.signer_key).unwrap(),
        }
    }

    pub fn to_der(self) -> Vec<u8> {
        self.build().to_der().unwrap()
    }
}

/// Builds a basic OCSP response about one certificate, by default signed by its issuer and
/// reporting good status as of an hour before [`NOW`]
pub struct OcspBuilder {
    cert_id: CertId,
    status: CertStatus,
    this_update: u64,
    next_update: Option<u64>,
    responder: Name,
    signer_key: Vec<u8>,
    certs: Option<Vec<Certificate>>,
}

/// SHA-1 CertId for `cert` as issued by `issuer`
pub fn cert_id(cert: &Certificate, issuer: &Certificate) -> CertId {
    CertId {
        hash_algorithm: AlgorithmIdentifierOwned {
            oid: ID_SHA_1,
            parameters: None,
        },
        issuer_name_hash: OctetString::new(
            Sha1::digest(cert.tbs_certificate.issuer.to_der().unwrap()).to_vec(),
        )
        .unwrap(),
        issuer_key_hash: OctetString::new(Sha1::digest(key_of(issuer)).to_vec()).unwrap(),
        serial_number: cert.tbs_certificate.serial_number.clone(),
    }
}

impl OcspBuilder {
    pub fn new(cert: &Certificate, issuer: &Certificate) -> Self {
        OcspBuilder {
            cert_id: cert_id(cert, issuer),
            status: CertStatus::Good(Null),
            this_update: NOW - HOUR,
            next_update: None,
            responder: issuer.tbs_certificate.subject.clone(),
            signer_key: key_of(issuer),
            certs: None,
        }
    }

    pub fn revoked_at(mut self, secs: u64) -> Self {
        self.status = CertStatus::Revoked(RevokedInfo {
            revocation_time: ocsp_time(secs),
            revocation_reason: None,
        });
        self
    }

    pub fn unknown(mut self) -> Self {
        self.status = CertStatus::Unknown(Null);
        self
    }

    pub fn this_update(mut self, secs: u64) -> Self {
        self.this_update = secs;
        self
    }

    pub fn next_update(mut self, secs: u64) -> Self {
        self.next_update = Some(secs);
        self
    }

    /// Signs with the key of `responder` and names it in the responder id
    pub fn signed_by(mut self, responder: &Certificate) -> Self {
        self.responder = responder.tbs_certificate.subject.clone();
        self.signer_key = key_of(responder);
        self
    }

    pub fn embed(mut self, cert: &Certificate) -> Self {
        self.certs.get_or_insert_with(Vec::new).push(cert.clone());
        self
    }

    pub fn build(self) -> BasicOcspResponse {
        BasicOcspResponse {
            tbs_response_data: ResponseData {
                version: x509_ocsp::Version::V1,
                responder_id: ResponderId::ByName(self.responder),
                produced_at: ocsp_time(self.this_update),
                responses: vec![SingleResponse {
                    cert_id: self.cert_id,
                    cert_status: self.status,
                    this_update: ocsp_time(self.this_update),
                    next_update: self.next_update.map(ocsp_time),
                    single_extensions: None,
                }],
                response_extensions: None,
            },
            signature_algorithm: rsa_sha256(),
            signature: BitString::from_bytes(&self.signer_key).unwrap(),
            certs: self.certs,
        }
    }

    /// DER encoded BasicOCSPResponse
    pub fn to_der(self) -> Vec<u8> {
        self.build().to_der().unwrap()
    }

    /// DER encoded OCSPResponse wrapping the basic response
    pub fn to_wrapped_der(self) -> Vec<u8> {
        OcspResponse {
            response_status: OcspResponseStatus::Successful,
            response_bytes: Some(ResponseBytes {
                response_type: ID_PKIX_OCSP_BASIC,
                response: OctetString::new(self.to_der()).unwrap(),
            }),
        }
        .to_der()
        .unwrap()
    }
}

/// Accepts a signature when it equals the raw public key of the candidate signer
#[derive(Clone, Copy, Debug, Default)]
pub struct MockVerifier;

impl SignatureVerifier for MockVerifier {
    fn is_signature_valid(&self, signed: SignedObject<'_>, signer: &Certificate) -> bool {
        signed.signature()
            == signer
                .tbs_certificate
                .subject_public_key_info
                .subject_public_key
                .raw_bytes()
    }
}

/// Revocation checker that records how often it ran and adds nothing to the report
#[derive(Clone, Debug, Default)]
pub struct CountingRevocationChecker {
    pub calls: Arc<AtomicUsize>,
}

impl CountingRevocationChecker {
    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RevocationChecker for CountingRevocationChecker {
    fn validate(
        &self,
        _env: &ValidationEnvironment,
        _report: &mut ValidationReport,
        _context: ValidationContext,
        _certificate: &Certificate,
        _reference_time: TimeOfInterest,
    ) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// CRL client standing in for an online source, counting requests
#[derive(Clone, Debug, Default)]
pub struct CountingCrlClient {
    pub crls: Vec<Vec<u8>>,
    pub calls: Arc<AtomicUsize>,
}

impl CountingCrlClient {
    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CrlClient for CountingCrlClient {
    fn get_encoded(&self, _certificate: &Certificate, _url: Option<&str>) -> Vec<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.crls.clone()
    }
}

/// Issuer fetcher serving fixed bytes for one URI, counting requests
#[derive(Clone, Debug, Default)]
pub struct MockFetcher {
    pub uri: String,
    pub bytes: Vec<u8>,
    pub calls: Arc<AtomicUsize>,
}

impl MockFetcher {
    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl IssuerCertificateFetcher for MockFetcher {
    fn fetch_issuer_certificates(&self, uri: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if uri == self.uri {
            Ok(self.bytes.clone())
        } else {
            Err(Error::NetworkError)
        }
    }
}

/// Environment over the given certificates using [`MockVerifier`] and `properties`, with online
/// fetching disabled
pub fn mock_env(
    trusted: Vec<Certificate>,
    known: Vec<Certificate>,
    properties: SignatureValidationProperties,
) -> ValidationEnvironment {
    let mut store = CertificateStore::new();
    store.add_trusted_certificates(trusted);
    store.add_known_certificates(known);
    let mut env = ValidationEnvironment::new(store, Box::new(MockVerifier));
    env.set_properties(properties);
    env.properties_mut()
        .set_online_fetching(ValidationContexts::all(), OnlineFetching::NeverFetch);
    env
}

/// Root, intermediate and signer certificates with CA extensions on the first two
pub struct TestPki {
    pub root: Certificate,
    pub intermediate: Certificate,
    pub signer: Certificate,
}

impl TestPki {
    pub fn new() -> Self {
        let root = CertBuilder::new("CN=Test Root CA,O=Example", 1).ca().build();
        let intermediate = CertBuilder::new("CN=Test Intermediate CA,O=Example", 2)
            .issued_by(&root)
            .ca()
            .build();
        let signer = CertBuilder::new("CN=Test Signer,O=Example", 3)
            .issued_by(&intermediate)
            .extension(key_usage_ext(KeyUsages::NonRepudiation))
            .build();
        TestPki {
            root,
            intermediate,
            signer,
        }
    }

    /// Same subjects and keys, no extensions at all
    pub fn bare() -> Self {
        let root = CertBuilder::new("CN=Test Root CA,O=Example", 1).build();
        let intermediate = CertBuilder::new("CN=Test Intermediate CA,O=Example", 2)
            .issued_by(&root)
            .build();
        let signer = CertBuilder::new("CN=Test Signer,O=Example", 3)
            .issued_by(&intermediate)
            .build();
        TestPki {
            root,
            intermediate,
            signer,
        }
    }
}
