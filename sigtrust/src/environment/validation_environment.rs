//! ValidationEnvironment aggregates the certificate store, policy table and the trait objects that
//! supply signature verification, parsing, fetching and revocation data to the validators.
//!
//! The sample below illustrates preparation of a ValidationEnvironment for validating a signer's
//! certificate against a set of trust anchors.
//! ```
//! use sigtrust::*;
//! use x509_cert::Certificate;
//!
//! fn prepare(
//!     trust_anchors: Vec<Certificate>,
//!     intermediate_cas: Vec<Certificate>,
//!     crls: Vec<Vec<u8>>,
//! ) -> ValidationEnvironment {
//!     let mut store = CertificateStore::new();
//!     store.add_trusted_certificates(trust_anchors);
//!     store.add_known_certificates(intermediate_cas);
//!
//!     let mut env = ValidationEnvironment::new(store, Box::new(RustCryptoVerifier));
//!
//!     // revocation evidence collected with the signature, i.e., from a document security store
//!     env.add_crl_client(Box::new(StaticCrlClient::new(crls)));
//!
//!     // with the remote feature, AIA and online OCSP/CRL retrieval over HTTP
//!     #[cfg(feature = "remote")]
//!     env.populate_online_clients();
//!     env
//! }
//!
//! let env = prepare(vec![], vec![], vec![]);
//! assert_eq!(0, env.store().trusted_len());
//! ```
//!
//! Validation itself does not mutate the environment. The only interior mutability is the cache of
//! issuer certificates retrieved via AIA, which is guarded by a `RwLock`.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use log::error;
use x509_cert::Certificate;

use crate::environment::validation_environment_traits::*;
use crate::revocation::revocation_data_validator::RevocationDataValidator;
use crate::source::cert_parser::DefaultCertificateParser;
use crate::source::cert_store::CertificateStore;
use crate::util::cert_utilities::{compare_names, is_self_issued};
use crate::util::crypto::RustCryptoVerifier;
use crate::util::error::Result;
use crate::validator::properties::SignatureValidationProperties;
use crate::{TimeOfInterest, ValidationContext, ValidationReport};

/// Cache of certificates retrieved from AIA caIssuers URIs, safe for concurrent read and insert
#[derive(Debug, Default)]
pub struct IssuerCache(RwLock<BTreeMap<String, Vec<Certificate>>>);

impl IssuerCache {
    /// Returns the certificates cached for `uri`, if any
    pub fn get(&self, uri: &str) -> Option<Vec<Certificate>> {
        match self.0.read() {
            Ok(guard) => guard.get(uri).cloned(),
            Err(e) => {
                error!("Issuer cache lock is poisoned: {}", e);
                None
            }
        }
    }

    /// Caches the certificates retrieved from `uri`
    pub fn insert(&self, uri: &str, certs: Vec<Certificate>) {
        match self.0.write() {
            Ok(mut guard) => {
                guard.insert(uri.to_string(), certs);
            }
            Err(e) => error!("Issuer cache lock is poisoned: {}", e),
        }
    }

    /// Number of cached URIs
    pub fn len(&self) -> usize {
        self.0.read().map(|g| g.len()).unwrap_or_default()
    }

    /// Returns true if nothing is cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// [`ValidationEnvironment`] provides a switchboard of trait objects that allow support to vary on
/// different platforms or to allow support to be tailored for specific use cases, i.e., tests
/// substitute mocks for signature verification or revocation checking.
pub struct ValidationEnvironment {
    //--------------------------------------------------------------------------
    //Configuration
    //--------------------------------------------------------------------------
    /// Trusted and known certificates
    store: Arc<CertificateStore>,
    /// Per-context policy
    properties: SignatureValidationProperties,

    //--------------------------------------------------------------------------
    //Crypto and parsing interfaces
    //--------------------------------------------------------------------------
    verifier: Box<dyn SignatureVerifier + Send + Sync>,
    parser: Box<dyn CertificateParser + Send + Sync>,

    //--------------------------------------------------------------------------
    //Retrieval interfaces
    //--------------------------------------------------------------------------
    issuer_fetcher: Option<Box<dyn IssuerCertificateFetcher + Send + Sync>>,
    issuer_cache: IssuerCache,
    ocsp_clients: Vec<Box<dyn OcspClient + Send + Sync>>,
    crl_clients: Vec<Box<dyn CrlClient + Send + Sync>>,
    online_ocsp_client: Option<Box<dyn OcspClient + Send + Sync>>,
    online_crl_client: Option<Box<dyn CrlClient + Send + Sync>>,

    //--------------------------------------------------------------------------
    //Revocation
    //--------------------------------------------------------------------------
    revocation_checker: Option<Box<dyn RevocationChecker + Send + Sync>>,
}

impl Default for ValidationEnvironment {
    fn default() -> Self {
        ValidationEnvironment::new(CertificateStore::new(), Box::new(RustCryptoVerifier))
    }
}

impl ValidationEnvironment {
    /// Creates an environment with the default parser, default properties and no retrieval
    /// capabilities beyond the store.
    pub fn new(store: CertificateStore, verifier: Box<dyn SignatureVerifier + Send + Sync>) -> Self {
        ValidationEnvironment::with_shared_store(Arc::new(store), verifier)
    }

    /// As [`ValidationEnvironment::new`] but sharing an existing store
    pub fn with_shared_store(
        store: Arc<CertificateStore>,
        verifier: Box<dyn SignatureVerifier + Send + Sync>,
    ) -> Self {
        ValidationEnvironment {
            store,
            properties: SignatureValidationProperties::default(),
            verifier,
            parser: Box::new(DefaultCertificateParser),
            issuer_fetcher: None,
            issuer_cache: IssuerCache::default(),
            ocsp_clients: vec![],
            crl_clients: vec![],
            online_ocsp_client: None,
            online_crl_client: None,
            revocation_checker: None,
        }
    }

    /// The certificate store
    pub fn store(&self) -> &CertificateStore {
        &self.store
    }

    /// The policy table
    pub fn properties(&self) -> &SignatureValidationProperties {
        &self.properties
    }

    /// Mutable access to the policy table
    pub fn properties_mut(&mut self) -> &mut SignatureValidationProperties {
        &mut self.properties
    }

    /// Replaces the policy table
    pub fn set_properties(&mut self, properties: SignatureValidationProperties) {
        self.properties = properties;
    }

    /// Replaces the signature verifier
    pub fn set_signature_verifier(&mut self, v: Box<dyn SignatureVerifier + Send + Sync>) {
        self.verifier = v;
    }

    /// Replaces the certificate parser
    pub fn set_certificate_parser(&mut self, p: Box<dyn CertificateParser + Send + Sync>) {
        self.parser = p;
    }

    /// The certificate parser
    pub fn certificate_parser(&self) -> &(dyn CertificateParser + Send + Sync) {
        self.parser.as_ref()
    }

    /// Sets the fetcher used to follow AIA caIssuers URIs
    pub fn set_issuer_fetcher(&mut self, f: Box<dyn IssuerCertificateFetcher + Send + Sync>) {
        self.issuer_fetcher = Some(f);
    }

    /// The AIA fetcher, if any
    pub fn issuer_fetcher(&self) -> Option<&(dyn IssuerCertificateFetcher + Send + Sync)> {
        self.issuer_fetcher.as_deref()
    }

    /// The AIA cache
    pub fn issuer_cache(&self) -> &IssuerCache {
        &self.issuer_cache
    }

    /// add_ocsp_client adds an [`OcspClient`] to the list consulted for every certificate
    pub fn add_ocsp_client(&mut self, c: Box<dyn OcspClient + Send + Sync>) {
        self.ocsp_clients.push(c);
    }

    /// clear_ocsp_clients clears the list of configured [`OcspClient`] objects
    pub fn clear_ocsp_clients(&mut self) {
        self.ocsp_clients.clear();
    }

    /// Configured OCSP clients
    pub fn ocsp_clients(&self) -> &[Box<dyn OcspClient + Send + Sync>] {
        &self.ocsp_clients
    }

    /// add_crl_client adds a [`CrlClient`] to the list consulted for every certificate
    pub fn add_crl_client(&mut self, c: Box<dyn CrlClient + Send + Sync>) {
        self.crl_clients.push(c);
    }

    /// clear_crl_clients clears the list of configured [`CrlClient`] objects
    pub fn clear_crl_clients(&mut self) {
        self.crl_clients.clear();
    }

    /// Configured CRL clients
    pub fn crl_clients(&self) -> &[Box<dyn CrlClient + Send + Sync>] {
        &self.crl_clients
    }

    /// Sets the OCSP client used when the online fetching policy calls for it
    pub fn set_online_ocsp_client(&mut self, c: Box<dyn OcspClient + Send + Sync>) {
        self.online_ocsp_client = Some(c);
    }

    /// The online OCSP client, if any
    pub fn online_ocsp_client(&self) -> Option<&(dyn OcspClient + Send + Sync)> {
        self.online_ocsp_client.as_deref()
    }

    /// Sets the CRL client used when the online fetching policy calls for it
    pub fn set_online_crl_client(&mut self, c: Box<dyn CrlClient + Send + Sync>) {
        self.online_crl_client = Some(c);
    }

    /// The online CRL client, if any
    pub fn online_crl_client(&self) -> Option<&(dyn CrlClient + Send + Sync)> {
        self.online_crl_client.as_deref()
    }

    /// Installs HTTP implementations of the AIA fetcher and the online OCSP and CRL clients
    #[cfg(feature = "remote")]
    pub fn populate_online_clients(&mut self) {
        use crate::source::remote_clients::*;
        self.set_issuer_fetcher(Box::new(HttpIssuerFetcher::default()));
        self.set_online_ocsp_client(Box::new(OnlineOcspClient::default()));
        self.set_online_crl_client(Box::new(OnlineCrlClient::default()));
    }

    /// Replaces the revocation checker used by the chain validator
    pub fn set_revocation_checker(&mut self, c: Box<dyn RevocationChecker + Send + Sync>) {
        self.revocation_checker = Some(c);
    }

    /// Restores the default revocation checker, [`RevocationDataValidator`]
    pub fn clear_revocation_checker(&mut self) {
        self.revocation_checker = None;
    }

    /// Checks revocation status of `certificate` using the installed [`RevocationChecker`], or
    /// [`RevocationDataValidator`] if none was installed
    pub fn check_revocation(
        &self,
        report: &mut ValidationReport,
        context: ValidationContext,
        certificate: &Certificate,
        reference_time: TimeOfInterest,
    ) {
        match &self.revocation_checker {
            Some(c) => c.validate(self, report, context, certificate, reference_time),
            None => {
                RevocationDataValidator.validate(self, report, context, certificate, reference_time)
            }
        }
    }

    /// Returns true if the public key of `signer` verifies the signature on `signed`
    pub fn is_signature_valid(&self, signed: SignedObject<'_>, signer: &Certificate) -> bool {
        self.verifier.is_signature_valid(signed, signer)
    }

    /// `is_self_signed` returns true if the certificate's subject and issuer names match and its
    /// own public key verifies its signature.
    pub fn is_self_signed(&self, cert: &Certificate) -> bool {
        is_self_issued(cert) && self.is_signature_valid(SignedObject::Certificate(cert), cert)
    }

    /// `is_issued_by` returns true if the subject of `candidate` matches the issuer of `cert` and
    /// the public key of `candidate` verifies the signature on `cert`.
    pub fn is_issued_by(&self, cert: &Certificate, candidate: &Certificate) -> bool {
        compare_names(
            &cert.tbs_certificate.issuer,
            &candidate.tbs_certificate.subject,
        ) && self.is_signature_valid(SignedObject::Certificate(cert), candidate)
    }

    /// Parses certificates using the configured parser
    pub fn parse_certificates(&self, bytes: &[u8]) -> Result<Vec<Certificate>> {
        self.parser.parse_certificates(bytes)
    }
}

#[test]
fn issuer_cache_concurrent_read_and_insert() {
    let cache = IssuerCache::default();
    assert!(cache.is_empty());
    cache.insert("http://ca.example/shared.cer", vec![]);

    std::thread::scope(|s| {
        for i in 0..8 {
            let cache = &cache;
            s.spawn(move || {
                for j in 0..25 {
                    let uri = format!("http://ca.example/{}/{}.cer", i, j);
                    assert!(cache.get(&uri).is_none());
                    cache.insert(&uri, vec![]);
                    assert_eq!(Some(vec![]), cache.get(&uri));
                    assert!(cache.get("http://ca.example/shared.cer").is_some());
                }
            });
        }
    });

    assert_eq!(1 + 8 * 25, cache.len());
    assert!(!cache.is_empty());
}
