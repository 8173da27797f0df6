//! Certificate store holding trusted and known certificates indexed by subject name
//!
//! The store is populated at configuration time and is read-only during validation, so a single
//! instance can be shared across concurrent validations via an `Arc`.
//!
//! ```
//! use sigtrust::*;
//!
//! let mut store = CertificateStore::new();
//! // populate from folders of DER, PEM or certs-only PKCS #7 files
//! // store.populate_from_folders(&DefaultCertificateParser, Some("tas"), Some("cas"))?;
//! assert!(store.is_empty());
//! ```

use std::collections::BTreeMap;

use log::{debug, info};
use x509_cert::name::Name;
use x509_cert::Certificate;

use crate::environment::validation_environment_traits::CertificateParser;
use crate::source::file_utils::cert_folder_to_vec;
use crate::util::cert_utilities::name_to_string;
use crate::util::error::Result;
use crate::validator::context::CertificateSource;

type NameMap = BTreeMap<String, Vec<Certificate>>;

fn insert(map: &mut NameMap, cert: Certificate) -> bool {
    let name = name_to_string(&cert.tbs_certificate.subject);
    let entry = map.entry(name).or_default();
    if entry.contains(&cert) {
        false
    } else {
        entry.push(cert);
        true
    }
}

fn contains(map: &NameMap, cert: &Certificate) -> bool {
    map.get(&name_to_string(&cert.tbs_certificate.subject))
        .map(|v| v.contains(cert))
        .unwrap_or(false)
}

fn remove(map: &mut NameMap, cert: &Certificate) {
    let name = name_to_string(&cert.tbs_certificate.subject);
    if let Some(v) = map.get_mut(&name) {
        v.retain(|c| c != cert);
        if v.is_empty() {
            map.remove(&name);
        }
    }
}

/// Two disjoint sets of certificates: *trusted* certificates terminate chain validation and never
/// require revocation evidence, *known* certificates may only be used to complete a chain.
///
/// Trust may also be scoped to a [`CertificateSource`], i.e., a certificate trusted only as an OCSP
/// responder is trusted when it signs an OCSP response but not when it appears as a CA.
#[derive(Clone, Debug, Default)]
pub struct CertificateStore {
    trusted: NameMap,
    trusted_for: BTreeMap<CertificateSource, NameMap>,
    known: NameMap,
}

impl CertificateStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds certificates that are trusted in every context. Any of them present in the known set
    /// are moved.
    pub fn add_trusted_certificates(&mut self, certs: impl IntoIterator<Item = Certificate>) {
        for cert in certs {
            remove(&mut self.known, &cert);
            insert(&mut self.trusted, cert);
        }
    }

    /// Adds certificates that are trusted only when validated in the role given by `source`
    pub fn add_trusted_certificates_for(
        &mut self,
        source: CertificateSource,
        certs: impl IntoIterator<Item = Certificate>,
    ) {
        let map = self.trusted_for.entry(source).or_default();
        for cert in certs {
            remove(&mut self.known, &cert);
            insert(map, cert);
        }
    }

    /// Adds certificates usable for chain completion. Certificates already trusted are ignored.
    pub fn add_known_certificates(&mut self, certs: impl IntoIterator<Item = Certificate>) {
        for cert in certs {
            if self.is_trusted_in_any_context(&cert) {
                continue;
            }
            insert(&mut self.known, cert);
        }
    }

    /// Returns true if the certificate is trusted in every context
    pub fn is_trusted(&self, cert: &Certificate) -> bool {
        contains(&self.trusted, cert)
    }

    /// Returns true if the certificate is trusted in every context or for the given role
    pub fn is_trusted_for(&self, cert: &Certificate, source: CertificateSource) -> bool {
        self.is_trusted(cert)
            || self
                .trusted_for
                .get(&source)
                .map(|m| contains(m, cert))
                .unwrap_or(false)
    }

    fn is_trusted_in_any_context(&self, cert: &Certificate) -> bool {
        self.is_trusted(cert) || self.trusted_for.values().any(|m| contains(m, cert))
    }

    /// Returns true if the certificate is in the known set
    pub fn is_known(&self, cert: &Certificate) -> bool {
        contains(&self.known, cert)
    }

    /// Trusted certificates, including role-scoped ones, whose subject matches `name`
    pub fn get_trusted_certificates_by_name(&self, name: &Name) -> Vec<&Certificate> {
        let key = name_to_string(name);
        let mut retval: Vec<&Certificate> = vec![];
        if let Some(v) = self.trusted.get(&key) {
            retval.extend(v.iter());
        }
        for m in self.trusted_for.values() {
            if let Some(v) = m.get(&key) {
                for c in v {
                    if !retval.contains(&c) {
                        retval.push(c);
                    }
                }
            }
        }
        retval
    }

    /// Known certificates whose subject matches `name`
    pub fn get_known_certificates_by_name(&self, name: &Name) -> Vec<&Certificate> {
        self.known
            .get(&name_to_string(name))
            .map(|v| v.iter().collect())
            .unwrap_or_default()
    }

    /// Certificates whose subject matches `name`, trusted ones first
    pub fn get_certificates_by_name(&self, name: &Name) -> Vec<&Certificate> {
        let mut retval = self.get_trusted_certificates_by_name(name);
        retval.extend(self.get_known_certificates_by_name(name));
        retval
    }

    /// Number of distinct certificates held in the trusted sets
    pub fn trusted_len(&self) -> usize {
        let mut all: Vec<&Certificate> = self.trusted.values().flatten().collect();
        for c in self.trusted_for.values().flat_map(|m| m.values().flatten()) {
            if !all.contains(&c) {
                all.push(c);
            }
        }
        all.len()
    }

    /// Number of certificates held in the known set
    pub fn known_len(&self) -> usize {
        self.known.values().map(|v| v.len()).sum()
    }

    /// Returns true if the store holds no certificates
    pub fn is_empty(&self) -> bool {
        self.trusted_len() == 0 && self.known_len() == 0
    }

    /// `populate_from_folders` reads trusted certificates from `trusted_folder` and known
    /// certificates from `known_folder`, each walked recursively.
    pub fn populate_from_folders(
        &mut self,
        parser: &dyn CertificateParser,
        trusted_folder: Option<&str>,
        known_folder: Option<&str>,
    ) -> Result<()> {
        if let Some(folder) = trusted_folder {
            let certs = cert_folder_to_vec(parser, folder)?;
            info!("Read {} trusted certificates from {}", certs.len(), folder);
            self.add_trusted_certificates(certs);
        }
        if let Some(folder) = known_folder {
            let certs = cert_folder_to_vec(parser, folder)?;
            info!("Read {} known certificates from {}", certs.len(), folder);
            self.add_known_certificates(certs);
        }
        debug!(
            "Certificate store holds {} trusted and {} known certificates",
            self.trusted_len(),
            self.known_len()
        );
        Ok(())
    }
}
