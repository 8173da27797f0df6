//! Completes partial certification paths by walking issuer links from a leaf toward a self-signed
//! certificate, drawing candidates from the presented chain, AIA caIssuers URIs and the store.

use const_oid::db::rfc5912::{ID_AD_CA_ISSUERS, ID_PE_AUTHORITY_INFO_ACCESS};
use der::Decode;
use log::{debug, info};
use x509_cert::crl::CertificateList;
use x509_cert::ext::pkix::{name::GeneralName, AuthorityInfoAccessSyntax};
use x509_cert::name::Name;
use x509_cert::Certificate;

use crate::environment::validation_environment::ValidationEnvironment;
use crate::environment::validation_environment_traits::SignedObject;
use crate::util::cert_utilities::{collect_ca_issuer_uris, compare_names, name_to_string};
use crate::util::error::{Error, Result};

/// Issuer resolution over a [`ValidationEnvironment`]. Holds no state of its own; fetched issuer
/// certificates are cached by the environment.
#[derive(Clone, Copy)]
pub struct IssuingCertificateRetriever<'a> {
    env: &'a ValidationEnvironment,
}

fn push_unique(list: &mut Vec<Certificate>, cert: Certificate) {
    if !list.contains(&cert) {
        list.push(cert);
    }
}

impl<'a> IssuingCertificateRetriever<'a> {
    /// Creates a retriever over `env`
    pub fn new(env: &'a ValidationEnvironment) -> Self {
        IssuingCertificateRetriever { env }
    }

    /// `complete_chain` takes a partial chain that starts with a leaf certificate and returns a
    /// chain that, where issuers could be found, terminates with a self-signed certificate. Input
    /// certificates that are not linked to the output are appended verbatim at the end.
    ///
    /// An empty input yields [`Error::EmptyChain`].
    pub fn complete_chain(&self, partial_chain: &[Certificate]) -> Result<Vec<Certificate>> {
        let (leaf, rest) = match partial_chain.split_first() {
            Some(split) => split,
            None => return Err(Error::EmptyChain),
        };

        let mut chain = vec![leaf.clone()];
        let mut next = 0;
        loop {
            let last = match chain.last() {
                Some(last) => last.clone(),
                None => break,
            };
            if self.env.is_self_signed(&last) {
                break;
            }

            if let Some(candidate) = rest.get(next) {
                if self.env.is_issued_by(&last, candidate) {
                    next += 1;
                    if chain.contains(candidate) {
                        debug!(
                            "Issuer loop detected at {}",
                            name_to_string(&candidate.tbs_certificate.subject)
                        );
                        break;
                    }
                    chain.push(candidate.clone());
                    continue;
                }
            }

            match self.issuer_of(&last) {
                Some(issuer) if !chain.contains(&issuer) => chain.push(issuer),
                Some(issuer) => {
                    debug!(
                        "Issuer loop detected at {}",
                        name_to_string(&issuer.tbs_certificate.subject)
                    );
                    break;
                }
                None => break,
            }
        }
        for c in &rest[next..] {
            push_unique(&mut chain, c.clone());
        }
        Ok(chain)
    }

    /// `issuer_candidates` returns certificates whose subject matches the issuer name of `cert`:
    /// those retrieved via its AIA caIssuers URIs, then trusted certificates, then known
    /// certificates. Candidates are not checked against the certificate's signature.
    pub fn issuer_candidates(&self, cert: &Certificate) -> Vec<Certificate> {
        let issuer_name = &cert.tbs_certificate.issuer;
        let mut retval = vec![];
        for uri in collect_ca_issuer_uris(cert) {
            for c in self.fetch_from_uri(&uri) {
                if compare_names(issuer_name, &c.tbs_certificate.subject) {
                    push_unique(&mut retval, c);
                }
            }
        }
        self.add_from_store(issuer_name, &mut retval);
        retval
    }

    /// `issuer_of` returns the first issuer candidate whose public key verifies the signature on
    /// `cert`, or None.
    pub fn issuer_of(&self, cert: &Certificate) -> Option<Certificate> {
        self.issuer_candidates(cert)
            .into_iter()
            .find(|c| self.env.is_signature_valid(SignedObject::Certificate(cert), c))
    }

    /// `crl_issuer_candidates` returns certificates whose subject matches the issuer of the CRL,
    /// drawn from the AIA extension of the CRL, then trusted certificates, then known certificates.
    pub fn crl_issuer_candidates(&self, crl: &CertificateList) -> Vec<Certificate> {
        let issuer_name = &crl.tbs_cert_list.issuer;
        let mut retval = vec![];
        for uri in crl_ca_issuer_uris(crl) {
            for c in self.fetch_from_uri(&uri) {
                if compare_names(issuer_name, &c.tbs_certificate.subject) {
                    push_unique(&mut retval, c);
                }
            }
        }
        self.add_from_store(issuer_name, &mut retval);
        retval
    }

    /// `crl_issuer_chain` locates the certificate that signed `crl` and returns it followed by its
    /// issuers, as produced by [`IssuingCertificateRetriever::complete_chain`]. The result is empty
    /// if no candidate verifies the CRL signature.
    pub fn crl_issuer_chain(&self, crl: &CertificateList) -> Vec<Certificate> {
        let signer = self
            .crl_issuer_candidates(crl)
            .into_iter()
            .find(|c| self.env.is_signature_valid(SignedObject::Crl(crl), c));
        match signer {
            Some(signer) => self.complete_chain(&[signer]).unwrap_or_default(),
            None => vec![],
        }
    }

    fn add_from_store(&self, name: &Name, list: &mut Vec<Certificate>) {
        let store = self.env.store();
        for c in store.get_trusted_certificates_by_name(name) {
            push_unique(list, c.clone());
        }
        for c in store.get_known_certificates_by_name(name) {
            push_unique(list, c.clone());
        }
    }

    /// Retrieves and parses certificates from an AIA URI, consulting and populating the cache.
    /// Failures are logged and yield an empty list.
    fn fetch_from_uri(&self, uri: &str) -> Vec<Certificate> {
        let cache = self.env.issuer_cache();
        if let Some(certs) = cache.get(uri) {
            return certs;
        }

        let fetcher = match self.env.issuer_fetcher() {
            Some(f) => f,
            None => return vec![],
        };

        let bytes = match fetcher.fetch_issuer_certificates(uri) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("Failed to retrieve issuer certificates from {}: {}", uri, e);
                return vec![];
            }
        };

        match self.env.parse_certificates(&bytes) {
            Ok(certs) => {
                info!("Retrieved {} certificate(s) from {}", certs.len(), uri);
                cache.insert(uri, certs.clone());
                certs
            }
            Err(e) => {
                debug!("Failed to parse certificates retrieved from {}: {}", uri, e);
                vec![]
            }
        }
    }
}

fn crl_ca_issuer_uris(crl: &CertificateList) -> Vec<String> {
    let mut uris = vec![];
    let exts = match &crl.tbs_cert_list.crl_extensions {
        Some(exts) => exts,
        None => return uris,
    };
    for ext in exts.iter().filter(|e| e.extn_id == ID_PE_AUTHORITY_INFO_ACCESS) {
        if let Ok(aia) = AuthorityInfoAccessSyntax::from_der(ext.extn_value.as_bytes()) {
            for ad in aia.0 {
                if ad.access_method == ID_AD_CA_ISSUERS {
                    if let GeneralName::UniformResourceIdentifier(uri) = ad.access_location {
                        let s = uri.to_string();
                        if !uris.contains(&s) {
                            uris.push(s);
                        }
                    }
                }
            }
        }
    }
    uris
}
