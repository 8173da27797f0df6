//! Certificate extension predicates, i.e., checks of the form "does this certificate carry
//! extension X with value Y", used for globally required and certificate specific requirements.
//!
//! Each predicate is identified by an extension OID, carries the expected value and a policy for
//! the case where the extension is absent. Predicates are serializable so they can appear in a
//! [`SignatureValidationProperties`](crate::SignatureValidationProperties) JSON file.

use flagset::FlagSet;
use serde::{Deserialize, Serialize};

use const_oid::db::rfc5912::{
    ID_CE_BASIC_CONSTRAINTS, ID_CE_EXT_KEY_USAGE, ID_CE_KEY_USAGE, ID_KP_OCSP_SIGNING,
    ID_KP_TIME_STAMPING,
};
use der::asn1::ObjectIdentifier;
use x509_cert::ext::pkix::{BasicConstraints, ExtendedKeyUsage, KeyUsage, KeyUsages};
use x509_cert::Certificate;

use crate::util::cert_utilities::{decode_extension, get_extension, oid_lookup};
use crate::util::error::{Error, Result};

/// anyExtendedKeyUsage, which satisfies any extended key usage requirement
pub const ANY_EXTENDED_KEY_USAGE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.37.0");

const NOTHING_FOUND: &str = "nothing found";

mod oid_format {
    use core::str::FromStr;

    use der::asn1::ObjectIdentifier;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(oid: &ObjectIdentifier, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&oid.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<ObjectIdentifier, D::Error> {
        let s = String::deserialize(d)?;
        ObjectIdentifier::from_str(&s).map_err(|e| D::Error::custom(format!("{s}: {e}")))
    }

    pub mod vec {
        use super::*;
        use serde::ser::SerializeSeq;

        pub fn serialize<S: Serializer>(
            oids: &[ObjectIdentifier],
            s: S,
        ) -> Result<S::Ok, S::Error> {
            let mut seq = s.serialize_seq(Some(oids.len()))?;
            for oid in oids {
                seq.serialize_element(&oid.to_string())?;
            }
            seq.end()
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Vec<ObjectIdentifier>, D::Error> {
            let strings = Vec::<String>::deserialize(d)?;
            strings
                .iter()
                .map(|s| {
                    ObjectIdentifier::from_str(s).map_err(|e| D::Error::custom(format!("{s}: {e}")))
                })
                .collect()
        }
    }
}

/// RFC 5280 name of a key usage bit
pub fn key_usage_name(ku: KeyUsages) -> &'static str {
    match ku {
        KeyUsages::DigitalSignature => "digitalSignature",
        KeyUsages::NonRepudiation => "nonRepudiation",
        KeyUsages::KeyEncipherment => "keyEncipherment",
        KeyUsages::DataEncipherment => "dataEncipherment",
        KeyUsages::KeyAgreement => "keyAgreement",
        KeyUsages::KeyCertSign => "keyCertSign",
        KeyUsages::CRLSign => "cRLSign",
        KeyUsages::EncipherOnly => "encipherOnly",
        KeyUsages::DecipherOnly => "decipherOnly",
    }
}

fn key_usage_from_name(name: &str) -> Option<KeyUsages> {
    let ku = match name {
        "digitalSignature" => KeyUsages::DigitalSignature,
        "nonRepudiation" | "contentCommitment" => KeyUsages::NonRepudiation,
        "keyEncipherment" => KeyUsages::KeyEncipherment,
        "dataEncipherment" => KeyUsages::DataEncipherment,
        "keyAgreement" => KeyUsages::KeyAgreement,
        "keyCertSign" => KeyUsages::KeyCertSign,
        "cRLSign" => KeyUsages::CRLSign,
        "encipherOnly" => KeyUsages::EncipherOnly,
        "decipherOnly" => KeyUsages::DecipherOnly,
        _ => return None,
    };
    Some(ku)
}

fn key_usage_names(usages: FlagSet<KeyUsages>) -> String {
    usages
        .into_iter()
        .map(key_usage_name)
        .collect::<Vec<&str>>()
        .join(", ")
}

/// Requires that every requested key usage bit is set. Additional bits are permitted.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct KeyUsageExtension {
    /// Required bits, as the `u16` representation of `FlagSet<KeyUsages>`
    usages: u16,
    /// Result when the certificate has no key usage extension
    #[serde(default)]
    absent_passes: bool,
}

impl KeyUsageExtension {
    /// Creates a predicate from a bitmask. A missing extension fails the predicate.
    pub fn new(usages: impl Into<FlagSet<KeyUsages>>) -> Self {
        KeyUsageExtension {
            usages: usages.into().bits(),
            absent_passes: false,
        }
    }

    /// Creates a predicate from RFC 5280 key usage names, i.e., "digitalSignature".
    pub fn from_names(names: &[&str]) -> Result<Self> {
        let mut usages = FlagSet::<KeyUsages>::default();
        for name in names {
            match key_usage_from_name(name) {
                Some(ku) => usages |= ku,
                None => return Err(Error::ParseError),
            }
        }
        Ok(Self::new(usages))
    }

    /// Sets the result returned when the certificate lacks a key usage extension
    pub fn with_absent_result(mut self, absent_passes: bool) -> Self {
        self.absent_passes = absent_passes;
        self
    }

    /// The required usages
    pub fn usages(&self) -> FlagSet<KeyUsages> {
        FlagSet::<KeyUsages>::new_truncated(self.usages)
    }

    fn actual(&self, cert: &Certificate) -> Option<FlagSet<KeyUsages>> {
        decode_extension::<KeyUsage>(cert, &ID_CE_KEY_USAGE).map(|ku| ku.0)
    }
}

/// Requires that every listed key purpose is present, or that anyExtendedKeyUsage is present.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ExtendedKeyUsageExtension {
    #[serde(with = "oid_format::vec")]
    purposes: Vec<ObjectIdentifier>,
    #[serde(default)]
    absent_passes: bool,
}

impl ExtendedKeyUsageExtension {
    /// Creates a predicate requiring the given key purposes. A missing extension fails the predicate.
    pub fn new(purposes: Vec<ObjectIdentifier>) -> Self {
        ExtendedKeyUsageExtension {
            purposes,
            absent_passes: false,
        }
    }

    /// Sets the result returned when the certificate lacks an extended key usage extension
    pub fn with_absent_result(mut self, absent_passes: bool) -> Self {
        self.absent_passes = absent_passes;
        self
    }
}

/// Requires the basicConstraints cA flag to equal the configured value. An absent extension is
/// treated as cA false.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct BasicConstraintsExtension {
    ca: bool,
}

impl BasicConstraintsExtension {
    /// Creates a predicate requiring the given cA value
    pub fn new(ca: bool) -> Self {
        BasicConstraintsExtension { ca }
    }
}

/// Requires an arbitrary extension to be present with exactly the given DER-encoded value.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DynamicExtension {
    #[serde(with = "oid_format")]
    oid: ObjectIdentifier,
    value: Vec<u8>,
    #[serde(default)]
    absent_passes: bool,
}

impl DynamicExtension {
    /// Creates a predicate comparing the extnValue of the given extension with `value`
    pub fn new(oid: ObjectIdentifier, value: Vec<u8>) -> Self {
        DynamicExtension {
            oid,
            value,
            absent_passes: false,
        }
    }

    /// Sets the result returned when the certificate lacks the extension
    pub fn with_absent_result(mut self, absent_passes: bool) -> Self {
        self.absent_passes = absent_passes;
        self
    }
}

/// A required certificate extension
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum CertificateExtension {
    /// See [`KeyUsageExtension`]
    KeyUsage(KeyUsageExtension),
    /// See [`ExtendedKeyUsageExtension`]
    ExtendedKeyUsage(ExtendedKeyUsageExtension),
    /// See [`BasicConstraintsExtension`]
    BasicConstraints(BasicConstraintsExtension),
    /// See [`DynamicExtension`]
    Dynamic(DynamicExtension),
}

impl CertificateExtension {
    /// Shorthand for a key usage requirement
    pub fn key_usage(usages: impl Into<FlagSet<KeyUsages>>) -> Self {
        CertificateExtension::KeyUsage(KeyUsageExtension::new(usages))
    }

    /// Shorthand for an extended key usage requirement
    pub fn extended_key_usage(purposes: Vec<ObjectIdentifier>) -> Self {
        CertificateExtension::ExtendedKeyUsage(ExtendedKeyUsageExtension::new(purposes))
    }

    /// Shorthand for a basicConstraints cA requirement
    pub fn basic_constraints(ca: bool) -> Self {
        CertificateExtension::BasicConstraints(BasicConstraintsExtension::new(ca))
    }

    /// Requirement for id-kp-OCSPSigning
    pub fn ocsp_signing() -> Self {
        Self::extended_key_usage(vec![ID_KP_OCSP_SIGNING])
    }

    /// Requirement for id-kp-timeStamping
    pub fn time_stamping() -> Self {
        Self::extended_key_usage(vec![ID_KP_TIME_STAMPING])
    }

    /// OID of the extension this predicate examines
    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            CertificateExtension::KeyUsage(_) => ID_CE_KEY_USAGE,
            CertificateExtension::ExtendedKeyUsage(_) => ID_CE_EXT_KEY_USAGE,
            CertificateExtension::BasicConstraints(_) => ID_CE_BASIC_CONSTRAINTS,
            CertificateExtension::Dynamic(d) => d.oid,
        }
    }

    /// `matches` returns true if the certificate satisfies the predicate
    pub fn matches(&self, cert: &Certificate) -> bool {
        match self {
            CertificateExtension::KeyUsage(ku) => match ku.actual(cert) {
                Some(actual) => actual.contains(ku.usages()),
                None => ku.absent_passes,
            },
            CertificateExtension::ExtendedKeyUsage(eku) => {
                match decode_extension::<ExtendedKeyUsage>(cert, &ID_CE_EXT_KEY_USAGE) {
                    Some(actual) => {
                        actual.0.contains(&ANY_EXTENDED_KEY_USAGE)
                            || eku.purposes.iter().all(|p| actual.0.contains(p))
                    }
                    None => eku.absent_passes,
                }
            }
            CertificateExtension::BasicConstraints(bc) => {
                match decode_extension::<BasicConstraints>(cert, &ID_CE_BASIC_CONSTRAINTS) {
                    Some(actual) => actual.ca == bc.ca,
                    None => !bc.ca,
                }
            }
            CertificateExtension::Dynamic(d) => match get_extension(cert, &d.oid) {
                Some(ext) => ext.extn_value.as_bytes() == d.value.as_slice(),
                None => d.absent_passes,
            },
        }
    }

    /// `message` describes what the predicate expects, i.e., "keyUsage: digitalSignature".
    pub fn message(&self) -> String {
        let expected = match self {
            CertificateExtension::KeyUsage(ku) => key_usage_names(ku.usages()),
            CertificateExtension::ExtendedKeyUsage(eku) => eku
                .purposes
                .iter()
                .map(oid_lookup)
                .collect::<Vec<String>>()
                .join(", "),
            CertificateExtension::BasicConstraints(bc) => format!("cA={}", bc.ca),
            CertificateExtension::Dynamic(d) => format!("{} byte value", d.value.len()),
        };
        format!("{}: {}", oid_lookup(&self.oid()), expected)
    }

    /// `actual` describes what the certificate carries for the examined extension, or
    /// "nothing found" when the extension is absent.
    pub fn actual(&self, cert: &Certificate) -> String {
        match self {
            CertificateExtension::KeyUsage(ku) => match ku.actual(cert) {
                Some(actual) => key_usage_names(actual),
                None => NOTHING_FOUND.to_string(),
            },
            CertificateExtension::ExtendedKeyUsage(_) => {
                match decode_extension::<ExtendedKeyUsage>(cert, &ID_CE_EXT_KEY_USAGE) {
                    Some(actual) => actual
                        .0
                        .iter()
                        .map(oid_lookup)
                        .collect::<Vec<String>>()
                        .join(", "),
                    None => NOTHING_FOUND.to_string(),
                }
            }
            CertificateExtension::BasicConstraints(_) => {
                match decode_extension::<BasicConstraints>(cert, &ID_CE_BASIC_CONSTRAINTS) {
                    Some(actual) => format!("cA={}", actual.ca),
                    None => NOTHING_FOUND.to_string(),
                }
            }
            CertificateExtension::Dynamic(d) => match get_extension(cert, &d.oid) {
                Some(ext) => format!("{} byte value", ext.extn_value.as_bytes().len()),
                None => NOTHING_FOUND.to_string(),
            },
        }
    }

    /// Expected and actual values together, for use in report items
    pub fn describe_mismatch(&self, cert: &Certificate) -> String {
        format!("expected {}, found {}", self.message(), self.actual(cert))
    }
}

#[test]
fn key_usage_names_round_trip() {
    let ku = KeyUsageExtension::from_names(&["digitalSignature", "cRLSign"]).unwrap();
    assert!(ku.usages().contains(KeyUsages::DigitalSignature));
    assert!(ku.usages().contains(KeyUsages::CRLSign));
    assert!(!ku.usages().contains(KeyUsages::KeyCertSign));
    assert!(KeyUsageExtension::from_names(&["signEverything"]).is_err());

    let ext = CertificateExtension::KeyUsage(ku);
    assert_eq!("keyUsage: digitalSignature, cRLSign", ext.message());
}

#[test]
fn extension_serde() {
    let exts = vec![
        CertificateExtension::key_usage(KeyUsages::KeyCertSign),
        CertificateExtension::ocsp_signing(),
        CertificateExtension::basic_constraints(true),
        CertificateExtension::Dynamic(DynamicExtension::new(
            ObjectIdentifier::new_unwrap("1.2.3.4"),
            vec![5, 0],
        )),
    ];
    let json = serde_json::to_string(&exts).unwrap();
    assert!(json.contains("1.3.6.1.5.5.7.3.9"));
    let back: Vec<CertificateExtension> = serde_json::from_str(&json).unwrap();
    assert_eq!(exts, back);
}
