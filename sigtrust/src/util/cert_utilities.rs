//! Utility functions that support chain completion, certificate checks and report messages

use lazy_static::lazy_static;
use log::error;
use regex::Regex;

use const_oid::db::rfc5912::*;
use const_oid::db::rfc6960::ID_PKIX_OCSP_NOCHECK;
use der::asn1::{Ia5String, PrintableString, Utf8StringRef};
use der::{asn1::ObjectIdentifier, Decode, Tagged};
use subtle_encoding::hex;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::ext::pkix::{
    name::{DistributionPointName, GeneralName},
    AuthorityInfoAccessSyntax, CrlDistributionPoints,
};
use x509_cert::ext::Extension;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::Certificate;

use crate::util::time_of_interest::TimeOfInterest;

lazy_static! {
    static ref WHITESPACE: Option<Regex> = Regex::new(r"\s+").ok();
}

/// ETSI EN 319 412-1 id-etsi-ext-valassured-ST-certs, marks a short-term certificate for which no
/// revocation information is published.
pub const ID_ETSI_EXT_VALASSURED_ST_CERTS: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("0.4.0.194121.2.1");

/// Reasons a certificate is outside its validity period relative to a time of interest
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ValidityPeriodError {
    /// not_before is after the time of interest
    NotYetValid,
    /// not_after is before the time of interest
    Expired,
}

/// `name_to_string` returns the RFC 4514 rendering of a Name. This string serves as the identity key
/// for [`CertificateStore`](crate::CertificateStore) maps and report items.
pub fn name_to_string(name: &Name) -> String {
    name.to_string()
}

/// `serial_to_hex` returns the serial number of a certificate as an upper case hex string
pub fn serial_to_hex(serial: &SerialNumber) -> String {
    String::from_utf8(hex::encode_upper(serial.as_bytes())).unwrap_or_default()
}

/// get_value_from_rdn returns the value from AttributeTypeAndValue as a string for use in comparing
/// values where leading whitespace may be a factor
fn get_value_from_rdn(atav: &AttributeTypeAndValue) -> Option<String> {
    match atav.value.tag() {
        der::Tag::PrintableString => atav
            .value
            .decode_as()
            .ok()
            .map(|s: PrintableString| s.to_string()),
        der::Tag::Utf8String => atav
            .value
            .decode_as()
            .ok()
            .map(|s: Utf8StringRef<'_>| s.to_string()),
        der::Tag::Ia5String => atav
            .value
            .decode_as()
            .ok()
            .map(|s: Ia5String| s.to_string()),
        _ => None,
    }
}

fn normalize(value: &str) -> String {
    let lower = value.trim().to_lowercase();
    match WHITESPACE.as_ref() {
        Some(re) => re.replace_all(lower.as_str(), " ").to_string(),
        None => lower,
    }
}

/// [`compare_names`] compares two Name values returning true if they match and false otherwise.
/// Attribute values that differ only by case or runs of whitespace are treated as equal.
pub fn compare_names(left: &Name, right: &Name) -> bool {
    if left == right {
        return true;
    }
    if left.0.len() != right.0.len() {
        return false;
    }

    for (lrdn, rrdn) in left.0.iter().zip(right.0.iter()) {
        if lrdn.0.len() != rrdn.0.len() {
            return false;
        }
        if lrdn == rrdn {
            continue;
        }
        for (l, r) in lrdn.0.iter().zip(rrdn.0.iter()) {
            if l.oid != r.oid {
                return false;
            }
            let (l_val, r_val) = match (get_value_from_rdn(l), get_value_from_rdn(r)) {
                (Some(l_val), Some(r_val)) => (l_val, r_val),
                _ => {
                    if l.value != r.value {
                        return false;
                    }
                    continue;
                }
            };
            if normalize(&l_val) != normalize(&r_val) {
                return false;
            }
        }
    }
    true
}

/// `is_self_issued` returns true if the subject field in the certificate is the same as the issuer
/// field.
pub fn is_self_issued(cert: &Certificate) -> bool {
    compare_names(&cert.tbs_certificate.issuer, &cert.tbs_certificate.subject)
}

/// `get_extension` returns the first extension with the given OID, if present
pub fn get_extension<'a>(cert: &'a Certificate, oid: &ObjectIdentifier) -> Option<&'a Extension> {
    cert.tbs_certificate
        .extensions
        .as_ref()
        .and_then(|exts| exts.iter().find(|e| e.extn_id == *oid))
}

/// `decode_extension` decodes the value of the extension with the given OID. A malformed extension
/// is logged and treated as absent.
pub fn decode_extension<'a, T: Decode<'a>>(
    cert: &'a Certificate,
    oid: &ObjectIdentifier,
) -> Option<T> {
    let ext = get_extension(cert, oid)?;
    match T::from_der(ext.extn_value.as_bytes()) {
        Ok(v) => Some(v),
        Err(e) => {
            error!(
                "Failed to parse {} extension in certificate issued to {}: {}",
                oid_lookup(oid),
                name_to_string(&cert.tbs_certificate.subject),
                e
            );
            None
        }
    }
}

/// `has_ocsp_no_check` returns true when the id-pkix-ocsp-nocheck extension is present
pub fn has_ocsp_no_check(cert: &Certificate) -> bool {
    get_extension(cert, &ID_PKIX_OCSP_NOCHECK).is_some()
}

/// `has_validity_assured_short_term` returns true when the ETSI valassured-ST-certs extension is present
pub fn has_validity_assured_short_term(cert: &Certificate) -> bool {
    get_extension(cert, &ID_ETSI_EXT_VALASSURED_ST_CERTS).is_some()
}

fn collect_aia_uris(cert: &Certificate, access_method: ObjectIdentifier) -> Vec<String> {
    let mut uris = vec![];
    if let Some(aia) =
        decode_extension::<AuthorityInfoAccessSyntax>(cert, &ID_PE_AUTHORITY_INFO_ACCESS)
    {
        for ad in &aia.0 {
            if access_method == ad.access_method {
                if let GeneralName::UniformResourceIdentifier(uri) = &ad.access_location {
                    let s = uri.to_string();
                    if !uris.contains(&s) {
                        uris.push(s);
                    }
                }
            }
        }
    }
    uris
}

/// `collect_ca_issuer_uris` collects unique id-ad-caIssuers URIs from the AIA extension of the
/// presented certificate.
pub fn collect_ca_issuer_uris(cert: &Certificate) -> Vec<String> {
    collect_aia_uris(cert, ID_AD_CA_ISSUERS)
}

/// `collect_ocsp_uris` collects unique id-ad-ocsp URIs from the AIA extension of the presented
/// certificate.
pub fn collect_ocsp_uris(cert: &Certificate) -> Vec<String> {
    collect_aia_uris(cert, ID_AD_OCSP)
}

/// `collect_crl_dp_uris` collects unique full name URIs from the CRL distribution points extension
/// of the presented certificate.
pub fn collect_crl_dp_uris(cert: &Certificate) -> Vec<String> {
    let mut uris = vec![];
    if let Some(crl_dps) =
        decode_extension::<CrlDistributionPoints>(cert, &ID_CE_CRL_DISTRIBUTION_POINTS)
    {
        for dp in &crl_dps.0 {
            if let Some(DistributionPointName::FullName(gns)) = &dp.distribution_point {
                for gn in gns {
                    if let GeneralName::UniformResourceIdentifier(uri) = gn {
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

/// `valid_at_time` evaluates the not_before and not_after fields of the given certificate relative
/// to the time of interest. It returns the number of seconds left to live if the certificate is valid
/// or an error indicating which field failed. The not_before field is evaluated first.
pub fn valid_at_time(
    cert: &Certificate,
    toi: &TimeOfInterest,
) -> core::result::Result<u64, ValidityPeriodError> {
    let validity = &cert.tbs_certificate.validity;
    if *toi < validity.not_before {
        return Err(ValidityPeriodError::NotYetValid);
    }
    if *toi > validity.not_after {
        return Err(ValidityPeriodError::Expired);
    }
    Ok(validity
        .not_after
        .to_unix_duration()
        .as_secs()
        .saturating_sub(toi.as_unix_secs()))
}

/// `oid_lookup` takes an ObjectIdentifier and returns a friendly name for extension and key purpose
/// OIDs that appear in report messages, or the dotted form for anything else.
pub fn oid_lookup(oid: &ObjectIdentifier) -> String {
    let name = if *oid == ID_CE_KEY_USAGE {
        "keyUsage"
    } else if *oid == ID_CE_EXT_KEY_USAGE {
        "extKeyUsage"
    } else if *oid == ID_CE_BASIC_CONSTRAINTS {
        "basicConstraints"
    } else if *oid == ID_CE_CERTIFICATE_POLICIES {
        "certificatePolicies"
    } else if *oid == ID_CE_CRL_DISTRIBUTION_POINTS {
        "cRLDistributionPoints"
    } else if *oid == ID_CE_ISSUING_DISTRIBUTION_POINT {
        "issuingDistributionPoint"
    } else if *oid == ID_CE_DELTA_CRL_INDICATOR {
        "deltaCRLIndicator"
    } else if *oid == ID_CE_SUBJECT_KEY_IDENTIFIER {
        "subjectKeyIdentifier"
    } else if *oid == ID_CE_AUTHORITY_KEY_IDENTIFIER {
        "authorityKeyIdentifier"
    } else if *oid == ID_PE_AUTHORITY_INFO_ACCESS {
        "authorityInfoAccess"
    } else if *oid == ID_PKIX_OCSP_NOCHECK {
        "ocspNoCheck"
    } else if *oid == ID_ETSI_EXT_VALASSURED_ST_CERTS {
        "valassured-ST-certs"
    } else if *oid == ID_KP_OCSP_SIGNING {
        "OCSPSigning"
    } else if *oid == ID_KP_TIME_STAMPING {
        "timeStamping"
    } else if *oid == ID_KP_CODE_SIGNING {
        "codeSigning"
    } else if *oid == ID_KP_EMAIL_PROTECTION {
        "emailProtection"
    } else {
        return oid.to_string();
    };
    name.to_string()
}

#[test]
fn compare_names_tolerates_case_and_whitespace() {
    use core::str::FromStr;
    let l = Name::from_str("CN=Test  Signing CA,O=Example").unwrap();
    let r = Name::from_str("CN=test signing ca,O=EXAMPLE").unwrap();
    assert!(compare_names(&l, &r));

    let other = Name::from_str("CN=Other CA,O=Example").unwrap();
    assert!(!compare_names(&l, &other));

    let shorter = Name::from_str("CN=Test Signing CA").unwrap();
    assert!(!compare_names(&l, &shorter));
}

#[test]
fn oid_lookup_test() {
    assert_eq!("keyUsage", oid_lookup(&ID_CE_KEY_USAGE));
    assert_eq!("ocspNoCheck", oid_lookup(&ID_PKIX_OCSP_NOCHECK));
    assert_eq!("1.2.3.4", oid_lookup(&ObjectIdentifier::new_unwrap("1.2.3.4")));
}
