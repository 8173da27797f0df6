mod common;

use std::fs;

use common::*;
use der::asn1::{Null, ObjectIdentifier};
use der::pem::LineEnding;
use der::{Encode, EncodePem};
use hex_literal::hex;
use sigtrust::*;

#[test]
fn populate_from_folders() {
    let pki = TestPki::new();
    let tas = tempfile::tempdir().unwrap();
    let cas = tempfile::tempdir().unwrap();

    fs::write(tas.path().join("root.der"), pki.root.to_der().unwrap()).unwrap();
    let nested = cas.path().join("nested");
    fs::create_dir(&nested).unwrap();
    fs::write(
        nested.join("intermediate.pem"),
        pki.intermediate.to_pem(LineEnding::LF).unwrap(),
    )
    .unwrap();
    // the root again, already trusted
    fs::write(cas.path().join("root.crt"), pki.root.to_der().unwrap()).unwrap();
    // skipped: wrong extension, then unparseable
    fs::write(cas.path().join("signer.txt"), pki.signer.to_der().unwrap()).unwrap();
    fs::write(cas.path().join("junk.cer"), b"not a certificate").unwrap();

    let mut store = CertificateStore::new();
    store
        .populate_from_folders(
            &DefaultCertificateParser,
            tas.path().to_str(),
            cas.path().to_str(),
        )
        .unwrap();

    assert_eq!(1, store.trusted_len());
    assert_eq!(1, store.known_len());
    assert!(store.is_trusted(&pki.root));
    assert!(store.is_known(&pki.intermediate));
    assert!(!store.is_known(&pki.root));
    assert!(!store.is_known(&pki.signer));
}

#[test]
fn missing_folder_is_reported() {
    let mut store = CertificateStore::new();
    assert_eq!(
        Err(Error::NotFound),
        store.populate_from_folders(&DefaultCertificateParser, Some("tests/no-such-folder"), None)
    );
}

#[test]
fn trusted_and_known_are_disjoint() {
    let pki = TestPki::new();
    let mut store = CertificateStore::new();
    store.add_known_certificates(vec![pki.root.clone(), pki.intermediate.clone()]);
    assert_eq!(2, store.known_len());

    store.add_trusted_certificates(vec![pki.root.clone()]);
    assert!(store.is_trusted(&pki.root));
    assert!(!store.is_known(&pki.root));
    assert_eq!(1, store.known_len());

    // duplicates are ignored
    store.add_known_certificates(vec![pki.intermediate.clone(), pki.root.clone()]);
    assert_eq!(1, store.known_len());
    assert_eq!(1, store.trusted_len());
}

#[test]
fn scoped_trust() {
    let pki = TestPki::new();
    let responder = CertBuilder::new("CN=Test Responder,O=Example", 60)
        .issued_by(&pki.intermediate)
        .build();
    let mut store = CertificateStore::new();
    store.add_trusted_certificates(vec![pki.root.clone()]);
    store.add_trusted_certificates_for(CertificateSource::OcspIssuer, vec![responder.clone()]);

    assert!(store.is_trusted_for(&responder, CertificateSource::OcspIssuer));
    assert!(!store.is_trusted_for(&responder, CertificateSource::CertIssuer));
    assert!(!store.is_trusted(&responder));
    assert!(store.is_trusted_for(&pki.root, CertificateSource::CrlIssuer));
    assert_eq!(2, store.trusted_len());

    // scoped trust still keeps the certificate out of the known set
    store.add_known_certificates(vec![responder.clone()]);
    assert_eq!(0, store.known_len());
    assert_eq!(
        vec![&responder],
        store.get_trusted_certificates_by_name(&responder.tbs_certificate.subject)
    );
}

#[test]
fn lookup_by_name_lists_trusted_first() {
    let trusted = CertBuilder::new("CN=Shared Name CA", 70).build();
    let known = CertBuilder::new("CN=Shared Name CA", 71).build();
    let mut store = CertificateStore::new();
    store.add_known_certificates(vec![known.clone()]);
    store.add_trusted_certificates(vec![trusted.clone()]);

    assert_eq!(
        vec![&trusted, &known],
        store.get_certificates_by_name(&trusted.tbs_certificate.subject)
    );
    let other = CertBuilder::new("CN=Someone Else", 72).build();
    assert!(store
        .get_certificates_by_name(&other.tbs_certificate.subject)
        .is_empty());
}

#[test]
fn dynamic_extension_compares_encoded_value() {
    let oid = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.99999.1");
    let cert = CertBuilder::new("CN=Custom Extension", 80)
        .extension(extension(oid, false, &Null))
        .build();

    let required = CertificateExtension::Dynamic(DynamicExtension::new(oid, hex!("0500").to_vec()));
    assert!(required.matches(&cert));

    let different =
        CertificateExtension::Dynamic(DynamicExtension::new(oid, hex!("0101ff").to_vec()));
    assert!(!different.matches(&cert));
    assert_eq!(
        "expected 1.3.6.1.4.1.99999.1: 3 byte value, found 2 byte value",
        different.describe_mismatch(&cert)
    );

    let absent = CertBuilder::new("CN=No Extension", 81).build();
    assert!(!required.matches(&absent));
    let optional = CertificateExtension::Dynamic(
        DynamicExtension::new(oid, hex!("0500").to_vec()).with_absent_result(true),
    );
    assert!(optional.matches(&absent));
}
