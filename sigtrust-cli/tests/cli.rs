use std::fs;
use std::path::Path;
use std::process::Command;
use std::str::FromStr;
use std::time::Duration;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use x509_cert::der::asn1::{BitString, GeneralizedTime};
use x509_cert::der::oid::ObjectIdentifier;
use x509_cert::der::Encode;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::time::{Time, Validity};
use x509_cert::{Certificate, TbsCertificate, Version};

const NOW: u64 = 1_700_000_000;

fn time(secs: u64) -> Time {
    Time::GeneralTime(GeneralizedTime::from_unix_duration(Duration::from_secs(secs)).unwrap())
}

/// Self-signed certificate with a placeholder key and signature, enough to be matched against
/// the trusted set
fn write_cert(path: &Path, subject: &str) {
    let alg = AlgorithmIdentifierOwned {
        oid: ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11"),
        parameters: None,
    };
    let name = Name::from_str(subject).unwrap();
    let cert = Certificate {
        tbs_certificate: TbsCertificate {
            version: Version::V3,
            serial_number: SerialNumber::new(&[1]).unwrap(),
            signature: alg.clone(),
            issuer: name.clone(),
            validity: Validity {
                not_before: time(NOW - 86_400),
                not_after: time(NOW + 86_400),
            },
            subject: name,
            subject_public_key_info: SubjectPublicKeyInfoOwned {
                algorithm: AlgorithmIdentifierOwned {
                    oid: ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1"),
                    parameters: None,
                },
                subject_public_key: BitString::from_bytes(&[1; 16]).unwrap(),
            },
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: None,
        },
        signature_algorithm: alg,
        signature: BitString::from_bytes(&[1; 16]).unwrap(),
    };
    fs::write(path, cert.to_der().unwrap()).unwrap();
}

#[test]
fn no_args_prints_help() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("sigtrust")?;
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("--trust-anchor-folder"));
    Ok(())
}

#[test]
fn missing_target_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("sigtrust")?;
    cmd.arg("--never-fetch")
        .arg("--target")
        .arg("tests/does-not-exist.der");
    cmd.assert()
        .code(2)
        .stdout(predicate::str::contains("Validation could not be performed"));
    Ok(())
}

#[test]
fn trusted_target_is_valid() -> Result<(), Box<dyn std::error::Error>> {
    let tas = tempfile::tempdir()?;
    let out = tempfile::tempdir()?;
    let target = tas.path().join("root.der");
    write_cert(&target, "CN=CLI Root,O=Example");
    let report = out.path().join("report.json");

    let mut cmd = Command::cargo_bin("sigtrust")?;
    cmd.arg("--never-fetch")
        .arg("--trust-anchor-folder")
        .arg(tas.path())
        .arg("--target")
        .arg(&target)
        .arg("--time-of-interest")
        .arg(NOW.to_string())
        .arg("--report")
        .arg(&report);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("is trusted, revocation checks not required"))
        .stdout(predicate::str::contains("Validation result: VALID"));

    let json = fs::read_to_string(&report)?;
    assert!(json.contains("CN=CLI Root,O=Example"));
    Ok(())
}

#[test]
fn untrusted_target_is_not_valid() -> Result<(), Box<dyn std::error::Error>> {
    let tas = tempfile::tempdir()?;
    let other = tempfile::tempdir()?;
    write_cert(&tas.path().join("root.der"), "CN=CLI Root,O=Example");
    let target = other.path().join("stranger.der");
    write_cert(&target, "CN=CLI Stranger,O=Example");

    let mut cmd = Command::cargo_bin("sigtrust")?;
    cmd.arg("--never-fetch")
        .arg("--trust-anchor-folder")
        .arg(tas.path())
        .arg("--target")
        .arg(&target)
        .arg("--time-of-interest")
        .arg(NOW.to_string());
    cmd.assert()
        .code(1)
        .stdout(predicate::str::contains("Validation result: VALID").not());
    Ok(())
}

#[test]
fn unknown_key_usage_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let tas = tempfile::tempdir()?;
    let target = tas.path().join("root.der");
    write_cert(&target, "CN=CLI Root,O=Example");

    let mut cmd = Command::cargo_bin("sigtrust")?;
    cmd.arg("--never-fetch")
        .arg("--target")
        .arg(&target)
        .arg("--required-key-usage")
        .arg("signEverything");
    cmd.assert()
        .code(2)
        .stdout(predicate::str::contains("Unrecognized key usage"));
    Ok(())
}

#[test]
fn crl_folder_is_read_recursively() -> Result<(), Box<dyn std::error::Error>> {
    let tas = tempfile::tempdir()?;
    let crls = tempfile::tempdir()?;
    let target = tas.path().join("root.der");
    write_cert(&target, "CN=CLI Root,O=Example");
    let nested = crls.path().join("dss").join("crls");
    fs::create_dir_all(&nested)?;
    fs::write(crls.path().join("top.crl"), [0x30, 0x00])?;
    fs::write(nested.join("nested.crl"), [0x30, 0x03, 0x02, 0x01, 0x01])?;
    fs::write(nested.join("readme.txt"), b"not a crl")?;

    let mut cmd = Command::cargo_bin("sigtrust")?;
    cmd.arg("--never-fetch")
        .arg("--trust-anchor-folder")
        .arg(tas.path())
        .arg("--crl-folder")
        .arg(crls.path())
        .arg("--target")
        .arg(&target)
        .arg("--time-of-interest")
        .arg(NOW.to_string());
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Read 2 CRLs from"));
    Ok(())
}
