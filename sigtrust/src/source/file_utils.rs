//! Utility functions for reading certificates and revocation evidence from the file system

use std::ffi::OsStr;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use log::{debug, error};
use walkdir::WalkDir;
use x509_cert::Certificate;

use crate::environment::validation_environment_traits::CertificateParser;
use crate::util::error::{Error, Result};

/// `get_file_as_byte_vec` takes a Path containing a file name and returns a vector of bytes containing
/// the contents of that file or an [Error::StdIoError].
pub fn get_file_as_byte_vec(filename: &Path) -> Result<Vec<u8>> {
    let mut f = File::open(filename)?;
    let mut buffer = vec![];
    f.read_to_end(&mut buffer)?;
    Ok(buffer)
}

/// File extensions read by [`cert_folder_to_vec`]
pub const CERTIFICATE_FILE_EXTENSIONS: [&str; 5] = ["der", "crt", "cer", "pem", "p7c"];

/// File extensions read as CRLs by [`evidence_folder_to_vec`] callers
pub const CRL_FILE_EXTENSIONS: [&str; 2] = ["crl", "der"];

/// File extensions read as OCSP responses by [`evidence_folder_to_vec`] callers
pub const OCSP_FILE_EXTENSIONS: [&str; 3] = ["ocsp", "resp", "der"];

/// Walks `dir`, including sub-folders, and returns the paths of files whose extension is one of
/// `file_exts`
fn files_in_folder(dir: &str, file_exts: &[&str]) -> Result<Vec<PathBuf>> {
    if !Path::is_dir(Path::new(dir)) {
        error!("{} does not exist or is not a directory", dir);
        return Err(Error::NotFound);
    }

    let mut paths = vec![];
    for entry in WalkDir::new(dir) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                error!("Failed to read entry beneath {}: {}", dir, e);
                continue;
            }
        };
        if entry.file_type().is_dir() {
            continue;
        }
        match entry.path().extension().and_then(OsStr::to_str) {
            Some(ext) if file_exts.contains(&ext) => paths.push(entry.into_path()),
            _ => debug!("Ignored {}", entry.path().display()),
        }
    }
    Ok(paths)
}

/// `cert_folder_to_vec` walks the given folder, including sub-folders, and returns the certificates
/// parsed from files with der, crt, cer, pem or p7c extensions. Files that fail to parse are logged
/// and skipped.
pub fn cert_folder_to_vec(
    parser: &dyn CertificateParser,
    certs_dir: &str,
) -> Result<Vec<Certificate>> {
    let mut certs: Vec<Certificate> = vec![];
    for path in files_in_folder(certs_dir, &CERTIFICATE_FILE_EXTENSIONS)? {
        let buffer = get_file_as_byte_vec(&path)?;
        match parser.parse_certificates(&buffer) {
            Ok(parsed) => {
                for cert in parsed {
                    if !certs.contains(&cert) {
                        certs.push(cert);
                    }
                }
            }
            Err(e) => {
                debug!("Ignored {} as it could not be parsed: {}", path.display(), e);
            }
        }
    }
    Ok(certs)
}

/// `evidence_folder_to_vec` walks the given folder, including sub-folders, and returns the contents
/// of files with one of the given extensions, i.e., [`CRL_FILE_EXTENSIONS`]. Contents are not parsed
/// here so that malformed evidence surfaces in the validation report.
pub fn evidence_folder_to_vec(evidence_dir: &str, file_exts: &[&str]) -> Result<Vec<Vec<u8>>> {
    let mut retval = vec![];
    for path in files_in_folder(evidence_dir, file_exts)? {
        let buffer = get_file_as_byte_vec(&path)?;
        if !retval.contains(&buffer) {
            retval.push(buffer);
        }
    }
    Ok(retval)
}

#[test]
fn non_existent_dir() {
    use crate::source::cert_parser::DefaultCertificateParser;
    let r = cert_folder_to_vec(&DefaultCertificateParser, "tests/nonexistent");
    assert_eq!(Some(Error::NotFound), r.err());
}

#[test]
fn evidence_in_sub_folders() {
    use std::fs;

    let dir = tempfile::tempdir().unwrap();
    let sub = dir.path().join("2023").join("november");
    fs::create_dir_all(&sub).unwrap();
    fs::write(dir.path().join("a.crl"), [1u8, 2, 3]).unwrap();
    fs::write(sub.join("b.crl"), [4u8, 5]).unwrap();
    // same contents under another name
    fs::write(sub.join("c.der"), [4u8, 5]).unwrap();
    fs::write(sub.join("notes.txt"), b"ignored").unwrap();

    let dir_name = dir.path().to_str().unwrap();
    let mut crls = evidence_folder_to_vec(dir_name, &CRL_FILE_EXTENSIONS).unwrap();
    crls.sort();
    assert_eq!(vec![vec![1u8, 2, 3], vec![4u8, 5]], crls);

    let ocsp = evidence_folder_to_vec(dir_name, &["ocsp"]).unwrap();
    assert!(ocsp.is_empty());

    assert_eq!(
        Some(Error::NotFound),
        evidence_folder_to_vec("tests/nonexistent", &CRL_FILE_EXTENSIONS).err()
    );
}
