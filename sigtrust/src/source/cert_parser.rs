//! Default implementation of the [`CertificateParser`] capability

use cms::cert::CertificateChoices;
use cms::content_info::ContentInfo;
use cms::signed_data::SignedData;
use der::Decode;
use log::debug;
use x509_cert::Certificate;

use crate::environment::validation_environment_traits::CertificateParser;
use crate::util::error::{Error, Result};

/// Parses a single DER certificate, a PEM file with one or more certificates, or a degenerate
/// certs-only SignedData message (the usual payload of an AIA caIssuers URI).
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultCertificateParser;

fn certs_from_p7(bytes: &[u8]) -> Result<Vec<Certificate>> {
    let ci = ContentInfo::from_der(bytes)?;
    let sd: SignedData = ci.content.decode_as()?;
    let mut certs = vec![];
    if let Some(cert_set) = &sd.certificates {
        for choice in cert_set.0.iter() {
            if let CertificateChoices::Certificate(cert) = choice {
                certs.push(cert.clone());
            }
        }
    }
    Ok(certs)
}

impl CertificateParser for DefaultCertificateParser {
    fn parse_certificates(&self, bytes: &[u8]) -> Result<Vec<Certificate>> {
        if bytes.starts_with(b"-----BEGIN") {
            return match Certificate::load_pem_chain(bytes) {
                Ok(certs) => Ok(certs),
                Err(e) => {
                    debug!("Failed to parse PEM certificates: {}", e);
                    Err(Error::ParseError)
                }
            };
        }

        if let Ok(cert) = Certificate::from_der(bytes) {
            return Ok(vec![cert]);
        }

        match certs_from_p7(bytes) {
            Ok(certs) if !certs.is_empty() => Ok(certs),
            Ok(_) => Err(Error::NotFound),
            Err(e) => {
                debug!("Buffer is neither a certificate nor a certs-only SignedData: {}", e);
                Err(Error::ParseError)
            }
        }
    }
}

#[test]
fn junk_is_a_parse_error() {
    let parser = DefaultCertificateParser;
    assert_eq!(
        Err(Error::ParseError),
        parser.parse_certificates(&[0x30, 0x03, 0x02, 0x01, 0x01])
    );
    assert_eq!(
        Err(Error::ParseError),
        parser.parse_certificates(b"-----BEGIN CERTIFICATE-----\nnot base64\n-----END CERTIFICATE-----\n")
    );
}
