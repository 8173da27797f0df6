//! Provides an implementation of the [`SignatureVerifier`] interface using libraries from the
//! [Rust Crypto](https://github.com/RustCrypto) project for support.

use const_oid::db::rfc5912::{
    ECDSA_WITH_SHA_256, SECP_256_R_1, SHA_256_WITH_RSA_ENCRYPTION, SHA_384_WITH_RSA_ENCRYPTION,
    SHA_512_WITH_RSA_ENCRYPTION,
};
use der::{asn1::ObjectIdentifier, Encode};
use log::{debug, error};
use p256::ecdsa::{signature::Verifier, Signature, VerifyingKey};
use rsa::{pkcs8::DecodePublicKey, Pkcs1v15Sign, RsaPublicKey};
use sha2::{Digest, Sha256, Sha384, Sha512};
use spki::SubjectPublicKeyInfoOwned;
use x509_cert::Certificate;

use crate::environment::validation_environment_traits::{SignatureVerifier, SignedObject};
use crate::util::cert_utilities::name_to_string;

/// is_rsa returns true is the presented OID is one of the supported RSA PKCS #1 v1.5 signature
/// algorithms and false otherwise.
fn is_rsa(oid: &ObjectIdentifier) -> bool {
    *oid == SHA_256_WITH_RSA_ENCRYPTION
        || *oid == SHA_384_WITH_RSA_ENCRYPTION
        || *oid == SHA_512_WITH_RSA_ENCRYPTION
}

fn verify_rsa(
    oid: &ObjectIdentifier,
    message: &[u8],
    signature: &[u8],
    spki: &SubjectPublicKeyInfoOwned,
) -> bool {
    let enc_spki = match spki.to_der() {
        Ok(enc) => enc,
        Err(e) => {
            error!("Failed to encode public key: {}", e);
            return false;
        }
    };
    let rsa = match RsaPublicKey::from_public_key_der(&enc_spki) {
        Ok(rsa) => rsa,
        Err(e) => {
            debug!("Failed to parse RSA public key: {}", e);
            return false;
        }
    };
    let result = if *oid == SHA_256_WITH_RSA_ENCRYPTION {
        rsa.verify(
            Pkcs1v15Sign::new::<Sha256>(),
            &Sha256::digest(message),
            signature,
        )
    } else if *oid == SHA_384_WITH_RSA_ENCRYPTION {
        rsa.verify(
            Pkcs1v15Sign::new::<Sha384>(),
            &Sha384::digest(message),
            signature,
        )
    } else {
        rsa.verify(
            Pkcs1v15Sign::new::<Sha512>(),
            &Sha512::digest(message),
            signature,
        )
    };
    result.is_ok()
}

fn get_named_curve_parameter(spki: &SubjectPublicKeyInfoOwned) -> Option<ObjectIdentifier> {
    spki.algorithm
        .parameters
        .as_ref()
        .and_then(|p| p.decode_as::<ObjectIdentifier>().ok())
}

fn verify_p256(message: &[u8], signature: &[u8], spki: &SubjectPublicKeyInfoOwned) -> bool {
    match get_named_curve_parameter(spki) {
        Some(curve) if curve == SECP_256_R_1 => {}
        other => {
            debug!("Unrecognized or unsupported named curve: {:?}", other);
            return false;
        }
    }
    let key = match VerifyingKey::from_sec1_bytes(spki.subject_public_key.raw_bytes()) {
        Ok(key) => key,
        Err(e) => {
            debug!("Failed to parse P-256 public key: {}", e);
            return false;
        }
    };
    match Signature::from_der(signature) {
        Ok(s) => key.verify(message, &s).is_ok(),
        Err(e) => {
            debug!("Failed to parse ECDSA signature: {}", e);
            false
        }
    }
}

/// `RustCryptoVerifier` verifies RSA PKCS #1 v1.5 signatures with SHA-256, SHA-384 or SHA-512 and
/// ECDSA P-256 signatures with SHA-256. Signatures made with other algorithms never verify.
#[derive(Clone, Copy, Debug, Default)]
pub struct RustCryptoVerifier;

impl SignatureVerifier for RustCryptoVerifier {
    fn is_signature_valid(&self, signed: SignedObject<'_>, signer: &Certificate) -> bool {
        let message = match signed.tbs_der() {
            Ok(m) => m,
            Err(e) => {
                error!("Failed to encode signed content for verification: {}", e);
                return false;
            }
        };
        let alg = &signed.signature_algorithm().oid;
        let spki = &signer.tbs_certificate.subject_public_key_info;
        if is_rsa(alg) {
            verify_rsa(alg, &message, signed.signature(), spki)
        } else if *alg == ECDSA_WITH_SHA_256 {
            verify_p256(&message, signed.signature(), spki)
        } else {
            debug!(
                "Unsupported signature algorithm {} for key from {}",
                alg,
                name_to_string(&signer.tbs_certificate.subject)
            );
            false
        }
    }
}
