//! Validation context propagated through the validators to select policy

use serde::{Deserialize, Serialize};

/// The validator stage that is performing a check
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum ValidatorContext {
    /// Validation of a signature, the outermost caller
    SignatureValidator,
    /// Validation of a timestamp token
    TimestampValidator,
    /// Walking a certificate chain
    CertificateChainValidator,
    /// Collecting and ordering revocation evidence
    RevocationDataValidator,
    /// Judging one OCSP response
    OcspValidator,
    /// Judging one CRL
    CrlValidator,
}

/// The role of the certificate currently being checked
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum CertificateSource {
    /// Certificate of a document signer
    SignerCert,
    /// Certificate of a timestamp authority
    TimestampCert,
    /// Issuer of another certificate in a chain
    CertIssuer,
    /// Signer of an OCSP response
    OcspIssuer,
    /// Signer of a CRL
    CrlIssuer,
    /// A certificate taken from the trusted set
    Trusted,
}

/// Whether validation targets the present time or a point in the past
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum TimeBasedContext {
    /// Validation at (approximately) the current time
    Present,
    /// Validation at a time in the past, i.e., the signing time asserted by a timestamp
    Historical,
}

/// Immutable tuple describing where in the validation process a check occurs. New contexts are
/// derived with the `with_*` functions as validation descends into sub-checks.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ValidationContext {
    validator: ValidatorContext,
    certificate_source: CertificateSource,
    time_basis: TimeBasedContext,
}

impl ValidationContext {
    /// Creates a context from its three components
    pub fn new(
        validator: ValidatorContext,
        certificate_source: CertificateSource,
        time_basis: TimeBasedContext,
    ) -> Self {
        ValidationContext {
            validator,
            certificate_source,
            time_basis,
        }
    }

    /// Context for validating a document signer's certificate at the present time
    pub fn signer_present() -> Self {
        Self::new(
            ValidatorContext::SignatureValidator,
            CertificateSource::SignerCert,
            TimeBasedContext::Present,
        )
    }

    /// The validator stage
    pub fn validator(&self) -> ValidatorContext {
        self.validator
    }

    /// The certificate role
    pub fn certificate_source(&self) -> CertificateSource {
        self.certificate_source
    }

    /// The time basis
    pub fn time_basis(&self) -> TimeBasedContext {
        self.time_basis
    }

    /// Copy of this context with a different validator stage
    pub fn with_validator(&self, validator: ValidatorContext) -> Self {
        ValidationContext { validator, ..*self }
    }

    /// Copy of this context with a different certificate role
    pub fn with_certificate_source(&self, certificate_source: CertificateSource) -> Self {
        ValidationContext {
            certificate_source,
            ..*self
        }
    }

    /// Copy of this context with a different time basis
    pub fn with_time_basis(&self, time_basis: TimeBasedContext) -> Self {
        ValidationContext { time_basis, ..*self }
    }
}

#[test]
fn copy_with_override_leaves_original() {
    let base = ValidationContext::signer_present();
    let derived = base
        .with_validator(ValidatorContext::CrlValidator)
        .with_certificate_source(CertificateSource::CrlIssuer);
    assert_eq!(ValidatorContext::SignatureValidator, base.validator());
    assert_eq!(CertificateSource::SignerCert, base.certificate_source());
    assert_eq!(ValidatorContext::CrlValidator, derived.validator());
    assert_eq!(CertificateSource::CrlIssuer, derived.certificate_source());
    assert_eq!(TimeBasedContext::Present, derived.time_basis());
    assert_eq!(
        TimeBasedContext::Historical,
        derived
            .with_time_basis(TimeBasedContext::Historical)
            .time_basis()
    );
}
