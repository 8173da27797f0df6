//! Arguments for the sigtrust utility

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

use sigtrust::{CertificateSource, TimeOfInterest};

/// Returns the current time as seconds since the Unix epoch
pub fn get_now_as_unix_epoch() -> u64 {
    TimeOfInterest::now().as_unix_secs()
}

/// Role in which the target certificate is validated
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum, Serialize, Deserialize)]
pub enum TargetRole {
    /// Document signer certificate
    #[default]
    Signer,
    /// Timestamp authority certificate
    Timestamp,
}

impl From<TargetRole> for CertificateSource {
    fn from(role: TargetRole) -> Self {
        match role {
            TargetRole::Signer => CertificateSource::SignerCert,
            TargetRole::Timestamp => CertificateSource::TimestampCert,
        }
    }
}

/// Certificate trust engine for PDF signature validation
#[derive(Parser, Debug, Serialize, Deserialize, Default)]
#[command(author, version, about, long_about = None)]
pub struct SigtrustArgs {
    /// Full path of folder containing DER, PEM or certs-only PKCS #7 files with trusted
    /// certificates. Sub-folders are traversed.
    #[clap(short, long, help_heading = "COMMON OPTIONS")]
    pub trust_anchor_folder: Option<String>,

    /// Full path of folder containing intermediate CA certificates usable for chain completion.
    #[clap(short, long, help_heading = "COMMON OPTIONS")]
    pub ca_folder: Option<String>,

    /// Time to use for validation expressed as the number of seconds since Unix epoch (defaults
    /// to current system time).
    #[clap(short = 'i', long, default_value_t = get_now_as_unix_epoch(), help_heading = "COMMON OPTIONS")]
    pub time_of_interest: u64,

    /// Full path and filename of JSON-formatted validation properties.
    #[clap(short, long, help_heading = "COMMON OPTIONS")]
    pub properties: Option<String>,

    /// Full path and filename of YAML-formatted configuration file for log4rs logging mechanism.
    /// See <https://docs.rs/log4rs/latest/log4rs/> for details.
    #[clap(short, long, help_heading = "COMMON OPTIONS")]
    pub logging_config: Option<String>,

    /// Full path and filename of the certificate to validate.
    #[clap(short = 'e', long, help_heading = "VALIDATION")]
    pub target: Option<String>,

    /// Role in which the target certificate is validated.
    #[clap(long, value_enum, default_value_t = TargetRole::Signer, help_heading = "VALIDATION")]
    pub role: TargetRole,

    /// Validate at a time in the past, as when a timestamp vouches for the signing time.
    #[clap(long, help_heading = "VALIDATION")]
    pub historical: bool,

    /// Key usage the target must assert, i.e., digitalSignature. May be repeated.
    #[clap(short = 'k', long, help_heading = "VALIDATION")]
    pub required_key_usage: Vec<String>,

    /// Full path of folder containing encoded OCSP responses collected with the signature.
    #[clap(long, help_heading = "REVOCATION")]
    pub ocsp_folder: Option<String>,

    /// Full path of folder containing encoded CRLs collected with the signature.
    #[clap(long, help_heading = "REVOCATION")]
    pub crl_folder: Option<String>,

    /// Never retrieve issuer certificates or revocation data over the network.
    #[clap(short = 'n', long, help_heading = "REVOCATION")]
    pub never_fetch: bool,

    /// Full path and filename to receive the validation report as JSON.
    #[clap(short, long, help_heading = "OUTPUT")]
    pub report: Option<String>,
}
