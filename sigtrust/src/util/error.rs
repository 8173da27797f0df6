//! Error types

use core::fmt;

/// Result type
pub type Result<T> = core::result::Result<T, Error>;

/// Error type
///
/// Validation outcomes are never returned as errors. Expired certificates, missing extensions,
/// revoked certificates and the like are recorded as items in a
/// [`ValidationReport`](crate::ValidationReport). Errors are limited to misuse of the API and to
/// failures of collaborators (fetching, parsing, file access) that callers handle at the call site.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// An empty certificate chain was presented where at least a leaf certificate is required.
    EmptyChain,
    /// NotFound occurs when an action failed because a necessary artifact was not found.
    NotFound,
    /// An artifact could not be parsed
    ParseError,
    /// A networking issue occurred.
    NetworkError,
    /// A URI scheme was encountered that was not valid in the given context, i.e., an ldap URI
    /// presented to an HTTP client
    InvalidUriScheme,
    /// A configuration error was detected. See textual log output for more details.
    Misconfiguration,
    /// The requested feature is not supported by the configured collaborator
    Unsupported,
    /// Asn1Error is used to propagate error information from the der crate.
    Asn1Error(der::Error),
    /// Error encapsulates an error derived from [std::io::ErrorKind]
    StdIoError(std::io::ErrorKind),
}

impl From<der::Error> for Error {
    fn from(err: der::Error) -> Error {
        Error::Asn1Error(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::StdIoError(err.kind())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EmptyChain => write!(f, "EmptyChain"),
            Error::NotFound => write!(f, "NotFound"),
            Error::ParseError => write!(f, "ParseError"),
            Error::NetworkError => write!(f, "NetworkError"),
            Error::InvalidUriScheme => write!(f, "InvalidUriScheme"),
            Error::Misconfiguration => write!(f, "Misconfiguration"),
            Error::Unsupported => write!(f, "Unsupported"),
            Error::Asn1Error(err) => write!(f, "Asn1Error: {}", err),
            Error::StdIoError(err) => write!(f, "StdError: {:?}", err),
        }
    }
}

impl std::error::Error for Error {}

#[test]
fn error_test() {
    assert_eq!("EmptyChain", format!("{}", Error::EmptyChain));
    assert_eq!("NotFound", format!("{}", Error::NotFound));
    assert_eq!("ParseError", format!("{}", Error::ParseError));
    assert_eq!("NetworkError", format!("{}", Error::NetworkError));
    assert_eq!("InvalidUriScheme", format!("{}", Error::InvalidUriScheme));
    assert_eq!("Misconfiguration", format!("{}", Error::Misconfiguration));
    assert_eq!("Unsupported", format!("{}", Error::Unsupported));

    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
    assert_eq!(Error::StdIoError(std::io::ErrorKind::NotFound), Error::from(io));

    let asn1: Error = der::Error::from(der::ErrorKind::Failed).into();
    assert!(format!("{}", asn1).starts_with("Asn1Error"));
}
