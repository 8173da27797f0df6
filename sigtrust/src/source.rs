//! Sources of certificates and revocation data

pub mod cert_parser;
pub mod cert_store;
pub mod file_utils;
#[cfg(feature = "remote")]
pub mod remote_clients;
pub mod static_clients;

#[cfg(feature = "remote")]
pub use crate::source::remote_clients::*;
pub use crate::source::{cert_parser::*, cert_store::*, file_utils::*, static_clients::*};
