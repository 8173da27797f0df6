//! Basic utility functionality supporting certificate validation

pub mod cert_utilities;
pub mod crypto;
pub mod error;
pub mod time_of_interest;

pub use crate::util::{cert_utilities::*, crypto::*, error::*, time_of_interest::*};
