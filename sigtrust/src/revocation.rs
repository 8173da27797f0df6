//! Revocation status determination using OCSP responses and CRLs

pub mod crl_validator;
pub mod ocsp_validator;
pub mod revocation_data_validator;

pub use crate::revocation::{crl_validator::*, ocsp_validator::*, revocation_data_validator::*};
