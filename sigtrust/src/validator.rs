//! Certificate chain validation, extension predicates, policy and report model

pub mod chain_validator;
pub mod context;
pub mod extensions;
pub mod properties;
pub mod report;

pub use crate::validator::{
    chain_validator::*, context::*, extensions::*, properties::*, report::*,
};
