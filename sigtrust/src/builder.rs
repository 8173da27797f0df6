//! Certification path completion from presented certificates, AIA caIssuers URIs and the store

pub mod issuing_cert_retriever;

pub use crate::builder::issuing_cert_retriever::*;
