//! Key material and certificates.
//!
//! Signing credentials pair a DER certificate with the private key it
//! certifies; verification only ever needs a [`VerifyingKey`].

pub mod cert;
mod keys;

pub use cert::CertificateInfo;
pub use keys::{SignatureAlgorithm, SigningKey, VerifyingKey};
