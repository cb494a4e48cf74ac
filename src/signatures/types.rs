//! Signature types and data structures.
//!
//! This module defines the core types shared by the OFD signer, the
//! signature containers and the validator.

use crate::crypto::{cert, SignatureAlgorithm, SigningKey, VerifyingKey};
use crate::error::{Error, Result};

/// Kind of a signature record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignType {
    /// Electronic seal: carries `Seal.esl` and a stamp appearance
    Seal,
    /// Plain digital signature
    Sign,
}

impl SignType {
    /// Value of the `Type` attribute.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignType::Seal => "Seal",
            SignType::Sign => "Sign",
        }
    }

    /// Parse the `Type` attribute; absent means `Seal`.
    pub fn parse(value: Option<&str>) -> Result<Self> {
        match value.map(str::trim) {
            None | Some("") | Some("Seal") => Ok(SignType::Seal),
            Some("Sign") => Ok(SignType::Sign),
            Some(other) => Err(Error::Xml(format!("unknown signature Type '{}'", other))),
        }
    }
}

/// Which files a new signature protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignMode {
    /// Protect every file including the signature list; no later signatures possible
    #[default]
    WholeProtected,
    /// Protect every file except the signature list; later signatures may follow
    ContinueSign,
}

/// Signing credentials containing certificate and private key.
pub struct SigningCredentials {
    /// DER-encoded X.509 certificate
    pub certificate: Vec<u8>,
    /// Private key matching the certificate
    pub key: SigningKey,
    /// Certificate chain (intermediate certificates, DER-encoded)
    pub chain: Vec<Vec<u8>>,
}

impl SigningCredentials {
    /// Create new signing credentials from a certificate and its key.
    ///
    /// Fails when the key does not match the certificate's public key.
    pub fn new(certificate: Vec<u8>, key: SigningKey) -> Result<Self> {
        let certificate = cert::to_der(&certificate)?;
        if cert::public_key(&certificate)? != key.verifying_key() {
            return Err(Error::InvalidArgument(
                "private key does not match certificate".to_string(),
            ));
        }
        Ok(Self {
            certificate,
            key,
            chain: Vec::new(),
        })
    }

    /// Create credentials with a certificate chain.
    pub fn with_chain(mut self, chain: Vec<Vec<u8>>) -> Self {
        self.chain = chain;
        self
    }

    /// Load credentials from PEM strings (certificate and PKCS#8 or PKCS#1 key).
    pub fn from_pem(cert_pem: &str, key_pem: &str) -> Result<Self> {
        let certificate = cert::to_der(cert_pem.as_bytes())?;
        Self::new(certificate, SigningKey::from_pem(key_pem)?)
    }

    /// Create a self-signed identity, for tests and demonstrations.
    pub fn self_signed(subject: &str) -> Result<Self> {
        let key = SigningKey::generate_p256();
        let certificate = cert::self_signed(subject, &key, 365)?;
        Self::new(certificate, key)
    }

    /// Algorithm the key signs with.
    pub fn algorithm(&self) -> SignatureAlgorithm {
        self.key.algorithm()
    }

    /// Public half of the key.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }
}

impl std::fmt::Debug for SigningCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningCredentials")
            .field("certificate", &format!("{} bytes", self.certificate.len()))
            .field("key", &"[REDACTED]")
            .field("chain", &format!("{} certificates", self.chain.len()))
            .finish()
    }
}
