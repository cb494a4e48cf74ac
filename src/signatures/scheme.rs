//! Signature value formats.

use super::envelope;
use super::types::SigningCredentials;
use crate::crypto::VerifyingKey;
use crate::error::{Error, Result};

/// How a signature value is packaged in `SignedValue.dat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureScheme {
    /// Bare algorithm output
    #[default]
    Raw,
    /// CMS `ContentInfo(SignedData)` carrying the content and the signer certificate
    Enveloped,
}

impl SignatureScheme {
    /// Sign `tbs`. The algorithm hashes internally; never pass a digest.
    pub fn sign(&self, tbs: &[u8], credentials: &SigningCredentials) -> Result<Vec<u8>> {
        match self {
            SignatureScheme::Raw => credentials.key.sign(tbs),
            SignatureScheme::Enveloped => envelope::seal(tbs, credentials),
        }
    }

    /// Verify `value` over `tbs`.
    ///
    /// Raw values need `key`. Enveloped values carry their own certificate;
    /// `key`, when given, pins it.
    pub fn verify(&self, tbs: &[u8], value: &[u8], key: Option<&VerifyingKey>) -> Result<()> {
        match self {
            SignatureScheme::Raw => {
                let key = key.ok_or_else(|| {
                    Error::InvalidArgument("raw signature values need a verifying key".to_string())
                })?;
                key.verify(key.algorithm(), tbs, value)
            },
            SignatureScheme::Enveloped => envelope::open(tbs, value, key),
        }
    }
}
