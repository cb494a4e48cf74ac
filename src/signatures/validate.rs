//! Validator-side signature containers.

use super::envelope;
use super::scheme::SignatureScheme;
use super::types::SignType;
use crate::crypto::{SignatureAlgorithm, VerifyingKey};
use crate::error::{Error, Result};
use crate::ses::{self, SignatureSchema};

/// Checks signature values for [`super::OfdValidator`].
pub trait ValidateContainer {
    /// Verify `signed_value` over `content`, the bytes of `Signature.xml`.
    ///
    /// `method` is the `SignatureMethod` recorded in the signed info.
    fn validate(&self, kind: SignType, method: &str, content: &[u8], signed_value: &[u8]) -> Result<()>;

    /// DER of the seal embedded in `signed_value`.
    fn seal(&self, signed_value: &[u8]) -> Result<Vec<u8>> {
        SignatureSchema::from_der(signed_value)?.seal().to_der()
    }
}

fn recorded_algorithm(method: &str) -> Result<SignatureAlgorithm> {
    SignatureAlgorithm::parse(method)
}

/// Bare algorithm values, checked against a known key.
#[derive(Debug, Clone)]
pub struct DigitalValidateContainer {
    key: VerifyingKey,
}

impl DigitalValidateContainer {
    /// Verify with `key`.
    pub fn new(key: VerifyingKey) -> Self {
        Self { key }
    }
}

impl ValidateContainer for DigitalValidateContainer {
    fn validate(&self, _kind: SignType, method: &str, content: &[u8], signed_value: &[u8]) -> Result<()> {
        self.key.verify(recorded_algorithm(method)?, content, signed_value)
    }

    fn seal(&self, _signed_value: &[u8]) -> Result<Vec<u8>> {
        Err(Error::InvalidStructure(
            "a raw signature value carries no seal".to_string(),
        ))
    }
}

/// CMS envelopes, optionally pinned to one signer key.
#[derive(Debug, Clone, Default)]
pub struct EnvelopedValidateContainer {
    /// Key the envelope's certificate must carry
    pub pinned: Option<VerifyingKey>,
}

impl EnvelopedValidateContainer {
    /// Trust whichever certificate the envelope carries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require the envelope to be signed by `key`.
    pub fn pinned(key: VerifyingKey) -> Self {
        Self { pinned: Some(key) }
    }
}

impl ValidateContainer for EnvelopedValidateContainer {
    fn validate(&self, _kind: SignType, method: &str, content: &[u8], signed_value: &[u8]) -> Result<()> {
        recorded_algorithm(method)?;
        SignatureScheme::Enveloped.verify(content, signed_value, self.pinned.as_ref())
    }

    fn seal(&self, _signed_value: &[u8]) -> Result<Vec<u8>> {
        Err(Error::InvalidStructure(
            "an enveloped signature value carries no seal".to_string(),
        ))
    }
}

/// Electronic seal signatures of either version.
#[derive(Debug, Clone)]
pub struct SesValidateContainer {
    check_seal: bool,
}

impl Default for SesValidateContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl SesValidateContainer {
    /// Verify the signature and the seal maker's signature.
    pub fn new() -> Self {
        Self { check_seal: true }
    }

    /// Verify the signature only.
    pub fn without_seal_check() -> Self {
        Self { check_seal: false }
    }
}

impl ValidateContainer for SesValidateContainer {
    fn validate(&self, _kind: SignType, method: &str, content: &[u8], signed_value: &[u8]) -> Result<()> {
        let signature = SignatureSchema::from_der(signed_value)?;
        let alg = SignatureAlgorithm::from_oid(signature.signature_algorithm())?;
        if recorded_algorithm(method)? != alg {
            return Err(Error::InvalidSignedValue(format!(
                "SignatureMethod {} differs from the {} signature value",
                method.trim(),
                alg.name()
            )));
        }
        signature.verify(content)?;
        if self.check_seal {
            ses::verify_seal(&signature.seal())?;
        }
        Ok(())
    }
}

/// Picks a container per record: seals and SES values go to
/// [`SesValidateContainer`], CMS envelopes to [`EnvelopedValidateContainer`].
///
/// Raw values cannot be checked without the signer's key and are refused.
#[derive(Debug, Clone, Default)]
pub struct AutoValidateContainer {
    ses: SesValidateContainer,
    enveloped: EnvelopedValidateContainer,
}

impl AutoValidateContainer {
    /// Create the dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    fn pick(&self, kind: SignType, signed_value: &[u8]) -> Result<&dyn ValidateContainer> {
        if kind == SignType::Seal {
            return Ok(&self.ses);
        }
        if envelope::is_signed_data(signed_value) {
            return Ok(&self.enveloped);
        }
        if SignatureSchema::from_der(signed_value).is_ok() {
            return Ok(&self.ses);
        }
        Err(Error::InvalidArgument(
            "raw signature values need a DigitalValidateContainer with the signer's key".to_string(),
        ))
    }
}

impl ValidateContainer for AutoValidateContainer {
    fn validate(&self, kind: SignType, method: &str, content: &[u8], signed_value: &[u8]) -> Result<()> {
        self.pick(kind, signed_value)?
            .validate(kind, method, content, signed_value)
    }
}
