//! Signer-side signature containers.
//!
//! A container decides what goes into `SignedValue.dat` (and `Seal.esl` for
//! seal signatures). The signer hands it the bytes of `Signature.xml`.

use super::envelope;
use super::scheme::SignatureScheme;
use super::types::{SignType, SigningCredentials};
use crate::crypto::SignatureAlgorithm;
use crate::digest::DigestAlgorithm;
use crate::error::{Error, Result};
use crate::ses::{self, SealSchema, SealVersion, TimeStampHook};

/// Produces signature values for [`super::OfdSigner`].
pub trait ExtendSignatureContainer {
    /// Digest the container requires for `References`; the signer's
    /// configured default applies when `None`.
    fn digest_algorithm(&self) -> Option<DigestAlgorithm> {
        None
    }

    /// Algorithm written into `SignatureMethod`.
    fn signature_algorithm(&self) -> SignatureAlgorithm;

    /// Sign the content of `Signature.xml`; `property_info` is its container path.
    fn sign(&self, content: &[u8], property_info: &str) -> Result<Vec<u8>>;

    /// DER seal to store as `Seal.esl`, for seal signatures.
    fn seal(&self) -> Result<Option<Vec<u8>>>;

    /// Kind of the signature record.
    fn sign_type(&self) -> SignType;
}

/// Plain digital signature with a bare algorithm value.
#[derive(Debug)]
pub struct DigitalSignContainer {
    credentials: SigningCredentials,
}

impl DigitalSignContainer {
    /// Sign with `credentials`.
    pub fn new(credentials: SigningCredentials) -> Self {
        Self { credentials }
    }
}

impl ExtendSignatureContainer for DigitalSignContainer {
    fn signature_algorithm(&self) -> SignatureAlgorithm {
        self.credentials.algorithm()
    }

    fn sign(&self, content: &[u8], _property_info: &str) -> Result<Vec<u8>> {
        SignatureScheme::Raw.sign(content, &self.credentials)
    }

    fn seal(&self) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    fn sign_type(&self) -> SignType {
        SignType::Sign
    }
}

/// Digital signature wrapped in a CMS envelope with the signer certificate.
#[derive(Debug)]
pub struct EnvelopedSignContainer {
    credentials: SigningCredentials,
    signed_attributes: bool,
}

impl EnvelopedSignContainer {
    /// Sign with `credentials`, embedding `Signature.xml` in the envelope.
    pub fn new(credentials: SigningCredentials) -> Self {
        Self {
            credentials,
            signed_attributes: false,
        }
    }

    /// Sign PKCS#9 signed attributes and leave `Signature.xml` out of the envelope.
    pub fn with_signed_attributes(mut self) -> Self {
        self.signed_attributes = true;
        self
    }
}

impl ExtendSignatureContainer for EnvelopedSignContainer {
    fn signature_algorithm(&self) -> SignatureAlgorithm {
        self.credentials.algorithm()
    }

    fn sign(&self, content: &[u8], _property_info: &str) -> Result<Vec<u8>> {
        if self.signed_attributes {
            envelope::seal_with_attributes(content, &self.credentials)
        } else {
            SignatureScheme::Enveloped.sign(content, &self.credentials)
        }
    }

    fn seal(&self) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    fn sign_type(&self) -> SignType {
        SignType::Sign
    }
}

fn require_version(seal: &SealSchema, version: SealVersion) -> Result<()> {
    if seal.version() != version {
        return Err(Error::InvalidArgument(format!(
            "a {} container needs a {} seal, got {}",
            version,
            version,
            seal.version()
        )));
    }
    Ok(())
}

/// Electronic seal signature, GM/T 0031 (v1).
#[derive(Debug)]
pub struct SesV1Container {
    credentials: SigningCredentials,
    seal: SealSchema,
}

impl SesV1Container {
    /// Stamp `seal` with the signer's `credentials`.
    pub fn new(credentials: SigningCredentials, seal: SealSchema) -> Result<Self> {
        require_version(&seal, SealVersion::V1)?;
        Ok(Self { credentials, seal })
    }
}

impl ExtendSignatureContainer for SesV1Container {
    fn digest_algorithm(&self) -> Option<DigestAlgorithm> {
        Some(self.credentials.algorithm().digest())
    }

    fn signature_algorithm(&self) -> SignatureAlgorithm {
        self.credentials.algorithm()
    }

    fn sign(&self, content: &[u8], property_info: &str) -> Result<Vec<u8>> {
        ses::sign_content(&self.seal, &self.credentials, content, property_info, None)?.to_der()
    }

    fn seal(&self) -> Result<Option<Vec<u8>>> {
        Ok(Some(self.seal.to_der()?))
    }

    fn sign_type(&self) -> SignType {
        SignType::Seal
    }
}

/// Electronic seal signature, GB/T 38540 (v4), with an optional timestamp.
pub struct SesV4Container {
    credentials: SigningCredentials,
    seal: SealSchema,
    time_stamp: Option<TimeStampHook>,
}

impl SesV4Container {
    /// Stamp `seal` with the signer's `credentials`.
    pub fn new(credentials: SigningCredentials, seal: SealSchema) -> Result<Self> {
        require_version(&seal, SealVersion::V4)?;
        Ok(Self {
            credentials,
            seal,
            time_stamp: None,
        })
    }

    /// Attach a timestamp token to every signature value.
    pub fn with_time_stamp(mut self, hook: TimeStampHook) -> Self {
        self.time_stamp = Some(hook);
        self
    }
}

impl ExtendSignatureContainer for SesV4Container {
    fn digest_algorithm(&self) -> Option<DigestAlgorithm> {
        Some(self.credentials.algorithm().digest())
    }

    fn signature_algorithm(&self) -> SignatureAlgorithm {
        self.credentials.algorithm()
    }

    fn sign(&self, content: &[u8], property_info: &str) -> Result<Vec<u8>> {
        ses::sign_content(
            &self.seal,
            &self.credentials,
            content,
            property_info,
            self.time_stamp.as_ref(),
        )?
        .to_der()
    }

    fn seal(&self) -> Result<Option<Vec<u8>>> {
        Ok(Some(self.seal.to_der()?))
    }

    fn sign_type(&self) -> SignType {
        SignType::Seal
    }
}

impl std::fmt::Debug for SesV4Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SesV4Container")
            .field("credentials", &self.credentials)
            .field("seal", &self.seal.es_id())
            .field("time_stamp", &self.time_stamp.is_some())
            .finish()
    }
}
