//! Digest and integrity engine.
//!
//! Computes file digests for `References` and checks a recorded reference set
//! against the current container content.
//!
//! ## Features
//!
//! - **Pluggable algorithms**: SHA-1, SHA-256, SHA-384, SHA-512, selected by OID
//! - **Streaming**: files are hashed in fixed-size chunks
//! - **Fail fast**: the first mismatching file aborts verification

use crate::container::ContainerPath;
use crate::error::{Error, Result};
use crate::xml::signature::References;
use der::asn1::ObjectIdentifier;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::io::Read;

const CHUNK_SIZE: usize = 8 * 1024;

/// Digest algorithm used for file references and seal data hashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum DigestAlgorithm {
    /// SHA-1 (legacy documents only)
    Sha1,
    /// SHA-256
    #[default]
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
    /// SM3 (GB/T 32905), recognized but not implemented
    Sm3,
}

impl DigestAlgorithm {
    /// Get the OID for this digest algorithm.
    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            DigestAlgorithm::Sha1 => ObjectIdentifier::new_unwrap("1.3.14.3.2.26"),
            DigestAlgorithm::Sha256 => ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1"),
            DigestAlgorithm::Sha384 => ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.2"),
            DigestAlgorithm::Sha512 => ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.3"),
            DigestAlgorithm::Sm3 => ObjectIdentifier::new_unwrap("1.2.156.10197.1.401"),
        }
    }

    /// Get the name of this algorithm.
    pub fn name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha1 => "SHA-1",
            DigestAlgorithm::Sha256 => "SHA-256",
            DigestAlgorithm::Sha384 => "SHA-384",
            DigestAlgorithm::Sha512 => "SHA-512",
            DigestAlgorithm::Sm3 => "SM3",
        }
    }

    /// Digest length in bytes.
    pub fn output_len(&self) -> usize {
        match self {
            DigestAlgorithm::Sha1 => 20,
            DigestAlgorithm::Sha256 | DigestAlgorithm::Sm3 => 32,
            DigestAlgorithm::Sha384 => 48,
            DigestAlgorithm::Sha512 => 64,
        }
    }

    /// Resolve an algorithm from its OID.
    pub fn from_oid(oid: &ObjectIdentifier) -> Result<Self> {
        [
            DigestAlgorithm::Sha1,
            DigestAlgorithm::Sha256,
            DigestAlgorithm::Sha384,
            DigestAlgorithm::Sha512,
            DigestAlgorithm::Sm3,
        ]
        .into_iter()
        .find(|alg| alg.oid() == *oid)
        .ok_or_else(|| Error::UnsupportedAlgorithm(format!("digest OID {}", oid)))
    }

    /// Resolve an algorithm from the textual form stored in `CheckMethod`.
    ///
    /// Accepts dotted OIDs as well as algorithm names (`SHA-256`, `sha256`, `SM3`).
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if let Ok(oid) = ObjectIdentifier::new(value) {
            return Self::from_oid(&oid);
        }
        match value.to_ascii_uppercase().replace('-', "").as_str() {
            "SHA1" => Ok(DigestAlgorithm::Sha1),
            "SHA256" => Ok(DigestAlgorithm::Sha256),
            "SHA384" => Ok(DigestAlgorithm::Sha384),
            "SHA512" => Ok(DigestAlgorithm::Sha512),
            "SM3" => Ok(DigestAlgorithm::Sm3),
            _ => Err(Error::UnsupportedAlgorithm(format!("digest method '{}'", value))),
        }
    }

    fn hasher(&self) -> Result<Box<dyn sha2::digest::DynDigest>> {
        match self {
            DigestAlgorithm::Sha1 => Ok(Box::new(Sha1::new())),
            DigestAlgorithm::Sha256 => Ok(Box::new(Sha256::new())),
            DigestAlgorithm::Sha384 => Ok(Box::new(Sha384::new())),
            DigestAlgorithm::Sha512 => Ok(Box::new(Sha512::new())),
            DigestAlgorithm::Sm3 => Err(Error::UnsupportedAlgorithm(
                "SM3 digest is not available in this build".to_string(),
            )),
        }
    }
}

/// Compute the digest of an in-memory buffer.
pub fn compute(alg: DigestAlgorithm, data: &[u8]) -> Result<Vec<u8>> {
    let mut hasher = alg.hasher()?;
    hasher.update(data);
    Ok(hasher.finalize().to_vec())
}

/// Compute the digest of a stream.
pub fn compute_reader(alg: DigestAlgorithm, mut reader: impl Read) -> Result<Vec<u8>> {
    let mut hasher = alg.hasher()?;
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_vec())
}

/// Check every reference against the current file content.
///
/// The algorithm is taken from `references.check_method`; the resolver opens
/// the file named by each reference. Stops at the first mismatch.
pub fn verify_set<F>(references: &References, mut resolver: F) -> Result<()>
where
    F: FnMut(&ContainerPath) -> Result<Box<dyn Read>>,
{
    let alg = references.check_method;
    for reference in &references.entries {
        let reader = resolver(&reference.file_ref)?;
        let actual = compute_reader(alg, reader)?;
        log::debug!("{} {} = {}", alg.name(), reference.file_ref, hex::encode(&actual));
        if !digest_eq(&actual, &reference.check_value) {
            return Err(Error::FileIntegrity {
                path: reference.file_ref.to_string(),
                expected: reference.check_value.clone(),
                actual,
            });
        }
    }
    Ok(())
}

/// Constant-time comparison of two digests.
pub(crate) fn digest_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
