//! Public-key wrapping of the file encryption key.
//!
//! The SM2 public-key encryption construction (C1C3C2) carried out over
//! P-256, with the counter KDF over SHA-256:
//!
//! ```text
//! C1 = k·G             (x1, y1)
//! (x2, y2) = k·P
//! t  = KDF(x2 ‖ y2, |M|)
//! C2 = M ⊕ t
//! C3 = H(x2 ‖ M ‖ y2)
//! ```
//!
//! The result is stored as the GM/T 0009 `SM2Cipher` structure.

use super::kdf;
use crate::crypto::SigningKey;
use crate::digest::{self, DigestAlgorithm};
use crate::error::{Error, Result};
use der::asn1::{OctetString, Uint};
use der::{Decode, Encode, Sequence};
use p256::elliptic_curve::group::Curve;
use p256::elliptic_curve::rand_core::CryptoRngCore;
use p256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use p256::{AffinePoint, EncodedPoint, FieldBytes, NonZeroScalar, ProjectivePoint, PublicKey};

const COORDINATE_LEN: usize = 32;

/// `SM2Cipher ::= SEQUENCE { x INTEGER, y INTEGER, hash OCTET STRING, cipherText OCTET STRING }`
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
struct Sm2Cipher {
    x: Uint,
    y: Uint,
    hash: OctetString,
    cipher_text: OctetString,
}

fn shared_secret(point: &AffinePoint) -> Result<(Vec<u8>, Vec<u8>)> {
    let encoded = point.to_encoded_point(false);
    match (encoded.x(), encoded.y()) {
        (Some(x), Some(y)) => Ok((x.to_vec(), y.to_vec())),
        _ => Err(Error::Crypto("point at infinity".to_string())),
    }
}

fn key_stream(x2: &[u8], y2: &[u8], len: usize) -> Result<Vec<u8>> {
    let mut z = Vec::with_capacity(x2.len() + y2.len());
    z.extend_from_slice(x2);
    z.extend_from_slice(y2);
    kdf::derive_key(DigestAlgorithm::Sha256, &z, len)
}

fn check_hash(x2: &[u8], msg: &[u8], y2: &[u8]) -> Result<Vec<u8>> {
    let mut data = Vec::with_capacity(x2.len() + msg.len() + y2.len());
    data.extend_from_slice(x2);
    data.extend_from_slice(msg);
    data.extend_from_slice(y2);
    digest::compute(DigestAlgorithm::Sha256, &data)
}

fn left_pad(bytes: &[u8]) -> Result<FieldBytes> {
    let zeroes = COORDINATE_LEN
        .checked_sub(bytes.len())
        .ok_or_else(|| Error::DecryptionFailed("C1 coordinate too long".to_string()))?;
    let mut out = FieldBytes::default();
    out[zeroes..].copy_from_slice(bytes);
    Ok(out)
}

/// Encrypt `msg` to `public`.
pub fn encrypt(public: &PublicKey, msg: &[u8], mut rng: &mut dyn CryptoRngCore) -> Result<Vec<u8>> {
    if msg.is_empty() {
        return Err(Error::InvalidArgument("nothing to encrypt".to_string()));
    }
    loop {
        let k = NonZeroScalar::random(&mut rng);
        let c1 = (ProjectivePoint::GENERATOR * *k).to_affine();
        let shared = (public.to_projective() * *k).to_affine();
        let (x2, y2) = shared_secret(&shared)?;
        let t = key_stream(&x2, &y2, msg.len())?;
        if t.iter().all(|&b| b == 0) {
            continue;
        }
        let c2: Vec<u8> = msg.iter().zip(&t).map(|(m, k)| m ^ k).collect();
        let c3 = check_hash(&x2, msg, &y2)?;
        let (x1, y1) = shared_secret(&c1)?;
        let cipher = Sm2Cipher {
            x: Uint::new(&x1)?,
            y: Uint::new(&y1)?,
            hash: OctetString::new(c3)?,
            cipher_text: OctetString::new(c2)?,
        };
        return Ok(cipher.to_der()?);
    }
}

/// Decrypt an `SM2Cipher` blob with the recipient's private key.
pub fn decrypt(key: &SigningKey, data: &[u8]) -> Result<Vec<u8>> {
    let secret = match key {
        SigningKey::P256(key) => key.as_nonzero_scalar(),
        SigningKey::Rsa(_) => {
            return Err(Error::UnsupportedAlgorithm(
                "key unwrapping needs an EC P-256 key".to_string(),
            ))
        },
    };
    let cipher = Sm2Cipher::from_der(data)
        .map_err(|e| Error::DecryptionFailed(format!("malformed SM2Cipher: {}", e)))?;
    let encoded = EncodedPoint::from_affine_coordinates(
        &left_pad(cipher.x.as_bytes())?,
        &left_pad(cipher.y.as_bytes())?,
        false,
    );
    let c1 = Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded))
        .ok_or_else(|| Error::DecryptionFailed("C1 is not on the curve".to_string()))?;

    let shared = (ProjectivePoint::from(c1) * **secret).to_affine();
    let (x2, y2) = shared_secret(&shared)?;
    let c2 = cipher.cipher_text.as_bytes();
    let t = key_stream(&x2, &y2, c2.len())?;
    if t.iter().all(|&b| b == 0) {
        return Err(Error::DecryptionFailed("derived key stream is zero".to_string()));
    }
    let msg: Vec<u8> = c2.iter().zip(&t).map(|(c, k)| c ^ k).collect();
    let expected = check_hash(&x2, &msg, &y2)?;
    if !digest::digest_eq(&expected, cipher.hash.as_bytes()) {
        return Err(Error::DecryptionFailed(
            "C3 check failed, wrong key or corrupted data".to_string(),
        ));
    }
    Ok(msg)
}
