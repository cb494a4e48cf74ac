//! Counter-mode key derivation (GB/T 32918.4 §5.4.3).
//!
//! `K = H(Z ‖ 1) ‖ H(Z ‖ 2) ‖ …` truncated to the requested length, with the
//! counter written as a 32-bit big-endian integer.

use crate::digest::{self, DigestAlgorithm};
use crate::error::{Error, Result};

/// Derive `klen` bytes from the shared secret `z`.
pub fn derive_key(alg: DigestAlgorithm, z: &[u8], klen: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(klen);
    let mut counter: u32 = 1;
    let mut block = Vec::with_capacity(z.len() + 4);
    while out.len() < klen {
        block.clear();
        block.extend_from_slice(z);
        block.extend_from_slice(&counter.to_be_bytes());
        let hash = digest::compute(alg, &block)?;
        let take = hash.len().min(klen - out.len());
        out.extend_from_slice(&hash[..take]);
        counter = counter
            .checked_add(1)
            .ok_or_else(|| Error::InvalidArgument("KDF output length too large".to_string()))?;
    }
    Ok(out)
}

/// Stretch a password into a key-encryption key.
///
/// No salt and a single pass, which is what existing readers expect. The
/// result is only as strong as the password.
pub fn derive_password_key(password: &str, klen: usize) -> Result<Vec<u8>> {
    if password.is_empty() {
        return Err(Error::InvalidArgument("password is empty".to_string()));
    }
    derive_key(DigestAlgorithm::Sha256, password.as_bytes(), klen)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_answers() {
        assert_eq!(
            hex::encode(derive_password_key("password", 16).unwrap()),
            "29530b821193b29747e092285aed86c6"
        );
        assert_eq!(
            hex::encode(derive_key(DigestAlgorithm::Sha256, &[1, 2, 3], 40).unwrap()),
            "6d0d07a7d8f116124cf7dc8817849be15168935f3a61991db4effbc3e7bdb8c6858cf4d22eca0c7e"
        );
    }

    #[test]
    fn test_first_block_is_counter_one() {
        assert_eq!(
            hex::encode(derive_key(DigestAlgorithm::Sha256, b"abc", 32).unwrap()),
            "46c386ebccef82ba0bb0b095aaa5548b03cdff6951871c6fb505af68af688332"
        );
    }

    #[test]
    fn test_prefix_property() {
        let long = derive_key(DigestAlgorithm::Sha256, b"z", 70).unwrap();
        let short = derive_key(DigestAlgorithm::Sha256, b"z", 20).unwrap();
        assert_eq!(&long[..20], &short[..]);
        assert!(derive_key(DigestAlgorithm::Sha256, b"z", 0).unwrap().is_empty());
    }

    #[test]
    fn test_empty_password_rejected() {
        assert!(derive_password_key("", 16).is_err());
    }

    #[test]
    fn test_sm3_unsupported() {
        assert!(matches!(
            derive_key(DigestAlgorithm::Sm3, b"z", 16),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }
}
