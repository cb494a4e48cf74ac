//! AES-CBC with PKCS#7 padding.
//!
//! Stands in for SM4-CBC: the same block size, IV size and padding, so the
//! container layout is unchanged. The key length selects the variant:
//! - AES-128: 16-byte key (file encryption keys and password KEKs)
//! - AES-256: 32-byte key

use crate::error::{Error, Result};
use aes::cipher::block_padding::NoPadding;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::{Aes128, Aes256};
use cbc::{Decryptor, Encryptor};

/// Cipher block and IV size.
pub const BLOCK_SIZE: usize = 16;

type Aes128CbcEnc = Encryptor<Aes128>;
type Aes128CbcDec = Decryptor<Aes128>;
type Aes256CbcEnc = Encryptor<Aes256>;
type Aes256CbcDec = Decryptor<Aes256>;

fn check_iv(iv: &[u8]) -> Result<()> {
    if iv.len() != BLOCK_SIZE {
        return Err(Error::InvalidArgument(format!(
            "IV must be {} bytes, got {}",
            BLOCK_SIZE,
            iv.len()
        )));
    }
    Ok(())
}

/// Encrypt `plaintext`; the output is always a non-empty multiple of the block size.
pub fn cbc_encrypt(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    check_iv(iv)?;

    // PKCS#7: always at least one byte of padding
    let mut padded = plaintext.to_vec();
    let padding_len = BLOCK_SIZE - (plaintext.len() % BLOCK_SIZE);
    padded.extend(std::iter::repeat(padding_len as u8).take(padding_len));

    let len = padded.len();
    let result = match key.len() {
        16 => Aes128CbcEnc::new(key.into(), iv.into())
            .encrypt_padded_mut::<NoPadding>(&mut padded, len)
            .map(|_| ()),
        32 => Aes256CbcEnc::new(key.into(), iv.into())
            .encrypt_padded_mut::<NoPadding>(&mut padded, len)
            .map(|_| ()),
        n => {
            return Err(Error::InvalidArgument(format!(
                "AES key must be 16 or 32 bytes, got {}",
                n
            )))
        },
    };
    result.map_err(|_| Error::Crypto("AES-CBC encryption failed".to_string()))?;
    Ok(padded)
}

/// Decrypt and strip PKCS#7 padding.
///
/// A wrong key almost always shows up here as bad padding, reported as
/// [`Error::DecryptionFailed`].
pub fn cbc_decrypt(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    check_iv(iv)?;
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(Error::DecryptionFailed(format!(
            "ciphertext length {} is not a positive multiple of {}",
            ciphertext.len(),
            BLOCK_SIZE
        )));
    }

    let mut buffer = ciphertext.to_vec();
    let result = match key.len() {
        16 => Aes128CbcDec::new(key.into(), iv.into())
            .decrypt_padded_mut::<NoPadding>(&mut buffer)
            .map(|_| ()),
        32 => Aes256CbcDec::new(key.into(), iv.into())
            .decrypt_padded_mut::<NoPadding>(&mut buffer)
            .map(|_| ()),
        n => {
            return Err(Error::InvalidArgument(format!(
                "AES key must be 16 or 32 bytes, got {}",
                n
            )))
        },
    };
    result.map_err(|_| Error::DecryptionFailed("AES-CBC decryption failed".to_string()))?;

    let padding_len = buffer[buffer.len() - 1] as usize;
    if padding_len == 0 || padding_len > BLOCK_SIZE {
        return Err(Error::DecryptionFailed("invalid PKCS#7 padding".to_string()));
    }
    let data_len = buffer.len() - padding_len;
    if buffer[data_len..].iter().any(|&b| b as usize != padding_len) {
        return Err(Error::DecryptionFailed("invalid PKCS#7 padding".to_string()));
    }
    buffer.truncate(data_len);
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8; 16] = b"0123456789abcdef";
    const IV: &[u8; 16] = b"fedcba9876543210";

    #[test]
    fn test_aes128_known_answer() {
        let ciphertext = cbc_encrypt(KEY, IV, b"Hello, AES encryption!").unwrap();
        assert_eq!(
            hex::encode(&ciphertext),
            "41409595a8c497f3e08f30189fea0e7de4953e864307aa89d23cd2b54ba44d3f"
        );
        assert_eq!(cbc_decrypt(KEY, IV, &ciphertext).unwrap(), b"Hello, AES encryption!");
    }

    #[test]
    fn test_empty_plaintext_is_one_block() {
        let ciphertext = cbc_encrypt(KEY, IV, b"").unwrap();
        assert_eq!(hex::encode(&ciphertext), "3c492cedd954cc383f3d3ee93e728484");
        assert!(cbc_decrypt(KEY, IV, &ciphertext).unwrap().is_empty());
    }

    #[test]
    fn test_aes256_round_trip() {
        let key = [7u8; 32];
        for len in [0, 1, 15, 16, 17, 1000] {
            let plaintext = vec![0xA5u8; len];
            let ciphertext = cbc_encrypt(&key, IV, &plaintext).unwrap();
            assert_eq!(ciphertext.len(), (len / BLOCK_SIZE + 1) * BLOCK_SIZE);
            assert_eq!(cbc_decrypt(&key, IV, &ciphertext).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_bad_lengths() {
        assert!(matches!(
            cbc_encrypt(&[0u8; 24], IV, b"x"),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(cbc_encrypt(KEY, &[0u8; 8], b"x"), Err(Error::InvalidArgument(_))));
        assert!(matches!(cbc_decrypt(KEY, IV, &[0u8; 15]), Err(Error::DecryptionFailed(_))));
        assert!(matches!(cbc_decrypt(KEY, IV, &[]), Err(Error::DecryptionFailed(_))));
    }

    #[test]
    fn test_corrupted_padding() {
        let mut ciphertext = cbc_encrypt(KEY, IV, b"sixteen byte msg").unwrap();
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0x01;
        assert!(matches!(
            cbc_decrypt(KEY, IV, &ciphertext),
            Err(Error::DecryptionFailed(_))
        ));
    }
}
