//! OFD container encryption.
//!
//! Whole-package encryption as laid out in GM/T 0099:
//!
//! - every selected file is encrypted with one random file encryption key
//!   (FEK) and a per-file IV, then renamed to `*.dat`
//! - the `Path` → `EPath` mapping goes into an encrypted entries map
//! - the FEK is wrapped for each recipient, either under a password-derived
//!   key or under a certificate's public key, in the decrypt seed
//! - `/Encryptions.xml` records the operation and stays readable
//!
//! # Algorithms
//!
//! | Role | Algorithm |
//! |---|---|
//! | file and key encryption | AES-128-CBC, PKCS#7 |
//! | password stretching | counter KDF over SHA-256, no salt |
//! | certificate key wrap | SM2-style C1C3C2 over P-256 |
//!
//! The password KDF has no salt and no work factor. Existing readers require
//! it; treat password protection as weak against offline guessing.

pub mod aes;
mod decryptor;
pub mod ecies;
mod encryptor;
pub mod kdf;
mod user;

pub use decryptor::OfdDecryptor;
pub use encryptor::{encrypt_files_default_filter, ContainerFileFilter, OfdEncryptor};
pub use user::{UserCertEncryptor, UserCredential, UserFekEncryptor, UserPasswordEncryptor, KEK_LEN};
