//! Recipients of the file encryption key.
//!
//! A [`UserFekEncryptor`] turns the FEK into one `UserInfo` entry on the
//! encrypting side; a [`UserCredential`] is what a reader presents to get it
//! back.

use super::{aes, ecies, kdf};
use crate::crypto::{cert, SigningKey};
use crate::error::{Error, Result};
use crate::xml::encrypt::{ProtectionCase, UserInfo, UserType};
use p256::elliptic_curve::rand_core::CryptoRngCore;

/// Length of password-derived key-encryption keys.
pub const KEK_LEN: usize = 16;

/// Wraps the file encryption key for one recipient.
pub trait UserFekEncryptor {
    /// Produce the recipient's `UserInfo`; `iv` is the operation's seed IV.
    fn encrypt(&self, fek: &[u8], iv: &[u8], rng: &mut dyn CryptoRngCore) -> Result<UserInfo>;

    /// Protection case of the recipient.
    fn case(&self) -> ProtectionCase;

    /// Recipient name.
    fn user_name(&self) -> &str;
}

/// Password recipient: the FEK is AES-CBC encrypted under a KDF-stretched password.
pub struct UserPasswordEncryptor {
    user_name: String,
    user_type: UserType,
    kek: Vec<u8>,
}

impl UserPasswordEncryptor {
    /// Create an ordinary password recipient.
    pub fn new(user_name: &str, password: &str) -> Result<Self> {
        Self::with_type(user_name, UserType::User, password)
    }

    /// Create a password recipient with an explicit role.
    pub fn with_type(user_name: &str, user_type: UserType, password: &str) -> Result<Self> {
        if user_name.is_empty() {
            return Err(Error::InvalidArgument("user name is empty".to_string()));
        }
        Ok(Self {
            user_name: user_name.to_string(),
            user_type,
            kek: kdf::derive_password_key(password, KEK_LEN)?,
        })
    }
}

impl UserFekEncryptor for UserPasswordEncryptor {
    fn encrypt(&self, fek: &[u8], iv: &[u8], _rng: &mut dyn CryptoRngCore) -> Result<UserInfo> {
        Ok(UserInfo {
            user_name: self.user_name.clone(),
            user_type: self.user_type,
            user_cert: None,
            encrypted_wk: aes::cbc_encrypt(&self.kek, iv, fek)?,
            iv_value: iv.to_vec(),
        })
    }

    fn case(&self) -> ProtectionCase {
        ProtectionCase::Password
    }

    fn user_name(&self) -> &str {
        &self.user_name
    }
}

impl std::fmt::Debug for UserPasswordEncryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserPasswordEncryptor")
            .field("user_name", &self.user_name)
            .field("user_type", &self.user_type)
            .field("kek", &"[REDACTED]")
            .finish()
    }
}

/// Certificate recipient: the FEK is wrapped to the certificate's EC public key.
#[derive(Debug, Clone)]
pub struct UserCertEncryptor {
    user_name: String,
    user_type: UserType,
    certificate: Vec<u8>,
    public_key: p256::PublicKey,
}

impl UserCertEncryptor {
    /// Create an ordinary certificate recipient from a DER or PEM certificate.
    pub fn new(user_name: &str, certificate: &[u8]) -> Result<Self> {
        Self::with_type(user_name, UserType::User, certificate)
    }

    /// Create a certificate recipient with an explicit role.
    pub fn with_type(user_name: &str, user_type: UserType, certificate: &[u8]) -> Result<Self> {
        if user_name.is_empty() {
            return Err(Error::InvalidArgument("user name is empty".to_string()));
        }
        let certificate = cert::to_der(certificate)?;
        let public_key = cert::p256_public_key(&certificate)?;
        Ok(Self {
            user_name: user_name.to_string(),
            user_type,
            certificate,
            public_key,
        })
    }
}

impl UserFekEncryptor for UserCertEncryptor {
    fn encrypt(&self, fek: &[u8], iv: &[u8], rng: &mut dyn CryptoRngCore) -> Result<UserInfo> {
        Ok(UserInfo {
            user_name: self.user_name.clone(),
            user_type: self.user_type,
            user_cert: Some(self.certificate.clone()),
            encrypted_wk: ecies::encrypt(&self.public_key, fek, rng)?,
            iv_value: iv.to_vec(),
        })
    }

    fn case(&self) -> ProtectionCase {
        ProtectionCase::Certificate
    }

    fn user_name(&self) -> &str {
        &self.user_name
    }
}

/// What a reader presents to decrypt a package.
pub enum UserCredential {
    /// Password recipient
    Password {
        /// Name recorded in `UserInfo`
        user_name: String,
        /// Password
        password: String,
    },
    /// Certificate recipient
    Certificate {
        /// Name recorded in `UserInfo`; any name matches when absent
        user_name: Option<String>,
        /// Recipient certificate, DER or PEM
        cert: Vec<u8>,
        /// Private key of the certificate
        key: SigningKey,
    },
}

impl UserCredential {
    /// Password credential.
    pub fn password(user_name: impl Into<String>, password: impl Into<String>) -> Self {
        UserCredential::Password {
            user_name: user_name.into(),
            password: password.into(),
        }
    }

    /// Certificate credential.
    pub fn certificate(user_name: Option<String>, cert: Vec<u8>, key: SigningKey) -> Self {
        UserCredential::Certificate {
            user_name,
            cert,
            key,
        }
    }

    /// Protection case this credential can open.
    pub fn case(&self) -> ProtectionCase {
        match self {
            UserCredential::Password { .. } => ProtectionCase::Password,
            UserCredential::Certificate { .. } => ProtectionCase::Certificate,
        }
    }

    /// Whether `user` was written for this credential.
    pub(crate) fn matches(&self, user: &UserInfo) -> Result<bool> {
        if user.case() != self.case() {
            return Ok(false);
        }
        match self {
            UserCredential::Password { user_name, .. } => Ok(&user.user_name == user_name),
            UserCredential::Certificate {
                user_name, cert, ..
            } => {
                if let Some(name) = user_name {
                    if &user.user_name != name {
                        return Ok(false);
                    }
                }
                let der = cert::to_der(cert)?;
                Ok(user.user_cert.as_deref() == Some(der.as_slice()))
            },
        }
    }

    /// Recover the FEK from a matching `UserInfo`.
    pub(crate) fn unwrap_fek(&self, user: &UserInfo) -> Result<Vec<u8>> {
        match self {
            UserCredential::Password { password, .. } => {
                let kek = kdf::derive_password_key(password, KEK_LEN)?;
                aes::cbc_decrypt(&kek, &user.iv_value, &user.encrypted_wk)
            },
            UserCredential::Certificate { key, .. } => ecies::decrypt(key, &user.encrypted_wk),
        }
    }
}

impl std::fmt::Debug for UserCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserCredential::Password { user_name, .. } => f
                .debug_struct("Password")
                .field("user_name", user_name)
                .field("password", &"[REDACTED]")
                .finish(),
            UserCredential::Certificate { user_name, cert, .. } => f
                .debug_struct("Certificate")
                .field("user_name", user_name)
                .field("cert", &format!("{} bytes", cert.len()))
                .field("key", &"[REDACTED]")
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    const IV: [u8; 16] = [3u8; 16];

    #[test]
    fn test_password_user_round_trip() {
        let fek = [9u8; 16];
        let user = UserPasswordEncryptor::new("alice", "secret")
            .unwrap()
            .encrypt(&fek, &IV, &mut OsRng)
            .unwrap();
        assert_eq!(user.case(), ProtectionCase::Password);
        assert_eq!(user.iv_value, IV);

        let good = UserCredential::password("alice", "secret");
        assert!(good.matches(&user).unwrap());
        assert_eq!(good.unwrap_fek(&user).unwrap(), fek);

        assert!(!UserCredential::password("bob", "secret").matches(&user).unwrap());
        let wrong = UserCredential::password("alice", "wrong");
        assert!(wrong.unwrap_fek(&user).is_err());
    }

    #[test]
    fn test_cert_user_round_trip() {
        let key = SigningKey::generate_p256();
        let cert_der = cert::self_signed("CN=Reader", &key, 30).unwrap();
        let fek = [5u8; 16];
        let user = UserCertEncryptor::new("reader", &cert_der)
            .unwrap()
            .encrypt(&fek, &IV, &mut OsRng)
            .unwrap();
        assert_eq!(user.case(), ProtectionCase::Certificate);
        assert_eq!(user.user_cert.as_deref(), Some(cert_der.as_slice()));

        let cred = UserCredential::certificate(None, cert_der.clone(), key);
        assert!(cred.matches(&user).unwrap());
        assert_eq!(cred.unwrap_fek(&user).unwrap(), fek);
        assert!(!UserCredential::password("reader", "x").matches(&user).unwrap());
    }

    #[test]
    fn test_rsa_certificate_rejected() {
        let key = SigningKey::generate_rsa(1024).unwrap();
        let cert_der = cert::self_signed("CN=Rsa Reader", &key, 30).unwrap();
        assert!(matches!(
            UserCertEncryptor::new("rsa", &cert_der),
            Err(Error::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_empty_names_rejected() {
        assert!(UserPasswordEncryptor::new("", "pw").is_err());
        assert!(UserPasswordEncryptor::new("alice", "").is_err());
    }
}
