//! X.509 certificate handling.
//!
//! Certificates are inspected with `x509-parser` and built with `x509-cert`.
//! No chain building or trust evaluation happens here; a certificate is only
//! a carrier for a public key and an issuer/serial pair.

use super::keys::{SigningKey, VerifyingKey};
use crate::error::{Error, Result};
use der::asn1::BitString;
use der::{Decode, Encode};
use rand::RngCore;
use spki::SubjectPublicKeyInfoOwned;
use std::str::FromStr;
use std::time::Duration;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::Validity;
use x509_cert::{Certificate, TbsCertificate, Version};

/// Summary of a certificate for reports and recipient matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    /// Subject distinguished name
    pub subject: String,
    /// Issuer distinguished name
    pub issuer: String,
    /// Serial number bytes
    pub serial: Vec<u8>,
    /// Start of validity, seconds since the Unix epoch
    pub not_before: i64,
    /// End of validity, seconds since the Unix epoch
    pub not_after: i64,
}

fn parse(der: &[u8]) -> Result<x509_parser::certificate::X509Certificate<'_>> {
    let (_, cert) = x509_parser::parse_x509_certificate(der)
        .map_err(|e| Error::Crypto(format!("invalid certificate: {}", e)))?;
    Ok(cert)
}

/// Inspect a DER certificate.
pub fn inspect(der: &[u8]) -> Result<CertificateInfo> {
    let cert = parse(der)?;
    Ok(CertificateInfo {
        subject: cert.subject().to_string(),
        issuer: cert.issuer().to_string(),
        serial: cert.raw_serial().to_vec(),
        not_before: cert.validity().not_before.timestamp(),
        not_after: cert.validity().not_after.timestamp(),
    })
}

/// Public key of a DER certificate.
pub fn public_key(der: &[u8]) -> Result<VerifyingKey> {
    let cert = parse(der)?;
    VerifyingKey::from_spki_der(cert.public_key().raw)
}

/// P-256 public key of a DER certificate, for key wrapping.
pub fn p256_public_key(der: &[u8]) -> Result<p256::PublicKey> {
    match public_key(der)? {
        VerifyingKey::P256(key) => Ok(p256::PublicKey::from(&key)),
        VerifyingKey::Rsa(_) => Err(Error::UnsupportedAlgorithm(
            "key wrapping requires a P-256 certificate".to_string(),
        )),
    }
}

/// Normalise PEM or DER certificate input to DER.
pub fn to_der(data: &[u8]) -> Result<Vec<u8>> {
    if data.starts_with(b"-----BEGIN") {
        let (_, pem) = x509_parser::pem::parse_x509_pem(data)
            .map_err(|e| Error::Crypto(format!("invalid PEM certificate: {}", e)))?;
        Ok(pem.contents)
    } else {
        parse(data)?;
        Ok(data.to_vec())
    }
}

/// Issue a self-signed certificate for `key`.
///
/// `subject` is an RFC 4514 name such as `"CN=Seal Maker,O=Example"`.
pub fn self_signed(subject: &str, key: &SigningKey, validity_days: u32) -> Result<Vec<u8>> {
    let name = Name::from_str(subject)
        .map_err(|e| Error::InvalidArgument(format!("invalid subject '{}': {}", subject, e)))?;
    let spki = SubjectPublicKeyInfoOwned::from_der(&key.verifying_key().to_spki_der()?)?;
    let algorithm = key.algorithm().algorithm_identifier();

    let mut serial = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut serial);
    // positive INTEGER
    serial[0] &= 0x7f;
    serial[0] |= 0x01;

    let tbs = TbsCertificate {
        version: Version::V3,
        serial_number: SerialNumber::new(&serial)?,
        signature: algorithm.clone(),
        issuer: name.clone(),
        validity: Validity::from_now(Duration::from_secs(u64::from(validity_days) * 86_400))?,
        subject: name,
        subject_public_key_info: spki,
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: None,
    };
    let signature = key.sign(&tbs.to_der()?)?;
    let cert = Certificate {
        tbs_certificate: tbs,
        signature_algorithm: algorithm,
        signature: BitString::from_bytes(&signature)?,
    };
    Ok(cert.to_der()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::SignatureAlgorithm;

    #[test]
    fn test_self_signed_p256() {
        let key = SigningKey::generate_p256();
        let der = self_signed("CN=Test Signer", &key, 30).unwrap();
        let info = inspect(&der).unwrap();
        assert!(info.subject.contains("Test Signer"));
        assert_eq!(info.subject, info.issuer);
        assert!(info.not_after > info.not_before);
        assert_eq!(public_key(&der).unwrap(), key.verifying_key());
    }

    #[test]
    fn test_self_signed_signature_verifies() {
        let key = SigningKey::generate_p256();
        let der = self_signed("CN=Check", &key, 1).unwrap();
        let cert = Certificate::from_der(&der).unwrap();
        let tbs = cert.tbs_certificate.to_der().unwrap();
        key.verifying_key()
            .verify(
                SignatureAlgorithm::EcdsaP256Sha256,
                &tbs,
                cert.signature.raw_bytes(),
            )
            .unwrap();
    }

    #[test]
    fn test_p256_public_key() {
        let key = SigningKey::generate_p256();
        let der = self_signed("CN=Wrap", &key, 1).unwrap();
        assert!(p256_public_key(&der).is_ok());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(inspect(b"not a certificate").is_err());
        assert!(to_der(b"not a certificate").is_err());
    }
}
