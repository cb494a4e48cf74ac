//! CMS `SignedData` envelopes.
//!
//! Two layouts are written. The plain one carries the signed bytes as
//! encapsulated content and signs them directly:
//!
//! ```text
//! ContentInfo { id-signedData,
//!   SignedData { version 1, digestAlgorithms,
//!     encapContentInfo { id-data, eContent OCTET STRING },
//!     certificates [0] { signer },
//!     signerInfos { SignerInfo { sid = IssuerAndSerialNumber, ... } } } }
//! ```
//!
//! The GB/T 35275 PKCS#9 layout leaves the content out and signs a set of
//! signed attributes instead: `contentType`, `signingTime` and
//! `messageDigest` over the signed bytes. Readers accept both.

use super::types::SigningCredentials;
use crate::crypto::{SignatureAlgorithm, VerifyingKey};
use crate::digest::{self, DigestAlgorithm};
use crate::error::{Error, Result};
use cms::cert::{CertificateChoices, IssuerAndSerialNumber};
use cms::content_info::{CmsVersion, ContentInfo};
use cms::signed_data::{
    CertificateSet, EncapsulatedContentInfo, SignedAttributes, SignedData, SignerIdentifier,
    SignerInfo, SignerInfos,
};
use der::asn1::{ObjectIdentifier, OctetString, SetOfVec, UtcTime};
use der::{Any, Decode, Encode, Tag, Tagged};
use spki::AlgorithmIdentifierOwned;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use x509_cert::attr::Attribute;
use x509_cert::Certificate;

const ID_SIGNED_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");
const ID_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.1");
const ID_CONTENT_TYPE: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.3");
const ID_MESSAGE_DIGEST: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.4");
const ID_SIGNING_TIME: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.5");

/// Whether `bytes` decode as a `ContentInfo` of type signed-data.
pub fn is_signed_data(bytes: &[u8]) -> bool {
    ContentInfo::from_der(bytes)
        .map(|ci| ci.content_type == ID_SIGNED_DATA)
        .unwrap_or(false)
}

/// Sign `tbs` and wrap the value in a CMS envelope.
pub fn seal(tbs: &[u8], credentials: &SigningCredentials) -> Result<Vec<u8>> {
    let signature = credentials.key.sign(tbs)?;
    let econtent = Any::new(Tag::OctetString, tbs.to_vec())?;
    build(credentials, Some(econtent), None, signature)
}

/// Sign `tbs` through PKCS#9 signed attributes, leaving the content detached.
pub fn seal_with_attributes(tbs: &[u8], credentials: &SigningCredentials) -> Result<Vec<u8>> {
    let alg = credentials.algorithm();
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| Error::InvalidState(format!("system clock precedes the Unix epoch: {}", e)))?;
    let attrs = SetOfVec::try_from(vec![
        attribute(ID_CONTENT_TYPE, &ID_DATA)?,
        attribute(ID_SIGNING_TIME, &UtcTime::from_unix_duration(Duration::from_secs(now.as_secs()))?)?,
        attribute(ID_MESSAGE_DIGEST, &OctetString::new(digest::compute(alg.digest(), tbs)?)?)?,
    ])?;
    let signature = credentials.key.sign(&attrs.to_der()?)?;
    build(credentials, None, Some(attrs), signature)
}

fn attribute(oid: ObjectIdentifier, value: &impl Encode) -> Result<Attribute> {
    Ok(Attribute {
        oid,
        values: SetOfVec::try_from(vec![Any::from_der(&value.to_der()?)?])?,
    })
}

fn build(
    credentials: &SigningCredentials,
    econtent: Option<Any>,
    signed_attrs: Option<SignedAttributes>,
    signature: Vec<u8>,
) -> Result<Vec<u8>> {
    let cert = Certificate::from_der(&credentials.certificate)?;
    let alg = credentials.algorithm();
    let digest_alg = AlgorithmIdentifierOwned {
        oid: alg.digest().oid(),
        parameters: None,
    };

    let signer_info = SignerInfo {
        version: CmsVersion::V1,
        sid: SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
            issuer: cert.tbs_certificate.issuer.clone(),
            serial_number: cert.tbs_certificate.serial_number.clone(),
        }),
        digest_alg: digest_alg.clone(),
        signed_attrs,
        signature_algorithm: alg.algorithm_identifier(),
        signature: OctetString::new(signature)?,
        unsigned_attrs: None,
    };

    let mut certificates = vec![CertificateChoices::Certificate(cert)];
    for extra in &credentials.chain {
        certificates.push(CertificateChoices::Certificate(Certificate::from_der(extra)?));
    }

    let signed_data = SignedData {
        version: CmsVersion::V1,
        digest_algorithms: SetOfVec::try_from(vec![digest_alg])?,
        encap_content_info: EncapsulatedContentInfo {
            econtent_type: ID_DATA,
            econtent,
        },
        certificates: Some(CertificateSet(SetOfVec::try_from(certificates)?)),
        crls: None,
        signer_infos: SignerInfos(SetOfVec::try_from(vec![signer_info])?),
    };
    let content_info = ContentInfo {
        content_type: ID_SIGNED_DATA,
        content: Any::from_der(&signed_data.to_der()?)?,
    };
    Ok(content_info.to_der()?)
}

fn single_value<'a>(attrs: &'a SignedAttributes, oid: ObjectIdentifier) -> Result<&'a Any> {
    let attr = attrs.iter().find(|a| a.oid == oid).ok_or_else(|| {
        Error::InvalidSignedValue(format!("signed attribute {} is missing", oid))
    })?;
    match attr.values.as_slice() {
        [value] => Ok(value),
        values => Err(Error::InvalidSignedValue(format!(
            "signed attribute {} has {} values",
            oid,
            values.len()
        ))),
    }
}

/// Check `contentType` and `messageDigest`; returns the bytes the signature covers.
fn signed_attributes_message(
    attrs: &SignedAttributes,
    digest_alg: &AlgorithmIdentifierOwned,
    tbs: &[u8],
) -> Result<Vec<u8>> {
    let content_type = ObjectIdentifier::from_der(&single_value(attrs, ID_CONTENT_TYPE)?.to_der()?)?;
    if content_type != ID_DATA {
        return Err(Error::InvalidSignedValue(format!(
            "signed content type {} is not data",
            content_type
        )));
    }
    let recorded = OctetString::from_der(&single_value(attrs, ID_MESSAGE_DIGEST)?.to_der()?)?;
    let actual = digest::compute(DigestAlgorithm::from_oid(&digest_alg.oid)?, tbs)?;
    if !digest::digest_eq(&actual, recorded.as_bytes()) {
        return Err(Error::InvalidSignedValue(
            "messageDigest differs from the signed file".to_string(),
        ));
    }
    Ok(attrs.to_der()?)
}

/// Open an envelope and check it signs exactly `tbs`.
///
/// The signer certificate is located by issuer and serial number. When
/// `pinned` is given, the certificate's key must equal it.
pub fn open(tbs: &[u8], envelope: &[u8], pinned: Option<&VerifyingKey>) -> Result<()> {
    let content_info = ContentInfo::from_der(envelope)?;
    if content_info.content_type != ID_SIGNED_DATA {
        return Err(Error::InvalidSignedValue(format!(
            "content type {} is not signed-data",
            content_info.content_type
        )));
    }
    let signed_data = SignedData::from_der(&content_info.content.to_der()?)?;

    let signer_info = match signed_data.signer_infos.0.as_slice() {
        [info] => info,
        infos => {
            return Err(Error::InvalidSignedValue(format!(
                "expected one signer, found {}",
                infos.len()
            )))
        },
    };

    match &signed_data.encap_content_info.econtent {
        Some(econtent) => {
            if econtent.tag() != Tag::OctetString || econtent.value() != tbs {
                return Err(Error::InvalidSignedValue(
                    "encapsulated content differs from the signed file".to_string(),
                ));
            }
        },
        None if signer_info.signed_attrs.is_some() => {},
        None => {
            return Err(Error::InvalidSignedValue(
                "envelope has neither encapsulated content nor signed attributes".to_string(),
            ))
        },
    }
    let message = match &signer_info.signed_attrs {
        Some(attrs) => signed_attributes_message(attrs, &signer_info.digest_alg, tbs)?,
        None => tbs.to_vec(),
    };
    let sid = match &signer_info.sid {
        SignerIdentifier::IssuerAndSerialNumber(sid) => sid,
        SignerIdentifier::SubjectKeyIdentifier(_) => {
            return Err(Error::UnsupportedAlgorithm(
                "signer identified by subject key identifier".to_string(),
            ))
        },
    };

    let cert = signed_data
        .certificates
        .as_ref()
        .and_then(|set| {
            set.0.iter().find_map(|choice| match choice {
                CertificateChoices::Certificate(cert)
                    if cert.tbs_certificate.issuer == sid.issuer
                        && cert.tbs_certificate.serial_number == sid.serial_number =>
                {
                    Some(cert)
                },
                _ => None,
            })
        })
        .ok_or_else(|| {
            Error::InvalidSignedValue("signer certificate is not in the envelope".to_string())
        })?;

    let key = VerifyingKey::from_spki_der(&cert.tbs_certificate.subject_public_key_info.to_der()?)?;
    if let Some(pinned) = pinned {
        if *pinned != key {
            return Err(Error::InvalidSignedValue(
                "envelope was signed by a different key".to_string(),
            ));
        }
    }
    let alg = SignatureAlgorithm::from_oid(&signer_info.signature_algorithm.oid)?;
    key.verify(alg, &message, signer_info.signature.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_round_trip() {
        let creds = SigningCredentials::self_signed("CN=Envelope").unwrap();
        let env = seal(b"signature file", &creds).unwrap();
        assert!(is_signed_data(&env));
        open(b"signature file", &env, None).unwrap();
        open(b"signature file", &env, Some(&creds.verifying_key())).unwrap();
    }

    #[test]
    fn test_envelope_rejects_other_content() {
        let creds = SigningCredentials::self_signed("CN=Envelope").unwrap();
        let env = seal(b"original", &creds).unwrap();
        assert!(matches!(open(b"replaced", &env, None), Err(Error::InvalidSignedValue(_))));
    }

    #[test]
    fn test_envelope_rejects_foreign_key() {
        let creds = SigningCredentials::self_signed("CN=Envelope").unwrap();
        let other = SigningCredentials::self_signed("CN=Someone Else").unwrap();
        let env = seal(b"x", &creds).unwrap();
        assert!(matches!(
            open(b"x", &env, Some(&other.verifying_key())),
            Err(Error::InvalidSignedValue(_))
        ));
    }

    #[test]
    fn test_envelope_rejects_substituted_certificate() {
        let creds = SigningCredentials::self_signed("CN=Envelope").unwrap();
        let other = SigningCredentials::self_signed("CN=Envelope").unwrap();
        let env = seal(b"x", &creds).unwrap();

        let ci = ContentInfo::from_der(&env).unwrap();
        let mut sd = SignedData::from_der(&ci.content.to_der().unwrap()).unwrap();
        let foreign = Certificate::from_der(&other.certificate).unwrap();
        sd.certificates = Some(CertificateSet(
            SetOfVec::try_from(vec![CertificateChoices::Certificate(foreign)]).unwrap(),
        ));
        let forged = ContentInfo {
            content_type: ID_SIGNED_DATA,
            content: Any::from_der(&sd.to_der().unwrap()).unwrap(),
        }
        .to_der()
        .unwrap();
        assert!(matches!(open(b"x", &forged, None), Err(Error::InvalidSignedValue(_))));
    }

    #[test]
    fn test_signed_attributes_round_trip() {
        let creds = SigningCredentials::self_signed("CN=Envelope").unwrap();
        let env = seal_with_attributes(b"signature file", &creds).unwrap();
        assert!(is_signed_data(&env));

        let ci = ContentInfo::from_der(&env).unwrap();
        let sd = SignedData::from_der(&ci.content.to_der().unwrap()).unwrap();
        assert!(sd.encap_content_info.econtent.is_none());
        let attrs = sd.signer_infos.0.as_slice()[0].signed_attrs.as_ref().unwrap();
        assert_eq!(attrs.len(), 3);
        single_value(attrs, ID_SIGNING_TIME).unwrap();

        open(b"signature file", &env, Some(&creds.verifying_key())).unwrap();
        assert!(matches!(
            open(b"other file", &env, None),
            Err(Error::InvalidSignedValue(_))
        ));
    }

    #[test]
    fn test_signed_attributes_tampered_digest() {
        let creds = SigningCredentials::self_signed("CN=Envelope").unwrap();
        let env = seal_with_attributes(b"x", &creds).unwrap();

        let ci = ContentInfo::from_der(&env).unwrap();
        let mut sd = SignedData::from_der(&ci.content.to_der().unwrap()).unwrap();
        let mut infos: Vec<SignerInfo> = sd.signer_infos.0.into_vec();
        let forged_digest = OctetString::new(digest::compute(DigestAlgorithm::Sha256, b"y").unwrap()).unwrap();
        infos[0].signed_attrs = Some(
            SetOfVec::try_from(vec![
                attribute(ID_CONTENT_TYPE, &ID_DATA).unwrap(),
                attribute(ID_MESSAGE_DIGEST, &forged_digest).unwrap(),
            ])
            .unwrap(),
        );
        sd.signer_infos = SignerInfos(SetOfVec::try_from(infos).unwrap());
        let forged = ContentInfo {
            content_type: ID_SIGNED_DATA,
            content: Any::from_der(&sd.to_der().unwrap()).unwrap(),
        }
        .to_der()
        .unwrap();
        // digest matches "y", but the signature covered the original attributes
        assert!(matches!(open(b"y", &forged, None), Err(Error::InvalidSignedValue(_))));
    }

    #[test]
    fn test_not_signed_data() {
        assert!(!is_signed_data(b"\x30\x03\x02\x01\x01"));
        assert!(!is_signed_data(b"junk"));
    }
}
