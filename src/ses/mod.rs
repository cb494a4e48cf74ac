//! Electronic seal (SES) codec.
//!
//! Two incompatible ASN.1 generations exist: v1 from GM/T 0031 and v4 from
//! GB/T 38540. They are told apart by the number of elements in the outer
//! SEQUENCE, so a blob is decoded with exactly one schema and never retried
//! with the other.
//!
//! ```text
//!              SESeal   SES_Signature
//!   v1           2            2
//!   v4           4          4 or 5
//! ```

pub mod common;
pub mod v1;
pub mod v4;

use crate::crypto::{cert, SignatureAlgorithm};
use crate::digest;
use crate::error::{Error, Result};
use crate::signatures::types::SigningCredentials;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use common::{ExtData, PictureInfo, SealBytes, SealTime, SesHeader};
use der::asn1::{AnyRef, BitString, Ia5String, ObjectIdentifier, OctetString};
use der::{Decode, Encode, Reader, SliceReader, Tag, Tagged};
use std::time::Duration;

/// Seal structure generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SealVersion {
    /// GM/T 0031
    V1,
    /// GB/T 38540
    V4,
}

impl SealVersion {
    /// Number written into `SES_Header.version`.
    pub fn number(&self) -> u32 {
        match self {
            SealVersion::V1 => v1::VERSION,
            SealVersion::V4 => v4::VERSION,
        }
    }
}

impl std::fmt::Display for SealVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.number())
    }
}

/// Count the elements of the outer SEQUENCE.
fn outer_arity(bytes: &[u8]) -> Result<usize> {
    let outer = match AnyRef::from_der(bytes) {
        Ok(any) if any.tag() == Tag::Sequence => any,
        _ => return Err(Error::UnknownSealVersion { arity: 0 }),
    };
    let mut reader = SliceReader::new(outer.value())?;
    let mut arity = 0;
    while !reader.is_finished() {
        AnyRef::decode(&mut reader)?;
        arity += 1;
    }
    Ok(arity)
}

/// Detect the version of an `SESeal` blob.
pub fn detect_seal(bytes: &[u8]) -> Result<SealVersion> {
    match outer_arity(bytes)? {
        2 => Ok(SealVersion::V1),
        4 => Ok(SealVersion::V4),
        arity => Err(Error::UnknownSealVersion { arity }),
    }
}

/// Detect the version of an `SES_Signature` blob.
pub fn detect_signature(bytes: &[u8]) -> Result<SealVersion> {
    match outer_arity(bytes)? {
        2 => Ok(SealVersion::V1),
        4 | 5 => Ok(SealVersion::V4),
        arity => Err(Error::UnknownSealVersion { arity }),
    }
}

/// A decoded seal of either version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SealSchema {
    /// Version 1 seal
    V1(v1::SeSeal),
    /// Version 4 seal
    V4(v4::SeSeal),
}

impl SealSchema {
    /// Detect the version and decode with that schema only.
    pub fn from_der(bytes: &[u8]) -> Result<Self> {
        match detect_seal(bytes)? {
            SealVersion::V1 => Ok(SealSchema::V1(v1::SeSeal::from_der_checked(bytes)?)),
            SealVersion::V4 => Ok(SealSchema::V4(v4::SeSeal::from_der_checked(bytes)?)),
        }
    }

    /// Encode to DER.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        match self {
            SealSchema::V1(seal) => seal.to_der_bytes(),
            SealSchema::V4(seal) => seal.to_der_bytes(),
        }
    }

    /// Structure generation.
    pub fn version(&self) -> SealVersion {
        match self {
            SealSchema::V1(_) => SealVersion::V1,
            SealSchema::V4(_) => SealVersion::V4,
        }
    }

    /// Seal identifier.
    pub fn es_id(&self) -> &str {
        match self {
            SealSchema::V1(seal) => seal.eseal_info.es_id.as_str(),
            SealSchema::V4(seal) => seal.e_seal_info.es_id.as_str(),
        }
    }

    /// Seal name.
    pub fn name(&self) -> &str {
        match self {
            SealSchema::V1(seal) => &seal.eseal_info.property.name,
            SealSchema::V4(seal) => &seal.e_seal_info.property.name,
        }
    }

    /// Seal image.
    pub fn picture(&self) -> &PictureInfo {
        match self {
            SealSchema::V1(seal) => &seal.eseal_info.picture,
            SealSchema::V4(seal) => &seal.e_seal_info.picture,
        }
    }

    /// Seal maker certificate.
    pub fn maker_cert(&self) -> &[u8] {
        match self {
            SealSchema::V1(seal) => seal.sign_info.cert.as_bytes(),
            SealSchema::V4(seal) => seal.cert.as_bytes(),
        }
    }
}

/// Verify the seal maker's signature with the certificate embedded in the seal.
pub fn verify_seal(seal: &SealSchema) -> Result<()> {
    let (cert_der, alg_oid, message, value) = match seal {
        SealSchema::V1(s) => (
            s.sign_info.cert.as_bytes(),
            &s.sign_info.signature_algorithm,
            s.eseal_info.to_der()?,
            s.sign_info.sign_data.raw_bytes(),
        ),
        SealSchema::V4(s) => (
            s.cert.as_bytes(),
            &s.sign_alg_id,
            s.maker_message()?,
            s.signed_value.raw_bytes(),
        ),
    };
    let alg = SignatureAlgorithm::from_oid(alg_oid)?;
    let key = cert::public_key(cert_der)?;
    key.verify(alg, &message, value).map_err(|e| match e {
        Error::InvalidSignedValue(msg) => {
            Error::SesInvalid(format!("seal maker signature does not verify: {}", msg))
        },
        other => other,
    })
}

/// A decoded signature value of either version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureSchema {
    /// Version 1 signature
    V1(v1::SesSignature),
    /// Version 4 signature
    V4(v4::SesSignature),
}

impl SignatureSchema {
    /// Detect the version and decode with that schema only.
    pub fn from_der(bytes: &[u8]) -> Result<Self> {
        match detect_signature(bytes)? {
            SealVersion::V1 => Ok(SignatureSchema::V1(v1::SesSignature::from_der_checked(bytes)?)),
            SealVersion::V4 => Ok(SignatureSchema::V4(v4::SesSignature::from_der_checked(bytes)?)),
        }
    }

    /// Encode to DER.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        Ok(match self {
            SignatureSchema::V1(sig) => sig.to_der()?,
            SignatureSchema::V4(sig) => sig.to_der()?,
        })
    }

    /// Structure generation.
    pub fn version(&self) -> SealVersion {
        match self {
            SignatureSchema::V1(_) => SealVersion::V1,
            SignatureSchema::V4(_) => SealVersion::V4,
        }
    }

    /// The seal embedded in `toSign`.
    pub fn seal(&self) -> SealSchema {
        match self {
            SignatureSchema::V1(sig) => SealSchema::V1(sig.to_sign.eseal.clone()),
            SignatureSchema::V4(sig) => SealSchema::V4(sig.to_sign.eseal.clone()),
        }
    }

    /// Certificate of the stamping party.
    pub fn signer_cert(&self) -> &[u8] {
        match self {
            SignatureSchema::V1(sig) => sig.signer_cert(),
            SignatureSchema::V4(sig) => sig.cert.as_bytes(),
        }
    }

    /// Algorithm of the stamping signature.
    pub fn signature_algorithm(&self) -> &ObjectIdentifier {
        match self {
            SignatureSchema::V1(sig) => &sig.to_sign.signature_algorithm,
            SignatureSchema::V4(sig) => &sig.signature_alg_id,
        }
    }

    /// Recorded digest of the signed content.
    pub fn data_hash(&self) -> &[u8] {
        match self {
            SignatureSchema::V1(sig) => sig.to_sign.data_hash.as_bytes(),
            SignatureSchema::V4(sig) => sig.to_sign.data_hash.raw_bytes(),
        }
    }

    /// Container path the signature claims to cover.
    pub fn property_info(&self) -> &str {
        match self {
            SignatureSchema::V1(sig) => sig.to_sign.property_info.as_str(),
            SignatureSchema::V4(sig) => sig.to_sign.property_info.as_str(),
        }
    }

    /// Timestamp token, v4 only.
    pub fn time_stamp(&self) -> Option<&[u8]> {
        match self {
            SignatureSchema::V1(_) => None,
            SignatureSchema::V4(sig) => sig.time_stamp.as_ref().map(BitString::raw_bytes),
        }
    }

    /// Check the content digest, then the signature over DER(`toSign`).
    pub fn verify(&self, content: &[u8]) -> Result<()> {
        let alg = SignatureAlgorithm::from_oid(self.signature_algorithm())?;
        let actual = digest::compute(alg.digest(), content)?;
        if !digest::digest_eq(&actual, self.data_hash()) {
            return Err(Error::InvalidSignedValue(format!(
                "content digest does not match dataHash of {}",
                self.property_info()
            )));
        }
        let (tbs, value) = match self {
            SignatureSchema::V1(sig) => (sig.to_sign.to_der()?, sig.signature.raw_bytes()),
            SignatureSchema::V4(sig) => (sig.to_sign.to_der()?, sig.signature.raw_bytes()),
        };
        cert::public_key(self.signer_cert())?.verify(alg, &tbs, value)
    }
}

/// Callback turning a signature value into a timestamp token.
pub type TimeStampHook = Box<dyn Fn(&[u8]) -> Result<Option<Vec<u8>>> + Send + Sync>;

/// Produce an `SES_Signature` over `content` that embeds `seal`.
///
/// The seal version decides the signature version. `property_info` is the
/// container path of `content`.
pub fn sign_content(
    seal: &SealSchema,
    signer: &SigningCredentials,
    content: &[u8],
    property_info: &str,
    time_stamp: Option<&TimeStampHook>,
) -> Result<SignatureSchema> {
    let alg = signer.algorithm();
    let data_hash = BitString::from_bytes(&digest::compute(alg.digest(), content)?)?;
    let property_info = Ia5String::new(property_info)?;
    let now = Utc::now();
    match seal {
        SealSchema::V1(seal) => {
            let time_text = now.format("%Y-%m-%d %H:%M:%S").to_string();
            let to_sign = v1::TbsSign {
                version: v1::VERSION,
                eseal: seal.clone(),
                time_info: SealBytes::bits(time_text.as_bytes())?,
                data_hash: SealBytes::Bits(data_hash),
                property_info,
                cert: OctetString::new(signer.certificate.clone())?,
                signature_algorithm: alg.oid(),
            };
            let value = signer.key.sign(&to_sign.to_der()?)?;
            Ok(SignatureSchema::V1(v1::SesSignature {
                to_sign,
                signature: BitString::from_bytes(&value)?,
            }))
        },
        SealSchema::V4(seal) => {
            let to_sign = v4::TbsSign {
                version: v4::VERSION,
                eseal: seal.clone(),
                time_info: SealTime::generalized(unix(now)?)?,
                data_hash,
                property_info,
                ext_datas: None,
            };
            let value = signer.key.sign(&to_sign.to_der()?)?;
            let time_stamp = match time_stamp {
                Some(hook) => hook(&value)?
                    .map(|token| BitString::from_bytes(&token))
                    .transpose()?,
                None => None,
            };
            Ok(SignatureSchema::V4(v4::SesSignature {
                to_sign,
                cert: OctetString::new(signer.certificate.clone())?,
                signature_alg_id: alg.oid(),
                signature: BitString::from_bytes(&value)?,
                time_stamp,
            }))
        },
    }
}

fn unix(time: DateTime<Utc>) -> Result<Duration> {
    u64::try_from(time.timestamp())
        .map(Duration::from_secs)
        .map_err(|_| Error::InvalidArgument(format!("time {} precedes the Unix epoch", time)))
}

/// Issues maker-signed seals.
///
/// ```no_run
/// use ofd_oxide::ses::{SealBuilder, SealVersion};
/// use ofd_oxide::signatures::SigningCredentials;
///
/// let maker = SigningCredentials::self_signed("CN=Seal Maker")?;
/// let seal = SealBuilder::new(SealVersion::V4, "seal-001", "Contract seal")
///     .with_picture("png", std::fs::read("seal.png")?, 40, 40)
///     .build(&maker)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct SealBuilder {
    version: SealVersion,
    es_id: String,
    name: String,
    kind: u32,
    vendor: String,
    picture_kind: String,
    picture: Vec<u8>,
    picture_size: (u32, u32),
    holder_certs: Vec<Vec<u8>>,
    valid_start: DateTime<Utc>,
    valid_end: DateTime<Utc>,
    ext_datas: Option<Vec<ExtData>>,
}

impl SealBuilder {
    /// Start a seal valid for one year from now, with an empty PNG picture.
    pub fn new(version: SealVersion, es_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            version,
            es_id: es_id.into(),
            name: name.into(),
            kind: 1,
            vendor: crate::NAME.to_string(),
            picture_kind: "png".to_string(),
            picture: Vec::new(),
            picture_size: (40, 40),
            holder_certs: Vec::new(),
            valid_start: now,
            valid_end: now + ChronoDuration::days(365),
            ext_datas: None,
        }
    }

    /// Seal type, 1 for an official seal and 2 for a personal seal.
    pub fn with_kind(mut self, kind: u32) -> Self {
        self.kind = kind;
        self
    }

    /// Vendor identifier written into the header.
    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = vendor.into();
        self
    }

    /// Seal image and its display size in millimetres.
    pub fn with_picture(mut self, kind: &str, data: Vec<u8>, width: u32, height: u32) -> Self {
        self.picture_kind = kind.to_string();
        self.picture = data;
        self.picture_size = (width, height);
        self
    }

    /// Add a holder certificate (DER or PEM).
    pub fn with_holder_cert(mut self, cert: Vec<u8>) -> Self {
        self.holder_certs.push(cert);
        self
    }

    /// Validity window.
    pub fn with_validity(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.valid_start = start;
        self.valid_end = end;
        self
    }

    /// Add an extension.
    pub fn with_ext_data(mut self, ext: ExtData) -> Self {
        self.ext_datas.get_or_insert_with(Vec::new).push(ext);
        self
    }

    /// Assemble the seal and sign it with the maker's credentials.
    pub fn build(&self, maker: &SigningCredentials) -> Result<SealSchema> {
        if self.valid_start > self.valid_end {
            return Err(Error::SesInvalid(
                "seal validity starts after it ends".to_string(),
            ));
        }
        let header = SesHeader::new(self.version.number(), &self.vendor)?;
        let es_id = Ia5String::new(&self.es_id)?;
        let picture = PictureInfo::new(
            &self.picture_kind,
            self.picture.clone(),
            self.picture_size.0,
            self.picture_size.1,
        )?;
        let certs = self
            .holder_certs
            .iter()
            .map(|c| cert::to_der(c).and_then(|der| Ok(OctetString::new(der)?)))
            .collect::<Result<Vec<_>>>()?;
        let alg = maker.algorithm();
        let (start, end) = (unix(self.valid_start)?, unix(self.valid_end)?);
        let created = unix(Utc::now())?;

        let seal = match self.version {
            SealVersion::V1 => {
                let eseal_info = v1::SesSealInfo {
                    header,
                    es_id,
                    property: v1::SesEsPropertyInfo {
                        kind: self.kind,
                        name: self.name.clone(),
                        cert_list: certs,
                        create_date: SealTime::utc(created)?,
                        valid_start: SealTime::utc(start)?,
                        valid_end: SealTime::utc(end)?,
                    },
                    picture,
                    ext_datas: self.ext_datas.clone(),
                };
                let value = maker.key.sign(&eseal_info.to_der()?)?;
                SealSchema::V1(v1::SeSeal {
                    eseal_info,
                    sign_info: v1::SesSignInfo::new(
                        OctetString::new(maker.certificate.clone())?,
                        alg.oid(),
                        BitString::from_bytes(&value)?,
                    ),
                })
            },
            SealVersion::V4 => {
                let e_seal_info = v4::SesSealInfo {
                    header,
                    es_id,
                    property: v4::SesEsPropertyInfo {
                        kind: self.kind,
                        name: self.name.clone(),
                        cert_list: v4::CertList::Certs(certs),
                        create_date: SealTime::generalized(created)?,
                        valid_start: SealTime::generalized(start)?,
                        valid_end: SealTime::generalized(end)?,
                    },
                    picture,
                    ext_datas: self.ext_datas.clone(),
                };
                let message = v4::maker_message(&e_seal_info, &maker.certificate, &alg.oid())?;
                let value = maker.key.sign(&message)?;
                SealSchema::V4(v4::SeSeal {
                    e_seal_info,
                    cert: OctetString::new(maker.certificate.clone())?,
                    sign_alg_id: alg.oid(),
                    signed_value: BitString::from_bytes(&value)?,
                })
            },
        };
        log::debug!("issued {} seal '{}'", self.version, self.es_id);
        Ok(seal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    fn maker() -> SigningCredentials {
        SigningCredentials::self_signed("CN=Seal Maker").unwrap()
    }

    fn seal(version: SealVersion, maker: &SigningCredentials) -> SealSchema {
        SealBuilder::new(version, "es-001", "Contract seal")
            .with_picture("png", PNG.to_vec(), 40, 40)
            .build(maker)
            .unwrap()
    }

    #[test]
    fn test_detect_by_arity() {
        let maker = maker();
        let v1 = seal(SealVersion::V1, &maker).to_der().unwrap();
        let v4 = seal(SealVersion::V4, &maker).to_der().unwrap();
        assert_eq!(detect_seal(&v1).unwrap(), SealVersion::V1);
        assert_eq!(detect_seal(&v4).unwrap(), SealVersion::V4);
    }

    #[test]
    fn test_detect_rejects_other_shapes() {
        // SEQUENCE of three NULLs
        let three = [0x30, 0x06, 0x05, 0x00, 0x05, 0x00, 0x05, 0x00];
        assert!(matches!(
            detect_seal(&three),
            Err(Error::UnknownSealVersion { arity: 3 })
        ));
        // INTEGER, not a SEQUENCE
        assert!(matches!(
            detect_signature(&[0x02, 0x01, 0x05]),
            Err(Error::UnknownSealVersion { arity: 0 })
        ));
        assert!(matches!(
            detect_signature(b"not der"),
            Err(Error::UnknownSealVersion { arity: 0 })
        ));
    }

    #[test]
    fn test_seal_round_trip_and_maker_signature() {
        let maker = maker();
        for version in [SealVersion::V1, SealVersion::V4] {
            let seal = seal(version, &maker);
            let der = seal.to_der().unwrap();
            let back = SealSchema::from_der(&der).unwrap();
            assert_eq!(back, seal);
            assert_eq!(back.es_id(), "es-001");
            assert_eq!(back.name(), "Contract seal");
            verify_seal(&back).unwrap();
        }
    }

    #[test]
    fn test_tampered_seal_fails_maker_check() {
        let maker = maker();
        for version in [SealVersion::V1, SealVersion::V4] {
            let mut seal = seal(version, &maker);
            match &mut seal {
                SealSchema::V1(s) => s.eseal_info.property.name = "Forged".to_string(),
                SealSchema::V4(s) => s.e_seal_info.property.name = "Forged".to_string(),
            }
            assert!(matches!(verify_seal(&seal), Err(Error::SesInvalid(_))));
        }
    }

    #[test]
    fn test_inverted_validity_rejected() {
        let now = Utc::now();
        let result = SealBuilder::new(SealVersion::V4, "es", "n")
            .with_validity(now, now - ChronoDuration::days(1))
            .build(&maker());
        assert!(matches!(result, Err(Error::SesInvalid(_))));
    }

    #[test]
    fn test_sign_content_both_versions() {
        let maker = maker();
        let signer = SigningCredentials::self_signed("CN=Signer").unwrap();
        let content = b"<ofd:Signature/>";
        for version in [SealVersion::V1, SealVersion::V4] {
            let seal = seal(version, &maker);
            let sig = sign_content(&seal, &signer, content, "/Doc_0/Signs/Sign_0/Signature.xml", None)
                .unwrap();
            let der = sig.to_der().unwrap();
            assert_eq!(detect_signature(&der).unwrap(), version);
            let back = SignatureSchema::from_der(&der).unwrap();
            assert_eq!(back, sig);
            assert_eq!(back.seal(), seal);
            assert_eq!(back.property_info(), "/Doc_0/Signs/Sign_0/Signature.xml");
            back.verify(content).unwrap();
            assert!(matches!(
                back.verify(b"<ofd:Signature>changed</ofd:Signature>"),
                Err(Error::InvalidSignedValue(_))
            ));
        }
    }

    #[test]
    fn test_time_stamp_hook_adds_fifth_element() {
        let maker = maker();
        let signer = SigningCredentials::self_signed("CN=Signer").unwrap();
        let hook: TimeStampHook = Box::new(|value: &[u8]| Ok(Some(value[..8].to_vec())));
        let sig = sign_content(&seal(SealVersion::V4, &maker), &signer, b"x", "/a.xml", Some(&hook))
            .unwrap();
        let der = sig.to_der().unwrap();
        assert_eq!(outer_arity(&der).unwrap(), 5);
        let back = SignatureSchema::from_der(&der).unwrap();
        assert_eq!(back.time_stamp().map(<[u8]>::len), Some(8));
    }

    fn resign_v1(sig: &mut v1::SesSignature, signer: &SigningCredentials) {
        let value = signer.key.sign(&sig.to_sign.to_der().unwrap()).unwrap();
        sig.signature = BitString::from_bytes(&value).unwrap();
    }

    /// Encode, decode and re-encode; the bytes must survive unchanged.
    fn reparse_signature(sig: &SignatureSchema) -> (Vec<u8>, SignatureSchema) {
        let der = sig.to_der().unwrap();
        let back = SignatureSchema::from_der(&der).unwrap();
        assert_eq!(back.to_der().unwrap(), der);
        (der, back)
    }

    #[test]
    fn test_v4_time_info_with_millis() {
        let maker = maker();
        let signer = SigningCredentials::self_signed("CN=Signer").unwrap();
        let content = b"<ofd:Signature/>";
        let mut sig = match sign_content(&seal(SealVersion::V4, &maker), &signer, content, "/a.xml", None)
            .unwrap()
        {
            SignatureSchema::V4(sig) => sig,
            SignatureSchema::V1(_) => unreachable!(),
        };
        let mut time = vec![0x18, 19];
        time.extend_from_slice(b"20240101120000.123Z");
        sig.to_sign.time_info = SealTime::from_der(&time).unwrap();
        let value = signer.key.sign(&sig.to_sign.to_der().unwrap()).unwrap();
        sig.signature = BitString::from_bytes(&value).unwrap();

        let (der, back) = reparse_signature(&SignatureSchema::V4(sig));
        assert!(der.windows(time.len()).any(|w| w == time.as_slice()));
        back.verify(content).unwrap();
        match back {
            SignatureSchema::V4(sig) => assert_eq!(sig.to_sign.time_info.as_str(), "20240101120000.123Z"),
            SignatureSchema::V1(_) => unreachable!(),
        }
    }

    #[test]
    fn test_v1_seal_with_generalized_dates() {
        let maker = maker();
        let mut seal = match seal(SealVersion::V1, &maker) {
            SealSchema::V1(seal) => seal,
            SealSchema::V4(_) => unreachable!(),
        };
        let property = &mut seal.eseal_info.property;
        property.create_date = SealTime::generalized(Duration::from_secs(1_704_110_400)).unwrap();
        property.valid_start = SealTime::generalized(Duration::from_secs(1_704_110_400)).unwrap();
        property.valid_end = SealTime::generalized(Duration::from_secs(4_102_444_800)).unwrap();
        let value = maker.key.sign(&seal.eseal_info.to_der().unwrap()).unwrap();
        seal.sign_info.sign_data = BitString::from_bytes(&value).unwrap();

        let der = SealSchema::V1(seal.clone()).to_der().unwrap();
        let back = SealSchema::from_der(&der).unwrap();
        assert_eq!(back.to_der().unwrap(), der);
        assert_eq!(back, SealSchema::V1(seal));
        verify_seal(&back).unwrap();
        match back {
            SealSchema::V1(s) => assert_eq!(s.eseal_info.property.valid_end.as_str(), "21000101000000Z"),
            SealSchema::V4(_) => unreachable!(),
        }
    }

    #[test]
    fn test_v1_octet_string_time_and_hash() {
        let maker = maker();
        let signer = SigningCredentials::self_signed("CN=Signer").unwrap();
        let content = b"<ofd:Signature/>";
        let mut sig = match sign_content(&seal(SealVersion::V1, &maker), &signer, content, "/a.xml", None)
            .unwrap()
        {
            SignatureSchema::V1(sig) => sig,
            SignatureSchema::V4(_) => unreachable!(),
        };
        let hash = sig.to_sign.data_hash.as_bytes().to_vec();
        sig.to_sign.time_info = SealBytes::Octets(OctetString::new(b"2024-01-01 12:00:00".to_vec()).unwrap());
        sig.to_sign.data_hash = SealBytes::Octets(OctetString::new(hash).unwrap());
        resign_v1(&mut sig, &signer);

        let (_, back) = reparse_signature(&SignatureSchema::V1(sig));
        back.verify(content).unwrap();
        match &back {
            SignatureSchema::V1(sig) => {
                assert!(matches!(sig.to_sign.data_hash, SealBytes::Octets(_)));
                assert_eq!(sig.to_sign.time_info.as_bytes(), b"2024-01-01 12:00:00");
            },
            SignatureSchema::V4(_) => unreachable!(),
        }
        assert!(matches!(back.verify(b"other"), Err(Error::InvalidSignedValue(_))));
    }

    #[test]
    fn test_v1_sign_info_in_bit_string() {
        let maker = maker();
        let signer = SigningCredentials::self_signed("CN=Signer").unwrap();
        let content = b"<ofd:Signature/>";
        let mut seal = match seal(SealVersion::V1, &maker) {
            SealSchema::V1(seal) => seal,
            SealSchema::V4(_) => unreachable!(),
        };
        let plain = SealSchema::V1(seal.clone()).to_der().unwrap();
        seal.sign_info.bit_string_wrapped = true;
        let wrapped = SealSchema::V1(seal.clone()).to_der().unwrap();
        assert_ne!(wrapped, plain);

        let back = SealSchema::from_der(&wrapped).unwrap();
        assert_eq!(back.to_der().unwrap(), wrapped);
        assert_eq!(back, SealSchema::V1(seal));
        verify_seal(&back).unwrap();

        // The wrapped seal keeps its layout inside a stamping signature
        let sig = sign_content(&back, &signer, content, "/a.xml", None).unwrap();
        let (_, sig_back) = reparse_signature(&sig);
        assert_eq!(sig_back.seal(), back);
        sig_back.verify(content).unwrap();
    }
}
