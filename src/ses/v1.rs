//! Electronic seal structures, version 1 (GM/T 0031).
//!
//! ```text
//! SESeal        ::= SEQUENCE { esealInfo SES_SealInfo, signInfo SES_SignInfo }
//! SES_Signature ::= SEQUENCE { toSign TBS_Sign, signature BIT STRING }
//! ```
//!
//! Both outer structures have two elements, which is what the version
//! detector keys on.
//!
//! Seals from non-conforming producers are read as well: dates as
//! `GeneralizedTime`, `timeInfo`/`dataHash` as OCTET STRING, and `signInfo`
//! wrapped in a BIT STRING. They are written back the way they were found.

use super::common::{check_window, ExtData, PictureInfo, SealBytes, SealTime, SesHeader};
use crate::error::{Error, Result};
use der::asn1::{BitString, Ia5String, ObjectIdentifier, OctetString};
use der::{Decode, Encode, Length, Reader, Sequence, SliceReader, Tag, Writer};

/// Version written into v1 headers and `TBS_Sign.version`.
pub const VERSION: u32 = 1;

/// `SES_ESPropertyInfo`
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct SesEsPropertyInfo {
    /// Seal type: 1 official seal, 2 personal seal
    pub kind: u32,
    /// Seal name
    pub name: String,
    /// Holder certificates (DER)
    pub cert_list: Vec<OctetString>,
    /// Creation time
    pub create_date: SealTime,
    /// Start of validity
    pub valid_start: SealTime,
    /// End of validity
    pub valid_end: SealTime,
}

/// `SES_SealInfo`
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct SesSealInfo {
    /// Header, version 1
    pub header: SesHeader,
    /// Seal identifier
    pub es_id: Ia5String,
    /// Seal properties
    pub property: SesEsPropertyInfo,
    /// Seal image
    pub picture: PictureInfo,
    /// Extensions
    #[asn1(optional = "true")]
    pub ext_datas: Option<Vec<ExtData>>,
}

/// `SES_SignInfo`: the seal maker's signature over DER(`SES_SealInfo`).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SesSignInfo {
    /// Seal maker certificate (DER)
    pub cert: OctetString,
    /// Maker signature algorithm
    pub signature_algorithm: ObjectIdentifier,
    /// Maker signature value
    pub sign_data: BitString,
    /// The SEQUENCE was found inside a BIT STRING
    pub bit_string_wrapped: bool,
}

#[derive(Sequence)]
struct SignInfoBody {
    cert: OctetString,
    signature_algorithm: ObjectIdentifier,
    sign_data: BitString,
}

impl SesSignInfo {
    /// Standard SEQUENCE form.
    pub fn new(cert: OctetString, signature_algorithm: ObjectIdentifier, sign_data: BitString) -> Self {
        Self {
            cert,
            signature_algorithm,
            sign_data,
            bit_string_wrapped: false,
        }
    }

    fn body(&self) -> SignInfoBody {
        SignInfoBody {
            cert: self.cert.clone(),
            signature_algorithm: self.signature_algorithm,
            sign_data: self.sign_data.clone(),
        }
    }

    fn wrapped(&self) -> der::Result<BitString> {
        BitString::from_bytes(&self.body().to_der()?)
    }
}

impl<'a> Decode<'a> for SesSignInfo {
    fn decode<R: Reader<'a>>(reader: &mut R) -> der::Result<Self> {
        let (body, bit_string_wrapped) = match reader.peek_tag()? {
            Tag::BitString => {
                let bits = BitString::decode(reader)?;
                let mut inner = SliceReader::new(bits.raw_bytes())?;
                let body = SignInfoBody::decode(&mut inner)?;
                (inner.finish(body)?, true)
            },
            _ => (SignInfoBody::decode(reader)?, false),
        };
        Ok(Self {
            cert: body.cert,
            signature_algorithm: body.signature_algorithm,
            sign_data: body.sign_data,
            bit_string_wrapped,
        })
    }
}

impl Encode for SesSignInfo {
    fn encoded_len(&self) -> der::Result<Length> {
        if self.bit_string_wrapped {
            self.wrapped()?.encoded_len()
        } else {
            self.body().encoded_len()
        }
    }

    fn encode(&self, writer: &mut impl Writer) -> der::Result<()> {
        if self.bit_string_wrapped {
            self.wrapped()?.encode(writer)
        } else {
            self.body().encode(writer)
        }
    }
}

/// Version 1 electronic seal.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct SeSeal {
    /// Seal content
    pub eseal_info: SesSealInfo,
    /// Maker signature
    pub sign_info: SesSignInfo,
}

/// `TBS_Sign`: what the stamping party signs.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct TbsSign {
    /// Always 1
    pub version: u32,
    /// The seal, embedded by value
    pub eseal: SeSeal,
    /// Signing time as `yyyy-MM-dd HH:mm:ss` text
    pub time_info: SealBytes,
    /// Digest of the signed document part
    pub data_hash: SealBytes,
    /// Container path of the signed part
    pub property_info: Ia5String,
    /// Signer certificate (DER)
    pub cert: OctetString,
    /// Signer algorithm
    pub signature_algorithm: ObjectIdentifier,
}

/// Version 1 signature value.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct SesSignature {
    /// Signed content
    pub to_sign: TbsSign,
    /// Signature over DER(`to_sign`)
    pub signature: BitString,
}

impl SeSeal {
    /// Decode and check structural invariants.
    pub fn from_der_checked(bytes: &[u8]) -> Result<Self> {
        let seal = Self::from_der(bytes)?;
        seal.validate()?;
        Ok(seal)
    }

    /// Check header, validity window and picture.
    pub fn validate(&self) -> Result<()> {
        let info = &self.eseal_info;
        info.header.validate(VERSION)?;
        check_window(
            &info.property.valid_start.to_unix_duration(),
            &info.property.valid_end.to_unix_duration(),
        )?;
        info.picture.validate()
    }

    /// Encode to DER.
    pub fn to_der_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.to_der()?)
    }
}

impl SesSignature {
    /// Signer certificate carried in `to_sign`.
    pub fn signer_cert(&self) -> &[u8] {
        self.to_sign.cert.as_bytes()
    }

    /// Decode and check the embedded seal.
    pub fn from_der_checked(bytes: &[u8]) -> Result<Self> {
        let sig = Self::from_der(bytes)?;
        if sig.to_sign.version != VERSION {
            return Err(Error::SesInvalid(format!(
                "TBS_Sign version is {}, expected {}",
                sig.to_sign.version, VERSION
            )));
        }
        sig.to_sign.eseal.validate()?;
        Ok(sig)
    }
}
