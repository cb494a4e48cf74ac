//! Electronic seal structures, version 4 (GB/T 38540).
//!
//! ```text
//! SESeal        ::= SEQUENCE { eSealInfo, cert, signAlgID, signedValue }
//! SES_Signature ::= SEQUENCE { toSign, cert, signatureAlgID, signature, timeStamp [0] OPTIONAL }
//! ```

use super::common::{check_window, CertDigestObj, ExtData, PictureInfo, SealTime, SesHeader};
use crate::error::{Error, Result};
use der::asn1::{BitString, Ia5String, ObjectIdentifier, OctetString};
use der::{
    Decode, DecodeValue, Encode, EncodeValue, Header, Length, Reader, Sequence, Tag, Writer,
};

/// Version written into v4 headers and `TBS_Sign.version`.
pub const VERSION: u32 = 4;

/// `SES_CertList`, discriminated by `certListType` in the enclosing property.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CertList {
    /// `certListType = 1`: holder certificates
    Certs(Vec<OctetString>),
    /// `certListType = 2`: holder certificate digests
    Digests(Vec<CertDigestObj>),
}

impl CertList {
    /// Value of `certListType`.
    pub fn list_type(&self) -> u32 {
        match self {
            CertList::Certs(_) => 1,
            CertList::Digests(_) => 2,
        }
    }
}

/// `SES_ESPropertyInfo`
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SesEsPropertyInfo {
    /// Seal type: 1 official seal, 2 personal seal
    pub kind: u32,
    /// Seal name
    pub name: String,
    /// Holder certificates or their digests
    pub cert_list: CertList,
    /// Creation time
    pub create_date: SealTime,
    /// Start of validity
    pub valid_start: SealTime,
    /// End of validity
    pub valid_end: SealTime,
}

impl<'a> DecodeValue<'a> for SesEsPropertyInfo {
    fn decode_value<R: Reader<'a>>(reader: &mut R, header: Header) -> der::Result<Self> {
        reader.read_nested(header.length, |reader| {
            let kind = reader.decode()?;
            let name = reader.decode()?;
            let list_type: u32 = reader.decode()?;
            let cert_list = match list_type {
                1 => CertList::Certs(reader.decode()?),
                2 => CertList::Digests(reader.decode()?),
                _ => return Err(Tag::Integer.value_error()),
            };
            Ok(Self {
                kind,
                name,
                cert_list,
                create_date: reader.decode()?,
                valid_start: reader.decode()?,
                valid_end: reader.decode()?,
            })
        })
    }
}

impl EncodeValue for SesEsPropertyInfo {
    fn value_len(&self) -> der::Result<Length> {
        let list_len = match &self.cert_list {
            CertList::Certs(certs) => certs.encoded_len()?,
            CertList::Digests(digests) => digests.encoded_len()?,
        };
        [
            self.kind.encoded_len()?,
            self.name.encoded_len()?,
            self.cert_list.list_type().encoded_len()?,
            list_len,
            self.create_date.encoded_len()?,
            self.valid_start.encoded_len()?,
            self.valid_end.encoded_len()?,
        ]
        .into_iter()
        .try_fold(Length::ZERO, |acc, len| acc + len)
    }

    fn encode_value(&self, writer: &mut impl Writer) -> der::Result<()> {
        self.kind.encode(writer)?;
        self.name.encode(writer)?;
        self.cert_list.list_type().encode(writer)?;
        match &self.cert_list {
            CertList::Certs(certs) => certs.encode(writer)?,
            CertList::Digests(digests) => digests.encode(writer)?,
        }
        self.create_date.encode(writer)?;
        self.valid_start.encode(writer)?;
        self.valid_end.encode(writer)
    }
}

impl<'a> Sequence<'a> for SesEsPropertyInfo {}

/// `SES_SealInfo`
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct SesSealInfo {
    /// Header, version 4
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

/// Version 4 electronic seal.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct SeSeal {
    /// Seal content
    pub e_seal_info: SesSealInfo,
    /// Seal maker certificate (DER)
    pub cert: OctetString,
    /// Maker signature algorithm
    pub sign_alg_id: ObjectIdentifier,
    /// Maker signature over `eSealInfo ‖ cert ‖ signAlgID`
    pub signed_value: BitString,
}

/// `TBS_Sign`: what the stamping party signs.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct TbsSign {
    /// Always 4
    pub version: u32,
    /// The seal, embedded by value
    pub eseal: SeSeal,
    /// Signing time
    pub time_info: SealTime,
    /// Digest of the signed document part
    pub data_hash: BitString,
    /// Container path of the signed part
    pub property_info: Ia5String,
    /// Extensions
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT", optional = "true")]
    pub ext_datas: Option<Vec<ExtData>>,
}

/// Version 4 signature value.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct SesSignature {
    /// Signed content
    pub to_sign: TbsSign,
    /// Signer certificate (DER)
    pub cert: OctetString,
    /// Signer algorithm
    pub signature_alg_id: ObjectIdentifier,
    /// Signature over DER(`to_sign`)
    pub signature: BitString,
    /// Timestamp token over `signature`
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT", optional = "true")]
    pub time_stamp: Option<BitString>,
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
        let info = &self.e_seal_info;
        info.header.validate(VERSION)?;
        check_window(
            &info.property.valid_start.to_unix_duration(),
            &info.property.valid_end.to_unix_duration(),
        )?;
        info.picture.validate()
    }

    /// Bytes the seal maker signs: DER(`eSealInfo`) ‖ `cert` ‖ DER(`signAlgID`).
    pub fn maker_message(&self) -> Result<Vec<u8>> {
        maker_message(&self.e_seal_info, self.cert.as_bytes(), &self.sign_alg_id)
    }

    /// Encode to DER.
    pub fn to_der_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.to_der()?)
    }
}

pub(crate) fn maker_message(
    info: &SesSealInfo,
    cert: &[u8],
    alg: &ObjectIdentifier,
) -> Result<Vec<u8>> {
    let mut message = info.to_der()?;
    message.extend_from_slice(cert);
    message.extend_from_slice(&alg.to_der()?);
    Ok(message)
}

impl SesSignature {
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn time(secs: u64) -> SealTime {
        SealTime::generalized(Duration::from_secs(secs)).unwrap()
    }

    fn property(cert_list: CertList) -> SesEsPropertyInfo {
        SesEsPropertyInfo {
            kind: 1,
            name: "Contract seal".to_string(),
            cert_list,
            create_date: time(1_600_000_000),
            valid_start: time(1_600_000_000),
            valid_end: time(1_900_000_000),
        }
    }

    #[test]
    fn test_cert_list_by_type() {
        let certs = property(CertList::Certs(vec![OctetString::new(vec![1, 2, 3]).unwrap()]));
        let der = certs.to_der().unwrap();
        assert_eq!(SesEsPropertyInfo::from_der(&der).unwrap(), certs);

        let digests = property(CertList::Digests(vec![CertDigestObj {
            kind: der::asn1::PrintableString::new("SHA256").unwrap(),
            value: OctetString::new(vec![9; 32]).unwrap(),
        }]));
        let der = digests.to_der().unwrap();
        assert_eq!(SesEsPropertyInfo::from_der(&der).unwrap(), digests);
    }

    #[test]
    fn test_cert_list_type_mismatch() {
        let digests = property(CertList::Digests(vec![CertDigestObj {
            kind: der::asn1::PrintableString::new("SHA256").unwrap(),
            value: OctetString::new(vec![9; 32]).unwrap(),
        }]));
        let mut der = digests.to_der().unwrap();
        // certListType is the INTEGER after the UTF8String name
        let name_len = "Contract seal".len();
        let type_pos = 2 + 3 + 2 + name_len + 2;
        assert_eq!(der[type_pos], 2);
        der[type_pos] = 1;
        assert!(SesEsPropertyInfo::from_der(&der).is_err());
    }

    #[test]
    fn test_unknown_cert_list_type() {
        let certs = property(CertList::Certs(Vec::new()));
        let mut der = certs.to_der().unwrap();
        let type_pos = 2 + 3 + 2 + "Contract seal".len() + 2;
        der[type_pos] = 7;
        assert!(SesEsPropertyInfo::from_der(&der).is_err());
    }
}
