//! ASN.1 structures shared by both seal versions.

use crate::error::{Error, Result};
use der::asn1::{AnyRef, BitString, Ia5String, ObjectIdentifier, OctetString, PrintableString};
use der::{Decode, Encode, Length, Reader, Sequence, Tag, Tagged, Writer};
use std::time::Duration;

/// Seal header magic.
pub const SEAL_HEADER_ID: &str = "ES";

/// Picture formats a seal may carry.
pub const PICTURE_FORMATS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "svg", "ofd"];

/// `ExtData ::= SEQUENCE { extnID OID, critical BOOLEAN DEFAULT FALSE, extnValue OCTET STRING }`
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct ExtData {
    /// Extension identifier
    pub extn_id: ObjectIdentifier,
    /// Whether a reader must understand the extension
    #[asn1(default = "Default::default")]
    pub critical: bool,
    /// Extension payload
    pub extn_value: OctetString,
}

/// `SES_Header ::= SEQUENCE { ID IA5String, version INTEGER, Vid IA5String }`
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct SesHeader {
    /// Always `"ES"`
    pub id: Ia5String,
    /// Structure version, 1 or 4
    pub version: u32,
    /// Vendor identifier
    pub vid: Ia5String,
}

impl SesHeader {
    /// Create a header for `version`.
    pub fn new(version: u32, vid: &str) -> Result<Self> {
        Ok(Self {
            id: Ia5String::new(SEAL_HEADER_ID)?,
            version,
            vid: Ia5String::new(vid)?,
        })
    }

    /// Check the magic and the expected version.
    pub fn validate(&self, version: u32) -> Result<()> {
        if self.id.as_str() != SEAL_HEADER_ID {
            return Err(Error::SesInvalid(format!(
                "seal header ID is '{}', expected '{}'",
                self.id.as_str(),
                SEAL_HEADER_ID
            )));
        }
        if self.version != version {
            return Err(Error::SesInvalid(format!(
                "seal header version is {}, expected {}",
                self.version, version
            )));
        }
        Ok(())
    }
}

/// `SES_ESPictrueInfo ::= SEQUENCE { type IA5String, data OCTET STRING, width INTEGER, height INTEGER }`
///
/// Width and height are in millimetres.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct PictureInfo {
    /// Image format, e.g. `png`
    pub kind: Ia5String,
    /// Image bytes
    pub data: OctetString,
    /// Display width
    pub width: u32,
    /// Display height
    pub height: u32,
}

impl PictureInfo {
    /// Create a picture record.
    pub fn new(kind: &str, data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let picture = Self {
            kind: Ia5String::new(kind)?,
            data: OctetString::new(data)?,
            width,
            height,
        };
        picture.validate()?;
        Ok(picture)
    }

    /// Check that the format is known and that raster data starts with its magic number.
    pub fn validate(&self) -> Result<()> {
        let kind = self.kind.as_str().to_ascii_lowercase();
        if !PICTURE_FORMATS.contains(&kind.as_str()) {
            return Err(Error::SesInvalid(format!("unsupported picture type '{}'", kind)));
        }
        let data = self.data.as_bytes();
        if data.is_empty() {
            return Ok(());
        }
        let magic: &[u8] = match kind.as_str() {
            "png" => b"\x89PNG\r\n\x1a\n",
            "jpg" | "jpeg" => b"\xff\xd8\xff",
            "gif" => b"GIF8",
            "bmp" => b"BM",
            _ => return Ok(()),
        };
        if !data.starts_with(magic) {
            return Err(Error::SesInvalid(format!(
                "picture data does not decode as {}",
                kind
            )));
        }
        Ok(())
    }
}

/// `CertDigestObj ::= SEQUENCE { type PrintableString, value OCTET STRING }`
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
pub struct CertDigestObj {
    /// Digest algorithm name
    pub kind: PrintableString,
    /// Certificate digest
    pub value: OctetString,
}

/// `UTCTime` or `GeneralizedTime`, re-encoded exactly as decoded.
///
/// Producers disagree on the time type of seal dates, and `GeneralizedTime`
/// values written from millisecond clocks carry fractional seconds. Both are
/// accepted here. Keeping the decoded text intact matters because these
/// values sit inside structures covered by a signature.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SealTime {
    tag: Tag,
    text: String,
    unix: Duration,
}

impl SealTime {
    /// `GeneralizedTime` at whole-second precision.
    pub fn generalized(unix: Duration) -> Result<Self> {
        let dt = der::DateTime::from_unix_duration(unix)?;
        let text = format!(
            "{:04}{:02}{:02}{:02}{:02}{:02}Z",
            dt.year(),
            dt.month(),
            dt.day(),
            dt.hour(),
            dt.minutes(),
            dt.seconds()
        );
        Ok(Self {
            tag: Tag::GeneralizedTime,
            text,
            unix: dt.unix_duration(),
        })
    }

    /// `UTCTime`; only years 1950 to 2049 can be written.
    pub fn utc(unix: Duration) -> Result<Self> {
        let dt = der::DateTime::from_unix_duration(unix)?;
        if !(1950..2050).contains(&dt.year()) {
            return Err(Error::InvalidArgument(format!(
                "year {} does not fit a UTCTime",
                dt.year()
            )));
        }
        let text = format!(
            "{:02}{:02}{:02}{:02}{:02}{:02}Z",
            dt.year() % 100,
            dt.month(),
            dt.day(),
            dt.hour(),
            dt.minutes(),
            dt.seconds()
        );
        Ok(Self {
            tag: Tag::UtcTime,
            text,
            unix: dt.unix_duration(),
        })
    }

    /// Offset from the Unix epoch, including any fractional seconds.
    pub fn to_unix_duration(&self) -> Duration {
        self.unix
    }

    /// Time text as stored.
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

fn parse_time(tag: Tag, text: &str) -> Option<Duration> {
    let body = text.strip_suffix('Z')?;
    let (digits, fraction) = match body.split_once('.') {
        Some((digits, fraction)) => (digits, Some(fraction)),
        None => (body, None),
    };
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let field = |range: std::ops::Range<usize>| digits.get(range)?.parse::<u8>().ok();
    let (year, rest) = match (tag, digits.len()) {
        (Tag::UtcTime, 12) if fraction.is_none() => {
            let yy = u16::from(field(0..2)?);
            (if yy < 50 { 2000 + yy } else { 1900 + yy }, 2)
        },
        (Tag::GeneralizedTime, 14) => (digits.get(0..4)?.parse::<u16>().ok()?, 4),
        _ => return None,
    };
    let dt = der::DateTime::new(
        year,
        field(rest..rest + 2)?,
        field(rest + 2..rest + 4)?,
        field(rest + 4..rest + 6)?,
        field(rest + 6..rest + 8)?,
        field(rest + 8..rest + 10)?,
    )
    .ok()?;
    let nanos = match fraction {
        Some(f) if f.is_empty() || f.len() > 9 || !f.bytes().all(|b| b.is_ascii_digit()) => {
            return None
        },
        Some(f) => format!("{:0<9}", f).parse::<u32>().ok()?,
        None => 0,
    };
    Some(dt.unix_duration() + Duration::from_nanos(u64::from(nanos)))
}

impl<'a> Decode<'a> for SealTime {
    fn decode<R: Reader<'a>>(reader: &mut R) -> der::Result<Self> {
        let any = AnyRef::decode(reader)?;
        let tag = any.tag();
        if tag != Tag::UtcTime && tag != Tag::GeneralizedTime {
            return Err(tag.unexpected_error(Some(Tag::GeneralizedTime)));
        }
        let text = std::str::from_utf8(any.value()).map_err(|_| tag.value_error())?;
        let unix = parse_time(tag, text).ok_or_else(|| tag.value_error())?;
        Ok(Self {
            tag,
            text: text.to_string(),
            unix,
        })
    }
}

impl Encode for SealTime {
    fn encoded_len(&self) -> der::Result<Length> {
        AnyRef::new(self.tag, self.text.as_bytes())?.encoded_len()
    }

    fn encode(&self, writer: &mut impl Writer) -> der::Result<()> {
        AnyRef::new(self.tag, self.text.as_bytes())?.encode(writer)
    }
}

/// `BIT STRING`, or the `OCTET STRING` some v1 producers write in its place.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SealBytes {
    /// Standard encoding
    Bits(BitString),
    /// Non-standard encoding, kept as found
    Octets(OctetString),
}

impl SealBytes {
    /// Standard `BIT STRING` form.
    pub fn bits(data: &[u8]) -> Result<Self> {
        Ok(SealBytes::Bits(BitString::from_bytes(data)?))
    }

    /// Payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            SealBytes::Bits(bits) => bits.raw_bytes(),
            SealBytes::Octets(octets) => octets.as_bytes(),
        }
    }
}

impl<'a> Decode<'a> for SealBytes {
    fn decode<R: Reader<'a>>(reader: &mut R) -> der::Result<Self> {
        match reader.peek_tag()? {
            Tag::BitString => Ok(SealBytes::Bits(reader.decode()?)),
            Tag::OctetString => Ok(SealBytes::Octets(reader.decode()?)),
            tag => Err(tag.unexpected_error(Some(Tag::BitString))),
        }
    }
}

impl Encode for SealBytes {
    fn encoded_len(&self) -> der::Result<Length> {
        match self {
            SealBytes::Bits(bits) => bits.encoded_len(),
            SealBytes::Octets(octets) => octets.encoded_len(),
        }
    }

    fn encode(&self, writer: &mut impl Writer) -> der::Result<()> {
        match self {
            SealBytes::Bits(bits) => bits.encode(writer),
            SealBytes::Octets(octets) => octets.encode(writer),
        }
    }
}

pub(crate) fn check_window<T: PartialOrd>(start: &T, end: &T) -> Result<()> {
    if start > end {
        return Err(Error::SesInvalid(
            "seal validity starts after it ends".to_string(),
        ));
    }
    Ok(())
}
