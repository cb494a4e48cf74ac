//! `/OFDEntries.xml`, the package integrity manifest.
//!
//! ```xml
//! <ofd:DocEntries xmlns:ofd="http://www.ofdspec.org/2016" ID="1"
//!     CreatorName="ofd_oxide" Version="0.1.0" CreationDate="2024-01-01T12:00:00">
//!   <ofd:FileList CheckMethod="2.16.840.1.101.3.4.2.1">
//!     <ofd:File ID="2" FileLoc="/OFD.xml" CheckValue="..."/>
//!   </ofd:FileList>
//!   <ofd:SignedValueLoc>/signedvalue.dat</ofd:SignedValueLoc>
//! </ofd:DocEntries>
//! ```
//!
//! `CheckMethod` and `CheckValue` are optional; manifests without them only
//! pin the set of file names.

use super::Element;
use crate::container::ContainerPath;
use crate::digest::DigestAlgorithm;
use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Location of the manifest.
pub const ENTRIES_LOC: &str = "/OFDEntries.xml";

/// Default location of the manifest's signature value.
pub const SIGNED_VALUE_LOC: &str = "/signedvalue.dat";

/// One protected file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFile {
    /// Entry ID
    pub id: String,
    /// Absolute container path
    pub loc: ContainerPath,
    /// Digest of the file, when recorded
    pub check_value: Option<Vec<u8>>,
}

/// Parsed integrity manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocEntries {
    /// Manifest ID
    pub id: String,
    /// Producing software
    pub creator_name: Option<String>,
    /// Version of the producing software
    pub version: Option<String>,
    /// Creation time, as written
    pub creation_date: Option<String>,
    /// Digest algorithm of the `CheckValue`s
    pub check_method: Option<DigestAlgorithm>,
    /// Protected files in manifest order
    pub files: Vec<EntryFile>,
    /// Location of the signature value
    pub signed_value_loc: ContainerPath,
}

impl DocEntries {
    /// Parse the manifest.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let root = Element::parse_bytes(data)?;
        if root.local_name() != "DocEntries" {
            return Err(Error::Xml(format!(
                "expected <ofd:DocEntries>, found <{}>",
                root.name
            )));
        }
        let list = root.required_child("FileList")?;
        let check_method = list.attr("CheckMethod").map(DigestAlgorithm::parse).transpose()?;

        let mut files = Vec::new();
        for elem in list.children_named("File") {
            let check_value = match elem.attr("CheckValue") {
                Some(v) => Some(STANDARD.decode(v.trim())?),
                None => None,
            };
            if check_value.is_some() && check_method.is_none() {
                return Err(Error::Xml(
                    "CheckValue given without a FileList CheckMethod".to_string(),
                ));
            }
            files.push(EntryFile {
                id: elem.required_attr("ID")?.trim().to_string(),
                loc: ContainerPath::resolve(&ContainerPath::root(), elem.required_attr("FileLoc")?),
                check_value,
            });
        }

        let signed_value_loc = root
            .child_text("SignedValueLoc")
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Xml("missing <ofd:SignedValueLoc>".to_string()))?;

        Ok(Self {
            id: root.required_attr("ID")?.trim().to_string(),
            creator_name: root.attr("CreatorName").map(str::to_string),
            version: root.attr("Version").map(str::to_string),
            creation_date: root.attr("CreationDate").map(str::to_string),
            check_method,
            files,
            signed_value_loc: ContainerPath::resolve(&ContainerPath::root(), signed_value_loc),
        })
    }

    /// Serialize the manifest.
    pub fn to_xml(&self) -> String {
        let mut root = Element::ofd_root("DocEntries").with_attr("ID", self.id.as_str());
        if let Some(name) = &self.creator_name {
            root.set_attr("CreatorName", name.as_str());
        }
        if let Some(version) = &self.version {
            root.set_attr("Version", version.as_str());
        }
        if let Some(date) = &self.creation_date {
            root.set_attr("CreationDate", date.as_str());
        }

        let mut list = Element::ofd("FileList");
        if let Some(method) = self.check_method {
            list.set_attr("CheckMethod", method.oid().to_string());
        }
        for file in &self.files {
            let mut elem = Element::ofd("File")
                .with_attr("ID", file.id.as_str())
                .with_attr("FileLoc", file.loc.as_str());
            if let Some(value) = &file.check_value {
                elem.set_attr("CheckValue", STANDARD.encode(value));
            }
            list.push(elem);
        }
        root.push(list);
        root.push(Element::ofd("SignedValueLoc").with_text(self.signed_value_loc.as_str()));
        root.to_xml()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let entries = DocEntries {
            id: "1".to_string(),
            creator_name: Some("ofd_oxide".to_string()),
            version: Some("0.1.0".to_string()),
            creation_date: Some("2024-01-01T12:00:00".to_string()),
            check_method: Some(DigestAlgorithm::Sha256),
            files: vec![
                EntryFile {
                    id: "2".to_string(),
                    loc: ContainerPath::new("/OFD.xml"),
                    check_value: Some(vec![0xab; 32]),
                },
                EntryFile {
                    id: "3".to_string(),
                    loc: ContainerPath::new("/Doc_0/Document.xml"),
                    check_value: Some(vec![0xcd; 32]),
                },
            ],
            signed_value_loc: ContainerPath::new(SIGNED_VALUE_LOC),
        };
        let xml = entries.to_xml();
        assert!(xml.contains("<ofd:SignedValueLoc>/signedvalue.dat</ofd:SignedValueLoc>"));
        assert!(xml.contains("FileLoc=\"/Doc_0/Document.xml\""));
        assert_eq!(DocEntries::parse(xml.as_bytes()).unwrap(), entries);
    }

    #[test]
    fn test_names_only_manifest() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
            <ofd:DocEntries xmlns:ofd="http://www.ofdspec.org/2016" ID="1" CreatorName="Other Producer">
              <ofd:FileList>
                <ofd:File ID="2">/OFD.xml</ofd:File>
              </ofd:FileList>
              <ofd:SignedValueLoc>/signedvalue.dat</ofd:SignedValueLoc>
            </ofd:DocEntries>"#;
        // FileLoc is required
        assert!(DocEntries::parse(xml.as_bytes()).is_err());

        let xml = xml.replace("<ofd:File ID=\"2\">/OFD.xml</ofd:File>", "<ofd:File ID=\"2\" FileLoc=\"Doc_0/Document.xml\"/>");
        let entries = DocEntries::parse(xml.as_bytes()).unwrap();
        assert!(entries.check_method.is_none());
        assert_eq!(entries.files[0].loc.as_str(), "/Doc_0/Document.xml");
        assert!(entries.files[0].check_value.is_none());
        assert!(entries.version.is_none());
    }

    #[test]
    fn test_check_value_needs_method() {
        let xml = r#"<DocEntries ID="1">
              <FileList><File ID="2" FileLoc="/OFD.xml" CheckValue="AAAA"/></FileList>
              <SignedValueLoc>/signedvalue.dat</SignedValueLoc>
            </DocEntries>"#;
        assert!(matches!(DocEntries::parse(xml.as_bytes()), Err(Error::Xml(_))));
    }

    #[test]
    fn test_missing_signed_value_loc() {
        let xml = r#"<DocEntries ID="1"><FileList/></DocEntries>"#;
        assert!(DocEntries::parse(xml.as_bytes()).is_err());
    }
}
