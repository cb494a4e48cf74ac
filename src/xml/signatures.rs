//! `Signatures.xml`, the signature list of a document.
//!
//! ```xml
//! <ofd:Signatures xmlns:ofd="http://www.ofdspec.org/2016">
//!   <ofd:MaxSignId>2</ofd:MaxSignId>
//!   <ofd:Signature ID="1" Type="Seal" BaseLoc="Sign_0/Signature.xml"/>
//!   <ofd:Signature ID="2" Type="Seal" BaseLoc="Sign_1/Signature.xml" Relative="1"/>
//! </ofd:Signatures>
//! ```
//!
//! `BaseLoc` values are resolved against the directory of the list file.

use super::Element;
use crate::container::ContainerPath;
use crate::error::{Error, Result};
use crate::signatures::types::SignType;

/// One entry of the signature list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureRecord {
    /// Signature ID, unique within the document
    pub id: String,
    /// Seal or plain signature
    pub kind: SignType,
    /// ID of the signature this one continues, if any
    pub relative_to: Option<String>,
    /// Location of the record's `Signature.xml`
    pub base_loc: ContainerPath,
}

impl SignatureRecord {
    /// Create a record.
    pub fn new(id: impl Into<String>, kind: SignType, base_loc: ContainerPath) -> Self {
        Self {
            id: id.into(),
            kind,
            relative_to: None,
            base_loc,
        }
    }

    /// Set the `Relative` attribute.
    pub fn with_relative(mut self, relative_to: impl Into<String>) -> Self {
        self.relative_to = Some(relative_to.into());
        self
    }
}

/// Parsed signature list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Signatures {
    /// Largest ID handed out so far, as written
    pub max_sign_id: Option<String>,
    /// Records in document order
    pub records: Vec<SignatureRecord>,
}

impl Signatures {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a list file stored at `loc`.
    pub fn parse(data: &[u8], loc: &ContainerPath) -> Result<Self> {
        let root = Element::parse_bytes(data)?;
        if root.local_name() != "Signatures" {
            return Err(Error::Xml(format!(
                "expected <ofd:Signatures>, found <{}>",
                root.name
            )));
        }
        let base_dir = loc.parent();
        let mut records = Vec::new();
        for elem in root.children_named("Signature") {
            let id = elem.required_attr("ID")?.trim();
            if id.is_empty() {
                return Err(Error::Xml("signature record has an empty ID".to_string()));
            }
            let base_loc = elem.required_attr("BaseLoc")?;
            records.push(SignatureRecord {
                id: id.to_string(),
                kind: SignType::parse(elem.attr("Type"))?,
                relative_to: elem.attr("Relative").map(|s| s.trim().to_string()),
                base_loc: ContainerPath::resolve(&base_dir, base_loc),
            });
        }
        Ok(Self {
            max_sign_id: root.child_text("MaxSignId").map(str::to_string),
            records,
        })
    }

    /// Append a record and advance `MaxSignId` to its ID.
    pub fn push(&mut self, record: SignatureRecord) -> Result<()> {
        if self.find(&record.id).is_some() {
            return Err(Error::InvalidStructure(format!(
                "signature ID {} already exists",
                record.id
            )));
        }
        self.max_sign_id = Some(record.id.clone());
        self.records.push(record);
        Ok(())
    }

    /// Look up a record by ID.
    pub fn find(&self, id: &str) -> Option<&SignatureRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Serialize for storage at `loc`; `BaseLoc` is written relative to it when possible.
    pub fn to_xml(&self, loc: &ContainerPath) -> String {
        let base_dir = loc.parent();
        let mut root = Element::ofd_root("Signatures");
        if let Some(max) = &self.max_sign_id {
            root.push(Element::ofd("MaxSignId").with_text(max.as_str()));
        }
        for record in &self.records {
            let base_loc = if !base_dir.is_root() && record.base_loc.starts_with(&base_dir) {
                record.base_loc.as_str()[base_dir.as_str().len() + 1..].to_string()
            } else {
                record.base_loc.to_string()
            };
            let mut elem = Element::ofd("Signature")
                .with_attr("ID", record.id.as_str())
                .with_attr("Type", record.kind.as_str())
                .with_attr("BaseLoc", base_loc);
            if let Some(rel) = &record.relative_to {
                elem.set_attr("Relative", rel.as_str());
            }
            root.push(elem);
        }
        root.to_xml()
    }
}
