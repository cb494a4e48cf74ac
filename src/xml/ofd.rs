//! `OFD.xml`, the package entry file.
//!
//! Only the first `DocBody` is interpreted: its `DocRoot` locates the default
//! document and its optional `Signatures` element locates the signature list.

use super::Element;
use crate::container::{ContainerPath, Workspace};
use crate::error::{Error, Result};

/// Location of the entry file inside every package.
pub const OFD_ENTRY: &str = "/OFD.xml";

/// Parsed `OFD.xml`.
#[derive(Debug, Clone)]
pub struct OfdEntry {
    root: Element,
}

impl OfdEntry {
    /// Parse the entry file.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let root = Element::parse_bytes(data)?;
        if root.local_name() != "OFD" {
            return Err(Error::Xml(format!("expected <ofd:OFD>, found <{}>", root.name)));
        }
        root.required_child("DocBody")?;
        Ok(Self { root })
    }

    /// Load `/OFD.xml` from a workspace.
    pub fn load(workspace: &Workspace) -> Result<Self> {
        Self::parse(&workspace.read(&ContainerPath::new(OFD_ENTRY))?)
    }

    /// Write back to `/OFD.xml`.
    pub fn save(&self, workspace: &Workspace) -> Result<()> {
        workspace.write(&ContainerPath::new(OFD_ENTRY), self.to_xml().as_bytes())
    }

    fn doc_body(&self) -> &Element {
        // presence checked in parse
        self.root.child("DocBody").unwrap_or(&self.root)
    }

    fn doc_body_mut(&mut self) -> Option<&mut Element> {
        self.root.child_mut("DocBody")
    }

    /// Location of the default document's `Document.xml`.
    pub fn doc_root(&self) -> Result<ContainerPath> {
        let loc = self
            .doc_body()
            .child_text("DocRoot")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::InvalidStructure("DocBody has no DocRoot".to_string()))?;
        Ok(ContainerPath::resolve(&ContainerPath::root(), loc))
    }

    /// Location of the signature list, if the document is signed.
    pub fn signatures_loc(&self) -> Option<ContainerPath> {
        self.doc_body()
            .child_text("Signatures")
            .filter(|s| !s.is_empty())
            .map(|loc| ContainerPath::resolve(&ContainerPath::root(), loc))
    }

    /// Point `DocBody/Signatures` at `loc`, inserting the element if absent.
    pub fn set_signatures_loc(&mut self, loc: &ContainerPath) -> Result<()> {
        let body = self
            .doc_body_mut()
            .ok_or_else(|| Error::InvalidStructure("OFD.xml has no DocBody".to_string()))?;
        match body.child_mut("Signatures") {
            Some(elem) => elem.text = loc.relative().to_string(),
            None => body.push(Element::ofd("Signatures").with_text(loc.relative())),
        }
        Ok(())
    }

    /// Remove `DocBody/Signatures`; returns whether one was present.
    pub fn remove_signatures(&mut self) -> bool {
        self.doc_body_mut()
            .map(|body| body.remove_children("Signatures") > 0)
            .unwrap_or(false)
    }

    /// Serialize the entry file.
    pub fn to_xml(&self) -> String {
        self.root.to_xml()
    }
}
