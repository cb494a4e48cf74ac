//! `Signature.xml`, the description of one signature.
//!
//! ```xml
//! <ofd:Signature xmlns:ofd="http://www.ofdspec.org/2016">
//!   <ofd:SignedInfo>
//!     <ofd:Provider ProviderName="ofd_oxide" Version="0.1.0"/>
//!     <ofd:SignatureMethod>1.2.840.10045.4.3.2</ofd:SignatureMethod>
//!     <ofd:SignatureDateTime>2024-01-01 12:00:00</ofd:SignatureDateTime>
//!     <ofd:References CheckMethod="2.16.840.1.101.3.4.2.1">
//!       <ofd:Reference FileRef="/Doc_0/Document.xml">
//!         <ofd:CheckValue>base64</ofd:CheckValue>
//!       </ofd:Reference>
//!     </ofd:References>
//!     <ofd:StampAnnot ID="1" PageRef="1" Boundary="10 10 40 40"/>
//!     <ofd:Seal><ofd:BaseLoc>/Doc_0/Signs/Sign_0/Seal.esl</ofd:BaseLoc></ofd:Seal>
//!   </ofd:SignedInfo>
//!   <ofd:SignedValue>/Doc_0/Signs/Sign_0/SignedValue.dat</ofd:SignedValue>
//! </ofd:Signature>
//! ```

use super::Element;
use crate::config::ProviderInfo;
use crate::container::ContainerPath;
use crate::digest::DigestAlgorithm;
use crate::error::{Error, Result};
use crate::geometry::Rect;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Digest of one protected file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Protected file
    pub file_ref: ContainerPath,
    /// Recorded digest
    pub check_value: Vec<u8>,
}

impl Reference {
    /// Create a reference.
    pub fn new(file_ref: ContainerPath, check_value: Vec<u8>) -> Self {
        Self {
            file_ref,
            check_value,
        }
    }
}

/// The set of protected files and the digest algorithm used for all of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct References {
    /// Digest algorithm, written as an OID in `CheckMethod`
    pub check_method: DigestAlgorithm,
    /// Protected files in insertion order
    pub entries: Vec<Reference>,
}

impl References {
    /// Create an empty set.
    pub fn new(check_method: DigestAlgorithm) -> Self {
        Self {
            check_method,
            entries: Vec::new(),
        }
    }

    /// Add a reference; a second reference to the same file is rejected.
    pub fn push(&mut self, reference: Reference) -> Result<()> {
        if self.contains(&reference.file_ref) {
            return Err(Error::InvalidStructure(format!(
                "duplicate reference to {}",
                reference.file_ref
            )));
        }
        self.entries.push(reference);
        Ok(())
    }

    /// Whether `path` is protected.
    pub fn contains(&self, path: &ContainerPath) -> bool {
        self.entries.iter().any(|r| r.file_ref == *path)
    }

    /// Number of protected files.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no file is protected.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Placement of a stamp appearance on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct StampAnnot {
    /// Annotation ID
    pub id: String,
    /// ID of the page object the stamp sits on
    pub page_ref: String,
    /// Appearance box in page space
    pub boundary: Rect,
    /// Visible part of the appearance, relative to the boundary
    pub clip: Option<Rect>,
}

impl StampAnnot {
    fn to_element(&self) -> Element {
        let mut elem = Element::ofd("StampAnnot")
            .with_attr("ID", self.id.as_str())
            .with_attr("PageRef", self.page_ref.as_str())
            .with_attr("Boundary", self.boundary.to_string());
        if let Some(clip) = &self.clip {
            elem.set_attr("Clip", clip.to_string());
        }
        elem
    }

    fn from_element(elem: &Element) -> Result<Self> {
        for (key, _) in &elem.attributes {
            if !matches!(key.as_str(), "ID" | "PageRef" | "Boundary" | "Clip") {
                log::warn!("ignoring StampAnnot attribute {}", key);
            }
        }
        Ok(Self {
            id: elem.required_attr("ID")?.to_string(),
            page_ref: elem.required_attr("PageRef")?.to_string(),
            boundary: Rect::parse(elem.required_attr("Boundary")?)?,
            clip: elem.attr("Clip").map(Rect::parse).transpose()?,
        })
    }
}

/// Extension parameter of the signed info.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    /// Parameter name
    pub name: String,
    /// Optional type tag
    pub kind: Option<String>,
    /// Parameter value
    pub value: String,
}

/// What was signed, by whom, and how.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedInfo {
    /// Component that produced the signature
    pub provider: ProviderInfo,
    /// Signature algorithm OID
    pub signature_method: String,
    /// Signing time as written
    pub signature_date_time: String,
    /// Protected files
    pub references: References,
    /// Stamp placements
    pub stamp_annots: Vec<StampAnnot>,
    /// Location of `Seal.esl` for seal signatures
    pub seal: Option<ContainerPath>,
    /// Extension parameters
    pub parameters: Vec<Parameter>,
}

/// Parsed `Signature.xml`.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    /// Signed information
    pub signed_info: SignedInfo,
    /// Location of `SignedValue.dat`
    pub signed_value: ContainerPath,
}

impl Signature {
    /// Parse a signature file stored at `loc`, listed in the signature list at
    /// `list_loc`.
    ///
    /// Relative `FileRef`s resolve against the list's directory; `SignedValue`
    /// and the seal `BaseLoc` resolve against the signature's own directory.
    pub fn parse(data: &[u8], loc: &ContainerPath, list_loc: &ContainerPath) -> Result<Self> {
        let root = Element::parse_bytes(data)?;
        if root.local_name() != "Signature" {
            return Err(Error::Xml(format!("expected <ofd:Signature>, found <{}>", root.name)));
        }
        let base_dir = loc.parent();
        let list_dir = list_loc.parent();
        let info = root.required_child("SignedInfo")?;

        let provider_elem = info.required_child("Provider")?;
        let provider = ProviderInfo {
            name: provider_elem.required_attr("ProviderName")?.to_string(),
            company: provider_elem.attr("Company").map(str::to_string),
            version: provider_elem.attr("Version").map(str::to_string),
        };

        let refs_elem = info.required_child("References")?;
        let check_method = match refs_elem.attr("CheckMethod") {
            Some(method) => DigestAlgorithm::parse(method)?,
            None => DigestAlgorithm::default(),
        };
        let mut references = References::new(check_method);
        for elem in refs_elem.children_named("Reference") {
            let file_ref = ContainerPath::resolve(&list_dir, elem.required_attr("FileRef")?);
            let value = elem.child_text("CheckValue").unwrap_or_default();
            if value.is_empty() {
                return Err(Error::Xml(format!("reference to {} has no CheckValue", file_ref)));
            }
            references.push(Reference::new(file_ref, STANDARD.decode(value)?))?;
        }

        let stamp_annots = info
            .children_named("StampAnnot")
            .map(StampAnnot::from_element)
            .collect::<Result<Vec<_>>>()?;

        let seal = match info.child("Seal") {
            Some(seal) => {
                let loc = seal.child_text("BaseLoc").filter(|s| !s.is_empty()).ok_or_else(
                    || Error::Xml("<ofd:Seal> has no BaseLoc".to_string()),
                )?;
                Some(ContainerPath::resolve(&base_dir, loc))
            },
            None => None,
        };

        let parameters = info
            .child("Parameters")
            .map(|params| {
                params
                    .children_named("Parameter")
                    .map(|p| {
                        Ok(Parameter {
                            name: p.required_attr("Name")?.to_string(),
                            kind: p.attr("Type").map(str::to_string),
                            value: p.text().to_string(),
                        })
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?
            .unwrap_or_default();

        let signed_value = root
            .child_text("SignedValue")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Xml("<ofd:Signature> has no SignedValue".to_string()))?;

        Ok(Self {
            signed_info: SignedInfo {
                provider,
                signature_method: info.child_text("SignatureMethod").unwrap_or_default().to_string(),
                signature_date_time: info
                    .child_text("SignatureDateTime")
                    .unwrap_or_default()
                    .to_string(),
                references,
                stamp_annots,
                seal,
                parameters,
            },
            signed_value: ContainerPath::resolve(&base_dir, signed_value),
        })
    }

    /// Serialize; every location is written as an absolute path.
    pub fn to_xml(&self) -> String {
        let info = &self.signed_info;

        let mut provider = Element::ofd("Provider").with_attr("ProviderName", info.provider.name.as_str());
        if let Some(company) = &info.provider.company {
            provider.set_attr("Company", company.as_str());
        }
        if let Some(version) = &info.provider.version {
            provider.set_attr("Version", version.as_str());
        }

        let mut references = Element::ofd("References")
            .with_attr("CheckMethod", info.references.check_method.oid().to_string());
        for r in &info.references.entries {
            references.push(
                Element::ofd("Reference")
                    .with_attr("FileRef", r.file_ref.as_str())
                    .with_child(Element::ofd("CheckValue").with_text(STANDARD.encode(&r.check_value))),
            );
        }

        let mut signed_info = Element::ofd("SignedInfo")
            .with_child(provider)
            .with_child(Element::ofd("SignatureMethod").with_text(info.signature_method.as_str()))
            .with_child(
                Element::ofd("SignatureDateTime").with_text(info.signature_date_time.as_str()),
            )
            .with_child(references);
        for annot in &info.stamp_annots {
            signed_info.push(annot.to_element());
        }
        if let Some(seal) = &info.seal {
            signed_info.push(
                Element::ofd("Seal").with_child(Element::ofd("BaseLoc").with_text(seal.as_str())),
            );
        }
        if !info.parameters.is_empty() {
            let mut params = Element::ofd("Parameters");
            for p in &info.parameters {
                let mut elem = Element::ofd("Parameter")
                    .with_attr("Name", p.name.as_str())
                    .with_text(p.value.as_str());
                if let Some(kind) = &p.kind {
                    elem.set_attr("Type", kind.as_str());
                }
                params.push(elem);
            }
            signed_info.push(params);
        }

        Element::ofd_root("Signature")
            .with_child(signed_info)
            .with_child(Element::ofd("SignedValue").with_text(self.signed_value.as_str()))
            .to_xml()
    }
}
