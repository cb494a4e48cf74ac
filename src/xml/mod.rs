//! Record-level model of the OFD XML parts used by the trust subsystem.
//!
//! Parts are parsed with `quick-xml` into a small [`Element`] tree and then
//! mapped onto typed records ([`signatures::Signatures`],
//! [`signature::Signature`], [`encrypt::EncryptEntries`], ...). Elements are
//! matched by local name, so both `ofd:`-prefixed and unprefixed documents are
//! accepted. Unknown content survives a read/modify/write cycle, which matters
//! for `OFD.xml` where only the `Signatures` entry is touched.

pub mod encrypt;
pub mod entries;
pub mod ofd;
pub mod signature;
pub mod signatures;

use crate::error::{Error, Result};
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// OFD namespace URI.
pub const OFD_NAMESPACE: &str = "http://www.ofdspec.org/2016";

/// Prefix bound to [`OFD_NAMESPACE`] in written parts.
pub const OFD_PREFIX: &str = "ofd";

/// Qualified `ofd:` name for a local element name.
pub(crate) fn ofd(local: &str) -> String {
    format!("{}:{}", OFD_PREFIX, local)
}

fn local_part(name: &str) -> &str {
    match name.rfind(':') {
        Some(idx) => &name[idx + 1..],
        None => name,
    }
}

/// A parsed XML element.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    /// Qualified name as written, e.g. `ofd:Signature`
    pub name: String,
    /// Attributes in document order (qualified names)
    pub attributes: Vec<(String, String)>,
    /// Child elements in document order
    pub children: Vec<Element>,
    /// Concatenated character data directly inside this element
    pub text: String,
}

impl Element {
    /// Create an element with the given qualified name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Create an `ofd:`-prefixed element.
    pub fn ofd(local: &str) -> Self {
        Self::new(ofd(local))
    }

    /// Create the root element of a part, declaring the OFD namespace.
    pub fn ofd_root(local: &str) -> Self {
        Self::ofd(local).with_attr(format!("xmlns:{}", OFD_PREFIX), OFD_NAMESPACE)
    }

    /// Local name without prefix.
    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }

    /// Builder form of [`Element::set_attr`].
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Builder form setting the text content.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Builder form of [`Element::push`].
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Set or replace an attribute.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    /// Attribute value by local name.
    pub fn attr(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| local_part(k) == local && !k.starts_with("xmlns"))
            .map(|(_, v)| v.as_str())
    }

    /// Required attribute value.
    pub fn required_attr(&self, local: &str) -> Result<&str> {
        self.attr(local).ok_or_else(|| {
            Error::Xml(format!("<{}> is missing attribute {}", self.name, local))
        })
    }

    /// Trimmed text content.
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    /// Append a child element.
    pub fn push(&mut self, child: Element) {
        self.children.push(child);
    }

    /// First child with the given local name.
    pub fn child(&self, local: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.local_name() == local)
    }

    /// Mutable first child with the given local name.
    pub fn child_mut(&mut self, local: &str) -> Option<&mut Element> {
        self.children.iter_mut().find(|c| c.local_name() == local)
    }

    /// Required child element.
    pub fn required_child(&self, local: &str) -> Result<&Element> {
        self.child(local)
            .ok_or_else(|| Error::Xml(format!("<{}> is missing <{}>", self.name, local)))
    }

    /// Text of the first child with the given local name.
    pub fn child_text(&self, local: &str) -> Option<&str> {
        self.child(local).map(|c| c.text())
    }

    /// All children with the given local name.
    pub fn children_named<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.local_name() == local)
    }

    /// Remove all children with the given local name; returns how many were removed.
    pub fn remove_children(&mut self, local: &str) -> usize {
        let before = self.children.len();
        self.children.retain(|c| c.local_name() != local);
        before - self.children.len()
    }

    /// Parse a document and return its root element.
    pub fn parse(xml: &str) -> Result<Element> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => stack.push(start_element(&e)?),
                Ok(Event::Empty(e)) => {
                    let elem = start_element(&e)?;
                    attach(&mut stack, &mut root, elem)?;
                },
                Ok(Event::Text(e)) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&e.unescape()?);
                    }
                },
                Ok(Event::CData(e)) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                    }
                },
                Ok(Event::End(_)) => {
                    let elem = stack
                        .pop()
                        .ok_or_else(|| Error::Xml("unbalanced end tag".to_string()))?;
                    attach(&mut stack, &mut root, elem)?;
                },
                Ok(Event::Eof) => break,
                Ok(_) => {},
                Err(e) => {
                    return Err(Error::Xml(format!(
                        "parse error at position {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                },
            }
        }

        if !stack.is_empty() {
            return Err(Error::Xml("unexpected end of document".to_string()));
        }
        root.ok_or_else(|| Error::Xml("document has no root element".to_string()))
    }

    /// Parse a document from raw bytes.
    pub fn parse_bytes(data: &[u8]) -> Result<Element> {
        let text = std::str::from_utf8(data)
            .map_err(|_| Error::Xml("document is not valid UTF-8".to_string()))?;
        Self::parse(text.trim_start_matches('\u{feff}'))
    }

    /// Serialize as a complete document with an XML declaration.
    pub fn to_xml(&self) -> String {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
        self.write_into(&mut xml);
        xml
    }

    fn write_into(&self, xml: &mut String) {
        xml.push('<');
        xml.push_str(&self.name);
        for (k, v) in &self.attributes {
            xml.push_str(&format!(" {}=\"{}\"", k, escape(v.as_str())));
        }
        if self.children.is_empty() && self.text.is_empty() {
            xml.push_str("/>");
            return;
        }
        xml.push('>');
        xml.push_str(&escape(self.text.as_str()));
        for child in &self.children {
            child.write_into(xml);
        }
        xml.push_str(&format!("</{}>", self.name));
    }
}

fn start_element(e: &BytesStart<'_>) -> Result<Element> {
    let mut elem = Element::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
    for attr in e.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        elem.attributes.push((key, value));
    }
    Ok(elem)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, elem: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(elem),
        None if root.is_none() => *root = Some(elem),
        None => return Err(Error::Xml("multiple root elements".to_string())),
    }
    Ok(())
}
