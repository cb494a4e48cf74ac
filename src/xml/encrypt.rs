//! Container encryption parts.
//!
//! - `/Encryptions.xml`: plain entry file listing every encryption operation
//! - entries map: `Path` → `EPath` for each encrypted file, stored encrypted
//! - decrypt seed: per-recipient wrapped keys plus per-file IVs, stored plain

use super::signature::Parameter;
use super::Element;
use crate::config::ProviderInfo;
use crate::container::ContainerPath;
use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use indexmap::IndexMap;

/// Location of the encryption entry file.
pub const ENCRYPTIONS_ENTRY: &str = "/Encryptions.xml";

/// Protection case recorded in the decrypt seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionCase {
    /// Key wrapped under a password-derived key
    Password,
    /// Key wrapped under a recipient certificate
    Certificate,
}

impl ProtectionCase {
    /// Case identifier written into `EncryptCaseId`.
    pub fn id(&self) -> &'static str {
        match self {
            ProtectionCase::Password => "1.1.1",
            ProtectionCase::Certificate => "1.1.2",
        }
    }

    /// Parse a case identifier.
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim() {
            "1.1.1" => Ok(ProtectionCase::Password),
            "1.1.2" => Ok(ProtectionCase::Certificate),
            other => Err(Error::UnsupportedAlgorithm(format!("protection case {}", other))),
        }
    }
}

/// Recipient role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserType {
    /// Document owner
    Owner,
    /// Ordinary reader
    #[default]
    User,
}

impl UserType {
    /// Attribute value.
    pub fn as_str(&self) -> &'static str {
        match self {
            UserType::Owner => "Owner",
            UserType::User => "User",
        }
    }

    fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("Owner") => UserType::Owner,
            _ => UserType::User,
        }
    }
}

/// One recipient of the file encryption key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    /// Recipient name
    pub user_name: String,
    /// Recipient role
    pub user_type: UserType,
    /// Recipient certificate (DER), for certificate recipients
    pub user_cert: Option<Vec<u8>>,
    /// Wrapped file encryption key
    pub encrypted_wk: Vec<u8>,
    /// IV used to wrap the key, for password recipients
    pub iv_value: Vec<u8>,
}

impl UserInfo {
    /// Protection case implied by the entry.
    pub fn case(&self) -> ProtectionCase {
        if self.user_cert.is_some() {
            ProtectionCase::Certificate
        } else {
            ProtectionCase::Password
        }
    }

    fn to_element(&self) -> Element {
        let mut elem = Element::ofd("UserInfo")
            .with_attr("UserName", self.user_name.as_str())
            .with_attr("UserType", self.user_type.as_str());
        if let Some(cert) = &self.user_cert {
            elem.push(Element::ofd("UserCert").with_text(STANDARD.encode(cert)));
        }
        elem.push(Element::ofd("EncryptedWK").with_text(STANDARD.encode(&self.encrypted_wk)));
        if !self.iv_value.is_empty() {
            elem.push(Element::ofd("IVValue").with_text(STANDARD.encode(&self.iv_value)));
        }
        elem
    }

    fn from_element(elem: &Element) -> Result<Self> {
        let decode = |name: &str| -> Result<Option<Vec<u8>>> {
            match elem.child_text(name).filter(|s| !s.is_empty()) {
                Some(text) => Ok(Some(STANDARD.decode(text)?)),
                None => Ok(None),
            }
        };
        Ok(Self {
            user_name: elem.attr("UserName").unwrap_or_default().to_string(),
            user_type: UserType::parse(elem.attr("UserType")),
            user_cert: decode("UserCert")?,
            encrypted_wk: decode("EncryptedWK")?
                .ok_or_else(|| Error::Xml("UserInfo has no EncryptedWK".to_string()))?,
            iv_value: decode("IVValue")?.unwrap_or_default(),
        })
    }
}

/// Mapping of one plaintext path to its ciphertext path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptEntry {
    /// Original location
    pub path: ContainerPath,
    /// Encrypted location
    pub e_path: ContainerPath,
    /// Seed used for this entry when it differs from the operation's seed
    pub decrypt_seed_loc: Option<ContainerPath>,
}

/// Entries map of one encryption operation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EncryptEntries {
    /// Encryption operation ID
    pub id: String,
    /// Entries in encryption order
    pub entries: Vec<EncryptEntry>,
}

impl EncryptEntries {
    /// Parse the decrypted entries map.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let root = Element::parse_bytes(data)?;
        if root.local_name() != "EncryptEntries" {
            return Err(Error::Xml(format!(
                "expected <ofd:EncryptEntries>, found <{}>",
                root.name
            )));
        }
        let entries = root
            .children_named("EncryptEntry")
            .map(|e| {
                Ok(EncryptEntry {
                    path: ContainerPath::new(e.required_attr("Path")?),
                    e_path: ContainerPath::new(e.required_attr("EPath")?),
                    decrypt_seed_loc: e.attr("DecryptSeedLoc").map(ContainerPath::new),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            id: root.attr("ID").unwrap_or_default().to_string(),
            entries,
        })
    }

    /// Serialize the entries map.
    pub fn to_xml(&self) -> String {
        let mut root = Element::ofd_root("EncryptEntries").with_attr("ID", self.id.as_str());
        for entry in &self.entries {
            let mut elem = Element::ofd("EncryptEntry")
                .with_attr("Path", entry.path.as_str())
                .with_attr("EPath", entry.e_path.as_str());
            if let Some(seed) = &entry.decrypt_seed_loc {
                elem.set_attr("DecryptSeedLoc", seed.as_str());
            }
            root.push(elem);
        }
        root.to_xml()
    }
}

/// Key description file of one encryption operation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecryptSeed {
    /// Encryption operation ID
    pub id: String,
    /// Protection case of the first recipient
    pub encrypt_case_id: String,
    /// Recipients
    pub users: Vec<UserInfo>,
    /// IV of every encrypted file, keyed by its encrypted location
    pub file_ivs: IndexMap<ContainerPath, Vec<u8>>,
}

impl DecryptSeed {
    /// Parse a decrypt seed.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let root = Element::parse_bytes(data)?;
        if root.local_name() != "DecyptSeed" && root.local_name() != "DecryptSeed" {
            return Err(Error::Xml(format!("expected <ofd:DecyptSeed>, found <{}>", root.name)));
        }
        let mut file_ivs = IndexMap::new();
        if let Some(params) = root.child("ExtendParams") {
            for p in params.children_named("Parameter") {
                file_ivs.insert(
                    ContainerPath::new(p.required_attr("Name")?),
                    STANDARD.decode(p.text())?,
                );
            }
        }
        Ok(Self {
            id: root.attr("ID").unwrap_or_default().to_string(),
            encrypt_case_id: root.attr("EncryptCaseId").unwrap_or_default().to_string(),
            users: root
                .children_named("UserInfo")
                .map(UserInfo::from_element)
                .collect::<Result<Vec<_>>>()?,
            file_ivs,
        })
    }

    /// Serialize the seed.
    pub fn to_xml(&self) -> String {
        let mut root = Element::ofd_root("DecyptSeed")
            .with_attr("ID", self.id.as_str())
            .with_attr("EncryptCaseId", self.encrypt_case_id.as_str());
        let mut params = Element::ofd("ExtendParams");
        for (path, iv) in &self.file_ivs {
            params.push(
                Element::ofd("Parameter")
                    .with_attr("Name", path.as_str())
                    .with_text(STANDARD.encode(iv)),
            );
        }
        root.push(params);
        for user in &self.users {
            root.push(user.to_element());
        }
        root.to_xml()
    }
}

/// One encryption operation recorded in `/Encryptions.xml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptInfo {
    /// Operation ID
    pub id: String,
    /// Operation this one builds on
    pub relative: Option<String>,
    /// Component that encrypted the package
    pub provider: ProviderInfo,
    /// Encryption time as written
    pub encrypt_date: String,
    /// Scope of the operation, `All` for whole-package encryption
    pub encrypt_scope: String,
    /// Extension parameters
    pub parameters: Vec<Parameter>,
    /// Location of the decrypt seed
    pub decrypt_seed_loc: ContainerPath,
    /// Location of the encrypted entries map
    pub entries_map_loc: ContainerPath,
}

impl EncryptInfo {
    fn to_element(&self) -> Element {
        let mut elem = Element::ofd("EncryptInfo").with_attr("ID", self.id.as_str());
        if let Some(rel) = &self.relative {
            elem.set_attr("Relative", rel.as_str());
        }
        let mut provider =
            Element::ofd("Provider").with_attr("ProviderName", self.provider.name.as_str());
        if let Some(company) = &self.provider.company {
            provider.set_attr("Company", company.as_str());
        }
        if let Some(version) = &self.provider.version {
            provider.set_attr("Version", version.as_str());
        }
        elem.push(provider);
        elem.push(Element::ofd("EncryptDate").with_text(self.encrypt_date.as_str()));
        elem.push(Element::ofd("EncryptScope").with_text(self.encrypt_scope.as_str()));
        if !self.parameters.is_empty() {
            let mut params = Element::ofd("Parameters");
            for p in &self.parameters {
                let mut pe = Element::ofd("Parameter")
                    .with_attr("Name", p.name.as_str())
                    .with_text(p.value.as_str());
                if let Some(kind) = &p.kind {
                    pe.set_attr("Type", kind.as_str());
                }
                params.push(pe);
            }
            elem.push(params);
        }
        elem.push(Element::ofd("DecryptSeedLoc").with_text(self.decrypt_seed_loc.as_str()));
        elem.push(Element::ofd("EntriesMapLoc").with_text(self.entries_map_loc.as_str()));
        elem
    }

    fn from_element(elem: &Element) -> Result<Self> {
        let provider = match elem.child("Provider") {
            Some(p) => ProviderInfo {
                name: p.attr("ProviderName").unwrap_or_default().to_string(),
                company: p.attr("Company").map(str::to_string),
                version: p.attr("Version").map(str::to_string),
            },
            None => ProviderInfo::new(""),
        };
        let loc = |name: &str| -> Result<ContainerPath> {
            elem.child_text(name)
                .filter(|s| !s.is_empty())
                .map(ContainerPath::new)
                .ok_or_else(|| Error::Xml(format!("EncryptInfo has no {}", name)))
        };
        let parameters = elem
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
        Ok(Self {
            id: elem.required_attr("ID")?.to_string(),
            relative: elem.attr("Relative").map(str::to_string),
            provider,
            encrypt_date: elem.child_text("EncryptDate").unwrap_or_default().to_string(),
            encrypt_scope: elem.child_text("EncryptScope").unwrap_or("All").to_string(),
            parameters,
            decrypt_seed_loc: loc("DecryptSeedLoc")?,
            entries_map_loc: loc("EntriesMapLoc")?,
        })
    }
}

/// Parsed `/Encryptions.xml`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Encryptions {
    /// Operations in document order
    pub infos: Vec<EncryptInfo>,
}

impl Encryptions {
    /// Parse the entry file.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let root = Element::parse_bytes(data)?;
        if root.local_name() != "Encryptions" {
            return Err(Error::Xml(format!(
                "expected <ofd:Encryptions>, found <{}>",
                root.name
            )));
        }
        Ok(Self {
            infos: root
                .children_named("EncryptInfo")
                .map(EncryptInfo::from_element)
                .collect::<Result<Vec<_>>>()?,
        })
    }

    /// Largest numeric operation ID, 0 when there is none.
    pub fn max_id(&self) -> u64 {
        self.infos
            .iter()
            .filter_map(|i| i.id.trim().parse::<u64>().ok())
            .max()
            .unwrap_or(0)
    }

    /// Remove the operation with `id`; returns it if present.
    pub fn remove(&mut self, id: &str) -> Option<EncryptInfo> {
        let idx = self.infos.iter().position(|i| i.id == id)?;
        Some(self.infos.remove(idx))
    }

    /// Serialize the entry file.
    pub fn to_xml(&self) -> String {
        let mut root = Element::ofd_root("Encryptions");
        for info in &self.infos {
            root.push(info.to_element());
        }
        root.to_xml()
    }
}
