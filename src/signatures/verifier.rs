//! OFD signature verification.
//!
//! Every record in the signature list is checked in list order:
//!
//! 1. each referenced file against its recorded digest
//! 2. for seals, the seal file against the seal inside the signature value
//! 3. the signature value itself, through a [`ValidateContainer`]
//!
//! The first failure ends validation.

use super::types::SignType;
use super::validate::{AutoValidateContainer, ValidateContainer};
use crate::config::TrustConfig;
use crate::container::{ContainerPath, Workspace};
use crate::digest;
use crate::error::{Error, Result};
use crate::ses::{self, SealSchema};
use crate::xml::ofd::OfdEntry;
use crate::xml::signature::{References, Signature};
use crate::xml::signatures::{SignatureRecord, Signatures};
use serde::Serialize;
use std::io::Read;
use std::path::Path;

/// Outcome for one verified signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignatureOutcome {
    /// Signature ID
    pub id: String,
    /// `Seal` or `Sign`
    pub kind: String,
    /// ID of the signature this one continues
    pub relative_to: Option<String>,
    /// Number of protected files
    pub references: usize,
    /// Seal structure version, for seal signatures
    pub seal_version: Option<u32>,
    /// Signing time as recorded
    pub signature_date_time: String,
}

/// Result of a successful validation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Verified signatures in list order
    pub signatures: Vec<SignatureOutcome>,
}

impl ValidationReport {
    /// Number of verified signatures.
    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    /// Whether no signature was verified.
    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// Render as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::InvalidState(format!("report serialization failed: {}", e)))
    }
}

/// Verifies every signature of an OFD package.
///
/// ```no_run
/// use ofd_oxide::signatures::OfdValidator;
///
/// let report = OfdValidator::open("signed.ofd")?.exe_validate()?;
/// println!("{}", report.to_json()?);
/// # Ok::<(), ofd_oxide::Error>(())
/// ```
pub struct OfdValidator {
    workspace: Workspace,
    container: Box<dyn ValidateContainer>,
}

impl OfdValidator {
    /// Open a package file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let config = TrustConfig::default();
        Ok(Self::with_workspace(Workspace::extract_file(path, &config.temp_prefix)?))
    }

    /// Open a package held in memory.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let config = TrustConfig::default();
        Ok(Self::with_workspace(Workspace::extract(data, &config.temp_prefix)?))
    }

    fn with_workspace(workspace: Workspace) -> Self {
        Self {
            workspace,
            container: Box::new(AutoValidateContainer::new()),
        }
    }

    /// Replace the container used to check signature values.
    pub fn set_validate_container(&mut self, container: Box<dyn ValidateContainer>) -> &mut Self {
        self.container = container;
        self
    }

    fn signature_list(&self) -> Result<(ContainerPath, Signatures)> {
        let ofd = OfdEntry::load(&self.workspace)?;
        let loc = ofd.signatures_loc().ok_or(Error::DocNotSigned)?;
        if !self.workspace.exists(&loc) {
            log::warn!("OFD.xml names {} but the file is missing", loc);
            return Err(Error::DocNotSigned);
        }
        let signatures = Signatures::parse(&self.workspace.read(&loc)?, &loc)?;
        if signatures.records.is_empty() {
            return Err(Error::DocNotSigned);
        }
        Ok((loc, signatures))
    }

    /// Validate every signature.
    pub fn exe_validate(&self) -> Result<ValidationReport> {
        let (list_loc, signatures) = self.signature_list()?;
        let mut report = ValidationReport::default();
        for record in &signatures.records {
            if let Some(rel) = &record.relative_to {
                if signatures.find(rel).is_none() {
                    return Err(Error::InvalidStructure(format!(
                        "signature {} continues unknown signature {}",
                        record.id, rel
                    )));
                }
            }
            report.signatures.push(self.validate_record(record, &list_loc)?);
        }
        log::info!("validated {} signatures", report.len());
        Ok(report)
    }

    fn validate_record(&self, record: &SignatureRecord, list_loc: &ContainerPath) -> Result<SignatureOutcome> {
        let content = self.workspace.read(&record.base_loc)?;
        let signature = Signature::parse(&content, &record.base_loc, list_loc)?;
        let info = &signature.signed_info;

        self.check_references(&info.references)?;

        let signed_value = self.workspace.read(&signature.signed_value)?;
        let mut seal_version = None;
        if record.kind == SignType::Seal {
            if let Some(seal_loc) = &info.seal {
                let seal = SealSchema::from_der(&self.workspace.read(seal_loc)?)?;
                let embedded = SealSchema::from_der(&self.container.seal(&signed_value)?)?;
                if seal.to_der()? != embedded.to_der()? {
                    return Err(Error::SealMismatch(format!(
                        "{} differs from the seal in {}",
                        seal_loc, signature.signed_value
                    )));
                }
                seal_version = Some(seal.version().number());
            } else {
                seal_version = ses::detect_signature(&signed_value).ok().map(|v| v.number());
            }
        }

        self.container
            .validate(record.kind, &info.signature_method, &content, &signed_value)?;
        log::debug!("signature {} verified", record.id);

        Ok(SignatureOutcome {
            id: record.id.clone(),
            kind: record.kind.as_str().to_string(),
            relative_to: record.relative_to.clone(),
            references: info.references.len(),
            seal_version,
            signature_date_time: info.signature_date_time.clone(),
        })
    }

    fn check_references(&self, references: &References) -> Result<()> {
        digest::verify_set(references, |path: &ContainerPath| -> Result<Box<dyn Read>> {
            if !self.workspace.exists(path) {
                let expected = references
                    .entries
                    .iter()
                    .find(|r| &r.file_ref == path)
                    .map(|r| r.check_value.clone())
                    .unwrap_or_default();
                return Err(Error::FileIntegrity {
                    path: path.to_string(),
                    expected,
                    actual: Vec::new(),
                });
            }
            self.workspace.open(path)
        })
    }
}

impl std::fmt::Debug for OfdValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfdValidator")
            .field("workspace", &self.workspace)
            .finish()
    }
}
