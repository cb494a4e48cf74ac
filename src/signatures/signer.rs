//! OFD signing.
//!
//! The signer works on a scratch copy of the package. Nothing reaches the
//! caller's file until [`OfdSigner::commit_to`] writes the repacked package.

use super::container::ExtendSignatureContainer;
use super::sign_id::SignIdProvider;
use super::stamp::{NormalStampPos, StampAppearance};
use super::types::SignMode;
use crate::config::TrustConfig;
use crate::container::{ContainerPath, Workspace};
use crate::digest;
use crate::error::{Error, Result};
use crate::geometry::Rect;
use crate::xml::ofd::OfdEntry;
use crate::xml::signature::{Reference, References, Signature, SignedInfo};
use crate::xml::signatures::{SignatureRecord, Signatures};
use std::path::Path;
use std::sync::Arc;

const SIGNATURES_FILE: &str = "Signs/Signatures.xml";
const SIGNATURE_FILE: &str = "Signature.xml";
const SIGNED_VALUE_FILE: &str = "SignedValue.dat";
const SEAL_FILE: &str = "Seal.esl";

/// Progress of one signing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignerState {
    /// Opened and checked; nothing written yet
    Init,
    /// Record appended and protected files chosen
    FileSetSelected,
    /// References computed
    DigestsComputed,
    /// `Seal.esl` written
    SealEmbedded,
    /// `SignedValue.dat` written
    SignatureProduced,
    /// Package repacked for the caller
    Committed,
    /// A step failed; the workspace is discarded
    Failed,
}

/// Adds one signature to an OFD package.
///
/// ```no_run
/// use ofd_oxide::signatures::{DigitalSignContainer, OfdSigner, SignMode, SigningCredentials};
///
/// let credentials = SigningCredentials::self_signed("CN=Signer")?;
/// let mut signer = OfdSigner::open("plain.ofd", Box::new(DigitalSignContainer::new(credentials)))?;
/// signer.set_sign_mode(SignMode::ContinueSign);
/// signer.execute()?;
/// signer.commit_to("signed.ofd")?;
/// # Ok::<(), ofd_oxide::Error>(())
/// ```
pub struct OfdSigner {
    workspace: Workspace,
    config: TrustConfig,
    container: Box<dyn ExtendSignatureContainer>,
    mode: SignMode,
    ids: Arc<dyn SignIdProvider>,
    appearances: Vec<Box<dyn StampAppearance>>,
    ofd: OfdEntry,
    signatures_loc: Option<ContainerPath>,
    signatures: Signatures,
    state: SignerState,
}

impl OfdSigner {
    /// Open a package file.
    pub fn open(path: impl AsRef<Path>, container: Box<dyn ExtendSignatureContainer>) -> Result<Self> {
        Self::open_with_config(path, container, TrustConfig::default())
    }

    /// Open a package file with explicit configuration.
    pub fn open_with_config(
        path: impl AsRef<Path>,
        container: Box<dyn ExtendSignatureContainer>,
        config: TrustConfig,
    ) -> Result<Self> {
        let workspace = Workspace::extract_file(path, &config.temp_prefix)?;
        Self::with_workspace(workspace, container, config)
    }

    /// Open a package held in memory.
    pub fn from_bytes(data: &[u8], container: Box<dyn ExtendSignatureContainer>) -> Result<Self> {
        Self::from_bytes_with_config(data, container, TrustConfig::default())
    }

    /// Open a package held in memory with explicit configuration.
    pub fn from_bytes_with_config(
        data: &[u8],
        container: Box<dyn ExtendSignatureContainer>,
        config: TrustConfig,
    ) -> Result<Self> {
        let workspace = Workspace::extract(data, &config.temp_prefix)?;
        Self::with_workspace(workspace, container, config)
    }

    fn with_workspace(
        workspace: Workspace,
        container: Box<dyn ExtendSignatureContainer>,
        config: TrustConfig,
    ) -> Result<Self> {
        let ofd = OfdEntry::load(&workspace)?;
        let signatures_loc = ofd.signatures_loc();
        let signatures = match &signatures_loc {
            Some(loc) if workspace.exists(loc) => Signatures::parse(&workspace.read(loc)?, loc)?,
            Some(loc) => {
                log::warn!("OFD.xml names {} but the file is missing; starting a new list", loc);
                Signatures::new()
            },
            None => Signatures::new(),
        };
        let ids = config.sign_id_format.provider();
        let signer = Self {
            workspace,
            mode: SignMode::default(),
            ids,
            appearances: Vec::new(),
            ofd,
            signatures_loc,
            signatures,
            state: SignerState::Init,
            container,
            config,
        };
        signer.pre_check()?;
        Ok(signer)
    }

    /// Seed the ID counter and refuse documents whose list is already protected.
    fn pre_check(&self) -> Result<()> {
        self.seed_ids(self.ids.as_ref())?;
        let list_loc = match &self.signatures_loc {
            Some(loc) => loc,
            None => return Ok(()),
        };
        for record in &self.signatures.records {
            let signature = Signature::parse(&self.workspace.read(&record.base_loc)?, &record.base_loc, list_loc)?;
            if signature.signed_info.references.contains(list_loc) {
                return Err(Error::SignatureTerminated(format!(
                    "signature {} protects {}; no further signatures are allowed",
                    record.id, list_loc
                )));
            }
        }
        Ok(())
    }

    fn seed_ids(&self, ids: &dyn SignIdProvider) -> Result<()> {
        match self.last_sign_id(ids)? {
            Some(id) => ids.set_current_max(&id),
            None => Ok(()),
        }
    }

    /// `MaxSignId`, or the largest record ID for lists written without it.
    fn last_sign_id(&self, ids: &dyn SignIdProvider) -> Result<Option<String>> {
        if let Some(max) = &self.signatures.max_sign_id {
            return Ok(Some(max.clone()));
        }
        let mut max: Option<(u32, &str)> = None;
        for record in &self.signatures.records {
            let n = ids.parse(&record.id)?;
            if max.map_or(true, |(m, _)| n > m) {
                max = Some((n, record.id.as_str()));
            }
        }
        Ok(max.map(|(_, id)| id.to_string()))
    }

    /// Current state.
    pub fn state(&self) -> SignerState {
        self.state
    }

    /// Choose which files the signature protects.
    pub fn set_sign_mode(&mut self, mode: SignMode) -> &mut Self {
        self.mode = mode;
        self
    }

    /// Replace the signature container.
    pub fn set_signature_container(&mut self, container: Box<dyn ExtendSignatureContainer>) -> &mut Self {
        self.container = container;
        self
    }

    /// Use `ids` for the new signature ID. It is seeded from the document's `MaxSignId`.
    pub fn set_sign_id_provider(&mut self, ids: Arc<dyn SignIdProvider>) -> Result<&mut Self> {
        self.seed_ids(ids.as_ref())?;
        self.ids = ids;
        Ok(self)
    }

    /// Place the stamp appearance at `boundary` on page `page_ref`.
    pub fn add_target_area(&mut self, page_ref: impl Into<String>, boundary: Rect) -> &mut Self {
        self.appearances.push(Box::new(NormalStampPos {
            page_ref: page_ref.into(),
            boundary,
            clip: None,
        }));
        self
    }

    /// Add a stamp placement.
    pub fn add_stamp(&mut self, appearance: Box<dyn StampAppearance>) -> &mut Self {
        self.appearances.push(appearance);
        self
    }

    /// Sign the workspace. Returns the new record.
    pub fn execute(&mut self) -> Result<SignatureRecord> {
        if self.state != SignerState::Init {
            return Err(Error::InvalidState(format!(
                "signer already ran (state {:?})",
                self.state
            )));
        }
        let result = self.run();
        if result.is_err() {
            self.state = SignerState::Failed;
        }
        result
    }

    fn run(&mut self) -> Result<SignatureRecord> {
        let previous = self.last_sign_id(self.ids.as_ref())?;
        let id = self.ids.increment_and_get();
        let doc_dir = self.ofd.doc_root()?.parent();

        let list_loc = match &self.signatures_loc {
            Some(loc) => loc.clone(),
            None => {
                let loc = ContainerPath::resolve(&doc_dir, SIGNATURES_FILE);
                self.ofd.set_signatures_loc(&loc)?;
                self.ofd.save(&self.workspace)?;
                self.signatures_loc = Some(loc.clone());
                loc
            },
        };

        let signs_dir = list_loc.parent();
        let sign_dir = (0..)
            .map(|k| signs_dir.join(&format!("Sign_{}", k)))
            .find(|dir| !self.workspace.dir_exists(dir) && !self.workspace.exists(dir))
            .ok_or_else(|| Error::InvalidState("no free signature directory".to_string()))?;
        let signature_loc = sign_dir.join(SIGNATURE_FILE);

        let mut record = SignatureRecord::new(id.clone(), self.container.sign_type(), signature_loc.clone());
        if self.mode == SignMode::ContinueSign {
            if let Some(prev) = previous {
                record = record.with_relative(prev);
            }
        }
        self.signatures.push(record.clone())?;
        self.workspace
            .write(&list_loc, self.signatures.to_xml(&list_loc).as_bytes())?;

        let files: Vec<ContainerPath> = self
            .workspace
            .walk()?
            .into_iter()
            .filter(|p| !p.starts_with(&sign_dir))
            .filter(|p| self.mode == SignMode::WholeProtected || *p != list_loc)
            .collect();
        self.state = SignerState::FileSetSelected;

        let alg = self
            .container
            .digest_algorithm()
            .unwrap_or(self.config.digest_algorithm);
        let mut references = References::new(alg);
        for path in files {
            let value = digest::compute_reader(alg, self.workspace.open(&path)?)?;
            log::debug!("{} {} = {}", alg.name(), path, hex::encode(&value));
            references.push(Reference::new(path, value))?;
        }
        self.state = SignerState::DigestsComputed;

        let seal = match self.container.seal()? {
            Some(seal) => {
                let loc = sign_dir.join(SEAL_FILE);
                self.workspace.write(&loc, &seal)?;
                self.state = SignerState::SealEmbedded;
                Some(loc)
            },
            None => None,
        };

        let mut annot_id = 0u32;
        let mut next_id = || {
            annot_id += 1;
            annot_id.to_string()
        };
        let mut stamp_annots = Vec::new();
        for appearance in &self.appearances {
            stamp_annots.extend(appearance.annotations(&mut next_id)?);
        }

        let signed_value = sign_dir.join(SIGNED_VALUE_FILE);
        let signature = Signature {
            signed_info: SignedInfo {
                provider: self.config.provider.clone(),
                signature_method: self.container.signature_algorithm().oid().to_string(),
                signature_date_time: self.config.now_string(),
                references,
                stamp_annots,
                seal,
                parameters: Vec::new(),
            },
            signed_value: signed_value.clone(),
        };
        let content = signature.to_xml().into_bytes();
        self.workspace.write(&signature_loc, &content)?;

        let value = self.container.sign(&content, signature_loc.as_str())?;
        self.workspace.write(&signed_value, &value)?;
        self.state = SignerState::SignatureProduced;

        log::debug!(
            "signature {} over {} files written to {}",
            record.id,
            signature.signed_info.references.len(),
            sign_dir
        );
        Ok(record)
    }

    /// Repack the signed workspace.
    pub fn commit_to_bytes(&mut self) -> Result<Vec<u8>> {
        if self.state != SignerState::SignatureProduced {
            return Err(Error::InvalidState(format!(
                "nothing to commit (state {:?})",
                self.state
            )));
        }
        let out = self.workspace.repack()?;
        self.state = SignerState::Committed;
        log::info!(
            "committed signature {}",
            self.signatures.max_sign_id.as_deref().unwrap_or_default()
        );
        Ok(out)
    }

    /// Repack the signed workspace into `dest`, replacing it atomically.
    pub fn commit_to(&mut self, dest: impl AsRef<Path>) -> Result<()> {
        let data = self.commit_to_bytes()?;
        crate::container::write_atomic(dest.as_ref(), &data)
    }
}

impl std::fmt::Debug for OfdSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfdSigner")
            .field("workspace", &self.workspace)
            .field("mode", &self.mode)
            .field("signatures_loc", &self.signatures_loc)
            .field("appearances", &self.appearances.len())
            .field("state", &self.state)
            .finish()
    }
}
