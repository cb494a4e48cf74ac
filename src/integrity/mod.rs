//! Package integrity protection (GB/T 33190 section 7.8).
//!
//! The producer lists every file of the package in `/OFDEntries.xml`, together
//! with a digest of each, and signs the manifest into `/signedvalue.dat`. A
//! verifier checks the signature, then compares the manifest with the files
//! actually present: an unlisted file, a missing file or a changed digest all
//! count as tampering.
//!
//! ```no_run
//! use ofd_oxide::integrity::{IntegrityVerifier, OfdIntegrity};
//! use ofd_oxide::signatures::SigningCredentials;
//!
//! let producer = SigningCredentials::self_signed("CN=Producer")?;
//! OfdIntegrity::open("plain.ofd")?.protect_to("protected.ofd", &producer)?;
//!
//! let entries = IntegrityVerifier::open("protected.ofd")?.verify()?;
//! println!("{} files intact", entries.files.len());
//! # Ok::<(), ofd_oxide::Error>(())
//! ```

use crate::config::TrustConfig;
use crate::container::{ContainerPath, Workspace};
use crate::crypto::VerifyingKey;
use crate::digest::{self, DigestAlgorithm};
use crate::error::{Error, Result};
use crate::signatures::{SignatureScheme, SigningCredentials};
use crate::xml::entries::{DocEntries, EntryFile, ENTRIES_LOC, SIGNED_VALUE_LOC};
use std::collections::BTreeSet;
use std::path::Path;

const CREATION_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Writes and signs the integrity manifest of a package.
pub struct OfdIntegrity {
    workspace: Workspace,
    config: TrustConfig,
    scheme: SignatureScheme,
    done: bool,
}

impl OfdIntegrity {
    /// Open a package file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, TrustConfig::default())
    }

    /// Open a package file with explicit configuration.
    pub fn open_with_config(path: impl AsRef<Path>, config: TrustConfig) -> Result<Self> {
        let workspace = Workspace::extract_file(path, &config.temp_prefix)?;
        Ok(Self::with_workspace(workspace, config))
    }

    /// Open a package held in memory.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::from_bytes_with_config(data, TrustConfig::default())
    }

    /// Open a package held in memory with explicit configuration.
    pub fn from_bytes_with_config(data: &[u8], config: TrustConfig) -> Result<Self> {
        let workspace = Workspace::extract(data, &config.temp_prefix)?;
        Ok(Self::with_workspace(workspace, config))
    }

    fn with_workspace(workspace: Workspace, config: TrustConfig) -> Self {
        Self {
            workspace,
            config,
            scheme: SignatureScheme::Enveloped,
            done: false,
        }
    }

    /// Value format of `/signedvalue.dat`. Defaults to a CMS envelope.
    pub fn set_scheme(&mut self, scheme: SignatureScheme) -> &mut Self {
        self.scheme = scheme;
        self
    }

    /// Signature value location of a manifest already in the package.
    fn previous_value_loc(&self) -> Result<Option<ContainerPath>> {
        let entries_loc = ContainerPath::new(ENTRIES_LOC);
        if !self.workspace.exists(&entries_loc) {
            return Ok(None);
        }
        let previous = DocEntries::parse(&self.workspace.read(&entries_loc)?)?;
        Ok(Some(previous.signed_value_loc))
    }

    /// Manifest for the current package content, skipping the files of any
    /// earlier manifest.
    fn manifest(&self, previous_value: Option<&ContainerPath>) -> Result<DocEntries> {
        let mut skip = BTreeSet::from([ContainerPath::new(ENTRIES_LOC), ContainerPath::new(SIGNED_VALUE_LOC)]);
        skip.extend(previous_value.cloned());

        let alg = self.config.digest_algorithm;
        let mut files = Vec::new();
        for (n, path) in self
            .workspace
            .walk()?
            .into_iter()
            .filter(|p| !skip.contains(p))
            .enumerate()
        {
            let check_value = digest::compute_reader(alg, self.workspace.open(&path)?)?;
            files.push(EntryFile {
                id: (n + 2).to_string(),
                loc: path,
                check_value: Some(check_value),
            });
        }

        Ok(DocEntries {
            id: "1".to_string(),
            creator_name: Some(crate::NAME.to_string()),
            version: Some(crate::VERSION.to_string()),
            creation_date: Some(chrono::Local::now().format(CREATION_DATE_FORMAT).to_string()),
            check_method: Some(alg),
            files,
            signed_value_loc: ContainerPath::new(SIGNED_VALUE_LOC),
        })
    }

    /// Protect the package and return the new bytes.
    ///
    /// A manifest already present is replaced, together with its signature value.
    pub fn protect(&mut self, credentials: &SigningCredentials) -> Result<Vec<u8>> {
        if self.done {
            return Err(Error::InvalidState("package already protected".to_string()));
        }
        let previous_value = self.previous_value_loc()?;
        let entries = self.manifest(previous_value.as_ref())?;
        self.done = true;

        if let Some(loc) = previous_value.filter(|loc| self.workspace.exists(loc)) {
            self.workspace.delete(&loc)?;
        }
        let xml = entries.to_xml();
        let value = self.scheme.sign(xml.as_bytes(), credentials)?;
        self.workspace.write(&ContainerPath::new(ENTRIES_LOC), xml.as_bytes())?;
        self.workspace.write(&entries.signed_value_loc, &value)?;

        let out = self.workspace.repack()?;
        log::info!(
            "protected {} files under {} ({})",
            entries.files.len(),
            ENTRIES_LOC,
            self.config.digest_algorithm.name()
        );
        Ok(out)
    }

    /// Protect the package and write it to `dest`.
    pub fn protect_to(&mut self, dest: impl AsRef<Path>, credentials: &SigningCredentials) -> Result<()> {
        let data = self.protect(credentials)?;
        crate::container::write_atomic(dest.as_ref(), &data)
    }
}

impl std::fmt::Debug for OfdIntegrity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfdIntegrity")
            .field("workspace", &self.workspace)
            .field("scheme", &self.scheme)
            .field("done", &self.done)
            .finish()
    }
}

/// Checks the integrity manifest of a package.
#[derive(Debug)]
pub struct IntegrityVerifier {
    workspace: Workspace,
    scheme: SignatureScheme,
    key: Option<VerifyingKey>,
}

impl IntegrityVerifier {
    /// Open a package file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let workspace = Workspace::extract_file(path, &TrustConfig::default().temp_prefix)?;
        Ok(Self::with_workspace(workspace))
    }

    /// Open a package held in memory.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let workspace = Workspace::extract(data, &TrustConfig::default().temp_prefix)?;
        Ok(Self::with_workspace(workspace))
    }

    fn with_workspace(workspace: Workspace) -> Self {
        Self {
            workspace,
            scheme: SignatureScheme::Enveloped,
            key: None,
        }
    }

    /// Value format expected in the signature value file.
    pub fn set_scheme(&mut self, scheme: SignatureScheme) -> &mut Self {
        self.scheme = scheme;
        self
    }

    /// Require the producer's key. Raw values cannot be checked without one.
    pub fn set_verifying_key(&mut self, key: VerifyingKey) -> &mut Self {
        self.key = Some(key);
        self
    }

    /// Verify the manifest signature and the package against the manifest.
    ///
    /// Returns [`Error::DocNotSigned`] when the package has no manifest.
    pub fn verify(&self) -> Result<DocEntries> {
        let entries_loc = ContainerPath::new(ENTRIES_LOC);
        if !self.workspace.exists(&entries_loc) {
            return Err(Error::DocNotSigned);
        }
        let raw = self.workspace.read(&entries_loc)?;
        let entries = DocEntries::parse(&raw)?;
        if !self.workspace.exists(&entries.signed_value_loc) {
            return Err(Error::InvalidStructure(format!(
                "signature value {} is missing",
                entries.signed_value_loc
            )));
        }
        let value = self.workspace.read(&entries.signed_value_loc)?;
        self.scheme.verify(&raw, &value, self.key.as_ref())?;

        let listed: BTreeSet<&ContainerPath> = entries.files.iter().map(|f| &f.loc).collect();
        let present: BTreeSet<ContainerPath> = self
            .workspace
            .walk()?
            .into_iter()
            .filter(|p| *p != entries_loc && *p != entries.signed_value_loc)
            .collect();
        if let Some(extra) = present.iter().find(|p| !listed.contains(p)) {
            return Err(Error::EntriesMismatch(format!("{} is not listed", extra)));
        }
        if let Some(missing) = listed.iter().find(|p| !present.contains(**p)) {
            return Err(Error::EntriesMismatch(format!("{} is missing", missing)));
        }

        if let Some(alg) = entries.check_method {
            check_files(&self.workspace, alg, &entries.files)?;
        }
        log::info!("integrity manifest {} verified, {} files", entries.id, entries.files.len());
        Ok(entries)
    }
}

fn check_files(workspace: &Workspace, alg: DigestAlgorithm, files: &[EntryFile]) -> Result<()> {
    for file in files {
        let Some(expected) = &file.check_value else {
            continue;
        };
        let actual = digest::compute_reader(alg, workspace.open(&file.loc)?)?;
        log::debug!("{} {} = {}", alg.name(), file.loc, hex::encode(&actual));
        if !digest::digest_eq(&actual, expected) {
            return Err(Error::FileIntegrity {
                path: file.loc.to_string(),
                expected: expected.clone(),
                actual,
            });
        }
    }
    Ok(())
}
