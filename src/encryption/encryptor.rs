//! Whole-package encryption.
//!
//! Every selected file is AES-CBC encrypted under one random file encryption
//! key (FEK) with its own IV and renamed to `<dir>/<stem>.dat`. The
//! plaintext-to-ciphertext mapping is stored encrypted in the entries map;
//! the FEK is wrapped once per recipient into the decrypt seed.

use super::aes::{self, BLOCK_SIZE};
use super::user::UserFekEncryptor;
use crate::config::TrustConfig;
use crate::container::{ContainerPath, Workspace};
use crate::error::{Error, Result};
use crate::xml::encrypt::{
    DecryptSeed, EncryptEntries, EncryptEntry, EncryptInfo, Encryptions, ENCRYPTIONS_ENTRY,
};
use crate::xml::signature::Parameter;
use indexmap::IndexMap;
use p256::elliptic_curve::rand_core::CryptoRngCore;
use rand::rngs::OsRng;
use rand::RngCore;
use std::path::Path;

/// Decides whether a package file gets encrypted.
pub type ContainerFileFilter = Box<dyn Fn(&ContainerPath) -> bool>;

/// Default selection: every file except `/Encryptions.xml`.
pub fn encrypt_files_default_filter(path: &ContainerPath) -> bool {
    path.as_str() != ENCRYPTIONS_ENTRY
}

/// Pick `<dir>/<stem>.dat`, or `<stem>_1.dat`, `<stem>_2.dat` … when taken.
pub(crate) fn dat_path(workspace: &Workspace, dir: &ContainerPath, stem: &str) -> ContainerPath {
    let stem = match stem.to_lowercase() {
        s if s.is_empty() => "file".to_string(),
        s => s,
    };
    let mut candidate = dir.join(&format!("{}.dat", stem));
    let mut n = 1;
    while workspace.exists(&candidate) {
        candidate = dir.join(&format!("{}_{}.dat", stem, n));
        n += 1;
    }
    candidate
}

/// Encrypts an OFD package for one or more recipients.
///
/// ```no_run
/// use ofd_oxide::encryption::{OfdEncryptor, UserPasswordEncryptor};
///
/// let mut encryptor = OfdEncryptor::open("plain.ofd")?;
/// encryptor.add_user(Box::new(UserPasswordEncryptor::new("alice", "secret")?));
/// encryptor.encrypt_to("encrypted.ofd")?;
/// # Ok::<(), ofd_oxide::Error>(())
/// ```
pub struct OfdEncryptor {
    workspace: Workspace,
    config: TrustConfig,
    users: Vec<Box<dyn UserFekEncryptor>>,
    filter: ContainerFileFilter,
    parameters: Vec<Parameter>,
    rng: Box<dyn CryptoRngCore>,
    done: bool,
}

impl OfdEncryptor {
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
            users: Vec::new(),
            filter: Box::new(encrypt_files_default_filter),
            parameters: Vec::new(),
            rng: Box::new(OsRng),
            done: false,
        }
    }

    /// Add a recipient.
    pub fn add_user(&mut self, user: Box<dyn UserFekEncryptor>) -> &mut Self {
        self.users.push(user);
        self
    }

    /// Restrict which files are encrypted. `/Encryptions.xml` is never encrypted.
    pub fn set_container_file_filter(
        &mut self,
        filter: impl Fn(&ContainerPath) -> bool + 'static,
    ) -> &mut Self {
        self.filter = Box::new(filter);
        self
    }

    /// Extension parameters written into the `EncryptInfo`.
    pub fn set_parameters(&mut self, parameters: Vec<Parameter>) -> &mut Self {
        self.parameters = parameters;
        self
    }

    /// Replace the randomness source for keys and IVs.
    pub fn set_rng(&mut self, rng: Box<dyn CryptoRngCore>) -> &mut Self {
        self.rng = rng;
        self
    }

    fn random_block(&mut self) -> Vec<u8> {
        let mut block = vec![0u8; BLOCK_SIZE];
        self.rng.fill_bytes(&mut block);
        block
    }

    /// Encrypt and return the new package bytes.
    pub fn encrypt(&mut self) -> Result<Vec<u8>> {
        if self.done {
            return Err(Error::InvalidState("package already encrypted".to_string()));
        }
        if self.users.is_empty() {
            return Err(Error::InvalidArgument(
                "at least one recipient is required".to_string(),
            ));
        }
        self.done = true;

        let entry_loc = ContainerPath::new(ENCRYPTIONS_ENTRY);
        let mut encryptions = if self.workspace.exists(&entry_loc) {
            Encryptions::parse(&self.workspace.read(&entry_loc)?)?
        } else {
            Encryptions::default()
        };
        let id = (encryptions.max_id() + 1).to_string();

        let fek = self.random_block();
        let seed_iv = self.random_block();

        let targets: Vec<ContainerPath> = self
            .workspace
            .walk()?
            .into_iter()
            .filter(|p| p.as_str() != ENCRYPTIONS_ENTRY && (self.filter)(p))
            .collect();

        let mut entries = EncryptEntries {
            id: id.clone(),
            entries: Vec::with_capacity(targets.len()),
        };
        let mut file_ivs = IndexMap::with_capacity(targets.len());
        for path in targets {
            let iv = self.random_block();
            let ciphertext = aes::cbc_encrypt(&fek, &iv, &self.workspace.read(&path)?)?;
            let e_path = dat_path(&self.workspace, &path.parent(), path.file_stem());
            self.workspace.write(&e_path, &ciphertext)?;
            self.workspace.delete(&path)?;
            log::debug!("encrypted {} -> {}", path, e_path);
            file_ivs.insert(e_path.clone(), iv);
            entries.entries.push(EncryptEntry {
                path,
                e_path,
                decrypt_seed_loc: None,
            });
        }

        let entries_map_loc = dat_path(&self.workspace, &ContainerPath::root(), "entriesmap");
        let sealed_map = aes::cbc_encrypt(&fek, &seed_iv, entries.to_xml().as_bytes())?;
        self.workspace.write(&entries_map_loc, &sealed_map)?;

        let mut users = Vec::with_capacity(self.users.len());
        for user in &self.users {
            users.push(user.encrypt(&fek, &seed_iv, &mut *self.rng)?);
        }
        let seed = DecryptSeed {
            id: id.clone(),
            encrypt_case_id: self.users[0].case().id().to_string(),
            users,
            file_ivs,
        };
        let decrypt_seed_loc = dat_path(&self.workspace, &ContainerPath::root(), "decryptseed");
        self.workspace.write(&decrypt_seed_loc, seed.to_xml().as_bytes())?;

        encryptions.infos.push(EncryptInfo {
            id: id.clone(),
            relative: None,
            provider: self.config.provider.clone(),
            encrypt_date: self.config.now_string(),
            encrypt_scope: "All".to_string(),
            parameters: self.parameters.clone(),
            decrypt_seed_loc,
            entries_map_loc,
        });
        self.workspace.write(&entry_loc, encryptions.to_xml().as_bytes())?;

        let out = self.workspace.repack()?;
        log::info!(
            "encrypted {} files for {} recipients (operation {})",
            entries.entries.len(),
            self.users.len(),
            id
        );
        Ok(out)
    }

    /// Encrypt and write the new package to `dest`.
    pub fn encrypt_to(&mut self, dest: impl AsRef<Path>) -> Result<()> {
        let data = self.encrypt()?;
        crate::container::write_atomic(dest.as_ref(), &data)
    }
}

impl std::fmt::Debug for OfdEncryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfdEncryptor")
            .field("workspace", &self.workspace)
            .field("users", &self.users.len())
            .field("done", &self.done)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dat_path_collisions() {
        let ws = Workspace::new("ofd-test-").unwrap();
        let dir = ContainerPath::new("/Doc_0");
        assert_eq!(dat_path(&ws, &dir, "Content").as_str(), "/Doc_0/content.dat");
        ws.write(&ContainerPath::new("/Doc_0/content.dat"), b"x").unwrap();
        assert_eq!(dat_path(&ws, &dir, "Content").as_str(), "/Doc_0/content_1.dat");
        ws.write(&ContainerPath::new("/Doc_0/content_1.dat"), b"x").unwrap();
        assert_eq!(dat_path(&ws, &dir, "CONTENT").as_str(), "/Doc_0/content_2.dat");
    }

    #[test]
    fn test_default_filter() {
        assert!(!encrypt_files_default_filter(&ContainerPath::new("/Encryptions.xml")));
        assert!(encrypt_files_default_filter(&ContainerPath::new("/OFD.xml")));
    }
}
