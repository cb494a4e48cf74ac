//! Whole-package decryption, the inverse of [`super::OfdEncryptor`].

use super::aes::{self, BLOCK_SIZE};
use super::user::UserCredential;
use crate::config::TrustConfig;
use crate::container::{ContainerPath, Workspace};
use crate::error::{Error, Result};
use crate::xml::encrypt::{DecryptSeed, EncryptEntries, Encryptions, UserInfo, ENCRYPTIONS_ENTRY};
use std::path::Path;

/// Decrypts a package encrypted by [`super::OfdEncryptor`].
///
/// Only the most recent encryption operation is undone per call; packages
/// encrypted several times are peeled one layer at a time.
#[derive(Debug)]
pub struct OfdDecryptor {
    workspace: Workspace,
    done: bool,
}

impl OfdDecryptor {
    /// Open an encrypted package file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let config = TrustConfig::default();
        Ok(Self {
            workspace: Workspace::extract_file(path, &config.temp_prefix)?,
            done: false,
        })
    }

    /// Open an encrypted package held in memory.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let config = TrustConfig::default();
        Ok(Self {
            workspace: Workspace::extract(data, &config.temp_prefix)?,
            done: false,
        })
    }

    /// The recipients of the most recent operation.
    pub fn recipients(&self) -> Result<Vec<UserInfo>> {
        let encryptions = self.encryptions()?;
        let info = encryptions
            .infos
            .last()
            .ok_or_else(|| Error::InvalidStructure("package is not encrypted".to_string()))?;
        Ok(DecryptSeed::parse(&self.workspace.read(&info.decrypt_seed_loc)?)?.users)
    }

    fn encryptions(&self) -> Result<Encryptions> {
        let entry_loc = ContainerPath::new(ENCRYPTIONS_ENTRY);
        if !self.workspace.exists(&entry_loc) {
            return Err(Error::InvalidStructure("package is not encrypted".to_string()));
        }
        Encryptions::parse(&self.workspace.read(&entry_loc)?)
    }

    /// Decrypt with `credential` and return the restored package bytes.
    pub fn decrypt(&mut self, credential: &UserCredential) -> Result<Vec<u8>> {
        if self.done {
            return Err(Error::InvalidState("package already decrypted".to_string()));
        }
        let mut encryptions = self.encryptions()?;
        let info = encryptions
            .infos
            .last()
            .cloned()
            .ok_or_else(|| Error::InvalidStructure("package is not encrypted".to_string()))?;
        let seed = DecryptSeed::parse(&self.workspace.read(&info.decrypt_seed_loc)?)?;

        let mut matching = Vec::new();
        for user in &seed.users {
            if credential.matches(user)? {
                matching.push(user);
            }
        }
        let user = match matching.as_slice() {
            [] => {
                return Err(Error::NoMatchingRecipient(format!(
                    "no {} recipient in operation {} matches",
                    credential.case().id(),
                    info.id
                )))
            },
            [user] => *user,
            many => {
                return Err(Error::AmbiguousRecipient(format!(
                    "{} recipients in operation {} match",
                    many.len(),
                    info.id
                )))
            },
        };

        let fek = credential.unwrap_fek(user)?;
        if fek.len() != BLOCK_SIZE {
            return Err(Error::DecryptionFailed(format!(
                "unwrapped key has {} bytes",
                fek.len()
            )));
        }
        let map_xml = aes::cbc_decrypt(&fek, &user.iv_value, &self.workspace.read(&info.entries_map_loc)?)?;
        let entries = EncryptEntries::parse(&map_xml)
            .map_err(|e| Error::DecryptionFailed(format!("entries map unreadable: {}", e)))?;

        // Read everything before writing: a restored path may coincide with
        // another entry's encrypted location.
        let mut restored = Vec::with_capacity(entries.entries.len());
        for entry in &entries.entries {
            let iv = seed
                .file_ivs
                .get(&entry.e_path)
                .map(Vec::as_slice)
                .unwrap_or(&user.iv_value);
            let plaintext = aes::cbc_decrypt(&fek, iv, &self.workspace.read(&entry.e_path)?)?;
            log::debug!("decrypted {} -> {}", entry.e_path, entry.path);
            restored.push((entry, plaintext));
        }
        for (entry, _) in &restored {
            self.workspace.delete(&entry.e_path)?;
        }
        for (entry, plaintext) in &restored {
            self.workspace.write(&entry.path, plaintext)?;
        }

        for artefact in [&info.entries_map_loc, &info.decrypt_seed_loc] {
            if self.workspace.exists(artefact) {
                self.workspace.delete(artefact)?;
            }
        }
        encryptions.remove(&info.id);
        let entry_loc = ContainerPath::new(ENCRYPTIONS_ENTRY);
        if encryptions.infos.is_empty() {
            self.workspace.delete(&entry_loc)?;
        } else {
            self.workspace.write(&entry_loc, encryptions.to_xml().as_bytes())?;
        }
        self.done = true;

        let out = self.workspace.repack()?;
        log::info!(
            "decrypted {} files (operation {}) for {}",
            restored.len(),
            info.id,
            user.user_name
        );
        Ok(out)
    }

    /// Decrypt and write the restored package to `dest`.
    pub fn decrypt_to(&mut self, credential: &UserCredential, dest: impl AsRef<Path>) -> Result<()> {
        let data = self.decrypt(credential)?;
        crate::container::write_atomic(dest.as_ref(), &data)
    }
}
