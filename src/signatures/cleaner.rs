//! Signature removal.

use crate::config::TrustConfig;
use crate::container::Workspace;
use crate::error::Result;
use crate::xml::ofd::OfdEntry;
use std::path::Path;

/// Strips every signature from a package.
///
/// The `Signatures` entry of `OFD.xml` is removed, and so is the directory
/// holding the signature list when it is named `Signs`. A list stored
/// elsewhere is deleted on its own.
#[derive(Debug)]
pub struct SignCleaner {
    workspace: Workspace,
}

impl SignCleaner {
    /// Open a package file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let config = TrustConfig::default();
        Ok(Self {
            workspace: Workspace::extract_file(path, &config.temp_prefix)?,
        })
    }

    /// Open a package held in memory.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let config = TrustConfig::default();
        Ok(Self {
            workspace: Workspace::extract(data, &config.temp_prefix)?,
        })
    }

    /// Remove the signatures and return the repacked package.
    pub fn clean(&mut self) -> Result<Vec<u8>> {
        let mut ofd = OfdEntry::load(&self.workspace)?;
        let list_loc = ofd.signatures_loc();
        if ofd.remove_signatures() {
            ofd.save(&self.workspace)?;
        }
        match list_loc {
            Some(loc) => {
                let dir = loc.parent();
                if dir.file_name().eq_ignore_ascii_case("Signs") {
                    self.workspace.delete_dir(&dir)?;
                }
                if self.workspace.exists(&loc) {
                    self.workspace.delete(&loc)?;
                }
                log::info!("removed signatures listed in {}", loc);
            },
            None => log::debug!("package carries no signatures"),
        }
        self.workspace.repack()
    }

    /// Remove the signatures and write the package to `dest`.
    pub fn clean_to(&mut self, dest: impl AsRef<Path>) -> Result<()> {
        let data = self.clean()?;
        crate::container::write_atomic(dest.as_ref(), &data)
    }
}
