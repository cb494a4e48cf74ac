//! Scratch workspace holding an unpacked OFD package.
//!
//! The workspace owns a temporary directory; dropping it deletes the
//! directory on every exit path, including early returns and panics.

use super::ContainerPath;
use crate::error::{Error, Result};
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// An unpacked package in a private temporary directory.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create an empty workspace.
    pub fn new(prefix: &str) -> Result<Self> {
        let dir = tempfile::Builder::new().prefix(prefix).tempdir()?;
        log::debug!("created workspace {}", dir.path().display());
        Ok(Self { dir })
    }

    /// Unpack a package held in memory.
    pub fn extract(data: &[u8], prefix: &str) -> Result<Self> {
        let workspace = Self::new(prefix)?;
        let mut archive = ZipArchive::new(Cursor::new(data))?;

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            let name = entry.enclosed_name().ok_or_else(|| {
                Error::InvalidStructure(format!("package entry escapes root: {}", entry.name()))
            })?;
            let target = workspace.root().join(name);
            if entry.is_dir() {
                fs::create_dir_all(&target)?;
                continue;
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut buf = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut buf)?;
            fs::write(&target, buf)?;
        }

        log::debug!("extracted {} package entries", archive.len());
        Ok(workspace)
    }

    /// Unpack a package file.
    pub fn extract_file(path: impl AsRef<Path>, prefix: &str) -> Result<Self> {
        let data = fs::read(path.as_ref())?;
        Self::extract(&data, prefix)
    }

    /// Host directory backing the workspace.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Host path of a container path.
    pub fn abs_path(&self, path: &ContainerPath) -> PathBuf {
        self.root().join(path.relative())
    }

    /// Whether a regular file exists at `path`.
    pub fn exists(&self, path: &ContainerPath) -> bool {
        self.abs_path(path).is_file()
    }

    /// Read a whole file.
    pub fn read(&self, path: &ContainerPath) -> Result<Vec<u8>> {
        fs::read(self.abs_path(path)).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::InvalidStructure(format!("missing package file {}", path))
            } else {
                Error::Io(e)
            }
        })
    }

    /// Read a file as UTF-8 text.
    pub fn read_string(&self, path: &ContainerPath) -> Result<String> {
        String::from_utf8(self.read(path)?)
            .map_err(|_| Error::Xml(format!("{} is not valid UTF-8", path)))
    }

    /// Open a file for streaming reads.
    pub fn open(&self, path: &ContainerPath) -> Result<Box<dyn Read>> {
        match fs::File::open(self.abs_path(path)) {
            Ok(f) => Ok(Box::new(std::io::BufReader::new(f))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::InvalidStructure(format!("missing package file {}", path)))
            },
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Write a file, creating parent directories.
    pub fn write(&self, path: &ContainerPath, data: &[u8]) -> Result<()> {
        if path.is_root() {
            return Err(Error::InvalidArgument("cannot write to package root".to_string()));
        }
        let target = self.abs_path(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(target, data)?;
        Ok(())
    }

    /// Create a directory (and its parents).
    pub fn create_dir(&self, path: &ContainerPath) -> Result<()> {
        fs::create_dir_all(self.abs_path(path))?;
        Ok(())
    }

    /// Whether a directory exists at `path`.
    pub fn dir_exists(&self, path: &ContainerPath) -> bool {
        self.abs_path(path).is_dir()
    }

    /// Delete a file.
    pub fn delete(&self, path: &ContainerPath) -> Result<()> {
        fs::remove_file(self.abs_path(path))?;
        Ok(())
    }

    /// Delete a directory tree; missing directories are ignored.
    pub fn delete_dir(&self, path: &ContainerPath) -> Result<()> {
        let target = self.abs_path(path);
        if target.is_dir() {
            fs::remove_dir_all(target)?;
        }
        Ok(())
    }

    /// Every regular file in the workspace, sorted by container path.
    pub fn walk(&self) -> Result<Vec<ContainerPath>> {
        let mut out = Vec::new();
        collect_files(self.root(), &ContainerPath::root(), &mut out)?;
        out.sort();
        Ok(out)
    }

    /// Pack the workspace into ZIP bytes.
    pub fn repack(&self) -> Result<Vec<u8>> {
        let mut files = self.walk()?;
        // mimetype, when present, must be the first entry
        files.sort_by_key(|p| p.as_str() != "/mimetype");

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for file in &files {
            writer.start_file(file.relative(), options)?;
            writer.write_all(&self.read(file)?)?;
        }
        let cursor = writer.finish()?;
        log::debug!("repacked {} files", files.len());
        Ok(cursor.into_inner())
    }

    /// Pack the workspace into `dest`, replacing it atomically.
    pub fn repack_to(&self, dest: impl AsRef<Path>) -> Result<()> {
        write_atomic(dest.as_ref(), &self.repack()?)
    }
}

/// Write `data` to `dest` through a sibling temporary file, so readers never
/// see a partial package.
pub fn write_atomic(dest: &Path, data: &[u8]) -> Result<()> {
    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;
    let mut staged = tempfile::NamedTempFile::new_in(&parent)?;
    staged.write_all(data)?;
    staged.persist(dest).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

fn collect_files(dir: &Path, prefix: &ContainerPath, out: &mut Vec<ContainerPath>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let file_type = entry.file_type()?;
        let path = prefix.join(&name);
        if file_type.is_dir() {
            collect_files(&entry.path(), &path, out)?;
        } else if file_type.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Workspace {
        let ws = Workspace::new("ws-test-").unwrap();
        ws.write(&ContainerPath::new("/OFD.xml"), b"<ofd:OFD/>").unwrap();
        ws.write(&ContainerPath::new("/Doc_0/Document.xml"), b"<doc/>").unwrap();
        ws.write(&ContainerPath::new("/Doc_0/Res/empty.bin"), b"").unwrap();
        ws
    }

    #[test]
    fn test_walk_is_sorted() {
        let ws = sample();
        let files: Vec<String> = ws.walk().unwrap().iter().map(|p| p.to_string()).collect();
        assert_eq!(files, vec!["/Doc_0/Document.xml", "/Doc_0/Res/empty.bin", "/OFD.xml"]);
    }

    #[test]
    fn test_repack_and_extract() {
        let ws = sample();
        let bytes = ws.repack().unwrap();
        let back = Workspace::extract(&bytes, "ws-test-").unwrap();
        assert_eq!(back.walk().unwrap(), ws.walk().unwrap());
        assert_eq!(back.read(&ContainerPath::new("/Doc_0/Document.xml")).unwrap(), b"<doc/>");
        assert!(back.read(&ContainerPath::new("/Doc_0/Res/empty.bin")).unwrap().is_empty());
    }

    #[test]
    fn test_workspace_deleted_on_drop() {
        let ws = sample();
        let root = ws.root().to_path_buf();
        assert!(root.exists());
        drop(ws);
        assert!(!root.exists());
    }

    #[test]
    fn test_missing_file_is_structure_error() {
        let ws = sample();
        assert!(matches!(
            ws.read(&ContainerPath::new("/nope.xml")),
            Err(Error::InvalidStructure(_))
        ));
    }

    #[test]
    fn test_repack_to_file() {
        let ws = sample();
        let out = tempfile::tempdir().unwrap();
        let dest = out.path().join("out.ofd");
        ws.repack_to(&dest).unwrap();
        let back = Workspace::extract_file(&dest, "ws-test-").unwrap();
        assert!(back.exists(&ContainerPath::new("/OFD.xml")));
    }

    #[test]
    fn test_delete_dir() {
        let ws = sample();
        ws.delete_dir(&ContainerPath::new("/Doc_0/Res")).unwrap();
        assert!(!ws.exists(&ContainerPath::new("/Doc_0/Res/empty.bin")));
        ws.delete_dir(&ContainerPath::new("/Doc_0/Missing")).unwrap();
    }
}
