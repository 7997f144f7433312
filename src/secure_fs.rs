//! Secure Kit - Filesystem Operations
//!
//! Atomic writes and overwrite-before-delete for entry files.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind as IoErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{KitError, KitResult};

/// Filesystem handler rooted at the store directory
#[derive(Debug, Clone)]
pub struct SecureFs {
    root: PathBuf,
}

impl SecureFs {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Write file atomically
    pub fn write_file(&self, relative_path: &str, data: &[u8]) -> KitResult<()> {
        let path = self.full_path(relative_path);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Temp file then rename
        let temp_path = path.with_extension("tmp");

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)?;

        file.write_all(data)?;
        file.sync_all()?;

        if let Err(e) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        Ok(())
    }

    /// Read file; `Ok(None)` when it does not exist
    pub fn read_file(&self, relative_path: &str) -> KitResult<Option<Vec<u8>>> {
        let path = self.full_path(relative_path);

        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(KitError::FileOperation(format!("{}: {}", path.display(), e)));
            }
        };

        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|e| KitError::FileOperation(format!("{}: {}", path.display(), e)))?;

        Ok(Some(data))
    }

    /// Overwrite with zeros, then delete. Returns false if the file was absent.
    pub fn delete_file(&self, relative_path: &str) -> KitResult<bool> {
        let path = self.full_path(relative_path);

        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        let size = metadata.len() as usize;
        if size > 0 {
            if let Ok(mut file) = OpenOptions::new().write(true).open(&path) {
                let zeros = vec![0u8; size.min(1024 * 1024)]; // Max 1MB chunks
                let mut remaining = size;
                while remaining > 0 {
                    let to_write = remaining.min(zeros.len());
                    if file.write_all(&zeros[..to_write]).is_err() {
                        break;
                    }
                    remaining -= to_write;
                }
                let _ = file.sync_all();
            }
        }

        fs::remove_file(&path)?;
        Ok(true)
    }

    pub fn exists(&self, relative_path: &str) -> bool {
        self.full_path(relative_path).is_file()
    }

    /// List file names with the given extension directly under a directory
    pub fn list_files(&self, relative_dir: &str, extension: &str) -> KitResult<Vec<String>> {
        let dir = self.full_path(relative_dir);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| KitError::FileOperation(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(extension) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                files.push(name.to_string());
            }
        }

        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_secure_fs() {
        let dir = tempdir().unwrap();
        let fs = SecureFs::new(dir.path());

        fs.write_file("entries/data.ske", b"encrypted data").unwrap();
        assert!(fs.exists("entries/data.ske"));
        assert!(!fs.exists("entries/data.tmp"));

        let data = fs.read_file("entries/data.ske").unwrap();
        assert_eq!(data.as_deref(), Some(b"encrypted data".as_slice()));

        assert!(fs.delete_file("entries/data.ske").unwrap());
        assert!(!fs.exists("entries/data.ske"));
        assert!(!fs.delete_file("entries/data.ske").unwrap());
    }

    #[test]
    fn test_read_missing_is_none() {
        let dir = tempdir().unwrap();
        let fs = SecureFs::new(dir.path());
        assert_eq!(fs.read_file("nope").unwrap(), None);
    }

    #[test]
    fn test_overwrite_replaces_content() {
        let dir = tempdir().unwrap();
        let fs = SecureFs::new(dir.path());

        fs.write_file("a.ske", b"first").unwrap();
        fs.write_file("a.ske", b"second").unwrap();
        assert_eq!(fs.read_file("a.ske").unwrap().unwrap(), b"second");
    }

    #[test]
    fn test_list_files_filters_extension() {
        let dir = tempdir().unwrap();
        let fs = SecureFs::new(dir.path());

        fs.write_file("entries/a.ske", b"1").unwrap();
        fs.write_file("entries/b.ske", b"2").unwrap();
        fs.write_file("entries/c.other", b"3").unwrap();

        let mut files = fs.list_files("entries", "ske").unwrap();
        files.sort();
        assert_eq!(files, vec!["a.ske".to_string(), "b.ske".to_string()]);
        assert!(fs.list_files("missing", "ske").unwrap().is_empty());
    }
}
