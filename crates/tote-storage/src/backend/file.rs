//! File-backed storage: one JSON file per key.
//!
//! ## Layout
//! ```text
//! <data_dir>/
//! ├── shopping-cart.json
//! └── recently-viewed.json
//! ```
//!
//! Writes go to `<name>.json.tmp` first and are renamed into place, so a
//! crash mid-write never leaves a truncated value behind.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::Storage;
use crate::error::{StorageError, StorageResult};

#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Storage rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileStorage { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding `key`. Characters outside `[A-Za-z0-9._-]` become `_`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{name}.json"))
    }

    fn ensure_dir(&self) -> StorageResult<()> {
        if self.dir.exists() && !self.dir.is_dir() {
            return Err(StorageError::Unavailable(format!(
                "{} is not a directory",
                self.dir.display()
            )));
        }
        fs::create_dir_all(&self.dir)?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn read(&self, key: &str) -> StorageResult<Option<String>> {
        if self.dir.exists() && !self.dir.is_dir() {
            return Err(StorageError::Unavailable(format!(
                "{} is not a directory",
                self.dir.display()
            )));
        }

        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> StorageResult<()> {
        self.ensure_dir()?;

        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;

        debug!(key = %key, path = %path.display(), bytes = value.len(), "File storage write");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_read_missing_dir_is_absent() {
        let tmp = tempdir().unwrap();
        let storage = FileStorage::new(tmp.path().join("not-yet"));
        assert_eq!(storage.read("shopping-cart").unwrap(), None);
    }

    #[test]
    fn test_write_creates_dir_and_reads_back() {
        let tmp = tempdir().unwrap();
        let storage = FileStorage::new(tmp.path().join("nested/data"));

        storage.write("shopping-cart", r#"[{"id":1,"quantity":2}]"#).unwrap();

        assert_eq!(
            storage.read("shopping-cart").unwrap().as_deref(),
            Some(r#"[{"id":1,"quantity":2}]"#)
        );
        assert!(storage.path_for("shopping-cart").is_file());
        assert!(!storage.path_for("shopping-cart").with_extension("json.tmp").exists());
    }

    #[test]
    fn test_key_sanitized() {
        let storage = FileStorage::new("/data");
        assert_eq!(
            storage.path_for("../etc/passwd"),
            PathBuf::from("/data/.._etc_passwd.json")
        );
        assert_eq!(
            storage.path_for("shopping-cart"),
            PathBuf::from("/data/shopping-cart.json")
        );
    }

    #[test]
    fn test_dir_is_a_file_is_unavailable() {
        let tmp = tempdir().unwrap();
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, "x").unwrap();

        let storage = FileStorage::new(&blocker);
        assert!(storage.read("k").unwrap_err().is_unavailable());
        assert!(storage.write("k", "v").unwrap_err().is_unavailable());
    }

    #[test]
    fn test_two_instances_share_files() {
        let tmp = tempdir().unwrap();
        FileStorage::new(tmp.path()).write("k", "first").unwrap();

        let reopened = FileStorage::new(tmp.path());
        assert_eq!(reopened.read("k").unwrap().as_deref(), Some("first"));
    }
}
