//! Backing stores for lazy resolution.
//!
//! The lazy resolver reads views through the [`TemplateStore`] trait, one
//! name at a time. [`DirectoryStore`] reads from disk on every call;
//! [`FileSet`] serves the same contract from memory, which is mostly useful
//! for checking that lazy and eager rendering agree.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use crate::fileset::{has_extension, sniff_binary, FileSet, SNIFF_LEN};

/// Content returned by a successful store read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub content: Vec<u8>,
    pub is_binary: bool,
}

impl StoredFile {
    /// Returns the content as text, decoding lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.content).into_owned()
    }
}

/// Failure reading a single view from a store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("template \"{name}\" not found")]
    NotFound { name: String },

    /// The file exists but the store is configured to refuse it.
    #[error("template \"{name}\" rejected: {reason}")]
    Rejected { name: String, reason: String },

    #[error("{name}: {limit} < {actual}. maxsize over")]
    TooLarge { name: String, limit: u64, actual: u64 },

    #[error("cannot read template \"{name}\": {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    /// Returns true for failures that mean "no such view" to a caller.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. } | StoreError::Rejected { .. })
    }
}

/// A source of views addressed by forward-slash names.
pub trait TemplateStore: Send + Sync {
    /// Reads the named view.
    fn read(&self, name: &str) -> Result<StoredFile, StoreError>;

    /// Returns true if `read` would find the named view.
    fn exists(&self, name: &str) -> bool;
}

impl TemplateStore for FileSet {
    fn read(&self, name: &str) -> Result<StoredFile, StoreError> {
        if let Some(text) = self.text(name) {
            return Ok(StoredFile {
                content: text.as_bytes().to_vec(),
                is_binary: false,
            });
        }
        if let Some(bytes) = self.binary(name) {
            return Ok(StoredFile {
                content: bytes.to_vec(),
                is_binary: true,
            });
        }
        Err(StoreError::NotFound {
            name: name.to_string(),
        })
    }

    fn exists(&self, name: &str) -> bool {
        self.contains(name)
    }
}

/// Reads views from a directory on every call.
///
/// Names are joined onto the root; names that try to leave the root (`..`)
/// or are absolute are reported as not found.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
    extensions: Vec<String>,
    allow_binary: bool,
    max_size: Option<u64>,
}

impl DirectoryStore {
    /// Creates a store rooted at `root` that accepts every extension and
    /// refuses binaries.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extensions: Vec::new(),
            allow_binary: false,
            max_size: None,
        }
    }

    /// Restricts reads to names ending in one of `extensions`.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_binary(mut self, allow: bool) -> Self {
        self.allow_binary = allow;
        self
    }

    pub fn with_max_size(mut self, max_size: Option<u64>) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn locate(&self, name: &str) -> Option<PathBuf> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if name.is_empty() || escapes || !has_extension(name, &self.extensions) {
            return None;
        }
        Some(self.root.join(relative))
    }
}

impl TemplateStore for DirectoryStore {
    fn read(&self, name: &str) -> Result<StoredFile, StoreError> {
        let not_found = || StoreError::NotFound {
            name: name.to_string(),
        };
        let path = self.locate(name).ok_or_else(not_found)?;

        let metadata = match std::fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Err(not_found()),
            Err(source) => {
                return Err(StoreError::Io {
                    name: name.to_string(),
                    source,
                })
            }
        };
        if !metadata.is_file() {
            return Err(not_found());
        }
        if let Some(limit) = self.max_size {
            if metadata.len() > limit {
                return Err(StoreError::TooLarge {
                    name: name.to_string(),
                    limit,
                    actual: metadata.len(),
                });
            }
        }

        let content = std::fs::read(&path).map_err(|source| StoreError::Io {
            name: name.to_string(),
            source,
        })?;
        let is_binary = sniff_binary(&content);
        if is_binary && !self.allow_binary {
            return Err(StoreError::Rejected {
                name: name.to_string(),
                reason: "binary content is not allowed".to_string(),
            });
        }

        tracing::debug!(name, bytes = content.len(), binary = is_binary, "read template");
        Ok(StoredFile { content, is_binary })
    }

    /// Binary files count only when the store serves binaries.
    fn exists(&self, name: &str) -> bool {
        let Some(path) = self.locate(name).filter(|path| path.is_file()) else {
            return false;
        };
        if self.allow_binary {
            return true;
        }
        matches!(sniff_file(&path), Ok(false))
    }
}

fn sniff_file(path: &Path) -> io::Result<bool> {
    let mut head = Vec::with_capacity(SNIFF_LEN);
    File::open(path)?
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut head)?;
    Ok(sniff_binary(&head))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fileset::{Entry, SizeLimits};
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("app")).unwrap();
        fs::write(dir.path().join("app/index.html"), "{{ name }}").unwrap();
        fs::write(dir.path().join("app/notes.txt"), "notes").unwrap();
        fs::write(dir.path().join("app/logo.html"), b"\x00\x01\x02").unwrap();
        dir
    }

    #[test]
    fn test_directory_store_reads_text() {
        let dir = fixture();
        let store = DirectoryStore::new(dir.path()).with_extensions([".html"]);
        let file = store.read("app/index.html").unwrap();
        assert!(!file.is_binary);
        assert_eq!(file.text(), "{{ name }}");
    }

    #[test]
    fn test_directory_store_missing_is_not_found() {
        let dir = fixture();
        let store = DirectoryStore::new(dir.path());
        let err = store.read("app/missing.html").unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_directory_store_extension_mismatch_is_not_found() {
        let dir = fixture();
        let store = DirectoryStore::new(dir.path()).with_extensions([".html"]);
        assert!(store.read("app/notes.txt").unwrap_err().is_not_found());
        assert!(!store.exists("app/notes.txt"));
    }

    #[test]
    fn test_directory_store_refuses_parent_segments() {
        let dir = fixture();
        let store = DirectoryStore::new(dir.path().join("app"));
        assert!(store.read("../app/index.html").unwrap_err().is_not_found());
    }

    #[test]
    fn test_directory_store_binary_policy() {
        let dir = fixture();
        let strict = DirectoryStore::new(dir.path());
        assert!(matches!(
            strict.read("app/logo.html"),
            Err(StoreError::Rejected { .. })
        ));

        let lenient = DirectoryStore::new(dir.path()).with_binary(true);
        let file = lenient.read("app/logo.html").unwrap();
        assert!(file.is_binary);
        assert_eq!(file.content, b"\x00\x01\x02");
    }

    #[test]
    fn test_directory_store_exists_follows_binary_policy() {
        let dir = fixture();
        assert!(!DirectoryStore::new(dir.path()).exists("app/logo.html"));
        assert!(DirectoryStore::new(dir.path()).exists("app/index.html"));
        assert!(DirectoryStore::new(dir.path())
            .with_binary(true)
            .exists("app/logo.html"));
    }

    #[test]
    fn test_directory_store_max_size() {
        let dir = fixture();
        let store = DirectoryStore::new(dir.path()).with_max_size(Some(4));
        let err = store.read("app/index.html").unwrap_err();
        assert!(matches!(
            err,
            StoreError::TooLarge {
                limit: 4,
                actual: 10,
                ..
            }
        ));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_directory_store_directory_is_not_found() {
        let dir = fixture();
        let store = DirectoryStore::new(dir.path());
        assert!(store.read("app").unwrap_err().is_not_found());
        assert!(!store.exists("app"));
        assert!(store.exists("app/index.html"));
    }

    #[test]
    fn test_fileset_as_store() {
        let set = FileSet::from_entries(
            vec![
                Entry::text("a.html", "A"),
                Entry::binary("b.png", vec![0u8, 1]),
            ],
            &SizeLimits::default(),
        )
        .unwrap();

        assert_eq!(set.read("a.html").unwrap().text(), "A");
        assert!(set.read("b.png").unwrap().is_binary);
        assert!(set.read("c.html").unwrap_err().is_not_found());
        assert!(TemplateStore::exists(&set, "b.png"));
    }
}
