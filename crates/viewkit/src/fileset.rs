//! Immutable snapshots of named view files.
//!
//! A [`FileSet`] holds every view the eager resolver will ever see, split into
//! text entries (parsed as templates) and binary entries (returned verbatim).
//! Names are forward-slash relative paths regardless of the host OS.
//!
//! File sets are built either from caller-supplied [`Entry`] values or by
//! walking a directory with [`FileSet::load_dir`]:
//!
//! ```rust
//! use viewkit::{FileSet, LoadOptions};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let views = tempfile::tempdir()?;
//! std::fs::create_dir(views.path().join("app"))?;
//! std::fs::write(views.path().join("app/index.html"), "{{ title }}")?;
//! std::fs::write(views.path().join("app/notes.txt"), "skipped")?;
//!
//! let options = LoadOptions::new().extensions([".html"]);
//! let files = FileSet::load_dir(views.path(), &options)?;
//! assert!(files.contains("app/index.html"));
//! assert!(!files.contains("app/notes.txt"));
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::path::{Component, Path};
use std::sync::Arc;

use walkdir::WalkDir;

use crate::error::{RenderError, ResourceError};

/// Number of leading bytes inspected by [`sniff_binary`].
pub const SNIFF_LEN: usize = 1024;

/// Returns true if the content looks binary.
///
/// Any byte in `0..=8` within the first [`SNIFF_LEN`] bytes marks the
/// content as binary.
pub fn sniff_binary(content: &[u8]) -> bool {
    content.iter().take(SNIFF_LEN).any(|b| *b <= 8)
}

/// Returns true if `name` ends with one of `extensions`.
///
/// An empty list accepts every name.
pub(crate) fn has_extension(name: &str, extensions: &[String]) -> bool {
    extensions.is_empty() || extensions.iter().any(|ext| name.ends_with(ext.as_str()))
}

/// Joins the normal components of a relative path with `/`.
pub(crate) fn normalize_name(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// A named blob captured into a [`FileSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Forward-slash relative path, unique within a file set.
    pub name: String,
    /// Raw content.
    pub content: Vec<u8>,
    /// Binary entries are never parsed.
    pub is_binary: bool,
}

impl Entry {
    /// Creates a text entry.
    pub fn text(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into().into_bytes(),
            is_binary: false,
        }
    }

    /// Creates a binary entry.
    pub fn binary(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            is_binary: true,
        }
    }
}

/// Size ceilings applied while building a file set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeLimits {
    /// Largest allowed entry in bytes.
    pub per_entry: Option<u64>,
    /// Largest allowed sum of all entries in bytes.
    pub total: Option<u64>,
}

/// Options for [`FileSet::load_dir`].
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Accepted name suffixes, e.g. `.html`. Empty accepts everything.
    pub extensions: Vec<String>,
    /// Keep binary files instead of skipping them.
    pub allow_binary: bool,
    /// Size ceilings.
    pub limits: SizeLimits,
}

impl LoadOptions {
    /// Creates options that accept every file and skip binaries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts loading to names ending in one of `extensions`.
    pub fn extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Keeps binary files.
    pub fn allow_binary(mut self, allow: bool) -> Self {
        self.allow_binary = allow;
        self
    }

    /// Sets the size ceilings.
    pub fn limits(mut self, limits: SizeLimits) -> Self {
        self.limits = limits;
        self
    }
}

/// Immutable snapshot of text and binary views.
#[derive(Debug, Clone, Default)]
pub struct FileSet {
    text: BTreeMap<String, Arc<str>>,
    binary: BTreeMap<String, Arc<[u8]>>,
}

impl FileSet {
    /// Creates an empty file set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a file set from entries, enforcing `limits`.
    ///
    /// Text content that is not valid UTF-8 is decoded lossily.
    ///
    /// # Errors
    ///
    /// - [`RenderError::Resource`] if an entry or the total exceeds a ceiling
    /// - [`RenderError::Config`] if two entries share a name
    pub fn from_entries<I>(entries: I, limits: &SizeLimits) -> Result<Self, RenderError>
    where
        I: IntoIterator<Item = Entry>,
    {
        Self::collect(entries, limits, "fileset")
    }

    /// Walks `root` recursively and captures every matching file.
    ///
    /// Files whose names do not end in one of the configured extensions are
    /// skipped, as are binary files unless [`LoadOptions::allow_binary`] is
    /// set. Entries are named by their path relative to `root`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Resource`] if the walk or a read fails, or if a
    /// size ceiling is exceeded.
    pub fn load_dir(root: impl AsRef<Path>, options: &LoadOptions) -> Result<Self, RenderError> {
        let root = root.as_ref();
        let mut entries = Vec::new();

        for item in WalkDir::new(root).sort_by_file_name() {
            let item = item.map_err(|err| {
                let path = err
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| root.display().to_string());
                ResourceError::Io {
                    path,
                    source: err.into(),
                }
            })?;
            if !item.file_type().is_file() {
                continue;
            }

            let path = item.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            let name = normalize_name(relative);
            if !has_extension(&name, &options.extensions) {
                tracing::trace!(name = %name, "skipping file with unmatched extension");
                continue;
            }

            let content = std::fs::read(path).map_err(|source| ResourceError::Io {
                path: path.display().to_string(),
                source,
            })?;
            let is_binary = sniff_binary(&content);
            if is_binary && !options.allow_binary {
                tracing::trace!(name = %name, "skipping binary file");
                continue;
            }

            entries.push(Entry {
                name,
                content,
                is_binary,
            });
        }

        let set = Self::collect(entries, &options.limits, &root.display().to_string())?;
        tracing::debug!(
            root = %root.display(),
            text = set.text.len(),
            binary = set.binary.len(),
            "loaded file set"
        );
        Ok(set)
    }

    fn collect<I>(entries: I, limits: &SizeLimits, root: &str) -> Result<Self, RenderError>
    where
        I: IntoIterator<Item = Entry>,
    {
        let mut set = Self::new();
        let mut total: u64 = 0;

        for entry in entries {
            let size = entry.content.len() as u64;
            if let Some(limit) = limits.per_entry {
                if size > limit {
                    return Err(ResourceError::EntryTooLarge {
                        path: entry.name,
                        limit,
                        actual: size,
                    }
                    .into());
                }
            }
            total += size;

            if set.contains(&entry.name) {
                return Err(RenderError::Config(format!(
                    "duplicate entry name '{}'",
                    entry.name
                )));
            }
            if entry.is_binary {
                set.binary.insert(entry.name, Arc::from(entry.content));
            } else {
                let text = String::from_utf8_lossy(&entry.content).into_owned();
                set.text.insert(entry.name, Arc::from(text));
            }
        }

        if let Some(limit) = limits.total {
            if total > limit {
                return Err(ResourceError::TotalTooLarge {
                    root: root.to_string(),
                    limit,
                    actual: total,
                }
                .into());
            }
        }

        Ok(set)
    }

    /// Returns the source of a text entry.
    pub fn text(&self, name: &str) -> Option<&Arc<str>> {
        self.text.get(name)
    }

    /// Returns the content of a binary entry.
    pub fn binary(&self, name: &str) -> Option<&Arc<[u8]>> {
        self.binary.get(name)
    }

    /// Returns true if either partition has `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.text.contains_key(name) || self.binary.contains_key(name)
    }

    /// Iterates over text entries in name order.
    pub fn texts(&self) -> impl Iterator<Item = (&str, &Arc<str>)> {
        self.text.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterates over binary entries in name order.
    pub fn binaries(&self) -> impl Iterator<Item = (&str, &Arc<[u8]>)> {
        self.binary.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns all entry names in order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .text
            .keys()
            .chain(self.binary.keys())
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.text.len() + self.binary.len()
    }

    /// Returns true if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &[u8]) {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    // =========================================================================
    // Sniffing and naming
    // =========================================================================

    #[test]
    fn test_sniff_binary_control_bytes() {
        assert!(sniff_binary(b"\x89PNG\r\n\x1a\n\x00\x00"));
        assert!(sniff_binary(&[0x08]));
        assert!(!sniff_binary(b"<p>plain\ttext\n</p>"));
        assert!(!sniff_binary(b""));
    }

    #[test]
    fn test_sniff_binary_only_inspects_prefix() {
        let mut content = vec![b'a'; SNIFF_LEN];
        content.push(0);
        assert!(!sniff_binary(&content));
    }

    #[test]
    fn test_has_extension() {
        let exts = vec![".html".to_string(), ".tmpl".to_string()];
        assert!(has_extension("a/index.html", &exts));
        assert!(!has_extension("a/index.txt", &exts));
        assert!(has_extension("anything", &[]));
    }

    #[test]
    fn test_normalize_name_uses_forward_slashes() {
        let path = Path::new("app").join("sub").join("index.html");
        assert_eq!(normalize_name(&path), "app/sub/index.html");
    }

    // =========================================================================
    // from_entries
    // =========================================================================

    #[test]
    fn test_from_entries_partitions() {
        let set = FileSet::from_entries(
            vec![
                Entry::text("a.html", "A"),
                Entry::binary("images/name.png", b"<ping file>".to_vec()),
            ],
            &SizeLimits::default(),
        )
        .unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set.text("a.html").map(|s| &**s), Some("A"));
        assert_eq!(
            set.binary("images/name.png").map(|b| &**b),
            Some(&b"<ping file>"[..])
        );
        assert!(set.text("images/name.png").is_none());
        assert_eq!(set.names(), vec!["a.html", "images/name.png"]);
    }

    #[test]
    fn test_from_entries_rejects_duplicates() {
        let result = FileSet::from_entries(
            vec![Entry::text("a.html", "1"), Entry::text("a.html", "2")],
            &SizeLimits::default(),
        );
        assert!(matches!(result, Err(RenderError::Config(_))));
    }

    #[test]
    fn test_from_entries_per_entry_ceiling() {
        let limits = SizeLimits {
            per_entry: Some(3),
            total: None,
        };
        let err = FileSet::from_entries(vec![Entry::text("big.html", "12345")], &limits)
            .unwrap_err();
        match err {
            RenderError::Resource(ResourceError::EntryTooLarge { path, limit, actual }) => {
                assert_eq!(path, "big.html");
                assert_eq!(limit, 3);
                assert_eq!(actual, 5);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_from_entries_total_ceiling() {
        let limits = SizeLimits {
            per_entry: None,
            total: Some(5),
        };
        let err = FileSet::from_entries(
            vec![Entry::text("a", "123"), Entry::text("b", "456")],
            &limits,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RenderError::Resource(ResourceError::TotalTooLarge { actual: 6, .. })
        ));
    }

    // =========================================================================
    // load_dir
    // =========================================================================

    #[test]
    fn test_load_dir_filters_and_normalizes() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "index.html", b"root");
        write(dir.path(), "app/page.html", b"page");
        write(dir.path(), "app/notes.txt", b"skip me");
        write(dir.path(), "images/logo.html", b"\x00\x01binary");

        let options = LoadOptions::new().extensions([".html"]);
        let set = FileSet::load_dir(dir.path(), &options).unwrap();

        assert_eq!(set.names(), vec!["app/page.html", "index.html"]);
        assert_eq!(set.text("app/page.html").map(|s| &**s), Some("page"));
    }

    #[test]
    fn test_load_dir_keeps_binaries_when_allowed() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "images/logo.png", b"\x00\x01binary");

        let options = LoadOptions::new().allow_binary(true);
        let set = FileSet::load_dir(dir.path(), &options).unwrap();

        assert!(set.binary("images/logo.png").is_some());
    }

    #[test]
    fn test_load_dir_missing_root() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let result = FileSet::load_dir(&missing, &LoadOptions::new());
        assert!(matches!(
            result,
            Err(RenderError::Resource(ResourceError::Io { .. }))
        ));
    }
}
