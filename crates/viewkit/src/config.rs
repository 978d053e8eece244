//! Declarative renderer construction.
//!
//! A [`RenderConfig`] describes where views live and how they are resolved.
//! It deserializes from YAML, so applications can keep it next to their own
//! settings:
//!
//! ```yaml
//! directory: ./views
//! extensions: [".html", ".tmpl"]
//! cache: true           # eager mode; false reads from disk on every render
//! binary: true          # serve binary files verbatim
//! max_size: 1048576     # per-file ceiling in bytes, 0 or absent for none
//! sum_max_size: 0       # aggregate ceiling, eager mode only
//! exclude: '//=\s*(.+)'
//! duplicate_helpers: reject
//! ```
//!
//! Every field has a default; an empty document is a valid configuration
//! for the current directory in lazy mode.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::engine::{EagerResolver, LazyResolver, Limits, DEFAULT_MAX_DEPTH, DEFAULT_MAX_RESOLUTIONS};
use crate::error::{RenderError, ResourceError, Result};
use crate::fileset::{FileSet, LoadOptions, SizeLimits};
use crate::helper::DuplicatePolicy;
use crate::renderer::Renderer;
use crate::store::DirectoryStore;

/// Settings for building a [`Renderer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    /// Root directory of the views.
    pub directory: PathBuf,
    /// Accepted file suffixes. Empty accepts every file.
    pub extensions: Vec<String>,
    /// Pattern stripped from text output.
    pub exclude: Option<String>,
    /// Preload and parse every view once (eager mode).
    pub cache: bool,
    /// Serve binary files instead of ignoring them.
    pub binary: bool,
    /// Per-file ceiling in bytes.
    pub max_size: Option<u64>,
    /// Aggregate ceiling in bytes; only meaningful with `cache`.
    pub sum_max_size: Option<u64>,
    pub duplicate_helpers: DuplicatePolicy,
    pub max_depth: usize,
    pub max_resolutions: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            extensions: Vec::new(),
            exclude: None,
            cache: false,
            binary: false,
            max_size: None,
            sum_max_size: None,
            duplicate_helpers: DuplicatePolicy::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            max_resolutions: DEFAULT_MAX_RESOLUTIONS,
        }
    }
}

impl RenderConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Self::default()
        }
    }

    /// Parses a YAML document.
    pub fn from_yaml(source: &str) -> Result<Self> {
        serde_yaml::from_str(source)
            .map_err(|e| RenderError::Config(format!("invalid configuration: {}", e)))
    }

    /// Reads and parses a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ResourceError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&source)
    }

    pub fn limits(&self) -> Limits {
        Limits {
            max_depth: self.max_depth,
            max_resolutions: self.max_resolutions,
        }
    }

    /// Builds a renderer in the configured mode.
    ///
    /// # Errors
    ///
    /// - [`RenderError::Config`] if the directory is missing or not a
    ///   directory, or the exclude pattern does not compile
    /// - [`RenderError::Resource`] / [`RenderError::Parse`] from preloading
    ///   in eager mode
    pub fn build(&self) -> Result<Renderer> {
        self.check_directory()?;
        let max_size = self.max_size.filter(|n| *n > 0);

        let renderer = if self.cache {
            let options = LoadOptions {
                extensions: self.extensions.clone(),
                allow_binary: self.binary,
                limits: SizeLimits {
                    per_entry: max_size,
                    total: self.sum_max_size.filter(|n| *n > 0),
                },
            };
            let files = FileSet::load_dir(&self.directory, &options)?;
            let resolver = EagerResolver::new(&files)?.with_limits(self.limits());
            Renderer::with_resolver(Arc::new(resolver))
        } else {
            let store = DirectoryStore::new(&self.directory)
                .with_extensions(self.extensions.iter().cloned())
                .with_binary(self.binary)
                .with_max_size(max_size);
            let resolver = LazyResolver::new(store).with_limits(self.limits());
            Renderer::with_resolver(Arc::new(resolver))
        };

        let renderer = renderer.with_duplicate_policy(self.duplicate_helpers);
        let renderer = match &self.exclude {
            Some(pattern) => renderer.with_exclude(pattern)?,
            None => renderer,
        };

        tracing::debug!(
            directory = %self.directory.display(),
            mode = ?renderer.mode(),
            "built renderer"
        );
        Ok(renderer)
    }

    fn check_directory(&self) -> Result<()> {
        let metadata = std::fs::metadata(&self.directory).map_err(|_| {
            RenderError::Config(format!(
                "cannot access '{}' no such file or directory",
                self.directory.display()
            ))
        })?;
        if !metadata.is_dir() {
            return Err(RenderError::Config(format!(
                "'{}' not directory",
                self.directory.display()
            )));
        }
        Ok(())
    }
}
