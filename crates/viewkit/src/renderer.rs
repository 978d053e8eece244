//! The rendering facade.
//!
//! [`Renderer`] ties a [`Resolver`] to a set of helpers and an optional
//! [`ExclusionFilter`]. It is the type applications hold on to:
//!
//! ```rust
//! use viewkit::{Entry, FileSet, Renderer, SizeLimits};
//!
//! let files = FileSet::from_entries(
//!     vec![
//!         Entry::text("index.html", "<h1>{{ title }}</h1>{{ import(\"footer.html\") }}"),
//!         Entry::text("footer.html", "<footer>{{ title }}</footer>"),
//!     ],
//!     &SizeLimits::default(),
//! )
//! .unwrap();
//!
//! let renderer = Renderer::eager(&files).unwrap();
//! let out = renderer
//!     .render("index.html", &serde_json::json!({ "title": "Home" }))
//!     .unwrap();
//! assert_eq!(out, b"<h1>Home</h1><footer>Home</footer>");
//! ```
//!
//! # Concurrency
//!
//! A renderer is `Send + Sync`. The helper map sits behind a mutex that a
//! render holds only long enough to take a snapshot; reading, parsing and
//! executing happen without it. Helpers registered while a render is running
//! are seen by later renders only.
//!
//! # Copies
//!
//! [`Renderer::copy`] returns a renderer with its own helper map over the
//! same resolver. Registering on one never affects the other.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use minijinja::Value;
use serde::Serialize;

use crate::engine::{EagerResolver, LazyResolver, Mode, Rendered, Resolver};
use crate::error::Result;
use crate::exclude::ExclusionFilter;
use crate::fileset::FileSet;
use crate::helper::{Binding, DuplicatePolicy, Helper, HelperMethod, HelperRegistry};
use crate::store::TemplateStore;

/// Renders views with registered helpers.
pub struct Renderer {
    resolver: Arc<dyn Resolver>,
    helpers: Mutex<HelperRegistry>,
    exclude: Option<ExclusionFilter>,
}

impl Renderer {
    /// Creates a renderer over a preloaded file set.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Parse`](crate::RenderError::Parse) if any text
    /// entry fails to parse.
    pub fn eager(files: &FileSet) -> Result<Self> {
        Ok(Self::with_resolver(Arc::new(EagerResolver::new(files)?)))
    }

    /// Creates a renderer that reads views from `store` on demand.
    pub fn lazy(store: impl TemplateStore + 'static) -> Self {
        Self::with_resolver(Arc::new(LazyResolver::new(store)))
    }

    /// Creates a renderer over any resolver.
    pub fn with_resolver(resolver: Arc<dyn Resolver>) -> Self {
        Self {
            resolver,
            helpers: Mutex::new(HelperRegistry::new()),
            exclude: None,
        }
    }

    /// Strips matches of `pattern` from every text output.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Config`](crate::RenderError::Config) if the
    /// pattern does not compile.
    pub fn with_exclude(self, pattern: &str) -> Result<Self> {
        Ok(self.with_exclusion(ExclusionFilter::new(pattern)?))
    }

    pub fn with_exclusion(mut self, filter: ExclusionFilter) -> Self {
        self.exclude = Some(filter);
        self
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.helpers
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .set_policy(policy);
        self
    }

    pub fn mode(&self) -> Mode {
        self.resolver.mode()
    }

    /// Renders the named view.
    ///
    /// Binary entries are returned verbatim. Text output passes through the
    /// exclusion filter, if one is set.
    pub fn render<T: Serialize + ?Sized>(&self, name: &str, data: &T) -> Result<Vec<u8>> {
        let data = Value::from_serialize(data);
        let helpers = self.snapshot();
        match self.resolver.render(name, &data, &helpers)? {
            Rendered::Binary(bytes) => Ok(bytes),
            Rendered::Text(text) => Ok(self.finish(text).into_bytes()),
        }
    }

    /// Renders `text` as an anonymous view.
    ///
    /// The text may import views from the resolver like any named view.
    pub fn render_string<T: Serialize + ?Sized>(&self, text: &str, data: &T) -> Result<String> {
        let data = Value::from_serialize(data);
        let helpers = self.snapshot();
        let output = self.resolver.render_string(text, &data, &helpers)?;
        Ok(self.finish(output))
    }

    /// Registers `helper` under its type name; see [`Binding::Struct`].
    pub fn register_struct<H: Helper>(&self, helper: &H) -> Result<()> {
        self.register(helper, Binding::Struct)
    }

    /// Registers each method of `helper` by name; see [`Binding::Methods`].
    pub fn register_methods<H: Helper>(&self, helper: &H) -> Result<()> {
        self.register(helper, Binding::Methods)
    }

    /// Registers each method of `helper` by lowercased name; see
    /// [`Binding::Lowercase`].
    pub fn register_methods_lowercase<H: Helper>(&self, helper: &H) -> Result<()> {
        self.register(helper, Binding::Lowercase)
    }

    /// Registers arbitrary name/callable pairs.
    pub fn register_raw<I, S>(&self, funcs: I) -> Result<()>
    where
        I: IntoIterator<Item = (S, HelperMethod)>,
        S: Into<String>,
    {
        self.lock().register_raw(funcs)?;
        Ok(())
    }

    fn register(&self, helper: &dyn Helper, binding: Binding) -> Result<()> {
        self.lock().register(helper, binding)?;
        Ok(())
    }

    /// Returns true if a helper is registered under `name`.
    pub fn has_helper(&self, name: &str) -> bool {
        self.lock().has(name)
    }

    /// Returns true if the resolver can render `name`.
    pub fn has_template(&self, name: &str) -> bool {
        self.resolver.has_template(name)
    }

    /// Returns a renderer with a copy of this renderer's helpers over the
    /// same resolver.
    pub fn copy(&self) -> Self {
        Self {
            resolver: Arc::clone(&self.resolver),
            helpers: Mutex::new(self.snapshot()),
            exclude: self.exclude.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HelperRegistry> {
        self.helpers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> HelperRegistry {
        self.lock().clone()
    }

    fn finish(&self, text: String) -> String {
        match &self.exclude {
            Some(filter) => filter.apply(&text),
            None => text,
        }
    }
}

impl Clone for Renderer {
    fn clone(&self) -> Self {
        self.copy()
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("mode", &self.mode())
            .field("helpers", &self.lock().names())
            .field("exclude", &self.exclude.as_ref().map(ExclusionFilter::pattern))
            .finish()
    }
}
