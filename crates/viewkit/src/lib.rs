//! # viewkit - View Rendering with Lazy Resolution
//!
//! `viewkit` renders trees of named views (text or markup files) with
//! caller-supplied data and registered helper functions. Views reference each
//! other through the `import` and `hastemplate` control helpers; binary files
//! are passed through untouched.
//!
//! ## Core Concepts
//!
//! - [`FileSet`]: immutable snapshot of named text and binary entries
//! - [`TemplateStore`]: on-demand source of views, e.g. [`DirectoryStore`]
//! - [`Renderer`]: the facade; renders views, owns helpers, makes copies
//! - [`Helper`] / [`HelperMethod`]: typed helper functions with three
//!   binding conventions (see [`Binding`])
//! - [`ClassifiedError`]: engine failures with file, line, column and source
//! - [`RenderConfig`]: YAML-friendly construction
//!
//! ## Modes
//!
//! - **Eager** ([`Renderer::eager`]): every view is parsed once, up front.
//!   Parse errors surface at construction.
//! - **Lazy** ([`Renderer::lazy`]): the requested view is read and parsed per
//!   render. When it references a view that has not been loaded yet, that view
//!   is read and the render is retried, once per missing name.
//!
//! Both modes produce identical bytes for the same views and data.
//!
//! ## Quick Start
//!
//! ```rust
//! use viewkit::{Entry, FileSet, Helper, HelperMethod, Renderer, SizeLimits};
//!
//! struct Site;
//!
//! impl Helper for Site {
//!     fn methods(&self) -> Vec<HelperMethod> {
//!         vec![HelperMethod::new("Title", |_: &[minijinja::Value]| "My Site")]
//!     }
//! }
//!
//! let files = FileSet::from_entries(
//!     vec![
//!         Entry::text("index.html", "{{ Site.Title() }}: {{ import(\"body.html\") }}"),
//!         Entry::text("body.html", "hello {{ name }}"),
//!     ],
//!     &SizeLimits::default(),
//! )
//! .unwrap();
//!
//! let renderer = Renderer::lazy(files);
//! renderer.register_struct(&Site).unwrap();
//!
//! let out = renderer
//!     .render("index.html", &serde_json::json!({ "name": "world" }))
//!     .unwrap();
//! assert_eq!(out, b"My Site: hello world");
//! ```
//!
//! ## Errors
//!
//! Template failures are returned as [`RenderError`] variants carrying a
//! [`ClassifiedError`]:
//!
//! ```rust
//! use viewkit::{Entry, ErrorKind, FileSet, Renderer, SizeLimits};
//!
//! let files = FileSet::from_entries(
//!     vec![Entry::text("a.html", "line one\n{{ import(\"missing.html\") }}")],
//!     &SizeLimits::default(),
//! )
//! .unwrap();
//!
//! let err = Renderer::lazy(files).render("a.html", &()).unwrap_err();
//! let classified = err.classified().unwrap();
//! assert_eq!(classified.kind, ErrorKind::NotDefined);
//! assert_eq!(classified.basename.as_deref(), Some("a.html"));
//! assert_eq!(classified.line, Some(2));
//! assert_eq!(classified.unresolved_target.as_deref(), Some("missing.html"));
//! ```
//!
//! ## Logging
//!
//! The crate emits `tracing` events (`debug` for namespace construction,
//! reads and retries; `trace` for helper calls). It never installs a
//! subscriber.

pub mod classify;
pub mod config;
pub mod engine;
mod error;
pub mod exclude;
pub mod fileset;
pub mod helper;
mod renderer;
pub mod store;

pub use error::{
    ClassifiedError, ErrorKind, RenderError, ResourceError, Result, ValidationError,
};

pub use classify::{ErrorClassifier, Stage};
pub use config::RenderConfig;
pub use engine::{
    EagerResolver, LazyResolver, Limits, Mode, Namespace, Rendered, Resolver, RAW_TEMPLATE_NAME,
};
pub use exclude::ExclusionFilter;
pub use fileset::{Entry, FileSet, LoadOptions, SizeLimits};
pub use helper::{Binding, DuplicatePolicy, Helper, HelperMethod, HelperRegistry, HelperReturn};
pub use renderer::Renderer;
pub use store::{DirectoryStore, StoreError, StoredFile, TemplateStore};

// Helpers receive and return engine values.
pub use minijinja::Value;
