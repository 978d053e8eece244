//! View resolution.
//!
//! A [`Resolver`] turns a view name plus data into output. Two strategies are
//! provided:
//!
//! - [`EagerResolver`] parses every text entry of a [`FileSet`](crate::FileSet)
//!   once, up front, and shares the result across all renders.
//! - [`LazyResolver`] parses only the requested view. When execution fails
//!   because a referenced view is missing, it loads that one view from its
//!   [`TemplateStore`](crate::TemplateStore), extends the namespace and runs
//!   the render again from the top.
//!
//! # Lazy Resolution
//!
//! ```text
//! read(name) -> parse -> execute ─┬─> output
//!                                 └─> missing "X" ─> read(X) -> parse -> execute ...
//! ```
//!
//! Each missing name is attempted at most once per top-level render (the
//! ledger), and the number of attempts is also capped by
//! [`Limits::max_resolutions`]. Imports are nested at most
//! [`Limits::max_depth`] deep; beyond that the render fails with
//! [`RenderError::Recursion`](crate::RenderError::Recursion).

pub(crate) mod control;
mod eager;
mod lazy;
mod namespace;
mod session;

pub use control::{HAS_TEMPLATE, IMPORT, RESERVED};
pub use eager::EagerResolver;
pub use lazy::LazyResolver;
pub use namespace::{Namespace, ParseFailure};

use minijinja::Value;

use crate::error::Result;
use crate::helper::HelperRegistry;

/// Name under which `render_string` input is parsed.
pub const RAW_TEMPLATE_NAME: &str = "<string>";

/// Default nesting ceiling for `import`.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Default ceiling on lazy resolution attempts per render.
pub const DEFAULT_MAX_RESOLUTIONS: usize = 256;

/// Output of a successful render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    Text(String),
    /// A binary entry, returned verbatim.
    Binary(Vec<u8>),
}

impl Rendered {
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Rendered::Text(text) => text.into_bytes(),
            Rendered::Binary(bytes) => bytes,
        }
    }
}

/// Resolution strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Eager,
    Lazy,
}

/// Ceilings applied to every render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Deepest allowed `import` nesting.
    pub max_depth: usize,
    /// Most missing views a lazy render may load.
    pub max_resolutions: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_resolutions: DEFAULT_MAX_RESOLUTIONS,
        }
    }
}

/// Resolves and executes views.
///
/// Implementations must be safe to call from many threads at once; all
/// per-render state lives on the stack of the call.
pub trait Resolver: Send + Sync {
    /// Renders the named view.
    fn render(&self, name: &str, data: &Value, helpers: &HelperRegistry) -> Result<Rendered>;

    /// Parses `text` as an anonymous view and renders it.
    fn render_string(&self, text: &str, data: &Value, helpers: &HelperRegistry) -> Result<String>;

    /// Returns true if `name` can be rendered.
    fn has_template(&self, name: &str) -> bool;

    fn mode(&self) -> Mode;
}
