//! Error types for view resolution and rendering.
//!
//! This module provides [`RenderError`], the error type for every rendering
//! operation. Template failures carry a [`ClassifiedError`] produced by the
//! [`classify`](crate::classify) module, so callers get the offending file,
//! line, column and source text without parsing engine messages themselves.
//!
//! # Taxonomy
//!
//! | Variant | Raised when | Retried in lazy mode |
//! |---------|-------------|----------------------|
//! | [`RenderError::Validation`] | helper registration is rejected | never |
//! | [`RenderError::Parse`] | a view has malformed syntax | never |
//! | [`RenderError::Execution`] | rendering fails at runtime | once per missing reference |
//! | [`RenderError::NotDefined`] | a referenced view does not exist | never |
//! | [`RenderError::Resource`] | I/O, permission or size ceilings | never |
//! | [`RenderError::Recursion`] | the depth or attempt ceiling is hit | never |
//! | [`RenderError::Config`] | configuration is unusable | never |

use std::fmt;

use thiserror::Error;

/// Classification of a template failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed template syntax.
    Parse,
    /// Runtime failure while rendering (e.g. a helper returned an error).
    Execution,
    /// A referenced view has no corresponding entry.
    NotDefined,
    /// The depth ceiling was reached.
    Recursion,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Parse => "parse",
            ErrorKind::Execution => "execution",
            ErrorKind::NotDefined => "not defined",
            ErrorKind::Recursion => "recursion",
        };
        f.write_str(label)
    }
}

/// A template failure decomposed into addressable parts.
///
/// Every field except `kind` and `message` is optional because engine
/// messages do not always carry a position. `unresolved_target` is only set
/// when the failure names a specific missing view, which is what drives the
/// lazy resolver's retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedError {
    /// What went wrong.
    pub kind: ErrorKind,
    /// Message prefix, normalized to this crate's tag (`render`).
    pub tag: Option<String>,
    /// The message with prefix and position removed.
    pub message: String,
    /// Name of the view the failure occurred in.
    pub basename: Option<String>,
    /// 1-based line number.
    pub line: Option<usize>,
    /// 1-based column number.
    pub column: Option<usize>,
    /// Full source of the offending view, when recoverable.
    pub root_content: Option<String>,
    /// Name of the missing view this failure refers to.
    pub unresolved_target: Option<String>,
}

impl ClassifiedError {
    /// Creates an error that carries nothing but a message.
    pub fn message_only(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            tag: None,
            message: message.into(),
            basename: None,
            line: None,
            column: None,
            root_content: None,
            unresolved_target: None,
        }
    }

    /// Creates the error reported for a view name with no entry.
    pub fn not_defined(name: &str) -> Self {
        Self {
            tag: Some(crate::classify::SYSTEM_TAG.to_string()),
            unresolved_target: Some(name.to_string()),
            ..Self::message_only(ErrorKind::NotDefined, format!("template \"{}\" not defined", name))
        }
    }

    /// Returns the missing view name if this failure may be resolved by
    /// loading it.
    pub fn retry_target(&self) -> Option<&str> {
        match self.kind {
            ErrorKind::Recursion => None,
            _ => self.unresolved_target.as_deref(),
        }
    }

    /// Returns the same error with a different kind.
    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.basename, self.line) {
            // ex) app/index.html:11: unknown function: callfunc is unknown
            (Some(basename), Some(line)) => write!(f, "{}:{}: {}", basename, line, self.message),
            _ => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ClassifiedError {}

/// Error returned when a helper cannot be registered.
///
/// A failed registration commits nothing; the renderer stays usable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The helper value itself is unusable (bad type name, repeated method).
    #[error("{type_name}: helper argument is invalid: {reason}")]
    InvalidHelper { type_name: String, reason: String },

    /// The registration key is not an identifier.
    #[error("function name {name} is not a valid identifier")]
    InvalidIdentifier { name: String },

    /// The registration key is one of the control helpers.
    #[error("'{name}' function already exists")]
    Reserved { name: String },

    /// The registration key is already taken and duplicates are rejected.
    #[error("'{name}' - duplicate function")]
    Duplicate { name: String },

    /// A method does not return one value or a value plus an error.
    #[error("{owner}: can't install method/function \"{method}\" with {count} results")]
    BadReturn {
        owner: String,
        method: String,
        count: usize,
    },
}

/// I/O and size failures from view loading.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// A single entry is larger than the per-entry ceiling.
    #[error("{path}: {limit} < {actual}. maxsize over")]
    EntryTooLarge { path: String, limit: u64, actual: u64 },

    /// The entries together are larger than the aggregate ceiling.
    #[error("{root}: {limit} < {actual}. sum maxsize over")]
    TotalTooLarge { root: String, limit: u64, actual: u64 },

    /// Reading from disk failed (missing, permission, ...).
    #[error("cannot read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Error type for rendering operations.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Helper registration was rejected.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Template syntax error.
    #[error("parse error: {0}")]
    Parse(ClassifiedError),

    /// Runtime failure while rendering.
    #[error("execution error: {0}")]
    Execution(ClassifiedError),

    /// A referenced view does not exist.
    #[error("{0}")]
    NotDefined(ClassifiedError),

    /// I/O, permission or size failure.
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// Depth or attempt ceiling reached.
    #[error("recursion error: {0}")]
    Recursion(ClassifiedError),

    /// Unusable configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl RenderError {
    /// Returns the classified template failure, if this is one.
    pub fn classified(&self) -> Option<&ClassifiedError> {
        match self {
            RenderError::Parse(err)
            | RenderError::Execution(err)
            | RenderError::NotDefined(err)
            | RenderError::Recursion(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the template failure kind, if this is one.
    pub fn kind(&self) -> Option<ErrorKind> {
        self.classified().map(|err| err.kind)
    }
}

impl From<ClassifiedError> for RenderError {
    fn from(err: ClassifiedError) -> Self {
        match err.kind {
            ErrorKind::Parse => RenderError::Parse(err),
            ErrorKind::Execution => RenderError::Execution(err),
            ErrorKind::NotDefined => RenderError::NotDefined(err),
            ErrorKind::Recursion => RenderError::Recursion(err),
        }
    }
}

/// Result type for rendering operations.
pub type Result<T> = std::result::Result<T, RenderError>;
