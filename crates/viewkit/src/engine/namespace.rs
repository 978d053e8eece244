//! Copy-on-write sets of parsed views.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use minijinja::{AutoEscape, Environment, Error, ErrorKind};

/// A view that failed to parse while building a namespace.
#[derive(Debug)]
pub struct ParseFailure {
    pub name: String,
    pub source: Arc<str>,
    pub error: Error,
}

/// Parsed views known to one render attempt.
///
/// A namespace never changes once built. [`Namespace::add_or_replace`]
/// returns a new version and leaves the original untouched, so an eager
/// resolver can share its namespace across threads and renderer copies
/// while a lazy render grows its own private version.
#[derive(Clone)]
pub struct Namespace {
    env: Arc<Environment<'static>>,
    sources: Arc<BTreeMap<String, Arc<str>>>,
}

impl Namespace {
    /// Creates an empty namespace.
    pub fn new() -> Self {
        Self {
            env: Arc::new(base_environment()),
            sources: Arc::new(BTreeMap::new()),
        }
    }

    /// Parses every source into one namespace.
    ///
    /// Stops at the first view that fails to parse.
    pub fn from_sources<'a, I>(sources: I) -> Result<Self, ParseFailure>
    where
        I: IntoIterator<Item = (&'a str, &'a Arc<str>)>,
    {
        let mut env = base_environment();
        let mut parsed = BTreeMap::new();
        for (name, source) in sources {
            if let Err(error) = env.add_template_owned(name.to_string(), source.to_string()) {
                return Err(ParseFailure {
                    name: name.to_string(),
                    source: Arc::clone(source),
                    error,
                });
            }
            parsed.insert(name.to_string(), Arc::clone(source));
        }
        tracing::debug!(templates = parsed.len(), "built namespace");
        Ok(Self {
            env: Arc::new(env),
            sources: Arc::new(parsed),
        })
    }

    /// Returns a new namespace with `name` parsed from `source`.
    ///
    /// # Errors
    ///
    /// Returns the engine's syntax error; `self` is unchanged either way.
    pub fn add_or_replace(&self, name: &str, source: &str) -> Result<Namespace, Error> {
        let mut env = Environment::clone(&self.env);
        env.add_template_owned(name.to_string(), source.to_string())?;

        let mut sources = BTreeMap::clone(&self.sources);
        sources.insert(name.to_string(), Arc::from(source));
        Ok(Self {
            env: Arc::new(env),
            sources: Arc::new(sources),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    /// Returns the unparsed source of a view.
    pub fn source(&self, name: &str) -> Option<&str> {
        self.sources.get(name).map(|s| &**s)
    }

    pub fn names(&self) -> Vec<&str> {
        self.sources.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub(crate) fn environment(&self) -> &Environment<'static> {
        &self.env
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("templates", &self.names())
            .finish()
    }
}

/// Message used for every lookup of a view outside the namespace.
pub(crate) fn not_defined_message(name: &str) -> String {
    format!("template \"{}\" not defined", name)
}

fn base_environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env.set_keep_trailing_newline(true);
    // Views only enter through the resolver; a miss gets a message the
    // classifier can attribute.
    env.set_loader(|name| Err(Error::new(ErrorKind::TemplateNotFound, not_defined_message(name))));
    env
}
