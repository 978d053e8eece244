use std::collections::HashSet;
use std::sync::Arc;

use minijinja::Value;

use super::namespace::Namespace;
use super::session::{ExistsFn, Session};
use super::{Limits, Mode, Rendered, Resolver, RAW_TEMPLATE_NAME};
use crate::classify::{ErrorClassifier, Stage};
use crate::error::{ClassifiedError, ErrorKind, RenderError, ResourceError, Result};
use crate::helper::HelperRegistry;
use crate::store::{StoreError, TemplateStore};

/// Resolves views on demand from a [`TemplateStore`].
///
/// Nothing is cached between renders: every top-level render starts from a
/// namespace holding only the requested view and grows it as missing
/// references are discovered.
#[derive(Clone)]
pub struct LazyResolver {
    store: Arc<dyn TemplateStore>,
    limits: Limits,
}

impl LazyResolver {
    pub fn new(store: impl TemplateStore + 'static) -> Self {
        Self::from_arc(Arc::new(store))
    }

    pub fn from_arc(store: Arc<dyn TemplateStore>) -> Self {
        Self {
            store,
            limits: Limits::default(),
        }
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Runs `entry` until it succeeds or fails for a reason loading another
    /// view cannot fix.
    fn resolve(
        &self,
        mut namespace: Namespace,
        entry: &str,
        data: &Value,
        helpers: &HelperRegistry,
    ) -> Result<String> {
        let mut ledger: HashSet<String> = HashSet::new();
        loop {
            let result = {
                let session = Session {
                    namespace: &namespace,
                    helpers,
                    data,
                    exists: self.exists_fn(),
                    max_depth: self.limits.max_depth,
                };
                session.execute(entry)
            };
            let err = match result {
                Ok(output) => return Ok(output),
                Err(err) => err,
            };

            let target = match err.retry_target() {
                Some(target) => target.to_string(),
                None => return Err(err.into()),
            };
            if !ledger.insert(target.clone()) {
                tracing::debug!(entry, missing = %target, "missing template already attempted");
                return Err(err.into());
            }
            if ledger.len() > self.limits.max_resolutions {
                return Err(RenderError::Recursion(ClassifiedError::message_only(
                    ErrorKind::Recursion,
                    format!(
                        "exceeded maximum resolution attempts ({})",
                        self.limits.max_resolutions
                    ),
                )));
            }

            tracing::debug!(
                entry,
                missing = %target,
                attempt = ledger.len(),
                "resolving missing template"
            );
            namespace = self.load(&namespace, &target, err)?;
        }
    }

    /// Reads and parses `target` into a new namespace version.
    fn load(&self, namespace: &Namespace, target: &str, original: ClassifiedError) -> Result<Namespace> {
        let file = match self.store.read(target) {
            Ok(file) => file,
            Err(err) if err.is_not_found() => {
                return Err(original.with_kind(ErrorKind::NotDefined).into());
            }
            Err(err) => {
                tracing::debug!(missing = target, error = %err, "cannot read missing template");
                return Err(original.with_kind(ErrorKind::Execution).into());
            }
        };
        if file.is_binary {
            return Err(original.with_kind(ErrorKind::NotDefined).into());
        }

        let source = file.text();
        namespace.add_or_replace(target, &source).map_err(|err| {
            ErrorClassifier::new()
                .with_namespace(namespace)
                .with_fallback(&source)
                .classify_engine(&err, Stage::Parse)
                .with_kind(ErrorKind::Parse)
                .into()
        })
    }

    fn exists_fn(&self) -> ExistsFn {
        let store = Arc::clone(&self.store);
        Arc::new(move |name: &str| store.exists(name))
    }
}

fn read_error(name: &str, err: StoreError) -> RenderError {
    match err {
        StoreError::NotFound { .. } | StoreError::Rejected { .. } => {
            ClassifiedError::not_defined(name).into()
        }
        StoreError::TooLarge { name, limit, actual } => ResourceError::EntryTooLarge {
            path: name,
            limit,
            actual,
        }
        .into(),
        StoreError::Io { name, source } => ResourceError::Io { path: name, source }.into(),
    }
}

fn parse_error(err: &minijinja::Error, source: &str) -> RenderError {
    ErrorClassifier::new()
        .with_fallback(source)
        .classify_engine(err, Stage::Parse)
        .with_kind(ErrorKind::Parse)
        .into()
}

impl Resolver for LazyResolver {
    fn render(&self, name: &str, data: &Value, helpers: &HelperRegistry) -> Result<Rendered> {
        let file = self.store.read(name).map_err(|err| read_error(name, err))?;
        if file.is_binary {
            return Ok(Rendered::Binary(file.content));
        }

        let source = file.text();
        let namespace = Namespace::new()
            .add_or_replace(name, &source)
            .map_err(|err| parse_error(&err, &source))?;
        self.resolve(namespace, name, data, helpers).map(Rendered::Text)
    }

    fn render_string(&self, text: &str, data: &Value, helpers: &HelperRegistry) -> Result<String> {
        let namespace = Namespace::new()
            .add_or_replace(RAW_TEMPLATE_NAME, text)
            .map_err(|err| parse_error(&err, text))?;
        self.resolve(namespace, RAW_TEMPLATE_NAME, data, helpers)
    }

    fn has_template(&self, name: &str) -> bool {
        self.store.exists(name)
    }

    fn mode(&self) -> Mode {
        Mode::Lazy
    }
}
