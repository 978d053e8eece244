use std::collections::BTreeMap;
use std::sync::Arc;

use minijinja::Value;

use super::namespace::{Namespace, ParseFailure};
use super::session::{ExistsFn, Session};
use super::{Limits, Mode, Rendered, Resolver, RAW_TEMPLATE_NAME};
use crate::classify::{ErrorClassifier, Stage};
use crate::error::{ClassifiedError, ErrorKind, RenderError, Result};
use crate::fileset::FileSet;
use crate::helper::HelperRegistry;

/// Resolves views from a namespace parsed once at construction.
///
/// The namespace is immutable and shared through an `Arc`, so cloning the
/// resolver or rendering from many threads costs nothing extra.
#[derive(Debug, Clone)]
pub struct EagerResolver {
    namespace: Namespace,
    binaries: Arc<BTreeMap<String, Arc<[u8]>>>,
    limits: Limits,
}

impl EagerResolver {
    /// Parses every text entry of `files`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Parse`] for the first entry that fails to parse.
    pub fn new(files: &FileSet) -> Result<Self> {
        let namespace = Namespace::from_sources(files.texts()).map_err(parse_failure)?;
        let binaries = files
            .binaries()
            .map(|(name, bytes)| (name.to_string(), Arc::clone(bytes)))
            .collect();

        Ok(Self {
            namespace,
            binaries: Arc::new(binaries),
            limits: Limits::default(),
        })
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    fn execute(
        &self,
        namespace: &Namespace,
        name: &str,
        data: &Value,
        helpers: &HelperRegistry,
    ) -> Result<String> {
        let lookup = self.namespace.clone();
        let exists: ExistsFn = Arc::new(move |name: &str| lookup.contains(name));
        let session = Session {
            namespace,
            helpers,
            data,
            exists,
            max_depth: self.limits.max_depth,
        };
        session.execute(name).map_err(RenderError::from)
    }
}

fn parse_failure(failure: ParseFailure) -> RenderError {
    ErrorClassifier::new()
        .with_fallback(&failure.source)
        .classify_engine(&failure.error, Stage::Parse)
        .with_kind(ErrorKind::Parse)
        .into()
}

impl Resolver for EagerResolver {
    fn render(&self, name: &str, data: &Value, helpers: &HelperRegistry) -> Result<Rendered> {
        if let Some(bytes) = self.binaries.get(name) {
            return Ok(Rendered::Binary(bytes.to_vec()));
        }
        if !self.namespace.contains(name) {
            return Err(ClassifiedError::not_defined(name).into());
        }
        self.execute(&self.namespace, name, data, helpers)
            .map(Rendered::Text)
    }

    fn render_string(&self, text: &str, data: &Value, helpers: &HelperRegistry) -> Result<String> {
        let namespace = self
            .namespace
            .add_or_replace(RAW_TEMPLATE_NAME, text)
            .map_err(|err| {
                RenderError::from(
                    ErrorClassifier::new()
                        .with_fallback(text)
                        .classify_engine(&err, Stage::Parse)
                        .with_kind(ErrorKind::Parse),
                )
            })?;
        self.execute(&namespace, RAW_TEMPLATE_NAME, data, helpers)
    }

    fn has_template(&self, name: &str) -> bool {
        self.namespace.contains(name) || self.binaries.contains_key(name)
    }

    fn mode(&self) -> Mode {
        Mode::Eager
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fileset::{Entry, SizeLimits};

    fn resolver(entries: Vec<Entry>) -> Result<EagerResolver> {
        let files = FileSet::from_entries(entries, &SizeLimits::default())?;
        EagerResolver::new(&files)
    }

    fn data() -> Value {
        Value::from_serialize(serde_json::json!({ "name": "world" }))
    }

    #[test]
    fn test_renders_with_import() {
        let r = resolver(vec![
            Entry::text("a.html", "A[{{ import(\"b.html\") }}]"),
            Entry::text("b.html", "hello {{ name }}"),
        ])
        .unwrap();

        let out = r.render("a.html", &data(), &HelperRegistry::new()).unwrap();
        assert_eq!(out, Rendered::Text("A[hello world]".into()));
    }

    #[test]
    fn test_unknown_name_is_not_defined() {
        let r = resolver(vec![Entry::text("a.html", "A")]).unwrap();
        let err = r.render("zzz.html", &data(), &HelperRegistry::new()).unwrap_err();
        assert!(matches!(err, RenderError::NotDefined(_)));
        assert_eq!(
            err.classified().and_then(|c| c.unresolved_target.as_deref()),
            Some("zzz.html")
        );
    }

    #[test]
    fn test_missing_import_is_not_defined() {
        let r = resolver(vec![Entry::text("a.html", "{{ import(\"b.html\") }}")]).unwrap();
        let err = r.render("a.html", &data(), &HelperRegistry::new()).unwrap_err();
        let classified = err.classified().unwrap();
        assert_eq!(classified.kind, ErrorKind::NotDefined);
        assert_eq!(classified.unresolved_target.as_deref(), Some("b.html"));
        assert_eq!(classified.basename.as_deref(), Some("a.html"));
    }

    #[test]
    fn test_parse_failure_aborts_construction() {
        let err = resolver(vec![
            Entry::text("good.html", "fine"),
            Entry::text("broken.html", "{% if %}"),
        ])
        .unwrap_err();
        let classified = err.classified().unwrap();
        assert_eq!(classified.kind, ErrorKind::Parse);
        assert_eq!(classified.root_content.as_deref(), Some("{% if %}"));
    }

    #[test]
    fn test_binary_passthrough() {
        let r = resolver(vec![Entry::binary("images/name.png", b"<ping file>".to_vec())]).unwrap();
        let out = r
            .render("images/name.png", &data(), &HelperRegistry::new())
            .unwrap();
        assert_eq!(out.into_bytes(), b"<ping file>");
    }

    #[test]
    fn test_hastemplate_consults_namespace() {
        let r = resolver(vec![
            Entry::text(
                "a.html",
                "{% if hastemplate(\"b.html\") %}b{% endif %}/{% if not hastemplate(\"c.html\") %}no c{% endif %}",
            ),
            Entry::text("b.html", "B"),
        ])
        .unwrap();
        let out = r.render("a.html", &data(), &HelperRegistry::new()).unwrap();
        assert_eq!(out, Rendered::Text("b/no c".into()));
    }

    #[test]
    fn test_render_string_sees_namespace() {
        let r = resolver(vec![Entry::text("b.html", "B:{{ name }}")]).unwrap();
        let out = r
            .render_string("<{{ import(\"b.html\") }}>", &data(), &HelperRegistry::new())
            .unwrap();
        assert_eq!(out, "<B:world>");
        assert!(!r.namespace().contains(RAW_TEMPLATE_NAME));
    }

    #[test]
    fn test_depth_ceiling_is_recursion() {
        let r = resolver(vec![
            Entry::text("a.html", "{{ import(\"b.html\") }}"),
            Entry::text("b.html", "{{ import(\"a.html\") }}"),
        ])
        .unwrap()
        .with_limits(Limits {
            max_depth: 8,
            max_resolutions: 16,
        });
        let err = r.render("a.html", &data(), &HelperRegistry::new()).unwrap_err();
        assert!(matches!(err, RenderError::Recursion(_)), "{err:?}");
    }
}
