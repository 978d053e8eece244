//! The `import` and `hastemplate` control helpers.
//!
//! Both are injected into every render session and cannot be shadowed by
//! registered helpers. Their first argument is a view name that may contain
//! printf-style verbs (`%s`, `%v`, `%d`) filled from the remaining
//! arguments:
//!
//! ```text
//! {{ import("parts/%s.html", section) }}
//! {% if hastemplate("theme/%s/header.html", theme) %}...{% endif %}
//! ```

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use minijinja::value::{Object, ObjectRepr};
use minijinja::{Error, ErrorKind, State, Value};

pub const IMPORT: &str = "import";
pub const HAS_TEMPLATE: &str = "hastemplate";

/// Names no helper may be registered under.
pub const RESERVED: [&str; 2] = [IMPORT, HAS_TEMPLATE];

/// Expands the view name in `args[0]` with the remaining arguments.
pub(crate) fn format_name(helper: &str, args: &[Value]) -> Result<String, Error> {
    let format = args.first().and_then(Value::as_str).ok_or_else(|| {
        Error::new(
            ErrorKind::MissingArgument,
            format!("{} requires a template name", helper),
        )
    })?;

    let mut rest = args[1..].iter();
    let mut out = String::with_capacity(format.len());
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some(verb @ ('s' | 'v' | 'd')) => match rest.next() {
                Some(value) => out.push_str(&value.to_string()),
                None => out.push_str(&format!("%!{}(MISSING)", verb)),
            },
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }
    Ok(out)
}

/// Tracks nested imports for one session.
struct DepthGuard<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> DepthGuard<'a> {
    fn enter(counter: &'a AtomicUsize, max_depth: usize) -> Result<Self, Error> {
        let depth = counter.fetch_add(1, Ordering::SeqCst) + 1;
        if depth > max_depth {
            counter.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::new(
                ErrorKind::InvalidOperation,
                format!("exceeded maximum template depth ({})", max_depth),
            ));
        }
        Ok(Self { counter })
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Renders another view with the session's data.
#[derive(Debug)]
pub(crate) struct ImportFn {
    data: Value,
    depth: Arc<AtomicUsize>,
    max_depth: usize,
}

impl ImportFn {
    pub(crate) fn new(data: Value, max_depth: usize) -> Self {
        Self {
            data,
            depth: Arc::new(AtomicUsize::new(0)),
            max_depth,
        }
    }
}

impl Object for ImportFn {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Plain
    }

    fn call(self: &Arc<Self>, state: &State<'_, '_>, args: &[Value]) -> Result<Value, Error> {
        let name = format_name(IMPORT, args)?;
        let _guard = DepthGuard::enter(&self.depth, self.max_depth)?;
        tracing::trace!(name = %name, "import");

        let template = state.env().get_template(&name).map_err(|err| {
            if err.kind() == ErrorKind::TemplateNotFound {
                Error::new(
                    ErrorKind::TemplateNotFound,
                    format!(
                        "error calling {}: no template \"{}\" associated with the namespace",
                        IMPORT, name
                    ),
                )
            } else {
                err
            }
        })?;
        let rendered = template.render(&self.data)?;
        Ok(Value::from(rendered))
    }
}

type ExistsFn = dyn Fn(&str) -> bool + Send + Sync;

/// Reports whether a view exists without rendering it.
pub(crate) struct HasTemplateFn {
    exists: Arc<ExistsFn>,
}

impl HasTemplateFn {
    pub(crate) fn new(exists: Arc<ExistsFn>) -> Self {
        Self { exists }
    }
}

impl fmt::Debug for HasTemplateFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HasTemplateFn")
    }
}

impl Object for HasTemplateFn {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Plain
    }

    fn call(self: &Arc<Self>, _state: &State<'_, '_>, args: &[Value]) -> Result<Value, Error> {
        let name = format_name(HAS_TEMPLATE, args)?;
        let found = (self.exists)(&name);
        tracing::trace!(name = %name, found, "hastemplate");
        Ok(Value::from(found))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<Value> {
        values.iter().map(|v| Value::from(*v)).collect()
    }

    #[test]
    fn test_format_name_plain() {
        assert_eq!(format_name(IMPORT, &args(&["a/b.html"])).unwrap(), "a/b.html");
    }

    #[test]
    fn test_format_name_substitutes_verbs() {
        let mut values = args(&["%s/%v-%d.html", "theme", "dark"]);
        values.push(Value::from(3));
        assert_eq!(format_name(IMPORT, &values).unwrap(), "theme/dark-3.html");
    }

    #[test]
    fn test_format_name_escapes_and_missing() {
        assert_eq!(
            format_name(IMPORT, &args(&["100%%-%s"])).unwrap(),
            "100%-%!s(MISSING)"
        );
        assert_eq!(format_name(IMPORT, &args(&["%q%"])).unwrap(), "%q%");
    }

    #[test]
    fn test_format_name_requires_string() {
        let err = format_name(IMPORT, &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingArgument);
        let err = format_name(IMPORT, &[Value::from(1)]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingArgument);
    }

    #[test]
    fn test_depth_guard_releases() {
        let counter = AtomicUsize::new(0);
        {
            let _one = DepthGuard::enter(&counter, 2).unwrap();
            let _two = DepthGuard::enter(&counter, 2).unwrap();
            assert!(DepthGuard::enter(&counter, 2).is_err());
            assert_eq!(counter.load(Ordering::SeqCst), 2);
        }
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
