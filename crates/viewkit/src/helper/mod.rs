//! Helper functions exposed to views.
//!
//! A helper is any type implementing [`Helper`]: it names itself and lists
//! its callable members as [`HelperMethod`]s. The [`HelperRegistry`] turns a
//! helper into template globals according to a [`Binding`]:
//!
//! | Binding | Registered names | Template usage |
//! |---------|------------------|----------------|
//! | [`Binding::Struct`] | the type name | `{{ Site.Title() }}` or `{{ Site().Title() }}` |
//! | [`Binding::Methods`] | each method name | `{{ Title() }}` |
//! | [`Binding::Lowercase`] | each method name, lowercased | `{{ title() }}` |
//!
//! Arbitrary name/callable pairs can be added with
//! [`HelperRegistry::register_raw`].
//!
//! # Return Contract
//!
//! Every callable must return exactly one value, or a value plus an error
//! (`Result<T, E>`). Anything else is refused at registration time with
//! [`ValidationError::BadReturn`](crate::ValidationError::BadReturn); see
//! [`HelperReturn`].
//!
//! # Example
//!
//! ```rust
//! use viewkit::{Binding, Helper, HelperMethod, HelperRegistry};
//!
//! struct Site {
//!     title: String,
//! }
//!
//! impl Helper for Site {
//!     fn methods(&self) -> Vec<HelperMethod> {
//!         let title = self.title.clone();
//!         vec![HelperMethod::new("Title", move |_: &[minijinja::Value]| title.clone())]
//!     }
//! }
//!
//! let mut registry = HelperRegistry::new();
//! registry.register(&Site { title: "Home".into() }, Binding::Struct).unwrap();
//! assert!(registry.has("Site"));
//! assert!(!registry.has("Title"));
//! ```

mod method;
mod registry;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use minijinja::value::{Object, ObjectRepr};
use minijinja::{Error, ErrorKind, State, Value};

pub use method::{HelperMethod, HelperReturn};
pub use registry::{is_identifier, DuplicatePolicy, HelperRegistry};

/// A value whose methods can be installed as template helpers.
pub trait Helper: Send + Sync + 'static {
    /// The helper's type name, used as the global name under
    /// [`Binding::Struct`].
    ///
    /// Defaults to the unqualified Rust type name.
    fn name(&self) -> &str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// The callable members of this helper.
    fn methods(&self) -> Vec<HelperMethod>;
}

/// How a helper's methods become template names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// One global named after the type; members are reached through it.
    Struct,
    /// One global per method, named exactly as the method.
    Methods,
    /// One global per method, named as the lowercased method.
    Lowercase,
}

fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Template-side value for a helper registered under [`Binding::Struct`].
///
/// Calling it returns itself, so both `Site.Title()` and `Site().Title()`
/// resolve to the same method.
#[derive(Debug, Clone)]
pub(crate) struct HelperObject {
    type_name: String,
    methods: Arc<BTreeMap<String, HelperMethod>>,
}

impl HelperObject {
    pub(crate) fn new(type_name: impl Into<String>, methods: Vec<HelperMethod>) -> Self {
        let methods = methods
            .into_iter()
            .map(|m| (m.name().to_string(), m))
            .collect();
        Self {
            type_name: type_name.into(),
            methods: Arc::new(methods),
        }
    }
}

impl Object for HelperObject {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Plain
    }

    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        let method = self.methods.get(key.as_str()?)?;
        Some(Value::from_object(method.clone()))
    }

    fn call(self: &Arc<Self>, _state: &State<'_, '_>, _args: &[Value]) -> Result<Value, Error> {
        Ok(Value::from_object(HelperObject::clone(self)))
    }

    fn call_method(
        self: &Arc<Self>,
        _state: &State<'_, '_>,
        name: &str,
        args: &[Value],
    ) -> Result<Value, Error> {
        match self.methods.get(name) {
            Some(method) => {
                tracing::trace!(helper = %self.type_name, method = name, "calling helper method");
                method.invoke(args)
            }
            None => Err(Error::new(
                ErrorKind::UnknownMethod,
                format!("{} has no method '{}'", self.type_name, name),
            )),
        }
    }

    fn render(self: &Arc<Self>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<helper {}>", self.type_name)
    }
}
