//! One execution of a view against a namespace.

use std::sync::Arc;

use minijinja::{Environment, Value};

use super::control::{HasTemplateFn, ImportFn, HAS_TEMPLATE, IMPORT};
use super::namespace::Namespace;
use crate::classify::{ErrorClassifier, Stage};
use crate::error::ClassifiedError;
use crate::helper::HelperRegistry;

pub(crate) type ExistsFn = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Everything a single execution needs: the namespace version, the
/// caller's data, the helper snapshot and the control helpers' settings.
pub(crate) struct Session<'a> {
    pub namespace: &'a Namespace,
    pub helpers: &'a HelperRegistry,
    pub data: &'a Value,
    pub exists: ExistsFn,
    pub max_depth: usize,
}

impl Session<'_> {
    /// Renders `name` and classifies any failure against this namespace.
    pub fn execute(&self, name: &str) -> Result<String, ClassifiedError> {
        let env = self.environment();
        env.get_template(name)
            .and_then(|template| template.render(self.data))
            .map_err(|err| {
                ErrorClassifier::new()
                    .with_namespace(self.namespace)
                    .classify_engine(&err, Stage::Execute)
            })
    }

    fn environment(&self) -> Environment<'static> {
        let mut env = self.namespace.environment().clone();
        for (name, value) in self.helpers.iter() {
            env.add_global(name.to_string(), value.clone());
        }
        env.add_global(
            IMPORT,
            Value::from_object(ImportFn::new(self.data.clone(), self.max_depth)),
        );
        env.add_global(
            HAS_TEMPLATE,
            Value::from_object(HasTemplateFn::new(Arc::clone(&self.exists))),
        );
        env
    }
}
