//! Name-to-callable map with validation.

use std::collections::{BTreeMap, BTreeSet};

use minijinja::Value;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{Binding, Helper, HelperMethod, HelperObject};
use crate::engine::control::RESERVED;
use crate::error::ValidationError;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9_]*$").expect("identifier pattern is valid"));

/// Returns true if `name` can be used as a helper name.
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// What happens when a registration reuses a taken name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Fail with [`ValidationError::Duplicate`].
    #[default]
    Reject,
    /// The later registration wins.
    Overwrite,
}

/// Helpers known to a renderer.
///
/// Every registration call is all-or-nothing: entries are staged, validated
/// as a batch and only then committed.
#[derive(Debug, Clone, Default)]
pub struct HelperRegistry {
    entries: BTreeMap<String, Value>,
    policy: DuplicatePolicy,
}

impl HelperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: DuplicatePolicy) -> Self {
        Self {
            entries: BTreeMap::new(),
            policy,
        }
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: DuplicatePolicy) {
        self.policy = policy;
    }

    /// Installs `helper` according to `binding`.
    ///
    /// A helper without methods is accepted and registers nothing.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::InvalidHelper`] if the type name is not an
    ///   identifier or two methods share a name
    /// - [`ValidationError::BadReturn`] if a method breaks the return contract
    /// - [`ValidationError::InvalidIdentifier`], [`ValidationError::Reserved`]
    ///   or [`ValidationError::Duplicate`] for unusable names
    pub fn register(&mut self, helper: &dyn Helper, binding: Binding) -> Result<(), ValidationError> {
        let type_name = helper.name().to_string();
        if !is_identifier(&type_name) {
            return Err(ValidationError::InvalidHelper {
                type_name,
                reason: "type name is not an identifier".to_string(),
            });
        }

        let methods = helper.methods();
        if methods.is_empty() {
            tracing::debug!(helper = %type_name, "helper has no methods, nothing registered");
            return Ok(());
        }

        let mut seen = BTreeSet::new();
        for method in &methods {
            if !seen.insert(method.name()) {
                return Err(ValidationError::InvalidHelper {
                    type_name,
                    reason: format!("method '{}' is declared twice", method.name()),
                });
            }
            if !is_identifier(method.name()) {
                return Err(ValidationError::InvalidIdentifier {
                    name: method.name().to_string(),
                });
            }
            method.check_contract(&type_name)?;
        }

        let staged = match binding {
            Binding::Struct => {
                let object = HelperObject::new(type_name.clone(), methods);
                vec![(type_name.clone(), Value::from_object(object))]
            }
            Binding::Methods => methods
                .into_iter()
                .map(|m| (m.name().to_string(), Value::from_object(m)))
                .collect(),
            Binding::Lowercase => methods
                .into_iter()
                .map(|m| {
                    let name = m.name().to_lowercase();
                    (name.clone(), Value::from_object(m.renamed(name)))
                })
                .collect(),
        };

        self.commit(staged)?;
        tracing::debug!(helper = %type_name, ?binding, "registered helper");
        Ok(())
    }

    /// Installs arbitrary name/callable pairs.
    pub fn register_raw<I, S>(&mut self, funcs: I) -> Result<(), ValidationError>
    where
        I: IntoIterator<Item = (S, HelperMethod)>,
        S: Into<String>,
    {
        let mut staged = Vec::new();
        for (name, method) in funcs {
            let name = name.into();
            let method = method.renamed(name.clone());
            method.check_contract("raw")?;
            staged.push((name, Value::from_object(method)));
        }
        self.commit(staged)
    }

    fn commit(&mut self, staged: Vec<(String, Value)>) -> Result<(), ValidationError> {
        let mut pending = BTreeSet::new();
        for (name, _) in &staged {
            if !is_identifier(name) {
                return Err(ValidationError::InvalidIdentifier { name: name.clone() });
            }
            if RESERVED.contains(&name.as_str()) {
                return Err(ValidationError::Reserved { name: name.clone() });
            }
            let taken = self.policy == DuplicatePolicy::Reject && self.entries.contains_key(name);
            if !pending.insert(name.as_str()) || taken {
                return Err(ValidationError::Duplicate { name: name.clone() });
            }
        }
        self.entries.extend(staged);
        Ok(())
    }

    pub fn has(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(name)
    }

    /// Iterates over registered names and their template values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
