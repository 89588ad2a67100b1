//! Named validation rules and named functions
//!
//! Table configuration refers to rules, custom row/table functions and chart
//! preprocessors by name. Names are bound here at startup and checked when
//! registered, so a typo surfaces before a user triggers the action.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use email_address::EmailAddress;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::Error;
use crate::model::Column;
use crate::model::RowObject;
use crate::model::is_truthy;

/// A validation check returning the message to show on failure.
pub type RuleFn = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// A rule bound to the name it was registered under.
#[derive(Clone)]
pub struct NamedRule {
    pub name: String,
    check: RuleFn,
}

impl NamedRule {
    /// Binds `check` to `name`.
    pub fn new(name: impl Into<String>, check: RuleFn) -> Self {
        Self {
            name: name.into(),
            check,
        }
    }

    /// Runs the rule, returning the failure message if `value` is rejected.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        (self.check)(value)
    }
}

impl std::fmt::Debug for NamedRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedRule").field("name", &self.name).finish()
    }
}

/// Process-wide validation rules.
///
/// `required` and `email` are always present.
pub struct RuleRegistry {
    rules: DashMap<String, NamedRule>,
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleRegistry {
    pub fn new() -> Self {
        let registry = Self { rules: DashMap::new() };
        registry.insert(NamedRule::new(
            "required",
            Arc::new(|value: &Value| {
                if is_truthy(value) {
                    Ok(())
                } else {
                    Err("Value is required".to_string())
                }
            }),
        ));
        registry.insert(NamedRule::new(
            "email",
            Arc::new(|value: &Value| match value {
                Value::String(s) if EmailAddress::is_valid(s) => Ok(()),
                _ => Err("Please enter a valid email address".to_string()),
            }),
        ));
        registry
    }

    fn insert(&self, rule: NamedRule) {
        self.rules.insert(rule.name.clone(), rule);
    }

    /// Registers a rule under a new, non-empty name.
    pub fn register<F>(&self, name: &str, check: F) -> Result<(), Error>
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        validate_name(name, self.rules.contains_key(name))?;
        self.insert(NamedRule::new(name, Arc::new(check)));
        Ok(())
    }

    /// Looks a rule up by name.
    pub fn get(&self, name: &str) -> Option<NamedRule> {
        self.rules.get(name).map(|r| r.clone())
    }

    /// Resolves rule names, skipping unknown ones.
    pub fn resolve(&self, names: &[String]) -> Vec<NamedRule> {
        names
            .iter()
            .filter_map(|name| {
                let rule = self.get(name);
                if rule.is_none() {
                    log::warn!("unknown validation rule '{}'", name);
                }
                rule
            })
            .collect()
    }
}

/// Arguments handed to a custom function.
#[derive(Debug, Clone)]
pub struct FunctionArgs {
    /// The substituted action descriptor.
    pub action: RowObject,
    /// Rows acted upon, in named-property form.
    pub rows: Vec<RowObject>,
    pub columns: Vec<Column>,
}

pub type CustomFunction = Arc<dyn Fn(FunctionArgs) -> BoxFuture<'static, Result<(), Error>> + Send + Sync>;

/// Transforms chart data before it is published.
pub type Preprocessor = Arc<dyn Fn(Vec<RowObject>) -> Vec<RowObject> + Send + Sync>;

/// Named custom functions and chart preprocessors.
#[derive(Default)]
pub struct FunctionRegistry {
    functions: DashMap<String, CustomFunction>,
    preprocessors: DashMap<String, Preprocessor>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an async custom function.
    ///
    /// # Example
    ///
    /// ```ignore
    /// registry.register_function("archive", |args| async move {
    ///     log::info!("archiving {} rows", args.rows.len());
    ///     Ok(())
    /// })?;
    /// ```
    pub fn register_function<F, Fut>(&self, name: &str, f: F) -> Result<(), Error>
    where
        F: Fn(FunctionArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        validate_name(name, self.functions.contains_key(name))?;
        let f: CustomFunction = Arc::new(move |args| f(args).boxed());
        self.functions.insert(name.to_string(), f);
        Ok(())
    }

    /// Registers a chart preprocessor. Names follow the same rules as functions.
    pub fn register_preprocessor<F>(&self, name: &str, f: F) -> Result<(), Error>
    where
        F: Fn(Vec<RowObject>) -> Vec<RowObject> + Send + Sync + 'static,
    {
        validate_name(name, self.preprocessors.contains_key(name))?;
        self.preprocessors.insert(name.to_string(), Arc::new(f));
        Ok(())
    }

    /// Looks up a custom function, failing with `Error::UnknownFunction`.
    pub fn function(&self, name: &str) -> Result<CustomFunction, Error> {
        self.functions
            .get(name)
            .map(|f| f.clone())
            .ok_or_else(|| Error::UnknownFunction(name.to_string()))
    }

    /// Looks up a chart preprocessor, failing with `Error::UnknownFunction`.
    pub fn preprocessor(&self, name: &str) -> Result<Preprocessor, Error> {
        self.preprocessors
            .get(name)
            .map(|f| f.clone())
            .ok_or_else(|| Error::UnknownFunction(name.to_string()))
    }

    /// Whether a custom function is registered under `name`.
    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Whether a chart preprocessor is registered under `name`.
    pub fn has_preprocessor(&self, name: &str) -> bool {
        self.preprocessors.contains_key(name)
    }
}

fn validate_name(name: &str, taken: bool) -> Result<(), Error> {
    if name.trim().is_empty() {
        return Err(Error::Registry("name must not be empty".to_string()));
    }
    if taken {
        return Err(Error::Registry(format!("'{}' is already registered", name)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_builtin_rules() {
        let rules = RuleRegistry::new();
        let required = rules.get("required").unwrap();
        assert!(required.check(&json!("x")).is_ok());
        assert_eq!(required.check(&json!("")), Err("Value is required".to_string()));

        let email = rules.get("email").unwrap();
        assert!(email.check(&json!("ana@example.com")).is_ok());
        assert!(email.check(&json!("not an email")).is_err());
    }

    #[test]
    fn test_register_rejects_duplicates_and_empty_names() {
        let rules = RuleRegistry::new();
        assert!(rules.register("required", |_| Ok(())).is_err());
        assert!(rules.register(" ", |_| Ok(())).is_err());
        assert!(rules.register("positive", |_| Ok(())).is_ok());
        assert_eq!(rules.resolve(&["positive".to_string(), "missing".to_string()]).len(), 1);
    }

    #[test]
    fn test_unknown_function() {
        let functions = FunctionRegistry::new();
        assert!(matches!(functions.function("nope"), Err(Error::UnknownFunction(name)) if name == "nope"));
        functions.register_function("noop", |_| async { Ok(()) }).unwrap();
        assert!(functions.has_function("noop"));
        assert!(functions.register_function("noop", |_| async { Ok(()) }).is_err());
    }
}
