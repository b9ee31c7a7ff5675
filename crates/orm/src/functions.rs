//! Value functions
//!
//! Default values and calculations are either JSON literals or calls such
//! as `now()` resolved through the function registry.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::adapter::Row;
use crate::context::UserIdentity;
use crate::error::{ModelError, ModelResult};

static CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_]*)\(\s*\)\s*$").expect("function call pattern")
});

/// Inputs available to a value function
#[derive(Debug, Clone, Copy)]
pub struct FunctionContext<'a> {
    pub model: &'a str,
    pub target: &'a Row,
    pub user: Option<&'a UserIdentity>,
}

/// A named value function
pub type ValueFunction = Arc<dyn Fn(&FunctionContext<'_>) -> ModelResult<Value> + Send + Sync>;

/// Wrap a closure as a [`ValueFunction`]
pub fn value_function<F>(function: F) -> ValueFunction
where
    F: Fn(&FunctionContext<'_>) -> ModelResult<Value> + Send + Sync + 'static,
{
    Arc::new(function)
}

/// Registry of value functions by name
#[derive(Clone)]
pub struct FunctionRegistry {
    functions: HashMap<String, ValueFunction>,
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("FunctionRegistry").field("functions", &names).finish()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn user_name(context: &FunctionContext<'_>) -> ModelResult<Value> {
    Ok(context
        .user
        .map(|u| Value::String(u.name.clone()))
        .unwrap_or(Value::Null))
}

impl FunctionRegistry {
    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// Registry with `now`, `today`, `newGuid`, `user`, `me` and `username`
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(
            "now",
            value_function(|_| Ok(Value::String(Utc::now().to_rfc3339()))),
        );
        registry.register(
            "today",
            value_function(|_| Ok(Value::String(Utc::now().date_naive().to_string()))),
        );
        registry.register(
            "newGuid",
            value_function(|_| Ok(Value::String(uuid::Uuid::new_v4().to_string()))),
        );
        registry.register("user", value_function(user_name));
        registry.register("me", value_function(user_name));
        registry.register("username", value_function(user_name));
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, function: ValueFunction) {
        self.functions.insert(name.into(), function);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Evaluate a default or calculation expression. Strings of the form
    /// `name()` call the named function; everything else is a literal.
    pub fn evaluate(&self, expression: &Value, context: &FunctionContext<'_>) -> ModelResult<Value> {
        let Value::String(text) = expression else {
            return Ok(expression.clone());
        };
        let Some(captures) = CALL.captures(text) else {
            return Ok(expression.clone());
        };
        let name = &captures[1];
        match self.functions.get(name) {
            Some(function) => function(context),
            None => Err(ModelError::Configuration(format!(
                "Unknown value function '{}' in model '{}'",
                name, context.model
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn evaluate(registry: &FunctionRegistry, expression: Value, user: Option<&UserIdentity>) -> ModelResult<Value> {
        let target = Row::new();
        registry.evaluate(
            &expression,
            &FunctionContext {
                model: "Product",
                target: &target,
                user,
            },
        )
    }

    #[test]
    fn test_literals_pass_through() {
        let registry = FunctionRegistry::with_defaults();
        assert_eq!(evaluate(&registry, json!(5), None).unwrap(), json!(5));
        assert_eq!(evaluate(&registry, json!("draft"), None).unwrap(), json!("draft"));
    }

    #[test]
    fn test_builtin_functions() {
        let registry = FunctionRegistry::with_defaults();
        let guid = evaluate(&registry, json!("newGuid()"), None).unwrap();
        assert!(uuid::Uuid::parse_str(guid.as_str().unwrap()).is_ok());

        let today = evaluate(&registry, json!("today()"), None).unwrap();
        assert_eq!(today.as_str().unwrap().len(), 10);

        let user = UserIdentity::new("alice");
        assert_eq!(evaluate(&registry, json!("me()"), Some(&user)).unwrap(), json!("alice"));
        assert_eq!(evaluate(&registry, json!("user()"), None).unwrap(), Value::Null);
    }

    #[test]
    fn test_unknown_function() {
        let registry = FunctionRegistry::with_defaults();
        let result = evaluate(&registry, json!("tomorrow()"), None);
        assert!(matches!(result, Err(ModelError::Configuration(_))));
    }

    #[test]
    fn test_custom_function_sees_target() {
        let mut registry = FunctionRegistry::empty();
        registry.register("fieldCount", value_function(|ctx| Ok(json!(ctx.target.len()))));
        let target = json!({ "a": 1, "b": 2 });
        let value = registry
            .evaluate(
                &json!("fieldCount()"),
                &FunctionContext {
                    model: "Product",
                    target: target.as_object().unwrap(),
                    user: None,
                },
            )
            .unwrap();
        assert_eq!(value, json!(2));
    }
}
