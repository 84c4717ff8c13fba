//! Structural validation capability
//!
//! The engine only depends on the [`Validator`] trait. [`SchemaValidator`] is
//! the default implementation, a full JSON Schema (draft 7) validator with
//! ECMA 262 regular expressions, which is what the quota backend emits.

use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single structural violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Human-readable message
    pub message: String,
    /// JSON path to the offending value
    pub path: String,
}

impl Violation {
    pub fn new(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: path.into(),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Pluggable structural validator
///
/// An empty list means valid.
pub trait Validator: Send + Sync {
    fn validate(&self, value: &Value, schema: &Value) -> Vec<Violation>;
}

/// Path of the validated document itself
pub const ROOT_PATH: &str = "$";

/// Default JSON Schema validator
#[derive(Debug, Clone, Default)]
pub struct SchemaValidator;

impl SchemaValidator {
    pub fn new() -> Self {
        Self
    }
}

impl Validator for SchemaValidator {
    fn validate(&self, value: &Value, schema: &Value) -> Vec<Violation> {
        let compiled = match JSONSchema::compile(schema) {
            Ok(compiled) => compiled,
            Err(e) => {
                tracing::warn!(error = %e, "Validation scheme does not compile");
                return vec![Violation::new(
                    format!("Invalid validation scheme: {}", e),
                    ROOT_PATH,
                )];
            }
        };

        let violations = match compiled.validate(value) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .map(|e| {
                    let path = json_path(value, &e.instance_path.to_string());
                    Violation::new(e.to_string(), path)
                })
                .collect(),
        };
        violations
    }
}

/// Render a JSON pointer (`/quota/0`) as a `$`-rooted path (`$.quota[0]`)
///
/// The instance decides whether a numeric token is an array index or an
/// object key.
fn json_path(instance: &Value, pointer: &str) -> String {
    let mut path = String::from(ROOT_PATH);
    let mut node = Some(instance);

    for token in pointer.split('/').skip(1) {
        let token = token.replace("~1", "/").replace("~0", "~");
        match (node, token.parse::<usize>()) {
            (Some(Value::Array(items)), Ok(index)) => {
                path.push_str(&format!("[{}]", index));
                node = items.get(index);
            }
            _ => {
                path.push('.');
                path.push_str(&token);
                node = node.and_then(|n| n.get(token.as_str()));
            }
        }
    }

    path
}
