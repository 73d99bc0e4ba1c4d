//! Composable field validation.
//!
//! # Responsibility
//! - Evaluate one [`Rule`] against every property of an input object.
//! - Report the first failing property as a client-class error.
//!
//! # Invariants
//! - Validation never mutates rules or inputs; concurrent callers may share
//!   rule values freely.
//! - Properties are checked in insertion order.
//!
//! Multi-field validation is built by chaining calls over overlapping
//! property subsets, e.g. `required` → `string` → `email`.

pub mod inputs;
pub mod rule;

use crate::model::document::DocumentId;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use inputs::{
    CategoryInput, EmailInput, LoginInput, PasswordChangeInput, ProductInput,
    ResetPasswordInput, TokenInput,
};
pub use rule::{PhoneRegion, Rule, RuleKeyError};

/// Status code reported for rule failures.
pub const VALIDATION_STATUS_CODE: u16 = 400;

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Client input failed a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub property: String,
    pub message: String,
}

impl ValidationError {
    pub fn status_code(&self) -> u16 {
        VALIDATION_STATUS_CODE
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.property, self.message)
    }
}

impl Error for ValidationError {}

/// Checks `rule` against every property of `object`.
///
/// Fails on the first property whose value does not satisfy the rule.
pub fn validate_properties(object: &Map<String, Value>, rule: &Rule) -> ValidationResult<()> {
    for (property, value) in object {
        if !rule.check(value) {
            return Err(ValidationError {
                property: property.clone(),
                message: rule.error_message(),
            });
        }
    }
    Ok(())
}

/// Copies `keys` out of `source` in the given order.
///
/// Absent keys (or a non-object source) yield `null`, so `required` can
/// reject them.
pub fn pick(source: &Value, keys: &[&str]) -> Map<String, Value> {
    keys.iter()
        .map(|key| {
            let value = source.get(*key).cloned().unwrap_or(Value::Null);
            ((*key).to_string(), value)
        })
        .collect()
}

/// Validated document identifier taken from a path parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdInput(pub DocumentId);

impl IdInput {
    /// Validates `raw` as a storage identifier under property name `id`.
    pub fn validate(raw: &str) -> ValidationResult<Self> {
        let value = Value::String(raw.to_string());
        let mut object = Map::new();
        object.insert("id".to_string(), value);
        validate_properties(&object, &Rule::Identifier)?;

        // Identifier rule guarantees the parse succeeds.
        DocumentId::parse_str(raw)
            .map(Self)
            .map_err(|_| ValidationError {
                property: "id".to_string(),
                message: Rule::Identifier.error_message(),
            })
    }

    pub fn id(&self) -> DocumentId {
        self.0
    }
}
