//! Declarative validation rules.
//!
//! Each rule is a tagged variant; parameterized rules carry their parameter
//! inside the variant, so one rule value can be shared across threads and
//! evaluated concurrently without any per-call mutation.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(0?[1-9]|1[012])/(0?[1-9]|[12][0-9]|3[01])/[0-9]{4}$").expect("valid date regex")
});
static REGIONAL_PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(0|\+62)[0-9]{9,13}$").expect("valid regional phone regex"));
static UNIVERSAL_PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\+?[0-9]{1,3}[-.\s]?\(?[0-9]{1,4}\)?[-.\s]?[0-9]{1,4}[-.\s]?[0-9]{1,9})$")
        .expect("valid universal phone regex")
});
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
    )
    .expect("valid email regex")
});
// `regex` has no lookahead, so password strength is split into three checks.
// Digit classes are ASCII-only; `\d` would also accept other scripts.
static PASSWORD_UPPER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Z]").expect("valid uppercase regex"));
static PASSWORD_DIGIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9]").expect("valid digit regex"));
static PASSWORD_LENGTH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^.{8,}$").expect("valid length regex"));

/// Phone number pattern variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhoneRegion {
    /// Indonesian numbers: `0` or `+62` followed by 9 to 13 digits.
    Regional,
    /// Loose international format with optional separators.
    Universal,
}

/// One validation rule: a pure predicate plus its error message.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    String,
    Number,
    Boolean,
    /// JSON values are never callable, so this rule rejects every value.
    Function,
    /// Objects and arrays, never null.
    Object,
    /// Present and not null.
    Required,
    NumberGreaterThan(f64),
    NumberLessThan(f64),
    MatchesExpectedValue(Value),
    /// Storage-key format (UUID).
    Identifier,
    /// Non-empty array.
    Array,
    Email,
    DatePattern,
    PhonePattern(PhoneRegion),
    PasswordPattern,
}

impl Rule {
    /// Stable caller-facing key of this rule.
    pub fn key(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Function => "function",
            Self::Object => "object",
            Self::Required => "required",
            Self::NumberGreaterThan(_) => "numberGreaterThan",
            Self::NumberLessThan(_) => "numberLessThan",
            Self::MatchesExpectedValue(_) => "matchesExpectedValue",
            Self::Identifier => "identifier",
            Self::Array => "array",
            Self::Email => "email",
            Self::DatePattern => "datePattern",
            Self::PhonePattern(_) => "phonePattern",
            Self::PasswordPattern => "passwordPattern",
        }
    }

    /// Resolves a rule from its caller-facing key and optional parameter.
    ///
    /// Comparison rules need a numeric parameter, `matchesExpectedValue`
    /// needs any value, and `phonePattern` accepts `"regional"` or
    /// `"universal"` (default).
    pub fn from_key(key: &str, param: Option<&Value>) -> Result<Self, RuleKeyError> {
        let number_param = || {
            param
                .and_then(Value::as_f64)
                .ok_or_else(|| RuleKeyError::MissingParameter(key.to_string()))
        };

        let rule = match key {
            "string" => Self::String,
            "number" => Self::Number,
            "boolean" => Self::Boolean,
            "function" => Self::Function,
            "object" => Self::Object,
            "required" => Self::Required,
            "numberGreaterThan" => Self::NumberGreaterThan(number_param()?),
            "numberLessThan" => Self::NumberLessThan(number_param()?),
            "matchesExpectedValue" => Self::MatchesExpectedValue(
                param
                    .cloned()
                    .ok_or_else(|| RuleKeyError::MissingParameter(key.to_string()))?,
            ),
            "identifier" => Self::Identifier,
            "array" => Self::Array,
            "email" => Self::Email,
            "datePattern" => Self::DatePattern,
            "phonePattern" => match param.and_then(Value::as_str) {
                None | Some("universal") => Self::PhonePattern(PhoneRegion::Universal),
                Some("regional") => Self::PhonePattern(PhoneRegion::Regional),
                Some(other) => {
                    return Err(RuleKeyError::InvalidParameter {
                        key: key.to_string(),
                        value: other.to_string(),
                    })
                }
            },
            "passwordPattern" => Self::PasswordPattern,
            other => return Err(RuleKeyError::UnknownKey(other.to_string())),
        };

        Ok(rule)
    }

    /// Evaluates the predicate against one value.
    pub fn check(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Function => false,
            Self::Object => value.is_object() || value.is_array(),
            Self::Required => !value.is_null(),
            Self::NumberGreaterThan(threshold) => {
                value.as_f64().is_some_and(|number| number > *threshold)
            }
            Self::NumberLessThan(threshold) => {
                value.as_f64().is_some_and(|number| number < *threshold)
            }
            Self::MatchesExpectedValue(expected) => values_match(value, expected),
            Self::Identifier => value
                .as_str()
                .is_some_and(|text| Uuid::parse_str(text).is_ok()),
            Self::Array => value.as_array().is_some_and(|items| !items.is_empty()),
            Self::Email => matches_pattern(value, &EMAIL_RE),
            Self::DatePattern => matches_pattern(value, &DATE_RE),
            Self::PhonePattern(PhoneRegion::Regional) => {
                matches_pattern(value, &REGIONAL_PHONE_RE)
            }
            Self::PhonePattern(PhoneRegion::Universal) => {
                matches_pattern(value, &UNIVERSAL_PHONE_RE)
            }
            Self::PasswordPattern => value.as_str().is_some_and(is_strong_password),
        }
    }

    /// Error message rendered from this rule's own parameters.
    pub fn error_message(&self) -> String {
        match self {
            Self::String => "Invalid data type. Expected a string.".to_string(),
            Self::Number => "Invalid data type. Expected a number.".to_string(),
            Self::Boolean => "Invalid data type. Expected a boolean.".to_string(),
            Self::Function => "Invalid data type. Expected a function.".to_string(),
            Self::Object => "Invalid data type. Expected an object.".to_string(),
            Self::Required => "This field is required.".to_string(),
            Self::NumberGreaterThan(threshold) => {
                format!("Value must be greater than the {threshold}.")
            }
            Self::NumberLessThan(threshold) => format!("Value must be less than the {threshold}."),
            Self::MatchesExpectedValue(expected) => {
                format!("Value does not match the {}.", display_value(expected))
            }
            Self::Identifier => "Invalid identifier format.".to_string(),
            Self::Array => "Invalid data type. Expected a non-empty array.".to_string(),
            Self::Email => "Invalid email format.".to_string(),
            Self::DatePattern => "Invalid date format. Expected MM/DD/YYYY.".to_string(),
            Self::PhonePattern(PhoneRegion::Regional) => {
                "Invalid Indonesian phone number.".to_string()
            }
            Self::PhonePattern(PhoneRegion::Universal) => {
                "Invalid universal phone number.".to_string()
            }
            Self::PasswordPattern => "Invalid password format. Must contain at least one uppercase letter and one digit.".to_string(),
        }
    }
}

/// Rule lookup errors for caller-facing string keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleKeyError {
    UnknownKey(String),
    MissingParameter(String),
    InvalidParameter { key: String, value: String },
}

impl Display for RuleKeyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownKey(key) => write!(f, "unknown validation rule `{key}`"),
            Self::MissingParameter(key) => {
                write!(f, "validation rule `{key}` requires a parameter")
            }
            Self::InvalidParameter { key, value } => {
                write!(f, "invalid parameter `{value}` for validation rule `{key}`")
            }
        }
    }
}

impl Error for RuleKeyError {}

fn matches_pattern(value: &Value, pattern: &Regex) -> bool {
    value.as_str().is_some_and(|text| pattern.is_match(text))
}

/// Strict equality where numbers compare by value, so `1` matches `1.0`.
fn values_match(value: &Value, expected: &Value) -> bool {
    match (value, expected) {
        (Value::Number(left), Value::Number(right)) => match (left.as_f64(), right.as_f64()) {
            (Some(left), Some(right)) => left == right,
            _ => left == right,
        },
        _ => value == expected,
    }
}

fn is_strong_password(text: &str) -> bool {
    PASSWORD_LENGTH_RE.is_match(text)
        && PASSWORD_UPPER_RE.is_match(text)
        && PASSWORD_DIGIT_RE.is_match(text)
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
