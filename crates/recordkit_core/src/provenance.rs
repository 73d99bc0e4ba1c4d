//! Provenance stamping for audited mutations.
//!
//! # Responsibility
//! - Turn an acting principal and an action context into an `AuditEntry`.
//! - Derive a readable description from a versioned API request path.
//!
//! # Invariants
//! - A description is only produced when at least one path segment follows
//!   the `api/v<N>/` prefix.
//! - Stamping never mutates its inputs.

use crate::model::audit::AuditEntry;
use chrono::{DateTime, FixedOffset, Local};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

static API_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)api/v\d+/").expect("valid api prefix regex"));

/// Acting identity performing a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub name: String,
}

impl Principal {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Originating action: a verb-like action plus the request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionContext {
    /// Verb-like action, e.g. `POST` or `toggle`.
    pub action: String,
    /// Request path including the versioned API prefix, e.g.
    /// `/api/v1/category/add?x=1`.
    pub path: String,
}

impl ActionContext {
    pub fn new(action: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            path: path.into(),
        }
    }
}

/// The action path cannot be decomposed into resource segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedContextError {
    pub path: String,
}

impl Display for MalformedContextError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unexpected action path structure: `{}`", self.path)
    }
}

impl Error for MalformedContextError {}

/// Splits a request path into the resource segments after `api/v<N>/`.
///
/// Query strings are ignored and empty segments are dropped.
pub fn split_action_path(path: &str) -> Result<Vec<String>, MalformedContextError> {
    let malformed = || MalformedContextError {
        path: path.to_string(),
    };

    let without_query = path.split(['?', '#']).next().unwrap_or_default();
    let prefix = API_PREFIX_RE.find(without_query).ok_or_else(malformed)?;
    let segments: Vec<String> = without_query[prefix.end()..]
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect();

    if segments.is_empty() {
        return Err(malformed());
    }

    Ok(segments)
}

/// Builds the human-readable description for `action`.
pub fn describe(action: &ActionContext) -> Result<String, MalformedContextError> {
    let segments = split_action_path(&action.path)?;
    Ok(format!("{} {}", action.action.trim(), segments.join(" ")))
}

/// Stamps an audit entry at the current local wall-clock time.
pub fn stamp(
    principal: &Principal,
    action: &ActionContext,
) -> Result<AuditEntry, MalformedContextError> {
    stamp_at(principal, action, Local::now().fixed_offset())
}

/// Stamps an audit entry at an explicit time.
pub fn stamp_at(
    principal: &Principal,
    action: &ActionContext,
    at: DateTime<FixedOffset>,
) -> Result<AuditEntry, MalformedContextError> {
    Ok(AuditEntry {
        actor_id: principal.id.clone(),
        actor_name: principal.name.clone(),
        timestamp: at,
        description: describe(action)?,
    })
}

#[cfg(test)]
mod tests {
    use super::{split_action_path, stamp, stamp_at, ActionContext, Principal};
    use chrono::{FixedOffset, TimeZone};

    #[test]
    fn split_strips_versioned_prefix_and_query() {
        let segments = split_action_path("/api/v1/category/update/42?verbose=true").unwrap();
        assert_eq!(segments, vec!["category", "update", "42"]);

        let segments = split_action_path("https://host/API/V12/category//add/").unwrap();
        assert_eq!(segments, vec!["category", "add"]);
    }

    #[test]
    fn split_rejects_paths_without_segments_after_prefix() {
        assert!(split_action_path("/api/v1/").is_err());
        assert!(split_action_path("/category/add").is_err());
        assert!(split_action_path("").is_err());
    }

    #[test]
    fn stamp_records_principal_and_description() {
        let principal = Principal::new("u-7", "Rina");
        let action = ActionContext::new("PUT", "/api/v1/category/toggle-isactive/9");
        let at = FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2024, 5, 2, 8, 0, 0)
            .unwrap();

        let entry = stamp_at(&principal, &action, at).unwrap();
        assert_eq!(entry.actor_id, "u-7");
        assert_eq!(entry.actor_name, "Rina");
        assert_eq!(entry.timestamp, at);
        assert_eq!(entry.description, "PUT category toggle-isactive 9");
    }

    #[test]
    fn stamp_fails_on_malformed_context() {
        let principal = Principal::new("u-7", "Rina");
        let err = stamp(&principal, &ActionContext::new("POST", "/health")).unwrap_err();
        assert_eq!(err.path, "/health");
    }
}
