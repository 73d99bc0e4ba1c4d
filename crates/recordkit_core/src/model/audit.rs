//! Provenance record attached to documents on every mutation.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Immutable record of who performed an action, when, and what it was.
///
/// Entries are only produced by `provenance::stamp`; fields are public for
/// reading and mapping, and nothing in the engine mutates an entry after it
/// has been attached to a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// Identifier of the acting principal.
    pub actor_id: String,
    /// Display name of the acting principal at the time of the action.
    pub actor_name: String,
    /// Local wall-clock time, offset preserved.
    pub timestamp: DateTime<FixedOffset>,
    /// Human-readable action summary, e.g. `POST category add`.
    pub description: String,
}
