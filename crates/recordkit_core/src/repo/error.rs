//! Repository error taxonomy.

use crate::db::DbError;
use crate::model::document::DocumentId;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors from document and token repository operations.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Referenced record is absent or soft-deleted.
    NotFound { kind: String, id: DocumentId },
    /// Natural or scoped key collides with an existing record.
    DuplicateKey(String),
    /// Input or persisted data cannot be turned into a valid record.
    InvalidData(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
}

impl RepoError {
    pub fn not_found(kind: impl Into<String>, id: DocumentId) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id,
        }
    }

    /// Client-class failures map to 400; storage failures to 500.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } | Self::DuplicateKey(_) | Self::InvalidData(_) => 400,
            Self::Db(_)
            | Self::UninitializedConnection { .. }
            | Self::MissingRequiredTable(_) => 500,
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::DuplicateKey(field) => write!(f, "{field} must be unique"),
            Self::InvalidData(message) => write!(f, "invalid document data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
