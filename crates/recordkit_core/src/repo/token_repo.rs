//! Persisted session tokens.
//!
//! # Invariants
//! - A token row belongs to exactly one user and one [`TokenKind`].
//! - Blacklisted rows are never returned by `find_active`.

use crate::repo::error::{RepoError, RepoResult};
use crate::repo::sqlite_store::{bool_to_int, ensure_connection_ready};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Purpose of an issued token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TokenKind {
    Access,
    Refresh,
    ResetPassword,
    VerifyEmail,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
            Self::ResetPassword => "reset_password",
            Self::VerifyEmail => "verify_email",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "access" => Some(Self::Access),
            "refresh" => Some(Self::Refresh),
            "reset_password" => Some(Self::ResetPassword),
            "verify_email" => Some(Self::VerifyEmail),
            _ => None,
        }
    }
}

/// Stored token row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub id: Uuid,
    pub token: String,
    pub user_id: String,
    pub kind: TokenKind,
    /// Expiry as unix seconds.
    pub expires_at: i64,
    pub blacklisted: bool,
}

impl TokenRecord {
    pub fn new(
        token: impl Into<String>,
        user_id: impl Into<String>,
        kind: TokenKind,
        expires_at: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            token: token.into(),
            user_id: user_id.into(),
            kind,
            expires_at,
            blacklisted: false,
        }
    }
}

/// Token persistence contract.
pub trait TokenRepository {
    fn insert(&self, record: &TokenRecord) -> RepoResult<()>;
    /// Finds a non-blacklisted token of `kind` owned by `user_id`.
    fn find_active(
        &self,
        token: &str,
        kind: TokenKind,
        user_id: &str,
    ) -> RepoResult<Option<TokenRecord>>;
    /// Removes one refresh token; returns whether a row was removed.
    fn remove_by_refresh_token(&self, token: &str) -> RepoResult<bool>;
    /// Removes every token of `kind` for `user_id`; returns removed count.
    fn remove_many_by_user_and_kind(&self, user_id: &str, kind: TokenKind) -> RepoResult<usize>;
    /// Blacklists one token; returns `false` when absent or already blacklisted.
    fn blacklist(&self, id: Uuid) -> RepoResult<bool>;
}

/// SQLite-backed token repository.
pub struct SqliteTokenRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTokenRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, "tokens")?;
        Ok(Self { conn })
    }
}

impl TokenRepository for SqliteTokenRepository<'_> {
    fn insert(&self, record: &TokenRecord) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO tokens (
                id,
                token,
                user_id,
                kind,
                expires_at,
                blacklisted
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                record.id.to_string(),
                record.token.as_str(),
                record.user_id.as_str(),
                record.kind.as_str(),
                record.expires_at,
                bool_to_int(record.blacklisted),
            ],
        )?;
        Ok(())
    }

    fn find_active(
        &self,
        token: &str,
        kind: TokenKind,
        user_id: &str,
    ) -> RepoResult<Option<TokenRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, token, user_id, kind, expires_at, blacklisted
                 FROM tokens
                 WHERE token = ?1
                   AND kind = ?2
                   AND user_id = ?3
                   AND blacklisted = 0
                 LIMIT 1;",
                params![token, kind.as_str(), user_id],
                RawTokenRow::from_row,
            )
            .optional()?;

        row.map(RawTokenRow::into_record).transpose()
    }

    fn remove_by_refresh_token(&self, token: &str) -> RepoResult<bool> {
        let removed = self.conn.execute(
            "DELETE FROM tokens WHERE token = ?1 AND kind = 'refresh';",
            [token],
        )?;
        Ok(removed > 0)
    }

    fn remove_many_by_user_and_kind(&self, user_id: &str, kind: TokenKind) -> RepoResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM tokens WHERE user_id = ?1 AND kind = ?2;",
            params![user_id, kind.as_str()],
        )?;
        Ok(removed)
    }

    fn blacklist(&self, id: Uuid) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE tokens SET blacklisted = 1 WHERE id = ?1 AND blacklisted = 0;",
            [id.to_string()],
        )?;
        Ok(changed > 0)
    }
}

struct RawTokenRow {
    id: String,
    token: String,
    user_id: String,
    kind: String,
    expires_at: i64,
    blacklisted: i64,
}

impl RawTokenRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            token: row.get("token")?,
            user_id: row.get("user_id")?,
            kind: row.get("kind")?,
            expires_at: row.get("expires_at")?,
            blacklisted: row.get("blacklisted")?,
        })
    }

    fn into_record(self) -> RepoResult<TokenRecord> {
        let id = Uuid::parse_str(&self.id).map_err(|_| {
            RepoError::InvalidData(format!("invalid uuid value `{}` in tokens.id", self.id))
        })?;
        let kind = TokenKind::parse(&self.kind).ok_or_else(|| {
            RepoError::InvalidData(format!("invalid token kind `{}` in tokens.kind", self.kind))
        })?;

        Ok(TokenRecord {
            id,
            token: self.token,
            user_id: self.user_id,
            kind,
            expires_at: self.expires_at,
            blacklisted: self.blacklisted != 0,
        })
    }
}
