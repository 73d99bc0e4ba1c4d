//! SQLite-backed document store.
//!
//! # Responsibility
//! - Persist documents of one collection as JSON bodies in `documents`.
//! - Enforce natural-key uniqueness through a collection-scoped unique index.
//!
//! # Invariants
//! - `is_active`/`is_deleted` columns mirror the stored body.
//! - Query results are returned in insertion order.
//! - Soft-deleted rows keep their natural key reserved.
//! - `natural_key` holds the JSON encoding of the key value.

use crate::db::migrations::latest_version;
use crate::model::document::Document;
use crate::model::schema::CollectionSchema;
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::store::{DocumentStore, Filter};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, Row};
use serde_json::Value;

const DOCUMENT_SELECT_SQL: &str = "SELECT id, body, is_active, is_deleted FROM documents";

/// Document store bound to one collection of a migrated connection.
pub struct SqliteDocumentStore<'conn> {
    conn: &'conn Connection,
    schema: CollectionSchema,
}

impl<'conn> SqliteDocumentStore<'conn> {
    /// Creates store from migrated connection.
    pub fn try_new(conn: &'conn Connection, schema: CollectionSchema) -> RepoResult<Self> {
        ensure_connection_ready(conn, "documents")?;
        Ok(Self { conn, schema })
    }

    /// Typed JSON encoding of the natural key, so `1` and `"1"` stay distinct.
    fn natural_key_of(&self, document: &Document) -> RepoResult<String> {
        let key = self.schema.natural_key();
        match document.field(key) {
            Some(Value::Null) | None => Err(RepoError::InvalidData(format!(
                "missing natural key `{key}` in {}",
                self.schema.name()
            ))),
            Some(value) => serde_json::to_string(value).map_err(|err| {
                RepoError::InvalidData(format!("unencodable natural key `{key}`: {err}"))
            }),
        }
    }

    fn map_write_error(&self, err: rusqlite::Error) -> RepoError {
        if is_unique_violation(&err) {
            return RepoError::DuplicateKey(self.schema.natural_key().to_string());
        }
        RepoError::from(err)
    }

    fn where_clause(&self, filter: &Filter) -> RepoResult<(String, Vec<SqlValue>)> {
        let mut sql = String::from(" WHERE collection = ?");
        let mut bind_values = vec![SqlValue::Text(self.schema.name().to_string())];

        if let Some(id) = filter.id {
            sql.push_str(" AND id = ?");
            bind_values.push(SqlValue::Text(id.to_string()));
        }

        if let Some(is_active) = filter.is_active {
            sql.push_str(" AND is_active = ?");
            bind_values.push(SqlValue::Integer(bool_to_int(is_active)));
        }

        if let Some(is_deleted) = filter.is_deleted {
            sql.push_str(" AND is_deleted = ?");
            bind_values.push(SqlValue::Integer(bool_to_int(is_deleted)));
        }

        for (field, value) in &filter.fields {
            let path = SqlValue::Text(format!("$.\"{}\"", field.replace('"', "")));
            match json_to_sql(value)? {
                Some(bound) => {
                    sql.push_str(" AND json_extract(body, ?) = ?");
                    bind_values.push(path);
                    bind_values.push(bound);
                }
                None => {
                    sql.push_str(" AND json_extract(body, ?) IS NULL");
                    bind_values.push(path);
                }
            }
        }

        Ok((sql, bind_values))
    }
}

impl DocumentStore for SqliteDocumentStore<'_> {
    fn schema(&self) -> &CollectionSchema {
        &self.schema
    }

    fn create(&self, document: &Document) -> RepoResult<()> {
        let natural_key = self.natural_key_of(document)?;
        let body = encode_body(document)?;

        self.conn
            .execute(
                "INSERT INTO documents (
                    collection,
                    id,
                    natural_key,
                    is_active,
                    is_deleted,
                    body
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    self.schema.name(),
                    document.id.to_string(),
                    natural_key,
                    bool_to_int(document.is_active),
                    bool_to_int(document.is_deleted),
                    body,
                ],
            )
            .map_err(|err| self.map_write_error(err))?;

        Ok(())
    }

    fn find(
        &self,
        filter: &Filter,
        limit: Option<u32>,
        skip: Option<u64>,
    ) -> RepoResult<Vec<Document>> {
        let (where_sql, mut bind_values) = self.where_clause(filter)?;
        let mut sql = format!("{DOCUMENT_SELECT_SQL}{where_sql} ORDER BY seq ASC");
        let offset = skip.unwrap_or(0);

        if let Some(limit) = limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(SqlValue::Integer(i64::from(limit)));
            if offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(SqlValue::Integer(offset_to_sql(offset)));
            }
        } else if offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(SqlValue::Integer(offset_to_sql(offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut documents = Vec::new();

        while let Some(row) = rows.next()? {
            documents.push(parse_document_row(row)?);
        }

        Ok(documents)
    }

    fn find_one(&self, filter: &Filter) -> RepoResult<Option<Document>> {
        Ok(self.find(filter, Some(1), None)?.into_iter().next())
    }

    fn count(&self, filter: &Filter) -> RepoResult<u64> {
        let (where_sql, bind_values) = self.where_clause(filter)?;
        let sql = format!("SELECT COUNT(*) FROM documents{where_sql};");
        let total: i64 =
            self.conn
                .query_row(&sql, params_from_iter(bind_values), |row| row.get(0))?;
        Ok(u64::try_from(total).unwrap_or(0))
    }

    fn save(&self, document: &Document) -> RepoResult<()> {
        let natural_key = self.natural_key_of(document)?;
        let body = encode_body(document)?;

        let changed = self
            .conn
            .execute(
                "UPDATE documents
                 SET
                    natural_key = ?1,
                    is_active = ?2,
                    is_deleted = ?3,
                    body = ?4,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE collection = ?5 AND id = ?6;",
                params![
                    natural_key,
                    bool_to_int(document.is_active),
                    bool_to_int(document.is_deleted),
                    body,
                    self.schema.name(),
                    document.id.to_string(),
                ],
            )
            .map_err(|err| self.map_write_error(err))?;

        if changed == 0 {
            return Err(RepoError::not_found(self.schema.name(), document.id));
        }

        Ok(())
    }
}

fn encode_body(document: &Document) -> RepoResult<String> {
    serde_json::to_string(document)
        .map_err(|err| RepoError::InvalidData(format!("unencodable document body: {err}")))
}

fn parse_document_row(row: &Row<'_>) -> RepoResult<Document> {
    let id_text: String = row.get("id")?;
    let body: String = row.get("body")?;
    let mut document: Document = serde_json::from_str(&body).map_err(|err| {
        RepoError::InvalidData(format!(
            "invalid body for `{id_text}` in documents.body: {err}"
        ))
    })?;

    if document.id.to_string() != id_text {
        return Err(RepoError::InvalidData(format!(
            "body id `{}` does not match documents.id `{id_text}`",
            document.id
        )));
    }

    document.is_active = parse_flag(row.get("is_active")?, "is_active")?;
    document.is_deleted = parse_flag(row.get("is_deleted")?, "is_deleted")?;
    Ok(document)
}

fn parse_flag(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid {column} value `{other}` in documents.{column}"
        ))),
    }
}

/// Converts a JSON scalar to the SQL value `json_extract` yields for it.
///
/// Returns `None` for `null`, which is matched with `IS NULL`.
fn json_to_sql(value: &Value) -> RepoResult<Option<SqlValue>> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(flag) => Ok(Some(SqlValue::Integer(bool_to_int(*flag)))),
        Value::Number(number) => {
            if let Some(integer) = number.as_i64() {
                Ok(Some(SqlValue::Integer(integer)))
            } else if let Some(real) = number.as_f64() {
                Ok(Some(SqlValue::Real(real)))
            } else {
                Err(RepoError::InvalidData(format!(
                    "unsupported filter number `{number}`"
                )))
            }
        }
        Value::String(text) => Ok(Some(SqlValue::Text(text.clone()))),
        Value::Array(_) | Value::Object(_) => Err(RepoError::InvalidData(
            "filter values must be scalars".to_string(),
        )),
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn offset_to_sql(offset: u64) -> i64 {
    i64::try_from(offset).unwrap_or(i64::MAX)
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

/// Verifies the connection is migrated and `table` exists.
pub(crate) fn ensure_connection_ready(conn: &Connection, table: &'static str) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, table)? {
        return Err(RepoError::MissingRequiredTable(table));
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
