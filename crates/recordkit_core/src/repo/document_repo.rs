//! Generic audited document repository.
//!
//! # Responsibility
//! - Provide CRUD, toggle and soft-delete over top-level documents and
//!   their embedded sub-documents.
//! - Enforce natural-key and sibling-scoped key uniqueness.
//!
//! # Invariants
//! - Every read is restricted to non-deleted documents.
//! - Every mutation records exactly the supplied audit entry.
//! - Nothing is physically removed; soft delete only flips `isDeleted`.

use crate::model::audit::AuditEntry;
use crate::model::document::{
    find_managed_field, Document, DocumentId, Fields, NewDocument, SubDocument,
};
use crate::model::schema::CollectionSchema;
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::store::{DocumentStore, Filter};
use log::{info, warn};
use serde_json::Value;

/// Repository over one collection of a [`DocumentStore`].
pub struct DocumentRepository<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> DocumentRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Raw store access; bypasses the default scope.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn schema(&self) -> &CollectionSchema {
        self.store.schema()
    }

    /// Creates a document, embedding any initial sub-documents.
    ///
    /// Initial sub-documents share the document's creation entry.
    pub fn insert(&self, data: NewDocument, entry: AuditEntry) -> RepoResult<Document> {
        reject_managed_fields(&data.fields)?;

        let mut document = Document::new(data.fields, entry.clone());
        for (field, items) in data.sub_documents {
            let scoped_key = self.require_scoped_key(&field)?.to_string();
            let siblings = document.sub_documents_mut(&field);
            for item in items {
                reject_managed_fields(&item)?;
                let key = require_key_value(&item, &scoped_key)?;
                if siblings
                    .iter()
                    .any(|sibling| sibling.field(&scoped_key) == Some(key))
                {
                    return Err(self.duplicate(&scoped_key));
                }
                siblings.push(SubDocument::new(item, entry.clone()));
            }
        }

        self.store
            .create(&document)
            .map_err(|err| self.log_failure("doc_insert", err))?;
        self.log_ok("doc_insert", document.id);
        Ok(document)
    }

    /// Appends a sub-document to array `field` of a live parent.
    pub fn insert_sub(
        &self,
        parent_id: DocumentId,
        field: &str,
        data: Fields,
        entry: AuditEntry,
    ) -> RepoResult<Document> {
        let scoped_key = self.require_scoped_key(field)?;
        reject_managed_fields(&data)?;
        let mut parent = self.find_by_id(parent_id)?;

        let key = require_key_value(&data, scoped_key)?;
        if parent
            .sub_documents(field)
            .iter()
            .any(|sibling| sibling.field(scoped_key) == Some(key))
        {
            return Err(self.duplicate(scoped_key));
        }

        parent
            .sub_documents_mut(field)
            .push(SubDocument::new(data, entry));
        self.persist("doc_insert_sub", &parent)?;
        Ok(parent)
    }

    /// Lists non-deleted documents matching `filter`.
    pub fn find_by_filter(
        &self,
        filter: &Filter,
        limit: Option<u32>,
        skip: Option<u64>,
    ) -> RepoResult<Vec<Document>> {
        self.store.find(&filter.with_default_scope(), limit, skip)
    }

    pub fn find_all(&self) -> RepoResult<Vec<Document>> {
        self.find_by_filter(&Filter::new(), None, None)
    }

    /// Loads a non-deleted document; soft-deleted ones are `NotFound`.
    pub fn find_by_id(&self, id: DocumentId) -> RepoResult<Document> {
        self.store
            .find_one(&Filter::by_id(id).with_default_scope())?
            .ok_or_else(|| RepoError::not_found(self.schema().name(), id))
    }

    pub fn count(&self, filter: &Filter) -> RepoResult<u64> {
        self.store.count(&filter.with_default_scope())
    }

    /// Merges `patch` into a document and records `entry`.
    pub fn update(
        &self,
        id: DocumentId,
        patch: &Fields,
        entry: AuditEntry,
    ) -> RepoResult<Document> {
        reject_managed_fields(patch)?;
        let mut document = self.find_by_id(id)?;
        document.apply_patch(patch, entry);
        self.persist("doc_update", &document)?;
        Ok(document)
    }

    /// Merges `patch` into one sub-document and records `entry`.
    pub fn update_sub(
        &self,
        parent_id: DocumentId,
        sub_id: DocumentId,
        field: &str,
        patch: &Fields,
        entry: AuditEntry,
    ) -> RepoResult<Document> {
        let scoped_key = self.require_scoped_key(field)?;
        reject_managed_fields(patch)?;
        let mut parent = self.find_by_id(parent_id)?;

        if patch.contains_key(scoped_key) {
            let key = require_key_value(patch, scoped_key)?;
            if parent
                .sub_documents(field)
                .iter()
                .any(|sibling| sibling.id != sub_id && sibling.field(scoped_key) == Some(key))
            {
                return Err(self.duplicate(scoped_key));
            }
        }

        parent
            .find_sub_document_mut(field, sub_id)
            .ok_or_else(|| RepoError::not_found(field, sub_id))?
            .apply_patch(patch, entry);
        self.persist("doc_update_sub", &parent)?;
        Ok(parent)
    }

    /// Flips `isActive` of a document.
    pub fn toggle_active(&self, id: DocumentId, entry: AuditEntry) -> RepoResult<()> {
        let mut document = self.find_by_id(id)?;
        document.toggle_active(entry);
        self.persist("doc_toggle", &document)
    }

    /// Flips `isActive` of one sub-document.
    pub fn toggle_active_sub(
        &self,
        parent_id: DocumentId,
        sub_id: DocumentId,
        field: &str,
        entry: AuditEntry,
    ) -> RepoResult<Document> {
        self.require_scoped_key(field)?;
        let mut parent = self.find_by_id(parent_id)?;
        parent
            .find_sub_document_mut(field, sub_id)
            .ok_or_else(|| RepoError::not_found(field, sub_id))?
            .toggle_active(entry);
        self.persist("doc_toggle_sub", &parent)?;
        Ok(parent)
    }

    /// Marks a document deleted; it disappears from every default read.
    pub fn soft_delete(&self, id: DocumentId, entry: AuditEntry) -> RepoResult<()> {
        let mut document = self.find_by_id(id)?;
        document.soft_delete(entry);
        self.persist("doc_soft_delete", &document)
    }

    /// Marks one sub-document deleted.
    pub fn soft_delete_sub(
        &self,
        parent_id: DocumentId,
        sub_id: DocumentId,
        field: &str,
        entry: AuditEntry,
    ) -> RepoResult<Document> {
        self.require_scoped_key(field)?;
        let mut parent = self.find_by_id(parent_id)?;
        parent
            .find_sub_document_mut(field, sub_id)
            .ok_or_else(|| RepoError::not_found(field, sub_id))?
            .soft_delete(entry);
        self.persist("doc_soft_delete_sub", &parent)?;
        Ok(parent)
    }

    fn require_scoped_key(&self, field: &str) -> RepoResult<&str> {
        self.schema().scoped_key(field).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "`{field}` is not a sub-collection of {}",
                self.schema().name()
            ))
        })
    }

    fn persist(&self, event: &'static str, document: &Document) -> RepoResult<()> {
        self.store
            .save(document)
            .map_err(|err| self.log_failure(event, err))?;
        self.log_ok(event, document.id);
        Ok(())
    }

    fn duplicate(&self, field: &str) -> RepoError {
        warn!(
            "event=doc_duplicate_key module=repo status=error collection={} field={field}",
            self.schema().name()
        );
        RepoError::DuplicateKey(field.to_string())
    }

    fn log_ok(&self, event: &'static str, id: DocumentId) {
        info!(
            "event={event} module=repo status=ok collection={} id={id}",
            self.schema().name()
        );
    }

    fn log_failure(&self, event: &'static str, err: RepoError) -> RepoError {
        warn!(
            "event={event} module=repo status=error collection={} status_code={} error={err}",
            self.schema().name(),
            err.status_code()
        );
        err
    }
}

fn reject_managed_fields(fields: &Fields) -> RepoResult<()> {
    match find_managed_field(fields) {
        Some(key) => Err(RepoError::InvalidData(format!(
            "`{key}` is managed by the engine"
        ))),
        None => Ok(()),
    }
}

fn require_key_value<'a>(fields: &'a Fields, key: &str) -> RepoResult<&'a Value> {
    match fields.get(key) {
        Some(Value::Null) | None => Err(RepoError::InvalidData(format!(
            "missing scoped key `{key}`"
        ))),
        Some(value) => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::DocumentRepository;
    use crate::db::open_db_in_memory;
    use crate::model::audit::AuditEntry;
    use crate::model::document::{Fields, NewDocument};
    use crate::model::schema::CollectionSchema;
    use crate::repo::error::RepoError;
    use crate::repo::sqlite_store::SqliteDocumentStore;
    use chrono::{FixedOffset, TimeZone};
    use serde_json::json;

    fn entry(description: &str) -> AuditEntry {
        AuditEntry {
            actor_id: "u-1".to_string(),
            actor_name: "Ayu".to_string(),
            timestamp: FixedOffset::east_opt(0)
                .unwrap()
                .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
                .unwrap(),
            description: description.to_string(),
        }
    }

    fn fields(value: serde_json::Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    fn schema() -> CollectionSchema {
        CollectionSchema::new("categories", "name").with_sub_collection("products", "name")
    }

    #[test]
    fn managed_keys_are_rejected_in_data_and_patches() {
        let conn = open_db_in_memory().unwrap();
        let repo = DocumentRepository::new(SqliteDocumentStore::try_new(&conn, schema()).unwrap());

        let data = NewDocument::new(fields(json!({"name": "A", "isActive": false})));
        let err = repo.insert(data, entry("add")).unwrap_err();
        assert!(matches!(err, RepoError::InvalidData(_)));

        let doc = repo
            .insert(NewDocument::new(fields(json!({"name": "A"}))), entry("add"))
            .unwrap();
        let err = repo
            .update(doc.id, &fields(json!({"isDeleted": true})), entry("update"))
            .unwrap_err();
        assert!(matches!(err, RepoError::InvalidData(_)));
    }

    #[test]
    fn initial_sub_documents_are_stamped_and_deduplicated() {
        let conn = open_db_in_memory().unwrap();
        let repo = DocumentRepository::new(SqliteDocumentStore::try_new(&conn, schema()).unwrap());

        let data = NewDocument::new(fields(json!({"name": "Drinks"}))).with_sub_documents(
            "products",
            vec![fields(json!({"name": "Tea"})), fields(json!({"name": "Tea"}))],
        );
        let err = repo.insert(data, entry("add")).unwrap_err();
        assert!(matches!(err, RepoError::DuplicateKey(ref key) if key == "name"));

        let data = NewDocument::new(fields(json!({"name": "Drinks"})))
            .with_sub_documents("products", vec![fields(json!({"name": "Tea"}))]);
        let doc = repo.insert(data, entry("add")).unwrap();
        let product = &doc.sub_documents("products")[0];
        assert_eq!(product.created_by, doc.created_by);
        assert!(product.is_active);
    }

    #[test]
    fn unregistered_sub_collection_is_invalid() {
        let conn = open_db_in_memory().unwrap();
        let repo = DocumentRepository::new(SqliteDocumentStore::try_new(&conn, schema()).unwrap());
        let doc = repo
            .insert(NewDocument::new(fields(json!({"name": "A"}))), entry("add"))
            .unwrap();

        let err = repo
            .insert_sub(doc.id, "variants", fields(json!({"name": "x"})), entry("add"))
            .unwrap_err();
        assert!(matches!(err, RepoError::InvalidData(_)));
    }

    #[test]
    fn update_sub_allows_keeping_own_key_but_not_a_siblings() {
        let conn = open_db_in_memory().unwrap();
        let repo = DocumentRepository::new(SqliteDocumentStore::try_new(&conn, schema()).unwrap());
        let doc = repo
            .insert(NewDocument::new(fields(json!({"name": "A"}))), entry("add"))
            .unwrap();
        let doc = repo
            .insert_sub(doc.id, "products", fields(json!({"name": "Tea"})), entry("add"))
            .unwrap();
        let doc = repo
            .insert_sub(doc.id, "products", fields(json!({"name": "Milk"})), entry("add"))
            .unwrap();
        let tea = doc.sub_documents("products")[0].id;

        let patch = fields(json!({"name": "Tea", "qty": 2}));
        let doc = repo
            .update_sub(doc.id, tea, "products", &patch, entry("u"))
            .unwrap();
        assert_eq!(doc.sub_documents("products")[0].field("qty"), Some(&json!(2)));
        assert_eq!(doc.sub_documents("products")[0].updated_by.len(), 1);

        let patch = fields(json!({"name": "Milk"}));
        let err = repo
            .update_sub(doc.id, tea, "products", &patch, entry("u"))
            .unwrap_err();
        assert!(matches!(err, RepoError::DuplicateKey(_)));
    }

    #[test]
    fn sub_document_operations_report_missing_sub_id() {
        let conn = open_db_in_memory().unwrap();
        let repo = DocumentRepository::new(SqliteDocumentStore::try_new(&conn, schema()).unwrap());
        let doc = repo
            .insert(NewDocument::new(fields(json!({"name": "A"}))), entry("add"))
            .unwrap();
        let missing = uuid::Uuid::new_v4();

        let err = repo
            .toggle_active_sub(doc.id, missing, "products", entry("toggle"))
            .unwrap_err();
        assert!(matches!(
            err,
            RepoError::NotFound { ref kind, id } if kind == "products" && id == missing
        ));

        let patch = fields(json!({"name": "Tea"}));
        let err = repo
            .update_sub(doc.id, missing, "products", &patch, entry("update"))
            .unwrap_err();
        assert!(matches!(
            err,
            RepoError::NotFound { ref kind, id } if kind == "products" && id == missing
        ));

        let err = repo
            .soft_delete_sub(doc.id, missing, "products", entry("remove"))
            .unwrap_err();
        assert!(matches!(err, RepoError::NotFound { .. }));
        assert!(repo.find_by_id(doc.id).unwrap().updated_by.is_empty());
    }
}
