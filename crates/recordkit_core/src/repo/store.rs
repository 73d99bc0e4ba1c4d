//! Abstract document storage contract.
//!
//! A store persists whole documents of one collection and answers
//! equality-filtered queries. It applies no implicit scope: soft-deleted
//! documents are visible unless the filter excludes them.

use crate::model::document::{Document, DocumentId};
use crate::model::schema::CollectionSchema;
use crate::repo::error::RepoResult;
use serde_json::Value;

/// Equality filter over document metadata and top-level fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub id: Option<DocumentId>,
    pub is_active: Option<bool>,
    pub is_deleted: Option<bool>,
    /// `(field, value)` pairs; `null` matches absent or null fields.
    pub fields: Vec<(String, Value)>,
}

impl Filter {
    /// Matches every document.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_id(id: DocumentId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn active(mut self, is_active: bool) -> Self {
        self.is_active = Some(is_active);
        self
    }

    pub fn deleted(mut self, is_deleted: bool) -> Self {
        self.is_deleted = Some(is_deleted);
        self
    }

    pub fn eq(mut self, field: impl Into<String>, value: Value) -> Self {
        self.fields.push((field.into(), value));
        self
    }

    /// Returns this filter restricted to non-deleted documents.
    ///
    /// This is the standing predicate behind every default read.
    pub fn with_default_scope(&self) -> Self {
        self.clone().deleted(false)
    }
}

/// Storage engine contract consumed by the document repository.
pub trait DocumentStore {
    /// Uniqueness configuration of the stored collection.
    fn schema(&self) -> &CollectionSchema;
    /// Persists a new document; fails `DuplicateKey` on natural-key clash.
    fn create(&self, document: &Document) -> RepoResult<()>;
    /// Lists matching documents in insertion order.
    fn find(
        &self,
        filter: &Filter,
        limit: Option<u32>,
        skip: Option<u64>,
    ) -> RepoResult<Vec<Document>>;
    /// Loads the first matching document.
    fn find_one(&self, filter: &Filter) -> RepoResult<Option<Document>>;
    /// Counts matching documents.
    fn count(&self, filter: &Filter) -> RepoResult<u64>;
    /// Replaces a stored document by id; fails `DuplicateKey` on clash.
    fn save(&self, document: &Document) -> RepoResult<()>;
}

impl<S: DocumentStore + ?Sized> DocumentStore for &S {
    fn schema(&self) -> &CollectionSchema {
        (**self).schema()
    }

    fn create(&self, document: &Document) -> RepoResult<()> {
        (**self).create(document)
    }

    fn find(
        &self,
        filter: &Filter,
        limit: Option<u32>,
        skip: Option<u64>,
    ) -> RepoResult<Vec<Document>> {
        (**self).find(filter, limit, skip)
    }

    fn find_one(&self, filter: &Filter) -> RepoResult<Option<Document>> {
        (**self).find_one(filter)
    }

    fn count(&self, filter: &Filter) -> RepoResult<u64> {
        (**self).count(filter)
    }

    fn save(&self, document: &Document) -> RepoResult<()> {
        (**self).save(document)
    }
}
