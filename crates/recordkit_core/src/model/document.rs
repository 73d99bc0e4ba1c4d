//! Document and sub-document records.
//!
//! # Responsibility
//! - Define the persisted shape of top-level documents and embedded items.
//! - Provide lifecycle helpers (toggle, soft delete, audited merge).
//!
//! # Invariants
//! - `id` is stable and never reused for another record.
//! - `updated_by` is append-only; history is never overwritten.
//! - `is_deleted` is the source of truth for tombstone state.
//! - Engine-managed keys never appear inside `fields`.

use crate::model::audit::AuditEntry;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Stable identifier shared by documents and sub-documents.
pub type DocumentId = Uuid;

/// Free-form field payload of a record.
pub type Fields = Map<String, Value>;

/// Keys owned by the engine; rejected in insert data and patches.
pub const MANAGED_FIELDS: &[&str] = &[
    "id",
    "isActive",
    "isDeleted",
    "createdBy",
    "updatedBy",
    "deletedBy",
    "subDocuments",
];

/// Returns the first engine-managed key present in `fields`, if any.
pub fn find_managed_field(fields: &Fields) -> Option<&str> {
    fields
        .keys()
        .map(String::as_str)
        .find(|key| MANAGED_FIELDS.contains(key))
}

/// Record embedded in a named array field of a [`Document`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubDocument {
    pub id: DocumentId,
    #[serde(flatten)]
    pub fields: Fields,
    pub is_active: bool,
    pub is_deleted: bool,
    pub created_by: Option<AuditEntry>,
    #[serde(default)]
    pub updated_by: Vec<AuditEntry>,
    pub deleted_by: Option<AuditEntry>,
}

impl SubDocument {
    /// Creates an active, non-deleted sub-document with a fresh id.
    pub fn new(fields: Fields, created_by: AuditEntry) -> Self {
        Self {
            id: Uuid::new_v4(),
            fields,
            is_active: true,
            is_deleted: false,
            created_by: Some(created_by),
            updated_by: Vec::new(),
            deleted_by: None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Appends `entry` to the update history and merges `patch`.
    pub fn apply_patch(&mut self, patch: &Fields, entry: AuditEntry) {
        self.updated_by.push(entry);
        merge_fields(&mut self.fields, patch);
    }

    pub fn toggle_active(&mut self, entry: AuditEntry) {
        self.updated_by.push(entry);
        self.is_active = !self.is_active;
    }

    pub fn soft_delete(&mut self, entry: AuditEntry) {
        self.is_deleted = true;
        self.deleted_by = Some(entry);
    }
}

/// Top-level persisted record managed by the document repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: DocumentId,
    #[serde(flatten)]
    pub fields: Fields,
    pub is_active: bool,
    pub is_deleted: bool,
    pub created_by: Option<AuditEntry>,
    #[serde(default)]
    pub updated_by: Vec<AuditEntry>,
    pub deleted_by: Option<AuditEntry>,
    /// Embedded arrays keyed by field name, e.g. `products`.
    #[serde(default)]
    pub sub_documents: BTreeMap<String, Vec<SubDocument>>,
}

impl Document {
    /// Creates an active, non-deleted document with a fresh id.
    pub fn new(fields: Fields, created_by: AuditEntry) -> Self {
        Self {
            id: Uuid::new_v4(),
            fields,
            is_active: true,
            is_deleted: false,
            created_by: Some(created_by),
            updated_by: Vec::new(),
            deleted_by: None,
            sub_documents: BTreeMap::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Items of embedded array `field`; empty when the array was never used.
    pub fn sub_documents(&self, field: &str) -> &[SubDocument] {
        self.sub_documents
            .get(field)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn sub_documents_mut(&mut self, field: &str) -> &mut Vec<SubDocument> {
        self.sub_documents.entry(field.to_string()).or_default()
    }

    pub fn find_sub_document(&self, field: &str, id: DocumentId) -> Option<&SubDocument> {
        self.sub_documents(field).iter().find(|item| item.id == id)
    }

    pub fn find_sub_document_mut(
        &mut self,
        field: &str,
        id: DocumentId,
    ) -> Option<&mut SubDocument> {
        self.sub_documents
            .get_mut(field)
            .and_then(|items| items.iter_mut().find(|item| item.id == id))
    }

    /// Appends `entry` to the update history and merges `patch`.
    pub fn apply_patch(&mut self, patch: &Fields, entry: AuditEntry) {
        self.updated_by.push(entry);
        merge_fields(&mut self.fields, patch);
    }

    pub fn toggle_active(&mut self, entry: AuditEntry) {
        self.updated_by.push(entry);
        self.is_active = !self.is_active;
    }

    pub fn soft_delete(&mut self, entry: AuditEntry) {
        self.is_deleted = true;
        self.deleted_by = Some(entry);
    }
}

/// Payload for creating a document, optionally with embedded items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewDocument {
    pub fields: Fields,
    pub sub_documents: BTreeMap<String, Vec<Fields>>,
}

impl NewDocument {
    pub fn new(fields: Fields) -> Self {
        Self {
            fields,
            sub_documents: BTreeMap::new(),
        }
    }

    /// Adds initial items to embedded array `field`.
    pub fn with_sub_documents(mut self, field: impl Into<String>, items: Vec<Fields>) -> Self {
        self.sub_documents.insert(field.into(), items);
        self
    }
}

fn merge_fields(target: &mut Fields, patch: &Fields) {
    for (key, value) in patch {
        target.insert(key.clone(), value.clone());
    }
}
