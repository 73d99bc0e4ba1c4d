//! Document-centric domain model shared by every managed collection.
//!
//! # Responsibility
//! - Define the canonical shapes persisted by the document repository.
//! - Keep provenance (`createdBy`/`updatedBy`/`deletedBy`) on every record.
//!
//! # Invariants
//! - Every record is identified by a stable `DocumentId`.
//! - Deletion is represented by soft-delete tombstones, never hard delete.

pub mod audit;
pub mod document;
pub mod schema;
