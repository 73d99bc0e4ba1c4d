//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the abstract document storage contract (`DocumentStore`).
//! - Provide the generic audited repository over any store.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Default reads are scoped to `isDeleted = false` at the repository
//!   boundary, never inside the store.
//! - Repository APIs return semantic errors (`NotFound`, `DuplicateKey`) in
//!   addition to DB transport errors.

pub mod document_repo;
pub mod error;
pub mod sqlite_store;
pub mod store;
pub mod token_repo;

pub use error::{RepoError, RepoResult};
