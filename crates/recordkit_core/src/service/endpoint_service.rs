//! Endpoint orchestration over the document repository.
//!
//! # Responsibility
//! - Expose one orchestration function per repository mutation.
//!
//! # Invariants
//! - No mutation reaches the repository without a freshly stamped
//!   `AuditEntry`; a malformed action context aborts before any write.
//! - Repository and stamping errors are propagated unchanged.

use crate::model::document::{Document, DocumentId, Fields, NewDocument};
use crate::provenance::{stamp, ActionContext, MalformedContextError, Principal};
use crate::repo::document_repo::DocumentRepository;
use crate::repo::error::RepoError;
use crate::repo::store::DocumentStore;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type EndpointResult<T> = Result<T, EndpointError>;

/// Failure of one orchestrated mutation.
#[derive(Debug)]
pub enum EndpointError {
    /// The action context could not be stamped.
    Context(MalformedContextError),
    Repo(RepoError),
}

impl EndpointError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Context(_) => 400,
            Self::Repo(err) => err.status_code(),
        }
    }
}

impl Display for EndpointError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Context(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for EndpointError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Context(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<MalformedContextError> for EndpointError {
    fn from(value: MalformedContextError) -> Self {
        Self::Context(value)
    }
}

impl From<RepoError> for EndpointError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Stamps and delegates mutations to a borrowed repository.
pub struct EndpointService<'r, S: DocumentStore> {
    repo: &'r DocumentRepository<S>,
}

impl<'r, S: DocumentStore> EndpointService<'r, S> {
    pub fn new(repo: &'r DocumentRepository<S>) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &'r DocumentRepository<S> {
        self.repo
    }

    pub fn insert_doc(
        &self,
        data: NewDocument,
        principal: &Principal,
        action: &ActionContext,
    ) -> EndpointResult<Document> {
        let entry = stamp(principal, action)?;
        Ok(self.repo.insert(data, entry)?)
    }

    pub fn insert_sub_doc(
        &self,
        parent_id: DocumentId,
        field: &str,
        data: Fields,
        principal: &Principal,
        action: &ActionContext,
    ) -> EndpointResult<Document> {
        let entry = stamp(principal, action)?;
        Ok(self.repo.insert_sub(parent_id, field, data, entry)?)
    }

    pub fn update_doc(
        &self,
        id: DocumentId,
        patch: &Fields,
        principal: &Principal,
        action: &ActionContext,
    ) -> EndpointResult<Document> {
        let entry = stamp(principal, action)?;
        Ok(self.repo.update(id, patch, entry)?)
    }

    pub fn update_sub_doc(
        &self,
        parent_id: DocumentId,
        sub_id: DocumentId,
        field: &str,
        patch: &Fields,
        principal: &Principal,
        action: &ActionContext,
    ) -> EndpointResult<Document> {
        let entry = stamp(principal, action)?;
        Ok(self
            .repo
            .update_sub(parent_id, sub_id, field, patch, entry)?)
    }

    pub fn toggle_doc(
        &self,
        id: DocumentId,
        principal: &Principal,
        action: &ActionContext,
    ) -> EndpointResult<()> {
        let entry = stamp(principal, action)?;
        Ok(self.repo.toggle_active(id, entry)?)
    }

    pub fn toggle_sub_doc(
        &self,
        parent_id: DocumentId,
        sub_id: DocumentId,
        field: &str,
        principal: &Principal,
        action: &ActionContext,
    ) -> EndpointResult<Document> {
        let entry = stamp(principal, action)?;
        Ok(self.repo.toggle_active_sub(parent_id, sub_id, field, entry)?)
    }

    pub fn soft_delete_doc(
        &self,
        id: DocumentId,
        principal: &Principal,
        action: &ActionContext,
    ) -> EndpointResult<()> {
        let entry = stamp(principal, action)?;
        Ok(self.repo.soft_delete(id, entry)?)
    }

    pub fn soft_delete_sub_doc(
        &self,
        parent_id: DocumentId,
        sub_id: DocumentId,
        field: &str,
        principal: &Principal,
        action: &ActionContext,
    ) -> EndpointResult<Document> {
        let entry = stamp(principal, action)?;
        Ok(self.repo.soft_delete_sub(parent_id, sub_id, field, entry)?)
    }
}
