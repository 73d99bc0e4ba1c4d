//! Audited generic document engine.
//! This crate is the single source of truth for record invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod provenance;
pub mod repo;
pub mod resource;
pub mod service;
pub mod session;
pub mod validation;

pub use config::{ConfigError, EngineConfig, TokenConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::audit::AuditEntry;
pub use model::document::{Document, DocumentId, Fields, NewDocument, SubDocument};
pub use model::schema::CollectionSchema;
pub use provenance::{stamp, ActionContext, MalformedContextError, Principal};
pub use repo::document_repo::DocumentRepository;
pub use repo::sqlite_store::SqliteDocumentStore;
pub use repo::store::{DocumentStore, Filter};
pub use repo::token_repo::{SqliteTokenRepository, TokenKind, TokenRecord, TokenRepository};
pub use repo::{RepoError, RepoResult};
pub use resource::{ControllerError, RequestContext};
pub use service::endpoint_service::{EndpointError, EndpointService};
pub use service::pagination::{paginate, paginate_array, paginate_from_store, PageResult};
pub use session::{SessionError, SessionService, TokenClaims, TokenSigner};
pub use validation::{validate_properties, Rule, ValidationError};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
