//! Resource controllers wired over the document engine.
//!
//! # Responsibility
//! - Validate raw request bodies and path parameters.
//! - Route every mutation through `EndpointService` and map records into
//!   response views.

pub mod category;

use crate::provenance::{ActionContext, Principal};
use crate::repo::error::RepoError;
use crate::service::endpoint_service::EndpointError;
use crate::validation::ValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ControllerResult<T> = Result<T, ControllerError>;

/// Who is acting and through which request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub principal: Principal,
    pub action: ActionContext,
}

impl RequestContext {
    pub fn new(principal: Principal, action: ActionContext) -> Self {
        Self { principal, action }
    }
}

/// Failure surfaced by a resource controller.
#[derive(Debug)]
pub enum ControllerError {
    Validation(ValidationError),
    Endpoint(EndpointError),
}

impl ControllerError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(err) => err.status_code(),
            Self::Endpoint(err) => err.status_code(),
        }
    }
}

impl Display for ControllerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Endpoint(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ControllerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Endpoint(err) => Some(err),
        }
    }
}

impl From<ValidationError> for ControllerError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<EndpointError> for ControllerError {
    fn from(value: EndpointError) -> Self {
        Self::Endpoint(value)
    }
}

impl From<RepoError> for ControllerError {
    fn from(value: RepoError) -> Self {
        Self::Endpoint(EndpointError::Repo(value))
    }
}
