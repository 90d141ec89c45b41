//! Crate-level error taxonomy.
//!
//! Each subsystem owns a narrow error enum; [`RankerError`] composes them for
//! callers that just want one type. Classified search outcomes (found, blocked,
//! incomplete, ...) are values on [`crate::orchestration::SearchResult`], not errors.

use thiserror::Error;

use crate::config::ConfigurationError;
use crate::state_machine::StateMachineError;

/// Failures raised by the session store or proxy directory collaborators
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CollaboratorError {
    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Collaborator backend error: {0}")]
    Backend(String),
}

/// Failures raised by the transport collaborator
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    /// Connect, TLS or timeout failure. Retryable.
    #[error("Network error: {0}")]
    Network(String),

    /// Stream reset or similar protocol-level refusal, treated as access denial
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Failures while binding a session to an egress endpoint
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindError {
    /// No qualifying session/endpoint pair exists right now
    #[error("No usable session/endpoint pair: {0}")]
    NotAvailable(String),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

/// Failures that prevent a search from producing a classified outcome
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SearchError {
    #[error("Invalid search input: {0}")]
    InvalidInput(String),

    /// The binder found nothing to search with; no attempt was consumed
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error(transparent)]
    InvalidState(#[from] StateMachineError),
}

impl From<BindError> for SearchError {
    fn from(error: BindError) -> Self {
        match error {
            BindError::NotAvailable(reason) => SearchError::ResourceExhausted(reason),
            BindError::Collaborator(inner) => SearchError::Collaborator(inner),
        }
    }
}

/// Top-level error for the crate
#[derive(Debug, Error)]
pub enum RankerError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

pub type Result<T> = std::result::Result<T, RankerError>;
