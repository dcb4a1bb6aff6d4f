//! Budget transaction orchestration
//!
//! Each operation is a short saga: build the payload, exchange it with the
//! backend, run dependent collaborator work, project the result and publish
//! exactly one outcome. Failures never escape an operation; they become the
//! operation's failure outcome.

use thiserror::Error;

use crate::collab::CollabError;
use crate::domain::{BudgetId, DomainError};
use crate::ipc::WaitError;

mod budget;

pub use budget::{BudgetOrchestrator, Collaborators};

/// Errors that abort a budget operation
#[derive(Debug, Error)]
pub enum BudgetError {
    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] DomainError),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Correlation failed: {0}")]
    Wait(#[from] WaitError),

    #[error("Stock adjustment failed: {0}")]
    Stock(CollabError),

    #[error("Sale creation failed: {0}")]
    Sale(CollabError),

    #[error("Budget not found: {0}")]
    NotFound(BudgetId),

    #[error("Budget has no id")]
    MissingId,
}

impl From<serde_json::Error> for BudgetError {
    fn from(e: serde_json::Error) -> Self {
        Self::Codec(e.to_string())
    }
}
