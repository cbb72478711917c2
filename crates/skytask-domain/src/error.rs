use thiserror::Error;

use crate::types::RequestStatus;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Invalid recurrence: {0}")]
    InvalidRecurrence(String),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Schedule request not found: {0}")]
    RequestNotFound(String),

    #[error(
        "Invalid transition for request {request_id}: {current} -> {attempted}"
    )]
    InvalidTransition {
        request_id: String,
        current: RequestStatus,
        attempted: RequestStatus,
    },

    #[error("Delivery failure: {0}")]
    DeliveryFailure(String),

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),
}

impl DomainError {
    /// Transient errors are nak'd so the broker redelivers; everything
    /// else is a permanent outcome for the message in hand.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DomainError::DeliveryFailure(_) | DomainError::RepositoryError(_)
        )
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
