use uuid::Uuid;

use super::model::OrderStatus;
use crate::storage::PersistenceError;

// ============================================================================
// Order Lifecycle Errors
// ============================================================================
//
// Only these variants cross the orchestrator boundary. Downstream failures
// (index writes, publishes, audit entries) are caught inside the service and
// never surface here.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("order not found: {0}")]
    NotFound(Uuid),

    #[error("order is already {0}, cannot cancel")]
    InvalidTransition(OrderStatus),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_state() {
        let err = OrderError::InvalidTransition(OrderStatus::Delivered);
        assert_eq!(err.to_string(), "order is already delivered, cannot cancel");

        let err = OrderError::InvalidTransition(OrderStatus::Cancelled);
        assert_eq!(err.to_string(), "order is already cancelled, cannot cancel");

        let err = OrderError::NotFound(Uuid::nil());
        assert!(err.to_string().starts_with("order not found"));
    }
}
