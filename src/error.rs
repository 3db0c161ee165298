use thiserror::Error;

use crate::storage::StorageError;
use crate::store::StoreError;
use crate::types::IssueStatus;
use crate::verification::GateMode;

/// Errors returned synchronously to callers of the lifecycle manager,
/// the engagement counters and the notification inbox.
#[derive(Debug, Error)]
pub enum CivicError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Image rejected during {mode}: {reason} (probability {probability:.2})")]
    ImageRejected {
        mode: GateMode,
        reason: String,
        probability: f64,
    },
    #[error("Cannot move issue from {from} to {to}")]
    InvalidTransition { from: IssueStatus, to: IssueStatus },
    #[error("Not authorized: {0}")]
    Authorization(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("Object storage failed: {0}")]
    Storage(#[from] StorageError),
    #[error("Store failed: {0}")]
    Store(#[from] StoreError),
}

impl CivicError {
    pub fn validation(message: impl Into<String>) -> Self {
        CivicError::Validation(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        CivicError::Authorization(message.into())
    }

    pub fn issue_not_found(id: i64) -> Self {
        CivicError::NotFound { entity: "Issue", id }
    }

    pub fn user_not_found(id: i64) -> Self {
        CivicError::NotFound { entity: "User", id }
    }

    /// Everything the client can fix by changing its request
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CivicError::Validation(_)
                | CivicError::ImageRejected { .. }
                | CivicError::InvalidTransition { .. }
        )
    }

    /// HTTP status the routing layer should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            CivicError::Validation(_)
            | CivicError::ImageRejected { .. }
            | CivicError::InvalidTransition { .. } => 400,
            CivicError::Authorization(_) => 403,
            CivicError::NotFound { .. } => 404,
            CivicError::Storage(_) | CivicError::Store(_) => 500,
        }
    }

    /// Measured classifier probability, present only for gate rejections
    pub fn probability(&self) -> Option<f64> {
        match self {
            CivicError::ImageRejected { probability, .. } => Some(*probability),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(CivicError::validation("missing title").status_code(), 400);
        assert_eq!(CivicError::unauthorized("citizen").status_code(), 403);
        assert_eq!(CivicError::issue_not_found(7).status_code(), 404);
        assert_eq!(
            CivicError::InvalidTransition {
                from: IssueStatus::Closed,
                to: IssueStatus::Pending
            }
            .status_code(),
            400
        );
    }

    #[test]
    fn test_rejection_carries_probability() {
        let err = CivicError::ImageRejected {
            mode: GateMode::Resolution,
            reason: "waste still visible".to_string(),
            probability: 0.45,
        };
        assert!(err.is_validation());
        assert_eq!(err.probability(), Some(0.45));
        assert!(err.to_string().contains("0.45"));
        assert!(err.to_string().contains("resolution"));
    }

    #[test]
    fn test_not_found_message() {
        assert_eq!(CivicError::user_not_found(12).to_string(), "User 12 not found");
        assert!(!CivicError::user_not_found(12).is_validation());
    }
}
