use crate::error::CivicError;
use crate::types::IssueStatus;

/// Statuses reachable from `from` through a status transition.
///
/// Closed is terminal and a resolved issue can only be closed; nothing ever
/// goes back to pending.
pub fn allowed_targets(from: IssueStatus) -> &'static [IssueStatus] {
    match from {
        IssueStatus::Pending => &[
            IssueStatus::InProgress,
            IssueStatus::Resolved,
            IssueStatus::Closed,
        ],
        IssueStatus::InProgress => &[IssueStatus::Resolved, IssueStatus::Closed],
        IssueStatus::Resolved => &[IssueStatus::Closed],
        IssueStatus::Closed => &[],
    }
}

pub fn check_transition(from: IssueStatus, to: IssueStatus) -> Result<(), CivicError> {
    if allowed_targets(from).contains(&to) {
        Ok(())
    } else {
        Err(CivicError::InvalidTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use IssueStatus::*;

    #[test]
    fn test_forward_transitions_allowed() {
        assert!(check_transition(Pending, InProgress).is_ok());
        assert!(check_transition(Pending, Resolved).is_ok());
        assert!(check_transition(Pending, Closed).is_ok());
        assert!(check_transition(InProgress, Resolved).is_ok());
        assert!(check_transition(InProgress, Closed).is_ok());
        assert!(check_transition(Resolved, Closed).is_ok());
    }

    #[test]
    fn test_no_way_back() {
        for from in [Pending, InProgress, Resolved, Closed] {
            assert!(check_transition(from, Pending).is_err(), "{from} -> pending");
        }
        assert!(check_transition(Resolved, InProgress).is_err());
        assert!(check_transition(Closed, Resolved).is_err());
    }

    #[test]
    fn test_same_status_is_rejected() {
        for status in [Pending, InProgress, Resolved, Closed] {
            let err = check_transition(status, status).unwrap_err();
            assert!(err.is_validation());
        }
    }
}
