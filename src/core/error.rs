use crate::core::group::GroupId;
use crate::core::user::UserId;
use rust_decimal::Decimal;
use thiserror::Error;

/// Input that is inconsistent on its own, independent of ledger state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("an expense needs at least one participant")]
    NoParticipants,
    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),
    #[error("expected {expected} split values, got {got}")]
    ValueCountMismatch { expected: usize, got: usize },
    #[error("exact amounts sum to {sum}, expected {total}")]
    ExactSumMismatch { total: Decimal, sum: Decimal },
    #[error("percentages sum to {sum}, expected 100")]
    PercentSumMismatch { sum: Decimal },
    #[error("split value must not be negative, got {0}")]
    NegativeValue(Decimal),
    #[error("{0} cannot settle with themselves")]
    SelfSettlement(UserId),
    #[error("amount exceeds the representable range")]
    AmountOverflow,
}

/// Errors surfaced by ledger operations.
///
/// Every variant is raised before any balance is touched, so a failed call
/// leaves the ledger exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("{user} is not a member of group {group}")]
    Membership { group: GroupId, user: UserId },
    #[error("cannot remove {user} from group {group}: {outstanding} balance(s) outstanding")]
    Precondition {
        group: GroupId,
        user: UserId,
        outstanding: usize,
    },
    #[error("unknown user {0}")]
    UnknownUser(UserId),
    #[error("unknown group {0}")]
    UnknownGroup(GroupId),
    #[error("user {0} is already registered")]
    DuplicateUser(UserId),
    #[error("group {0} already exists")]
    DuplicateGroup(GroupId),
    #[error("inconsistent ledger state: {0}")]
    InconsistentState(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_validation_converts() {
        let err: LedgerError = ValidationError::PercentSumMismatch { sum: dec!(90) }.into();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert_eq!(
            err.to_string(),
            "validation failed: percentages sum to 90, expected 100"
        );
    }

    #[test]
    fn test_membership_message() {
        let err = LedgerError::Membership {
            group: GroupId::new("trip"),
            user: UserId::new("mallory"),
        };
        assert_eq!(err.to_string(), "mallory is not a member of group trip");
    }
}
