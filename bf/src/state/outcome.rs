//! Published operation outcomes

use std::fmt;

use crate::domain::BudgetId;
use crate::view::BudgetView;

/// The six orchestrated budget operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BudgetOperation {
    Create,
    ReadAll,
    Update,
    Delete,
    ConfirmPayment,
    MarkOutdated,
}

impl BudgetOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::ReadAll => "read_all",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::ConfirmPayment => "confirm_payment",
            Self::MarkOutdated => "mark_outdated",
        }
    }
}

impl fmt::Display for BudgetOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome published to application state, one per operation call
///
/// Failures carry no detail; the cause is only logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BudgetOutcome {
    Created(BudgetView),
    CreateFailed,
    Loaded(Vec<BudgetView>),
    LoadFailed,
    Updated(BudgetView),
    UpdateFailed,
    Deleted(BudgetId),
    DeleteFailed,
    PaymentConfirmed(BudgetId),
    ConfirmPaymentFailed,
    OutdatedMarked(Vec<BudgetId>),
    MarkOutdatedFailed,
}

impl BudgetOutcome {
    /// Generic failure marker for an operation
    pub fn failure(operation: BudgetOperation) -> Self {
        match operation {
            BudgetOperation::Create => Self::CreateFailed,
            BudgetOperation::ReadAll => Self::LoadFailed,
            BudgetOperation::Update => Self::UpdateFailed,
            BudgetOperation::Delete => Self::DeleteFailed,
            BudgetOperation::ConfirmPayment => Self::ConfirmPaymentFailed,
            BudgetOperation::MarkOutdated => Self::MarkOutdatedFailed,
        }
    }

    /// Operation this outcome belongs to
    pub fn operation(&self) -> BudgetOperation {
        match self {
            Self::Created(_) | Self::CreateFailed => BudgetOperation::Create,
            Self::Loaded(_) | Self::LoadFailed => BudgetOperation::ReadAll,
            Self::Updated(_) | Self::UpdateFailed => BudgetOperation::Update,
            Self::Deleted(_) | Self::DeleteFailed => BudgetOperation::Delete,
            Self::PaymentConfirmed(_) | Self::ConfirmPaymentFailed => BudgetOperation::ConfirmPayment,
            Self::OutdatedMarked(_) | Self::MarkOutdatedFailed => BudgetOperation::MarkOutdated,
        }
    }

    pub fn is_failure(&self) -> bool {
        *self == Self::failure(self.operation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [BudgetOperation; 6] = [
        BudgetOperation::Create,
        BudgetOperation::ReadAll,
        BudgetOperation::Update,
        BudgetOperation::Delete,
        BudgetOperation::ConfirmPayment,
        BudgetOperation::MarkOutdated,
    ];

    #[test]
    fn test_failure_maps_back_to_operation() {
        for operation in ALL {
            let outcome = BudgetOutcome::failure(operation);
            assert_eq!(outcome.operation(), operation);
            assert!(outcome.is_failure());
        }
    }

    #[test]
    fn test_success_is_not_failure() {
        let outcome = BudgetOutcome::Deleted(BudgetId::new("b1"));
        assert_eq!(outcome.operation(), BudgetOperation::Delete);
        assert!(!outcome.is_failure());
        assert!(!BudgetOutcome::OutdatedMarked(vec![]).is_failure());
    }
}
