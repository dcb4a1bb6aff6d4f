//! Correlation tags
//!
//! A tag names the kind of operation a command belongs to. The backend echoes
//! it on the completion event, which is how the event finds its waiter. Tags
//! are constants for the lifetime of the process; per-call pairing is done by
//! the request id that travels next to the tag.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Operation-kind correlation tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CorrelationTag {
    #[serde(rename = "BUDGET_CONFIRM_PAYMENT")]
    ConfirmPaymentBudget,
    #[serde(rename = "BUDGET_SET_OUTDATED")]
    SetOutdatedBudget,
    #[serde(rename = "BUDGET_READ_ALL")]
    ReadAll,
    #[serde(rename = "BUDGET_CREATE")]
    CreateBudget,
    #[serde(rename = "BUDGET_UPDATE")]
    UpdateBudget,
    #[serde(rename = "BUDGET_REMOVE")]
    RemoveBudget,
    #[serde(rename = "STOCK_ADJUST")]
    StockAdjust,
    #[serde(rename = "SALE_CREATE")]
    SaleCreate,
}

impl CorrelationTag {
    /// Every tag owned by the budget orchestrator
    pub const fn budget_tags() -> &'static [CorrelationTag] {
        &[
            Self::ConfirmPaymentBudget,
            Self::SetOutdatedBudget,
            Self::ReadAll,
            Self::CreateBudget,
            Self::UpdateBudget,
            Self::RemoveBudget,
        ]
    }

    /// Wire string of this tag
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ConfirmPaymentBudget => "BUDGET_CONFIRM_PAYMENT",
            Self::SetOutdatedBudget => "BUDGET_SET_OUTDATED",
            Self::ReadAll => "BUDGET_READ_ALL",
            Self::CreateBudget => "BUDGET_CREATE",
            Self::UpdateBudget => "BUDGET_UPDATE",
            Self::RemoveBudget => "BUDGET_REMOVE",
            Self::StockAdjust => "STOCK_ADJUST",
            Self::SaleCreate => "SALE_CREATE",
        }
    }
}

impl fmt::Display for CorrelationTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
