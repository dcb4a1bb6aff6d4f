//! Collaborating workflows
//!
//! Stock and sale operations live in other parts of the application. The
//! budget orchestrator reaches them through these traits.

use thiserror::Error;

use crate::ipc::WaitError;

mod sale;
mod stock;

pub use sale::{IpcSaleCreator, SaleCreator, SaleDraft};
pub use stock::{IpcStockAdjuster, StockAdjuster, StockAdjustment, StockIntent, StockTarget, stock_adjustments};

/// Errors from collaborator workflows
#[derive(Debug, Error)]
pub enum CollabError {
    #[error("Exchange failed: {0}")]
    Wait(#[from] WaitError),

    #[error("Payload error: {0}")]
    Payload(String),

    #[error("Rejected: {0}")]
    Rejected(String),
}
