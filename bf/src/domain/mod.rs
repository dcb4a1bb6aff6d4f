//! Domain types for budgetflow
//!
//! Budgets in their three shapes (input, normalized, wire), identifiers,
//! caller-supplied amounts and the outdated-budget scanner.

use thiserror::Error;

mod amount;
mod budget;
mod id;
pub mod outdated;

pub use amount::AmountInput;
pub use budget::{
    Budget, BudgetInput, BudgetRecord, BudgetStatus, Customer, ProductLine, decode_products, encode_products,
};
pub use id::BudgetId;
pub use outdated::{Outdatable, find_outdated, is_outdated};

/// Errors raised while normalizing or converting budgets
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid amount: {0:?}")]
    InvalidAmount(String),

    #[error("Product codec error: {0}")]
    ProductCodec(String),
}
