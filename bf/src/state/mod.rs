//! Application state for budgets
//!
//! BudgetState holds the in-memory budget list the orchestrator reads and
//! receives the outcome of every orchestrated operation.

mod outcome;
mod store;

pub use outcome::{BudgetOperation, BudgetOutcome};
pub use store::{BudgetState, DEFAULT_OUTCOME_CAPACITY};
