//! budgetflow - budget command/event correlation and saga orchestration
//!
//! The front-end talks to its backend over a one-way command channel and
//! learns about completion from events flowing back. budgetflow pairs those
//! events with the operations waiting for them and runs each budget
//! operation as a saga whose outcome lands in application state.
//!
//! # Modules
//!
//! - [`ipc`] - Correlation tags, command dispatcher, event waiter, channel pair
//! - [`orchestrator`] - The six budget operations and their compensation
//! - [`collab`] - Stock and sale collaborators
//! - [`state`] - In-memory budget list and published outcomes
//! - [`view`] - View model projection
//! - [`domain`] - Budget types and the outdated-budget scanner
//! - [`backend`] - In-process backend for demos and tests
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod backend;
pub mod cli;
pub mod clock;
pub mod collab;
pub mod config;
pub mod domain;
pub mod ipc;
pub mod orchestrator;
pub mod state;
pub mod view;

// Re-export commonly used types
pub use backend::MemoryBackend;
pub use clock::{Clock, FixedClock, SystemClock};
pub use collab::{
    CollabError, IpcSaleCreator, IpcStockAdjuster, SaleCreator, SaleDraft, StockAdjuster, StockIntent, StockTarget,
};
pub use config::{Config, IpcConfig, OrchestratorConfig, ViewConfig};
pub use domain::{
    AmountInput, Budget, BudgetId, BudgetInput, BudgetRecord, BudgetStatus, Customer, DomainError, ProductLine,
    find_outdated, is_outdated,
};
pub use ipc::{
    ChannelWaiter, CommandDispatcher, CorrelationTag, EventWaiter, IpcClient, RequestId, WaitError, ipc_pair,
};
pub use orchestrator::{BudgetError, BudgetOrchestrator, Collaborators};
pub use state::{BudgetOperation, BudgetOutcome, BudgetState};
pub use view::{BudgetView, Locale, ViewProjector};
