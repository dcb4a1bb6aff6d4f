//! Command/event correlation over the in-memory IPC channel
//!
//! The front-end sends one-way commands and learns about their completion
//! from events flowing back on the same channel pair. Three pieces make that
//! a request/response exchange:
//! - **Tags** ([`CorrelationTag`]): operation-kind constants echoed by the backend
//! - **Dispatcher** ([`CommandDispatcher`]): fire-and-forget command send
//! - **Waiter** ([`EventWaiter`]): suspends the caller until the matching event arrives
//!
//! [`IpcClient`] combines the dispatcher and waiter into a single request call.

pub mod channel;
pub mod client;
pub mod dispatcher;
pub mod messages;
pub mod tags;
pub mod waiter;

pub use channel::{BackEndPort, FrontEndPort, ipc_pair};
pub use client::IpcClient;
pub use dispatcher::CommandDispatcher;
pub use messages::{CommandEnvelope, CompletionEvent, EntityKind, Operation, RequestId};
pub use tags::CorrelationTag;
pub use waiter::{ChannelWaiter, EventWaiter, PendingEvent, WaitError, WaiterMetrics};
