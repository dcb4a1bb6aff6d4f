//! Command dispatcher
//!
//! Fire-and-forget: `dispatch` serializes one envelope, enqueues exactly one
//! line on the IPC channel and returns. It cannot report failure; a closed
//! channel is logged and the command is dropped.

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::messages::{CommandEnvelope, EntityKind, Operation, RequestId};
use super::tags::CorrelationTag;

/// Sends one-way commands to the backend
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    tx: mpsc::UnboundedSender<String>,
}

impl CommandDispatcher {
    /// Create a dispatcher over the front-end command queue
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx }
    }

    /// Dispatch a command
    pub fn dispatch(
        &self,
        entity: EntityKind,
        operation: Operation,
        tag: CorrelationTag,
        request_id: RequestId,
        payload: Option<Value>,
    ) {
        debug!(?entity, ?operation, %tag, %request_id, "CommandDispatcher::dispatch: called");
        self.send(CommandEnvelope {
            entity,
            operation,
            tag,
            request_id,
            payload,
        });
    }

    /// Send a prebuilt envelope
    pub fn send(&self, envelope: CommandEnvelope) {
        let line = match serde_json::to_string(&envelope) {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, tag = %envelope.tag, "CommandDispatcher::send: failed to serialize command");
                return;
            }
        };

        if self.tx.send(line).is_err() {
            warn!(tag = %envelope.tag, request_id = %envelope.request_id, "CommandDispatcher::send: IPC channel closed, command dropped");
        }
    }
}
