//! In-memory IPC channel between the front-end and the backend process
//!
//! A duplex pair of unbounded line queues. Commands flow front-end to
//! backend, completion events flow back. Sending never blocks.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::messages::{CommandEnvelope, CompletionEvent};

/// Front-end side of the channel
pub struct FrontEndPort {
    pub commands: mpsc::UnboundedSender<String>,
    pub events: mpsc::UnboundedReceiver<String>,
}

/// Backend side of the channel
pub struct BackEndPort {
    pub commands: mpsc::UnboundedReceiver<String>,
    pub events: mpsc::UnboundedSender<String>,
}

/// Create a connected front-end/backend pair
pub fn ipc_pair() -> (FrontEndPort, BackEndPort) {
    debug!("ipc_pair: called");
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    (
        FrontEndPort {
            commands: command_tx,
            events: event_rx,
        },
        BackEndPort {
            commands: command_rx,
            events: event_tx,
        },
    )
}

impl BackEndPort {
    /// Receive the next command, skipping lines that do not parse
    ///
    /// Returns None once the front-end has dropped its sender.
    pub async fn recv_command(&mut self) -> Option<CommandEnvelope> {
        while let Some(line) = self.commands.recv().await {
            match serde_json::from_str::<CommandEnvelope>(&line) {
                Ok(envelope) => return Some(envelope),
                Err(e) => warn!(error = %e, "BackEndPort::recv_command: dropping malformed command"),
            }
        }
        debug!("BackEndPort::recv_command: channel closed");
        None
    }

    /// Send a completion event to the front-end
    ///
    /// Returns false when the front-end is gone.
    pub fn send_event(&self, event: &CompletionEvent) -> bool {
        debug!(tag = %event.tag, request_id = ?event.request_id, "BackEndPort::send_event: called");
        match serde_json::to_string(event) {
            Ok(line) => self.events.send(line).is_ok(),
            Err(e) => {
                warn!(error = %e, "BackEndPort::send_event: failed to serialize event");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::messages::{EntityKind, Operation, RequestId};
    use crate::ipc::tags::CorrelationTag;
    use serde_json::json;

    #[tokio::test]
    async fn test_backend_receives_parsed_commands() {
        let (front, mut back) = ipc_pair();
        let envelope = CommandEnvelope {
            entity: EntityKind::Budget,
            operation: Operation::DeleteBudget,
            tag: CorrelationTag::RemoveBudget,
            request_id: RequestId::new(),
            payload: Some(json!("b1")),
        };

        front.commands.send("garbage".to_string()).unwrap();
        front.commands.send(serde_json::to_string(&envelope).unwrap()).unwrap();

        let received = back.recv_command().await.unwrap();
        assert_eq!(received, envelope);
    }

    #[tokio::test]
    async fn test_recv_command_none_after_front_end_drops() {
        let (front, mut back) = ipc_pair();
        drop(front);
        assert!(back.recv_command().await.is_none());
    }

    #[tokio::test]
    async fn test_send_event_reaches_front_end() {
        let (mut front, back) = ipc_pair();
        let event = CompletionEvent::success(CorrelationTag::ReadAll, None, json!([]));
        assert!(back.send_event(&event));

        let line = front.events.recv().await.unwrap();
        let parsed: CompletionEvent = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed, event);
    }

    #[tokio::test]
    async fn test_send_event_reports_closed_front_end() {
        let (front, back) = ipc_pair();
        drop(front);
        let event = CompletionEvent::success(CorrelationTag::ReadAll, None, json!([]));
        assert!(!back.send_event(&event));
    }
}
