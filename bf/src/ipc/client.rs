//! Request/response client over the IPC channel
//!
//! Couples a [`CommandDispatcher`] with an [`EventWaiter`]. Every request gets
//! a fresh [`RequestId`], is registered with the waiter before the command is
//! sent, and then suspends until its completion event arrives.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::dispatcher::CommandDispatcher;
use super::messages::{EntityKind, Operation, RequestId};
use super::tags::CorrelationTag;
use super::waiter::{EventWaiter, WaitError};

/// Front-end handle for command/event exchanges
#[derive(Clone)]
pub struct IpcClient {
    dispatcher: CommandDispatcher,
    waiter: Arc<dyn EventWaiter>,
}

impl IpcClient {
    pub fn new(dispatcher: CommandDispatcher, waiter: Arc<dyn EventWaiter>) -> Self {
        Self { dispatcher, waiter }
    }

    /// Send a command and wait for its completion result
    pub async fn request(
        &self,
        entity: EntityKind,
        operation: Operation,
        tag: CorrelationTag,
        payload: Option<Value>,
    ) -> Result<Value, WaitError> {
        let request_id = RequestId::new();
        debug!(%tag, %request_id, ?operation, "IpcClient::request: called");
        let pending = self.waiter.subscribe(tag, request_id).await?;
        self.dispatcher.dispatch(entity, operation, tag, request_id, payload);
        pending.wait().await
    }

    /// Send a command without waiting for its completion
    pub fn notify(&self, entity: EntityKind, operation: Operation, tag: CorrelationTag, payload: Option<Value>) -> RequestId {
        let request_id = RequestId::new();
        debug!(%tag, %request_id, ?operation, "IpcClient::notify: called");
        self.dispatcher.dispatch(entity, operation, tag, request_id, payload);
        request_id
    }

    /// Release every wait registered on the given tags
    pub async fn release(&self, tags: &[CorrelationTag]) -> Result<(), WaitError> {
        debug!(count = tags.len(), "IpcClient::release: called");
        self.waiter.unsubscribe(tags).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::messages::CommandEnvelope;
    use crate::ipc::waiter::mock::ScriptedWaiter;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn client() -> (IpcClient, Arc<ScriptedWaiter>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let waiter = Arc::new(ScriptedWaiter::new());
        (IpcClient::new(CommandDispatcher::new(tx), waiter.clone()), waiter, rx)
    }

    #[tokio::test]
    async fn test_request_subscribes_with_dispatched_request_id() {
        let (client, waiter, mut rx) = client();
        waiter.push(CorrelationTag::ReadAll, Ok(json!([])));

        let result = client
            .request(EntityKind::Budget, Operation::ReadBudgets, CorrelationTag::ReadAll, None)
            .await
            .unwrap();
        assert_eq!(result, json!([]));

        let envelope: CommandEnvelope = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        let subscriptions = waiter.subscriptions();
        assert_eq!(subscriptions.len(), 1);
        assert_eq!(subscriptions[0], (CorrelationTag::ReadAll, envelope.request_id));
    }

    #[tokio::test]
    async fn test_request_propagates_backend_failure() {
        let (client, waiter, _rx) = client();
        let error = WaitError::Backend {
            tag: CorrelationTag::RemoveBudget,
            message: "locked".to_string(),
        };
        waiter.push(CorrelationTag::RemoveBudget, Err(error.clone()));

        let result = client
            .request(EntityKind::Budget, Operation::DeleteBudget, CorrelationTag::RemoveBudget, Some(json!("b1")))
            .await;
        assert_eq!(result, Err(error));
    }

    #[tokio::test]
    async fn test_notify_does_not_subscribe() {
        let (client, waiter, mut rx) = client();
        let request_id = client.notify(EntityKind::Budget, Operation::UpdateBudget, CorrelationTag::UpdateBudget, None);

        let envelope: CommandEnvelope = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(envelope.request_id, request_id);
        assert!(waiter.subscriptions().is_empty());
    }

    #[tokio::test]
    async fn test_release_unsubscribes() {
        let (client, waiter, _rx) = client();
        client.release(&CorrelationTag::budget_tags()).await.unwrap();
        assert_eq!(waiter.unsubscribe_calls(), 1);
    }
}
