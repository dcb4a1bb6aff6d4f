//! Event waiter - suspends a caller until its completion event arrives
//!
//! [`ChannelWaiter`] is an actor that owns the table of pending waits and the
//! inbound event stream. Callers subscribe *before* dispatching, then await
//! the returned [`PendingEvent`].
//!
//! Pairing rules:
//! - an event carrying a `request-id` resumes exactly that waiter
//! - an event without one resumes the oldest waiter on the same tag (FIFO)
//! - an event whose `request-id` nobody waits for is dropped (fire-and-forget commands)
//! - waits whose caller timed out or went away are pruned and never receive an event
//!
//! `subscribe` returns only once the wait is registered, so a reply can never
//! overtake its own subscription.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::messages::{CompletionEvent, RequestId};
use super::tags::CorrelationTag;

/// Errors a waiting caller can resume with
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WaitError {
    #[error("Backend reported failure for {tag}: {message}")]
    Backend { tag: CorrelationTag, message: String },

    #[error("Wait on {0} released by unsubscribe")]
    Unsubscribed(CorrelationTag),

    #[error("Timed out waiting for {0}")]
    Timeout(CorrelationTag),

    #[error("Event waiter channel closed")]
    ChannelClosed,
}

type WaitReply = oneshot::Sender<Result<Value, WaitError>>;

/// Handle to one subscribed wait
#[derive(Debug)]
pub struct PendingEvent {
    tag: CorrelationTag,
    request_id: RequestId,
    rx: oneshot::Receiver<Result<Value, WaitError>>,
    timeout: Option<Duration>,
}

impl PendingEvent {
    /// Wrap a reply receiver
    pub fn new(
        tag: CorrelationTag,
        request_id: RequestId,
        rx: oneshot::Receiver<Result<Value, WaitError>>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            tag,
            request_id,
            rx,
            timeout,
        }
    }

    /// A wait that is already resolved
    pub fn ready(tag: CorrelationTag, request_id: RequestId, result: Result<Value, WaitError>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self::new(tag, request_id, rx, None)
    }

    pub fn tag(&self) -> CorrelationTag {
        self.tag
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Suspend until the completion event arrives
    ///
    /// Without a timeout this waits indefinitely.
    pub async fn wait(self) -> Result<Value, WaitError> {
        debug!(tag = %self.tag, request_id = %self.request_id, "PendingEvent::wait: called");
        let received = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.rx)
                .await
                .map_err(|_| WaitError::Timeout(self.tag))?,
            None => self.rx.await,
        };
        received.map_err(|_| WaitError::ChannelClosed)?
    }
}

/// Subscription side of the correlation layer
#[async_trait]
pub trait EventWaiter: Send + Sync {
    /// Register interest in the completion event for `request_id` on `tag`
    async fn subscribe(&self, tag: CorrelationTag, request_id: RequestId) -> Result<PendingEvent, WaitError>;

    /// Release every pending wait registered under `tags`
    async fn unsubscribe(&self, tags: &[CorrelationTag]) -> Result<(), WaitError>;
}

/// Counters exposed by the waiter actor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WaiterMetrics {
    pub pending: usize,
    pub delivered: u64,
    pub unmatched: u64,
    pub malformed: u64,
    pub released: u64,
    pub abandoned: u64,
}

/// Pending waits indexed by request id, with per-tag FIFO order
#[derive(Default)]
struct PendingTable {
    by_request: HashMap<RequestId, (CorrelationTag, WaitReply)>,
    by_tag: HashMap<CorrelationTag, VecDeque<RequestId>>,
}

impl PendingTable {
    fn insert(&mut self, tag: CorrelationTag, request_id: RequestId, reply: WaitReply) {
        self.by_request.insert(request_id, (tag, reply));
        self.by_tag.entry(tag).or_default().push_back(request_id);
    }

    /// Remove the waiter an event belongs to
    ///
    /// Without a request id, waits whose receiver is gone are discarded on
    /// the way to the oldest live one.
    fn take(&mut self, tag: CorrelationTag, request_id: Option<RequestId>) -> Option<WaitReply> {
        let Some(request_id) = request_id else {
            let queue = self.by_tag.get_mut(&tag)?;
            while let Some(id) = queue.pop_front() {
                match self.by_request.remove(&id) {
                    Some((_, reply)) if !reply.is_closed() => return Some(reply),
                    _ => continue,
                }
            }
            return None;
        };
        let (registered_tag, reply) = self.by_request.remove(&request_id)?;
        if let Some(queue) = self.by_tag.get_mut(&registered_tag) {
            queue.retain(|id| *id != request_id);
        }
        Some(reply)
    }

    /// Drop every wait whose receiver is gone, returning how many were removed
    fn prune(&mut self) -> usize {
        let before = self.by_request.len();
        self.by_request.retain(|_, (_, reply)| !reply.is_closed());
        let by_request = &self.by_request;
        for queue in self.by_tag.values_mut() {
            queue.retain(|id| by_request.contains_key(id));
        }
        self.by_tag.retain(|_, queue| !queue.is_empty());
        before - by_request.len()
    }

    /// Remove every waiter registered under `tag`
    fn drain_tag(&mut self, tag: CorrelationTag) -> Vec<WaitReply> {
        let ids = self.by_tag.remove(&tag).unwrap_or_default();
        ids.into_iter()
            .filter_map(|id| self.by_request.remove(&id).map(|(_, reply)| reply))
            .collect()
    }

    fn drain_all(&mut self) -> Vec<WaitReply> {
        self.by_tag.clear();
        self.by_request.drain().map(|(_, (_, reply))| reply).collect()
    }

    fn len(&self) -> usize {
        self.by_request.len()
    }
}

/// Requests handled by the waiter actor
enum WaiterRequest {
    Subscribe {
        tag: CorrelationTag,
        request_id: RequestId,
        reply_tx: WaitReply,
        registered_tx: oneshot::Sender<()>,
    },
    Unsubscribe {
        tags: Vec<CorrelationTag>,
        done_tx: oneshot::Sender<()>,
    },
    GetMetrics {
        reply_tx: oneshot::Sender<WaiterMetrics>,
    },
    Shutdown,
}

/// Actor-backed [`EventWaiter`] listening on the inbound IPC event queue
#[derive(Clone)]
pub struct ChannelWaiter {
    tx: mpsc::Sender<WaiterRequest>,
    timeout: Option<Duration>,
}

impl ChannelWaiter {
    /// Spawn the waiter actor over the inbound event queue
    pub fn spawn(events: mpsc::UnboundedReceiver<String>, buffer: usize, timeout: Option<Duration>) -> Self {
        debug!(buffer, ?timeout, "ChannelWaiter::spawn: called");
        let (tx, rx) = mpsc::channel(buffer.max(1));
        tokio::spawn(actor_loop(rx, events));
        info!("ChannelWaiter spawned");
        Self { tx, timeout }
    }

    /// Get current waiter metrics
    pub async fn metrics(&self) -> Result<WaiterMetrics, WaitError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(WaiterRequest::GetMetrics { reply_tx })
            .await
            .map_err(|_| WaitError::ChannelClosed)?;
        reply_rx.await.map_err(|_| WaitError::ChannelClosed)
    }

    /// Stop the actor; every pending wait resumes with `ChannelClosed`
    pub async fn shutdown(&self) -> Result<(), WaitError> {
        debug!("ChannelWaiter::shutdown: called");
        self.tx
            .send(WaiterRequest::Shutdown)
            .await
            .map_err(|_| WaitError::ChannelClosed)
    }
}

#[async_trait]
impl EventWaiter for ChannelWaiter {
    async fn subscribe(&self, tag: CorrelationTag, request_id: RequestId) -> Result<PendingEvent, WaitError> {
        debug!(%tag, %request_id, "ChannelWaiter::subscribe: called");
        let (reply_tx, reply_rx) = oneshot::channel();
        let (registered_tx, registered_rx) = oneshot::channel();
        self.tx
            .send(WaiterRequest::Subscribe {
                tag,
                request_id,
                reply_tx,
                registered_tx,
            })
            .await
            .map_err(|_| WaitError::ChannelClosed)?;

        // The wait must be in the table before the caller dispatches
        registered_rx.await.map_err(|_| WaitError::ChannelClosed)?;
        Ok(PendingEvent::new(tag, request_id, reply_rx, self.timeout))
    }

    async fn unsubscribe(&self, tags: &[CorrelationTag]) -> Result<(), WaitError> {
        debug!(?tags, "ChannelWaiter::unsubscribe: called");
        let (done_tx, done_rx) = oneshot::channel();
        self.tx
            .send(WaiterRequest::Unsubscribe {
                tags: tags.to_vec(),
                done_tx,
            })
            .await
            .map_err(|_| WaitError::ChannelClosed)?;
        done_rx.await.map_err(|_| WaitError::ChannelClosed)
    }
}

async fn actor_loop(mut rx: mpsc::Receiver<WaiterRequest>, mut events: mpsc::UnboundedReceiver<String>) {
    let mut pending = PendingTable::default();
    let mut metrics = WaiterMetrics::default();
    let mut events_open = true;

    loop {
        tokio::select! {
            req = rx.recv() => match req {
                Some(WaiterRequest::Subscribe { tag, request_id, reply_tx, registered_tx }) => {
                    if events_open {
                        debug!(%tag, %request_id, "Registering waiter");
                        metrics.abandoned += pending.prune() as u64;
                        pending.insert(tag, request_id, reply_tx);
                    } else {
                        let _ = reply_tx.send(Err(WaitError::ChannelClosed));
                    }
                    let _ = registered_tx.send(());
                }
                Some(WaiterRequest::Unsubscribe { tags, done_tx }) => {
                    for tag in tags {
                        for reply in pending.drain_tag(tag) {
                            let _ = reply.send(Err(WaitError::Unsubscribed(tag)));
                            metrics.released += 1;
                        }
                    }
                    let _ = done_tx.send(());
                }
                Some(WaiterRequest::GetMetrics { reply_tx }) => {
                    metrics.abandoned += pending.prune() as u64;
                    metrics.pending = pending.len();
                    let _ = reply_tx.send(metrics.clone());
                }
                Some(WaiterRequest::Shutdown) | None => {
                    info!("ChannelWaiter shutting down");
                    break;
                }
            },
            line = events.recv(), if events_open => match line {
                Some(line) => deliver(&mut pending, &mut metrics, &line),
                None => {
                    warn!(pending = pending.len(), "Inbound event channel closed, failing pending waits");
                    events_open = false;
                    for reply in pending.drain_all() {
                        let _ = reply.send(Err(WaitError::ChannelClosed));
                    }
                }
            },
        }
    }
}

fn deliver(pending: &mut PendingTable, metrics: &mut WaiterMetrics, line: &str) {
    let event: CompletionEvent = match serde_json::from_str(line) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Dropping malformed completion event");
            metrics.malformed += 1;
            return;
        }
    };

    let tag = event.tag;
    let request_id = event.request_id;
    let mut outcome = event
        .into_outcome()
        .map_err(|message| WaitError::Backend { tag, message });

    loop {
        let Some(reply) = pending.take(tag, request_id) else {
            debug!(%tag, ?request_id, "No waiter for completion event");
            metrics.unmatched += 1;
            return;
        };
        match reply.send(outcome) {
            Ok(()) => {
                metrics.delivered += 1;
                return;
            }
            Err(returned) => {
                debug!(%tag, ?request_id, "Waiter gone before delivery");
                metrics.abandoned += 1;
                if request_id.is_some() {
                    return;
                }
                // Fall through to the next waiter on the tag
                outcome = returned;
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event_line(event: &CompletionEvent) -> String {
        serde_json::to_string(event).unwrap()
    }

    #[test]
    fn test_pending_table_fifo_without_request_id() {
        let mut table = PendingTable::default();
        let (tx1, mut rx1) = oneshot::channel();
        let (tx2, mut rx2) = oneshot::channel();
        table.insert(CorrelationTag::UpdateBudget, RequestId::new(), tx1);
        table.insert(CorrelationTag::UpdateBudget, RequestId::new(), tx2);

        let first = table.take(CorrelationTag::UpdateBudget, None).unwrap();
        first.send(Ok(json!(1))).unwrap();
        assert_eq!(rx1.try_recv().unwrap(), Ok(json!(1)));
        assert!(rx2.try_recv().is_err());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_pending_table_take_by_request_id_keeps_queue_consistent() {
        let mut table = PendingTable::default();
        let first_id = RequestId::new();
        let second_id = RequestId::new();
        let (tx1, _rx1) = oneshot::channel();
        let (tx2, _rx2) = oneshot::channel();
        table.insert(CorrelationTag::UpdateBudget, first_id, tx1);
        table.insert(CorrelationTag::UpdateBudget, second_id, tx2);

        assert!(table.take(CorrelationTag::UpdateBudget, Some(second_id)).is_some());
        // FIFO fallback now resolves to the remaining waiter
        assert!(table.take(CorrelationTag::UpdateBudget, None).is_some());
        assert!(table.take(CorrelationTag::UpdateBudget, None).is_none());
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_pending_table_fifo_skips_closed_waiters() {
        let mut table = PendingTable::default();
        let (tx1, rx1) = oneshot::channel();
        let (tx2, mut rx2) = oneshot::channel();
        table.insert(CorrelationTag::UpdateBudget, RequestId::new(), tx1);
        table.insert(CorrelationTag::UpdateBudget, RequestId::new(), tx2);
        drop(rx1);

        let live = table.take(CorrelationTag::UpdateBudget, None).unwrap();
        live.send(Ok(json!("x"))).unwrap();
        assert_eq!(rx2.try_recv().unwrap(), Ok(json!("x")));
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_pending_table_prune_removes_closed_waiters() {
        let mut table = PendingTable::default();
        let (tx1, rx1) = oneshot::channel();
        let (tx2, _rx2) = oneshot::channel();
        let kept = RequestId::new();
        table.insert(CorrelationTag::ReadAll, RequestId::new(), tx1);
        table.insert(CorrelationTag::ReadAll, kept, tx2);
        drop(rx1);

        assert_eq!(table.prune(), 1);
        assert_eq!(table.len(), 1);
        assert!(table.take(CorrelationTag::ReadAll, Some(kept)).is_some());
        assert!(table.take(CorrelationTag::ReadAll, None).is_none());
    }

    #[test]
    fn test_pending_table_unknown_request_id() {
        let mut table = PendingTable::default();
        let (tx, _rx) = oneshot::channel();
        table.insert(CorrelationTag::ReadAll, RequestId::new(), tx);
        assert!(table.take(CorrelationTag::ReadAll, Some(RequestId::new())).is_none());
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn test_pending_event_ready() {
        let pending = PendingEvent::ready(CorrelationTag::ReadAll, RequestId::new(), Ok(json!([])));
        assert_eq!(pending.wait().await, Ok(json!([])));
    }

    #[tokio::test]
    async fn test_pending_event_timeout() {
        let (_tx, rx) = oneshot::channel();
        let pending = PendingEvent::new(
            CorrelationTag::CreateBudget,
            RequestId::new(),
            rx,
            Some(Duration::from_millis(20)),
        );
        assert_eq!(pending.wait().await, Err(WaitError::Timeout(CorrelationTag::CreateBudget)));
    }

    #[tokio::test]
    async fn test_channel_waiter_resumes_matching_request() {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let waiter = ChannelWaiter::spawn(event_rx, 16, None);

        let first = RequestId::new();
        let second = RequestId::new();
        let pending_first = waiter.subscribe(CorrelationTag::UpdateBudget, first).await.unwrap();
        let pending_second = waiter.subscribe(CorrelationTag::UpdateBudget, second).await.unwrap();

        // Answer out of order
        event_tx
            .send(event_line(&CompletionEvent::success(
                CorrelationTag::UpdateBudget,
                Some(second),
                json!("second"),
            )))
            .unwrap();
        event_tx
            .send(event_line(&CompletionEvent::success(
                CorrelationTag::UpdateBudget,
                Some(first),
                json!("first"),
            )))
            .unwrap();

        assert_eq!(pending_second.wait().await, Ok(json!("second")));
        assert_eq!(pending_first.wait().await, Ok(json!("first")));
    }

    #[tokio::test]
    async fn test_channel_waiter_timed_out_wait_does_not_swallow_next_event() {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let waiter = ChannelWaiter::spawn(event_rx, 16, Some(Duration::from_millis(100)));

        let stale = waiter
            .subscribe(CorrelationTag::UpdateBudget, RequestId::new())
            .await
            .unwrap();
        assert_eq!(stale.wait().await, Err(WaitError::Timeout(CorrelationTag::UpdateBudget)));
        assert_eq!(waiter.metrics().await.unwrap().pending, 0);

        let live = waiter
            .subscribe(CorrelationTag::UpdateBudget, RequestId::new())
            .await
            .unwrap();
        event_tx
            .send(event_line(&CompletionEvent::success(CorrelationTag::UpdateBudget, None, json!("x"))))
            .unwrap();
        assert_eq!(live.wait().await, Ok(json!("x")));

        let metrics = waiter.metrics().await.unwrap();
        assert_eq!(metrics.pending, 0);
        assert_eq!(metrics.delivered, 1);
        assert_eq!(metrics.abandoned, 1);
    }

    #[tokio::test]
    async fn test_channel_waiter_dropped_wait_is_skipped() {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let waiter = ChannelWaiter::spawn(event_rx, 16, None);

        let dropped = waiter.subscribe(CorrelationTag::ReadAll, RequestId::new()).await.unwrap();
        let live = waiter.subscribe(CorrelationTag::ReadAll, RequestId::new()).await.unwrap();
        drop(dropped);

        event_tx
            .send(event_line(&CompletionEvent::success(CorrelationTag::ReadAll, None, json!([]))))
            .unwrap();
        assert_eq!(live.wait().await, Ok(json!([])));
        assert_eq!(waiter.metrics().await.unwrap().delivered, 1);
    }

    #[tokio::test]
    async fn test_channel_waiter_backend_failure() {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let waiter = ChannelWaiter::spawn(event_rx, 16, None);

        let id = RequestId::new();
        let pending = waiter.subscribe(CorrelationTag::RemoveBudget, id).await.unwrap();
        event_tx
            .send(event_line(&CompletionEvent::failure(
                CorrelationTag::RemoveBudget,
                Some(id),
                "locked",
            )))
            .unwrap();

        assert_eq!(
            pending.wait().await,
            Err(WaitError::Backend {
                tag: CorrelationTag::RemoveBudget,
                message: "locked".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_channel_waiter_unsubscribe_releases_waits() {
        let (_event_tx, event_rx) = mpsc::unbounded_channel();
        let waiter = ChannelWaiter::spawn(event_rx, 16, None);

        let pending = waiter.subscribe(CorrelationTag::ReadAll, RequestId::new()).await.unwrap();
        let other = waiter
            .subscribe(CorrelationTag::StockAdjust, RequestId::new())
            .await
            .unwrap();
        waiter.unsubscribe(CorrelationTag::budget_tags()).await.unwrap();

        assert_eq!(pending.wait().await, Err(WaitError::Unsubscribed(CorrelationTag::ReadAll)));

        let metrics = waiter.metrics().await.unwrap();
        assert_eq!(metrics.released, 1);
        assert_eq!(metrics.pending, 1);
        drop(other);
    }

    #[tokio::test]
    async fn test_channel_waiter_counts_unmatched_and_malformed() {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let waiter = ChannelWaiter::spawn(event_rx, 16, None);

        event_tx.send("{not json".to_string()).unwrap();
        event_tx
            .send(event_line(&CompletionEvent::success(
                CorrelationTag::UpdateBudget,
                Some(RequestId::new()),
                json!(null),
            )))
            .unwrap();

        // A round trip through the actor guarantees the events above were handled
        let id = RequestId::new();
        let pending = waiter.subscribe(CorrelationTag::ReadAll, id).await.unwrap();
        event_tx
            .send(event_line(&CompletionEvent::success(CorrelationTag::ReadAll, Some(id), json!([]))))
            .unwrap();
        pending.wait().await.unwrap();

        let metrics = waiter.metrics().await.unwrap();
        assert_eq!(metrics.malformed, 1);
        assert_eq!(metrics.unmatched, 1);
        assert_eq!(metrics.delivered, 1);
    }

    #[tokio::test]
    async fn test_channel_waiter_fails_waits_when_events_close() {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let waiter = ChannelWaiter::spawn(event_rx, 16, None);

        let pending = waiter.subscribe(CorrelationTag::ReadAll, RequestId::new()).await.unwrap();
        drop(event_tx);

        assert_eq!(pending.wait().await, Err(WaitError::ChannelClosed));
        let late = waiter.subscribe(CorrelationTag::ReadAll, RequestId::new()).await.unwrap();
        assert_eq!(late.wait().await, Err(WaitError::ChannelClosed));
    }

    #[tokio::test]
    async fn test_channel_waiter_shutdown() {
        let (_event_tx, event_rx) = mpsc::unbounded_channel();
        let waiter = ChannelWaiter::spawn(event_rx, 16, None);
        let pending = waiter.subscribe(CorrelationTag::ReadAll, RequestId::new()).await.unwrap();

        waiter.shutdown().await.unwrap();
        assert_eq!(pending.wait().await, Err(WaitError::ChannelClosed));
    }
}
