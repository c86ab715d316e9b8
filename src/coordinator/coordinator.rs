use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, warn};

use crate::agent::{Agent, AgentDescriptor, AgentRegistry, Message};
use crate::error::{AgentBusError, Result};

/// The message bus: the agent registry plus the single dispatch loop.
///
/// Cheap to clone; all clones share one registry and one queue. Construct
/// one instance per bus. There is no process-wide default, so independent
/// buses can coexist in the same process.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    registry: RwLock<AgentRegistry>,
    queue_tx: mpsc::UnboundedSender<Message>,
    queue_rx: Mutex<Option<mpsc::UnboundedReceiver<Message>>>,
    shutdown: watch::Sender<bool>,
    pending: Mutex<HashMap<String, oneshot::Sender<Value>>>,
    correlation_seq: AtomicU64,
}

impl Coordinator {
    pub fn new() -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(CoordinatorInner {
                registry: RwLock::new(AgentRegistry::new()),
                queue_tx,
                queue_rx: Mutex::new(Some(queue_rx)),
                shutdown,
                pending: Mutex::new(HashMap::new()),
                correlation_seq: AtomicU64::new(0),
            }),
        }
    }

    /// Registers `agent` under its descriptor name. Last write wins: an
    /// existing agent under the same name is replaced, not rejected.
    pub fn register_agent(&self, agent: Arc<dyn Agent>) {
        let name = agent.name().to_string();
        let replaced = self.inner.registry.write().insert(agent);
        if replaced.is_some() {
            warn!(%name, "replacing previously registered agent");
        }
    }

    /// Enqueues a message. Returns once the message is queued, not once it
    /// is processed; the queue is unbounded, so this never waits.
    pub fn send_message(&self, message: Message) -> Result<()> {
        self.inner
            .queue_tx
            .send(message)
            .map_err(|_| AgentBusError::QueueClosed)
    }

    /// Enqueues a request and returns a handle that resolves with the
    /// receiver's output once the request has been processed. The reply
    /// envelope still travels the bus as usual; the handle is an
    /// out-of-band delivery path for senders that are not registered
    /// agents themselves.
    pub fn send_request(&self, mut message: Message) -> Result<ResponseHandle> {
        let seq = self.inner.correlation_seq.fetch_add(1, Ordering::Relaxed);
        let correlation_id = format!("req-{seq}");
        message.context.requires_response = true;
        message.context.correlation_id = Some(correlation_id.clone());
        let receiver = message.receiver.clone();

        let (tx, rx) = oneshot::channel();
        self.inner.pending.lock().insert(correlation_id.clone(), tx);
        if let Err(err) = self.send_message(message) {
            self.inner.pending.lock().remove(&correlation_id);
            return Err(err);
        }
        Ok(ResponseHandle { receiver, rx })
    }

    /// Runs the dispatch loop until [`Coordinator::stop`] is observed.
    ///
    /// This is the only queue consumer: messages are routed strictly in
    /// enqueue order, one at a time. The next message is not dequeued
    /// until the current routing call, including the agent's processing,
    /// has returned. Stopping abandons whatever is still queued and
    /// releases the consumer end so the loop can be started again later.
    pub async fn start(&self) -> Result<()> {
        let mut queue_rx = self
            .inner
            .queue_rx
            .lock()
            .take()
            .ok_or(AgentBusError::DispatchLoopRunning)?;
        self.inner.shutdown.send_replace(false);
        let mut shutdown = self.inner.shutdown.subscribe();

        debug!("dispatch loop started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                biased;
                _ = shutdown.changed() => {}
                Some(message) = queue_rx.recv() => {
                    self.route_message(message).await;
                }
            }
        }
        debug!("dispatch loop stopped");

        *self.inner.queue_rx.lock() = Some(queue_rx);
        Ok(())
    }

    /// Requests loop termination. Cooperative: takes effect once any
    /// in-flight routing call completes; remaining queued messages are not
    /// drained. Works while the loop is idle as well.
    pub fn stop(&self) {
        self.inner.shutdown.send_replace(true);
    }

    async fn route_message(&self, message: Message) {
        let agent = self.inner.registry.read().get(&message.receiver).cloned();
        let Some(agent) = agent else {
            warn!(
                receiver = %message.receiver,
                message_type = %message.message_type,
                "no agent registered for receiver, dropping message"
            );
            self.drop_pending(&message);
            return;
        };

        match agent.process(message.content.clone()).await {
            Ok(result) => {
                self.resolve_pending(&message, &result);
                if message.requires_response() {
                    let reply = Message::response_to(&message, result);
                    if self.send_message(reply).is_err() {
                        warn!(receiver = %message.sender, "queue closed while enqueueing response");
                    }
                }
            }
            Err(error) => {
                agent.handle_error(&error).await;
                self.drop_pending(&message);
            }
        }
    }

    fn resolve_pending(&self, message: &Message, result: &Value) {
        let Some(id) = message.context.correlation_id.as_deref() else {
            return;
        };
        if let Some(tx) = self.inner.pending.lock().remove(id) {
            let _ = tx.send(result.clone());
        }
    }

    fn drop_pending(&self, message: &Message) {
        let Some(id) = message.context.correlation_id.as_deref() else {
            return;
        };
        self.inner.pending.lock().remove(id);
    }

    /// Capability set snapshot for every registered agent, keyed by name.
    pub fn capabilities_by_agent(&self) -> HashMap<String, Vec<String>> {
        self.inner.registry.read().capabilities_by_agent()
    }

    /// First registered agent advertising `capability`; linear scan in
    /// registration order, O(agents).
    pub fn find_by_capability(&self, capability: &str) -> Option<Arc<dyn Agent>> {
        self.inner
            .registry
            .read()
            .find_by_capability(capability)
            .cloned()
    }

    pub fn agent(&self, name: &str) -> Option<Arc<dyn Agent>> {
        self.inner.registry.read().get(name).cloned()
    }

    /// Descriptors of all registered agents, in registration order.
    pub fn descriptors(&self) -> Vec<AgentDescriptor> {
        self.inner.registry.read().descriptors()
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Completion handle for a request submitted with
/// [`Coordinator::send_request`].
pub struct ResponseHandle {
    receiver: String,
    rx: oneshot::Receiver<Value>,
}

impl ResponseHandle {
    /// Waits for the receiving agent's output. Fails if the request was
    /// dropped because the receiver is not registered, or if the agent's
    /// processing raised instead of returning a result.
    pub async fn wait(self) -> Result<Value> {
        let ResponseHandle { receiver, rx } = self;
        rx.await
            .map_err(|_| AgentBusError::ResponseDropped(receiver))
    }
}
