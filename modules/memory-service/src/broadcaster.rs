use dashmap::DashMap;
use memory_types::StreamMessage;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Per-subscriber queue depth before messages start being dropped.
const SUBSCRIBER_QUEUE_SIZE: usize = 256;

/// Internal commands sent to the background broadcast task.
enum BroadcastCmd {
    /// Deliver a message to all current subscribers.
    Send(StreamMessage),
    /// Register a subscriber and hand it its first message.
    Subscribe {
        client_id: String,
        sender: mpsc::Sender<StreamMessage>,
        initial: StreamMessage,
    },
    /// Remove a subscriber.
    Unsubscribe(String),
}

/// Fans out document change notifications to every live subscriber.
///
/// `broadcast()` never blocks: messages go through a command channel to a
/// background task that does the per-subscriber delivery. Commands are
/// handled strictly in the order they were sent, so a subscriber registered
/// after a broadcast never receives it, and messages arrive in send order.
pub struct ChangeBroadcaster {
    cmd_tx: mpsc::UnboundedSender<BroadcastCmd>,
    clients: Arc<DashMap<String, mpsc::Sender<StreamMessage>>>,
}

impl ChangeBroadcaster {
    /// Must be called from within a tokio runtime.
    pub fn new() -> Self {
        let clients: Arc<DashMap<String, mpsc::Sender<StreamMessage>>> = Arc::new(DashMap::new());
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        tokio::spawn(Self::run_loop(cmd_rx, clients.clone()));

        Self { cmd_tx, clients }
    }

    /// Register a new subscriber. `initial` is the first message it receives.
    pub fn subscribe(&self, initial: StreamMessage) -> (String, mpsc::Receiver<StreamMessage>) {
        let client_id = Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE_SIZE);

        let _ = self.cmd_tx.send(BroadcastCmd::Subscribe {
            client_id: client_id.clone(),
            sender: tx,
            initial,
        });

        log::debug!("[BROADCAST] Client {} subscribing", client_id);
        (client_id, rx)
    }

    pub fn unsubscribe(&self, client_id: &str) {
        self.clients.remove(client_id);
        let _ = self.cmd_tx.send(BroadcastCmd::Unsubscribe(client_id.to_string()));
        log::debug!("[BROADCAST] Client {} unsubscribed", client_id);
    }

    /// Queue a message for every current subscriber. Returns immediately.
    pub fn broadcast(&self, message: StreamMessage) {
        let _ = self.cmd_tx.send(BroadcastCmd::Send(message));
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    // ── background task ──────────────────────────────────────────────

    async fn run_loop(
        mut cmd_rx: mpsc::UnboundedReceiver<BroadcastCmd>,
        clients: Arc<DashMap<String, mpsc::Sender<StreamMessage>>>,
    ) {
        while let Some(cmd) = cmd_rx.recv().await {
            match cmd {
                BroadcastCmd::Send(message) => {
                    let kind = message.kind();
                    log::debug!("[BROADCAST] '{}' to {} client(s)", kind, clients.len());

                    let mut failed_clients = Vec::new();

                    for entry in clients.iter() {
                        match entry.value().try_send(message.clone()) {
                            Ok(()) => {}
                            Err(mpsc::error::TrySendError::Full(_)) => {
                                log::warn!(
                                    "[BROADCAST] Queue full for client {}, dropping '{}'",
                                    entry.key(),
                                    kind
                                );
                            }
                            Err(mpsc::error::TrySendError::Closed(_)) => {
                                failed_clients.push(entry.key().clone());
                            }
                        }
                    }

                    for client_id in failed_clients {
                        clients.remove(&client_id);
                        log::debug!("[BROADCAST] Removed disconnected client {}", client_id);
                    }
                }
                BroadcastCmd::Subscribe {
                    client_id,
                    sender,
                    initial,
                } => {
                    if sender.try_send(initial).is_err() {
                        log::debug!("[BROADCAST] Client {} gone before initial state", client_id);
                        continue;
                    }
                    clients.insert(client_id, sender);
                }
                BroadcastCmd::Unsubscribe(client_id) => {
                    clients.remove(&client_id);
                }
            }
        }

        log::info!("[BROADCAST] Background broadcast loop shutting down");
    }
}

impl Default for ChangeBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory_types::Document;
    use serde_json::json;

    fn initial() -> StreamMessage {
        StreamMessage::InitialState {
            data: Document::new(),
            timestamp: "t0".to_string(),
        }
    }

    fn ack(n: u64) -> StreamMessage {
        StreamMessage::Ack { received: json!(n) }
    }

    #[tokio::test]
    async fn test_initial_state_then_broadcasts_in_order() {
        let broadcaster = ChangeBroadcaster::new();
        let (_id, mut rx) = broadcaster.subscribe(initial());

        broadcaster.broadcast(ack(1));
        broadcaster.broadcast(ack(2));

        assert_eq!(rx.recv().await.unwrap(), initial());
        assert_eq!(rx.recv().await.unwrap(), ack(1));
        assert_eq!(rx.recv().await.unwrap(), ack(2));
    }

    #[tokio::test]
    async fn test_subscriber_does_not_see_earlier_broadcasts() {
        let broadcaster = ChangeBroadcaster::new();
        broadcaster.broadcast(ack(1));
        let (_id, mut rx) = broadcaster.subscribe(initial());
        broadcaster.broadcast(ack(2));

        assert_eq!(rx.recv().await.unwrap(), initial());
        assert_eq!(rx.recv().await.unwrap(), ack(2));
    }

    #[tokio::test]
    async fn test_closed_subscriber_does_not_block_others() {
        let broadcaster = ChangeBroadcaster::new();
        let (_gone, gone_rx) = broadcaster.subscribe(initial());
        let (_live, mut live_rx) = broadcaster.subscribe(initial());
        assert_eq!(live_rx.recv().await.unwrap(), initial());
        drop(gone_rx);

        broadcaster.broadcast(ack(7));
        assert_eq!(live_rx.recv().await.unwrap(), ack(7));

        // The loop has handled the Send by now; the closed client is pruned.
        broadcaster.broadcast(ack(8));
        assert_eq!(live_rx.recv().await.unwrap(), ack(8));
        assert_eq!(broadcaster.client_count(), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let broadcaster = ChangeBroadcaster::new();
        let (id, mut rx) = broadcaster.subscribe(initial());
        assert_eq!(rx.recv().await.unwrap(), initial());
        assert_eq!(broadcaster.client_count(), 1);

        broadcaster.unsubscribe(&id);
        broadcaster.broadcast(ack(1));
        assert_eq!(broadcaster.client_count(), 0);
        assert!(rx.recv().await.is_none());
    }
}
