use crate::event_store::{EventStore, StoredEvent};
use crate::session::SessionId;
use async_trait::async_trait;
use ferrite_mcp_transport_traits::{Connection, ConnectionError};
use ferrite_mcp_wire::Message;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};

/// A single HTTP session's [`Connection`]. Inbound messages arrive from
/// decoded POST bodies via [`Self::deliver`]; outbound messages sent by the
/// `Peer` driving this session fan out to every currently-attached reader
/// (the GET long-poll stream, an in-flight POST awaiting its own batch's
/// responses) and are retained in the session's [`EventStore`] stream so a
/// reconnecting GET can replay what it missed.
///
/// Unlike a stdio or in-memory connection, this one never owns the
/// transport — axum's handlers do. This type is just the mailbox the two
/// sides hand messages through.
pub struct HttpSessionConnection {
    id: SessionId,
    inbox_tx: mpsc::Sender<Message>,
    inbox_rx: Mutex<mpsc::Receiver<Message>>,
    outbound: broadcast::Sender<StoredEvent>,
    events: Arc<EventStore>,
    closed: AtomicBool,
}

impl HttpSessionConnection {
    pub fn new(id: SessionId, events: Arc<EventStore>, inbox_capacity: usize, outbound_capacity: usize) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::channel(inbox_capacity);
        let (outbound, _) = broadcast::channel(outbound_capacity);
        Self {
            id,
            inbox_tx,
            inbox_rx: Mutex::new(inbox_rx),
            outbound,
            events,
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Hands a message decoded from an inbound POST body to this session's
    /// `Peer` for its next `recv()`. Fails only once the session is closed.
    pub async fn deliver(&self, message: Message) -> Result<(), ConnectionError> {
        self.inbox_tx.send(message).await.map_err(|_| ConnectionError::Closed)
    }

    /// Subscribes to every message the `Peer` sends from this point on,
    /// tagged with the sequence number it was retained under. Callers must
    /// subscribe before triggering whatever inbound request they expect a
    /// response to, so no reply sent in the gap is missed.
    pub fn subscribe(&self) -> broadcast::Receiver<StoredEvent> {
        self.outbound.subscribe()
    }

    pub fn event_store(&self) -> &Arc<EventStore> {
        &self.events
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Connection for HttpSessionConnection {
    async fn send(&self, message: Message) -> Result<(), ConnectionError> {
        let seq = self.events.append(self.id.as_ref(), message.clone());
        // No receiver currently attached (every POST for this batch already
        // answered, no GET stream open) is not an error — the event store
        // retains it for the next GET reconnect.
        let _ = self.outbound.send(StoredEvent { seq, message });
        Ok(())
    }

    async fn recv(&self) -> Result<Option<Message>, ConnectionError> {
        if self.closed.load(Ordering::Acquire) {
            return Ok(None);
        }
        Ok(self.inbox_rx.lock().await.recv().await)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.events.close(self.id.as_ref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrite_mcp_wire::Notification;

    #[tokio::test]
    async fn delivered_messages_surface_through_recv() {
        let conn = HttpSessionConnection::new(SessionId::new(), Arc::new(EventStore::new(8)), 4, 4);
        conn.deliver(Message::Notification(Notification::new("ping", None))).await.unwrap();
        let received = conn.recv().await.unwrap().unwrap();
        assert_eq!(received.method(), Some("ping"));
    }

    #[tokio::test]
    async fn sent_messages_fan_out_to_subscribers_and_the_event_store() {
        let conn = HttpSessionConnection::new(SessionId::new(), Arc::new(EventStore::new(8)), 4, 4);
        let mut sub = conn.subscribe();
        conn.send(Message::Notification(Notification::new("pushed", None))).await.unwrap();
        let seen = sub.recv().await.unwrap();
        assert_eq!(seen.message.method(), Some("pushed"));
        assert_eq!(seen.seq, 0);
        assert!(conn.event_store().since(conn.id().as_ref(), 0).is_some());
    }

    #[tokio::test]
    async fn close_marks_recv_done_and_drops_retained_events() {
        let conn = HttpSessionConnection::new(SessionId::new(), Arc::new(EventStore::new(8)), 4, 4);
        conn.send(Message::Notification(Notification::new("a", None))).await.unwrap();
        conn.close().await;
        assert!(conn.recv().await.unwrap().is_none());
        assert!(conn.event_store().since(conn.id().as_ref(), 0).is_none());
    }
}
