use crate::connection::{Connection, ConnectionError};
use async_trait::async_trait;
use ferrite_mcp_wire::Message;
use tokio::sync::{mpsc, Mutex};

/// Two lock-free bounded queues wired to each other, giving each side a
/// [`Connection`] with no serialization in between. Used by tests and by
/// any in-process peer-to-peer pairing (e.g. embedding a client and server
/// in the same binary).
pub struct MemoryConnection {
    tx: mpsc::Sender<Message>,
    rx: Mutex<mpsc::Receiver<Message>>,
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn send(&self, message: Message) -> Result<(), ConnectionError> {
        self.tx.send(message).await.map_err(|_| ConnectionError::Closed)
    }

    async fn recv(&self) -> Result<Option<Message>, ConnectionError> {
        Ok(self.rx.lock().await.recv().await)
    }

    async fn close(&self) {
        // Dropping the sender half happens when `self` itself drops; an
        // explicit close just stops a background forwarder from queuing
        // any more sends by closing the channel we own.
        self.tx.closed().await;
    }
}

/// Builds a connected pair: anything sent on one side's `send` arrives on
/// the other side's `recv`, and vice versa.
pub fn memory_pair(capacity: usize) -> (MemoryConnection, MemoryConnection) {
    let (tx_a, rx_b) = mpsc::channel(capacity);
    let (tx_b, rx_a) = mpsc::channel(capacity);
    (
        MemoryConnection {
            tx: tx_a,
            rx: Mutex::new(rx_a),
        },
        MemoryConnection {
            tx: tx_b,
            rx: Mutex::new(rx_b),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrite_mcp_wire::{Request, RequestId};

    #[tokio::test]
    async fn messages_flow_both_directions() {
        let (a, b) = memory_pair(8);
        let req = Message::Request(Request::new(RequestId::Number(1), "ping", None));
        a.send(req.clone()).await.unwrap();
        assert_eq!(b.recv().await.unwrap(), Some(req.clone()));

        b.send(req.clone()).await.unwrap();
        assert_eq!(a.recv().await.unwrap(), Some(req));
    }

    #[tokio::test]
    async fn recv_returns_none_after_sender_drop() {
        let (a, b) = memory_pair(8);
        drop(a);
        assert_eq!(b.recv().await.unwrap(), None);
    }
}
