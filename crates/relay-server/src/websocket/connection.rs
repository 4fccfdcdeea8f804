//! WebSocket client connection handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use relay_core::ConnectionId;
use tokio::sync::mpsc;

/// Instruction for a connection's writer task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    /// Send one JSON text frame.
    Frame(Arc<String>),
    /// Send a Close frame and stop writing.
    Close,
}

/// Hub-side handle to a connected WebSocket client.
///
/// Owned by the hub. Dropping it closes the outbound queue, which ends the
/// writer task once queued frames are flushed.
#[derive(Debug)]
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// Send channel to the client's WebSocket write task.
    tx: mpsc::Sender<Outbound>,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Count of frames dropped due to a full or closed channel.
    dropped_messages: AtomicU64,
}

impl ClientConnection {
    /// Create a new connection.
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Outbound>) -> Self {
        Self {
            id,
            tx,
            connected_at: Instant::now(),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Whether the writer task is still accepting frames.
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Queue a text frame for the client.
    ///
    /// Returns `false` if the channel is full or closed, and increments
    /// the dropped message counter. Never blocks.
    pub fn send(&self, frame: Arc<String>) -> bool {
        if self.tx.try_send(Outbound::Frame(frame)).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Ask the writer task to send a Close frame after any queued frames.
    ///
    /// Returns `false` if the request could not be queued; the writer still
    /// stops once the hub drops this handle.
    pub fn close(&self) -> bool {
        self.tx.try_send(Outbound::Close).is_ok()
    }

    /// Total frames dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn make_connection() -> (ClientConnection, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(32);
        (ClientConnection::new(ConnectionId::new(), tx), rx)
    }

    #[tokio::test]
    async fn send_frame_success() {
        let (conn, mut rx) = make_connection();
        assert!(conn.send(Arc::new("hello".into())));
        let out = rx.recv().await.unwrap();
        assert_eq!(out, Outbound::Frame(Arc::new("hello".into())));
    }

    #[tokio::test]
    async fn send_to_closed_channel_returns_false() {
        let (conn, rx) = make_connection();
        drop(rx);
        assert!(!conn.is_open());
        assert!(!conn.send(Arc::new("hello".into())));
        assert_eq!(conn.drop_count(), 1);
    }

    #[tokio::test]
    async fn send_to_full_channel_returns_false() {
        let (tx, _rx) = mpsc::channel(1);
        let conn = ClientConnection::new(ConnectionId::new(), tx);
        assert!(conn.send(Arc::new("msg1".into())));
        // Channel is now full
        assert!(!conn.send(Arc::new("msg2".into())));
        assert_eq!(conn.drop_count(), 1);
        // Full is not closed
        assert!(conn.is_open());
    }

    #[tokio::test]
    async fn close_is_queued_after_frames() {
        let (conn, mut rx) = make_connection();
        assert!(conn.send(Arc::new("bye".into())));
        assert!(conn.close());
        assert_eq!(rx.recv().await.unwrap(), Outbound::Frame(Arc::new("bye".into())));
        assert_eq!(rx.recv().await.unwrap(), Outbound::Close);
    }

    #[tokio::test]
    async fn dropping_handle_ends_writer_queue() {
        let (conn, mut rx) = make_connection();
        drop(conn);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn send_multiple_frames_in_order() {
        let (conn, mut rx) = make_connection();
        for i in 0..5 {
            assert!(conn.send(Arc::new(format!("msg_{i}"))));
        }
        for i in 0..5 {
            assert_eq!(
                rx.recv().await.unwrap(),
                Outbound::Frame(Arc::new(format!("msg_{i}")))
            );
        }
    }

    #[test]
    fn connection_age_increases() {
        let (conn, _rx) = make_connection();
        let age1 = conn.age();
        std::thread::sleep(Duration::from_millis(10));
        assert!(conn.age() > age1);
    }
}
