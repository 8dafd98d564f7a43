//! Handle to the live socket's writer task.
//!
//! The connection manager installs a sender when a socket opens and
//! removes it when the socket closes, so "connected" is exactly "a sender
//! is held". All outbound frames go through the single writer task
//! behind that sender, which keeps writes from interleaving.

use ih_domain::error::{Error, Result};
use ih_protocol::OutboundMessage;
use parking_lot::RwLock;
use tokio::sync::mpsc;

/// A frame queued for the writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum OutboundFrame {
    Message(OutboundMessage),
    /// Send a WebSocket close frame and stop writing.
    Close,
}

#[derive(Debug, Default)]
pub(crate) struct SocketLink {
    writer: RwLock<Option<mpsc::Sender<OutboundFrame>>>,
}

impl SocketLink {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn attach(&self, tx: mpsc::Sender<OutboundFrame>) {
        *self.writer.write() = Some(tx);
    }

    /// Drop the writer handle. Returns the previous sender, if any.
    pub(crate) fn detach(&self) -> Option<mpsc::Sender<OutboundFrame>> {
        self.writer.write().take()
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.writer.read().is_some()
    }

    /// Queue a protocol message for the writer task.
    pub(crate) async fn send(&self, msg: OutboundMessage) -> Result<()> {
        // Clone the sender so the lock is not held across the await.
        let tx = self.writer.read().clone().ok_or(Error::NotConnected)?;
        tx.send(OutboundFrame::Message(msg))
            .await
            .map_err(|_| Error::NotConnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(id: &str) -> OutboundMessage {
        OutboundMessage::Subscribe {
            execution_id: id.into(),
        }
    }

    #[tokio::test]
    async fn send_without_writer_is_not_connected() {
        let link = SocketLink::new();
        assert!(!link.is_connected());
        assert!(matches!(link.send(sub("e1")).await, Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn send_reaches_attached_writer() {
        let link = SocketLink::new();
        let (tx, mut rx) = mpsc::channel(4);
        link.attach(tx);
        assert!(link.is_connected());

        link.send(sub("e1")).await.unwrap();
        assert_eq!(rx.recv().await, Some(OutboundFrame::Message(sub("e1"))));
    }

    #[tokio::test]
    async fn dead_writer_is_not_connected() {
        let link = SocketLink::new();
        let (tx, rx) = mpsc::channel(4);
        link.attach(tx);
        drop(rx);

        assert!(matches!(link.send(sub("e1")).await, Err(Error::NotConnected)));
    }

    #[test]
    fn detach_clears_flag() {
        let link = SocketLink::new();
        let (tx, _rx) = mpsc::channel(4);
        link.attach(tx);
        assert!(link.detach().is_some());
        assert!(!link.is_connected());
        assert!(link.detach().is_none());
    }
}
