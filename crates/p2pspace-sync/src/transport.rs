//! Transport abstraction.
//!
//! A transport is an ordered, bidirectional byte channel between two
//! peers. The sync layer treats it as untrusted: it can delay or drop
//! frames but cannot forge signatures, so it can never corrupt a log.
//! WebRTC data channels and relays live with the embedder; the in-memory
//! pair here serves tests.

use async_trait::async_trait;

use crate::error::{Result, SyncError};

/// An ordered byte channel to one peer.
#[async_trait]
pub trait Transport: Send {
    /// Send one frame's bytes. Delivery is ordered per channel.
    async fn send(&self, bytes: Vec<u8>) -> Result<()>;

    /// Receive the next frame's bytes; `None` when the channel closed.
    async fn recv(&mut self) -> Result<Option<Vec<u8>>>;
}

/// In-memory transport connecting two endpoints through tokio channels.
pub mod memory {
    use super::*;
    use tokio::sync::mpsc;

    /// One endpoint of an in-memory duplex link.
    pub struct MemoryTransport {
        tx: mpsc::Sender<Vec<u8>>,
        rx: mpsc::Receiver<Vec<u8>>,
    }

    /// Create a connected pair of endpoints.
    pub fn duplex(capacity: usize) -> (MemoryTransport, MemoryTransport) {
        let (a_tx, b_rx) = mpsc::channel(capacity);
        let (b_tx, a_rx) = mpsc::channel(capacity);
        (
            MemoryTransport { tx: a_tx, rx: a_rx },
            MemoryTransport { tx: b_tx, rx: b_rx },
        )
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn send(&self, bytes: Vec<u8>) -> Result<()> {
            self.tx
                .send(bytes)
                .await
                .map_err(|_| SyncError::TransportClosed)
        }

        async fn recv(&mut self) -> Result<Option<Vec<u8>>> {
            Ok(self.rx.recv().await)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::duplex;
    use super::*;

    #[tokio::test]
    async fn test_duplex_send_recv() {
        let (a, mut b) = duplex(16);
        a.send(b"ping".to_vec()).await.unwrap();
        assert_eq!(b.recv().await.unwrap(), Some(b"ping".to_vec()));
    }

    #[tokio::test]
    async fn test_ordering_preserved() {
        let (a, mut b) = duplex(16);
        for i in 0..5u8 {
            a.send(vec![i]).await.unwrap();
        }
        for i in 0..5u8 {
            assert_eq!(b.recv().await.unwrap(), Some(vec![i]));
        }
    }

    #[tokio::test]
    async fn test_close_yields_none() {
        let (a, mut b) = duplex(16);
        drop(a);
        assert_eq!(b.recv().await.unwrap(), None);
    }
}
