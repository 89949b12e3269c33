//! TCP transport.
//!
//! Every process listens on its own address-book entry. Each send opens a
//! connection to the peer, writes one [`Envelope`] as a JSON line and closes
//! it. The accept loop pushes every received line into the process inbox.

use crate::address::AddressBook;
use crate::error::{NetworkError, Result, RuntimeError};
use crate::inbox::{Envelope, Inbox};
use crate::network::Transport;
use async_trait::async_trait;
use cbcast_core::ProcessId;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const RETRY_INTERVAL: Duration = Duration::from_millis(200);

/// Transport over plain TCP connections, one connection per message.
pub struct TcpTransport {
    local_id: ProcessId,
    book: AddressBook,
    local_addr: SocketAddr,
    listener: JoinHandle<()>,
}

impl TcpTransport {
    /// Listen on `local_id`'s address and start feeding `inbox`.
    pub async fn bind(local_id: ProcessId, book: AddressBook, inbox: Inbox) -> Result<Self> {
        book.validate_dense()?;
        let address = book.require(local_id)?.to_string();

        let listener = TcpListener::bind(&address).await?;
        let local_addr = listener.local_addr()?;
        info!(process = local_id, %local_addr, "listening");

        let listener = tokio::spawn(accept_loop(local_id, listener, inbox));

        Ok(Self {
            local_id,
            book,
            local_addr,
            listener,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn address_book(&self) -> &AddressBook {
        &self.book
    }

    /// Retry connecting to every peer until all accept or `timeout` passes.
    pub async fn wait_for_peers(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut missing = self.peers();

        loop {
            let mut unreachable = Vec::new();
            for id in missing {
                let address = self.book.require(id)?.to_string();
                if TcpStream::connect(&address).await.is_err() {
                    unreachable.push(id);
                }
            }

            if unreachable.is_empty() {
                info!(process = self.local_id, "all peers reachable");
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(RuntimeError::PeersUnreachable(unreachable));
            }

            debug!(process = self.local_id, waiting = ?unreachable, "peers not up yet");
            tokio::time::sleep(RETRY_INTERVAL).await;
            missing = unreachable;
        }
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn local_id(&self) -> ProcessId {
        self.local_id
    }

    fn peers(&self) -> Vec<ProcessId> {
        self.book
            .ids()
            .into_iter()
            .filter(|id| *id != self.local_id)
            .collect()
    }

    async fn send(&self, to: ProcessId, body: String) -> std::result::Result<(), NetworkError> {
        let address = self
            .book
            .get(to)
            .ok_or(NetworkError::PeerNotFound(to))?
            .to_string();

        let mut line = serde_json::to_string(&Envelope::new(self.local_id, body))
            .map_err(|e| NetworkError::SendFailed(e.to_string()))?;
        line.push('\n');

        let failed = |e: std::io::Error| NetworkError::SendFailed(format!("{}: {}", address, e));
        let mut stream = TcpStream::connect(&address).await.map_err(failed)?;
        stream.write_all(line.as_bytes()).await.map_err(failed)?;
        stream.shutdown().await.map_err(failed)?;
        Ok(())
    }
}

async fn accept_loop(local_id: ProcessId, listener: TcpListener, inbox: Inbox) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let inbox = inbox.clone();
                tokio::spawn(async move {
                    if let Err(e) = read_envelopes(stream, &inbox).await {
                        warn!(process = local_id, %peer, error = %e, "dropping connection");
                    }
                });
            }
            Err(e) => warn!(process = local_id, error = %e, "accept failed"),
        }
    }
}

async fn read_envelopes(stream: TcpStream, inbox: &Inbox) -> Result<()> {
    let mut lines = BufReader::new(stream).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let envelope: Envelope = serde_json::from_str(&line)?;
        inbox.push(envelope);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::ProcessAddress;

    fn free_port() -> u16 {
        std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    fn local_book(n: usize) -> AddressBook {
        let mut book = AddressBook::new();
        for id in 0..n {
            book.insert(id, ProcessAddress {
                host: "127.0.0.1".into(),
                port: free_port(),
            });
        }
        book
    }

    async fn wait_for(inbox: &Inbox, count: usize) {
        for _ in 0..200 {
            if inbox.len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_send_over_tcp() {
        let book = local_book(2);
        let inbox0 = Inbox::new();
        let inbox1 = Inbox::new();
        let t0 = TcpTransport::bind(0, book.clone(), inbox0).await.unwrap();
        let t1 = TcpTransport::bind(1, book, inbox1.clone()).await.unwrap();

        t0.wait_for_peers(Duration::from_secs(2)).await.unwrap();
        assert_eq!(t0.peers(), vec![1]);
        assert_eq!(t1.peers(), vec![0]);

        t0.send(1, "[1, 0]\nhello\nworld".into()).await.unwrap();
        wait_for(&inbox1, 1).await;

        let envelope = inbox1.pop().unwrap();
        assert_eq!(envelope, Envelope::new(0, "[1, 0]\nhello\nworld"));
    }

    #[tokio::test]
    async fn test_send_to_unknown_peer() {
        let book = local_book(1);
        let t0 = TcpTransport::bind(0, book, Inbox::new()).await.unwrap();

        let err = t0.send(5, "[1]".into()).await.unwrap_err();
        assert!(matches!(err, NetworkError::PeerNotFound(5)));
    }

    #[tokio::test]
    async fn test_wait_for_peers_times_out() {
        let book = local_book(2);
        let t0 = TcpTransport::bind(0, book, Inbox::new()).await.unwrap();

        let err = t0
            .wait_for_peers(Duration::from_millis(300))
            .await
            .unwrap_err();
        assert!(matches!(err, RuntimeError::PeersUnreachable(ref ids) if ids == &vec![1]));
    }

    #[tokio::test]
    async fn test_bind_rejects_sparse_book() {
        let mut book = AddressBook::new();
        book.insert(1, ProcessAddress {
            host: "127.0.0.1".into(),
            port: free_port(),
        });

        let err = TcpTransport::bind(1, book, Inbox::new()).await.err().unwrap();
        assert!(matches!(err, RuntimeError::MissingAddress(0)));
    }
}
