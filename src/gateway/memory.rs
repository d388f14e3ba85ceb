//! In-memory transport
//!
//! Connections are channel pairs. Every `open` hands a [`MemoryPeer`] to the
//! paired [`MemoryServer`], which plays the gateway's side of the socket.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use url::Url;

use super::transport::{Connection, FrameSink, FrameSource, Inbound, Transport};
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct Faults {
    refuse_open: AtomicBool,
    fail_sends: AtomicBool,
    opened: AtomicUsize,
}

/// Client side: implements [`Transport`]
#[derive(Clone)]
pub struct MemoryTransport {
    accept_tx: mpsc::UnboundedSender<MemoryPeer>,
    faults: Arc<Faults>,
}

/// Gateway side: yields one peer per opened connection
pub struct MemoryServer {
    accept_rx: mpsc::UnboundedReceiver<MemoryPeer>,
    faults: Arc<Faults>,
}

impl MemoryTransport {
    pub fn pair() -> (MemoryTransport, MemoryServer) {
        let (accept_tx, accept_rx) = mpsc::unbounded_channel();
        let faults = Arc::new(Faults::default());
        (
            MemoryTransport { accept_tx, faults: faults.clone() },
            MemoryServer { accept_rx, faults },
        )
    }
}

impl MemoryServer {
    /// Next connection opened by the client
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.accept_rx.recv().await
    }

    /// Make subsequent `open` calls fail
    pub fn refuse_connections(&self, refuse: bool) {
        self.faults.refuse_open.store(refuse, Ordering::SeqCst);
    }

    /// Make every client send fail
    pub fn fail_sends(&self, fail: bool) {
        self.faults.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Number of `open` attempts seen so far
    pub fn open_attempts(&self) -> usize {
        self.faults.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn open(&self, url: &Url) -> Result<Connection> {
        self.faults.opened.fetch_add(1, Ordering::SeqCst);
        if self.faults.refuse_open.load(Ordering::SeqCst) {
            return Err(Error::Transport(format!("connection refused: {}", url)));
        }

        let (client_tx, client_rx) = mpsc::unbounded_channel();
        let (server_tx, server_rx) = mpsc::unbounded_channel();

        let peer = MemoryPeer {
            url: url.clone(),
            from_client: client_rx,
            to_client: server_tx,
        };
        self.accept_tx
            .send(peer)
            .map_err(|_| Error::Transport("memory server dropped".to_string()))?;

        Ok(Connection {
            sink: Box::new(MemorySink {
                tx: Some(client_tx),
                faults: self.faults.clone(),
            }),
            source: Box::new(MemorySource { rx: server_rx }),
        })
    }
}

/// The gateway's end of one connection
pub struct MemoryPeer {
    url: Url,
    from_client: mpsc::UnboundedReceiver<String>,
    to_client: mpsc::UnboundedSender<Result<Inbound>>,
}

impl MemoryPeer {
    /// URL the client opened
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Next frame sent by the client; `None` once the client has closed
    pub async fn recv(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    /// Frame already sent by the client, without waiting
    pub fn try_recv(&mut self) -> Option<String> {
        self.from_client.try_recv().ok()
    }

    pub fn send_text(&self, text: impl Into<String>) {
        let _ = self.to_client.send(Ok(Inbound::Text(text.into())));
    }

    pub fn send_binary(&self, bytes: impl Into<Vec<u8>>) {
        let _ = self.to_client.send(Ok(Inbound::Binary(bytes.into())));
    }

    /// The client has stopped receiving
    pub fn client_closed(&self) -> bool {
        self.to_client.is_closed()
    }

    /// Deliver a receive error to the client
    pub fn fail(&self, reason: &str) {
        let _ = self.to_client.send(Err(Error::Transport(reason.to_string())));
    }

    /// Close from the gateway side
    pub fn close(self) {
        drop(self);
    }
}

struct MemorySink {
    tx: Option<mpsc::UnboundedSender<String>>,
    faults: Arc<Faults>,
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send(&mut self, text: String) -> Result<()> {
        if self.faults.fail_sends.load(Ordering::SeqCst) {
            return Err(Error::Transport("send failed".to_string()));
        }
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| Error::Transport("socket is closed".to_string()))?;
        tx.send(text)
            .map_err(|_| Error::Transport("peer went away".to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        self.tx = None;
        Ok(())
    }
}

struct MemorySource {
    rx: mpsc::UnboundedReceiver<Result<Inbound>>,
}

#[async_trait]
impl FrameSource for MemorySource {
    async fn next_frame(&mut self) -> Option<Result<Inbound>> {
        self.rx.recv().await
    }
}
