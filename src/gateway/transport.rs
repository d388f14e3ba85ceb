//! Gateway transport
//!
//! One WebSocket connection split into a sending half and a receiving half.
//! No protocol knowledge and no retries live here; the session decides what
//! to send and when to reconnect.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};

/// A frame delivered by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text(String),
    Binary(Vec<u8>),
}

impl Inbound {
    /// Text form of the frame; `None` for binary that is not UTF-8
    pub fn into_text(self) -> Option<String> {
        match self {
            Inbound::Text(text) => Some(text),
            Inbound::Binary(bytes) => String::from_utf8(bytes).ok(),
        }
    }
}

/// Sending half of a connection
#[async_trait]
pub trait FrameSink: Send {
    /// Send one text frame; fails once the socket is closed
    async fn send(&mut self, text: String) -> Result<()>;

    /// Close the connection
    async fn close(&mut self) -> Result<()>;
}

/// Receiving half of a connection
#[async_trait]
pub trait FrameSource: Send {
    /// Wait for the next frame. `None` once the peer has closed.
    async fn next_frame(&mut self) -> Option<Result<Inbound>>;
}

/// An open connection
pub struct Connection {
    pub sink: Box<dyn FrameSink>,
    pub source: Box<dyn FrameSource>,
}

/// Opens connections
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, url: &Url) -> Result<Connection>;
}

// ============================================================================
// WebSocket
// ============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Transport backed by tokio-tungstenite
#[derive(Debug, Clone, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        WebSocketTransport
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self, url: &Url) -> Result<Connection> {
        let (stream, response) = tokio_tungstenite::connect_async(url.as_str()).await?;
        debug!("WebSocket connected: status={}", response.status());

        let (sink, source) = stream.split();
        Ok(Connection {
            sink: Box::new(WsSink { inner: sink, closed: false }),
            source: Box::new(WsSource { inner: source }),
        })
    }
}

struct WsSink {
    inner: SplitSink<WsStream, Message>,
    closed: bool,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send(&mut self, text: String) -> Result<()> {
        if self.closed {
            return Err(Error::Transport("socket is closed".to_string()));
        }
        self.inner.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.inner.send(Message::Close(None)).await?;
        self.inner.close().await?;
        Ok(())
    }
}

struct WsSource {
    inner: SplitStream<WsStream>,
}

#[async_trait]
impl FrameSource for WsSource {
    async fn next_frame(&mut self) -> Option<Result<Inbound>> {
        loop {
            let message = match self.inner.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(e.into())),
            };

            match message {
                Message::Text(text) => return Some(Ok(Inbound::Text(text.as_str().to_owned()))),
                Message::Binary(bytes) => return Some(Ok(Inbound::Binary(bytes.to_vec()))),
                Message::Close(frame) => {
                    debug!("WebSocket closed by peer: {:?}", frame);
                    return None;
                }
                // Control frames are answered by tungstenite itself
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }
}
