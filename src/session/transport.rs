//! Transport abstraction over the live feed connection
//!
//! The session manager only needs send, close, and a stream of discrete
//! events; everything else about the wire is behind [`Connector`], so tests
//! drive the state machine with an in-memory transport.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::protocol::Message,
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, warn};

use crate::error::{FeedError, Result};

/// Discrete events surfaced by a transport. Connection establishment is the
/// successful return of [`Connector::connect`]; after `Error` or `Closed` no
/// further events follow.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A complete inbound text frame.
    Message(String),
    /// The transport failed.
    Error(String),
    /// The peer closed the connection.
    Closed,
}

#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, payload: String) -> Result<()>;

    async fn close(&mut self);

    /// Wait for the next transport event.
    async fn next_event(&mut self) -> TransportEvent;
}

/// Opens a transport to a venue endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn Transport>>;
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport over tokio-tungstenite.
pub struct WsTransport {
    stream: WsStream,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, payload: String) -> Result<()> {
        self.stream.send(Message::Text(payload)).await?;
        Ok(())
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }

    async fn next_event(&mut self) -> TransportEvent {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    debug!(len = text.len(), "received text frame");
                    return TransportEvent::Message(text);
                }
                Some(Ok(Message::Binary(data))) => {
                    return TransportEvent::Message(String::from_utf8_lossy(&data).to_string());
                }
                Some(Ok(Message::Ping(data))) => {
                    debug!("received ping, sending pong");
                    if self.stream.send(Message::Pong(data)).await.is_err() {
                        return TransportEvent::Error("failed to answer ping".to_string());
                    }
                }
                Some(Ok(Message::Pong(_))) => {
                    debug!("received pong");
                }
                Some(Ok(Message::Close(frame))) => {
                    warn!(frame = ?frame, "received close frame");
                    return TransportEvent::Closed;
                }
                Some(Ok(Message::Frame(_))) => {}
                Some(Err(e)) => {
                    return TransportEvent::Error(e.to_string());
                }
                None => {
                    warn!("websocket stream ended");
                    return TransportEvent::Closed;
                }
            }
        }
    }
}

/// Production connector: dials the venue endpoint over TLS WebSocket.
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn Transport>> {
        let (stream, response) = connect_async(endpoint)
            .await
            .map_err(|e| FeedError::Transport(format!("failed to connect: {e}")))?;
        debug!(status = ?response.status(), "websocket connected");
        Ok(Box::new(WsTransport { stream }))
    }
}
