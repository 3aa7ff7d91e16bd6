//! The bidirectional event stream the session runs over.
//!
//! The session only sees bytes: one encoded envelope per [`EventSink::send`] and
//! one inbound envelope per [`EventStream::receive`].

pub mod websocket;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to connect: {0}")]
    Connect(String),

    #[error("failed to send: {0}")]
    Send(String),

    #[error("failed to receive: {0}")]
    Receive(String),

    #[error("transport is closed")]
    Closed,
}

/// Outbound half. Calls are serialized by the session.
#[async_trait::async_trait]
pub trait EventSink: Send {
    async fn send(&mut self, bytes: Vec<u8>) -> Result<(), TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Inbound half. `Ok(None)` is end-of-stream.
#[async_trait::async_trait]
pub trait EventStream: Send {
    async fn receive(&mut self) -> Result<Option<Vec<u8>>, TransportError>;
}

#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<(Box<dyn EventSink>, Box<dyn EventStream>), TransportError>;
}
