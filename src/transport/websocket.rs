use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::client::config::Config;
use crate::client::consts::{AUTHORIZATION_HEADER, MODEL_QUERY_PARAM};
use crate::transport::{Connector, EventSink, EventStream, TransportError};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connects to the conversation service over a WebSocket.
pub struct WsConnector {
    url: String,
    api_key: Option<SecretString>,
}

impl WsConnector {
    pub fn new(config: &Config) -> Result<Self, TransportError> {
        let connector = Self {
            url: request_url(config),
            api_key: config.api_key().map(|key| SecretString::from(key.expose_secret().to_string())),
        };
        // Fail on a bad endpoint here rather than on first connect.
        connector.request().map_err(|e| TransportError::Connect(e.to_string()))?;
        Ok(connector)
    }

    fn request(&self) -> tokio_tungstenite::tungstenite::Result<Request> {
        authorized_request(&self.url, self.api_key.as_ref())
    }
}

fn request_url(config: &Config) -> String {
    let separator = if config.endpoint().contains('?') { '&' } else { '?' };
    format!("{}{}{}={}", config.endpoint(), separator, MODEL_QUERY_PARAM, config.model_id())
}

pub fn build_request(config: &Config) -> tokio_tungstenite::tungstenite::Result<Request> {
    authorized_request(&request_url(config), config.api_key())
}

fn authorized_request(url: &str, api_key: Option<&SecretString>) -> tokio_tungstenite::tungstenite::Result<Request> {
    let mut request = url.into_client_request()?;
    if let Some(api_key) = api_key {
        request.headers_mut()
            .insert(
                AUTHORIZATION_HEADER,
                format!("Bearer {}", api_key.expose_secret()).as_str().parse()?
            );
    }
    Ok(request)
}

#[async_trait::async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<(Box<dyn EventSink>, Box<dyn EventStream>), TransportError> {
        let request = self.request().map_err(|e| TransportError::Connect(e.to_string()))?;
        tracing::debug!("connecting to {}", request.uri());
        let (ws_stream, response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        tracing::debug!("connected, status={}", response.status());

        let (write, read) = ws_stream.split();
        Ok((Box::new(WsSink { write }), Box::new(WsStream { read })))
    }
}

struct WsSink {
    write: SplitSink<Socket, Message>,
}

#[async_trait::async_trait]
impl EventSink for WsSink {
    async fn send(&mut self, bytes: Vec<u8>) -> Result<(), TransportError> {
        let text = String::from_utf8(bytes).map_err(|e| TransportError::Send(e.to_string()))?;
        self.write
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.write
            .close()
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}

struct WsStream {
    read: SplitStream<Socket>,
}

#[async_trait::async_trait]
impl EventStream for WsStream {
    async fn receive(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        while let Some(message) = self.read.next().await {
            let message = message.map_err(|e| TransportError::Receive(e.to_string()))?;
            match message {
                Message::Text(text) => return Ok(Some(text.into_bytes())),
                Message::Binary(bin) => return Ok(Some(bin)),
                Message::Close(reason) => {
                    tracing::info!("connection closed: {:?}", reason);
                    return Ok(None);
                }
                _ => {}
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request() {
        let config = Config::builder()
            .with_endpoint("wss://example.test/stream")
            .with_api_key("secret")
            .with_model_id("sonic-v1")
            .build();
        let request = build_request(&config).unwrap();
        assert_eq!(request.uri().to_string(), "wss://example.test/stream?model=sonic-v1");
        assert_eq!(request.headers().get(AUTHORIZATION_HEADER).unwrap(), "Bearer secret");
    }

    #[test]
    fn test_build_request_keeps_existing_query() {
        let config = Config::builder()
            .with_endpoint("ws://127.0.0.1:9000/stream?region=eu")
            .build();
        let request = build_request(&config).unwrap();
        assert_eq!(request.uri().query(), Some("region=eu&model=amazon.nova-sonic-v1:0"));
        assert!(request.headers().get(AUTHORIZATION_HEADER).is_none());
    }
}
