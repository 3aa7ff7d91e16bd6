pub mod capture;
pub mod client;
pub mod device;
mod dispatcher;
mod error;
pub mod playback;
pub mod streamer;
pub mod transport;

pub use sonic_realtime_types as types;
pub use client::config::{Config, ConfigBuilder, ConfigError};
pub use client::{Client, SessionEvent, SessionIds, SessionState};
pub use dispatcher::DisplayState;
pub use error::{Error, Result};
pub use streamer::Streamer;

#[cfg(feature = "utils")]
pub use sonic_realtime_utils as utils;

/// Connects over WebSocket and runs the session handshake.
pub async fn connect(config: Config) -> Result<Client> {
    let connector = transport::websocket::WsConnector::new(&config).map_err(Error::startup)?;
    let client = Client::new(config, connector);
    client.start().await?;
    Ok(client)
}
