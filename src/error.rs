use sonic_realtime_types::codec::EncodeError;

use crate::client::config::ConfigError;
use crate::client::SessionState;
use crate::device::DeviceError;
use crate::transport::TransportError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The session never reached `Active`. The transport has been released.
    #[error("session startup failed: {0}")]
    Startup(#[source] Box<Error>),

    /// A single outbound event was lost. The session stays open.
    #[error("failed to send {event}: {source}")]
    Send {
        event: &'static str,
        #[source]
        source: TransportError,
    },

    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// The inbound stream ended or failed while the session was active.
    #[error("event stream terminated: {0}")]
    StreamTerminated(String),

    #[error("{operation} is not valid while the session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    #[error("an audio content segment is already open")]
    AudioContentAlreadyOpen,

    #[error("no audio content segment is open")]
    AudioContentNotOpen,

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    pub(crate) fn startup(source: impl Into<Error>) -> Self {
        Error::Startup(Box::new(source.into()))
    }
}
