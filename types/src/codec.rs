//! Conversion between typed events and wire bytes.
//!
//! Encoding goes through serde so user text (system prompts, transcripts) is
//! always escaped. Decoding is lenient about fields but strict about shape: a
//! payload that is not an `{"event": {<kind>: {...}}}` document fails with a
//! [`DecodeError`] that still carries the raw text.

use crate::events::server::{AudioOutputEvent, ContentEndedEvent, ContentStartedEvent, TextOutputEvent};
use crate::events::{ClientEvent, Envelope, ServerEvent};

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("failed to serialize {kind} event: {source}")]
    Serialize {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed event payload: {reason}")]
    Malformed { reason: String, raw: String },
}

impl DecodeError {
    fn malformed(reason: impl ToString, raw: &str) -> Self {
        DecodeError::Malformed {
            reason: reason.to_string(),
            raw: raw.to_string(),
        }
    }

    /// The payload that failed to decode, for diagnostic passthrough.
    pub fn raw(&self) -> &str {
        match self {
            DecodeError::Malformed { raw, .. } => raw,
        }
    }
}

pub fn encode(event: &ClientEvent) -> Result<Vec<u8>, EncodeError> {
    serde_json::to_vec(&Envelope::new(event)).map_err(|source| EncodeError::Serialize {
        kind: event.kind(),
        source,
    })
}

/// Decodes an inbound message.
pub fn decode(bytes: &[u8]) -> Result<ServerEvent, DecodeError> {
    let (text, kind, payload) = split_envelope(bytes)?;
    let event = match kind.as_str() {
        "contentStart" => serde_json::from_value::<ContentStartedEvent>(payload).map(ServerEvent::ContentStart),
        "textOutput" => serde_json::from_value::<TextOutputEvent>(payload).map(ServerEvent::TextOutput),
        "audioOutput" => serde_json::from_value::<AudioOutputEvent>(payload).map(ServerEvent::AudioOutput),
        "contentEnd" => serde_json::from_value::<ContentEndedEvent>(payload).map(ServerEvent::ContentEnd),
        _ => Ok(ServerEvent::Other { kind, payload }),
    };
    event.map_err(|e| DecodeError::malformed(e, text))
}

/// Decodes an outbound message, as a peer would.
pub fn decode_client(bytes: &[u8]) -> Result<ClientEvent, DecodeError> {
    let text = as_text(bytes)?;
    serde_json::from_str::<Envelope<ClientEvent>>(text)
        .map(|envelope| envelope.event)
        .map_err(|e| DecodeError::malformed(e, text))
}

fn as_text(bytes: &[u8]) -> Result<&str, DecodeError> {
    std::str::from_utf8(bytes)
        .map_err(|e| DecodeError::malformed(e, &String::from_utf8_lossy(bytes)))
}

fn split_envelope(bytes: &[u8]) -> Result<(&str, String, serde_json::Value), DecodeError> {
    let text = as_text(bytes)?;
    let envelope: Envelope<serde_json::Map<String, serde_json::Value>> =
        serde_json::from_str(text).map_err(|e| DecodeError::malformed(e, text))?;
    let mut entries = envelope.event.into_iter();
    match (entries.next(), entries.next()) {
        (Some((kind, payload)), None) => Ok((text, kind, payload)),
        _ => Err(DecodeError::malformed("event must hold exactly one kind", text)),
    }
}
