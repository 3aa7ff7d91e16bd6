pub mod client;
pub mod server;

use client::*;
use server::*;

/// The `{"event": {...}}` wrapper every wire message travels in.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Envelope<E> {
    pub event: E,
}

impl<E> Envelope<E> {
    pub fn new(event: E) -> Self {
        Self { event }
    }
}

/// Events this client sends, keyed on the wire by their camelCase name.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientEvent {
    SessionStart(SessionStartEvent),
    PromptStart(PromptStartEvent),
    ContentStart(ContentStartEvent),
    TextInput(TextInputEvent),
    AudioInput(AudioInputEvent),
    ContentEnd(ContentEndEvent),
    PromptEnd(PromptEndEvent),
    SessionEnd(SessionEndEvent),
}

impl ClientEvent {
    /// The wire name of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientEvent::SessionStart(_) => "sessionStart",
            ClientEvent::PromptStart(_) => "promptStart",
            ClientEvent::ContentStart(_) => "contentStart",
            ClientEvent::TextInput(_) => "textInput",
            ClientEvent::AudioInput(_) => "audioInput",
            ClientEvent::ContentEnd(_) => "contentEnd",
            ClientEvent::PromptEnd(_) => "promptEnd",
            ClientEvent::SessionEnd(_) => "sessionEnd",
        }
    }
}

/// Events the service sends back.
///
/// Kinds this crate does not model decode as [`ServerEvent::Other`] so that
/// new service events never break an open session.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    ContentStart(ContentStartedEvent),
    TextOutput(TextOutputEvent),
    AudioOutput(AudioOutputEvent),
    ContentEnd(ContentEndedEvent),
    Other {
        kind: String,
        payload: serde_json::Value,
    },
}

impl ServerEvent {
    pub fn kind(&self) -> &str {
        match self {
            ServerEvent::ContentStart(_) => "contentStart",
            ServerEvent::TextOutput(_) => "textOutput",
            ServerEvent::AudioOutput(_) => "audioOutput",
            ServerEvent::ContentEnd(_) => "contentEnd",
            ServerEvent::Other { kind, .. } => kind,
        }
    }
}
