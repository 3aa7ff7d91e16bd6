use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use sonic_realtime_types::audio::{self, AudioInputConfiguration, AudioOutputConfiguration};
use sonic_realtime_types::events::client::*;
use sonic_realtime_types::{codec, ClientEvent, Role, ServerEvent};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::config::Config;
use crate::client::stats::Stats;
use crate::dispatcher::{DispatchExit, Dispatcher};
use crate::error::{Error, Result};
use crate::playback::PlaybackQueue;
use crate::transport::{Connector, EventSink, EventStream, TransportError};

pub mod config;
pub(crate) mod consts;
pub mod stats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Initializing,
    Active,
    Closing,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Created => "created",
            SessionState::Initializing => "initializing",
            SessionState::Active => "active",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Everything the session observes on the inbound stream.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Server(ServerEvent),
    /// Text that passed the display rules.
    Transcript { role: Role, text: String },
    /// An inbound message that could not be decoded, as received.
    Raw(String),
    /// The inbound stream ended while the session was active.
    Terminated(String),
}

/// Identifiers shared by every event of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIds {
    pub prompt_name: String,
    pub content_name: String,
    pub audio_content_name: String,
}

impl SessionIds {
    fn generate() -> Self {
        Self {
            prompt_name: uuid::Uuid::new_v4().to_string(),
            content_name: uuid::Uuid::new_v4().to_string(),
            audio_content_name: uuid::Uuid::new_v4().to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct Segments {
    session: bool,
    prompt: bool,
    audio: bool,
}

/// The outbound half of the transport and what has been opened on it.
/// Holding the lock serializes writes.
#[derive(Default)]
struct Wire {
    sink: Option<Box<dyn EventSink>>,
    segments: Segments,
}

struct Inner {
    config: Config,
    connector: Box<dyn Connector>,
    ids: SessionIds,
    state: watch::Sender<SessionState>,
    events: broadcast::Sender<SessionEvent>,
    wire: tokio::sync::Mutex<Wire>,
    reader: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
    close_started: AtomicBool,
    termination: Mutex<Option<String>>,
    playback: Arc<PlaybackQueue>,
    stats: Arc<Mutex<Stats>>,
}

impl Inner {
    fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    fn set_state(&self, next: SessionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            tracing::info!("session {} -> {}", previous, next);
        }
    }

    /// Moves `from` -> `to`, returning false if the session was elsewhere.
    fn transition(&self, from: SessionState, to: SessionState) -> bool {
        let moved = self.state.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        });
        if moved {
            tracing::info!("session {} -> {}", from, to);
        }
        moved
    }

    fn stats(&self) -> std::sync::MutexGuard<'_, Stats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn send_locked(&self, wire: &mut Wire, event: &ClientEvent) -> Result<()> {
        let bytes = codec::encode(event)?;
        let size = bytes.len();
        let sink = wire.sink.as_mut().ok_or(Error::Transport(TransportError::Closed))?;
        match sink.send(bytes).await {
            Ok(()) => {
                tracing::trace!("sent {} ({} bytes)", event.kind(), size);
                self.stats().record_sent(event.kind());
                Ok(())
            }
            Err(source) => {
                self.stats().record_send_failure();
                Err(Error::Send {
                    event: event.kind(),
                    source,
                })
            }
        }
    }

    fn init_events(&self) -> [ClientEvent; 5] {
        let ids = &self.ids;
        [
            ClientEvent::SessionStart(SessionStartEvent::new(self.config.inference().clone())),
            ClientEvent::PromptStart(PromptStartEvent::new(
                &ids.prompt_name,
                AudioOutputConfiguration::speech(self.config.voice_id(), self.config.output_sample_rate()),
            )),
            ClientEvent::ContentStart(ContentStartEvent::text(&ids.prompt_name, &ids.content_name, Role::System)),
            ClientEvent::TextInput(TextInputEvent::new(&ids.prompt_name, &ids.content_name, self.config.system_prompt())),
            ClientEvent::ContentEnd(ContentEndEvent::new(&ids.prompt_name, &ids.content_name)),
        ]
    }

    /// Called by the reader when the stream ends underneath an active session.
    fn terminate(&self, reason: String) {
        let moved = self.state.send_if_modified(|state| {
            if *state != SessionState::Active {
                return false;
            }
            *self.termination.lock().unwrap_or_else(PoisonError::into_inner) = Some(reason.clone());
            *state = SessionState::Closing;
            true
        });
        if moved {
            tracing::error!("session terminated: {}", reason);
            let _ = self.events.send(SessionEvent::Terminated(reason));
        }
    }

    /// Teardown steps run in `Active` and `Closing`; elsewhere they are skipped.
    fn accepts_teardown(&self, operation: &str) -> bool {
        let state = self.state();
        let accepts = matches!(state, SessionState::Active | SessionState::Closing);
        if !accepts {
            tracing::info!("{} ignored, session is {}", operation, state);
        }
        accepts
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn close_sink(mut sink: Box<dyn EventSink>) {
    if let Err(e) = sink.close().await {
        tracing::warn!("failed to close transport: {}", e);
    }
}

/// One conversation with the service.
///
/// Cheap to clone; clones share the session.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl Client {
    pub fn new(config: Config, connector: impl Connector + 'static) -> Self {
        let (state, _) = watch::channel(SessionState::Created);
        let (events, _) = broadcast::channel(config.event_capacity().max(1));
        Self {
            inner: Arc::new(Inner {
                ids: SessionIds::generate(),
                connector: Box::new(connector),
                state,
                events,
                wire: tokio::sync::Mutex::new(Wire::default()),
                reader: Mutex::new(None),
                cancel: CancellationToken::new(),
                close_started: AtomicBool::new(false),
                termination: Mutex::new(None),
                playback: Arc::new(PlaybackQueue::new()),
                stats: Arc::new(Mutex::new(Stats::new())),
                config,
            }),
        }
    }

    /// Connects and runs the handshake. The session is `Active` only if every
    /// handshake event was sent; otherwise the transport is closed again and the
    /// session ends up `Closed`.
    pub async fn start(&self) -> Result<()> {
        let inner = &self.inner;
        if !inner.transition(SessionState::Created, SessionState::Initializing) {
            return Err(Error::InvalidState {
                operation: "start",
                state: inner.state(),
            });
        }

        let (sink, stream) = match inner.connector.connect().await {
            Ok(halves) => halves,
            Err(e) => {
                tracing::error!("failed to connect: {}", e);
                inner.set_state(SessionState::Closed);
                return Err(Error::startup(e));
            }
        };

        let mut wire = inner.wire.lock().await;
        if inner.state() != SessionState::Initializing {
            // close() ran while connecting and already finished its teardown.
            close_sink(sink).await;
            return Err(Error::InvalidState {
                operation: "start",
                state: inner.state(),
            });
        }
        wire.sink = Some(sink);
        for event in inner.init_events() {
            if let Err(e) = inner.send_locked(&mut wire, &event).await {
                tracing::error!("session handshake failed: {}", e);
                if let Some(sink) = wire.sink.take() {
                    close_sink(sink).await;
                }
                inner.set_state(SessionState::Closed);
                return Err(Error::startup(e));
            }
        }
        wire.segments.session = true;
        wire.segments.prompt = true;

        // Still under the wire lock: a close() that started meanwhile is
        // waiting for it and will end the open segments and release the sink.
        if !inner.transition(SessionState::Initializing, SessionState::Active) {
            let state = inner.state();
            if state == SessionState::Closed {
                if let Some(sink) = wire.sink.take() {
                    close_sink(sink).await;
                }
                wire.segments = Segments::default();
            }
            return Err(Error::InvalidState {
                operation: "start",
                state,
            });
        }
        drop(wire);
        self.spawn_reader(stream);
        Ok(())
    }

    fn spawn_reader(&self, stream: Box<dyn EventStream>) {
        let inner = &self.inner;
        let dispatcher = Dispatcher::new(inner.playback.clone(), inner.events.clone(), inner.stats.clone());
        let cancel = inner.cancel.clone();
        let session: Weak<Inner> = Arc::downgrade(inner);
        let handle = tokio::spawn(async move {
            let reason = match dispatcher.run(stream, cancel).await {
                DispatchExit::Cancelled => return,
                DispatchExit::EndOfStream => "stream closed by peer".to_string(),
                DispatchExit::Failed(reason) => reason,
            };
            if let Some(session) = session.upgrade() {
                session.terminate(reason);
            }
        });
        *inner.reader.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    fn require_active(&self, operation: &'static str) -> Result<()> {
        match self.inner.state() {
            SessionState::Active => Ok(()),
            state => Err(Error::InvalidState { operation, state }),
        }
    }

    /// Opens the audio content segment microphone audio is sent in.
    pub async fn begin_audio_content(&self) -> Result<()> {
        self.require_active("begin_audio_content")?;
        let inner = &self.inner;
        let mut wire = inner.wire.lock().await;
        if wire.segments.audio {
            return Err(Error::AudioContentAlreadyOpen);
        }
        let event = ClientEvent::ContentStart(ContentStartEvent::audio(
            &inner.ids.prompt_name,
            &inner.ids.audio_content_name,
            AudioInputConfiguration::speech(inner.config.input_sample_rate()),
        ));
        inner.send_locked(&mut wire, &event).await?;
        wire.segments.audio = true;
        tracing::debug!("audio content opened");
        Ok(())
    }

    /// Sends one chunk of 16 kHz PCM. A failed send loses the chunk only.
    pub async fn send_audio_chunk(&self, pcm: &[u8]) -> Result<()> {
        self.require_active("send_audio_chunk")?;
        let inner = &self.inner;
        let event = ClientEvent::AudioInput(AudioInputEvent::new(
            &inner.ids.prompt_name,
            &inner.ids.audio_content_name,
            audio::encode(pcm),
        ));
        let mut wire = inner.wire.lock().await;
        if !wire.segments.audio {
            return Err(Error::AudioContentNotOpen);
        }
        inner.send_locked(&mut wire, &event).await
    }

    pub async fn end_audio_content(&self) -> Result<()> {
        let inner = &self.inner;
        if !inner.accepts_teardown("end_audio_content") {
            return Ok(());
        }
        let mut wire = inner.wire.lock().await;
        if !wire.segments.audio {
            tracing::debug!("no audio content open");
            return Ok(());
        }
        let event = ClientEvent::ContentEnd(ContentEndEvent::new(&inner.ids.prompt_name, &inner.ids.audio_content_name));
        inner.send_locked(&mut wire, &event).await?;
        wire.segments.audio = false;
        Ok(())
    }

    pub async fn end_prompt(&self) -> Result<()> {
        let inner = &self.inner;
        if !inner.accepts_teardown("end_prompt") {
            return Ok(());
        }
        let mut wire = inner.wire.lock().await;
        if !wire.segments.prompt {
            tracing::debug!("no prompt open");
            return Ok(());
        }
        let event = ClientEvent::PromptEnd(PromptEndEvent::new(&inner.ids.prompt_name));
        inner.send_locked(&mut wire, &event).await?;
        wire.segments.prompt = false;
        Ok(())
    }

    pub async fn end_session(&self) -> Result<()> {
        let inner = &self.inner;
        if !inner.accepts_teardown("end_session") {
            return Ok(());
        }
        let mut wire = inner.wire.lock().await;
        if !wire.segments.session {
            tracing::debug!("no session open");
            return Ok(());
        }
        inner.send_locked(&mut wire, &ClientEvent::SessionEnd(SessionEndEvent::new())).await?;
        wire.segments.session = false;
        Ok(())
    }

    /// Tears the session down. Every end event is attempted even if an earlier
    /// one fails, and the transport is always released. Safe to call repeatedly.
    pub async fn close(&self) {
        let inner = &self.inner;
        if inner.close_started.swap(true, Ordering::SeqCst) {
            let mut state = inner.state.subscribe();
            let _ = state.wait_for(|state| *state == SessionState::Closed).await;
            return;
        }
        // The teardown owns its own handle to the session, so dropping this
        // future does not leave the session stuck in `Closing`.
        let session = self.clone();
        let teardown = tokio::spawn(async move { session.teardown().await });
        if let Err(e) = teardown.await {
            tracing::error!("session teardown failed: {}", e);
            inner.set_state(SessionState::Closed);
        }
    }

    async fn teardown(&self) {
        let inner = &self.inner;
        if matches!(inner.state(), SessionState::Created | SessionState::Closed) {
            inner.set_state(SessionState::Closed);
            return;
        }

        inner.set_state(SessionState::Closing);
        inner.cancel.cancel();
        let reader = inner.reader.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(reader) = reader {
            if let Err(e) = reader.await {
                tracing::warn!("inbound reader failed: {}", e);
            }
        }

        if let Err(e) = self.end_audio_content().await {
            tracing::warn!("end_audio_content failed during close: {}", e);
        }
        if let Err(e) = self.end_prompt().await {
            tracing::warn!("end_prompt failed during close: {}", e);
        }
        if let Err(e) = self.end_session().await {
            tracing::warn!("end_session failed during close: {}", e);
        }

        let mut wire = inner.wire.lock().await;
        if let Some(sink) = wire.sink.take() {
            close_sink(sink).await;
        }
        wire.segments = Segments::default();
        drop(wire);

        inner.set_state(SessionState::Closed);
    }

    pub fn state(&self) -> SessionState {
        self.inner.state()
    }

    /// Resolves once the session leaves `Active`. Returns the termination error
    /// if the inbound stream ended the session, `None` if it was closed locally.
    pub async fn terminated(&self) -> Option<Error> {
        let mut state = self.inner.state.subscribe();
        let _ = state
            .wait_for(|state| !matches!(state, SessionState::Created | SessionState::Initializing | SessionState::Active))
            .await;
        self.termination().map(Error::StreamTerminated)
    }

    /// Why the inbound stream ended the session, if it did.
    pub fn termination(&self) -> Option<String> {
        self.inner.termination.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub fn stats(&self) -> Stats {
        self.inner.stats().clone()
    }

    pub fn ids(&self) -> &SessionIds {
        &self.inner.ids
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// The queue inbound audio is decoded into.
    pub fn playback(&self) -> Arc<PlaybackQueue> {
        self.inner.playback.clone()
    }
}
