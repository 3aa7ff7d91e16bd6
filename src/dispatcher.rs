//! Inbound event routing.

use std::sync::{Arc, Mutex, PoisonError};

use sonic_realtime_types::content::contains_interruption;
use sonic_realtime_types::{audio, codec, GenerationStage, Role, ServerEvent};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::client::stats::Stats;
use crate::client::SessionEvent;
use crate::playback::PlaybackQueue;
use crate::transport::EventStream;

/// Who is speaking and whether assistant text should be echoed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayState {
    pub role: Option<Role>,
    pub display_assistant_text: bool,
}

impl DisplayState {
    fn should_display(&self) -> bool {
        match self.role {
            Some(Role::Assistant) => self.display_assistant_text,
            Some(Role::User) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DispatchExit {
    Cancelled,
    EndOfStream,
    Failed(String),
}

pub(crate) struct Dispatcher {
    display: DisplayState,
    playback: Arc<PlaybackQueue>,
    events: broadcast::Sender<SessionEvent>,
    stats: Arc<Mutex<Stats>>,
}

impl Dispatcher {
    pub(crate) fn new(playback: Arc<PlaybackQueue>, events: broadcast::Sender<SessionEvent>, stats: Arc<Mutex<Stats>>) -> Self {
        Self {
            display: DisplayState::default(),
            playback,
            events,
            stats,
        }
    }

    /// Reads until the stream ends, fails or `cancel` fires.
    pub(crate) async fn run(mut self, mut stream: Box<dyn EventStream>, cancel: CancellationToken) -> DispatchExit {
        tracing::debug!("dispatcher started");
        loop {
            let received = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!("dispatcher cancelled");
                    return DispatchExit::Cancelled;
                }
                received = stream.receive() => received,
            };
            match received {
                Ok(Some(bytes)) => self.handle_payload(&bytes),
                Ok(None) => {
                    tracing::info!("inbound stream ended");
                    return DispatchExit::EndOfStream;
                }
                Err(e) => {
                    tracing::error!("inbound stream failed: {}", e);
                    return DispatchExit::Failed(e.to_string());
                }
            }
        }
    }

    pub(crate) fn handle_payload(&mut self, bytes: &[u8]) {
        match codec::decode(bytes) {
            Ok(event) => self.handle_event(event, bytes),
            Err(e) => {
                tracing::warn!("skipping undecodable message: {}", e);
                self.stats().record_decode_failure();
                self.emit(SessionEvent::Raw(e.raw().to_string()));
            }
        }
    }

    /// `raw` is the payload `event` was decoded from.
    fn handle_event(&mut self, event: ServerEvent, raw: &[u8]) {
        let mut transcript = None;
        match &event {
            ServerEvent::ContentStart(start) => {
                self.display.role = start.role().cloned();
                self.display.display_assistant_text = start.generation_stage() == Some(GenerationStage::Speculative);
                tracing::debug!(
                    "content started: role={:?}, type={:?}, speculative={}",
                    start.role(),
                    start.content_type(),
                    self.display.display_assistant_text
                );
            }
            ServerEvent::ContentEnd(end) => {
                tracing::debug!("content ended: {:?}, stop_reason={:?}", end.content_name(), end.stop_reason());
            }
            ServerEvent::TextOutput(text) => {
                if contains_interruption(text.content()) {
                    tracing::info!("barge-in detected");
                    self.playback.interrupt();
                    self.stats().record_interruption();
                }
                if self.display.should_display() {
                    if let Some(role) = self.display.role.clone() {
                        transcript = Some(SessionEvent::Transcript {
                            role,
                            text: text.content().to_string(),
                        });
                    }
                }
            }
            ServerEvent::AudioOutput(output) => match audio::decode(output.content()) {
                Ok(pcm) => {
                    tracing::trace!("queued {} bytes of audio", pcm.len());
                    self.stats().record_audio_received(pcm.len());
                    self.playback.push(pcm);
                }
                Err(e) => {
                    tracing::warn!("discarding audio output with invalid base64: {}", e);
                    self.stats().record_decode_failure();
                    self.emit(SessionEvent::Raw(String::from_utf8_lossy(raw).into_owned()));
                }
            },
            ServerEvent::Other { kind, .. } => {
                tracing::trace!("ignoring {} event", kind);
            }
        }
        self.emit(SessionEvent::Server(event));
        if let Some(transcript) = transcript {
            self.emit(transcript);
        }
    }

    pub(crate) fn display(&self) -> &DisplayState {
        &self.display
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn stats(&self) -> std::sync::MutexGuard<'_, Stats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::transport::testing::scripted_stream;

    fn dispatcher() -> (Dispatcher, Arc<PlaybackQueue>, broadcast::Receiver<SessionEvent>, Arc<Mutex<Stats>>) {
        let playback = Arc::new(PlaybackQueue::new());
        let (events, rx) = broadcast::channel(64);
        let stats = Arc::new(Mutex::new(Stats::new()));
        (Dispatcher::new(playback.clone(), events, stats.clone()), playback, rx, stats)
    }

    fn content_start(role: &str, stage: Option<&str>) -> Vec<u8> {
        let mut start = json!({"promptName": "p", "contentName": "c", "role": role, "type": "TEXT"});
        if let Some(stage) = stage {
            start["additionalModelFields"] = json!(json!({"generationStage": stage}).to_string());
        }
        json!({"event": {"contentStart": start}}).to_string().into_bytes()
    }

    fn text_output(text: &str) -> Vec<u8> {
        json!({"event": {"textOutput": {"content": text}}}).to_string().into_bytes()
    }

    fn audio_output(pcm: &[u8]) -> Vec<u8> {
        json!({"event": {"audioOutput": {"content": audio::encode(pcm)}}}).to_string().into_bytes()
    }

    fn transcripts(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<(Role, String)> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let SessionEvent::Transcript { role, text } = event {
                out.push((role, text));
            }
        }
        out
    }

    #[test]
    fn test_display_rules() {
        let (mut dispatcher, _, mut rx, _) = dispatcher();

        dispatcher.handle_payload(&content_start("ASSISTANT", Some("SPECULATIVE")));
        assert!(dispatcher.display().display_assistant_text);
        dispatcher.handle_payload(&text_output("guess"));

        dispatcher.handle_payload(&content_start("ASSISTANT", Some("FINAL")));
        assert!(!dispatcher.display().display_assistant_text);
        dispatcher.handle_payload(&text_output("final"));

        dispatcher.handle_payload(&content_start("ASSISTANT", None));
        dispatcher.handle_payload(&text_output("unmarked"));

        dispatcher.handle_payload(&content_start("USER", Some("FINAL")));
        dispatcher.handle_payload(&text_output("hi there"));

        assert_eq!(transcripts(&mut rx), vec![
            (Role::Assistant, "guess".to_string()),
            (Role::User, "hi there".to_string()),
        ]);
    }

    #[test]
    fn test_text_before_any_content_start_is_suppressed() {
        let (mut dispatcher, _, mut rx, _) = dispatcher();
        dispatcher.handle_payload(&text_output("orphan"));
        assert!(transcripts(&mut rx).is_empty());
    }

    #[test]
    fn test_interruption_marker_sets_barge_in() {
        let (mut dispatcher, playback, _rx, stats) = dispatcher();
        dispatcher.handle_payload(&audio_output(&[1, 2]));
        dispatcher.handle_payload(&text_output(r#"{ "interrupted" : true }"#));

        assert!(playback.is_interrupted());
        assert_eq!(stats.lock().unwrap().interruptions(), 1);
        assert_eq!(playback.flush_if_interrupted(), Some(1));
    }

    #[test]
    fn test_audio_output_is_queued_in_order() {
        let (mut dispatcher, playback, _rx, stats) = dispatcher();
        dispatcher.handle_payload(&audio_output(&[1, 2, 3, 4]));
        dispatcher.handle_payload(&audio_output(&[5, 6]));

        assert_eq!(playback.len(), 2);
        assert_eq!(stats.lock().unwrap().audio_bytes_received(), 6);
    }

    #[test]
    fn test_malformed_payload_is_passed_through() {
        let (mut dispatcher, playback, mut rx, stats) = dispatcher();
        let bad_audio = json!({"event": {"audioOutput": {"content": "%%%"}}}).to_string();
        dispatcher.handle_payload(b"{not json");
        dispatcher.handle_payload(bad_audio.as_bytes());
        dispatcher.handle_payload(&json!({"event": {"usageEvent": {"totalTokens": 3}}}).to_string().into_bytes());

        assert!(matches!(rx.try_recv().unwrap(), SessionEvent::Raw(raw) if raw == "{not json"));
        assert!(matches!(rx.try_recv().unwrap(), SessionEvent::Raw(raw) if raw == bad_audio));
        assert!(matches!(rx.try_recv().unwrap(), SessionEvent::Server(ServerEvent::AudioOutput(_))));
        assert!(matches!(rx.try_recv().unwrap(), SessionEvent::Server(ServerEvent::Other { kind, .. }) if kind == "usageEvent"));
        assert_eq!(stats.lock().unwrap().decode_failures(), 2);
        assert!(playback.is_empty());
    }

    #[tokio::test]
    async fn test_run_continues_past_bad_messages_until_end_of_stream() {
        let (dispatcher, playback, _rx, stats) = dispatcher();
        let (stream, mut peer) = scripted_stream();
        peer.send_raw("garbage");
        peer.send_raw(std::str::from_utf8(&audio_output(&[9, 9])).unwrap());
        peer.end();

        let exit = dispatcher.run(Box::new(stream), CancellationToken::new()).await;
        assert_eq!(exit, DispatchExit::EndOfStream);
        assert_eq!(playback.len(), 1);
        assert_eq!(stats.lock().unwrap().decode_failures(), 1);
    }

    #[tokio::test]
    async fn test_run_reports_transport_failure_and_cancellation() {
        let (dispatcher, _, _rx, _) = dispatcher();
        let (stream, peer) = scripted_stream();
        peer.fail("connection reset");
        let exit = dispatcher.run(Box::new(stream), CancellationToken::new()).await;
        assert_eq!(exit, DispatchExit::Failed("failed to receive: connection reset".to_string()));

        let (dispatcher, _, _rx, _) = self::dispatcher();
        let (stream, _peer) = scripted_stream();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(dispatcher.run(Box::new(stream), cancel).await, DispatchExit::Cancelled);
    }
}
