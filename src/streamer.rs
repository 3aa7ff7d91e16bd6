use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::capture::CapturePipeline;
use crate::client::Client;
use crate::device::{AudioSink, AudioSource};
use crate::error::Result;
use crate::playback::{PlaybackPipeline, PlaybackSettings, SharedSink};

/// Runs microphone capture and speaker playback against one session.
pub struct Streamer {
    client: Client,
    source: Box<dyn AudioSource>,
    sink: SharedSink,
    streaming: Arc<AtomicBool>,
    settings: PlaybackSettings,
    capture: Option<CapturePipeline>,
    playback: Option<(CancellationToken, JoinHandle<()>)>,
}

impl Streamer {
    pub fn new(client: Client, source: impl AudioSource + 'static, sink: impl AudioSink + 'static) -> Self {
        let settings = PlaybackSettings::from(client.config());
        Self {
            client,
            source: Box::new(source),
            sink: Arc::new(Mutex::new(Box::new(sink))),
            streaming: Arc::new(AtomicBool::new(false)),
            settings,
            capture: None,
            playback: None,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::SeqCst)
    }

    /// Streams until `stop` resolves or the session terminates, then shuts
    /// everything down. Does nothing if already streaming.
    pub async fn start_streaming<F>(&mut self, stop: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        if self.is_streaming() {
            tracing::debug!("already streaming");
            return Ok(());
        }
        self.begin().await?;

        let client = self.client.clone();
        let terminated = tokio::select! {
            _ = stop => {
                tracing::info!("stop requested");
                None
            }
            error = client.terminated() => error,
        };

        self.stop_streaming().await;
        match terminated {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Opens the audio content and starts both pipelines without waiting.
    pub async fn begin(&mut self) -> Result<()> {
        if self.is_streaming() {
            return Ok(());
        }
        self.client.begin_audio_content().await?;
        self.streaming.store(true, Ordering::SeqCst);

        let mut capture = CapturePipeline::new(self.client.config().capture_capacity(), self.streaming.clone());
        capture.spawn(self.client.clone());
        let frames = capture.sender();
        self.capture = Some(capture);
        if let Err(e) = self.source.start(frames) {
            tracing::error!("failed to start audio capture: {}", e);
            self.stop_streaming().await;
            return Err(e.into());
        }

        let cancel = CancellationToken::new();
        let pipeline = PlaybackPipeline::new(self.client.playback(), self.sink.clone(), self.streaming.clone(), self.settings);
        self.playback = Some((cancel.clone(), tokio::spawn(pipeline.run(cancel))));
        tracing::info!("streaming started");
        Ok(())
    }

    /// Stops producers, then consumers, then the session.
    pub async fn stop_streaming(&mut self) {
        if !self.streaming.swap(false, Ordering::SeqCst) {
            return;
        }
        tracing::info!("stopping streaming");

        if let Some((cancel, task)) = self.playback.take() {
            cancel.cancel();
            if let Err(e) = task.await {
                tracing::warn!("playback task failed: {}", e);
            }
        }
        self.source.close();
        if let Some(mut capture) = self.capture.take() {
            capture.shutdown().await;
            if capture.dropped() > 0 {
                tracing::info!("{} capture frames dropped while streaming", capture.dropped());
            }
        }
        self.sink.lock().unwrap_or_else(PoisonError::into_inner).close();

        self.client.close().await;
        tracing::info!("streaming stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use sonic_realtime_types::audio;

    use super::*;
    use crate::client::config::Config;
    use crate::client::SessionState;
    use crate::device::testing::{ManualSource, RecordingSink};
    use crate::error::Error;
    use crate::transport::testing::FakeConnector;

    async fn eventually(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("condition not reached");
    }

    fn config() -> Config {
        Config::builder()
            .with_playback_chunk_bytes(4)
            .with_playback_poll(Duration::from_millis(10))
            .with_barge_in_pause(Duration::from_millis(5))
            .build()
    }

    fn audio_output(pcm: &[u8]) -> serde_json::Value {
        json!({"event": {"audioOutput": {"content": audio::encode(pcm)}}})
    }

    #[tokio::test]
    async fn test_full_duplex_round_trip() {
        let (connector, recorder, peer) = FakeConnector::new();
        let client = Client::new(config(), connector);
        client.start().await.unwrap();

        let (source, mic) = ManualSource::new();
        let (sink, speaker) = RecordingSink::new(Duration::ZERO);
        let mut streamer = Streamer::new(client.clone(), source, sink);
        streamer.begin().await.unwrap();
        assert!(streamer.is_streaming());
        assert!(mic.started());

        assert!(mic.push(vec![1, 2, 3, 4]));
        eventually(|| recorder.kinds().contains(&"audioInput")).await;

        peer.send_json(audio_output(&[9; 8]));
        eventually(|| speaker.played().len() == 8).await;
        assert_eq!(speaker.writes().len(), 2);

        streamer.stop_streaming().await;
        assert!(!streamer.is_streaming());
        assert!(mic.closed());
        assert!(speaker.closed());
        assert_eq!(client.state(), SessionState::Closed);
        let kinds = recorder.kinds();
        assert_eq!(&kinds[kinds.len() - 3..], &["contentEnd", "promptEnd", "sessionEnd"]);
        assert_eq!(recorder.closes(), 1);

        assert!(!mic.push(vec![5; 4]));
        streamer.stop_streaming().await;
    }

    #[tokio::test]
    async fn test_failed_chunk_send_keeps_streaming() {
        let (connector, recorder, _peer) = FakeConnector::new();
        let client = Client::new(config(), connector);
        client.start().await.unwrap();

        let (source, mic) = ManualSource::new();
        let (sink, _speaker) = RecordingSink::new(Duration::ZERO);
        let mut streamer = Streamer::new(client.clone(), source, sink);
        streamer.begin().await.unwrap();

        recorder.fail_next(1);
        assert!(mic.push(vec![1; 4]));
        eventually(|| client.stats().send_failures() == 1).await;
        assert!(mic.push(vec![2; 4]));
        eventually(|| client.stats().audio_chunks_sent() == 1).await;

        assert!(streamer.is_streaming());
        assert_eq!(client.state(), SessionState::Active);
        assert_eq!(recorder.kinds().iter().filter(|kind| **kind == "audioInput").count(), 1);
        assert_eq!(recorder.attempts().iter().filter(|kind| **kind == "audioInput").count(), 2);

        streamer.stop_streaming().await;
        assert_eq!(client.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_stop_mid_playback_is_prompt() {
        let (connector, recorder, peer) = FakeConnector::new();
        let client = Client::new(config(), connector);
        client.start().await.unwrap();
        recorder.fail_kind("promptEnd");

        let (source, mic) = ManualSource::new();
        let (sink, speaker) = RecordingSink::new(Duration::from_millis(20));
        let mut streamer = Streamer::new(client.clone(), source, sink);
        streamer.begin().await.unwrap();

        peer.send_json(audio_output(&[0xA; 8]));
        peer.send_json(audio_output(&[0xB; 40]));
        eventually(|| speaker.played().contains(&0xB)).await;

        streamer.stop_streaming().await;
        let b_writes = speaker.writes().iter().filter(|write| write.contains(&0xB)).count();
        assert!(b_writes <= 2, "{b_writes} sub-chunks of B played after stop");
        assert!(mic.closed());

        let attempts = recorder.attempts();
        assert_eq!(&attempts[attempts.len() - 3..], &["contentEnd", "promptEnd", "sessionEnd"]);
        assert_eq!(client.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_start_streaming_waits_for_stop_signal() {
        let (connector, _recorder, _peer) = FakeConnector::new();
        let client = Client::new(config(), connector);
        client.start().await.unwrap();

        let (source, _mic) = ManualSource::new();
        let (sink, _speaker) = RecordingSink::new(Duration::ZERO);
        let mut streamer = Streamer::new(client.clone(), source, sink);

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = stop_tx.send(());
        });
        streamer.start_streaming(async {
            let _ = stop_rx.await;
        }).await.unwrap();

        assert!(!streamer.is_streaming());
        assert_eq!(client.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_start_streaming_returns_on_termination() {
        let (connector, _recorder, mut peer) = FakeConnector::new();
        let client = Client::new(config(), connector);
        client.start().await.unwrap();

        let (source, mic) = ManualSource::new();
        let (sink, speaker) = RecordingSink::new(Duration::ZERO);
        let mut streamer = Streamer::new(client.clone(), source, sink);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            peer.end();
        });
        let err = streamer.start_streaming(std::future::pending()).await.unwrap_err();

        assert!(matches!(err, Error::StreamTerminated(_)));
        assert!(mic.closed());
        assert!(speaker.closed());
        assert_eq!(client.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_capture_start_failure_closes_session() {
        let (connector, _recorder, _peer) = FakeConnector::new();
        let client = Client::new(config(), connector);
        client.start().await.unwrap();

        let (source, _mic) = ManualSource::failing();
        let (sink, _speaker) = RecordingSink::new(Duration::ZERO);
        let mut streamer = Streamer::new(client.clone(), source, sink);

        let err = streamer.begin().await.unwrap_err();
        assert!(matches!(err, Error::Device(_)));
        assert!(!streamer.is_streaming());
        assert_eq!(client.state(), SessionState::Closed);
    }
}
