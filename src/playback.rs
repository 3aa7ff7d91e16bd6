//! Inbound audio: the queue the dispatcher fills and the loop that drains it
//! into the output device.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::client::config::Config;
use crate::device::{AudioSink, DeviceError};

const SUB_CHUNK_YIELD: Duration = Duration::from_millis(1);

/// Output device shared between the playback loop and the orchestrator.
pub type SharedSink = Arc<Mutex<Box<dyn AudioSink>>>;

/// Decoded audio waiting to be played, plus the barge-in flag that voids it.
///
/// The flag is only cleared by [`PlaybackQueue::flush_if_interrupted`], which
/// holds the queue lock while it checks, clears and empties, so a buffer pushed
/// concurrently either lands before the flush and is discarded or after it and
/// survives.
#[derive(Default)]
pub struct PlaybackQueue {
    buffers: Mutex<VecDeque<Vec<u8>>>,
    available: Notify,
    interrupted: AtomicBool,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, buffer: Vec<u8>) {
        self.lock().push_back(buffer);
        self.available.notify_one();
    }

    /// Marks everything queued so far as interrupted.
    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Clears the barge-in flag and empties the queue if the flag was set.
    /// Returns the number of discarded buffers, or `None` if there was no barge-in.
    pub fn flush_if_interrupted(&self) -> Option<usize> {
        let mut buffers = self.lock();
        if !self.interrupted.swap(false, Ordering::SeqCst) {
            return None;
        }
        let discarded = buffers.len();
        buffers.clear();
        Some(discarded)
    }

    /// Waits up to `timeout` for the next buffer.
    pub async fn pop_timeout(&self, timeout: Duration) -> Option<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.available.notified();
            if let Some(buffer) = self.lock().pop_front() {
                return Some(buffer);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.lock().pop_front();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Vec<u8>>> {
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PlaybackSettings {
    pub chunk_bytes: usize,
    pub poll_interval: Duration,
    pub barge_in_pause: Duration,
}

impl From<&Config> for PlaybackSettings {
    fn from(config: &Config) -> Self {
        Self {
            chunk_bytes: config.playback_chunk_bytes(),
            poll_interval: config.playback_poll(),
            barge_in_pause: config.barge_in_pause(),
        }
    }
}

pub struct PlaybackPipeline {
    queue: Arc<PlaybackQueue>,
    sink: SharedSink,
    streaming: Arc<AtomicBool>,
    settings: PlaybackSettings,
}

impl PlaybackPipeline {
    pub fn new(queue: Arc<PlaybackQueue>, sink: SharedSink, streaming: Arc<AtomicBool>, settings: PlaybackSettings) -> Self {
        Self {
            queue,
            sink,
            streaming,
            settings,
        }
    }

    /// Plays queued audio until streaming stops or `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::debug!("playback loop started");
        while self.is_running(&cancel) {
            if let Some(discarded) = self.queue.flush_if_interrupted() {
                tracing::info!("barge-in: discarded {} queued buffers", discarded);
                self.sink.lock().unwrap_or_else(PoisonError::into_inner).clear();
                self.pause(&cancel).await;
                continue;
            }

            let buffer = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                buffer = self.queue.pop_timeout(self.settings.poll_interval) => buffer,
            };
            let Some(buffer) = buffer else { continue };

            if let Err(e) = self.play(&buffer, &cancel).await {
                tracing::warn!("audio playback failed: {}", e);
                self.pause(&cancel).await;
            }
        }
        tracing::debug!("playback loop stopped");
    }

    fn is_running(&self, cancel: &CancellationToken) -> bool {
        self.streaming.load(Ordering::SeqCst) && !cancel.is_cancelled()
    }

    async fn pause(&self, cancel: &CancellationToken) {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(self.settings.barge_in_pause) => {}
        }
    }

    /// Writes one buffer in sub-chunks, giving up between chunks on stop or barge-in.
    async fn play(&self, buffer: &[u8], cancel: &CancellationToken) -> Result<(), DeviceError> {
        tracing::trace!("playing {} bytes", buffer.len());
        for chunk in buffer.chunks(self.settings.chunk_bytes.max(1)) {
            if !self.is_running(cancel) || self.queue.is_interrupted() {
                tracing::trace!("buffer playback abandoned");
                return Ok(());
            }

            let sink = self.sink.clone();
            let chunk = chunk.to_vec();
            let written = tokio::task::spawn_blocking(move || {
                let mut sink = sink.lock().unwrap_or_else(PoisonError::into_inner);
                if !sink.is_active() {
                    return Ok(false);
                }
                sink.write(&chunk).map(|_| true)
            })
            .await
            .map_err(|e| DeviceError::Write(e.to_string()))??;
            if !written {
                tracing::debug!("output device inactive, skipping audio");
            }

            tokio::time::sleep(SUB_CHUNK_YIELD).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::testing::RecordingSink;

    fn settings(chunk_bytes: usize) -> PlaybackSettings {
        PlaybackSettings {
            chunk_bytes,
            poll_interval: Duration::from_millis(10),
            barge_in_pause: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_flush_is_one_shot() {
        let queue = PlaybackQueue::new();
        queue.push(vec![1]);
        queue.push(vec![2]);
        assert_eq!(queue.flush_if_interrupted(), None);
        queue.interrupt();
        assert_eq!(queue.flush_if_interrupted(), Some(2));
        assert!(!queue.is_interrupted());
        assert_eq!(queue.flush_if_interrupted(), None);

        queue.push(vec![3]);
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_pop_timeout() {
        let queue = Arc::new(PlaybackQueue::new());
        assert_eq!(queue.pop_timeout(Duration::from_millis(5)).await, None);

        let producer = queue.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            producer.push(vec![7, 7]);
        });
        assert_eq!(queue.pop_timeout(Duration::from_secs(1)).await, Some(vec![7, 7]));
    }

    #[tokio::test]
    async fn test_barge_in_discards_queued_and_plays_next() {
        let queue = Arc::new(PlaybackQueue::new());
        let (sink, speaker) = RecordingSink::new(Duration::ZERO);
        let sink: SharedSink = Arc::new(Mutex::new(Box::new(sink)));
        let streaming = Arc::new(AtomicBool::new(true));

        queue.push(vec![0xA; 4]);
        queue.push(vec![0xB; 4]);
        queue.interrupt();

        let cancel = CancellationToken::new();
        let pipeline = PlaybackPipeline::new(queue.clone(), sink, streaming, settings(2));
        let task = tokio::spawn(pipeline.run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!queue.is_interrupted());
        queue.push(vec![0xC; 4]);

        tokio::time::timeout(Duration::from_secs(1), async {
            while speaker.played().len() < 4 {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        }).await.unwrap();

        cancel.cancel();
        task.await.unwrap();
        assert_eq!(speaker.played(), vec![0xC; 4]);
        assert_eq!(speaker.writes().len(), 2);
        assert_eq!(speaker.clears(), 1);
    }

    #[tokio::test]
    async fn test_interrupt_stops_buffer_mid_playback() {
        let queue = Arc::new(PlaybackQueue::new());
        let (sink, speaker) = RecordingSink::new(Duration::from_millis(10));
        let sink: SharedSink = Arc::new(Mutex::new(Box::new(sink)));
        let streaming = Arc::new(AtomicBool::new(true));

        queue.push(vec![1; 100]);
        let cancel = CancellationToken::new();
        let pipeline = PlaybackPipeline::new(queue.clone(), sink, streaming, settings(10));
        let task = tokio::spawn(pipeline.run(cancel.clone()));

        tokio::time::timeout(Duration::from_secs(1), async {
            while speaker.writes().is_empty() {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        }).await.unwrap();
        queue.interrupt();
        tokio::time::sleep(Duration::from_millis(50)).await;

        cancel.cancel();
        task.await.unwrap();
        assert!(speaker.writes().len() <= 2, "played {} sub-chunks", speaker.writes().len());
        assert_eq!(speaker.clears(), 1);
    }

    #[tokio::test]
    async fn test_inactive_device_is_skipped() {
        let queue = Arc::new(PlaybackQueue::new());
        let (sink, speaker) = RecordingSink::new(Duration::ZERO);
        speaker.set_inactive();
        let sink: SharedSink = Arc::new(Mutex::new(Box::new(sink)));

        queue.push(vec![1; 8]);
        let cancel = CancellationToken::new();
        let pipeline = PlaybackPipeline::new(queue.clone(), sink, Arc::new(AtomicBool::new(true)), settings(4));
        let task = tokio::spawn(pipeline.run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel();
        task.await.unwrap();
        assert!(queue.is_empty());
        assert!(speaker.writes().is_empty());
        assert_eq!(speaker.clears(), 0);
    }
}
