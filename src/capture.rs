//! Microphone frames from the driver thread to the session.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::Client;

/// Handed to the audio source. Safe to call from a driver callback.
#[derive(Clone)]
pub struct CaptureSender {
    tx: mpsc::Sender<Vec<u8>>,
    streaming: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
}

impl CaptureSender {
    /// Queues a frame without blocking. Returns `false` if the frame was dropped,
    /// either because streaming is off or because the queue is full.
    pub fn push(&self, frame: Vec<u8>) -> bool {
        if !self.streaming.load(Ordering::SeqCst) {
            return false;
        }
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped.is_power_of_two() {
                    tracing::warn!("capture queue full, {} frames dropped so far", dropped);
                }
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

pub struct CapturePipeline {
    sender: CaptureSender,
    receiver: Option<mpsc::Receiver<Vec<u8>>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl CapturePipeline {
    pub fn new(capacity: usize, streaming: Arc<AtomicBool>) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            sender: CaptureSender {
                tx,
                streaming,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            receiver: Some(rx),
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    pub fn sender(&self) -> CaptureSender {
        self.sender.clone()
    }

    /// Frames lost to a full queue.
    pub fn dropped(&self) -> u64 {
        self.sender.dropped.load(Ordering::Relaxed)
    }

    /// Starts forwarding queued frames to `client` as audio input. Only the first
    /// call has an effect.
    pub fn spawn(&mut self, client: Client) {
        let Some(mut rx) = self.receiver.take() else {
            return;
        };
        let streaming = self.sender.streaming.clone();
        let cancel = self.cancel.clone();
        self.task = Some(tokio::spawn(async move {
            loop {
                let frame = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    frame = rx.recv() => match frame {
                        Some(frame) => frame,
                        None => break,
                    },
                };
                if let Err(e) = client.send_audio_chunk(&frame).await {
                    if streaming.load(Ordering::SeqCst) {
                        tracing::warn!("dropped audio chunk: {}", e);
                    }
                }
            }
            tracing::debug!("capture forwarder stopped");
        }));
    }

    /// Stops the forwarder after the chunk it is currently sending, if any.
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("capture forwarder failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    #[test]
    fn test_push_never_blocks_when_consumer_stalls() {
        let pipeline = CapturePipeline::new(4, Arc::new(AtomicBool::new(true)));
        let sender = pipeline.sender();

        let started = Instant::now();
        let accepted = (0..100).filter(|i| sender.push(vec![*i as u8; 320])).count();

        assert!(started.elapsed() < Duration::from_millis(100));
        assert_eq!(accepted, 4);
        assert_eq!(pipeline.dropped(), 96);
    }

    #[test]
    fn test_push_drops_silently_when_not_streaming() {
        let streaming = Arc::new(AtomicBool::new(false));
        let pipeline = CapturePipeline::new(4, streaming.clone());
        assert!(!pipeline.sender().push(vec![0; 4]));
        assert_eq!(pipeline.dropped(), 0);

        streaming.store(true, Ordering::SeqCst);
        assert!(pipeline.sender().push(vec![0; 4]));
    }

    #[test]
    fn test_push_from_driver_thread() {
        let pipeline = CapturePipeline::new(8, Arc::new(AtomicBool::new(true)));
        let sender = pipeline.sender();
        let pushed = std::thread::spawn(move || (0..8).filter(|_| sender.push(vec![1, 2])).count())
            .join()
            .unwrap();
        assert_eq!(pushed, 8);
    }
}
