//! The audio device seam.
//!
//! Capture pushes frames into a [`CaptureSender`] from whatever thread the
//! driver calls back on. Playback is a blocking writer driven from
//! `spawn_blocking`.

#[cfg(feature = "utils")]
pub mod native;

use sonic_realtime_types::audio::CHANNEL_COUNT;

use crate::capture::CaptureSender;
use crate::client::config::Config;

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("failed to open audio device: {0}")]
    Open(String),

    #[error("failed to write audio: {0}")]
    Write(String),

    #[error("audio device is closed")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// What to open: mono 16-bit PCM at a fixed rate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSpec {
    pub direction: Direction,
    pub sample_rate: u32,
    pub channels: u16,
    pub frame_size: usize,
    pub device_name: Option<String>,
}

impl StreamSpec {
    pub fn input(config: &Config) -> Self {
        Self {
            direction: Direction::Input,
            sample_rate: config.input_sample_rate(),
            channels: CHANNEL_COUNT,
            frame_size: config.frame_size(),
            device_name: config.input_device().map(str::to_string),
        }
    }

    pub fn output(config: &Config) -> Self {
        Self {
            direction: Direction::Output,
            sample_rate: config.output_sample_rate(),
            channels: CHANNEL_COUNT,
            frame_size: config.frame_size(),
            device_name: config.output_device().map(str::to_string),
        }
    }
}

pub trait AudioSource: Send {
    /// Starts delivering PCM frames. The callback side must only ever call
    /// [`CaptureSender::push`], which never blocks.
    fn start(&mut self, frames: CaptureSender) -> Result<(), DeviceError>;

    fn close(&mut self);
}

pub trait AudioSink: Send {
    /// `false` once the device stopped accepting output.
    fn is_active(&self) -> bool;

    fn write(&mut self, pcm: &[u8]) -> Result<(), DeviceError>;

    /// Drops audio already handed to the device but not yet heard.
    fn clear(&mut self);

    fn close(&mut self);
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;

    #[derive(Clone, Default)]
    pub(crate) struct SinkLog {
        writes: Arc<Mutex<Vec<Vec<u8>>>>,
        closed: Arc<AtomicBool>,
        inactive: Arc<AtomicBool>,
        clears: Arc<AtomicUsize>,
    }

    impl SinkLog {
        pub(crate) fn writes(&self) -> Vec<Vec<u8>> {
            self.writes.lock().unwrap().clone()
        }

        pub(crate) fn played(&self) -> Vec<u8> {
            self.writes().concat()
        }

        pub(crate) fn closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }

        pub(crate) fn clears(&self) -> usize {
            self.clears.load(Ordering::SeqCst)
        }

        pub(crate) fn set_inactive(&self) {
            self.inactive.store(true, Ordering::SeqCst);
        }
    }

    /// Records every write; each write takes `delay` like a real device would.
    pub(crate) struct RecordingSink {
        shared: SinkLog,
        delay: Duration,
    }

    impl RecordingSink {
        pub(crate) fn new(delay: Duration) -> (Self, SinkLog) {
            let shared = SinkLog::default();
            (Self { shared: shared.clone(), delay }, shared)
        }
    }

    impl AudioSink for RecordingSink {
        fn is_active(&self) -> bool {
            !self.shared.inactive.load(Ordering::SeqCst) && !self.shared.closed()
        }

        fn write(&mut self, pcm: &[u8]) -> Result<(), DeviceError> {
            if self.shared.closed() {
                return Err(DeviceError::Closed);
            }
            self.shared.writes.lock().unwrap().push(pcm.to_vec());
            std::thread::sleep(self.delay);
            Ok(())
        }

        fn clear(&mut self) {
            self.shared.clears.fetch_add(1, Ordering::SeqCst);
        }

        fn close(&mut self) {
            self.shared.closed.store(true, Ordering::SeqCst);
        }
    }

    #[derive(Clone, Default)]
    pub(crate) struct SourceHandle {
        sender: Arc<Mutex<Option<CaptureSender>>>,
        closed: Arc<AtomicBool>,
    }

    impl SourceHandle {
        /// Acts as the driver callback.
        pub(crate) fn push(&self, frame: Vec<u8>) -> bool {
            match self.sender.lock().unwrap().as_ref() {
                Some(sender) => sender.push(frame),
                None => false,
            }
        }

        pub(crate) fn started(&self) -> bool {
            self.sender.lock().unwrap().is_some()
        }

        pub(crate) fn closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    pub(crate) struct ManualSource {
        shared: SourceHandle,
        fail_start: bool,
    }

    impl ManualSource {
        pub(crate) fn new() -> (Self, SourceHandle) {
            let shared = SourceHandle::default();
            (Self { shared: shared.clone(), fail_start: false }, shared)
        }

        pub(crate) fn failing() -> (Self, SourceHandle) {
            let (mut source, shared) = Self::new();
            source.fail_start = true;
            (source, shared)
        }
    }

    impl AudioSource for ManualSource {
        fn start(&mut self, frames: CaptureSender) -> Result<(), DeviceError> {
            if self.fail_start {
                return Err(DeviceError::Open("no microphone".to_string()));
            }
            *self.shared.sender.lock().unwrap() = Some(frames);
            Ok(())
        }

        fn close(&mut self) {
            self.shared.sender.lock().unwrap().take();
            self.shared.closed.store(true, Ordering::SeqCst);
        }
    }
}
