use sonic_realtime_utils::stream::{CaptureStream, PlaybackStream};

use crate::capture::CaptureSender;
use crate::device::{AudioSink, AudioSource, DeviceError, StreamSpec};

/// Microphone input through the host audio API.
pub struct NativeSource {
    spec: StreamSpec,
    stream: Option<CaptureStream>,
}

impl NativeSource {
    /// Checks that the device exists. Capture begins on [`AudioSource::start`].
    pub fn open(spec: StreamSpec) -> Result<Self, DeviceError> {
        sonic_realtime_utils::device::get_or_default_input(spec.device_name.as_deref())
            .map_err(|e| DeviceError::Open(format!("{e:#}")))?;
        Ok(Self { spec, stream: None })
    }
}

impl AudioSource for NativeSource {
    fn start(&mut self, frames: CaptureSender) -> Result<(), DeviceError> {
        if self.stream.is_some() {
            return Ok(());
        }
        let stream = CaptureStream::open(
            self.spec.device_name.clone(),
            self.spec.sample_rate,
            self.spec.frame_size,
            move |frame| {
                frames.push(frame);
            },
        )
        .map_err(|e| DeviceError::Open(format!("{e:#}")))?;
        self.stream = Some(stream);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.close();
            tracing::debug!("input stream closed");
        }
    }
}

/// Speaker output through the host audio API.
pub struct NativeSink {
    stream: Option<PlaybackStream>,
}

impl NativeSink {
    pub fn open(spec: StreamSpec) -> Result<Self, DeviceError> {
        let stream = PlaybackStream::open(spec.device_name.clone(), spec.sample_rate)
            .map_err(|e| DeviceError::Open(format!("{e:#}")))?;
        Ok(Self { stream: Some(stream) })
    }
}

impl AudioSink for NativeSink {
    fn is_active(&self) -> bool {
        self.stream.as_ref().is_some_and(PlaybackStream::is_active)
    }

    fn write(&mut self, pcm: &[u8]) -> Result<(), DeviceError> {
        let stream = self.stream.as_mut().ok_or(DeviceError::Closed)?;
        stream.write(pcm).map_err(|e| DeviceError::Write(format!("{e:#}")))
    }

    fn clear(&mut self) {
        if let Some(stream) = self.stream.as_mut() {
            stream.clear();
        }
    }

    fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.close();
            tracing::debug!("output stream closed");
        }
    }
}
