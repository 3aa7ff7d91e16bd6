//! Native device streams.
//!
//! `cpal::Stream` is not `Send`, so each stream is built, played and dropped on a
//! dedicated thread. The handles returned here are `Send` and only talk to that
//! thread through channels, atomics and the ring buffer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::anyhow;
use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, StreamTrait};
use ringbuf::HeapProd;
use ringbuf::traits::{Consumer, Producer, Split};

use crate::audio::{self, ChunkedResampler};
use crate::device;

const OUTPUT_LATENCY_MS: usize = 250;
const FULL_BUFFER_BACKOFF: Duration = Duration::from_millis(5);

struct StreamThread {
    stop: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl StreamThread {
    fn spawn<F>(name: &str, build: F) -> anyhow::Result<Self>
    where
        F: FnOnce() -> anyhow::Result<cpal::Stream> + Send + 'static,
    {
        let (ready_tx, ready_rx) = mpsc::channel::<anyhow::Result<()>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let started = build().and_then(|stream| {
                    stream.play()?;
                    Ok(stream)
                });
                let stream = match started {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                // Blocks until the handle is stopped or dropped.
                let _ = stop_rx.recv();
                drop(stream);
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                stop: Some(stop_tx),
                handle: Some(handle),
            }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(anyhow!("{name} thread exited before the stream started"))
            }
        }
    }

    fn stop(&mut self) {
        self.stop.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("audio stream thread panicked");
            }
        }
    }
}

impl Drop for StreamThread {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Microphone capture delivering mono 16-bit PCM frames at a fixed rate.
pub struct CaptureStream {
    thread: StreamThread,
}

impl CaptureStream {
    /// Opens the input device and starts calling `on_frame` with `frame_size` samples
    /// of PCM16 audio resampled to `target_rate`.
    pub fn open<F>(device_name: Option<String>, target_rate: u32, frame_size: usize, mut on_frame: F) -> anyhow::Result<Self>
    where
        F: FnMut(Vec<u8>) + Send + 'static,
    {
        let thread = StreamThread::spawn("audio-capture", move || {
            let input = device::get_or_default_input(device_name.as_deref())?;
            let default_config = input.default_input_config()?;
            let config = StreamConfig {
                channels: default_config.channels(),
                sample_rate: default_config.sample_rate(),
                buffer_size: cpal::BufferSize::Default,
            };
            tracing::info!("input: device={:?}, config={:?}", input.name().ok(), &config);

            let channels = config.channels as usize;
            let mut resampler = ChunkedResampler::new(
                config.sample_rate.0 as f64,
                target_rate as f64,
                frame_size,
            )?;
            let mut pending: Vec<f32> = Vec::with_capacity(frame_size * 2);
            let input_data_fn = move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let mono = audio::downmix(data, channels);
                pending.extend(resampler.process(&mono));
                while pending.len() >= frame_size {
                    let frame: Vec<f32> = pending.drain(..frame_size).collect();
                    on_frame(audio::f32_to_pcm16(&frame));
                }
            };
            let stream = input.build_input_stream(
                &config,
                input_data_fn,
                move |err| tracing::error!("an error occurred on input stream: {}", err),
                None,
            )?;
            Ok(stream)
        })?;
        Ok(Self { thread })
    }

    pub fn close(&mut self) {
        self.thread.stop();
    }
}

/// Speaker output fed with mono 16-bit PCM at `source_rate`.
pub struct PlaybackStream {
    producer: HeapProd<f32>,
    resampler: ChunkedResampler,
    active: Arc<AtomicBool>,
    flush: Arc<AtomicBool>,
    thread: StreamThread,
}

impl PlaybackStream {
    pub fn open(device_name: Option<String>, source_rate: u32) -> anyhow::Result<Self> {
        let output = device::get_or_default_output(device_name.as_deref())?;
        let default_config = output.default_output_config()?;
        let device_rate = default_config.sample_rate().0;
        let channels = default_config.channels();
        drop(output);

        let buffer = audio::shared_buffer(device_rate as usize * OUTPUT_LATENCY_MS / 1000);
        let (producer, mut consumer) = buffer.split();
        let active = Arc::new(AtomicBool::new(true));
        let stream_active = active.clone();
        let flush = Arc::new(AtomicBool::new(false));
        let stream_flush = flush.clone();

        let thread = StreamThread::spawn("audio-playback", move || {
            let output = device::get_or_default_output(device_name.as_deref())?;
            let config = StreamConfig {
                channels,
                sample_rate: cpal::SampleRate(device_rate),
                buffer_size: cpal::BufferSize::Default,
            };
            tracing::info!("output: device={:?}, config={:?}", output.name().ok(), &config);

            let output_channel_count = channels as usize;
            let output_data_fn = move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                if stream_flush.swap(false, Ordering::SeqCst) {
                    consumer.clear();
                }
                for frame in data.chunks_mut(output_channel_count) {
                    let sample = consumer.try_pop().unwrap_or(0.0);
                    frame.fill(sample);
                }
            };
            let stream = output.build_output_stream(
                &config,
                output_data_fn,
                move |err| {
                    tracing::error!("an error occurred on output stream: {}", err);
                    stream_active.store(false, Ordering::SeqCst);
                },
                None,
            )?;
            Ok(stream)
        })?;

        Ok(Self {
            producer,
            resampler: ChunkedResampler::new(source_rate as f64, device_rate as f64, 256)?,
            active,
            flush,
            thread,
        })
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Queues PCM16 audio for the device, blocking while the ring buffer is full.
    pub fn write(&mut self, pcm: &[u8]) -> anyhow::Result<()> {
        let samples = self.resampler.process(&audio::pcm16_to_f32(pcm));
        let mut remaining = samples.as_slice();
        while !remaining.is_empty() {
            if !self.is_active() {
                return Err(anyhow!("output stream is no longer active"));
            }
            let pushed = self.producer.push_slice(remaining);
            remaining = &remaining[pushed..];
            if !remaining.is_empty() {
                std::thread::sleep(FULL_BUFFER_BACKOFF);
            }
        }
        Ok(())
    }

    /// Discards everything queued but not yet played. The device drains the
    /// ring on its next callback.
    pub fn clear(&mut self) {
        self.resampler.reset();
        self.flush.store(true, Ordering::SeqCst);
    }

    pub fn close(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        self.thread.stop();
    }
}
