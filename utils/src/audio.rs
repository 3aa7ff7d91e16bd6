use std::collections::VecDeque;

use ringbuf::HeapRb;
use rubato::{FastFixedIn, PolynomialDegree, Resampler};

pub fn create_resampler(in_sampling_rate: f64, out_sampling_rate: f64, chunk_size: usize) -> anyhow::Result<FastFixedIn<f32>> {
    let resampler = FastFixedIn::<f32>::new(
        out_sampling_rate / in_sampling_rate,
        1.0,
        PolynomialDegree::Cubic,
        chunk_size,
        1
    )?;
    Ok(resampler)
}

pub fn shared_buffer(size: usize) -> HeapRb<f32> {
    HeapRb::new(size)
}

/// Averages interleaved frames down to a single channel.
pub fn downmix(data: &[f32], channels: usize) -> Vec<f32> {
    if channels > 1 {
        data.chunks(channels)
            .map(|c| c.iter().sum::<f32>() / channels as f32)
            .collect()
    } else {
        data.to_vec()
    }
}

/// 16-bit little endian PCM to f32 samples. A trailing odd byte is ignored.
pub fn pcm16_to_f32(pcm: &[u8]) -> Vec<f32> {
    pcm.chunks_exact(2).map(|chunk| {
        let v = i16::from_le_bytes([chunk[0], chunk[1]]);
        (v as f32 / i16::MAX as f32).clamp(-1.0, 1.0)
    }).collect()
}

/// f32 samples to 16-bit little endian PCM.
pub fn f32_to_pcm16(samples: &[f32]) -> Vec<u8> {
    samples.iter().flat_map(|&sample| {
        ((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16).to_le_bytes()
    }).collect()
}

/// Feeds arbitrarily sized sample blocks through a fixed-input resampler.
///
/// Samples that do not fill a whole resampler chunk are held until the next call.
/// When both rates match, samples pass through untouched.
pub struct ChunkedResampler {
    resampler: Option<FastFixedIn<f32>>,
    pending: VecDeque<f32>,
}

impl ChunkedResampler {
    pub fn new(in_sampling_rate: f64, out_sampling_rate: f64, chunk_size: usize) -> anyhow::Result<Self> {
        let resampler = if (in_sampling_rate - out_sampling_rate).abs() < f64::EPSILON {
            None
        } else {
            Some(create_resampler(in_sampling_rate, out_sampling_rate, chunk_size)?)
        };
        Ok(Self {
            resampler,
            pending: VecDeque::with_capacity(chunk_size * 2),
        })
    }

    pub fn process(&mut self, samples: &[f32]) -> Vec<f32> {
        let Some(resampler) = self.resampler.as_mut() else {
            return samples.to_vec();
        };
        self.pending.extend(samples);
        let mut resampled = Vec::new();
        loop {
            let needed = resampler.input_frames_next();
            if self.pending.len() < needed {
                break;
            }
            let chunk: Vec<f32> = self.pending.drain(..needed).collect();
            match resampler.process(&[chunk.as_slice()], None) {
                Ok(out) => {
                    if let Some(out) = out.first() {
                        resampled.extend_from_slice(out);
                    }
                }
                Err(e) => tracing::warn!("Failed to resample audio chunk: {}", e),
            }
        }
        resampled
    }

    /// Drops held samples and the resampler's filter history.
    pub fn reset(&mut self) {
        self.pending.clear();
        if let Some(resampler) = self.resampler.as_mut() {
            resampler.reset();
        }
    }
}
