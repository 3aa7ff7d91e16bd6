mod consts;

pub use consts::*;

use base64::Engine;

/// Audio data encoded as base64
pub type Base64EncodedAudioBytes = String;

/// Encodes raw PCM bytes for an `audioInput` payload.
pub fn encode(pcm: &[u8]) -> Base64EncodedAudioBytes {
    base64::engine::general_purpose::STANDARD.encode(pcm)
}

/// Decodes the base64 payload of an `audioOutput` event into raw PCM bytes.
pub fn decode(content: &str) -> Result<Vec<u8>, base64::DecodeError> {
    base64::engine::general_purpose::STANDARD.decode(content)
}

/// `audioInputConfiguration` of an audio `contentStart`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioInputConfiguration {
    media_type: MediaType,
    sample_rate_hertz: u32,
    sample_size_bits: u16,
    channel_count: u16,
    audio_type: AudioType,
    encoding: Encoding,
}

impl AudioInputConfiguration {
    /// Mono 16-bit speech at the given rate.
    pub fn speech(sample_rate_hertz: u32) -> Self {
        Self {
            media_type: MediaType::Lpcm,
            sample_rate_hertz,
            sample_size_bits: SAMPLE_SIZE_BITS,
            channel_count: CHANNEL_COUNT,
            audio_type: AudioType::Speech,
            encoding: Encoding::Base64,
        }
    }

    pub fn sample_rate_hertz(&self) -> u32 {
        self.sample_rate_hertz
    }

    pub fn sample_size_bits(&self) -> u16 {
        self.sample_size_bits
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }
}

impl Default for AudioInputConfiguration {
    fn default() -> Self {
        Self::speech(INPUT_SAMPLE_RATE)
    }
}

/// `audioOutputConfiguration` of a `promptStart`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioOutputConfiguration {
    media_type: MediaType,
    sample_rate_hertz: u32,
    sample_size_bits: u16,
    channel_count: u16,
    /// The voice the model speaks with, e.g. "matthew".
    voice_id: String,
    encoding: Encoding,
    audio_type: AudioType,
}

impl AudioOutputConfiguration {
    pub fn speech(voice_id: &str, sample_rate_hertz: u32) -> Self {
        Self {
            media_type: MediaType::Lpcm,
            sample_rate_hertz,
            sample_size_bits: SAMPLE_SIZE_BITS,
            channel_count: CHANNEL_COUNT,
            voice_id: voice_id.to_string(),
            encoding: Encoding::Base64,
            audio_type: AudioType::Speech,
        }
    }

    pub fn voice_id(&self) -> &str {
        &self.voice_id
    }

    pub fn sample_rate_hertz(&self) -> u32 {
        self.sample_rate_hertz
    }
}

/// `textInputConfiguration` / `textOutputConfiguration`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextConfiguration {
    media_type: MediaType,
}

impl Default for TextConfiguration {
    fn default() -> Self {
        Self {
            media_type: MediaType::TextPlain,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_configuration_wire_shape() {
        let json = serde_json::to_value(AudioInputConfiguration::default()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "mediaType": "audio/lpcm",
                "sampleRateHertz": 16000,
                "sampleSizeBits": 16,
                "channelCount": 1,
                "audioType": "SPEECH",
                "encoding": "base64"
            })
        );
    }

    #[test]
    fn test_decode_rejects_invalid_base64() {
        assert!(decode("not base64!").is_err());
        assert_eq!(decode(&encode(&[1, 2, 3, 4])).unwrap(), vec![1, 2, 3, 4]);
    }
}
