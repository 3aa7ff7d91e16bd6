/// Sample rate of microphone audio sent to the service.
pub const INPUT_SAMPLE_RATE: u32 = 16000;
/// Sample rate of synthesized audio received from the service.
pub const OUTPUT_SAMPLE_RATE: u32 = 24000;
pub const SAMPLE_SIZE_BITS: u16 = 16;
pub const CHANNEL_COUNT: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum MediaType {
    #[serde(rename = "audio/lpcm")]
    Lpcm,
    #[serde(rename = "text/plain")]
    TextPlain,
    #[serde(rename = "application/json")]
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AudioType {
    #[serde(rename = "SPEECH")]
    Speech,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Encoding {
    #[serde(rename = "base64")]
    Base64,
}
