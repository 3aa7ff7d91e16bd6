pub const REALTIME_ENDPOINT: &str = "REALTIME_ENDPOINT";
pub const REALTIME_API_KEY: &str = "REALTIME_API_KEY";
pub const REALTIME_MODEL_ID: &str = "REALTIME_MODEL_ID";
pub const REALTIME_VOICE_ID: &str = "REALTIME_VOICE_ID";
pub const REALTIME_SYSTEM_PROMPT: &str = "REALTIME_SYSTEM_PROMPT";
pub const REALTIME_MAX_TOKENS: &str = "REALTIME_MAX_TOKENS";
pub const REALTIME_TOP_P: &str = "REALTIME_TOP_P";
pub const REALTIME_TEMPERATURE: &str = "REALTIME_TEMPERATURE";
pub const REALTIME_INPUT_DEVICE: &str = "REALTIME_INPUT_DEVICE";
pub const REALTIME_OUTPUT_DEVICE: &str = "REALTIME_OUTPUT_DEVICE";

pub const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:8080/stream";
pub const DEFAULT_MODEL_ID: &str = "amazon.nova-sonic-v1:0";
pub const DEFAULT_VOICE_ID: &str = "matthew";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a friendly assistant. Keep responses concise.";

pub const FRAME_SIZE: usize = 1024;
pub const PLAYBACK_CHUNK_BYTES: usize = 1024;
pub const CAPTURE_CAPACITY: usize = 64;
pub const EVENT_CAPACITY: usize = 1024;
pub const PLAYBACK_POLL_MS: u64 = 100;
pub const BARGE_IN_PAUSE_MS: u64 = 50;

pub const AUTHORIZATION_HEADER: &str = "Authorization";
pub const MODEL_QUERY_PARAM: &str = "model";
