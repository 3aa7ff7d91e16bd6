use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use sonic_realtime_types::audio::{INPUT_SAMPLE_RATE, OUTPUT_SAMPLE_RATE};
use sonic_realtime_types::session::InferenceConfiguration;

use crate::client::consts::*;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Everything a session and its audio pipelines need, passed in explicitly.
pub struct Config {
    endpoint: String,
    api_key: Option<SecretString>,
    model_id: String,
    voice_id: String,
    system_prompt: String,
    inference: InferenceConfiguration,
    input_sample_rate: u32,
    output_sample_rate: u32,
    frame_size: usize,
    playback_chunk_bytes: usize,
    capture_capacity: usize,
    event_capacity: usize,
    playback_poll: Duration,
    barge_in_pause: Duration,
    input_device: Option<String>,
    output_device: Option<String>,
}

pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::new(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.config.endpoint = endpoint.to_string();
        self
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.config.api_key = Some(SecretString::from(api_key.to_string()));
        self
    }

    pub fn with_model_id(mut self, model_id: &str) -> Self {
        self.config.model_id = model_id.to_string();
        self
    }

    pub fn with_voice_id(mut self, voice_id: &str) -> Self {
        self.config.voice_id = voice_id.to_string();
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: &str) -> Self {
        self.config.system_prompt = system_prompt.to_string();
        self
    }

    pub fn with_inference(mut self, inference: InferenceConfiguration) -> Self {
        self.config.inference = inference;
        self
    }

    pub fn with_frame_size(mut self, frame_size: usize) -> Self {
        self.config.frame_size = frame_size;
        self
    }

    pub fn with_playback_chunk_bytes(mut self, bytes: usize) -> Self {
        self.config.playback_chunk_bytes = bytes;
        self
    }

    pub fn with_capture_capacity(mut self, capacity: usize) -> Self {
        self.config.capture_capacity = capacity;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    pub fn with_playback_poll(mut self, poll: Duration) -> Self {
        self.config.playback_poll = poll;
        self
    }

    pub fn with_barge_in_pause(mut self, pause: Duration) -> Self {
        self.config.barge_in_pause = pause;
        self
    }

    pub fn with_input_device(mut self, name: &str) -> Self {
        self.config.input_device = Some(name.to_string());
        self
    }

    pub fn with_output_device(mut self, name: &str) -> Self {
        self.config.output_device = Some(name.to_string());
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            model_id: DEFAULT_MODEL_ID.to_string(),
            voice_id: DEFAULT_VOICE_ID.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            inference: InferenceConfiguration::new(),
            input_sample_rate: INPUT_SAMPLE_RATE,
            output_sample_rate: OUTPUT_SAMPLE_RATE,
            frame_size: FRAME_SIZE,
            playback_chunk_bytes: PLAYBACK_CHUNK_BYTES,
            capture_capacity: CAPTURE_CAPACITY,
            event_capacity: EVENT_CAPACITY,
            playback_poll: Duration::from_millis(PLAYBACK_POLL_MS),
            barge_in_pause: Duration::from_millis(BARGE_IN_PAUSE_MS),
            input_device: None,
            output_device: None,
        }
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Loads configuration from environment variables.
    ///
    // *   `REALTIME_ENDPOINT`: WebSocket URL of the conversation service.
    // *   `REALTIME_API_KEY`: (Optional) Sent as a bearer token.
    // *   `REALTIME_MODEL_ID`, `REALTIME_VOICE_ID`, `REALTIME_SYSTEM_PROMPT`: (Optional) session settings.
    // *   `REALTIME_MAX_TOKENS`, `REALTIME_TOP_P`, `REALTIME_TEMPERATURE`: (Optional) inference settings.
    // *   `REALTIME_INPUT_DEVICE`, `REALTIME_OUTPUT_DEVICE`: (Optional) device names, host default otherwise.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. This is useful for local development and is ignored if not present.
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(endpoint) = lookup(REALTIME_ENDPOINT) {
            builder = builder.with_endpoint(&endpoint);
        }
        if let Some(api_key) = lookup(REALTIME_API_KEY).filter(|key| !key.is_empty()) {
            builder = builder.with_api_key(&api_key);
        }
        if let Some(model_id) = lookup(REALTIME_MODEL_ID) {
            builder = builder.with_model_id(&model_id);
        }
        if let Some(voice_id) = lookup(REALTIME_VOICE_ID) {
            builder = builder.with_voice_id(&voice_id);
        }
        if let Some(system_prompt) = lookup(REALTIME_SYSTEM_PROMPT) {
            builder = builder.with_system_prompt(&system_prompt);
        }
        if let Some(name) = lookup(REALTIME_INPUT_DEVICE) {
            builder = builder.with_input_device(&name);
        }
        if let Some(name) = lookup(REALTIME_OUTPUT_DEVICE) {
            builder = builder.with_output_device(&name);
        }

        let mut inference = InferenceConfiguration::new();
        if let Some(max_tokens) = parse_var(&lookup, REALTIME_MAX_TOKENS)? {
            inference = inference.with_max_tokens(max_tokens);
        }
        if let Some(top_p) = parse_var(&lookup, REALTIME_TOP_P)? {
            inference = inference.with_top_p(top_p);
        }
        if let Some(temperature) = parse_var(&lookup, REALTIME_TEMPERATURE)? {
            inference = inference.with_temperature(temperature);
        }

        let config = builder.with_inference(inference).build();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks: [(&'static str, bool, String); 7] = [
            ("endpoint", self.endpoint.trim().is_empty(), self.endpoint.clone()),
            ("input_sample_rate", self.input_sample_rate == 0, self.input_sample_rate.to_string()),
            ("output_sample_rate", self.output_sample_rate == 0, self.output_sample_rate.to_string()),
            ("frame_size", self.frame_size == 0, self.frame_size.to_string()),
            ("playback_chunk_bytes", self.playback_chunk_bytes == 0, self.playback_chunk_bytes.to_string()),
            ("capture_capacity", self.capture_capacity == 0, self.capture_capacity.to_string()),
            ("event_capacity", self.event_capacity == 0, self.event_capacity.to_string()),
        ];
        match checks.into_iter().find(|(_, invalid, _)| *invalid) {
            Some((name, _, value)) => Err(ConfigError::Invalid { name, value }),
            None => Ok(()),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn api_key(&self) -> Option<&SecretString> {
        self.api_key.as_ref()
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn voice_id(&self) -> &str {
        &self.voice_id
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn inference(&self) -> &InferenceConfiguration {
        &self.inference
    }

    pub fn input_sample_rate(&self) -> u32 {
        self.input_sample_rate
    }

    pub fn output_sample_rate(&self) -> u32 {
        self.output_sample_rate
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn playback_chunk_bytes(&self) -> usize {
        self.playback_chunk_bytes
    }

    pub fn capture_capacity(&self) -> usize {
        self.capture_capacity
    }

    pub fn event_capacity(&self) -> usize {
        self.event_capacity
    }

    pub fn playback_poll(&self) -> Duration {
        self.playback_poll
    }

    pub fn barge_in_pause(&self) -> Duration {
        self.barge_in_pause
    }

    pub fn input_device(&self) -> Option<&str> {
        self.input_device.as_deref()
    }

    pub fn output_device(&self) -> Option<&str> {
        self.output_device.as_deref()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &'static str) -> Result<Option<T>, ConfigError> {
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.endpoint(), DEFAULT_ENDPOINT);
        assert_eq!(config.voice_id(), "matthew");
        assert_eq!(config.input_sample_rate(), 16000);
        assert_eq!(config.output_sample_rate(), 24000);
        assert_eq!(config.inference().max_tokens(), 1024);
        assert!(config.api_key().is_none());
    }

    #[test]
    fn test_overrides_from_vars() {
        let config = Config::from_lookup(lookup(&[
            (REALTIME_ENDPOINT, "wss://service.test/v1"),
            (REALTIME_API_KEY, "key"),
            (REALTIME_VOICE_ID, "tiffany"),
            (REALTIME_TEMPERATURE, "0.2"),
            (REALTIME_OUTPUT_DEVICE, "Speakers"),
        ])).unwrap();
        assert_eq!(config.endpoint(), "wss://service.test/v1");
        assert_eq!(config.api_key().unwrap().expose_secret(), "key");
        assert_eq!(config.voice_id(), "tiffany");
        assert_eq!(config.inference().temperature(), 0.2);
        assert_eq!(config.output_device(), Some("Speakers"));
        assert_eq!(config.input_device(), None);
    }

    #[test]
    fn test_invalid_number() {
        let err = Config::from_lookup(lookup(&[(REALTIME_MAX_TOKENS, "lots")])).err().unwrap();
        assert!(matches!(err, ConfigError::Invalid { name: REALTIME_MAX_TOKENS, .. }));
    }

    #[test]
    fn test_validate_rejects_zero_sizes() {
        let config = Config::builder().with_playback_chunk_bytes(0).build();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { name: "playback_chunk_bytes", .. })));
    }
}
