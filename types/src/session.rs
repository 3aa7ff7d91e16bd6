/// Sampling parameters carried by `sessionStart`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceConfiguration {
    /// Maximum number of tokens the model may generate per turn.
    max_tokens: u32,

    /// Nucleus sampling cutoff.
    top_p: f32,

    /// Sampling temperature for the model.
    temperature: f32,
}

impl InferenceConfiguration {
    pub fn new() -> Self {
        Self {
            max_tokens: 1024,
            top_p: 0.9,
            temperature: 0.7,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = top_p;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub fn top_p(&self) -> f32 {
        self.top_p
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }
}

impl Default for InferenceConfiguration {
    fn default() -> Self {
        Self::new()
    }
}
