use crate::audio::Base64EncodedAudioBytes;
use crate::content::{ContentType, GenerationStage, Role};

/// `contentStart` event (inbound)
///
/// Every field is optional: the service adds fields over time and a missing
/// one must not cost us the whole event.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentStartedEvent {
    prompt_name: Option<String>,
    content_name: Option<String>,
    content_id: Option<String>,
    completion_id: Option<String>,
    role: Option<Role>,
    #[serde(rename = "type")]
    content_type: Option<ContentType>,
    /// JSON document encoded as a string, e.g. `{"generationStage":"SPECULATIVE"}`
    additional_model_fields: Option<String>,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdditionalModelFields {
    generation_stage: Option<GenerationStage>,
}

impl ContentStartedEvent {
    pub fn prompt_name(&self) -> Option<&str> {
        self.prompt_name.as_deref()
    }

    pub fn content_name(&self) -> Option<&str> {
        self.content_name.as_deref()
    }

    pub fn content_id(&self) -> Option<&str> {
        self.content_id.as_deref()
    }

    pub fn completion_id(&self) -> Option<&str> {
        self.completion_id.as_deref()
    }

    pub fn role(&self) -> Option<&Role> {
        self.role.as_ref()
    }

    pub fn content_type(&self) -> Option<&ContentType> {
        self.content_type.as_ref()
    }

    pub fn additional_model_fields(&self) -> Option<&str> {
        self.additional_model_fields.as_deref()
    }

    /// The generation stage carried in `additionalModelFields`.
    ///
    /// Returns `None` when the field is absent or is not a JSON document.
    pub fn generation_stage(&self) -> Option<GenerationStage> {
        let fields = self.additional_model_fields.as_deref()?;
        serde_json::from_str::<AdditionalModelFields>(fields)
            .ok()
            .and_then(|fields| fields.generation_stage)
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_additional_model_fields(mut self, fields: &str) -> Self {
        self.additional_model_fields = Some(fields.to_string());
        self
    }
}

/// `textOutput` event
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextOutputEvent {
    #[serde(default)]
    prompt_name: Option<String>,
    #[serde(default)]
    content_name: Option<String>,
    #[serde(default)]
    role: Option<Role>,
    /// Transcript text. May embed the interruption marker.
    content: String,
}

impl TextOutputEvent {
    pub fn new(content: &str) -> Self {
        Self {
            prompt_name: None,
            content_name: None,
            role: None,
            content: content.to_string(),
        }
    }

    pub fn prompt_name(&self) -> Option<&str> {
        self.prompt_name.as_deref()
    }

    pub fn content_name(&self) -> Option<&str> {
        self.content_name.as_deref()
    }

    pub fn role(&self) -> Option<&Role> {
        self.role.as_ref()
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// `audioOutput` event
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioOutputEvent {
    #[serde(default)]
    prompt_name: Option<String>,
    #[serde(default)]
    content_name: Option<String>,
    /// Base64 encoded 16-bit mono PCM at 24 kHz
    content: Base64EncodedAudioBytes,
}

impl AudioOutputEvent {
    pub fn new(content: Base64EncodedAudioBytes) -> Self {
        Self {
            prompt_name: None,
            content_name: None,
            content,
        }
    }

    pub fn prompt_name(&self) -> Option<&str> {
        self.prompt_name.as_deref()
    }

    pub fn content_name(&self) -> Option<&str> {
        self.content_name.as_deref()
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// `contentEnd` event (inbound)
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContentEndedEvent {
    prompt_name: Option<String>,
    content_name: Option<String>,
    #[serde(rename = "type")]
    content_type: Option<ContentType>,
    stop_reason: Option<String>,
}

impl ContentEndedEvent {
    pub fn prompt_name(&self) -> Option<&str> {
        self.prompt_name.as_deref()
    }

    pub fn content_name(&self) -> Option<&str> {
        self.content_name.as_deref()
    }

    pub fn content_type(&self) -> Option<&ContentType> {
        self.content_type.as_ref()
    }

    /// e.g. `END_TURN` or `INTERRUPTED`
    pub fn stop_reason(&self) -> Option<&str> {
        self.stop_reason.as_deref()
    }
}
