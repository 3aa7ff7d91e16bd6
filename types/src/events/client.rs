use crate::audio::{AudioInputConfiguration, AudioOutputConfiguration, Base64EncodedAudioBytes, MediaType, TextConfiguration};
use crate::content::{ContentType, Role};
use crate::session::InferenceConfiguration;

/// `sessionStart` event
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStartEvent {
    inference_configuration: InferenceConfiguration,
}

impl SessionStartEvent {
    pub fn new(inference_configuration: InferenceConfiguration) -> Self {
        Self { inference_configuration }
    }

    pub fn inference_configuration(&self) -> &InferenceConfiguration {
        &self.inference_configuration
    }
}

/// `toolUseOutputConfiguration` of a `promptStart`
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolUseOutputConfiguration {
    media_type: MediaType,
}

/// `toolConfiguration` of a `promptStart`. Always empty: tool use is not offered.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToolConfiguration {
    tools: Vec<serde_json::Value>,
}

/// `promptStart` event
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptStartEvent {
    prompt_name: String,
    text_output_configuration: TextConfiguration,
    audio_output_configuration: AudioOutputConfiguration,
    tool_use_output_configuration: ToolUseOutputConfiguration,
    tool_configuration: ToolConfiguration,
}

impl PromptStartEvent {
    pub fn new(prompt_name: &str, audio_output_configuration: AudioOutputConfiguration) -> Self {
        Self {
            prompt_name: prompt_name.to_string(),
            text_output_configuration: TextConfiguration::default(),
            audio_output_configuration,
            tool_use_output_configuration: ToolUseOutputConfiguration {
                media_type: MediaType::Json,
            },
            tool_configuration: ToolConfiguration::default(),
        }
    }

    pub fn prompt_name(&self) -> &str {
        &self.prompt_name
    }

    pub fn audio_output_configuration(&self) -> &AudioOutputConfiguration {
        &self.audio_output_configuration
    }
}

/// `contentStart` event (outbound)
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentStartEvent {
    prompt_name: String,
    content_name: String,
    #[serde(rename = "type")]
    content_type: ContentType,
    interactive: bool,
    role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text_input_configuration: Option<TextConfiguration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    audio_input_configuration: Option<AudioInputConfiguration>,
}

impl ContentStartEvent {
    /// Opens a text segment spoken as `role`.
    pub fn text(prompt_name: &str, content_name: &str, role: Role) -> Self {
        Self {
            prompt_name: prompt_name.to_string(),
            content_name: content_name.to_string(),
            content_type: ContentType::Text,
            interactive: true,
            role,
            text_input_configuration: Some(TextConfiguration::default()),
            audio_input_configuration: None,
        }
    }

    /// Opens the user's microphone segment.
    pub fn audio(prompt_name: &str, content_name: &str, config: AudioInputConfiguration) -> Self {
        Self {
            prompt_name: prompt_name.to_string(),
            content_name: content_name.to_string(),
            content_type: ContentType::Audio,
            interactive: true,
            role: Role::User,
            text_input_configuration: None,
            audio_input_configuration: Some(config),
        }
    }

    pub fn prompt_name(&self) -> &str {
        &self.prompt_name
    }

    pub fn content_name(&self) -> &str {
        &self.content_name
    }

    pub fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn audio_input_configuration(&self) -> Option<&AudioInputConfiguration> {
        self.audio_input_configuration.as_ref()
    }
}

/// `textInput` event
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextInputEvent {
    prompt_name: String,
    content_name: String,
    content: String,
}

impl TextInputEvent {
    pub fn new(prompt_name: &str, content_name: &str, content: &str) -> Self {
        Self {
            prompt_name: prompt_name.to_string(),
            content_name: content_name.to_string(),
            content: content.to_string(),
        }
    }

    pub fn prompt_name(&self) -> &str {
        &self.prompt_name
    }

    pub fn content_name(&self) -> &str {
        &self.content_name
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// `audioInput` event
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioInputEvent {
    prompt_name: String,
    content_name: String,
    /// Base64 encoded 16-bit mono PCM
    content: Base64EncodedAudioBytes,
}

impl AudioInputEvent {
    pub fn new(prompt_name: &str, content_name: &str, content: Base64EncodedAudioBytes) -> Self {
        Self {
            prompt_name: prompt_name.to_string(),
            content_name: content_name.to_string(),
            content,
        }
    }

    pub fn prompt_name(&self) -> &str {
        &self.prompt_name
    }

    pub fn content_name(&self) -> &str {
        &self.content_name
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// `contentEnd` event (outbound)
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentEndEvent {
    prompt_name: String,
    content_name: String,
}

impl ContentEndEvent {
    pub fn new(prompt_name: &str, content_name: &str) -> Self {
        Self {
            prompt_name: prompt_name.to_string(),
            content_name: content_name.to_string(),
        }
    }

    pub fn prompt_name(&self) -> &str {
        &self.prompt_name
    }

    pub fn content_name(&self) -> &str {
        &self.content_name
    }
}

/// `promptEnd` event
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptEndEvent {
    prompt_name: String,
}

impl PromptEndEvent {
    pub fn new(prompt_name: &str) -> Self {
        Self {
            prompt_name: prompt_name.to_string(),
        }
    }

    pub fn prompt_name(&self) -> &str {
        &self.prompt_name
    }
}

/// `sessionEnd` event
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SessionEndEvent {}

impl SessionEndEvent {
    pub fn new() -> Self {
        Self {}
    }
}
