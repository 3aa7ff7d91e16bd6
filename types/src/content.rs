use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Text the service embeds in a `textOutput` when the user talks over the assistant.
pub const INTERRUPTION_MARKER: &str = r#"{ "interrupted" : true }"#;

/// Returns true if `text` carries the interruption marker, ignoring whitespace.
pub fn contains_interruption(text: &str) -> bool {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let marker: String = INTERRUPTION_MARKER.chars().filter(|c| !c.is_whitespace()).collect();
    compact.contains(&marker)
}

/// Speaker role attached to a content segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::System => "SYSTEM",
            Role::User => "USER",
            Role::Assistant => "ASSISTANT",
            Role::Tool => "TOOL",
            Role::Other(s) => s,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "SYSTEM" => Role::System,
            "USER" => Role::User,
            "ASSISTANT" => Role::Assistant,
            "TOOL" => Role::Tool,
            _ => Role::Other(s.to_string()),
        })
    }
}

/// Payload type of a content segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentType {
    Text,
    Audio,
    Tool,
    Other(String),
}

impl ContentType {
    pub fn as_str(&self) -> &str {
        match self {
            ContentType::Text => "TEXT",
            ContentType::Audio => "AUDIO",
            ContentType::Tool => "TOOL",
            ContentType::Other(s) => s,
        }
    }
}

impl FromStr for ContentType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "TEXT" => ContentType::Text,
            "AUDIO" => ContentType::Audio,
            "TOOL" => ContentType::Tool,
            _ => ContentType::Other(s.to_string()),
        })
    }
}

/// Whether inbound text is a provisional guess or the settled transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationStage {
    Speculative,
    Final,
    Other(String),
}

impl GenerationStage {
    pub fn as_str(&self) -> &str {
        match self {
            GenerationStage::Speculative => "SPECULATIVE",
            GenerationStage::Final => "FINAL",
            GenerationStage::Other(s) => s,
        }
    }
}

impl FromStr for GenerationStage {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "SPECULATIVE" => GenerationStage::Speculative,
            "FINAL" => GenerationStage::Final,
            _ => GenerationStage::Other(s.to_string()),
        })
    }
}

macro_rules! string_enum_serde {
    ($($ty:ty),*) => {
        $(
            impl Serialize for $ty {
                fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
                where
                    S: Serializer,
                {
                    serializer.serialize_str(self.as_str())
                }
            }

            impl<'de> Deserialize<'de> for $ty {
                fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
                where
                    D: Deserializer<'de>,
                {
                    let s = String::deserialize(deserializer)?;
                    <$ty>::from_str(&s).map_err(|never| match never {})
                }
            }
        )*
    };
}

string_enum_serde!(Role, ContentType, GenerationStage);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_role_is_preserved() {
        let role: Role = serde_json::from_str("\"NARRATOR\"").unwrap();
        assert_eq!(role, Role::Other("NARRATOR".to_string()));
        assert_eq!(serde_json::to_string(&role).unwrap(), "\"NARRATOR\"");
    }

    #[test]
    fn test_interruption_marker_detection() {
        assert!(contains_interruption(r#"{ "interrupted" : true }"#));
        assert!(contains_interruption(r#"ok {"interrupted":true} "#));
        assert!(!contains_interruption(r#"{ "interrupted" : false }"#));
        assert!(!contains_interruption("I was not interrupted"));
    }
}
