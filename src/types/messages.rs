//! Chat message types
//!
//! Mirrors the OpenAI-style chat wire shape: a role plus content that is
//! either absent, a plain string, or an ordered list of typed parts.

use serde::{Deserialize, Serialize};

/// Speaker of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Message content: plain text or multimodal parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// A single part of multimodal content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },

    InputAudio {
        input_audio: InputAudio,
    },

    ImageUrl {
        image_url: ImageUrl,
    },

    /// Any part type this crate does not know about
    #[serde(other)]
    Unknown,
}

/// Inline audio payload
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InputAudio {
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub format: String,
}

/// Image reference (URL or data URI)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ImageUrl {
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// One entry of a chat history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,

    /// `None` is treated as empty content everywhere
    #[serde(default)]
    pub content: Option<Content>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    /// Create a text message with the given role
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(Content::Text(content.into())),
            name: None,
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self::new(Role::Tool, content)
    }

    /// Create a multimodal message
    pub fn with_parts(role: Role, parts: Vec<ContentPart>) -> Self {
        Self {
            role,
            content: Some(Content::Parts(parts)),
            name: None,
            tool_call_id: None,
        }
    }

    /// Create a message with no content at all
    pub fn empty(role: Role) -> Self {
        Self {
            role,
            content: None,
            name: None,
            tool_call_id: None,
        }
    }

    /// Attach the id of the tool call this message answers
    pub fn with_tool_call_id(mut self, id: impl Into<String>) -> Self {
        self.tool_call_id = Some(id.into());
        self
    }

    pub fn is_system(&self) -> bool {
        self.role == Role::System
    }

    /// Textual content; text parts are joined with newlines
    pub fn text(&self) -> String {
        match &self.content {
            None => String::new(),
            Some(Content::Text(text)) => text.clone(),
            Some(Content::Parts(parts)) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Apply `f` to every piece of text, leaving non-text parts alone
    pub fn map_text<F>(&mut self, mut f: F)
    where
        F: FnMut(&str) -> String,
    {
        match &mut self.content {
            None => {}
            Some(Content::Text(text)) => *text = f(text),
            Some(Content::Parts(parts)) => {
                for part in parts.iter_mut() {
                    if let ContentPart::Text { text } = part {
                        *text = f(text);
                    }
                }
            }
        }
    }

    /// Replace all textual content with `text`
    ///
    /// For multimodal content the first text part receives the new text and
    /// the remaining text parts are dropped; image and audio parts stay.
    pub fn replace_text(&mut self, text: String) {
        match &mut self.content {
            Some(Content::Parts(parts)) => {
                let first_text = parts
                    .iter()
                    .position(|part| matches!(part, ContentPart::Text { .. }));
                let mut index = 0;
                parts.retain(|part| {
                    let keep = !matches!(part, ContentPart::Text { .. })
                        || Some(index) == first_text;
                    index += 1;
                    keep
                });
                match first_text {
                    Some(position) => parts[position] = ContentPart::Text { text },
                    None => parts.insert(0, ContentPart::Text { text }),
                }
            }
            _ => self.content = Some(Content::Text(text)),
        }
    }
}
