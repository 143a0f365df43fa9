//! Conversation and payload types shared across the pipeline

use serde::{Deserialize, Serialize};

/// Who produced a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    System,
}

/// A single turn in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
}

impl Turn {
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Speaker::User, text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Speaker::System, text)
    }
}

/// Ordered, append-only sequence of turns.
///
/// Owned by the caller; the cache core only ever reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    pub turns: Vec<Turn>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

impl FromIterator<Turn> for ConversationState {
    fn from_iter<I: IntoIterator<Item = Turn>>(iter: I) -> Self {
        Self {
            turns: iter.into_iter().collect(),
        }
    }
}

/// Structured narrative response from the story generator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryPayload {
    /// Narrative text shown to the player
    pub narrative: String,
    /// Actions offered for the next turn
    pub options: Vec<String>,
    /// Prompt for the scene illustration, if the generator produced one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_prompt: Option<String>,
}

impl StoryPayload {
    /// In-universe recovery payload used when the generator returns
    /// something unparseable. Never cached, so a retry reaches the
    /// generator again.
    pub fn fallback() -> Self {
        Self {
            narrative: "A strange static fills the air, and the world flickers. \
                        Something went wrong beyond the veil."
                .to_string(),
            options: vec!["Steady yourself and try again".to_string()],
            image_prompt: None,
        }
    }
}

/// Generated scene illustration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageBlob {
    /// Base64-encoded image data
    pub data: String,
    /// MIME type, e.g. `image/png`
    pub media_type: String,
}
