//! Conversation store for the active chat session.
//!
//! This module provides the message types exchanged with the backend and
//! [`ConversationStore`], the ordered transcript of the active conversation.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::history::ConversationSummary;
use crate::state::next_provisional_token;

/// Maximum number of characters kept when deriving a title from a message.
pub const TITLE_MAX_CHARS: usize = 50;

/// Marker appended to truncated titles.
pub const TITLE_ELLIPSIS: &str = "...";

/// Identifier of a conversation.
///
/// Either minted locally as a provisional value before the first
/// round-trip, or assigned by the backend. Backends report ids as strings
/// or integers; both deserialize into the same value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    /// Wrap a backend-provided identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a provisional id from the wall clock.
    pub fn provisional() -> Self {
        Self(next_provisional_token().to_string())
    }

    /// Borrow the id as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id can be interpolated into a URL path segment.
    ///
    /// Only ASCII alphanumerics, `-` and `_` are accepted.
    pub fn is_path_safe(&self) -> bool {
        !self.0.is_empty()
            && self
                .0
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<u64> for ConversationId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl<'de> Deserialize<'de> for ConversationId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Unsigned(u64),
            Signed(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => Self(s),
            RawId::Unsigned(n) => Self(n.to_string()),
            RawId::Signed(n) => Self(n.to_string()),
        })
    }
}

/// Role of a message author on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User message.
    User,
    /// Assistant (model) response.
    Assistant,
}

/// A single message in the visible transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message text (Markdown).
    pub text: String,
    /// Whether the user authored the message.
    pub is_user: bool,
}

impl Message {
    /// Create a new user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_user: true,
        }
    }

    /// Create a new assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_user: false,
        }
    }

    /// Wire-level role of the author.
    pub fn role(&self) -> Role {
        if self.is_user {
            Role::User
        } else {
            Role::Assistant
        }
    }
}

/// A message as stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerMessage {
    /// Author role, `"user"` or `"assistant"`.
    pub role: String,
    /// Message content.
    pub content: String,
}

impl ServerMessage {
    /// Convert into a transcript message. Any role other than `user` is
    /// treated as assistant-authored.
    pub fn to_message(&self) -> Message {
        Message {
            text: self.content.clone(),
            is_user: self.role == "user",
        }
    }
}

/// Derive a conversation title from the first message of a conversation.
///
/// Keeps the first [`TITLE_MAX_CHARS`] characters of the trimmed text and
/// appends [`TITLE_ELLIPSIS`] when anything was cut.
pub fn derive_title(text: &str) -> String {
    let trimmed = text.trim();
    let mut title: String = trimmed.chars().take(TITLE_MAX_CHARS).collect();
    if trimmed.chars().count() > TITLE_MAX_CHARS {
        title.push_str(TITLE_ELLIPSIS);
    }
    title
}

/// Ordered transcript and identity of the active conversation.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    id: Option<ConversationId>,
    messages: Vec<Message>,
    model: String,
}

impl ConversationStore {
    /// Create an empty, not-yet-persisted conversation.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            id: None,
            messages: Vec::new(),
            model: model.into(),
        }
    }

    /// Current conversation id; `None` for a new conversation.
    pub fn id(&self) -> Option<&ConversationId> {
        self.id.as_ref()
    }

    /// Messages in display order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Model selected for this conversation.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Change the model used for subsequent requests.
    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    /// Whether the conversation has not been assigned an id yet.
    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    pub(crate) fn set_id(&mut self, id: ConversationId) {
        self.id = Some(id);
    }

    /// Append a user-authored message.
    pub fn append_user_message(&mut self, text: impl Into<String>) {
        self.messages.push(Message::user(text));
    }

    /// Append an assistant-authored message.
    pub fn append_assistant_message(&mut self, text: impl Into<String>) {
        self.messages.push(Message::assistant(text));
    }

    /// Start a new chat: clear messages and the conversation id.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.id = None;
    }

    /// Replace the transcript with a conversation loaded from the backend.
    pub fn load_from(
        &mut self,
        summary: &ConversationSummary,
        server_messages: &[ServerMessage],
        model: Option<&str>,
    ) {
        self.messages = server_messages.iter().map(ServerMessage::to_message).collect();
        self.id = Some(summary.id.clone());
        if let Some(model) = model.filter(|m| !m.is_empty()) {
            self.model = model.to_string();
        }
    }

    /// Pop the trailing assistant message so its user prompt can be resent.
    ///
    /// Only acts when the last message is assistant-authored and the one
    /// before it is user-authored; returns that user text. Otherwise the
    /// transcript is left unchanged.
    pub fn remove_last_assistant_message_for_regeneration(&mut self) -> Option<String> {
        let len = self.messages.len();
        if len < 2 {
            return None;
        }
        let last = &self.messages[len - 1];
        let previous = &self.messages[len - 2];
        if last.is_user || !previous.is_user {
            return None;
        }
        let prompt = previous.text.clone();
        self.messages.pop();
        Some(prompt)
    }
}
