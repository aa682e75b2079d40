//! Test doubles for the session engine.
//!
//! [`FakeBackend`] is an in-memory stand-in for the HTTP service with
//! scripted chat replies. [`RecordingObserver`] captures observer
//! callbacks in order.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;

use crate::attachment::Attachment;
use crate::backend::{ChatBackend, ChatReply, ChatRequest};
use crate::chat::{derive_title, ConversationId, Message, ServerMessage};
use crate::coordinator::SessionObserver;
use crate::error::NetworkError;
use crate::history::{ConversationDetail, ConversationSummary};

#[derive(Debug, Clone)]
struct StoredConversation {
    summary: ConversationSummary,
    messages: Vec<ServerMessage>,
    model: Option<String>,
}

#[derive(Debug, Default)]
struct FakeState {
    replies: VecDeque<Result<ChatReply, NetworkError>>,
    requests: Vec<ChatRequest>,
    conversations: Vec<StoredConversation>,
    list_error: Option<NetworkError>,
    delete_error: Option<NetworkError>,
}

/// Scripted in-memory backend.
#[derive(Debug, Default)]
pub struct FakeBackend {
    state: Mutex<FakeState>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful chat reply.
    pub fn push_reply(&self, response: &str, conversation_id: Option<&str>) {
        self.state.lock().unwrap().replies.push_back(Ok(ChatReply {
            response: response.to_string(),
            conversation_id: conversation_id.map(ConversationId::new),
        }));
    }

    /// Queue a failed chat reply.
    pub fn push_error(&self, error: NetworkError) {
        self.state.lock().unwrap().replies.push_back(Err(error));
    }

    /// Make every `list_conversations` call fail.
    pub fn fail_list(&self, error: NetworkError) {
        self.state.lock().unwrap().list_error = Some(error);
    }

    /// Make every `delete_conversation` call fail.
    pub fn fail_delete(&self, error: NetworkError) {
        self.state.lock().unwrap().delete_error = Some(error);
    }

    /// Seed a stored conversation.
    pub fn add_conversation(
        &self,
        summary: ConversationSummary,
        messages: Vec<ServerMessage>,
        model: Option<&str>,
    ) {
        self.state.lock().unwrap().conversations.push(StoredConversation {
            summary,
            messages,
            model: model.map(str::to_string),
        });
    }

    /// Chat requests received so far.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.state.lock().unwrap().requests.clone()
    }
}

#[async_trait]
impl ChatBackend for FakeBackend {
    async fn send_chat(&self, request: &ChatRequest) -> Result<ChatReply, NetworkError> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(request.clone());
        let reply = state
            .replies
            .pop_front()
            .unwrap_or_else(|| Err(NetworkError::Unreachable("no scripted reply".into())))?;

        let id = reply
            .conversation_id
            .clone()
            .or_else(|| request.conversation_id.clone());
        if let Some(id) = id {
            let turn = [
                ServerMessage {
                    role: "user".into(),
                    content: request.prompt.clone(),
                },
                ServerMessage {
                    role: "assistant".into(),
                    content: reply.response.clone(),
                },
            ];
            if let Some(stored) = state.conversations.iter_mut().find(|c| c.summary.id == id) {
                stored.summary.timestamp = Utc::now();
                stored.messages.extend(turn);
            } else {
                state.conversations.push(StoredConversation {
                    summary: ConversationSummary::new(id, derive_title(&request.prompt), Utc::now()),
                    messages: turn.to_vec(),
                    model: Some(request.model.clone()),
                });
            }
        }
        Ok(reply)
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, NetworkError> {
        let state = self.state.lock().unwrap();
        if let Some(err) = &state.list_error {
            return Err(err.clone());
        }
        Ok(state
            .conversations
            .iter()
            .map(|c| c.summary.clone())
            .collect())
    }

    async fn fetch_conversation(
        &self,
        id: &ConversationId,
    ) -> Result<ConversationDetail, NetworkError> {
        let state = self.state.lock().unwrap();
        state
            .conversations
            .iter()
            .find(|c| &c.summary.id == id)
            .map(|c| ConversationDetail {
                messages: c.messages.clone(),
                model: c.model.clone(),
            })
            .ok_or_else(|| NetworkError::from_status(404, r#"{"detail": "Conversation not found"}"#))
    }

    async fn delete_conversation(&self, id: &ConversationId) -> Result<(), NetworkError> {
        let mut state = self.state.lock().unwrap();
        if let Some(err) = &state.delete_error {
            return Err(err.clone());
        }
        let before = state.conversations.len();
        state.conversations.retain(|c| &c.summary.id != id);
        if state.conversations.len() == before {
            return Err(NetworkError::from_status(404, r#"{"detail": "Conversation not found"}"#));
        }
        Ok(())
    }
}

/// An observer callback, as recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observed {
    Messages(usize),
    Input(String),
    Pending(bool),
    History(usize),
    Attachment { staged: bool, has_preview: bool },
    CredentialRequested,
}

/// Observer that records every callback.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<Observed>>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Observed> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: Observed) {
        self.events.lock().unwrap().push(event);
    }
}

impl SessionObserver for RecordingObserver {
    fn messages_changed(&self, messages: &[Message]) {
        self.push(Observed::Messages(messages.len()));
    }

    fn input_changed(&self, input: &str) {
        self.push(Observed::Input(input.to_string()));
    }

    fn pending_changed(&self, pending: bool) {
        self.push(Observed::Pending(pending));
    }

    fn history_changed(&self, history: &[ConversationSummary]) {
        self.push(Observed::History(history.len()));
    }

    fn attachment_changed(&self, attachment: Option<&Attachment>) {
        self.push(Observed::Attachment {
            staged: attachment.is_some(),
            has_preview: attachment.is_some_and(|a| a.preview_data_uri.is_some()),
        });
    }

    fn credential_requested(&self) {
        self.push(Observed::CredentialRequested);
    }
}
