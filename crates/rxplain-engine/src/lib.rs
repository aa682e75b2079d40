//! rxplain-engine: Conversation session engine for the Rxplain chat client
//!
//! This crate holds everything behind the chat view:
//! - The request coordinator state machine and its observer callbacks
//! - Conversation store, history list and backend reconciliation
//! - Image attachment staging with previews
//! - The HTTP backend transport and error classification
//! - Client configuration and the local credential cache

pub mod attachment;
pub mod backend;
pub mod chat;
pub mod config;
pub mod coordinator;
pub mod credentials;
pub mod error;
pub mod history;
pub mod state;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use attachment::{Attachment, AttachmentError, AttachmentStager, ImageFile};
pub use backend::{ChatBackend, ChatReply, ChatRequest, HttpBackend};
pub use chat::{derive_title, ConversationId, ConversationStore, Message, Role, ServerMessage};
pub use config::{ClientConfig, ConfigError};
pub use coordinator::{
    OutboundChat, RequestCoordinator, SessionObserver, SubmitIgnored, SubmitOutcome,
};
pub use credentials::{masked, CredentialError, CredentialStore, OPENAI_API_KEY};
pub use error::{NetworkError, SessionError};
pub use history::{ConversationDetail, ConversationSummary, HistoryList, HistorySync};
pub use state::RequestState;

/// Returns the engine version.
pub fn engine_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
