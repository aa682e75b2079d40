//! Error types for backend communication and session operations.
//!
//! Network failures during a chat request never escape the coordinator;
//! [`NetworkError::user_message`] turns each one into the text of a
//! synthetic assistant message.

use regex::Regex;

use crate::attachment::AttachmentError;
use crate::credentials::CredentialError;

/// Shown when the backend cannot be reached.
pub const MSG_UNREACHABLE: &str =
    "Sorry, I'm having trouble connecting to the server. Please check your connection and try again.";

/// Shown when the backend asks for a credential.
pub const MSG_CREDENTIAL_REQUIRED: &str =
    "Your API key is missing or invalid. Please enter a valid API key to continue.";

/// Shown when the backend is rate limiting.
pub const MSG_RATE_LIMITED: &str =
    "Too many requests right now. Please wait a moment and try again later.";

/// Shown for every other failure.
pub const MSG_GENERIC: &str =
    "Sorry, something went wrong while processing your request. Please try again.";

/// Errors from talking to the backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    /// Connection, timeout or transport failure.
    #[error("Backend unreachable: {0}")]
    Unreachable(String),

    /// HTTP 401.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// HTTP 400.
    #[error("Bad request: {detail}")]
    BadRequest {
        /// Whether the body names a missing credential.
        missing_credential: bool,
        /// Error detail from the backend.
        detail: String,
    },

    /// HTTP 429.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Any other non-success status.
    #[error("Server error {status}: {detail}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Error detail from the backend.
        detail: String,
    },

    /// Response body could not be decoded.
    #[error("Invalid response: {0}")]
    Decode(String),

    /// The request could not be built.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Conversation id is not usable in a URL path.
    #[error("Invalid conversation id: {0}")]
    InvalidConversationId(String),
}

impl NetworkError {
    /// Classify a non-success HTTP status and its body.
    pub fn from_status(status: u16, body: &str) -> Self {
        let detail = extract_detail(body);
        match status {
            400 => Self::BadRequest {
                missing_credential: mentions_missing_credential(body),
                detail,
            },
            401 => Self::Unauthorized(detail),
            429 => Self::RateLimited(detail),
            _ => Self::Server { status, detail },
        }
    }

    /// Whether the user should be asked for a credential.
    pub fn requires_credential(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized(_)
                | Self::BadRequest {
                    missing_credential: true,
                    ..
                }
        )
    }

    /// Human-readable explanation committed as an assistant message.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Unreachable(_) => MSG_UNREACHABLE,
            _ if self.requires_credential() => MSG_CREDENTIAL_REQUIRED,
            Self::RateLimited(_) => MSG_RATE_LIMITED,
            _ => MSG_GENERIC,
        }
    }
}

/// Pull the `detail` field out of a FastAPI-style error body, or fall back
/// to the raw body.
fn extract_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| match value.get("detail")? {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        })
        .unwrap_or_else(|| body.trim().to_string())
}

/// Check an error body for a missing-credential marker.
fn mentions_missing_credential(body: &str) -> bool {
    Regex::new(r"(?i)api[ _-]?key")
        .map(|re| re.is_match(body))
        .unwrap_or(false)
}

/// Errors from session operations other than `submit`.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A chat request is in flight and owns the transcript.
    #[error("A request is already in flight")]
    Busy,

    /// Backend failure.
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Attachment rejected.
    #[error(transparent)]
    Attachment(#[from] AttachmentError),

    /// Credential cache failure.
    #[error(transparent)]
    Credential(#[from] CredentialError),
}
