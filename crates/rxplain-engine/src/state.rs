//! Request state for the conversation session.
//!
//! This module holds the single-flight request state and the clock helpers
//! used to mint provisional conversation ids.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Lifecycle of the outbound chat request for one session.
///
/// At most one request is in flight; `Sending` is the only pending state.
/// The terminal outcomes (committed or failed) return straight to `Idle`
/// and are reported through [`crate::SubmitOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestState {
    /// No request in flight.
    #[default]
    Idle,
    /// A request is in flight.
    Sending {
        /// Identifier of the in-flight request.
        request_id: u64,
        /// Whether the session had no conversation id before this request.
        was_new: bool,
    },
}

impl RequestState {
    /// Whether a request is currently in flight.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Sending { .. })
    }

    /// The in-flight request id, if any.
    pub fn request_id(&self) -> Option<u64> {
        match self {
            Self::Idle => None,
            Self::Sending { request_id, .. } => Some(*request_id),
        }
    }
}

impl std::fmt::Display for RequestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Sending { request_id, .. } => write!(f, "sending #{request_id}"),
        }
    }
}

static LAST_PROVISIONAL: AtomicU64 = AtomicU64::new(0);

/// Mint a provisional token from the wall clock.
///
/// Tokens are milliseconds since the epoch, bumped so every call in the
/// process returns a value strictly greater than the previous one.
pub fn next_provisional_token() -> u64 {
    let now = current_millis();
    let mut last = LAST_PROVISIONAL.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_PROVISIONAL.compare_exchange_weak(last, next, Ordering::Relaxed, Ordering::Relaxed)
        {
            Ok(_) => return next,
            Err(observed) => last = observed,
        }
    }
}

/// Get the current Unix time in milliseconds.
pub fn current_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_state_lifecycle() {
        let mut state = RequestState::default();
        assert_eq!(state, RequestState::Idle);
        assert!(!state.is_pending());
        assert_eq!(state.request_id(), None);

        state = RequestState::Sending {
            request_id: 7,
            was_new: true,
        };
        assert!(state.is_pending());
        assert_eq!(state.request_id(), Some(7));
        assert_eq!(state.to_string(), "sending #7");
    }

    #[test]
    fn test_provisional_tokens_are_distinct() {
        let tokens: Vec<u64> = (0..100).map(|_| next_provisional_token()).collect();
        for pair in tokens.windows(2) {
            assert!(pair[1] > pair[0]);
        }
    }

    #[test]
    fn test_provisional_token_tracks_clock() {
        let before = current_millis();
        let token = next_provisional_token();
        assert!(token >= before);
    }
}
