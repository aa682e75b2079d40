//! Observer-backed transcript view.
//!
//! [`TranscriptView`] subscribes to a session and keeps the latest snapshot
//! of everything the transcript shows. Clones share the same snapshot, so
//! one clone can be registered as the observer while another renders.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ratatui::text::Line;
use rxplain_engine::{Attachment, ConversationSummary, Message, SessionObserver};

use crate::theme::Theme;
use crate::transcript::{render_attachment, render_transcript};

#[derive(Debug, Default)]
struct ViewState {
    messages: Vec<Message>,
    pending: bool,
    attachment: Option<Attachment>,
    history_len: usize,
    credential_requested: bool,
    dirty: bool,
}

/// Latest transcript snapshot, updated through [`SessionObserver`].
#[derive(Debug, Clone, Default)]
pub struct TranscriptView {
    state: Arc<Mutex<ViewState>>,
}

impl TranscriptView {
    /// Create an empty view.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether anything changed since the last [`Self::render`].
    pub fn is_dirty(&self) -> bool {
        self.lock().dirty
    }

    /// Whether a request is in flight.
    pub fn is_pending(&self) -> bool {
        self.lock().pending
    }

    /// Number of conversations in the history list.
    pub fn history_len(&self) -> usize {
        self.lock().history_len
    }

    /// Take the credential request flag, resetting it.
    pub fn take_credential_request(&self) -> bool {
        std::mem::take(&mut self.lock().credential_requested)
    }

    /// Render the transcript and attachment line, clearing the dirty flag.
    pub fn render(&self, width: usize, theme: &Theme) -> Vec<Line<'static>> {
        let mut state = self.lock();
        state.dirty = false;
        let mut lines = render_transcript(&state.messages, state.pending, width, theme);
        if let Some(line) = render_attachment(state.attachment.as_ref(), theme) {
            if !lines.is_empty() {
                lines.push(Line::from(""));
            }
            lines.push(line);
        }
        lines
    }
}

impl SessionObserver for TranscriptView {
    fn messages_changed(&self, messages: &[Message]) {
        let mut state = self.lock();
        state.messages = messages.to_vec();
        state.dirty = true;
    }

    fn pending_changed(&self, pending: bool) {
        let mut state = self.lock();
        state.pending = pending;
        state.dirty = true;
    }

    fn history_changed(&self, history: &[ConversationSummary]) {
        self.lock().history_len = history.len();
    }

    fn attachment_changed(&self, attachment: Option<&Attachment>) {
        let mut state = self.lock();
        state.attachment = attachment.cloned();
        state.dirty = true;
    }

    fn credential_requested(&self) {
        self.lock().credential_requested = true;
    }
}
