//! Request coordinator: the conversation session state machine.
//!
//! [`RequestCoordinator`] owns the conversation store, the history list,
//! the attachment stager and the composer input. It sends one chat request
//! at a time and commits either the reply or an error explanation into the
//! transcript.
//!
//! ```text
//! Idle --begin_submit--> Sending --complete_submit(Ok)--> Idle (committed)
//!                                 \-complete_submit(Err)-> Idle (failed)
//! ```
//!
//! The two phases are public so a driver can run the network call on its
//! own terms; [`RequestCoordinator::submit`] composes them.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::attachment::{Attachment, AttachmentStager, ImageFile};
use crate::backend::{ChatBackend, ChatReply, ChatRequest};
use crate::chat::{derive_title, ConversationId, ConversationStore, Message};
use crate::config::ClientConfig;
use crate::credentials::{CredentialStore, OPENAI_API_KEY};
use crate::error::{NetworkError, SessionError};
use crate::history::{ConversationSummary, HistoryList, HistorySync};
use crate::state::RequestState;

/// View-side callbacks invoked after state changes.
///
/// All methods default to no-ops.
pub trait SessionObserver: Send + Sync {
    /// The transcript changed.
    fn messages_changed(&self, _messages: &[Message]) {}
    /// The composer input changed.
    fn input_changed(&self, _input: &str) {}
    /// A request started or finished.
    fn pending_changed(&self, _pending: bool) {}
    /// The history list changed.
    fn history_changed(&self, _history: &[ConversationSummary]) {}
    /// The staged attachment changed.
    fn attachment_changed(&self, _attachment: Option<&Attachment>) {}
    /// The backend asked for a credential.
    fn credential_requested(&self) {}
}

/// Why a submit did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitIgnored {
    /// Input was empty after trimming.
    EmptyInput,
    /// Another request is in flight.
    AlreadySending,
    /// The completion did not belong to the in-flight request.
    StaleCompletion,
}

/// Result of one submit attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Nothing was sent or committed.
    Ignored(SubmitIgnored),
    /// The reply was committed.
    Committed,
    /// The request failed; an explanation was committed.
    Failed(NetworkError),
}

/// A request handed out by [`RequestCoordinator::begin_submit`].
#[derive(Debug, Clone)]
pub struct OutboundChat {
    /// Id to pass back to [`RequestCoordinator::complete_submit`].
    pub request_id: u64,
    /// What to send.
    pub request: ChatRequest,
}

/// Conversation session state machine.
pub struct RequestCoordinator<B> {
    config: ClientConfig,
    backend: Arc<B>,
    history_sync: HistorySync<B>,
    store: ConversationStore,
    history: HistoryList,
    stager: AttachmentStager,
    state: RequestState,
    input: String,
    credential_prompt: bool,
    credentials: Option<CredentialStore>,
    observers: Vec<Box<dyn SessionObserver>>,
    next_request_id: u64,
    sent_attachment_generation: u64,
}

impl<B: ChatBackend> RequestCoordinator<B> {
    /// Create a coordinator for a fresh session.
    pub fn new(config: ClientConfig, backend: B) -> Self {
        Self::with_shared_backend(config, Arc::new(backend))
    }

    /// Create a coordinator over a backend shared with other owners.
    pub fn with_shared_backend(config: ClientConfig, backend: Arc<B>) -> Self {
        Self {
            store: ConversationStore::new(config.default_model.clone()),
            stager: AttachmentStager::new(config.max_attachment_bytes),
            history_sync: HistorySync::new(Arc::clone(&backend)),
            backend,
            config,
            history: HistoryList::new(),
            state: RequestState::Idle,
            input: String::new(),
            credential_prompt: false,
            credentials: None,
            observers: Vec::new(),
            next_request_id: 0,
            sent_attachment_generation: 0,
        }
    }

    /// Attach a credential cache.
    #[must_use]
    pub fn with_credentials(mut self, credentials: CredentialStore) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Register a view observer.
    pub fn add_observer(&mut self, observer: Box<dyn SessionObserver>) {
        self.observers.push(observer);
    }

    /// Configuration the coordinator was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Snapshot of the transcript.
    pub fn messages(&self) -> &[Message] {
        self.store.messages()
    }

    /// Active conversation id.
    pub fn conversation_id(&self) -> Option<&ConversationId> {
        self.store.id()
    }

    /// Model used for the next request.
    pub fn model(&self) -> &str {
        self.store.model()
    }

    /// Change the model used for subsequent requests.
    pub fn set_model(&mut self, model: impl Into<String>) {
        self.store.set_model(model);
    }

    /// History list, most recent first.
    pub fn history(&self) -> &[ConversationSummary] {
        self.history.entries()
    }

    /// Staged attachment.
    pub fn attachment(&self) -> Option<&Attachment> {
        self.stager.staged()
    }

    /// Current composer input.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Replace the composer input.
    pub fn set_input(&mut self, input: impl Into<String>) {
        self.input = input.into();
        self.notify_input();
    }

    /// Request lifecycle state.
    pub fn state(&self) -> RequestState {
        self.state
    }

    /// Whether a request is in flight (typing indicator).
    pub fn is_pending(&self) -> bool {
        self.state.is_pending()
    }

    /// Whether the user should be prompted for a credential.
    pub fn credential_prompt(&self) -> bool {
        self.credential_prompt
    }

    /// Start a submit from the current input.
    ///
    /// Mints a provisional id for new conversations, appends the user
    /// message and marks the session pending.
    pub fn begin_submit(&mut self) -> Result<OutboundChat, SubmitIgnored> {
        if self.state.is_pending() {
            debug!(state = %self.state, "Submit ignored while sending");
            return Err(SubmitIgnored::AlreadySending);
        }
        let text = self.input.trim().to_string();
        if text.is_empty() {
            return Err(SubmitIgnored::EmptyInput);
        }

        let was_new = self.store.is_new();
        if was_new {
            let id = ConversationId::provisional();
            self.history
                .prepend(ConversationSummary::new(id.clone(), derive_title(&text), Utc::now()));
            self.store.set_id(id);
            self.notify_history();
        }

        self.store.append_user_message(text.clone());
        self.input.clear();
        self.next_request_id += 1;
        let request_id = self.next_request_id;
        self.state = RequestState::Sending {
            request_id,
            was_new,
        };
        self.sent_attachment_generation = self.stager.generation();

        let request = ChatRequest {
            prompt: text,
            model: self.store.model().to_string(),
            conversation_id: self.store.id().cloned(),
            image: self.stager.staged().map(|a| a.file.clone()),
        };
        debug!(
            request_id,
            conversation_id = ?request.conversation_id,
            was_new,
            "Request started"
        );

        self.notify_messages();
        self.notify_input();
        self.notify_pending();
        Ok(OutboundChat {
            request_id,
            request,
        })
    }

    /// Finish the in-flight request with its network result.
    ///
    /// Exactly one assistant message is appended, either the reply or the
    /// explanation of the failure.
    pub fn complete_submit(
        &mut self,
        request_id: u64,
        result: Result<ChatReply, NetworkError>,
    ) -> SubmitOutcome {
        let RequestState::Sending {
            request_id: current,
            was_new,
        } = self.state
        else {
            warn!(request_id, "Completion received while idle");
            return SubmitOutcome::Ignored(SubmitIgnored::StaleCompletion);
        };
        if current != request_id {
            warn!(request_id, current, "Completion for a different request");
            return SubmitOutcome::Ignored(SubmitIgnored::StaleCompletion);
        }
        self.state = RequestState::Idle;

        let outcome = match result {
            Ok(reply) => {
                self.store.append_assistant_message(reply.response);
                if was_new {
                    if let Some(server_id) = reply.conversation_id {
                        if let Some(provisional) = self.store.id().cloned() {
                            self.history.rekey(&provisional, &server_id);
                        }
                        self.store.set_id(server_id);
                        self.notify_history();
                    }
                }
                if self.stager.staged().is_some()
                    && self.stager.generation() == self.sent_attachment_generation
                {
                    self.stager.clear_after_send();
                    self.notify_attachment();
                }
                info!(
                    request_id,
                    conversation_id = ?self.store.id(),
                    "Reply committed"
                );
                SubmitOutcome::Committed
            }
            Err(err) => {
                warn!(request_id, error = %err, "Chat request failed");
                self.store.append_assistant_message(err.user_message());
                if err.requires_credential() {
                    self.credential_prompt = true;
                    for observer in &self.observers {
                        observer.credential_requested();
                    }
                }
                SubmitOutcome::Failed(err)
            }
        };

        self.notify_messages();
        self.notify_pending();
        outcome
    }

    /// Send the current input and commit the outcome.
    ///
    /// Refreshes the history after a committed reply. Network failures are
    /// folded into the transcript and reported as [`SubmitOutcome::Failed`].
    pub async fn submit(&mut self) -> SubmitOutcome {
        let outbound = match self.begin_submit() {
            Ok(outbound) => outbound,
            Err(reason) => return SubmitOutcome::Ignored(reason),
        };
        let result = self.backend.send_chat(&outbound.request).await;
        let outcome = self.complete_submit(outbound.request_id, result);
        if outcome == SubmitOutcome::Committed {
            if let Err(e) = self.refresh_history().await {
                debug!(error = %e, "History refresh after send failed");
            }
        }
        outcome
    }

    /// Pop the trailing assistant reply and put its prompt back in the input.
    ///
    /// Nothing is sent; returns whether the input was re-staged.
    pub fn regenerate(&mut self) -> Result<bool, SessionError> {
        self.ensure_idle()?;
        let Some(prompt) = self.store.remove_last_assistant_message_for_regeneration() else {
            return Ok(false);
        };
        self.input = prompt;
        self.notify_messages();
        self.notify_input();
        Ok(true)
    }

    /// Start a new, empty conversation.
    pub fn new_chat(&mut self) -> Result<(), SessionError> {
        self.ensure_idle()?;
        self.store.reset();
        self.notify_messages();
        Ok(())
    }

    /// Validate and stage an image, then render its preview.
    pub async fn stage_attachment(&mut self, file: ImageFile) -> Result<(), SessionError> {
        let job = self.stager.stage(file)?;
        self.notify_attachment();

        let generation = job.generation();
        let preview = job.render().await;
        if self.stager.apply_preview(generation, preview) {
            self.notify_attachment();
        }
        Ok(())
    }

    /// Drop the staged image.
    pub fn remove_attachment(&mut self) {
        self.stager.remove();
        self.notify_attachment();
    }

    /// Replace the history list from the backend. The stale list is kept on
    /// failure.
    pub async fn refresh_history(&mut self) -> Result<(), SessionError> {
        self.history_sync.refresh(&mut self.history).await?;
        self.notify_history();
        Ok(())
    }

    /// Switch to a stored conversation once the backend has returned it.
    pub async fn select_conversation(&mut self, id: &ConversationId) -> Result<(), SessionError> {
        self.ensure_idle()?;
        self.history_sync
            .select(id, &self.history, &mut self.store)
            .await?;
        self.notify_messages();
        Ok(())
    }

    /// Delete a stored conversation and refresh the history.
    pub async fn delete_conversation(&mut self, id: &ConversationId) -> Result<(), SessionError> {
        self.ensure_idle()?;
        let was_active = self.store.id() == Some(id);
        self.history_sync
            .remove(id, &mut self.history, &mut self.store)
            .await?;
        if was_active {
            self.notify_messages();
        }
        self.notify_history();
        Ok(())
    }

    /// Store a credential supplied after a prompt and clear the prompt.
    pub fn provide_credential(&mut self, key: &str) -> Result<(), SessionError> {
        if let Some(credentials) = &self.credentials {
            credentials.set(OPENAI_API_KEY, key.trim())?;
        }
        self.credential_prompt = false;
        info!("Credential updated");
        Ok(())
    }

    /// Cached credential, if any.
    pub fn cached_credential(&self) -> Result<Option<String>, SessionError> {
        match &self.credentials {
            Some(credentials) => Ok(credentials.get(OPENAI_API_KEY)?),
            None => Ok(None),
        }
    }

    fn ensure_idle(&self) -> Result<(), SessionError> {
        if self.state.is_pending() {
            return Err(SessionError::Busy);
        }
        Ok(())
    }

    fn notify_messages(&self) {
        for observer in &self.observers {
            observer.messages_changed(self.store.messages());
        }
    }

    fn notify_input(&self) {
        for observer in &self.observers {
            observer.input_changed(&self.input);
        }
    }

    fn notify_pending(&self) {
        let pending = self.state.is_pending();
        for observer in &self.observers {
            observer.pending_changed(pending);
        }
    }

    fn notify_history(&self) {
        for observer in &self.observers {
            observer.history_changed(self.history.entries());
        }
    }

    fn notify_attachment(&self) {
        for observer in &self.observers {
            observer.attachment_changed(self.stager.staged());
        }
    }
}
