//! Conversation history for the sidebar.
//!
//! [`HistoryList`] holds the summaries of past conversations, most recent
//! first. [`HistorySync`] reconciles it with the backend: the list is
//! replaced wholesale on every refresh, never merged.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backend::ChatBackend;
use crate::chat::{ConversationId, ConversationStore, ServerMessage};
use crate::error::NetworkError;

/// Summary of one conversation, as listed in the history sidebar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Conversation identifier.
    pub id: ConversationId,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Last activity time.
    #[serde(alias = "updated_at", deserialize_with = "timestamp::deserialize")]
    pub timestamp: DateTime<Utc>,
    /// Number of stored messages, when the backend reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_count: Option<u32>,
    /// Model used by the conversation, when the backend reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ConversationSummary {
    /// Create a summary with only the required fields.
    pub fn new(id: ConversationId, title: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id,
            title: title.into(),
            timestamp,
            message_count: None,
            model: None,
        }
    }
}

/// Full content of one conversation, as returned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConversationDetail {
    /// Stored messages in order.
    #[serde(default)]
    pub messages: Vec<ServerMessage>,
    /// Model recorded for the conversation.
    #[serde(default)]
    pub model: Option<String>,
}

/// Lenient timestamp parsing for backend payloads.
///
/// Accepts RFC 3339, naive ISO-8601 (read as UTC) or epoch milliseconds.
mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTimestamp {
        Millis(i64),
        Text(String),
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        match RawTimestamp::deserialize(deserializer)? {
            RawTimestamp::Millis(ms) => DateTime::from_timestamp_millis(ms)
                .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {ms}"))),
            RawTimestamp::Text(text) => parse(&text).map_err(D::Error::custom),
        }
    }

    pub(super) fn parse(text: &str) -> Result<DateTime<Utc>, String> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Ok(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
            .map(|naive| naive.and_utc())
            .map_err(|e| format!("invalid timestamp {text:?}: {e}"))
    }
}

/// Ordered list of conversation summaries, most recent first.
///
/// Holds at most one summary per id.
#[derive(Debug, Clone, Default)]
pub struct HistoryList {
    entries: Vec<ConversationSummary>,
}

impl HistoryList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Summaries in display order.
    pub fn entries(&self) -> &[ConversationSummary] {
        &self.entries
    }

    /// Number of summaries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find a summary by id.
    pub fn find(&self, id: &ConversationId) -> Option<&ConversationSummary> {
        self.entries.iter().find(|s| &s.id == id)
    }

    /// Put a summary at the front, dropping any older entry with the same id.
    pub fn prepend(&mut self, summary: ConversationSummary) {
        self.entries.retain(|s| s.id != summary.id);
        self.entries.insert(0, summary);
    }

    /// Swap a provisional id for the server-assigned one, keeping position.
    ///
    /// If the new id is already listed the provisional entry is dropped.
    pub fn rekey(&mut self, old: &ConversationId, new: &ConversationId) {
        if old == new {
            return;
        }
        if self.find(new).is_some() {
            self.entries.retain(|s| &s.id != old);
            return;
        }
        if let Some(entry) = self.entries.iter_mut().find(|s| &s.id == old) {
            entry.id = new.clone();
        }
    }

    /// Replace the whole list with a fresh one from the backend.
    ///
    /// Duplicate ids keep their first occurrence; the result is ordered by
    /// timestamp, most recent first (stable for equal timestamps).
    pub fn replace(&mut self, summaries: Vec<ConversationSummary>) {
        let mut entries: Vec<ConversationSummary> = Vec::with_capacity(summaries.len());
        for summary in summaries {
            if !entries.iter().any(|s| s.id == summary.id) {
                entries.push(summary);
            }
        }
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        self.entries = entries;
    }
}

/// Keeps the history list and the active conversation in step with the
/// backend.
pub struct HistorySync<B> {
    backend: Arc<B>,
}

impl<B> Clone for HistorySync<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: ChatBackend> HistorySync<B> {
    /// Create a sync helper over a shared backend.
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Fetch the full summary list and replace `history` with it.
    ///
    /// On failure the stale list is kept untouched.
    pub async fn refresh(&self, history: &mut HistoryList) -> Result<(), NetworkError> {
        match self.backend.list_conversations().await {
            Ok(summaries) => {
                debug!(count = summaries.len(), "History refreshed");
                history.replace(summaries);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "History refresh failed; keeping stale list");
                Err(e)
            }
        }
    }

    /// Load one conversation into the store.
    ///
    /// The store is only touched once the backend has answered.
    pub async fn select(
        &self,
        id: &ConversationId,
        history: &HistoryList,
        store: &mut ConversationStore,
    ) -> Result<(), NetworkError> {
        let detail = self.backend.fetch_conversation(id).await?;
        let summary = history
            .find(id)
            .cloned()
            .unwrap_or_else(|| ConversationSummary::new(id.clone(), "", Utc::now()));
        store.load_from(&summary, &detail.messages, detail.model.as_deref());
        info!(
            conversation_id = %id,
            messages = detail.messages.len(),
            "Conversation loaded"
        );
        Ok(())
    }

    /// Delete a conversation, then refresh the list.
    ///
    /// Resets the store when the deleted conversation was the active one.
    /// A failed refresh after a successful delete is logged, not returned.
    pub async fn remove(
        &self,
        id: &ConversationId,
        history: &mut HistoryList,
        store: &mut ConversationStore,
    ) -> Result<(), NetworkError> {
        self.backend.delete_conversation(id).await?;
        info!(conversation_id = %id, "Conversation deleted");

        if store.id() == Some(id) {
            store.reset();
        }

        if let Err(e) = self.refresh(history).await {
            debug!(error = %e, "History refresh after delete failed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeBackend;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn summary(id: &str, secs: i64) -> ConversationSummary {
        ConversationSummary::new(ConversationId::new(id), format!("Title {id}"), at(secs))
    }

    #[test]
    fn test_summary_parses_backend_shape() {
        let json = r#"{
            "id": "conv_1717000000_0",
            "title": "Metformin dosage",
            "message_count": 4,
            "created_at": "2024-05-29T16:26:40.000001",
            "updated_at": "2024-05-29T16:30:00.5",
            "model": "gemini",
            "medical_context": {}
        }"#;
        let parsed: ConversationSummary = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.id.as_str(), "conv_1717000000_0");
        assert_eq!(parsed.message_count, Some(4));
        assert_eq!(parsed.model.as_deref(), Some("gemini"));
        assert_eq!(parsed.timestamp.to_rfc3339(), "2024-05-29T16:30:00.500+00:00");
    }

    #[test]
    fn test_summary_parses_numeric_id_and_millis() {
        let json = r#"{"id": 42, "title": "Hello", "timestamp": 1717000000000}"#;
        let parsed: ConversationSummary = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.id, ConversationId::new("42"));
        assert_eq!(parsed.timestamp.timestamp(), 1_717_000_000);
    }

    #[test]
    fn test_summary_parses_rfc3339() {
        let json = r#"{"id": "a", "title": "t", "timestamp": "2024-01-02T03:04:05+02:00"}"#;
        let parsed: ConversationSummary = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.timestamp.to_rfc3339(), "2024-01-02T01:04:05+00:00");
    }

    #[test]
    fn test_timestamp_rejects_garbage() {
        assert!(timestamp::parse("yesterday").is_err());
    }

    #[test]
    fn test_prepend_keeps_one_entry_per_id() {
        let mut history = HistoryList::new();
        history.prepend(summary("a", 1));
        history.prepend(summary("b", 2));
        history.prepend(summary("a", 3));

        let ids: Vec<&str> = history.entries().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_replace_dedups_and_orders() {
        let mut history = HistoryList::new();
        history.prepend(summary("local", 100));
        history.replace(vec![summary("old", 1), summary("new", 5), summary("old", 9)]);

        let ids: Vec<&str> = history.entries().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old"]);
        assert!(history.find(&ConversationId::new("local")).is_none());
    }

    #[test]
    fn test_rekey() {
        let mut history = HistoryList::new();
        history.prepend(summary("old", 1));
        history.prepend(summary("p", 2));

        history.rekey(&ConversationId::new("p"), &ConversationId::new("42"));
        let ids: Vec<&str> = history.entries().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["42", "old"]);

        history.prepend(summary("p2", 3));
        history.rekey(&ConversationId::new("p2"), &ConversationId::new("old"));
        let ids: Vec<&str> = history.entries().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["42", "old"]);
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_stale_list() {
        let backend = Arc::new(FakeBackend::new());
        backend.fail_list(NetworkError::Unreachable("down".into()));
        let sync = HistorySync::new(Arc::clone(&backend));

        let mut history = HistoryList::new();
        history.prepend(summary("a", 1));

        assert!(sync.refresh(&mut history).await.is_err());
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_select_loads_messages() {
        let backend = Arc::new(FakeBackend::new());
        backend.add_conversation(
            summary("c1", 1),
            vec![
                ServerMessage {
                    role: "user".into(),
                    content: "Hi".into(),
                },
                ServerMessage {
                    role: "assistant".into(),
                    content: "Hello".into(),
                },
            ],
            Some("gpt"),
        );
        let sync = HistorySync::new(Arc::clone(&backend));
        let mut history = HistoryList::new();
        sync.refresh(&mut history).await.unwrap();

        let mut store = ConversationStore::new("gemini");
        sync.select(&ConversationId::new("c1"), &history, &mut store)
            .await
            .unwrap();

        assert_eq!(store.id(), Some(&ConversationId::new("c1")));
        assert_eq!(store.model(), "gpt");
        assert_eq!(store.messages().len(), 2);
        assert!(store.messages()[0].is_user);
    }

    #[tokio::test]
    async fn test_select_failure_leaves_store_untouched() {
        let backend = Arc::new(FakeBackend::new());
        let sync = HistorySync::new(Arc::clone(&backend));
        let history = HistoryList::new();

        let mut store = ConversationStore::new("gemini");
        store.append_user_message("keep me");

        let result = sync
            .select(&ConversationId::new("missing"), &history, &mut store)
            .await;
        assert!(result.is_err());
        assert_eq!(store.messages().len(), 1);
        assert!(store.id().is_none());
    }

    #[tokio::test]
    async fn test_remove_active_resets_store() {
        let backend = Arc::new(FakeBackend::new());
        backend.add_conversation(summary("c1", 1), Vec::new(), None);
        backend.add_conversation(summary("c2", 2), Vec::new(), None);
        let sync = HistorySync::new(Arc::clone(&backend));

        let mut history = HistoryList::new();
        sync.refresh(&mut history).await.unwrap();
        let mut store = ConversationStore::new("gemini");
        sync.select(&ConversationId::new("c1"), &history, &mut store)
            .await
            .unwrap();

        sync.remove(&ConversationId::new("c1"), &mut history, &mut store)
            .await
            .unwrap();

        assert!(store.id().is_none());
        let ids: Vec<&str> = history.entries().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["c2"]);
    }

    #[tokio::test]
    async fn test_remove_succeeds_when_refresh_fails() {
        let backend = Arc::new(FakeBackend::new());
        backend.add_conversation(summary("c1", 1), Vec::new(), None);
        backend.add_conversation(summary("c2", 2), Vec::new(), None);
        let sync = HistorySync::new(Arc::clone(&backend));

        let mut history = HistoryList::new();
        sync.refresh(&mut history).await.unwrap();
        let mut store = ConversationStore::new("gemini");
        sync.select(&ConversationId::new("c1"), &history, &mut store)
            .await
            .unwrap();

        backend.fail_list(NetworkError::Unreachable("down".into()));
        sync.remove(&ConversationId::new("c1"), &mut history, &mut store)
            .await
            .unwrap();

        assert!(store.id().is_none());
        let ids: Vec<&str> = history.entries().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["c2", "c1"]);
    }

    #[tokio::test]
    async fn test_remove_other_keeps_active() {
        let backend = Arc::new(FakeBackend::new());
        backend.add_conversation(summary("c1", 1), Vec::new(), None);
        backend.add_conversation(summary("c2", 2), Vec::new(), None);
        let sync = HistorySync::new(Arc::clone(&backend));

        let mut history = HistoryList::new();
        let mut store = ConversationStore::new("gemini");
        sync.select(&ConversationId::new("c1"), &history, &mut store)
            .await
            .unwrap();

        sync.remove(&ConversationId::new("c2"), &mut history, &mut store)
            .await
            .unwrap();

        assert_eq!(store.id(), Some(&ConversationId::new("c1")));
        assert_eq!(history.len(), 1);
    }
}
