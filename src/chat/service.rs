//! Chat turn handling.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, instrument};

use super::error::{ChatError, ChatResult};
use super::view::{HistoryView, MAX_RECENT_PAIRS, format_pairs, number_pairs, recent_pairs};
use crate::history::{Entry, HistoryStore, validate_user_id};
use crate::upstream::ChatCompletion;

/// Query text that wipes the caller's history instead of chatting.
pub const CLEAR_COMMAND: &str = "clear";

/// Inbound chat request. Both fields are optional so that absence can be
/// reported as an invalid request rather than a deserialization failure.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub user_id: Option<String>,
    pub query: Option<String>,
    pub view: HistoryView,
}

/// Successful assistant turn.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub response: String,
    pub author: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
}

/// Result of a chat request.
#[derive(Debug, Clone)]
pub enum ChatOutcome {
    /// History was cleared; no upstream call was made.
    Cleared { message: String },
    /// The upstream answered and the turn was recorded.
    Reply(ChatReply),
}

/// Turns one query into one assistant reply while maintaining memory.
#[derive(Clone)]
pub struct ChatService {
    store: Arc<dyn HistoryStore>,
    upstream: Arc<dyn ChatCompletion>,
    persona: String,
    author: String,
}

impl ChatService {
    pub fn new(
        store: Arc<dyn HistoryStore>,
        upstream: Arc<dyn ChatCompletion>,
        persona: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            store,
            upstream,
            persona: persona.into(),
            author: author.into(),
        }
    }

    pub fn store(&self) -> &Arc<dyn HistoryStore> {
        &self.store
    }

    /// Handle one request.
    ///
    /// Validation failures happen before any storage or upstream access.
    /// On upstream failure the history is left as it was.
    #[instrument(skip(self, request), fields(user_id = ?request.user_id, view = ?request.view))]
    pub async fn handle(&self, request: ChatRequest) -> ChatResult<ChatOutcome> {
        let user_id = required(request.user_id.as_deref())
            .ok_or_else(|| ChatError::InvalidRequest("Missing required parameter: id".into()))?;
        let query = required(request.query.as_deref())
            .ok_or_else(|| ChatError::InvalidRequest("No prompt provided".into()))?;
        validate_user_id(user_id).map_err(|e| ChatError::InvalidRequest(e.to_string()))?;

        if query.trim().eq_ignore_ascii_case(CLEAR_COMMAND) {
            self.clear(user_id).await;
            return Ok(ChatOutcome::Cleared {
                message: "Chat history cleared!".to_string(),
            });
        }

        let response = self.turn(user_id, query).await?;

        let (history, formatted) = match request.view {
            HistoryView::Plain => (None, None),
            view => {
                let pairs = recent_pairs(&self.store.load(user_id).await, MAX_RECENT_PAIRS);
                if view == HistoryView::Numbered {
                    (Some(number_pairs(&pairs)), None)
                } else {
                    (None, Some(format_pairs(&pairs)))
                }
            }
        };

        Ok(ChatOutcome::Reply(ChatReply {
            response,
            author: self.author.clone(),
            history,
            formatted,
        }))
    }

    /// Run one upstream exchange and record it.
    async fn turn(&self, user_id: &str, query: &str) -> ChatResult<String> {
        let history = self.store.load(user_id).await;

        let mut prompt = Vec::with_capacity(history.len() + 2);
        prompt.push(Entry::system(self.persona.clone()));
        prompt.extend(history);
        prompt.push(Entry::user(query));

        let reply = match self.upstream.complete(&prompt).await {
            Ok(reply) => reply,
            Err(err) => {
                error!(user_id, "Error while contacting chat API: {}", err);
                return Err(err.into());
            }
        };

        // Both entries go in one append so a successful turn always adds two.
        let turn = [Entry::user(query), Entry::assistant(reply.clone())];
        if let Err(err) = self.store.append(user_id, &turn).await {
            error!(user_id, "Failed to save chat history: {}", err);
        }

        info!(user_id, prompt_len = prompt.len(), "Chat turn completed");
        Ok(reply)
    }

    async fn clear(&self, user_id: &str) {
        match self.store.clear(user_id).await {
            Ok(()) => info!(user_id, "Chat history cleared"),
            Err(err) => error!(user_id, "Failed to clear chat history: {}", err),
        }
    }
}

/// A parameter that is present and not blank.
fn required(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
