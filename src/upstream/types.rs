//! Wire types of the chat completion API.

use serde::{Deserialize, Serialize};

use crate::history::Entry;

/// Request body sent to the completion endpoint.
#[derive(Debug, Serialize)]
pub struct CompletionRequest<'a> {
    pub messages: &'a [Entry],
    #[serde(rename = "projectName")]
    pub project_name: &'a str,
    pub temperature: f64,
}

/// Response body of the completion endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

impl CompletionResponse {
    /// Reply text of the response.
    ///
    /// A non-empty `message` is the reply whatever the `success` flag says;
    /// the flag alone never turns a missing message into a reply.
    pub fn reply(&self) -> Option<&str> {
        self.message
            .as_deref()
            .filter(|message| !message.trim().is_empty())
    }
}
