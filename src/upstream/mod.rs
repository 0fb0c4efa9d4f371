//! Hosted chat completion API client.
//!
//! The chat service talks to the upstream through [`ChatCompletion`], so the
//! HTTP client can be replaced by fakes in tests.

mod client;
mod error;
mod types;

pub use client::{ChatCompletion, HttpChatClient};
pub use error::{UpstreamError, UpstreamResult};
pub use types::{CompletionRequest, CompletionResponse};
