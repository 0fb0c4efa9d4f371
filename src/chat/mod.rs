//! Chat relay: one inbound query in, one assistant reply out, with
//! per-user memory kept in a [`HistoryStore`](crate::history::HistoryStore).

mod error;
mod service;
mod view;

pub use error::{ChatError, ChatResult};
pub use service::{ChatOutcome, ChatReply, ChatRequest, ChatService, CLEAR_COMMAND};
pub use view::{HistoryView, MAX_RECENT_PAIRS, RecentPair, format_pairs, number_pairs, recent_pairs};
