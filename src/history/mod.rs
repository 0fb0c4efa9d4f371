//! Per-user conversation history.
//!
//! A history is an ordered list of role-tagged entries owned by one user id.
//! Storage is abstracted behind [`HistoryStore`] with two implementations:
//! - [`FileHistoryStore`]: one JSON file per user id (`memory_<id>.json`)
//! - [`MemoryHistoryStore`]: in-process map, for embedding and tests
//!
//! A missing or unreadable history always loads as an empty list.

mod error;
mod file;
mod memory;
mod traits;

pub use error::{HistoryError, HistoryResult};
pub use file::FileHistoryStore;
pub use memory::MemoryHistoryStore;
pub use traits::{Entry, HistoryStore, Role, validate_user_id};
