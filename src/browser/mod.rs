//! Headless browser control.
//!
//! The robot drives pages through [`BrowserSession`]; sessions come from a
//! [`BrowserLauncher`]. The production launcher starts an agent-browser
//! daemon and speaks its newline-delimited JSON protocol over the session
//! socket.

mod agent;
mod error;
mod session;

pub use agent::{AgentBrowserLauncher, AgentBrowserSession, agent_browser_base_dir};
pub use error::{BrowserError, BrowserResult};
pub use session::{Anchor, BrowserLauncher, BrowserSession};
