//! Shared state for the HTTP handlers.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::chat::ChatService;
use crate::robot::RunRegistry;

/// State of the chat relay server.
#[derive(Clone)]
pub struct ChatState {
    pub chat: ChatService,
    /// Origins allowed for CORS (empty allows any).
    pub allowed_origins: Vec<String>,
}

impl ChatState {
    pub fn new(chat: ChatService, allowed_origins: Vec<String>) -> Self {
        Self {
            chat,
            allowed_origins,
        }
    }
}

/// State of the robot control server.
#[derive(Clone)]
pub struct RobotState {
    pub registry: Arc<RunRegistry>,
    /// Cancelled on server shutdown so open event streams end.
    pub shutdown: CancellationToken,
}

impl RobotState {
    pub fn new(registry: Arc<RunRegistry>) -> Self {
        Self {
            registry,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }
}
