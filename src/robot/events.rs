//! Progress events fanned out to connected viewers.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Capacity of the broadcast buffer. Slow viewers that fall further behind
/// skip the oldest events.
const EVENT_BUFFER: usize = 256;

/// Severity of a progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Info,
    Success,
    Error,
}

/// One progress record as sent over `/events`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub level: EventLevel,
    pub msg: String,
    /// Page the viewer should display, when it changed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ProgressEvent {
    pub fn info(msg: impl Into<String>) -> Self {
        Self {
            level: EventLevel::Info,
            msg: msg.into(),
            url: None,
        }
    }

    pub fn success(msg: impl Into<String>) -> Self {
        Self {
            level: EventLevel::Success,
            msg: msg.into(),
            url: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            level: EventLevel::Error,
            msg: msg.into(),
            url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// Fan-out of progress events. Late subscribers only see events sent after
/// they subscribed.
#[derive(Debug, Clone)]
pub struct EventHub {
    tx: broadcast::Sender<ProgressEvent>,
}

impl EventHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUFFER);
        Self { tx }
    }

    /// Send an event to every current subscriber.
    pub fn emit(&self, event: ProgressEvent) {
        match event.level {
            EventLevel::Error => tracing::warn!(url = ?event.url, "{}", event.msg),
            _ => tracing::info!(url = ?event.url, "{}", event.msg),
        }
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_without_missing_url() {
        let json = serde_json::to_value(ProgressEvent::info("Browser launched")).unwrap();
        assert_eq!(json, serde_json::json!({"level": "info", "msg": "Browser launched"}));

        let json =
            serde_json::to_value(ProgressEvent::success("ok").with_url("https://site.test/"))
                .unwrap();
        assert_eq!(json["level"], "success");
        assert_eq!(json["url"], "https://site.test/");
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_events() {
        let hub = EventHub::new();
        let mut early = hub.subscribe();
        hub.emit(ProgressEvent::info("first"));

        let mut late = hub.subscribe();
        hub.emit(ProgressEvent::info("second"));

        assert_eq!(early.recv().await.unwrap().msg, "first");
        assert_eq!(early.recv().await.unwrap().msg, "second");
        assert_eq!(late.recv().await.unwrap().msg, "second");
        assert!(late.try_recv().is_err());
    }

    #[test]
    fn test_emit_without_subscribers_is_noop() {
        let hub = EventHub::new();
        assert_eq!(hub.subscriber_count(), 0);
        hub.emit(ProgressEvent::error("nobody listening"));
    }
}
