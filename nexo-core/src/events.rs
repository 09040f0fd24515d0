//! Typed notifications for the shell.
//!
//! Alerts, health changes and configuration changes are published on an
//! [`EventBus`]. Publishing never blocks and never fails; events sent while
//! nobody listens are dropped.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// Buffered events per subscriber before the oldest are dropped.
const EVENT_CAPACITY: usize = 256;

/// An event emitted by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NexoEvent {
    /// Monthly spend reached the alert threshold.
    CostAlert {
        /// Provider name.
        provider: String,
        /// Spend for the current month (USD).
        current_cost: f64,
        /// Monthly limit (USD).
        limit: f64,
        /// `current_cost / limit * 100`.
        percentage: f64,
    },
    /// Monthly spend reached the limit itself.
    CostLimitExceeded {
        /// Provider name.
        provider: String,
        /// Spend for the current month (USD).
        current_cost: f64,
        /// Monthly limit (USD).
        limit: f64,
    },
    /// A provider's availability flipped.
    ProviderHealthChanged {
        /// Provider name.
        provider: String,
        /// New availability.
        available: bool,
    },
    /// A provider was (re)configured.
    ProviderConfigured {
        /// Provider name.
        provider: String,
    },
    /// The active provider changed.
    ActiveProviderChanged {
        /// New active provider, if any.
        provider: Option<String>,
    },
    /// A configuration document was imported.
    ConfigurationImported,
}

/// Broadcast channel for [`NexoEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<NexoEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Creates a bus with no subscribers.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    /// Publishes an event.
    pub fn emit(&self, event: NexoEvent) {
        trace!(event = ?event, "Emitting event");
        let _ = self.sender.send(event);
    }

    /// Subscribes to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<NexoEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_without_subscribers_is_silent() {
        let bus = EventBus::new();
        bus.emit(NexoEvent::ConfigurationImported);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_events_in_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.emit(NexoEvent::ProviderConfigured {
            provider: "openai".to_string(),
        });
        bus.emit(NexoEvent::ActiveProviderChanged {
            provider: Some("openai".to_string()),
        });

        assert_eq!(
            rx.recv().await.unwrap(),
            NexoEvent::ProviderConfigured {
                provider: "openai".to_string()
            }
        );
        assert!(matches!(
            rx.recv().await.unwrap(),
            NexoEvent::ActiveProviderChanged { .. }
        ));
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let event = NexoEvent::ProviderHealthChanged {
            provider: "ollama".to_string(),
            available: false,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "provider_health_changed");
        assert_eq!(json["available"], false);
    }
}
