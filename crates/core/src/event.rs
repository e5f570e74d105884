//! Domain event system — decoupled observation of turn processing.
//!
//! Events are published when something interesting happens to a session.
//! Subscribers (CLI status output, audit sinks, tests) react without tight
//! coupling to the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A session entry was created in the store
    SessionCreated {
        session_id: String,
        assessment_mode: bool,
        timestamp: DateTime<Utc>,
    },

    /// A session was removed, expired, or evicted for capacity
    SessionEvicted {
        session_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// The caller toggled assessment mode and the session was hard-reset
    ModeReset {
        session_id: String,
        assessment_mode: bool,
        timestamp: DateTime<Utc>,
    },

    /// An assessment answer was recorded
    AssessmentAnswered {
        session_id: String,
        questions_asked: usize,
        total_questions: usize,
        timestamp: DateTime<Utc>,
    },

    /// The final assessment answer was recorded
    AssessmentCompleted {
        session_id: String,
        responses: usize,
        timestamp: DateTime<Utc>,
    },

    /// The dialogue backend failed and a deterministic fallback was returned
    DialogueFallback {
        session_id: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// A turn finished processing
    TurnProcessed {
        session_id: String,
        final_sentiment: String,
        confidence: f64,
        /// Backend that answered; `None` when the fallback reply was used
        answered_by: Option<String>,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::AssessmentCompleted {
            session_id: "s-1".into(),
            responses: 5,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::AssessmentCompleted {
                session_id,
                responses,
                ..
            } => {
                assert_eq!(session_id, "s-1");
                assert_eq!(*responses, 5);
            }
            _ => panic!("Expected AssessmentCompleted event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(DomainEvent::DialogueFallback {
            session_id: "s-1".into(),
            error_message: "no subscribers".into(),
            timestamp: Utc::now(),
        });
    }
}
