//! Event types and the per-survey notification hub
//!
//! Events are broadcast per survey handle and can be serialized for SSE
//! transmission. Publishing is fire-and-forget: a survey with no connected
//! subscribers drops the event without error, and a failed publish must
//! never fail the write that triggered it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::broadcast;
use tracing::debug;

/// Survey event types
///
/// All events use this central enum for type safety and exhaustive matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SurveyEvent {
    /// An answer was persisted for a live respondent
    ///
    /// Triggers:
    /// - SSE: update response-monitoring UIs
    AnswerRecorded {
        /// External handle of the survey
        survey_handle: String,
        /// Question the answer belongs to
        question_id: uuid::Uuid,
        /// Respondent description (account or anonymous+address)
        respondent: String,
        /// When the answer was persisted
        timestamp: DateTime<Utc>,
    },

    /// A respondent finished the survey: every one of their answers now
    /// carries `complete = true`
    ///
    /// Triggers:
    /// - SSE: update completion counters
    /// - Outer layers: transactional email, analytics refresh
    SurveyCompleted {
        /// External handle of the survey
        survey_handle: String,
        /// Respondent description (account or anonymous+address)
        respondent: String,
        /// When completion was detected
        timestamp: DateTime<Utc>,
    },
}

impl SurveyEvent {
    /// Event type string for the SSE `event:` field
    pub fn type_str(&self) -> &'static str {
        match self {
            SurveyEvent::AnswerRecorded { .. } => "AnswerRecorded",
            SurveyEvent::SurveyCompleted { .. } => "SurveyCompleted",
        }
    }

    /// Handle of the survey this event is scoped to
    pub fn survey_handle(&self) -> &str {
        match self {
            SurveyEvent::AnswerRecorded { survey_handle, .. } => survey_handle,
            SurveyEvent::SurveyCompleted { survey_handle, .. } => survey_handle,
        }
    }
}

/// One-to-many event broadcaster for a single survey handle
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SurveyEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<SurveyEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: SurveyEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Notification hub grouping event buses by survey handle
///
/// `publish(handle, event)` reaches zero or more subscribers currently
/// listening on that handle.
pub struct NotificationHub {
    buses: RwLock<HashMap<String, EventBus>>,
    capacity: usize,
}

impl NotificationHub {
    /// Create a hub; `capacity` is the per-handle broadcast buffer size
    pub fn new(capacity: usize) -> Self {
        Self {
            buses: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// Subscribe to events for one survey handle, creating its bus on demand
    pub fn subscribe(&self, handle: &str) -> broadcast::Receiver<SurveyEvent> {
        let mut buses = self.buses.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        buses
            .entry(handle.to_string())
            .or_insert_with(|| EventBus::new(self.capacity))
            .subscribe()
    }

    /// Publish an event to every subscriber of one survey handle
    ///
    /// Returns the number of subscribers the event reached. Zero subscribers
    /// is a normal outcome, not an error.
    pub fn publish(&self, handle: &str, event: SurveyEvent) -> usize {
        let buses = self.buses.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        match buses.get(handle) {
            Some(bus) => {
                let count = bus.subscriber_count();
                debug!("Publishing {} to {} subscriber(s) of {}", event.type_str(), count, handle);
                bus.emit_lossy(event);
                count
            }
            None => {
                debug!("No subscribers for survey {}, dropping {}", handle, event.type_str());
                0
            }
        }
    }

    /// Current subscriber count for one survey handle
    pub fn subscriber_count(&self, handle: &str) -> usize {
        let buses = self.buses.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        buses.get(handle).map(EventBus::subscriber_count).unwrap_or(0)
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn completed_event(handle: &str) -> SurveyEvent {
        SurveyEvent::SurveyCompleted {
            survey_handle: handle.to_string(),
            respondent: "account:test".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn publish_without_subscribers_is_a_no_op() {
        let hub = NotificationHub::new(16);
        assert_eq!(hub.publish("nobody-home", completed_event("nobody-home")), 0);
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let hub = NotificationHub::new(16);
        let mut rx = hub.subscribe("abc123");

        assert_eq!(hub.publish("abc123", completed_event("abc123")), 1);

        let received = rx.recv().await.unwrap();
        match received {
            SurveyEvent::SurveyCompleted { survey_handle, .. } => {
                assert_eq!(survey_handle, "abc123");
            }
            other => panic!("Wrong event type received: {:?}", other),
        }
    }

    #[tokio::test]
    async fn handles_are_isolated() {
        let hub = NotificationHub::new(16);
        let mut rx_a = hub.subscribe("survey-a");
        let _rx_b = hub.subscribe("survey-b");

        hub.publish("survey-b", completed_event("survey-b"));

        // survey-a subscriber must not see survey-b traffic
        assert!(rx_a.try_recv().is_err());
    }

    #[test]
    fn subscriber_count_tracks_per_handle() {
        let hub = NotificationHub::new(16);
        assert_eq!(hub.subscriber_count("s"), 0);
        let _rx1 = hub.subscribe("s");
        let _rx2 = hub.subscribe("s");
        assert_eq!(hub.subscriber_count("s"), 2);
    }
}
