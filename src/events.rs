//! Events pushed to connected viewers

use serde::Serialize;
use tokio::sync::broadcast;

use crate::tracking::VisibleLandmark;

/// Capacity of the broadcast channel; slow clients skip older events
const EVENT_CAPACITY: usize = 64;

/// Server-to-client WebSocket event, serialized as `{"type": ..., "data": ...}`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Greeting sent to a newly connected client only
    Connected { status: String },
    TrackingResults {
        is_person_detected: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        landmarks: Option<Vec<VisibleLandmark>>,
    },
    TransformationStarted,
    /// Stylized frame as a JPEG data URL
    TransformationResult { image: String },
    TransformationError { error: String },
    ProcessingError { error: String },
    RegenerationStarted,
    RequestFrameForRegeneration,
    AutoRegenerateChanged { auto_regenerate: bool },
}

/// Fan-out of [`ServerEvent`]s to every subscriber
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ServerEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.tx.subscribe()
    }

    /// Send to all subscribers; having none is fine
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
