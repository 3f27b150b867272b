//! Shared state between API handlers and the processing pipeline

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;

use crate::events::ServerEvent;
use crate::pipeline::Pipeline;

/// Shared state accessible by API handlers
pub struct SharedState {
    pub pipeline: Pipeline,
    pub started_at: Instant,
}

pub type SharedStateHandle = Arc<SharedState>;

impl SharedState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            started_at: Instant::now(),
        }
    }

    pub fn handle(pipeline: Pipeline) -> SharedStateHandle {
        Arc::new(Self::new(pipeline))
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Subscribe to WebSocket events
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.pipeline.bus().subscribe()
    }

    /// Broadcast an event to all WebSocket clients
    pub fn broadcast(&self, event: ServerEvent) {
        self.pipeline.bus().broadcast(event);
    }

    /// Set auto-regeneration and tell every client
    pub fn set_auto_regenerate(&self, enabled: bool) -> bool {
        self.pipeline.gate().set_auto_regenerate(enabled);
        self.announce_auto_regenerate(enabled)
    }

    /// Flip auto-regeneration and tell every client
    pub fn toggle_auto_regenerate(&self) -> bool {
        let enabled = self.pipeline.gate().toggle_auto_regenerate();
        self.announce_auto_regenerate(enabled)
    }

    fn announce_auto_regenerate(&self, enabled: bool) -> bool {
        tracing::info!(enabled, "Auto-regeneration changed");
        self.broadcast(ServerEvent::AutoRegenerateChanged {
            auto_regenerate: enabled,
        });
        enabled
    }
}
