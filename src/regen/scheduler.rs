//! Periodic auto-regeneration loop

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};

use super::{RegenerationGate, TickDecision};
use crate::events::{EventBus, ServerEvent};

/// Spawn the loop that asks viewers for a fresh frame whenever the gate
/// allows a regeneration. The model is never called from here; the frame
/// that comes back goes through the normal pipeline.
pub fn spawn_regeneration_loop(
    gate: Arc<RegenerationGate>,
    bus: EventBus,
    tick: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(tick_ms = tick.as_millis() as u64, "Regeneration loop started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if gate.tick(Instant::now().into_std()) == TickDecision::RequestFrame {
                        tracing::debug!("Requesting frame for regeneration");
                        bus.broadcast(ServerEvent::RegenerationStarted);
                        bus.broadcast(ServerEvent::RequestFrameForRegeneration);
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Regeneration loop stopped");
    })
}
