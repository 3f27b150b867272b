//! Regeneration throttling
//!
//! [`RegenerationGate`] is the only way to start a transformation. It wraps
//! [`RegenerationPolicy`] in a mutex so the in-progress check and claim
//! happen together, and hands out a [`TransformPermit`] that must be
//! completed with an outcome.

pub mod policy;
pub mod scheduler;

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

pub use policy::{Outcome, PolicyStatus, Refusal, RegenerationPolicy, TickDecision};
pub use scheduler::spawn_regeneration_loop;

/// Shared, thread-safe regeneration policy
#[derive(Debug)]
pub struct RegenerationGate {
    policy: Mutex<RegenerationPolicy>,
}

impl RegenerationGate {
    pub fn new(policy: RegenerationPolicy) -> Arc<Self> {
        Arc::new(Self {
            policy: Mutex::new(policy),
        })
    }

    pub fn try_begin(self: &Arc<Self>, now: Instant) -> Result<TransformPermit, Refusal> {
        self.policy.lock().try_begin(now)?;
        Ok(TransformPermit {
            gate: Arc::clone(self),
            finished: false,
        })
    }

    pub fn tick(&self, now: Instant) -> TickDecision {
        self.policy.lock().tick(now)
    }

    pub fn status(&self, now: Instant) -> PolicyStatus {
        self.policy.lock().status(now)
    }

    pub fn is_auto_regenerate(&self) -> bool {
        self.policy.lock().is_auto_regenerate()
    }

    pub fn set_auto_regenerate(&self, enabled: bool) {
        self.policy.lock().set_auto_regenerate(enabled);
    }

    pub fn toggle_auto_regenerate(&self) -> bool {
        self.policy.lock().toggle_auto_regenerate()
    }

    fn finish(&self, now: Instant, outcome: Outcome) {
        self.policy.lock().finish(now, outcome);
    }
}

/// Claim on the single transformation slot.
/// Dropping it without calling [`complete`](Self::complete) records a failure.
#[derive(Debug)]
#[must_use = "a permit releases the slot only when completed or dropped"]
pub struct TransformPermit {
    gate: Arc<RegenerationGate>,
    finished: bool,
}

impl TransformPermit {
    pub fn complete(mut self, now: Instant, outcome: Outcome) {
        self.finished = true;
        self.gate.finish(now, outcome);
    }
}

impl Drop for TransformPermit {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!("Transformation abandoned, recording as failed");
            self.gate.finish(Instant::now(), Outcome::Failed);
        }
    }
}
