//! Regeneration throttling state machine
//!
//! Pure logic with time passed in, so every rule can be exercised without
//! sleeping.

use std::time::{Duration, Instant};

use serde::Serialize;

/// Result of a periodic tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDecision {
    Idle,
    /// Ask connected clients for a fresh frame
    RequestFrame,
}

/// Why a transformation was not started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Refusal {
    InFlight,
    TooSoon {
        #[serde(serialize_with = "serialize_secs")]
        remaining: Duration,
    },
}

impl std::fmt::Display for Refusal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Refusal::InFlight => write!(f, "transformation already in progress"),
            Refusal::TooSoon { remaining } => {
                write!(f, "next transformation allowed in {:.1}s", remaining.as_secs_f64())
            }
        }
    }
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// How a transformation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed,
}

/// Observable policy state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyStatus {
    pub auto_regenerate: bool,
    pub in_progress: bool,
    pub has_output: bool,
    pub interval_secs: f64,
    /// Seconds since the last completed transformation
    pub since_last_secs: Option<f64>,
    /// Seconds until the interval has elapsed; zero when already allowed
    pub next_allowed_in_secs: f64,
}

#[derive(Debug, Clone)]
pub struct RegenerationPolicy {
    interval: Duration,
    auto_regenerate: bool,
    in_progress: bool,
    has_output: bool,
    last_completed: Option<Instant>,
}

impl RegenerationPolicy {
    pub fn new(interval: Duration, auto_regenerate: bool) -> Self {
        Self {
            interval,
            auto_regenerate,
            in_progress: false,
            has_output: false,
            last_completed: None,
        }
    }

    pub fn is_auto_regenerate(&self) -> bool {
        self.auto_regenerate
    }

    pub fn is_in_progress(&self) -> bool {
        self.in_progress
    }

    pub fn has_output(&self) -> bool {
        self.has_output
    }

    fn remaining(&self, now: Instant) -> Duration {
        match self.last_completed {
            Some(last) => self.interval.saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }

    pub fn tick(&self, now: Instant) -> TickDecision {
        if self.auto_regenerate
            && self.has_output
            && !self.in_progress
            && self.remaining(now).is_zero()
        {
            TickDecision::RequestFrame
        } else {
            TickDecision::Idle
        }
    }

    /// Check and claim the in-progress guard in one step
    pub fn try_begin(&mut self, now: Instant) -> Result<(), Refusal> {
        if self.in_progress {
            return Err(Refusal::InFlight);
        }
        if self.has_output {
            let remaining = self.remaining(now);
            if !remaining.is_zero() {
                return Err(Refusal::TooSoon { remaining });
            }
        }
        self.in_progress = true;
        Ok(())
    }

    pub fn finish(&mut self, now: Instant, outcome: Outcome) {
        self.in_progress = false;
        self.last_completed = Some(now);
        if outcome == Outcome::Succeeded {
            self.has_output = true;
        }
    }

    pub fn set_auto_regenerate(&mut self, enabled: bool) {
        self.auto_regenerate = enabled;
    }

    /// Flip auto-regeneration and return the new value
    pub fn toggle_auto_regenerate(&mut self) -> bool {
        self.auto_regenerate = !self.auto_regenerate;
        self.auto_regenerate
    }

    pub fn status(&self, now: Instant) -> PolicyStatus {
        PolicyStatus {
            auto_regenerate: self.auto_regenerate,
            in_progress: self.in_progress,
            has_output: self.has_output,
            interval_secs: self.interval.as_secs_f64(),
            since_last_secs: self
                .last_completed
                .map(|last| now.saturating_duration_since(last).as_secs_f64()),
            next_allowed_in_secs: if self.has_output {
                self.remaining(now).as_secs_f64()
            } else {
                0.0
            },
        }
    }
}
