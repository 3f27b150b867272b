//! Pipeline timing statistics and counters

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Tracking duration statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessingStats {
    /// Average processing time in milliseconds
    pub avg_ms: f64,
    /// Minimum processing time in milliseconds
    pub min_ms: f64,
    /// Maximum processing time in milliseconds
    pub max_ms: f64,
    /// 95th percentile processing time
    pub p95_ms: f64,
    /// Number of samples in the statistics
    pub sample_count: usize,
}

/// Rolling window of per-frame processing durations
pub struct ProcessingTimer {
    samples: VecDeque<Duration>,
    max_samples: usize,
}

impl Default for ProcessingTimer {
    fn default() -> Self {
        Self::new(100)
    }
}

impl ProcessingTimer {
    /// Create a timer keeping at most `max_samples` durations
    pub fn new(max_samples: usize) -> Self {
        let max_samples = max_samples.max(1);
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples,
        }
    }

    /// Record one processing duration, evicting the oldest when full
    pub fn record(&mut self, duration: Duration) {
        self.samples.push_back(duration);
        if self.samples.len() > self.max_samples {
            self.samples.pop_front();
        }
    }

    /// Get processing time statistics
    pub fn stats(&self) -> ProcessingStats {
        if self.samples.is_empty() {
            return ProcessingStats::default();
        }

        let mut times: Vec<f64> = self
            .samples
            .iter()
            .map(|d| d.as_secs_f64() * 1000.0)
            .collect();
        times.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let sum: f64 = times.iter().sum();

        ProcessingStats {
            avg_ms: sum / times.len() as f64,
            min_ms: times.first().copied().unwrap_or(0.0),
            max_ms: times.last().copied().unwrap_or(0.0),
            p95_ms: percentile(&times, 0.95),
            sample_count: times.len(),
        }
    }
}

/// Calculate percentile from sorted array
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() - 1) as f64 * p) as usize;
    sorted[idx]
}

/// Monotonic pipeline counters shared between tasks
#[derive(Debug, Default)]
pub struct PipelineCounters {
    frames: AtomicU64,
    transforms_started: AtomicU64,
    transforms_completed: AtomicU64,
    transforms_failed: AtomicU64,
    transforms_refused: AtomicU64,
    last_generation_ms: AtomicU64,
}

/// Point-in-time copy of [`PipelineCounters`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub frames: u64,
    pub transforms_started: u64,
    pub transforms_completed: u64,
    pub transforms_failed: u64,
    pub transforms_refused: u64,
    pub last_generation_ms: u64,
}

impl PipelineCounters {
    pub fn frame(&self) {
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn started(&self) {
        self.transforms_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn refused(&self) {
        self.transforms_refused.fetch_add(1, Ordering::Relaxed);
    }

    pub fn completed(&self, took: Duration) {
        self.transforms_completed.fetch_add(1, Ordering::Relaxed);
        self.last_generation_ms
            .store(took.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn failed(&self) {
        self.transforms_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            frames: self.frames.load(Ordering::Relaxed),
            transforms_started: self.transforms_started.load(Ordering::Relaxed),
            transforms_completed: self.transforms_completed.load(Ordering::Relaxed),
            transforms_failed: self.transforms_failed.load(Ordering::Relaxed),
            transforms_refused: self.transforms_refused.load(Ordering::Relaxed),
            last_generation_ms: self.last_generation_ms.load(Ordering::Relaxed),
        }
    }
}
