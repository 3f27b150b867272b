//! Telemetry and logging infrastructure
//!
//! Provides structured logging with tracing and pipeline timing statistics.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogConfig, LogGuard};
pub use metrics::{CounterSnapshot, PipelineCounters, ProcessingStats, ProcessingTimer};
