//! API request/response types
//!
//! These types are used for JSON serialization in API endpoints.

use serde::{Deserialize, Serialize};

use crate::regen::PolicyStatus;
use crate::telemetry::{CounterSnapshot, ProcessingStats};

// ============================================================================
// Status Types
// ============================================================================

/// Server status response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub tracker_ready: bool,
    pub auto_regenerate: bool,
    pub connected_clients: usize,
}

/// Performance metrics response
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceResponse {
    pub tracking: ProcessingStats,
    pub generation: ProcessingStats,
    pub counters: CounterSnapshot,
}

// ============================================================================
// Regeneration Types
// ============================================================================

/// Regeneration policy state
#[derive(Debug, Clone, Serialize)]
pub struct RegenerationResponse {
    #[serde(flatten)]
    pub status: PolicyStatus,
}

/// Update auto-regeneration
#[derive(Debug, Clone, Deserialize)]
pub struct RegenerationUpdateRequest {
    pub auto_regenerate: bool,
}

// ============================================================================
// Error Types
// ============================================================================

/// API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}
