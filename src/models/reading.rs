use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One tick's worth of telemetry from the signal source.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub latitude: f64,
    pub longitude: f64,
    pub speed_mps: f64,
    pub g_force: f64,
    pub captured_at: DateTime<Utc>,
}

/// A single detection returned by the vision model for one frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub label: String,
    pub confidence: f64,
}
