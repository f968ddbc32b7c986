use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Pothole,
    Impact,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Pothole => "POTHOLE",
            EventKind::Impact => "IMPACT",
        }
    }
}

/// A single debounced detection, immutable once written to the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Row id; `None` until the store has assigned one.
    pub id: Option<i64>,
    pub kind: EventKind,
    pub latitude: f64,
    pub longitude: f64,
    pub occurred_at: DateTime<Utc>,
    pub session_id: Option<String>,
    /// Filename of the saved frame, relative to the session directory.
    pub image_file: Option<String>,
    pub confidence: Option<f64>,
}
