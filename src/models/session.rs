use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Serialize;

/// Session directories are named by their start time so they sort
/// chronologically and the retention pass can derive their age.
pub const SESSION_ID_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// One contiguous scanning interval. At most one session is active at a
/// time; the scanner controller enforces that, not this type.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSession {
    pub id: String,
    pub started_at: DateTime<Utc>,
    #[serde(skip)]
    pub data_dir: PathBuf,
}

impl ScanSession {
    pub fn id_for(started_at: DateTime<Utc>) -> String {
        started_at.format(SESSION_ID_FORMAT).to_string()
    }
}

/// Recovers the start time from a session directory name. Falls back to
/// the date prefix so directories from older layouts still get an age;
/// anything else is unparseable and the caller should skip it.
pub fn parse_session_timestamp(name: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(name, SESSION_ID_FORMAT) {
        return Some(dt);
    }

    let prefix = name.split('_').next()?;
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN))
}
