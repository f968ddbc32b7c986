//! Couples the durable row store with session-scoped media files.
//!
//! Every persisted event is at most two artifacts: a row in `events`
//! and, for detections with a frame, an image file under the session
//! directory. The image is written first; if that fails the row is
//! never inserted, so the store can hold an orphaned file after a crash
//! but never a row pointing at a missing file.

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::Database;
use crate::error::ScanError;
use crate::models::{Detection, Event, Reading, ScanSession};

/// One line of the per-session metadata log, mapping a saved image to
/// the reading and detections that produced it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FrameMetadata<'a> {
    filename: &'a str,
    captured_at: DateTime<Utc>,
    latitude: f64,
    longitude: f64,
    detections: &'a [Detection],
}

#[derive(Clone)]
pub struct EventStore {
    db: Database,
    data_root: PathBuf,
}

impl EventStore {
    pub fn new(db: Database, data_root: impl Into<PathBuf>) -> Self {
        Self {
            db,
            data_root: data_root.into(),
        }
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Allocates the session directory, keyed by start time. The single
    /// active session invariant is enforced by the scanner controller,
    /// which serializes start/stop.
    pub fn create_session(&self, started_at: DateTime<Utc>) -> Result<ScanSession> {
        let id = ScanSession::id_for(started_at);
        let data_dir = self.data_root.join(&id);
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create session directory {}", data_dir.display()))?;

        Ok(ScanSession {
            id,
            started_at,
            data_dir,
        })
    }

    /// Persists one event, writing the image (if any) before the row.
    /// Returns the stored event with its row id and image reference
    /// filled in. On any failure nothing is partially recorded and the
    /// caller drops the event.
    pub async fn append_event(
        &self,
        session: &ScanSession,
        mut event: Event,
        image: Option<&[u8]>,
    ) -> Result<Event, ScanError> {
        if let Some(bytes) = image {
            let filename = format!("frame_{}.jpg", event.occurred_at.timestamp_millis());
            let path = session.data_dir.join(&filename);
            fs::write(&path, bytes).map_err(|err| {
                ScanError::Persistence(format!("failed to write {}: {err}", path.display()))
            })?;
            event.image_file = Some(filename);
        }

        event.session_id = Some(session.id.clone());

        let id = self
            .db
            .insert_event(&event)
            .await
            .map_err(|err| ScanError::Persistence(format!("failed to insert event row: {err:#}")))?;

        event.id = Some(id);
        Ok(event)
    }

    /// Appends one metadata line for a saved frame. Failure here is
    /// logged by the caller but does not invalidate the event itself.
    pub fn append_frame_metadata(
        &self,
        session: &ScanSession,
        filename: &str,
        reading: &Reading,
        detections: &[Detection],
    ) -> Result<()> {
        let line = serde_json::to_string(&FrameMetadata {
            filename,
            captured_at: reading.captured_at,
            latitude: reading.latitude,
            longitude: reading.longitude,
            detections,
        })
        .context("failed to serialize frame metadata")?;

        let path = session.data_dir.join("metadata.jsonl");
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        writeln!(file, "{line}").with_context(|| format!("failed to append to {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventKind;
    use chrono::TimeZone;

    fn store(dir: &tempfile::TempDir) -> EventStore {
        let db = Database::new(dir.path().join("test.sqlite3")).expect("db should open");
        EventStore::new(db, dir.path().join("data"))
    }

    fn pothole_event(occurred_at: DateTime<Utc>) -> Event {
        Event {
            id: None,
            kind: EventKind::Pothole,
            latitude: 12.9716,
            longitude: 77.5946,
            occurred_at,
            session_id: None,
            image_file: None,
            confidence: Some(0.8),
        }
    }

    #[tokio::test]
    async fn append_writes_image_then_row() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let started = Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap();
        let session = store.create_session(started).unwrap();

        let stored = store
            .append_event(&session, pothole_event(started), Some(b"jpegbytes"))
            .await
            .unwrap();

        let filename = stored.image_file.as_deref().expect("image reference set");
        assert!(session.data_dir.join(filename).exists());
        assert_eq!(stored.session_id.as_deref(), Some(session.id.as_str()));
        assert_eq!(store.db().count_events().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn failed_image_write_leaves_no_row() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let started = Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap();
        let session = store.create_session(started).unwrap();

        // Make the image write fail by removing the session directory.
        fs::remove_dir_all(&session.data_dir).unwrap();

        let result = store
            .append_event(&session, pothole_event(started), Some(b"jpegbytes"))
            .await;

        assert!(matches!(result, Err(ScanError::Persistence(_))));
        assert_eq!(store.db().count_events().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn imageless_events_only_get_a_row() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let started = Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap();
        let session = store.create_session(started).unwrap();

        let mut event = pothole_event(started);
        event.kind = EventKind::Impact;
        event.confidence = Some(2.4);

        let stored = store.append_event(&session, event, None).await.unwrap();
        assert!(stored.image_file.is_none());
        assert_eq!(store.db().count_events().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn metadata_log_accumulates_lines() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let started = Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap();
        let session = store.create_session(started).unwrap();

        let reading = Reading {
            latitude: 1.0,
            longitude: 2.0,
            speed_mps: 10.0,
            g_force: 0.9,
            captured_at: started,
        };
        let detections = vec![Detection {
            label: "Pothole".to_string(),
            confidence: 0.8,
        }];

        store
            .append_frame_metadata(&session, "frame_1.jpg", &reading, &detections)
            .unwrap();
        store
            .append_frame_metadata(&session, "frame_2.jpg", &reading, &detections)
            .unwrap();

        let contents = fs::read_to_string(session.data_dir.join("metadata.jsonl")).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("frame_1.jpg"));
        let parsed: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed["filename"], "frame_2.jpg");
    }
}
