//! Event row queries, run on the database worker thread.

use std::fmt::Write as _;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;

use super::{kind_from_str, parse_datetime, Database};
use crate::models::Event;

const EVENT_COLUMNS: &str =
    "id, kind, latitude, longitude, occurred_at, session_id, image_file, confidence";

fn row_to_event(row: &Row<'_>) -> Result<Event> {
    Ok(Event {
        id: Some(row.get::<_, i64>(0)?),
        kind: kind_from_str(&row.get::<_, String>(1)?)?,
        latitude: row.get(2)?,
        longitude: row.get(3)?,
        occurred_at: parse_datetime(&row.get::<_, String>(4)?)?,
        session_id: row.get(5)?,
        image_file: row.get(6)?,
        confidence: row.get(7)?,
    })
}

/// UTC day boundaries as RFC 3339 strings. RFC 3339 timestamps with a
/// fixed +00:00 offset compare correctly as strings, so the range scan
/// stays on the `occurred_at` index.
fn day_bounds(day: NaiveDate) -> (String, String) {
    let start = day.and_time(NaiveTime::MIN).and_utc();
    let end = start + Duration::days(1);
    (start.to_rfc3339(), end.to_rfc3339())
}

/// Aggregate counts, recomputed at query time.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SummaryStats {
    pub total: i64,
    pub today: i64,
    pub last_7_days: i64,
}

impl Database {
    pub async fn insert_event(&self, event: &Event) -> Result<i64> {
        let record = event.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO events (kind, latitude, longitude, occurred_at, session_id, image_file, confidence)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.kind.as_str(),
                    record.latitude,
                    record.longitude,
                    record.occurred_at.to_rfc3339(),
                    record.session_id,
                    record.image_file,
                    record.confidence,
                ],
            )
            .with_context(|| "failed to insert event")?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// Events ordered by occurrence time descending, optionally limited
    /// to one UTC day.
    pub async fn list_events(&self, date: Option<NaiveDate>) -> Result<Vec<Event>> {
        self.execute(move |conn| {
            let mut events = Vec::new();

            match date {
                Some(day) => {
                    let (start, end) = day_bounds(day);
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {EVENT_COLUMNS} FROM events
                         WHERE occurred_at >= ?1 AND occurred_at < ?2
                         ORDER BY occurred_at DESC"
                    ))?;
                    let mut rows = stmt.query(params![start, end])?;
                    while let Some(row) = rows.next()? {
                        events.push(row_to_event(row)?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {EVENT_COLUMNS} FROM events ORDER BY occurred_at DESC"
                    ))?;
                    let mut rows = stmt.query([])?;
                    while let Some(row) = rows.next()? {
                        events.push(row_to_event(row)?);
                    }
                }
            }

            Ok(events)
        })
        .await
    }

    pub async fn event_by_id(&self, id: i64) -> Result<Option<Event>> {
        self.execute(move |conn| {
            conn.query_row(
                &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1"),
                params![id],
                |row| Ok(row_to_event(row)),
            )
            .optional()
            .with_context(|| format!("failed to load event {id}"))?
            .transpose()
        })
        .await
    }

    /// Counts against a caller-supplied "now" so the aggregates are
    /// deterministic under test.
    pub async fn summary(&self, now: DateTime<Utc>) -> Result<SummaryStats> {
        let start_of_today = now.date_naive().and_time(NaiveTime::MIN).and_utc();
        let start_of_window = start_of_today - Duration::days(7);

        self.execute(move |conn| {
            let count_since = |bound: Option<String>| -> Result<i64> {
                match bound {
                    Some(since) => conn
                        .query_row(
                            "SELECT COUNT(*) FROM events WHERE occurred_at >= ?1",
                            params![since],
                            |row| row.get(0),
                        )
                        .with_context(|| "failed to count events"),
                    None => conn
                        .query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))
                        .with_context(|| "failed to count events"),
                }
            };

            Ok(SummaryStats {
                total: count_since(None)?,
                today: count_since(Some(start_of_today.to_rfc3339()))?,
                last_7_days: count_since(Some(start_of_window.to_rfc3339()))?,
            })
        })
        .await
    }

    /// Full tabular dump, newest first, in the declared column order.
    pub async fn export_csv(&self) -> Result<String> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, latitude, longitude, occurred_at, confidence
                 FROM events ORDER BY occurred_at DESC",
            )?;

            let mut out = String::from("ID,Latitude,Longitude,Timestamp,Confidence\n");
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let id: i64 = row.get(0)?;
                let latitude: f64 = row.get(1)?;
                let longitude: f64 = row.get(2)?;
                let occurred_at: String = row.get(3)?;
                let confidence: Option<f64> = row.get(4)?;

                write!(out, "{id},{latitude},{longitude},{occurred_at},")?;
                if let Some(confidence) = confidence {
                    write!(out, "{confidence}")?;
                }
                out.push('\n');
            }

            Ok(out)
        })
        .await
    }

    /// Deletes event rows older than the cutoff, returning the count.
    pub async fn delete_events_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        self.execute(move |conn| {
            conn.execute(
                "DELETE FROM events WHERE occurred_at < ?1",
                params![cutoff.to_rfc3339()],
            )
            .with_context(|| "failed to delete expired events")
        })
        .await
    }

    pub async fn count_events(&self) -> Result<i64> {
        self.execute(|conn| {
            conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))
                .with_context(|| "failed to count events")
        })
        .await
    }
}
