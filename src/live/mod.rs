//! Thread-safe live telemetry shared between the producer loop and the
//! HTTP readers.
//!
//! One struct behind one mutex: the producer mutates it once per tick,
//! readers clone a consistent snapshot out. The lock is only ever held
//! for the in-memory mutation, never across I/O.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

use crate::events::RingHistory;
use crate::models::{Event, EventKind, Reading};

/// Producer-side update applied atomically each tick.
#[derive(Debug, Clone, Copy)]
pub struct TickUpdate {
    pub reading: Reading,
    pub cooldown_ticks: u32,
}

/// Point-in-time copy of the live state. Readers only ever see the most
/// recent completed tick, never a torn mixture of two.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveSnapshot {
    pub latitude: f64,
    pub longitude: f64,
    pub speed_mps: f64,
    pub g_force: f64,
    pub g_force_history: Vec<f64>,
    pub pothole_detected: bool,
    pub pothole_confidence: f64,
    pub cooldown_ticks: u32,
    pub scanning: bool,
    pub session_id: Option<String>,
    pub latest_event: Option<Event>,
    pub pending_events: Vec<Event>,
}

#[derive(Debug)]
struct LiveStateInner {
    latitude: f64,
    longitude: f64,
    speed_mps: f64,
    g_force: f64,
    g_force_history: RingHistory,
    pothole_detected: bool,
    pothole_confidence: f64,
    cooldown_ticks: u32,
    scanning: bool,
    session_id: Option<String>,
    latest_event: Option<Event>,
    pending_events: Vec<Event>,
}

impl LiveStateInner {
    fn snapshot_with_pending(&self, pending: Vec<Event>) -> LiveSnapshot {
        LiveSnapshot {
            latitude: self.latitude,
            longitude: self.longitude,
            speed_mps: self.speed_mps,
            g_force: self.g_force,
            g_force_history: self.g_force_history.snapshot(),
            pothole_detected: self.pothole_detected,
            pothole_confidence: self.pothole_confidence,
            cooldown_ticks: self.cooldown_ticks,
            scanning: self.scanning,
            session_id: self.session_id.clone(),
            latest_event: self.latest_event.clone(),
            pending_events: pending,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LiveState {
    inner: Arc<Mutex<LiveStateInner>>,
}

impl LiveState {
    pub fn new(history_len: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LiveStateInner {
                latitude: 0.0,
                longitude: 0.0,
                speed_mps: 0.0,
                g_force: 0.0,
                g_force_history: RingHistory::new(history_len),
                pothole_detected: false,
                pothole_confidence: 0.0,
                cooldown_ticks: 0,
                scanning: false,
                session_id: None,
                latest_event: None,
                pending_events: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LiveStateInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Producer-only: replaces the telemetry fields atomically and
    /// appends the g-force sample to the trend ring. Once the cooldown
    /// reaches zero the detection flags clear back to idle.
    pub fn update(&self, tick: TickUpdate) {
        let mut state = self.lock();
        state.latitude = tick.reading.latitude;
        state.longitude = tick.reading.longitude;
        state.speed_mps = tick.reading.speed_mps;
        state.g_force = tick.reading.g_force;
        state.g_force_history.push(tick.reading.g_force);
        state.cooldown_ticks = tick.cooldown_ticks;
        if tick.cooldown_ticks == 0 {
            state.pothole_detected = false;
            state.pothole_confidence = 0.0;
        }
    }

    /// Producer-only: records a freshly persisted event. It stays in
    /// the pending queue until a poller drains it.
    pub fn record_event(&self, event: Event) {
        let mut state = self.lock();
        if event.kind == EventKind::Pothole {
            state.pothole_detected = true;
            state.pothole_confidence = event.confidence.unwrap_or(0.0);
        }
        state.latest_event = Some(event.clone());
        state.pending_events.push(event);
    }

    pub fn set_scanning(&self, scanning: bool, session_id: Option<String>) {
        let mut state = self.lock();
        state.scanning = scanning;
        state.session_id = session_id;
    }

    /// Consistent point-in-time copy; pending events are included but
    /// not cleared.
    pub fn snapshot(&self) -> LiveSnapshot {
        let state = self.lock();
        let pending = state.pending_events.clone();
        state.snapshot_with_pending(pending)
    }

    /// Returns and clears the pending event list atomically.
    ///
    /// Consume-once: events returned here are gone from the live state
    /// (they remain in the durable store). There must be exactly one
    /// polling consumer; concurrent pollers would silently steal each
    /// other's events.
    pub fn drain_pending_events(&self) -> Vec<Event> {
        std::mem::take(&mut self.lock().pending_events)
    }

    /// Snapshot and drain under a single lock acquisition. This is the
    /// call the registered poller uses.
    pub fn poll(&self) -> LiveSnapshot {
        let mut state = self.lock();
        let pending = std::mem::take(&mut state.pending_events);
        state.snapshot_with_pending(pending)
    }
}
