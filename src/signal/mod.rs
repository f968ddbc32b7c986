//! Telemetry acquisition seam.
//!
//! The scan loop only sees the `SignalSource` trait; the shipped
//! implementation simulates a platform driving a circular track, which
//! is also what the upstream hardware rig degrades to when no GPS/IMU
//! is attached.

use chrono::{DateTime, Utc};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::error::ScanError;
use crate::models::Reading;

pub trait SignalSource: Send {
    /// One reading per tick. `captured_at` must be monotonically
    /// non-decreasing across calls. A failed read means the tick is
    /// skipped and prior values are retained.
    fn read(&mut self) -> Result<Reading, ScanError>;
}

/// Simulated GPS/OBD/IMU feed: a slow circle around a fixed center,
/// gently varying speed, and a baseline g-force with a bump roughly
/// every ten seconds.
pub struct SimulatedSignals {
    angle: f64,
    center_lat: f64,
    center_lon: f64,
    radius: f64,
    rng: StdRng,
    last_captured_at: Option<DateTime<Utc>>,
}

impl SimulatedSignals {
    pub fn new() -> Self {
        Self {
            angle: 0.0,
            center_lat: 12.9716,
            center_lon: 77.5946,
            radius: 0.01,
            rng: StdRng::from_entropy(),
            last_captured_at: None,
        }
    }
}

impl Default for SimulatedSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalSource for SimulatedSignals {
    fn read(&mut self) -> Result<Reading, ScanError> {
        self.angle += 1e-4;

        let latitude = self.center_lat + self.radius * self.angle.cos();
        let longitude = self.center_lon + self.radius * self.angle.sin();
        let speed_kmh = 45.0 + 5.0 * (self.angle * 10.0).sin();

        let mut g_force =
            0.8 + 0.2 * (self.angle * 50.0).sin() + self.rng.gen_range(-0.05..0.05);

        let mut captured_at = Utc::now();
        // Fake a hard bump roughly every ten seconds.
        if captured_at.timestamp() % 10 == 0 {
            g_force += 1.5;
        }

        // Clamp against clock steps so consumers can rely on ordering.
        if let Some(last) = self.last_captured_at {
            if captured_at < last {
                captured_at = last;
            }
        }
        self.last_captured_at = Some(captured_at);

        Ok(Reading {
            latitude,
            longitude,
            speed_mps: speed_kmh / 3.6,
            g_force,
            captured_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readings_stay_near_the_track_center() {
        let mut source = SimulatedSignals::new();
        for _ in 0..100 {
            let reading = source.read().unwrap();
            assert!((reading.latitude - 12.9716).abs() <= 0.011);
            assert!((reading.longitude - 77.5946).abs() <= 0.011);
            assert!(reading.speed_mps > 0.0);
        }
    }

    #[test]
    fn captured_at_is_monotonically_non_decreasing() {
        let mut source = SimulatedSignals::new();
        let mut last = source.read().unwrap().captured_at;
        for _ in 0..50 {
            let next = source.read().unwrap().captured_at;
            assert!(next >= last);
            last = next;
        }
    }
}
