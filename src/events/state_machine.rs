use crate::models::{Detection, Event, EventKind, Reading};

/// Debounces a stream of per-tick detections into at most one event per
/// cooldown window.
///
/// The machine is IDLE while `cooldown == 0` and SUPPRESSED otherwise.
/// A qualifying detection while IDLE fires once and starts the window;
/// every subsequent tick decrements the counter and emits nothing, no
/// matter what the detector reports.
#[derive(Debug, Clone)]
pub struct EventDebouncer {
    kind: EventKind,
    label: String,
    confidence_threshold: f64,
    cooldown_window: u32,
    cooldown: u32,
}

impl EventDebouncer {
    pub fn new(
        kind: EventKind,
        label: impl Into<String>,
        confidence_threshold: f64,
        cooldown_window: u32,
    ) -> Self {
        Self {
            kind,
            label: label.into(),
            confidence_threshold,
            cooldown_window,
            cooldown: 0,
        }
    }

    pub fn is_suppressed(&self) -> bool {
        self.cooldown > 0
    }

    pub fn cooldown_remaining(&self) -> u32 {
        self.cooldown
    }

    /// Advances one tick. Returns the emitted event when the machine
    /// fires; never emits while suppressed.
    ///
    /// The representative detection is the qualifying one with the
    /// highest confidence in the triggering frame.
    pub fn process(&mut self, reading: &Reading, detections: &[Detection]) -> Option<Event> {
        if self.cooldown > 0 {
            self.cooldown -= 1;
            return None;
        }

        let best = detections
            .iter()
            .filter(|d| d.label == self.label && d.confidence >= self.confidence_threshold)
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))?;

        self.cooldown = self.cooldown_window;

        Some(Event {
            id: None,
            kind: self.kind,
            latitude: reading.latitude,
            longitude: reading.longitude,
            occurred_at: reading.captured_at,
            session_id: None,
            image_file: None,
            confidence: Some(best.confidence),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn reading_at(tick: i64) -> Reading {
        let base = Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap();
        Reading {
            latitude: 12.9716,
            longitude: 77.5946,
            speed_mps: 12.5,
            g_force: 0.8,
            captured_at: base + Duration::milliseconds(tick * 200),
        }
    }

    fn pothole(confidence: f64) -> Detection {
        Detection {
            label: "Pothole".to_string(),
            confidence,
        }
    }

    fn debouncer() -> EventDebouncer {
        EventDebouncer::new(EventKind::Pothole, "Pothole", 0.25, 15)
    }

    #[test]
    fn emits_once_then_suppresses_for_the_window() {
        let mut machine = debouncer();
        let mut emitted = Vec::new();

        // Qualifying detections on every one of 40 ticks.
        for tick in 0..40 {
            if machine.process(&reading_at(tick), &[pothole(0.8)]).is_some() {
                emitted.push(tick);
            }
        }

        // Fires on tick 0, then every cooldown_window + 1 ticks.
        assert_eq!(emitted, vec![0, 16, 32]);
    }

    #[test]
    fn twenty_tick_scenario_emits_one_event_with_max_confidence() {
        let mut machine = debouncer();
        let mut events = Vec::new();

        for tick in 0..20 {
            let detections = if tick == 3 {
                vec![pothole(0.4), pothole(0.9), pothole(0.6)]
            } else {
                Vec::new()
            };
            if let Some(event) = machine.process(&reading_at(tick), &detections) {
                events.push((tick, event));
            }
            if (4..=17).contains(&tick) {
                assert!(machine.is_suppressed(), "tick {tick} should be suppressed");
            }
        }

        assert_eq!(events.len(), 1);
        let (tick, event) = &events[0];
        assert_eq!(*tick, 3);
        assert_eq!(event.confidence, Some(0.9));
        assert_eq!(event.kind, EventKind::Pothole);
        assert!(!machine.is_suppressed(), "window must be over by tick 19");
    }

    #[test]
    fn below_threshold_and_foreign_labels_never_fire() {
        let mut machine = debouncer();
        let crack = Detection {
            label: "Crack".to_string(),
            confidence: 0.99,
        };
        assert!(machine
            .process(&reading_at(0), &[pothole(0.1), crack])
            .is_none());
        assert!(!machine.is_suppressed());
    }

    #[test]
    fn cooldown_is_monotonically_non_increasing_without_a_trigger() {
        let mut machine = debouncer();
        machine.process(&reading_at(0), &[pothole(0.5)]);

        let mut previous = machine.cooldown_remaining();
        for tick in 1..=15 {
            machine.process(&reading_at(tick), &[]);
            let current = machine.cooldown_remaining();
            assert!(current < previous || current == 0);
            previous = current;
        }
        assert_eq!(machine.cooldown_remaining(), 0);
    }

    #[test]
    fn g_force_channel_debounces_impacts() {
        let mut machine = EventDebouncer::new(EventKind::Impact, "Impact", 2.0, 15);
        let spike = |g: f64| Detection {
            label: "Impact".to_string(),
            confidence: g,
        };

        let first = machine.process(&reading_at(0), &[spike(2.4)]);
        assert_eq!(first.and_then(|e| e.confidence), Some(2.4));

        // A second spike inside the window is swallowed.
        assert!(machine.process(&reading_at(1), &[spike(3.0)]).is_none());
    }
}
