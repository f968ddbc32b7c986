use log::{info, warn};
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::ScanConfig;
use crate::events::EventDebouncer;
use crate::live::{LiveState, TickUpdate};
use crate::models::{Detection, Event, EventKind, Reading, ScanSession};
use crate::store::EventStore;

use super::ScanPipeline;

/// Synthetic label fed to the impact debouncer; its "confidence" is the
/// raw g-force reading.
const IMPACT_CHANNEL: &str = "Impact";

/// The producer loop: one tick per interval until cancelled. Readings
/// feed the live state every tick; the debouncers decide when a tick
/// also becomes a durable event.
pub(super) async fn scan_loop(
    session: ScanSession,
    config: ScanConfig,
    store: EventStore,
    live: LiveState,
    mut pipeline: ScanPipeline,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(Duration::from_millis(config.tick_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut pothole_debounce = EventDebouncer::new(
        EventKind::Pothole,
        config.monitored_label.clone(),
        config.confidence_threshold,
        config.cooldown_ticks,
    );
    let mut impact_debounce = EventDebouncer::new(
        EventKind::Impact,
        IMPACT_CHANNEL,
        config.impact_threshold_g,
        config.cooldown_ticks,
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_tick(
                    &session,
                    &store,
                    &live,
                    &mut pipeline,
                    &mut pothole_debounce,
                    &mut impact_debounce,
                )
                .await;
            }
            _ = cancel.cancelled() => {
                info!("scan loop for session {} shutting down", session.id);
                break;
            }
        }
    }
}

async fn run_tick(
    session: &ScanSession,
    store: &EventStore,
    live: &LiveState,
    pipeline: &mut ScanPipeline,
    pothole_debounce: &mut EventDebouncer,
    impact_debounce: &mut EventDebouncer,
) {
    // A failed signal read skips the whole tick; readers keep seeing
    // the last known good values.
    let reading = match pipeline.signal.read() {
        Ok(reading) => reading,
        Err(err) => {
            warn!("signal read failed, skipping tick: {err}");
            return;
        }
    };

    // Capture or model failure degrades to an empty detection list;
    // the loop keeps ticking.
    let (frame, detections) = match pipeline.camera.grab() {
        Ok(frame) => match pipeline.detector.detect(&frame) {
            Ok(detections) => (Some(frame), detections),
            Err(err) => {
                warn!("detector unavailable: {err}");
                (Some(frame), Vec::new())
            }
        },
        Err(err) => {
            warn!("frame capture failed: {err}");
            (None, Vec::new())
        }
    };

    let impact_candidates = [Detection {
        label: IMPACT_CHANNEL.to_string(),
        confidence: reading.g_force,
    }];

    let pothole_event = pothole_debounce.process(&reading, &detections);
    let impact_event = impact_debounce.process(&reading, &impact_candidates);

    // In-memory mutation only; persistence happens after the lock is
    // released.
    live.update(TickUpdate {
        reading,
        cooldown_ticks: pothole_debounce.cooldown_remaining(),
    });

    for event in [pothole_event, impact_event].into_iter().flatten() {
        persist_event(session, store, live, &reading, &detections, frame.as_ref(), event).await;
    }
}

async fn persist_event(
    session: &ScanSession,
    store: &EventStore,
    live: &LiveState,
    reading: &Reading,
    detections: &[Detection],
    frame: Option<&crate::vision::Frame>,
    event: Event,
) {
    let kind = event.kind;
    let image = match kind {
        EventKind::Pothole => frame.map(|f| f.jpeg.as_slice()),
        EventKind::Impact => None,
    };

    match store.append_event(session, event, image).await {
        Ok(stored) => {
            if let Some(filename) = stored.image_file.as_deref() {
                if let Err(err) =
                    store.append_frame_metadata(session, filename, reading, detections)
                {
                    warn!("failed to record frame metadata for {filename}: {err:#}");
                }
            }
            info!(
                "{} event recorded at {:.4}, {:.4} (session {})",
                kind.as_str(),
                stored.latitude,
                stored.longitude,
                session.id
            );
            live.record_event(stored);
        }
        Err(err) => {
            warn!("dropping {} event: {err}", kind.as_str());
        }
    }
}
