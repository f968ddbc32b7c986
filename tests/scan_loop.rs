//! End-to-end scan loop tests with a scripted acquisition pipeline.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use chrono::Utc;

use sentinel::{
    config::ScanConfig,
    db::Database,
    error::ScanError,
    live::LiveState,
    models::{Detection, EventKind, Reading},
    scanner::{ScanPipeline, ScannerController},
    signal::SignalSource,
    store::EventStore,
    vision::{Detector, Frame, FrameGrabber},
};

struct ScriptedSignals;

impl SignalSource for ScriptedSignals {
    fn read(&mut self) -> Result<Reading, ScanError> {
        Ok(Reading {
            latitude: 12.9716,
            longitude: 77.5946,
            speed_mps: 12.0,
            g_force: 0.5,
            captured_at: Utc::now(),
        })
    }
}

struct StaticCamera;

impl FrameGrabber for StaticCamera {
    fn grab(&mut self) -> Result<Frame, ScanError> {
        Ok(Frame {
            jpeg: vec![0xFF, 0xD8, 0xFF, 0xD9],
            width: 2,
            height: 2,
        })
    }
}

/// Reports potholes at confidences [0.4, 0.9, 0.6] on ticks 3 through 5
/// (0-based), nothing otherwise.
struct ScriptedDetector {
    ticks: Arc<AtomicUsize>,
}

impl Detector for ScriptedDetector {
    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>, ScanError> {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst);
        let confidence = match tick {
            3 => Some(0.4),
            4 => Some(0.9),
            5 => Some(0.6),
            _ => None,
        };
        Ok(confidence
            .map(|confidence| {
                vec![Detection {
                    label: "Pothole".to_string(),
                    confidence,
                }]
            })
            .unwrap_or_default())
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    db: Database,
    live: LiveState,
    controller: ScannerController,
    ticks: Arc<AtomicUsize>,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let config = ScanConfig {
        data_dir: dir.path().join("data"),
        db_path: dir.path().join("test.sqlite3"),
        tick_interval_ms: 200,
        cooldown_ticks: 15,
        confidence_threshold: 0.25,
        // Scripted g-force never reaches this, so only potholes fire.
        impact_threshold_g: 10.0,
        ..ScanConfig::default()
    };

    let db = Database::new(config.db_path.clone()).unwrap();
    let store = EventStore::new(db.clone(), config.data_dir.clone());
    let live = LiveState::new(config.g_force_history_len);

    let ticks = Arc::new(AtomicUsize::new(0));
    let factory = {
        let ticks = Arc::clone(&ticks);
        Arc::new(move || ScanPipeline {
            signal: Box::new(ScriptedSignals),
            camera: Box::new(StaticCamera),
            detector: Box::new(ScriptedDetector {
                ticks: Arc::clone(&ticks),
            }),
        })
    };

    let controller = ScannerController::new(config, store, live.clone(), factory);
    Harness {
        _dir: dir,
        db,
        live,
        controller,
        ticks,
    }
}

async fn run_ticks(harness: &Harness, target: usize) {
    while harness.ticks.load(Ordering::SeqCst) < target {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn detection_burst_debounces_to_one_event() {
    let harness = harness();
    harness.controller.start().await.unwrap();
    run_ticks(&harness, 20).await;
    harness.controller.stop().await.unwrap();

    // One burst, one event, carrying the confidence of the tick that
    // triggered it (0.4 at tick 3; 0.9 and 0.6 fall in the cooldown).
    let events = harness.db.list_events(None).await.unwrap();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.kind, EventKind::Pothole);
    assert_eq!(event.confidence, Some(0.4));
    assert!(event.session_id.is_some());

    // The saved frame exists where the row says it is.
    let session_id = event.session_id.as_deref().unwrap();
    let image_file = event.image_file.as_deref().expect("pothole saves a frame");
    let image_path = harness
        .controller
        .active_session()
        .await
        .map(|s| s.data_dir)
        .unwrap_or_else(|| harness._dir.path().join("data").join(session_id));
    assert!(image_path.join(image_file).exists());

    // The pending queue hands the event out exactly once.
    let pending = harness.live.drain_pending_events();
    assert_eq!(pending.len(), 1);
    assert!(harness.live.drain_pending_events().is_empty());
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn start_and_stop_are_idempotent() {
    let harness = harness();

    let first = harness.controller.start().await.unwrap();
    let second = harness.controller.start().await.unwrap();
    assert_eq!(first, second, "second start joins the active session");
    assert!(harness.controller.is_scanning().await);

    run_ticks(&harness, 2).await;

    harness.controller.stop().await.unwrap();
    harness.controller.stop().await.unwrap();
    assert!(!harness.controller.is_scanning().await);
    assert!(!harness.live.snapshot().scanning);
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn live_state_tracks_telemetry_while_scanning() {
    let harness = harness();
    harness.controller.start().await.unwrap();
    run_ticks(&harness, 5).await;
    harness.controller.stop().await.unwrap();

    let snapshot = harness.live.snapshot();
    assert_eq!(snapshot.latitude, 12.9716);
    assert_eq!(snapshot.g_force, 0.5);
    assert!(!snapshot.g_force_history.is_empty());
}
