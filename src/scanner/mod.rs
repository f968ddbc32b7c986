mod loop_worker;

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use log::info;
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::config::ScanConfig;
use crate::live::LiveState;
use crate::models::ScanSession;
use crate::signal::{SignalSource, SimulatedSignals};
use crate::store::EventStore;
use crate::vision::{Detector, FrameGrabber, SimulatedCamera, SimulatedDetector};

use loop_worker::scan_loop;

/// The acquisition stack handed to one scan loop. Built fresh per
/// session so a stopped loop never leaks state into the next one.
pub struct ScanPipeline {
    pub signal: Box<dyn SignalSource>,
    pub camera: Box<dyn FrameGrabber>,
    pub detector: Box<dyn Detector>,
}

impl ScanPipeline {
    pub fn simulated() -> Self {
        Self {
            signal: Box::new(SimulatedSignals::new()),
            camera: Box::new(SimulatedCamera::new()),
            detector: Box::new(SimulatedDetector::new()),
        }
    }
}

pub type PipelineFactory = Arc<dyn Fn() -> ScanPipeline + Send + Sync>;

struct ScanWorker {
    session: ScanSession,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the scan session lifecycle. Start and stop serialize through
/// one async mutex, which is what upholds the single-active-session
/// invariant for the store and keeps retention from racing a session
/// that is still flushing writes.
#[derive(Clone)]
pub struct ScannerController {
    config: ScanConfig,
    store: EventStore,
    live: LiveState,
    pipeline_factory: PipelineFactory,
    worker: Arc<Mutex<Option<ScanWorker>>>,
}

impl ScannerController {
    pub fn new(
        config: ScanConfig,
        store: EventStore,
        live: LiveState,
        pipeline_factory: PipelineFactory,
    ) -> Self {
        Self {
            config,
            store,
            live,
            pipeline_factory,
            worker: Arc::new(Mutex::new(None)),
        }
    }

    /// Starts a scan session; idempotent, returning the already-active
    /// session id if one is running.
    pub async fn start(&self) -> Result<String> {
        let mut guard = self.worker.lock().await;
        if let Some(worker) = guard.as_ref() {
            return Ok(worker.session.id.clone());
        }

        let session = self
            .store
            .create_session(Utc::now())
            .context("failed to create scan session")?;

        let cancel = CancellationToken::new();
        let pipeline = (self.pipeline_factory)();

        self.live.set_scanning(true, Some(session.id.clone()));

        let handle = tokio::spawn(scan_loop(
            session.clone(),
            self.config.clone(),
            self.store.clone(),
            self.live.clone(),
            pipeline,
            cancel.clone(),
        ));

        info!("scan session {} started", session.id);
        let id = session.id.clone();
        *guard = Some(ScanWorker {
            session,
            cancel,
            handle,
        });

        Ok(id)
    }

    /// Stops the active session; idempotent. The loop task is joined
    /// before returning, so any in-flight persistence for the session
    /// has settled by the time the directory becomes eligible for
    /// retention.
    pub async fn stop(&self) -> Result<()> {
        let mut guard = self.worker.lock().await;
        if let Some(worker) = guard.take() {
            worker.cancel.cancel();
            worker
                .handle
                .await
                .context("scan loop task failed to join")?;
            self.live.set_scanning(false, None);
            info!("scan session {} stopped", worker.session.id);
        }
        Ok(())
    }

    pub async fn is_scanning(&self) -> bool {
        self.worker.lock().await.is_some()
    }

    /// The retention pass checks this to avoid deleting the directory
    /// a live session is writing into.
    pub async fn active_session(&self) -> Option<ScanSession> {
        self.worker
            .lock()
            .await
            .as_ref()
            .map(|worker| worker.session.clone())
    }
}
