//! Single-slot run registry.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use super::driver::{RunDriver, RunOutcome, RunPhase};
use super::error::{RobotError, RobotResult};
use super::events::{EventHub, ProgressEvent};
use crate::browser::BrowserLauncher;
use crate::config::RobotConfig;

/// Snapshot returned by `GET /status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunStatus {
    pub running: bool,
    #[serde(flatten)]
    pub phase: RunPhase,
}

struct ActiveRun {
    id: Uuid,
    cancel: CancellationToken,
    handle: JoinHandle<RunOutcome>,
}

impl ActiveRun {
    fn is_live(&self) -> bool {
        !self.handle.is_finished()
    }
}

/// Owns the one run that may be active at a time.
///
/// The slot stays taken until the run task has closed its browser session,
/// so a start issued right after a stop can still be refused.
pub struct RunRegistry {
    config: Arc<RobotConfig>,
    launcher: Arc<dyn BrowserLauncher>,
    events: EventHub,
    phase: Arc<watch::Sender<RunPhase>>,
    active: Mutex<Option<ActiveRun>>,
}

impl RunRegistry {
    pub fn new(config: RobotConfig, launcher: Arc<dyn BrowserLauncher>, events: EventHub) -> Self {
        let (phase, _) = watch::channel(RunPhase::Idle);
        Self {
            config: Arc::new(config),
            launcher,
            events,
            phase: Arc::new(phase),
            active: Mutex::new(None),
        }
    }

    pub fn events(&self) -> &EventHub {
        &self.events
    }

    pub fn config(&self) -> &RobotConfig {
        &self.config
    }

    /// Start a run in the background. Fails if one is still active.
    pub async fn start(&self) -> RobotResult<Uuid> {
        let mut active = self.active.lock().await;
        if active.as_ref().is_some_and(ActiveRun::is_live) {
            return Err(RobotError::AlreadyRunning);
        }

        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let driver = RunDriver::new(
            self.config.clone(),
            self.events.clone(),
            self.phase.clone(),
            cancel.clone(),
        );
        let launcher = self.launcher.clone();
        // Mark the run as started before the task gets scheduled.
        self.phase.send_replace(RunPhase::Launching);
        let handle = tokio::spawn(async move {
            let outcome = driver.run(launcher.as_ref()).await;
            info!(run_id = %id, ?outcome, "Run finished");
            outcome
        });

        info!(run_id = %id, "Run started");
        *active = Some(ActiveRun { id, cancel, handle });
        Ok(id)
    }

    /// Ask the active run to stop. Returns whether a run was active.
    pub async fn stop(&self) -> bool {
        let active = self.active.lock().await;
        match active.as_ref() {
            Some(run) if run.is_live() => {
                info!(run_id = %run.id, "Stop requested");
                run.cancel.cancel();
                self.events
                    .emit(ProgressEvent::info("Stop requested, finishing current step..."));
                true
            }
            _ => false,
        }
    }

    pub async fn status(&self) -> RunStatus {
        let running = self
            .active
            .lock()
            .await
            .as_ref()
            .is_some_and(ActiveRun::is_live);
        RunStatus {
            running,
            phase: self.phase.borrow().clone(),
        }
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<RunPhase> {
        self.phase.subscribe()
    }

    /// Wait for the current run, if any, and free the slot.
    pub async fn join(&self) -> Option<RunOutcome> {
        let run = self.active.lock().await.take()?;
        match run.handle.await {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                warn!(run_id = %run.id, "Run task failed: {}", err);
                None
            }
        }
    }

    /// Cancel any active run and wait for it to release the browser.
    pub async fn shutdown(&self) {
        if self.stop().await {
            info!("Waiting for the active run to close its browser");
        }
        self.join().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::robot::testing::{FakeLauncher, FakePage, test_config};

    fn registry_with(config: RobotConfig) -> (Arc<RunRegistry>, Arc<FakeLauncher>) {
        let launcher = Arc::new(FakeLauncher::new(FakePage::ready()));
        let registry = Arc::new(RunRegistry::new(
            config,
            launcher.clone(),
            EventHub::new(),
        ));
        (registry, launcher)
    }

    /// Config whose run parks in the initial page-load pause.
    fn slow_config() -> RobotConfig {
        let mut config = test_config();
        config.delays.initial_load_ms = 60_000;
        config
    }

    #[tokio::test]
    async fn test_second_start_is_rejected_with_one_launch() {
        let (registry, launcher) = registry_with(slow_config());

        registry.start().await.unwrap();
        let second = registry.start().await;
        assert!(matches!(second, Err(RobotError::AlreadyRunning)));

        assert!(registry.stop().await);
        assert!(matches!(registry.join().await, Some(RunOutcome::Stopped)));
        assert_eq!(launcher.launches(), 1);
        assert_eq!(launcher.actions().last().map(String::as_str), Some("close"));
    }

    #[tokio::test]
    async fn test_status_reports_running_then_terminal_phase() {
        let (registry, _) = registry_with(slow_config());
        assert_eq!(
            registry.status().await,
            RunStatus {
                running: false,
                phase: RunPhase::Idle
            }
        );

        registry.start().await.unwrap();
        assert!(registry.status().await.running);

        registry.shutdown().await;
        let status = registry.status().await;
        assert!(!status.running);
        assert_eq!(status.phase, RunPhase::Stopped);
    }

    #[tokio::test]
    async fn test_finished_run_frees_the_slot() {
        let (registry, launcher) = registry_with(test_config());

        registry.start().await.unwrap();
        assert!(matches!(
            registry.join().await,
            Some(RunOutcome::Completed { submitted: 3, .. })
        ));

        registry.start().await.unwrap();
        registry.join().await;
        assert_eq!(launcher.launches(), 2);
    }

    #[tokio::test]
    async fn test_stop_without_run_is_noop() {
        let (registry, _) = registry_with(test_config());
        assert!(!registry.stop().await);
        assert!(registry.join().await.is_none());
    }

    #[tokio::test]
    async fn test_events_reach_subscribers() {
        let (registry, _) = registry_with(test_config());
        let mut rx = registry.events().subscribe();

        registry.start().await.unwrap();
        registry.join().await;

        let first = rx.recv().await.unwrap();
        assert_eq!(first.msg, "Launching browser...");
        let mut last = first;
        while let Ok(event) = rx.try_recv() {
            last = event;
        }
        assert_eq!(last.msg, "Run finished: 3 posted, 0 failed");
    }
}
