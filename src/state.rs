//! Shared application state for Axum handlers.
//!
//! Holds the immutable configuration, the keyed HMAC state, the scratch
//! root, and the submission collaborator. Everything is behind `Arc` or is
//! cheap to clone; no request touches another request's data.
//!
//! # Structured Concurrency
//!
//! The scratch janitor runs as a background task managed by
//! `tokio_util::task::TaskTracker` and `CancellationToken`. Call
//! `shutdown()` to stop it before exit.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::auth::{ReplayWindow, SigningKey};
use crate::config::Config;
use crate::error::AppResult;
use crate::ingest::ScratchRoot;
use crate::services::SubmissionService;

/// Shared application state for Axum handlers.
///
/// # Lifecycle
///
/// The janitor is spawned when the state is created (unless
/// `SCRATCH_SWEEP_INTERVAL_SECS=0`). Call `shutdown()` before dropping:
///
/// ```rust,ignore
/// let state = AppState::new(config, Arc::new(DryRunSubmissions::new()))?;
/// // ... serve ...
/// state.shutdown().await;
/// ```
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// HMAC key shared with the website
    pub signing_key: SigningKey,
    /// Root under which per-request workspaces are created
    pub scratch: ScratchRoot,
    /// Collaborator receiving validated submissions
    pub submissions: Arc<dyn SubmissionService>,
    /// Timestamp when the application started
    pub started_at: Instant,
    task_tracker: TaskTracker,
    cancellation_token: CancellationToken,
}

impl AppState {
    /// Build state from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configuration is invalid.
    pub fn new(config: Config, submissions: Arc<dyn SubmissionService>) -> AppResult<Self> {
        config.validate()?;

        let signing_key = SigningKey::from_secret(&config.signing_secret)?;
        let scratch = ScratchRoot::new(config.scratch_root.clone());

        let state = Self {
            config: Arc::new(config),
            signing_key,
            scratch,
            submissions,
            started_at: Instant::now(),
            task_tracker: TaskTracker::new(),
            cancellation_token: CancellationToken::new(),
        };

        if state.config.janitor_enabled() {
            state.spawn_janitor_task();
        } else {
            info!("Scratch janitor disabled (SCRATCH_SWEEP_INTERVAL_SECS=0)");
        }

        Ok(state)
    }

    pub fn replay_window(&self) -> ReplayWindow {
        ReplayWindow::new(self.config.replay_window)
    }

    /// Spawn the orphaned-workspace janitor.
    ///
    /// Sweeps once immediately, then every `scratch_sweep_interval`.
    fn spawn_janitor_task(&self) {
        let scratch = self.scratch.clone();
        let max_age = self.config.scratch_max_age;
        let period = self.config.scratch_sweep_interval;
        let cancel = self.cancellation_token.clone();

        self.task_tracker.spawn(async move {
            let mut ticker = interval(period);

            loop {
                tokio::select! {
                    biased;

                    _ = cancel.cancelled() => {
                        debug!("Scratch janitor received cancellation signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        sweep_once(&scratch, max_age).await;
                    }
                }
            }

            debug!("Scratch janitor shutting down");
        });

        info!(
            root = %self.scratch.path().display(),
            max_age_secs = max_age.as_secs(),
            interval_secs = period.as_secs(),
            "Scratch janitor started"
        );
    }

    /// Gracefully shutdown all background tasks.
    ///
    /// 1. Signals all tasks to stop via cancellation token
    /// 2. Closes the task tracker (prevents new tasks)
    /// 3. Waits for all tasks to complete
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown of background tasks");

        self.cancellation_token.cancel();
        self.task_tracker.close();
        self.task_tracker.wait().await;

        info!("All background tasks have completed");
    }

    /// Get the application uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

async fn sweep_once(scratch: &ScratchRoot, max_age: Duration) {
    if let Err(e) = scratch.sweep(max_age).await {
        warn!(error = %e, root = %scratch.path().display(), "Scratch sweep failed");
    }
}
