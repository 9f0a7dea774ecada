use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, instrument};

use super::{SubmissionError, SubmissionResult, SubmissionService};
use crate::models::{
    ActionSubmission, MotionSubmission, SightSubmission, SoundSubmission, WordSubmission,
};

/// Collaborator that accepts everything and echoes it back.
///
/// Used when no platform clients are wired in. Each call logs the
/// submission and returns `{"accepted": true, "kind": ..., "submission": ...}`,
/// including the staged file sizes.
#[derive(Clone, Default)]
pub struct DryRunSubmissions {
    /// Submissions accepted so far (monotonic, relaxed).
    accepted: Arc<AtomicU64>,
}

impl DryRunSubmissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    fn echo<T: Serialize>(&self, kind: &str, submission: &T) -> SubmissionResult {
        let submission = serde_json::to_value(submission)
            .map_err(|e| SubmissionError::Internal(e.into()))?;
        let sequence = self.accepted.fetch_add(1, Ordering::Relaxed) + 1;
        info!(kind, sequence, "Dry-run submission accepted");

        Ok(json!({
            "accepted": true,
            "kind": kind,
            "submission": submission,
        }))
    }
}

#[async_trait]
impl SubmissionService for DryRunSubmissions {
    #[instrument(skip(self, submission), fields(discord = %submission.discord))]
    async fn submit_action(&self, submission: ActionSubmission) -> Result<Value, SubmissionError> {
        self.echo("action", &submission)
    }

    #[instrument(skip(self, submission), fields(discord = %submission.details.discord))]
    async fn submit_motion(&self, submission: MotionSubmission) -> Result<Value, SubmissionError> {
        self.echo("motion", &submission)
    }

    #[instrument(skip(self, submission), fields(discord = %submission.details.discord))]
    async fn submit_sound(&self, submission: SoundSubmission) -> Result<Value, SubmissionError> {
        self.echo("sound", &submission)
    }

    #[instrument(skip(self, submission), fields(discord = %submission.details.discord, assets = submission.assets.len()))]
    async fn submit_sight(&self, submission: SightSubmission) -> Result<Value, SubmissionError> {
        self.echo("sight", &submission)
    }

    #[instrument(skip(self, submission), fields(discord = %submission.details.discord))]
    async fn submit_word(&self, submission: WordSubmission) -> Result<Value, SubmissionError> {
        self.echo("word", &submission)
    }
}
