//! Submission collaborator boundary.
//!
//! The gateway only ever hands a collaborator authenticated, fully decoded
//! and validated input. What the collaborator does with it (uploading to a
//! platform, editing DNS, posting to a channel) is its own business; the
//! gateway maps the outcome onto the HTTP response.

mod dry_run;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::error::AppError;
use crate::models::{
    ActionSubmission, MotionSubmission, SightSubmission, SoundSubmission, WordSubmission,
};

pub use dry_run::DryRunSubmissions;

/// Failure reported by a collaborator.
#[derive(Error, Debug)]
pub enum SubmissionError {
    /// Business-rule rejection; the message is shown to the caller verbatim.
    #[error("{0}")]
    Rejected(String),

    /// Anything unexpected; logged, never shown.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl SubmissionError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }
}

impl From<SubmissionError> for AppError {
    fn from(e: SubmissionError) -> Self {
        match e {
            SubmissionError::Rejected(message) => AppError::Submission(message),
            SubmissionError::Internal(e) => AppError::Internal(format!("{e:#}")),
        }
    }
}

pub type SubmissionResult = Result<Value, SubmissionError>;

/// Handles validated submissions, one method per route.
///
/// Staged files referenced by a submission live in the request's workspace
/// and are removed once the call returns; implementations must finish with
/// them (copy, upload, or read) before returning.
#[async_trait]
pub trait SubmissionService: Send + Sync {
    async fn submit_action(&self, submission: ActionSubmission) -> SubmissionResult;

    async fn submit_motion(&self, submission: MotionSubmission) -> SubmissionResult;

    async fn submit_sound(&self, submission: SoundSubmission) -> SubmissionResult;

    async fn submit_sight(&self, submission: SightSubmission) -> SubmissionResult;

    async fn submit_word(&self, submission: WordSubmission) -> SubmissionResult;
}
