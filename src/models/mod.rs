mod api;
mod submission;

pub use api::{ActionRequest, HealthResponse};
pub use submission::{
    ActionSubmission, MotionSubmission, SightSubmission, SoundSubmission, SubmissionDetails,
    WordSubmission,
};
