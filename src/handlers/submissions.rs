//! Submission endpoints.
//!
//! # Endpoints
//!
//! - `POST /actions` - JSON body, feed/site registration
//! - `POST /motions` - multipart, video upload
//! - `POST /sounds` - multipart, audio upload
//! - `POST /sights` - multipart, image assets
//! - `POST /words` - multipart, written content
//!
//! Every request has passed the header-stage signature checks before it
//! gets here. Each handler then runs:
//!
//! ```text
//! Authenticating (streaming digest) → Decoding → Extracting → Delegating → Responding
//! ```
//!
//! Multipart bodies are decoded inside a fresh workspace which is removed
//! before the response is returned, whatever the outcome. The collaborator
//! only ever sees authenticated, fully decoded, validated input.

use std::future::Future;
use std::time::Instant;

use axum::Json;
use axum::body::Body;
use axum::extract::{Extension, State};
use axum::http::{Method, Uri};
use http_body_util::{BodyExt, Limited};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::auth::SignedRequest;
use crate::error::{AppError, AppResult, classify_json_error};
use crate::ingest::{FormData, authenticate_stream, boundary_from, collect_body, materialize};
use crate::metrics;
use crate::models::{
    ActionRequest, ActionSubmission, MotionSubmission, SightSubmission, SoundSubmission,
    WordSubmission,
};
use crate::routes::Route;
use crate::state::AppState;

/// Handle one submission for `route`.
///
/// Responds `200` with the collaborator's result, or an error mapped by
/// [`AppError`].
#[instrument(skip_all, fields(route = route.name(), timestamp = signed.timestamp))]
pub async fn submit(
    route: Route,
    State(state): State<AppState>,
    Extension(signed): Extension<SignedRequest>,
    body: Body,
) -> AppResult<Json<Value>> {
    let started = Instant::now();
    let result = dispatch(route, &state, &signed, body).await;

    let status = match &result {
        Ok(_) => 200,
        Err(e) => {
            if e.is_auth_failure() {
                metrics::record_auth_failure(e.kind());
            }
            e.status_code().as_u16()
        }
    };
    metrics::record_request(route.name(), status, started.elapsed().as_secs_f64());

    result.map(Json)
}

async fn dispatch(
    route: Route,
    state: &AppState,
    signed: &SignedRequest,
    body: Body,
) -> AppResult<Value> {
    let submissions = state.submissions.as_ref();

    match route {
        Route::Actions => {
            let request: ActionRequest = read_json(state, signed, body).await?;
            let submission = ActionSubmission::try_from(request)?;
            Ok(submissions.submit_action(submission).await?)
        }
        Route::Motions => {
            with_form(state, signed, body, |form| async move {
                let submission = MotionSubmission::try_from(&form)?;
                Ok(submissions.submit_motion(submission).await?)
            })
            .await
        }
        Route::Sounds => {
            with_form(state, signed, body, |form| async move {
                let submission = SoundSubmission::try_from(&form)?;
                Ok(submissions.submit_sound(submission).await?)
            })
            .await
        }
        Route::Sights => {
            with_form(state, signed, body, |form| async move {
                let submission = SightSubmission::try_from(&form)?;
                Ok(submissions.submit_sight(submission).await?)
            })
            .await
        }
        Route::Words => {
            with_form(state, signed, body, |form| async move {
                let submission = WordSubmission::try_from(&form)?;
                Ok(submissions.submit_word(submission).await?)
            })
            .await
        }
    }
}

/// Authenticate and buffer a JSON body, then deserialize it.
///
/// Decoding happens only after the signature checked out.
async fn read_json<T: serde::de::DeserializeOwned>(
    state: &AppState,
    signed: &SignedRequest,
    body: Body,
) -> AppResult<T> {
    let body = Limited::new(body, state.config.max_json_body_size).into_data_stream();
    let bytes = authenticate_stream(&state.signing_key, signed, body, collect_body).await?;
    debug!(bytes = bytes.len(), "JSON body authenticated");

    serde_json::from_slice(&bytes).map_err(|e| classify_json_error(&e))
}

/// Materialize a multipart body in a fresh workspace and run `handle` on it.
///
/// `handle` runs only for authenticated bodies. The workspace, including
/// every staged file, is gone once this returns.
async fn with_form<F, Fut>(
    state: &AppState,
    signed: &SignedRequest,
    body: Body,
    handle: F,
) -> AppResult<Value>
where
    F: FnOnce(FormData) -> Fut,
    Fut: Future<Output = AppResult<Value>>,
{
    let limit = state.config.max_request_body_size;
    let content_type = signed.content_type.clone();

    state
        .scratch
        .with_workspace(|dir| async move {
            let body = Limited::new(body, limit).into_data_stream();
            let form = authenticate_stream(&state.signing_key, signed, body, |chunks| async move {
                let boundary = boundary_from(content_type.as_deref())?;
                materialize(chunks, boundary, &dir).await
            })
            .await?;
            debug!(files = form.files().len(), "Multipart body authenticated");

            handle(form).await
        })
        .await
}

/// Router fallback for unknown paths.
pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(uri.path().to_string())
}

/// Method fallback for known paths.
pub async fn method_not_allowed(method: Method) -> AppError {
    debug!(%method, "Method not allowed");
    AppError::MethodNotAllowed
}
