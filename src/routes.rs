//! Application routing configuration with middleware stack.
//!
//! # Middleware Stack (outermost first)
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │   Request ID     │ ← X-Request-Id generated if absent
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │     Tracing      │ ← span per request, carries request_id
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │   Propagate ID   │ ← X-Request-Id copied onto the response
//! └────────┬─────────┘
//!          ▼
//!       Router ──── unknown path → 404, wrong method → 405
//!          │
//!          ▼
//! ┌──────────────────┐
//! │  SignatureAuth   │ ← 401 on missing/expired/undecodable headers
//! └────────┬─────────┘     (submission routes only)
//!          ▼
//!      Handler
//! ```
//!
//! # Route Table
//!
//! - `GET /health` - Liveness (unauthenticated)
//! - `POST /actions`, `/motions`, `/sounds`, `/sights`, `/words` - Submissions

use axum::Router;
use axum::body::Body;
use axum::extract::{Extension, State};
use axum::http::Request;
use axum::routing::{MethodRouter, get, post};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{Span, info, info_span};

use crate::auth::SignedRequest;
use crate::handlers;
use crate::middleware::SignatureAuth;
use crate::state::AppState;

/// The fixed submission route table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// JSON feed/site registration
    Actions,
    /// Video upload
    Motions,
    /// Audio upload
    Sounds,
    /// Image assets
    Sights,
    /// Written content
    Words,
}

impl Route {
    pub const ALL: [Route; 5] = [
        Route::Actions,
        Route::Motions,
        Route::Sounds,
        Route::Sights,
        Route::Words,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Route::Actions => "/actions",
            Route::Motions => "/motions",
            Route::Sounds => "/sounds",
            Route::Sights => "/sights",
            Route::Words => "/words",
        }
    }

    /// Label used in logs and metrics.
    pub fn name(self) -> &'static str {
        match self {
            Route::Actions => "actions",
            Route::Motions => "motions",
            Route::Sounds => "sounds",
            Route::Sights => "sights",
            Route::Words => "words",
        }
    }

    /// Whether the route takes a multipart body (as opposed to JSON).
    pub fn is_multipart(self) -> bool {
        !matches!(self, Route::Actions)
    }

    /// `POST` handler behind the signature layer; other methods get 405
    /// without credentials being looked at.
    fn method_router(self, auth: &SignatureAuth) -> MethodRouter<AppState> {
        post(
            move |state: State<AppState>, signed: Extension<SignedRequest>, body: Body| {
                handlers::submit(self, state, signed, body)
            },
        )
        .route_layer(auth.for_route(self.name()))
        .fallback(handlers::method_not_allowed)
    }
}

/// Build the application router with all routes and middleware configured.
pub fn build_router(state: AppState) -> Router {
    let config = &state.config;

    let auth = SignatureAuth::new(state.replay_window(), config.canonical_origin());

    let mut router = Router::new().route(
        "/health",
        get(handlers::health_check).fallback(handlers::method_not_allowed),
    );
    for route in Route::ALL {
        info!(
            path = route.path(),
            multipart = route.is_multipart(),
            "Submission route registered"
        );
        router = router.route(route.path(), route.method_router(&auth));
    }

    info!(
        origin = config.canonical_origin(),
        replay_window_secs = config.replay_window.as_secs(),
        max_body_mb = config.max_request_body_size / (1024 * 1024),
        max_json_kb = config.max_json_body_size / 1024,
        "Request authentication configured"
    );

    router
        .fallback(handlers::not_found)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

fn request_span(req: &Request<Body>) -> Span {
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");

    info_span!(
        "request",
        method = %req.method(),
        path = %req.uri().path(),
        request_id = %request_id,
    )
}
