//! Header-stage request authentication.
//!
//! Runs every check that needs only the request head, before any body byte
//! is read:
//!
//! 1. `X-Signature` present and base64-decodable
//! 2. `X-Timestamp` present, an integer, and inside the replay window
//!
//! On success a [`SignedRequest`] is inserted into request extensions; the
//! handler completes verification while streaming the body. On failure the
//! request is answered with 401 and the body is never touched.
//!
//! The layer is attached with `route_layer`, so unknown paths and wrong
//! methods are answered by the router before it runs.

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::Body;
use axum::http::{HeaderMap, Request, Response, header};
use axum::response::IntoResponse;
use tower::{Layer, Service};
use tracing::debug;

use crate::auth::{
    ReplayWindow, SIGNATURE_HEADER, SignedRequest, TIMESTAMP_HEADER, decode_signature,
};
use crate::error::{AppError, AppResult};
use crate::metrics;

/// Signature authentication layer.
#[derive(Clone)]
pub struct SignatureAuth {
    replay: ReplayWindow,
    /// Public origin the signer used, without trailing slash.
    origin: Arc<str>,
    /// Route label for rejected-request metrics.
    route: &'static str,
}

impl SignatureAuth {
    pub fn new(replay: ReplayWindow, origin: &str) -> Self {
        Self {
            replay,
            origin: Arc::from(origin.trim_end_matches('/')),
            route: "unknown",
        }
    }

    /// Same checks, reported under `route` in request metrics.
    pub fn for_route(&self, route: &'static str) -> Self {
        Self {
            route,
            ..self.clone()
        }
    }
}

impl<S> Layer<S> for SignatureAuth {
    type Service = SignatureAuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SignatureAuthService {
            inner,
            replay: self.replay,
            origin: self.origin.clone(),
            route: self.route,
        }
    }
}

/// Signature authentication service wrapper.
#[derive(Clone)]
pub struct SignatureAuthService<S> {
    inner: S,
    replay: ReplayWindow,
    origin: Arc<str>,
    route: &'static str,
}

impl<S> Service<Request<Body>> for SignatureAuthService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let started = Instant::now();

        match signed_request_from(&req, &self.replay, &self.origin) {
            Ok(signed) => {
                debug!(timestamp = signed.timestamp, "Request headers authenticated");
                req.extensions_mut().insert(signed);
                let mut inner = self.inner.clone();
                Box::pin(async move { inner.call(req).await })
            }
            Err(err) => {
                metrics::record_auth_failure(err.kind());
                metrics::record_request(
                    self.route,
                    err.status_code().as_u16(),
                    started.elapsed().as_secs_f64(),
                );
                let response = err.into_response();
                Box::pin(async move { Ok(response) })
            }
        }
    }
}

/// Build the signing context from a request head.
///
/// The canonical URL is `origin` followed by the request's path and query,
/// exactly as received.
pub fn signed_request_from<B>(
    req: &Request<B>,
    replay: &ReplayWindow,
    origin: &str,
) -> AppResult<SignedRequest> {
    let headers = req.headers();

    let signature = header_str(headers, SIGNATURE_HEADER)
        .ok_or(AppError::MissingSignature)
        .and_then(decode_signature)?;

    let timestamp = ReplayWindow::parse_timestamp(header_str(headers, TIMESTAMP_HEADER))?;
    replay.check(timestamp)?;

    let path_and_query = req
        .uri()
        .path_and_query()
        .map_or_else(|| req.uri().path(), |pq| pq.as_str());

    Ok(SignedRequest {
        method: req.method().as_str().to_string(),
        canonical_url: format!("{origin}{path_and_query}"),
        content_type: headers
            .get(header::CONTENT_TYPE)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned()),
        timestamp,
        signature,
    })
}

/// Header value as text; a value with non-visible bytes counts as absent.
fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
