//! # Submission Gateway
//!
//! Authenticated, streaming ingress for submissions coming from the
//! companion website, featuring:
//!
//! - **Request signing**: HMAC-SHA256 over a canonical preamble and the raw
//!   body, constant-time verification, replay window on `X-Timestamp`
//! - **Streaming ingest**: the body is digested while it is decoded; uploads
//!   go straight to disk instead of memory
//! - **Guaranteed cleanup**: every multipart request gets its own scratch
//!   workspace, removed on every exit path
//! - **Observability**: request IDs, structured logging, Prometheus metrics
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Middleware (Request ID → Trace → SignatureAuth)            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handlers (health, submissions)                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Ingest (streaming authenticator, multipart, workspaces)    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  SubmissionService (collaborator boundary)                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use submission_gateway::{AppState, Config, DryRunSubmissions, build_router};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let state = AppState::new(config, Arc::new(DryRunSubmissions::new()))?;
//!     let app = build_router(state);
//!
//!     // Start the server...
//!     Ok(())
//! }
//! ```
//!
//! ## Signing Requests
//!
//! ```rust
//! use submission_gateway::RequestSigner;
//!
//! let signer = RequestSigner::new(b"shared-secret", "https://bot.example.com").unwrap();
//! let headers = signer.sign("/actions", Some("application/json"), br#"{"discord":"1"}"#);
//! for (name, value) in headers.pairs() {
//!     println!("{name}: {value}");
//! }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod ingest;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;
pub mod validation;

// Re-exports for convenience
pub use auth::{RequestSigner, SignatureHeaders, SigningKey};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use routes::{Route, build_router};
pub use services::{DryRunSubmissions, SubmissionError, SubmissionService};
pub use state::AppState;
