//! HTTP middleware.
//!
//! - **Signature authentication**: header-stage HMAC checks, see [`signature`]
//!
//! # Architecture
//!
//! ```text
//! Request → Request ID → Trace → Router ─┬─ unknown path   → 404
//!                                        ├─ wrong method   → 405
//!                                        └─ matched route → SignatureAuth → Handler
//!                                                                ↓
//!                                                          401 Unauthorized
//! ```
//!
//! Request IDs are handled by `tower-http` (`SetRequestIdLayer` /
//! `PropagateRequestIdLayer`), configured in [`crate::routes`].

pub mod signature;

pub use signature::{SignatureAuth, SignatureAuthService, signed_request_from};
