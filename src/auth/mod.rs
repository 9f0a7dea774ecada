//! Request authentication primitives.
//!
//! - [`signing`]: canonical preamble, HMAC key, running digest, constant-time verify
//! - [`replay`]: `X-Timestamp` parsing and replay window

pub mod replay;
pub mod signing;

pub use replay::ReplayWindow;
pub use signing::{
    RequestSigner, RunningDigest, SIGNATURE_HEADER, SignatureHeaders, SignedRequest, SigningKey,
    TIMESTAMP_HEADER, canonical_preamble, decode_signature,
};
