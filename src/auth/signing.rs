//! Canonical request signing and verification.
//!
//! The website signs every request with HMAC-SHA256 over a fixed preamble
//! followed by the raw body bytes:
//!
//! ```text
//! METHOD\r\n
//! CANONICAL-URL\r\n
//! CONTENT-TYPE\r\n        (empty line when the header is absent)
//! TIMESTAMP\r\n           (decimal milliseconds since the Unix epoch)
//! <raw body bytes>
//! ```
//!
//! The result is sent base64-encoded in `X-Signature`. Both sides must build
//! the preamble byte-for-byte identically, and the body must be digested
//! exactly as it arrived on the wire.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config::SigningSecret;
use crate::error::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the base64 HMAC.
pub const SIGNATURE_HEADER: &str = "x-signature";

/// Header carrying the signing time in milliseconds since the epoch.
pub const TIMESTAMP_HEADER: &str = "x-timestamp";

/// Build the canonical preamble that precedes the body in the digest.
pub fn canonical_preamble(
    method: &str,
    canonical_url: &str,
    content_type: Option<&str>,
    timestamp: i64,
) -> String {
    format!(
        "{method}\r\n{canonical_url}\r\n{}\r\n{timestamp}\r\n",
        content_type.unwrap_or("")
    )
}

/// Decode a transport-encoded signature into raw MAC bytes.
///
/// Anything that is not valid base64 is reported as `InvalidSignature`.
pub fn decode_signature(value: &str) -> AppResult<Vec<u8>> {
    BASE64
        .decode(value.trim())
        .map_err(|_| AppError::InvalidSignature)
}

/// Signing context extracted from request headers.
///
/// Built by the signature layer before any body byte is read and handed to
/// the handler through request extensions.
#[derive(Clone)]
pub struct SignedRequest {
    pub method: String,
    pub canonical_url: String,
    pub content_type: Option<String>,
    pub timestamp: i64,
    pub signature: Vec<u8>,
}

impl SignedRequest {
    pub fn preamble(&self) -> String {
        canonical_preamble(
            &self.method,
            &self.canonical_url,
            self.content_type.as_deref(),
            self.timestamp,
        )
    }
}

impl fmt::Debug for SignedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedRequest")
            .field("method", &self.method)
            .field("canonical_url", &self.canonical_url)
            .field("content_type", &self.content_type)
            .field("timestamp", &self.timestamp)
            .finish_non_exhaustive()
    }
}

/// HMAC key shared with the website.
///
/// Keyed once at startup; every request clones the keyed state, so no
/// per-request key schedule is computed and no locking is needed.
#[derive(Clone)]
pub struct SigningKey {
    mac: HmacSha256,
}

impl SigningKey {
    /// Create a key from raw secret bytes.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an empty secret or one the HMAC
    /// implementation rejects.
    pub fn new(secret: &[u8]) -> AppResult<Self> {
        if secret.is_empty() {
            return Err(AppError::ConfigError(
                "Signing secret must not be empty".to_string(),
            ));
        }
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| AppError::ConfigError(format!("Invalid signing secret: {e}")))?;
        Ok(Self { mac })
    }

    pub fn from_secret(secret: &SigningSecret) -> AppResult<Self> {
        Self::new(secret.as_bytes())
    }

    /// Start a running digest seeded with `preamble`.
    pub fn digest(&self, preamble: &str) -> RunningDigest {
        let mut mac = self.mac.clone();
        mac.update(preamble.as_bytes());
        RunningDigest {
            mac,
            body_bytes: 0,
        }
    }

    /// Sign a complete request, returning the base64 value for `X-Signature`.
    pub fn sign(
        &self,
        method: &str,
        canonical_url: &str,
        content_type: Option<&str>,
        timestamp: i64,
        body: &[u8],
    ) -> String {
        let mut digest = self.digest(&canonical_preamble(
            method,
            canonical_url,
            content_type,
            timestamp,
        ));
        digest.update(body);
        BASE64.encode(digest.finalize())
    }

    /// Verify a fully buffered body against a signed request.
    pub fn verify(&self, request: &SignedRequest, body: &[u8]) -> AppResult<()> {
        let mut digest = self.digest(&request.preamble());
        digest.update(body);
        digest.verify(&request.signature)
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey([redacted])")
    }
}

/// Header values to attach to a signed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeaders {
    pub signature: String,
    pub timestamp: i64,
}

impl SignatureHeaders {
    /// `(name, value)` pairs for `X-Signature` and `X-Timestamp`.
    pub fn pairs(&self) -> [(&'static str, String); 2] {
        [
            (SIGNATURE_HEADER, self.signature.clone()),
            (TIMESTAMP_HEADER, self.timestamp.to_string()),
        ]
    }
}

/// Signer half of the scheme, for callers of the gateway.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    key: SigningKey,
    origin: String,
}

impl RequestSigner {
    /// `origin` is the gateway's public URL; paths are appended to it.
    pub fn new(secret: &[u8], origin: &str) -> AppResult<Self> {
        Ok(Self {
            key: SigningKey::new(secret)?,
            origin: origin.trim_end_matches('/').to_string(),
        })
    }

    pub fn url(&self, path_and_query: &str) -> String {
        format!("{}{path_and_query}", self.origin)
    }

    /// Sign a `POST` to `path_and_query` stamped with `timestamp`.
    pub fn sign_at(
        &self,
        path_and_query: &str,
        content_type: Option<&str>,
        timestamp: i64,
        body: &[u8],
    ) -> SignatureHeaders {
        let signature = self.key.sign(
            "POST",
            &self.url(path_and_query),
            content_type,
            timestamp,
            body,
        );
        SignatureHeaders {
            signature,
            timestamp,
        }
    }

    /// Sign a `POST` stamped with the current wall clock.
    pub fn sign(
        &self,
        path_and_query: &str,
        content_type: Option<&str>,
        body: &[u8],
    ) -> SignatureHeaders {
        self.sign_at(
            path_and_query,
            content_type,
            chrono::Utc::now().timestamp_millis(),
            body,
        )
    }
}

/// Keyed hash accumulating one request's body.
///
/// Owned by a single request; consumed exactly once by [`RunningDigest::verify`]
/// or [`RunningDigest::finalize`].
pub struct RunningDigest {
    mac: HmacSha256,
    body_bytes: u64,
}

impl RunningDigest {
    pub fn update(&mut self, chunk: &[u8]) {
        self.mac.update(chunk);
        self.body_bytes += chunk.len() as u64;
    }

    /// Number of body bytes fed so far (the preamble is not counted).
    pub fn body_bytes(&self) -> u64 {
        self.body_bytes
    }

    pub fn finalize(self) -> Vec<u8> {
        self.mac.finalize().into_bytes().to_vec()
    }

    /// Compare the final MAC against `claimed` in constant time.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSignature` on any mismatch, including length.
    pub fn verify(self, claimed: &[u8]) -> AppResult<()> {
        let computed = self.finalize();
        if computed.as_slice().ct_eq(claimed).into() {
            Ok(())
        } else {
            Err(AppError::InvalidSignature)
        }
    }
}
