//! Streaming body authentication.
//!
//! The body is read exactly once. Every chunk is fed to the running digest
//! and then forwarded, in arrival order, to a body consumer running
//! concurrently (JSON accumulator or multipart materializer). The signature
//! is checked only after the transport reports end of body:
//!
//! ```text
//!                 ┌──────────────► RunningDigest ──► verify (after EOF)
//! body chunks ────┤
//!                 └──► channel ──► consumer (JSON / multipart → disk)
//! ```
//!
//! Whatever the consumer produced must be treated as untrusted until this
//! returns `Ok`; files it staged are removed by the caller's workspace.

use std::convert::Infallible;
use std::error::Error as StdError;
use std::future::Future;

use bytes::{Bytes, BytesMut};
use futures::channel::mpsc;
use futures::{SinkExt, Stream, StreamExt};
use http_body_util::LengthLimitError;
use tracing::debug;

use crate::auth::{RunningDigest, SignedRequest, SigningKey};
use crate::error::{AppError, AppResult};

/// Chunks in flight between the reader and the consumer.
const FORWARD_BUFFER: usize = 16;

type BoxError = Box<dyn StdError + Send + Sync>;

/// Body bytes as seen by a consumer.
pub type BodyChunks = mpsc::Receiver<Result<Bytes, Infallible>>;

/// Read `body` once, digesting and forwarding each chunk, then verify.
///
/// Error precedence:
/// 1. the body itself failed (transport error, size limit): the request is
///    abandoned before verification runs;
/// 2. the signature does not match: reported even if the consumer also
///    failed, so unauthenticated callers never see decode details;
/// 3. the consumer's own result.
pub async fn authenticate_stream<S, E, F, Fut, T>(
    key: &SigningKey,
    signed: &SignedRequest,
    body: S,
    consume: F,
) -> AppResult<T>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<BoxError>,
    F: FnOnce(BodyChunks) -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let (tx, rx) = mpsc::channel(FORWARD_BUFFER);
    let digest = key.digest(&signed.preamble());

    let (pumped, consumed) = tokio::join!(pump(body, digest, tx), consume(rx));

    let digest = pumped?;
    let body_bytes = digest.body_bytes();
    digest.verify(&signed.signature)?;
    debug!(body_bytes, "Request body authenticated");

    consumed
}

async fn pump<S, E>(
    body: S,
    mut digest: RunningDigest,
    tx: mpsc::Sender<Result<Bytes, Infallible>>,
) -> AppResult<RunningDigest>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<BoxError>,
{
    let mut body = std::pin::pin!(body);
    let mut forward = Some(tx);

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| {
            let err: BoxError = e.into();
            classify_body_error(&err)
        })?;
        digest.update(&chunk);

        // A consumer that stops early (done or failed) drops its receiver;
        // the rest of the body is still digested.
        if let Some(tx) = forward.as_mut()
            && tx.send(Ok(chunk)).await.is_err()
        {
            forward = None;
        }
    }

    drop(forward);
    Ok(digest)
}

/// Map a body read failure onto the error taxonomy.
fn classify_body_error(err: &BoxError) -> AppError {
    let root: &(dyn StdError + 'static) = &**err;
    let mut current = Some(root);
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return AppError::PayloadTooLarge;
        }
        current = e.source();
    }
    debug!(error = %err, "Request body stream failed");
    AppError::IncompleteBody
}

/// Consumer that buffers the whole body.
pub async fn collect_body(mut chunks: BodyChunks) -> AppResult<Bytes> {
    let mut buf = BytesMut::new();
    while let Some(Ok(chunk)) = chunks.next().await {
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    use std::io;

    use http_body_util::{BodyExt, Full, Limited};

    use crate::auth::decode_signature;

    fn key() -> SigningKey {
        SigningKey::new(b"stream-secret").unwrap()
    }

    fn signed_for(key: &SigningKey, body: &[u8]) -> SignedRequest {
        let signature = key.sign("POST", "http://h/actions", Some("text/plain"), 1, body);
        SignedRequest {
            method: "POST".to_string(),
            canonical_url: "http://h/actions".to_string(),
            content_type: Some("text/plain".to_string()),
            timestamp: 1,
            signature: decode_signature(&signature).unwrap(),
        }
    }

    fn chunked(body: &[u8], size: usize) -> Vec<Result<Bytes, io::Error>> {
        body.chunks(size)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect()
    }

    #[tokio::test]
    async fn test_consumer_sees_bytes_in_order() {
        let key = key();
        let body = b"abcdefghijklmnopqrstuvwxyz".repeat(10);
        let signed = signed_for(&key, &body);

        let stream = futures::stream::iter(chunked(&body, 3));
        let collected = authenticate_stream(&key, &signed, stream, collect_body)
            .await
            .unwrap();

        assert_eq!(collected.as_ref(), body.as_slice());
    }

    #[tokio::test]
    async fn test_forged_body_is_rejected_after_consumption() {
        let key = key();
        let signed = signed_for(&key, b"original");

        let stream = futures::stream::iter(chunked(b"tampered", 2));
        let result = authenticate_stream(&key, &signed, stream, collect_body).await;

        assert!(matches!(result, Err(AppError::InvalidSignature)));
    }

    #[tokio::test]
    async fn test_signature_failure_outranks_consumer_failure() {
        let key = key();
        let signed = signed_for(&key, b"original");

        let stream = futures::stream::iter(chunked(b"tampered", 2));
        let result: AppResult<()> = authenticate_stream(&key, &signed, stream, |_chunks| async {
            Err(AppError::MalformedBody("bad framing".to_string()))
        })
        .await;

        assert!(matches!(result, Err(AppError::InvalidSignature)));
    }

    #[tokio::test]
    async fn test_early_consumer_exit_still_digests_everything() {
        let key = key();
        let body = vec![7u8; 4096];
        let signed = signed_for(&key, &body);

        let stream = futures::stream::iter(chunked(&body, 64));
        let result = authenticate_stream(&key, &signed, stream, |mut chunks| async move {
            // Read a single chunk, then drop the receiver.
            let first = chunks.next().await;
            Ok(first.is_some())
        })
        .await;

        assert!(result.unwrap());
    }

    #[tokio::test]
    async fn test_consumer_error_surfaces_when_authentic() {
        let key = key();
        let signed = signed_for(&key, b"fine");

        let stream = futures::stream::iter(chunked(b"fine", 1));
        let result: AppResult<()> = authenticate_stream(&key, &signed, stream, |_chunks| async {
            Err(AppError::MalformedBody("bad framing".to_string()))
        })
        .await;

        assert!(matches!(result, Err(AppError::MalformedBody(_))));
    }

    #[tokio::test]
    async fn test_transport_error_abandons_request() {
        let key = key();
        let signed = signed_for(&key, b"whatever");

        let items: Vec<Result<Bytes, io::Error>> = vec![
            Ok(Bytes::from_static(b"what")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "peer went away")),
        ];
        let result =
            authenticate_stream(&key, &signed, futures::stream::iter(items), collect_body).await;

        assert!(matches!(result, Err(AppError::IncompleteBody)));
    }

    #[tokio::test]
    async fn test_length_limit_maps_to_payload_too_large() {
        let key = key();
        let signed = signed_for(&key, b"whatever");

        let body = Limited::new(Full::new(Bytes::from(vec![0u8; 100])), 10);
        let result =
            authenticate_stream(&key, &signed, body.into_data_stream(), collect_body).await;

        assert!(matches!(result, Err(AppError::PayloadTooLarge)));
    }

    #[tokio::test]
    async fn test_empty_body() {
        let key = key();
        let signed = signed_for(&key, b"");

        let items: Vec<Result<Bytes, io::Error>> = Vec::new();
        let collected =
            authenticate_stream(&key, &signed, futures::stream::iter(items), collect_body)
                .await
                .unwrap();

        assert!(collected.is_empty());
    }
}
