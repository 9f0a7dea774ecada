//! Multipart materialization.
//!
//! Decodes a `multipart/form-data` stream and materializes it into a
//! [`FormData`]: text parts become multi-valued fields, file parts are
//! streamed straight into the request's workspace.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::path::{Path, PathBuf};

use bytes::{Bytes, BytesMut};
use chrono::Utc;
use futures::Stream;
use multer::{Field, Multipart};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::metrics;

/// Longest basename kept in a staged file's on-disk name.
const MAX_BASENAME_CHARS: usize = 128;

/// Largest text part held in memory. File parts go to disk and are bounded
/// only by the whole-body limit.
pub const MAX_TEXT_FIELD_BYTES: usize = 1024 * 1024;

/// An uploaded file fully written to the workspace.
#[derive(Debug, Clone, Serialize)]
pub struct StagedFile {
    pub path: PathBuf,
    pub field_name: String,
    /// Client-supplied filename, verbatim.
    pub file_name: String,
    pub content_type: Option<String>,
    pub size: u64,
}

/// Text fields and staged files of one multipart body.
#[derive(Debug, Default, Clone)]
pub struct FormData {
    fields: HashMap<String, Vec<String>>,
    files: Vec<StagedFile>,
}

impl FormData {
    pub fn push_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields
            .entry(name.into())
            .or_default()
            .push(value.into());
    }

    pub fn push_file(&mut self, file: StagedFile) {
        self.files.push(file);
    }

    /// First value of `name`, if any.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Every value of `name` in arrival order.
    pub fn field_values(&self, name: &str) -> &[String] {
        self.fields.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Staged files uploaded under `field_name`, in arrival order.
    pub fn files_for<'a>(&'a self, field_name: &'a str) -> impl Iterator<Item = &'a StagedFile> {
        self.files.iter().filter(move |f| f.field_name == field_name)
    }

    pub fn first_file(&self, field_name: &str) -> Option<&StagedFile> {
        self.files.iter().find(|f| f.field_name == field_name)
    }

    pub fn files(&self) -> &[StagedFile] {
        &self.files
    }
}

/// Extract the boundary from a `Content-Type` header value.
///
/// # Errors
///
/// `MalformedBody` if the header is absent or not `multipart/form-data` with
/// a boundary parameter.
pub fn boundary_from(content_type: Option<&str>) -> AppResult<String> {
    let content_type = content_type
        .ok_or_else(|| AppError::MalformedBody("missing multipart content type".to_string()))?;
    multer::parse_boundary(content_type)
        .map_err(|e| AppError::MalformedBody(format!("invalid multipart content type: {e}")))
}

/// Decode `body` and stage its file parts under `workspace`.
///
/// File parts with an empty filename are read to the end and discarded.
/// Any framing error aborts with `MalformedBody`, a text part larger than
/// [`MAX_TEXT_FIELD_BYTES`] with `PayloadTooLarge`; files staged so far are
/// left for the workspace to remove.
pub async fn materialize<S, E>(body: S, boundary: String, workspace: &Path) -> AppResult<FormData>
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<Box<dyn StdError + Send + Sync>> + 'static,
{
    let mut multipart = Multipart::new(body, boundary);
    let mut form = FormData::default();

    while let Some(mut field) = multipart.next_field().await.map_err(malformed)? {
        let name = field
            .name()
            .map(str::to_string)
            .ok_or_else(|| AppError::MalformedBody("part without a field name".to_string()))?;

        let Some(file_name) = field.file_name().map(str::to_string) else {
            let value = read_text(&mut field, MAX_TEXT_FIELD_BYTES).await?;
            form.push_field(name, value);
            continue;
        };

        if file_name.is_empty() {
            // Unset browser file input: drain so decoding can move on.
            while field.chunk().await.map_err(malformed)?.is_some() {}
            debug!(field = %name, "Dropped file part without a filename");
            continue;
        }

        let content_type = field.content_type().map(ToString::to_string);
        let path = workspace.join(staged_name(&file_name));
        let mut file = tokio::fs::File::create(&path).await?;
        let mut size = 0u64;

        while let Some(chunk) = field.chunk().await.map_err(malformed)? {
            file.write_all(&chunk).await?;
            size += chunk.len() as u64;
        }
        file.flush().await?;

        debug!(field = %name, file_name = %file_name, size, "Staged uploaded file");
        metrics::record_staged_file(size);

        form.push_file(StagedFile {
            path,
            field_name: name,
            file_name,
            content_type,
            size,
        });
    }

    Ok(form)
}

/// Buffer a text part, giving up as soon as it outgrows `limit`.
async fn read_text(field: &mut Field<'_>, limit: usize) -> AppResult<String> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = field.chunk().await.map_err(malformed)? {
        if buf.len() + chunk.len() > limit {
            debug!(field = ?field.name(), limit, "Text part too large");
            return Err(AppError::PayloadTooLarge);
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn malformed(e: multer::Error) -> AppError {
    AppError::MalformedBody(e.to_string())
}

/// On-disk name for an upload: `<unix-millis>-<random hex>-<basename>`.
pub fn staged_name(file_name: &str) -> String {
    format!(
        "{}-{:08x}-{}",
        Utc::now().timestamp_millis(),
        rand::random::<u32>(),
        sanitize_file_name(file_name)
    )
}

/// Reduce a client filename to a safe single path component.
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_BASENAME_CHARS)
        .collect();

    match cleaned.trim() {
        "" | "." | ".." => "upload".to_string(),
        _ => cleaned,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    use std::io;

    const BOUNDARY: &str = "X-GATEWAY-BOUNDARY";

    enum Part<'a> {
        Text(&'a str, &'a str),
        File(&'a str, &'a str, &'a [u8]),
    }

    fn encode(parts: &[Part<'_>]) -> Vec<u8> {
        let mut out = Vec::new();
        for part in parts {
            out.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match part {
                Part::Text(name, value) => {
                    out.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}")
                            .as_bytes(),
                    );
                }
                Part::File(name, file_name, data) => {
                    out.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                             Content-Type: application/octet-stream\r\n\r\n"
                        )
                        .as_bytes(),
                    );
                    out.extend_from_slice(data);
                }
            }
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        out
    }

    fn stream_of(body: Vec<u8>, chunk: usize) -> impl Stream<Item = Result<Bytes, io::Error>> {
        let chunks: Vec<Result<Bytes, io::Error>> = body
            .chunks(chunk)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        futures::stream::iter(chunks)
    }

    #[tokio::test]
    async fn test_fields_and_files_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let audio: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        let body = encode(&[
            Part::Text("discord", "123"),
            Part::Text("tags", "a,b"),
            Part::File("audio", "song.mp3", &audio),
            Part::Text("tags", "c"),
            Part::File("image", "cover.png", b"png"),
        ]);

        let form = materialize(stream_of(body, 37), BOUNDARY.to_string(), dir.path())
            .await
            .unwrap();

        assert_eq!(form.field("discord"), Some("123"));
        assert_eq!(form.field_values("tags"), ["a,b", "c"]);
        assert_eq!(form.files().len(), 2);

        let staged = form.first_file(&String::from("audio")).unwrap();
        assert_eq!(staged.file_name, "song.mp3");
        assert_eq!(staged.size, 1000);
        assert_eq!(
            staged.content_type.as_deref(),
            Some("application/octet-stream")
        );
        assert!(staged.path.starts_with(dir.path()));
        assert_eq!(tokio::fs::read(&staged.path).await.unwrap(), audio);

        let image = form.first_file("image").unwrap();
        assert_eq!(tokio::fs::read(&image.path).await.unwrap(), b"png");
    }

    #[tokio::test]
    async fn test_oversized_text_part_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let huge = "x".repeat(MAX_TEXT_FIELD_BYTES + 1);
        let body = encode(&[Part::Text("discord", "123"), Part::Text("content", &huge)]);

        let result = materialize(stream_of(body, 4096), BOUNDARY.to_string(), dir.path()).await;

        assert!(matches!(result, Err(AppError::PayloadTooLarge)));
    }

    #[tokio::test]
    async fn test_text_part_at_limit_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let content = "y".repeat(MAX_TEXT_FIELD_BYTES);
        let body = encode(&[Part::Text("content", &content)]);

        let form = materialize(stream_of(body, 4096), BOUNDARY.to_string(), dir.path())
            .await
            .unwrap();

        assert_eq!(form.field("content").map(str::len), Some(MAX_TEXT_FIELD_BYTES));
    }

    #[test]
    fn test_first_file_with_short_lived_name() {
        let mut form = FormData::default();
        form.push_file(StagedFile {
            path: PathBuf::from("/scratch/1-a.mp3"),
            field_name: "audio".to_string(),
            file_name: "a.mp3".to_string(),
            content_type: None,
            size: 1,
        });

        let first = form.first_file(&format!("au{}", "dio"));
        let missing = form.first_file(&format!("vid{}", "eo"));

        assert_eq!(first.map(|f| f.file_name.as_str()), Some("a.mp3"));
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_empty_filename_is_not_staged() {
        let dir = tempfile::tempdir().unwrap();
        let body = encode(&[
            Part::File("assets", "", b""),
            Part::File("assets", "one.png", b"1"),
            Part::File("assets", "", b"ignored"),
            Part::File("assets", "two.png", b"22"),
        ]);

        let form = materialize(stream_of(body, 5), BOUNDARY.to_string(), dir.path())
            .await
            .unwrap();

        let names: Vec<_> = form.files_for("assets").map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, ["one.png", "two.png"]);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[tokio::test]
    async fn test_same_filename_twice_gets_distinct_paths() {
        let dir = tempfile::tempdir().unwrap();
        let body = encode(&[
            Part::File("assets", "a.png", b"first"),
            Part::File("assets", "a.png", b"second"),
        ]);

        let form = materialize(stream_of(body, 64), BOUNDARY.to_string(), dir.path())
            .await
            .unwrap();

        let files: Vec<_> = form.files_for("assets").collect();
        assert_ne!(files[0].path, files[1].path);
        assert_eq!(tokio::fs::read(&files[1].path).await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_no_parts() {
        let dir = tempfile::tempdir().unwrap();
        let body = format!("--{BOUNDARY}--\r\n").into_bytes();

        let form = materialize(stream_of(body, 8), BOUNDARY.to_string(), dir.path())
            .await
            .unwrap();

        assert!(form.files().is_empty());
        assert_eq!(form.field_names().count(), 0);
    }

    #[tokio::test]
    async fn test_truncated_body_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let mut body = encode(&[Part::Text("title", "hello")]);
        body.truncate(body.len() - 10);

        let result = materialize(stream_of(body, 8), BOUNDARY.to_string(), dir.path()).await;

        assert!(matches!(result, Err(AppError::MalformedBody(_))));
    }

    #[test]
    fn test_boundary_from_header() {
        assert_eq!(
            boundary_from(Some("multipart/form-data; boundary=abc")).unwrap(),
            "abc"
        );
        assert!(matches!(
            boundary_from(Some("application/json")),
            Err(AppError::MalformedBody(_))
        ));
        assert!(matches!(boundary_from(None), Err(AppError::MalformedBody(_))));
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("song.mp3"), "song.mp3");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\clip.mp4"), "clip.mp4");
        assert_eq!(sanitize_file_name("bad\u{0}\nname.txt"), "badname.txt");
        assert_eq!(sanitize_file_name("dir/"), "upload");
        assert_eq!(sanitize_file_name(".."), "upload");
        assert_eq!(sanitize_file_name(&"x".repeat(300)).len(), MAX_BASENAME_CHARS);
    }

    #[test]
    fn test_staged_name_layout() {
        let name = staged_name("a/b/song.mp3");
        let mut parts = name.splitn(3, '-');
        assert!(parts.next().unwrap().parse::<i64>().is_ok());
        assert_eq!(parts.next().unwrap().len(), 8);
        assert_eq!(parts.next().unwrap(), "song.mp3");
    }
}
