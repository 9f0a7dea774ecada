//! Typed submissions handed to the collaborator.
//!
//! Each struct is built from a decoded body and enforces its route's
//! field and file contract. Construction fails with `MissingField`,
//! `MissingFile` or `InvalidField`; a value that exists is valid.

use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::ingest::{FormData, StagedFile};
use crate::validation::{
    optional_text, parse_flag, required_text, split_tags, validate_discord_id, validate_link,
    validate_title,
};

use super::api::ActionRequest;

/// Fields shared by every multipart route.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionDetails {
    pub discord: String,
    pub title: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
}

impl SubmissionDetails {
    fn from_form(form: &FormData) -> AppResult<Self> {
        let discord = required_text(form.field("discord"), "discord")?;
        validate_discord_id(&discord)?;

        let title = required_text(form.field("title"), "title")?;
        validate_title(&title)?;

        Ok(Self {
            discord,
            title,
            description: optional_text(form.field("description")),
            tags: split_tags(form.field_values("tags")),
        })
    }
}

fn required_file(form: &FormData, field: &str) -> AppResult<StagedFile> {
    form.first_file(field)
        .cloned()
        .ok_or_else(|| AppError::MissingFile(field.to_string()))
}

fn optional_file(form: &FormData, field: &str) -> Option<StagedFile> {
    form.first_file(field).cloned()
}

/// `/actions`: register a feed or site to follow.
#[derive(Debug, Clone, Serialize)]
pub struct ActionSubmission {
    pub discord: String,
    pub link: String,
    #[serde(rename = "isRSS")]
    pub is_rss: bool,
    pub title: Option<String>,
    pub description: Option<String>,
}

impl TryFrom<ActionRequest> for ActionSubmission {
    type Error = AppError;

    fn try_from(request: ActionRequest) -> AppResult<Self> {
        let discord = required_text(Some(&request.discord), "discord")?;
        validate_discord_id(&discord)?;

        let link = required_text(Some(&request.link), "link")?;
        validate_link(&link)?;

        let title = optional_text(request.title.as_deref());
        if let Some(title) = &title {
            validate_title(title)?;
        }

        Ok(Self {
            discord,
            link,
            is_rss: request.is_rss,
            title,
            description: optional_text(request.description.as_deref()),
        })
    }
}

/// `/motions`: a video upload.
#[derive(Debug, Clone, Serialize)]
pub struct MotionSubmission {
    #[serde(flatten)]
    pub details: SubmissionDetails,
    pub short: bool,
    pub video: StagedFile,
    pub thumbnail: Option<StagedFile>,
}

impl TryFrom<&FormData> for MotionSubmission {
    type Error = AppError;

    fn try_from(form: &FormData) -> AppResult<Self> {
        Ok(Self {
            details: SubmissionDetails::from_form(form)?,
            short: parse_flag(form.field("short")),
            video: required_file(form, "video")?,
            thumbnail: optional_file(form, "thumbnail"),
        })
    }
}

/// `/sounds`: an audio upload with optional artwork.
#[derive(Debug, Clone, Serialize)]
pub struct SoundSubmission {
    #[serde(flatten)]
    pub details: SubmissionDetails,
    pub downloadable: bool,
    pub audio: StagedFile,
    pub image: Option<StagedFile>,
}

impl TryFrom<&FormData> for SoundSubmission {
    type Error = AppError;

    fn try_from(form: &FormData) -> AppResult<Self> {
        Ok(Self {
            details: SubmissionDetails::from_form(form)?,
            downloadable: parse_flag(form.field("downloadable")),
            audio: required_file(form, "audio")?,
            image: optional_file(form, "image"),
        })
    }
}

/// `/sights`: one or more image assets.
#[derive(Debug, Clone, Serialize)]
pub struct SightSubmission {
    #[serde(flatten)]
    pub details: SubmissionDetails,
    pub assets: Vec<StagedFile>,
}

impl TryFrom<&FormData> for SightSubmission {
    type Error = AppError;

    fn try_from(form: &FormData) -> AppResult<Self> {
        let details = SubmissionDetails::from_form(form)?;
        let assets: Vec<StagedFile> = form.files_for("assets").cloned().collect();
        if assets.is_empty() {
            return Err(AppError::MissingFile("assets".to_string()));
        }

        Ok(Self { details, assets })
    }
}

/// `/words`: written content with an optional cover image.
#[derive(Debug, Clone, Serialize)]
pub struct WordSubmission {
    #[serde(flatten)]
    pub details: SubmissionDetails,
    pub content: String,
    pub image: Option<StagedFile>,
}

impl TryFrom<&FormData> for WordSubmission {
    type Error = AppError;

    fn try_from(form: &FormData) -> AppResult<Self> {
        let details = SubmissionDetails::from_form(form)?;
        let content = required_text(form.field("content"), "content")?;

        Ok(Self {
            details,
            content,
            image: optional_file(form, "image"),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    use std::path::PathBuf;

    fn staged(field: &str, name: &str) -> StagedFile {
        StagedFile {
            path: PathBuf::from(format!("/scratch/1-00000000-{name}")),
            field_name: field.to_string(),
            file_name: name.to_string(),
            content_type: None,
            size: 3,
        }
    }

    fn base_form() -> FormData {
        let mut form = FormData::default();
        form.push_field("discord", "123");
        form.push_field("title", "Night drive");
        form
    }

    #[test]
    fn test_sound_submission() {
        let mut form = base_form();
        form.push_field("description", "  ");
        form.push_field("tags", "synth, night");
        form.push_field("downloadable", "on");
        form.push_file(staged("audio", "song.mp3"));

        let sound = SoundSubmission::try_from(&form).unwrap();
        assert_eq!(sound.details.discord, "123");
        assert_eq!(sound.details.description, None);
        assert_eq!(sound.details.tags, ["synth", "night"]);
        assert!(sound.downloadable);
        assert_eq!(sound.audio.file_name, "song.mp3");
        assert!(sound.image.is_none());
    }

    #[test]
    fn test_missing_title() {
        let mut form = FormData::default();
        form.push_field("discord", "123");
        form.push_file(staged("audio", "song.mp3"));

        let err = SoundSubmission::try_from(&form).unwrap_err();
        assert!(matches!(err, AppError::MissingField(f) if f == "title"));
    }

    #[test]
    fn test_missing_required_file() {
        let form = base_form();
        let err = MotionSubmission::try_from(&form).unwrap_err();
        assert!(matches!(err, AppError::MissingFile(f) if f == "video"));
    }

    #[test]
    fn test_first_upload_wins_for_single_file_field() {
        let mut form = base_form();
        form.push_file(staged("video", "a.mp4"));
        form.push_file(staged("video", "b.mp4"));
        form.push_file(staged("thumbnail", "t.png"));

        let motion = MotionSubmission::try_from(&form).unwrap();
        assert_eq!(motion.video.file_name, "a.mp4");
        assert_eq!(motion.thumbnail.unwrap().file_name, "t.png");
        assert!(!motion.short);
    }

    #[test]
    fn test_sights_collects_all_assets() {
        let mut form = base_form();
        form.push_file(staged("assets", "1.png"));
        form.push_file(staged("other", "x.png"));
        form.push_file(staged("assets", "2.png"));

        let sight = SightSubmission::try_from(&form).unwrap();
        let names: Vec<_> = sight.assets.iter().map(|a| a.file_name.as_str()).collect();
        assert_eq!(names, ["1.png", "2.png"]);

        let err = SightSubmission::try_from(&base_form()).unwrap_err();
        assert!(matches!(err, AppError::MissingFile(f) if f == "assets"));
    }

    #[test]
    fn test_words_requires_content() {
        let err = WordSubmission::try_from(&base_form()).unwrap_err();
        assert!(matches!(err, AppError::MissingField(f) if f == "content"));

        let mut form = base_form();
        form.push_field("content", "Once upon a time");
        let words = WordSubmission::try_from(&form).unwrap();
        assert_eq!(words.content, "Once upon a time");
    }

    #[test]
    fn test_invalid_discord_in_form() {
        let mut form = FormData::default();
        form.push_field("discord", "not-a-number");
        form.push_field("title", "x");

        let err = WordSubmission::try_from(&form).unwrap_err();
        assert!(matches!(err, AppError::InvalidField { field, .. } if field == "discord"));
    }

    #[test]
    fn test_action_submission() {
        let request: ActionRequest = serde_json::from_str(
            r#"{"discord":"123","link":"https://example.com/feed","isRSS":true,"title":"T"}"#,
        )
        .unwrap();

        let action = ActionSubmission::try_from(request).unwrap();
        assert!(action.is_rss);
        assert_eq!(action.title.as_deref(), Some("T"));
        assert_eq!(action.description, None);

        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["isRSS"], true);
    }

    #[test]
    fn test_action_blank_discord_is_missing() {
        let request: ActionRequest =
            serde_json::from_str(r#"{"discord":" ","link":"https://e.com","isRSS":false}"#)
                .unwrap();
        let err = ActionSubmission::try_from(request).unwrap_err();
        assert!(matches!(err, AppError::MissingField(f) if f == "discord"));
    }

    #[test]
    fn test_action_rejects_bad_link() {
        let request: ActionRequest =
            serde_json::from_str(r#"{"discord":"1","link":"ftp://e.com","isRSS":false}"#)
                .unwrap();
        let err = ActionSubmission::try_from(request).unwrap_err();
        assert!(matches!(err, AppError::InvalidField { field, .. } if field == "link"));
    }

    #[test]
    fn test_flattened_serialization() {
        let mut form = base_form();
        form.push_file(staged("video", "a.mp4"));
        let motion = MotionSubmission::try_from(&form).unwrap();

        let json = serde_json::to_value(&motion).unwrap();
        assert_eq!(json["title"], "Night drive");
        assert_eq!(json["video"]["file_name"], "a.mp4");
    }
}
