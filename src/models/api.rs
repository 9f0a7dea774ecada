use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// JSON body of `POST /actions`.
#[derive(Debug, Deserialize)]
pub struct ActionRequest {
    /// Discord user ID of the submitter
    pub discord: String,
    /// Feed or site URL
    pub link: String,
    /// Whether `link` is an RSS feed
    #[serde(rename = "isRSS")]
    pub is_rss: bool,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service health status
    pub status: String,
    /// Service version
    pub version: String,
    /// Seconds since the server started
    pub uptime_seconds: u64,
    /// Current timestamp
    pub timestamp: DateTime<Utc>,
}
