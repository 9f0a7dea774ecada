//! Replay window validation for `X-Timestamp`.

use std::time::Duration;

use chrono::Utc;

use crate::error::{AppError, AppResult};

/// Accepted distance between a request's declared timestamp and the server clock.
///
/// The boundary is inclusive: a skew of exactly the window is accepted, one
/// millisecond more is not. Skew in either direction counts, so requests
/// stamped in the future are bounded the same way.
#[derive(Debug, Clone, Copy)]
pub struct ReplayWindow {
    window_ms: u64,
}

impl ReplayWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            window_ms: u64::try_from(window.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// Parse the raw header value.
    ///
    /// # Errors
    ///
    /// `MissingTimestamp` when absent, `InvalidTimestamp` when not a decimal integer.
    pub fn parse_timestamp(value: Option<&str>) -> AppResult<i64> {
        let value = value.ok_or(AppError::MissingTimestamp)?;
        value
            .trim()
            .parse::<i64>()
            .map_err(|_| AppError::InvalidTimestamp)
    }

    /// Check `timestamp` against the current wall clock.
    pub fn check(&self, timestamp: i64) -> AppResult<()> {
        self.check_at(timestamp, Utc::now().timestamp_millis())
    }

    /// Check `timestamp` against an explicit `now` (both in epoch milliseconds).
    pub fn check_at(&self, timestamp: i64, now: i64) -> AppResult<()> {
        if now.abs_diff(timestamp) > self.window_ms {
            return Err(AppError::ExpiredTimestamp);
        }
        Ok(())
    }
}

impl Default for ReplayWindow {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}
