//! Formatting helpers for byte sizes, elapsed times, video lengths and
//! history timestamps.

use std::time::Duration;

use chrono::{DateTime, Local, Utc};

use crate::model::VideoDuration;

/// Formats a byte count as a human-readable string (B, KB, MB, GB).
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// Formats an elapsed time (e.g. "5.0s", "1m 05s", "1h 01m 05s").
#[must_use]
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 3600 {
        format!(
            "{}h {:02}m {:02}s",
            secs / 3600,
            (secs % 3600) / 60,
            secs % 60
        )
    } else if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{}.{:01}s", secs, d.subsec_millis() / 100)
    }
}

/// Formats a video length as a clock string ("3:05", "1:02:03").
///
/// Preformatted strings are passed through; zero or negative lengths yield an
/// empty string.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_video_duration(duration: &VideoDuration) -> String {
    let secs = match duration {
        VideoDuration::Text(text) => return text.clone(),
        VideoDuration::Seconds(s) if s.is_finite() && *s >= 1.0 => *s as u64,
        VideoDuration::Seconds(_) => return String::new(),
    };
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

/// Formats a history timestamp in local time ("16/10/26 21:58").
#[must_use]
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%d/%m/%y %H:%M").to_string()
}
