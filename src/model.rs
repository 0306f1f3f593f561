//! Data types shared between the service client, the job controller and the
//! batch orchestrator.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::url::default_thumbnail;

/// Length of a video as reported by the service.
///
/// Flat extraction usually yields seconds, but some entries carry a
/// preformatted `m:ss` string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VideoDuration {
    Seconds(f64),
    Text(String),
}

/// One entry of a search or trending listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    pub url: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub duration: Option<VideoDuration>,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub view_count: Option<u64>,
}

impl VideoInfo {
    /// Returns the title, or a placeholder for untitled entries.
    #[must_use]
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or("Untitled")
    }

    /// Returns the thumbnail URL, deriving one from the id when absent.
    #[must_use]
    pub fn thumbnail_url(&self) -> Option<String> {
        self.thumbnail
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| self.id.as_deref().map(default_thumbnail))
    }
}

/// Body of `GET /search` and `GET /trending`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Option<Vec<VideoInfo>>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Output format requested from the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Best video plus audio, merged to mp4.
    #[default]
    Mp4,
    /// Audio only, converted to mp3.
    Mp3,
    /// The video's still thumbnail image.
    Thumbnail,
}

impl OutputFormat {
    /// Wire value sent in the `format` field of a download request.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mp3 => "mp3",
            Self::Thumbnail => "thumbnail",
        }
    }

    /// Human-readable label stored in history records.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Mp4 => "Original video",
            Self::Mp3 => "MP3 audio",
            Self::Thumbnail => "Thumbnail",
        }
    }

    /// Filename used when the server does not suggest one.
    #[must_use]
    pub const fn default_filename(self) -> &'static str {
        match self {
            Self::Mp4 => "video.mp4",
            Self::Mp3 => "audio.mp3",
            Self::Thumbnail => "thumbnail.jpg",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "mp4" | "video" | "original" => Ok(Self::Mp4),
            "mp3" | "audio" => Ok(Self::Mp3),
            "thumbnail" | "thumb" | "jpg" => Ok(Self::Thumbnail),
            other => Err(crate::Error::Config(format!("unknown format '{other}'"))),
        }
    }
}

/// One requested download. Fields are fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct JobDescriptor {
    url: String,
    format: OutputFormat,
    video_id: Option<String>,
    title: String,
    thumbnail: Option<String>,
}

impl JobDescriptor {
    /// Creates a descriptor for downloading `video` in `format`.
    #[must_use]
    pub fn new(video: &VideoInfo, format: OutputFormat) -> Self {
        Self {
            url: video.url.clone(),
            format,
            video_id: video.id.clone(),
            title: video.display_title().to_string(),
            thumbnail: video.thumbnail_url(),
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub const fn format(&self) -> OutputFormat {
        self.format
    }

    #[must_use]
    pub fn video_id(&self) -> Option<&str> {
        self.video_id.as_deref()
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }
}

/// Client-generated token that ties a download request to its progress
/// stream and to cancellation requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Generates a fresh random id.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
