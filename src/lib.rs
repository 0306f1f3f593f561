//! vidfetch - A batch download client for a video fetch service.
//!
//! The library talks to a service exposing search, download, progress and
//! cancel endpoints, and runs selected videos through it one job at a time.
//! It is independent of any particular UI; progress is reported through the
//! [`BatchProgress`] observer.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vidfetch::{
//!     BatchRunner, FetchService, HistoryStore, HttpService, JobController, NoProgress,
//!     OutputFormat, SelectionStore,
//! };
//!
//! # async fn example() -> vidfetch::Result<()> {
//! let service = Arc::new(HttpService::new("http://127.0.0.1:5000")?);
//!
//! // Pick the first search result
//! let results = service.search("lofi beats").await?;
//! let mut selection = SelectionStore::new();
//! selection.toggle(&results[0]);
//!
//! // Download it as audio, recording it in the history log
//! let runner = BatchRunner::new(JobController::new(service, "."));
//! let mut history = HistoryStore::load("history.json");
//! let summary = runner
//!     .run_selection(&mut selection, OutputFormat::Mp3, &mut history, &NoProgress)
//!     .await;
//! println!("{summary}");
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod api;
pub mod batch;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod format;
pub mod fs;
pub mod history;
pub mod job;
pub mod model;
pub mod progress;
pub mod selection;
pub mod state;
pub mod stats;
pub mod url;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use api::{DownloadRequest, DownloadedFile, FetchService, HttpService, parse_filename};
pub use batch::{BatchProgress, BatchRunner, CancelHandle, NoProgress};
pub use config::{AppConfig, DownloadConfig, PathConfig, ServerConfig};
pub use error::{Error, Result};
pub use format::{format_bytes, format_duration, format_timestamp, format_video_duration};
pub use fs::{FileSystem, TokioFileSystem, save_payload};
pub use history::{HISTORY_CAPACITY, HistoryRecord, HistoryStore, push_record};
pub use job::{JobController, SavedFile};
pub use model::{ClientId, JobDescriptor, OutputFormat, VideoDuration, VideoInfo};
pub use progress::{ProgressStream, ProgressUpdate, SseDecoder, decode_event_data};
pub use selection::{PROMPT_THRESHOLD, SelectionStore, ToggleOutcome};
pub use state::{BatchRun, JobSlot, JobState};
pub use stats::{BatchStatsBuilder, BatchSummary};
pub use url::{default_thumbnail, extract_video_urls, is_video_url};
