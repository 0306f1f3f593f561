//! Progress bars and terminal reporting for CLI downloads.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::batch::BatchProgress;
use crate::history::HistoryRecord;
use crate::job::SavedFile;
use crate::model::{JobDescriptor, VideoInfo};
use crate::state::{JobSlot, JobState};
use crate::stats::BatchSummary;
use crate::{format_bytes, format_duration, format_timestamp, format_video_duration};

const SEPARATOR: &str = "────────────────────────────────────────────────────────────";

/// Bar length; percentages are shown with one decimal.
const BAR_SCALE: u64 = 1000;

const TITLE_WIDTH: usize = 32;

/// Creates a progress bar for a single job.
fn make_job_bar(title: &str) -> ProgressBar {
    let bar = ProgressBar::new(BAR_SCALE);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{bar:40.cyan/blue}] {prefix:32} {msg}")
            .expect("progress template is valid")
            .progress_chars("━━╌"),
    );
    bar.set_prefix(truncate(title, TITLE_WIDTH));
    bar.set_message(JobState::Queued.to_string());
    bar
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let head: String = text.chars().take(width.saturating_sub(1)).collect();
        format!("{head}…")
    }
}

/// [`BatchProgress`] that drives one `indicatif` bar per job.
pub struct BarProgress {
    multi: MultiProgress,
    bars: Mutex<Vec<ProgressBar>>,
}

impl BarProgress {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(Vec::new()),
        }
    }

    fn bar(&self, index: usize) -> Option<ProgressBar> {
        self.bars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(index)
            .cloned()
    }
}

impl BatchProgress for BarProgress {
    fn on_batch_start(&self, jobs: &[JobSlot]) {
        let mut bars = self.bars.lock().unwrap_or_else(PoisonError::into_inner);
        *bars = jobs
            .iter()
            .map(|slot| self.multi.add(make_job_bar(slot.descriptor.title())))
            .collect();
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn on_job_state(&self, index: usize, _job: &JobDescriptor, state: &JobState) {
        let Some(bar) = self.bar(index) else {
            return;
        };
        match state {
            JobState::Queued => {}
            JobState::Connecting => {
                bar.enable_steady_tick(Duration::from_millis(120));
                bar.set_message(state.to_string());
            }
            JobState::Downloading(pct) => {
                bar.set_position((pct * 10.0).round() as u64);
                bar.set_message(state.to_string());
            }
            JobState::Processing => {
                bar.set_position(BAR_SCALE);
                bar.set_message(state.to_string());
            }
            JobState::Done => {
                bar.set_position(BAR_SCALE);
                bar.finish_with_message(style(state.to_string()).green().to_string());
            }
            JobState::Cancelled => {
                bar.abandon_with_message(style(state.to_string()).yellow().to_string());
            }
            JobState::Failed(_) => {
                bar.abandon_with_message(style(state.to_string()).red().to_string());
            }
        }
    }

    fn on_job_status(&self, index: usize, _job: &JobDescriptor, status: &str) {
        if let Some(bar) = self.bar(index) {
            bar.set_message(status.to_string());
        }
    }

    fn on_job_saved(&self, _index: usize, job: &JobDescriptor, saved: &SavedFile) {
        let _ = self.multi.println(format!(
            "  {} - {} ({})",
            job.title(),
            saved.path.display(),
            format_bytes(saved.size),
        ));
    }
}

/// Prints numbered search results.
pub fn print_results(videos: &[VideoInfo]) {
    if videos.is_empty() {
        println!("No results found.");
        return;
    }

    println!("\n{SEPARATOR}");
    for (i, video) in videos.iter().enumerate() {
        let duration = video
            .duration
            .as_ref()
            .map(format_video_duration)
            .unwrap_or_default();
        println!(
            "  {:>2}. {} {}",
            i + 1,
            style(video.display_title()).bold(),
            style(duration).dim()
        );
        if let Some(uploader) = &video.uploader {
            println!("      {uploader}");
        }
        println!("      {}", style(&video.url).dim());
    }
    println!("{SEPARATOR}\n");
}

/// Prints the download history, newest first.
pub fn print_history(records: &[HistoryRecord]) {
    if records.is_empty() {
        println!("No downloads yet.");
        return;
    }

    println!("\n{SEPARATOR}");
    for record in records {
        println!(
            "  {}  {}  {}",
            style(format_timestamp(&record.date)).dim(),
            style(&record.format).cyan(),
            record.title
        );
    }
    println!("{SEPARATOR}");
    println!("  {} download(s)", records.len());
    println!("{SEPARATOR}\n");
}

/// Prints the one-time notice shown once the selection grows large.
pub fn print_selection_prompt() {
    println!(
        "{}",
        style("Downloading many videos? Batches run one at a time, so this may take a while.")
            .yellow()
    );
}

/// Prints the end-of-batch summary.
pub fn print_summary(summary: &BatchSummary) {
    if summary.total == 0 {
        return;
    }

    println!("\n{SEPARATOR}");
    if summary.all_succeeded() {
        println!("{}", style(summary).green().bold());
    } else {
        println!("{}", style(summary).yellow().bold());
    }
    println!("{SEPARATOR}");

    if summary.succeeded > 0 {
        println!("  Saved:             {}", summary.succeeded);
        println!("  Total size:        {}", format_bytes(summary.total_bytes));
    }
    if summary.failed > 0 {
        println!("  Failed:            {}", summary.failed);
    }
    if summary.cancelled > 0 {
        println!("  Cancelled:         {}", summary.cancelled);
    }
    println!("  Total time:        {}", format_duration(summary.elapsed));

    println!("{SEPARATOR}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_titles() {
        assert_eq!(truncate("short", 10), "short");
    }

    #[test]
    fn truncate_marks_cut_titles() {
        let cut = truncate("a very long video title indeed", 10);
        assert_eq!(cut.chars().count(), 10);
        assert!(cut.ends_with('…'));
    }
}
