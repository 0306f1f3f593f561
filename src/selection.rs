//! The user's current selection of videos.

use crate::model::{JobDescriptor, OutputFormat, VideoInfo};

/// Number of selected videos after which the informational prompt appears.
pub const PROMPT_THRESHOLD: usize = 5;

/// What happened when a video was toggled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleOutcome {
    /// Whether the video is selected after the toggle.
    pub selected: bool,
    /// Whether the informational prompt should be shown now.
    pub show_prompt: bool,
}

/// Ordered set of selected videos keyed by URL.
///
/// Also remembers whether the informational prompt has been shown; that flag
/// lives for the session and survives clearing the selection.
#[derive(Debug, Clone, Default)]
pub struct SelectionStore {
    videos: Vec<VideoInfo>,
    prompt_shown: bool,
}

impl SelectionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store whose prompt flag was restored from session state.
    #[must_use]
    pub const fn with_prompt_shown(prompt_shown: bool) -> Self {
        Self {
            videos: Vec::new(),
            prompt_shown,
        }
    }

    #[must_use]
    pub const fn prompt_shown(&self) -> bool {
        self.prompt_shown
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.videos.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }

    #[must_use]
    pub fn contains(&self, url: &str) -> bool {
        self.videos.iter().any(|v| v.url == url)
    }

    /// Selected videos in selection order.
    #[must_use]
    pub fn videos(&self) -> &[VideoInfo] {
        &self.videos
    }

    /// Selects `video` if it is not selected, otherwise deselects it.
    ///
    /// Selecting while [`PROMPT_THRESHOLD`] videos are already selected shows
    /// the prompt, once per session. The video is selected either way.
    pub fn toggle(&mut self, video: &VideoInfo) -> ToggleOutcome {
        if let Some(pos) = self.videos.iter().position(|v| v.url == video.url) {
            self.videos.remove(pos);
            return ToggleOutcome {
                selected: false,
                show_prompt: false,
            };
        }

        let show_prompt = self.videos.len() >= PROMPT_THRESHOLD && !self.prompt_shown;
        if show_prompt {
            self.prompt_shown = true;
        }
        self.videos.push(video.clone());
        ToggleOutcome {
            selected: true,
            show_prompt,
        }
    }

    /// Replaces the selection with `video` alone.
    pub fn select_only(&mut self, video: &VideoInfo) {
        self.videos.clear();
        self.videos.push(video.clone());
    }

    /// Turns the selection into job descriptors and empties it.
    ///
    /// The returned list is independent of the store, so later selection
    /// changes cannot affect a batch built from it.
    pub fn freeze(&mut self, format: OutputFormat) -> Vec<JobDescriptor> {
        self.videos
            .drain(..)
            .map(|video| JobDescriptor::new(&video, format))
            .collect()
    }

    /// Deselects everything.
    pub fn clear(&mut self) {
        self.videos.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(n: usize) -> VideoInfo {
        VideoInfo {
            id: Some(format!("id{n}")),
            title: Some(format!("Video {n}")),
            url: format!("https://youtu.be/id{n}"),
            thumbnail: None,
            duration: None,
            uploader: None,
            view_count: None,
        }
    }

    #[test]
    fn toggle_selects_then_deselects() {
        let mut store = SelectionStore::new();
        assert!(store.toggle(&video(1)).selected);
        assert!(store.contains("https://youtu.be/id1"));
        assert!(!store.toggle(&video(1)).selected);
        assert!(store.is_empty());
    }

    #[test]
    fn selection_keeps_order() {
        let mut store = SelectionStore::new();
        store.toggle(&video(3));
        store.toggle(&video(1));
        store.toggle(&video(2));
        let urls: Vec<_> = store.videos().iter().map(|v| v.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://youtu.be/id3", "https://youtu.be/id1", "https://youtu.be/id2"]
        );
    }

    #[test]
    fn prompt_shown_once_when_passing_threshold() {
        let mut store = SelectionStore::new();
        let prompts: Vec<bool> = (1..=6).map(|n| store.toggle(&video(n)).show_prompt).collect();
        assert_eq!(prompts, vec![false, false, false, false, false, true]);
        assert_eq!(store.len(), 6);
        assert!(store.prompt_shown());

        // Drop below and climb back above the threshold.
        store.toggle(&video(6));
        store.toggle(&video(5));
        assert!(!store.toggle(&video(5)).show_prompt);
        assert!(!store.toggle(&video(6)).show_prompt);
        assert!(!store.toggle(&video(7)).show_prompt);
    }

    #[test]
    fn prompt_flag_survives_clear() {
        let mut store = SelectionStore::new();
        for n in 1..=6 {
            store.toggle(&video(n));
        }
        store.clear();
        for n in 1..=7 {
            assert!(!store.toggle(&video(n)).show_prompt);
        }
    }

    #[test]
    fn restored_flag_suppresses_prompt() {
        let mut store = SelectionStore::with_prompt_shown(true);
        assert!((1..=6).all(|n| !store.toggle(&video(n)).show_prompt));
    }

    #[test]
    fn freeze_drains_into_descriptors() {
        let mut store = SelectionStore::new();
        store.toggle(&video(1));
        store.toggle(&video(2));

        let jobs = store.freeze(OutputFormat::Mp3);
        assert!(store.is_empty());
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].url(), "https://youtu.be/id1");
        assert_eq!(jobs[1].format(), OutputFormat::Mp3);

        store.toggle(&video(3));
        assert_eq!(jobs.len(), 2);
    }

    #[test]
    fn select_only_replaces_selection() {
        let mut store = SelectionStore::new();
        store.toggle(&video(1));
        store.toggle(&video(2));
        store.select_only(&video(9));
        assert_eq!(store.len(), 1);
        assert!(store.contains("https://youtu.be/id9"));
    }
}
