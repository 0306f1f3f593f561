//! Per-job lifecycle state for a batch.

use std::fmt;

use crate::model::JobDescriptor;

/// Lifecycle state of one job.
///
/// States only move forward along
/// `Queued → Connecting → Downloading* → Processing? → {Done | Cancelled | Failed}`.
#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Queued,
    Connecting,
    Downloading(f64),
    Processing,
    Done,
    Cancelled,
    Failed(String),
}

impl JobState {
    /// Returns true for `Done`, `Cancelled` and `Failed`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Cancelled | Self::Failed(_))
    }

    const fn rank(&self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Connecting => 1,
            Self::Downloading(_) => 2,
            Self::Processing => 3,
            Self::Done | Self::Cancelled | Self::Failed(_) => 4,
        }
    }

    /// Returns true if moving from `self` to `next` keeps the lifecycle
    /// monotonic.
    ///
    /// Terminal states accept nothing. Repeated `Downloading` updates are
    /// allowed so the percentage can advance; a job must pass through
    /// `Connecting` before anything else.
    #[must_use]
    pub const fn can_transition_to(&self, next: &Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (Self::Queued, Self::Connecting) => true,
            (Self::Queued, _) => false,
            (Self::Downloading(_), Self::Downloading(_)) => true,
            _ => next.rank() > self.rank(),
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => f.write_str("Queued..."),
            Self::Connecting => f.write_str("Connecting..."),
            Self::Downloading(pct) => write!(f, "Downloading: {pct:.1}%"),
            Self::Processing => f.write_str("Processing and transferring..."),
            Self::Done => f.write_str("Done"),
            Self::Cancelled => f.write_str("Cancelled by user."),
            Self::Failed(reason) => write!(f, "Error: {reason}"),
        }
    }
}

/// One job of a batch together with its current state.
#[derive(Debug, Clone)]
pub struct JobSlot {
    pub descriptor: JobDescriptor,
    pub state: JobState,
}

/// The ordered jobs of one batch and their states.
#[derive(Debug, Clone)]
pub struct BatchRun {
    jobs: Vec<JobSlot>,
}

impl BatchRun {
    /// Creates a run with every job `Queued`.
    #[must_use]
    pub fn new(descriptors: Vec<JobDescriptor>) -> Self {
        Self {
            jobs: descriptors
                .into_iter()
                .map(|descriptor| JobSlot {
                    descriptor,
                    state: JobState::Queued,
                })
                .collect(),
        }
    }

    #[must_use]
    pub fn jobs(&self) -> &[JobSlot] {
        &self.jobs
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Returns the state of job `index`.
    #[must_use]
    pub fn state(&self, index: usize) -> Option<&JobState> {
        self.jobs.get(index).map(|slot| &slot.state)
    }

    /// Moves job `index` to `next` if the transition is allowed.
    ///
    /// Returns false (and leaves the state untouched) for out-of-order
    /// transitions, which happen routinely when progress messages arrive late.
    pub fn transition(&mut self, index: usize, next: JobState) -> bool {
        let Some(slot) = self.jobs.get_mut(index) else {
            return false;
        };
        if slot.state.can_transition_to(&next) {
            slot.state = next;
            true
        } else {
            log::debug!(
                "Ignoring transition {:?} -> {next:?} for job {index}",
                slot.state
            );
            false
        }
    }

    /// Number of jobs that are neither queued nor terminal.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.jobs
            .iter()
            .filter(|slot| slot.state != JobState::Queued && !slot.state.is_terminal())
            .count()
    }
}
