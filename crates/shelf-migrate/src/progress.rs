use std::num::NonZeroUsize;
use std::sync::mpsc::{self, Receiver, Sender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationProgress {
    pub current: usize,
    pub total: usize,
}

impl MigrationProgress {
    /// 0.0..=1.0; an empty migration counts as done.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.current.min(self.total) as f64 / self.total as f64
    }

    pub fn is_complete(&self) -> bool {
        self.current >= self.total
    }
}

/// Push side of the progress channel. Delivery is best effort: a dropped
/// receiver never affects the migration.
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    sender: Option<Sender<MigrationProgress>>,
}

impl ProgressReporter {
    pub fn channel() -> (Self, Receiver<MigrationProgress>) {
        let (sender, receiver) = mpsc::channel();
        (Self::from_sender(sender), receiver)
    }

    pub fn from_sender(sender: Sender<MigrationProgress>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    pub fn silent() -> Self {
        Self { sender: None }
    }

    pub fn report(&self, current: usize, total: usize) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(MigrationProgress { current, total });
        }
    }
}

/// Tracks rows written across the tag, book and association phases and
/// decides which rows get reported.
pub(crate) struct ProgressCounter<'a> {
    reporter: &'a ProgressReporter,
    stride: NonZeroUsize,
    total: usize,
    current: usize,
}

impl<'a> ProgressCounter<'a> {
    pub(crate) fn new(
        reporter: &'a ProgressReporter,
        stride: NonZeroUsize,
        total: usize,
    ) -> Self {
        Self {
            reporter,
            stride,
            total,
            current: 0,
        }
    }

    pub(crate) fn restart(&mut self) {
        self.current = 0;
    }

    /// `position` is 1-based within the current phase.
    pub(crate) fn row_written(&mut self, position: usize, phase_len: usize) {
        self.current += 1;
        if position % self.stride.get() == 0 || position == phase_len {
            self.reporter.report(self.current, self.total);
        }
    }

    pub(crate) fn finish(&self) {
        self.reporter.report(self.total, self.total);
    }
}
