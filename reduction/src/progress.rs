//! Progress reporting hook for long per-plane and per-pixel loops.
//!
//! Reporting is a side effect only; nothing in the core depends on it.

use indicatif::{ProgressBar, ProgressStyle};

/// Receives progress updates from long-running operations.
///
/// Implementations must be `Sync` since updates can arrive from rayon workers.
pub trait Progress: Sync {
    /// Start a new stage of `total` steps.
    fn begin(&self, stage: &str, total: usize);
    /// One step of the current stage completed.
    fn advance(&self);
    /// The current stage is finished.
    fn finish(&self) {}
}

/// Discards every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn begin(&self, _stage: &str, _total: usize) {}
    fn advance(&self) {}
}

/// Terminal progress bar.
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        {
            bar.set_style(style.progress_chars("█▉▊▋▌▍▎▏ "));
        }
        Self { bar }
    }

    /// Hidden bar, for tests and non-interactive runs.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress for BarProgress {
    fn begin(&self, stage: &str, total: usize) {
        self.bar.reset();
        self.bar.set_length(total as u64);
        self.bar.set_message(stage.to_string());
    }

    fn advance(&self) {
        self.bar.inc(1);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn test_bar_counts_parallel_updates() {
        let progress = BarProgress::hidden();
        progress.begin("planes", 32);
        (0..32).into_par_iter().for_each(|_| progress.advance());
        assert_eq!(progress.position(), 32);
    }
}
