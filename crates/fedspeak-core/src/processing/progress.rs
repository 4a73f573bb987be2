//! Progress tracking types for long-running stages.
//!
//! These types provide structured progress information that the CLI renders
//! as progress bars and tests use to observe stage execution.

use std::time::Instant;

/// Progress of a stage that processes a known number of items.
#[derive(Debug, Clone, PartialEq)]
pub struct StageProgress {
    /// Number of items processed so far
    pub completed: usize,
    /// Total number of items to process
    pub total: usize,
    /// Time elapsed since start (milliseconds)
    pub elapsed_ms: u64,
}

impl StageProgress {
    /// Creates a new progress instance.
    pub fn new(completed: usize, total: usize, elapsed_ms: u64) -> Self {
        Self {
            completed,
            total,
            elapsed_ms,
        }
    }

    /// Returns the completion percentage (0.0 to 100.0).
    pub fn percent_complete(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.completed as f64 / self.total as f64) * 100.0
        }
    }

    /// Returns true if processing is complete.
    pub fn is_complete(&self) -> bool {
        self.completed >= self.total
    }

    /// Returns estimated time remaining in milliseconds, if computable.
    pub fn estimated_remaining_ms(&self) -> Option<u64> {
        if self.completed == 0 || self.completed >= self.total {
            return None;
        }
        let remaining = self.total - self.completed;
        let ms_per_item = self.elapsed_ms / self.completed as u64;
        Some(remaining as u64 * ms_per_item)
    }
}

/// Progress of a training loop, reported after every batch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochProgress {
    /// 1-based epoch number
    pub epoch: usize,
    pub total_epochs: usize,
    /// Batches finished in this epoch
    pub batches_completed: usize,
    pub batches_total: usize,
    /// Mean loss over the batches finished in this epoch
    pub mean_loss: f64,
}

impl EpochProgress {
    /// Returns overall completion across all epochs (0.0 to 100.0).
    pub fn percent_complete(&self) -> f64 {
        let total = self.total_epochs * self.batches_total;
        if total == 0 {
            return 0.0;
        }
        let done = self.epoch.saturating_sub(1) * self.batches_total + self.batches_completed;
        (done as f64 / total as f64) * 100.0
    }

    /// Returns true once the last batch of the epoch has been processed.
    pub fn is_epoch_end(&self) -> bool {
        self.batches_completed >= self.batches_total
    }
}

/// Helper for tracking elapsed time during processing.
pub struct ProgressTimer {
    start: Instant,
}

impl ProgressTimer {
    /// Creates a new timer starting now.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Returns elapsed time in milliseconds.
    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Default for ProgressTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_progress_percent() {
        let progress = StageProgress::new(50, 100, 1000);
        assert!((progress.percent_complete() - 50.0).abs() < 0.01);

        let progress = StageProgress::new(100, 100, 2000);
        assert!((progress.percent_complete() - 100.0).abs() < 0.01);
        assert!(progress.is_complete());
    }

    #[test]
    fn test_stage_progress_empty() {
        let progress = StageProgress::new(0, 0, 0);
        assert!((progress.percent_complete() - 0.0).abs() < 0.01);
    }

    #[test]
    fn test_estimated_remaining() {
        let progress = StageProgress::new(50, 100, 1000);
        // 50 items in 1000ms = 20ms/item, 50 remaining = 1000ms
        assert_eq!(progress.estimated_remaining_ms(), Some(1000));
        assert_eq!(StageProgress::new(0, 100, 10).estimated_remaining_ms(), None);
    }

    #[test]
    fn test_epoch_progress() {
        let progress = EpochProgress {
            epoch: 2,
            total_epochs: 4,
            batches_completed: 5,
            batches_total: 10,
            mean_loss: 0.7,
        };
        // 15 of 40 batches
        assert!((progress.percent_complete() - 37.5).abs() < 0.01);
        assert!(!progress.is_epoch_end());
    }
}
