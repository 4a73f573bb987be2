//! Progress bars and report formatting.
//!
//! Progress goes to stderr so that `--json` output on stdout stays
//! machine-readable.

use fedspeak_core::classifier::{ClassificationReport, TrainingOutcome};
use fedspeak_core::processing::{EpochProgress, StageProgress};
use fedspeak_core::scraping::ScrapeProgress;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

/// Creates a bar with the standard `{msg} [{bar}] {pos}/{len}` layout.
pub fn progress_bar(len: u64, message: &str) -> ProgressBar {
    let bar = ProgressBar::new(len);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.set_message(message.to_string());
    bar
}

/// Mirrors [`StageProgress`] updates onto a bar.
pub fn stage_callback(bar: &ProgressBar) -> impl FnMut(&StageProgress) + '_ {
    move |progress: &StageProgress| {
        bar.set_length(progress.total as u64);
        bar.set_position(progress.completed as u64);
    }
}

/// Mirrors [`EpochProgress`] updates onto a bar spanning all epochs.
pub fn epoch_callback(bar: &ProgressBar) -> impl FnMut(&EpochProgress) + '_ {
    move |progress: &EpochProgress| {
        let total = progress.total_epochs * progress.batches_total;
        let done = progress.epoch.saturating_sub(1) * progress.batches_total
            + progress.batches_completed;
        bar.set_length(total as u64);
        bar.set_position(done as u64);
        bar.set_message(format!(
            "epoch {}/{} loss {:.4}",
            progress.epoch, progress.total_epochs, progress.mean_loss
        ));
    }
}

/// Mirrors [`ScrapeProgress`] onto a bar, relabelling it per crawl level.
pub fn scrape_callback(bar: &ProgressBar) -> impl FnMut(ScrapeProgress) + '_ {
    move |progress: ScrapeProgress| {
        bar.set_message(progress.stage.label());
        bar.set_length(progress.total as u64);
        bar.set_position(progress.completed as u64);
    }
}

/// JSON document written for `--json` and to `report.json`.
#[derive(Serialize)]
pub struct JsonReport<'a> {
    pub train_size: usize,
    pub test_size: usize,
    pub epoch_losses: &'a [f64],
    pub report: &'a ClassificationReport,
}

impl<'a> From<&'a TrainingOutcome> for JsonReport<'a> {
    fn from(outcome: &'a TrainingOutcome) -> Self {
        Self {
            train_size: outcome.split.train.len(),
            test_size: outcome.split.test.len(),
            epoch_losses: &outcome.epoch_losses,
            report: &outcome.report,
        }
    }
}

/// Formats a training outcome as JSON.
pub fn format_json(outcome: &TrainingOutcome) -> String {
    serde_json::to_string_pretty(&JsonReport::from(outcome)).unwrap_or_else(|_| "{}".to_string())
}

/// Formats a training outcome for the terminal.
pub fn format_human(outcome: &TrainingOutcome) -> String {
    let mut output = format!(
        "Trained on {} speeches, evaluated on {}\n",
        outcome.split.train.len(),
        outcome.split.test.len()
    );
    if let (Some(first), Some(last)) = (outcome.epoch_losses.first(), outcome.epoch_losses.last()) {
        output.push_str(&format!("Loss: {:.4} -> {:.4}\n", first, last));
    }
    output.push('\n');
    output.push_str(&outcome.report.to_string());
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use fedspeak_core::classifier::DataSplit;
    use fedspeak_core::dataset::VolatilityLabel::{Negative, Positive};

    fn outcome() -> TrainingOutcome {
        let actual = [Positive, Negative];
        TrainingOutcome {
            epoch_losses: vec![0.7, 0.4],
            split: DataSplit {
                train: vec![0, 1, 2, 3],
                test: vec![4, 5],
            },
            report: ClassificationReport::new(&actual, &actual, &[Positive, Negative]),
        }
    }

    #[test]
    fn test_format_json() {
        let json: serde_json::Value = serde_json::from_str(&format_json(&outcome())).unwrap();
        assert_eq!(json["train_size"], 4);
        assert_eq!(json["test_size"], 2);
        assert_eq!(json["report"]["accuracy"], 1.0);
    }

    #[test]
    fn test_format_human() {
        let text = format_human(&outcome());
        assert!(text.starts_with("Trained on 4 speeches, evaluated on 2"));
        assert!(text.contains("Loss: 0.7000 -> 0.4000"));
        assert!(text.contains("stratified"));
    }

    #[test]
    fn test_epoch_callback_spans_all_epochs() {
        let bar = ProgressBar::hidden();
        let mut update = epoch_callback(&bar);
        update(&EpochProgress {
            epoch: 2,
            total_epochs: 3,
            batches_completed: 1,
            batches_total: 4,
            mean_loss: 0.5,
        });
        assert_eq!(bar.length(), Some(12));
        assert_eq!(bar.position(), 5);
    }
}
