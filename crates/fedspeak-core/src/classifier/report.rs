//! Held-out evaluation report.
//!
//! Per-class precision/recall/F1 come with the label distributions and two
//! reference accuracies. Classes are not rebalanced during training, so a
//! classifier is only informative when it beats the stratified baseline.

use crate::dataset::VolatilityLabel;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Label counts of one side of the split.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCounts {
    pub negative: usize,
    pub positive: usize,
}

impl LabelCounts {
    pub fn from_labels(labels: &[VolatilityLabel]) -> Self {
        let mut counts = Self::default();
        for label in labels {
            match label {
                VolatilityLabel::Negative => counts.negative += 1,
                VolatilityLabel::Positive => counts.positive += 1,
            }
        }
        counts
    }

    pub fn get(&self, label: VolatilityLabel) -> usize {
        match label {
            VolatilityLabel::Negative => self.negative,
            VolatilityLabel::Positive => self.positive,
        }
    }

    pub fn total(&self) -> usize {
        self.negative + self.positive
    }

    /// Share of `label`, or 0 for an empty set.
    pub fn share(&self, label: VolatilityLabel) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.get(label) as f64 / self.total() as f64
        }
    }

    /// The more frequent label; ties go to `Negative`.
    pub fn majority(&self) -> VolatilityLabel {
        if self.positive > self.negative {
            VolatilityLabel::Positive
        } else {
            VolatilityLabel::Negative
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: VolatilityLabel,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AveragedMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Classification report on the held-out split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub per_class: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: AveragedMetrics,
    pub weighted_avg: AveragedMetrics,
    /// `confusion[actual][predicted]`, indexed by class index
    pub confusion: [[usize; 2]; 2],
    pub train_distribution: LabelCounts,
    pub test_distribution: LabelCounts,
    /// Expected accuracy of guessing at training frequencies,
    /// `Σ p_train(c)·p_test(c)`
    pub stratified_baseline: f64,
    /// Accuracy of always predicting the training majority class
    pub majority_baseline: f64,
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

impl ClassificationReport {
    /// Builds the report from test predictions.
    ///
    /// # Arguments
    ///
    /// * `actual` - True labels of the test examples
    /// * `predicted` - Predicted labels, aligned with `actual`
    /// * `train_labels` - Labels of the training examples (for baselines)
    pub fn new(
        actual: &[VolatilityLabel],
        predicted: &[VolatilityLabel],
        train_labels: &[VolatilityLabel],
    ) -> Self {
        let mut confusion = [[0usize; 2]; 2];
        for (a, p) in actual.iter().zip(predicted) {
            confusion[a.class_index() as usize][p.class_index() as usize] += 1;
        }

        let per_class: Vec<ClassMetrics> = VolatilityLabel::ALL
            .iter()
            .map(|&label| {
                let c = label.class_index() as usize;
                let tp = confusion[c][c];
                let predicted_c = confusion[0][c] + confusion[1][c];
                let support = confusion[c][0] + confusion[c][1];
                let precision = ratio(tp, predicted_c);
                let recall = ratio(tp, support);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics {
                    label,
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect();

        let total: usize = per_class.iter().map(|m| m.support).sum();
        let correct = confusion[0][0] + confusion[1][1];
        let classes = per_class.len() as f64;
        let macro_avg = AveragedMetrics {
            precision: per_class.iter().map(|m| m.precision).sum::<f64>() / classes,
            recall: per_class.iter().map(|m| m.recall).sum::<f64>() / classes,
            f1: per_class.iter().map(|m| m.f1).sum::<f64>() / classes,
        };
        let weight = |m: &ClassMetrics| ratio(m.support, total);
        let weighted_avg = AveragedMetrics {
            precision: per_class.iter().map(|m| m.precision * weight(m)).sum(),
            recall: per_class.iter().map(|m| m.recall * weight(m)).sum(),
            f1: per_class.iter().map(|m| m.f1 * weight(m)).sum(),
        };

        let train_distribution = LabelCounts::from_labels(train_labels);
        let test_distribution = LabelCounts::from_labels(actual);
        let stratified_baseline = VolatilityLabel::ALL
            .iter()
            .map(|&l| train_distribution.share(l) * test_distribution.share(l))
            .sum();
        let majority_baseline = test_distribution.share(train_distribution.majority());

        Self {
            per_class,
            accuracy: ratio(correct, total),
            macro_avg,
            weighted_avg,
            confusion,
            train_distribution,
            test_distribution,
            stratified_baseline,
            majority_baseline,
        }
    }

    pub fn test_size(&self) -> usize {
        self.test_distribution.total()
    }

    /// Whether accuracy exceeds the stratified baseline.
    pub fn beats_stratified_baseline(&self) -> bool {
        self.accuracy > self.stratified_baseline
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>14} {:>10} {:>10} {:>10} {:>10}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for m in &self.per_class {
            writeln!(
                f,
                "{:>14} {:>10.4} {:>10.4} {:>10.4} {:>10}",
                m.label.as_str(),
                m.precision,
                m.recall,
                m.f1,
                m.support
            )?;
        }
        writeln!(f)?;
        let total = self.test_size();
        writeln!(
            f,
            "{:>14} {:>10} {:>10} {:>10.4} {:>10}",
            "accuracy", "", "", self.accuracy, total
        )?;
        for (name, avg) in [("macro avg", self.macro_avg), ("weighted avg", self.weighted_avg)] {
            writeln!(
                f,
                "{:>14} {:>10.4} {:>10.4} {:>10.4} {:>10}",
                name, avg.precision, avg.recall, avg.f1, total
            )?;
        }
        writeln!(f)?;
        writeln!(f, "confusion matrix (rows actual, columns predicted):")?;
        writeln!(f, "{:>14} {:>10} {:>10}", "", "negative", "positive")?;
        for label in VolatilityLabel::ALL {
            let row = self.confusion[label.class_index() as usize];
            writeln!(f, "{:>14} {:>10} {:>10}", label.as_str(), row[0], row[1])?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "label distribution: train {} negative / {} positive, test {} negative / {} positive",
            self.train_distribution.negative,
            self.train_distribution.positive,
            self.test_distribution.negative,
            self.test_distribution.positive
        )?;
        writeln!(
            f,
            "baselines: stratified {:.4}, majority-class {:.4}",
            self.stratified_baseline, self.majority_baseline
        )?;
        write!(
            f,
            "accuracy {:.4} is {} the stratified baseline",
            self.accuracy,
            if self.beats_stratified_baseline() {
                "above"
            } else {
                "not above"
            }
        )
    }
}
