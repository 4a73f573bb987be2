use super::{VolatilitySeries, ZeroChangePolicy};
use crate::chunking::ChunkingStrategy;
use crate::config::LabelingConfig;
use crate::dataset::{Chunk, LabeledSpeech, Speech, VolatilityLabel};
use crate::error::{ChunkingError, LabelError};
use chrono::NaiveDate;
use tracing::{debug, info, warn};

/// Maps a signed volatility change to a label.
///
/// # Arguments
///
/// * `change` - `value_after - value_at`
/// * `policy` - Resolution of an exact zero
/// * `date` - Publication date, used in the error for an excluded zero
pub fn label_for_change(
    change: f64,
    policy: ZeroChangePolicy,
    date: NaiveDate,
) -> Result<VolatilityLabel, LabelError> {
    if !change.is_finite() {
        return Err(LabelError::MalformedValue(date.to_string()));
    }
    if change > 0.0 {
        Ok(VolatilityLabel::Positive)
    } else if change < 0.0 {
        Ok(VolatilityLabel::Negative)
    } else {
        match policy {
            ZeroChangePolicy::Exclude => Err(LabelError::ZeroChange(date.to_string())),
            ZeroChangePolicy::Positive => Ok(VolatilityLabel::Positive),
            ZeroChangePolicy::Negative => Ok(VolatilityLabel::Negative),
        }
    }
}

/// Result of labeling a batch of speeches.
#[derive(Debug, Default)]
pub struct LabelingOutcome {
    /// Speeches with a label, in input order
    pub labeled: Vec<LabeledSpeech>,
    /// Speech ids that were excluded, with the reason
    pub excluded: Vec<(String, LabelError)>,
}

/// Derives volatility labels for speeches from a [`VolatilitySeries`].
pub struct SpeechLabeler<'a> {
    series: &'a VolatilitySeries,
    config: LabelingConfig,
}

impl<'a> SpeechLabeler<'a> {
    /// Creates a labeler. A horizon of 0 is treated as 1.
    pub fn new(series: &'a VolatilitySeries, mut config: LabelingConfig) -> Self {
        config.horizon = config.horizon.max(1);
        Self { series, config }
    }

    /// Signed volatility change following `date`.
    pub fn change_after(&self, date: NaiveDate) -> Result<f64, LabelError> {
        let at = self.series.value_at(date, self.config.max_lookback_days)?;
        let after =
            self.series
                .value_after(date, self.config.horizon, self.config.max_lookback_days)?;
        Ok(after.value - at.value)
    }

    /// Labels one speech.
    pub fn label(&self, speech: &Speech) -> Result<LabeledSpeech, LabelError> {
        let change = self.change_after(speech.date)?;
        let label = label_for_change(change, self.config.zero_change, speech.date)?;
        Ok(LabeledSpeech {
            speech: speech.clone(),
            label,
            change,
        })
    }

    /// Labels a batch, excluding (and logging) speeches that cannot be labeled.
    pub fn label_all(&self, speeches: &[Speech]) -> LabelingOutcome {
        let mut outcome = LabelingOutcome::default();

        for speech in speeches {
            match self.label(speech) {
                Ok(labeled) => {
                    debug!(
                        speech = %speech.id,
                        change = labeled.change,
                        label = %labeled.label,
                        "Labeled speech"
                    );
                    outcome.labeled.push(labeled);
                }
                Err(e) => {
                    warn!(speech = %speech.id, date = %speech.date, "Excluding speech: {}", e);
                    outcome.excluded.push((speech.id.clone(), e));
                }
            }
        }

        info!(
            "Labeled {} speeches ({} excluded)",
            outcome.labeled.len(),
            outcome.excluded.len()
        );
        outcome
    }
}

/// Splits a labeled speech into ordered chunks that carry its label.
///
/// A speech shorter than the chunk bound yields exactly one chunk; a speech
/// with no text yields none.
pub fn chunk_speech(
    speech: &LabeledSpeech,
    chunker: &dyn ChunkingStrategy,
) -> Result<Vec<Chunk>, ChunkingError> {
    let chunks = chunker.chunk(&speech.speech.full_text)?;
    if chunks.is_empty() {
        warn!(speech = %speech.speech.id, "Speech has no text to chunk");
    }
    Ok(chunks
        .into_iter()
        .map(|c| Chunk {
            speech_id: speech.speech.id.clone(),
            sequence_index: c.index,
            text: c.text,
            label: speech.label,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::RecursiveChunker;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn speech(id: &str, date: NaiveDate, text: &str) -> Speech {
        Speech {
            id: id.to_string(),
            date,
            speaker: "Governor".to_string(),
            full_text: text.to_string(),
        }
    }

    fn series() -> VolatilitySeries {
        VolatilitySeries::from_observations(vec![
            (d(2021, 6, 1), 20.0),
            (d(2021, 6, 2), 23.2),
            (d(2021, 6, 3), 22.1),
            (d(2021, 6, 4), 22.1),
        ])
        .unwrap()
    }

    #[test]
    fn test_rise_is_positive() {
        let series = series();
        let labeler = SpeechLabeler::new(&series, LabelingConfig::default());
        let labeled = labeler.label(&speech("s", d(2021, 6, 1), "x")).unwrap();

        assert_eq!(labeled.label, VolatilityLabel::Positive);
        assert!((labeled.change - 3.2).abs() < 1e-9);
    }

    #[test]
    fn test_fall_is_negative() {
        let series = series();
        let labeler = SpeechLabeler::new(&series, LabelingConfig::default());
        let labeled = labeler.label(&speech("s", d(2021, 6, 2), "x")).unwrap();

        assert_eq!(labeled.label, VolatilityLabel::Negative);
        assert!((labeled.change + 1.1).abs() < 1e-9);
    }

    #[test]
    fn test_zero_change_follows_policy() {
        let series = series();
        let date = d(2021, 6, 3);

        let exclude = SpeechLabeler::new(&series, LabelingConfig::default());
        assert_eq!(
            exclude.label(&speech("s", date, "x")).unwrap_err(),
            LabelError::ZeroChange("2021-06-03".to_string())
        );

        for (policy, expected) in [
            (ZeroChangePolicy::Positive, VolatilityLabel::Positive),
            (ZeroChangePolicy::Negative, VolatilityLabel::Negative),
        ] {
            let config = LabelingConfig {
                zero_change: policy,
                ..LabelingConfig::default()
            };
            let labeler = SpeechLabeler::new(&series, config);
            assert_eq!(labeler.label(&speech("s", date, "x")).unwrap().label, expected);
        }
    }

    #[test]
    fn test_label_for_change_values() {
        let date = d(2020, 1, 1);
        assert_eq!(
            label_for_change(3.2, ZeroChangePolicy::Exclude, date),
            Ok(VolatilityLabel::Positive)
        );
        assert_eq!(
            label_for_change(-1.1, ZeroChangePolicy::Exclude, date),
            Ok(VolatilityLabel::Negative)
        );
        assert!(label_for_change(f64::NAN, ZeroChangePolicy::Positive, date).is_err());
    }

    #[test]
    fn test_labeling_is_deterministic() {
        let series = series();
        let labeler = SpeechLabeler::new(&series, LabelingConfig::default());
        let s = speech("s", d(2021, 6, 1), "x");
        assert_eq!(labeler.label(&s), labeler.label(&s));
    }

    #[test]
    fn test_label_all_excludes_unlabelable() {
        let series = series();
        let labeler = SpeechLabeler::new(&series, LabelingConfig::default());
        let speeches = vec![
            speech("early", d(2019, 1, 1), "x"),
            speech("ok", d(2021, 6, 1), "x"),
            speech("last", d(2021, 6, 4), "x"),
        ];

        let outcome = labeler.label_all(&speeches);

        assert_eq!(outcome.labeled.len(), 1);
        assert_eq!(outcome.labeled[0].speech.id, "ok");
        let excluded: Vec<&str> = outcome.excluded.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(excluded, vec!["early", "last"]);
    }

    #[test]
    fn test_chunk_speech_tags_label_and_order() {
        let labeled = LabeledSpeech {
            speech: speech("s", d(2021, 6, 1), &"word ".repeat(1000)),
            label: VolatilityLabel::Negative,
            change: -1.1,
        };
        let chunker = RecursiveChunker::new(1000, 100).unwrap();

        let chunks = chunk_speech(&labeled, &chunker).unwrap();

        assert_eq!(chunks.len(), 6);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.sequence_index, i);
            assert_eq!(chunk.speech_id, "s");
            assert_eq!(chunk.label, VolatilityLabel::Negative);
        }
    }

    #[test]
    fn test_short_speech_yields_one_chunk() {
        let labeled = LabeledSpeech {
            speech: speech("s", d(2021, 6, 1), "Brief remarks."),
            label: VolatilityLabel::Positive,
            change: 0.5,
        };
        let chunker = RecursiveChunker::new(1000, 100).unwrap();

        assert_eq!(chunk_speech(&labeled, &chunker).unwrap().len(), 1);
    }
}
