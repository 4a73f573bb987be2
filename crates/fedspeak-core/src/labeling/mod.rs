//! Volatility labeling and speech chunking.
//!
//! A speech is labeled by the direction of the volatility index move that
//! follows it: the index value in effect on the publication date is compared
//! with the value `horizon` trading days later. Labeled speeches are then
//! split into ordered chunks that all carry the speech's label.
//!
//! Speeches whose label cannot be derived (no data around the date, a
//! malformed value, or a zero change under [`ZeroChangePolicy::Exclude`])
//! are excluded and logged, never fatal to the batch.

mod labeler;
mod series;

pub use labeler::{chunk_speech, label_for_change, LabelingOutcome, SpeechLabeler};
pub use series::{Observation, VolatilitySeries};

use serde::{Deserialize, Serialize};

/// How a volatility change of exactly zero is labeled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZeroChangePolicy {
    /// Drop the speech from the labeled dataset
    #[default]
    Exclude,
    /// Treat no change as a rise
    Positive,
    /// Treat no change as a fall
    Negative,
}
