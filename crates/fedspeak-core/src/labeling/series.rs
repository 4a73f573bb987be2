//! Volatility index time series.

use crate::error::{DatasetError, LabelError};
use chrono::NaiveDate;
use std::path::Path;
use tracing::debug;

/// Daily closing values of a volatility index, sorted by date.
///
/// Only trading days have observations. Missing closes (`null` or empty in
/// provider exports) are kept as NaN so that a lookup landing on them fails
/// with [`LabelError::MalformedValue`] instead of silently using a
/// neighbouring day.
#[derive(Debug, Clone, Default)]
pub struct VolatilitySeries {
    observations: Vec<(NaiveDate, f64)>,
}

/// An observation found by a lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: f64,
}

impl VolatilitySeries {
    /// Builds a series from unordered observations.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::Inconsistent`] if a date appears twice.
    pub fn from_observations(
        mut observations: Vec<(NaiveDate, f64)>,
    ) -> Result<Self, DatasetError> {
        observations.sort_by_key(|(date, _)| *date);
        if let Some(pair) = observations.windows(2).find(|w| w[0].0 == w[1].0) {
            return Err(DatasetError::Inconsistent(format!(
                "duplicate volatility observation for {}",
                pair[0].0
            )));
        }
        Ok(Self { observations })
    }

    /// Loads a provider CSV export.
    ///
    /// The file must have `Date` and `Close` columns; other columns (`Open`,
    /// `High`, `Low`, `Adj Close`, `Volume`) are ignored. Dates are
    /// `YYYY-MM-DD`.
    pub fn from_csv(path: &Path) -> Result<Self, DatasetError> {
        let file = std::fs::File::open(path).map_err(|e| DatasetError::io(path, e))?;
        let mut reader = csv::Reader::from_reader(file);

        let headers = reader.headers()?.clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| {
                    DatasetError::Schema(format!(
                        "{}: missing '{}' column (found {:?})",
                        path.display(),
                        name,
                        headers.iter().collect::<Vec<_>>()
                    ))
                })
        };
        let date_col = column("Date")?;
        let close_col = column("Close")?;

        let mut observations = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record?;
            let raw_date = record.get(date_col).unwrap_or("").trim();
            let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d").map_err(|e| {
                DatasetError::Schema(format!(
                    "{}: row {}: invalid date '{}': {}",
                    path.display(),
                    row + 1,
                    raw_date,
                    e
                ))
            })?;
            let value = record
                .get(close_col)
                .and_then(|raw| raw.trim().parse::<f64>().ok())
                .unwrap_or(f64::NAN);
            observations.push((date, value));
        }

        debug!(
            path = %path.display(),
            observations = observations.len(),
            "Loaded volatility series"
        );
        Self::from_observations(observations)
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// First and last observation dates.
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((self.observations.first()?.0, self.observations.last()?.0))
    }

    /// Index of the observation on `date`, or the latest one before it
    /// within `max_lookback_days` calendar days.
    fn index_at(&self, date: NaiveDate, max_lookback_days: i64) -> Result<usize, LabelError> {
        let after = self.observations.partition_point(|(d, _)| *d <= date);
        let index = after
            .checked_sub(1)
            .ok_or_else(|| LabelError::MissingObservation(date.to_string()))?;
        let (found, _) = self.observations[index];
        if (date - found).num_days() > max_lookback_days {
            return Err(LabelError::MissingObservation(date.to_string()));
        }
        Ok(index)
    }

    fn checked(&self, index: usize) -> Result<Observation, LabelError> {
        let (date, value) = self.observations[index];
        if !value.is_finite() {
            return Err(LabelError::MalformedValue(date.to_string()));
        }
        Ok(Observation { date, value })
    }

    /// Value in effect on `date`.
    ///
    /// # Arguments
    ///
    /// * `date` - Publication date
    /// * `max_lookback_days` - How far back a non-trading date may reach
    pub fn value_at(
        &self,
        date: NaiveDate,
        max_lookback_days: i64,
    ) -> Result<Observation, LabelError> {
        let index = self.index_at(date, max_lookback_days)?;
        self.checked(index)
    }

    /// Value `horizon` trading observations after the one in effect on `date`.
    pub fn value_after(
        &self,
        date: NaiveDate,
        horizon: usize,
        max_lookback_days: i64,
    ) -> Result<Observation, LabelError> {
        let index = self.index_at(date, max_lookback_days)?;
        let target = index + horizon;
        if target >= self.observations.len() {
            return Err(LabelError::MissingFollowUp {
                date: date.to_string(),
                horizon,
            });
        }
        self.checked(target)
    }
}
