//! Dataset model
//!
//! One [`YieldRecord`] per (location-implicit) month, carrying the remote
//! sensing and climate attributes plus the yield target. Models never see
//! records directly: [`Dataset::feature_matrix`] materializes an ordered
//! [`Feature`] selection into an `ndarray` matrix.

pub mod features;
pub mod loader;

pub use features::{climate_index, temperature_range};
pub use loader::{load_dataset, parse_year_month, records_from_frame};

use crate::config::ColumnMap;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A single monthly observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YieldRecord {
    /// Calendar year, known when the composite year-month column was parsed
    pub year: Option<i32>,
    /// Calendar month, 1..=12
    pub month: u32,
    /// Normalized Difference Vegetation Index
    pub ndvi: f64,
    /// Rainfall in millimetres
    pub rainfall: f64,
    /// Maximum temperature (°C)
    pub temp_max: f64,
    /// Minimum temperature (°C)
    pub temp_min: f64,
    /// Yield in tons per hectare
    pub yield_tph: f64,
}

impl YieldRecord {
    /// Value of a single feature for this record
    pub fn feature(&self, feature: Feature) -> f64 {
        match feature {
            Feature::Ndvi => self.ndvi,
            Feature::Rainfall => self.rainfall,
            Feature::TempMax => self.temp_max,
            Feature::TempMin => self.temp_min,
            Feature::Month => self.month as f64,
            Feature::TemperatureRange => temperature_range(self),
            Feature::ClimateIndex => climate_index(self),
        }
    }
}

/// Model input columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Ndvi,
    Rainfall,
    TempMax,
    TempMin,
    Month,
    /// `temp_max - temp_min`
    TemperatureRange,
    /// `rainfall / (temp_max + 1)`
    ClimateIndex,
}

impl Feature {
    /// The five columns every model variant uses
    pub const BASE: [Feature; 5] = [
        Feature::Ndvi,
        Feature::Rainfall,
        Feature::TempMax,
        Feature::TempMin,
        Feature::Month,
    ];

    /// Base columns plus the two derived climate features
    pub const EXTENDED: [Feature; 7] = [
        Feature::Ndvi,
        Feature::Rainfall,
        Feature::TempMax,
        Feature::TempMin,
        Feature::Month,
        Feature::TemperatureRange,
        Feature::ClimateIndex,
    ];

    /// Whether the value is computed rather than read from the file
    pub fn is_derived(&self) -> bool {
        matches!(self, Feature::TemperatureRange | Feature::ClimateIndex)
    }

    /// Display label, using the dataset's own column names where one exists
    pub fn label(&self, columns: &ColumnMap) -> String {
        match self {
            Feature::Ndvi => columns.ndvi.clone(),
            Feature::Rainfall => columns.rainfall.clone(),
            Feature::TempMax => columns.temp_max.clone(),
            Feature::TempMin => columns.temp_min.clone(),
            Feature::Month => columns.month.clone(),
            Feature::TemperatureRange => "Amplitude Térmica (C)".to_string(),
            Feature::ClimateIndex => "Índice Climático".to_string(),
        }
    }
}

/// Summary statistics of one feature over the whole dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSummary {
    pub feature: Feature,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// An in-memory record set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    records: Vec<YieldRecord>,
}

impl Dataset {
    /// Wrap a set of records
    pub fn new(records: Vec<YieldRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[YieldRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether every record carries a calendar year
    pub fn has_years(&self) -> bool {
        !self.records.is_empty() && self.records.iter().all(|r| r.year.is_some())
    }

    /// Distinct years present, ascending
    pub fn years(&self) -> Vec<i32> {
        self.records
            .iter()
            .filter_map(|r| r.year)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Build a row-major feature matrix for the selected rows, in feature order
    pub fn feature_matrix(&self, rows: &[usize], features: &[Feature]) -> Array2<f64> {
        Array2::from_shape_fn((rows.len(), features.len()), |(r, c)| {
            self.records[rows[r]].feature(features[c])
        })
    }

    /// Yield values for the selected rows
    pub fn targets(&self, rows: &[usize]) -> Array1<f64> {
        rows.iter().map(|&i| self.records[i].yield_tph).collect()
    }

    /// Indices of all records
    pub fn all_indices(&self) -> Vec<usize> {
        (0..self.records.len()).collect()
    }

    /// Per-feature mean/min/max over every record
    pub fn summary(&self, features: &[Feature]) -> Vec<FeatureSummary> {
        let n = self.records.len().max(1) as f64;
        features
            .iter()
            .map(|&feature| {
                let values = self.records.iter().map(|r| r.feature(feature));
                let (sum, min, max) = values.fold(
                    (0.0, f64::INFINITY, f64::NEG_INFINITY),
                    |(s, lo, hi), v| (s + v, lo.min(v), hi.max(v)),
                );
                FeatureSummary {
                    feature,
                    mean: sum / n,
                    min,
                    max,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(year: i32, month: u32, ndvi: f64) -> YieldRecord {
        YieldRecord {
            year: Some(year),
            month,
            ndvi,
            rainfall: 100.0,
            temp_max: 30.0,
            temp_min: 18.0,
            yield_tph: 80.0,
        }
    }

    #[test]
    fn test_feature_matrix_follows_feature_order() {
        let ds = Dataset::new(vec![record(2020, 1, 0.5), record(2020, 2, 0.7)]);
        let x = ds.feature_matrix(&[1, 0], &[Feature::Month, Feature::Ndvi]);
        assert_eq!(x.shape(), &[2, 2]);
        assert_eq!(x[[0, 0]], 2.0);
        assert_eq!(x[[0, 1]], 0.7);
        assert_eq!(x[[1, 0]], 1.0);
    }

    #[test]
    fn test_years_sorted_distinct() {
        let ds = Dataset::new(vec![
            record(2021, 1, 0.5),
            record(2019, 1, 0.5),
            record(2021, 2, 0.5),
        ]);
        assert_eq!(ds.years(), vec![2019, 2021]);
        assert!(ds.has_years());
    }

    #[test]
    fn test_derived_features_in_matrix() {
        let ds = Dataset::new(vec![record(2020, 1, 0.5)]);
        let x = ds.feature_matrix(&[0], &Feature::EXTENDED);
        assert_eq!(x.ncols(), 7);
        assert!((x[[0, 5]] - 12.0).abs() < 1e-12);
        assert!((x[[0, 6]] - 100.0 / 31.0).abs() < 1e-12);
    }

    #[test]
    fn test_summary() {
        let ds = Dataset::new(vec![record(2020, 1, 0.2), record(2020, 2, 0.6)]);
        let summary = ds.summary(&[Feature::Ndvi]);
        assert!((summary[0].mean - 0.4).abs() < 1e-12);
        assert_eq!(summary[0].min, 0.2);
        assert_eq!(summary[0].max, 0.6);
    }
}
