//! Regression metrics and evaluation results

use crate::error::{Result, YieldError};
use crate::training::Regressor;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Error metrics of one prediction set
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    /// Mean absolute error
    pub mae: f64,
    /// Mean squared error
    pub mse: f64,
    /// Coefficient of determination, `1 - SS_res / SS_tot`
    pub r2: f64,
}

impl RegressionMetrics {
    /// Compute MAE, MSE and R².
    ///
    /// A constant truth vector has `SS_tot = 0`; R² is then reported as 0.0
    /// rather than NaN, even when the prediction is exact. scikit-learn's
    /// `r2_score` returns 1.0 for that exact case.
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(YieldError::ShapeError {
                expected: format!("{} predictions", y_true.len()),
                actual: format!("{} predictions", y_pred.len()),
            });
        }
        if y_true.is_empty() {
            return Err(YieldError::InvalidInput(
                "cannot score an empty prediction set".to_string(),
            ));
        }

        let n = y_true.len() as f64;
        let residuals = y_true - y_pred;
        let mae = residuals.mapv(f64::abs).sum() / n;
        let ss_res = residuals.mapv(|r| r * r).sum();
        let mse = ss_res / n;

        let mean = y_true.sum() / n;
        let ss_tot = y_true.mapv(|v| (v - mean).powi(2)).sum();
        let r2 = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

        Ok(Self { mae, mse, r2 })
    }

    pub fn rmse(&self) -> f64 {
        self.mse.sqrt()
    }

    /// Component-wise mean of several metric sets
    pub fn mean(all: &[RegressionMetrics]) -> Option<Self> {
        if all.is_empty() {
            return None;
        }
        let n = all.len() as f64;
        Some(Self {
            mae: all.iter().map(|m| m.mae).sum::<f64>() / n,
            mse: all.iter().map(|m| m.mse).sum::<f64>() / n,
            r2: all.iter().map(|m| m.r2).sum::<f64>() / n,
        })
    }
}

/// Actual and predicted values of one evaluated split
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionSet {
    /// Split label (`holdout`, a year, `fold_<k>`)
    pub label: String,
    /// Human-readable model name
    pub model_name: String,
    pub actual: Array1<f64>,
    pub predicted: Array1<f64>,
}

impl PredictionSet {
    /// `actual - predicted` per sample
    pub fn residuals(&self) -> Array1<f64> {
        &self.actual - &self.predicted
    }

    pub fn len(&self) -> usize {
        self.actual.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actual.is_empty()
    }
}

/// One line of the metrics table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRow {
    pub split: String,
    pub n_train: usize,
    pub n_test: usize,
    pub metrics: RegressionMetrics,
    /// Cross-validated R², when computed
    pub cv_r2: Option<f64>,
    /// Summary row (e.g. the mean over folds) rather than a real split
    pub aggregate: bool,
}

/// Everything a run produced, in split order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub model_name: String,
    pub rows: Vec<EvaluationRow>,
    /// Temporal years dropped because a partition was empty
    pub skipped_years: Vec<i32>,
    /// `(feature label, importance)` in feature order
    pub feature_importances: Vec<(String, f64)>,
}

impl EvaluationReport {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            ..Default::default()
        }
    }

    /// Rows that correspond to a real split
    pub fn split_rows(&self) -> impl Iterator<Item = &EvaluationRow> {
        self.rows.iter().filter(|r| !r.aggregate)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Predict `x` with a fitted model and score against `y`
pub fn evaluate(
    model: &dyn Regressor,
    x: &Array2<f64>,
    y: &Array1<f64>,
) -> Result<(RegressionMetrics, Array1<f64>)> {
    let predicted = model.predict(x)?;
    let metrics = RegressionMetrics::compute(y, &predicted)?;
    Ok((metrics, predicted))
}
