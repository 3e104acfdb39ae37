//! Regression evaluation pipeline
//!
//! One configured run: load → split → scale (training rows only) → fit →
//! predict → score → report.

use crate::config::{PipelineConfig, SplitStrategy};
use crate::data::{load_dataset, Dataset};
use crate::error::{Result, YieldError};
use crate::evaluation::{evaluate, EvaluationReport, EvaluationRow, PredictionSet, RegressionMetrics};
use crate::preprocessing::StandardScaler;
use crate::report::{MetricKind, ReportSink};
use crate::training::{holdout_split, k_fold_splits, temporal_splits, Regressor, Split};
use ndarray::{Array1, Array2};
use tracing::{debug, info};

/// Result of fitting and scoring one split
struct SplitOutcome {
    row: EvaluationRow,
    predictions: PredictionSet,
    model: Box<dyn Regressor>,
}

/// Runs one [`PipelineConfig`] end to end
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load the configured dataset and evaluate it.
    ///
    /// Nothing reaches the sink when loading fails.
    pub fn run(&self, sink: &mut dyn ReportSink) -> Result<EvaluationReport> {
        self.config.validate()?;
        info!(
            name = %self.config.name,
            model = %self.config.model,
            data = %self.config.data_path.display(),
            "Starting pipeline"
        );
        let dataset = load_dataset(&self.config.data_path, &self.config.columns)?;
        self.run_on(&dataset, sink)
    }

    /// Evaluate an already loaded dataset
    pub fn run_on(&self, dataset: &Dataset, sink: &mut dyn ReportSink) -> Result<EvaluationReport> {
        self.config.validate()?;
        let mut report = EvaluationReport::new(self.config.name.clone());

        let splits = match &self.config.split {
            SplitStrategy::Holdout {
                test_fraction,
                seed,
                ..
            } => vec![holdout_split(dataset.len(), *test_fraction, *seed)?],
            SplitStrategy::Temporal => {
                let temporal = temporal_splits(dataset, &self.config.columns.timestamp)?;
                report.skipped_years = temporal.skipped;
                temporal.splits
            }
            SplitStrategy::KFold { n_splits, seed } => k_fold_splits(dataset.len(), *n_splits, *seed)?,
        };

        if splits.is_empty() {
            return Err(YieldError::InvalidInput(
                "no split has both a training and an evaluation partition".to_string(),
            ));
        }
        info!(splits = splits.len(), records = dataset.len(), "Splits ready");

        let mut last: Option<SplitOutcome> = None;
        for split in &splits {
            let mut outcome = self.fit_split(dataset, split)?;

            if let SplitStrategy::Holdout {
                cv_folds: Some(k),
                seed,
                ..
            } = &self.config.split
            {
                let cv = self.cross_validated_r2(dataset, &split.train_indices, *k, *seed)?;
                debug!(folds = k, cv_r2 = cv, "Cross-validation on training partition");
                outcome.row.cv_r2 = Some(cv);
            }

            info!(
                split = %outcome.row.split,
                mae = outcome.row.metrics.mae,
                mse = outcome.row.metrics.mse,
                r2 = outcome.row.metrics.r2,
                "Split evaluated"
            );
            report.rows.push(outcome.row.clone());
            last = Some(outcome);
        }

        if matches!(self.config.split, SplitStrategy::KFold { .. }) {
            report.rows.push(mean_row(&report.rows)?);
        }

        let last = last.ok_or_else(|| YieldError::ComputationError("no split evaluated".to_string()))?;
        if let Some(importances) = last.model.feature_importances() {
            report.feature_importances = self
                .config
                .features
                .iter()
                .map(|f| f.label(&self.config.columns))
                .zip(importances.iter().copied())
                .collect();
        }

        sink.metrics_table(&report)?;
        sink.scatter(&last.predictions)?;
        sink.residuals(&last.predictions)?;
        if report.split_rows().count() > 1 {
            sink.metric_bars(&report, MetricKind::Mae)?;
            sink.metric_bars(&report, MetricKind::R2)?;
        }
        if !report.feature_importances.is_empty() {
            sink.feature_importance(&self.config.name, &report.feature_importances)?;
        }

        info!(rows = report.rows.len(), "Pipeline finished");
        Ok(report)
    }

    /// Feature matrices for a split, standardized with training statistics when the model needs it
    pub(crate) fn matrices(&self, dataset: &Dataset, split: &Split) -> Result<(Array2<f64>, Array2<f64>)> {
        let x_train = dataset.feature_matrix(&split.train_indices, &self.config.features);
        let x_test = dataset.feature_matrix(&split.test_indices, &self.config.features);

        if !self.config.model.requires_scaling() {
            return Ok((x_train, x_test));
        }

        let names = self
            .config
            .features
            .iter()
            .map(|f| f.label(&self.config.columns))
            .collect();
        let mut scaler = StandardScaler::new(self.config.zero_variance).with_column_names(names);
        let x_train = scaler.fit_transform(&x_train)?;
        let x_test = scaler.transform(&x_test)?;
        Ok((x_train, x_test))
    }

    fn fit_split(&self, dataset: &Dataset, split: &Split) -> Result<SplitOutcome> {
        debug!(
            split = %split.label,
            n_train = split.train_indices.len(),
            n_test = split.test_indices.len(),
            "Fitting split"
        );
        let (x_train, x_test) = self.matrices(dataset, split)?;
        let y_train = dataset.targets(&split.train_indices);
        let y_test = dataset.targets(&split.test_indices);

        let model = self.config.model.fit(&x_train, &y_train)?;
        let (metrics, predicted) = evaluate(model.as_ref(), &x_test, &y_test)?;

        Ok(SplitOutcome {
            row: EvaluationRow {
                split: split.label.clone(),
                n_train: split.train_indices.len(),
                n_test: split.test_indices.len(),
                metrics,
                cv_r2: None,
                aggregate: false,
            },
            predictions: PredictionSet {
                label: split.label.clone(),
                model_name: self.config.name.clone(),
                actual: y_test,
                predicted,
            },
            model,
        })
    }

    /// Mean R² of k-fold cross-validation restricted to `rows`
    fn cross_validated_r2(&self, dataset: &Dataset, rows: &[usize], k: usize, seed: u64) -> Result<f64> {
        let folds = k_fold_splits(rows.len(), k, seed)?;
        let mut scores = Array1::zeros(folds.len());
        for (i, fold) in folds.iter().enumerate() {
            let split = Split {
                label: fold.label.clone(),
                train_indices: fold.train_indices.iter().map(|&j| rows[j]).collect(),
                test_indices: fold.test_indices.iter().map(|&j| rows[j]).collect(),
            };
            scores[i] = self.fit_split(dataset, &split)?.row.metrics.r2;
        }
        scores
            .mean()
            .ok_or_else(|| YieldError::ComputationError("empty cross-validation".to_string()))
    }
}

/// Summary row over k-fold rows: mean metrics, mean R² repeated in `cv_r2`
fn mean_row(rows: &[EvaluationRow]) -> Result<EvaluationRow> {
    let metrics: Vec<RegressionMetrics> = rows.iter().map(|r| r.metrics).collect();
    let mean = RegressionMetrics::mean(&metrics)
        .ok_or_else(|| YieldError::ComputationError("no folds to average".to_string()))?;
    let n = rows.len().max(1);
    Ok(EvaluationRow {
        split: "mean".to_string(),
        n_train: rows.iter().map(|r| r.n_train).sum::<usize>() / n,
        n_test: rows.iter().map(|r| r.n_test).sum::<usize>() / n,
        metrics: mean,
        cv_r2: Some(mean.r2),
        aggregate: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Feature, YieldRecord};
    use crate::report::{MemoryReporter, ReportEvent};
    use crate::training::{ModelKind, XGBoostConfig};

    fn synthetic(years: &[i32]) -> Dataset {
        let mut records = Vec::new();
        for &year in years {
            for month in 1..=12u32 {
                let t = (year - 2018) as f64 * 12.0 + month as f64;
                let ndvi = 0.4 + 0.02 * ((t * 1.7).sin() + 1.0) * 5.0;
                let rainfall = 50.0 + 40.0 * ((t * 0.9).cos() + 1.0);
                records.push(YieldRecord {
                    year: Some(year),
                    month,
                    ndvi,
                    rainfall,
                    temp_max: 28.0 + (t * 0.5).sin() * 3.0,
                    temp_min: 17.0 + (t * 0.3).cos() * 2.0,
                    yield_tph: 2.0 * ndvi + 0.01 * rainfall,
                });
            }
        }
        Dataset::new(records)
    }

    #[test]
    fn test_linear_holdout_recovers_relationship() {
        let config = PipelineConfig::linear();
        let mut sink = MemoryReporter::new();
        let report = Pipeline::new(config).run_on(&synthetic(&[2019, 2020, 2021]), &mut sink).unwrap();

        assert_eq!(report.rows.len(), 1);
        let row = &report.rows[0];
        assert_eq!((row.n_train, row.n_test), (28, 8));
        assert!(row.metrics.r2 > 0.999, "r2 = {}", row.metrics.r2);
        assert!(row.metrics.mae < 1e-6);
        assert!(sink.last_table().is_some());
        assert_eq!(sink.scatter_labels(), vec!["holdout"]);
        assert!(!sink.events.iter().any(|e| matches!(e, ReportEvent::MetricBars(_))));
    }

    #[test]
    fn test_temporal_rows_and_bar_charts() {
        let config = PipelineConfig::linear().with_split(SplitStrategy::Temporal);
        let mut sink = MemoryReporter::new();
        let report = Pipeline::new(config).run_on(&synthetic(&[2019, 2020, 2021]), &mut sink).unwrap();

        let labels: Vec<&str> = report.rows.iter().map(|r| r.split.as_str()).collect();
        assert_eq!(labels, vec!["2020", "2021"]);
        assert_eq!(report.rows[0].n_train, 12);
        assert_eq!(report.rows[1].n_train, 24);
        assert_eq!(sink.scatter_labels(), vec!["2021"]);
        let bars = sink
            .events
            .iter()
            .filter(|e| matches!(e, ReportEvent::MetricBars(_)))
            .count();
        assert_eq!(bars, 2);
    }

    #[test]
    fn test_scaler_sees_training_rows_only() {
        let dataset = synthetic(&[2019, 2020, 2021]);
        let split = holdout_split(dataset.len(), 0.2, 42).unwrap();
        let config = PipelineConfig::svr();
        let features = config.features.clone();
        let (x_train, x_test) = Pipeline::new(config).matrices(&dataset, &split).unwrap();

        for column in x_train.columns() {
            assert!(column.mean().unwrap().abs() < 1e-10);
            assert!((column.std(0.0) - 1.0).abs() < 1e-10);
        }

        let raw_train = dataset.feature_matrix(&split.train_indices, &features);
        let raw_test = dataset.feature_matrix(&split.test_indices, &features);
        let raw_all = dataset.feature_matrix(&dataset.all_indices(), &features);
        for j in 0..raw_train.ncols() {
            let mean = raw_train.column(j).mean().unwrap();
            let std = raw_train.column(j).std(0.0);
            let expected = raw_test.column(j).mapv(|v| (v - mean) / std);
            for (a, e) in x_test.column(j).iter().zip(expected.iter()) {
                assert!((a - e).abs() < 1e-10, "column {}: {} != {}", j, a, e);
            }
            // Statistics over every row would give a different test matrix
            assert!((raw_all.column(j).mean().unwrap() - mean).abs() > 1e-9);
        }
    }

    #[test]
    fn test_gradient_boosting_matrices_stay_raw() {
        let dataset = synthetic(&[2019, 2020]);
        let split = holdout_split(dataset.len(), 0.2, 42).unwrap();
        let config = PipelineConfig::gradient_boosting();
        let (x_train, _) = Pipeline::new(config.clone()).matrices(&dataset, &split).unwrap();
        assert_eq!(x_train, dataset.feature_matrix(&split.train_indices, &config.features));
    }

    #[test]
    fn test_k_fold_adds_mean_row() {
        let config = PipelineConfig::linear().with_split(SplitStrategy::KFold { n_splits: 4, seed: 3 });
        let report = Pipeline::new(config)
            .run_on(&synthetic(&[2019, 2020]), &mut MemoryReporter::new())
            .unwrap();
        assert_eq!(report.rows.len(), 5);
        let mean = report.rows.last().unwrap();
        assert!(mean.aggregate);
        assert_eq!(mean.split, "mean");
        assert_eq!(mean.cv_r2, Some(mean.metrics.r2));
        assert_eq!(report.split_rows().count(), 4);
    }

    #[test]
    fn test_holdout_cross_validation_column() {
        let config = PipelineConfig::linear().with_split(SplitStrategy::Holdout {
            test_fraction: 0.25,
            seed: 1,
            cv_folds: Some(3),
        });
        let report = Pipeline::new(config)
            .run_on(&synthetic(&[2019, 2020, 2021]), &mut MemoryReporter::new())
            .unwrap();
        let cv = report.rows[0].cv_r2.unwrap();
        assert!(cv > 0.999, "cv_r2 = {}", cv);
    }

    #[test]
    fn test_gradient_boosting_reports_importances() {
        let config = PipelineConfig::gradient_boosting()
            .with_model(ModelKind::GradientBoosting(XGBoostConfig::default().with_n_estimators(20)));
        let mut sink = MemoryReporter::new();
        let report = Pipeline::new(config).run_on(&synthetic(&[2019, 2020]), &mut sink).unwrap();

        assert_eq!(report.feature_importances.len(), Feature::BASE.len());
        assert_eq!(report.feature_importances[0].0, "NDVI");
        let total: f64 = report.feature_importances.iter().map(|(_, v)| v).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(sink
            .events
            .iter()
            .any(|e| matches!(e, ReportEvent::FeatureImportance(_))));
    }

    #[test]
    fn test_zero_variance_feature_fails_before_reporting() {
        let mut records = synthetic(&[2019, 2020]).records().to_vec();
        for r in records.iter_mut() {
            r.temp_min = 18.0;
        }
        let mut sink = MemoryReporter::new();
        let err = Pipeline::new(PipelineConfig::linear())
            .run_on(&Dataset::new(records), &mut sink)
            .unwrap_err();
        assert!(matches!(err, YieldError::ZeroVariance { ref column } if column == "Temp. Mín. (C)"));
        assert!(sink.events.is_empty());
    }

    #[test]
    fn test_single_year_temporal_is_an_error() {
        let config = PipelineConfig::linear().with_split(SplitStrategy::Temporal);
        let err = Pipeline::new(config)
            .run_on(&synthetic(&[2020]), &mut MemoryReporter::new())
            .unwrap_err();
        assert!(matches!(err, YieldError::InvalidInput(_)));
    }
}
