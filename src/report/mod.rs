//! Reporting sinks
//!
//! The pipeline never touches the filesystem for output directly: it hands
//! results to a [`ReportSink`]. [`FileReporter`] writes the metrics CSV and
//! the PNG charts; [`MemoryReporter`] keeps everything in memory.

pub mod csv;
pub mod plots;

pub use self::csv::{metrics_frame, write_metrics_csv, METRICS_COLUMNS};

use crate::config::OutputConfig;
use crate::error::{Result, YieldError};
use crate::evaluation::{EvaluationReport, EvaluationRow, PredictionSet};
use std::fs;
use std::path::PathBuf;
use tracing::info;

/// Metric drawn in a per-split bar chart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Mae,
    R2,
}

impl MetricKind {
    pub fn value(&self, row: &EvaluationRow) -> f64 {
        match self {
            MetricKind::Mae => row.metrics.mae,
            MetricKind::R2 => row.metrics.r2,
        }
    }

    fn slug(&self) -> &'static str {
        match self {
            MetricKind::Mae => "mae",
            MetricKind::R2 => "r2",
        }
    }

    fn axis_label(&self) -> &'static str {
        match self {
            MetricKind::Mae => "Erro Absoluto Médio (ton/ha)",
            MetricKind::R2 => "R² (Coeficiente de Determinação)",
        }
    }

    fn short_name(&self) -> &'static str {
        match self {
            MetricKind::Mae => "MAE",
            MetricKind::R2 => "R²",
        }
    }
}

/// Destination for everything a pipeline run produces
pub trait ReportSink {
    /// The per-split metrics table
    fn metrics_table(&mut self, report: &EvaluationReport) -> Result<()>;

    /// Predicted vs. actual values of one split
    fn scatter(&mut self, predictions: &PredictionSet) -> Result<()>;

    /// Residuals of one split
    fn residuals(&mut self, predictions: &PredictionSet) -> Result<()>;

    /// One bar per split for the given metric
    fn metric_bars(&mut self, report: &EvaluationReport, metric: MetricKind) -> Result<()>;

    /// `(feature label, importance)` pairs of the fitted model
    fn feature_importance(&mut self, model_name: &str, importances: &[(String, f64)]) -> Result<()>;
}

/// Writes the metrics CSV and PNG charts under an [`OutputConfig`]
#[derive(Debug, Clone)]
pub struct FileReporter {
    output: OutputConfig,
    written: Vec<PathBuf>,
}

impl FileReporter {
    pub fn new(output: OutputConfig) -> Self {
        Self {
            output,
            written: Vec::new(),
        }
    }

    /// Files written so far, in order
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn chart_path(&mut self, name: &ChartName) -> Result<Option<PathBuf>> {
        if !self.output.plots {
            return Ok(None);
        }
        fs::create_dir_all(&self.output.images_dir)?;
        Ok(Some(match name {
            ChartName::Run(name) => self.output.image_path(name),
            ChartName::Split(name) => self.output.split_image_path(name),
        }))
    }

    fn record(&mut self, path: PathBuf) {
        info!(path = %path.display(), "written");
        self.written.push(path);
    }
}

fn plot_error(path: &std::path::Path, err: Box<dyn std::error::Error>) -> YieldError {
    YieldError::ReportError(format!("{}: {}", path.display(), err))
}

/// File stem of a chart: run charts carry the output prefix, per-split
/// charts are named after the split alone (`residuos_2021`)
#[derive(Debug, Clone, PartialEq, Eq)]
enum ChartName {
    Run(String),
    Split(String),
}

/// Holdout keeps the run-level name; any other split gets its own file
fn split_chart(run_name: &str, split_name: &str, label: &str) -> ChartName {
    if label == "holdout" {
        ChartName::Run(run_name.to_string())
    } else {
        ChartName::Split(format!("{}_{}", split_name, label))
    }
}

/// Bar chart file and axis naming depends on what the splits are
fn split_axis(report: &EvaluationReport) -> (&'static str, &'static str) {
    let all_years = report
        .split_rows()
        .all(|r| r.split.parse::<i32>().is_ok());
    if all_years {
        ("por_ano", "Ano de Teste")
    } else {
        ("por_split", "Partição")
    }
}

impl ReportSink for FileReporter {
    fn metrics_table(&mut self, report: &EvaluationReport) -> Result<()> {
        fs::create_dir_all(&self.output.dir)?;
        let path = self.output.metrics_path();
        write_metrics_csv(&path, report)?;
        self.record(path);
        Ok(())
    }

    fn scatter(&mut self, predictions: &PredictionSet) -> Result<()> {
        let name = split_chart("real_vs_prevista", "disp_real_vs_prevista", &predictions.label);
        if let Some(path) = self.chart_path(&name)? {
            let title = if predictions.label == "holdout" {
                format!("Produtividade Real vs Prevista - {}", predictions.model_name)
            } else {
                format!(
                    "Produtividade Real vs Prevista - {} ({})",
                    predictions.label, predictions.model_name
                )
            };
            plots::scatter_plot(&path, predictions, &title).map_err(|e| plot_error(&path, e))?;
            self.record(path);
        }
        Ok(())
    }

    fn residuals(&mut self, predictions: &PredictionSet) -> Result<()> {
        let name = split_chart("residuos", "residuos", &predictions.label);
        if let Some(path) = self.chart_path(&name)? {
            let title = if predictions.label == "holdout" {
                format!("Resíduos do Modelo {}", predictions.model_name)
            } else {
                format!(
                    "Resíduos do Modelo {} - {}",
                    predictions.model_name, predictions.label
                )
            };
            plots::residual_plot(&path, predictions, &title).map_err(|e| plot_error(&path, e))?;
            self.record(path);
        }
        Ok(())
    }

    fn metric_bars(&mut self, report: &EvaluationReport, metric: MetricKind) -> Result<()> {
        let (suffix, x_desc) = split_axis(report);
        let name = ChartName::Run(format!("{}_{}", metric.slug(), suffix));
        if let Some(path) = self.chart_path(&name)? {
            let rows: Vec<&EvaluationRow> = report.split_rows().collect();
            let labels: Vec<String> = rows.iter().map(|r| r.split.clone()).collect();
            let values: Vec<f64> = rows.iter().map(|r| metric.value(r)).collect();
            let title = format!("{} por {} ({})", metric.short_name(), x_desc, report.model_name);
            plots::bar_chart(&path, &labels, &values, &title, x_desc, metric.axis_label())
                .map_err(|e| plot_error(&path, e))?;
            self.record(path);
        }
        Ok(())
    }

    fn feature_importance(&mut self, model_name: &str, importances: &[(String, f64)]) -> Result<()> {
        if let Some(path) = self.chart_path(&ChartName::Run("importancia_variaveis".to_string()))? {
            let title = format!("Importância das Variáveis - {}", model_name);
            plots::importance_chart(&path, importances, &title).map_err(|e| plot_error(&path, e))?;
            self.record(path);
        }
        Ok(())
    }
}

/// One call received by a [`MemoryReporter`]
#[derive(Debug, Clone, PartialEq)]
pub enum ReportEvent {
    MetricsTable(EvaluationReport),
    Scatter(PredictionSet),
    Residuals(PredictionSet),
    MetricBars(MetricKind),
    FeatureImportance(Vec<(String, f64)>),
}

/// Collects every report call in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryReporter {
    pub events: Vec<ReportEvent>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last metrics table received
    pub fn last_table(&self) -> Option<&EvaluationReport> {
        self.events.iter().rev().find_map(|e| match e {
            ReportEvent::MetricsTable(r) => Some(r),
            _ => None,
        })
    }

    /// Labels of the splits that got a scatter plot
    pub fn scatter_labels(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ReportEvent::Scatter(p) => Some(p.label.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl ReportSink for MemoryReporter {
    fn metrics_table(&mut self, report: &EvaluationReport) -> Result<()> {
        self.events.push(ReportEvent::MetricsTable(report.clone()));
        Ok(())
    }

    fn scatter(&mut self, predictions: &PredictionSet) -> Result<()> {
        self.events.push(ReportEvent::Scatter(predictions.clone()));
        Ok(())
    }

    fn residuals(&mut self, predictions: &PredictionSet) -> Result<()> {
        self.events.push(ReportEvent::Residuals(predictions.clone()));
        Ok(())
    }

    fn metric_bars(&mut self, _report: &EvaluationReport, metric: MetricKind) -> Result<()> {
        self.events.push(ReportEvent::MetricBars(metric));
        Ok(())
    }

    fn feature_importance(&mut self, _model_name: &str, importances: &[(String, f64)]) -> Result<()> {
        self.events
            .push(ReportEvent::FeatureImportance(importances.to_vec()));
        Ok(())
    }
}
