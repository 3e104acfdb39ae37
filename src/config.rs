//! Pipeline configuration
//!
//! Every constant that drives a run (dataset path, column names, feature set,
//! split strategy, model hyperparameters, output locations) lives in
//! [`PipelineConfig`]. The presets reproduce the four analyses the pipeline
//! replaces.

use crate::data::Feature;
use crate::error::{Result, YieldError};
use crate::preprocessing::ZeroVariancePolicy;
use crate::training::{ModelKind, SvrConfig, XGBoostConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Names of the dataset columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMap {
    /// Composite year-month column (e.g. `2019-03`)
    pub timestamp: String,
    /// Month number column, derived from `timestamp` when absent
    pub month: String,
    pub ndvi: String,
    pub rainfall: String,
    pub temp_max: String,
    pub temp_min: String,
    /// Yield target column
    pub target: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            timestamp: "Ano-Mes".to_string(),
            month: "Mes".to_string(),
            ndvi: "NDVI".to_string(),
            rainfall: "Chuva (mm)".to_string(),
            temp_max: "Temp. Máx. (C)".to_string(),
            temp_min: "Temp. Mín. (C)".to_string(),
            target: "Produtividade (ton/ha)".to_string(),
        }
    }
}

/// How records are partitioned into training and evaluation sets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum SplitStrategy {
    /// Seeded random split with a held-out fraction
    Holdout {
        test_fraction: f64,
        seed: u64,
        /// Also report k-fold cross-validated R² over the training partition
        cv_folds: Option<usize>,
    },
    /// Expanding window: train on all years before the target year, evaluate on it
    Temporal,
    /// Shuffled k-fold cross-validation over the whole dataset
    KFold { n_splits: usize, seed: u64 },
}

impl Default for SplitStrategy {
    fn default() -> Self {
        SplitStrategy::Holdout {
            test_fraction: 0.2,
            seed: 42,
            cv_folds: None,
        }
    }
}

/// Where and whether artifacts are written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for the metrics table
    pub dir: PathBuf,
    /// Directory for PNG charts
    pub images_dir: PathBuf,
    /// Metrics table file name
    pub metrics_file: String,
    /// File name prefix for charts
    pub prefix: String,
    /// Render charts (the metrics table is always written)
    pub plots: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("tests"),
            images_dir: PathBuf::from("tests/images"),
            metrics_file: "metricas.csv".to_string(),
            prefix: "modelo".to_string(),
            plots: true,
        }
    }
}

impl OutputConfig {
    /// Output set with a chart prefix and metrics file name
    pub fn named(prefix: &str, metrics_file: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            metrics_file: metrics_file.to_string(),
            ..Default::default()
        }
    }

    /// Put both the table and the charts under `dir` (charts in `dir/images`)
    pub fn with_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.dir = dir.as_ref().to_path_buf();
        self.images_dir = dir.as_ref().join("images");
        self
    }

    pub fn with_plots(mut self, plots: bool) -> Self {
        self.plots = plots;
        self
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.dir.join(&self.metrics_file)
    }

    /// Chart path under the run prefix, e.g. `svr_real_vs_prevista.png`
    pub fn image_path(&self, name: &str) -> PathBuf {
        self.images_dir.join(format!("{}_{}.png", self.prefix, name))
    }

    /// Chart path without the run prefix, for per-split charts such as `residuos_2021.png`
    pub fn split_image_path(&self, name: &str) -> PathBuf {
        self.images_dir.join(format!("{}.png", name))
    }
}

/// Full configuration of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Human-readable model label used in chart titles and logs
    pub name: String,
    pub data_path: PathBuf,
    pub columns: ColumnMap,
    /// Ordered model inputs
    pub features: Vec<Feature>,
    pub split: SplitStrategy,
    pub model: ModelKind,
    pub zero_variance: ZeroVariancePolicy,
    pub output: OutputConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: "Regressão Linear".to_string(),
            data_path: PathBuf::from("data/dataset_unificado.csv"),
            columns: ColumnMap::default(),
            features: Feature::BASE.to_vec(),
            split: SplitStrategy::default(),
            model: ModelKind::default(),
            zero_variance: ZeroVariancePolicy::default(),
            output: OutputConfig::named("regressao_linear", "regressao_linear_metricas.csv"),
        }
    }
}

impl PipelineConfig {
    /// Linear regression benchmark on a 80/20 holdout split
    pub fn linear() -> Self {
        Self::default()
    }

    /// RBF support-vector regression on a 80/20 holdout split
    pub fn svr() -> Self {
        Self {
            name: "SVR".to_string(),
            model: ModelKind::SupportVector(SvrConfig::default()),
            output: OutputConfig::named("svr", "svr_metricas.csv"),
            ..Self::default()
        }
    }

    /// Gradient-boosted trees on raw features with feature importances
    pub fn gradient_boosting() -> Self {
        Self {
            name: "XGBoost".to_string(),
            model: ModelKind::GradientBoosting(XGBoostConfig::default()),
            output: OutputConfig::named("xgb", "xgb_metricas.csv"),
            ..Self::default()
        }
    }

    /// Year-over-year SVR evaluation with an expanding training window
    pub fn temporal_svr() -> Self {
        Self {
            name: "SVR".to_string(),
            split: SplitStrategy::Temporal,
            model: ModelKind::SupportVector(SvrConfig::default()),
            output: OutputConfig::named("avaliacao", "avaliacao_temporal_metricas.csv"),
            ..Self::default()
        }
    }

    /// Gradient-boosted trees on the base plus derived climate features,
    /// with a 5-fold cross-validated R² over the training partition
    pub fn gradient_boosting_extended() -> Self {
        Self {
            name: "XGBoost (variáveis derivadas)".to_string(),
            features: Feature::EXTENDED.to_vec(),
            split: SplitStrategy::Holdout {
                test_fraction: 0.2,
                seed: 42,
                cv_folds: Some(5),
            },
            model: ModelKind::GradientBoosting(XGBoostConfig::default()),
            output: OutputConfig::named("xgb_estendido", "xgb_estendido_metricas.csv"),
            ..Self::default()
        }
    }

    pub fn with_data_path(mut self, path: impl AsRef<Path>) -> Self {
        self.data_path = path.as_ref().to_path_buf();
        self
    }

    pub fn with_features(mut self, features: &[Feature]) -> Self {
        self.features = features.to_vec();
        self
    }

    pub fn with_split(mut self, split: SplitStrategy) -> Self {
        self.split = split;
        self
    }

    pub fn with_model(mut self, model: ModelKind) -> Self {
        self.model = model;
        self
    }

    pub fn with_zero_variance(mut self, policy: ZeroVariancePolicy) -> Self {
        self.zero_variance = policy;
        self
    }

    pub fn with_output(mut self, output: OutputConfig) -> Self {
        self.output = output;
        self
    }

    /// Check the configuration before touching any data
    pub fn validate(&self) -> Result<()> {
        if self.features.is_empty() {
            return Err(YieldError::ConfigError("feature list is empty".to_string()));
        }
        let mut seen = HashSet::new();
        for feature in &self.features {
            if !seen.insert(feature) {
                return Err(YieldError::ConfigError(format!(
                    "feature {:?} listed more than once",
                    feature
                )));
            }
        }

        match &self.split {
            SplitStrategy::Holdout {
                test_fraction,
                cv_folds,
                ..
            } => {
                if !(*test_fraction > 0.0 && *test_fraction < 1.0) {
                    return Err(YieldError::InvalidParameter {
                        name: "test_fraction".to_string(),
                        value: test_fraction.to_string(),
                        reason: "must lie strictly between 0 and 1".to_string(),
                    });
                }
                if let Some(k) = cv_folds {
                    check_folds(*k)?;
                }
            }
            SplitStrategy::KFold { n_splits, .. } => check_folds(*n_splits)?,
            SplitStrategy::Temporal => {}
        }

        self.model.validate()
    }

    /// Load a configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn check_folds(k: usize) -> Result<()> {
    if k < 2 {
        return Err(YieldError::InvalidParameter {
            name: "n_splits".to_string(),
            value: k.to_string(),
            reason: "cross-validation needs at least 2 folds".to_string(),
        });
    }
    Ok(())
}

/// Named starting configurations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Linear,
    Svr,
    Xgb,
    XgbExtended,
    TemporalSvr,
}

impl Preset {
    pub const ALL: [Preset; 5] = [
        Preset::Linear,
        Preset::Svr,
        Preset::Xgb,
        Preset::XgbExtended,
        Preset::TemporalSvr,
    ];

    pub fn config(&self) -> PipelineConfig {
        match self {
            Preset::Linear => PipelineConfig::linear(),
            Preset::Svr => PipelineConfig::svr(),
            Preset::Xgb => PipelineConfig::gradient_boosting(),
            Preset::XgbExtended => PipelineConfig::gradient_boosting_extended(),
            Preset::TemporalSvr => PipelineConfig::temporal_svr(),
        }
    }
}

impl FromStr for Preset {
    type Err = YieldError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "linear" | "linear_regression" => Ok(Preset::Linear),
            "svr" | "svm" => Ok(Preset::Svr),
            "xgb" | "xgboost" | "gradient_boosting" => Ok(Preset::Xgb),
            "xgb-extended" | "xgb_extended" => Ok(Preset::XgbExtended),
            "temporal-svr" | "temporal_svr" | "temporal" => Ok(Preset::TemporalSvr),
            other => Err(YieldError::ConfigError(format!("unknown preset '{}'", other))),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Preset::Linear => "linear",
            Preset::Svr => "svr",
            Preset::Xgb => "xgb",
            Preset::XgbExtended => "xgb-extended",
            Preset::TemporalSvr => "temporal-svr",
        };
        f.write_str(name)
    }
}
