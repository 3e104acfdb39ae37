//! Crop yield - sugarcane productivity regression
//!
//! Loads monthly NDVI and climate observations, fits a regressor to predict
//! yield in ton/ha, and evaluates it under a configurable split strategy.
//!
//! # Modules
//!
//! ## Data
//! - [`data`] - Dataset loading and derived climate features
//! - [`preprocessing`] - Standard scaling
//!
//! ## Modelling
//! - [`training`] - Linear regression, RBF SVR, gradient boosted trees and data splits
//! - [`evaluation`] - MAE, MSE and R²
//!
//! ## Orchestration
//! - [`config`] - Pipeline configuration and presets
//! - [`pipeline`] - Split, scale, fit, evaluate, report
//! - [`report`] - Metrics CSV and charts behind [`report::ReportSink`]
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Data and modelling
pub mod data;
pub mod preprocessing;
pub mod training;
pub mod evaluation;

// Orchestration
pub mod config;
pub mod pipeline;
pub mod report;

// Services
pub mod cli;

pub use error::{Result, YieldError};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{Result, YieldError};

    // Data
    pub use crate::data::{load_dataset, Dataset, Feature, YieldRecord};

    // Preprocessing
    pub use crate::preprocessing::{StandardScaler, ZeroVariancePolicy};

    // Training
    pub use crate::training::{
        holdout_split, k_fold_splits, temporal_splits, LinearRegression, ModelKind, Regressor,
        Split, SvrConfig, SvrRegressor, XGBoostConfig, XGBoostRegressor,
    };

    // Evaluation
    pub use crate::evaluation::{evaluate, EvaluationReport, EvaluationRow, RegressionMetrics};

    // Orchestration
    pub use crate::config::{ColumnMap, OutputConfig, PipelineConfig, Preset, SplitStrategy};
    pub use crate::pipeline::Pipeline;
    pub use crate::report::{FileReporter, MemoryReporter, ReportSink};
}
