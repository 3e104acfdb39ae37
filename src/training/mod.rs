//! Model training module
//!
//! Provides the regressors the pipeline can fit:
//! - Ordinary least squares linear regression
//! - Epsilon support-vector regression with an RBF kernel
//! - XGBoost-style gradient-boosted regression trees
//!
//! plus the splitters that partition a dataset for evaluation.

pub mod linear_models;
pub mod split;
pub mod svm;
pub mod xgboost;

pub use linear_models::LinearRegression;
pub use split::{holdout_split, k_fold_splits, temporal_splits, Split, TemporalSplits};
pub use svm::{Gamma, SvrConfig, SvrRegressor};
pub use xgboost::{XGBoostConfig, XGBoostRegressor};

use crate::error::Result;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Common interface of every fitted predictor
pub trait Regressor: Send {
    /// Fit on a training matrix and target vector
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Predict one value per row
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Relative importance per input column, when the model defines one
    fn feature_importances(&self) -> Option<Array1<f64>> {
        None
    }

    fn name(&self) -> &'static str;
}

/// Which model to fit, with its hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelKind {
    Linear { fit_intercept: bool },
    SupportVector(SvrConfig),
    GradientBoosting(XGBoostConfig),
}

impl Default for ModelKind {
    fn default() -> Self {
        ModelKind::Linear {
            fit_intercept: true,
        }
    }
}

impl ModelKind {
    /// Whether inputs must be standardized before fitting.
    /// Tree splits are invariant to monotone rescaling, so boosting skips it.
    pub fn requires_scaling(&self) -> bool {
        !matches!(self, ModelKind::GradientBoosting(_))
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            ModelKind::Linear { .. } => Ok(()),
            ModelKind::SupportVector(config) => config.validate(),
            ModelKind::GradientBoosting(config) => config.validate(),
        }
    }

    /// A fresh, unfitted model
    pub fn build(&self) -> Box<dyn Regressor> {
        match self {
            ModelKind::Linear { fit_intercept } => {
                Box::new(LinearRegression::new().with_fit_intercept(*fit_intercept))
            }
            ModelKind::SupportVector(config) => Box::new(SvrRegressor::new(config.clone())),
            ModelKind::GradientBoosting(config) => Box::new(XGBoostRegressor::new(config.clone())),
        }
    }

    /// Build and fit in one step
    pub fn fit(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<Box<dyn Regressor>> {
        let mut model = self.build();
        model.fit(x, y)?;
        Ok(model)
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::Linear { .. } => write!(f, "linear regression"),
            ModelKind::SupportVector(c) => {
                write!(f, "SVR (rbf, C={}, epsilon={})", c.c, c.epsilon)
            }
            ModelKind::GradientBoosting(c) => write!(
                f,
                "gradient boosting ({} trees, depth {}, lr {})",
                c.n_estimators, c.max_depth, c.learning_rate
            ),
        }
    }
}
