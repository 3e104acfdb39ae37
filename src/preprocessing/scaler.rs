//! Standard (z-score) feature scaling

use crate::error::{Result, YieldError};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// What to do with a column whose training variance is zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroVariancePolicy {
    /// Refuse to fit, reporting the offending column
    #[default]
    Fail,
    /// Keep the column, centered only (scale forced to 1)
    Center,
}

/// Per-column `(x - mean) / std` scaler.
///
/// Statistics are population statistics (ddof = 0). Parameters are learned by
/// [`fit`](StandardScaler::fit) and applied unchanged by
/// [`transform`](StandardScaler::transform).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    policy: ZeroVariancePolicy,
    column_names: Option<Vec<String>>,
    mean: Option<Array1<f64>>,
    scale: Option<Array1<f64>>,
}

impl Default for StandardScaler {
    fn default() -> Self {
        Self::new(ZeroVariancePolicy::default())
    }
}

impl StandardScaler {
    pub fn new(policy: ZeroVariancePolicy) -> Self {
        Self {
            policy,
            column_names: None,
            mean: None,
            scale: None,
        }
    }

    /// Names used in zero-variance errors instead of column indices
    pub fn with_column_names(mut self, names: Vec<String>) -> Self {
        self.column_names = Some(names);
        self
    }

    pub fn is_fitted(&self) -> bool {
        self.mean.is_some()
    }

    pub fn mean(&self) -> Option<&Array1<f64>> {
        self.mean.as_ref()
    }

    pub fn scale(&self) -> Option<&Array1<f64>> {
        self.scale.as_ref()
    }

    /// Learn per-column mean and standard deviation
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        if x.nrows() == 0 {
            return Err(YieldError::InvalidInput(
                "cannot fit scaler on an empty matrix".to_string(),
            ));
        }

        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| YieldError::ComputationError("column means".to_string()))?;
        let std = x.std_axis(Axis(0), 0.0);

        let mut scale = Array1::ones(x.ncols());
        for (j, (&s, &m)) in std.iter().zip(mean.iter()).enumerate() {
            if s <= 10.0 * f64::EPSILON * m.abs().max(1.0) {
                match self.policy {
                    ZeroVariancePolicy::Fail => {
                        return Err(YieldError::ZeroVariance {
                            column: self.column_name(j),
                        })
                    }
                    ZeroVariancePolicy::Center => {
                        tracing::warn!(column = %self.column_name(j), "zero variance, centering only");
                    }
                }
            } else {
                scale[j] = s;
            }
        }

        self.mean = Some(mean);
        self.scale = Some(scale);
        Ok(self)
    }

    /// Apply the fitted parameters
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (mean, scale) = self.params()?;
        if x.ncols() != mean.len() {
            return Err(YieldError::ShapeError {
                expected: format!("{} columns", mean.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }
        Ok((x - mean) / scale)
    }

    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    /// Undo [`transform`](StandardScaler::transform)
    pub fn inverse_transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (mean, scale) = self.params()?;
        if x.ncols() != mean.len() {
            return Err(YieldError::ShapeError {
                expected: format!("{} columns", mean.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }
        Ok(x * scale + mean)
    }

    fn params(&self) -> Result<(&Array1<f64>, &Array1<f64>)> {
        match (&self.mean, &self.scale) {
            (Some(m), Some(s)) => Ok((m, s)),
            _ => Err(YieldError::ModelNotFitted),
        }
    }

    fn column_name(&self, j: usize) -> String {
        self.column_names
            .as_ref()
            .and_then(|names| names.get(j).cloned())
            .unwrap_or_else(|| format!("column {}", j))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_standard_scaler() {
        let x = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0], [5.0, 50.0]];
        let mut scaler = StandardScaler::default();
        let z = scaler.fit_transform(&x).unwrap();

        for col in z.columns() {
            let mean = col.mean().unwrap();
            let std = col.std(0.0);
            assert!(mean.abs() < 1e-10);
            assert!((std - 1.0).abs() < 1e-10);
        }
    }

    #[test]
    fn test_population_std() {
        let x = array![[1.0], [3.0]];
        let mut scaler = StandardScaler::default();
        scaler.fit(&x).unwrap();
        assert_eq!(scaler.mean().unwrap()[0], 2.0);
        assert_eq!(scaler.scale().unwrap()[0], 1.0);
    }

    #[test]
    fn test_transform_uses_training_parameters() {
        let train = array![[0.0], [2.0], [4.0]];
        let test = array![[6.0], [-2.0]];
        let mut scaler = StandardScaler::default();
        scaler.fit(&train).unwrap();
        let std = (8.0f64 / 3.0).sqrt();
        let z = scaler.transform(&test).unwrap();
        assert!((z[[0, 0]] - 4.0 / std).abs() < 1e-12);
        assert!((z[[1, 0]] + 4.0 / std).abs() < 1e-12);
    }

    #[test]
    fn test_zero_variance_fails_by_default() {
        let x = array![[1.0, 7.0], [2.0, 7.0], [3.0, 7.0]];
        let mut scaler = StandardScaler::default()
            .with_column_names(vec!["NDVI".to_string(), "Mes".to_string()]);
        let err = scaler.fit(&x).unwrap_err();
        assert!(matches!(err, YieldError::ZeroVariance { ref column } if column == "Mes"));
    }

    #[test]
    fn test_zero_variance_center_policy() {
        let x = array![[1.0, 7.0], [2.0, 7.0], [3.0, 7.0]];
        let mut scaler = StandardScaler::new(ZeroVariancePolicy::Center);
        let z = scaler.fit_transform(&x).unwrap();
        assert!(z.column(1).iter().all(|v| *v == 0.0));
        assert_eq!(scaler.scale().unwrap()[1], 1.0);
    }

    #[test]
    fn test_not_fitted_and_shape_mismatch() {
        let scaler = StandardScaler::default();
        assert!(matches!(
            scaler.transform(&array![[1.0]]),
            Err(YieldError::ModelNotFitted)
        ));

        let mut scaler = StandardScaler::default();
        scaler.fit(&array![[1.0, 2.0], [3.0, 5.0]]).unwrap();
        assert!(matches!(
            scaler.transform(&array![[1.0]]),
            Err(YieldError::ShapeError { .. })
        ));
    }

    #[test]
    fn test_inverse_transform() {
        let x = array![[1.0, -3.0], [2.0, 0.5], [9.0, 4.0]];
        let mut scaler = StandardScaler::default();
        let z = scaler.fit_transform(&x).unwrap();
        let back = scaler.inverse_transform(&z).unwrap();
        for (a, b) in x.iter().zip(back.iter()) {
            assert!((a - b).abs() < 1e-10);
        }
    }
}
