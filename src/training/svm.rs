//! Epsilon support-vector regression
//!
//! RBF-kernel SVR solved with SMO (Sequential Minimal Optimization) using
//! second-order working-set selection. The dual has `2l` variables: the first
//! `l` are the `α` multipliers and the last `l` the `α*` multipliers, so the
//! regression problem is handled by the same pair-update rule as a binary
//! classifier with labels `+1` / `-1`.

use super::Regressor;
use crate::error::{Result, YieldError};
use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Maximum number of samples for eager kernel matrix computation.
/// Beyond this, training will return an error to prevent OOM.
const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

/// Rows at or above this count build the kernel matrix in parallel
const PARALLEL_KERNEL_THRESHOLD: usize = 256;

const TAU: f64 = 1e-12;

/// RBF kernel width
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gamma {
    /// `1 / (n_features * Var(X))` over the training matrix
    Scale,
    Fixed(f64),
}

impl Gamma {
    /// Concrete γ for a training matrix
    pub fn resolve(&self, x: &Array2<f64>) -> f64 {
        match *self {
            Gamma::Fixed(g) => g,
            Gamma::Scale => {
                let var = x.var(0.0);
                let n_features = x.ncols().max(1) as f64;
                if var > 0.0 {
                    1.0 / (n_features * var)
                } else {
                    1.0
                }
            }
        }
    }
}

/// SVR hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvrConfig {
    /// Regularization parameter (C)
    pub c: f64,
    /// Half-width of the insensitive tube
    pub epsilon: f64,
    pub gamma: Gamma,
    /// Stopping tolerance on the maximal KKT violation
    pub tol: f64,
    /// Hard cap on SMO iterations
    pub max_iter: usize,
}

impl Default for SvrConfig {
    fn default() -> Self {
        Self {
            c: 100.0,
            epsilon: 0.5,
            gamma: Gamma::Scale,
            tol: 1e-3,
            max_iter: 1_000_000,
        }
    }
}

impl SvrConfig {
    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_gamma(mut self, gamma: Gamma) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let check = |name: &str, value: f64, ok: bool, reason: &str| {
            if ok {
                Ok(())
            } else {
                Err(YieldError::InvalidParameter {
                    name: name.to_string(),
                    value: value.to_string(),
                    reason: reason.to_string(),
                })
            }
        };
        check("c", self.c, self.c > 0.0, "must be positive")?;
        check("epsilon", self.epsilon, self.epsilon >= 0.0, "must be non-negative")?;
        check("tol", self.tol, self.tol > 0.0, "must be positive")?;
        if let Gamma::Fixed(g) = self.gamma {
            check("gamma", g, g > 0.0, "must be positive")?;
        }
        if self.max_iter == 0 {
            return Err(YieldError::InvalidParameter {
                name: "max_iter".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

fn rbf(a: ArrayView1<f64>, b: ArrayView1<f64>, gamma: f64) -> f64 {
    let sq: f64 = a.iter().zip(b.iter()).map(|(u, v)| (u - v) * (u - v)).sum();
    (-gamma * sq).exp()
}

/// Full `l × l` RBF kernel matrix
fn kernel_matrix(x: &Array2<f64>, gamma: f64) -> Array2<f64> {
    let n = x.nrows();
    let row = |i: usize| -> Vec<f64> { (0..n).map(|j| rbf(x.row(i), x.row(j), gamma)).collect() };

    let rows: Vec<Vec<f64>> = if n >= PARALLEL_KERNEL_THRESHOLD {
        (0..n).into_par_iter().map(row).collect()
    } else {
        (0..n).map(row).collect()
    };

    let mut k = Array2::zeros((n, n));
    for (i, values) in rows.into_iter().enumerate() {
        for (j, v) in values.into_iter().enumerate() {
            k[[i, j]] = v;
        }
    }
    k
}

/// Dual solver state over the `2l` SVR variables
struct SmoSolver<'a> {
    kernel: &'a Array2<f64>,
    l: usize,
    c: f64,
    eps: f64,
    sign: Vec<f64>,
    alpha: Vec<f64>,
    grad: Vec<f64>,
}

impl<'a> SmoSolver<'a> {
    fn new(kernel: &'a Array2<f64>, y: &Array1<f64>, c: f64, epsilon: f64, tol: f64) -> Self {
        let l = y.len();
        let mut sign = vec![1.0; 2 * l];
        let mut grad = vec![0.0; 2 * l];
        for i in 0..l {
            sign[i + l] = -1.0;
            grad[i] = epsilon - y[i];
            grad[i + l] = epsilon + y[i];
        }
        Self {
            kernel,
            l,
            c,
            eps: tol,
            sign,
            alpha: vec![0.0; 2 * l],
            grad,
        }
    }

    #[inline]
    fn q(&self, t: usize, s: usize) -> f64 {
        self.sign[t] * self.sign[s] * self.kernel[[t % self.l, s % self.l]]
    }

    #[inline]
    fn qd(&self, t: usize) -> f64 {
        self.kernel[[t % self.l, t % self.l]]
    }

    fn is_upper_bound(&self, t: usize) -> bool {
        self.alpha[t] >= self.c
    }

    fn is_lower_bound(&self, t: usize) -> bool {
        self.alpha[t] <= 0.0
    }

    /// Second-order working-set selection; `None` once the KKT gap is below tolerance
    fn select_working_set(&self) -> Option<(usize, usize)> {
        let n = 2 * self.l;
        let mut gmax = f64::NEG_INFINITY;
        let mut gmax2 = f64::NEG_INFINITY;
        let mut gmax_idx = None;
        let mut gmin_idx = None;
        let mut obj_diff_min = f64::INFINITY;

        for t in 0..n {
            if self.sign[t] > 0.0 {
                if !self.is_upper_bound(t) && -self.grad[t] >= gmax {
                    gmax = -self.grad[t];
                    gmax_idx = Some(t);
                }
            } else if !self.is_lower_bound(t) && self.grad[t] >= gmax {
                gmax = self.grad[t];
                gmax_idx = Some(t);
            }
        }

        let i = gmax_idx?;

        for j in 0..n {
            if self.sign[j] > 0.0 {
                if !self.is_lower_bound(j) {
                    let grad_diff = gmax + self.grad[j];
                    gmax2 = gmax2.max(self.grad[j]);
                    if grad_diff > 0.0 {
                        let quad = self.qd(i) + self.qd(j) - 2.0 * self.sign[i] * self.q(i, j);
                        let obj_diff = -(grad_diff * grad_diff) / if quad > 0.0 { quad } else { TAU };
                        if obj_diff <= obj_diff_min {
                            gmin_idx = Some(j);
                            obj_diff_min = obj_diff;
                        }
                    }
                }
            } else if !self.is_upper_bound(j) {
                let grad_diff = gmax - self.grad[j];
                gmax2 = gmax2.max(-self.grad[j]);
                if grad_diff > 0.0 {
                    let quad = self.qd(i) + self.qd(j) + 2.0 * self.sign[i] * self.q(i, j);
                    let obj_diff = -(grad_diff * grad_diff) / if quad > 0.0 { quad } else { TAU };
                    if obj_diff <= obj_diff_min {
                        gmin_idx = Some(j);
                        obj_diff_min = obj_diff;
                    }
                }
            }
        }

        if gmax + gmax2 < self.eps {
            return None;
        }
        gmin_idx.map(|j| (i, j))
    }

    /// Analytic two-variable update with box clipping, then gradient refresh
    fn update_pair(&mut self, i: usize, j: usize) {
        let c = self.c;
        let old_i = self.alpha[i];
        let old_j = self.alpha[j];

        if self.sign[i] != self.sign[j] {
            let mut quad = self.qd(i) + self.qd(j) + 2.0 * self.q(i, j);
            if quad <= 0.0 {
                quad = TAU;
            }
            let delta = (-self.grad[i] - self.grad[j]) / quad;
            let diff = self.alpha[i] - self.alpha[j];
            self.alpha[i] += delta;
            self.alpha[j] += delta;

            if diff > 0.0 {
                if self.alpha[j] < 0.0 {
                    self.alpha[j] = 0.0;
                    self.alpha[i] = diff;
                }
            } else if self.alpha[i] < 0.0 {
                self.alpha[i] = 0.0;
                self.alpha[j] = -diff;
            }
            if diff > 0.0 {
                if self.alpha[i] > c {
                    self.alpha[i] = c;
                    self.alpha[j] = c - diff;
                }
            } else if self.alpha[j] > c {
                self.alpha[j] = c;
                self.alpha[i] = c + diff;
            }
        } else {
            let mut quad = self.qd(i) + self.qd(j) - 2.0 * self.q(i, j);
            if quad <= 0.0 {
                quad = TAU;
            }
            let delta = (self.grad[i] - self.grad[j]) / quad;
            let sum = self.alpha[i] + self.alpha[j];
            self.alpha[i] -= delta;
            self.alpha[j] += delta;

            if sum > c {
                if self.alpha[i] > c {
                    self.alpha[i] = c;
                    self.alpha[j] = sum - c;
                }
                if self.alpha[j] > c {
                    self.alpha[j] = c;
                    self.alpha[i] = sum - c;
                }
            } else {
                if self.alpha[j] < 0.0 {
                    self.alpha[j] = 0.0;
                    self.alpha[i] = sum;
                }
                if self.alpha[i] < 0.0 {
                    self.alpha[i] = 0.0;
                    self.alpha[j] = sum;
                }
            }
        }

        let d_i = self.alpha[i] - old_i;
        let d_j = self.alpha[j] - old_j;
        for k in 0..2 * self.l {
            self.grad[k] += self.q(i, k) * d_i + self.q(j, k) * d_j;
        }
    }

    /// Offset `ρ`: mean over free variables, else the midpoint of the feasible interval
    fn rho(&self) -> f64 {
        let mut nr_free = 0usize;
        let mut sum_free = 0.0;
        let mut ub = f64::INFINITY;
        let mut lb = f64::NEG_INFINITY;

        for t in 0..2 * self.l {
            let yg = self.sign[t] * self.grad[t];
            if self.is_upper_bound(t) {
                if self.sign[t] < 0.0 {
                    ub = ub.min(yg);
                } else {
                    lb = lb.max(yg);
                }
            } else if self.is_lower_bound(t) {
                if self.sign[t] > 0.0 {
                    ub = ub.min(yg);
                } else {
                    lb = lb.max(yg);
                }
            } else {
                nr_free += 1;
                sum_free += yg;
            }
        }

        if nr_free > 0 {
            sum_free / nr_free as f64
        } else {
            (ub + lb) / 2.0
        }
    }

    /// Run to convergence or the iteration cap; returns the iteration count
    fn solve(&mut self, max_iter: usize) -> usize {
        let mut iter = 0;
        while iter < max_iter {
            match self.select_working_set() {
                Some((i, j)) => self.update_pair(i, j),
                None => return iter,
            }
            iter += 1;
        }
        warn!(max_iter, "SMO reached the iteration cap before converging");
        iter
    }
}

/// Support vector regressor with an RBF kernel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvrRegressor {
    config: SvrConfig,
    support_vectors: Option<Array2<f64>>,
    /// `α - α*` for each support vector
    dual_coef: Option<Array1<f64>>,
    rho: f64,
    gamma: f64,
}

impl SvrRegressor {
    pub fn new(config: SvrConfig) -> Self {
        Self {
            config,
            support_vectors: None,
            dual_coef: None,
            rho: 0.0,
            gamma: 0.0,
        }
    }

    pub fn config(&self) -> &SvrConfig {
        &self.config
    }

    /// Fit the dual problem on the given training set
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.config.validate()?;
        let n = x.nrows();

        if n != y.len() {
            return Err(YieldError::ShapeError {
                expected: format!("y length = {}", n),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n == 0 {
            return Err(YieldError::InvalidInput(
                "cannot fit SVR on an empty training set".to_string(),
            ));
        }
        if n > MAX_KERNEL_MATRIX_SAMPLES {
            return Err(YieldError::InvalidInput(format!(
                "Dataset has {} samples, exceeding the maximum {} for SVR kernel matrix. \
                 Consider subsampling or using a different algorithm.",
                n, MAX_KERNEL_MATRIX_SAMPLES
            )));
        }

        let gamma = self.config.gamma.resolve(x);
        let kernel = kernel_matrix(x, gamma);

        let mut solver = SmoSolver::new(&kernel, y, self.config.c, self.config.epsilon, self.config.tol);
        let iterations = solver.solve(self.config.max_iter);
        let rho = solver.rho();

        let coef: Vec<f64> = (0..n).map(|i| solver.alpha[i] - solver.alpha[i + n]).collect();
        let support: Vec<usize> = (0..n).filter(|&i| coef[i] != 0.0).collect();

        let mut support_vectors = Array2::zeros((support.len(), x.ncols()));
        let mut dual_coef = Array1::zeros(support.len());
        for (k, &idx) in support.iter().enumerate() {
            support_vectors.row_mut(k).assign(&x.row(idx));
            dual_coef[k] = coef[idx];
        }

        debug!(
            iterations,
            gamma,
            rho,
            n_support = support.len(),
            "SVR fitted"
        );

        self.support_vectors = Some(support_vectors);
        self.dual_coef = Some(dual_coef);
        self.rho = rho;
        self.gamma = gamma;
        Ok(())
    }

    /// `Σ (α_i - α*_i) K(x_i, x) - ρ` for each row of `x`
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (sv, coef) = match (&self.support_vectors, &self.dual_coef) {
            (Some(sv), Some(coef)) => (sv, coef),
            _ => return Err(YieldError::ModelNotFitted),
        };
        if x.ncols() != sv.ncols() {
            return Err(YieldError::ShapeError {
                expected: format!("{} features", sv.ncols()),
                actual: format!("{} features", x.ncols()),
            });
        }

        Ok(x.outer_iter()
            .map(|row| {
                sv.outer_iter()
                    .zip(coef.iter())
                    .map(|(s, &a)| a * rbf(row, s, self.gamma))
                    .sum::<f64>()
                    - self.rho
            })
            .collect())
    }

    pub fn n_support_vectors(&self) -> usize {
        self.support_vectors.as_ref().map(|sv| sv.nrows()).unwrap_or(0)
    }

    /// The γ resolved during the last fit
    pub fn fitted_gamma(&self) -> Option<f64> {
        self.support_vectors.as_ref().map(|_| self.gamma)
    }
}

impl Regressor for SvrRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        SvrRegressor::fit(self, x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        SvrRegressor::predict(self, x)
    }

    fn name(&self) -> &'static str {
        "SVR"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_svr_fits_smooth_function() {
        let x = Array2::from_shape_fn((40, 1), |(i, _)| i as f64 / 39.0 * 6.0 - 3.0);
        let y: Array1<f64> = x.column(0).mapv(|v| v.sin());

        let config = SvrConfig::default()
            .with_c(10.0)
            .with_epsilon(0.01)
            .with_gamma(Gamma::Fixed(1.0));
        let mut svr = SvrRegressor::new(config);
        svr.fit(&x, &y).unwrap();

        let pred = svr.predict(&x).unwrap();
        for (p, t) in pred.iter().zip(y.iter()) {
            assert!((p - t).abs() < 0.05, "pred {} vs target {}", p, t);
        }
        assert!(svr.n_support_vectors() > 0);
    }

    #[test]
    fn test_wide_tube_predicts_midrange() {
        // Every target fits inside the tube, so all multipliers stay at zero
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![10.0, 10.4, 10.2, 10.8];
        let mut svr = SvrRegressor::new(SvrConfig::default().with_epsilon(1.0));
        svr.fit(&x, &y).unwrap();

        assert_eq!(svr.n_support_vectors(), 0);
        let pred = svr.predict(&array![[0.5], [7.0]]).unwrap();
        for p in pred.iter() {
            assert!((p - 10.4).abs() < 1e-12);
        }
    }

    #[test]
    fn test_gamma_scale() {
        let x = array![[0.0, 2.0], [2.0, 0.0]];
        // population variance of {0, 2, 2, 0} is 1
        assert!((Gamma::Scale.resolve(&x) - 0.5).abs() < 1e-12);
        assert_eq!(Gamma::Scale.resolve(&array![[1.0], [1.0]]), 1.0);
        assert_eq!(Gamma::Fixed(0.3).resolve(&x), 0.3);
    }

    #[test]
    fn test_svm_regressor_linear_trend() {
        let x = Array2::from_shape_vec((10, 1), (1..=10).map(|v| v as f64).collect()).unwrap();
        let y = x.column(0).mapv(|v| 2.0 * v);

        let mut svr = SvrRegressor::new(SvrConfig::default());
        svr.fit(&x, &y).unwrap();
        let predictions = svr.predict(&x).unwrap();

        for (pred, actual) in predictions.iter().zip(y.iter()) {
            assert!((pred - actual).abs() < 1.0, "pred={}, actual={}", pred, actual);
        }
    }

    #[test]
    fn test_invalid_config_and_unfitted() {
        let mut svr = SvrRegressor::new(SvrConfig::default().with_c(0.0));
        assert!(matches!(
            svr.fit(&array![[1.0]], &array![1.0]),
            Err(YieldError::InvalidParameter { .. })
        ));
        let svr = SvrRegressor::new(SvrConfig::default());
        assert!(matches!(svr.predict(&array![[1.0]]), Err(YieldError::ModelNotFitted)));
    }
}
