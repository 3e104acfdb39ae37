//! Data preprocessing
//!
//! Feature standardization fit on the training partition only.

mod scaler;

pub use scaler::{StandardScaler, ZeroVariancePolicy};
