//! Derived climate features

use super::YieldRecord;

/// Daily temperature amplitude: `temp_max - temp_min`
pub fn temperature_range(record: &YieldRecord) -> f64 {
    record.temp_max - record.temp_min
}

/// Rainfall relative to heat: `rainfall / (temp_max + 1)`.
/// The +1 offset keeps the ratio finite at 0 °C.
pub fn climate_index(record: &YieldRecord) -> f64 {
    record.rainfall / (record.temp_max + 1.0)
}
