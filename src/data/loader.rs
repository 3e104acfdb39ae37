//! CSV dataset loading

use super::{Dataset, YieldRecord};
use crate::config::ColumnMap;
use crate::error::{Result, YieldError};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

/// Load the unified dataset from a CSV file.
///
/// Fails with [`YieldError::DatasetNotFound`] before opening anything when the
/// path does not exist.
pub fn load_dataset(path: impl AsRef<Path>, columns: &ColumnMap) -> Result<Dataset> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(YieldError::DatasetNotFound(path.to_path_buf()));
    }

    let file = File::open(path)?;
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(100))
        .into_reader_with_file_handle(file)
        .finish()
        .map_err(|e| YieldError::DataError(e.to_string()))?;

    debug!(rows = df.height(), cols = df.width(), path = %path.display(), "CSV parsed");

    let dataset = records_from_frame(&df, columns)?;
    info!(records = dataset.len(), years = ?dataset.years(), "Dataset loaded");
    Ok(dataset)
}

/// Convert a parsed frame into typed records.
///
/// The month comes from the month column when present, otherwise it is
/// extracted from the composite year-month column. The year is only known
/// when the composite column exists.
pub fn records_from_frame(df: &DataFrame, columns: &ColumnMap) -> Result<Dataset> {
    let has_month = has_column(df, &columns.month);
    let has_timestamp = has_column(df, &columns.timestamp);

    if !has_month && !has_timestamp {
        return Err(YieldError::missing_column(
            &columns.month,
            format!(
                "not found and '{}' is not available to derive it",
                columns.timestamp
            ),
        ));
    }

    let year_months = if has_timestamp {
        Some(timestamp_column(df, &columns.timestamp)?)
    } else {
        None
    };

    let months: Vec<u32> = if has_month {
        numeric_column(df, &columns.month)?
            .into_iter()
            .enumerate()
            .map(|(row, v)| month_from_value(v, &columns.month, row))
            .collect::<Result<Vec<_>>>()?
    } else {
        year_months
            .as_ref()
            .map(|ym| ym.iter().map(|&(_, m)| m).collect())
            .unwrap_or_default()
    };

    let ndvi = numeric_column(df, &columns.ndvi)?;
    let rainfall = numeric_column(df, &columns.rainfall)?;
    let temp_max = numeric_column(df, &columns.temp_max)?;
    let temp_min = numeric_column(df, &columns.temp_min)?;
    let target = numeric_column(df, &columns.target)?;

    let records = (0..df.height())
        .map(|i| YieldRecord {
            year: year_months.as_ref().map(|ym| ym[i].0),
            month: months[i],
            ndvi: ndvi[i],
            rainfall: rainfall[i],
            temp_max: temp_max[i],
            temp_min: temp_min[i],
            yield_tph: target[i],
        })
        .collect();

    Ok(Dataset::new(records))
}

/// Parse a year-month timestamp into `(year, month)`.
///
/// Accepts `YYYY-MM`, `YYYY/MM`, `YYYY-MM-DD`, `YYYY/MM/DD` and
/// `YYYY-MM-DD HH:MM:SS` (also with a `T` separator).
pub fn parse_year_month(raw: &str) -> Option<(i32, u32)> {
    let s = raw.trim();

    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some((d.year(), d.month()));
        }
    }

    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some((dt.year(), dt.month()));
        }
    }

    for sep in ['-', '/'] {
        let padded = format!("{s}{sep}01");
        let fmt = format!("%Y{sep}%m{sep}%d");
        if let Ok(d) = NaiveDate::parse_from_str(&padded, &fmt) {
            return Some((d.year(), d.month()));
        }
    }

    None
}

fn has_column(df: &DataFrame, name: &str) -> bool {
    df.column(name).is_ok()
}

fn numeric_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = df
        .column(name)
        .map_err(|_| YieldError::missing_column(name, "required column not found"))?;
    let cast = column
        .cast(&DataType::Float64)
        .map_err(|e| YieldError::DataError(format!("column '{}': {}", name, e)))?;

    cast.as_materialized_series()
        .f64()
        .map_err(|e| YieldError::DataError(e.to_string()))?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.ok_or_else(|| {
                YieldError::DataError(format!("missing value in '{}' at row {}", name, row + 1))
            })
        })
        .collect()
}

fn timestamp_column(df: &DataFrame, name: &str) -> Result<Vec<(i32, u32)>> {
    let column = df
        .column(name)
        .map_err(|_| YieldError::missing_column(name, "required column not found"))?;
    let cast = column
        .cast(&DataType::String)
        .map_err(|e| YieldError::DataError(format!("column '{}': {}", name, e)))?;

    cast.as_materialized_series()
        .str()
        .map_err(|e| YieldError::DataError(e.to_string()))?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            let raw = v.ok_or_else(|| {
                YieldError::DataError(format!("missing value in '{}' at row {}", name, row + 1))
            })?;
            parse_year_month(raw).ok_or_else(|| {
                YieldError::DataError(format!(
                    "cannot parse '{}' in '{}' at row {} as a year-month",
                    raw,
                    name,
                    row + 1
                ))
            })
        })
        .collect()
}

fn month_from_value(value: f64, column: &str, row: usize) -> Result<u32> {
    if value.fract() != 0.0 || !(1.0..=12.0).contains(&value) {
        return Err(YieldError::DataError(format!(
            "invalid month {} in '{}' at row {}",
            value,
            column,
            row + 1
        )));
    }
    Ok(value as u32)
}
