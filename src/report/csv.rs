//! Metrics table export

use crate::error::{Result, YieldError};
use crate::evaluation::EvaluationReport;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

/// Column order of the exported table
pub const METRICS_COLUMNS: [&str; 7] = ["split", "n_train", "n_test", "mae", "mse", "r2", "cv_r2"];

/// One row per evaluation row; `cv_r2` is null where it was not computed
pub fn metrics_frame(report: &EvaluationReport) -> Result<DataFrame> {
    let rows = &report.rows;
    let df = DataFrame::new(vec![
        Series::new(
            METRICS_COLUMNS[0].into(),
            rows.iter().map(|r| r.split.clone()).collect::<Vec<String>>(),
        )
        .into(),
        Series::new(
            METRICS_COLUMNS[1].into(),
            rows.iter().map(|r| r.n_train as u64).collect::<Vec<u64>>(),
        )
        .into(),
        Series::new(
            METRICS_COLUMNS[2].into(),
            rows.iter().map(|r| r.n_test as u64).collect::<Vec<u64>>(),
        )
        .into(),
        Series::new(
            METRICS_COLUMNS[3].into(),
            rows.iter().map(|r| r.metrics.mae).collect::<Vec<f64>>(),
        )
        .into(),
        Series::new(
            METRICS_COLUMNS[4].into(),
            rows.iter().map(|r| r.metrics.mse).collect::<Vec<f64>>(),
        )
        .into(),
        Series::new(
            METRICS_COLUMNS[5].into(),
            rows.iter().map(|r| r.metrics.r2).collect::<Vec<f64>>(),
        )
        .into(),
        Series::new(
            METRICS_COLUMNS[6].into(),
            rows.iter().map(|r| r.cv_r2).collect::<Vec<Option<f64>>>(),
        )
        .into(),
    ])?;
    Ok(df)
}

/// Write the metrics table as CSV, replacing any existing file
pub fn write_metrics_csv(path: &Path, report: &EvaluationReport) -> Result<()> {
    let mut df = metrics_frame(report)?;
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .finish(&mut df)
        .map_err(|e| YieldError::ReportError(format!("{}: {}", path.display(), e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::{EvaluationRow, RegressionMetrics};

    fn report() -> EvaluationReport {
        let mut report = EvaluationReport::new("SVR");
        report.rows.push(EvaluationRow {
            split: "2020".to_string(),
            n_train: 12,
            n_test: 12,
            metrics: RegressionMetrics { mae: 1.5, mse: 3.0, r2: 0.8 },
            cv_r2: None,
            aggregate: false,
        });
        report.rows.push(EvaluationRow {
            split: "2021".to_string(),
            n_train: 24,
            n_test: 12,
            metrics: RegressionMetrics { mae: 1.0, mse: 2.0, r2: 0.9 },
            cv_r2: Some(0.85),
            aggregate: false,
        });
        report
    }

    #[test]
    fn test_metrics_frame_columns() {
        let df = metrics_frame(&report()).unwrap();
        let names: Vec<String> = df.get_column_names().iter().map(|n| n.to_string()).collect();
        assert_eq!(names, METRICS_COLUMNS.to_vec());
        assert_eq!(df.height(), 2);
    }

    #[test]
    fn test_write_metrics_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metricas.csv");
        write_metrics_csv(&path, &report()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("split,n_train,n_test,mae,mse,r2,cv_r2"));
        let first: Vec<&str> = lines.next().unwrap().split(',').collect();
        assert_eq!(&first[..3], &["2020", "12", "12"]);
        assert_eq!(first[3].parse::<f64>().unwrap(), 1.5);
        assert_eq!(first[5].parse::<f64>().unwrap(), 0.8);
        assert_eq!(first[6], "");
        let second: Vec<&str> = lines.next().unwrap().split(',').collect();
        assert_eq!(second[0], "2021");
        assert_eq!(second[6].parse::<f64>().unwrap(), 0.85);
    }
}
