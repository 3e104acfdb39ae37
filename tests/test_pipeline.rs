//! Integration test: CSV dataset → split → scale → fit → score → report files

use crop_yield::config::{ColumnMap, OutputConfig, PipelineConfig, SplitStrategy};
use crop_yield::data::{load_dataset, Feature};
use crop_yield::error::YieldError;
use crop_yield::evaluation::RegressionMetrics;
use crop_yield::pipeline::Pipeline;
use crop_yield::preprocessing::{StandardScaler, ZeroVariancePolicy};
use crop_yield::report::{FileReporter, MemoryReporter};
use crop_yield::training::temporal_splits;
use ndarray::Array1;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

const HEADER: &str = "Ano-Mes,NDVI,Chuva (mm),Temp. Máx. (C),Temp. Mín. (C),Produtividade (ton/ha)";

/// Monthly rows for each year; yield is an exact linear function of the inputs
/// unless `constant_yield` is given.
fn write_dataset(dir: &Path, years: &[i32], constant_yield: Option<f64>) -> PathBuf {
    let mut csv = String::from(HEADER);
    csv.push('\n');
    for &year in years {
        for month in 1..=12u32 {
            let t = (year - 2018) as f64 * 12.0 + month as f64;
            let ndvi = 0.5 + 0.1 * (t * 1.3).sin();
            let rain = 90.0 + 60.0 * (t * 0.7).cos();
            let tmax = 29.0 + 2.5 * (t * 0.45).sin();
            let tmin = 18.0 + 1.5 * (t * 0.25).cos();
            let yield_tph = constant_yield
                .unwrap_or(60.0 + 25.0 * ndvi + 0.04 * rain + 0.6 * tmax - 0.4 * tmin);
            writeln!(
                csv,
                "{}-{:02},{},{},{},{},{}",
                year, month, ndvi, rain, tmax, tmin, yield_tph
            )
            .unwrap();
        }
    }
    let path = dir.join("dataset_unificado.csv");
    std::fs::write(&path, csv).unwrap();
    path
}

#[test]
fn test_linear_holdout_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_dataset(dir.path(), &[2019, 2020, 2021], None);
    let out = dir.path().join("out");

    let config = PipelineConfig::linear()
        .with_data_path(&data)
        .with_output(OutputConfig::named("regressao_linear", "regressao_linear_metricas.csv").with_dir(&out));
    let mut reporter = FileReporter::new(config.output.clone());
    let report = Pipeline::new(config).run(&mut reporter).unwrap();

    assert_eq!(report.rows.len(), 1);
    let row = &report.rows[0];
    assert_eq!(row.split, "holdout");
    assert_eq!((row.n_train, row.n_test), (28, 8));
    assert!(row.metrics.r2 > 0.999, "r2 = {}", row.metrics.r2);
    assert!(row.metrics.mae < 1e-3);
    assert!(report.feature_importances.is_empty());

    assert!(out.join("regressao_linear_metricas.csv").exists());
    assert!(out.join("images/regressao_linear_real_vs_prevista.png").exists());
    assert!(out.join("images/regressao_linear_residuos.png").exists());
    assert_eq!(reporter.written().len(), 3);

    let csv = std::fs::read_to_string(out.join("regressao_linear_metricas.csv")).unwrap();
    assert!(csv.starts_with("split,n_train,n_test,mae,mse,r2,cv_r2"));
    assert_eq!(csv.lines().count(), 2);
}

#[test]
fn test_temporal_svr_writes_yearly_charts() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_dataset(dir.path(), &[2019, 2020, 2021], None);

    let mut config = PipelineConfig::temporal_svr().with_data_path(&data);
    config.output = config.output.with_dir(dir.path());
    let mut reporter = FileReporter::new(config.output.clone());
    let report = Pipeline::new(config).run(&mut reporter).unwrap();

    let years: Vec<&str> = report.rows.iter().map(|r| r.split.as_str()).collect();
    assert_eq!(years, vec!["2020", "2021"]);
    assert!(report.skipped_years.is_empty());
    for row in &report.rows {
        assert_eq!(row.n_test, 12);
        assert!(row.metrics.mae.is_finite());
    }

    let images = dir.path().join("images");
    for name in [
        "disp_real_vs_prevista_2021.png",
        "residuos_2021.png",
        "avaliacao_mae_por_ano.png",
        "avaliacao_r2_por_ano.png",
    ] {
        assert!(images.join(name).exists(), "{} missing", name);
    }
    assert!(dir.path().join("avaliacao_temporal_metricas.csv").exists());
}

#[test]
fn test_temporal_training_window_grows() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_dataset(dir.path(), &[2018, 2019, 2020, 2021], None);
    let dataset = load_dataset(&data, &ColumnMap::default()).unwrap();

    let temporal = temporal_splits(&dataset, "Ano-Mes").unwrap();
    assert_eq!(temporal.splits.len(), 3);

    let mut previous = 0;
    for split in &temporal.splits {
        let year: i32 = split.label.parse().unwrap();
        assert!(split.train_indices.len() > previous);
        previous = split.train_indices.len();
        for &i in &split.train_indices {
            assert!(dataset.records()[i].year.unwrap() < year);
        }
        for &i in &split.test_indices {
            assert_eq!(dataset.records()[i].year, Some(year));
        }
    }
}

#[test]
fn test_constant_yield_gives_zero_r2() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_dataset(dir.path(), &[2019, 2020], Some(80.0));

    let config = PipelineConfig::linear().with_data_path(&data);
    let report = Pipeline::new(config).run(&mut MemoryReporter::new()).unwrap();
    let metrics = report.rows[0].metrics;
    assert_eq!(metrics.r2, 0.0);
    assert!(metrics.mae < 1e-6);
}

#[test]
fn test_missing_dataset_creates_no_output() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out");

    let mut config = PipelineConfig::svr().with_data_path(dir.path().join("absent.csv"));
    config.output = config.output.with_dir(&out);
    let mut reporter = FileReporter::new(config.output.clone());
    let err = Pipeline::new(config).run(&mut reporter).unwrap_err();

    assert!(matches!(err, YieldError::DatasetNotFound(ref p) if p.ends_with("absent.csv")));
    assert!(!out.exists());
    assert!(reporter.written().is_empty());
}

#[test]
fn test_k_fold_table_has_mean_row() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_dataset(dir.path(), &[2019, 2020], None);

    let config = PipelineConfig::linear()
        .with_data_path(&data)
        .with_split(SplitStrategy::KFold { n_splits: 5, seed: 7 })
        .with_output(OutputConfig::named("kfold", "kfold_metricas.csv").with_dir(dir.path()));
    let mut reporter = FileReporter::new(config.output.clone());
    let report = Pipeline::new(config).run(&mut reporter).unwrap();

    assert_eq!(report.rows.len(), 6);
    let n_test: usize = report.split_rows().map(|r| r.n_test).sum();
    assert_eq!(n_test, 24);

    let csv = std::fs::read_to_string(dir.path().join("kfold_metricas.csv")).unwrap();
    assert_eq!(csv.lines().count(), 7);
    assert!(csv.lines().last().unwrap().starts_with("mean,"));
    assert!(dir.path().join("images/kfold_mae_por_split.png").exists());
}

#[test]
fn test_extended_features_feed_models() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_dataset(dir.path(), &[2019, 2020, 2021], None);

    let config = PipelineConfig::gradient_boosting()
        .with_data_path(&data)
        .with_features(&Feature::EXTENDED);
    let report = Pipeline::new(config).run(&mut MemoryReporter::new()).unwrap();

    let labels: Vec<&str> = report.feature_importances.iter().map(|(l, _)| l.as_str()).collect();
    assert_eq!(labels.len(), 7);
    assert!(labels.contains(&"Amplitude Térmica (C)"));
    assert!(labels.contains(&"Índice Climático"));
    assert!(report.rows[0].metrics.mae.is_finite());
}

#[test]
fn test_scaled_training_matrix_is_standardized() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_dataset(dir.path(), &[2019, 2020], None);
    let dataset = load_dataset(&data, &ColumnMap::default()).unwrap();

    let x = dataset.feature_matrix(&dataset.all_indices(), &Feature::BASE);
    let mut scaler = StandardScaler::new(ZeroVariancePolicy::Fail);
    let scaled = scaler.fit_transform(&x).unwrap();

    for column in scaled.columns() {
        let mean = column.mean().unwrap();
        let std = column.std(0.0);
        assert!(mean.abs() < 1e-10, "mean = {}", mean);
        assert!((std - 1.0).abs() < 1e-10, "std = {}", std);
    }
}

#[test]
fn test_mean_predictor_scores_zero_r2() {
    let y = Array1::from(vec![70.0, 74.0, 78.0, 82.0, 86.0]);
    let mean = y.mean().unwrap();
    let metrics = RegressionMetrics::compute(&y, &Array1::from_elem(y.len(), mean)).unwrap();
    assert!(metrics.r2.abs() < 1e-12);
    assert!((metrics.mae - 4.8).abs() < 1e-12);
    assert!((metrics.mse - 32.0).abs() < 1e-12);

    // A training mean away from the evaluation mean scores below zero
    let shifted = RegressionMetrics::compute(&y, &Array1::from_elem(y.len(), mean + 10.0)).unwrap();
    assert!(shifted.r2 < 0.0);
}
