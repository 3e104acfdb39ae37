use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use crop_yield::training::{ModelKind, SvrConfig, XGBoostConfig};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn create_regression_data(n_rows: usize, n_features: usize) -> (Array2<f64>, Array1<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let x = Array2::from_shape_fn((n_rows, n_features), |_| rng.gen::<f64>() * 10.0);

    // Target is the row sum plus noise
    let y = x
        .rows()
        .into_iter()
        .map(|row| row.sum() + rng.gen::<f64>() * 0.1)
        .collect();
    (x, y)
}

fn models() -> [(&'static str, ModelKind); 3] {
    [
        ("linear", ModelKind::default()),
        ("svr", ModelKind::SupportVector(SvrConfig::default())),
        (
            "xgb",
            ModelKind::GradientBoosting(XGBoostConfig::default().with_n_estimators(50)),
        ),
    ]
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(10); // Fewer samples for training benchmarks

    for n_rows in [120, 500, 1000].iter() {
        let (x, y) = create_regression_data(*n_rows, 5);

        for (name, kind) in models() {
            group.bench_with_input(BenchmarkId::new(name, n_rows), &(&x, &y), |b, (x, y)| {
                b.iter(|| kind.fit(black_box(x), black_box(y)).unwrap())
            });
        }
    }

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("prediction");

    let (x_train, y_train) = create_regression_data(500, 5);
    let (x_test, _) = create_regression_data(1000, 5);

    for (name, kind) in models() {
        let model = kind.fit(&x_train, &y_train).unwrap();
        group.bench_function(name, |b| b.iter(|| model.predict(black_box(&x_test)).unwrap()));
    }

    group.finish();
}

criterion_group!(benches, bench_training, bench_prediction);
criterion_main!(benches);
