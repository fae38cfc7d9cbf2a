use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use automl_agent::automl::{AutoMl, Metric, NativeAutoMl};
use automl_agent::config::AutoMlSettings;
use automl_agent::dataset::Dataset;
use automl_agent::task::TaskKind;
use polars::prelude::*;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn create_regression_data(n_rows: usize, n_features: usize) -> Dataset {
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    let features: Vec<Vec<f64>> = (0..n_features)
        .map(|_| (0..n_rows).map(|_| rng.gen::<f64>() * 10.0).collect())
        .collect();

    // Target is the feature sum plus noise
    let target: Vec<f64> = (0..n_rows)
        .map(|i| features.iter().map(|f| f[i]).sum::<f64>() + rng.gen::<f64>() * 0.1)
        .collect();

    let mut columns: Vec<Column> = features
        .into_iter()
        .enumerate()
        .map(|(i, values)| Series::new(format!("feature_{}", i).into(), values).into())
        .collect();
    columns.push(Series::new("target".into(), target).into());

    Dataset::from_frame(DataFrame::new(columns).expect("valid frame"))
}

fn bench_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("compare");
    group.sample_size(10);

    let automl = NativeAutoMl::new(AutoMlSettings {
        random_seed: 42,
        cv_folds: 3,
        tune_iterations: 5,
    });

    for n_rows in [200, 1000].iter() {
        let dataset = create_regression_data(*n_rows, 8);
        let experiment = automl
            .setup(&dataset, "target", TaskKind::Regression, 42)
            .expect("setup");

        group.bench_with_input(BenchmarkId::new("regression", n_rows), &experiment, |b, exp| {
            b.iter(|| black_box(automl.compare(exp, Metric::R2).expect("compare")));
        });
    }

    group.finish();
}

fn bench_tune(c: &mut Criterion) {
    let mut group = c.benchmark_group("tune");
    group.sample_size(10);

    let automl = NativeAutoMl::new(AutoMlSettings {
        random_seed: 42,
        cv_folds: 3,
        tune_iterations: 5,
    });
    let dataset = create_regression_data(500, 8);
    let experiment = automl
        .setup(&dataset, "target", TaskKind::Regression, 42)
        .expect("setup");
    let best = automl.compare(&experiment, Metric::R2).expect("compare").best;

    group.bench_function("best_candidate", |b| {
        b.iter(|| black_box(automl.tune(&experiment, &best, Metric::R2).expect("tune")));
    });

    group.finish();
}

criterion_group!(benches, bench_compare, bench_tune);
criterion_main!(benches);
