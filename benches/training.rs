use churn_mlops::training::{ChurnModel, Hyperparameters, ModelType};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn create_classification_data(n_rows: usize, n_features: usize) -> (Array2<f64>, Array1<f64>) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let x = Array2::from_shape_fn((n_rows, n_features), |_| rng.gen::<f64>() * 2.0 - 1.0);

    // Label depends on the first two features plus noise
    let y = x
        .rows()
        .into_iter()
        .map(|row| {
            let score = row[0] + 0.5 * row[1] + rng.gen::<f64>() * 0.3;
            if score > 0.0 { 1.0 } else { 0.0 }
        })
        .collect::<Array1<f64>>();
    (x, y)
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(10); // Fewer samples for training benchmarks

    let params = Hyperparameters::default().with_n_estimators(50);
    for n_rows in [1000, 5000].iter() {
        let data = create_classification_data(*n_rows, 40);

        for model_type in ModelType::ALL {
            group.bench_with_input(
                BenchmarkId::new(model_type.as_str(), n_rows),
                &data,
                |b, (x, y)| {
                    b.iter(|| {
                        let mut model = ChurnModel::create(model_type, params.clone(), 42).unwrap();
                        model.fit(black_box(x), black_box(y)).unwrap();
                    })
                },
            );
        }
    }

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("prediction");

    // Train model once
    let (x_train, y_train) = create_classification_data(5000, 40);
    let mut model = ChurnModel::create(
        ModelType::RandomForest,
        Hyperparameters::default(),
        42,
    )
    .unwrap();
    model.fit(&x_train, &y_train).unwrap();

    for n_rows in [1, 100, 1000].iter() {
        let (x, _) = create_classification_data(*n_rows, 40);

        group.bench_with_input(BenchmarkId::new("predict_probability", n_rows), &x, |b, x| {
            b.iter(|| model.predict_probability(black_box(x)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_training, bench_prediction);
criterion_main!(benches);
