use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use prism_core::projection::run_projection;
use prism_core::{
    CancelToken, ChannelData, ChannelPair, CorrelationConfig, CorrelationEngine,
    ProjectionConfig, ProjectionMethod, Wavelength, compute_correlation,
};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Batch sizes in the range the projectors are meant for.
const ROWS: &[usize] = &[25, 50, 100];
const DIMS: usize = 8;

fn matrix(rows: usize) -> Vec<Vec<f64>> {
    let mut rng = SmallRng::seed_from_u64(42);
    (0..rows)
        .map(|_| (0..DIMS).map(|_| rng.random_range(-1.0..1.0)).collect())
        .collect()
}

fn bench_projectors(c: &mut Criterion) {
    let mut group = c.benchmark_group("Projection");
    group.sample_size(10);

    for method in [ProjectionMethod::Pca, ProjectionMethod::Umap, ProjectionMethod::Tsne] {
        let config = ProjectionConfig::with_method(method);
        for &rows in ROWS {
            let data = matrix(rows);
            group.bench_with_input(BenchmarkId::new(method.as_str(), rows), &rows, |b, _| {
                b.iter(|| {
                    let mut rng = SmallRng::seed_from_u64(config.seed);
                    black_box(run_projection(&data, &config, &mut rng, &CancelToken::new()))
                })
            });
        }
    }

    group.finish();
}

fn bench_correlation(c: &mut Criterion) {
    let mut group = c.benchmark_group("Correlation");
    let config = CorrelationConfig::default();
    let pair = ChannelPair::new(Wavelength::Temporal, Wavelength::Phase);

    for &len in &[64usize, 256, 1024] {
        let mut rng = SmallRng::seed_from_u64(7);
        let x: Vec<f64> = (0..len).map(|_| rng.random()).collect();
        let y: Vec<f64> = x.iter().map(|v| v * 0.5 + rng.random::<f64>()).collect();
        let a = ChannelData::from_values(Wavelength::Temporal, &x).extract_time_series();
        let b = ChannelData::from_values(Wavelength::Phase, &y).extract_time_series();

        group.bench_with_input(BenchmarkId::new("compute", len), &len, |bench, _| {
            bench.iter(|| black_box(compute_correlation(pair, &a, &b, &config)))
        });
    }

    group.bench_function("cached_lookup", |bench| {
        let mut engine = CorrelationEngine::new(config.clone());
        engine.update_channel_data(ChannelData::from_values(Wavelength::Temporal, &[1.0, 2.0, 3.0]));
        engine.update_channel_data(ChannelData::from_values(Wavelength::Phase, &[3.0, 1.0, 2.0]));
        bench.iter(|| black_box(engine.get_correlation(pair)))
    });

    group.finish();
}

criterion_group!(benches, bench_projectors, bench_correlation);
criterion_main!(benches);
