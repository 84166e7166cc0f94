use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};

use beamtwin::grid::FeatureBatch;
use beamtwin::models::{Activation, DenseLayer, DenseNetwork};
use beamtwin::{
    CollaboratorError, Collaborators, DenseSurrogate, GridSampler, LoadScenario, PrognosticsModel, ScalerEntry,
    ScalerTable, SimulationAuthority, StressSample, SurrogateModel, TwinConfig, FEATURE_NAMES,
};

struct Flat;

impl SurrogateModel for Flat {
    fn predict(&self, batch: &FeatureBatch) -> Result<Vec<[f64; 3]>, CollaboratorError> {
        Ok(vec![[0.0, 300.0, 0.0]; batch.len()])
    }
}

impl PrognosticsModel for Flat {
    fn predict(&self, _window: &[StressSample]) -> Result<f64, CollaboratorError> {
        Ok(0.2)
    }
}

fn scaler() -> Arc<ScalerTable> {
    Arc::new(
        ScalerTable::from_entries(FEATURE_NAMES.map(|n| (n, ScalerEntry::Standard { mean: 0.0, scale: 1.0 }))).unwrap(),
    )
}

/// Same shape as the production surrogate: 6-64-128-128-64-3, tanh hidden layers.
fn production_shaped_surrogate() -> DenseSurrogate {
    let dims = [6, 64, 128, 128, 64, 3];
    let layers = dims
        .windows(2)
        .enumerate()
        .map(|(i, pair)| DenseLayer {
            weights: vec![vec![0.01; pair[1]]; pair[0]],
            bias: vec![0.0; pair[1]],
            activation: if i + 2 == dims.len() { Activation::Linear } else { Activation::Tanh },
        })
        .collect();
    DenseSurrogate::new(DenseNetwork::new(layers, "bench").unwrap()).unwrap()
}

fn bench_grid_sample(c: &mut Criterion) {
    let config = TwinConfig::default();
    let sampler = GridSampler::from_config(&config, scaler()).unwrap();
    let mut group = c.benchmark_group("grid");
    group.throughput(Throughput::Elements(config.point_count() as u64));
    group.bench_function("sample_r50", |b| b.iter(|| sampler.sample(&LoadScenario::default()).unwrap()));
    group.finish();
}

fn bench_execute_tick(c: &mut Criterion) {
    let config = TwinConfig::default();
    let mut group = c.benchmark_group("tick");
    group.throughput(Throughput::Elements(config.point_count() as u64));

    let flat = SimulationAuthority::new(&config, scaler(), Collaborators::new(Arc::new(Flat), Arc::new(Flat))).unwrap();
    group.bench_function("execute_tick_flat_surrogate", |b| b.iter(|| flat.execute_tick().unwrap()));

    let dense = SimulationAuthority::new(
        &config,
        scaler(),
        Collaborators::new(Arc::new(production_shaped_surrogate()), Arc::new(Flat)),
    )
    .unwrap();
    group.sample_size(20);
    group.bench_function("execute_tick_dense_surrogate", |b| b.iter(|| dense.execute_tick().unwrap()));
    group.finish();
}

criterion_group!(benches, bench_grid_sample, bench_execute_tick);
criterion_main!(benches);
