use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use beamtwin::grid::FeatureBatch;
use beamtwin::{
    CadenceMode, CollaboratorError, Collaborators, PrognosticsModel, ScalerEntry, ScalerTable, SessionManager,
    SimulationAuthority, StressSample, SurrogateModel, TickResult, TwinConfig, FEATURE_NAMES,
};

/// Stress varies across the mesh so damage growth depends on amplification.
struct Gradient;

impl SurrogateModel for Gradient {
    fn predict(&self, batch: &FeatureBatch) -> Result<Vec<[f64; 3]>, CollaboratorError> {
        Ok(batch.iter().map(|row| [0.0, 2_000.0 + row[0], 0.0]).collect())
    }
}

struct Mean;

impl PrognosticsModel for Mean {
    fn predict(&self, window: &[StressSample]) -> Result<f64, CollaboratorError> {
        let mean = window.iter().map(|s| s.avg_stress).sum::<f64>() / window.len() as f64;
        Ok((mean / 10_000.0).min(1.0))
    }
}

fn config(mode: CadenceMode) -> TwinConfig {
    TwinConfig {
        resolution: 3,
        cadence_ms: 5,
        cadence_mode: mode,
        ..TwinConfig::default()
    }
}

fn authority(config: &TwinConfig) -> Arc<SimulationAuthority> {
    let scaler =
        ScalerTable::from_entries(FEATURE_NAMES.map(|n| (n, ScalerEntry::Standard { mean: 0.0, scale: 1.0 }))).unwrap();
    Arc::new(
        SimulationAuthority::new(config, Arc::new(scaler), Collaborators::new(Arc::new(Gradient), Arc::new(Mean)))
            .unwrap(),
    )
}

/// Damage by tick index from a fresh single-caller authority.
fn reference_trajectory(config: &TwinConfig, ticks: u64) -> BTreeMap<u64, f64> {
    let auth = authority(config);
    (0..ticks)
        .map(|_| {
            let r = auth.execute_tick().unwrap();
            (r.tick, r.damage)
        })
        .collect()
}

async fn collect(rx: &mut mpsc::Receiver<Arc<TickResult>>, n: usize) -> Vec<Arc<TickResult>> {
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        out.push(rx.recv().await.expect("session ended early"));
    }
    out
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn broadcast_sessions_observe_identical_trajectory() {
    let cfg = config(CadenceMode::Broadcast);
    let manager = SessionManager::new(authority(&cfg), &cfg);

    let (tx_a, mut rx_a) = mpsc::channel(64);
    let (tx_b, mut rx_b) = mpsc::channel(64);
    let a = manager.spawn(tx_a);
    let b = manager.spawn(tx_b);

    let seen_a = collect(&mut rx_a, 15).await;
    let seen_b = collect(&mut rx_b, 15).await;

    let by_tick_a: BTreeMap<u64, f64> = seen_a.iter().map(|r| (r.tick, r.damage)).collect();
    let by_tick_b: BTreeMap<u64, f64> = seen_b.iter().map(|r| (r.tick, r.damage)).collect();

    // Each session sees consecutive ticks of one timeline.
    for seen in [&seen_a, &seen_b] {
        for pair in seen.windows(2) {
            assert_eq!(pair[1].tick, pair[0].tick + 1);
            assert!(pair[1].damage >= pair[0].damage);
        }
    }

    let common: Vec<u64> = by_tick_a.keys().filter(|t| by_tick_b.contains_key(t)).copied().collect();
    assert!(common.len() >= 10, "sessions barely overlapped: {common:?}");
    for tick in common {
        assert_eq!(by_tick_a[&tick], by_tick_b[&tick], "diverged at tick {tick}");
    }

    let reference = reference_trajectory(&cfg, 40);
    for (tick, damage) in by_tick_a {
        assert!((reference[&tick] - damage).abs() < 1e-12);
    }

    a.abort();
    b.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn per_session_ticks_interleave_on_one_timeline() {
    let cfg = config(CadenceMode::PerSession);
    let manager = SessionManager::new(authority(&cfg), &cfg);

    let (tx_a, mut rx_a) = mpsc::channel(64);
    let (tx_b, mut rx_b) = mpsc::channel(64);
    let a = manager.spawn(tx_a);
    let b = manager.spawn(tx_b);

    let seen_a = collect(&mut rx_a, 10).await;
    let seen_b = collect(&mut rx_b, 10).await;
    a.abort();
    b.abort();

    // No tick is executed twice and both sessions advance the same clock.
    let mut merged: BTreeMap<u64, f64> = BTreeMap::new();
    for r in seen_a.iter().chain(&seen_b) {
        assert!(merged.insert(r.tick, r.damage).is_none(), "tick {} delivered twice", r.tick);
    }
    let last_tick = *merged.keys().last().unwrap();
    assert!(last_tick >= 20);

    let reference = reference_trajectory(&cfg, last_tick);
    for (tick, damage) in merged {
        assert!((reference[&tick] - damage).abs() < 1e-12, "tick {tick} off the shared timeline");
    }
}
