//! The simulation authority.
//!
//! One `SimulationAuthority` exists per process and owns the only clock,
//! damage state and history window. Every session shares it through an
//! `Arc`, and `execute_tick` is the sole mutation path. A tick either
//! commits all of its effects or none of them.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::collaborator::{
    CrackSeverityEstimator, DamageEchoEstimator, PrognosticsModel, SensorFrame, SurrogateModel,
};
use crate::config::{LoadScenario, TwinConfig};
use crate::damage::{DamageLaw, DamageState};
use crate::error::{CollaboratorError, ConfigurationError, TwinResult};
use crate::field::StressFieldEvaluator;
use crate::grid::GridSampler;
use crate::history::{HistoryWindow, StressSample};
use crate::prognostics::{PrognosticsEstimator, PrognosticsResult};
use crate::scaler::ScalerTable;

/// Tick counter plus simulated time.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SimulationClock {
    tick: u64,
    time: f64,
}

impl SimulationClock {
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    #[must_use]
    pub const fn time(&self) -> f64 {
        self.time
    }

    fn advance(&mut self, time_step: f64) {
        self.tick += 1;
        self.time += time_step;
    }
}

/// Everything a tick produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickResult {
    /// 1-based index of this tick.
    pub tick: u64,
    /// Simulated time at the start of the tick.
    pub time: f64,
    pub stress_field: Vec<f64>,
    pub max_stress: f64,
    pub avg_stress: f64,
    /// Damage state after this tick's growth.
    pub damage: f64,
    pub damage_prediction: f64,
    pub rul: Option<f64>,
}

impl TickResult {
    /// The client-facing projection of this result.
    #[must_use]
    pub fn to_message(&self) -> TickMessage<'_> {
        TickMessage {
            time: self.time,
            stress_field: &self.stress_field,
            damage_prediction: self.damage_prediction,
            rul: self.rul,
        }
    }
}

/// Wire message pushed to visualization clients. `rul` serializes as `null`
/// while unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TickMessage<'a> {
    pub time: f64,
    pub stress_field: &'a [f64],
    pub damage_prediction: f64,
    pub rul: Option<f64>,
}

/// Read-only snapshot of the shared simulation.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TwinStatus {
    pub tick: u64,
    pub time: f64,
    pub damage: f64,
    pub history_len: usize,
    pub attached_sessions: usize,
    pub ticks_executed: u64,
    pub ticks_failed: u64,
    pub started_at: DateTime<Utc>,
}

/// The external models an authority is wired with.
pub struct Collaborators {
    pub surrogate: Arc<dyn SurrogateModel>,
    pub prognostics: Arc<dyn PrognosticsModel>,
    pub severity: Arc<dyn CrackSeverityEstimator>,
}

impl Collaborators {
    /// Wires the two required models with the damage-echo severity stub.
    #[must_use]
    pub fn new(surrogate: Arc<dyn SurrogateModel>, prognostics: Arc<dyn PrognosticsModel>) -> Self {
        Self {
            surrogate,
            prognostics,
            severity: Arc::new(DamageEchoEstimator),
        }
    }

    /// Replaces the crack-severity estimator.
    #[must_use]
    pub fn with_severity(mut self, severity: Arc<dyn CrackSeverityEstimator>) -> Self {
        self.severity = severity;
        self
    }
}

#[derive(Debug, Clone)]
struct SimulationState {
    clock: SimulationClock,
    damage: DamageState,
    history: HistoryWindow,
}

impl SimulationState {
    fn committed(&self) -> CommittedView {
        CommittedView {
            clock: self.clock,
            damage: self.damage,
            history_len: self.history.len(),
        }
    }
}

/// Copy of the last committed state. Its lock is never held across a tick,
/// so readers do not wait on inference.
#[derive(Debug, Clone, Copy)]
struct CommittedView {
    clock: SimulationClock,
    damage: DamageState,
    history_len: usize,
}

/// Decrements the attached-session count when dropped.
#[derive(Debug)]
pub struct SessionLease {
    attached: Arc<AtomicUsize>,
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        self.attached.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Single source of truth for the simulated beam.
pub struct SimulationAuthority {
    state: Mutex<SimulationState>,
    view: Mutex<CommittedView>,
    sampler: GridSampler,
    scenario: LoadScenario,
    evaluator: StressFieldEvaluator,
    law: DamageLaw,
    prognostics: PrognosticsEstimator,
    severity: Arc<dyn CrackSeverityEstimator>,
    time_step: f64,
    attached: Arc<AtomicUsize>,
    ticks_executed: AtomicU64,
    ticks_failed: AtomicU64,
    started_at: DateTime<Utc>,
}

impl SimulationAuthority {
    /// Builds the authority. Fails if the config is invalid or the scaler
    /// table lacks a required feature.
    pub fn new(
        config: &TwinConfig,
        scaler: Arc<ScalerTable>,
        collaborators: Collaborators,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let sampler = GridSampler::from_config(config, scaler)?;
        let state = SimulationState {
            clock: SimulationClock::default(),
            damage: DamageState::new(config.initial_damage)?,
            history: HistoryWindow::new(config.history_capacity)?,
        };

        info!(
            resolution = config.resolution,
            points = sampler.point_count(),
            initial_damage = config.initial_damage,
            "simulation authority ready"
        );

        Ok(Self {
            view: Mutex::new(state.committed()),
            state: Mutex::new(state),
            sampler,
            scenario: config.scenario,
            evaluator: StressFieldEvaluator::new(collaborators.surrogate, config.amplification),
            law: config.growth.into(),
            prognostics: PrognosticsEstimator::new(
                collaborators.prognostics,
                config.failure_threshold,
                config.time_step,
            ),
            severity: collaborators.severity,
            time_step: config.time_step,
            attached: Arc::new(AtomicUsize::new(0)),
            ticks_executed: AtomicU64::new(0),
            ticks_failed: AtomicU64::new(0),
            started_at: Utc::now(),
        })
    }

    /// Executes one tick with no sensor frame.
    pub fn execute_tick(&self) -> TwinResult<TickResult> {
        self.execute_tick_with_frame(None)
    }

    /// Executes one tick under exclusive access to the shared state.
    ///
    /// On a collaborator error nothing is committed: clock, damage and history
    /// keep their previous values.
    pub fn execute_tick_with_frame(&self, frame: Option<&SensorFrame>) -> TwinResult<TickResult> {
        // State is only written after every fallible step, so a poisoned lock
        // still guards a consistent value.
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        match self.run_tick(&state, frame) {
            Ok((next, result)) => {
                let saturated = !state.damage.is_failed() && next.damage.is_failed();
                *self.view.lock().unwrap_or_else(PoisonError::into_inner) = next.committed();
                *state = next;
                drop(state);
                self.ticks_executed.fetch_add(1, Ordering::Relaxed);
                if saturated {
                    info!(tick = result.tick, "damage saturated; beam state is terminal");
                }
                debug!(
                    tick = result.tick,
                    "t={:.1} damage={:.3} max_stress={:.1}",
                    result.time,
                    result.damage,
                    result.max_stress
                );
                Ok(result)
            }
            Err(err) => {
                drop(state);
                self.ticks_failed.fetch_add(1, Ordering::Relaxed);
                warn!(error = %err, "tick discarded");
                Err(err.into())
            }
        }
    }

    fn run_tick(
        &self,
        state: &SimulationState,
        frame: Option<&SensorFrame>,
    ) -> Result<(SimulationState, TickResult), CollaboratorError> {
        let severity = self.severity.estimate(frame, state.damage.value())?;
        if !severity.is_finite() {
            return Err(CollaboratorError::NonFinite {
                collaborator: "crack severity",
                index: 0,
            });
        }
        let severity = severity.clamp(0.0, 1.0);

        let batch = self.sampler.sample(&self.scenario).map_err(|e| CollaboratorError::Failed {
            collaborator: "grid sampler",
            message: e.to_string(),
        })?;
        let field = self.evaluator.evaluate(&batch, severity)?;

        let damage = state.damage.advance(field.max_stress, &self.law);
        let mut history = state.history.clone();
        history.push(StressSample::new(field.max_stress, field.avg_stress));

        let PrognosticsResult {
            predicted_damage,
            rul,
        } = self.prognostics.estimate(&history, damage.value())?;

        let mut clock = state.clock;
        let time = clock.time();
        clock.advance(self.time_step);

        let result = TickResult {
            tick: clock.tick(),
            time,
            max_stress: field.max_stress,
            avg_stress: field.avg_stress,
            stress_field: field.values,
            damage: damage.value(),
            damage_prediction: predicted_damage,
            rul,
        };
        let next = SimulationState {
            clock,
            damage,
            history,
        };
        Ok((next, result))
    }

    /// Registers an attached session for the lifetime of the returned lease.
    #[must_use]
    pub fn attach(&self) -> SessionLease {
        self.attached.fetch_add(1, Ordering::AcqRel);
        SessionLease {
            attached: Arc::clone(&self.attached),
        }
    }

    #[must_use]
    pub fn attached_sessions(&self) -> usize {
        self.attached.load(Ordering::Acquire)
    }

    /// Damage after the last committed tick.
    #[must_use]
    pub fn damage(&self) -> f64 {
        self.committed().damage.value()
    }

    #[must_use]
    pub fn clock(&self) -> SimulationClock {
        self.committed().clock
    }

    /// History samples, oldest first. Waits for an in-flight tick.
    #[must_use]
    pub fn history(&self) -> Vec<StressSample> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).history.snapshot()
    }

    /// Snapshot of the last committed tick. Does not wait for an in-flight
    /// tick, so it is safe to call from async handlers.
    #[must_use]
    pub fn status(&self) -> TwinStatus {
        let view = self.committed();
        TwinStatus {
            tick: view.clock.tick(),
            time: view.clock.time(),
            damage: view.damage.value(),
            history_len: view.history_len,
            attached_sessions: self.attached_sessions(),
            ticks_executed: self.ticks_executed.load(Ordering::Relaxed),
            ticks_failed: self.ticks_failed.load(Ordering::Relaxed),
            started_at: self.started_at,
        }
    }

    #[must_use]
    pub const fn point_count(&self) -> usize {
        self.sampler.point_count()
    }

    fn committed(&self) -> CommittedView {
        *self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SimulationAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationAuthority")
            .field("sampler", &self.sampler)
            .field("law", &self.law)
            .field("attached", &self.attached_sessions())
            .finish_non_exhaustive()
    }
}
