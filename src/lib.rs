//! # beamtwin - Digital Twin Streaming for Beam Damage
//!
//! beamtwin simulates the evolving damage state of a loaded beam and streams
//! the result to visualization clients. Each tick it evaluates a stress field
//! over a fixed mesh with a surrogate model, grows a scalar damage indicator,
//! records stress statistics in a short rolling window, and once that window
//! is full forecasts damage and remaining useful life (RUL).
//!
//! ## Core Concepts
//!
//! - **SimulationAuthority**: the single process-wide owner of clock, damage and history
//! - **Tick**: one grid evaluation, one damage update, one streamed message
//! - **Collaborators**: external surrogate, prognostics and crack-severity models
//! - **Session**: one attached client forwarding the shared timeline
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use beamtwin::{Collaborators, DenseSurrogate, LstmPrognostics, ScalerTable, SimulationAuthority, TwinConfig};
//!
//! let config = TwinConfig::default();
//! let scaler = Arc::new(ScalerTable::from_json_file("scaler_params.json")?);
//! let collaborators = Collaborators::new(
//!     Arc::new(DenseSurrogate::from_json_file("surrogate.json")?),
//!     Arc::new(LstmPrognostics::from_json_file("prognostics.json")?),
//! );
//! let authority = SimulationAuthority::new(&config, scaler, collaborators)?;
//! let tick = authority.execute_tick()?;
//! println!("damage {:.3}, rul {:?}", tick.damage, tick.rul);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Leaf components
pub mod config;
pub mod damage;
pub mod error;
pub mod grid;
pub mod history;
pub mod scaler;

// Collaborators and the per-tick pipeline
pub mod collaborator;
pub mod field;
pub mod models;
pub mod prognostics;

// Shared state and streaming
pub mod authority;
pub mod session;

/// gRPC transport (feature `transport-grpc`).
#[cfg(feature = "transport-grpc")]
pub mod transport;

// Re-export primary types at crate root for convenience
pub use authority::{Collaborators, SessionLease, SimulationAuthority, SimulationClock, TickMessage, TickResult, TwinStatus};
pub use collaborator::{CrackSeverityEstimator, DamageEchoEstimator, PrognosticsModel, SensorFrame, SurrogateModel};
pub use config::{CadenceMode, GrowthConfig, LoadScenario, TwinConfig};
pub use damage::{DamageLaw, DamageState};
pub use error::{CollaboratorError, ConfigurationError, TransportError, TwinError, TwinResult};
pub use field::{StressField, StressFieldEvaluator};
pub use grid::{FeatureBatch, GridPoint, GridSampler, FEATURE_NAMES};
pub use history::{HistoryWindow, StressSample};
pub use models::{DenseSurrogate, LstmPrognostics};
pub use prognostics::{PrognosticsEstimator, PrognosticsResult};
pub use scaler::{ScalerEntry, ScalerTable};
pub use session::{Session, SessionManager, TickScheduler, TickSink};
