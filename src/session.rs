//! Streaming sessions and the shared tick scheduler.
//!
//! A session forwards tick results of the shared timeline to one client
//! through a [`TickSink`]. Ticks are produced in one of two ways:
//!
//! - `CadenceMode::Broadcast`: a single [`TickScheduler`] ticks the authority
//!   at the configured cadence and fans results out to every session. The
//!   scheduler pauses while no session is subscribed.
//! - `CadenceMode::PerSession`: every session calls `execute_tick` itself and
//!   then sleeps for the cadence. Ticks are linearized by the authority lock,
//!   so attaching more sessions speeds up the shared timeline.
//!
//! Collaborator failures skip a tick and keep the loop alive. A sink failure
//! ends only its own session.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::authority::{SessionLease, SimulationAuthority, TickResult};
use crate::config::{CadenceMode, TwinConfig};
use crate::error::{TransportError, TwinResult};

/// Maximum size of one encoded tick message.
pub const MAX_TICK_JSON_BYTES: usize = 4 * 1024 * 1024; // 4 MiB

/// Encodes the client-facing message of `tick` as JSON.
pub fn encode_tick(tick: &TickResult, max: usize) -> Result<Vec<u8>, TransportError> {
    let bytes = serde_json::to_vec(&tick.to_message()).map_err(|e| TransportError::SerializationFailed {
        message: e.to_string(),
    })?;
    if bytes.len() > max {
        return Err(TransportError::PayloadTooLarge {
            size: bytes.len(),
            max,
        });
    }
    Ok(bytes)
}

/// Destination of one session's tick results.
pub trait TickSink: Send {
    /// Delivers one result. An error ends the session.
    fn deliver(&mut self, tick: Arc<TickResult>) -> impl Future<Output = Result<(), TransportError>> + Send;
}

impl TickSink for mpsc::Sender<Arc<TickResult>> {
    async fn deliver(&mut self, tick: Arc<TickResult>) -> Result<(), TransportError> {
        self.send(tick).await.map_err(|_| TransportError::SendFailed {
            message: "session receiver dropped".to_string(),
        })
    }
}

async fn tick_off_reactor(authority: &Arc<SimulationAuthority>) -> TwinResult<TickResult> {
    let authority = Arc::clone(authority);
    tokio::task::spawn_blocking(move || authority.execute_tick())
        .await
        .map_err(|e| crate::error::TwinError::internal(format!("tick task failed: {e}")))?
}

// ----------------------------------------------------------------------------
// Scheduler
// ----------------------------------------------------------------------------

/// Drives the shared timeline at a fixed cadence and fans results out.
///
/// Dropping the scheduler stops it.
#[derive(Debug)]
pub struct TickScheduler {
    tx: broadcast::Sender<Arc<TickResult>>,
    wake: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl TickScheduler {
    /// Spawns the scheduler task on the current tokio runtime.
    #[must_use]
    pub fn spawn(authority: Arc<SimulationAuthority>, cadence: Duration, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        let wake = Arc::new(Notify::new());
        let handle = tokio::spawn(scheduler_loop(authority, tx.clone(), Arc::clone(&wake), cadence));
        Self { tx, wake, handle }
    }

    /// Subscribes to future tick results and wakes a paused scheduler.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<TickResult>> {
        let rx = self.tx.subscribe();
        self.wake.notify_one();
        rx
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Drop for TickScheduler {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn scheduler_loop(
    authority: Arc<SimulationAuthority>,
    tx: broadcast::Sender<Arc<TickResult>>,
    wake: Arc<Notify>,
    cadence: Duration,
) {
    let mut interval = tokio::time::interval(cadence);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if tx.receiver_count() == 0 {
            debug!("no sessions attached; tick scheduler paused");
            while tx.receiver_count() == 0 {
                wake.notified().await;
            }
            interval.reset_immediately();
            debug!("tick scheduler resumed");
        }

        interval.tick().await;

        match tick_off_reactor(&authority).await {
            Ok(result) => {
                // No receivers left just means the last session detached mid-tick.
                let _ = tx.send(Arc::new(result));
            }
            Err(err) if err.is_recoverable() => {
                warn!(error = %err, "scheduled tick skipped");
            }
            Err(err) => {
                error!(error = %err, "scheduled tick failed");
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Sessions
// ----------------------------------------------------------------------------

enum Feed {
    Broadcast(broadcast::Receiver<Arc<TickResult>>),
    Driven {
        authority: Arc<SimulationAuthority>,
        cadence: Duration,
    },
}

/// One attached client. Holds only its feed and its attachment lease.
pub struct Session {
    id: Uuid,
    lease: SessionLease,
    feed: Feed,
}

impl Session {
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Streams tick results into `sink` until the sink fails or the feed closes.
    ///
    /// Returns `Ok(())` when the feed closed (scheduler shut down) and the
    /// sink's error when the transport failed.
    pub async fn run<S: TickSink>(self, mut sink: S) -> Result<(), TransportError> {
        let Self { id, lease, feed } = self;
        let _lease = lease;
        info!(session = %id, "session started");

        let outcome = match feed {
            Feed::Broadcast(rx) => forward_broadcast(id, rx, &mut sink).await,
            Feed::Driven { authority, cadence } => drive_ticks(id, &authority, cadence, &mut sink).await,
        };

        match &outcome {
            Ok(()) => info!(session = %id, "session feed closed"),
            Err(err) => info!(session = %id, error = %err, "session ended"),
        }
        outcome
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match self.feed {
            Feed::Broadcast(_) => "broadcast",
            Feed::Driven { .. } => "per_session",
        };
        f.debug_struct("Session").field("id", &self.id).field("mode", &mode).finish()
    }
}

async fn forward_broadcast<S: TickSink>(
    id: Uuid,
    mut rx: broadcast::Receiver<Arc<TickResult>>,
    sink: &mut S,
) -> Result<(), TransportError> {
    loop {
        match rx.recv().await {
            Ok(tick) => sink.deliver(tick).await?,
            Err(RecvError::Lagged(skipped)) => {
                warn!(session = %id, skipped, "session lagging behind the timeline");
            }
            Err(RecvError::Closed) => return Ok(()),
        }
    }
}

async fn drive_ticks<S: TickSink>(
    id: Uuid,
    authority: &Arc<SimulationAuthority>,
    cadence: Duration,
    sink: &mut S,
) -> Result<(), TransportError> {
    loop {
        match tick_off_reactor(authority).await {
            Ok(result) => sink.deliver(Arc::new(result)).await?,
            Err(err) => warn!(session = %id, error = %err, "tick skipped"),
        }
        tokio::time::sleep(cadence).await;
    }
}

/// Opens sessions against the shared authority.
#[derive(Debug)]
pub struct SessionManager {
    authority: Arc<SimulationAuthority>,
    mode: CadenceMode,
    cadence: Duration,
    scheduler: Option<TickScheduler>,
}

impl SessionManager {
    /// Creates a manager. In broadcast mode this spawns the scheduler, so it
    /// must be called from within a tokio runtime.
    #[must_use]
    pub fn new(authority: Arc<SimulationAuthority>, config: &TwinConfig) -> Self {
        let cadence = config.cadence();
        let scheduler = match config.cadence_mode {
            CadenceMode::Broadcast => Some(TickScheduler::spawn(
                Arc::clone(&authority),
                cadence,
                config.broadcast_capacity,
            )),
            CadenceMode::PerSession => None,
        };
        info!(mode = ?config.cadence_mode, cadence_ms = config.cadence_ms, "session manager ready");
        Self {
            authority,
            mode: config.cadence_mode,
            cadence,
            scheduler,
        }
    }

    /// Attaches a new session to the shared timeline.
    #[must_use]
    pub fn open(&self) -> Session {
        let lease = self.authority.attach();
        let feed = match &self.scheduler {
            Some(scheduler) => Feed::Broadcast(scheduler.subscribe()),
            None => Feed::Driven {
                authority: Arc::clone(&self.authority),
                cadence: self.cadence,
            },
        };
        Session {
            id: Uuid::new_v4(),
            lease,
            feed,
        }
    }

    /// Opens a session and runs it on its own task.
    pub fn spawn<S: TickSink + 'static>(&self, sink: S) -> JoinHandle<Result<(), TransportError>> {
        let session = self.open();
        tokio::spawn(session.run(sink))
    }

    #[must_use]
    pub const fn authority(&self) -> &Arc<SimulationAuthority> {
        &self.authority
    }

    #[must_use]
    pub const fn mode(&self) -> CadenceMode {
        self.mode
    }
}
