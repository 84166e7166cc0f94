//! gRPC transport layer for beamtwin.
//!
//! `Stream` attaches a session to the shared timeline and pushes one
//! `TickEvent` per tick. Each event carries the client message as JSON bytes:
//! `{"time", "stress_field", "damage_prediction", "rul"}`.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};
use tracing::{debug, info};

use crate::authority::TickResult;
use crate::error::TransportError;
use crate::session::{encode_tick, SessionManager, TickSink, MAX_TICK_JSON_BYTES};

pub mod proto {
    tonic::include_proto!("beamtwin");
}

use proto::twin_service_server::{TwinService, TwinServiceServer};

/// Per-session outbound buffer. A client this far behind is backpressured.
const SESSION_BUFFER: usize = 8;

/// gRPC service implementation.
#[derive(Debug)]
pub struct TwinServiceImpl {
    sessions: Arc<SessionManager>,
}

impl TwinServiceImpl {
    #[must_use]
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }

    #[must_use]
    pub fn into_server(self) -> TwinServiceServer<Self> {
        TwinServiceServer::new(self)
    }
}

/// Session sink writing JSON-encoded tick events into a gRPC response stream.
struct GrpcSink {
    tx: mpsc::Sender<Result<proto::TickEvent, Status>>,
}

impl TickSink for GrpcSink {
    async fn deliver(&mut self, tick: Arc<TickResult>) -> Result<(), TransportError> {
        let tick_json = match encode_tick(&tick, MAX_TICK_JSON_BYTES) {
            Ok(bytes) => bytes,
            Err(err) => {
                let _ = self.tx.send(Err(Status::resource_exhausted(err.to_string()))).await;
                return Err(err);
            }
        };
        self.tx
            .send(Ok(proto::TickEvent { tick_json }))
            .await
            .map_err(|_| TransportError::SendFailed {
                message: "client disconnected".to_string(),
            })
    }
}

#[tonic::async_trait]
impl TwinService for TwinServiceImpl {
    type StreamStream = ReceiverStream<Result<proto::TickEvent, Status>>;

    async fn stream(
        &self,
        request: Request<proto::StreamRequest>,
    ) -> Result<Response<Self::StreamStream>, Status> {
        let client = request.into_inner().client;
        if client.len() > 256 {
            return Err(Status::invalid_argument("client label too long"));
        }

        let (tx, rx) = mpsc::channel(SESSION_BUFFER);
        let session = self.sessions.open();
        info!(session = %session.id(), client = %client, "client connected");

        tokio::spawn(async move {
            let id = session.id();
            if let Err(err) = session.run(GrpcSink { tx }).await {
                debug!(session = %id, error = %err, "stream closed");
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }

    async fn status(
        &self,
        _request: Request<proto::StatusRequest>,
    ) -> Result<Response<proto::StatusResponse>, Status> {
        let status = self.sessions.authority().status();
        let status_json = serde_json::to_vec(&status)
            .map_err(|e| Status::internal(format!("failed to serialize status: {e}")))?;
        Ok(Response::new(proto::StatusResponse { status_json }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio_stream::StreamExt;

    use crate::authority::{Collaborators, SimulationAuthority};
    use crate::collaborator::{PrognosticsModel, SurrogateModel, SurrogateOutput};
    use crate::config::{CadenceMode, TwinConfig};
    use crate::error::CollaboratorError;
    use crate::grid::{FeatureBatch, FEATURE_NAMES};
    use crate::history::StressSample;
    use crate::scaler::{ScalerEntry, ScalerTable};

    struct Flat;

    impl SurrogateModel for Flat {
        fn predict(&self, batch: &FeatureBatch) -> Result<Vec<SurrogateOutput>, CollaboratorError> {
            Ok(vec![[0.0, 250.0, 0.0]; batch.len()])
        }
    }

    impl PrognosticsModel for Flat {
        fn predict(&self, _window: &[StressSample]) -> Result<f64, CollaboratorError> {
            Ok(0.4)
        }
    }

    fn make_service(mode: CadenceMode) -> TwinServiceImpl {
        let config = TwinConfig {
            resolution: 3,
            cadence_ms: 5,
            cadence_mode: mode,
            ..TwinConfig::default()
        };
        let scaler = ScalerTable::from_entries(FEATURE_NAMES.map(|n| (n, ScalerEntry::Standard { mean: 0.0, scale: 1.0 })))
            .unwrap();
        let authority = Arc::new(
            SimulationAuthority::new(&config, Arc::new(scaler), Collaborators::new(Arc::new(Flat), Arc::new(Flat)))
                .unwrap(),
        );
        TwinServiceImpl::new(Arc::new(SessionManager::new(authority, &config)))
    }

    #[tokio::test]
    async fn stream_pushes_json_tick_events() {
        let svc = make_service(CadenceMode::PerSession);
        let mut stream = svc
            .stream(Request::new(proto::StreamRequest {
                client: "viewer".to_string(),
            }))
            .await
            .unwrap()
            .into_inner();

        let mut last_time = -1.0;
        for i in 0..11 {
            let event = stream.next().await.unwrap().unwrap();
            let v: serde_json::Value = serde_json::from_slice(&event.tick_json).unwrap();
            assert_eq!(v["stress_field"].as_array().unwrap().len(), 16);
            let time = v["time"].as_f64().unwrap();
            assert!(time > last_time);
            last_time = time;
            if i < 9 {
                assert!(v["rul"].is_null());
            } else {
                assert!((v["damage_prediction"].as_f64().unwrap() - 0.4).abs() < 1e-12);
                assert!((v["rul"].as_f64().unwrap() - 0.5).abs() < 1e-12);
            }
        }
    }

    #[tokio::test]
    async fn status_reports_attached_sessions() {
        let svc = make_service(CadenceMode::Broadcast);
        let mut stream = svc
            .stream(Request::new(proto::StreamRequest::default()))
            .await
            .unwrap()
            .into_inner();
        let _ = stream.next().await.unwrap().unwrap();

        let resp = svc
            .status(Request::new(proto::StatusRequest {}))
            .await
            .unwrap()
            .into_inner();
        let v: serde_json::Value = serde_json::from_slice(&resp.status_json).unwrap();
        assert_eq!(v["attached_sessions"], 1);
        assert!(v["ticks_executed"].as_u64().unwrap() >= 1);
    }

    #[tokio::test]
    async fn oversized_client_label_is_rejected() {
        let svc = make_service(CadenceMode::PerSession);
        let err = svc
            .stream(Request::new(proto::StreamRequest {
                client: "x".repeat(300),
            }))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);
    }
}

pub use proto::twin_service_client::TwinServiceClient;
