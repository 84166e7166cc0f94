//! beamtwin gRPC Server
//!
//! A standalone server binary streaming the beam digital twin over gRPC.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::signal;
use tonic::transport::Server;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use beamtwin::transport::TwinServiceImpl;
use beamtwin::{
    Collaborators, ConfigurationError, DenseSurrogate, LstmPrognostics, ScalerTable, SessionManager,
    SimulationAuthority, TwinConfig,
};

/// Server configuration
struct Config {
    /// Address to bind to
    addr: SocketAddr,
    /// Optional twin configuration file (JSON)
    twin_config: Option<PathBuf>,
    /// Feature normalization table
    scaler: PathBuf,
    /// Surrogate regression weights
    surrogate: PathBuf,
    /// Prognostics sequence model weights
    prognostics: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:50061".parse().unwrap(),
            twin_config: None,
            scaler: PathBuf::from("scaler_params.json"),
            surrogate: PathBuf::from("models/surrogate.json"),
            prognostics: PathBuf::from("models/prognostics.json"),
        }
    }
}

fn parse_args() -> Config {
    let args: Vec<String> = std::env::args().collect();
    let mut config = Config::default();

    let value = |i: usize, flag: &str| -> String {
        if i + 1 < args.len() {
            args[i + 1].clone()
        } else {
            eprintln!("error: {flag} requires a value");
            std::process::exit(1);
        }
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" | "-p" => {
                let raw = value(i, "--port");
                let port: u16 = raw.parse().unwrap_or_else(|_| {
                    eprintln!("error: invalid port number: {raw}");
                    std::process::exit(1);
                });
                config.addr.set_port(port);
                i += 2;
            }
            "--config" | "-c" => {
                config.twin_config = Some(PathBuf::from(value(i, "--config")));
                i += 2;
            }
            "--scaler" | "-s" => {
                config.scaler = PathBuf::from(value(i, "--scaler"));
                i += 2;
            }
            "--surrogate" => {
                config.surrogate = PathBuf::from(value(i, "--surrogate"));
                i += 2;
            }
            "--prognostics" => {
                config.prognostics = PathBuf::from(value(i, "--prognostics"));
                i += 2;
            }
            "--help" | "-h" => {
                println!("beamtwin-server - beam digital twin gRPC server");
                println!();
                println!("USAGE:");
                println!("    beamtwin-server [OPTIONS]");
                println!();
                println!("OPTIONS:");
                println!("    -p, --port <PORT>            Port to listen on [default: 50061]");
                println!("    -c, --config <FILE>          Twin configuration JSON [default: built-in scenario]");
                println!("    -s, --scaler <FILE>          Scaler table JSON [default: scaler_params.json]");
                println!("        --surrogate <FILE>       Surrogate weights JSON [default: models/surrogate.json]");
                println!("        --prognostics <FILE>     Prognostics weights JSON [default: models/prognostics.json]");
                println!("    -h, --help                   Print help information");
                println!();
                println!("Log verbosity is controlled by RUST_LOG (default: info).");
                std::process::exit(0);
            }
            arg => {
                eprintln!("error: unknown argument: {arg}");
                std::process::exit(1);
            }
        }
    }

    config
}

fn load_authority(config: &Config) -> Result<(TwinConfig, SimulationAuthority), ConfigurationError> {
    let twin = match &config.twin_config {
        Some(path) => TwinConfig::from_json_file(path)?,
        None => TwinConfig::default(),
    };
    let scaler = Arc::new(ScalerTable::from_json_file(&config.scaler)?);
    let collaborators = Collaborators::new(
        Arc::new(DenseSurrogate::from_json_file(&config.surrogate)?),
        Arc::new(LstmPrognostics::from_json_file(&config.prognostics)?),
    );
    let authority = SimulationAuthority::new(&twin, scaler, collaborators)?;
    Ok((twin, authority))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = parse_args();
    info!(version = env!("CARGO_PKG_VERSION"), "beamtwin server starting");

    let (twin, authority) = match load_authority(&config) {
        Ok(loaded) => loaded,
        Err(err) => {
            error!(error = %err, "refusing to start");
            return Err(err.into());
        }
    };

    let sessions = Arc::new(SessionManager::new(Arc::new(authority), &twin));
    let svc = TwinServiceImpl::new(sessions).into_server();

    info!(addr = %config.addr, points = twin.point_count(), "serving twin stream; press Ctrl+C to stop");

    Server::builder()
        .add_service(svc)
        .serve_with_shutdown(config.addr, async {
            let _ = signal::ctrl_c().await;
        })
        .await?;

    info!("shut down");
    Ok(())
}
