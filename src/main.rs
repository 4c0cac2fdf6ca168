//! Chameleon - game server for The Chameleon party game
//!
//! Hosts any number of rooms. Players join by room code, pool words, and
//! try to unmask the one player who doesn't know the secret word.

mod config;
mod game;
mod network;
mod registry;

use clap::Parser;
use config::{Cli, Config};
use network::{Server, ServiceDiscovery};
use registry::Registry;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match Config::load(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("chameleon: {e}");
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .init();

    let registry = Arc::new(Registry::new());
    let server = match Server::bind(&config, registry) {
        Ok(server) => server,
        Err(e) => {
            error!(bind = %config.bind, port = config.port, error = %e, "failed to start server");
            return ExitCode::FAILURE;
        }
    };
    info!(addr = %server.addr(), "chameleon server started");

    let discovery = config.advertise.then(|| advertise(server.port())).flatten();

    let result = server.run();
    if let Some(discovery) = discovery {
        if let Err(e) = discovery.shutdown() {
            warn!(error = %e, "failed to stop mDNS advertisement");
        }
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "server stopped");
            ExitCode::FAILURE
        }
    }
}

fn advertise(port: u16) -> Option<ServiceDiscovery> {
    let instance = format!("chameleon-{:08x}", rand::random::<u32>());
    let mut discovery = match ServiceDiscovery::new(instance) {
        Ok(discovery) => discovery,
        Err(e) => {
            warn!(error = %e, "mDNS unavailable, not advertising");
            return None;
        }
    };
    match discovery.advertise(port) {
        Ok(()) => {
            info!(name = %discovery.fullname(), port, "advertising on the local network");
            Some(discovery)
        }
        Err(e) => {
            warn!(error = %e, "failed to advertise over mDNS");
            None
        }
    }
}
