//! Vellum workspace server - Entry Point
//!
//! Usage: `vellum-server [config-file]`. Without an argument `config.toml`
//! in the working directory is used if present.

use log::{error, info};
use std::path::Path;
use std::process::ExitCode;

use vellum_server::{Server, ServerConfig};

#[tokio::main]
async fn main() -> ExitCode {
    // RUST_LOG overrides the default level
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => ServerConfig::load_from(Path::new(&path), true),
        None => ServerConfig::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Launching Vellum workspace server...");

    let server = match Server::bind(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("Server startup failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    server
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    info!("Server stopped");
    ExitCode::SUCCESS
}
