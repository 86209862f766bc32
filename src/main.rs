//! # Servlet Server - Entry Point
//! src/main.rs
//!
//! Punto de entrada del servidor.
//!
//! Lee la configuración (CLI + variables de entorno), registra los servlets
//! de ejemplo y atiende requests hasta recibir SIGINT o SIGTERM.

use anyhow::Context;
use servlet_server::commands;
use servlet_server::config::Config;
use servlet_server::logging;
use servlet_server::server::Server;

fn main() -> anyhow::Result<()> {
    let config = Config::new();

    logging::init(&config.log_level, config.log_json);
    config.print_summary();

    let server = Server::new(config);
    commands::register_defaults(&server);

    let addr = server.start().context("failed to start server")?;
    tracing::info!(%addr, "ready; press Ctrl+C to stop");

    wait_for_shutdown_signal()?;

    server.close();
    Ok(())
}

/// Bloquea hasta recibir SIGINT o SIGTERM
#[cfg(unix)]
fn wait_for_shutdown_signal() -> anyhow::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("failed to install signal handlers")?;
    if let Some(signal) = signals.forever().next() {
        tracing::info!(signal, "shutdown signal received");
    }
    Ok(())
}

/// Sin señales POSIX: se cierra al recibir una línea (o EOF) por stdin
#[cfg(not(unix))]
fn wait_for_shutdown_signal() -> anyhow::Result<()> {
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .context("failed to read stdin")?;
    tracing::info!("shutdown requested");
    Ok(())
}
