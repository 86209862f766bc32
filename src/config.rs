//! # Configuración del Servidor
//! src/config.rs
//!
//! Configuración del servidor con soporte para argumentos CLI y
//! variables de entorno.
//!
//! ## Ejemplos de uso
//!
//! ### CLI
//! ```bash
//! ./servlet_server --port 8080 --max-threads 8 --shutdown-grace-ms 2000
//! ```
//!
//! ### Variables de entorno
//! ```bash
//! HTTP_PORT=8080 MAX_THREADS=8 LOG_LEVEL=debug ./servlet_server
//! ```

use crate::error::ConfigError;
use clap::Parser;
use std::time::Duration;

/// Configuración del servidor
#[derive(Debug, Clone, Parser)]
#[command(name = "servlet_server")]
#[command(about = "Servidor HTTP mínimo que despacha requests a servlets")]
#[command(version = "0.1.0")]
pub struct Config {
    /// Puerto en el que escucha el servidor (0 = puerto efímero)
    #[arg(short, long, default_value = "8080", env = "HTTP_PORT")]
    pub port: u16,

    /// Host/IP en el que escucha
    #[arg(long, default_value = "127.0.0.1", env = "HTTP_HOST")]
    pub host: String,

    /// Máximo de conexiones atendidas en paralelo (tamaño del pool)
    #[arg(long = "max-threads", default_value = "4", env = "MAX_THREADS")]
    pub max_threads: usize,

    /// Espera máxima de cada iteración del accept loop, en milisegundos
    #[arg(long = "accept-poll-ms", default_value = "25", env = "ACCEPT_POLL_MS")]
    pub accept_poll_ms: u64,

    /// Tiempo de gracia para el trabajo en curso al cerrar, en milisegundos
    #[arg(long = "shutdown-grace-ms", default_value = "2000", env = "SHUTDOWN_GRACE_MS")]
    pub shutdown_grace_ms: u64,

    /// Nivel de log por defecto (RUST_LOG tiene prioridad)
    #[arg(long = "log-level", default_value = "info", env = "LOG_LEVEL")]
    pub log_level: String,

    /// Emitir logs en formato JSON
    #[arg(long = "log-json", env = "LOG_JSON")]
    pub log_json: bool,
}

impl Config {
    /// Crea una nueva configuración parseando argumentos CLI
    pub fn new() -> Self {
        Config::parse()
    }

    /// Obtiene la dirección completa para bind (host:port)
    ///
    /// # Ejemplo
    /// ```rust
    /// use servlet_server::config::Config;
    ///
    /// let config = Config::default();
    /// assert_eq!(config.address(), "127.0.0.1:8080");
    /// ```
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn accept_poll(&self) -> Duration {
        Duration::from_millis(self.accept_poll_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Valida la configuración
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_threads == 0 {
            return Err(ConfigError::NoWorkers);
        }

        // La espera del accept debe ser acotada para poder revisar el flag de cierre
        if self.accept_poll_ms == 0 || self.accept_poll_ms > 1000 {
            return Err(ConfigError::InvalidAcceptPoll(self.accept_poll_ms));
        }

        Ok(())
    }

    /// Registra un resumen de la configuración efectiva
    pub fn print_summary(&self) {
        tracing::info!(
            address = %self.address(),
            max_threads = self.max_threads,
            accept_poll_ms = self.accept_poll_ms,
            shutdown_grace_ms = self.shutdown_grace_ms,
            "server configuration"
        );
    }
}

impl Default for Config {
    /// Configuración por defecto
    fn default() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            max_threads: 4,
            accept_poll_ms: 25,
            shutdown_grace_ms: 2_000,
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}
