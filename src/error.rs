//! # Errores del Servidor
//! src/error.rs
//!
//! Tipos de error de la librería. Los servlets no usan estos tipos:
//! retornan `anyhow::Result` y el dispatcher se encarga de suprimir sus fallas.

use std::io;
use thiserror::Error;

/// Errores que pueden ocurrir durante el parsing de un request
#[derive(Debug, Error)]
pub enum ParseError {
    /// El cliente cerró la conexión sin enviar nada
    #[error("Empty request")]
    EmptyRequest,

    /// La request line no tiene al menos METHOD y TARGET
    #[error("Malformed request line: {0}")]
    MalformedRequestLine(String),

    /// Error de lectura del socket
    #[error("I/O error while reading request: {0}")]
    Io(#[from] io::Error),
}

/// Errores del ciclo de vida del servidor
#[derive(Debug, Error)]
pub enum ServerError {
    /// No se pudo hacer bind del socket de escucha
    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    /// `start()` se llamó sobre un servidor que ya arrancó
    #[error("Server already started")]
    AlreadyStarted,

    /// El servidor ya fue cerrado y no se puede reutilizar
    #[error("Server already closed")]
    AlreadyClosed,

    /// No se pudo crear un thread (accept loop o worker)
    #[error("Failed to spawn thread: {0}")]
    Spawn(#[source] io::Error),

    /// Configuración inválida
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errores del pool de workers
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    /// El pool ya no acepta trabajo nuevo
    #[error("Worker pool is shut down")]
    ShutDown,
}

/// Errores de validación de la configuración
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max threads must be >= 1")]
    NoWorkers,

    #[error("accept poll interval must be between 1 and 1000 ms (got {0})")]
    InvalidAcceptPoll(u64),
}
