//! # Módulo del Servidor
//! src/server/mod.rs
//!
//! - `tcp`: ciclo de vida del servidor y accept loop
//! - `dispatcher`: atención de cada conexión (parse → routing → servlet → cierre)

pub mod dispatcher;
pub mod tcp;

// Re-exportar para facilitar el uso
pub use dispatcher::Dispatcher;
pub use tcp::{Server, ServerState};
