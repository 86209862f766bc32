//! # Comandos del Servidor
//!
//! Servlets incluidos con el binario. Sirven de ejemplo de cómo escribir un
//! servlet y de blanco para los tests de integración.
//!
//! Cada comando tiene un handler `fn(&Request) -> Response` y un tipo que
//! implementa `Servlet` escribiendo esa respuesta.

pub mod basic;

// Re-exportar funciones útiles
pub use basic::*;

use crate::server::Server;
use std::sync::Arc;

/// Registra los servlets incluidos: GET /add, POST /echo y GET /stats
pub fn register_defaults(server: &Server) {
    server.add_servlet("GET", "/add", Arc::new(AddServlet));
    server.add_servlet("POST", "/echo", Arc::new(EchoServlet));
    server.add_servlet("GET", "/stats", Arc::new(StatsServlet::new(server.stats())));
}
