//! # Servlet Server
//! src/lib.rs
//!
//! Servidor HTTP mínimo implementado desde cero sobre `std::net`: acepta
//! conexiones TCP, parsea un request simplificado y lo despacha al servlet
//! registrado para su método y prefijo de URI.
//!
//! ## Arquitectura
//!
//! El servidor está dividido en módulos especializados:
//! - `http`: Parser de requests y builder de respuestas
//! - `servlet`: Trait que implementan los handlers
//! - `router`: Tabla de rutas con búsqueda por prefijo más largo
//! - `workers`: Pool de threads de tamaño fijo
//! - `server`: Ciclo de vida, accept loop y dispatcher de conexiones
//! - `commands`: Servlets de ejemplo (`/add`, `/echo`, `/stats`)
//! - `metrics`: Contadores del servidor
//! - `config`, `logging`, `error`: Configuración, logs y tipos de error
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use servlet_server::config::Config;
//! use servlet_server::http::Request;
//! use servlet_server::server::Server;
//! use std::io::Write;
//! use std::sync::Arc;
//!
//! let server = Server::new(Config::default());
//! server.add_servlet("GET", "/hello", Arc::new(|_: &Request, out: &mut dyn Write| -> anyhow::Result<()> {
//!     out.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello")?;
//!     Ok(())
//! }));
//!
//! let addr = server.start().expect("Error al iniciar servidor");
//! println!("escuchando en {}", addr);
//! server.close();
//! ```

pub mod commands;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod metrics;
pub mod router;
pub mod server;
pub mod servlet;
pub mod workers;
