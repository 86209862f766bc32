//! # Módulo HTTP
//!
//! Subconjunto simplificado de HTTP:
//!
//! - Parsing de requests línea por línea (request line, headers,
//!   bloque de meta-data y una sola línea de body)
//! - Construcción de responses
//! - Status codes
//!
//! No hay chunked transfer, conexiones persistentes ni pipelining:
//! una conexión = un request = una respuesta.
//!
//! ### Formato de Request
//!
//! ```text
//! GET /path?query=value HTTP/1.1\r\n
//! Header-Name: Header-Value\r\n
//! \r\n
//! key=value\r\n
//! \r\n
//! body line\n
//! ```

pub mod request; // Parsing de requests
pub mod response; // Construcción de responses
pub mod status; // Códigos de estado HTTP

// Re-exportamos los tipos principales para facilitar su uso
pub use request::{Request, RequestSource};
pub use response::{write_not_found, Response};
pub use status::StatusCode;
