//! # Servlets
//! src/servlet.rs
//!
//! Un servlet recibe el request parseado y el stream de salida del cliente,
//! y escribe la respuesta completa (status line, headers y body).
//! El servidor no interpreta ni envuelve esa salida.
//!
//! Cualquier closure `Fn(&Request, &mut dyn Write) -> anyhow::Result<()>`
//! es un servlet:
//!
//! ```
//! use servlet_server::servlet::Servlet;
//! use servlet_server::http::Request;
//! use std::io::Write;
//!
//! let hello = |_req: &Request, out: &mut dyn Write| -> anyhow::Result<()> {
//!     out.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nhi")?;
//!     Ok(())
//! };
//!
//! let mut out = Vec::new();
//! let request = Request::from_bytes(b"GET /hello HTTP/1.1\r\n\r\n").unwrap();
//! hello.handle(&request, &mut out).unwrap();
//! assert!(out.ends_with(b"hi"));
//! ```

use crate::http::Request;
use std::io::Write;
use std::sync::Arc;

/// Handler registrado para un par (método, prefijo de URI)
pub trait Servlet: Send + Sync {
    /// Atiende un request escribiendo la respuesta en `out`.
    ///
    /// Un `Err` (o un panic) se registra y se suprime en el dispatcher;
    /// la conexión se cierra igual.
    fn handle(&self, request: &Request, out: &mut dyn Write) -> anyhow::Result<()>;

    /// Libera recursos al cerrar el servidor. Por defecto no hace nada.
    fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

impl<F> Servlet for F
where
    F: Fn(&Request, &mut dyn Write) -> anyhow::Result<()> + Send + Sync,
{
    fn handle(&self, request: &Request, out: &mut dyn Write) -> anyhow::Result<()> {
        self(request, out)
    }
}

/// Referencia compartida a un servlet (la tabla de rutas y los workers la comparten)
pub type ServletRef = Arc<dyn Servlet>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        closed: AtomicUsize,
    }

    impl Servlet for Counting {
        fn handle(&self, _request: &Request, out: &mut dyn Write) -> anyhow::Result<()> {
            out.write_all(b"ok")?;
            Ok(())
        }

        fn close(&self) -> anyhow::Result<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_closure_servlet_default_close() {
        let servlet: ServletRef = Arc::new(|_req: &Request, _out: &mut dyn Write| -> anyhow::Result<()> { Ok(()) });
        assert!(servlet.close().is_ok());
    }

    #[test]
    fn test_struct_servlet_close_hook() {
        let servlet = Counting {
            closed: AtomicUsize::new(0),
        };
        let request = Request::from_bytes(b"GET / HTTP/1.1\r\n\r\n").unwrap();

        let mut out = Vec::new();
        servlet.handle(&request, &mut out).unwrap();
        servlet.close().unwrap();

        assert_eq!(out, b"ok");
        assert_eq!(servlet.closed.load(Ordering::SeqCst), 1);
    }
}
