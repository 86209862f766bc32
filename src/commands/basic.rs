//! # Servlets Básicos
//! src/commands/basic.rs
//!
//! Servlets de demostración que registra el binario:
//! - GET /add: Suma dos enteros
//! - POST /echo: Devuelve el body tal cual
//! - GET /stats: Contadores del servidor en JSON
//!
//! Cada uno tiene un handler puro `fn(&Request) -> Response` y un servlet
//! que escribe esa respuesta en el socket.

use crate::http::{Request, Response, StatusCode};
use crate::metrics::ServerStats;
use crate::servlet::Servlet;
use std::io::Write;
use std::sync::Arc;

/// Handler para /add?a=X&b=Y
///
/// Suma dos enteros. Un parámetro ausente vale 0.
///
/// # Ejemplo de response
/// ```text
/// GET /add?a=5&b=7  →  200 OK, body "12\n"
/// ```
pub fn add_handler(req: &Request) -> Response {
    let parse = |name: &str| -> Result<i64, String> {
        let raw = req.parameter(name).unwrap_or("0");
        raw.trim()
            .parse::<i64>()
            .map_err(|_| format!("Parameter '{}' must be an integer, got '{}'\n", name, raw))
    };

    let (a, b) = match (parse("a"), parse("b")) {
        (Ok(a), Ok(b)) => (a, b),
        (Err(message), _) | (_, Err(message)) => {
            return Response::text(StatusCode::BadRequest, &message);
        }
    };

    match a.checked_add(b) {
        Some(sum) => Response::text(StatusCode::Ok, &format!("{}\n", sum)),
        None => Response::text(StatusCode::BadRequest, "Sum overflows a 64-bit integer\n"),
    }
}

/// Handler para /echo
///
/// Devuelve el body recibido sin cambios. Si el request trae un parámetro
/// `filename` (por query string o bloque de metadatos) se refleja en el
/// header `X-Filename`.
pub fn echo_handler(req: &Request) -> Response {
    let mut response = Response::new(StatusCode::Ok)
        .with_header("Content-Type", "text/plain")
        .with_body_bytes(req.body().to_vec());

    if let Some(filename) = req.parameter("filename") {
        response.add_header("X-Filename", filename);
    }
    response
}

/// Handler para /stats
pub fn stats_handler(stats: &ServerStats) -> Response {
    Response::json(&stats.to_json())
}

/// Servlet de `/add`
#[derive(Debug, Default)]
pub struct AddServlet;

impl Servlet for AddServlet {
    fn handle(&self, request: &Request, out: &mut dyn Write) -> anyhow::Result<()> {
        add_handler(request).write_to(out)?;
        Ok(())
    }
}

/// Servlet de `/echo`
#[derive(Debug, Default)]
pub struct EchoServlet;

impl Servlet for EchoServlet {
    fn handle(&self, request: &Request, out: &mut dyn Write) -> anyhow::Result<()> {
        echo_handler(request).write_to(out)?;
        Ok(())
    }
}

/// Servlet de `/stats`
pub struct StatsServlet {
    stats: Arc<ServerStats>,
}

impl StatsServlet {
    pub fn new(stats: Arc<ServerStats>) -> Self {
        Self { stats }
    }
}

impl Servlet for StatsServlet {
    fn handle(&self, _request: &Request, out: &mut dyn Write) -> anyhow::Result<()> {
        stats_handler(&self.stats).write_to(out)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(raw: &str) -> Request {
        Request::from_bytes(raw.as_bytes()).unwrap()
    }

    #[test]
    fn test_add_handler() {
        let response = add_handler(&request("GET /add?a=5&b=7 HTTP/1.1\r\n\r\n"));

        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(response.body(), b"12\n");
        assert_eq!(response.header("Content-Length"), Some("3"));
    }

    #[test]
    fn test_add_missing_parameter_is_zero() {
        let response = add_handler(&request("GET /add?a=-4 HTTP/1.1\r\n\r\n"));

        assert_eq!(response.body(), b"-4\n");
    }

    #[test]
    fn test_add_rejects_non_integer() {
        let response = add_handler(&request("GET /add?a=five&b=7 HTTP/1.1\r\n\r\n"));

        assert_eq!(response.status(), StatusCode::BadRequest);
        assert!(String::from_utf8_lossy(response.body()).contains("'a'"));
    }

    #[test]
    fn test_add_overflow() {
        let raw = format!("GET /add?a={}&b=1 HTTP/1.1\r\n\r\n", i64::MAX);
        let response = add_handler(&request(&raw));

        assert_eq!(response.status(), StatusCode::BadRequest);
    }

    #[test]
    fn test_echo_with_metadata() {
        let req = request("POST /echo HTTP/1.1\r\nContent-Length: 13\r\n\r\nfilename=\"x.txt\"\r\n\r\nhello world!\r\n");
        let response = echo_handler(&req);

        assert_eq!(response.body(), b"hello world!\n");
        assert_eq!(response.header("X-Filename"), Some("\"x.txt\""));
    }

    #[test]
    fn test_echo_servlet_writes_full_response() {
        let req = request("POST /echo HTTP/1.1\r\n\r\nping\n");
        let mut out = Vec::new();

        EchoServlet.handle(&req, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.ends_with("\r\n\r\nping\n"));
    }

    #[test]
    fn test_stats_servlet() {
        let stats = Arc::new(ServerStats::new());
        stats.record_dispatched();
        let servlet = StatsServlet::new(Arc::clone(&stats));
        let mut out = Vec::new();

        servlet.handle(&request("GET /stats HTTP/1.1\r\n\r\n"), &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let body = text.split("\r\n\r\n").nth(1).unwrap();
        let value: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(value["requests_dispatched"], 1);
    }
}
