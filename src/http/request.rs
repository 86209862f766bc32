//! # Parsing de Requests
//! src/http/request.rs
//!
//! Parser de requests línea por línea sobre un stream con buffer.
//!
//! ## Formato de un Request
//!
//! ```text
//! POST /echo?lang=es HTTP/1.1\r\n
//! Host: localhost\r\n
//! Content-Length: 5\r\n
//! \r\n
//! filename="file.txt"\r\n
//! \r\n
//! hello world!\n
//! ```
//!
//! ## Componentes
//!
//! 1. **Request Line**: `METHOD TARGET ...` (al menos dos tokens)
//! 2. **Headers**: Pares `Name: Value` hasta una línea vacía
//! 3. **Meta-data**: Líneas `key=value` opcionales, terminadas por línea vacía
//! 4. **Body**: A lo sumo UNA línea. `Content-Length` se lee pero no acota la lectura.
//!
//! Las partes 3 y 4 solo se leen si hay datos disponibles en ese momento;
//! el parser nunca se bloquea esperando un body que no llegó.

use crate::error::ParseError;
use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Cursor};
use std::net::TcpStream;

/// Stream de entrada que sabe si tiene datos listos sin bloquear
pub trait RequestSource: BufRead {
    /// `true` si una lectura no se bloquearía (hay bytes en el buffer o en el socket)
    fn has_pending_data(&mut self) -> io::Result<bool>;
}

impl RequestSource for &[u8] {
    fn has_pending_data(&mut self) -> io::Result<bool> {
        Ok(!self.is_empty())
    }
}

impl<T: AsRef<[u8]>> RequestSource for Cursor<T> {
    fn has_pending_data(&mut self) -> io::Result<bool> {
        Ok(!self.fill_buf()?.is_empty())
    }
}

impl RequestSource for BufReader<TcpStream> {
    fn has_pending_data(&mut self) -> io::Result<bool> {
        Ok(!self.buffer().is_empty() || socket_has_data(self.get_ref())?)
    }
}

impl RequestSource for BufReader<&TcpStream> {
    fn has_pending_data(&mut self) -> io::Result<bool> {
        Ok(!self.buffer().is_empty() || socket_has_data(self.get_ref())?)
    }
}

/// Pregunta al socket si hay bytes sin bloquear (peek no consume nada)
fn socket_has_data(stream: &TcpStream) -> io::Result<bool> {
    stream.set_nonblocking(true)?;
    let mut probe = [0u8; 1];
    let peeked = stream.peek(&mut probe);
    stream.set_nonblocking(false)?;

    match peeked {
        Ok(n) => Ok(n > 0),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
        Err(e) => Err(e),
    }
}

impl<R: RequestSource + ?Sized> RequestSource for &mut R {
    fn has_pending_data(&mut self) -> io::Result<bool> {
        (**self).has_pending_data()
    }
}

/// Representa un request parseado. Inmutable una vez construido.
#[derive(Debug, Clone)]
pub struct Request {
    /// Método en mayúsculas (ej: "GET")
    method: String,

    /// Target tal como llegó, con query string (ej: "/add?a=5&b=7")
    target: String,

    /// Target sin query string (ej: "/add")
    path: String,

    /// Segmentos del path (ej: "/api/v1" -> ["api", "v1"])
    path_segments: Vec<String>,

    /// Parámetros del query string y del bloque de meta-data
    parameters: HashMap<String, String>,

    /// Headers HTTP (ej: {"Host": "localhost:8080"})
    headers: HashMap<String, String>,

    /// Valor de Content-Length (0 si falta o es inválido)
    content_length: usize,

    /// Body: una sola línea, siempre terminada en '\n'
    body: Vec<u8>,
}

impl Request {
    /// Parsea un request desde un stream con buffer
    ///
    /// # Errores
    ///
    /// * `ParseError::EmptyRequest` - el stream terminó antes de la request line
    /// * `ParseError::MalformedRequestLine` - la request line tiene menos de dos tokens
    /// * `ParseError::Io` - falla de lectura
    ///
    /// # Ejemplo
    ///
    /// ```
    /// use servlet_server::http::Request;
    ///
    /// let mut raw: &[u8] = b"GET /add?a=5&b=7 HTTP/1.1\r\nHost: test\r\n\r\n";
    /// let request = Request::parse(&mut raw).unwrap();
    ///
    /// assert_eq!(request.path(), "/add");
    /// assert_eq!(request.parameter("a"), Some("5"));
    /// ```
    pub fn parse<R: RequestSource + ?Sized>(reader: &mut R) -> Result<Self, ParseError> {
        // 1. Request line
        let request_line = match read_line(reader)? {
            Some(line) => String::from_utf8_lossy(&line).into_owned(),
            None => return Err(ParseError::EmptyRequest),
        };
        let (method, target) = Self::parse_request_line(&request_line)?;

        // 2. Path y query string
        let (path, mut parameters) = match target.split_once('?') {
            Some((path, query)) => (path.to_string(), Self::parse_query_string(query)),
            None => (target.clone(), HashMap::new()),
        };

        // 3. Segmentos
        let path_segments = Self::split_segments(&path);

        // 4. Headers
        let (headers, content_length) = Self::parse_headers(reader)?;

        // 5. Bloque de meta-data (solo si ya hay datos)
        let mut first_body_line = None;
        while reader.has_pending_data()? {
            let line = match read_line(reader)? {
                Some(line) => line,
                None => break,
            };
            if line.is_empty() {
                break;
            }

            let meta = String::from_utf8_lossy(&line)
                .split_once('=')
                .map(|(key, value)| (key.to_string(), value.to_string()));
            match meta {
                Some((key, value)) => {
                    parameters.insert(key, value);
                }
                None => {
                    // No es meta-data: es la primera línea del body
                    first_body_line = Some(line);
                    break;
                }
            }
        }

        // 6. Body: a lo sumo una línea
        let mut body = match first_body_line {
            Some(line) => line,
            None if reader.has_pending_data()? => read_line(reader)?.unwrap_or_default(),
            None => Vec::new(),
        };
        body.push(b'\n');

        Ok(Request {
            method,
            target,
            path,
            path_segments,
            parameters,
            headers,
            content_length,
            body,
        })
    }

    /// Parsea un request completo desde bytes en memoria
    pub fn from_bytes(mut raw: &[u8]) -> Result<Self, ParseError> {
        Self::parse(&mut raw)
    }

    /// Formato: `METHOD TARGET [VERSION]`, separado por espacios simples
    fn parse_request_line(line: &str) -> Result<(String, String), ParseError> {
        let mut parts: Vec<&str> = line.split(' ').collect();

        // Los tokens vacíos al final no cuentan ("GET " tiene un solo token)
        while parts.last().is_some_and(|part| part.is_empty()) {
            parts.pop();
        }

        if parts.len() < 2 {
            return Err(ParseError::MalformedRequestLine(line.to_string()));
        }

        Ok((parts[0].to_uppercase(), parts[1].to_string()))
    }

    /// Parsea una query string en un HashMap
    ///
    /// Ejemplo: "a=5&b=7&debug" -> {"a": "5", "b": "7"}
    /// Los pares sin '=' se descartan; el último duplicado gana.
    fn parse_query_string(query: &str) -> HashMap<String, String> {
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    /// `"/"` da `[""]`; los segmentos vacíos al final se descartan (`"/a/b/"` da `["a", "b"]`)
    fn split_segments(path: &str) -> Vec<String> {
        let relative = path.strip_prefix('/').unwrap_or(path);
        if relative.is_empty() {
            return vec![String::new()];
        }

        let mut segments: Vec<String> = relative.split('/').map(str::to_string).collect();

        while segments.last().is_some_and(|segment| segment.is_empty()) {
            segments.pop();
        }

        segments
    }

    /// Lee headers hasta la línea vacía o el fin del stream.
    /// Retorna los headers y el Content-Length detectado.
    fn parse_headers<R: RequestSource + ?Sized>(
        reader: &mut R,
    ) -> Result<(HashMap<String, String>, usize), ParseError> {
        let mut headers = HashMap::new();
        let mut content_length = 0;

        while let Some(line) = read_line(reader)? {
            if line.is_empty() {
                break;
            }

            let line = String::from_utf8_lossy(&line);
            // Líneas sin ':' se ignoran, no se validan headers
            if let Some((name, value)) = line.split_once(':') {
                let name = name.trim();
                let value = value.trim();
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.parse().unwrap_or(0);
                }
                headers.insert(name.to_string(), value.to_string());
            }
        }

        Ok((headers, content_length))
    }

    // === Métodos públicos para acceder a los campos ===

    /// Obtiene el método en mayúsculas
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Obtiene el target original, incluyendo el query string
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Obtiene el path sin query string
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn path_segments(&self) -> &[String] {
        &self.path_segments
    }

    /// Obtiene todos los parámetros (query string + meta-data)
    pub fn parameters(&self) -> &HashMap<String, String> {
        &self.parameters
    }

    /// Obtiene un parámetro específico
    ///
    /// # Ejemplo
    /// ```
    /// use servlet_server::http::Request;
    ///
    /// let request = Request::from_bytes(b"GET /test?num=42 HTTP/1.1\r\n\r\n").unwrap();
    ///
    /// assert_eq!(request.parameter("num"), Some("42"));
    /// assert_eq!(request.parameter("missing"), None);
    /// ```
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(|s| s.as_str())
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Obtiene un header sin distinguir mayúsculas en el nombre
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Content-Length declarado. Informativo: no acota la lectura del body.
    pub fn content_length(&self) -> usize {
        self.content_length
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Obtiene el body como texto (lossy)
    pub fn body_str(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Lee una línea sin el terminador (`\n` o `\r\n`). `None` al final del stream.
fn read_line<R: BufRead + ?Sized>(reader: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut line = Vec::new();
    if reader.read_until(b'\n', &mut line)? == 0 {
        return Ok(None);
    }

    if line.last() == Some(&b'\n') {
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
    }

    Ok(Some(line))
}
