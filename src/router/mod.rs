//! # Sistema de Routing
//! src/router/mod.rs
//!
//! Tabla de rutas: método HTTP → (prefijo de URI → servlet).
//!
//! ```text
//! Request → RouteTable::resolve(method, uri) → Servlet → respuesta
//! ```
//!
//! ## Reglas de resolución
//!
//! 1. El método se normaliza a mayúsculas; el URI se compara tal cual.
//! 2. Se descarta el query string del URI.
//! 3. Coincidencia exacta gana.
//! 4. Si no, gana el prefijo registrado MÁS LARGO. El prefijo es léxico,
//!    no por segmentos: `/api` es prefijo de `/apiary`.
//!    Con dos prefijos de igual largo el ganador no está definido.
//!
//! La tabla se comparte entre el accept loop, los workers y quien
//! registra servlets; altas, bajas y búsquedas pueden ocurrir en paralelo.

use crate::servlet::ServletRef;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Tabla de rutas concurrente
///
/// Cada método tiene su propio mapa de patrones. Una búsqueda toma el lock
/// de lectura del shard de ese método, así que ve el mapa completo de un
/// instante: nunca una entrada a medio insertar o a medio borrar.
#[derive(Default)]
pub struct RouteTable {
    routes: DashMap<String, HashMap<String, ServletRef>>,
}

impl RouteTable {
    /// Crea una tabla vacía
    pub fn new() -> Self {
        Self::default()
    }

    /// Registra un servlet. Si el par (método, patrón) ya existía,
    /// lo reemplaza y retorna el anterior.
    ///
    /// # Ejemplo
    /// ```
    /// use servlet_server::router::RouteTable;
    /// use servlet_server::http::Request;
    /// use std::io::Write;
    /// use std::sync::Arc;
    ///
    /// let table = RouteTable::new();
    /// table.add("get", "/hello", Arc::new(|_: &Request, out: &mut dyn Write| -> anyhow::Result<()> {
    ///     out.write_all(b"HTTP/1.1 200 OK\r\n\r\n")?;
    ///     Ok(())
    /// }));
    ///
    /// assert!(table.resolve("GET", "/hello?name=x").is_some());
    /// ```
    pub fn add(&self, method: &str, pattern: &str, servlet: ServletRef) -> Option<ServletRef> {
        self.routes
            .entry(normalize_method(method))
            .or_default()
            .insert(pattern.to_string(), servlet)
    }

    /// Elimina un servlet. No hace nada si no estaba registrado.
    pub fn remove(&self, method: &str, pattern: &str) -> Option<ServletRef> {
        self.routes
            .get_mut(&normalize_method(method))
            .and_then(|mut patterns| patterns.remove(pattern))
    }

    /// Busca el servlet para un método y URI (con o sin query string)
    pub fn resolve(&self, method: &str, uri: &str) -> Option<ServletRef> {
        let path = uri.split_once('?').map_or(uri, |(path, _)| path);
        let patterns = self.routes.get(&normalize_method(method))?;

        // Coincidencia exacta
        if let Some(servlet) = patterns.get(path) {
            return Some(Arc::clone(servlet));
        }

        // Prefijo más largo; en empate se queda el primero encontrado
        let mut best: Option<(&str, &ServletRef)> = None;
        for (pattern, servlet) in patterns.iter() {
            if !path.starts_with(pattern.as_str()) {
                continue;
            }
            match best {
                Some((current, _)) if current.len() >= pattern.len() => {}
                _ => best = Some((pattern.as_str(), servlet)),
            }
        }

        best.map(|(_, servlet)| Arc::clone(servlet))
    }

    /// Vacía la tabla y retorna todos los servlets que estaban registrados
    pub fn drain(&self) -> Vec<ServletRef> {
        let methods: Vec<String> = self.routes.iter().map(|entry| entry.key().clone()).collect();

        let mut servlets = Vec::new();
        for method in methods {
            if let Some((_, patterns)) = self.routes.remove(&method) {
                servlets.extend(patterns.into_values());
            }
        }
        servlets
    }

    /// Número total de rutas registradas
    pub fn len(&self) -> usize {
        self.routes.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn normalize_method(method: &str) -> String {
    method.to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Request;
    use std::io::Write;
    use std::thread;

    /// Servlet que escribe una etiqueta fija, para identificar quién respondió
    fn tagged(tag: &'static str) -> ServletRef {
        Arc::new(move |_req: &Request, out: &mut dyn Write| -> anyhow::Result<()> {
            out.write_all(tag.as_bytes())?;
            Ok(())
        })
    }

    fn tag_of(servlet: &ServletRef) -> String {
        let request = Request::from_bytes(b"GET / HTTP/1.1\r\n\r\n").unwrap();
        let mut out = Vec::new();
        servlet.handle(&request, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn resolved_tag(table: &RouteTable, method: &str, uri: &str) -> Option<String> {
        table.resolve(method, uri).map(|servlet| tag_of(&servlet))
    }

    #[test]
    fn test_table_creation() {
        let table = RouteTable::new();
        assert!(table.is_empty());
        assert!(table.resolve("GET", "/").is_none());
    }

    #[test]
    fn test_longest_prefix_wins() {
        let table = RouteTable::new();
        table.add("GET", "/api", tagged("api"));
        table.add("GET", "/api/v1", tagged("v1"));

        assert_eq!(resolved_tag(&table, "GET", "/api/v1/users").as_deref(), Some("v1"));
        assert_eq!(resolved_tag(&table, "GET", "/api/other").as_deref(), Some("api"));
        assert_eq!(resolved_tag(&table, "GET", "/other"), None);
    }

    #[test]
    fn test_exact_match_wins_over_shorter_prefix() {
        let table = RouteTable::new();
        table.add("GET", "/", tagged("root"));
        table.add("GET", "/status", tagged("status"));

        assert_eq!(resolved_tag(&table, "GET", "/status").as_deref(), Some("status"));
        assert_eq!(resolved_tag(&table, "GET", "/").as_deref(), Some("root"));
    }

    #[test]
    fn test_prefix_is_lexical_not_segment_aware() {
        let table = RouteTable::new();
        table.add("GET", "/api", tagged("api"));

        assert_eq!(resolved_tag(&table, "GET", "/apiary").as_deref(), Some("api"));
        assert_eq!(resolved_tag(&table, "GET", "/apiv2").as_deref(), Some("api"));
    }

    #[test]
    fn test_query_string_is_ignored() {
        let table = RouteTable::new();
        table.add("GET", "/add", tagged("add"));

        assert_eq!(resolved_tag(&table, "GET", "/add?a=5&b=7").as_deref(), Some("add"));
    }

    #[test]
    fn test_method_is_case_insensitive_uri_is_not() {
        let table = RouteTable::new();
        table.add("post", "/echo", tagged("echo"));

        assert_eq!(resolved_tag(&table, "POST", "/echo").as_deref(), Some("echo"));
        assert_eq!(resolved_tag(&table, "Post", "/echo").as_deref(), Some("echo"));
        assert_eq!(resolved_tag(&table, "POST", "/ECHO"), None);
        assert_eq!(resolved_tag(&table, "GET", "/echo"), None);
    }

    #[test]
    fn test_add_overwrites_existing_pair() {
        let table = RouteTable::new();
        assert!(table.add("GET", "/x", tagged("first")).is_none());

        let previous = table.add("GET", "/x", tagged("second")).unwrap();

        assert_eq!(tag_of(&previous), "first");
        assert_eq!(resolved_tag(&table, "GET", "/x").as_deref(), Some("second"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_remove_route() {
        let table = RouteTable::new();
        table.add("GET", "/x", tagged("x"));

        assert!(table.remove("get", "/x").is_some());
        assert!(table.remove("GET", "/x").is_none());
        assert!(table.remove("DELETE", "/nothing").is_none());
        assert_eq!(resolved_tag(&table, "GET", "/x"), None);
    }

    #[test]
    fn test_drain_empties_table() {
        let table = RouteTable::new();
        table.add("GET", "/a", tagged("a"));
        table.add("GET", "/b", tagged("b"));
        table.add("POST", "/a", tagged("c"));

        let drained = table.drain();

        assert_eq!(drained.len(), 3);
        assert!(table.is_empty());
        assert!(table.resolve("GET", "/a").is_none());
    }

    #[test]
    fn test_concurrent_add_remove_and_resolve() {
        let table = Arc::new(RouteTable::new());
        table.add("GET", "/stable", tagged("stable"));

        let writer = {
            let table = Arc::clone(&table);
            thread::spawn(move || {
                for _ in 0..2_000 {
                    table.add("GET", "/stable/toggle", tagged("toggle"));
                    table.remove("GET", "/stable/toggle");
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let table = Arc::clone(&table);
                thread::spawn(move || {
                    for _ in 0..2_000 {
                        // O la ruta larga está completa, o cae al prefijo estable
                        let tag = resolved_tag(&table, "GET", "/stable/toggle/item").unwrap();
                        assert!(tag == "toggle" || tag == "stable", "unexpected tag {tag}");
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }

        assert_eq!(table.len(), 1);
    }
}
