//! # Dispatcher de Conexiones
//! src/server/dispatcher.rs
//!
//! Atiende UNA conexión de principio a fin dentro de un worker:
//!
//! ```text
//! TcpStream → Request::parse → RouteTable::resolve → Servlet::handle
//!                  │                    │
//!                  └── falla ──→ 404 ←──┘ sin servlet
//! ```
//!
//! Pase lo que pase (éxito, error del servlet, panic, request inválido)
//! la conexión se limpia en este orden: cerrar la entrada, flush de la
//! salida, cerrar el socket. Los errores de la limpieza se ignoran.

use crate::error::ParseError;
use crate::http::{write_not_found, Request};
use crate::metrics::ServerStats;
use crate::router::RouteTable;
use std::any::Any;
use std::collections::HashMap;
use std::io::{BufReader, BufWriter, Write};
use std::net::{Shutdown, TcpStream};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Despacha conexiones a los servlets registrados
pub struct Dispatcher {
    routes: Arc<RouteTable>,
    stats: Arc<ServerStats>,
    connections: ConnectionRegistry,
}

impl Dispatcher {
    pub fn new(routes: Arc<RouteTable>, stats: Arc<ServerStats>) -> Self {
        Self {
            routes,
            stats,
            connections: ConnectionRegistry::default(),
        }
    }

    /// Atiende una conexión y la cierra. Nunca retorna error ni propaga panics
    /// de los servlets.
    pub fn handle_connection(&self, stream: TcpStream) {
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        let tracked = self.connections.track(&stream);
        self.stats.connection_started();

        let mut reader = BufReader::new(&stream);
        let mut writer = BufWriter::new(&stream);

        self.serve(&mut reader, &mut writer, &peer);

        // 1. Cerrar la entrada
        drop(reader);
        if let Err(e) = stream.shutdown(Shutdown::Read) {
            tracing::trace!(%peer, error = %e, "shutdown(read) failed");
        }

        // 2. Flush de la salida
        if let Err(e) = writer.flush() {
            tracing::trace!(%peer, error = %e, "flush failed");
        }
        drop(writer);

        // 3. Cerrar el socket
        if let Err(e) = stream.shutdown(Shutdown::Both) {
            tracing::trace!(%peer, error = %e, "shutdown(both) failed");
        }
        drop(tracked);
        drop(stream);

        self.stats.connection_finished();
    }

    fn serve(
        &self,
        reader: &mut BufReader<&TcpStream>,
        writer: &mut BufWriter<&TcpStream>,
        peer: &str,
    ) {
        let request = match Request::parse(reader) {
            Ok(request) => request,
            Err(ParseError::Io(e)) => {
                // Error de transporte: la conexión se descarta sin respuesta
                tracing::debug!(%peer, error = %e, "read failed; dropping connection");
                return;
            }
            Err(e) => {
                tracing::debug!(%peer, error = %e, "unparseable request");
                self.stats.record_parse_failure();
                self.respond_not_found(writer, peer);
                return;
            }
        };

        if request.method().is_empty() || request.target().is_empty() {
            self.stats.record_parse_failure();
            self.respond_not_found(writer, peer);
            return;
        }

        let servlet = match self.routes.resolve(request.method(), request.target()) {
            Some(servlet) => servlet,
            None => {
                tracing::debug!(%peer, method = request.method(), target = request.target(), "no servlet");
                self.stats.record_not_found();
                self.respond_not_found(writer, peer);
                return;
            }
        };

        tracing::debug!(%peer, method = request.method(), target = request.target(), "dispatching");
        self.stats.record_dispatched();

        let out: &mut dyn Write = writer;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| servlet.handle(&request, out)));

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.stats.record_handler_fault();
                tracing::warn!(%peer, target = request.target(), error = %e, "servlet failed");
            }
            Err(payload) => {
                self.stats.record_handler_fault();
                tracing::warn!(%peer, target = request.target(), panic = %panic_message(payload.as_ref()), "servlet panicked");
            }
        }
    }

    fn respond_not_found(&self, writer: &mut BufWriter<&TcpStream>, peer: &str) {
        if let Err(e) = write_not_found(writer) {
            tracing::debug!(%peer, error = %e, "failed to write 404");
        }
    }

    /// Corta todas las conexiones en curso. Las lecturas/escrituras bloqueadas
    /// fallan de inmediato y los workers quedan libres. Las conexiones que
    /// lleguen después también se cortan apenas empiezan a atenderse.
    pub fn abort_connections(&self) -> usize {
        self.connections.abort_all()
    }

    /// Conexiones que se están atendiendo ahora
    pub fn in_flight(&self) -> usize {
        self.connections.len()
    }
}

/// Registro de conexiones en curso, para poder cortarlas en un cierre forzado
#[derive(Default)]
struct ConnectionRegistry {
    next_id: AtomicU64,
    open: Mutex<OpenConnections>,
}

#[derive(Default)]
struct OpenConnections {
    streams: HashMap<u64, TcpStream>,
    /// Después de `abort_all`, toda conexión nueva se corta al registrarse
    aborted: bool,
}

impl ConnectionRegistry {
    /// Registra un clon del socket. Si no se puede clonar, la conexión
    /// simplemente no se puede abortar.
    fn track(&self, stream: &TcpStream) -> Option<TrackedConnection<'_>> {
        let mut open = self.lock();
        if open.aborted {
            // Un worker que tomó la conexión justo antes del cierre forzado
            let _ = stream.shutdown(Shutdown::Both);
            return None;
        }

        let handle = stream.try_clone().ok()?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        open.streams.insert(id, handle);
        Some(TrackedConnection { registry: self, id })
    }

    fn abort_all(&self) -> usize {
        let streams: Vec<TcpStream> = {
            let mut open = self.lock();
            open.aborted = true;
            open.streams.drain().map(|(_, stream)| stream).collect()
        };
        for stream in &streams {
            let _ = stream.shutdown(Shutdown::Both);
        }
        streams.len()
    }

    fn len(&self) -> usize {
        self.lock().streams.len()
    }

    fn lock(&self) -> MutexGuard<'_, OpenConnections> {
        self.open.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Quita la conexión del registro al terminar de atenderla
struct TrackedConnection<'a> {
    registry: &'a ConnectionRegistry,
    id: u64,
}

impl Drop for TrackedConnection<'_> {
    fn drop(&mut self) {
        self.registry.lock().streams.remove(&self.id);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
