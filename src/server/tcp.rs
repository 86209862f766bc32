//! # Servidor TCP Concurrente
//! src/server/tcp.rs
//!
//! Ciclo de vida del servidor y accept loop.
//!
//! ```text
//! New ──start()──→ Running ──close()──→ ShuttingDown ──→ Stopped
//!  │                                                        ▲
//!  └────────────────────────close()─────────────────────────┘
//! ```
//!
//! El servidor es de un solo uso: después de `Stopped` no se puede volver
//! a arrancar.
//!
//! El accept loop corre en su propio thread con el listener en modo
//! no bloqueante: cada iteración espera a lo sumo `accept_poll_ms` y vuelve
//! a revisar el flag `running`. Cada conexión aceptada se encola en el pool
//! de workers, que limita cuántas se atienden a la vez.

use crate::config::Config;
use crate::error::ServerError;
use crate::metrics::ServerStats;
use crate::router::RouteTable;
use crate::server::dispatcher::Dispatcher;
use crate::servlet::ServletRef;
use crate::workers::WorkerPool;
use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Estado del ciclo de vida del servidor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Creado, nunca arrancado
    New,
    /// Aceptando conexiones
    Running,
    /// `close()` en curso
    ShuttingDown,
    /// Cerrado; estado terminal
    Stopped,
}

/// Servidor de servlets
pub struct Server {
    config: Config,
    routes: Arc<RouteTable>,
    stats: Arc<ServerStats>,
    dispatcher: Arc<Dispatcher>,
    state: Mutex<ServerState>,
    running: Arc<AtomicBool>,
    local_addr: Mutex<Option<SocketAddr>>,
    pool: Mutex<Option<Arc<WorkerPool>>>,
    acceptor: Mutex<Option<JoinHandle<()>>>,
}

impl Server {
    pub fn new(config: Config) -> Self {
        let routes = Arc::new(RouteTable::new());
        let stats = Arc::new(ServerStats::new());
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&routes), Arc::clone(&stats)));

        Self {
            config,
            routes,
            stats,
            dispatcher,
            state: Mutex::new(ServerState::New),
            running: Arc::new(AtomicBool::new(false)),
            local_addr: Mutex::new(None),
            pool: Mutex::new(None),
            acceptor: Mutex::new(None),
        }
    }

    /// Registra un servlet para (método, prefijo de URI). Reemplaza al anterior
    /// si el par ya existía. Se puede llamar con el servidor corriendo.
    pub fn add_servlet(&self, method: &str, pattern: &str, servlet: ServletRef) {
        if self.routes.add(method, pattern, servlet).is_some() {
            tracing::debug!(method, pattern, "servlet replaced");
        }
    }

    /// Quita un servlet. No hace nada si no estaba registrado.
    pub fn remove_servlet(&self, method: &str, pattern: &str) {
        self.routes.remove(method, pattern);
    }

    /// Hace bind del puerto y arranca el accept loop en otro thread.
    /// Retorna la dirección real de escucha (útil con puerto 0).
    ///
    /// Si el bind falla, el servidor sigue en `New`.
    pub fn start(&self) -> Result<SocketAddr, ServerError> {
        let mut state = lock(&self.state);
        match *state {
            ServerState::New => {}
            ServerState::Running | ServerState::ShuttingDown => return Err(ServerError::AlreadyStarted),
            ServerState::Stopped => return Err(ServerError::AlreadyClosed),
        }

        self.config.validate()?;

        let address = self.config.address();
        let listener = TcpListener::bind(&address).map_err(|source| ServerError::Bind {
            address: address.clone(),
            source,
        })?;
        let local_addr = listener.local_addr().map_err(|source| ServerError::Bind {
            address: address.clone(),
            source,
        })?;
        listener.set_nonblocking(true).map_err(|source| ServerError::Bind {
            address: address.clone(),
            source,
        })?;

        let pool = Arc::new(WorkerPool::new(self.config.max_threads)?);

        self.running.store(true, Ordering::SeqCst);
        let acceptor = {
            let running = Arc::clone(&self.running);
            let pool = Arc::clone(&pool);
            let dispatcher = Arc::clone(&self.dispatcher);
            let stats = Arc::clone(&self.stats);
            let poll = self.config.accept_poll();
            thread::Builder::new()
                .name("servlet-acceptor".to_string())
                .spawn(move || accept_loop(listener, running, pool, dispatcher, stats, poll))
        };
        let acceptor = match acceptor {
            Ok(handle) => handle,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                pool.shutdown();
                return Err(ServerError::Spawn(e));
            }
        };

        *lock(&self.pool) = Some(pool);
        *lock(&self.acceptor) = Some(acceptor);
        *lock(&self.local_addr) = Some(local_addr);
        *state = ServerState::Running;

        tracing::info!(
            address = %local_addr,
            max_threads = self.config.max_threads,
            "server listening"
        );
        Ok(local_addr)
    }

    /// Cierra el servidor:
    ///
    /// 1. Deja de aceptar conexiones y libera el puerto.
    /// 2. El pool deja de recibir trabajo.
    /// 3. Llama `close()` de cada servlet registrado y vacía la tabla.
    /// 4. Espera hasta `shutdown_grace_ms` a las conexiones en curso;
    ///    pasado ese tiempo las corta.
    ///
    /// Ningún error de este proceso se propaga. Llamarlo de nuevo no hace nada.
    pub fn close(&self) {
        {
            let mut state = lock(&self.state);
            match *state {
                ServerState::ShuttingDown | ServerState::Stopped => return,
                ServerState::New | ServerState::Running => *state = ServerState::ShuttingDown,
            }
        }

        tracing::info!("server shutting down");

        // El accept loop ve el flag en su próxima iteración y suelta el listener
        self.running.store(false, Ordering::SeqCst);
        if let Some(acceptor) = lock(&self.acceptor).take() {
            if acceptor.join().is_err() {
                tracing::error!("accept loop panicked");
            }
        }

        let pool = lock(&self.pool).take();
        if let Some(pool) = &pool {
            pool.shutdown();
        }

        let closed = self.close_servlets();
        tracing::debug!(servlets = closed, "servlets closed");

        if let Some(pool) = pool {
            let grace = self.config.shutdown_grace();
            if !pool.await_termination(grace) {
                // Primero se vacía la cola; después se cortan las conexiones en curso
                let detached = pool.shutdown_now();
                let aborted = self.dispatcher.abort_connections();
                tracing::warn!(
                    grace_ms = grace.as_millis() as u64,
                    detached,
                    aborted,
                    "grace period elapsed; in-flight connections cancelled"
                );
            }
        }

        *lock(&self.state) = ServerState::Stopped;
        tracing::info!("server stopped");
    }

    /// Vacía la tabla de rutas y llama `close()` de cada servlet una sola vez,
    /// aunque esté registrado en varias rutas. Errores y panics se ignoran.
    fn close_servlets(&self) -> usize {
        let mut servlets = self.routes.drain();
        servlets.sort_by_key(|servlet| Arc::as_ptr(servlet) as *const () as usize);
        servlets.dedup_by(|a, b| Arc::ptr_eq(a, b));

        for servlet in &servlets {
            match panic::catch_unwind(AssertUnwindSafe(|| servlet.close())) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "servlet close failed"),
                Err(_) => tracing::warn!("servlet close panicked"),
            }
        }
        servlets.len()
    }

    pub fn state(&self) -> ServerState {
        *lock(&self.state)
    }

    /// Dirección de escucha, disponible después de `start()`
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *lock(&self.local_addr)
    }

    pub fn stats(&self) -> Arc<ServerStats> {
        Arc::clone(&self.stats)
    }

    /// Tabla de rutas compartida
    pub fn routes(&self) -> Arc<RouteTable> {
        Arc::clone(&self.routes)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if self.state() == ServerState::Running {
            self.close();
        }
    }
}

fn accept_loop(
    listener: TcpListener,
    running: Arc<AtomicBool>,
    pool: Arc<WorkerPool>,
    dispatcher: Arc<Dispatcher>,
    stats: Arc<ServerStats>,
    poll: Duration,
) {
    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer)) => {
                stats.record_accepted();
                tracing::debug!(%peer, "connection accepted");

                // La conexión hereda el modo no bloqueante en algunas plataformas
                if let Err(e) = stream.set_nonblocking(false) {
                    tracing::warn!(%peer, error = %e, "could not make connection blocking");
                    continue;
                }

                let dispatcher = Arc::clone(&dispatcher);
                if pool.execute(move || dispatcher.handle_connection(stream)).is_err() {
                    tracing::debug!(%peer, "pool shut down; connection dropped");
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(poll),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                if running.load(Ordering::SeqCst) {
                    tracing::error!(error = %e, "accept failed");
                }
                thread::sleep(poll);
            }
        }
    }

    drop(listener);
    tracing::debug!("accept loop finished");
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
