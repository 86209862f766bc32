//! # Collector de Métricas
//! src/metrics/collector.rs
//!
//! Contadores del servidor. Todos son atómicos: el accept loop y los
//! workers los actualizan sin tomar locks.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Contadores thread-safe del servidor
#[derive(Debug)]
pub struct ServerStats {
    /// Conexiones aceptadas por el accept loop
    connections_accepted: AtomicU64,

    /// Requests despachados a un servlet
    requests_dispatched: AtomicU64,

    /// Respuestas 404 por falta de servlet
    not_found: AtomicU64,

    /// Requests que no se pudieron parsear
    parse_failures: AtomicU64,

    /// Servlets que retornaron error o hicieron panic
    handler_faults: AtomicU64,

    /// Conexiones atendidas en este momento
    active_connections: AtomicU64,

    /// Máximo de conexiones atendidas a la vez
    peak_active_connections: AtomicU64,

    start_time: Instant,
}

/// Foto de los contadores en un instante
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub uptime_seconds: u64,
    pub connections_accepted: u64,
    pub requests_dispatched: u64,
    pub not_found: u64,
    pub parse_failures: u64,
    pub handler_faults: u64,
    pub active_connections: u64,
    pub peak_active_connections: u64,
}

impl ServerStats {
    /// Crea un nuevo collector de métricas
    pub fn new() -> Self {
        Self {
            connections_accepted: AtomicU64::new(0),
            requests_dispatched: AtomicU64::new(0),
            not_found: AtomicU64::new(0),
            parse_failures: AtomicU64::new(0),
            handler_faults: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            peak_active_connections: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_accepted(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatched(&self) {
        self.requests_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_not_found(&self) {
        self.not_found.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parse_failure(&self) {
        self.parse_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_handler_fault(&self) {
        self.handler_faults.fetch_add(1, Ordering::Relaxed);
    }

    /// Marca el inicio de la atención de una conexión
    pub fn connection_started(&self) {
        let active = self.active_connections.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_active_connections.fetch_max(active, Ordering::SeqCst);
    }

    /// Marca el fin de la atención de una conexión
    pub fn connection_finished(&self) {
        // Nunca bajar de cero aunque haya un finished de más
        let _ = self
            .active_connections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    pub fn active_connections(&self) -> u64 {
        self.active_connections.load(Ordering::SeqCst)
    }

    pub fn peak_active_connections(&self) -> u64 {
        self.peak_active_connections.load(Ordering::SeqCst)
    }

    /// Obtiene una foto de los contadores
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime_seconds: self.start_time.elapsed().as_secs(),
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            requests_dispatched: self.requests_dispatched.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            parse_failures: self.parse_failures.load(Ordering::Relaxed),
            handler_faults: self.handler_faults.load(Ordering::Relaxed),
            active_connections: self.active_connections(),
            peak_active_connections: self.peak_active_connections(),
        }
    }

    /// Obtiene las métricas actuales en formato JSON
    pub fn to_json(&self) -> String {
        // Serializar un struct de enteros no puede fallar
        serde_json::to_string_pretty(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Default for ServerStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_new_stats_are_zero() {
        let snapshot = ServerStats::new().snapshot();

        assert_eq!(snapshot.connections_accepted, 0);
        assert_eq!(snapshot.handler_faults, 0);
        assert_eq!(snapshot.peak_active_connections, 0);
    }

    #[test]
    fn test_peak_tracks_maximum() {
        let stats = ServerStats::new();

        stats.connection_started();
        stats.connection_started();
        stats.connection_finished();
        stats.connection_started();
        stats.connection_finished();
        stats.connection_finished();

        assert_eq!(stats.active_connections(), 0);
        assert_eq!(stats.peak_active_connections(), 2);
    }

    #[test]
    fn test_finished_never_underflows() {
        let stats = ServerStats::new();
        stats.connection_finished();
        assert_eq!(stats.active_connections(), 0);
    }

    #[test]
    fn test_concurrent_counters() {
        let stats = Arc::new(ServerStats::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let stats = Arc::clone(&stats);
                thread::spawn(move || {
                    for _ in 0..100 {
                        stats.record_accepted();
                        stats.record_dispatched();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.connections_accepted, 800);
        assert_eq!(snapshot.requests_dispatched, 800);
    }

    #[test]
    fn test_to_json() {
        let stats = ServerStats::new();
        stats.record_not_found();

        let value: serde_json::Value = serde_json::from_str(&stats.to_json()).unwrap();
        assert_eq!(value["not_found"], 1);
        assert_eq!(value["parse_failures"], 0);
    }
}
