//! # Módulo de Métricas
//!
//! Contadores de conexiones, despachos y fallas del servidor.

pub mod collector;

pub use collector::{ServerStats, StatsSnapshot};
