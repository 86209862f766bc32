//! # Workers
//!
//! Pool de threads de tamaño fijo que acota cuántas conexiones se
//! atienden en paralelo.

pub mod pool;

pub use pool::WorkerPool;
