//! # Pool de Workers
//! src/workers/pool.rs
//!
//! Pool de tamaño fijo. A lo sumo `capacity` tareas se ejecutan a la vez;
//! el resto espera en una cola sin límite, así que `execute` nunca bloquea
//! a quien envía (el accept loop).
//!
//! ## Cierre
//!
//! ```text
//! shutdown()             → no se acepta trabajo nuevo; la cola se sigue vaciando
//! await_termination(t)   → espera hasta `t` a que todos los workers terminen
//! shutdown_now()         → descarta lo encolado y suelta los workers que siguen ocupados
//! ```
//!
//! Un thread no se puede matar: `shutdown_now` no interrumpe una tarea en
//! curso, solo deja de esperarla. Quien encola tareas que bloquean sobre
//! sockets debe cortarlos por su cuenta (ver `server::dispatcher`).

use crate::error::{PoolError, ServerError};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Intervalo con el que `await_termination` revisa a los workers
const TERMINATION_POLL: Duration = Duration::from_millis(5);

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Estado compartido entre el pool y sus workers
struct PoolShared {
    /// Tareas ejecutándose en este momento
    active: AtomicUsize,

    /// Tareas encoladas que ningún worker tomó todavía
    queued: AtomicUsize,

    /// Activado por `shutdown_now`: lo que quede en la cola se descarta
    cancelled: AtomicBool,
}

/// Pool de workers de tamaño fijo
pub struct WorkerPool {
    capacity: usize,
    sender: Mutex<Option<Sender<Job>>>,
    /// Copia del extremo de lectura: `shutdown_now` vacía la cola con ella
    receiver: Receiver<Job>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shared: Arc<PoolShared>,
}

impl WorkerPool {
    /// Crea el pool y arranca `capacity` workers
    pub fn new(capacity: usize) -> Result<Self, ServerError> {
        let (sender, receiver) = unbounded::<Job>();
        let shared = Arc::new(PoolShared {
            active: AtomicUsize::new(0),
            queued: AtomicUsize::new(0),
            cancelled: AtomicBool::new(false),
        });

        let mut workers = Vec::with_capacity(capacity);
        for id in 0..capacity {
            let receiver = receiver.clone();
            let shared = Arc::clone(&shared);
            let spawned = thread::Builder::new()
                .name(format!("worker-{}", id))
                .spawn(move || worker_loop(id, receiver, shared));

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    // Los workers ya creados terminan al cerrarse el canal
                    drop(sender);
                    return Err(ServerError::Spawn(e));
                }
            }
        }

        tracing::debug!(capacity, "worker pool started");

        Ok(Self {
            capacity,
            sender: Mutex::new(Some(sender)),
            receiver,
            workers: Mutex::new(workers),
            shared,
        })
    }

    /// Encola una tarea. Nunca bloquea.
    ///
    /// # Errores
    ///
    /// `PoolError::ShutDown` si ya se llamó a `shutdown`.
    pub fn execute<F>(&self, job: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = lock(&self.sender);
        let sender = sender.as_ref().ok_or(PoolError::ShutDown)?;

        self.shared.queued.fetch_add(1, Ordering::SeqCst);
        if sender.send(Box::new(job)).is_err() {
            self.shared.queued.fetch_sub(1, Ordering::SeqCst);
            return Err(PoolError::ShutDown);
        }
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Tareas ejecutándose ahora
    pub fn active(&self) -> usize {
        self.shared.active.load(Ordering::SeqCst)
    }

    /// Tareas esperando un worker libre
    pub fn queued(&self) -> usize {
        self.shared.queued.load(Ordering::SeqCst)
    }

    /// Deja de aceptar trabajo. Lo ya encolado se sigue ejecutando.
    pub fn shutdown(&self) {
        // Al soltar el sender, cada worker sale de su loop cuando la cola queda vacía
        lock(&self.sender).take();
    }

    pub fn is_shutdown(&self) -> bool {
        lock(&self.sender).is_none()
    }

    /// Espera hasta `timeout` a que todos los workers terminen.
    /// Retorna `true` si terminaron todos. Requiere `shutdown` previo.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;

        loop {
            let all_finished = lock(&self.workers).iter().all(JoinHandle::is_finished);
            if all_finished {
                for handle in lock(&self.workers).drain(..) {
                    if handle.join().is_err() {
                        tracing::warn!("worker thread panicked");
                    }
                }
                return true;
            }

            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(TERMINATION_POLL);
        }
    }

    /// Cierre forzado: descarta lo encolado y deja de esperar a los workers
    /// ocupados. Retorna cuántos workers seguían ejecutando.
    pub fn shutdown_now(&self) -> usize {
        self.shutdown();
        self.shared.cancelled.store(true, Ordering::SeqCst);

        // Las tareas encoladas se sueltan acá, sin esperar a un worker libre
        let mut discarded = 0;
        for job in self.receiver.try_iter() {
            self.shared.queued.fetch_sub(1, Ordering::SeqCst);
            drop(job);
            discarded += 1;
        }
        if discarded > 0 {
            tracing::debug!(discarded, "queued jobs discarded");
        }

        let mut still_running = 0;
        for handle in lock(&self.workers).drain(..) {
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                // El thread queda suelto; termina solo cuando su tarea retorne
                still_running += 1;
            }
        }

        if still_running > 0 {
            tracing::warn!(still_running, "worker pool forcibly stopped");
        }
        still_running
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(id: usize, receiver: Receiver<Job>, shared: Arc<PoolShared>) {
    tracing::trace!(worker = id, "worker started");

    // `iter` termina cuando no quedan senders y la cola está vacía
    for job in receiver.iter() {
        shared.queued.fetch_sub(1, Ordering::SeqCst);

        if shared.cancelled.load(Ordering::SeqCst) {
            // Al descartar la tarea se liberan sus recursos (ej: la conexión)
            drop(job);
            continue;
        }

        shared.active.fetch_add(1, Ordering::SeqCst);
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            tracing::warn!(worker = id, "task panicked; worker keeps running");
        }
        shared.active.fetch_sub(1, Ordering::SeqCst);
    }

    tracing::trace!(worker = id, "worker stopped");
}

/// Toma un mutex recuperándolo si otro thread hizo panic con el lock tomado
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;
    use std::sync::mpsc;

    #[test]
    fn test_runs_all_jobs() {
        let pool = WorkerPool::new(3).unwrap();
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..20 {
            let done = Arc::clone(&done);
            pool.execute(move || {
                done.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        pool.shutdown();
        assert!(pool.await_termination(Duration::from_secs(5)));
        assert_eq!(done.load(Ordering::SeqCst), 20);
        assert_eq!(pool.queued(), 0);
    }

    #[test]
    fn test_concurrency_never_exceeds_capacity() {
        let pool = WorkerPool::new(2).unwrap();
        let current = Arc::new(AtomicU64::new(0));
        let peak = Arc::new(AtomicU64::new(0));

        for _ in 0..8 {
            let current = Arc::clone(&current);
            let peak = Arc::clone(&peak);
            pool.execute(move || {
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(30));
                current.fetch_sub(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        // Con 2 workers ocupados, el resto quedó encolado
        assert!(pool.active() <= 2);

        pool.shutdown();
        assert!(pool.await_termination(Duration::from_secs(5)));
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn test_execute_after_shutdown_fails() {
        let pool = WorkerPool::new(1).unwrap();
        pool.shutdown();

        assert!(pool.is_shutdown());
        assert_eq!(pool.execute(|| {}), Err(PoolError::ShutDown));
    }

    #[test]
    fn test_panicking_job_does_not_kill_worker() {
        let pool = WorkerPool::new(1).unwrap();
        let (tx, rx) = mpsc::channel();

        pool.execute(|| panic!("boom")).unwrap();
        pool.execute(move || tx.send(42).unwrap()).unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 42);
    }

    #[test]
    fn test_shutdown_now_discards_queued_work() {
        let pool = WorkerPool::new(1).unwrap();
        let (started_tx, started_rx) = mpsc::channel();
        let queued_ran = Arc::new(AtomicBool::new(false));

        pool.execute(move || {
            started_tx.send(()).unwrap();
            thread::sleep(Duration::from_millis(300));
        })
        .unwrap();
        {
            let queued_ran = Arc::clone(&queued_ran);
            pool.execute(move || queued_ran.store(true, Ordering::SeqCst))
                .unwrap();
        }

        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        pool.shutdown();
        assert!(!pool.await_termination(Duration::from_millis(20)));
        assert_eq!(pool.shutdown_now(), 1);

        assert_eq!(pool.queued(), 0);

        // El worker suelto termina su tarea y la encolada ya no existe
        thread::sleep(Duration::from_millis(500));
        assert!(!queued_ran.load(Ordering::SeqCst));
    }

    /// Marca cuándo se libera lo que captura una tarea
    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_shutdown_now_releases_queued_jobs_while_workers_busy() {
        let pool = WorkerPool::new(1).unwrap();
        let (started_tx, started_rx) = mpsc::channel();
        let released = Arc::new(AtomicBool::new(false));

        pool.execute(move || {
            started_tx.send(()).unwrap();
            thread::sleep(Duration::from_secs(2));
        })
        .unwrap();
        {
            let flag = DropFlag(Arc::clone(&released));
            pool.execute(move || {
                let _held = &flag;
            })
            .unwrap();
        }

        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(!released.load(Ordering::SeqCst));

        // El único worker sigue ocupado: la tarea encolada se suelta igual
        assert_eq!(pool.shutdown_now(), 1);
        assert!(released.load(Ordering::SeqCst));
    }
}
