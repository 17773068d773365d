//! Scoped codec worker pool.
//!
//! Decode and encode are CPU-bound, so both pipelines run their per-item
//! work on a dedicated rayon pool rather than the global one. The pool is
//! acquired at the start of a run and released when the [`CodecPool`] value
//! is dropped, which happens on every exit path of the owning function:
//! normal return, early `?` return, or unwind.
//!
//! A [`PoolMonitor`] counts acquisitions and releases so callers (and tests)
//! can confirm that every run gave its workers back.

use super::backend::BackendError;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Shared acquire/release counters.
#[derive(Debug, Clone, Default)]
pub struct PoolMonitor {
    acquired: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl PoolMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Pools acquired but not yet released.
    pub fn outstanding(&self) -> usize {
        self.acquired().saturating_sub(self.released())
    }
}

/// A bounded pool of codec workers, released on drop.
pub struct CodecPool {
    pool: rayon::ThreadPool,
    threads: usize,
    label: &'static str,
    monitor: PoolMonitor,
}

impl CodecPool {
    /// Spawn `threads` workers (at least one).
    pub fn acquire(
        label: &'static str,
        threads: usize,
        monitor: &PoolMonitor,
    ) -> Result<Self, BackendError> {
        let threads = threads.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(move |i| format!("{label}-codec-{i}"))
            .build()
            .map_err(|e| BackendError::Pool(e.to_string()))?;
        monitor.acquired.fetch_add(1, Ordering::SeqCst);
        debug!(pool = label, threads, "codec pool acquired");
        Ok(Self {
            pool,
            threads,
            label,
            monitor: monitor.clone(),
        })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Run `op` inside the pool; parallel iterators in `op` use its workers.
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }
}

impl Drop for CodecPool {
    fn drop(&mut self) {
        self.monitor.released.fetch_add(1, Ordering::SeqCst);
        debug!(pool = self.label, "codec pool released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn acquire_and_drop_balance_the_monitor() {
        let monitor = PoolMonitor::new();
        {
            let pool = CodecPool::acquire("test", 2, &monitor).unwrap();
            assert_eq!(pool.threads(), 2);
            assert_eq!(monitor.outstanding(), 1);
        }
        assert_eq!(monitor.acquired(), 1);
        assert_eq!(monitor.released(), 1);
        assert_eq!(monitor.outstanding(), 0);
    }

    #[test]
    fn zero_threads_means_one() {
        let monitor = PoolMonitor::new();
        let pool = CodecPool::acquire("test", 0, &monitor).unwrap();
        assert_eq!(pool.threads(), 1);
    }

    #[test]
    fn install_runs_parallel_work_in_order() {
        let monitor = PoolMonitor::new();
        let pool = CodecPool::acquire("test", 3, &monitor).unwrap();
        let squares: Vec<u32> = pool.install(|| (0..10u32).into_par_iter().map(|x| x * x).collect());
        assert_eq!(squares, (0..10u32).map(|x| x * x).collect::<Vec<_>>());
    }

    #[test]
    fn released_on_early_return() {
        fn run(monitor: &PoolMonitor) -> Result<(), BackendError> {
            let _pool = CodecPool::acquire("test", 1, monitor)?;
            Err(BackendError::ProcessingFailed("boom".into()))
        }

        let monitor = PoolMonitor::new();
        assert!(run(&monitor).is_err());
        assert_eq!(monitor.outstanding(), 0);
    }
}
