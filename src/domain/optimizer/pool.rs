//! Bounded worker pool for independent evaluations.
//!
//! Wraps a private rayon pool rather than the global one, so the optimizer's
//! thread count never leaks into the rest of the process.

use rayon::prelude::*;
use tracing::debug;

use crate::domain::error::OptitraderError;

#[derive(Debug)]
pub struct WorkerPool {
    pool: Option<rayon::ThreadPool>,
    threads: usize,
}

impl WorkerPool {
    /// `threads == 1` evaluates on the calling thread; `0` uses every core.
    pub fn new(threads: usize) -> Result<Self, OptitraderError> {
        if threads == 1 {
            return Ok(WorkerPool {
                pool: None,
                threads: 1,
            });
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("optitrader-worker-{i}"))
            .build()
            .map_err(|e| OptitraderError::Optimization {
                reason: format!("failed to start worker pool: {e}"),
            })?;
        let threads = pool.current_num_threads();
        debug!(threads, "worker pool started");
        Ok(WorkerPool {
            pool: Some(pool),
            threads,
        })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Apply `f(index, item)` to every item. Results come back in input order.
    pub fn map<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(usize, &T) -> R + Send + Sync,
    {
        match &self.pool {
            Some(pool) => pool.install(|| {
                items
                    .par_iter()
                    .enumerate()
                    .map(|(i, item)| f(i, item))
                    .collect()
            }),
            None => items.iter().enumerate().map(|(i, item)| f(i, item)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_pool_preserves_order() {
        let pool = WorkerPool::new(1).unwrap();
        assert_eq!(pool.threads(), 1);
        let out = pool.map(&[3, 1, 2], |i, x| (i, x * 10));
        assert_eq!(out, vec![(0, 30), (1, 10), (2, 20)]);
    }

    #[test]
    fn parallel_pool_preserves_order() {
        let pool = WorkerPool::new(4).unwrap();
        assert_eq!(pool.threads(), 4);
        let items: Vec<u64> = (0..200).collect();
        let out = pool.map(&items, |_, x| x * x);
        let expected: Vec<u64> = items.iter().map(|x| x * x).collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn zero_threads_uses_all_cores() {
        let pool = WorkerPool::new(0).unwrap();
        assert!(pool.threads() >= 1);
    }

    #[test]
    fn empty_input() {
        let pool = WorkerPool::new(1).unwrap();
        let out: Vec<i32> = pool.map(&[] as &[i32], |_, x| *x);
        assert!(out.is_empty());
    }
}
