//! Parallel processing strategies

#[cfg(feature = "parallel")]
use rayon::prelude::*;
#[cfg(feature = "parallel")]
use std::sync::Arc;

use geolocus_core::{Error, Result};

use crate::cancel::CancelToken;

/// Processing mode for analyses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingMode {
    /// Single-threaded processing
    Sequential,
    /// Parallel processing using all available cores
    #[default]
    Parallel,
    /// Parallel with specified number of threads
    ParallelWith(usize),
}

/// Strategy for fanning work out over observation indices
pub trait ParallelStrategy {
    /// Map a function over indices and collect results in index order
    fn par_map<T, F>(&self, range: std::ops::Range<usize>, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send;

    /// Like [`par_map`](Self::par_map), but checks `cancel` before every
    /// task and fails with [`Error::Cancelled`] if it was triggered.
    /// Partial results are dropped.
    fn try_par_map<T, F>(
        &self,
        range: std::ops::Range<usize>,
        cancel: &CancelToken,
        f: F,
    ) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send;
}

impl ParallelStrategy for ProcessingMode {
    fn par_map<T, F>(&self, range: std::ops::Range<usize>, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        match self {
            ProcessingMode::Sequential => range.map(f).collect(),
            #[cfg(feature = "parallel")]
            ProcessingMode::Parallel => range.into_par_iter().map(f).collect(),
            #[cfg(feature = "parallel")]
            ProcessingMode::ParallelWith(threads) => match build_pool(*threads) {
                Some(pool) => pool.install(|| range.into_par_iter().map(f).collect()),
                None => range.into_par_iter().map(f).collect(),
            },
            #[cfg(not(feature = "parallel"))]
            _ => range.map(f).collect(),
        }
    }

    fn try_par_map<T, F>(
        &self,
        range: std::ops::Range<usize>,
        cancel: &CancelToken,
        f: F,
    ) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        let guarded = |i: usize| {
            if cancel.is_cancelled() {
                None
            } else {
                Some(f(i))
            }
        };

        let collected: Option<Vec<T>> = match self {
            ProcessingMode::Sequential => range.map(guarded).collect(),
            #[cfg(feature = "parallel")]
            ProcessingMode::Parallel => range.into_par_iter().map(guarded).collect(),
            #[cfg(feature = "parallel")]
            ProcessingMode::ParallelWith(threads) => {
                let pool = build_pool(*threads).ok_or_else(|| {
                    Error::Other(format!("Failed to build a pool of {} threads", threads))
                })?;
                pool.install(|| range.into_par_iter().map(guarded).collect())
            }
            #[cfg(not(feature = "parallel"))]
            _ => range.map(guarded).collect(),
        };

        match collected {
            Some(results) if !cancel.is_cancelled() => Ok(results),
            _ => Err(Error::Cancelled),
        }
    }
}

#[cfg(feature = "parallel")]
fn build_pool(threads: usize) -> Option<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .ok()
}

/// Execution settings threaded through every analysis.
///
/// A `ParallelWith(n)` execution builds its pool once in [`Execution::new`]
/// and reuses it for every [`map`](Execution::map).
#[derive(Debug, Clone, Default)]
pub struct Execution {
    pub mode: ProcessingMode,
    pub cancel: CancelToken,
    #[cfg(feature = "parallel")]
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl Execution {
    pub fn new(mode: ProcessingMode) -> Self {
        Self {
            mode,
            cancel: CancelToken::new(),
            #[cfg(feature = "parallel")]
            pool: match mode {
                ProcessingMode::ParallelWith(threads) => build_pool(threads).map(Arc::new),
                _ => None,
            },
        }
    }

    pub fn sequential() -> Self {
        Self::new(ProcessingMode::Sequential)
    }

    /// Attach an existing cancellation token
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Number of worker threads `map` fans out to
    pub fn threads(&self) -> usize {
        match self.mode {
            ProcessingMode::Sequential => 1,
            ProcessingMode::Parallel => available_threads(),
            #[cfg(feature = "parallel")]
            ProcessingMode::ParallelWith(n) => self.cached_pool(n).map_or(n, |p| p.current_num_threads()),
            #[cfg(not(feature = "parallel"))]
            ProcessingMode::ParallelWith(_) => 1,
        }
    }

    /// The prebuilt pool, if it still matches the mode
    #[cfg(feature = "parallel")]
    fn cached_pool(&self, threads: usize) -> Option<&rayon::ThreadPool> {
        self.pool
            .as_deref()
            .filter(|p| p.current_num_threads() == threads)
    }

    /// Run `f` for every observation index `0..n` and collect in index order
    pub fn map<T, F>(&self, n: usize, f: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        self.dispatch(n, f)
    }

    #[cfg(feature = "parallel")]
    fn dispatch<T, F>(&self, n: usize, f: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        if let ProcessingMode::ParallelWith(threads) = self.mode {
            if let Some(pool) = self.cached_pool(threads) {
                return pool.install(|| ProcessingMode::Parallel.try_par_map(0..n, &self.cancel, f));
            }
        }
        self.mode.try_par_map(0..n, &self.cancel, f)
    }

    #[cfg(not(feature = "parallel"))]
    fn dispatch<T, F>(&self, n: usize, f: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        self.mode.try_par_map(0..n, &self.cancel, f)
    }

    /// Fail with [`Error::Cancelled`] if cancellation was requested
    pub fn checkpoint(&self) -> Result<()> {
        self.cancel.checkpoint()
    }
}

/// Get the number of threads a `Parallel` run will use
pub fn available_threads() -> usize {
    #[cfg(feature = "parallel")]
    {
        rayon::current_num_threads()
    }
    #[cfg(not(feature = "parallel"))]
    {
        1
    }
}
