//! How independent units of work are scheduled.
use anyhow::{Context, Result};
use rayon::prelude::*;

/// Processing mode for independent work units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingMode {
    /// Single-threaded processing
    Sequential,
    /// Parallel processing using all available cores
    #[default]
    Parallel,
    /// Parallel with the specified number of threads
    ParallelWith(usize),
}

impl ProcessingMode {
    /// Choose a mode from the `num_threads` setting: 0 = all cores, 1 = sequential
    pub fn from_num_threads(num_threads: usize) -> Self {
        match num_threads {
            0 => Self::Parallel,
            1 => Self::Sequential,
            n => Self::ParallelWith(n),
        }
    }

    /// Map a fallible function over indices and collect the results in index order.
    ///
    /// Stops at the first error (in parallel mode, other units may already have run).
    pub fn try_map<T, F>(&self, range: std::ops::Range<usize>, f: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> Result<T> + Sync + Send,
    {
        match self {
            Self::Sequential => range.map(f).collect(),
            Self::Parallel => range.into_par_iter().map(f).collect(),
            Self::ParallelWith(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(*threads)
                    .build()
                    .context("Failed to build thread pool")?;
                pool.install(|| range.into_par_iter().map(f).collect())
            }
        }
    }

    /// Map an infallible function over indices and collect the results in index order
    pub fn map<T, F>(&self, range: std::ops::Range<usize>, f: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        self.try_map(range, |i| Ok(f(i)))
    }
}
