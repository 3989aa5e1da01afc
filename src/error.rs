use thiserror::Error;

// -----------------------------------------------------------------------------
// Error

/// Failure building a [`TaskPool`](crate::TaskPool) via
/// [`TaskPoolBuilder::try_build`](crate::TaskPoolBuilder::try_build).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TaskPoolBuildError {
    /// The OS refused to spawn one of the pool's worker threads.
    #[error("failed to spawn worker thread {index}: {source}")]
    Spawn {
        /// Index of the worker that failed to start.
        index: usize,
        /// The underlying OS error.
        #[source]
        source: std::io::Error,
    },
}
