//! A multi-threaded task pool whose workers each run a cooperative,
//! single-threaded scheduler over the work they're handed.
//!
//! A fixed set of OS threads ("workers") share a monitor-protected pool of
//! queues: one shared queue serviced by any idle worker, and one private
//! queue per worker for targeted submission (fan-out, handle-returning
//! calls). Submitted work is type-erased into a heap-allocation-free inline
//! capsule and run as an async task ("fiber") on the worker's own
//! [`LocalExecutor`](crate::executor::LocalExecutor).
//!
//! ```
//! use fiber_pool::TaskPool;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let pool = TaskPool::new();
//! let counter = Arc::new(AtomicUsize::new(0));
//! let c = counter.clone();
//! pool.run(move |_: ()| { c.fetch_add(1, Ordering::SeqCst); }, ());
//! pool.terminate();
//! ```

mod capsule;
mod error;
mod event;
mod executor;
mod handle;
mod isolation;
mod pool;
mod queue;
mod settings;
mod stream;
mod worker;

pub use error::TaskPoolBuildError;
pub use handle::{TaskHandle, current_task_handle};
pub use isolation::Isolate;
pub use pool::{TaskPool, TaskPoolBuilder};
pub use settings::Settings;
pub use stream::{
    BidirectionalStream, ClosableRandomAccessStream, ConnectionStream, InputStream, OutputStream,
    PipeError, PipeMode, RandomAccessStream, TruncatableStream, null_sink, pipe,
};

/// Blocks the current thread until `future` completes.
///
/// A thin re-export of [`futures_lite::future::block_on`]; provided so
/// callers implementing their own `run_h`-style rendezvous don't need a
/// direct dependency on `futures-lite` themselves.
pub fn block_on<T>(future: impl std::future::Future<Output = T>) -> T {
    futures_lite::future::block_on(future)
}
