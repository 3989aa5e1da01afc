use std::sync::{Arc, Mutex};

use crate::capsule::TaskFuncInfo;
use crate::error::TaskPoolBuildError;
use crate::event::SharedEvent;
use crate::handle::{self, TaskHandle};
use crate::isolation::Isolate;
use crate::queue::TaskQueue;
use crate::settings::Settings;
use crate::worker::{self, WorkerRecord};

// -----------------------------------------------------------------------------
// PoolState

/// The pool's monitor-protected state: the shared queue, every worker's
/// slot, and the termination flag. A single [`Mutex`] guards all three so
/// that a worker's "is there work for me" check and a submitter's "which
/// queue do I put this in" decision never race each other.
pub(crate) struct PoolState {
    /// Fixed-size, index-stable slots: worker `i`'s drain loop always reads
    /// `workers[i]`. `terminate` takes a slot to `None` rather than removing
    /// it from the vector, so a still-running worker's own index is never
    /// invalidated by another worker having already been joined.
    pub(crate) workers: Vec<Option<WorkerRecord>>,
    pub(crate) shared_queue: TaskQueue,
    pub(crate) terminating: bool,
}

// -----------------------------------------------------------------------------
// TaskPoolBuilder

type ThreadHook = Arc<dyn Fn(usize) + Send + Sync>;

/// Builds a [`TaskPool`] with a chosen worker count and thread options.
pub struct TaskPoolBuilder {
    thread_count: usize,
    thread_name_prefix: String,
    stack_size: Option<usize>,
    on_thread_spawn: Option<ThreadHook>,
    on_thread_destroy: Option<ThreadHook>,
}

impl Default for TaskPoolBuilder {
    fn default() -> Self {
        Self {
            thread_count: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            thread_name_prefix: "pool".to_string(),
            stack_size: None,
            on_thread_spawn: None,
            on_thread_destroy: None,
        }
    }
}

impl TaskPoolBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of worker threads. `0` is permitted and yields an
    /// inert pool that runs no submissions.
    pub fn thread_count(mut self, n: usize) -> Self {
        self.thread_count = n;
        self
    }

    /// Sets the prefix used to name worker threads (`"<prefix>-<index>"`).
    pub fn thread_name(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Sets the OS stack size for each worker thread.
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Registers a callback run on a worker thread, before its drain loop
    /// starts. Called with the worker's index.
    pub fn on_thread_spawn(mut self, f: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.on_thread_spawn = Some(Arc::new(f));
        self
    }

    /// Registers a callback run on a worker thread, after its drain loop
    /// exits (not run if the drain loop itself panics and the process
    /// aborts). Called with the worker's index.
    pub fn on_thread_destroy(mut self, f: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.on_thread_destroy = Some(Arc::new(f));
        self
    }

    /// Builds the pool, returning an error if any worker thread fails to spawn.
    pub fn try_build(self) -> Result<TaskPool, TaskPoolBuildError> {
        let state = Arc::new(Mutex::new(PoolState {
            workers: Vec::with_capacity(self.thread_count),
            shared_queue: TaskQueue::new(),
            terminating: false,
        }));
        let event = Arc::new(SharedEvent::new(self.thread_count));

        {
            let mut guard = state.lock().unwrap_or_else(|e| e.into_inner());
            for _ in 0..self.thread_count {
                guard.workers.push(Some(WorkerRecord::placeholder()));
            }
        }

        for index in 0..self.thread_count {
            let name = format!("{}-{index}", self.thread_name_prefix);
            let (thread_id, join) = worker::spawn(
                index,
                name,
                self.stack_size,
                state.clone(),
                event.clone(),
                self.on_thread_spawn.clone(),
                self.on_thread_destroy.clone(),
            )
            .map_err(|source| TaskPoolBuildError::Spawn { index, source })?;

            let mut guard = state.lock().unwrap_or_else(|e| e.into_inner());
            guard.workers[index]
                .as_mut()
                .expect("slot installed as placeholder above")
                .install(join, thread_id);
        }

        Ok(TaskPool {
            state,
            event,
            thread_count: self.thread_count,
        })
    }

    /// Builds the pool.
    ///
    /// # Panics
    ///
    /// Panics if any worker thread fails to spawn. Use
    /// [`try_build`](Self::try_build) to handle that case.
    pub fn build(self) -> TaskPool {
        self.try_build().expect("failed to build TaskPool")
    }
}

// -----------------------------------------------------------------------------
// TaskPool

/// A fixed-size pool of worker threads, each running a cooperative
/// single-threaded scheduler over the work it is handed.
///
/// Submitted work is never required to itself be `Send` across *invocations*:
/// only the captured arguments and callable need to cross the thread
/// boundary once, at submission, so a task may use `!Send` types internally
/// once it is running.
pub struct TaskPool {
    state: Arc<Mutex<PoolState>>,
    event: Arc<SharedEvent>,
    thread_count: usize,
}

impl TaskPool {
    /// Creates a pool with a default worker count (the number of logical CPUs).
    pub fn new() -> Self {
        TaskPoolBuilder::new().build()
    }

    /// The number of worker threads this pool was built with.
    ///
    /// Stable across the pool's lifetime, including during and after
    /// [`terminate`](Self::terminate): callers reasoning about fan-out
    /// width don't have to account for workers that have already been
    /// joined and removed from the live set.
    pub fn thread_count(&self) -> usize {
        self.thread_count
    }

    /// Submits `callable(args)` onto the shared queue; any idle worker may
    /// run it.
    pub fn run<F, Args>(&self, callable: F, args: Args)
    where
        F: FnOnce(Args) + Isolate,
        Args: Isolate,
    {
        self.run_with_settings(Settings::default(), callable, args);
    }

    pub fn run_with_settings<F, Args>(&self, settings: Settings, callable: F, args: Args)
    where
        F: FnOnce(Args) + Isolate,
        Args: Isolate,
    {
        let tfi = TaskFuncInfo::new(settings, callable, args);
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.shared_queue.put(tfi);
        }
        self.event.emit_single();
    }

    /// Submits `callable(args)` onto the shared queue and returns the
    /// handle of the task once it has started running.
    ///
    /// Blocks the calling OS thread until the task reports its handle.
    /// Calling this from inside another task running on a worker stalls
    /// that worker's whole `LocalExecutor`, not just the calling fiber,
    /// until the new task starts; on a single-worker pool that new task can
    /// never start, so this self-deadlocks.
    pub fn run_h<F, Args>(&self, callable: F, args: Args) -> TaskHandle
    where
        F: FnOnce(Args) + Isolate,
        Args: Isolate,
    {
        self.run_h_with_settings(Settings::default(), callable, args)
    }

    pub fn run_h_with_settings<F, Args>(
        &self,
        settings: Settings,
        callable: F,
        args: Args,
    ) -> TaskHandle
    where
        F: FnOnce(Args) + Isolate,
        Args: Isolate,
    {
        let (tx, rx) = async_channel::bounded(1);
        self.run_with_settings(
            settings,
            move |args| {
                let h = handle::current_task_handle()
                    .expect("every capsule invocation has a current task handle");
                tx.try_send(h).expect("handle channel closed before send");
                callable(args);
            },
            args,
        );
        futures_lite::future::block_on(rx.recv()).expect("worker dropped handle sender")
    }

    /// Submits one clone of `(callable, args)` onto every worker's private
    /// queue. Runs exactly [`thread_count`](Self::thread_count) invocations.
    pub fn run_dist<F, Args>(&self, callable: F, args: Args)
    where
        F: Fn(Args) + Isolate + Clone,
        Args: Clone + Isolate,
    {
        self.run_dist_with_settings(Settings::default(), callable, args);
    }

    pub fn run_dist_with_settings<F, Args>(&self, settings: Settings, callable: F, args: Args)
    where
        F: Fn(Args) + Isolate + Clone,
        Args: Clone + Isolate,
    {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            for worker in state.workers.iter_mut().flatten() {
                let tfi = TaskFuncInfo::new(settings, callable.clone(), args.clone());
                worker.private_queue.put(tfi);
            }
        }
        self.event.emit();
    }

    /// As [`run_dist`](Self::run_dist), but invokes `on_handle` once per
    /// worker with that worker's task handle, once each has started.
    ///
    /// Blocks the calling OS thread until every worker reports its handle;
    /// the same self-deadlock risk documented on [`run_h`](Self::run_h)
    /// applies here, across all `thread_count()` workers.
    pub fn run_dist_h<F, Args>(
        &self,
        on_handle: impl FnMut(TaskHandle),
        callable: F,
        args: Args,
    ) where
        F: Fn(Args) + Isolate + Clone,
        Args: Clone + Isolate,
    {
        self.run_dist_h_with_settings(Settings::default(), on_handle, callable, args);
    }

    pub fn run_dist_h_with_settings<F, Args>(
        &self,
        settings: Settings,
        mut on_handle: impl FnMut(TaskHandle),
        callable: F,
        args: Args,
    ) where
        F: Fn(Args) + Isolate + Clone,
        Args: Clone + Isolate,
    {
        let (tx, rx) = async_channel::bounded(self.thread_count.max(1));
        self.run_dist_with_settings(
            settings,
            move |args| {
                let h = handle::current_task_handle()
                    .expect("every capsule invocation has a current task handle");
                tx.try_send(h).expect("handle channel closed before send");
                callable(args);
            },
            args,
        );
        for _ in 0..self.thread_count {
            let h = futures_lite::future::block_on(rx.recv()).expect("worker dropped handle sender");
            on_handle(h);
        }
    }

    /// Stops accepting the implicit assumption that workers run forever:
    /// signals every worker to stop once it next checks, then joins all of
    /// them. Logs a warning for any queue (private or shared) that still
    /// held capsules at the moment it stopped being serviced.
    pub fn terminate(self) {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.terminating = true;
        }
        self.event.emit();

        for index in 0..self.thread_count {
            let worker = {
                let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
                state.workers[index]
                    .take()
                    .expect("each slot is taken exactly once during terminate")
            };
            if !worker.private_queue.is_empty() {
                log::warn!(
                    "worker {index} terminated with {} capsule(s) still queued in its private queue",
                    worker.private_queue.len()
                );
            }
            worker.join_if_not_self();
        }

        let remaining = {
            let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.shared_queue.len()
        };
        if remaining > 0 {
            log::warn!("pool terminated with {remaining} capsule(s) still queued in the shared queue");
        }
    }
}

impl Default for TaskPool {
    fn default() -> Self {
        Self::new()
    }
}
