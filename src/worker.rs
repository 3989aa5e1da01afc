use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread::{JoinHandle, ThreadId};

use crate::capsule::TaskFuncInfo;
use crate::event::SharedEvent;
use crate::executor::LocalExecutor;
use crate::handle;
use crate::pool::PoolState;
use crate::queue::TaskQueue;

// -----------------------------------------------------------------------------
// WorkerRecord

/// The pool's view of one worker thread, held inside the pool's monitor.
///
/// Installed as a placeholder (empty private queue, no join handle) before
/// its thread is spawned, then completed via [`install`](Self::install) once
/// the thread exists. The drain loop only needs `private_queue` to exist
/// at `workers[index]`, which the placeholder already provides, so there is
/// no race between thread startup and slot installation.
pub(crate) struct WorkerRecord {
    pub(crate) private_queue: TaskQueue,
    join: Option<JoinHandle<()>>,
    thread_id: Option<ThreadId>,
}

impl WorkerRecord {
    pub(crate) fn placeholder() -> Self {
        Self {
            private_queue: TaskQueue::new(),
            join: None,
            thread_id: None,
        }
    }

    pub(crate) fn install(&mut self, join: JoinHandle<()>, thread_id: ThreadId) {
        self.join = Some(join);
        self.thread_id = Some(thread_id);
    }

    /// Joins the underlying thread, unless it is the current thread (a
    /// worker calling `terminate` on its own pool from inside a task, which
    /// would otherwise deadlock).
    pub(crate) fn join_if_not_self(self) {
        let Some(join) = self.join else { return };
        if self.thread_id == Some(std::thread::current().id()) {
            return;
        }
        if join.join().is_err() {
            log::warn!("worker thread panicked while being joined during terminate");
        }
    }
}

type ThreadHook = Arc<dyn Fn(usize) + Send + Sync>;

/// Spawns one worker thread running the drain loop for slot `index`.
pub(crate) fn spawn(
    index: usize,
    thread_name: String,
    stack_size: Option<usize>,
    pool_state: Arc<Mutex<PoolState>>,
    event: Arc<SharedEvent>,
    on_thread_spawn: Option<ThreadHook>,
    on_thread_destroy: Option<ThreadHook>,
) -> io::Result<(ThreadId, JoinHandle<()>)> {
    let mut builder = std::thread::Builder::new();
    if thread_name.contains('\0') {
        log::warn!("worker {index} requested thread name {thread_name:?} contains a NUL byte; spawning unnamed");
    } else {
        builder = builder.name(thread_name);
    }
    if let Some(size) = stack_size {
        builder = builder.stack_size(size);
    }

    let join = builder.spawn(move || {
        log::debug!("worker {index} starting");
        if let Some(hook) = &on_thread_spawn {
            hook(index);
        }
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let executor = LocalExecutor::new();
            futures_lite::future::block_on(
                executor.run(drain_loop(index, &pool_state, &event, &executor)),
            );
        }));
        if let Err(payload) = result {
            log::error!(
                "worker {index} drain loop panicked: {}; aborting process",
                panic_message(&payload)
            );
            std::process::abort();
        }
        if let Some(hook) = &on_thread_destroy {
            hook(index);
        }
        log::debug!("worker {index} exiting");
    })?;

    let thread_id = join.thread().id();
    Ok((thread_id, join))
}

/// The drain loop: repeatedly takes one capsule (private queue preferred
/// over shared), spawns it as a fiber, and sleeps on the shared event when
/// both queues are empty.
///
/// Runs as the `stop_signal` future of `executor.run`, so it is scheduled on
/// equal terms with the fibers it spawns rather than monopolizing the
/// thread outside the cooperative scheduler.
async fn drain_loop(
    index: usize,
    pool_state: &Arc<Mutex<PoolState>>,
    event: &SharedEvent,
    executor: &LocalExecutor<'_>,
) {
    let mut last_seen = event.emit_count();
    loop {
        let next = {
            let mut state = pool_state.lock().unwrap_or_else(|e| e.into_inner());
            if state.terminating {
                return;
            }
            let worker = state.workers[index]
                .as_mut()
                .expect("worker accessing its own slot after it was taken by terminate");
            worker
                .private_queue
                .consume()
                .or_else(|| state.shared_queue.consume())
        };

        match next {
            Some(tfi) => {
                executor.spawn(run_capsule(tfi)).detach();
            }
            None => {
                last_seen = event.wait(last_seen, index).await;
            }
        }
    }
}

/// Runs one capsule as a fiber body, confining any panic to this fiber.
async fn run_capsule(tfi: TaskFuncInfo) {
    let handle = handle::new_handle();
    handle::set_current(handle);
    let result = panic::catch_unwind(AssertUnwindSafe(|| tfi.invoke()));
    if let Err(payload) = result {
        log::warn!("task panicked: {}", panic_message(&payload));
    }
    handle::clear_current();
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
