use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};

// -----------------------------------------------------------------------------
// TaskHandle

/// An opaque identity for a task running on the pool.
///
/// Minted by the task itself the moment it begins running (see
/// [`current_task_handle`]); there is no way to construct one ahead of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(u64);

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

pub(crate) fn new_handle() -> TaskHandle {
    TaskHandle(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
}

thread_local! {
    static CURRENT: Cell<Option<TaskHandle>> = const { Cell::new(None) };
}

/// Returns the handle of the task currently running on this worker thread,
/// or `None` if called outside of a task spawned by a [`TaskPool`](crate::TaskPool).
pub fn current_task_handle() -> Option<TaskHandle> {
    CURRENT.with(|c| c.get())
}

pub(crate) fn set_current(handle: TaskHandle) {
    CURRENT.with(|c| c.set(Some(handle)));
}

pub(crate) fn clear_current() {
    CURRENT.with(|c| c.set(None));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_unique() {
        let a = new_handle();
        let b = new_handle();
        assert_ne!(a, b);
    }

    #[test]
    fn current_is_none_until_set() {
        assert!(current_task_handle().is_none());
        let h = new_handle();
        set_current(h);
        assert_eq!(current_task_handle(), Some(h));
        clear_current();
        assert!(current_task_handle().is_none());
    }
}
