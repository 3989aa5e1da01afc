use crate::capsule::TaskFuncInfo;

// -----------------------------------------------------------------------------
// TaskQueue

/// A FIFO of pending capsules, backed by a growable ring buffer.
///
/// Not internally synchronized: every `TaskQueue` in this crate (the pool's
/// shared queue and each worker's private queue) lives inside the pool's
/// single monitor, so callers already hold the lock before touching one.
pub(crate) struct TaskQueue {
    buf: Box<[Option<TaskFuncInfo>]>,
    head: usize,
    len: usize,
}

const INITIAL_CAPACITY: usize = 16;

impl TaskQueue {
    pub(crate) fn new() -> Self {
        Self::with_capacity(INITIAL_CAPACITY)
    }

    fn with_capacity(capacity: usize) -> Self {
        let mut buf = Vec::with_capacity(capacity);
        buf.resize_with(capacity, || None);
        Self {
            buf: buf.into_boxed_slice(),
            head: 0,
            len: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Appends one capsule, growing the backing buffer if full.
    pub(crate) fn put(&mut self, tfi: TaskFuncInfo) {
        if self.len == self.capacity() {
            self.grow();
        }
        let idx = (self.head + self.len) % self.capacity();
        self.buf[idx] = Some(tfi);
        self.len += 1;
    }

    /// Pops the front capsule, if any.
    pub(crate) fn consume(&mut self) -> Option<TaskFuncInfo> {
        if self.len == 0 {
            return None;
        }
        let idx = self.head;
        let tfi = self.buf[idx].take();
        self.head = (self.head + 1) % self.capacity();
        self.len -= 1;
        tfi
    }

    fn grow(&mut self) {
        let old_capacity = self.capacity();
        let new_capacity = (old_capacity * 3 / 2).max(INITIAL_CAPACITY);
        let mut new_buf = Vec::with_capacity(new_capacity);
        new_buf.resize_with(new_capacity, || None);
        for i in 0..self.len {
            let idx = (self.head + i) % old_capacity;
            new_buf[i] = self.buf[idx].take();
        }
        self.buf = new_buf.into_boxed_slice();
        self.head = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::TaskQueue;
    use crate::settings::Settings;
    use crate::capsule::TaskFuncInfo;

    fn capsule(order: std::sync::Arc<std::sync::Mutex<Vec<usize>>>, n: usize) -> TaskFuncInfo {
        TaskFuncInfo::new(
            Settings::default(),
            move |n: usize| order.lock().unwrap().push(n),
            n,
        )
    }

    #[test]
    fn fifo_order_preserved_across_growth() {
        let order = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut q = TaskQueue::new();
        for i in 0..40 {
            q.put(capsule(order.clone(), i));
        }
        assert_eq!(q.len(), 40);
        while let Some(tfi) = q.consume() {
            tfi.invoke();
        }
        assert!(q.is_empty());
        assert_eq!(*order.lock().unwrap(), (0..40).collect::<Vec<_>>());
    }

    #[test]
    fn empty_queue_consume_is_none() {
        let mut q = TaskQueue::new();
        assert!(q.consume().is_none());
    }
}
