#![expect(unsafe_code, reason = "type erasure requires raw pointer casts over inline storage")]

use std::mem::MaybeUninit;

use crate::isolation::Isolate;
use crate::settings::Settings;

// -----------------------------------------------------------------------------
// Inline storage

/// Inline buffer capacity for an erased `(callable, args)` pair, in bytes.
///
/// Large enough for a closure capturing a handful of words (an `Arc`, a
/// couple of integers, a small struct) without spilling to the heap. A
/// payload that doesn't fit is rejected at compile time rather than silently
/// boxed, so callers notice the cost of a large capture at the call site.
const INLINE_SIZE: usize = 48;
const INLINE_ALIGN: usize = 8;

#[repr(align(8))]
struct Storage([u8; INLINE_SIZE]);

// -----------------------------------------------------------------------------
// TaskFuncInfo

/// A type-erased, heap-allocation-free record of one invocation: a callable
/// plus its argument, stored inline and consumed exactly once.
pub(crate) struct TaskFuncInfo {
    /// The monomorphized trampoline, or `None` once consumed by `invoke`.
    invoke: Option<unsafe fn(*mut Storage)>,
    /// The monomorphized in-place destructor, used only if `invoke` is still
    /// `Some` when this capsule is dropped (i.e. it was never run).
    drop_fn: unsafe fn(*mut Storage),
    storage: MaybeUninit<Storage>,
    pub(crate) settings: Settings,
}

impl TaskFuncInfo {
    /// Builds a capsule that, on [`invoke`](Self::invoke), calls `callable(args)`.
    ///
    /// Fails to compile if `(F, Args)` does not fit `INLINE_SIZE` bytes at
    /// `INLINE_ALIGN`-byte alignment.
    pub(crate) fn new<F, Args>(settings: Settings, callable: F, args: Args) -> Self
    where
        F: FnOnce(Args) + Isolate,
        Args: Isolate,
    {
        const {
            assert!(
                size_of::<(F, Args)>() <= INLINE_SIZE,
                "capsule payload exceeds inline capacity; shrink the capture or box it",
            );
            assert!(
                align_of::<(F, Args)>() <= INLINE_ALIGN,
                "capsule payload is over-aligned for inline capacity",
            );
        }

        let mut storage = MaybeUninit::<Storage>::uninit();
        // SAFETY: `(F, Args)` was just asserted to fit within `Storage`'s size
        // and alignment; the pointer is valid and appropriately aligned.
        unsafe {
            storage
                .as_mut_ptr()
                .cast::<(F, Args)>()
                .write((callable, args));
        }

        Self {
            invoke: Some(invoke_trampoline::<F, Args>),
            drop_fn: drop_trampoline::<F, Args>,
            storage,
            settings,
        }
    }

    /// Runs the stored invocation.
    ///
    /// # Panics
    ///
    /// Panics if called more than once on the same capsule.
    pub(crate) fn invoke(mut self) {
        let invoke_fn = self
            .invoke
            .take()
            .expect("TaskFuncInfo invoked more than once");
        let storage_ptr = self.storage.as_mut_ptr();
        // SAFETY: `invoke_fn` is the trampoline written in `new` for the
        // payload that was placed into `storage`; this is the first and only
        // call, since `invoke` is now `None`.
        unsafe { invoke_fn(storage_ptr) };
    }
}

impl Drop for TaskFuncInfo {
    fn drop(&mut self) {
        if self.invoke.is_some() {
            let storage_ptr = self.storage.as_mut_ptr();
            // SAFETY: invocation never happened, so the payload written in
            // `new` is still live in `storage` and must be dropped in place.
            unsafe { (self.drop_fn)(storage_ptr) };
        }
    }
}

unsafe fn invoke_trampoline<F, Args>(ptr: *mut Storage)
where
    F: FnOnce(Args),
{
    // SAFETY: caller (`TaskFuncInfo::invoke`) guarantees `ptr` holds a valid,
    // not-yet-read `(F, Args)` written by `new::<F, Args>`.
    let (callable, args) = unsafe { ptr.cast::<(F, Args)>().read() };
    callable(args);
}

unsafe fn drop_trampoline<F, Args>(ptr: *mut Storage) {
    // SAFETY: caller (`TaskFuncInfo::drop`) guarantees `ptr` holds a valid,
    // never-read `(F, Args)` written by `new::<F, Args>`.
    unsafe { ptr.cast::<(F, Args)>().drop_in_place() };
}
