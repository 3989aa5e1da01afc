//! Per-task scheduling hints attached to a submitted capsule.

// -----------------------------------------------------------------------------
// Settings

/// Hints attached to a single submission.
///
/// None of these are enforced by the pool itself today; `scheduling_group`
/// is carried through so callers building a layer on top (e.g. metrics
/// bucketing) have somewhere to stash a tag without widening every submission
/// signature.
#[derive(Debug, Clone, Copy)]
pub struct Settings {
    /// Advisory stack size hint in bytes for the fiber this capsule spawns.
    /// Fibers in this pool are plain async tasks with no dedicated stack, so
    /// this field is currently inert; kept for source compatibility with
    /// callers migrating from a stackful-fiber pool.
    pub stack_size_hint: usize,
    /// Advisory scheduling priority. Higher runs sooner only in the sense
    /// that a future extension could reorder a queue by it; the pool itself
    /// is strict FIFO per queue today.
    pub priority: i32,
    /// An opaque tag a caller can use to group related submissions.
    pub scheduling_group: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            stack_size_hint: 0,
            priority: 0,
            scheduling_group: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Settings;

    #[test]
    fn default_is_zeroed() {
        let s = Settings::default();
        assert_eq!(s.stack_size_hint, 0);
        assert_eq!(s.priority, 0);
        assert_eq!(s.scheduling_group, 0);
    }
}
