//! Weak isolation: the compile-time bound every submission API enforces on
//! its callable and argument types.

// -----------------------------------------------------------------------------
// Isolate

/// Marks a value as safe to transfer across a worker-thread boundary without
/// further synchronization.
///
/// This is a named stand-in for `Send + 'static` rather than a new ability:
/// every `T: Send + 'static` is `Isolate` via the blanket impl below. Giving
/// the bound its own name lets submission APIs and diagnostics speak in terms
/// of the pool's isolation requirement instead of a bare trait bound that
/// reads the same whether it is incidental or load-bearing.
pub trait Isolate: Send + 'static {}

impl<T: Send + 'static> Isolate for T {}

#[cfg(test)]
mod tests {
    use super::Isolate;

    fn assert_isolate<T: Isolate>() {}

    #[test]
    fn primitives_are_isolate() {
        assert_isolate::<u64>();
        assert_isolate::<String>();
        assert_isolate::<Vec<u8>>();
    }

    #[test]
    fn arc_of_isolate_is_isolate() {
        assert_isolate::<std::sync::Arc<u64>>();
    }
}
