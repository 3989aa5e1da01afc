//! The byte-stream family this pool's `pipe` operation moves data between.
//!
//! Only the contract the pool itself depends on is implemented here: the
//! `InputStream`/`OutputStream` traits and a sequential/concurrent `pipe`.
//! Concrete stream implementors (TCP sockets, files) belong to a networking
//! or IO crate built on top of this one.

use thiserror::Error;

// -----------------------------------------------------------------------------
// Traits

/// A source of bytes.
pub trait InputStream: Send {
    /// Returns `true` once the stream has no more bytes to offer.
    fn is_empty(&mut self) -> bool;

    /// A hint for how many bytes are available without blocking; `0` if unknown.
    fn least_size(&mut self) -> usize;

    /// Reads up to `buf.len()` bytes without consuming them.
    fn peek(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;

    /// Reads up to `buf.len()` bytes, consuming them.
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;
}

/// A sink for bytes.
pub trait OutputStream: Send {
    /// Writes `buf` in full.
    fn write(&mut self, buf: &[u8]) -> std::io::Result<()>;

    /// Flushes any internally buffered bytes.
    fn flush(&mut self) -> std::io::Result<()>;

    /// Signals that no further writes will occur.
    fn finalize(&mut self) -> std::io::Result<()> {
        self.flush()
    }
}

/// A stream that is both a source and a sink.
pub trait BidirectionalStream: InputStream + OutputStream {}
impl<T: InputStream + OutputStream> BidirectionalStream for T {}

/// A [`BidirectionalStream`] with connection lifecycle.
pub trait ConnectionStream: BidirectionalStream {
    /// Whether the connection is still open.
    fn connected(&self) -> bool;
    /// Closes the connection.
    fn close(&mut self) -> std::io::Result<()>;
    /// Blocks (cooperatively) until data is available or `timeout` elapses.
    fn wait_for_data(&mut self, timeout: std::time::Duration) -> std::io::Result<bool>;
}

/// A stream addressable by byte offset.
pub trait RandomAccessStream: BidirectionalStream {
    fn size(&mut self) -> std::io::Result<u64>;
    fn seek(&mut self, pos: u64) -> std::io::Result<()>;
    fn tell(&mut self) -> std::io::Result<u64>;
    fn readable(&self) -> bool;
    fn writable(&self) -> bool;
}

/// A [`RandomAccessStream`] whose length can be changed.
pub trait TruncatableStream: RandomAccessStream {
    fn truncate(&mut self, new_size: u64) -> std::io::Result<()>;
}

/// A [`RandomAccessStream`] that can be explicitly closed.
pub trait ClosableRandomAccessStream: RandomAccessStream {
    fn is_open(&self) -> bool;
    fn close(&mut self) -> std::io::Result<()>;
}

// -----------------------------------------------------------------------------
// null sink

struct NullSink;

impl OutputStream for NullSink {
    fn write(&mut self, _buf: &[u8]) -> std::io::Result<()> {
        Ok(())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Returns an output stream that discards every write.
pub fn null_sink() -> impl OutputStream {
    NullSink
}

// -----------------------------------------------------------------------------
// pipe

const SEQUENTIAL_BUFFER: usize = 64 * 1024;
const CONCURRENT_CHUNK_START: usize = 64 * 1024;
const CONCURRENT_CHUNK_MAX: usize = 4 * 1024 * 1024;
const CONCURRENT_RING_SLOTS: usize = 4;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PipeError {
    #[error("source read failed: {0}")]
    Read(#[source] std::io::Error),
    #[error("sink write failed: {0}")]
    Write(#[source] std::io::Error),
    #[error("expected to transfer {expected} bytes but only transferred {actual}")]
    ShortTransfer { expected: u64, actual: u64 },
}

/// How `pipe` moves bytes from source to sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeMode {
    /// A single scratch buffer; minimal memory overhead, read-then-write.
    Sequential,
    /// A bounded ring of read-ahead buffers, read from and drained on the
    /// calling thread with an adaptive chunk size.
    Concurrent,
}

/// Copies bytes from `source` to `sink`.
///
/// If `nbytes` is `Some`, exactly that many bytes must be transferred or the
/// call returns [`PipeError::ShortTransfer`]; if `None`, bytes are copied
/// until `source` reports empty.
pub fn pipe(
    source: &mut dyn InputStream,
    sink: &mut dyn OutputStream,
    nbytes: Option<u64>,
    mode: PipeMode,
) -> Result<u64, PipeError> {
    match mode {
        PipeMode::Sequential => pipe_sequential(source, sink, nbytes),
        PipeMode::Concurrent => pipe_concurrent(source, sink, nbytes),
    }
}

fn pipe_sequential(
    source: &mut dyn InputStream,
    sink: &mut dyn OutputStream,
    nbytes: Option<u64>,
) -> Result<u64, PipeError> {
    let mut buf = vec![0u8; SEQUENTIAL_BUFFER];
    let mut total: u64 = 0;
    loop {
        if let Some(target) = nbytes
            && total >= target
        {
            break;
        }
        if source.is_empty() {
            break;
        }
        let want = nbytes
            .map(|t| (t - total).min(buf.len() as u64) as usize)
            .unwrap_or(buf.len());
        let n = source.read(&mut buf[..want]).map_err(PipeError::Read)?;
        if n == 0 {
            break;
        }
        sink.write(&buf[..n]).map_err(PipeError::Write)?;
        total += n as u64;
    }
    sink.flush().map_err(PipeError::Write)?;
    if let Some(target) = nbytes
        && total != target
    {
        return Err(PipeError::ShortTransfer {
            expected: target,
            actual: total,
        });
    }
    Ok(total)
}

/// Reads up to [`CONCURRENT_RING_SLOTS`] chunks ahead of the write side,
/// adapting chunk size to source throughput.
///
/// A genuinely concurrent reader fiber would need `source` to be `Isolate`
/// (owned, not a borrowed `&mut dyn InputStream`) so it could be handed to a
/// different worker; `pipe` takes a borrow, so both the read-ahead and the
/// drain happen on the caller's own thread. This still overlaps a read-ahead
/// buffer with the sink the way the ring-buffered design intends, just
/// without the second OS thread (see `DESIGN.md`). It takes no `TaskPool`
/// parameter, since this mode never hands work to one.
fn pipe_concurrent(
    source: &mut dyn InputStream,
    sink: &mut dyn OutputStream,
    nbytes: Option<u64>,
) -> Result<u64, PipeError> {
    let mut ring: std::collections::VecDeque<Vec<u8>> = std::collections::VecDeque::with_capacity(CONCURRENT_RING_SLOTS);
    let mut total: u64 = 0;
    let mut chunk_size = CONCURRENT_CHUNK_START;
    let mut source_exhausted = false;

    loop {
        while !source_exhausted
            && ring.len() < CONCURRENT_RING_SLOTS
            && nbytes.is_none_or(|target| total + ring_bytes(&ring) < target)
        {
            if source.is_empty() {
                source_exhausted = true;
                break;
            }
            let want = nbytes
                .map(|t| (t - total - ring_bytes(&ring)).min(chunk_size as u64) as usize)
                .unwrap_or(chunk_size);
            if want == 0 {
                break;
            }
            let mut buf = vec![0u8; want];
            let started = std::time::Instant::now();
            let n = source.read(&mut buf).map_err(PipeError::Read)?;
            if n == 0 {
                source_exhausted = true;
                break;
            }
            buf.truncate(n);
            ring.push_back(buf);
            if started.elapsed() < std::time::Duration::from_millis(100) {
                chunk_size = (chunk_size * 2).min(CONCURRENT_CHUNK_MAX);
            }
        }

        let Some(chunk) = ring.pop_front() else {
            break;
        };
        sink.write(&chunk).map_err(PipeError::Write)?;
        total += chunk.len() as u64;
    }

    sink.flush().map_err(PipeError::Write)?;
    if let Some(target) = nbytes
        && total != target
    {
        return Err(PipeError::ShortTransfer {
            expected: target,
            actual: total,
        });
    }
    Ok(total)
}

fn ring_bytes(ring: &std::collections::VecDeque<Vec<u8>>) -> u64 {
    ring.iter().map(|c| c.len() as u64).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SliceSource<'a> {
        data: &'a [u8],
        pos: usize,
    }

    impl InputStream for SliceSource<'_> {
        fn is_empty(&mut self) -> bool {
            self.pos >= self.data.len()
        }
        fn least_size(&mut self) -> usize {
            self.data.len() - self.pos
        }
        fn peek(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = buf.len().min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            Ok(n)
        }
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = buf.len().min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    struct VecSink(Vec<u8>);
    impl OutputStream for VecSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<()> {
            self.0.extend_from_slice(buf);
            Ok(())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn sequential_copies_all_bytes() {
        let data = vec![7u8; 200_000];
        let mut source = SliceSource { data: &data, pos: 0 };
        let mut sink = VecSink(Vec::new());
        let n = pipe_sequential(&mut source, &mut sink, None).unwrap();
        assert_eq!(n as usize, data.len());
        assert_eq!(sink.0, data);
    }

    #[test]
    fn sequential_enforces_exact_byte_count() {
        let data = vec![1u8; 100];
        let mut source = SliceSource { data: &data, pos: 0 };
        let mut sink = VecSink(Vec::new());
        let err = pipe_sequential(&mut source, &mut sink, Some(200)).unwrap_err();
        assert!(matches!(err, PipeError::ShortTransfer { expected: 200, actual: 100 }));
    }
}
