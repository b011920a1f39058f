//! Bounded byte conduit implementation.

use std::fmt;
use std::future::Future;
use std::io::SeekFrom;
use std::sync::Arc;
use std::task::{Context, Poll, Waker, ready};

use bytes::{Buf, BytesMut};
use futures::future::poll_fn;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::config::ConduitConfig;
use crate::error::{ConduitError, Result};

/// A bounded, single-direction, in-process byte conduit.
///
/// Bytes written by one party become readable, in order, by another. The
/// conduit holds unread bytes in an owned growable buffer and applies
/// backpressure through two thresholds taken from [`ConduitConfig`].
///
/// # Semantics
///
/// - **Read**: Suspends when empty, returns up to `buf.len()` of the oldest
///   bytes when available, `Ok(0)` once writing is complete and drained
/// - **Write**: Appends immediately; a write issued while the conduit is
///   paused, or one that pushes the unread count past the pause threshold,
///   suspends until reads bring the unread count down to the resume
///   threshold
/// - **Complete**: `complete_writing()` lets the reader drain, then end-of-data
/// - **Dispose**: `dispose()` is terminal; suspended callers observe
///   [`ConduitError::Disposed`]
///
/// Exactly one reader and one writer may be active at a time. Handles are
/// `Clone` and share the same conduit, so each side can live on its own
/// task or thread.
///
/// # Example
///
/// ```
/// use giztoy_conduit::Conduit;
///
/// # tokio_test::block_on(async {
/// let conduit = Conduit::new();
/// conduit.write(b"hello").await.unwrap();
/// conduit.complete_writing().unwrap();
///
/// let mut buf = [0u8; 16];
/// let n = conduit.read(&mut buf).await.unwrap();
/// assert_eq!(&buf[..n], b"hello");
/// assert_eq!(conduit.read(&mut buf).await.unwrap(), 0);
/// # });
/// ```
pub struct Conduit {
    inner: Arc<ConduitInner>,
}

struct ConduitInner {
    config: ConduitConfig,
    state: Mutex<ConduitState>,
}

struct ConduitState {
    buf: BytesMut,
    paused: bool,
    writing_complete: bool,
    disposed: bool,
    read_waker: Option<Waker>,
    write_waker: Option<Waker>,
}

impl Clone for Conduit {
    fn clone(&self) -> Self {
        Conduit {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Default for Conduit {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Conduit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Conduit")
            .field("config", &self.inner.config)
            .field("unread", &state.buf.len())
            .field("paused", &state.paused)
            .field("writing_complete", &state.writing_complete)
            .field("disposed", &state.disposed)
            .finish()
    }
}

impl Conduit {
    /// Creates a conduit with the default 16 KiB resume / 32 KiB pause thresholds.
    pub fn new() -> Self {
        Self::from_valid(ConduitConfig::default())
    }

    /// Creates a conduit with explicit thresholds.
    ///
    /// Fails with [`ConduitError::InvalidArgument`] if
    /// `resume_threshold > pause_threshold`.
    pub fn with_thresholds(resume_threshold: usize, pause_threshold: usize) -> Result<Self> {
        Self::with_config(ConduitConfig::new(resume_threshold, pause_threshold))
    }

    /// Creates a conduit from a config, validating it first.
    pub fn with_config(config: ConduitConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_valid(config))
    }

    pub(crate) fn from_valid(config: ConduitConfig) -> Self {
        Conduit {
            inner: Arc::new(ConduitInner {
                config,
                state: Mutex::new(ConduitState {
                    buf: BytesMut::new(),
                    paused: false,
                    writing_complete: false,
                    disposed: false,
                    read_waker: None,
                    write_waker: None,
                }),
            }),
        }
    }

    /// Returns the flow-control thresholds.
    pub fn config(&self) -> ConduitConfig {
        self.inner.config
    }

    /// Returns the number of unread bytes.
    pub fn len(&self) -> usize {
        self.inner.state.lock().buf.len()
    }

    /// Returns true if no bytes are waiting to be read.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true once the writer has declared completion.
    pub fn is_writing_complete(&self) -> bool {
        self.inner.state.lock().writing_complete
    }

    /// Returns true once the conduit has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.state.lock().disposed
    }

    /// Returns true while the conduit is not disposed.
    ///
    /// A conduit whose writing is complete can still be read until drained.
    pub fn can_read(&self) -> bool {
        !self.is_disposed()
    }

    /// Returns true while the conduit is not disposed.
    pub fn can_write(&self) -> bool {
        !self.is_disposed()
    }

    /// Random access is never supported.
    pub fn can_seek(&self) -> bool {
        false
    }

    // ------------------------------------------------------------------------
    // Write side
    // ------------------------------------------------------------------------

    /// Writes `data` into the conduit.
    ///
    /// The bytes are appended before this future first yields. If the
    /// conduit was already paused when the write was issued, or the append
    /// leaves more than `pause_threshold` bytes unread, the future completes
    /// only after reads shrink the unread count to the resume threshold. A
    /// write landing exactly on the pause threshold completes. Empty input
    /// is a no-op.
    ///
    /// The caller must not issue overlapping writes.
    pub async fn write(&self, data: &[u8]) -> Result<()> {
        self.write_inner(data, None).await
    }

    /// Like [`write`](Self::write), but aborts with
    /// [`ConduitError::Cancelled`] if `cancel` fires while suspended.
    ///
    /// Bytes already appended stay in the conduit.
    pub async fn write_with_cancel(&self, data: &[u8], cancel: &CancellationToken) -> Result<()> {
        self.write_inner(data, Some(cancel)).await
    }

    async fn write_inner(&self, data: &[u8], cancel: Option<&CancellationToken>) -> Result<()> {
        if !self.append(data)? {
            return Ok(());
        }
        trace!("conduit: write of {} bytes held until resume", data.len());
        self.suspend(poll_fn(|cx| self.poll_resume(cx)), cancel, |state| &mut state.write_waker)
            .await
    }

    /// Declares that no further bytes will be written.
    ///
    /// Buffered bytes remain readable; a suspended reader is woken so it can
    /// observe end-of-data. Repeated calls have no additional effect.
    pub fn complete_writing(&self) -> Result<()> {
        let (reader, writer) = {
            let mut state = self.inner.state.lock();
            if state.disposed {
                return Err(ConduitError::Disposed);
            }
            if state.writing_complete {
                return Ok(());
            }
            state.writing_complete = true;
            debug!(
                "conduit: writing complete with {} bytes unread",
                state.buf.len()
            );
            // A writer waiting to append must observe WritingComplete.
            (state.read_waker.take(), state.write_waker.take())
        };
        if let Some(waker) = reader {
            waker.wake();
        }
        if let Some(waker) = writer {
            waker.wake();
        }
        Ok(())
    }

    /// Waits until every accepted write is visible to the reader.
    ///
    /// Appends happen under the state lock, so acquiring it is enough.
    pub async fn flush(&self) -> Result<()> {
        let state = self.inner.state.lock();
        if state.disposed {
            return Err(ConduitError::Disposed);
        }
        Ok(())
    }

    /// Appends `data`, returning true if the writer must then wait for the
    /// resume threshold.
    fn append(&self, data: &[u8]) -> Result<bool> {
        let (hold, waker) = {
            let mut state = self.inner.state.lock();
            if state.disposed {
                return Err(ConduitError::Disposed);
            }
            if data.is_empty() {
                return Ok(false);
            }
            if state.writing_complete {
                return Err(ConduitError::WritingComplete);
            }

            state.buf.extend_from_slice(data);

            // Landing exactly on the pause threshold completes; going past
            // it, or writing while already paused, holds the writer.
            let pause = self.inner.config.pause_threshold;
            let hold = state.paused || (pause > 0 && state.buf.len() > pause);
            if !state.paused && pause > 0 && state.buf.len() >= pause {
                state.paused = true;
                debug!(
                    "conduit: paused with {} bytes unread (pause threshold {})",
                    state.buf.len(),
                    pause
                );
            }
            trace!("conduit: appended {} bytes, {} unread", data.len(), state.buf.len());
            (hold, state.read_waker.take())
        };
        if let Some(waker) = waker {
            waker.wake();
        }
        Ok(hold)
    }

    /// Resolves once the conduit is no longer paused.
    pub(crate) fn poll_resume(&self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        let mut state = self.inner.state.lock();
        if state.disposed {
            return Poll::Ready(Err(ConduitError::Disposed));
        }
        if !state.paused {
            return Poll::Ready(Ok(()));
        }
        register(&mut state.write_waker, cx);
        Poll::Pending
    }

    /// Poll-based write that never appends while paused.
    ///
    /// Used by the `AsyncWrite` adapter, whose contract forbids returning
    /// `Pending` after consuming input.
    pub(crate) fn poll_write_from(&self, cx: &mut Context<'_>, data: &[u8]) -> Poll<Result<usize>> {
        if !data.is_empty() {
            {
                let state = self.inner.state.lock();
                if state.writing_complete && !state.disposed {
                    return Poll::Ready(Err(ConduitError::WritingComplete));
                }
            }
            ready!(self.poll_resume(cx))?;
        }
        Poll::Ready(self.append(data).map(|_| data.len()))
    }

    // ------------------------------------------------------------------------
    // Read side
    // ------------------------------------------------------------------------

    /// Reads up to `buf.len()` of the oldest unread bytes.
    ///
    /// Returns as soon as at least one byte is available. Suspends while the
    /// conduit is empty and writing is not complete. Returns `Ok(0)` for
    /// end-of-data. An empty `buf` fails with
    /// [`ConduitError::InvalidArgument`].
    pub async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        self.read_inner(buf, None).await
    }

    /// Like [`read`](Self::read), but aborts with
    /// [`ConduitError::Cancelled`] if `cancel` fires while suspended.
    pub async fn read_with_cancel(&self, buf: &mut [u8], cancel: &CancellationToken) -> Result<usize> {
        self.read_inner(buf, Some(cancel)).await
    }

    async fn read_inner(&self, buf: &mut [u8], cancel: Option<&CancellationToken>) -> Result<usize> {
        self.suspend(
            poll_fn(|cx| self.poll_read_into(cx, &mut *buf)),
            cancel,
            |state| &mut state.read_waker,
        )
        .await
    }

    pub(crate) fn poll_read_into(&self, cx: &mut Context<'_>, dst: &mut [u8]) -> Poll<Result<usize>> {
        let (n, waker) = {
            let mut state = self.inner.state.lock();
            if state.disposed {
                return Poll::Ready(Err(ConduitError::Disposed));
            }
            if dst.is_empty() {
                return Poll::Ready(Err(ConduitError::InvalidArgument(
                    "read buffer must not be empty".to_string(),
                )));
            }
            if state.buf.is_empty() {
                if state.writing_complete {
                    return Poll::Ready(Ok(0));
                }
                register(&mut state.read_waker, cx);
                return Poll::Pending;
            }

            let n = dst.len().min(state.buf.len());
            dst[..n].copy_from_slice(&state.buf[..n]);
            state.buf.advance(n);
            trace!("conduit: read {} bytes, {} unread", n, state.buf.len());

            let mut waker = None;
            if state.paused && state.buf.len() <= self.inner.config.resume_threshold {
                state.paused = false;
                debug!("conduit: resumed with {} bytes unread", state.buf.len());
                waker = state.write_waker.take();
            }
            (n, waker)
        };
        if let Some(waker) = waker {
            waker.wake();
        }
        Poll::Ready(Ok(n))
    }

    // ------------------------------------------------------------------------
    // Termination
    // ------------------------------------------------------------------------

    /// Disposes the conduit.
    ///
    /// Frees the buffer and wakes both sides; suspended and future calls
    /// fail with [`ConduitError::Disposed`]. Repeated calls have no
    /// additional effect.
    pub fn dispose(&self) {
        let (reader, writer) = {
            let mut state = self.inner.state.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.paused = false;
            let dropped = state.buf.len();
            state.buf = BytesMut::new();
            debug!("conduit: disposed, dropped {} unread bytes", dropped);
            (state.read_waker.take(), state.write_waker.take())
        };
        if let Some(waker) = reader {
            waker.wake();
        }
        if let Some(waker) = writer {
            waker.wake();
        }
    }

    // ------------------------------------------------------------------------
    // Random access (unsupported)
    // ------------------------------------------------------------------------

    /// Always fails: the conduit is stream-ordered.
    pub fn seek(&self, _pos: SeekFrom) -> Result<u64> {
        self.unsupported("seek")
    }

    /// Always fails: the conduit has no total length.
    pub fn stream_len(&self) -> Result<u64> {
        self.unsupported("length")
    }

    /// Always fails.
    pub fn set_len(&self, _len: u64) -> Result<()> {
        self.unsupported("set_len")
    }

    /// Always fails: the conduit has no position.
    pub fn position(&self) -> Result<u64> {
        self.unsupported("position")
    }

    /// Always fails.
    pub fn set_position(&self, _pos: u64) -> Result<()> {
        self.unsupported("set_position")
    }

    fn unsupported<T>(&self, what: &'static str) -> Result<T> {
        if self.is_disposed() {
            return Err(ConduitError::Disposed);
        }
        Err(ConduitError::Unsupported(what))
    }

    /// Drives `fut`, racing it against `cancel` when one is given.
    ///
    /// `fut` is polled first, so an operation that can complete without
    /// suspending is never reported as cancelled. On cancellation the
    /// waker left in `slot` is cleared.
    async fn suspend<T, F>(
        &self,
        fut: F,
        cancel: Option<&CancellationToken>,
        slot: fn(&mut ConduitState) -> &mut Option<Waker>,
    ) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match cancel {
            None => fut.await,
            Some(token) => tokio::select! {
                biased;
                res = fut => res,
                _ = token.cancelled() => {
                    slot(&mut self.inner.state.lock()).take();
                    debug!("conduit: suspended operation cancelled");
                    Err(ConduitError::Cancelled)
                }
            },
        }
    }
}

/// Stores the waker for a single-slot suspension point.
fn register(slot: &mut Option<Waker>, cx: &Context<'_>) {
    match slot {
        Some(waker) if waker.will_wake(cx.waker()) => {}
        _ => *slot = Some(cx.waker().clone()),
    }
}
