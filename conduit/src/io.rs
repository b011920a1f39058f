//! Stream adapters for [`Conduit`].
//!
//! - Blocking variants (`read_blocking`, `write_blocking`, `flush_blocking`)
//!   that wait for the async operation on the calling thread
//! - `std::io::{Read, Write, Seek}` on top of the blocking variants
//! - `tokio::io::{AsyncRead, AsyncWrite}` on top of the poll-based core
//!
//! The blocking variants park the calling thread. Do not call them from
//! inside an async task that the other side of the conduit depends on.

use std::io::{self, SeekFrom};
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use futures::executor::block_on;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::conduit::Conduit;
use crate::error::{ConduitError, Result};

impl Conduit {
    /// Blocking variant of [`read`](Conduit::read).
    pub fn read_blocking(&self, buf: &mut [u8]) -> Result<usize> {
        block_on(self.read(buf))
    }

    /// Blocking variant of [`write`](Conduit::write).
    pub fn write_blocking(&self, data: &[u8]) -> Result<()> {
        block_on(self.write(data))
    }

    /// Blocking variant of [`flush`](Conduit::flush).
    pub fn flush_blocking(&self) -> Result<()> {
        block_on(self.flush())
    }
}

// ============================================================================
// std::io
// ============================================================================

impl io::Read for &Conduit {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // std::io::Read allows empty buffers; they read nothing.
        if buf.is_empty() {
            if self.is_disposed() {
                return Err(ConduitError::Disposed.into());
            }
            return Ok(0);
        }
        Ok(self.read_blocking(buf)?)
    }
}

impl io::Write for &Conduit {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_blocking(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(self.flush_blocking()?)
    }
}

impl io::Seek for &Conduit {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(Conduit::seek(*self, pos)?)
    }
}

impl io::Read for Conduit {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(&mut &*self, buf)
    }
}

impl io::Write for Conduit {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::Write::write(&mut &*self, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        io::Write::flush(&mut &*self)
    }
}

impl io::Seek for Conduit {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        io::Seek::seek(&mut &*self, pos)
    }
}

// ============================================================================
// tokio::io
// ============================================================================

impl AsyncRead for Conduit {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }
        let n = ready!(self.poll_read_into(cx, buf.initialize_unfilled()))?;
        buf.advance(n);
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for Conduit {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.poll_write_from(cx, buf).map_err(Into::into)
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        if self.is_disposed() {
            return Poll::Ready(Err(ConduitError::Disposed.into()));
        }
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(self.complete_writing().map_err(Into::into))
    }
}
