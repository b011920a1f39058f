//! Full-duplex in-process stream built from two conduits.
//!
//! Each end reads from one conduit and writes to the other, so the two
//! directions have independent backpressure and can be half-closed
//! separately.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::conduit::Conduit;
use crate::config::ConduitConfig;
use crate::error::Result;

/// One end of a duplex pair.
///
/// Dropping an end disposes it: the peer drains what was already written
/// towards it, then reads end-of-data, and its writes fail with
/// [`ConduitError::Disposed`](crate::ConduitError::Disposed).
#[derive(Debug)]
pub struct DuplexStream {
    inbound: Conduit,
    outbound: Conduit,
}

/// Creates a connected pair with the default thresholds in both directions.
///
/// ```
/// use giztoy_conduit::duplex_pair;
///
/// # tokio_test::block_on(async {
/// let (client, server) = duplex_pair();
/// client.write(b"ping").await.unwrap();
///
/// let mut buf = [0u8; 4];
/// let n = server.read(&mut buf).await.unwrap();
/// assert_eq!(&buf[..n], b"ping");
/// # });
/// ```
pub fn duplex_pair() -> (DuplexStream, DuplexStream) {
    pair_of(ConduitConfig::default())
}

/// Creates a connected pair using `config` for both directions.
pub fn duplex_pair_with_config(config: ConduitConfig) -> Result<(DuplexStream, DuplexStream)> {
    config.validate()?;
    Ok(pair_of(config))
}

fn pair_of(config: ConduitConfig) -> (DuplexStream, DuplexStream) {
    let a_to_b = Conduit::from_valid(config);
    let b_to_a = Conduit::from_valid(config);
    let a = DuplexStream {
        inbound: b_to_a.clone(),
        outbound: a_to_b.clone(),
    };
    let b = DuplexStream {
        inbound: a_to_b,
        outbound: b_to_a,
    };
    (a, b)
}

impl DuplexStream {
    /// Returns the conduit this end reads from.
    pub fn inbound(&self) -> &Conduit {
        &self.inbound
    }

    /// Returns the conduit this end writes to.
    pub fn outbound(&self) -> &Conduit {
        &self.outbound
    }

    /// Reads from the peer. See [`Conduit::read`].
    pub async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        self.inbound.read(buf).await
    }

    /// Reads from the peer, aborting if `cancel` fires while suspended.
    pub async fn read_with_cancel(&self, buf: &mut [u8], cancel: &CancellationToken) -> Result<usize> {
        self.inbound.read_with_cancel(buf, cancel).await
    }

    /// Writes to the peer. See [`Conduit::write`].
    pub async fn write(&self, data: &[u8]) -> Result<()> {
        self.outbound.write(data).await
    }

    /// Writes to the peer, aborting if `cancel` fires while suspended.
    pub async fn write_with_cancel(&self, data: &[u8], cancel: &CancellationToken) -> Result<()> {
        self.outbound.write_with_cancel(data, cancel).await
    }

    /// Flushes the outbound direction.
    pub async fn flush(&self) -> Result<()> {
        self.outbound.flush().await
    }

    /// Half-closes: the peer reads end-of-data once it has drained.
    pub fn complete_writing(&self) -> Result<()> {
        self.outbound.complete_writing()
    }

    /// Disposes the inbound direction and completes the outbound one.
    pub fn dispose(&self) {
        self.inbound.dispose();
        // The peer may already have disposed our outbound direction.
        if let Err(err) = self.outbound.complete_writing() {
            trace!("duplex: outbound already closed: {}", err);
        }
    }
}

impl Drop for DuplexStream {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl AsyncRead for DuplexStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inbound).poll_read(cx, buf)
    }
}

impl AsyncWrite for DuplexStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().outbound).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().outbound).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().outbound).poll_shutdown(cx)
    }
}
