#![forbid(unsafe_code)]

//! Byte pumps between secure channels and plaintext streams.

use std::io;

use miniss_stream::SecureSocket;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

/// Send every byte received on `sock` straight back until the peer closes.
pub async fn echo<T>(sock: SecureSocket<T>) -> io::Result<u64>
where
    T: AsyncRead + AsyncWrite,
{
    let (mut rd, mut wr) = sock.into_split();
    let total = tokio::io::copy(&mut rd, &mut wr).await?;
    wr.shutdown().await?;
    debug!(total, "echo peer closed");
    Ok(total)
}

/// Forward a plaintext stream through a secure channel in both directions.
///
/// Returns `(plaintext -> secure, secure -> plaintext)` byte counts. Each
/// side is shut down once the other reaches EOF.
pub async fn forward<P, T>(mut plain: P, mut sock: SecureSocket<T>) -> io::Result<(u64, u64)>
where
    P: AsyncRead + AsyncWrite + Unpin,
    T: AsyncRead + AsyncWrite,
{
    tokio::io::copy_bidirectional(&mut plain, &mut sock).await
}
