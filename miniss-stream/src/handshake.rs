#![forbid(unsafe_code)]

//! MiniSS handshake.
//!
//! Both parties send their [`Hello`] and read the peer's at the same time,
//! so the exchange cannot deadlock on a transport with small buffers. The
//! received hello is checked, the key schedule runs, and the resulting
//! [`SecureSocket`] must pass its liveness check before it is returned.
//!
//! A failed handshake is final for that transport; nothing is retried.

use std::io;
use std::time::Duration;

use miniss_crypto::{derive_keys, EphemeralKeyPair, StaticKeyPair};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::errors::{ChannelError, ChannelResult, Field};
use crate::frame::read_full;
use crate::hello::{Hello, HELLO_LEN};
use crate::socket::{ChannelState, SecureSocket};

/// Optional limits applied around [`handshake`].
#[derive(Debug, Clone, Default)]
pub struct HandshakeConfig {
    /// Upper bound on the whole handshake, liveness check included.
    pub timeout: Option<Duration>,
}

impl HandshakeConfig {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout: Some(timeout) }
    }
}

/// Upgrade `transport` to a secure channel using the long-term key `local_static`.
///
/// The peer's long-term public key is available from
/// [`SecureSocket::remote_pk`]; verifying it is up to the caller.
pub async fn handshake<T>(transport: T, local_static: StaticKeyPair) -> ChannelResult<SecureSocket<T>>
where
    T: AsyncRead + AsyncWrite,
{
    debug!(state = ?ChannelState::Handshaking, "starting handshake");
    let ephemeral = EphemeralKeyPair::generate();
    let outbound = Hello::new(local_static.public(), ephemeral.public()).encode();

    let (mut read_half, mut write_half) = tokio::io::split(transport);
    let send = async {
        write_half.write_all(&outbound).await?;
        write_half.flush().await
    };
    let recv = async {
        let mut inbound = [0u8; HELLO_LEN];
        read_full(&mut read_half, &mut inbound, Field::Hello).await?;
        Ok::<_, ChannelError>(inbound)
    };
    let (sent, received) = tokio::join!(send, recv);

    let remote = match Hello::decode(&received?) {
        Ok(hello) => hello,
        Err(err) => {
            warn!(error = %err, "rejecting peer hello");
            return Err(err);
        }
    };
    sent.map_err(ChannelError::transport)?;
    debug!("hello exchanged");

    let ciphers = derive_keys(&local_static, &remote.static_pk, ephemeral, &remote.ephemeral_pk);
    SecureSocket::establish(read_half, write_half, local_static, remote.static_pk, ciphers).await
}

/// [`handshake`] bounded by the limits in `config`.
///
/// Expiry of the timeout surfaces as a transport error of kind
/// [`io::ErrorKind::TimedOut`].
pub async fn handshake_with_config<T>(
    transport: T,
    local_static: StaticKeyPair,
    config: &HandshakeConfig,
) -> ChannelResult<SecureSocket<T>>
where
    T: AsyncRead + AsyncWrite,
{
    match config.timeout {
        Some(limit) => tokio::time::timeout(limit, handshake(transport, local_static))
            .await
            .map_err(|_| ChannelError::transport(io::Error::new(io::ErrorKind::TimedOut, "handshake timed out")))?,
        None => handshake(transport, local_static).await,
    }
}
