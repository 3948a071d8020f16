#![forbid(unsafe_code)]

//! Handshake hello message.
//!
//! ```text
//! | "MiniSS-1" (8) | static public key (32) | ephemeral public key (32) |
//! ```
//!
//! Sent in the clear by both parties at the same time.

use miniss_crypto::{PublicKey, PUBLIC_KEY_LEN};

use crate::errors::{ChannelError, ChannelResult};

pub const VERSION_TAG_LEN: usize = 8;

/// Protocol version tag opening every hello.
pub const VERSION_TAG: &[u8; VERSION_TAG_LEN] = b"MiniSS-1";

/// Total encoded hello length.
pub const HELLO_LEN: usize = VERSION_TAG_LEN + 2 * PUBLIC_KEY_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hello {
    pub static_pk: PublicKey,
    pub ephemeral_pk: PublicKey,
}

impl Hello {
    pub fn new(static_pk: PublicKey, ephemeral_pk: PublicKey) -> Self {
        Self { static_pk, ephemeral_pk }
    }

    pub fn encode(&self) -> [u8; HELLO_LEN] {
        let mut out = [0u8; HELLO_LEN];
        let (tag, keys) = out.split_at_mut(VERSION_TAG_LEN);
        tag.copy_from_slice(VERSION_TAG);
        keys[..PUBLIC_KEY_LEN].copy_from_slice(self.static_pk.as_bytes());
        keys[PUBLIC_KEY_LEN..].copy_from_slice(self.ephemeral_pk.as_bytes());
        out
    }

    /// Decode a received hello. The version tag is checked before any key field is read.
    pub fn decode(bytes: &[u8; HELLO_LEN]) -> ChannelResult<Self> {
        let (tag, keys) = bytes.split_at(VERSION_TAG_LEN);
        if tag != VERSION_TAG {
            return Err(ChannelError::ProtocolViolation(format!(
                "unexpected version tag {:?}",
                String::from_utf8_lossy(tag)
            )));
        }
        let mut static_pk = [0u8; PUBLIC_KEY_LEN];
        let mut ephemeral_pk = [0u8; PUBLIC_KEY_LEN];
        static_pk.copy_from_slice(&keys[..PUBLIC_KEY_LEN]);
        ephemeral_pk.copy_from_slice(&keys[PUBLIC_KEY_LEN..]);
        Ok(Self::new(PublicKey::from(static_pk), PublicKey::from(ephemeral_pk)))
    }
}
