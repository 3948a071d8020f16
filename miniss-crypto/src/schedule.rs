#![forbid(unsafe_code)]

//! Triple-ECDH key schedule.
//!
//! Both parties combine three X25519 results:
//!
//! * `DH(e_low, e_high)`: ephemeral × ephemeral,
//! * `DH(s_low, e_high)`: static of the low party × ephemeral of the high party,
//! * `DH(e_low, s_high)`: ephemeral of the low party × static of the high party,
//!
//! where *low* is the party whose ephemeral public key compares lesser under
//! [`ct_compare`]. The concatenation is expanded into two keys labelled
//! `miniss-s1` and `miniss-s2`. The low party receives with the first and
//! transmits with the second, the high party does the opposite, so the two
//! ends never seal under the same key.

use std::cmp::Ordering;

use tracing::debug;
use x25519_dalek::PublicKey;
use zeroize::Zeroizing;

use crate::aead::{RecordOpener, RecordSealer};
use crate::ct::ct_compare;
use crate::kdf::{derive_key, KdfLabel, SymmetricKey};
use crate::keys::{EphemeralKeyPair, StaticKeyPair};

/// Length of the concatenated triple-ECDH output.
pub const SHARED_SECRET_LEN: usize = 3 * 32;

/// Position of the local party in the ephemeral-key ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Local ephemeral key compares lesser than the remote one.
    Low,
    /// Local ephemeral key compares greater than or equal to the remote one.
    High,
}

impl Role {
    /// Decide the local role from both ephemeral public keys.
    pub fn assign(local_ephemeral: &PublicKey, remote_ephemeral: &PublicKey) -> Self {
        match ct_compare(local_ephemeral.as_bytes(), remote_ephemeral.as_bytes()) {
            Ordering::Less => Role::Low,
            Ordering::Equal | Ordering::Greater => Role::High,
        }
    }
}

/// Receive and transmit ciphers produced by the key schedule.
#[derive(Debug)]
pub struct DirectionalCiphers {
    pub opener: RecordOpener,
    pub sealer: RecordSealer,
}

/// Directional keys before they are bound to ciphers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectionalKeys {
    pub rx: SymmetricKey,
    pub tx: SymmetricKey,
}

impl DirectionalKeys {
    pub fn into_ciphers(self) -> DirectionalCiphers {
        DirectionalCiphers {
            opener: RecordOpener::new(&self.rx),
            sealer: RecordSealer::new(&self.tx),
        }
    }
}

/// Combine all key crossings into the shared secret.
pub fn triple_ecdh(
    role: Role,
    local_static: &StaticKeyPair,
    remote_static: &PublicKey,
    local_ephemeral: &EphemeralKeyPair,
    remote_ephemeral: &PublicKey,
) -> Zeroizing<[u8; SHARED_SECRET_LEN]> {
    let ee = local_ephemeral.diffie_hellman(remote_ephemeral);
    let (se, es) = match role {
        Role::Low => (
            local_static.diffie_hellman(remote_ephemeral),
            local_ephemeral.diffie_hellman(remote_static),
        ),
        Role::High => (
            local_ephemeral.diffie_hellman(remote_static),
            local_static.diffie_hellman(remote_ephemeral),
        ),
    };

    let mut out = Zeroizing::new([0u8; SHARED_SECRET_LEN]);
    out[..32].copy_from_slice(ee.as_bytes());
    out[32..64].copy_from_slice(se.as_bytes());
    out[64..].copy_from_slice(es.as_bytes());
    out
}

/// Run the key schedule and return the keys without binding them to ciphers.
pub fn derive_directional_keys(
    local_static: &StaticKeyPair,
    remote_static: &PublicKey,
    local_ephemeral: &EphemeralKeyPair,
    remote_ephemeral: &PublicKey,
) -> DirectionalKeys {
    let role = Role::assign(&local_ephemeral.public(), remote_ephemeral);
    let shared = triple_ecdh(role, local_static, remote_static, local_ephemeral, remote_ephemeral);
    let s1 = derive_key(&shared[..], KdfLabel::First);
    let s2 = derive_key(&shared[..], KdfLabel::Second);
    debug!(?role, "derived directional keys");
    match role {
        Role::Low => DirectionalKeys { rx: s1, tx: s2 },
        Role::High => DirectionalKeys { rx: s2, tx: s1 },
    }
}

/// Derive the receive and transmit ciphers for one channel.
///
/// Consumes the ephemeral key pair; its secret is zeroized on return.
pub fn derive_keys(
    local_static: &StaticKeyPair,
    remote_static: &PublicKey,
    local_ephemeral: EphemeralKeyPair,
    remote_ephemeral: &PublicKey,
) -> DirectionalCiphers {
    derive_directional_keys(local_static, remote_static, &local_ephemeral, remote_ephemeral)
        .into_ciphers()
}
