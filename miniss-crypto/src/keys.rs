#![forbid(unsafe_code)]

//! X25519 key pairs.
//!
//! A [`StaticKeyPair`] identifies a party across sessions and is always owned
//! by the caller. An [`EphemeralKeyPair`] lives for exactly one handshake and
//! is consumed by [`crate::schedule::derive_keys`].

use std::fmt;

use rand_core::OsRng;
use x25519_dalek::{PublicKey, ReusableSecret, SharedSecret, StaticSecret};
use zeroize::Zeroizing;

/// Length of an encoded X25519 public key.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Length of an encoded X25519 secret scalar.
pub const SECRET_KEY_LEN: usize = 32;

/// Long-term X25519 key pair.
#[derive(Clone)]
pub struct StaticKeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl StaticKeyPair {
    /// Generate a fresh key pair from the OS RNG.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        Self::from_secret(secret)
    }

    /// Rebuild a key pair from its raw secret scalar.
    pub fn from_secret_bytes(bytes: [u8; SECRET_KEY_LEN]) -> Self {
        Self::from_secret(StaticSecret::from(bytes))
    }

    fn from_secret(secret: StaticSecret) -> Self {
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn public(&self) -> PublicKey {
        self.public
    }

    /// Raw secret scalar, for persisting through [`crate::keystore`].
    pub fn secret_bytes(&self) -> Zeroizing<[u8; SECRET_KEY_LEN]> {
        Zeroizing::new(self.secret.to_bytes())
    }

    pub(crate) fn diffie_hellman(&self, remote: &PublicKey) -> SharedSecret {
        self.secret.diffie_hellman(remote)
    }
}

impl fmt::Debug for StaticKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticKeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

/// Single-use X25519 key pair generated per handshake.
///
/// The secret takes part in two DH operations during the key schedule, so it
/// is a [`ReusableSecret`]; it is never exposed and is zeroized when the pair
/// is dropped.
pub struct EphemeralKeyPair {
    secret: ReusableSecret,
    public: PublicKey,
}

impl EphemeralKeyPair {
    pub fn generate() -> Self {
        let secret = ReusableSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn public(&self) -> PublicKey {
        self.public
    }

    pub(crate) fn diffie_hellman(&self, remote: &PublicKey) -> SharedSecret {
        self.secret.diffie_hellman(remote)
    }
}

impl fmt::Debug for EphemeralKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EphemeralKeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_pair_survives_secret_round_trip() {
        let pair = StaticKeyPair::generate();
        let restored = StaticKeyPair::from_secret_bytes(*pair.secret_bytes());
        assert_eq!(pair.public(), restored.public());
    }

    #[test]
    fn ephemeral_pairs_are_fresh() {
        let a = EphemeralKeyPair::generate();
        let b = EphemeralKeyPair::generate();
        assert_ne!(a.public(), b.public());
    }

    #[test]
    fn debug_does_not_print_secret() {
        let pair = StaticKeyPair::generate();
        let rendered = format!("{:?}", pair);
        assert!(rendered.contains("public"));
        assert!(!rendered.contains("secret"));
    }
}
