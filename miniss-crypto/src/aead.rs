#![forbid(unsafe_code)]

//! Record-level AEAD (ChaCha20-Poly1305) with implicit counter nonces.
//!
//! Each direction of a channel owns one cipher and one 64-bit counter that
//! starts at zero and advances by exactly one per record. The protocol nonce
//! is the 8-byte big-endian counter; it occupies the low 8 bytes of the
//! 96-bit ChaCha20-Poly1305 nonce, the leading 4 bytes are zero. No
//! associated data is authenticated.
//!
//! Because nonces are never transmitted, a dropped, duplicated or reordered
//! record is opened under the wrong counter and fails authentication.
//!
//! ## Usage
//! ```rust
//! use miniss_crypto::aead::{RecordOpener, RecordSealer};
//! use miniss_crypto::kdf::SymmetricKey;
//! let key = SymmetricKey::new([7u8; 32]);
//! let mut tx = RecordSealer::new(&key);
//! let mut rx = RecordOpener::new(&key);
//! let sealed = tx.seal(b"hello").unwrap();
//! assert_eq!(rx.open(&sealed).unwrap(), b"hello");
//! ```

use chacha20poly1305::{aead::{Aead, KeyInit}, ChaCha20Poly1305, Key, Nonce};
use thiserror::Error;

use crate::kdf::SymmetricKey;

/// Poly1305 authentication tag length appended to every sealed record.
pub const TAG_LEN: usize = 16;

/// Length of the protocol nonce (big-endian counter).
pub const COUNTER_NONCE_LEN: usize = 8;

const AEAD_NONCE_LEN: usize = 12;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AeadError {
    #[error("authentication failed")]
    AuthenticationFailed,
    #[error("record counter exhausted")]
    CounterExhausted,
    #[error("record sealing failed")]
    SealFailed,
}

/// Expand a counter into the ChaCha20-Poly1305 nonce.
#[inline]
pub fn counter_nonce(counter: u64) -> [u8; AEAD_NONCE_LEN] {
    let mut nonce = [0u8; AEAD_NONCE_LEN];
    nonce[AEAD_NONCE_LEN - COUNTER_NONCE_LEN..].copy_from_slice(&counter.to_be_bytes());
    nonce
}

/// Monotonic per-direction counter. Never wraps.
#[derive(Debug, Default, Clone, Copy)]
struct Counter(u64);

impl Counter {
    /// Return the current value and advance.
    fn next(&mut self) -> Result<u64, AeadError> {
        let current = self.0;
        self.0 = current.checked_add(1).ok_or(AeadError::CounterExhausted)?;
        Ok(current)
    }
}

/// Transmit half: seals outbound records.
pub struct RecordSealer {
    cipher: ChaCha20Poly1305,
    counter: Counter,
}

impl RecordSealer {
    pub fn new(key: &SymmetricKey) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(key.as_bytes())),
            counter: Counter::default(),
        }
    }

    /// Counter value the next record will be sealed under.
    pub fn counter(&self) -> u64 {
        self.counter.0
    }

    /// Seal `plaintext`, returning `ciphertext || tag`.
    ///
    /// The counter advances before sealing and is never rolled back, even if
    /// the caller later fails to deliver the record.
    pub fn seal(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, AeadError> {
        let nonce = counter_nonce(self.counter.next()?);
        self.cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| AeadError::SealFailed)
    }
}

/// Receive half: opens inbound records in order.
pub struct RecordOpener {
    cipher: ChaCha20Poly1305,
    counter: Counter,
}

impl RecordOpener {
    pub fn new(key: &SymmetricKey) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(key.as_bytes())),
            counter: Counter::default(),
        }
    }

    /// Counter value the next record is expected under.
    pub fn counter(&self) -> u64 {
        self.counter.0
    }

    /// Open `ciphertext || tag` under the next receive counter.
    ///
    /// The counter is consumed whether or not authentication succeeds.
    pub fn open(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, AeadError> {
        let nonce = counter_nonce(self.counter.next()?);
        self.cipher
            .decrypt(Nonce::from_slice(&nonce), ciphertext)
            .map_err(|_| AeadError::AuthenticationFailed)
    }
}

impl std::fmt::Debug for RecordSealer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordSealer").field("counter", &self.counter.0).finish()
    }
}

impl std::fmt::Debug for RecordOpener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordOpener").field("counter", &self.counter.0).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(byte: u8) -> (RecordSealer, RecordOpener) {
        let key = SymmetricKey::new([byte; 32]);
        (RecordSealer::new(&key), RecordOpener::new(&key))
    }

    #[test]
    fn round_trip() {
        let (mut tx, mut rx) = pair(7);
        for i in 0..100u64 {
            assert_eq!(tx.counter(), i);
            let ct = tx.seal(b"hi").unwrap();
            assert_eq!(ct.len(), 2 + TAG_LEN);
            assert_eq!(rx.open(&ct).unwrap(), b"hi");
        }
        assert_eq!(rx.counter(), 100);
    }

    #[test]
    fn empty_plaintext_is_tag_only() {
        let (mut tx, mut rx) = pair(1);
        let ct = tx.seal(&[]).unwrap();
        assert_eq!(ct.len(), TAG_LEN);
        assert!(rx.open(&ct).unwrap().is_empty());
    }

    #[test]
    fn replay_is_rejected() {
        let (mut tx, mut rx) = pair(3);
        let first = tx.seal(b"once").unwrap();
        rx.open(&first).unwrap();
        assert_eq!(rx.open(&first).unwrap_err(), AeadError::AuthenticationFailed);
    }

    #[test]
    fn reordering_is_rejected() {
        let (mut tx, mut rx) = pair(4);
        let _skipped = tx.seal(b"0").unwrap();
        let second = tx.seal(b"1").unwrap();
        assert_eq!(rx.open(&second).unwrap_err(), AeadError::AuthenticationFailed);
    }

    #[test]
    fn tampering_is_rejected() {
        let (mut tx, mut rx) = pair(5);
        let mut ct = tx.seal(b"payload").unwrap();
        ct[0] ^= 0x01;
        assert_eq!(rx.open(&ct).unwrap_err(), AeadError::AuthenticationFailed);
    }

    #[test]
    fn wrong_key_is_rejected() {
        let (mut tx, _) = pair(1);
        let (_, mut rx) = pair(2);
        let ct = tx.seal(b"x").unwrap();
        assert_eq!(rx.open(&ct).unwrap_err(), AeadError::AuthenticationFailed);
    }

    #[test]
    fn nonce_layout() {
        let nonce = counter_nonce(0x0102_0304_0506_0708);
        assert_eq!(nonce, [0, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn counter_does_not_wrap() {
        let mut counter = Counter(u64::MAX - 1);
        assert_eq!(counter.next().unwrap(), u64::MAX - 1);
        assert_eq!(counter.next().unwrap_err(), AeadError::CounterExhausted);
    }
}
