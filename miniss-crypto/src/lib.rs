#![forbid(unsafe_code)]

//! MiniSS cryptography engine.
//!
//! This crate provides:
//! 1. X25519 static/ephemeral key pairs (see [`keys`]).
//! 2. The triple-ECDH key schedule producing two directional record ciphers
//!    (see [`schedule`]).
//! 3. Counter-nonce ChaCha20-Poly1305 record sealing and opening (see [`aead`]).
//! 4. A constant-time three-way byte comparison (see [`ct`]).
//! 5. age-encrypted persistence for long-term secrets (see [`keystore`]).

pub mod aead;
pub mod ct;
pub mod kdf;
pub mod keys;
pub mod keystore;
pub mod schedule;

pub use aead::{AeadError, RecordOpener, RecordSealer};
pub use keys::{EphemeralKeyPair, StaticKeyPair, PUBLIC_KEY_LEN};
pub use schedule::{derive_keys, DirectionalCiphers, Role};
pub use x25519_dalek::PublicKey;
