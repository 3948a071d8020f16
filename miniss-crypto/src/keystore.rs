#![forbid(unsafe_code)]

//! age-encrypted keystore for static key pairs.
//!
//! The long-term X25519 secret of a node is persisted in the armored [age]
//! format, encrypted with a passphrase supplied by the caller at runtime.
//! Plaintext key bytes only ever live in [`Zeroizing`] buffers.
//!
//! * [`encrypt_and_store()`] – writes an age-encrypted secret to a path.
//! * [`load_and_decrypt()`] – decrypts a file and returns the raw secret.
//! * [`load_static_key()`] / [`load_or_generate()`] – the same, typed as a
//!   [`StaticKeyPair`].
//!
//! ### Example
//! ```rust,no_run
//! use miniss_crypto::keystore::{load_or_generate, load_static_key};
//!
//! let created = load_or_generate("./node.key.age", "correct horse battery staple").unwrap();
//! let loaded = load_static_key("./node.key.age", "correct horse battery staple").unwrap();
//! assert_eq!(created.public(), loaded.public());
//! ```

use std::fs;
use std::io::{BufReader, Read, Write};
use std::iter;
use std::path::Path;

use age::armor::{ArmoredReader, ArmoredWriter, Format};
use age::secrecy::SecretString;
use thiserror::Error;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::keys::{StaticKeyPair, SECRET_KEY_LEN};

/// Error type for keystore operations.
#[derive(Debug, Error)]
pub enum KeystoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("age encryption error: {0}")]
    Encrypt(#[from] age::EncryptError),
    #[error("decryption failed (incorrect passphrase or corrupt file): {0}")]
    Decrypt(#[from] age::DecryptError),
    #[error("stored secret has length {0}, expected {SECRET_KEY_LEN}")]
    InvalidKeyLength(usize),
}

/// Encrypt `secret` with `passphrase` and write it to `path` in armored age format.
pub fn encrypt_and_store<P: AsRef<Path>>(secret: &[u8], path: P, passphrase: &str) -> Result<(), KeystoreError> {
    if let Some(parent) = path.as_ref().parent() {
        fs::create_dir_all(parent)?;
    }

    // Writer → armor → file.
    let file = fs::File::create(&path)?;
    let armor = ArmoredWriter::wrap_output(file, Format::AsciiArmor)?;
    let encryptor = age::Encryptor::with_user_passphrase(SecretString::from(passphrase.to_owned()));
    let mut writer = encryptor.wrap_output(armor)?;
    writer.write_all(secret)?;
    writer.finish().and_then(|armor| armor.finish())?;
    debug!(path = %path.as_ref().display(), "stored encrypted secret");
    Ok(())
}

/// Load the age-encrypted file at `path` and decrypt it with `passphrase`.
pub fn load_and_decrypt<P: AsRef<Path>>(path: P, passphrase: &str) -> Result<Zeroizing<Vec<u8>>, KeystoreError> {
    let file = fs::File::open(&path)?;
    let decryptor = age::Decryptor::new(ArmoredReader::new(BufReader::new(file)))?;
    let identity = age::scrypt::Identity::new(SecretString::from(passphrase.to_owned()));
    let mut reader = decryptor.decrypt(iter::once(&identity as &dyn age::Identity))?;

    let mut buf = Zeroizing::new(Vec::new());
    reader.read_to_end(&mut buf)?;
    Ok(buf)
}

/// Persist the secret half of `pair`.
pub fn store_static_key<P: AsRef<Path>>(pair: &StaticKeyPair, path: P, passphrase: &str) -> Result<(), KeystoreError> {
    let secret = pair.secret_bytes();
    encrypt_and_store(&secret[..], path, passphrase)
}

/// Load a static key pair previously written by [`store_static_key`].
pub fn load_static_key<P: AsRef<Path>>(path: P, passphrase: &str) -> Result<StaticKeyPair, KeystoreError> {
    let raw = load_and_decrypt(path, passphrase)?;
    let bytes: Zeroizing<[u8; SECRET_KEY_LEN]> = Zeroizing::new(
        raw.as_slice()
            .try_into()
            .map_err(|_| KeystoreError::InvalidKeyLength(raw.len()))?,
    );
    Ok(StaticKeyPair::from_secret_bytes(*bytes))
}

/// Load the static key at `path`, generating and storing a new one if the file does not exist.
pub fn load_or_generate<P: AsRef<Path>>(path: P, passphrase: &str) -> Result<StaticKeyPair, KeystoreError> {
    let p = path.as_ref();
    if p.exists() {
        return load_static_key(p, passphrase);
    }
    let pair = StaticKeyPair::generate();
    store_static_key(&pair, p, passphrase)?;
    info!(path = %p.display(), "generated new static key");
    Ok(pair)
}
