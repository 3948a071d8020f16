#![forbid(unsafe_code)]

//! Labelled key derivation.
//!
//! Keys are expanded with HKDF-SHA256 over an empty salt. The label is the
//! HKDF `info`, so the same input keying material expands into independent
//! keys for every distinct label.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of every derived symmetric key.
pub const KEY_LEN: usize = 32;

/// Domain-separation labels for key derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KdfLabel {
    /// First directional key (`miniss-s1`).
    First,
    /// Second directional key (`miniss-s2`).
    Second,
    /// Custom static label supplied by the caller.
    Custom(&'static str),
}

impl KdfLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            KdfLabel::First => "miniss-s1",
            KdfLabel::Second => "miniss-s2",
            KdfLabel::Custom(s) => s,
        }
    }
}

/// 32-byte symmetric key that zeroizes on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_LEN]);

impl SymmetricKey {
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        Self(key)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl PartialEq for SymmetricKey {
    fn eq(&self, other: &Self) -> bool {
        use subtle::ConstantTimeEq;
        self.0[..].ct_eq(&other.0[..]).into()
    }
}

impl Eq for SymmetricKey {}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

/// Derive a [`SymmetricKey`] from `ikm` under `label`.
pub fn derive_key(ikm: &[u8], label: KdfLabel) -> SymmetricKey {
    let hk = Hkdf::<Sha256>::new(None, ikm);
    let mut okm = [0u8; KEY_LEN];
    // 32 bytes is far below the 255 * HashLen HKDF limit.
    hk.expand(label.as_str().as_bytes(), &mut okm)
        .expect("HKDF expand of a 32-byte key");
    let key = SymmetricKey(okm);
    okm.zeroize();
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_separate_keys() {
        let ikm = [9u8; 96];
        let k1 = derive_key(&ikm, KdfLabel::First);
        let k2 = derive_key(&ikm, KdfLabel::Second);
        assert_ne!(k1, k2);
        assert_eq!(k1, derive_key(&ikm, KdfLabel::First));
    }

    #[test]
    fn label_strings() {
        assert_eq!(KdfLabel::First.as_str(), "miniss-s1");
        assert_eq!(KdfLabel::Second.as_str(), "miniss-s2");
        assert_eq!(KdfLabel::Custom("x").as_str(), "x");
    }

    #[test]
    fn matches_hkdf_sha256_with_empty_salt() {
        let ikm = [3u8; 96];
        let mut expected = [0u8; KEY_LEN];
        Hkdf::<Sha256>::new(Some(&[]), &ikm)
            .expand(b"miniss-s2", &mut expected)
            .unwrap();
        assert_eq!(derive_key(&ikm, KdfLabel::Second).as_bytes(), &expected);
    }

    #[test]
    fn rfc5869_case_3_expands_under_custom_label() {
        // RFC 5869 test case 3: zero-length salt and info, 42-byte OKM; the
        // first 32 bytes are what a `Custom("")` label yields.
        let ikm = [0x0b; 22];
        let okm = hex_literal::hex!(
            "8da4e775a563c18f715f802a063c5a31b8a11f5c5ee1879ec3454e5f3c738d2d"
        );
        assert_eq!(derive_key(&ikm, KdfLabel::Custom("")).as_bytes(), &okm);
    }

    #[test]
    fn debug_hides_key() {
        let key = SymmetricKey::new([0xAA; KEY_LEN]);
        assert_eq!(format!("{:?}", key), "SymmetricKey(..)");
    }
}
