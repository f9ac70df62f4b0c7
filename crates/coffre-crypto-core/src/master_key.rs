//! Master key generation and wrapping.
//!
//! This module provides:
//! - [`MasterKey::generate`]: random 256-bit master key, created once per user
//! - [`wrap`] / [`rewrap`]: seal the master key under a [`RootKey`]
//! - [`unwrap`]: recover the master key, failing closed
//!
//! # Key Hierarchy
//!
//! ```text
//! passphrase ──Argon2id──► RootKey ──wraps──► MasterKey ──encrypts──► credential fields
//! ```
//!
//! Changing the passphrase only re-wraps the master key; credential fields
//! are never re-encrypted.
//!
//! # Domain Separation
//!
//! The wrap AAD is `b"coffre-master-key-v1" || owner`, so a wrapped key
//! copied onto another user's record does not unwrap.

use std::fmt;

use crate::error::CryptoError;
use crate::kdf::RootKey;
use crate::memory::SecretBytes;
use crate::symmetric::{self, SealedData};
use serde::{Deserialize, Serialize};

/// Master key length in bytes (256 bits), equal to the root key length.
pub const MASTER_KEY_LEN: usize = 32;

/// AAD prefix for master-key wrapping.
const WRAP_AAD_PREFIX: &[u8] = b"coffre-master-key-v1";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Per-user random key that encrypts every credential field.
///
/// Exists in plaintext only in memory; zeroized on drop.
pub struct MasterKey(SecretBytes<MASTER_KEY_LEN>);

impl MasterKey {
    /// Generate a new master key from the OS CSPRNG.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::SecureMemory` if the CSPRNG fails.
    pub fn generate() -> Result<Self, CryptoError> {
        SecretBytes::random().map(Self)
    }

    /// Wrap existing key bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; MASTER_KEY_LEN]) -> Self {
        Self(SecretBytes::new(bytes))
    }

    /// Expose the raw key for an AEAD operation.
    #[must_use]
    pub fn expose(&self) -> &[u8; MASTER_KEY_LEN] {
        self.0.expose()
    }

    /// Constant-time key comparison.
    ///
    /// Accumulates the XOR of every byte pair so the running time does not
    /// depend on where the keys first differ.
    #[must_use]
    pub fn ct_eq(&self, other: &Self) -> bool {
        let diff = self
            .expose()
            .iter()
            .zip(other.expose().iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b));
        diff == 0
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(***)")
    }
}

/// A master key sealed under a root key.
#[must_use = "a wrapped key must be persisted or the master key is lost"]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedKey {
    /// AES-256-GCM output (nonce, ciphertext, tag).
    pub sealed: SealedData,
}

impl WrappedKey {
    /// The wrap nonce, persisted as `wrap_nonce`.
    #[must_use]
    pub const fn nonce(&self) -> &[u8; symmetric::NONCE_LEN] {
        &self.sealed.nonce
    }

    /// `ciphertext || tag`, persisted as `wrapped_key`.
    #[must_use]
    pub fn ciphertext_and_tag(&self) -> Vec<u8> {
        let mut out = self.sealed.ciphertext.clone();
        out.extend_from_slice(&self.sealed.tag);
        out
    }

    /// Rebuild from the persisted `wrapped_key` and `wrap_nonce` columns.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKeyMaterial` if the nonce is not 12 bytes
    /// or the ciphertext is shorter than a tag.
    pub fn from_parts(ciphertext_and_tag: &[u8], nonce: &[u8]) -> Result<Self, CryptoError> {
        let nonce: [u8; symmetric::NONCE_LEN] = nonce.try_into().map_err(|_| {
            CryptoError::InvalidKeyMaterial(format!(
                "wrap nonce must be {} bytes, got {}",
                symmetric::NONCE_LEN,
                nonce.len()
            ))
        })?;
        let ct_len = ciphertext_and_tag
            .len()
            .checked_sub(symmetric::TAG_LEN)
            .ok_or_else(|| {
                CryptoError::InvalidKeyMaterial("wrapped key shorter than tag".into())
            })?;
        let (ciphertext, tag_part) = ciphertext_and_tag.split_at(ct_len);
        let mut tag = [0u8; symmetric::TAG_LEN];
        tag.copy_from_slice(tag_part);
        Ok(Self {
            sealed: SealedData {
                nonce,
                ciphertext: ciphertext.to_vec(),
                tag,
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Wrap operations
// ---------------------------------------------------------------------------

fn wrap_aad(owner: &[u8]) -> Vec<u8> {
    let mut aad = Vec::with_capacity(WRAP_AAD_PREFIX.len().saturating_add(owner.len()));
    aad.extend_from_slice(WRAP_AAD_PREFIX);
    aad.extend_from_slice(owner);
    aad
}

/// Seal `master_key` under `root_key` with a fresh random nonce.
///
/// `owner` is the user identity the record belongs to; it is bound into the
/// associated data.
///
/// # Errors
///
/// Returns `CryptoError::Encryption` / `SecureMemory` if sealing fails.
pub fn wrap(
    master_key: &MasterKey,
    root_key: &RootKey,
    owner: &[u8],
) -> Result<WrappedKey, CryptoError> {
    let sealed = symmetric::seal(root_key.expose(), master_key.expose(), &wrap_aad(owner))?;
    Ok(WrappedKey { sealed })
}

/// Re-seal an unwrapped master key under a new root key (passphrase change).
///
/// Identical to [`wrap`]; exists so call sites read as what they do.
///
/// # Errors
///
/// Same as [`wrap`].
pub fn rewrap(
    master_key: &MasterKey,
    new_root_key: &RootKey,
    owner: &[u8],
) -> Result<WrappedKey, CryptoError> {
    wrap(master_key, new_root_key, owner)
}

/// Recover the master key from a [`WrappedKey`].
///
/// Fails closed: a wrong root key, a tampered record, a swapped owner and a
/// plaintext of the wrong length all return [`CryptoError::TamperDetected`]
/// with no further detail.
///
/// # Errors
///
/// Returns `CryptoError::TamperDetected` on any authentication failure.
pub fn unwrap(
    wrapped: &WrappedKey,
    root_key: &RootKey,
    owner: &[u8],
) -> Result<MasterKey, CryptoError> {
    let plaintext = symmetric::decrypt(root_key.expose(), &wrapped.sealed, &wrap_aad(owner))?;
    let key = SecretBytes::<MASTER_KEY_LEN>::from_slice(plaintext.expose())
        .map_err(|_| CryptoError::TamperDetected)?;
    Ok(MasterKey(key))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: &[u8] = b"user-1";

    fn root(byte: u8) -> RootKey {
        RootKey::from_bytes([byte; 32])
    }

    #[test]
    fn wrap_unwrap_roundtrip() {
        let mk = MasterKey::generate().expect("generate");
        let wrapped = wrap(&mk, &root(0xBB), OWNER).expect("wrap");
        let unwrapped = unwrap(&wrapped, &root(0xBB), OWNER).expect("unwrap");
        assert_eq!(unwrapped.expose(), mk.expose());
    }

    #[test]
    fn ct_eq_matches_byte_equality() {
        let a = MasterKey::from_bytes([0x3C; MASTER_KEY_LEN]);
        let same = MasterKey::from_bytes([0x3C; MASTER_KEY_LEN]);
        assert!(a.ct_eq(&same));

        for idx in [0, MASTER_KEY_LEN / 2, MASTER_KEY_LEN - 1] {
            let mut bytes = [0x3C; MASTER_KEY_LEN];
            bytes[idx] ^= 0x01;
            assert!(!a.ct_eq(&MasterKey::from_bytes(bytes)), "differs at {idx}");
        }
    }

    #[test]
    fn generated_keys_are_unique() {
        let a = MasterKey::generate().expect("generate");
        let b = MasterKey::generate().expect("generate");
        assert_ne!(a.expose(), b.expose());
    }

    #[test]
    fn unwrap_with_wrong_root_key_fails() {
        let mk = MasterKey::generate().expect("generate");
        let wrapped = wrap(&mk, &root(0xBB), OWNER).expect("wrap");
        assert!(matches!(
            unwrap(&wrapped, &root(0xCC), OWNER),
            Err(CryptoError::TamperDetected)
        ));
    }

    #[test]
    fn unwrap_for_other_owner_fails() {
        let mk = MasterKey::generate().expect("generate");
        let wrapped = wrap(&mk, &root(0xBB), OWNER).expect("wrap");
        assert!(matches!(
            unwrap(&wrapped, &root(0xBB), b"user-2"),
            Err(CryptoError::TamperDetected)
        ));
    }

    #[test]
    fn unwrap_with_tampered_ciphertext_fails() {
        let mk = MasterKey::generate().expect("generate");
        let mut wrapped = wrap(&mk, &root(0xBB), OWNER).expect("wrap");
        wrapped.sealed.ciphertext[3] ^= 0x10;
        assert!(matches!(
            unwrap(&wrapped, &root(0xBB), OWNER),
            Err(CryptoError::TamperDetected)
        ));
    }

    #[test]
    fn rewrap_changes_ciphertext_but_not_key() {
        let mk = MasterKey::from_bytes([0x42; 32]);
        let first = wrap(&mk, &root(0x01), OWNER).expect("wrap");
        let second = rewrap(&mk, &root(0x02), OWNER).expect("rewrap");
        assert_ne!(first, second);
        assert!(unwrap(&second, &root(0x01), OWNER).is_err());
        let recovered = unwrap(&second, &root(0x02), OWNER).expect("unwrap");
        assert_eq!(recovered.expose(), &[0x42; 32]);
    }

    #[test]
    fn many_rewrap_cycles_preserve_key_bit_for_bit() {
        let original = MasterKey::generate().expect("generate");
        let expected = *original.expose();
        let mut current = original;
        for i in 0..16u8 {
            let wrapped = rewrap(&current, &root(i), OWNER).expect("rewrap");
            current = unwrap(&wrapped, &root(i), OWNER).expect("unwrap");
        }
        assert_eq!(current.expose(), &expected);
    }

    #[test]
    fn parts_roundtrip() {
        let mk = MasterKey::generate().expect("generate");
        let wrapped = wrap(&mk, &root(0xBB), OWNER).expect("wrap");
        let rebuilt =
            WrappedKey::from_parts(&wrapped.ciphertext_and_tag(), wrapped.nonce()).expect("parts");
        assert_eq!(rebuilt, wrapped);
        assert_eq!(wrapped.ciphertext_and_tag().len(), MASTER_KEY_LEN + 16);
    }

    #[test]
    fn from_parts_rejects_bad_lengths() {
        assert!(WrappedKey::from_parts(&[0u8; 48], &[0u8; 11]).is_err());
        assert!(WrappedKey::from_parts(&[0u8; 15], &[0u8; 12]).is_err());
    }

    #[test]
    fn debug_is_masked() {
        let mk = MasterKey::from_bytes([0xAB; 32]);
        assert_eq!(format!("{mk:?}"), "MasterKey(***)");
    }
}
