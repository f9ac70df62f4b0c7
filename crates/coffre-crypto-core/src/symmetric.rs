//! AES-256-GCM authenticated encryption.
//!
//! This module provides:
//! - [`encrypt`]: seal plaintext under a caller-supplied [`Nonce`]
//! - [`seal`]: seal plaintext under a fresh random nonce (the normal path)
//! - [`decrypt`]: authenticate and open [`SealedData`], returning [`SecretBuffer`]
//! - [`SealedData`]: nonce + ciphertext + tag container (serializable)
//!
//! The engine is stateless. Nonce uniqueness per key is the caller's
//! contract when using [`encrypt`] directly; every call site in this
//! workspace goes through [`seal`], which draws 96 bits from `OsRng` per
//! message. Associated data is authenticated but not encrypted and must be
//! supplied identically on decryption.

use crate::error::CryptoError;
use crate::memory::SecretBuffer;
use rand::rngs::OsRng;
use rand::RngCore;
use ring::aead;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// AES-256-GCM nonce length in bytes (96 bits).
pub const NONCE_LEN: usize = 12;

/// AES-256-GCM authentication tag length in bytes (128 bits).
pub const TAG_LEN: usize = 16;

/// AES-256-GCM key length in bytes (256 bits).
pub const KEY_LEN: usize = 32;

/// Minimum valid serialized length: nonce + empty ciphertext + tag.
pub const MIN_SEALED_LEN: usize = NONCE_LEN + TAG_LEN;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A 96-bit AES-GCM nonce.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nonce([u8; NONCE_LEN]);

impl Nonce {
    /// Draw a fresh nonce from the OS CSPRNG.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::SecureMemory` if the CSPRNG fails.
    pub fn random() -> Result<Self, CryptoError> {
        let mut bytes = [0u8; NONCE_LEN];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| CryptoError::SecureMemory(format!("CSPRNG fill failed: {e}")))?;
        Ok(Self(bytes))
    }

    /// Use known nonce bytes (known-answer tests, stored records).
    #[must_use]
    pub const fn from_bytes(bytes: [u8; NONCE_LEN]) -> Self {
        Self(bytes)
    }

    /// The raw nonce bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; NONCE_LEN] {
        &self.0
    }
}

/// Authenticated ciphertext container: nonce + ciphertext + tag.
///
/// Wire format: `nonce (12 bytes) || ciphertext (variable) || tag (16 bytes)`.
///
/// Any modification to the nonce, ciphertext or tag makes [`decrypt`] fail
/// with [`CryptoError::TamperDetected`].
#[must_use = "encrypted data must be stored or transmitted"]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedData {
    /// 96-bit nonce, unique per encryption under a given key.
    pub nonce: [u8; NONCE_LEN],
    /// Encrypted data (same length as the original plaintext).
    pub ciphertext: Vec<u8>,
    /// 128-bit authentication tag.
    pub tag: [u8; TAG_LEN],
}

impl SealedData {
    /// Serialize to wire format: `nonce || ciphertext || tag`.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let capacity = NONCE_LEN
            .saturating_add(self.ciphertext.len())
            .saturating_add(TAG_LEN);
        let mut out = Vec::with_capacity(capacity);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out.extend_from_slice(&self.tag);
        out
    }

    /// Deserialize from wire format: `nonce || ciphertext || tag`.
    ///
    /// Only the layout is checked here; authenticity is checked by [`decrypt`].
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Encryption` if the input is shorter than 28 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() < MIN_SEALED_LEN {
            return Err(CryptoError::Encryption(format!(
                "sealed data too short: {} bytes (minimum {MIN_SEALED_LEN})",
                bytes.len()
            )));
        }

        let (nonce_part, rest) = bytes.split_at(NONCE_LEN);
        let ct_len = rest
            .len()
            .checked_sub(TAG_LEN)
            .ok_or_else(|| CryptoError::Encryption("sealed data length underflow".into()))?;
        let (ct_part, tag_part) = rest.split_at(ct_len);

        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(nonce_part);
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(tag_part);

        Ok(Self {
            nonce,
            ciphertext: ct_part.to_vec(),
            tag,
        })
    }
}

// ---------------------------------------------------------------------------
// Core encryption
// ---------------------------------------------------------------------------

fn aead_key(key: &[u8]) -> Result<aead::LessSafeKey, CryptoError> {
    if key.len() != KEY_LEN {
        return Err(CryptoError::InvalidKeyMaterial(format!(
            "invalid key length: {} bytes (expected {KEY_LEN})",
            key.len()
        )));
    }
    let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, key)
        .map_err(|_| CryptoError::Encryption("failed to create AES-256-GCM key".into()))?;
    Ok(aead::LessSafeKey::new(unbound))
}

/// Encrypt `plaintext` under `key` with an explicit nonce.
///
/// Reusing a nonce under the same key breaks both confidentiality and
/// integrity. Prefer [`seal`].
///
/// # Errors
///
/// Returns `CryptoError::InvalidKeyMaterial` if the key is not 32 bytes.
/// Returns `CryptoError::Encryption` if the AEAD operation fails.
pub fn encrypt(
    key: &[u8],
    nonce: &Nonce,
    plaintext: &[u8],
    aad: &[u8],
) -> Result<SealedData, CryptoError> {
    let less_safe_key = aead_key(key)?;

    let mut in_out = plaintext.to_vec();
    let Ok(tag) = less_safe_key.seal_in_place_separate_tag(
        aead::Nonce::assume_unique_for_key(nonce.0),
        aead::Aad::from(aad),
        &mut in_out,
    ) else {
        in_out.zeroize();
        return Err(CryptoError::Encryption(
            "AES-256-GCM encryption failed".into(),
        ));
    };

    let mut tag_bytes = [0u8; TAG_LEN];
    tag_bytes.copy_from_slice(tag.as_ref());

    Ok(SealedData {
        nonce: nonce.0,
        ciphertext: in_out,
        tag: tag_bytes,
    })
}

/// Encrypt `plaintext` under `key` with a freshly generated random nonce.
///
/// # Errors
///
/// Same as [`encrypt`], plus `CryptoError::SecureMemory` on CSPRNG failure.
pub fn seal(key: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<SealedData, CryptoError> {
    let nonce = Nonce::random()?;
    encrypt(key, &nonce, plaintext, aad)
}

/// Authenticate and decrypt [`SealedData`].
///
/// The plaintext is returned in a [`SecretBuffer`]; the working buffer is
/// zeroized before returning.
///
/// # Errors
///
/// Returns `CryptoError::InvalidKeyMaterial` if the key is not 32 bytes.
/// Returns `CryptoError::TamperDetected` if authentication fails (tampered
/// data, wrong key, or wrong associated data).
pub fn decrypt(key: &[u8], sealed: &SealedData, aad: &[u8]) -> Result<SecretBuffer, CryptoError> {
    let less_safe_key = aead_key(key)?;

    let mut ct_tag = Vec::with_capacity(sealed.ciphertext.len().saturating_add(TAG_LEN));
    ct_tag.extend_from_slice(&sealed.ciphertext);
    ct_tag.extend_from_slice(&sealed.tag);

    let result = match less_safe_key.open_in_place(
        aead::Nonce::assume_unique_for_key(sealed.nonce),
        aead::Aad::from(aad),
        &mut ct_tag,
    ) {
        Ok(plaintext) => SecretBuffer::new(plaintext),
        Err(_) => Err(CryptoError::TamperDetected),
    };
    ct_tag.zeroize();
    result
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
