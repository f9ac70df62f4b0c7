//! Cryptographic error types for `coffre-crypto-core`.

use thiserror::Error;

/// Errors produced by cryptographic operations.
///
/// Failures that could reveal *why* an authenticated decryption failed are
/// collapsed into [`CryptoError::TamperDetected`]: a wrong key, a flipped
/// bit, a truncated tag and mismatched associated data are indistinguishable.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Malformed derivation or encryption configuration (zero iterations,
    /// short salt, memory cost below the Argon2 floor). A programmer error.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// AES-256-GCM sealing failed.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Authentication tag verification failed: ciphertext, nonce, tag or
    /// associated data altered, or the wrong key was supplied.
    #[error("decryption failed: authentication tag mismatch")]
    TamperDetected,

    /// Key material of the wrong length or shape.
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// Secure memory allocation or CSPRNG failure.
    #[error("secure memory error: {0}")]
    SecureMemory(String),
}
