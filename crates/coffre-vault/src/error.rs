//! Error types for `coffre-vault`.
//!
//! [`StoreError`] is what a [`BlobStore`](crate::store::BlobStore) reports.
//! [`VaultError`] is the public taxonomy every session operation returns;
//! crypto and store failures are folded into it without leaking detail
//! that would let a caller tell a wrong passphrase from a corrupted record.

use coffre_crypto_core::CryptoError;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Store errors
// ---------------------------------------------------------------------------

/// Errors produced by a blob store.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// No row with this id exists in the table.
    #[error("row not found: {0}")]
    NotFound(String),

    /// The row exists but belongs to another user.
    #[error("row {0} is owned by another user")]
    Unauthorized(String),

    /// Stale version token on update, or a uniqueness constraint violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The backing store could not be reached or failed internally.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ref ffi_err, _) = err {
            if ffi_err.code == rusqlite::ffi::ErrorCode::ConstraintViolation {
                return Self::Conflict(err.to_string());
            }
        }
        Self::Unavailable(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Vault errors
// ---------------------------------------------------------------------------

/// Errors produced by vault session operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Malformed caller input: bad KDF parameters, short salt, empty name.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// Wrong passphrase or corrupted master key record.
    ///
    /// The two cases are indistinguishable to the caller.
    #[error("authentication failed")]
    AuthenticationFailure,

    /// A credential field failed authenticated decryption.
    #[error("tamper detected")]
    TamperDetected,

    /// The operation requires an unlocked session.
    #[error("vault is locked")]
    VaultLocked,

    /// Stale version token: the record changed since it was read.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The blob store could not be reached.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// No such record for this user.
    #[error("not found: {0}")]
    NotFound(String),

    /// The record belongs to another user.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A stored row does not have the expected shape.
    #[error("malformed record: {0}")]
    Codec(String),

    /// Encryption or CSPRNG failure on the sealing path.
    #[error("crypto failure: {0}")]
    Crypto(String),

    /// An in-flight open or passphrase change was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// `initialize` called for a user that already has a master key record.
    #[error("vault already initialized for this user")]
    VaultAlreadyInitialized,

    /// `open` called for a user with no master key record.
    #[error("vault not initialized for this user")]
    VaultNotInitialized,

    /// `open` called on a session that is already unlocked.
    #[error("session is already unlocked")]
    AlreadyUnlocked,
}

impl From<CryptoError> for VaultError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::InvalidParameters(msg) | CryptoError::InvalidKeyMaterial(msg) => {
                Self::InvalidParameters(msg)
            }
            CryptoError::TamperDetected => Self::TamperDetected,
            CryptoError::Encryption(msg) | CryptoError::SecureMemory(msg) => Self::Crypto(msg),
        }
    }
}

impl From<StoreError> for VaultError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(id),
            StoreError::Unauthorized(id) => Self::Unauthorized(id),
            StoreError::Conflict(msg) => Self::Conflict(msg),
            StoreError::Unavailable(msg) => Self::StoreUnavailable(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crypto_tamper_maps_to_tamper() {
        let err: VaultError = CryptoError::TamperDetected.into();
        assert!(matches!(err, VaultError::TamperDetected));
    }

    #[test]
    fn crypto_bad_params_map_to_invalid_parameters() {
        let err: VaultError = CryptoError::InvalidParameters("salt too short".into()).into();
        assert!(matches!(err, VaultError::InvalidParameters(_)));
    }

    #[test]
    fn store_errors_map_one_to_one() {
        assert!(matches!(
            VaultError::from(StoreError::NotFound("a".into())),
            VaultError::NotFound(_)
        ));
        assert!(matches!(
            VaultError::from(StoreError::Unauthorized("a".into())),
            VaultError::Unauthorized(_)
        ));
        assert!(matches!(
            VaultError::from(StoreError::Conflict("a".into())),
            VaultError::Conflict(_)
        ));
        assert!(matches!(
            VaultError::from(StoreError::Unavailable("a".into())),
            VaultError::StoreUnavailable(_)
        ));
    }

    #[test]
    fn authentication_failure_message_has_no_detail() {
        assert_eq!(
            VaultError::AuthenticationFailure.to_string(),
            "authentication failed"
        );
    }
}
