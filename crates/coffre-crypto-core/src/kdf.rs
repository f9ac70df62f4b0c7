//! Argon2id passphrase → root key derivation.
//!
//! This module provides:
//! - [`derive`]: derive a 256-bit [`RootKey`] from a passphrase + salt
//! - [`generate_salt`]: 128-bit random salt, generated once per user
//! - [`Argon2idParams`]: serializable work factor (persisted next to the salt)
//! - [`KdfPreset`]: Interactive / Moderate / Sensitive selector
//!
//! Derivation is deterministic: the same passphrase, salt and parameters
//! always produce the same root key. A wrong passphrase is *not* an error
//! here: it yields a root key that fails to unwrap the master key later.

use crate::error::CryptoError;
use crate::memory::SecretBytes;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

/// Root key length in bytes (256 bits).
pub const ROOT_KEY_LEN: usize = 32;

/// Salt length in bytes for newly generated salts (128 bits).
pub const SALT_LEN: usize = 16;

/// Minimum accepted salt length. We enforce 16 (stricter than argon2's 8).
const MIN_SALT_LEN: usize = 16;

/// 64 MiB in KiB.
const MEMORY_64MB: u32 = 65_536;

/// 256 MiB in KiB.
const MEMORY_256MB: u32 = 262_144;

/// 512 MiB in KiB.
const MEMORY_512MB: u32 = 524_288;

/// 1 GiB in KiB.
const MEMORY_1GB: u32 = 1_048_576;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Argon2id parameter set: persisted with the master key record.
///
/// Fields use the `argon2` crate convention:
/// - `m_cost`: memory in KiB (NOT bytes, NOT MB)
/// - `t_cost`: number of iterations
/// - `p_cost`: degree of parallelism
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argon2idParams {
    /// Memory cost in kibibytes.
    pub m_cost: u32,
    /// Number of iterations (time cost).
    pub t_cost: u32,
    /// Degree of parallelism (number of lanes).
    pub p_cost: u32,
}

impl Argon2idParams {
    /// Largest accepted work factor: 1 GiB, 16 iterations, 16 lanes.
    ///
    /// Parameters are read back from storage the client does not trust, so
    /// anything above this is rejected before Argon2 allocates.
    pub const MAX: Self = Self {
        m_cost: MEMORY_1GB,
        t_cost: 16,
        p_cost: 16,
    };

    /// Check the parameters without running a derivation.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidParameters`] for zero iterations, zero
    /// lanes, any cost above [`Argon2idParams::MAX`], or any combination the
    /// `argon2` crate rejects.
    pub fn validate(&self) -> Result<(), CryptoError> {
        self.to_argon2().map(|_| ())
    }

    fn to_argon2(&self) -> Result<argon2::Params, CryptoError> {
        let max = Self::MAX;
        if self.m_cost > max.m_cost || self.t_cost > max.t_cost || self.p_cost > max.p_cost {
            return Err(CryptoError::InvalidParameters(format!(
                "argon2id params exceed ceiling (m_cost <= {}, t_cost <= {}, p_cost <= {})",
                max.m_cost, max.t_cost, max.p_cost
            )));
        }
        if self.t_cost == 0 {
            return Err(CryptoError::InvalidParameters(
                "argon2id t_cost must be at least 1".into(),
            ));
        }
        if self.p_cost == 0 {
            return Err(CryptoError::InvalidParameters(
                "argon2id p_cost must be at least 1".into(),
            ));
        }
        argon2::Params::new(self.m_cost, self.t_cost, self.p_cost, Some(ROOT_KEY_LEN))
            .map_err(|e| CryptoError::InvalidParameters(format!("invalid argon2 params: {e}")))
    }
}

impl Default for Argon2idParams {
    fn default() -> Self {
        KdfPreset::default().params()
    }
}

/// Work-factor preset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KdfPreset {
    /// Low-end devices (~0.3s on a laptop).
    Interactive,
    /// Daily default (~0.8s).
    #[default]
    Moderate,
    /// High-value vaults (~2s).
    Sensitive,
}

impl KdfPreset {
    /// Return the parameters for this preset.
    #[must_use]
    pub const fn params(self) -> Argon2idParams {
        match self {
            Self::Interactive => Argon2idParams {
                m_cost: MEMORY_64MB,
                t_cost: 3,
                p_cost: 4,
            },
            Self::Moderate => Argon2idParams {
                m_cost: MEMORY_256MB,
                t_cost: 3,
                p_cost: 4,
            },
            Self::Sensitive => Argon2idParams {
                m_cost: MEMORY_512MB,
                t_cost: 4,
                p_cost: 4,
            },
        }
    }
}

/// 256-bit key derived from the user's passphrase.
///
/// Used only to wrap and unwrap the master key. Never persisted; zeroized
/// when dropped.
pub struct RootKey(SecretBytes<ROOT_KEY_LEN>);

impl RootKey {
    /// Wrap existing key bytes (tests, key import).
    #[must_use]
    pub fn from_bytes(bytes: [u8; ROOT_KEY_LEN]) -> Self {
        Self(SecretBytes::new(bytes))
    }

    /// Expose the raw key for an AEAD operation.
    #[must_use]
    pub fn expose(&self) -> &[u8; ROOT_KEY_LEN] {
        self.0.expose()
    }
}

impl fmt::Debug for RootKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RootKey(***)")
    }
}

// ---------------------------------------------------------------------------
// Core KDF
// ---------------------------------------------------------------------------

/// Generate a fresh random salt from the OS CSPRNG.
///
/// # Errors
///
/// Returns `CryptoError::SecureMemory` if the CSPRNG fails.
pub fn generate_salt() -> Result<[u8; SALT_LEN], CryptoError> {
    let mut salt = [0u8; SALT_LEN];
    OsRng
        .try_fill_bytes(&mut salt)
        .map_err(|e| CryptoError::SecureMemory(format!("CSPRNG fill failed: {e}")))?;
    Ok(salt)
}

/// Derive a [`RootKey`] from a passphrase and salt using Argon2id.
///
/// Blocks for a tunable duration governed by `params`. The intermediate
/// output buffer is zeroized after it is moved into the root key.
///
/// # Errors
///
/// Returns `CryptoError::InvalidParameters` if:
/// - the salt is shorter than 16 bytes
/// - the argon2 parameters are invalid (zero iterations, zero lanes, ...)
///
/// Returns `CryptoError::SecureMemory` if argon2 fails while hashing
/// (memory allocation).
pub fn derive(
    passphrase: &[u8],
    salt: &[u8],
    params: &Argon2idParams,
) -> Result<RootKey, CryptoError> {
    if salt.len() < MIN_SALT_LEN {
        return Err(CryptoError::InvalidParameters(format!(
            "salt too short: {} bytes (minimum {MIN_SALT_LEN})",
            salt.len()
        )));
    }

    let argon2 = argon2::Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        params.to_argon2()?,
    );

    let mut output = [0u8; ROOT_KEY_LEN];
    if let Err(e) = argon2.hash_password_into(passphrase, salt, &mut output) {
        output.zeroize();
        return Err(CryptoError::SecureMemory(format!(
            "argon2id derivation failed: {e}"
        )));
    }

    let key = RootKey::from_bytes(output);
    output.zeroize();
    Ok(key)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
