//! Session configuration.
//!
//! ```json
//! {
//!   "kdf": { "preset": "moderate" },
//!   "idle_timeout_secs": 900,
//!   "max_session_secs": 14400
//! }
//! ```
//!
//! Every key is optional; missing keys take their defaults. A timeout of
//! `0` disables that timeout.

use std::time::Duration;

use coffre_crypto_core::{Argon2idParams, KdfPreset};
use serde::{Deserialize, Serialize};

use crate::error::VaultError;

/// Default inactivity timeout: 15 minutes.
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 900;

/// Default hard session lifetime: 4 hours.
const DEFAULT_MAX_SESSION_SECS: u64 = 14_400;

/// Argon2id work factor for new or re-wrapped master key records.
///
/// Existing records always unlock with the parameters stored next to them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KdfConfig {
    Preset(KdfPreset),
    Custom(Argon2idParams),
}

impl Default for KdfConfig {
    fn default() -> Self {
        Self::Preset(KdfPreset::default())
    }
}

impl KdfConfig {
    /// Resolve to concrete parameters.
    #[must_use]
    pub fn params(&self) -> Argon2idParams {
        match self {
            Self::Preset(preset) => preset.params(),
            Self::Custom(params) => params.clone(),
        }
    }
}

/// Configuration for a [`VaultSession`](crate::session::VaultSession).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VaultConfig {
    pub kdf: KdfConfig,
    /// Lock after this many seconds without an operation.
    pub idle_timeout_secs: u64,
    /// Lock this many seconds after unlock regardless of activity.
    pub max_session_secs: u64,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            kdf: KdfConfig::default(),
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            max_session_secs: DEFAULT_MAX_SESSION_SECS,
        }
    }
}

impl VaultConfig {
    /// Parse a JSON configuration document and validate it.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::InvalidParameters` if the document is not valid
    /// JSON, has unknown keys, or names invalid KDF parameters.
    pub fn from_json(json: &str) -> Result<Self, VaultError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| VaultError::InvalidParameters(format!("invalid vault config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration without using it.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::InvalidParameters` if the KDF parameters are
    /// rejected by Argon2id.
    pub fn validate(&self) -> Result<(), VaultError> {
        self.kdf.params().validate()?;
        Ok(())
    }

    pub(crate) const fn idle_timeout(&self) -> Option<Duration> {
        non_zero(self.idle_timeout_secs)
    }

    pub(crate) const fn max_session(&self) -> Option<Duration> {
        non_zero(self.max_session_secs)
    }
}

const fn non_zero(secs: u64) -> Option<Duration> {
    if secs == 0 {
        None
    } else {
        Some(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config = VaultConfig::from_json("{}").expect("parse");
        assert_eq!(config, VaultConfig::default());
        assert_eq!(config.kdf.params(), KdfPreset::Moderate.params());
        assert_eq!(config.idle_timeout(), Some(Duration::from_secs(900)));
    }

    #[test]
    fn custom_params_parse() {
        let config = VaultConfig::from_json(
            r#"{"kdf": {"custom": {"m_cost": 32, "t_cost": 1, "p_cost": 1}}, "idle_timeout_secs": 0}"#,
        )
        .expect("parse");
        assert_eq!(config.kdf.params().m_cost, 32);
        assert_eq!(config.idle_timeout(), None);
        assert!(config.max_session().is_some());
    }

    #[test]
    fn preset_names_are_snake_case() {
        let config = VaultConfig::from_json(r#"{"kdf": {"preset": "sensitive"}}"#).expect("parse");
        assert_eq!(config.kdf, KdfConfig::Preset(KdfPreset::Sensitive));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            VaultConfig::from_json(r#"{"idle_timeout": 5}"#),
            Err(VaultError::InvalidParameters(_))
        ));
    }

    #[test]
    fn invalid_kdf_params_are_rejected() {
        assert!(matches!(
            VaultConfig::from_json(r#"{"kdf": {"custom": {"m_cost": 32, "t_cost": 0, "p_cost": 1}}}"#),
            Err(VaultError::InvalidParameters(_))
        ));
    }
}
