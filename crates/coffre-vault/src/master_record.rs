//! Master key record: the one `master_keys` row per user.
//!
//! Holds everything needed to turn a passphrase back into the master key:
//! the Argon2id salt and work factor, and the wrapped key with its nonce.

use coffre_crypto_core::{Argon2idParams, WrappedKey};
use serde_json::Value;

use crate::codec::{bytes_value, expect_keys, get_bytes};
use crate::error::VaultError;
use crate::store::{BlobStore, Fields, Filter, Row, RowId, Table, UserId, Version};

const KEY_WRAPPED: &str = "wrapped_key";
const KEY_NONCE: &str = "wrap_nonce";
const KEY_SALT: &str = "key_derivation_salt";
const KEY_PARAMS: &str = "kdf_params";

const MASTER_KEY_KEYS: [&str; 4] = [KEY_WRAPPED, KEY_NONCE, KEY_SALT, KEY_PARAMS];

/// Decoded `master_keys` row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MasterKeyRecord {
    pub id: RowId,
    pub user_id: UserId,
    pub wrapped_key: WrappedKey,
    pub key_derivation_salt: Vec<u8>,
    pub kdf_params: Argon2idParams,
    pub version: Version,
    pub created_at: String,
    pub updated_at: String,
}

/// Encode the mutable part of a master key record.
///
/// Used both for the initial insert and for the single versioned update a
/// passphrase change performs, so salt, params and wrapped key always move
/// together.
pub(crate) fn encode_fields(
    wrapped_key: &WrappedKey,
    salt: &[u8],
    params: &Argon2idParams,
) -> Result<Fields, VaultError> {
    let params = serde_json::to_value(params)
        .map_err(|e| VaultError::Codec(format!("failed to encode kdf params: {e}")))?;

    let mut out = Fields::new();
    out.insert(KEY_WRAPPED.into(), bytes_value(&wrapped_key.ciphertext_and_tag()));
    out.insert(KEY_NONCE.into(), bytes_value(wrapped_key.nonce()));
    out.insert(KEY_SALT.into(), bytes_value(salt));
    out.insert(KEY_PARAMS.into(), params);
    Ok(out)
}

/// Decode a `master_keys` row.
///
/// # Errors
///
/// Returns `VaultError::Codec` if the row is malformed, including KDF
/// parameters outside the accepted range.
pub fn decode_row(row: &Row) -> Result<MasterKeyRecord, VaultError> {
    let f = &row.fields;
    expect_keys(f, &MASTER_KEY_KEYS, "master key")?;

    let wrapped_key = WrappedKey::from_parts(&get_bytes(f, KEY_WRAPPED)?, &get_bytes(f, KEY_NONCE)?)
        .map_err(|e| VaultError::Codec(format!("wrapped key: {e}")))?;
    let kdf_params: Argon2idParams = serde_json::from_value(
        f.get(KEY_PARAMS).cloned().unwrap_or(Value::Null),
    )
    .map_err(|e| VaultError::Codec(format!("kdf params: {e}")))?;
    kdf_params
        .validate()
        .map_err(|e| VaultError::Codec(format!("kdf params: {e}")))?;

    Ok(MasterKeyRecord {
        id: row.id.clone(),
        user_id: row.user_id.clone(),
        wrapped_key,
        key_derivation_salt: get_bytes(f, KEY_SALT)?,
        kdf_params,
        version: row.version,
        created_at: row.created_at.clone(),
        updated_at: row.updated_at.clone(),
    })
}

/// Fetch the caller's master key record, if one exists.
pub(crate) fn load<S: BlobStore>(
    store: &S,
    caller: &UserId,
) -> Result<Option<MasterKeyRecord>, VaultError> {
    let mut rows = store.select(caller, Table::MasterKeys, &Filter::All)?;
    match rows.len() {
        0 => Ok(None),
        1 => rows.pop().map(|row| decode_row(&row)).transpose(),
        n => Err(VaultError::Codec(format!(
            "expected one master key record, found {n}"
        ))),
    }
}
