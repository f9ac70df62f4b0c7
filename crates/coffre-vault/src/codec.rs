//! Credential row codec.
//!
//! Maps between [`CredentialRecord`] and the store's JSON [`Fields`]. Pure
//! data shaping: no keys, no crypto. Each encrypted field is stored as
//! standard base64 of `nonce || ciphertext || tag`.
//!
//! A credential row has exactly six keys:
//!
//! | key           | value                                   |
//! |---------------|-----------------------------------------|
//! | `name`        | plaintext display name                  |
//! | `seal_id`     | random id bound into every field's AAD  |
//! | `username`    | sealed, required                        |
//! | `secret`      | sealed, required                        |
//! | `description` | sealed or `null`                        |
//! | `url`         | sealed or `null`                        |
//!
//! Anything else (missing key, extra key, bad base64, a sealed blob shorter
//! than nonce + tag) is rejected with [`VaultError::Codec`].

use coffre_crypto_core::SealedData;
use data_encoding::BASE64;
use serde_json::Value;

use crate::error::VaultError;
use crate::store::{Fields, Row, RowId, UserId, Version};

const KEY_NAME: &str = "name";
const KEY_SEAL_ID: &str = "seal_id";

/// Every key a credential row carries.
const CREDENTIAL_KEYS: [&str; 6] = [
    KEY_NAME,
    KEY_SEAL_ID,
    "username",
    "secret",
    "description",
    "url",
];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The four encrypted credential fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldName {
    Username,
    Secret,
    Description,
    Url,
}

impl FieldName {
    /// Row key, also the field label bound into the AAD.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Username => "username",
            Self::Secret => "secret",
            Self::Description => "description",
            Self::Url => "url",
        }
    }
}

/// Row payload of a credential: plaintext name plus sealed fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedFields {
    pub name: String,
    pub seal_id: String,
    pub encrypted_username: SealedData,
    pub encrypted_secret: SealedData,
    pub encrypted_description: Option<SealedData>,
    pub encrypted_url: Option<SealedData>,
}

/// A credential as persisted, with store-assigned metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialRecord {
    pub id: RowId,
    pub user_id: UserId,
    /// Version token to pass back on update.
    pub version: Version,
    pub created_at: String,
    pub updated_at: String,
    pub fields: EncryptedFields,
}

impl CredentialRecord {
    /// Display name (stored in plaintext).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.fields.name
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode a sealed value, or `null` for an absent optional field.
#[must_use]
pub fn sealed_value(sealed: Option<&SealedData>) -> Value {
    sealed.map_or(Value::Null, |s| bytes_value(&s.to_bytes()))
}

/// Encode a full credential payload for insertion.
#[must_use]
pub fn encode_fields(fields: &EncryptedFields) -> Fields {
    let mut out = Fields::new();
    out.insert(KEY_NAME.into(), Value::String(fields.name.clone()));
    out.insert(KEY_SEAL_ID.into(), Value::String(fields.seal_id.clone()));
    out.insert(
        FieldName::Username.key().into(),
        sealed_value(Some(&fields.encrypted_username)),
    );
    out.insert(
        FieldName::Secret.key().into(),
        sealed_value(Some(&fields.encrypted_secret)),
    );
    out.insert(
        FieldName::Description.key().into(),
        sealed_value(fields.encrypted_description.as_ref()),
    );
    out.insert(
        FieldName::Url.key().into(),
        sealed_value(fields.encrypted_url.as_ref()),
    );
    out
}

/// Encode a partial payload for a versioned update.
///
/// Only the keys passed in are written; the store keeps the rest. A
/// `None` inside `sealed` clears an optional field.
#[must_use]
pub fn encode_changes(name: Option<&str>, sealed: &[(FieldName, Option<SealedData>)]) -> Fields {
    let mut out = Fields::new();
    if let Some(name) = name {
        out.insert(KEY_NAME.into(), Value::String(name.to_owned()));
    }
    for (field, value) in sealed {
        out.insert(field.key().into(), sealed_value(value.as_ref()));
    }
    out
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decode a credential row.
///
/// # Errors
///
/// Returns `VaultError::Codec` if the row does not have exactly the six
/// credential keys or any value is malformed.
pub fn decode_row(row: &Row) -> Result<CredentialRecord, VaultError> {
    let f = &row.fields;
    expect_keys(f, &CREDENTIAL_KEYS, "credential")?;

    let fields = EncryptedFields {
        name: get_str(f, KEY_NAME)?.to_owned(),
        seal_id: get_str(f, KEY_SEAL_ID)?.to_owned(),
        encrypted_username: get_sealed(f, FieldName::Username.key())?,
        encrypted_secret: get_sealed(f, FieldName::Secret.key())?,
        encrypted_description: get_optional_sealed(f, FieldName::Description.key())?,
        encrypted_url: get_optional_sealed(f, FieldName::Url.key())?,
    };

    Ok(CredentialRecord {
        id: row.id.clone(),
        user_id: row.user_id.clone(),
        version: row.version,
        created_at: row.created_at.clone(),
        updated_at: row.updated_at.clone(),
        fields,
    })
}

// ---------------------------------------------------------------------------
// Shared helpers (also used by the master key and feature request codecs)
// ---------------------------------------------------------------------------

/// Check that `fields` has exactly the keys in `expected`.
pub(crate) fn expect_keys(
    fields: &Fields,
    expected: &[&str],
    what: &str,
) -> Result<(), VaultError> {
    if let Some(missing) = expected.iter().find(|k| !fields.contains_key(**k)) {
        return Err(VaultError::Codec(format!(
            "{what} row missing field `{missing}`"
        )));
    }
    if let Some(extra) = fields.keys().find(|k| !expected.contains(&k.as_str())) {
        return Err(VaultError::Codec(format!(
            "{what} row has unexpected field `{extra}`"
        )));
    }
    Ok(())
}

pub(crate) fn bytes_value(bytes: &[u8]) -> Value {
    Value::String(BASE64.encode(bytes))
}

pub(crate) fn get_str<'a>(fields: &'a Fields, key: &str) -> Result<&'a str, VaultError> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| VaultError::Codec(format!("field `{key}` must be a string")))
}

pub(crate) fn get_bytes(fields: &Fields, key: &str) -> Result<Vec<u8>, VaultError> {
    BASE64
        .decode(get_str(fields, key)?.as_bytes())
        .map_err(|e| VaultError::Codec(format!("field `{key}` is not valid base64: {e}")))
}

fn get_sealed(fields: &Fields, key: &str) -> Result<SealedData, VaultError> {
    SealedData::from_bytes(&get_bytes(fields, key)?)
        .map_err(|e| VaultError::Codec(format!("field `{key}`: {e}")))
}

fn get_optional_sealed(fields: &Fields, key: &str) -> Result<Option<SealedData>, VaultError> {
    match fields.get(key) {
        Some(Value::Null) => Ok(None),
        _ => get_sealed(fields, key).map(Some),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use coffre_crypto_core::seal;

    fn sample_fields(with_optional: bool) -> EncryptedFields {
        let key = [0x11; 32];
        let s = |text: &str| seal(&key, text.as_bytes(), b"aad").expect("seal");
        EncryptedFields {
            name: "Gmail".into(),
            seal_id: "3f0e9c1a-0000-4000-8000-000000000000".into(),
            encrypted_username: s("alice@example.com"),
            encrypted_secret: s("hunter2"),
            encrypted_description: with_optional.then(|| s("personal")),
            encrypted_url: with_optional.then(|| s("https://mail.google.com")),
        }
    }

    fn row_of(fields: Fields) -> Row {
        Row {
            id: RowId::new("row-1"),
            user_id: UserId::new("alice").expect("valid"),
            version: Version(3),
            created_at: "2026-01-01T00:00:00.000Z".into(),
            updated_at: "2026-01-02T00:00:00.000Z".into(),
            fields,
        }
    }

    #[test]
    fn decode_restores_every_field() {
        for with_optional in [true, false] {
            let fields = sample_fields(with_optional);
            let record = decode_row(&row_of(encode_fields(&fields))).expect("decode");
            assert_eq!(record.fields, fields);
            assert_eq!(record.version, Version(3));
            assert_eq!(record.name(), "Gmail");
        }
    }

    #[test]
    fn absent_optionals_encode_as_null() {
        let encoded = encode_fields(&sample_fields(false));
        assert_eq!(encoded["description"], Value::Null);
        assert_eq!(encoded["url"], Value::Null);
        assert_eq!(encoded.len(), 6);
    }

    #[test]
    fn changes_carry_only_touched_keys() {
        let sealed = sample_fields(true).encrypted_secret;
        let changes = encode_changes(
            None,
            &[
                (FieldName::Secret, Some(sealed.clone())),
                (FieldName::Url, None),
            ],
        );
        assert_eq!(changes.len(), 2);
        assert_eq!(changes["secret"], sealed_value(Some(&sealed)));
        assert_eq!(changes["url"], Value::Null);

        let renamed = encode_changes(Some("Work mail"), &[]);
        assert_eq!(renamed.len(), 1);
        assert_eq!(renamed["name"], "Work mail");
    }

    #[test]
    fn missing_field_is_rejected() {
        let mut encoded = encode_fields(&sample_fields(true));
        encoded.remove("secret");
        let err = decode_row(&row_of(encoded)).expect_err("missing");
        assert!(matches!(err, VaultError::Codec(msg) if msg.contains("secret")));
    }

    #[test]
    fn extra_field_is_rejected() {
        let mut encoded = encode_fields(&sample_fields(true));
        encoded.insert("notes".into(), Value::String("x".into()));
        assert!(matches!(
            decode_row(&row_of(encoded)),
            Err(VaultError::Codec(_))
        ));
    }

    #[test]
    fn invalid_base64_is_rejected() {
        let mut encoded = encode_fields(&sample_fields(true));
        encoded.insert("username".into(), Value::String("not base64!".into()));
        assert!(matches!(
            decode_row(&row_of(encoded)),
            Err(VaultError::Codec(_))
        ));
    }

    #[test]
    fn truncated_blob_is_rejected() {
        let mut encoded = encode_fields(&sample_fields(true));
        encoded.insert("url".into(), bytes_value(&[0u8; 27]));
        assert!(matches!(
            decode_row(&row_of(encoded)),
            Err(VaultError::Codec(_))
        ));
    }

    #[test]
    fn required_field_may_not_be_null() {
        let mut encoded = encode_fields(&sample_fields(true));
        encoded.insert("username".into(), Value::Null);
        assert!(matches!(
            decode_row(&row_of(encoded)),
            Err(VaultError::Codec(_))
        ));
    }
}
