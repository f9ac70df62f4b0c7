//! Feature requests: small plaintext records users file against the product.
//!
//! These live in the same store as credentials but are never encrypted and
//! need no unlocked session, only an authenticated [`UserId`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::codec::{expect_keys, get_str};
use crate::error::VaultError;
use crate::store::{BlobStore, Fields, Filter, Row, RowId, Table, UserId, Version};

const KEY_TITLE: &str = "title";
const KEY_DESCRIPTION: &str = "description";
const KEY_STATUS: &str = "status";

const FEATURE_KEYS: [&str; 3] = [KEY_TITLE, KEY_DESCRIPTION, KEY_STATUS];

/// Longest accepted title, in characters.
const MAX_TITLE_CHARS: usize = 200;

/// Triage status of a feature request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureStatus {
    #[default]
    Open,
    Planned,
    InProgress,
    Done,
    Rejected,
}

impl FeatureStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Planned => "planned",
            Self::InProgress => "in_progress",
            Self::Done => "done",
            Self::Rejected => "rejected",
        }
    }

    fn parse(s: &str) -> Result<Self, VaultError> {
        match s {
            "open" => Ok(Self::Open),
            "planned" => Ok(Self::Planned),
            "in_progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            "rejected" => Ok(Self::Rejected),
            other => Err(VaultError::Codec(format!("unknown feature status `{other}`"))),
        }
    }
}

/// A persisted feature request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeatureRequest {
    pub id: RowId,
    pub user_id: UserId,
    pub title: String,
    pub description: String,
    pub status: FeatureStatus,
    pub version: Version,
    pub created_at: String,
    pub updated_at: String,
}

/// Decode a `feature_requests` row.
///
/// # Errors
///
/// Returns `VaultError::Codec` if the row is malformed.
pub fn decode_row(row: &Row) -> Result<FeatureRequest, VaultError> {
    let f = &row.fields;
    expect_keys(f, &FEATURE_KEYS, "feature request")?;
    Ok(FeatureRequest {
        id: row.id.clone(),
        user_id: row.user_id.clone(),
        title: get_str(f, KEY_TITLE)?.to_owned(),
        description: get_str(f, KEY_DESCRIPTION)?.to_owned(),
        status: FeatureStatus::parse(get_str(f, KEY_STATUS)?)?,
        version: row.version,
        created_at: row.created_at.clone(),
        updated_at: row.updated_at.clone(),
    })
}

/// File a new feature request with status `open`.
///
/// # Errors
///
/// - `VaultError::InvalidParameters` if the title is empty or too long.
/// - `VaultError::StoreUnavailable` on store failure.
pub fn submit_feature_request<S: BlobStore + ?Sized>(
    store: &S,
    caller: &UserId,
    title: &str,
    description: &str,
) -> Result<FeatureRequest, VaultError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(VaultError::InvalidParameters(
            "feature request title must not be empty".into(),
        ));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(VaultError::InvalidParameters(format!(
            "feature request title exceeds {MAX_TITLE_CHARS} characters"
        )));
    }

    let mut fields = Fields::new();
    fields.insert(KEY_TITLE.into(), Value::String(title.to_owned()));
    fields.insert(KEY_DESCRIPTION.into(), Value::String(description.to_owned()));
    fields.insert(
        KEY_STATUS.into(),
        Value::String(FeatureStatus::Open.as_str().to_owned()),
    );

    let row = store.insert(caller, Table::FeatureRequests, fields)?;
    debug!(request = %row.id, "feature request submitted");
    decode_row(&row)
}

/// The caller's feature requests, oldest first.
///
/// # Errors
///
/// - `VaultError::Codec` if a stored row is malformed.
/// - `VaultError::StoreUnavailable` on store failure.
pub fn list_feature_requests<S: BlobStore + ?Sized>(
    store: &S,
    caller: &UserId,
) -> Result<Vec<FeatureRequest>, VaultError> {
    store
        .select(caller, Table::FeatureRequests, &Filter::All)?
        .iter()
        .map(decode_row)
        .collect()
}

/// Move `request` to `status`, guarded by its version.
///
/// # Errors
///
/// - `VaultError::Conflict` if the request changed since it was read.
/// - `VaultError::NotFound` / `Unauthorized` from the store.
pub fn update_feature_status<S: BlobStore + ?Sized>(
    store: &S,
    caller: &UserId,
    request: &FeatureRequest,
    status: FeatureStatus,
) -> Result<FeatureRequest, VaultError> {
    let mut fields = Fields::new();
    fields.insert(KEY_STATUS.into(), Value::String(status.as_str().to_owned()));
    let row = store.update(
        caller,
        Table::FeatureRequests,
        &request.id,
        fields,
        request.version,
    )?;
    debug!(request = %row.id, status = status.as_str(), "feature request status changed");
    decode_row(&row)
}
