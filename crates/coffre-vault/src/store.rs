//! Blob store abstraction.
//!
//! The vault never talks to a database directly. Everything it persists goes
//! through [`BlobStore`], a row-level CRUD interface with three tables and
//! per-user ownership. Rows carry a store-maintained [`Version`] that acts as
//! the optimistic-concurrency token for [`BlobStore::update`].
//!
//! Implementations must enforce ownership: a caller never sees rows that
//! belong to another [`UserId`], and may not modify or delete them.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// JSON object holding a row's payload.
pub type Fields = serde_json::Map<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Authenticated user identity, issued by the surrounding system.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap an identity string.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unauthorized` if the identity is empty or
    /// contains a NUL byte (NUL separates AAD components).
    pub fn new(id: impl Into<String>) -> Result<Self, StoreError> {
        let id = id.into();
        if id.is_empty() || id.contains('\0') {
            return Err(StoreError::Unauthorized("<invalid user id>".into()));
        }
        Ok(Self(id))
    }

    /// The identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Store-assigned row identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(String);

impl RowId {
    /// Wrap an existing row id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Monotonic per-row revision. Starts at 1 on insert and increases by one
/// on every successful update.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(pub u64);

impl Version {
    /// Version of a freshly inserted row.
    pub const INITIAL: Self = Self(1);
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Tables, rows, filters
// ---------------------------------------------------------------------------

/// The three tables the vault uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Table {
    /// Encrypted credential records.
    Credentials,
    /// One wrapped master key per user.
    MasterKeys,
    /// Plaintext feature requests.
    FeatureRequests,
}

impl Table {
    /// Every table, in deletion order for account removal.
    pub const ALL: [Self; 3] = [Self::Credentials, Self::MasterKeys, Self::FeatureRequests];

    /// The table's storage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Credentials => "credentials",
            Self::MasterKeys => "master_keys",
            Self::FeatureRequests => "feature_requests",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row selector for [`BlobStore::select`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Filter {
    /// Every row the caller owns.
    All,
    /// A single row by id. Yields nothing if the row is missing or foreign.
    Id(RowId),
}

/// A persisted row as returned by the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Store-assigned identifier.
    pub id: RowId,
    /// Owning user.
    pub user_id: UserId,
    /// Optimistic-concurrency token.
    pub version: Version,
    /// RFC 3339 creation time, assigned by the store.
    pub created_at: String,
    /// RFC 3339 last-update time; never earlier than `created_at`.
    pub updated_at: String,
    /// Row payload.
    pub fields: Fields,
}

// ---------------------------------------------------------------------------
// BlobStore trait
// ---------------------------------------------------------------------------

/// Row-level CRUD with per-user ownership and versioned updates.
///
/// Every call names the authenticated `caller`; an implementation scopes
/// reads to the caller's rows and rejects writes to anyone else's.
pub trait BlobStore: Send + Sync {
    /// Insert a new row owned by `caller`.
    ///
    /// # Errors
    ///
    /// - `StoreError::Conflict` if the insert violates a uniqueness rule
    ///   (a second master key record for the same user).
    /// - `StoreError::Unavailable` on backend failure.
    fn insert(&self, caller: &UserId, table: Table, fields: Fields) -> Result<Row, StoreError>;

    /// Return the caller's rows matching `filter`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` on backend failure.
    fn select(&self, caller: &UserId, table: Table, filter: &Filter)
        -> Result<Vec<Row>, StoreError>;

    /// Merge `fields` into row `id` if its version still equals `expected`.
    ///
    /// Keys present in `fields` replace the stored values; absent keys are
    /// kept. On success the version increases by one and `updated_at` is
    /// refreshed.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if no such row exists.
    /// - `StoreError::Unauthorized` if the row belongs to another user.
    /// - `StoreError::Conflict` if the stored version differs from `expected`.
    /// - `StoreError::Unavailable` on backend failure.
    fn update(
        &self,
        caller: &UserId,
        table: Table,
        id: &RowId,
        fields: Fields,
        expected: Version,
    ) -> Result<Row, StoreError>;

    /// Delete row `id`.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if no such row exists.
    /// - `StoreError::Unauthorized` if the row belongs to another user.
    /// - `StoreError::Unavailable` on backend failure.
    fn delete(&self, caller: &UserId, table: Table, id: &RowId) -> Result<(), StoreError>;

    /// Remove the caller's identity and every row they own, atomically.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` on backend failure; in that case
    /// nothing was deleted.
    fn delete_user(&self, caller: &UserId) -> Result<(), StoreError>;
}

impl<S: BlobStore + ?Sized> BlobStore for Arc<S> {
    fn insert(&self, caller: &UserId, table: Table, fields: Fields) -> Result<Row, StoreError> {
        (**self).insert(caller, table, fields)
    }

    fn select(
        &self,
        caller: &UserId,
        table: Table,
        filter: &Filter,
    ) -> Result<Vec<Row>, StoreError> {
        (**self).select(caller, table, filter)
    }

    fn update(
        &self,
        caller: &UserId,
        table: Table,
        id: &RowId,
        fields: Fields,
        expected: Version,
    ) -> Result<Row, StoreError> {
        (**self).update(caller, table, id, fields, expected)
    }

    fn delete(&self, caller: &UserId, table: Table, id: &RowId) -> Result<(), StoreError> {
        (**self).delete(caller, table, id)
    }

    fn delete_user(&self, caller: &UserId) -> Result<(), StoreError> {
        (**self).delete_user(caller)
    }
}
