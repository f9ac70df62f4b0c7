//! `coffre-vault`: credential vault sessions over an untrusted blob store.
//!
//! Owns the session state machine, the row codecs and the storage seam.
//! All cryptography is delegated to `coffre-crypto-core`; the store only
//! ever receives ciphertext, salts, nonces and KDF parameters.

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::arithmetic_side_effects))]

pub mod error;
mod ids;

pub mod store;

pub mod sqlite;

pub mod codec;
pub mod master_record;

pub mod config;
pub mod session;

pub mod features;

pub use codec::{CredentialRecord, EncryptedFields, FieldName};
pub use config::{KdfConfig, VaultConfig};
pub use error::{StoreError, VaultError};
pub use features::{
    list_feature_requests, submit_feature_request, update_feature_status, FeatureRequest,
    FeatureStatus,
};
pub use master_record::MasterKeyRecord;
pub use session::{
    CancelFlag, CredentialSummary, CredentialUpdate, DecryptedCredential, NewCredential,
    SessionState, VaultSession,
};
pub use sqlite::SqliteStore;
pub use store::{BlobStore, Fields, Filter, Row, RowId, Table, UserId, Version};
