//! Vault session: unlock, credential CRUD, passphrase change, lock.
//!
//! A [`VaultSession`] owns the decrypted master key for one user while it
//! is unlocked. It is the only place the key hierarchy is assembled:
//!
//! ```text
//! open(passphrase)
//!   └─ load master key record ── derive RootKey (salt, params from record)
//!        └─ unwrap MasterKey ── session Unlocked
//! ```
//!
//! Every credential field is sealed under the master key with AAD
//! `"coffre-credential-v1" 0x00 user_id 0x00 seal_id 0x00 field`, so a
//! ciphertext copied anywhere else fails to decrypt.
//!
//! Operations take `&mut self`: a session serializes its own calls, and
//! several sessions may share one store.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use coffre_crypto_core::{self as crypto, CryptoError, MasterKey, SealedData};
use tracing::{debug, info, warn};
use zeroize::Zeroize;

use crate::codec::{self, CredentialRecord, EncryptedFields, FieldName};
use crate::config::VaultConfig;
use crate::error::{StoreError, VaultError};
use crate::ids::generate_uuid;
use crate::master_record::{self, MasterKeyRecord};
use crate::store::{BlobStore, Filter, RowId, Table, UserId, Version};

/// AAD prefix for credential fields.
const FIELD_AAD_PREFIX: &[u8] = b"coffre-credential-v1";

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Lifecycle state of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// No key material held.
    Locked,
    /// Key derivation in progress.
    Unlocking,
    /// Master key resident; credential operations allowed.
    Unlocked,
}

/// Cooperative cancellation for long-running unlock and re-wrap work.
///
/// Checked before and after each Argon2id derivation; a cancelled
/// operation leaves the session `Locked`.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Visible to every clone of this flag.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), VaultError> {
        if self.is_cancelled() {
            Err(VaultError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Input for [`VaultSession::store_credential`].
#[derive(Clone, Copy)]
pub struct NewCredential<'a> {
    pub name: &'a str,
    pub username: &'a str,
    pub secret: &'a str,
    pub description: Option<&'a str>,
    pub url: Option<&'a str>,
}

impl fmt::Debug for NewCredential<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewCredential")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Changes for [`VaultSession::update_credential`].
///
/// `None` leaves a field untouched. For the optional fields,
/// `Some(None)` clears the value.
#[derive(Clone, Copy, Default)]
pub struct CredentialUpdate<'a> {
    pub name: Option<&'a str>,
    pub username: Option<&'a str>,
    pub secret: Option<&'a str>,
    pub description: Option<Option<&'a str>>,
    pub url: Option<Option<&'a str>>,
}

/// Plaintext view of a credential. Secret fields are zeroized on drop.
pub struct DecryptedCredential {
    pub id: RowId,
    pub version: Version,
    pub name: String,
    pub username: String,
    pub secret: String,
    pub description: Option<String>,
    pub url: Option<String>,
}

impl Drop for DecryptedCredential {
    fn drop(&mut self) {
        self.username.zeroize();
        self.secret.zeroize();
        if let Some(ref mut d) = self.description {
            d.zeroize();
        }
        if let Some(ref mut u) = self.url {
            u.zeroize();
        }
    }
}

impl fmt::Debug for DecryptedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptedCredential")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("username", &"***")
            .field("secret", &"***")
            .finish_non_exhaustive()
    }
}

/// Listing entry: metadata only, nothing decrypted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialSummary {
    pub id: RowId,
    pub name: String,
    pub version: Version,
    pub created_at: String,
    pub updated_at: String,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Resident key material plus the timestamps auto-lock needs.
struct UnlockedKey {
    master_key: MasterKey,
    unlocked_at: Instant,
    last_activity: Instant,
}

impl UnlockedKey {
    fn new(master_key: MasterKey) -> Self {
        let now = Instant::now();
        Self {
            master_key,
            unlocked_at: now,
            last_activity: now,
        }
    }
}

/// One user's vault session over a [`BlobStore`].
pub struct VaultSession<S: BlobStore> {
    store: S,
    user_id: UserId,
    config: VaultConfig,
    state: SessionState,
    key: Option<UnlockedKey>,
}

impl<S: BlobStore> fmt::Debug for VaultSession<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultSession")
            .field("user_id", &self.user_id)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<S: BlobStore> Drop for VaultSession<S> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<S: BlobStore> VaultSession<S> {
    /// Create a locked session for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::InvalidParameters` if `config` fails validation.
    pub fn new(store: S, user_id: UserId, config: VaultConfig) -> Result<Self, VaultError> {
        config.validate()?;
        Ok(Self {
            store,
            user_id,
            config,
            state: SessionState::Locked,
            key: None,
        })
    }

    #[must_use]
    pub const fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub const fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Current state. An unlocked session past a timeout reports `Locked`
    /// even before [`enforce_timeouts`](Self::enforce_timeouts) drops the key.
    #[must_use]
    pub fn state(&self) -> SessionState {
        if self.state == SessionState::Unlocked && self.expiry_reason(Instant::now()).is_some() {
            SessionState::Locked
        } else {
            self.state
        }
    }

    /// Whether the user already has a master key record.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::StoreUnavailable` if the store cannot be read.
    pub fn is_initialized(&self) -> Result<bool, VaultError> {
        Ok(!self
            .store
            .select(&self.user_id, Table::MasterKeys, &Filter::All)?
            .is_empty())
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Create the user's master key and wrap it under `passphrase`.
    ///
    /// Uses the configured KDF parameters and a fresh salt. On success the
    /// session is `Unlocked` with the new key.
    ///
    /// # Errors
    ///
    /// - `VaultError::AlreadyUnlocked` if the session is unlocked.
    /// - `VaultError::InvalidParameters` if the passphrase is empty.
    /// - `VaultError::VaultAlreadyInitialized` if a record already exists.
    /// - `VaultError::StoreUnavailable` on store failure.
    pub fn initialize(&mut self, passphrase: &[u8]) -> Result<(), VaultError> {
        self.enforce_timeouts();
        if self.key.is_some() {
            return Err(VaultError::AlreadyUnlocked);
        }
        if passphrase.is_empty() {
            return Err(VaultError::InvalidParameters("passphrase must not be empty".into()));
        }
        if self.is_initialized()? {
            return Err(VaultError::VaultAlreadyInitialized);
        }

        let params = self.config.kdf.params();
        let salt = crypto::generate_salt()?;
        let root_key = crypto::derive(passphrase, &salt, &params)?;
        let master_key = MasterKey::generate()?;
        let wrapped = crypto::wrap(&master_key, &root_key, self.owner())?;
        let fields = master_record::encode_fields(&wrapped, &salt, &params)?;

        match self.store.insert(&self.user_id, Table::MasterKeys, fields) {
            Ok(_) => {}
            Err(StoreError::Conflict(_)) => return Err(VaultError::VaultAlreadyInitialized),
            Err(e) => return Err(e.into()),
        }

        self.key = Some(UnlockedKey::new(master_key));
        self.state = SessionState::Unlocked;
        info!(user = %self.user_id, m_cost = params.m_cost, "vault initialized");
        Ok(())
    }

    /// Unlock with `passphrase`. See [`open_cancellable`](Self::open_cancellable).
    ///
    /// # Errors
    ///
    /// Same as [`open_cancellable`](Self::open_cancellable), minus `Cancelled`.
    pub fn open(&mut self, passphrase: &[u8]) -> Result<(), VaultError> {
        self.open_cancellable(passphrase, &CancelFlag::new())
    }

    /// Unlock with `passphrase`, honouring `cancel`.
    ///
    /// Moves `Locked → Unlocking → Unlocked`. Any failure, including
    /// cancellation, returns the session to `Locked` with no key retained.
    ///
    /// # Errors
    ///
    /// - `VaultError::AlreadyUnlocked` if the session is unlocked.
    /// - `VaultError::VaultNotInitialized` if the user has no record.
    /// - `VaultError::AuthenticationFailure` for a wrong passphrase or a
    ///   corrupted record.
    /// - `VaultError::Cancelled` if `cancel` fired.
    /// - `VaultError::StoreUnavailable` on store failure.
    pub fn open_cancellable(
        &mut self,
        passphrase: &[u8],
        cancel: &CancelFlag,
    ) -> Result<(), VaultError> {
        self.enforce_timeouts();
        if self.key.is_some() {
            return Err(VaultError::AlreadyUnlocked);
        }

        self.state = SessionState::Unlocking;
        match self.unlock_master_key(passphrase, cancel) {
            Ok((master_key, _record)) => {
                self.key = Some(UnlockedKey::new(master_key));
                self.state = SessionState::Unlocked;
                info!(user = %self.user_id, "vault unlocked");
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Locked;
                warn!(user = %self.user_id, error = %e, "unlock failed");
                Err(e)
            }
        }
    }

    /// Drop the master key and return to `Locked`. Idempotent.
    pub fn close(&mut self) {
        if self.key.take().is_some() {
            debug!(user = %self.user_id, "session closed, master key zeroized");
        }
        self.state = SessionState::Locked;
    }

    /// Lock the session if the idle or maximum-lifetime timeout elapsed.
    ///
    /// Returns `true` if this call locked the session.
    pub fn enforce_timeouts(&mut self) -> bool {
        match self.expiry_reason(Instant::now()) {
            Some(reason) => {
                info!(user = %self.user_id, reason, "auto-locking session");
                self.close();
                true
            }
            None => false,
        }
    }

    // -----------------------------------------------------------------------
    // Credentials
    // -----------------------------------------------------------------------

    /// Encrypt and persist a new credential.
    ///
    /// Each field gets its own random nonce; all share a fresh `seal_id`.
    ///
    /// # Errors
    ///
    /// - `VaultError::VaultLocked` if the session is not unlocked.
    /// - `VaultError::InvalidParameters` if `name` is empty.
    /// - `VaultError::StoreUnavailable` on store failure.
    pub fn store_credential(
        &mut self,
        credential: &NewCredential<'_>,
    ) -> Result<CredentialRecord, VaultError> {
        self.touch()?;
        require_name(credential.name)?;

        let key = self.master_key()?;
        let seal_id = generate_uuid();
        let seal = |field: FieldName, value: &str| {
            seal_field(key, &self.user_id, &seal_id, field, value)
        };

        let fields = EncryptedFields {
            name: credential.name.to_owned(),
            seal_id: seal_id.clone(),
            encrypted_username: seal(FieldName::Username, credential.username)?,
            encrypted_secret: seal(FieldName::Secret, credential.secret)?,
            encrypted_description: credential
                .description
                .map(|d| seal(FieldName::Description, d))
                .transpose()?,
            encrypted_url: credential
                .url
                .map(|u| seal(FieldName::Url, u))
                .transpose()?,
        };

        let row = self.store.insert(
            &self.user_id,
            Table::Credentials,
            codec::encode_fields(&fields),
        )?;
        let record = codec::decode_row(&row)?;
        debug!(credential = %record.id, "credential stored");
        Ok(record)
    }

    /// Decrypt every field of `record`.
    ///
    /// # Errors
    ///
    /// - `VaultError::VaultLocked` if the session is not unlocked.
    /// - `VaultError::Unauthorized` if the record belongs to another user.
    /// - `VaultError::TamperDetected` if any field fails authentication.
    pub fn read_credential(
        &mut self,
        record: &CredentialRecord,
    ) -> Result<DecryptedCredential, VaultError> {
        self.touch()?;
        self.require_owned(record)?;

        let key = self.master_key()?;
        let fields = &record.fields;
        let open = |field: FieldName, sealed: &SealedData| {
            open_field(key, &self.user_id, &fields.seal_id, field, sealed)
        };

        let username = open(FieldName::Username, &fields.encrypted_username)?;
        let secret = open(FieldName::Secret, &fields.encrypted_secret)?;
        let description = fields
            .encrypted_description
            .as_ref()
            .map(|s| open(FieldName::Description, s))
            .transpose()?;
        let url = fields
            .encrypted_url
            .as_ref()
            .map(|s| open(FieldName::Url, s))
            .transpose()?;

        Ok(DecryptedCredential {
            id: record.id.clone(),
            version: record.version,
            name: fields.name.clone(),
            username,
            secret,
            description,
            url,
        })
    }

    /// Fetch one credential record by id (no decryption).
    ///
    /// # Errors
    ///
    /// - `VaultError::VaultLocked` if the session is not unlocked.
    /// - `VaultError::NotFound` if the caller has no such credential.
    /// - `VaultError::Codec` if the stored row is malformed.
    pub fn get_credential(&mut self, id: &RowId) -> Result<CredentialRecord, VaultError> {
        self.touch()?;
        let rows = self
            .store
            .select(&self.user_id, Table::Credentials, &Filter::Id(id.clone()))?;
        let row = rows
            .first()
            .ok_or_else(|| VaultError::NotFound(id.to_string()))?;
        codec::decode_row(row)
    }

    /// List the caller's credentials, sorted by name (no decryption).
    ///
    /// # Errors
    ///
    /// - `VaultError::VaultLocked` if the session is not unlocked.
    /// - `VaultError::Codec` if a stored row is malformed.
    pub fn list_credentials(&mut self) -> Result<Vec<CredentialSummary>, VaultError> {
        self.touch()?;
        let rows = self
            .store
            .select(&self.user_id, Table::Credentials, &Filter::All)?;

        let mut summaries = rows
            .iter()
            .map(|row| {
                codec::decode_row(row).map(|record| CredentialSummary {
                    id: record.id,
                    name: record.fields.name,
                    version: record.version,
                    created_at: record.created_at,
                    updated_at: record.updated_at,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        summaries.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(summaries)
    }

    /// Apply `changes` to `record`, re-encrypting only the changed fields.
    ///
    /// `record.version` is the expected version; if the stored record moved
    /// on since it was read, nothing is written.
    ///
    /// # Errors
    ///
    /// - `VaultError::VaultLocked` if the session is not unlocked.
    /// - `VaultError::InvalidParameters` if the new name is empty.
    /// - `VaultError::Conflict` if the record's version is stale.
    /// - `VaultError::NotFound` / `Unauthorized` from the store.
    pub fn update_credential(
        &mut self,
        record: &CredentialRecord,
        changes: &CredentialUpdate<'_>,
    ) -> Result<CredentialRecord, VaultError> {
        self.touch()?;
        self.require_owned(record)?;
        if let Some(name) = changes.name {
            require_name(name)?;
        }

        let key = self.master_key()?;
        let seal_id = &record.fields.seal_id;
        let seal = |field: FieldName, value: &str| {
            seal_field(key, &self.user_id, seal_id, field, value)
        };

        let mut sealed: Vec<(FieldName, Option<SealedData>)> = Vec::new();
        if let Some(username) = changes.username {
            sealed.push((FieldName::Username, Some(seal(FieldName::Username, username)?)));
        }
        if let Some(secret) = changes.secret {
            sealed.push((FieldName::Secret, Some(seal(FieldName::Secret, secret)?)));
        }
        if let Some(description) = changes.description {
            let value = description
                .map(|d| seal(FieldName::Description, d))
                .transpose()?;
            sealed.push((FieldName::Description, value));
        }
        if let Some(url) = changes.url {
            let value = url.map(|u| seal(FieldName::Url, u)).transpose()?;
            sealed.push((FieldName::Url, value));
        }

        let row = self.store.update(
            &self.user_id,
            Table::Credentials,
            &record.id,
            codec::encode_changes(changes.name, &sealed),
            record.version,
        )?;
        let updated = codec::decode_row(&row)?;
        debug!(
            credential = %updated.id,
            version = %updated.version,
            fields = sealed.len(),
            "credential updated"
        );
        Ok(updated)
    }

    /// Delete a credential.
    ///
    /// # Errors
    ///
    /// - `VaultError::VaultLocked` if the session is not unlocked.
    /// - `VaultError::NotFound` / `Unauthorized` from the store.
    pub fn delete_credential(&mut self, id: &RowId) -> Result<(), VaultError> {
        self.touch()?;
        self.store.delete(&self.user_id, Table::Credentials, id)?;
        debug!(credential = %id, "credential deleted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Passphrase & account
    // -----------------------------------------------------------------------

    /// Re-wrap the master key under `new_passphrase`.
    /// See [`change_passphrase_cancellable`](Self::change_passphrase_cancellable).
    ///
    /// # Errors
    ///
    /// Same as [`change_passphrase_cancellable`](Self::change_passphrase_cancellable),
    /// minus `Cancelled`.
    pub fn change_passphrase(
        &mut self,
        old_passphrase: &[u8],
        new_passphrase: &[u8],
    ) -> Result<(), VaultError> {
        self.change_passphrase_cancellable(old_passphrase, new_passphrase, &CancelFlag::new())
    }

    /// Re-wrap the master key under `new_passphrase`, honouring `cancel`.
    ///
    /// Verifies `old_passphrase` against the stored record, then writes a
    /// fresh salt, the configured KDF parameters and the re-wrapped key in
    /// one versioned update. Credential ciphertexts are not touched.
    ///
    /// A wrong old passphrase leaves the session unlocked. Cancellation
    /// locks it.
    ///
    /// # Errors
    ///
    /// - `VaultError::VaultLocked` if the session is not unlocked.
    /// - `VaultError::InvalidParameters` if the new passphrase is empty.
    /// - `VaultError::AuthenticationFailure` if the old passphrase is wrong
    ///   or the stored record no longer wraps this session's key.
    /// - `VaultError::Conflict` if another session changed it first.
    /// - `VaultError::Cancelled` if `cancel` fired.
    pub fn change_passphrase_cancellable(
        &mut self,
        old_passphrase: &[u8],
        new_passphrase: &[u8],
        cancel: &CancelFlag,
    ) -> Result<(), VaultError> {
        self.touch()?;
        if new_passphrase.is_empty() {
            return Err(VaultError::InvalidParameters(
                "new passphrase must not be empty".into(),
            ));
        }

        match self.rewrap_master_key(old_passphrase, new_passphrase, cancel) {
            Ok(()) => {
                info!(user = %self.user_id, "passphrase changed");
                Ok(())
            }
            Err(VaultError::Cancelled) => {
                self.close();
                debug!(user = %self.user_id, "passphrase change cancelled");
                Err(VaultError::Cancelled)
            }
            Err(e) => {
                warn!(user = %self.user_id, error = %e, "passphrase change failed");
                Err(e)
            }
        }
    }

    /// Delete the user and everything they own, then lock.
    ///
    /// # Errors
    ///
    /// - `VaultError::VaultLocked` if the session is not unlocked.
    /// - `VaultError::StoreUnavailable` if the store failed; nothing was
    ///   deleted and the session stays unlocked.
    pub fn delete_account(&mut self) -> Result<(), VaultError> {
        self.touch()?;
        self.store.delete_user(&self.user_id)?;
        info!(user = %self.user_id, "account deleted");
        self.close();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn owner(&self) -> &[u8] {
        self.user_id.as_str().as_bytes()
    }

    /// Load the record, derive the root key and unwrap the master key.
    fn unlock_master_key(
        &self,
        passphrase: &[u8],
        cancel: &CancelFlag,
    ) -> Result<(MasterKey, MasterKeyRecord), VaultError> {
        cancel.check()?;
        let record = match master_record::load(&self.store, &self.user_id) {
            Ok(Some(record)) => record,
            Ok(None) => return Err(VaultError::VaultNotInitialized),
            Err(VaultError::Codec(detail)) => {
                debug!(user = %self.user_id, %detail, "master key record malformed");
                return Err(VaultError::AuthenticationFailure);
            }
            Err(e) => return Err(e),
        };

        let root_key = crypto::derive(passphrase, &record.key_derivation_salt, &record.kdf_params)
            .map_err(|e| match e {
                CryptoError::InvalidParameters(_) => VaultError::AuthenticationFailure,
                other => other.into(),
            })?;
        cancel.check()?;

        let master_key = crypto::unwrap(&record.wrapped_key, &root_key, self.owner())
            .map_err(|_| VaultError::AuthenticationFailure)?;
        Ok((master_key, record))
    }

    fn rewrap_master_key(
        &self,
        old_passphrase: &[u8],
        new_passphrase: &[u8],
        cancel: &CancelFlag,
    ) -> Result<(), VaultError> {
        let (master_key, record) = self.unlock_master_key(old_passphrase, cancel)?;
        if !master_key.ct_eq(self.master_key()?) {
            return Err(VaultError::AuthenticationFailure);
        }

        let params = self.config.kdf.params();
        let salt = crypto::generate_salt()?;
        let new_root_key = crypto::derive(new_passphrase, &salt, &params)?;
        cancel.check()?;

        let wrapped = crypto::rewrap(&master_key, &new_root_key, self.owner())?;
        let fields = master_record::encode_fields(&wrapped, &salt, &params)?;
        self.store.update(
            &self.user_id,
            Table::MasterKeys,
            &record.id,
            fields,
            record.version,
        )?;
        Ok(())
    }

    /// Which timeout, if any, has elapsed for the resident key.
    fn expiry_reason(&self, now: Instant) -> Option<&'static str> {
        let key = self.key.as_ref()?;
        if let Some(limit) = self.config.max_session() {
            if now.saturating_duration_since(key.unlocked_at) >= limit {
                return Some("max session lifetime reached");
            }
        }
        if let Some(limit) = self.config.idle_timeout() {
            if now.saturating_duration_since(key.last_activity) >= limit {
                return Some("idle timeout");
            }
        }
        None
    }

    /// Enforce timeouts, then require an unlocked session and record activity.
    fn touch(&mut self) -> Result<(), VaultError> {
        self.enforce_timeouts();
        let key = self.key.as_mut().ok_or(VaultError::VaultLocked)?;
        key.last_activity = Instant::now();
        Ok(())
    }

    fn master_key(&self) -> Result<&MasterKey, VaultError> {
        self.key
            .as_ref()
            .map(|k| &k.master_key)
            .ok_or(VaultError::VaultLocked)
    }

    fn require_owned(&self, record: &CredentialRecord) -> Result<(), VaultError> {
        if record.user_id == self.user_id {
            Ok(())
        } else {
            Err(VaultError::Unauthorized(record.id.to_string()))
        }
    }
}

// ---------------------------------------------------------------------------
// Field sealing
// ---------------------------------------------------------------------------

fn require_name(name: &str) -> Result<(), VaultError> {
    if name.trim().is_empty() {
        Err(VaultError::InvalidParameters(
            "credential name must not be empty".into(),
        ))
    } else {
        Ok(())
    }
}

/// `prefix 0x00 user_id 0x00 seal_id 0x00 field`.
fn field_aad(user_id: &UserId, seal_id: &str, field: FieldName) -> Vec<u8> {
    let parts: [&[u8]; 4] = [
        FIELD_AAD_PREFIX,
        user_id.as_str().as_bytes(),
        seal_id.as_bytes(),
        field.key().as_bytes(),
    ];
    parts.join(&0u8)
}

fn seal_field(
    key: &MasterKey,
    user_id: &UserId,
    seal_id: &str,
    field: FieldName,
    value: &str,
) -> Result<SealedData, VaultError> {
    Ok(crypto::seal(
        key.expose(),
        value.as_bytes(),
        &field_aad(user_id, seal_id, field),
    )?)
}

fn open_field(
    key: &MasterKey,
    user_id: &UserId,
    seal_id: &str,
    field: FieldName,
    sealed: &SealedData,
) -> Result<String, VaultError> {
    let plaintext = crypto::decrypt(key.expose(), sealed, &field_aad(user_id, seal_id, field))?;
    std::str::from_utf8(plaintext.expose())
        .map(str::to_owned)
        .map_err(|_| VaultError::Codec(format!("field `{}` is not UTF-8", field.key())))
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
