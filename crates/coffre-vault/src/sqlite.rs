//! `SQLite`-backed [`BlobStore`] and migration runner.
//!
//! Each table stores rows as `(id, user_id, version, body, created_at,
//! updated_at)` where `body` is the JSON payload. Ownership and the version
//! check are enforced inside immediate transactions, so two handles on the
//! same file serialize their writes.

use std::fmt;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::ids::{generate_uuid, now_iso8601};
use crate::store::{BlobStore, Fields, Filter, Row, RowId, Table, UserId, Version};

// ---------------------------------------------------------------------------
// Embedded migrations
// ---------------------------------------------------------------------------

/// Forward-only SQL migrations, embedded at compile time.
/// Index 0 → version 1.
const MIGRATIONS: &[&str] = &[include_str!("../migrations/001_initial_schema.sql")];

/// How long a writer waits on another connection's lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const ROW_COLUMNS: &str = "id, user_id, version, body, created_at, updated_at";

// ---------------------------------------------------------------------------
// SqliteStore
// ---------------------------------------------------------------------------

/// Blob store over a single `SQLite` connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SqliteStore(..)")
    }
}

impl SqliteStore {
    /// Open (or create) a store at `path`.
    ///
    /// Enables WAL journaling and foreign keys, then applies pending
    /// migrations.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the file cannot be opened or a
    /// migration fails.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        let store = Self::from_connection(conn)?;
        info!(path = %path.display(), "sqlite store opened");
        Ok(store)
    }

    /// Open a private in-memory store.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if a migration fails.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        run_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Current schema version (`PRAGMA user_version`).
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the pragma query fails.
    pub fn schema_version(&self) -> Result<i32, StoreError> {
        let conn = self.lock()?;
        Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("store connection mutex poisoned".into()))
    }
}

// ---------------------------------------------------------------------------
// Migration runner
// ---------------------------------------------------------------------------

/// Apply all pending migrations, one transaction each.
fn run_migrations(conn: &mut Connection) -> Result<(), StoreError> {
    let current: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    for (idx, sql) in MIGRATIONS.iter().enumerate() {
        let version = idx
            .checked_add(1)
            .and_then(|v| i32::try_from(v).ok())
            .ok_or_else(|| StoreError::Unavailable("migration index overflow".into()))?;

        if version <= current {
            continue;
        }

        let tx = conn.transaction()?;
        tx.execute_batch(sql).map_err(|e| {
            StoreError::Unavailable(format!("migration {version} failed: {e}"))
        })?;
        tx.pragma_update(None, "user_version", version)?;
        tx.commit()?;
        debug!(version, "applied migration");
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

/// A row as it sits in `SQLite`, before the body is parsed.
struct RawRow {
    id: String,
    user_id: String,
    version: i64,
    body: String,
    created_at: String,
    updated_at: String,
}

fn read_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        version: row.get(2)?,
        body: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

impl RawRow {
    fn version(&self) -> Result<Version, StoreError> {
        u64::try_from(self.version)
            .map(Version)
            .map_err(|_| StoreError::Unavailable(format!("row {} has a negative version", self.id)))
    }

    fn fields(&self) -> Result<Fields, StoreError> {
        serde_json::from_str(&self.body)
            .map_err(|e| StoreError::Unavailable(format!("row {} has a corrupt body: {e}", self.id)))
    }

    fn into_row(self) -> Result<Row, StoreError> {
        let version = self.version()?;
        let fields = self.fields()?;
        let user_id = UserId::new(self.user_id)?;
        Ok(Row {
            id: RowId::new(self.id),
            user_id,
            version,
            created_at: self.created_at,
            updated_at: self.updated_at,
            fields,
        })
    }
}

fn encode_body(fields: &Fields) -> Result<String, StoreError> {
    serde_json::to_string(fields)
        .map_err(|e| StoreError::Unavailable(format!("failed to encode row body: {e}")))
}

fn to_sql_version(version: Version) -> Result<i64, StoreError> {
    i64::try_from(version.0)
        .map_err(|_| StoreError::Unavailable(format!("version {version} out of range")))
}

/// Load row `id` and check that `caller` owns it.
fn load_owned(
    conn: &Connection,
    caller: &UserId,
    table: Table,
    id: &RowId,
) -> Result<RawRow, StoreError> {
    let raw = conn
        .query_row(
            &format!("SELECT {ROW_COLUMNS} FROM {table} WHERE id = ?1"),
            params![id.as_str()],
            read_raw,
        )
        .optional()?
        .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

    if raw.user_id != caller.as_str() {
        return Err(StoreError::Unauthorized(id.to_string()));
    }
    Ok(raw)
}

// ---------------------------------------------------------------------------
// BlobStore impl
// ---------------------------------------------------------------------------

impl BlobStore for SqliteStore {
    fn insert(&self, caller: &UserId, table: Table, fields: Fields) -> Result<Row, StoreError> {
        let body = encode_body(&fields)?;
        let id = generate_uuid();
        let now = now_iso8601();

        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT OR IGNORE INTO users (id, created_at) VALUES (?1, ?2)",
            params![caller.as_str(), now],
        )?;
        tx.execute(
            &format!(
                "INSERT INTO {table} ({ROW_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?5)"
            ),
            params![
                id,
                caller.as_str(),
                to_sql_version(Version::INITIAL)?,
                body,
                now
            ],
        )?;
        tx.commit()?;

        debug!(%table, row = %id, "row inserted");
        Ok(Row {
            id: RowId::new(id),
            user_id: caller.clone(),
            version: Version::INITIAL,
            created_at: now.clone(),
            updated_at: now,
            fields,
        })
    }

    fn select(
        &self,
        caller: &UserId,
        table: Table,
        filter: &Filter,
    ) -> Result<Vec<Row>, StoreError> {
        let conn = self.lock()?;
        let raws = match filter {
            Filter::All => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ROW_COLUMNS} FROM {table} WHERE user_id = ?1 ORDER BY rowid"
                ))?;
                let rows = stmt
                    .query_map(params![caller.as_str()], read_raw)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            Filter::Id(id) => conn
                .query_row(
                    &format!("SELECT {ROW_COLUMNS} FROM {table} WHERE user_id = ?1 AND id = ?2"),
                    params![caller.as_str(), id.as_str()],
                    read_raw,
                )
                .optional()?
                .into_iter()
                .collect(),
        };

        raws.into_iter().map(RawRow::into_row).collect()
    }

    fn update(
        &self,
        caller: &UserId,
        table: Table,
        id: &RowId,
        fields: Fields,
        expected: Version,
    ) -> Result<Row, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current = load_owned(&tx, caller, table, id)?;
        let found = current.version()?;
        if found != expected {
            debug!(%table, row = %id, %expected, %found, "stale version rejected");
            return Err(StoreError::Conflict(format!(
                "{table} row {id}: expected {expected}, found {found}"
            )));
        }

        let mut merged = current.fields()?;
        for (key, value) in fields {
            merged.insert(key, value);
        }
        let next = found
            .0
            .checked_add(1)
            .map(Version)
            .ok_or_else(|| StoreError::Unavailable(format!("version overflow on row {id}")))?;

        // Clamp so updated_at never precedes created_at under clock skew.
        let now = now_iso8601();
        let updated_at = if now < current.created_at {
            current.created_at.clone()
        } else {
            now
        };

        tx.execute(
            &format!(
                "UPDATE {table} SET body = ?1, version = ?2, updated_at = ?3 \
                 WHERE id = ?4 AND version = ?5"
            ),
            params![
                encode_body(&merged)?,
                to_sql_version(next)?,
                updated_at,
                id.as_str(),
                current.version
            ],
        )?;
        tx.commit()?;

        debug!(%table, row = %id, version = %next, "row updated");
        Ok(Row {
            id: id.clone(),
            user_id: caller.clone(),
            version: next,
            created_at: current.created_at,
            updated_at,
            fields: merged,
        })
    }

    fn delete(&self, caller: &UserId, table: Table, id: &RowId) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        load_owned(&tx, caller, table, id)?;
        tx.execute(
            &format!("DELETE FROM {table} WHERE id = ?1"),
            params![id.as_str()],
        )?;
        tx.commit()?;
        debug!(%table, row = %id, "row deleted");
        Ok(())
    }

    fn delete_user(&self, caller: &UserId) -> Result<(), StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        for table in Table::ALL {
            tx.execute(
                &format!("DELETE FROM {table} WHERE user_id = ?1"),
                params![caller.as_str()],
            )?;
        }
        tx.execute("DELETE FROM users WHERE id = ?1", params![caller.as_str()])?;
        tx.commit()?;
        info!(user = %caller, "user and all owned rows deleted");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(name: &str) -> UserId {
        UserId::new(name).expect("valid user id")
    }

    fn fields(value: serde_json::Value) -> Fields {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn migrations_set_schema_version() {
        let store = SqliteStore::open_in_memory().expect("open");
        assert_eq!(
            store.schema_version().expect("version"),
            i32::try_from(MIGRATIONS.len()).expect("fits")
        );
    }

    #[test]
    fn insert_assigns_metadata() {
        let store = SqliteStore::open_in_memory().expect("open");
        let alice = user("alice");
        let row = store
            .insert(&alice, Table::Credentials, fields(json!({"name": "Gmail"})))
            .expect("insert");
        assert_eq!(row.version, Version::INITIAL);
        assert_eq!(row.user_id, alice);
        assert_eq!(row.created_at, row.updated_at);
        assert_eq!(row.id.as_str().len(), 36);
    }

    #[test]
    fn select_is_scoped_to_caller() {
        let store = SqliteStore::open_in_memory().expect("open");
        let alice = user("alice");
        let bob = user("bob");
        let row = store
            .insert(&alice, Table::Credentials, fields(json!({"name": "a"})))
            .expect("insert");
        store
            .insert(&bob, Table::Credentials, fields(json!({"name": "b"})))
            .expect("insert");

        let mine = store
            .select(&alice, Table::Credentials, &Filter::All)
            .expect("select");
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].fields["name"], "a");

        let foreign = store
            .select(&bob, Table::Credentials, &Filter::Id(row.id))
            .expect("select");
        assert!(foreign.is_empty());
    }

    #[test]
    fn update_merges_and_bumps_version() {
        let store = SqliteStore::open_in_memory().expect("open");
        let alice = user("alice");
        let row = store
            .insert(
                &alice,
                Table::Credentials,
                fields(json!({"name": "a", "url": null})),
            )
            .expect("insert");
        let updated = store
            .update(
                &alice,
                Table::Credentials,
                &row.id,
                fields(json!({"url": "x"})),
                row.version,
            )
            .expect("update");
        assert_eq!(updated.version, Version(2));
        assert_eq!(updated.fields["name"], "a");
        assert_eq!(updated.fields["url"], "x");
        assert!(updated.updated_at >= updated.created_at);
    }

    #[test]
    fn stale_version_is_a_conflict() {
        let store = SqliteStore::open_in_memory().expect("open");
        let alice = user("alice");
        let row = store
            .insert(&alice, Table::Credentials, fields(json!({"n": 1})))
            .expect("insert");
        store
            .update(&alice, Table::Credentials, &row.id, fields(json!({"n": 2})), row.version)
            .expect("first update");
        let err = store
            .update(&alice, Table::Credentials, &row.id, fields(json!({"n": 3})), row.version)
            .expect_err("stale");
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn foreign_writes_are_unauthorized() {
        let store = SqliteStore::open_in_memory().expect("open");
        let alice = user("alice");
        let mallory = user("mallory");
        let row = store
            .insert(&alice, Table::Credentials, fields(json!({"n": 1})))
            .expect("insert");
        assert!(matches!(
            store.update(&mallory, Table::Credentials, &row.id, Fields::new(), row.version),
            Err(StoreError::Unauthorized(_))
        ));
        assert!(matches!(
            store.delete(&mallory, Table::Credentials, &row.id),
            Err(StoreError::Unauthorized(_))
        ));
    }

    #[test]
    fn missing_row_is_not_found() {
        let store = SqliteStore::open_in_memory().expect("open");
        let alice = user("alice");
        assert!(matches!(
            store.delete(&alice, Table::Credentials, &RowId::new("nope")),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn second_master_key_row_conflicts() {
        let store = SqliteStore::open_in_memory().expect("open");
        let alice = user("alice");
        store
            .insert(&alice, Table::MasterKeys, fields(json!({"k": 1})))
            .expect("first");
        assert!(matches!(
            store.insert(&alice, Table::MasterKeys, fields(json!({"k": 2}))),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn delete_user_removes_everything_owned() {
        let store = SqliteStore::open_in_memory().expect("open");
        let alice = user("alice");
        let bob = user("bob");
        for table in Table::ALL {
            store.insert(&alice, table, fields(json!({"x": 1}))).expect("insert");
        }
        store
            .insert(&bob, Table::Credentials, fields(json!({"x": 2})))
            .expect("insert");

        store.delete_user(&alice).expect("delete user");

        for table in Table::ALL {
            assert!(store
                .select(&alice, table, &Filter::All)
                .expect("select")
                .is_empty());
        }
        assert_eq!(
            store
                .select(&bob, Table::Credentials, &Filter::All)
                .expect("select")
                .len(),
            1
        );
    }
}
