//! One ordered KV namespace per user nickname.
//!
//! Backed by `redb`, an embedded ordered key-value store: `notes/<lex-id>`
//! and `messages/<lex-id>` keys iterate in numeric order because
//! [`crate::lexid`] encodes ids to sort that way as plain byte strings.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use redb::{Database, ReadableTable, TableDefinition};

use crate::error::StorageError;
use crate::lexid;

const KV: TableDefinition<&str, &[u8]> = TableDefinition::new("kv");

/// Reserved key holding the nickname's bound public key, serialized form
/// left to the caller (whisper-crypto's `PublicKeyInfo` as JSON, in
/// practice).
pub const PUBLIC_KEY_KEY: &str = "public_key";

/// Key prefix under which notes are appended.
pub const NOTES_PREFIX: &str = "notes/";

/// Key prefix under which messages are appended.
pub const MESSAGES_PREFIX: &str = "messages/";

/// One user's ordered KV namespace.
///
/// Cheap to clone (wraps an `Arc<redb::Database>`); `redb` itself is safe to
/// use concurrently from multiple clones, so this can be shared across
/// connections without any additional synchronization beyond what
/// [`UserDbCache`] uses for the cache map itself.
#[derive(Clone)]
pub struct UserDb {
    db: Arc<Database>,
}

impl UserDb {
    /// Open (creating if missing) the database file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Backend`] if the file cannot be created or
    /// opened, or if the initial table cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref()).map_err(|e| StorageError::Backend(e.to_string()))?;

        let txn = db.begin_write().map_err(|e| StorageError::Backend(e.to_string()))?;
        {
            let _ = txn.open_table(KV).map_err(|e| StorageError::Backend(e.to_string()))?;
        }
        txn.commit().map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Point lookup of a single key.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Backend`] on a storage engine failure. A
    /// missing key is `Ok(None)`, not an error.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let txn = self.db.begin_read().map_err(|e| StorageError::Backend(e.to_string()))?;
        let table = txn.open_table(KV).map_err(|e| StorageError::Backend(e.to_string()))?;
        match table.get(key).map_err(|e| StorageError::Backend(e.to_string()))? {
            Some(guard) => Ok(Some(guard.value().to_vec())),
            None => Ok(None),
        }
    }

    /// Get the public key bytes bound to this nickname, if any.
    ///
    /// # Errors
    ///
    /// See [`Self::get`].
    pub fn get_public_key(&self) -> Result<Option<Vec<u8>>, StorageError> {
        self.get(PUBLIC_KEY_KEY)
    }

    /// Bind `key_bytes` as this nickname's public key.
    ///
    /// Idempotent if a key is already bound and equal to `key_bytes`;
    /// returns [`StorageError::KeyMismatch`] if a *different* key is already
    /// bound. The read-compare-write happens inside one write transaction so
    /// two connections racing to bind the first key for a nickname cannot
    /// both "win".
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::KeyMismatch`] on a mismatched rebind attempt,
    /// or [`StorageError::Backend`] on a storage engine failure.
    pub fn put_public_key(&self, key_bytes: &[u8]) -> Result<(), StorageError> {
        let txn = self.db.begin_write().map_err(|e| StorageError::Backend(e.to_string()))?;
        {
            let mut table = txn.open_table(KV).map_err(|e| StorageError::Backend(e.to_string()))?;
            let existing =
                table.get(PUBLIC_KEY_KEY).map_err(|e| StorageError::Backend(e.to_string()))?;
            match &existing {
                Some(guard) if guard.value() == key_bytes => return Ok(()),
                Some(_) => return Err(StorageError::KeyMismatch),
                None => {},
            }
            drop(existing);
            table
                .insert(PUBLIC_KEY_KEY, key_bytes)
                .map_err(|e| StorageError::Backend(e.to_string()))?;
        }
        txn.commit().map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(())
    }

    /// Append `value` under `prefix`, assigning it the successor of the
    /// largest existing lex-id under that prefix (or `0` if none exists).
    /// Returns the assigned id.
    ///
    /// Atomic: the id computation and the insert happen in one write
    /// transaction, so concurrent appenders never collide.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::CorruptKey`] if an existing key under
    /// `prefix` has a malformed lex-id suffix, or [`StorageError::Backend`]
    /// on a storage engine failure.
    pub fn append(&self, prefix: &str, value: &[u8]) -> Result<u64, StorageError> {
        let txn = self.db.begin_write().map_err(|e| StorageError::Backend(e.to_string()))?;
        let next_id = {
            let mut table = txn.open_table(KV).map_err(|e| StorageError::Backend(e.to_string()))?;
            let next_id = last_id_under(&table, prefix)?.map_or(0, |last| last + 1);
            let full_key = format!("{prefix}{}", lexid::encode(next_id));
            table.insert(full_key.as_str(), value).map_err(|e| StorageError::Backend(e.to_string()))?;
            next_id
        };
        txn.commit().map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(next_id)
    }

    /// Bounded forward or reverse scan under `prefix`.
    ///
    /// `n > 0` scans forward from the smallest id, up to `n` entries.
    /// `n < 0` scans backward from the largest id, up to `n.unsigned_abs()`
    /// entries. `n == 0` visits nothing. `f` is invoked with the decoded id
    /// and the raw stored value, in scan order; returning `Err` from `f`
    /// stops the scan and the error propagates out of `collect`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::CorruptKey`] on a malformed stored key,
    /// [`StorageError::Backend`] on a storage engine failure, or whatever
    /// `f` returns.
    pub fn collect(
        &self,
        prefix: &str,
        n: i64,
        mut f: impl FnMut(u64, &[u8]) -> Result<(), StorageError>,
    ) -> Result<(), StorageError> {
        let txn = self.db.begin_read().map_err(|e| StorageError::Backend(e.to_string()))?;
        let table = txn.open_table(KV).map_err(|e| StorageError::Backend(e.to_string()))?;
        let upper = prefix_upper_bound(prefix);
        let range = table
            .range(prefix..upper.as_str())
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let take = n.unsigned_abs() as usize;
        if take == 0 {
            return Ok(());
        }

        if n > 0 {
            for entry in range.take(take) {
                let (key, value) = entry.map_err(|e| StorageError::Backend(e.to_string()))?;
                let id = lexid::decode(&key.value()[prefix.len()..])?;
                f(id, value.value())?;
            }
        } else {
            for entry in range.rev().take(take) {
                let (key, value) = entry.map_err(|e| StorageError::Backend(e.to_string()))?;
                let id = lexid::decode(&key.value()[prefix.len()..])?;
                f(id, value.value())?;
            }
        }
        Ok(())
    }
}

fn last_id_under(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
    prefix: &str,
) -> Result<Option<u64>, StorageError> {
    let upper = prefix_upper_bound(prefix);
    let mut last = None;
    for entry in
        table.range(prefix..upper.as_str()).map_err(|e| StorageError::Backend(e.to_string()))?
    {
        let (key, _) = entry.map_err(|e| StorageError::Backend(e.to_string()))?;
        last = Some(lexid::decode(&key.value()[prefix.len()..])?);
    }
    Ok(last)
}

/// Smallest string greater than every string starting with `prefix`, by
/// incrementing the last byte that is not already `0xFF` and truncating any
/// trailing `0xFF` bytes before it.
fn prefix_upper_bound(prefix: &str) -> String {
    let mut bytes = prefix.as_bytes().to_vec();
    while let Some(&last) = bytes.last() {
        if last < 0xFF {
            let new_last = last + 1;
            *bytes.last_mut().expect("checked non-empty above") = new_last;
            return String::from_utf8(bytes)
                .expect("incrementing one ASCII prefix byte stays valid UTF-8");
        }
        bytes.pop();
    }
    "\u{10FFFF}".to_string()
}

/// Process-wide cache of open [`UserDb`] handles, one per nickname.
///
/// Insertion *and* lookup are both serialized by the same mutex, closing a
/// read/write race on the underlying map that would otherwise be possible
/// during concurrent first-opens of the same nickname.
pub struct UserDbCache {
    base_dir: PathBuf,
    handles: Mutex<HashMap<String, UserDb>>,
}

impl UserDbCache {
    /// Create a cache rooted at `base_dir`; database files are created as
    /// `<base_dir>/<nick>.redb`.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into(), handles: Mutex::new(HashMap::new()) }
    }

    /// Open `nick`'s database, creating it on first use, and returning the
    /// cached handle on every subsequent call.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Backend`] if the database file cannot be
    /// created or opened.
    pub fn open(&self, nick: &str) -> Result<UserDb, StorageError> {
        let mut handles = self.handles.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(db) = handles.get(nick) {
            return Ok(db.clone());
        }
        let path = self.base_dir.join(format!("{nick}.redb"));
        let db = UserDb::open(path)?;
        handles.insert(nick.to_string(), db.clone());
        Ok(db)
    }
}
