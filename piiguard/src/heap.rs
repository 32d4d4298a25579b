//! Heap side tables for substring search over encrypted columns.
//!
//! Each searchable column has a heap table of `(content, hash)` rows: the
//! lower-cased tokens of every value written, and their 8-hex-character
//! truncated HMAC. The owning row stores the concatenated token hashes in its
//! `*_bidx` column. A substring search finds matching tokens in the heap and
//! then matches owning rows whose `*_bidx` column contains any of their
//! hashes (see [`IndexPredicate`]).
//!
//! Rows are deduplicated with a read-then-write existence check. Concurrent
//! writers may both insert the same token; searches deduplicate hashes, so
//! this only costs storage.

use crate::error::Error;
use crate::mac::MacPrimitive;
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::sync::Mutex;

/// Postgres truncates identifiers beyond this length.
const MAX_IDENTIFIER_LEN: usize = 63;

/// One token destined for a heap table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapEntry {
    /// Lower-cased token.
    pub content: String,
    /// Destination heap table.
    pub table: String,
    /// Truncated keyed digest of `content`.
    pub hash: String,
}

/// A row read back from a heap table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapRow {
    /// Stored token.
    pub content: String,
    /// Truncated digest the token was stored under.
    pub hash: String,
}

/// Heap rows built from one value plus the digest for the owning row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapIndex {
    /// Concatenated token hashes, stored in the owning row's `*_bidx` column.
    pub digest: String,
    /// One entry per token, in token order.
    pub entries: Vec<HeapEntry>,
}

/// Storage for heap tables, implemented by the caller's database layer.
///
/// Calls are synchronous; run them inside whatever transaction or request
/// context the caller already holds.
pub trait HeapStore {
    /// Returns `true` if `table` already holds a row with `hash`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Store` if the lookup fails.
    fn hash_exists(&self, table: &str, hash: &str) -> Result<bool, Error>;

    /// Inserts one row into `entry.table`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Store` if the write fails.
    fn insert(&self, entry: &HeapEntry) -> Result<(), Error>;

    /// Returns rows of `table` whose content contains `pattern`, ignoring
    /// case.
    ///
    /// # Errors
    ///
    /// Returns `Error::Store` if the query fails.
    fn search_content(&self, table: &str, pattern: &str) -> Result<Vec<HeapRow>, Error>;
}

impl<T: HeapStore + ?Sized> HeapStore for &T {
    fn hash_exists(&self, table: &str, hash: &str) -> Result<bool, Error> {
        (**self).hash_exists(table, hash)
    }

    fn insert(&self, entry: &HeapEntry) -> Result<(), Error> {
        (**self).insert(entry)
    }

    fn search_content(&self, table: &str, pattern: &str) -> Result<Vec<HeapRow>, Error> {
        (**self).search_content(table, pattern)
    }
}

/// Checks that `name` is a plain, optionally schema-qualified, SQL
/// identifier.
///
/// # Errors
///
/// Returns `Error::InvalidTableName` otherwise.
pub fn validate_table_name(name: &str) -> Result<(), Error> {
    let valid_part = |part: &str| {
        let mut chars = part.chars();
        part.len() <= MAX_IDENTIFIER_LEN
            && chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    };

    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() <= 2 && parts.iter().all(|part| valid_part(part)) {
        Ok(())
    } else {
        Err(Error::InvalidTableName(name.to_owned()))
    }
}

/// Hashes `tokens` into heap entries for `table`.
///
/// Tokens are lower-cased before hashing so that searches are
/// case-insensitive end to end.
///
/// # Errors
///
/// Returns `Error::InvalidTableName` if `table` is not a plain identifier.
pub fn build_heap_entries<I, T>(mac: &MacPrimitive, tokens: I, table: &str) -> Result<HeapIndex, Error>
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    validate_table_name(table)?;

    let mut digest = String::new();
    let entries = tokens
        .into_iter()
        .map(|token| {
            let content = token.as_ref().to_lowercase();
            let hash = mac.compute_short(content.as_bytes());
            digest.push_str(&hash);
            HeapEntry { content, table: table.to_owned(), hash }
        })
        .collect();

    Ok(HeapIndex { digest, entries })
}

/// Writes entries whose hash is not yet present in their table.
///
/// A failed existence check is logged and treated as "absent". Insert
/// failures stop the loop and are returned. Returns the number of rows
/// inserted.
///
/// # Errors
///
/// Returns `Error::InvalidTableName` for a bad table name, or the first
/// insert error reported by `store`.
pub fn save_to_heap<S: HeapStore + ?Sized>(store: &S, entries: &[HeapEntry]) -> Result<usize, Error> {
    let mut inserted = 0;
    for entry in entries {
        validate_table_name(&entry.table)?;

        let exists = store.hash_exists(&entry.table, &entry.hash).unwrap_or_else(|e| {
            tracing::warn!(table = %entry.table, error = %e, "heap existence check failed, inserting");
            false
        });
        if exists {
            tracing::debug!(table = %entry.table, hash = %entry.hash, "heap row already present");
            continue;
        }

        store.insert(entry)?;
        inserted += 1;
        tracing::debug!(table = %entry.table, hash = %entry.hash, "heap row inserted");
    }
    Ok(inserted)
}

/// Returns the distinct hashes of heap rows whose content contains
/// `pattern`, in the order the store returned them.
///
/// # Errors
///
/// Returns `Error::InvalidTableName` or the store's error.
pub fn search_by_substring<S: HeapStore + ?Sized>(
    store: &S,
    table: &str,
    pattern: &str,
) -> Result<Vec<String>, Error> {
    validate_table_name(table)?;

    let mut seen = HashSet::new();
    Ok(store
        .search_content(table, pattern)?
        .into_iter()
        .filter_map(|row| seen.insert(row.hash.clone()).then_some(row.hash))
        .collect())
}

/// In-process heap store.
///
/// Search is a case-insensitive substring match; SQL wildcards in the
/// pattern are matched literally.
#[derive(Debug, Default)]
pub struct MemoryHeapStore {
    tables: Mutex<HashMap<String, Vec<HeapRow>>>,
}

impl MemoryHeapStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows in `table`, duplicates included.
    ///
    /// # Errors
    ///
    /// Returns `Error::Store` if the store lock is poisoned.
    pub fn row_count(&self, table: &str) -> Result<usize, Error> {
        Ok(self.lock()?.get(table).map_or(0, Vec::len))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<HeapRow>>>, Error> {
        self.tables.lock().map_err(|_| Error::Store("memory heap store lock poisoned".into()))
    }
}

impl HeapStore for MemoryHeapStore {
    fn hash_exists(&self, table: &str, hash: &str) -> Result<bool, Error> {
        Ok(self
            .lock()?
            .get(table)
            .is_some_and(|rows| rows.iter().any(|row| row.hash == hash)))
    }

    fn insert(&self, entry: &HeapEntry) -> Result<(), Error> {
        self.lock()?.entry(entry.table.clone()).or_default().push(HeapRow {
            content: entry.content.clone(),
            hash: entry.hash.clone(),
        });
        Ok(())
    }

    fn search_content(&self, table: &str, pattern: &str) -> Result<Vec<HeapRow>, Error> {
        let needle = pattern.to_lowercase();
        Ok(self
            .lock()?
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| row.content.to_lowercase().contains(&needle))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Parameterised SQL for one heap table, for database-backed stores.
///
/// Placeholders use the `$n` style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapStatements {
    insert: String,
    hash_exists: String,
    search_content: String,
}

impl HeapStatements {
    /// Renders the statements for `table`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidTableName` if `table` is not a plain identifier.
    pub fn new(table: &str) -> Result<Self, Error> {
        validate_table_name(table)?;
        Ok(Self {
            insert: format!("INSERT INTO {table} (content, hash) VALUES ($1, $2)"),
            hash_exists: format!("SELECT hash FROM {table} WHERE hash = $1"),
            search_content: format!("SELECT content, hash FROM {table} WHERE content ILIKE $1"),
        })
    }

    /// Binds `(content, hash)`.
    #[must_use]
    pub fn insert(&self) -> &str {
        &self.insert
    }

    /// Binds `hash`.
    #[must_use]
    pub fn hash_exists(&self) -> &str {
        &self.hash_exists
    }

    /// Binds [`HeapStatements::search_argument`].
    #[must_use]
    pub fn search_content(&self) -> &str {
        &self.search_content
    }

    /// The `ILIKE` argument for a substring search.
    #[must_use]
    pub fn search_argument(pattern: &str) -> String {
        format!("%{pattern}%")
    }
}

/// A `col LIKE $1 OR col LIKE $2 ...` predicate over a `*_bidx` column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPredicate {
    sql: String,
    args: Vec<String>,
}

impl IndexPredicate {
    /// Matches rows whose `column` contains any of `digests`.
    ///
    /// `column` is inserted verbatim and must come from the schema, never
    /// from user input. Returns `None` when `digests` is empty.
    #[must_use]
    pub fn any_of<T: AsRef<str>>(column: &str, digests: &[T]) -> Option<Self> {
        if digests.is_empty() {
            return None;
        }

        let mut sql = String::new();
        let mut args = Vec::with_capacity(digests.len());
        for (i, digest) in digests.iter().enumerate() {
            if i > 0 {
                sql.push_str(" OR ");
            }
            let _ = write!(sql, "{column} LIKE ${}", i + 1);
            args.push(format!("%{}%", digest.as_ref()));
        }

        Some(Self { sql, args })
    }

    /// `WHERE` clause fragment with `?` placeholders.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Bind arguments for [`IndexPredicate::sql`], in placeholder order.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Appends the predicate to `base_query` as its `WHERE` clause.
    #[must_use]
    pub fn apply_to(&self, base_query: &str) -> String {
        format!("{base_query} WHERE {}", self.sql)
    }

    /// Checks the predicate against a stored `*_bidx` value in memory.
    #[must_use]
    pub fn matches(&self, bidx_value: &str) -> bool {
        self.args.iter().any(|arg| bidx_value.contains(arg.trim_matches('%')))
    }
}
