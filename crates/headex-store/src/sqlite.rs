//! SQLite implementation of the Store trait.
//!
//! The persistent storage backend. Uses rusqlite with bundled SQLite, wrapped
//! in async via `tokio::task::spawn_blocking`.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use headex_core::{ExtendedHeader, HeaderHash};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Result, StoreError};
use crate::migration::{self, now_millis};
use crate::traits::Store;

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. The head height is cached so that
/// [`Store::height`] does not touch the database.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    head_height: Arc<AtomicU64>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path, creating and migrating it
    /// as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        migration::migrate(&mut conn)?;
        let height = load_height(&conn)?;
        tracing::debug!(height, "opened sqlite header store");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            head_height: Arc::new(AtomicU64::new(height)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| StoreError::LockPoisoned)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn load_height(conn: &Connection) -> Result<u64> {
    let height: i64 = conn.query_row("SELECT COALESCE(MAX(height), 0) FROM headers", [], |row| {
        row.get(0)
    })?;
    from_sql_height(height)
}

fn to_sql_height(height: u64) -> Result<i64> {
    i64::try_from(height)
        .map_err(|_| StoreError::InvalidData(format!("height {} exceeds storage range", height)))
}

fn from_sql_height(height: i64) -> Result<u64> {
    u64::try_from(height).map_err(|_| StoreError::InvalidData(format!("negative height {}", height)))
}

fn decode(encoded: Vec<u8>) -> Result<ExtendedHeader> {
    Ok(ExtendedHeader::unmarshal(&encoded)?)
}

/// Insert the new headers of a batch in one transaction.
///
/// Returns `(inserted, highest inserted height)`.
fn insert_batch(conn: &mut Connection, headers: &[ExtendedHeader]) -> Result<(usize, u64)> {
    let tx = conn.transaction()?;
    let now = now_millis();
    let mut inserted = 0;
    let mut top = 0;

    for header in headers {
        let hash = header.hash();
        let height = to_sql_height(header.height())?;

        let known: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM headers WHERE hash = ?1",
                params![hash.as_bytes().as_slice()],
                |row| row.get(0),
            )
            .optional()?;
        if known.is_some() {
            continue;
        }

        let occupant: Option<Vec<u8>> = tx
            .query_row(
                "SELECT hash FROM headers WHERE height = ?1",
                params![height],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(existing) = occupant {
            let existing = HeaderHash::try_from(existing.as_slice())
                .map(|h| h.to_hex())
                .unwrap_or_default();
            return Err(StoreError::Conflict {
                height: header.height(),
                existing,
            });
        }

        tx.execute(
            "INSERT INTO headers (hash, height, encoded, ingested_at) VALUES (?1, ?2, ?3, ?4)",
            params![hash.as_bytes().as_slice(), height, header.marshal(), now],
        )?;
        inserted += 1;
        top = top.max(header.height());
    }

    tx.commit()?;
    Ok((inserted, top))
}

#[async_trait]
impl Store for SqliteStore {
    async fn init(&self, initial: &ExtendedHeader) -> Result<()> {
        let initial = initial.clone();
        let (_, top) = self
            .blocking(move |conn| {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM headers", [], |row| row.get(0))?;
                if count > 0 {
                    return Err(StoreError::AlreadyInitialized);
                }
                insert_batch(conn, std::slice::from_ref(&initial))
            })
            .await?;
        self.head_height.fetch_max(top, Ordering::SeqCst);
        Ok(())
    }

    async fn head(&self) -> Result<ExtendedHeader> {
        match self.height() {
            0 => Err(StoreError::NotFound("store is empty".into())),
            height => self.get_by_height(height).await,
        }
    }

    fn height(&self) -> u64 {
        self.head_height.load(Ordering::SeqCst)
    }

    async fn get(&self, hash: &HeaderHash) -> Result<ExtendedHeader> {
        let hash = *hash;
        self.blocking(move |conn| {
            let encoded: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT encoded FROM headers WHERE hash = ?1",
                    params![hash.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            match encoded {
                Some(bytes) => decode(bytes),
                None => Err(StoreError::NotFound(format!("hash {}", hash))),
            }
        })
        .await
    }

    async fn get_by_height(&self, height: u64) -> Result<ExtendedHeader> {
        let sql_height = to_sql_height(height)?;
        self.blocking(move |conn| {
            let encoded: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT encoded FROM headers WHERE height = ?1",
                    params![sql_height],
                    |row| row.get(0),
                )
                .optional()?;
            match encoded {
                Some(bytes) => decode(bytes),
                None => Err(StoreError::NotFound(format!("height {}", height))),
            }
        })
        .await
    }

    async fn get_range_by_height(&self, from: u64, to: u64) -> Result<Vec<ExtendedHeader>> {
        if to <= from {
            return Err(StoreError::InvalidRange { from, to });
        }
        if to - 1 > self.height() {
            return Err(StoreError::NotFound(format!("height {}", to - 1)));
        }

        let (sql_from, sql_to) = (to_sql_height(from)?, to_sql_height(to)?);
        let encoded = self
            .blocking(move |conn| {
                let mut stmt = conn.prepare_cached(
                    "SELECT encoded FROM headers WHERE height >= ?1 AND height < ?2 ORDER BY height",
                )?;
                let rows = stmt
                    .query_map(params![sql_from, sql_to], |row| row.get::<_, Vec<u8>>(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        // Heights are unique, so a full count means no holes.
        if (encoded.len() as u64) != to - from {
            return Err(StoreError::NotFound(format!(
                "range [{}, {}) has missing heights",
                from, to
            )));
        }
        encoded.into_iter().map(decode).collect()
    }

    async fn has(&self, hash: &HeaderHash) -> Result<bool> {
        let hash = *hash;
        self.blocking(move |conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM headers WHERE hash = ?1",
                    params![hash.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
        .await
    }

    async fn append(&self, headers: &[ExtendedHeader]) -> Result<usize> {
        if headers.is_empty() {
            return Ok(0);
        }
        let headers = headers.to_vec();
        let (inserted, top) = self.blocking(move |conn| insert_batch(conn, &headers)).await?;
        self.head_height.fetch_max(top, Ordering::SeqCst);
        tracing::debug!(inserted, height = self.height(), "appended headers");
        Ok(inserted)
    }
}
