//! One write connection plus a round-robin read pool.
//!
//! Every lock is taken with `try_lock_for(busy_timeout)`, and SQLite's own busy handler uses
//! the same bound, so no store call waits forever on a contended database.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use tracing::debug;

use crate::constants::MAX_READ_POOL_SIZE;

use super::error::{StoreError, StoreResult, storage_err};

fn apply_write_pragmas(conn: &Connection, busy_timeout: Duration) -> StoreResult<()> {
    conn.busy_timeout(busy_timeout)
        .map_err(storage_err("configure connection"))?;
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA cache_size = -16000;
        ",
    )
    .map_err(storage_err("configure connection"))
}

fn apply_read_pragmas(conn: &Connection, busy_timeout: Duration) -> StoreResult<()> {
    conn.busy_timeout(busy_timeout)
        .map_err(storage_err("configure connection"))?;
    conn.execute_batch("PRAGMA query_only = ON;")
        .map_err(storage_err("configure connection"))
}

pub(crate) struct ConnectionPool {
    writer: Mutex<Connection>,
    // Empty for in-memory stores: reads then share the writer.
    readers: Vec<Mutex<Connection>>,
    next: AtomicUsize,
    busy_timeout: Duration,
}

impl ConnectionPool {
    /// Opens the writer only; call [`attach_readers`](Self::attach_readers) once the schema exists.
    pub(crate) fn open(path: &Path, busy_timeout: Duration) -> StoreResult<Self> {
        let writer = Connection::open(path).map_err(storage_err("open database"))?;
        apply_write_pragmas(&writer, busy_timeout)?;
        Ok(Self {
            writer: Mutex::new(writer),
            readers: Vec::new(),
            next: AtomicUsize::new(0),
            busy_timeout,
        })
    }

    pub(crate) fn open_in_memory(busy_timeout: Duration) -> StoreResult<Self> {
        let writer = Connection::open_in_memory().map_err(storage_err("open database"))?;
        writer
            .execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(storage_err("configure connection"))?;
        writer
            .busy_timeout(busy_timeout)
            .map_err(storage_err("configure connection"))?;
        Ok(Self {
            writer: Mutex::new(writer),
            readers: Vec::new(),
            next: AtomicUsize::new(0),
            busy_timeout,
        })
    }

    /// Opens `size` read-only connections (clamped to `1..=8`) to the database at `path`.
    pub(crate) fn attach_readers(&mut self, path: &Path, size: usize) -> StoreResult<()> {
        let size = size.clamp(1, MAX_READ_POOL_SIZE);
        let mut readers = Vec::with_capacity(size);
        for _ in 0..size {
            let conn = Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .map_err(storage_err("open read connection"))?;
            apply_read_pragmas(&conn, self.busy_timeout)?;
            readers.push(Mutex::new(conn));
        }
        debug!(readers = size, "read pool attached");
        self.readers = readers;
        Ok(())
    }

    /// Runs `f` with exclusive access to the write connection.
    pub(crate) fn with_writer<F, T>(&self, operation: &'static str, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T>,
    {
        let mut guard = self
            .writer
            .try_lock_for(self.busy_timeout)
            .ok_or_else(|| self.lock_timeout(operation))?;
        f(&mut guard)
    }

    /// Runs `f` on the next read connection (round-robin), or on the writer when there are none.
    pub(crate) fn with_reader<F, T>(&self, operation: &'static str, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T>,
    {
        if self.readers.is_empty() {
            return self.with_writer(operation, |conn| f(conn));
        }

        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        let guard = self.readers[idx]
            .try_lock_for(self.busy_timeout)
            .ok_or_else(|| self.lock_timeout(operation))?;
        f(&guard)
    }

    pub(crate) fn reader_count(&self) -> usize {
        self.readers.len()
    }

    /// Checkpoints the WAL and releases every connection.
    pub(crate) fn close(self) -> StoreResult<()> {
        drop(self.readers);
        let writer = self.writer.into_inner();
        if let Err(e) = writer.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);") {
            debug!(error = %e, "wal checkpoint skipped");
        }
        writer
            .close()
            .map_err(|(_, e)| storage_err("close database")(e))
    }

    fn lock_timeout(&self, operation: &'static str) -> StoreError {
        StoreError::StorageUnavailable {
            operation,
            reason: format!(
                "connection busy for more than {} ms",
                self.busy_timeout.as_millis()
            ),
        }
    }
}
