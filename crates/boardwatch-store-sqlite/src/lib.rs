// # boardwatch-store-sqlite
//
// SQLite-backed implementation of the `DedupStore` trait.
//
// One table holds every seen id, scoped by `(namespace, key)`. The store is
// what carries first-sighting knowledge across process restarts: a watch job
// that re-seeds its in-memory state on startup still consults this store on
// the emit path, so an id notified in a previous lifetime stays silent.
//
// The connection lives behind a `std::sync::Mutex`. Operations are single
// indexed statements on a local file, so they run inline on the async
// caller rather than bouncing through a blocking pool.

use async_trait::async_trait;
use rusqlite::{Connection, params};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

use boardwatch_core::{DedupStore, Error};

/// SQLite's default variable limit is 999; stay well under it when
/// building `IN (...)` lists.
const BATCH_CHUNK: usize = 500;

pub struct SqliteDedupStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDedupStore {
    /// Open (or create) a store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory store. Useful in tests; contents do not
    /// survive the process.
    pub fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, Error> {
        conn.pragma_update(None, "journal_mode", "WAL").map_err(db_err)?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(db_err)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                namespace TEXT NOT NULL,
                key TEXT NOT NULL,
                event_id TEXT NOT NULL,
                seen_at INTEGER NOT NULL,
                PRIMARY KEY (namespace, key, event_id)
            );

            CREATE INDEX IF NOT EXISTS idx_events_seen_at
                ON events(namespace, key, seen_at);
            "#,
        )
        .map_err(db_err)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.conn
            .lock()
            .map_err(|_| Error::store("dedup store connection lock poisoned"))
    }
}

fn db_err(e: rusqlite::Error) -> Error {
    Error::store(e.to_string())
}

fn now_epoch() -> i64 {
    chrono::Utc::now().timestamp()
}

#[async_trait]
impl DedupStore for SqliteDedupStore {
    async fn has(&self, namespace: &str, key: &str, event_id: &str) -> Result<bool, Error> {
        let conn = self.conn()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM events WHERE namespace = ?1 AND key = ?2 AND event_id = ?3",
                params![namespace, key, event_id],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(db_err(other)),
            })?;
        Ok(found.is_some())
    }

    async fn add(&self, namespace: &str, key: &str, event_id: &str) -> Result<(), Error> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO events (namespace, key, event_id, seen_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![namespace, key, event_id, now_epoch()],
        )
        .map_err(db_err)?;
        Ok(())
    }

    async fn add_if_new(&self, namespace: &str, key: &str, event_id: &str) -> Result<bool, Error> {
        let conn = self.conn()?;
        // INSERT OR IGNORE under the connection lock makes the
        // check-and-insert atomic; the changes count says whether the row
        // was actually new.
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO events (namespace, key, event_id, seen_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![namespace, key, event_id, now_epoch()],
            )
            .map_err(db_err)?;
        Ok(inserted > 0)
    }

    async fn filter_new(
        &self,
        namespace: &str,
        key: &str,
        event_ids: &[String],
    ) -> Result<Vec<String>, Error> {
        if event_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn()?;
        let mut seen = HashSet::new();
        for chunk in event_ids.chunks(BATCH_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT event_id FROM events
                 WHERE namespace = ? AND key = ? AND event_id IN ({placeholders})"
            );
            let mut stmt = conn.prepare(&sql).map_err(db_err)?;
            let mut values: Vec<&dyn rusqlite::ToSql> = vec![&namespace, &key];
            for id in chunk {
                values.push(id);
            }
            let rows = stmt
                .query_map(&values[..], |row| row.get::<_, String>(0))
                .map_err(db_err)?;
            for row in rows {
                seen.insert(row.map_err(db_err)?);
            }
        }
        Ok(event_ids
            .iter()
            .filter(|id| !seen.contains(*id))
            .cloned()
            .collect())
    }

    async fn add_many(
        &self,
        namespace: &str,
        key: &str,
        event_ids: &[String],
    ) -> Result<usize, Error> {
        if event_ids.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn()?;
        let now = now_epoch();
        let tx = conn.transaction().map_err(db_err)?;
        let mut inserted = 0usize;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR IGNORE INTO events (namespace, key, event_id, seen_at)
                     VALUES (?1, ?2, ?3, ?4)",
                )
                .map_err(db_err)?;
            for id in event_ids {
                inserted += stmt
                    .execute(params![namespace, key, id, now])
                    .map_err(db_err)?;
            }
        }
        tx.commit().map_err(db_err)?;
        Ok(inserted)
    }

    async fn prune(&self, namespace: &str, key: &str, keep: usize) -> Result<usize, Error> {
        let conn = self.conn()?;
        // rowid breaks seen_at ties in insertion order, so "most recent"
        // stays stable within a one-second burst.
        let deleted = conn
            .execute(
                "DELETE FROM events
                 WHERE namespace = ?1 AND key = ?2 AND rowid NOT IN (
                     SELECT rowid FROM events
                     WHERE namespace = ?1 AND key = ?2
                     ORDER BY seen_at DESC, rowid DESC
                     LIMIT ?3
                 )",
                params![namespace, key, keep as i64],
            )
            .map_err(db_err)?;
        if deleted > 0 {
            debug!(namespace, key, deleted, "pruned dedup records");
        }
        Ok(deleted)
    }

    async fn purge_older_than(&self, age: Duration) -> Result<usize, Error> {
        let cutoff = now_epoch() - age.as_secs() as i64;
        let conn = self.conn()?;
        let deleted = conn
            .execute("DELETE FROM events WHERE seen_at < ?1", params![cutoff])
            .map_err(db_err)?;
        if deleted > 0 {
            debug!(deleted, "purged aged dedup records");
        }
        Ok(deleted)
    }

    async fn stats(&self) -> Result<HashMap<String, u64>, Error> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT namespace, COUNT(*) FROM events GROUP BY namespace")
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(db_err)?;
        let mut out = HashMap::new();
        for row in rows {
            let (ns, count) = row.map_err(db_err)?;
            out.insert(ns, count.max(0) as u64);
        }
        Ok(out)
    }

    async fn clear(&self, namespace: Option<&str>, key: Option<&str>) -> Result<usize, Error> {
        let conn = self.conn()?;
        let deleted = match (namespace, key) {
            (Some(ns), Some(k)) => conn
                .execute(
                    "DELETE FROM events WHERE namespace = ?1 AND key = ?2",
                    params![ns, k],
                )
                .map_err(db_err)?,
            (Some(ns), None) => conn
                .execute("DELETE FROM events WHERE namespace = ?1", params![ns])
                .map_err(db_err)?,
            (None, None) => conn.execute("DELETE FROM events", []).map_err(db_err)?,
            (None, Some(_)) => {
                return Err(Error::invalid_input(
                    "clear by key requires a namespace",
                ));
            }
        };
        Ok(deleted)
    }
}
