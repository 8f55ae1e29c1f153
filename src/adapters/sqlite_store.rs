//! SQLite-backed `DiscoveryStore`, used when `DATABASE_URL` points at a
//! local sqlite file. The corpus adapter's vector search still requires a
//! real pgvector-style backend (out of core scope, §1); this store only
//! persists terminal synthesis records.

use async_trait::async_trait;
use rusqlite::{Connection, params};
use std::path::Path;
use std::sync::Mutex;

use super::{DiscoveryRecord, DiscoveryStore};
use crate::errors::StageError;

pub struct SqliteDiscoveryStore {
    conn: Mutex<Connection>,
}

impl SqliteDiscoveryStore {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn: Mutex::new(conn) };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn: Mutex::new(conn) };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> anyhow::Result<()> {
        self.conn.lock().unwrap().execute_batch(
            "CREATE TABLE IF NOT EXISTS discoveries (
                discovery_id TEXT PRIMARY KEY,
                query TEXT NOT NULL,
                synthesis TEXT NOT NULL,
                confidence_tier TEXT NOT NULL,
                quality_score REAL NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )?;
        Ok(())
    }
}

#[async_trait]
impl DiscoveryStore for SqliteDiscoveryStore {
    async fn save(&self, record: DiscoveryRecord) -> Result<String, StageError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO discoveries
                (discovery_id, query, synthesis, confidence_tier, quality_score)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.discovery_id,
                record.query,
                record.synthesis,
                record.confidence_tier,
                record.quality_score,
            ],
        )
        .map_err(|e| StageError::transient("discovery_store", e.to_string()))?;
        Ok(record.discovery_id)
    }

    async fn list(&self, tier_filter: Option<&str>) -> Result<Vec<DiscoveryRecord>, StageError> {
        let conn = self.conn.lock().unwrap();
        let mut rows = Vec::new();
        let mut push_row = |r: &rusqlite::Row| -> rusqlite::Result<()> {
            rows.push(DiscoveryRecord {
                discovery_id: r.get(0)?,
                query: r.get(1)?,
                synthesis: r.get(2)?,
                confidence_tier: r.get(3)?,
                quality_score: r.get(4)?,
            });
            Ok(())
        };

        let query = "SELECT discovery_id, query, synthesis, confidence_tier, quality_score \
                      FROM discoveries";
        let result = match tier_filter {
            Some(tier) => {
                let mut stmt = conn
                    .prepare(&format!("{query} WHERE confidence_tier = ?1"))
                    .map_err(|e| StageError::internal("discovery_store", e.to_string()))?;
                stmt.query_map(params![tier], |r| {
                    push_row(r)?;
                    Ok(())
                })
                .map(|iter| iter.collect::<Result<Vec<_>, _>>())
            }
            None => {
                let mut stmt = conn
                    .prepare(query)
                    .map_err(|e| StageError::internal("discovery_store", e.to_string()))?;
                stmt.query_map([], |r| {
                    push_row(r)?;
                    Ok(())
                })
                .map(|iter| iter.collect::<Result<Vec<_>, _>>())
            }
        };
        result
            .and_then(|inner| inner)
            .map_err(|e| StageError::transient("discovery_store", e.to_string()))?;
        Ok(rows)
    }
}
