//! SQLite bulk loader for the script registry
//!
//! One dump is one transaction: a single prepared insert executed once per
//! row, finalized, then committed. Any per-row failure rolls the whole
//! transaction back; partial loads are never committed.

use super::sink_backend::{ScriptBulkLoader, ScriptRow, SinkError};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::path::Path;

pub struct SqliteBulkLoader {
    conn: Connection,
}

impl SqliteBulkLoader {
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self, SinkError> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "journal_mode", "WAL")?;

        // Column order is fixed by the target relation; `apis` is part of
        // the declared schema even though this aggregator never writes it.
        conn.execute(
            "CREATE TABLE IF NOT EXISTS adblock (
                id INTEGER PRIMARY KEY,
                isolate TEXT NOT NULL,
                visible INTEGER NOT NULL,
                code TEXT NOT NULL,
                url TEXT NOT NULL,
                evaled_by INTEGER NOT NULL,
                apis TEXT,
                first_origin TEXT NOT NULL
            )",
            [],
        )?;

        log::info!("✅ SQLite adblock store initialized with WAL mode");

        Ok(Self { conn })
    }
}

#[async_trait]
impl ScriptBulkLoader for SqliteBulkLoader {
    async fn load_scripts(&mut self, rows: &[ScriptRow]) -> Result<(), SinkError> {
        let tx = self.conn.transaction()?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO adblock
                 (id, isolate, visible, code, url, evaled_by, apis, first_origin)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7)",
            )?;

            // A failed row drops `tx` uncommitted, rolling back the batch
            for row in rows {
                stmt.execute(params![
                    row.id,
                    row.isolate,
                    row.visible,
                    row.code,
                    row.url,
                    row.evaled_by,
                    row.first_origin,
                ])?;
            }
        }

        tx.commit()?;

        log::debug!("✅ Bulk-loaded {} scripts", rows.len());

        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "SQLite"
    }
}
