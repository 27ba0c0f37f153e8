//! SQLite-backed `Store` implementation, using `tokio_rusqlite` for a
//! non-blocking handle onto a WAL-mode connection. Schema is a single
//! namespaced key/value table per logical table name, plus an FTS5
//! index over archived messages.

use crate::error::{Error, Result};
use async_trait::async_trait;
use tokio_rusqlite::Connection;

use super::Store;

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub async fn open(path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let conn = Connection::open(&path)
            .await
            .map_err(|e| Error::StoreError(format!("failed to open sqlite store: {e}")))?;

        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA foreign_keys = ON;
                 CREATE TABLE IF NOT EXISTS kv (
                     table_name TEXT NOT NULL,
                     key TEXT NOT NULL,
                     value BLOB NOT NULL,
                     PRIMARY KEY (table_name, key)
                 );
                 CREATE VIRTUAL TABLE IF NOT EXISTS archived_messages_fts
                     USING fts5(chat_id UNINDEXED, message_id UNINDEXED, content);
                 CREATE TABLE IF NOT EXISTS archived_messages (
                     chat_id TEXT NOT NULL,
                     message_id TEXT NOT NULL PRIMARY KEY,
                     content TEXT NOT NULL
                 );
                 CREATE TRIGGER IF NOT EXISTS archived_messages_ai
                     AFTER INSERT ON archived_messages BEGIN
                         INSERT INTO archived_messages_fts(rowid, chat_id, message_id, content)
                         VALUES (new.rowid, new.chat_id, new.message_id, new.content);
                     END;
                 CREATE TRIGGER IF NOT EXISTS archived_messages_au
                     AFTER UPDATE ON archived_messages BEGIN
                         UPDATE archived_messages_fts SET content = new.content
                         WHERE rowid = new.rowid;
                     END;
                 CREATE TRIGGER IF NOT EXISTS archived_messages_ad
                     AFTER DELETE ON archived_messages BEGIN
                         DELETE FROM archived_messages_fts WHERE rowid = old.rowid;
                     END;",
            )?;
            Ok(())
        })
        .await
        .map_err(|e| Error::StoreError(format!("sqlite schema init failed: {e}")))?;

        Ok(Self { conn })
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn put(&self, table: &str, key: &str, value: Vec<u8>) -> Result<()> {
        let table = table.to_string();
        let key = key.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO kv (table_name, key, value) VALUES (?1, ?2, ?3)
                     ON CONFLICT(table_name, key) DO UPDATE SET value = excluded.value",
                    rusqlite::params![table, key, value],
                )?;
                Ok(())
            })
            .await
            .map_err(|e| Error::StoreError(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, table: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let table = table.to_string();
        let key = key.to_string();
        let value = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT value FROM kv WHERE table_name = ?1 AND key = ?2",
                )?;
                let mut rows = stmt.query(rusqlite::params![table, key])?;
                if let Some(row) = rows.next()? {
                    let value: Vec<u8> = row.get(0)?;
                    Ok(Some(value))
                } else {
                    Ok(None)
                }
            })
            .await
            .map_err(|e| Error::StoreError(e.to_string()))?;
        Ok(value)
    }

    async fn delete(&self, table: &str, key: &str) -> Result<()> {
        let table = table.to_string();
        let key = key.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "DELETE FROM kv WHERE table_name = ?1 AND key = ?2",
                    rusqlite::params![table, key],
                )?;
                Ok(())
            })
            .await
            .map_err(|e| Error::StoreError(e.to_string()))?;
        Ok(())
    }

    async fn list(&self, table: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let table = table.to_string();
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt =
                    conn.prepare("SELECT key, value FROM kv WHERE table_name = ?1")?;
                let rows = stmt
                    .query_map(rusqlite::params![table], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await
            .map_err(|e| Error::StoreError(e.to_string()))?;
        Ok(rows)
    }

    async fn delete_prefix(&self, table: &str, prefix: &str) -> Result<()> {
        let table = table.to_string();
        let like_pattern = format!("{prefix}%");
        self.conn
            .call(move |conn| {
                conn.execute(
                    "DELETE FROM kv WHERE table_name = ?1 AND key LIKE ?2",
                    rusqlite::params![table, like_pattern],
                )?;
                Ok(())
            })
            .await
            .map_err(|e| Error::StoreError(e.to_string()))?;
        Ok(())
    }

    async fn integrity_check(&self) -> Result<bool> {
        let ok = self
            .conn
            .call(|conn| {
                let result: String =
                    conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
                Ok(result == "ok")
            })
            .await
            .map_err(|e| Error::StoreError(e.to_string()))?;
        Ok(ok)
    }

    async fn delete_database(&self) -> Result<()> {
        self.conn
            .call(|conn| {
                conn.execute_batch(
                    "DELETE FROM kv; DELETE FROM archived_messages; DELETE FROM archived_messages_fts;",
                )?;
                Ok(())
            })
            .await
            .map_err(|e| Error::StoreError(e.to_string()))?;
        Ok(())
    }
}
