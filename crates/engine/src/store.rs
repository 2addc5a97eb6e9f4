use anyhow::Context;
use irke_town_protocol::{Building, Connection, SaveSummary, TownState, TOWN_FORMAT_VERSION};
use rusqlite::{Connection as Db, OpenFlags, OptionalExtension, TransactionBehavior};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::{new_id, now_ms};

/// Named town snapshots in a single SQLite file.
///
/// Each save row keeps the JSON-encoded [`TownState`] in `data`; timestamps are
/// mirrored into integer columns for ordering.
#[derive(Debug, Clone)]
pub struct TownStore {
    db_path: PathBuf,
}

impl TownStore {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn open(&self) -> anyhow::Result<Db> {
        let path = self.db_path.clone();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create db dir: {}", dir.display()))?;
        }

        let conn = Db::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("open sqlite db: {}", path.display()))?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        migrate(&conn)?;
        Ok(conn)
    }

    /// Newest first.
    pub fn list_saves(&self) -> anyhow::Result<Vec<SaveSummary>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, created_at_ms, updated_at_ms FROM saves ORDER BY updated_at_ms DESC, id DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, name, created, updated) = row?;
            out.push(SaveSummary {
                id,
                name,
                created_at: from_ms(created)?,
                updated_at: from_ms(updated)?,
            });
        }
        Ok(out)
    }

    pub fn save_town(
        &self,
        name: &str,
        buildings: &[Building],
        connections: &[Connection],
    ) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let state = TownState {
            id: new_id("town"),
            name: name.to_string(),
            buildings: buildings.to_vec(),
            connections: connections.to_vec(),
            created_at: now,
            updated_at: now,
            version: TOWN_FORMAT_VERSION.to_string(),
        };
        let data = serde_json::to_string(&state).context("encode town")?;
        let ts = to_ms(now);

        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO saves (id, name, data, created_at_ms, updated_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            (&state.id, name, &data, ts),
        )?;
        append_event_tx(
            &tx,
            "town.saved",
            &state.id,
            serde_json::json!({
                "name": name,
                "buildings": buildings.len(),
                "connections": connections.len(),
            }),
        )?;
        tx.commit()?;
        info!(town = %state.id, name, "town saved");
        Ok(state.id)
    }

    /// `None` for an unknown id or a row whose snapshot no longer decodes.
    pub fn load_town(&self, id: &str) -> anyhow::Result<Option<TownState>> {
        let conn = self.open()?;
        read_state(&conn, id)
    }

    pub fn update_town(
        &self,
        id: &str,
        buildings: &[Building],
        connections: &[Connection],
    ) -> anyhow::Result<bool> {
        let mut conn = self.open()?;
        // Write lock up front: the row read here is the row updated below.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let Some(mut state) = read_state(&tx, id)? else {
            return Ok(false);
        };
        state.buildings = buildings.to_vec();
        state.connections = connections.to_vec();
        state.updated_at = OffsetDateTime::now_utc();
        let data = serde_json::to_string(&state).context("encode town")?;

        let n = tx.execute(
            "UPDATE saves SET data = ?2, updated_at_ms = ?3 WHERE id = ?1",
            (id, &data, to_ms(state.updated_at)),
        )?;
        if n > 0 {
            append_event_tx(
                &tx,
                "town.updated",
                id,
                serde_json::json!({
                    "buildings": buildings.len(),
                    "connections": connections.len(),
                }),
            )?;
        }
        tx.commit()?;
        Ok(n > 0)
    }

    pub fn delete_town(&self, id: &str) -> anyhow::Result<bool> {
        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        let n = tx.execute("DELETE FROM saves WHERE id = ?1", [id])?;
        if n > 0 {
            append_event_tx(&tx, "town.deleted", id, serde_json::json!({ "id": id }))?;
        }
        tx.commit()?;
        Ok(n > 0)
    }

    /// Writes into the current session's save, if there is one.
    pub fn autosave(
        &self,
        session: Option<&str>,
        buildings: &[Building],
        connections: &[Connection],
    ) -> anyhow::Result<bool> {
        match session {
            Some(id) => self.update_town(id, buildings, connections),
            None => Ok(false),
        }
    }

    pub fn get_rev(&self) -> anyhow::Result<i64> {
        let conn = self.open()?;
        let rev: Option<i64> =
            conn.query_row("SELECT MAX(seq) FROM event_log", [], |row| row.get(0))?;
        Ok(rev.unwrap_or(0))
    }
}

fn to_ms(t: OffsetDateTime) -> i64 {
    i64::try_from(t.unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX)
}

fn from_ms(ms: i64) -> anyhow::Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000)
        .with_context(|| format!("timestamp out of range: {ms}"))
}

fn migrate(conn: &Db) -> anyhow::Result<()> {
    let v: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if v < 1 {
        conn.execute_batch(
            r#"
CREATE TABLE IF NOT EXISTS saves (
  id TEXT PRIMARY KEY,
  name TEXT NOT NULL,
  data TEXT NOT NULL,
  created_at_ms INTEGER NOT NULL,
  updated_at_ms INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_saves_updated_at ON saves(updated_at_ms);

-- Monotonic revision source for clients polling for changes.
CREATE TABLE IF NOT EXISTS event_log (
  seq INTEGER PRIMARY KEY AUTOINCREMENT,
  ts_ms INTEGER NOT NULL,
  kind TEXT NOT NULL,
  town_id TEXT,
  payload_json TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_event_log_kind ON event_log(kind);
"#,
        )?;

        conn.pragma_update(None, "user_version", 1_i64)?;
    }

    Ok(())
}

fn read_state(conn: &Db, id: &str) -> anyhow::Result<Option<TownState>> {
    let data: Option<String> = conn
        .query_row("SELECT data FROM saves WHERE id = ?1", [id], |row| row.get(0))
        .optional()?;
    let Some(data) = data else {
        return Ok(None);
    };
    match serde_json::from_str::<TownState>(&data) {
        Ok(state) => Ok(Some(state)),
        Err(e) => {
            warn!(town = %id, error = %e, "stored town does not decode");
            Ok(None)
        }
    }
}

fn append_event_tx(
    tx: &rusqlite::Transaction<'_>,
    kind: &str,
    town_id: &str,
    payload: serde_json::Value,
) -> anyhow::Result<i64> {
    let ts = now_ms();
    let payload_json = payload.to_string();
    tx.execute(
        "INSERT INTO event_log (ts_ms, kind, town_id, payload_json) VALUES (?1, ?2, ?3, ?4)",
        (ts, kind, town_id, payload_json),
    )?;
    Ok(tx.last_insert_rowid())
}
