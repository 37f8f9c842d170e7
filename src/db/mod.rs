use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};

pub mod models;
use models::*;

use crate::refresh::SnapshotStore;

/// Thread-safe SQLite connection pool (single connection with mutex)
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the SQLite database at the given path
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Self::from_connection(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database mutex poisoned"))
    }

    /// Run schema migrations (idempotent)
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    // ── Matches ───────────────────────────────────────────────────────────────

    /// Insert or update a match. Returns `true` when the stored row is new or
    /// its visible state (teams, goals, status) changed.
    pub fn upsert_match(&self, m: &StoredMatch) -> Result<bool> {
        let conn = self.conn()?;
        let prev: Option<(String, String, i32, i32, String)> = conn
            .query_row(
                "SELECT home_team, away_team, home_goals, away_goals, status
                 FROM matches WHERE match_id = ?1",
                params![m.match_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
            .optional()?;

        let changed = match prev {
            None => true,
            Some((home, away, home_goals, away_goals, status)) => {
                home != m.home_team
                    || away != m.away_team
                    || home_goals != m.home_goals
                    || away_goals != m.away_goals
                    || status != m.status
            }
        };
        if !changed {
            return Ok(false);
        }

        conn.execute(
            "INSERT INTO matches (
                match_id, match_date, league, home_team, away_team,
                home_goals, away_goals, status, updated_at
             ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)
             ON CONFLICT(match_id) DO UPDATE SET
                match_date=excluded.match_date,
                league=excluded.league,
                home_team=excluded.home_team,
                away_team=excluded.away_team,
                home_goals=excluded.home_goals,
                away_goals=excluded.away_goals,
                status=excluded.status,
                updated_at=excluded.updated_at",
            params![
                m.match_id,
                m.match_date,
                m.league,
                m.home_team,
                m.away_team,
                m.home_goals,
                m.away_goals,
                m.status,
                m.updated_at,
            ],
        )?;
        Ok(true)
    }

    /// The first match stored for the given day, in the order the provider
    /// reported them.
    pub fn first_match_on(&self, date: NaiveDate) -> Result<Option<MatchSnapshot>> {
        let conn = self.conn()?;
        let snapshot = conn
            .query_row(
                "SELECT match_id, home_team, away_team, home_goals, away_goals
                 FROM matches WHERE match_date = ?1 ORDER BY rowid ASC LIMIT 1",
                params![date],
                |row| {
                    Ok(MatchSnapshot {
                        match_id: row.get(0)?,
                        home_team: row.get(1)?,
                        away_team: row.get(2)?,
                        home_goals: row.get(3)?,
                        away_goals: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(snapshot)
    }

    pub fn get_match(&self, match_id: &str) -> Result<Option<StoredMatch>> {
        let conn = self.conn()?;
        let m = conn
            .query_row(
                "SELECT match_id, match_date, league, home_team, away_team,
                        home_goals, away_goals, status, updated_at
                 FROM matches WHERE match_id = ?1",
                params![match_id],
                map_match,
            )
            .optional()?;
        Ok(m)
    }

    /// All matches stored for the given day
    pub fn list_matches_on(&self, date: NaiveDate) -> Result<Vec<StoredMatch>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT match_id, match_date, league, home_team, away_team,
                    home_goals, away_goals, status, updated_at
             FROM matches WHERE match_date = ?1 ORDER BY rowid ASC",
        )?;
        let matches = stmt
            .query_map(params![date], map_match)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(matches)
    }

    // ── Widgets ───────────────────────────────────────────────────────────────

    pub fn register_widget(&self, label: &str) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO widgets (label, created_at) VALUES (?1, ?2)",
            params![label, Utc::now()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Remove a widget and its last view. Returns `false` if it didn't exist.
    pub fn remove_widget(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM widgets WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    pub fn widget_exists(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let found: Option<i64> = conn
            .query_row("SELECT 1 FROM widgets WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(found.is_some())
    }

    pub fn list_widgets(&self) -> Result<Vec<Widget>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id, label, created_at FROM widgets ORDER BY id ASC")?;
        let widgets = stmt
            .query_map([], |row| {
                Ok(Widget {
                    id: row.get(0)?,
                    label: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(widgets)
    }

    // ── Views ─────────────────────────────────────────────────────────────────

    /// Replace the stored view for a widget. Returns `false` when the widget
    /// is not registered; nothing is written in that case.
    pub fn store_view(&self, widget_id: i64, view_json: &str) -> Result<bool> {
        let conn = self.conn()?;
        let written = conn.execute(
            "INSERT INTO widget_views (widget_id, view_json, rendered_at)
             SELECT id, ?2, ?3 FROM widgets WHERE id = ?1
             ON CONFLICT(widget_id) DO UPDATE SET
                view_json=excluded.view_json,
                rendered_at=excluded.rendered_at",
            params![widget_id, view_json, Utc::now()],
        )?;
        Ok(written > 0)
    }

    pub fn get_view(&self, widget_id: i64) -> Result<Option<WidgetView>> {
        let conn = self.conn()?;
        let row: Option<(String, chrono::DateTime<Utc>)> = conn
            .query_row(
                "SELECT view_json, rendered_at FROM widget_views WHERE widget_id = ?1",
                params![widget_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((json, rendered_at)) => {
                let view = serde_json::from_str(&json)
                    .with_context(|| format!("Corrupt stored view for widget {}", widget_id))?;
                Ok(Some(WidgetView {
                    widget_id,
                    view,
                    rendered_at,
                }))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl SnapshotStore for Database {
    async fn query_today(&self, date: NaiveDate) -> Result<Option<MatchSnapshot>> {
        self.first_match_on(date)
    }
}

// ── SQL helpers ────────────────────────────────────────────────────────────────

fn map_match(row: &rusqlite::Row) -> rusqlite::Result<StoredMatch> {
    Ok(StoredMatch {
        match_id: row.get(0)?,
        match_date: row.get(1)?,
        league: row.get(2)?,
        home_team: row.get(3)?,
        away_team: row.get(4)?,
        home_goals: row.get(5)?,
        away_goals: row.get(6)?,
        status: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// SQLite schema (idempotent CREATE IF NOT EXISTS)
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS matches (
    match_id    TEXT    PRIMARY KEY,
    match_date  TEXT    NOT NULL,
    league      TEXT    NOT NULL,
    home_team   TEXT    NOT NULL,
    away_team   TEXT    NOT NULL,
    home_goals  INTEGER NOT NULL DEFAULT -1,
    away_goals  INTEGER NOT NULL DEFAULT -1,
    status      TEXT    NOT NULL,
    updated_at  TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS widgets (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    label       TEXT    NOT NULL,
    created_at  TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS widget_views (
    widget_id   INTEGER PRIMARY KEY,
    view_json   TEXT    NOT NULL,
    rendered_at TEXT    NOT NULL,
    FOREIGN KEY (widget_id) REFERENCES widgets(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_matches_date ON matches(match_date);
"#;
