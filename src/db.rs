use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::model::FighterRecord;

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
    }
    let conn = Connection::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS fighters (
            id          INTEGER PRIMARY KEY,
            first_name  TEXT NOT NULL,
            last_name   TEXT NOT NULL,
            name        TEXT NOT NULL,
            name_key    TEXT NOT NULL,
            height_cm   REAL,
            weight_kg   REAL,
            wins        INTEGER NOT NULL DEFAULT 0 CHECK(wins >= 0),
            losses      INTEGER NOT NULL DEFAULT 0 CHECK(losses >= 0),
            draws       INTEGER NOT NULL DEFAULT 0 CHECK(draws >= 0),
            image_url   TEXT,
            loaded_at   TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_fighters_name ON fighters(name);
        ",
    )?;

    // Stores written before `name_key` existed get it backfilled.
    let has_key: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM pragma_table_info('fighters') WHERE name = 'name_key'",
        [],
        |r| r.get(0),
    )?;
    if !has_key {
        conn.execute_batch("ALTER TABLE fighters ADD COLUMN name_key TEXT NOT NULL DEFAULT '';")?;
        let names: Vec<(i64, String)> = conn
            .prepare("SELECT id, name FROM fighters")?
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<Result<_, _>>()?;
        for (id, name) in names {
            conn.execute(
                "UPDATE fighters SET name_key = ?1 WHERE id = ?2",
                rusqlite::params![name_key(&name), id],
            )?;
        }
    }
    conn.execute_batch("CREATE INDEX IF NOT EXISTS idx_fighters_name_key ON fighters(name_key);")?;
    Ok(())
}

/// Clear the collection and bulk-insert the batch, all in one transaction.
pub fn replace_all(conn: &Connection, fighters: &[FighterRecord]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        tx.execute("DELETE FROM fighters", [])?;
        let mut stmt = tx.prepare(
            "INSERT INTO fighters
             (first_name, last_name, name, name_key, height_cm, weight_kg, wins, losses, draws, image_url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )?;
        for f in fighters {
            let name = f.full_name();
            count += stmt.execute(rusqlite::params![
                f.first_name,
                f.last_name,
                name,
                name_key(&name),
                f.height_cm,
                f.weight_kg,
                f.wins,
                f.losses,
                f.draws,
                f.image_url,
            ])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

/// Fighters whose first, last or full name contains `query`, ignoring case
/// (full Unicode lowercasing). `None` lists everyone.
///
/// Matching runs against `name_key`, the lowercased full name; any substring
/// of either name part is also a substring of it.
pub fn search(conn: &Connection, query: Option<&str>, limit: usize) -> Result<Vec<FighterRecord>> {
    let pattern = format!("%{}%", escape_like(&name_key(query.unwrap_or(""))));
    let mut stmt = conn.prepare(
        "SELECT first_name, last_name, height_cm, weight_kg, wins, losses, draws, image_url
         FROM fighters
         WHERE name_key LIKE ?1 ESCAPE '\\'
         ORDER BY last_name, first_name
         LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(rusqlite::params![pattern, limit as i64], |row| {
            Ok(FighterRecord {
                first_name: row.get(0)?,
                last_name: row.get(1)?,
                height_cm: row.get(2)?,
                weight_kg: row.get(3)?,
                wins: row.get(4)?,
                losses: row.get(5)?,
                draws: row.get(6)?,
                image_url: row.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// SQLite's LIKE only folds ASCII, so both sides are lowercased here first.
fn name_key(s: &str) -> String {
    s.to_lowercase()
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// ── Stats ──

pub struct Stats {
    pub total: usize,
    pub with_image: usize,
    pub with_height: usize,
    pub with_weight: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let count = |sql: &str| -> Result<usize> { Ok(conn.query_row(sql, [], |r| r.get(0))?) };
    Ok(Stats {
        total: count("SELECT COUNT(*) FROM fighters")?,
        with_image: count("SELECT COUNT(*) FROM fighters WHERE image_url IS NOT NULL")?,
        with_height: count("SELECT COUNT(*) FROM fighters WHERE height_cm IS NOT NULL")?,
        with_weight: count("SELECT COUNT(*) FROM fighters WHERE weight_kg IS NOT NULL")?,
    })
}
