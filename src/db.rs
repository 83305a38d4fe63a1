use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};

use crate::error::ArenaError;

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create {:?}", parent))?;
    }
    let conn = Connection::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS variants (
            id             TEXT PRIMARY KEY,
            run_id         TEXT NOT NULL,
            model          TEXT NOT NULL,
            raw_text       TEXT NOT NULL,
            raw_section    TEXT NOT NULL,
            sanitized_html TEXT NOT NULL,
            loaded_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_variants_run ON variants(run_id);

        CREATE TABLE IF NOT EXISTS pairs (
            id         INTEGER PRIMARY KEY,
            run_id     TEXT NOT NULL,
            left_id    TEXT NOT NULL REFERENCES variants(id),
            right_id   TEXT NOT NULL REFERENCES variants(id),
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_pairs_run ON pairs(run_id);

        CREATE TABLE IF NOT EXISTS votes (
            id       INTEGER PRIMARY KEY,
            pair_id  INTEGER NOT NULL REFERENCES pairs(id),
            choice   TEXT NOT NULL CHECK(choice IN ('left','right','tie')),
            voted_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_votes_pair ON votes(pair_id);
        ",
    )?;
    Ok(())
}

// ── Variants ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantRow {
    pub id: String,
    pub run_id: String,
    pub model: String,
    pub raw_text: String,
    pub raw_section: String,
    pub sanitized_html: String,
}

pub fn save_variants(conn: &Connection, rows: &[VariantRow]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO variants
             (id, run_id, model, raw_text, raw_section, sanitized_html)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for r in rows {
            count += stmt.execute(rusqlite::params![
                r.id, r.run_id, r.model, r.raw_text, r.raw_section, r.sanitized_html,
            ])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

fn variant_from_row(row: &rusqlite::Row) -> rusqlite::Result<VariantRow> {
    Ok(VariantRow {
        id: row.get(0)?,
        run_id: row.get(1)?,
        model: row.get(2)?,
        raw_text: row.get(3)?,
        raw_section: row.get(4)?,
        sanitized_html: row.get(5)?,
    })
}

pub fn fetch_variants(conn: &Connection, run_id: &str) -> Result<Vec<VariantRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, run_id, model, raw_text, raw_section, sanitized_html
         FROM variants WHERE run_id = ?1 ORDER BY id",
    )?;
    let rows = stmt
        .query_map([run_id], variant_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Most recent run with loaded variants (run ids sort by timestamp).
pub fn latest_run_id(conn: &Connection) -> Result<Option<String>> {
    let run: Option<String> = conn.query_row("SELECT MAX(run_id) FROM variants", [], |r| r.get(0))?;
    Ok(run)
}

// ── Pairs ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairRow {
    pub id: i64,
    pub run_id: String,
    pub left_id: String,
    pub right_id: String,
}

pub fn insert_pair(conn: &Connection, run_id: &str, left_id: &str, right_id: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO pairs (run_id, left_id, right_id) VALUES (?1, ?2, ?3)",
        rusqlite::params![run_id, left_id, right_id],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn fetch_pair(conn: &Connection, id: i64) -> Result<Option<PairRow>> {
    let row = conn
        .query_row(
            "SELECT id, run_id, left_id, right_id FROM pairs WHERE id = ?1",
            [id],
            |row| {
                Ok(PairRow {
                    id: row.get(0)?,
                    run_id: row.get(1)?,
                    left_id: row.get(2)?,
                    right_id: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

/// How often each unordered variant pair of a run has been shown,
/// keyed by (smaller id, larger id).
pub fn pair_counts(conn: &Connection, run_id: &str) -> Result<HashMap<(String, String), usize>> {
    let mut stmt = conn.prepare(
        "SELECT MIN(left_id, right_id), MAX(left_id, right_id), COUNT(*)
         FROM pairs WHERE run_id = ?1
         GROUP BY 1, 2",
    )?;
    let rows = stmt
        .query_map([run_id], |row| Ok(((row.get(0)?, row.get(1)?), row.get(2)?)))?
        .collect::<Result<HashMap<_, _>, _>>()?;
    Ok(rows)
}

// ── Votes ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Left,
    Right,
    Tie,
}

impl Choice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Choice::Left => "left",
            Choice::Right => "right",
            Choice::Tie => "tie",
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Choice {
    type Err = ArenaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" | "a" => Ok(Choice::Left),
            "right" | "b" => Ok(Choice::Right),
            "tie" | "draw" => Ok(Choice::Tie),
            _ => Err(ArenaError::InvalidChoice(s.to_string())),
        }
    }
}

/// Record a vote and return the pair it was cast on, so the caller can
/// reveal which variants were behind A and B.
pub fn insert_vote(conn: &Connection, pair_id: i64, choice: Choice) -> Result<PairRow> {
    let Some(pair) = fetch_pair(conn, pair_id)? else {
        return Err(ArenaError::UnknownPair(pair_id).into());
    };
    conn.execute(
        "INSERT INTO votes (pair_id, choice) VALUES (?1, ?2)",
        rusqlite::params![pair.id, choice.as_str()],
    )?;
    Ok(pair)
}

// ── Leaderboard ──

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardRow {
    pub model: String,
    pub wins: usize,
    pub losses: usize,
    pub ties: usize,
    pub votes: usize,
}

impl LeaderboardRow {
    /// Ties count as half a win.
    pub fn win_rate(&self) -> f64 {
        if self.votes == 0 {
            return 0.0;
        }
        (self.wins as f64 + 0.5 * self.ties as f64) / self.votes as f64
    }
}

pub fn leaderboard(conn: &Connection, run_id: Option<&str>) -> Result<Vec<LeaderboardRow>> {
    let mut stmt = conn.prepare(
        "WITH outcomes AS (
             SELECT p.run_id, p.left_id AS variant_id,
                    CASE v.choice WHEN 'left' THEN 'win' WHEN 'right' THEN 'loss' ELSE 'tie' END AS outcome
             FROM votes v JOIN pairs p ON p.id = v.pair_id
             UNION ALL
             SELECT p.run_id, p.right_id,
                    CASE v.choice WHEN 'right' THEN 'win' WHEN 'left' THEN 'loss' ELSE 'tie' END
             FROM votes v JOIN pairs p ON p.id = v.pair_id
         )
         SELECT va.model,
                SUM(o.outcome = 'win'), SUM(o.outcome = 'loss'), SUM(o.outcome = 'tie'), COUNT(*)
         FROM outcomes o
         JOIN variants va ON va.id = o.variant_id
         WHERE ?1 IS NULL OR o.run_id = ?1
         GROUP BY va.model",
    )?;
    let mut rows = stmt
        .query_map([run_id], |row| {
            Ok(LeaderboardRow {
                model: row.get(0)?,
                wins: row.get(1)?,
                losses: row.get(2)?,
                ties: row.get(3)?,
                votes: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    rows.sort_by(|a, b| {
        b.win_rate()
            .total_cmp(&a.win_rate())
            .then(b.wins.cmp(&a.wins))
            .then(a.model.cmp(&b.model))
    });
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub runs: usize,
    pub variants: usize,
    pub pairs: usize,
    pub votes: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let runs: usize =
        conn.query_row("SELECT COUNT(DISTINCT run_id) FROM variants", [], |r| r.get(0))?;
    let variants: usize = conn.query_row("SELECT COUNT(*) FROM variants", [], |r| r.get(0))?;
    let pairs: usize = conn.query_row("SELECT COUNT(*) FROM pairs", [], |r| r.get(0))?;
    let votes: usize = conn.query_row("SELECT COUNT(*) FROM votes", [], |r| r.get(0))?;
    Ok(Stats {
        runs,
        variants,
        pairs,
        votes,
    })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(run_id: &str, slug: &str, model: &str) -> VariantRow {
        VariantRow {
            id: format!("{}/{}", run_id, slug),
            run_id: run_id.to_string(),
            model: model.to_string(),
            raw_text: "<main>x</main>".to_string(),
            raw_section: "<main>x</main>".to_string(),
            sanitized_html: "<main>x</main>".to_string(),
        }
    }

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        init_schema(&conn).unwrap();
        save_variants(
            &conn,
            &[
                variant("run-1", "a", "model-a"),
                variant("run-1", "b", "model-b"),
                variant("run-1", "c", "model-c"),
            ],
        )
        .unwrap();
        conn
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = setup();
        init_schema(&conn).unwrap();
    }

    #[test]
    fn reload_replaces_variants() {
        let conn = setup();
        let mut updated = variant("run-1", "a", "model-a");
        updated.sanitized_html = "<main>y</main>".to_string();
        save_variants(&conn, &[updated]).unwrap();
        let rows = fetch_variants(&conn, "run-1").unwrap();
        assert_eq!(rows.len(), 3);
        let a = rows.iter().find(|r| r.id == "run-1/a").unwrap();
        assert_eq!(a.sanitized_html, "<main>y</main>");
    }

    #[test]
    fn latest_run() {
        let conn = setup();
        save_variants(&conn, &[variant("run-2", "a", "model-a")]).unwrap();
        assert_eq!(latest_run_id(&conn).unwrap().as_deref(), Some("run-2"));
    }

    #[test]
    fn latest_run_on_empty_db() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(latest_run_id(&conn).unwrap(), None);
    }

    #[test]
    fn pair_counts_ignore_orientation() {
        let conn = setup();
        insert_pair(&conn, "run-1", "run-1/a", "run-1/b").unwrap();
        insert_pair(&conn, "run-1", "run-1/b", "run-1/a").unwrap();
        insert_pair(&conn, "run-1", "run-1/c", "run-1/a").unwrap();
        let counts = pair_counts(&conn, "run-1").unwrap();
        assert_eq!(counts.get(&("run-1/a".into(), "run-1/b".into())), Some(&2));
        assert_eq!(counts.get(&("run-1/a".into(), "run-1/c".into())), Some(&1));
        assert_eq!(counts.len(), 2);
    }

    #[test]
    fn vote_requires_known_pair() {
        let conn = setup();
        let err = insert_vote(&conn, 99, Choice::Left).unwrap_err();
        assert!(err.to_string().contains("99"));
    }

    #[test]
    fn vote_returns_the_pair_it_was_cast_on() {
        let conn = setup();
        let id = insert_pair(&conn, "run-1", "run-1/b", "run-1/a").unwrap();
        let pair = insert_vote(&conn, id, Choice::Right).unwrap();
        assert_eq!(
            pair,
            PairRow {
                id,
                run_id: "run-1".to_string(),
                left_id: "run-1/b".to_string(),
                right_id: "run-1/a".to_string(),
            }
        );
    }

    #[test]
    fn choice_parsing() {
        assert_eq!("LEFT".parse::<Choice>().unwrap(), Choice::Left);
        assert_eq!("b".parse::<Choice>().unwrap(), Choice::Right);
        assert_eq!("tie".parse::<Choice>().unwrap(), Choice::Tie);
        assert!("both".parse::<Choice>().is_err());
    }

    #[test]
    fn leaderboard_aggregates_both_sides() {
        let conn = setup();
        let ab = insert_pair(&conn, "run-1", "run-1/a", "run-1/b").unwrap();
        let ca = insert_pair(&conn, "run-1", "run-1/c", "run-1/a").unwrap();
        insert_vote(&conn, ab, Choice::Left).unwrap(); // a beats b
        insert_vote(&conn, ab, Choice::Tie).unwrap();
        insert_vote(&conn, ca, Choice::Right).unwrap(); // a beats c

        let board = leaderboard(&conn, None).unwrap();
        assert_eq!(board[0].model, "model-a");
        assert_eq!((board[0].wins, board[0].losses, board[0].ties), (2, 0, 1));
        assert_eq!(board[0].votes, 3);
        assert!((board[0].win_rate() - 2.5 / 3.0).abs() < 1e-9);

        let b = board.iter().find(|r| r.model == "model-b").unwrap();
        assert_eq!((b.wins, b.losses, b.ties), (0, 1, 1));
        assert_eq!(board.last().map(|r| r.model.as_str()), Some("model-c"));

        assert!(leaderboard(&conn, Some("run-9")).unwrap().is_empty());
    }

    #[test]
    fn stats_counts() {
        let conn = setup();
        let id = insert_pair(&conn, "run-1", "run-1/a", "run-1/b").unwrap();
        insert_vote(&conn, id, Choice::Tie).unwrap();
        let s = get_stats(&conn).unwrap();
        assert_eq!((s.runs, s.variants, s.pairs, s.votes), (1, 3, 1, 1));
    }
}
