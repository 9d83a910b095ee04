//! Embedded full-text index on a SQLite FTS5 table.

use super::search_index::{page_offset, SearchHits, SearchIndex};
use super::searchable::IndexDocument;
use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

lazy_static! {
    static ref TERM_REGEX: Regex = Regex::new(r"[\p{L}\p{N}_]+").unwrap();
}

/// FTS5 search index.
///
/// All namespaces share one virtual table. Each row holds the document's
/// fields joined into a single text column, so a query matches across every
/// indexed field.
pub struct Fts5SearchIndex {
    conn: Mutex<Connection>,
}

impl Fts5SearchIndex {
    pub fn new(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open search database at {:?}", db_path))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::from_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE VIRTUAL TABLE IF NOT EXISTS search_index USING fts5(
                namespace UNINDEXED,
                doc_id UNINDEXED,
                content,
                tokenize='porter unicode61'
            );
        "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Turns free text into an FTS5 expression that matches any of its terms.
    ///
    /// Terms are quoted so user input can never be parsed as FTS5 syntax.
    fn match_expression(text: &str) -> Option<String> {
        let terms: Vec<String> = TERM_REGEX
            .find_iter(text)
            .map(|m| format!("\"{}\"", m.as_str()))
            .collect();
        if terms.is_empty() {
            None
        } else {
            Some(terms.join(" OR "))
        }
    }

    pub fn document_count(&self, namespace: &str) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM search_index WHERE namespace = ?1",
            params![namespace],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

impl SearchIndex for Fts5SearchIndex {
    fn index(&self, namespace: &str, id: i64, document: &IndexDocument) -> Result<()> {
        let content = document.values().cloned().collect::<Vec<_>>().join("\n");
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM search_index WHERE namespace = ?1 AND doc_id = ?2",
            params![namespace, id],
        )?;
        tx.execute(
            "INSERT INTO search_index (namespace, doc_id, content) VALUES (?1, ?2, ?3)",
            params![namespace, id, content],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn remove(&self, namespace: &str, id: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM search_index WHERE namespace = ?1 AND doc_id = ?2",
            params![namespace, id],
        )?;
        Ok(())
    }

    fn query(&self, namespace: &str, text: &str, page: u32, per_page: u32) -> Result<SearchHits> {
        let Some(expression) = Self::match_expression(text) else {
            return Ok(SearchHits::empty());
        };
        debug!("FTS5 query in '{}': {}", namespace, expression);

        let conn = self.conn.lock().unwrap();
        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM search_index WHERE search_index MATCH ?1 AND namespace = ?2",
            params![expression, namespace],
            |row| row.get(0),
        )?;
        if total == 0 || per_page == 0 {
            return Ok(SearchHits {
                ids: Vec::new(),
                total: total as u64,
            });
        }

        let mut stmt = conn.prepare(
            "SELECT doc_id FROM search_index
             WHERE search_index MATCH ?1 AND namespace = ?2
             ORDER BY bm25(search_index), doc_id
             LIMIT ?3 OFFSET ?4",
        )?;
        let ids = stmt
            .query_map(
                params![
                    expression,
                    namespace,
                    per_page as i64,
                    page_offset(page, per_page) as i64
                ],
                |row| row.get::<_, i64>(0),
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(SearchHits {
            ids,
            total: total as u64,
        })
    }

    fn describe(&self) -> &'static str {
        "fts5"
    }
}
