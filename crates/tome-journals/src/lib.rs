//! Journal model and storage for the Tome wiki platform.
//!
//! A journal is a shared notebook: any authenticated user may append
//! entries, independently of who created the journal. Each entry belongs to
//! its author — only the author may edit its content, toggle its privacy
//! flag, or delete it. Private entries are visible to their author alone;
//! the pure gating predicate lives in [`filter`].

pub mod filter;

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during journal operations.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("journal not found: {0}")]
    JournalNotFound(i64),
    #[error("entry not found: {0}")]
    EntryNotFound(i64),
    #[error("only the entry author may modify it")]
    NotAuthor,
    #[error("{0}")]
    Validation(String),
}

/// A journal (shared notebook).
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Journal {
    /// Internal database ID; doubles as the public identifier.
    pub id: i64,
    /// Display title.
    pub title: String,
    /// Username of the creator.
    pub created_by: String,
    /// Creation timestamp (ISO 8601).
    pub created_at: String,
}

/// One timestamped entry inside a journal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JournalEntry {
    /// Internal database ID; doubles as the public identifier.
    pub id: i64,
    /// Parent journal.
    pub journal_id: i64,
    /// Username of the author; immutable.
    pub author: String,
    /// Entry text.
    pub content: String,
    /// When true, the entry is visible to its author only.
    pub is_private: bool,
    /// Creation timestamp (ISO 8601).
    pub created_at: String,
    /// Last-edit timestamp (ISO 8601), if the entry was ever edited.
    pub updated_at: Option<String>,
}

/// Creates a new journal.
pub fn create_journal(
    conn: &Connection,
    title: &str,
    created_by: &str,
) -> Result<Journal, JournalError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(JournalError::Validation("title is required".to_string()));
    }
    let journal = conn.query_row(
        "INSERT INTO journals (title, created_by) VALUES (?1, ?2)
         RETURNING id, title, created_by, created_at",
        params![title, created_by],
        map_row_to_journal,
    )?;
    Ok(journal)
}

/// Retrieves a journal by id.
pub fn get_journal(conn: &Connection, journal_id: i64) -> Result<Journal, JournalError> {
    conn.query_row(
        "SELECT id, title, created_by, created_at FROM journals WHERE id = ?1",
        [journal_id],
        map_row_to_journal,
    )
    .optional()?
    .ok_or(JournalError::JournalNotFound(journal_id))
}

/// Lists all journals, newest first.
pub fn list_journals(conn: &Connection) -> Result<Vec<Journal>, JournalError> {
    let mut stmt = conn.prepare(
        "SELECT id, title, created_by, created_at FROM journals ORDER BY created_at DESC, id DESC",
    )?;
    let rows = stmt.query_map([], map_row_to_journal)?;
    let mut journals = Vec::new();
    for row in rows {
        journals.push(row?);
    }
    Ok(journals)
}

/// Lists a journal's entries in chronological insertion order. No privacy
/// filtering happens here; callers apply [`filter::visible_entries`].
pub fn list_entries(conn: &Connection, journal_id: i64) -> Result<Vec<JournalEntry>, JournalError> {
    let mut stmt = conn.prepare(
        "SELECT id, journal_id, author, content, is_private, created_at, updated_at
         FROM journal_entries WHERE journal_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map([journal_id], map_row_to_entry)?;
    let mut entries = Vec::new();
    for row in rows {
        entries.push(row?);
    }
    Ok(entries)
}

/// Creates a new entry in a journal.
pub fn create_entry(
    conn: &Connection,
    journal_id: i64,
    author: &str,
    content: &str,
    is_private: bool,
) -> Result<JournalEntry, JournalError> {
    if content.trim().is_empty() {
        return Err(JournalError::Validation("content is required".to_string()));
    }
    // Check journal existence first to report a clean NotFound instead of a
    // foreign key failure.
    let _ = get_journal(conn, journal_id)?;

    let entry = conn.query_row(
        "INSERT INTO journal_entries (journal_id, author, content, is_private)
         VALUES (?1, ?2, ?3, ?4)
         RETURNING id, journal_id, author, content, is_private, created_at, updated_at",
        params![journal_id, author, content, is_private],
        map_row_to_entry,
    )?;
    Ok(entry)
}

/// Retrieves an entry by id.
pub fn get_entry(conn: &Connection, entry_id: i64) -> Result<JournalEntry, JournalError> {
    conn.query_row(
        "SELECT id, journal_id, author, content, is_private, created_at, updated_at
         FROM journal_entries WHERE id = ?1",
        [entry_id],
        map_row_to_entry,
    )
    .optional()?
    .ok_or(JournalError::EntryNotFound(entry_id))
}

/// Replaces an entry's content. Author only.
pub fn update_entry_content(
    conn: &Connection,
    entry_id: i64,
    editor: &str,
    content: &str,
) -> Result<JournalEntry, JournalError> {
    if content.trim().is_empty() {
        return Err(JournalError::Validation("content is required".to_string()));
    }
    let entry = get_entry(conn, entry_id)?;
    if entry.author != editor {
        return Err(JournalError::NotAuthor);
    }
    conn.execute(
        "UPDATE journal_entries SET content = ?1, updated_at = datetime('now') WHERE id = ?2",
        params![content, entry_id],
    )?;
    get_entry(conn, entry_id)
}

/// Flips an entry's privacy flag. Author only.
pub fn toggle_entry_privacy(
    conn: &Connection,
    entry_id: i64,
    editor: &str,
) -> Result<JournalEntry, JournalError> {
    let entry = get_entry(conn, entry_id)?;
    if entry.author != editor {
        return Err(JournalError::NotAuthor);
    }
    conn.execute(
        "UPDATE journal_entries SET is_private = NOT is_private, updated_at = datetime('now')
         WHERE id = ?1",
        [entry_id],
    )?;
    get_entry(conn, entry_id)
}

/// Deletes an entry. Author only. Returns the deleted entry so callers can
/// gate the broadcast of the deletion on the entry's last-known privacy.
pub fn delete_entry(
    conn: &Connection,
    entry_id: i64,
    editor: &str,
) -> Result<JournalEntry, JournalError> {
    let entry = get_entry(conn, entry_id)?;
    if entry.author != editor {
        return Err(JournalError::NotAuthor);
    }
    conn.execute("DELETE FROM journal_entries WHERE id = ?1", [entry_id])?;
    Ok(entry)
}

fn map_row_to_journal(row: &Row) -> rusqlite::Result<Journal> {
    Ok(Journal {
        id: row.get(0)?,
        title: row.get(1)?,
        created_by: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn map_row_to_entry(row: &Row) -> rusqlite::Result<JournalEntry> {
    Ok(JournalEntry {
        id: row.get(0)?,
        journal_id: row.get(1)?,
        author: row.get(2)?,
        content: row.get(3)?,
        is_private: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}
