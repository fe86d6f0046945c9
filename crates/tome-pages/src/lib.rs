//! Page model and storage for the Tome wiki platform.
//!
//! Pages are the primary wiki primitive: a slug-addressed document with a
//! title, content blob, ordered sidebar facts, a visibility gate, an edit
//! policy, and (for private pages) a per-user read allow-list.
//!
//! The pure access decisions live in [`access`]; everything in this module
//! is storage. Authorization is always evaluated by the caller *before* any
//! mutation here runs.

pub mod access;

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tome_types::{EditPolicy, Visibility};

/// Errors that can occur during page operations.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("page not found: {0}")]
    NotFound(String),
    #[error("a page with slug '{0}' already exists")]
    SlugTaken(String),
    #[error("{0}")]
    Validation(String),
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One sidebar fact. Facts are stored as a JSON array so their insertion
/// order survives the round trip to the database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SidebarFact {
    pub key: String,
    pub value: serde_json::Value,
}

/// A wiki page.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Page {
    /// Internal database ID.
    pub id: i64,
    /// URL-safe unique identifier, fixed at creation.
    pub slug: String,
    /// Display title.
    pub title: String,
    /// Content blob (opaque to this crate).
    pub content: String,
    /// Ordered sidebar facts.
    pub facts: Vec<SidebarFact>,
    /// Page-level read gate.
    pub visibility: Visibility,
    /// Page-level write gate.
    pub edit_policy: EditPolicy,
    /// Username of the creator; immutable.
    pub owner: String,
    /// Creation timestamp (ISO 8601).
    pub created_at: String,
    /// Last-modified timestamp (ISO 8601).
    pub updated_at: String,
}

/// Parameters for creating a new page.
#[derive(Debug, Clone)]
pub struct CreatePageParams {
    pub title: String,
    pub content: String,
    pub facts: Vec<SidebarFact>,
    pub visibility: Visibility,
    pub edit_policy: EditPolicy,
    pub owner: String,
}

/// Parameters for updating an existing page. `None` fields are untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdatePageParams {
    pub title: Option<String>,
    pub content: Option<String>,
    pub facts: Option<Vec<SidebarFact>>,
    pub visibility: Option<Visibility>,
    pub edit_policy: Option<EditPolicy>,
}

impl UpdatePageParams {
    /// True when the update touches access settings, which only the page
    /// owner may change regardless of the edit policy.
    pub fn touches_settings(&self) -> bool {
        self.visibility.is_some() || self.edit_policy.is_some()
    }
}

/// Derives a URL-safe slug from a page title: every character outside
/// `[A-Za-z0-9_-]` becomes `-`, then the whole string is lowercased.
pub fn slugify(title: &str) -> String {
    title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}

fn encode_facts(facts: &[SidebarFact]) -> Result<Option<String>, PageError> {
    if facts.is_empty() {
        Ok(None)
    } else {
        Ok(Some(serde_json::to_string(facts)?))
    }
}

/// Creates a new page. The slug is derived from the title and must be
/// unique; a collision is reported as [`PageError::SlugTaken`].
pub fn create_page(conn: &Connection, params: &CreatePageParams) -> Result<Page, PageError> {
    if params.title.trim().is_empty() {
        return Err(PageError::Validation("title is required".to_string()));
    }
    let slug = slugify(&params.title);
    let facts_json = encode_facts(&params.facts)?;

    let result = conn.query_row(
        "INSERT INTO pages (slug, title, content, facts_json, visibility, edit_policy, owner)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         RETURNING id, slug, title, content, facts_json, visibility, edit_policy, owner,
                   created_at, updated_at",
        params![
            slug,
            params.title,
            params.content,
            facts_json,
            params.visibility.as_str(),
            params.edit_policy.as_str(),
            params.owner,
        ],
        map_row_to_page,
    );

    match result {
        Ok(page) => Ok(page),
        Err(rusqlite::Error::SqliteFailure(code, _))
            if code.code == rusqlite::ffi::ErrorCode::ConstraintViolation =>
        {
            Err(PageError::SlugTaken(slug))
        }
        Err(e) => Err(PageError::Database(e)),
    }
}

/// Retrieves a page by its slug.
pub fn get_page(conn: &Connection, slug: &str) -> Result<Page, PageError> {
    conn.query_row(
        "SELECT id, slug, title, content, facts_json, visibility, edit_policy, owner,
                created_at, updated_at
         FROM pages WHERE slug = ?1",
        [slug],
        map_row_to_page,
    )
    .optional()?
    .ok_or_else(|| PageError::NotFound(slug.to_string()))
}

/// Updates an existing page with a single atomic UPDATE statement.
///
/// Only fields that are `Some` in `updates` are modified. The caller has
/// already authorized the update; this function never checks identity.
pub fn update_page(
    conn: &Connection,
    slug: &str,
    updates: &UpdatePageParams,
) -> Result<Page, PageError> {
    let mut set_parts: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
    let mut idx = 1usize;

    if let Some(title) = &updates.title {
        if title.trim().is_empty() {
            return Err(PageError::Validation("title is required".to_string()));
        }
        set_parts.push(format!("title = ?{}", idx));
        values.push(Box::new(title.clone()));
        idx += 1;
    }
    if let Some(content) = &updates.content {
        set_parts.push(format!("content = ?{}", idx));
        values.push(Box::new(content.clone()));
        idx += 1;
    }
    if let Some(facts) = &updates.facts {
        set_parts.push(format!("facts_json = ?{}", idx));
        values.push(Box::new(encode_facts(facts)?));
        idx += 1;
    }
    if let Some(visibility) = &updates.visibility {
        set_parts.push(format!("visibility = ?{}", idx));
        values.push(Box::new(visibility.as_str()));
        idx += 1;
    }
    if let Some(edit_policy) = &updates.edit_policy {
        set_parts.push(format!("edit_policy = ?{}", idx));
        values.push(Box::new(edit_policy.as_str()));
        idx += 1;
    }

    if set_parts.is_empty() {
        return get_page(conn, slug);
    }

    set_parts.push("updated_at = datetime('now')".to_string());

    let sql = format!(
        "UPDATE pages SET {} WHERE slug = ?{}",
        set_parts.join(", "),
        idx
    );
    values.push(Box::new(slug.to_string()));

    let params: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let count = conn.execute(&sql, params.as_slice())?;
    if count == 0 {
        return Err(PageError::NotFound(slug.to_string()));
    }
    get_page(conn, slug)
}

/// Adds a username to a page's allow-list.
///
/// Idempotent: granting an already-allowed user is a no-op. Returns `true`
/// when a new grant row was inserted, so callers can decide whether to send
/// an out-of-band notification.
pub fn grant_access(conn: &Connection, page_id: i64, username: &str) -> Result<bool, PageError> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO page_grants (page_id, username) VALUES (?1, ?2)",
        params![page_id, username],
    )?;
    Ok(inserted > 0)
}

/// Returns a page's allow-list in grant order. An empty list is not an
/// error; a page with no grants simply has no allowed readers beyond its
/// owner (and everyone, if public).
pub fn list_allowed(conn: &Connection, page_id: i64) -> Result<Vec<String>, PageError> {
    let mut stmt = conn.prepare(
        "SELECT username FROM page_grants WHERE page_id = ?1 ORDER BY granted_at ASC, username ASC",
    )?;
    let rows = stmt.query_map([page_id], |row| row.get(0))?;
    let mut usernames = Vec::new();
    for row in rows {
        usernames.push(row?);
    }
    Ok(usernames)
}

fn map_row_to_page(row: &Row) -> rusqlite::Result<Page> {
    let facts_json: Option<String> = row.get(4)?;
    let facts: Vec<SidebarFact> = match facts_json {
        Some(s) => serde_json::from_str(&s).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?,
        None => Vec::new(),
    };

    let visibility_str: String = row.get(5)?;
    let visibility: Visibility = visibility_str.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            rusqlite::types::Type::Text,
            Box::new(e) as Box<dyn std::error::Error + Send + Sync>,
        )
    })?;

    let edit_policy_str: String = row.get(6)?;
    let edit_policy: EditPolicy = edit_policy_str.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            6,
            rusqlite::types::Type::Text,
            Box::new(e) as Box<dyn std::error::Error + Send + Sync>,
        )
    })?;

    Ok(Page {
        id: row.get(0)?,
        slug: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        facts,
        visibility,
        edit_policy,
        owner: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().expect("failed to open in-memory db");
        tome_db::run_migrations(&conn).expect("failed to run migrations");
        for user in ["alice", "bob", "carol"] {
            conn.execute(
                "INSERT INTO users (username, password_hash) VALUES (?1, 'x$x')",
                [user],
            )
            .expect("failed to create test user");
        }
        conn
    }

    fn sample_params(title: &str, owner: &str) -> CreatePageParams {
        CreatePageParams {
            title: title.to_string(),
            content: "Once upon a time".to_string(),
            facts: vec![
                SidebarFact {
                    key: "Race".to_string(),
                    value: serde_json::json!("Elf"),
                },
                SidebarFact {
                    key: "Age".to_string(),
                    value: serde_json::json!(412),
                },
            ],
            visibility: Visibility::Public,
            edit_policy: EditPolicy::OwnerOnly,
            owner: owner.to_string(),
        }
    }

    #[test]
    fn slugify_matches_expected_form() {
        assert_eq!(slugify("The Sunken Keep"), "the-sunken-keep");
        assert_eq!(slugify("Elara's Map!"), "elara-s-map-");
        assert_eq!(slugify("under_score-ok"), "under_score-ok");
    }

    #[test]
    fn create_and_read_back_round_trip() {
        let conn = setup_db();
        let created = create_page(&conn, &sample_params("The Sunken Keep", "alice"))
            .expect("create failed");
        assert_eq!(created.slug, "the-sunken-keep");

        let fetched = get_page(&conn, "the-sunken-keep").expect("get failed");
        assert_eq!(fetched.title, "The Sunken Keep");
        assert_eq!(fetched.content, "Once upon a time");
        assert_eq!(fetched.facts, created.facts);
        assert_eq!(fetched.facts[0].key, "Race");
        assert_eq!(fetched.facts[1].key, "Age");
        assert_eq!(fetched.visibility, Visibility::Public);
        assert_eq!(fetched.edit_policy, EditPolicy::OwnerOnly);
        assert_eq!(fetched.owner, "alice");
    }

    #[test]
    fn duplicate_slug_is_conflict() {
        let conn = setup_db();
        create_page(&conn, &sample_params("Moonwell", "alice")).expect("first create");
        let err = create_page(&conn, &sample_params("Moonwell", "bob")).unwrap_err();
        match err {
            PageError::SlugTaken(slug) => assert_eq!(slug, "moonwell"),
            other => panic!("expected SlugTaken, got {other:?}"),
        }
    }

    #[test]
    fn empty_title_is_validation_error() {
        let conn = setup_db();
        let err = create_page(&conn, &sample_params("   ", "alice")).unwrap_err();
        assert!(matches!(err, PageError::Validation(_)));
    }

    #[test]
    fn partial_update_preserves_other_fields() {
        let conn = setup_db();
        create_page(&conn, &sample_params("Moonwell", "alice")).expect("create");

        let updated = update_page(
            &conn,
            "moonwell",
            &UpdatePageParams {
                content: Some("Rewritten".to_string()),
                ..Default::default()
            },
        )
        .expect("update failed");

        assert_eq!(updated.content, "Rewritten");
        assert_eq!(updated.title, "Moonwell");
        assert_eq!(updated.facts.len(), 2);
        // Slug never changes, even when the title does.
        let retitled = update_page(
            &conn,
            "moonwell",
            &UpdatePageParams {
                title: Some("Moonwell (Ruined)".to_string()),
                ..Default::default()
            },
        )
        .expect("retitle failed");
        assert_eq!(retitled.slug, "moonwell");
    }

    #[test]
    fn update_nonexistent_page_is_not_found() {
        let conn = setup_db();
        let err = update_page(
            &conn,
            "ghost",
            &UpdatePageParams {
                content: Some("boo".to_string()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(err, PageError::NotFound(_)));
    }

    #[test]
    fn grant_is_idempotent() {
        let conn = setup_db();
        let page = create_page(&conn, &sample_params("Secret Vault", "alice")).expect("create");

        assert!(grant_access(&conn, page.id, "bob").expect("first grant"));
        assert!(!grant_access(&conn, page.id, "bob").expect("second grant is a no-op"));

        let allowed = list_allowed(&conn, page.id).expect("list");
        assert_eq!(allowed, vec!["bob".to_string()]);
    }

    #[test]
    fn empty_allow_list_is_ok() {
        let conn = setup_db();
        let page = create_page(&conn, &sample_params("Lonely Page", "alice")).expect("create");
        assert!(list_allowed(&conn, page.id).expect("list").is_empty());
    }
}
