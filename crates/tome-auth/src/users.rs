//! User records and password verification.

use rand::RngCore;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Maximum accepted username length.
pub const MAX_USERNAME_LEN: usize = 64;

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Errors that can occur during identity operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("user not found: {0}")]
    NotFound(String),
    #[error("username already taken")]
    UsernameTaken,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("{0}")]
    Validation(String),
}

/// A registered user.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct User {
    /// Internal database ID.
    pub id: i64,
    /// Unique public username; used as the identity string everywhere else.
    pub username: String,
    /// Salted password hash. Never serialized out.
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Creation timestamp (ISO 8601).
    pub created_at: String,
}

/// Hashes a password with a fresh random salt.
///
/// Stored form: `hex(salt)$hex(sha256(salt || password))`.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    let digest = salted_digest(&salt, password);
    format!("{}${}", hex::encode(salt), hex::encode(digest))
}

fn salted_digest(salt: &[u8], password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    let result = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    out
}

fn password_matches(stored: &str, password: &str) -> bool {
    let Some((salt_hex, digest_hex)) = stored.split_once('$') else {
        return false;
    };
    let Ok(salt) = hex::decode(salt_hex) else {
        return false;
    };
    let Ok(expected) = hex::decode(digest_hex) else {
        return false;
    };
    salted_digest(&salt, password).as_slice() == expected.as_slice()
}

fn validate_username(username: &str) -> Result<(), AuthError> {
    if username.is_empty() || username.len() > MAX_USERNAME_LEN {
        return Err(AuthError::Validation(format!(
            "username must be 1-{} characters",
            MAX_USERNAME_LEN
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(AuthError::Validation(
            "username may only contain letters, digits, '_' and '-'".to_string(),
        ));
    }
    Ok(())
}

/// Creates a new user with a hashed password.
pub fn create_user(conn: &Connection, username: &str, password: &str) -> Result<User, AuthError> {
    validate_username(username)?;
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let hash = hash_password(password);
    let result = conn.query_row(
        "INSERT INTO users (username, password_hash) VALUES (?1, ?2)
         RETURNING id, username, password_hash, created_at",
        params![username, hash],
        map_row_to_user,
    );

    match result {
        Ok(user) => Ok(user),
        Err(rusqlite::Error::SqliteFailure(code, _))
            if code.code == rusqlite::ffi::ErrorCode::ConstraintViolation =>
        {
            Err(AuthError::UsernameTaken)
        }
        Err(e) => Err(AuthError::Database(e)),
    }
}

/// Retrieves a user by username.
pub fn get_user(conn: &Connection, username: &str) -> Result<User, AuthError> {
    conn.query_row(
        "SELECT id, username, password_hash, created_at FROM users WHERE username = ?1",
        [username],
        map_row_to_user,
    )
    .optional()?
    .ok_or_else(|| AuthError::NotFound(username.to_string()))
}

/// Verifies a username/password pair, returning the user on success.
///
/// An unknown username and a wrong password both produce
/// [`AuthError::InvalidCredentials`] so callers cannot probe for accounts.
pub fn verify_credentials(
    conn: &Connection,
    username: &str,
    password: &str,
) -> Result<User, AuthError> {
    let user = match get_user(conn, username) {
        Ok(u) => u,
        Err(AuthError::NotFound(_)) => return Err(AuthError::InvalidCredentials),
        Err(e) => return Err(e),
    };
    if password_matches(&user.password_hash, password) {
        Ok(user)
    } else {
        Err(AuthError::InvalidCredentials)
    }
}

fn map_row_to_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        created_at: row.get(3)?,
    })
}
