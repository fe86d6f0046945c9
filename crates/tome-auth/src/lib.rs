//! Identity provider for the Tome wiki platform.
//!
//! Holds user records, password hashing, and bearer token issuance. The rest
//! of the workspace never sees a credential: it receives either a resolved
//! username or nothing (anonymous).
//!
//! Tokens are HMAC-SHA256 signed: `base64(username|expires_unix_secs|sig)`.
//! The token binds a username to a time window, preventing both
//! impersonation (different username) and replay (after expiry).

mod token;
mod users;

pub use token::{derive_token_secret, mint_token, verify_token, TokenError};
pub use users::{
    create_user, get_user, hash_password, verify_credentials, AuthError, User,
    MAX_USERNAME_LEN, MIN_PASSWORD_LEN,
};
