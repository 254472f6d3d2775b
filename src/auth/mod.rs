//! Credential provider boundary.
//!
//! Sign-up issues the [`CredentialId`] every other record hangs off.
//! [`MemoryCredentials`] serves tests and embedding; [`PgCredentials`]
//! persists to the `auth_credentials` and `auth_sessions` tables.

mod memory;
pub mod password;
mod postgres;

pub use memory::MemoryCredentials;
pub use postgres::PgCredentials;

use crate::executor::StoreError;
use crate::model::CredentialId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug)]
pub enum AuthError {
    /// The email already has a credential.
    DuplicateEmail(String),
    /// Unknown email or wrong password.
    InvalidCredentials,
    /// The credential id does not exist.
    UnknownCredential(CredentialId),
    /// Backing store failure.
    Store(StoreError),
    Other(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::DuplicateEmail(email) => write!(f, "Email already registered: {email}"),
            AuthError::InvalidCredentials => write!(f, "Invalid email or password"),
            AuthError::UnknownCredential(id) => write!(f, "Unknown credential {id}"),
            AuthError::Store(e) => write!(f, "Credential store error: {e}"),
            AuthError::Other(s) => write!(f, "Auth error: {s}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AuthError::Store(err)
    }
}

/// A signed-in session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub token: String,
    pub credential_id: CredentialId,
    pub created_at: DateTime<Utc>,
}

/// Emails are compared case-insensitively.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub trait CredentialProvider {
    /// Create a credential for a new email.
    fn sign_up(&self, email: &str, password: &str) -> Result<CredentialId, AuthError>;

    fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError>;

    /// End a session. Unknown tokens are ignored.
    fn sign_out(&self, token: &str) -> Result<(), AuthError>;

    /// The credential behind a live session token.
    fn current_user(&self, token: &str) -> Result<Option<CredentialId>, AuthError>;

    fn change_password(
        &self,
        id: CredentialId,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError>;

    /// Delete a credential and its sessions. Used to undo a sign-up whose
    /// registration row could not be written.
    fn revoke(&self, id: CredentialId) -> Result<(), AuthError>;
}
