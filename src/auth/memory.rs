use super::password::{generate_token, hash_password, verify_password, DEFAULT_COST};
use super::{normalize_email, AuthError, AuthSession, CredentialProvider};
use crate::model::CredentialId;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

struct StoredCredential {
    email: String,
    hash: String,
}

#[derive(Default)]
struct State {
    credentials: HashMap<CredentialId, StoredCredential>,
    sessions: HashMap<String, AuthSession>,
}

/// In-process credential provider.
pub struct MemoryCredentials {
    state: Mutex<State>,
    cost: u32,
}

impl Default for MemoryCredentials {
    fn default() -> Self {
        Self::with_cost(DEFAULT_COST)
    }
}

impl MemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash new passwords with bcrypt work factor `cost`.
    pub fn with_cost(cost: u32) -> Self {
        Self {
            state: Mutex::new(State::default()),
            cost,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, AuthError> {
        self.state
            .lock()
            .map_err(|_| AuthError::Other("credential state poisoned".to_string()))
    }

    pub fn credential_count(&self) -> usize {
        self.lock().map(|s| s.credentials.len()).unwrap_or(0)
    }
}

impl CredentialProvider for MemoryCredentials {
    fn sign_up(&self, email: &str, password: &str) -> Result<CredentialId, AuthError> {
        let email = normalize_email(email);
        let mut state = self.lock()?;
        if state.credentials.values().any(|c| c.email == email) {
            return Err(AuthError::DuplicateEmail(email));
        }
        let hash = hash_password(password, self.cost)?;
        let id = Uuid::new_v4();
        state.credentials.insert(id, StoredCredential { email, hash });
        Ok(id)
    }

    fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let email = normalize_email(email);
        let mut state = self.lock()?;
        let id = state
            .credentials
            .iter()
            .find(|(_, c)| c.email == email && verify_password(password, &c.hash))
            .map(|(id, _)| *id)
            .ok_or(AuthError::InvalidCredentials)?;
        let session = AuthSession {
            token: generate_token(),
            credential_id: id,
            created_at: Utc::now(),
        };
        state.sessions.insert(session.token.clone(), session.clone());
        Ok(session)
    }

    fn sign_out(&self, token: &str) -> Result<(), AuthError> {
        self.lock()?.sessions.remove(token);
        Ok(())
    }

    fn current_user(&self, token: &str) -> Result<Option<CredentialId>, AuthError> {
        Ok(self.lock()?.sessions.get(token).map(|s| s.credential_id))
    }

    fn change_password(
        &self,
        id: CredentialId,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let mut state = self.lock()?;
        let credential = state
            .credentials
            .get_mut(&id)
            .ok_or(AuthError::UnknownCredential(id))?;
        if !verify_password(current_password, &credential.hash) {
            return Err(AuthError::InvalidCredentials);
        }
        credential.hash = hash_password(new_password, self.cost)?;
        Ok(())
    }

    fn revoke(&self, id: CredentialId) -> Result<(), AuthError> {
        let mut state = self.lock()?;
        state.credentials.remove(&id);
        state.sessions.retain(|_, s| s.credential_id != id);
        Ok(())
    }
}
