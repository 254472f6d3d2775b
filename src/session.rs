//! Explicit household context for one signed-in user.
//!
//! The session carries the "current household" pointer that non-head
//! members are attached to. Each caller owns its own session; nothing is
//! shared between them. It lives until [`HouseholdSession::reset`] or until
//! the owner drops it, and serializes to JSON for per-browser persistence.

use crate::executor::StoreError;
use crate::model::{CredentialId, HouseholdId};
use crate::store::EntityStore;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseholdSession {
    pub credential: Option<CredentialId>,
    current_household: Option<HouseholdId>,
}

impl HouseholdSession {
    pub fn new(credential: Option<CredentialId>) -> Self {
        Self {
            credential,
            current_household: None,
        }
    }

    /// Rebuild the session of a returning user from the account link
    /// (account → resident → household).
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if a lookup fails. A user with no account or no
    /// linked resident gets a session without a household.
    pub fn resume(store: &dyn EntityStore, credential: CredentialId) -> Result<Self, StoreError> {
        let household = match store.find_account(credential)? {
            Some(account) => match account.resident_id {
                Some(resident_id) => store
                    .find_resident(resident_id)?
                    .and_then(|r| r.household_id),
                None => None,
            },
            None => None,
        };
        log::debug!("resumed session for {credential} (household: {household:?})");
        Ok(Self {
            credential: Some(credential),
            current_household: household,
        })
    }

    pub fn current_household(&self) -> Option<HouseholdId> {
        self.current_household
    }

    pub fn set_current_household(&mut self, household: HouseholdId) {
        self.current_household = Some(household);
    }

    /// Forget the household pointer.
    pub fn reset(&mut self) {
        self.current_household = None;
    }

    /// # Errors
    ///
    /// Returns `serde_json::Error` if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// # Errors
    ///
    /// Returns `serde_json::Error` for malformed input.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
