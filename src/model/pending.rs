use super::CredentialId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A self-submitted registration awaiting administrator review.
///
/// `id` is the credential id issued at sign-up, so approval can link the
/// new account without another lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRegistration {
    pub id: CredentialId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
    pub registered_at: DateTime<Utc>,
}

impl PendingRegistration {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}
