use super::{CredentialId, ResidentId, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Links a credential to the resident it acts as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub user_id: CredentialId,
    pub resident_id: Option<ResidentId>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}
