use super::{Education, GroupMembership, HealthRecord, Household, Occupation, Resident};
use serde::{Deserialize, Serialize};

/// A resident joined with its household and satellite rows.
///
/// Missing satellites are `None`; display code picks its own placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResidentProfile {
    pub resident: Resident,
    pub household: Option<Household>,
    pub education: Option<Education>,
    pub occupation: Option<Occupation>,
    pub health: Option<HealthRecord>,
    pub groups: Option<GroupMembership>,
}

impl ResidentProfile {
    pub fn new(resident: Resident) -> Self {
        Self {
            resident,
            household: None,
            education: None,
            occupation: None,
            health: None,
            groups: None,
        }
    }

    pub fn occupation_kind(&self) -> Option<super::OccupationKind> {
        self.occupation.as_ref().and_then(|o| o.occupation)
    }

    pub fn qualification(&self) -> Option<&str> {
        self.education.as_ref().and_then(Education::qualification)
    }
}
