use super::{HouseholdId, ResidentId};
use serde::{Deserialize, Serialize};

/// A family unit anchored by its head of family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Household {
    pub household_id: HouseholdId,
    /// The one resident of this household whose relation is `Self`.
    pub head_of_family_id: ResidentId,
    pub address: String,
    pub chapter: String,
    /// 1 at creation; incremented with every further member insert.
    pub number_of_members: i32,
}

impl Household {
    /// A new household headed by `head`, with empty address and chapter.
    pub fn founded_by(head: ResidentId) -> Self {
        Self {
            household_id: uuid::Uuid::new_v4(),
            head_of_family_id: head,
            address: String::new(),
            chapter: String::new(),
            number_of_members: 1,
        }
    }
}
