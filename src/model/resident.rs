use super::{Gender, HouseholdId, MaritalStatus, Relation, ResidentId};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A recognized member of the community.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resident {
    pub resident_id: ResidentId,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub gender: Gender,
    pub relation: Relation,
    pub marital_status: MaritalStatus,
    pub date_of_birth: NaiveDate,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub lifemember: bool,
    /// `None` only between inserting a head and creating its household.
    pub household_id: Option<HouseholdId>,
    pub created_at: DateTime<Utc>,
}

impl Resident {
    pub fn full_name(&self) -> String {
        match self.middle_name.as_deref().map(str::trim) {
            Some(middle) if !middle.is_empty() => {
                format!("{} {} {}", self.first_name, middle, self.last_name)
            }
            _ => format!("{} {}", self.first_name, self.last_name),
        }
    }

    pub fn is_head(&self) -> bool {
        self.relation.is_head()
    }

    pub fn age_on(&self, date: NaiveDate) -> i32 {
        age_on(self.date_of_birth, date)
    }
}

/// Completed years between `date_of_birth` and `date`.
pub fn age_on(date_of_birth: NaiveDate, date: NaiveDate) -> i32 {
    let mut years = date.year() - date_of_birth.year();
    if (date.month(), date.day()) < (date_of_birth.month(), date_of_birth.day()) {
        years -= 1;
    }
    years
}
