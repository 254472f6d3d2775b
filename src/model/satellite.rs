//! The four one-to-one tables keyed by `resident_id`. Writes are always
//! upserts on that key.

use super::{BloodGroup, OccupationKind, ResidentId, Thalassemia, YesNo};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Education {
    pub resident_id: ResidentId,
    pub highest_qualification: Option<String>,
    pub school_or_college_name: Option<String>,
    pub year_of_completion: Option<i32>,
}

impl Education {
    /// The recorded qualification, if it has any non-blank text.
    pub fn qualification(&self) -> Option<&str> {
        self.highest_qualification
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupation {
    pub resident_id: ResidentId,
    pub occupation: Option<OccupationKind>,
    pub profession: Option<String>,
    pub work_location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthRecord {
    pub resident_id: ResidentId,
    pub blood_group: Option<BloodGroup>,
    pub mediclaim: YesNo,
    pub thalassemia: Option<Thalassemia>,
    pub g6pd: YesNo,
}

/// Membership of the community distribution groups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMembership {
    pub resident_id: ResidentId,
    pub shirva_setu: bool,
    pub dukhad_nidhan: bool,
    pub sgnx: bool,
    pub sgnx_parent: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn blank_qualification_is_none() {
        let mut education = Education {
            resident_id: Uuid::new_v4(),
            highest_qualification: Some("   ".into()),
            school_or_college_name: None,
            year_of_completion: None,
        };
        assert_eq!(education.qualification(), None);

        education.highest_qualification = Some(" B.Com ".into());
        assert_eq!(education.qualification(), Some("B.Com"));
    }
}
