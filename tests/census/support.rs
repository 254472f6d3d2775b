use census::household::{EducationDetails, GroupFlags, HealthDetails, OccupationDetails};
use census::model::{Gender, MaritalStatus, OccupationKind, Relation};
use census::{EntityStore, MemberForm};
use chrono::NaiveDate;
use fake::faker::name::en::{FirstName, LastName};
use fake::Fake;

pub fn member(relation: Relation, born: i32) -> MemberForm {
    MemberForm {
        first_name: FirstName().fake(),
        middle_name: None,
        last_name: LastName().fake(),
        gender: Gender::Female,
        relation,
        marital_status: MaritalStatus::Married,
        date_of_birth: NaiveDate::from_ymd_opt(born, 4, 1).unwrap(),
        phone_number: None,
        email: None,
        lifemember: false,
        education: EducationDetails::default(),
        occupation: OccupationDetails::default(),
        health: HealthDetails::default(),
        groups: GroupFlags::default(),
    }
}

pub fn named(first_name: &str, relation: Relation) -> MemberForm {
    MemberForm {
        first_name: first_name.to_string(),
        ..member(relation, 1985)
    }
}

pub fn with_job(mut form: MemberForm, kind: OccupationKind, profession: &str) -> MemberForm {
    form.occupation = OccupationDetails {
        occupation: Some(kind),
        profession: Some(profession.to_string()),
        work_location: None,
    };
    form
}

pub fn with_qualification(mut form: MemberForm, qualification: &str, year: i32) -> MemberForm {
    form.education = EducationDetails {
        highest_qualification: Some(qualification.to_string()),
        school_or_college_name: None,
        year_of_completion: Some(year),
    };
    form
}

/// Every household has exactly one `Self` resident and it is the head.
pub fn assert_one_head_per_household(store: &dyn EntityStore) {
    for household in store.list_households().unwrap() {
        let heads: Vec<_> = store
            .residents_in_household(household.household_id)
            .unwrap()
            .into_iter()
            .filter(|r| r.is_head())
            .collect();
        assert_eq!(heads.len(), 1, "household {}", household.household_id);
        assert_eq!(heads[0].resident_id, household.head_of_family_id);
    }
}
