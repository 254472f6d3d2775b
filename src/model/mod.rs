//! Census entities.
//!
//! Every enumeration is stored and displayed as its canonical text
//! (`"Self"`, `"Business Owner"`, `"AB+"`). Parsing is case-insensitive
//! and accepts the spellings older forms used (`"Husband"`, `"Wife"`).

mod account;
mod household;
mod pending;
mod profile;
mod resident;
mod satellite;

pub use account::UserAccount;
pub use household::Household;
pub use pending::PendingRegistration;
pub use profile::ResidentProfile;
pub use resident::{age_on, Resident};
pub use satellite::{Education, GroupMembership, HealthRecord, Occupation};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type ResidentId = uuid::Uuid;
pub type HouseholdId = uuid::Uuid;
/// Identifier issued by the credential provider; also the pending
/// registration id and the `user_accounts.user_id`.
pub type CredentialId = uuid::Uuid;

/// A stored or submitted value is not one of an enumeration's spellings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' is not a valid {}", self.value, self.kind)
    }
}

impl std::error::Error for ParseEnumError {}

macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal $(| $alias:literal)* ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $text $(, alias = $alias)*)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let needle = s.trim();
                $(
                    if needle.eq_ignore_ascii_case($text)
                        $(|| needle.eq_ignore_ascii_case($alias))*
                    {
                        return Ok($name::$variant);
                    }
                )+
                Err(ParseEnumError {
                    kind: stringify!($name),
                    value: s.to_string(),
                })
            }
        }
    };
}

text_enum! {
    Gender {
        Male => "Male",
        Female => "Female",
        Other => "Other",
    }
}

text_enum! {
    /// A resident's relation to the head of the household.
    Relation {
        /// The head of family. Stored as `"Self"`.
        Head => "Self",
        Spouse => "Spouse" | "Husband" | "Wife",
        Son => "Son",
        Daughter => "Daughter",
        Father => "Father",
        Mother => "Mother",
        Other => "Other",
    }
}

text_enum! {
    MaritalStatus {
        Single => "Single",
        Married => "Married",
        Divorced => "Divorced",
        Widowed => "Widowed",
    }
}

text_enum! {
    OccupationKind {
        Student => "Student",
        Employed => "Employed",
        SelfEmployed => "Self-employed" | "Self Employed",
        BusinessOwner => "Business Owner",
        Homemaker => "Homemaker",
        Retired => "Retired",
        Unemployed => "Unemployed",
        Other => "Other",
    }
}

text_enum! {
    BloodGroup {
        APositive => "A+",
        ANegative => "A-",
        BPositive => "B+",
        BNegative => "B-",
        AbPositive => "AB+",
        AbNegative => "AB-",
        OPositive => "O+",
        ONegative => "O-",
        Unknown => "Unknown",
    }
}

text_enum! {
    Thalassemia {
        Major => "Major",
        Minor => "Minor",
        Negative => "Negative",
        NotChecked => "Not Checked",
    }
}

text_enum! {
    YesNo {
        Yes => "yes",
        No => "no",
    }
}

text_enum! {
    Role {
        Admin => "admin",
        User => "user",
    }
}

impl Relation {
    pub fn is_head(self) -> bool {
        self == Relation::Head
    }
}

impl From<bool> for YesNo {
    fn from(value: bool) -> Self {
        if value {
            YesNo::Yes
        } else {
            YesNo::No
        }
    }
}

impl From<YesNo> for bool {
    fn from(value: YesNo) -> Self {
        value == YesNo::Yes
    }
}

impl Default for YesNo {
    fn default() -> Self {
        YesNo::No
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relation_self_round_trips_through_text() {
        assert_eq!(Relation::Head.as_str(), "Self");
        assert_eq!("self".parse::<Relation>().unwrap(), Relation::Head);
        assert_eq!(" Self ".parse::<Relation>().unwrap(), Relation::Head);
    }

    #[test]
    fn spouse_accepts_legacy_spellings() {
        assert_eq!("Husband".parse::<Relation>().unwrap(), Relation::Spouse);
        assert_eq!("wife".parse::<Relation>().unwrap(), Relation::Spouse);
        let json: Relation = serde_json::from_str("\"Wife\"").unwrap();
        assert_eq!(json, Relation::Spouse);
        assert_eq!(serde_json::to_string(&json).unwrap(), "\"Spouse\"");
    }

    #[test]
    fn unknown_text_is_a_parse_error() {
        let err = "Cousin".parse::<Relation>().unwrap_err();
        assert_eq!(err.to_string(), "'Cousin' is not a valid Relation");
    }

    #[test]
    fn occupation_kinds_use_display_text() {
        assert_eq!(OccupationKind::BusinessOwner.to_string(), "Business Owner");
        assert_eq!(
            "self employed".parse::<OccupationKind>().unwrap(),
            OccupationKind::SelfEmployed
        );
        assert_eq!(OccupationKind::ALL.len(), 8);
    }

    #[test]
    fn blood_groups_cover_the_form_options() {
        let texts: Vec<&str> = BloodGroup::ALL.iter().map(|b| b.as_str()).collect();
        assert_eq!(
            texts,
            vec!["A+", "A-", "B+", "B-", "AB+", "AB-", "O+", "O-", "Unknown"]
        );
        assert_eq!("ab-".parse::<BloodGroup>().unwrap(), BloodGroup::AbNegative);
    }

    #[test]
    fn yes_no_maps_booleans() {
        assert_eq!(YesNo::from(true), YesNo::Yes);
        assert!(!bool::from(YesNo::No));
        assert_eq!(YesNo::default().as_str(), "no");
        assert_eq!("Not Checked".parse::<Thalassemia>().unwrap(), Thalassemia::NotChecked);
    }
}
