use super::percent;
use crate::store::CensusSnapshot;
use serde::Serialize;

const HIGH_SCHOOL_TERMS: [&str; 7] = [
    "High School",
    "Secondary",
    "SSC",
    "SSLC",
    "HSC",
    "Class 10",
    "Class 12",
];

const COLLEGE_TERMS: [&str; 5] = ["Bachelor", "Master", "PhD", "Diploma", "Degree"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StudentAnalytics {
    /// Residents with an education row.
    pub total: usize,
    pub high_school: usize,
    pub college: usize,
    /// Share of education rows with a completion year.
    pub graduation_rate: u32,
}

impl StudentAnalytics {
    /// Terms are matched as written (case-sensitive substrings).
    pub fn compute(snapshot: &CensusSnapshot) -> Self {
        let rows = &snapshot.education;
        let mentions = |terms: &[&str]| {
            rows.iter()
                .filter(|e| {
                    e.highest_qualification
                        .as_deref()
                        .is_some_and(|q| terms.iter().any(|t| q.contains(t)))
                })
                .count()
        };
        let completed = rows.iter().filter(|e| e.year_of_completion.is_some()).count();

        Self {
            total: rows.len(),
            high_school: mentions(&HIGH_SCHOOL_TERMS),
            college: mentions(&COLLEGE_TERMS),
            graduation_rate: percent(completed, rows.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Education;
    use uuid::Uuid;

    fn row(qualification: &str, year: Option<i32>) -> Education {
        Education {
            resident_id: Uuid::new_v4(),
            highest_qualification: Some(qualification.to_string()),
            school_or_college_name: None,
            year_of_completion: year,
        }
    }

    #[test]
    fn counts_school_and_college_terms() {
        let snapshot = CensusSnapshot {
            education: vec![
                row("SSLC", Some(2010)),
                row("Bachelor of Commerce", Some(2014)),
                row("Diploma in Mechanical", None),
                row("sslc", None),
            ],
            ..CensusSnapshot::default()
        };

        let students = StudentAnalytics::compute(&snapshot);
        assert_eq!(students.total, 4);
        // "SSC" is not a substring of "SSLC"; the lowercase row matches nothing.
        assert_eq!(students.high_school, 1);
        assert_eq!(students.college, 2);
        assert_eq!(students.graduation_rate, 50);
    }

    #[test]
    fn empty_snapshot_has_zero_rate() {
        let students = StudentAnalytics::compute(&CensusSnapshot::default());
        assert_eq!(students, StudentAnalytics::default());
    }
}
