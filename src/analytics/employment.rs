use super::{percent, Count, Tally};
use crate::config::AnalyticsConfig;
use crate::model::{OccupationKind, ResidentProfile};
use crate::store::CensusSnapshot;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;

/// Occupations counted as in work.
pub const EMPLOYED: [OccupationKind; 3] = [
    OccupationKind::Employed,
    OccupationKind::SelfEmployed,
    OccupationKind::BusinessOwner,
];

/// Occupations counted as out of work. Anything else is in neither set.
pub const UNEMPLOYED: [OccupationKind; 4] = [
    OccupationKind::Student,
    OccupationKind::Homemaker,
    OccupationKind::Retired,
    OccupationKind::Unemployed,
];

const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EmploymentStats {
    pub employed: usize,
    pub unemployed: usize,
    /// employed / (employed + unemployed), rounded percent.
    pub rate: u32,
}

impl EmploymentStats {
    pub fn from_occupations<I>(occupations: I) -> Self
    where
        I: IntoIterator<Item = Option<OccupationKind>>,
    {
        let mut employed = 0;
        let mut unemployed = 0;
        for kind in occupations.into_iter().flatten() {
            if EMPLOYED.contains(&kind) {
                employed += 1;
            } else if UNEMPLOYED.contains(&kind) {
                unemployed += 1;
            }
        }
        Self {
            employed,
            unemployed,
            rate: percent(employed, employed + unemployed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    pub year: i32,
    pub employed: usize,
    pub unemployed: usize,
    pub rate: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OccupationAnalytics {
    pub stats: EmploymentStats,
    /// Most common professions, "Unknown" and "N/A" left out.
    pub professions: Vec<Count>,
    /// Every occupation category; residents without one count as "Unknown".
    pub occupations: Vec<Count>,
    pub top_profession: Option<String>,
    pub top_sector: Option<String>,
    /// Trailing years, oldest first.
    pub trend: Vec<TrendPoint>,
}

fn is_placeholder(value: &str) -> bool {
    value.eq_ignore_ascii_case(UNKNOWN) || value.eq_ignore_ascii_case("N/A")
}

impl OccupationAnalytics {
    pub fn compute(snapshot: &CensusSnapshot, config: &AnalyticsConfig, as_of: NaiveDate) -> Self {
        let profiles = snapshot.profiles();
        let stats = EmploymentStats::from_occupations(profiles.iter().map(|p| p.occupation_kind()));

        let mut professions = Tally::default();
        let mut occupations = Tally::default();
        let mut sectors = Tally::default();
        for profile in &profiles {
            let profession = profile
                .occupation
                .as_ref()
                .and_then(|o| o.profession.as_deref())
                .map(str::trim)
                .filter(|p| !p.is_empty() && !is_placeholder(p));
            if let Some(profession) = profession {
                professions.add(profession);
            }

            match profile.occupation_kind() {
                Some(kind) => {
                    occupations.add(kind.as_str());
                    sectors.add(kind.as_str());
                }
                None => occupations.add(UNKNOWN),
            }
        }

        let professions = professions.ranked();
        let top_profession = professions.first().map(|c| c.name.clone());
        let top_sector = sectors.ranked().first().map(|c| c.name.clone());
        let mut top_professions = professions;
        top_professions.truncate(config.top_professions);

        Self {
            stats,
            professions: top_professions,
            occupations: occupations.ranked(),
            top_profession,
            top_sector,
            trend: yearly_trend(&profiles, config, as_of.year()),
        }
    }
}

/// Employment per calendar year over the trailing `trend_years`, using each
/// resident's age in that year (year minus birth year) and current occupation.
fn yearly_trend(
    profiles: &[ResidentProfile],
    config: &AnalyticsConfig,
    current_year: i32,
) -> Vec<TrendPoint> {
    let span = i32::try_from(config.trend_years).unwrap_or(i32::MAX);
    let first_year = current_year.saturating_sub(span.saturating_sub(1));

    (first_year..=current_year)
        .map(|year| {
            let in_working_age = profiles.iter().filter(|p| {
                let age = year - p.resident.date_of_birth.year();
                (config.working_age_min..=config.working_age_max).contains(&age)
            });
            let stats =
                EmploymentStats::from_occupations(in_working_age.map(|p| p.occupation_kind()));
            TrendPoint {
                year,
                employed: stats.employed,
                unemployed: stats.unemployed,
                rate: stats.rate,
            }
        })
        .collect()
}
