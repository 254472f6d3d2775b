use super::{percent, Count, Tally};
use crate::config::AnalyticsConfig;
use crate::model::{Education, Gender};
use crate::store::CensusSnapshot;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Ordered (pattern, level) pairs, matched against the lowercased
/// qualification; the first hit wins. `.` is any character.
const LEVEL_PATTERNS: [(&str, &str); 24] = [
    ("primary", "Primary"),
    ("elementary", "Primary"),
    ("secondary", "Secondary"),
    ("high school", "Secondary"),
    ("10th", "Secondary"),
    ("higher secondary", "Higher Secondary"),
    ("12th", "Higher Secondary"),
    ("intermediate", "Higher Secondary"),
    ("bachelor", "Bachelor"),
    ("b.?tech", "B.Tech"),
    ("b.?e.?", "B.E."),
    ("b.?com", "B.Com"),
    ("b.?a.?", "B.A."),
    ("b.?sc.?", "B.Sc."),
    ("master", "Master"),
    ("m.?tech", "M.Tech"),
    ("mba", "MBA"),
    ("m.?s.?", "M.S."),
    ("ph.?d", "Ph.D"),
    ("post doctorate", "Post-Doctorate"),
    ("mbbs", "MBBS"),
    ("ca", "CA"),
    ("cs", "CS"),
    ("llb", "LLB"),
];

static LEVELS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    LEVEL_PATTERNS
        .iter()
        .filter_map(|(pattern, level)| match Regex::new(pattern) {
            Ok(re) => Some((re, *level)),
            Err(e) => {
                log::warn!("skipping education pattern {pattern:?}: {e}");
                None
            }
        })
        .collect()
});

fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Map a free-text qualification onto a standard level name, or title-case
/// it when no pattern matches.
pub fn standardize_education_level(qualification: &str) -> String {
    let lower = qualification.to_lowercase();
    LEVELS
        .iter()
        .find(|(re, _)| re.is_match(&lower))
        .map(|(_, level)| (*level).to_string())
        .unwrap_or_else(|| title_case(qualification))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Literacy {
    pub overall: u32,
    pub male: u32,
    pub female: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct YearCount {
    pub year: i32,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelSeries {
    pub level: String,
    /// One entry per year of [`LevelTrend::years`].
    pub counts: Vec<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LevelTrend {
    pub years: Vec<i32>,
    pub series: Vec<LevelSeries>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EducationAnalytics {
    /// Most common standardized levels.
    pub levels: Vec<Count>,
    pub literacy: Literacy,
    /// Completions per year, ascending.
    pub graduations: Vec<YearCount>,
    pub level_trend: LevelTrend,
}

impl EducationAnalytics {
    pub fn compute(snapshot: &CensusSnapshot, config: &AnalyticsConfig) -> Self {
        let rows = snapshot.education_in_resident_order();

        let mut levels = Tally::default();
        for qualification in rows.iter().filter_map(|e| e.qualification()) {
            levels.add(&standardize_education_level(qualification));
        }

        Self {
            levels: levels.top(config.top_education_levels),
            literacy: literacy(snapshot),
            graduations: graduations(&rows),
            level_trend: level_trend(&rows, config.trend_education_levels),
        }
    }
}

/// Residents with a recorded qualification, as a share of residents, overall
/// and per gender.
fn literacy(snapshot: &CensusSnapshot) -> Literacy {
    let literate: BTreeSet<_> = snapshot
        .education
        .iter()
        .filter(|e| e.qualification().is_some())
        .map(|e| e.resident_id)
        .collect();

    let rate = |gender: Option<Gender>| {
        let group: Vec<_> = snapshot
            .residents
            .iter()
            .filter(|r| gender.map_or(true, |g| r.gender == g))
            .collect();
        let literate_count = group
            .iter()
            .filter(|r| literate.contains(&r.resident_id))
            .count();
        percent(literate_count, group.len())
    };

    Literacy {
        overall: rate(None),
        male: rate(Some(Gender::Male)),
        female: rate(Some(Gender::Female)),
    }
}

fn graduations(rows: &[&Education]) -> Vec<YearCount> {
    let mut per_year: BTreeMap<i32, usize> = BTreeMap::new();
    for year in rows.iter().filter_map(|e| e.year_of_completion) {
        *per_year.entry(year).or_default() += 1;
    }
    per_year
        .into_iter()
        .map(|(year, count)| YearCount { year, count })
        .collect()
}

/// Completions per year for the first `max_levels` levels encountered.
fn level_trend(rows: &[&Education], max_levels: usize) -> LevelTrend {
    let years: Vec<i32> = rows
        .iter()
        .filter_map(|e| e.year_of_completion)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut order = Tally::default();
    let mut per_level: BTreeMap<String, BTreeMap<i32, usize>> = BTreeMap::new();
    for row in rows {
        let (Some(year), Some(qualification)) = (row.year_of_completion, row.qualification()) else {
            continue;
        };
        let level = standardize_education_level(qualification);
        order.add(&level);
        *per_level.entry(level).or_default().entry(year).or_default() += 1;
    }

    let series = order
        .labels()
        .take(max_levels)
        .map(|level| LevelSeries {
            level: level.to_string(),
            counts: years
                .iter()
                .map(|year| {
                    per_level
                        .get(level)
                        .and_then(|by_year| by_year.get(year))
                        .copied()
                        .unwrap_or(0)
                })
                .collect(),
        })
        .collect();

    LevelTrend { years, series }
}
