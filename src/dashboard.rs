//! Administrator landing page: headline counts and recent activity.

use crate::executor::StoreError;
use crate::store::EntityStore;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// How many of the latest rows each activity entry looks at.
const RECENT_LIMIT: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardCounts {
    pub total_households: u64,
    pub total_residents: u64,
    pub pending_approvals: u64,
    pub life_members: u64,
}

impl DashboardCounts {
    /// # Errors
    ///
    /// Returns `StoreError` if any count fails.
    pub fn load(store: &dyn EntityStore) -> Result<Self, StoreError> {
        Ok(Self {
            total_households: store.count_households()?,
            total_residents: store.count_residents()?,
            pending_approvals: store.count_pending()?,
            life_members: store.count_lifemembers()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    NewResidents,
    Approvals,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Activity {
    pub kind: ActivityKind,
    /// Rows considered, at most three.
    pub count: usize,
    /// Time of the newest of them.
    pub latest: DateTime<Utc>,
    /// `latest` relative to when the dashboard was loaded.
    pub label: String,
}

impl Activity {
    pub fn summary(&self) -> String {
        match self.kind {
            ActivityKind::NewResidents => format!("{} new resident registrations", self.count),
            ActivityKind::Approvals => format!("{} approvals completed", self.count),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    pub counts: DashboardCounts,
    pub recent_activity: Vec<Activity>,
}

impl Dashboard {
    /// # Errors
    ///
    /// Returns `StoreError` if a count or listing fails.
    pub fn load(store: &dyn EntityStore, now: DateTime<Utc>) -> Result<Self, StoreError> {
        let counts = DashboardCounts::load(store)?;

        let resident_times: Vec<DateTime<Utc>> =
            store.list_residents()?.iter().map(|r| r.created_at).collect();
        let account_times: Vec<DateTime<Utc>> =
            store.list_accounts()?.iter().map(|a| a.created_at).collect();

        let mut recent_activity = Vec::new();
        for (kind, mut times) in [
            (ActivityKind::NewResidents, resident_times),
            (ActivityKind::Approvals, account_times),
        ] {
            times.sort_unstable_by(|a, b| b.cmp(a));
            let recent = &times[..times.len().min(RECENT_LIMIT)];
            if let Some(latest) = recent.iter().max() {
                recent_activity.push(Activity {
                    kind,
                    count: recent.len(),
                    latest: *latest,
                    label: relative_time(*latest, now),
                });
            }
        }

        Ok(Self {
            counts,
            recent_activity,
        })
    }
}

/// "1 hour ago", "N hours ago", "Yesterday", "N days ago", then the date.
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let hours = (now - then).num_hours();
    if hours < 24 {
        return if hours == 1 {
            "1 hour ago".to_string()
        } else {
            format!("{} hours ago", hours.max(0))
        };
    }
    match hours / 24 {
        1 => "Yesterday".to_string(),
        days if days < 7 => format!("{days} days ago"),
        _ => then.format("%Y-%m-%d").to_string(),
    }
}
