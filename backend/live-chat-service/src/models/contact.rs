use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OnlineStatus {
    Online,
    Offline,
}

/// A conversation partner and whether they are connected right now.
/// Computed per query, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactStatus {
    pub id: String,
    pub firstname: String,
    pub lastname: String,
    pub status: OnlineStatus,
}

/// Row produced by the recent-contacts query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentContact {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub last_message_at: Option<DateTime<Utc>>,
}

impl RecentContact {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Parses a stored `created_at`. Accepts SQLite's `YYYY-MM-DD HH:MM:SS[.fff]`
/// and RFC 3339. Anything else is treated as no timestamp.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}
