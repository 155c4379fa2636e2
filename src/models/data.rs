//! Data models served by the mock fetcher

use serde::{Deserialize, Serialize};

/// Current time as reported by the time resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeData {
    /// RFC 3339 timestamp
    pub datetime: String,
    /// Unix time in milliseconds
    pub unixtime: i64,
    /// UTC offset of the server's local time zone
    pub timezone: String,
    /// Increments with every fetch, so refetches are visible
    pub sequence: u64,
}

impl TimeData {
    /// Captures the current time.
    pub fn now(sequence: u64) -> Self {
        let now = chrono::Local::now();
        Self {
            datetime: now.to_rfc3339(),
            unixtime: now.timestamp_millis(),
            timezone: now.offset().to_string(),
            sequence,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: u64,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformStats {
    pub total_users: u64,
    pub total_posts: u64,
    pub active_today: u64,
    pub last_updated: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_data_now() {
        let time = TimeData::now(3);
        assert_eq!(time.sequence, 3);
        assert!(chrono::DateTime::parse_from_rfc3339(&time.datetime).is_ok());
        assert!(time.unixtime > 0);
    }

    #[test]
    fn test_platform_stats_uses_camel_case() {
        let json = r#"{"totalUsers": 1, "totalPosts": 2, "activeToday": 3, "lastUpdated": "now"}"#;
        let stats: PlatformStats = serde_json::from_str(json).unwrap();
        assert_eq!(stats.total_posts, 2);

        let back = serde_json::to_string(&stats).unwrap();
        assert!(back.contains("activeToday"));
    }
}
