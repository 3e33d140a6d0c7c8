use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use timeline_cache::Cacheable;
use uuid::Uuid;

// =====================================================================
// Timeline entries
// =====================================================================

/// One delivered item in an owner's timeline.
///
/// Ordered by `(created_at, id)` descending. `id` is assigned by the durable
/// store and breaks ties between entries created in the same instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TimelineEntry {
    pub id: i64,
    pub owner_id: Uuid,
    pub content_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl TimelineEntry {
    pub fn sort_key(&self) -> (DateTime<Utc>, i64) {
        (self.created_at, self.id)
    }
}

impl Cacheable for TimelineEntry {
    const KIND: &'static str = "timeline";
}

/// Timeline entry not yet persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTimelineEntry {
    pub owner_id: Uuid,
    pub content_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Position in a newest-first timeline.
///
/// Without `id` only the timestamp is compared; with it the comparison is on
/// `(created_at, id)`, which keeps pages stable across identical timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub created_at: DateTime<Utc>,
    pub id: Option<i64>,
}

impl Position {
    pub fn of(entry: &TimelineEntry) -> Self {
        Self {
            created_at: entry.created_at,
            id: Some(entry.id),
        }
    }

    fn is_newer(&self, entry: &TimelineEntry) -> bool {
        match self.id {
            Some(id) => entry.sort_key() > (self.created_at, id),
            None => entry.created_at > self.created_at,
        }
    }

    fn is_older(&self, entry: &TimelineEntry) -> bool {
        match self.id {
            Some(id) => entry.sort_key() < (self.created_at, id),
            None => entry.created_at < self.created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    /// Entries strictly older than the position (scroll down)
    Before(Position),
    /// Entries strictly newer than the position (pull to refresh)
    After(Position),
}

impl Cursor {
    pub fn admits(&self, entry: &TimelineEntry) -> bool {
        match self {
            Cursor::Before(position) => position.is_older(entry),
            Cursor::After(position) => position.is_newer(entry),
        }
    }

    pub fn position(&self) -> &Position {
        match self {
            Cursor::Before(position) | Cursor::After(position) => position,
        }
    }
}

// =====================================================================
// Cached entities
// =====================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ContentItem {
    pub id: Uuid,
    pub author_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cacheable for ContentItem {
    const KIND: &'static str = "content";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub username: String,
    pub nickname: Option<String>,
    pub avatar_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Cacheable for UserProfile {
    const KIND: &'static str = "user";
}

/// Everyone a user follows, cached for edge lookups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowingSet {
    pub user_id: Uuid,
    pub following_ids: Vec<Uuid>,
}

impl FollowingSet {
    pub fn contains(&self, user_id: Uuid) -> bool {
        self.following_ids.contains(&user_id)
    }
}

impl Cacheable for FollowingSet {
    const KIND: &'static str = "following";
}

/// One side of a follow edge with its creation time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FollowEdge {
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

// =====================================================================
// Mutations
// =====================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub nickname: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentUpdate {
    pub body: String,
}

// =====================================================================
// Responses
// =====================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentView {
    pub id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Absent when the author's profile is gone
    pub author: Option<UserProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineItem {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub content: ContentView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelinePage {
    pub has_next_page: bool,
    pub results: Vec<TimelineItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendshipItem {
    pub user: UserProfile,
    pub created_at: DateTime<Utc>,
    /// Whether the viewer follows `user`
    pub has_followed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowResult {
    pub success: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub duplicate: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnfollowResult {
    pub success: bool,
    pub deleted: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanoutReport {
    pub content_id: Uuid,
    /// Distinct timeline owners (followers plus the author)
    pub recipients: usize,
    /// Entries actually created; retries create none
    pub inserted: usize,
    pub cache_appends: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(id: i64, secs: i64) -> TimelineEntry {
        TimelineEntry {
            id,
            owner_id: Uuid::nil(),
            content_id: Uuid::nil(),
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    #[test]
    fn test_cursor_by_timestamp_only() {
        let at = Utc.timestamp_opt(100, 0).unwrap();
        let before = Cursor::Before(Position { created_at: at, id: None });
        let after = Cursor::After(Position { created_at: at, id: None });

        assert!(before.admits(&entry(1, 99)));
        assert!(!before.admits(&entry(2, 100)));
        assert!(after.admits(&entry(3, 101)));
        assert!(!after.admits(&entry(4, 100)));
    }

    #[test]
    fn test_cursor_breaks_ties_on_id() {
        let boundary = entry(10, 100);
        let before = Cursor::Before(Position::of(&boundary));
        let after = Cursor::After(Position::of(&boundary));

        assert!(before.admits(&entry(9, 100)));
        assert!(!before.admits(&entry(10, 100)));
        assert!(!before.admits(&entry(11, 100)));
        assert!(after.admits(&entry(11, 100)));
        assert!(!after.admits(&entry(9, 100)));
    }

    #[test]
    fn test_follow_result_hides_false_duplicate() {
        let json = serde_json::to_value(FollowResult {
            success: true,
            duplicate: false,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({ "success": true }));
    }
}
