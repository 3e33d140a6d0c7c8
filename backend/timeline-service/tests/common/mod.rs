//! In-memory doubles for the durable collaborators, and a harness wiring
//! them to the real services over a `MemoryCacheStore`.

#![allow(dead_code)]

use actix_web::web;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use timeline_cache::{BoundedListCache, MemoryCacheStore};
use timeline_service::config::TimelineConfig;
use timeline_service::db::{ContentRepository, ProfileRepository, SocialGraph, TimelineStore};
use timeline_service::error::{AppError, Result};
use timeline_service::handlers::AppState;
use timeline_service::models::{
    ContentItem, ContentUpdate, Cursor, FollowEdge, NewTimelineEntry, ProfileUpdate,
    TimelineEntry, UserProfile,
};
use timeline_service::services::CursorPaginator;
use timeline_service::{build_state, Backends};
use uuid::Uuid;

fn unavailable() -> AppError {
    AppError::Database(sqlx::Error::PoolTimedOut)
}

// =====================================================================
// Timeline store
// =====================================================================

#[derive(Default)]
pub struct InMemoryTimelineStore {
    rows: Mutex<Vec<TimelineEntry>>,
    next_id: AtomicI64,
    queries: AtomicUsize,
    down: AtomicBool,
}

impl InMemoryTimelineStore {
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// Number of `query_by_owner` calls served
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Full history of `owner`, newest first
    pub fn history(&self, owner_id: Uuid) -> Vec<TimelineEntry> {
        let mut rows: Vec<TimelineEntry> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.owner_id == owner_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.sort_key().cmp(&a.sort_key()));
        rows
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn remove_content(&self, content_id: Uuid) {
        self.rows
            .lock()
            .unwrap()
            .retain(|row| row.content_id != content_id);
    }
}

#[async_trait]
impl TimelineStore for InMemoryTimelineStore {
    async fn insert_entries(&self, entries: &[NewTimelineEntry]) -> Result<Vec<TimelineEntry>> {
        if self.down.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        let mut rows = self.rows.lock().unwrap();
        let mut inserted = Vec::new();
        for entry in entries {
            let exists = rows
                .iter()
                .any(|row| row.owner_id == entry.owner_id && row.content_id == entry.content_id);
            if exists {
                continue;
            }
            let row = TimelineEntry {
                id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
                owner_id: entry.owner_id,
                content_id: entry.content_id,
                created_at: entry.created_at,
            };
            rows.push(row.clone());
            inserted.push(row);
        }
        Ok(inserted)
    }

    async fn query_by_owner(
        &self,
        owner_id: Uuid,
        cursor: Option<Cursor>,
        limit: usize,
    ) -> Result<Vec<TimelineEntry>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self
            .history(owner_id)
            .into_iter()
            .filter(|row| cursor.map(|c| c.admits(row)).unwrap_or(true))
            .take(limit)
            .collect())
    }
}

/// Holds the first `query_by_owner` after its rows are read until
/// [`resume`](Self::resume), so a test can write in between.
pub struct PausingTimelineStore {
    inner: Arc<InMemoryTimelineStore>,
    armed: AtomicBool,
    paused: Notify,
    resumed: Notify,
}

impl PausingTimelineStore {
    pub fn new(inner: Arc<InMemoryTimelineStore>) -> Self {
        Self {
            inner,
            armed: AtomicBool::new(true),
            paused: Notify::new(),
            resumed: Notify::new(),
        }
    }

    pub async fn wait_paused(&self) {
        self.paused.notified().await;
    }

    pub fn resume(&self) {
        self.resumed.notify_one();
    }
}

#[async_trait]
impl TimelineStore for PausingTimelineStore {
    async fn insert_entries(&self, entries: &[NewTimelineEntry]) -> Result<Vec<TimelineEntry>> {
        self.inner.insert_entries(entries).await
    }

    async fn query_by_owner(
        &self,
        owner_id: Uuid,
        cursor: Option<Cursor>,
        limit: usize,
    ) -> Result<Vec<TimelineEntry>> {
        let rows = self.inner.query_by_owner(owner_id, cursor, limit).await?;
        if self.armed.swap(false, Ordering::SeqCst) {
            self.paused.notify_one();
            self.resumed.notified().await;
        }
        Ok(rows)
    }
}

// =====================================================================
// Social graph
// =====================================================================

#[derive(Default)]
pub struct InMemorySocialGraph {
    edges: Mutex<Vec<(Uuid, Uuid, DateTime<Utc>)>>,
    following_loads: AtomicUsize,
}

impl InMemorySocialGraph {
    /// Number of `following_ids` calls served
    pub fn following_loads(&self) -> usize {
        self.following_loads.load(Ordering::SeqCst)
    }

    fn page(mut edges: Vec<FollowEdge>, offset: i64, limit: i64) -> (Vec<FollowEdge>, i64) {
        let total = edges.len() as i64;
        edges.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let page = edges
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        (page, total)
    }
}

#[async_trait]
impl SocialGraph for InMemorySocialGraph {
    async fn get_followers(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self
            .edges
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, followee, _)| *followee == user_id)
            .map(|(follower, _, _)| *follower)
            .collect())
    }

    async fn following_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        self.following_loads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .edges
            .lock()
            .unwrap()
            .iter()
            .filter(|(follower, _, _)| *follower == user_id)
            .map(|(_, followee, _)| *followee)
            .collect())
    }

    async fn has_follow_edge(&self, from_user: Uuid, to_user: Uuid) -> Result<bool> {
        Ok(self
            .edges
            .lock()
            .unwrap()
            .iter()
            .any(|(follower, followee, _)| *follower == from_user && *followee == to_user))
    }

    async fn list_followers(
        &self,
        user_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<FollowEdge>, i64)> {
        let edges = self
            .edges
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, followee, _)| *followee == user_id)
            .map(|(follower, _, at)| FollowEdge {
                user_id: *follower,
                created_at: *at,
            })
            .collect();
        Ok(Self::page(edges, offset, limit))
    }

    async fn list_followings(
        &self,
        user_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<FollowEdge>, i64)> {
        let edges = self
            .edges
            .lock()
            .unwrap()
            .iter()
            .filter(|(follower, _, _)| *follower == user_id)
            .map(|(_, followee, at)| FollowEdge {
                user_id: *followee,
                created_at: *at,
            })
            .collect();
        Ok(Self::page(edges, offset, limit))
    }

    async fn create_follow(&self, follower_id: Uuid, followee_id: Uuid) -> Result<bool> {
        let mut edges = self.edges.lock().unwrap();
        if edges
            .iter()
            .any(|(f, t, _)| *f == follower_id && *t == followee_id)
        {
            return Ok(false);
        }
        // Strictly increasing edge times keep listing order deterministic
        let at = base_time() + Duration::seconds(edges.len() as i64);
        edges.push((follower_id, followee_id, at));
        Ok(true)
    }

    async fn delete_follow(&self, follower_id: Uuid, followee_id: Uuid) -> Result<u64> {
        let mut edges = self.edges.lock().unwrap();
        let before = edges.len();
        edges.retain(|(f, t, _)| !(*f == follower_id && *t == followee_id));
        Ok((before - edges.len()) as u64)
    }
}

// =====================================================================
// Content and profiles
// =====================================================================

#[derive(Default)]
pub struct InMemoryContentRepository {
    items: Mutex<HashMap<Uuid, ContentItem>>,
    loads: AtomicUsize,
}

impl InMemoryContentRepository {
    pub fn insert(&self, item: ContentItem) {
        self.items.lock().unwrap().insert(item.id, item);
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentRepository for InMemoryContentRepository {
    async fn get_content(&self, content_id: Uuid) -> Result<ContentItem> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.items
            .lock()
            .unwrap()
            .get(&content_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("content {}", content_id)))
    }

    async fn update_content(
        &self,
        content_id: Uuid,
        update: &ContentUpdate,
    ) -> Result<ContentItem> {
        let mut items = self.items.lock().unwrap();
        let item = items
            .get_mut(&content_id)
            .ok_or_else(|| AppError::NotFound(format!("content {}", content_id)))?;
        item.body = update.body.clone();
        item.updated_at = Utc::now();
        Ok(item.clone())
    }

    async fn delete_content(&self, content_id: Uuid) -> Result<()> {
        self.items
            .lock()
            .unwrap()
            .remove(&content_id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("content {}", content_id)))
    }
}

#[derive(Default)]
pub struct InMemoryProfileRepository {
    profiles: Mutex<HashMap<Uuid, UserProfile>>,
    loads: AtomicUsize,
}

impl InMemoryProfileRepository {
    pub fn insert(&self, profile: UserProfile) {
        self.profiles.lock().unwrap().insert(profile.user_id, profile);
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfileRepository for InMemoryProfileRepository {
    async fn get_profile(&self, user_id: Uuid) -> Result<UserProfile> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.profiles
            .lock()
            .unwrap()
            .get(&user_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("user {}", user_id)))
    }

    async fn update_profile(&self, user_id: Uuid, update: &ProfileUpdate) -> Result<UserProfile> {
        let mut profiles = self.profiles.lock().unwrap();
        let profile = profiles
            .get_mut(&user_id)
            .ok_or_else(|| AppError::NotFound(format!("user {}", user_id)))?;
        if let Some(nickname) = &update.nickname {
            profile.nickname = Some(nickname.clone());
        }
        if let Some(avatar_url) = &update.avatar_url {
            profile.avatar_url = Some(avatar_url.clone());
        }
        profile.updated_at = Utc::now();
        Ok(profile.clone())
    }
}

// =====================================================================
// Harness
// =====================================================================

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

pub struct Harness {
    pub state: web::Data<AppState>,
    pub cache: Arc<MemoryCacheStore>,
    pub timelines: Arc<InMemoryTimelineStore>,
    pub graph: Arc<InMemorySocialGraph>,
    pub contents: Arc<InMemoryContentRepository>,
    pub profiles: Arc<InMemoryProfileRepository>,
    pub config: TimelineConfig,
}

impl Harness {
    pub fn new(list_limit: usize, page_size: usize) -> Self {
        let config = TimelineConfig {
            list_limit,
            list_ttl_secs: 3600,
            page_size,
            max_page_size: page_size.max(50),
        };
        let cache = Arc::new(MemoryCacheStore::new());
        let timelines = Arc::new(InMemoryTimelineStore::default());
        let graph = Arc::new(InMemorySocialGraph::default());
        let contents = Arc::new(InMemoryContentRepository::default());
        let profiles = Arc::new(InMemoryProfileRepository::default());

        let state = web::Data::new(build_state(
            Backends {
                timelines: timelines.clone(),
                graph: graph.clone(),
                contents: contents.clone(),
                profiles: profiles.clone(),
            },
            cache.clone(),
            0,
            config.clone(),
        ));

        Self {
            state,
            cache,
            timelines,
            graph,
            contents,
            profiles,
            config,
        }
    }

    /// Paginator over the same stores, for page-level assertions
    pub fn paginator(&self) -> CursorPaginator {
        CursorPaginator::new(
            self.timelines.clone(),
            BoundedListCache::new(self.cache.clone(), self.config.list_limit, 3600),
        )
    }

    pub fn list_cache(&self) -> BoundedListCache<TimelineEntry> {
        BoundedListCache::new(self.cache.clone(), self.config.list_limit, 3600)
    }

    pub fn user(&self, username: &str) -> Uuid {
        let user_id = Uuid::new_v4();
        self.profiles.insert(UserProfile {
            user_id,
            username: username.to_string(),
            nickname: None,
            avatar_url: None,
            updated_at: base_time(),
        });
        user_id
    }

    pub fn content(&self, author_id: Uuid, body: &str) -> ContentItem {
        let item = ContentItem {
            id: Uuid::new_v4(),
            author_id,
            body: body.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.contents.insert(item.clone());
        item
    }

    pub async fn follow(&self, follower_id: Uuid, followee_id: Uuid) {
        self.graph.create_follow(follower_id, followee_id).await.unwrap();
    }

    /// Create and fan out a new content item
    pub async fn publish(&self, author_id: Uuid, body: &str) -> ContentItem {
        let item = self.content(author_id, body);
        self.state.fanout.publish(&item).await.unwrap();
        item
    }

    /// Durable history of `n` entries for `owner`, one second apart, written
    /// straight to the store (the cache is not touched). Returned newest first.
    pub async fn seed_history(&self, owner_id: Uuid, n: usize) -> Vec<TimelineEntry> {
        let entries: Vec<NewTimelineEntry> = (0..n)
            .map(|i| {
                let item = self.content(owner_id, &format!("post {}", i));
                NewTimelineEntry {
                    owner_id,
                    content_id: item.id,
                    created_at: base_time() + Duration::seconds(i as i64),
                }
            })
            .collect();
        self.timelines.insert_entries(&entries).await.unwrap();
        self.timelines.history(owner_id)
    }
}
