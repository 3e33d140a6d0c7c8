pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};

use config::TimelineConfig;
use db::{ContentRepository, ProfileRepository, SocialGraph, TimelineStore};
use handlers::AppState;
use services::{
    CachedSocialGraph, ContentService, CursorPaginator, FanoutWriter, FriendshipService,
    ProfileService, TimelineService,
};
use std::sync::Arc;
use timeline_cache::{BoundedListCache, CacheStore, ObjectCache};

/// Durable collaborators the service is assembled from
pub struct Backends {
    pub timelines: Arc<dyn TimelineStore>,
    pub graph: Arc<dyn SocialGraph>,
    pub contents: Arc<dyn ContentRepository>,
    pub profiles: Arc<dyn ProfileRepository>,
}

/// Wire the caches and services over `backends` and `cache_store`.
///
/// Production passes PostgreSQL and Redis; tests pass in-memory doubles.
pub fn build_state(
    backends: Backends,
    cache_store: Arc<dyn CacheStore>,
    object_ttl_secs: u64,
    timeline: TimelineConfig,
) -> AppState {
    let objects = ObjectCache::new(Arc::clone(&cache_store), Some(object_ttl_secs));
    let list_cache = BoundedListCache::new(cache_store, timeline.list_limit, timeline.list_ttl_secs);

    let graph: Arc<dyn SocialGraph> =
        Arc::new(CachedSocialGraph::new(backends.graph, objects.clone()));
    let profiles = ProfileService::new(backends.profiles, objects.clone());
    let contents = ContentService::new(backends.contents, objects);

    let paginator = CursorPaginator::new(Arc::clone(&backends.timelines), list_cache.clone());

    AppState {
        timeline: TimelineService::new(paginator, contents.clone(), profiles.clone()),
        fanout: FanoutWriter::new(backends.timelines, Arc::clone(&graph), list_cache),
        friendships: FriendshipService::new(graph, profiles.clone()),
        contents,
        profiles,
        config: timeline,
    }
}
