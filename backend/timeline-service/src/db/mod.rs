//! Durable storage
//!
//! The traits are the seams the services are written against; the `Pg*`
//! types are the PostgreSQL implementations used in production.

mod content_repo;
mod graph_repo;
mod profile_repo;
mod timeline_repo;

pub use content_repo::PgContentRepository;
pub use graph_repo::PgSocialGraph;
pub use profile_repo::PgProfileRepository;
pub use timeline_repo::PgTimelineStore;

use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::models::{
    ContentItem, ContentUpdate, Cursor, FollowEdge, NewTimelineEntry, ProfileUpdate,
    TimelineEntry, UserProfile,
};
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Durable, authoritative record of every timeline entry.
#[async_trait::async_trait]
pub trait TimelineStore: Send + Sync {
    /// Insert entries, skipping any `(owner_id, content_id)` pair that already
    /// exists. Returns only the rows actually created, with their ids.
    async fn insert_entries(&self, entries: &[NewTimelineEntry]) -> Result<Vec<TimelineEntry>>;

    /// Up to `limit` entries of `owner_id` admitted by `cursor`, newest first
    async fn query_by_owner(
        &self,
        owner_id: Uuid,
        cursor: Option<Cursor>,
        limit: usize,
    ) -> Result<Vec<TimelineEntry>>;
}

/// Follow relationships.
#[async_trait::async_trait]
pub trait SocialGraph: Send + Sync {
    /// Every user following `user_id`
    async fn get_followers(&self, user_id: Uuid) -> Result<Vec<Uuid>>;

    /// Every user `user_id` follows
    async fn following_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>>;

    async fn has_follow_edge(&self, from_user: Uuid, to_user: Uuid) -> Result<bool>;

    /// A page of followers, newest edge first, with the total count
    async fn list_followers(
        &self,
        user_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<FollowEdge>, i64)>;

    /// A page of followings, newest edge first, with the total count
    async fn list_followings(
        &self,
        user_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<FollowEdge>, i64)>;

    /// Returns false when the edge already existed
    async fn create_follow(&self, follower_id: Uuid, followee_id: Uuid) -> Result<bool>;

    /// Returns the number of edges removed (0 or 1)
    async fn delete_follow(&self, follower_id: Uuid, followee_id: Uuid) -> Result<u64>;
}

#[async_trait::async_trait]
pub trait ContentRepository: Send + Sync {
    /// `AppError::NotFound` when the item does not exist
    async fn get_content(&self, content_id: Uuid) -> Result<ContentItem>;

    async fn update_content(&self, content_id: Uuid, update: &ContentUpdate)
        -> Result<ContentItem>;

    async fn delete_content(&self, content_id: Uuid) -> Result<()>;
}

#[async_trait::async_trait]
pub trait ProfileRepository: Send + Sync {
    /// `AppError::NotFound` when the profile does not exist
    async fn get_profile(&self, user_id: Uuid) -> Result<UserProfile>;

    async fn update_profile(&self, user_id: Uuid, update: &ProfileUpdate) -> Result<UserProfile>;
}

pub async fn create_pool(config: &DatabaseConfig) -> std::result::Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .test_before_acquire(true)
        .connect(&config.url)
        .await?;

    sqlx::query("SELECT 1").execute(&pool).await?;
    info!(
        max_connections = config.max_connections,
        "Database pool created and verified"
    );
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> std::result::Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await?;
    info!("Database migrations applied");
    Ok(())
}
