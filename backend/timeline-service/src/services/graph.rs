//! Cached social graph wrapper
//!
//! Wraps any SocialGraph implementation, caching each user's following set
//! for edge lookups.

use crate::db::SocialGraph;
use crate::error::{AppError, Result};
use crate::models::{FollowEdge, FollowingSet};
use std::sync::Arc;
use timeline_cache::ObjectCache;
use tracing::debug;
use uuid::Uuid;

pub struct CachedSocialGraph {
    inner: Arc<dyn SocialGraph>,
    objects: ObjectCache,
}

impl CachedSocialGraph {
    pub fn new(inner: Arc<dyn SocialGraph>, objects: ObjectCache) -> Self {
        Self { inner, objects }
    }

    async fn following_set(&self, user_id: Uuid) -> Result<FollowingSet> {
        self.objects
            .get_or_load(user_id, || async {
                let following_ids = self.inner.following_ids(user_id).await?;
                Ok::<_, AppError>(FollowingSet {
                    user_id,
                    following_ids,
                })
            })
            .await
    }
}

#[async_trait::async_trait]
impl SocialGraph for CachedSocialGraph {
    async fn get_followers(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        self.inner.get_followers(user_id).await
    }

    async fn following_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self.following_set(user_id).await?.following_ids)
    }

    async fn has_follow_edge(&self, from_user: Uuid, to_user: Uuid) -> Result<bool> {
        Ok(self.following_set(from_user).await?.contains(to_user))
    }

    async fn list_followers(
        &self,
        user_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<FollowEdge>, i64)> {
        self.inner.list_followers(user_id, offset, limit).await
    }

    async fn list_followings(
        &self,
        user_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<FollowEdge>, i64)> {
        self.inner.list_followings(user_id, offset, limit).await
    }

    async fn create_follow(&self, follower_id: Uuid, followee_id: Uuid) -> Result<bool> {
        let created = self.inner.create_follow(follower_id, followee_id).await?;
        if created {
            self.objects.invalidate::<FollowingSet>(follower_id).await;
            debug!(follower = %follower_id, followee = %followee_id, "Following set invalidated");
        }
        Ok(created)
    }

    async fn delete_follow(&self, follower_id: Uuid, followee_id: Uuid) -> Result<u64> {
        let deleted = self.inner.delete_follow(follower_id, followee_id).await?;
        if deleted > 0 {
            self.objects.invalidate::<FollowingSet>(follower_id).await;
            debug!(follower = %follower_id, followee = %followee_id, "Following set invalidated");
        }
        Ok(deleted)
    }
}
