use crate::db::ProfileRepository;
use crate::error::Result;
use crate::models::{ProfileUpdate, UserProfile};
use std::sync::Arc;
use timeline_cache::ObjectCache;
use tracing::info;
use uuid::Uuid;

/// Profile reads go through the object cache; every profile mutation
/// evicts the cached snapshot before it returns.
#[derive(Clone)]
pub struct ProfileService {
    repo: Arc<dyn ProfileRepository>,
    objects: ObjectCache,
}

impl ProfileService {
    pub fn new(repo: Arc<dyn ProfileRepository>, objects: ObjectCache) -> Self {
        Self { repo, objects }
    }

    pub async fn get_profile(&self, user_id: Uuid) -> Result<UserProfile> {
        self.objects
            .get_or_load(user_id, || self.repo.get_profile(user_id))
            .await
    }

    pub async fn update_profile(&self, user_id: Uuid, update: &ProfileUpdate) -> Result<UserProfile> {
        let profile = self.repo.update_profile(user_id, update).await?;
        self.objects.invalidate::<UserProfile>(user_id).await;

        info!(user_id = %user_id, "Profile updated");
        Ok(profile)
    }
}
