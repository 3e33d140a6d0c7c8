use crate::db::ContentRepository;
use crate::error::Result;
use crate::models::{ContentItem, ContentUpdate};
use std::sync::Arc;
use timeline_cache::ObjectCache;
use tracing::info;
use uuid::Uuid;

/// Content reads go through the object cache; edits and deletions evict the
/// cached snapshot after the durable write succeeds.
///
/// Deleted content may still be referenced by cached timeline lists until
/// they are repopulated. Readers drop entries whose content is gone.
#[derive(Clone)]
pub struct ContentService {
    repo: Arc<dyn ContentRepository>,
    objects: ObjectCache,
}

impl ContentService {
    pub fn new(repo: Arc<dyn ContentRepository>, objects: ObjectCache) -> Self {
        Self { repo, objects }
    }

    pub async fn get_content(&self, content_id: Uuid) -> Result<ContentItem> {
        self.objects
            .get_or_load(content_id, || self.repo.get_content(content_id))
            .await
    }

    pub async fn update_content(
        &self,
        content_id: Uuid,
        update: &ContentUpdate,
    ) -> Result<ContentItem> {
        let item = self.repo.update_content(content_id, update).await?;
        self.objects.invalidate::<ContentItem>(content_id).await;

        info!(content_id = %content_id, "Content updated");
        Ok(item)
    }

    pub async fn delete_content(&self, content_id: Uuid) -> Result<()> {
        self.repo.delete_content(content_id).await?;
        self.objects.invalidate::<ContentItem>(content_id).await;

        info!(content_id = %content_id, "Content deleted");
        Ok(())
    }
}
