use super::content::ContentService;
use super::pagination::CursorPaginator;
use super::profiles::ProfileService;
use crate::error::{AppError, Result};
use crate::models::{ContentView, Cursor, TimelineEntry, TimelineItem, TimelinePage};
use futures::future::try_join_all;
use tracing::{debug, warn};
use uuid::Uuid;

/// Timeline reads: a page of entries from the paginator, hydrated with
/// content and author snapshots from the object cache.
#[derive(Clone)]
pub struct TimelineService {
    paginator: CursorPaginator,
    contents: ContentService,
    profiles: ProfileService,
}

impl TimelineService {
    pub fn new(paginator: CursorPaginator, contents: ContentService, profiles: ProfileService) -> Self {
        Self {
            paginator,
            contents,
            profiles,
        }
    }

    pub async fn timeline(
        &self,
        owner_id: Uuid,
        cursor: Option<Cursor>,
        page_size: usize,
    ) -> Result<TimelinePage> {
        let page = self.paginator.paginate(owner_id, cursor, page_size).await?;

        let hydrated = try_join_all(page.items.iter().map(|entry| self.hydrate(entry))).await?;
        let results: Vec<TimelineItem> = hydrated.into_iter().flatten().collect();

        debug!(
            owner = %owner_id,
            returned = results.len(),
            has_next = page.has_next,
            "Timeline page served"
        );
        Ok(TimelinePage {
            has_next_page: page.has_next,
            results,
        })
    }

    /// `None` when the content no longer exists
    async fn hydrate(&self, entry: &TimelineEntry) -> Result<Option<TimelineItem>> {
        let content = match self.contents.get_content(entry.content_id).await {
            Ok(content) => content,
            Err(AppError::NotFound(_)) => {
                debug!(
                    entry_id = entry.id,
                    content_id = %entry.content_id,
                    "Dropping timeline entry for deleted content"
                );
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let author = match self.profiles.get_profile(content.author_id).await {
            Ok(profile) => Some(profile),
            Err(AppError::NotFound(_)) => {
                warn!(author_id = %content.author_id, "Content author has no profile");
                None
            }
            Err(e) => return Err(e),
        };

        Ok(Some(TimelineItem {
            id: entry.id,
            created_at: entry.created_at,
            content: ContentView {
                id: content.id,
                body: content.body,
                created_at: content.created_at,
                updated_at: content.updated_at,
                author,
            },
        }))
    }
}
