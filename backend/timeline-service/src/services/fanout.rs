//! Fanout-on-write
//!
//! A publish copies the content into the timeline of every follower of the
//! author and of the author. The durable insert always happens first; cache
//! appends follow only for rows the insert actually created.

use crate::db::{SocialGraph, TimelineStore};
use crate::error::Result;
use crate::metrics;
use crate::models::{ContentItem, FanoutReport, NewTimelineEntry, TimelineEntry};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use timeline_cache::{AppendOutcome, BoundedListCache};
use tracing::{debug, info};
use uuid::Uuid;

/// Cache appends in flight at once during a single publish
const APPEND_CONCURRENCY: usize = 16;

#[derive(Clone)]
pub struct FanoutWriter {
    store: Arc<dyn TimelineStore>,
    graph: Arc<dyn SocialGraph>,
    list_cache: BoundedListCache<TimelineEntry>,
}

impl FanoutWriter {
    pub fn new(
        store: Arc<dyn TimelineStore>,
        graph: Arc<dyn SocialGraph>,
        list_cache: BoundedListCache<TimelineEntry>,
    ) -> Self {
        Self {
            store,
            graph,
            list_cache,
        }
    }

    /// Deliver `item` to its author's followers and to the author.
    ///
    /// Safe to retry: owners that already hold the item get no new entry and
    /// no cache append. Durable-store errors abort the publish; cache errors
    /// never do.
    pub async fn publish(&self, item: &ContentItem) -> Result<FanoutReport> {
        let started = Instant::now();

        let followers = self.graph.get_followers(item.author_id).await?;
        let recipients = recipients(item.author_id, followers);

        let created_at = Utc::now();
        let entries: Vec<NewTimelineEntry> = recipients
            .iter()
            .map(|owner_id| NewTimelineEntry {
                owner_id: *owner_id,
                content_id: item.id,
                created_at,
            })
            .collect();

        let inserted = self.store.insert_entries(&entries).await?;

        let capacity = self.list_cache.capacity();
        // Appends own their entry and handles, keeping the publish future
        // spawnable.
        let outcomes: Vec<AppendOutcome> = stream::iter(inserted.iter().cloned())
            .map(|entry| {
                let store = Arc::clone(&self.store);
                let list_cache = self.list_cache.clone();
                async move {
                    let owner_id = entry.owner_id;
                    list_cache
                        .append(owner_id, &entry, || {
                            store.query_by_owner(owner_id, None, capacity)
                        })
                        .await
                }
            })
            .buffer_unordered(APPEND_CONCURRENCY)
            .collect()
            .await;

        let cache_appends = outcomes
            .iter()
            .filter(|outcome| **outcome != AppendOutcome::Skipped)
            .count();
        let elapsed = started.elapsed();
        metrics::record_fanout(inserted.len(), elapsed);

        if inserted.len() < recipients.len() {
            debug!(
                content_id = %item.id,
                skipped = recipients.len() - inserted.len(),
                "Recipients already held this content"
            );
        }
        info!(
            content_id = %item.id,
            author_id = %item.author_id,
            recipients = recipients.len(),
            inserted = inserted.len(),
            cache_appends,
            elapsed_ms = elapsed.as_millis() as u64,
            "Fanout complete"
        );

        Ok(FanoutReport {
            content_id: item.id,
            recipients: recipients.len(),
            inserted: inserted.len(),
            cache_appends,
        })
    }
}

/// The author first, then each follower once
fn recipients(author_id: Uuid, followers: Vec<Uuid>) -> Vec<Uuid> {
    let mut seen = HashSet::with_capacity(followers.len() + 1);
    std::iter::once(author_id)
        .chain(followers)
        .filter(|id| seen.insert(*id))
        .collect()
}
