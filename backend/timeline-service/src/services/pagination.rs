//! Cursor and offset pagination
//!
//! Timelines page by cursor: a page is computed from the cached window when
//! that window provably contains the answer, and from the durable store
//! otherwise. Friendship listings use plain page/size offsets.

use crate::db::TimelineStore;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::{Cursor, TimelineEntry};
use serde::Serialize;
use std::sync::Arc;
use timeline_cache::BoundedListCache;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_next: bool,
}

/// Page through a newest-first list that is assumed to hold everything.
///
/// - after-cursor: every entry newer than the cursor, uncapped, no next page
/// - before-cursor: `page_size` entries starting at the first older entry
/// - no cursor: the first `page_size` entries
pub fn paginate_ordered_list(
    list: &[TimelineEntry],
    cursor: Option<&Cursor>,
    page_size: usize,
) -> Page<TimelineEntry> {
    let Some(cursor) = cursor else {
        return Page {
            items: list.iter().take(page_size).cloned().collect(),
            has_next: list.len() > page_size,
        };
    };

    match cursor {
        Cursor::After(_) => Page {
            items: list
                .iter()
                .take_while(|entry| cursor.admits(entry))
                .cloned()
                .collect(),
            has_next: false,
        },
        Cursor::Before(_) => match list.iter().position(|e| cursor.admits(e)) {
            Some(start) => Page {
                items: list[start..].iter().take(page_size).cloned().collect(),
                has_next: list.len() > start + page_size,
            },
            None => Page {
                items: Vec::new(),
                has_next: false,
            },
        },
    }
}

/// Whether a page computed from the cached window can be returned as-is.
///
/// True for refreshes (the cache always has the newest entries), when the
/// window itself shows more entries beyond the page, or when the window is
/// shorter than the cache capacity and therefore is the owner's full history.
pub fn cache_is_sufficient(
    cursor: Option<&Cursor>,
    page: &Page<TimelineEntry>,
    window_len: usize,
    capacity: usize,
) -> bool {
    matches!(cursor, Some(Cursor::After(_))) || page.has_next || window_len < capacity
}

fn mode(cursor: Option<&Cursor>) -> &'static str {
    match cursor {
        None => "first",
        Some(Cursor::Before(_)) => "before",
        Some(Cursor::After(_)) => "after",
    }
}

/// Serves timeline pages from the bounded list cache with durable fallback.
#[derive(Clone)]
pub struct CursorPaginator {
    store: Arc<dyn TimelineStore>,
    list_cache: BoundedListCache<TimelineEntry>,
}

impl CursorPaginator {
    pub fn new(store: Arc<dyn TimelineStore>, list_cache: BoundedListCache<TimelineEntry>) -> Self {
        Self { store, list_cache }
    }

    pub async fn paginate(
        &self,
        owner_id: Uuid,
        cursor: Option<Cursor>,
        page_size: usize,
    ) -> Result<Page<TimelineEntry>> {
        let page_size = page_size.max(1);
        metrics::record_page_served(mode(cursor.as_ref()));

        let (window, window_len) = self.cached_window(owner_id).await?;
        let page = paginate_ordered_list(&window, cursor.as_ref(), page_size);

        if cache_is_sufficient(
            cursor.as_ref(),
            &page,
            window_len,
            self.list_cache.capacity(),
        ) {
            return Ok(page);
        }

        debug!(
            owner = %owner_id,
            window = window_len,
            "Cached window exhausted, paging from durable store"
        );
        metrics::record_paginator_fallback();
        self.page_from_store(owner_id, cursor, page_size).await
    }

    /// Newest entries of the owner: the cached list, or on a miss the newest
    /// `capacity` rows of the durable store, which then populate the cache
    /// unless a concurrent write created the list first.
    ///
    /// Returns the window sorted newest first without duplicate ids, and the
    /// length of the list as stored.
    async fn cached_window(&self, owner_id: Uuid) -> Result<(Vec<TimelineEntry>, usize)> {
        let mut window = match self.list_cache.read(owner_id).await {
            Some(window) => window,
            None => {
                let window = self
                    .store
                    .query_by_owner(owner_id, None, self.list_cache.capacity())
                    .await?;
                self.list_cache.populate(owner_id, &window).await;
                window
            }
        };

        // A push racing a cold fill can land an entry twice or out of order.
        // Sufficiency is judged on the stored length so a deduplicated window
        // never passes for the owner's full history.
        let stored_len = window.len();
        window.sort_by(|a, b| b.sort_key().cmp(&a.sort_key()));
        window.dedup_by_key(|entry| entry.id);
        Ok((window, stored_len))
    }

    async fn page_from_store(
        &self,
        owner_id: Uuid,
        cursor: Option<Cursor>,
        page_size: usize,
    ) -> Result<Page<TimelineEntry>> {
        let mut rows = self
            .store
            .query_by_owner(owner_id, cursor, page_size + 1)
            .await?;
        let has_next = rows.len() > page_size;
        rows.truncate(page_size);
        Ok(Page {
            items: rows,
            has_next,
        })
    }
}

// =====================================================================
// Offset pagination
// =====================================================================

/// 1-based page request, size already bounded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub size: u32,
}

impl PageRequest {
    pub const DEFAULT_SIZE: u32 = 20;
    pub const MAX_SIZE: u32 = 20;

    pub fn new(page: Option<u32>, size: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            size: size
                .unwrap_or(Self::DEFAULT_SIZE)
                .clamp(1, Self::MAX_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.size as i64
    }

    pub fn limit(&self) -> i64 {
        self.size as i64
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OffsetPage<T> {
    pub total_results: i64,
    pub total_pages: i64,
    pub page_number: u32,
    pub has_next_page: bool,
    pub results: Vec<T>,
}

impl<T> OffsetPage<T> {
    /// An empty listing still has one (empty) page; anything past the last
    /// page is `NotFound`.
    pub fn new(request: PageRequest, total_results: i64, results: Vec<T>) -> Result<Self> {
        let size = request.size as i64;
        let total_pages = ((total_results + size - 1) / size).max(1);
        if request.page as i64 > total_pages {
            return Err(AppError::NotFound(format!(
                "page {} (of {})",
                request.page, total_pages
            )));
        }

        Ok(Self {
            total_results,
            total_pages,
            page_number: request.page,
            has_next_page: (request.page as i64) < total_pages,
            results,
        })
    }
}
