//! Service layer for timeline-service
//!
//! - fanout: delivery of new content into timelines
//! - pagination: cursor paginator over the bounded list cache, offset pages
//! - timeline: paged timeline reads with hydration
//! - content / profiles / graph: cached entity access, evicted on mutation
//! - friendships: follow edges and their listings

pub mod content;
pub mod fanout;
pub mod friendships;
pub mod graph;
pub mod pagination;
pub mod profiles;
pub mod timeline;

pub use content::ContentService;
pub use fanout::FanoutWriter;
pub use friendships::FriendshipService;
pub use graph::CachedSocialGraph;
pub use pagination::{CursorPaginator, OffsetPage, Page, PageRequest};
pub use profiles::ProfileService;
pub use timeline::TimelineService;
