use super::TimelineStore;
use crate::error::Result;
use crate::models::{Cursor, NewTimelineEntry, TimelineEntry};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

/// PostgreSQL timeline store (source of truth)
#[derive(Clone)]
pub struct PgTimelineStore {
    pool: PgPool,
}

impl PgTimelineStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TimelineStore for PgTimelineStore {
    async fn insert_entries(&self, entries: &[NewTimelineEntry]) -> Result<Vec<TimelineEntry>> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let owner_ids: Vec<Uuid> = entries.iter().map(|e| e.owner_id).collect();
        let content_ids: Vec<Uuid> = entries.iter().map(|e| e.content_id).collect();
        let created_ats: Vec<DateTime<Utc>> = entries.iter().map(|e| e.created_at).collect();

        // Single statement, so the batch is atomic
        let inserted = sqlx::query_as::<_, TimelineEntry>(
            r#"
            INSERT INTO timeline_entries (owner_id, content_id, created_at)
            SELECT * FROM UNNEST($1::uuid[], $2::uuid[], $3::timestamptz[])
            ON CONFLICT (owner_id, content_id) DO NOTHING
            RETURNING id, owner_id, content_id, created_at
            "#,
        )
        .bind(&owner_ids)
        .bind(&content_ids)
        .bind(&created_ats)
        .fetch_all(&self.pool)
        .await?;

        debug!(
            requested = entries.len(),
            inserted = inserted.len(),
            "Inserted timeline entries"
        );
        Ok(inserted)
    }

    async fn query_by_owner(
        &self,
        owner_id: Uuid,
        cursor: Option<Cursor>,
        limit: usize,
    ) -> Result<Vec<TimelineEntry>> {
        let mut query = QueryBuilder::<Postgres>::new(
            "SELECT id, owner_id, content_id, created_at FROM timeline_entries WHERE owner_id = ",
        );
        query.push_bind(owner_id);

        if let Some(cursor) = cursor {
            let op = match cursor {
                Cursor::Before(_) => "<",
                Cursor::After(_) => ">",
            };
            let position = cursor.position();
            match position.id {
                Some(id) => {
                    query.push(format!(" AND (created_at, id) {} (", op));
                    query.push_bind(position.created_at);
                    query.push(", ");
                    query.push_bind(id);
                    query.push(")");
                }
                None => {
                    query.push(format!(" AND created_at {} ", op));
                    query.push_bind(position.created_at);
                }
            }
        }

        query.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        query.push_bind(limit as i64);

        let rows = query
            .build_query_as::<TimelineEntry>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
