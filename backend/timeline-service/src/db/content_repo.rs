use super::ContentRepository;
use crate::error::{AppError, Result};
use crate::models::{ContentItem, ContentUpdate};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct PgContentRepository {
    pool: PgPool,
}

impl PgContentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ContentRepository for PgContentRepository {
    async fn get_content(&self, content_id: Uuid) -> Result<ContentItem> {
        sqlx::query_as::<_, ContentItem>(
            "SELECT id, author_id, body, created_at, updated_at FROM posts WHERE id = $1",
        )
        .bind(content_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("content {}", content_id)))
    }

    async fn update_content(
        &self,
        content_id: Uuid,
        update: &ContentUpdate,
    ) -> Result<ContentItem> {
        sqlx::query_as::<_, ContentItem>(
            r#"
            UPDATE posts SET body = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, author_id, body, created_at, updated_at
            "#,
        )
        .bind(content_id)
        .bind(&update.body)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("content {}", content_id)))
    }

    async fn delete_content(&self, content_id: Uuid) -> Result<()> {
        // timeline_entries rows go with it (ON DELETE CASCADE)
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(content_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("content {}", content_id)));
        }
        Ok(())
    }
}
