use super::ProfileRepository;
use crate::error::{AppError, Result};
use crate::models::{ProfileUpdate, UserProfile};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Clone)]
pub struct PgProfileRepository {
    pool: PgPool,
}

impl PgProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ProfileRepository for PgProfileRepository {
    async fn get_profile(&self, user_id: Uuid) -> Result<UserProfile> {
        sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT user_id, username, nickname, avatar_url, updated_at
            FROM user_profiles WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {}", user_id)))
    }

    async fn update_profile(&self, user_id: Uuid, update: &ProfileUpdate) -> Result<UserProfile> {
        // NULL leaves the column unchanged
        sqlx::query_as::<_, UserProfile>(
            r#"
            UPDATE user_profiles
            SET nickname = COALESCE($2, nickname),
                avatar_url = COALESCE($3, avatar_url),
                updated_at = NOW()
            WHERE user_id = $1
            RETURNING user_id, username, nickname, avatar_url, updated_at
            "#,
        )
        .bind(user_id)
        .bind(update.nickname.as_deref())
        .bind(update.avatar_url.as_deref())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("user {}", user_id)))
    }
}
