use super::SocialGraph;
use crate::error::Result;
use crate::models::FollowEdge;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

/// PostgreSQL social graph (source of truth for follow edges)
#[derive(Clone)]
pub struct PgSocialGraph {
    pool: PgPool,
}

impl PgSocialGraph {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SocialGraph for PgSocialGraph {
    async fn get_followers(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT follower_id FROM follows WHERE followee_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn following_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT followee_id FROM follows WHERE follower_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn has_follow_edge(&self, from_user: Uuid, to_user: Uuid) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = $1 AND followee_id = $2)",
        )
        .bind(from_user)
        .bind(to_user)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn list_followers(
        &self,
        user_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<FollowEdge>, i64)> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM follows WHERE followee_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        let edges = sqlx::query_as::<_, FollowEdge>(
            r#"
            SELECT follower_id AS user_id, created_at
            FROM follows
            WHERE followee_id = $1
            ORDER BY created_at DESC, follower_id
            OFFSET $2 LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok((edges, total))
    }

    async fn list_followings(
        &self,
        user_id: Uuid,
        offset: i64,
        limit: i64,
    ) -> Result<(Vec<FollowEdge>, i64)> {
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM follows WHERE follower_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        let edges = sqlx::query_as::<_, FollowEdge>(
            r#"
            SELECT followee_id AS user_id, created_at
            FROM follows
            WHERE follower_id = $1
            ORDER BY created_at DESC, followee_id
            OFFSET $2 LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok((edges, total))
    }

    async fn create_follow(&self, follower_id: Uuid, followee_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO follows (follower_id, followee_id, created_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (follower_id, followee_id) DO NOTHING
            "#,
        )
        .bind(follower_id)
        .bind(followee_id)
        .execute(&self.pool)
        .await?;

        debug!(
            follower = %follower_id,
            followee = %followee_id,
            created = result.rows_affected() == 1,
            "Follow edge written"
        );
        Ok(result.rows_affected() == 1)
    }

    async fn delete_follow(&self, follower_id: Uuid, followee_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND followee_id = $2")
            .bind(follower_id)
            .bind(followee_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
