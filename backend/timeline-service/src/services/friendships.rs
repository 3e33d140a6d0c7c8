use super::pagination::{OffsetPage, PageRequest};
use super::profiles::ProfileService;
use crate::db::SocialGraph;
use crate::error::{AppError, Result};
use crate::models::{FollowEdge, FollowResult, FriendshipItem, UnfollowResult};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Follow/unfollow and the follower/following listings.
#[derive(Clone)]
pub struct FriendshipService {
    graph: Arc<dyn SocialGraph>,
    profiles: ProfileService,
}

impl FriendshipService {
    pub fn new(graph: Arc<dyn SocialGraph>, profiles: ProfileService) -> Self {
        Self { graph, profiles }
    }

    pub async fn follow(&self, follower_id: Uuid, followee_id: Uuid) -> Result<FollowResult> {
        if follower_id == followee_id {
            return Err(AppError::BadRequest("You can not follow yourself".to_string()));
        }
        // Target must exist
        self.profiles.get_profile(followee_id).await?;

        let created = self.graph.create_follow(follower_id, followee_id).await?;
        if created {
            info!(follower = %follower_id, followee = %followee_id, "Follow created");
        }
        Ok(FollowResult {
            success: true,
            duplicate: !created,
        })
    }

    pub async fn unfollow(&self, follower_id: Uuid, followee_id: Uuid) -> Result<UnfollowResult> {
        if follower_id == followee_id {
            return Err(AppError::BadRequest("You can not unfollow yourself".to_string()));
        }
        self.profiles.get_profile(followee_id).await?;

        let deleted = self.graph.delete_follow(follower_id, followee_id).await?;
        if deleted > 0 {
            info!(follower = %follower_id, followee = %followee_id, "Follow removed");
        }
        Ok(UnfollowResult {
            success: true,
            deleted,
        })
    }

    pub async fn followers(
        &self,
        user_id: Uuid,
        viewer: Option<Uuid>,
        request: PageRequest,
    ) -> Result<OffsetPage<FriendshipItem>> {
        let (edges, total) = self
            .graph
            .list_followers(user_id, request.offset(), request.limit())
            .await?;
        let results = self.items(edges, viewer).await?;
        OffsetPage::new(request, total, results)
    }

    pub async fn followings(
        &self,
        user_id: Uuid,
        viewer: Option<Uuid>,
        request: PageRequest,
    ) -> Result<OffsetPage<FriendshipItem>> {
        let (edges, total) = self
            .graph
            .list_followings(user_id, request.offset(), request.limit())
            .await?;
        let results = self.items(edges, viewer).await?;
        OffsetPage::new(request, total, results)
    }

    async fn items(&self, edges: Vec<FollowEdge>, viewer: Option<Uuid>) -> Result<Vec<FriendshipItem>> {
        let mut items = Vec::with_capacity(edges.len());
        for edge in edges {
            let user = match self.profiles.get_profile(edge.user_id).await {
                Ok(user) => user,
                Err(AppError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            let has_followed = match viewer {
                Some(viewer) => self.graph.has_follow_edge(viewer, edge.user_id).await?,
                None => false,
            };
            items.push(FriendshipItem {
                user,
                created_at: edge.created_at,
                has_followed,
            });
        }
        Ok(items)
    }
}
