use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use super::AppState;
use crate::error::Result;
use crate::middleware::UserId;
use crate::services::PageRequest;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
}

impl PageQuery {
    fn request(&self) -> PageRequest {
        PageRequest::new(self.page, self.size)
    }
}

#[get("/api/v1/friendships/{user_id}/followers")]
pub async fn list_followers(
    path: web::Path<Uuid>,
    query: web::Query<PageQuery>,
    viewer: Option<UserId>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let page = state
        .friendships
        .followers(path.into_inner(), viewer.map(|v| v.0), query.request())
        .await?;
    Ok(HttpResponse::Ok().json(page))
}

#[get("/api/v1/friendships/{user_id}/followings")]
pub async fn list_followings(
    path: web::Path<Uuid>,
    query: web::Query<PageQuery>,
    viewer: Option<UserId>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let page = state
        .friendships
        .followings(path.into_inner(), viewer.map(|v| v.0), query.request())
        .await?;
    Ok(HttpResponse::Ok().json(page))
}

#[post("/api/v1/friendships/{user_id}/follow")]
pub async fn follow(
    user: UserId,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let result = state.friendships.follow(user.0, path.into_inner()).await?;
    if result.duplicate {
        return Ok(HttpResponse::Ok().json(result));
    }
    Ok(HttpResponse::Created().json(result))
}

#[post("/api/v1/friendships/{user_id}/unfollow")]
pub async fn unfollow(
    user: UserId,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let result = state.friendships.unfollow(user.0, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(result))
}
