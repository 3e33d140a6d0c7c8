//! Entity mutations that must evict cached snapshots

use actix_web::{delete, patch, put, web, HttpResponse};
use uuid::Uuid;

use super::AppState;
use crate::error::Result;
use crate::middleware::UserId;
use crate::models::{ContentUpdate, ProfileUpdate};

#[patch("/api/v1/profiles/me")]
pub async fn update_profile(
    user: UserId,
    body: web::Json<ProfileUpdate>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let profile = state.profiles.update_profile(user.0, &body).await?;
    Ok(HttpResponse::Ok().json(profile))
}

#[put("/internal/v1/contents/{content_id}")]
pub async fn update_content(
    path: web::Path<Uuid>,
    body: web::Json<ContentUpdate>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let item = state
        .contents
        .update_content(path.into_inner(), &body)
        .await?;
    Ok(HttpResponse::Ok().json(item))
}

#[delete("/internal/v1/contents/{content_id}")]
pub async fn delete_content(
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    state.contents.delete_content(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
