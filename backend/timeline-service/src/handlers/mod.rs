pub mod entities;
pub mod friendships;
pub mod timeline;

use actix_web::{get, web, HttpResponse};
use serde_json::json;

use crate::config::TimelineConfig;
use crate::error::{AppError, Result};
use crate::services::{
    ContentService, FanoutWriter, FriendshipService, ProfileService, TimelineService,
};

pub use timeline::{parse_timestamp, TimelineQuery};

/// Shared handler state
pub struct AppState {
    pub timeline: TimelineService,
    pub fanout: FanoutWriter,
    pub friendships: FriendshipService,
    pub contents: ContentService,
    pub profiles: ProfileService,
    pub config: TimelineConfig,
}

#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

#[get("/metrics")]
pub async fn metrics() -> Result<HttpResponse> {
    let body = crate::metrics::render()
        .map_err(|e| AppError::Internal(format!("metrics encoding failed: {}", e)))?;
    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(body))
}

/// Register every route
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health)
        .service(metrics)
        .service(timeline::list_timeline)
        .service(timeline::publish)
        .service(friendships::list_followers)
        .service(friendships::list_followings)
        .service(friendships::follow)
        .service(friendships::unfollow)
        .service(entities::update_profile)
        .service(entities::update_content)
        .service(entities::delete_content);
}
