use actix_web::{get, post, web, HttpResponse};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use super::AppState;
use crate::error::{AppError, Result};
use crate::middleware::UserId;
use crate::models::{Cursor, Position};

#[derive(Debug, Default, Deserialize)]
pub struct TimelineQuery {
    /// Scroll back: entries older than this ISO-8601 timestamp
    #[serde(rename = "created_at__lt")]
    pub created_before: Option<String>,
    /// Refresh: entries newer than this ISO-8601 timestamp
    #[serde(rename = "created_at__gt")]
    pub created_after: Option<String>,
    /// Id of the boundary entry, to break timestamp ties
    pub cursor_id: Option<i64>,
    pub size: Option<usize>,
}

impl TimelineQuery {
    /// A refresh cursor wins when both are present.
    pub fn cursor(&self) -> Result<Option<Cursor>> {
        if let Some(raw) = &self.created_after {
            return Ok(Some(Cursor::After(self.position(raw, "created_at__gt")?)));
        }
        if let Some(raw) = &self.created_before {
            return Ok(Some(Cursor::Before(self.position(raw, "created_at__lt")?)));
        }
        Ok(None)
    }

    fn position(&self, raw: &str, param: &str) -> Result<Position> {
        let created_at = parse_timestamp(raw)
            .ok_or_else(|| AppError::BadRequest(format!("{} is not an ISO-8601 timestamp", param)))?;
        Ok(Position {
            created_at,
            id: self.cursor_id,
        })
    }
}

/// RFC 3339, or a naive ISO-8601 timestamp taken as UTC.
///
/// A `+` in the offset arrives as a space when the client did not
/// percent-encode it.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim().replace(' ', "+");
    if let Ok(at) = DateTime::parse_from_rfc3339(&raw) {
        return Some(at.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[get("/api/v1/timelines")]
pub async fn list_timeline(
    user: UserId,
    query: web::Query<TimelineQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let cursor = query.cursor()?;
    let page_size = state.config.page_size_for(query.size);

    debug!(user_id = %user.0, ?cursor, page_size, "Timeline requested");
    let page = state.timeline.timeline(user.0, cursor, page_size).await?;
    Ok(HttpResponse::Ok().json(page))
}

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub content_id: Uuid,
}

/// Called by the content pipeline once a new item is durable
#[post("/internal/v1/timelines/publish")]
pub async fn publish(
    body: web::Json<PublishRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let item = state.contents.get_content(body.content_id).await?;
    let report = state.fanout.publish(&item).await?;
    Ok(HttpResponse::Ok().json(report))
}
