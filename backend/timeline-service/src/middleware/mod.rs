//! Request identity
//!
//! Authentication happens upstream; the gateway forwards the caller's id in
//! the `x-user-id` header.

use crate::error::AppError;
use actix_web::{dev::Payload, FromRequest, HttpRequest};
use std::future::{ready, Ready};
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserId(pub Uuid);

impl UserId {
    fn from_request_headers(req: &HttpRequest) -> Result<Self, AppError> {
        let raw = req
            .headers()
            .get(USER_ID_HEADER)
            .ok_or_else(|| AppError::Unauthorized("Missing x-user-id header".to_string()))?;
        let value = raw
            .to_str()
            .map_err(|_| AppError::Unauthorized("Malformed x-user-id header".to_string()))?;
        Uuid::parse_str(value.trim())
            .map(UserId)
            .map_err(|_| AppError::Unauthorized("Malformed x-user-id header".to_string()))
    }
}

impl FromRequest for UserId {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Self::from_request_headers(req))
    }
}
