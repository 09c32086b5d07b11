//! HTTP API: routing, auth extraction and shared response shapes

use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::core::revocation::RevocationStore;
use crate::core::spotify::SpotifyClient;
use crate::db::tables::UserTable;
use crate::db::DbEngine;
use crate::errors::ApiError;
use crate::models::User;
use crate::utils::auth::verify_jwt;

pub mod auth;
pub mod music;
pub mod playlists;
pub mod task_lists;
pub mod tasks;
pub mod users;

/// Shared state handed to every handler
pub struct AppContext {
    pub settings: Settings,
    pub revocations: Arc<dyn RevocationStore>,
    pub spotify: SpotifyClient,
}

/// Mount all routes under /api
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(health))
            .service(web::scope("/auth").configure(auth::configure))
            .service(web::scope("/users").configure(users::configure))
            .service(web::scope("/task-lists").configure(task_lists::configure))
            .service(web::scope("/tasks").configure(tasks::configure))
            .service(web::scope("/music").configure(music::configure))
            .service(web::scope("/playlists").configure(playlists::configure)),
    );
}

/// Liveness check that also pings the database
async fn health() -> HttpResponse {
    let database = match DbEngine::get() {
        Ok(engine) => sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(engine.pool())
            .await
            .is_ok(),
        Err(_) => false,
    };

    let status = if database { "ok" } else { "degraded" };
    let mut response = if database {
        HttpResponse::Ok()
    } else {
        HttpResponse::ServiceUnavailable()
    };
    response.json(serde_json::json!({
        "status": status,
        "database": database,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub(crate) fn app_context(req: &HttpRequest) -> Result<&AppContext, ApiError> {
    req.app_data::<web::Data<AppContext>>()
        .map(|data| data.get_ref())
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("App context missing")))
}

pub(crate) fn bearer_token(req: &HttpRequest) -> Result<&str, ApiError> {
    let header = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Missing authorization header"))?;

    header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::unauthorized("Invalid authorization header"))
}

/// Authenticate the request: a valid, unrevoked access token belonging to
/// an active account.
pub async fn require_user(req: &HttpRequest) -> Result<User, ApiError> {
    let ctx = app_context(req)?;
    let token = bearer_token(req)?;

    let claims = verify_jwt(token, &ctx.settings.server_id, Some("access"))
        .map_err(|_| ApiError::unauthorized("Invalid or expired token"))?;

    if ctx.revocations.is_revoked(&claims.jti).await {
        return Err(ApiError::unauthorized("Token has been revoked"));
    }

    let engine = DbEngine::get()?;
    let user = UserTable::get(engine.pool(), claims.sub)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Unknown user"))?;

    if !user.is_active {
        return Err(ApiError::unauthorized("Account is deactivated"));
    }

    Ok(user)
}

pub async fn require_admin(req: &HttpRequest) -> Result<User, ApiError> {
    let user = require_user(req).await?;
    if !user.is_admin {
        return Err(ApiError::forbidden("Administrator access required"));
    }
    Ok(user)
}

const DEFAULT_PER_PAGE: i64 = 20;
const MAX_PER_PAGE: i64 = 100;

/// Standard pagination query parameters
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl PageQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn per_page(&self) -> i64 {
        self.per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE)
    }
}

/// Resolve raw pagination params into a `(page, per_page)` pair with the
/// usual defaults and bounds
pub(crate) fn pagination(page: Option<i64>, per_page: Option<i64>) -> (i64, i64) {
    let query = PageQuery { page, per_page };
    (query.page(), query.per_page())
}

/// Standard paginated response envelope
#[derive(Debug, Serialize)]
pub struct Paginated<T: Serialize> {
    pub items: Vec<T>,
    pub total: i64,
    pub pages: i64,
    pub current_page: i64,
    pub per_page: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T: Serialize> Paginated<T> {
    pub fn new(items: Vec<T>, total: i64, page: i64, per_page: i64) -> Self {
        let pages = if total == 0 {
            0
        } else {
            (total + per_page - 1) / per_page
        };
        Self {
            items,
            total,
            pages,
            current_page: page,
            per_page,
            has_next: page < pages,
            has_prev: page > 1 && total > 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_query_defaults_and_clamping() {
        let query = PageQuery {
            page: None,
            per_page: None,
        };
        assert_eq!(query.page(), 1);
        assert_eq!(query.per_page(), 20);

        let query = PageQuery {
            page: Some(0),
            per_page: Some(5000),
        };
        assert_eq!(query.page(), 1);
        assert_eq!(query.per_page(), 100);
    }

    #[test]
    fn test_paginated_envelope() {
        let envelope = Paginated::new(vec![1, 2, 3], 7, 1, 3);
        assert_eq!(envelope.pages, 3);
        assert!(envelope.has_next);
        assert!(!envelope.has_prev);

        let envelope = Paginated::new(vec![7], 7, 3, 3);
        assert!(!envelope.has_next);
        assert!(envelope.has_prev);

        let envelope: Paginated<i64> = Paginated::new(Vec::new(), 0, 1, 20);
        assert_eq!(envelope.pages, 0);
        assert!(!envelope.has_next);
        assert!(!envelope.has_prev);
    }
}
