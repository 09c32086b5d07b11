//! User management routes

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;

use crate::api::{pagination, require_admin, require_user, PageQuery, Paginated};
use crate::core::policy::{self, Access, Resource};
use crate::db::tables::{MusicTable, PlaylistTable, UserTable};
use crate::db::DbEngine;
use crate::errors::ApiError;
use crate::models::User;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("", web::get().to(list_users))
        .route("/{id}", web::get().to(get_user))
        .route("/{id}", web::put().to(update_user))
        .route("/{id}", web::delete().to(delete_user))
        .route("/{id}/playlists", web::get().to(user_playlists))
        .route("/{id}/uploads", web::get().to(user_uploads));
}

#[derive(Deserialize)]
struct UserListQuery {
    search: Option<String>,
    page: Option<i64>,
    per_page: Option<i64>,
}

#[derive(Deserialize)]
struct UpdateUserRequest {
    username: Option<String>,
    email: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    avatar_url: Option<String>,
    is_admin: Option<bool>,
    is_active: Option<bool>,
}

async fn list_users(
    req: HttpRequest,
    query: web::Query<UserListQuery>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&req).await?;
    let engine = DbEngine::get()?;

    let (page, per_page) = pagination(query.page, query.per_page);
    let (users, total) =
        UserTable::paginate(engine.pool(), query.search.as_deref(), page, per_page).await?;

    Ok(HttpResponse::Ok().json(Paginated::new(users, total, page, per_page)))
}

async fn fetch_user(id: i64) -> Result<User, ApiError> {
    let engine = DbEngine::get()?;
    UserTable::get(engine.pool(), id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

async fn get_user(req: HttpRequest, path: web::Path<i64>) -> Result<HttpResponse, ApiError> {
    let actor = require_user(&req).await?;
    let target = fetch_user(path.into_inner()).await?;
    policy::authorize(&actor, &Resource::User(&target), Access::Read)?;
    Ok(HttpResponse::Ok().json(target))
}

async fn update_user(
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<UpdateUserRequest>,
) -> Result<HttpResponse, ApiError> {
    let actor = require_user(&req).await?;
    let mut target = fetch_user(path.into_inner()).await?;
    policy::authorize(&actor, &Resource::User(&target), Access::Modify)?;
    policy::check_privileged_fields(&actor, body.is_admin, body.is_active)?;

    let engine = DbEngine::get()?;
    let pool = engine.pool();

    if let Some(username) = &body.username {
        let username = username.trim();
        if username != target.username {
            if UserTable::get_by_username(pool, username).await?.is_some() {
                return Err(ApiError::conflict("Username is already taken"));
            }
            target.username = username.to_string();
        }
    }
    if let Some(email) = &body.email {
        let email = email.trim().to_lowercase();
        if email != target.email {
            if UserTable::get_by_email(pool, &email).await?.is_some() {
                return Err(ApiError::conflict("Email is already registered"));
            }
            target.email = email;
        }
    }
    if let Some(first_name) = &body.first_name {
        target.first_name = first_name.trim().to_string();
    }
    if let Some(last_name) = &body.last_name {
        target.last_name = last_name.trim().to_string();
    }
    if let Some(avatar_url) = &body.avatar_url {
        target.avatar_url = Some(avatar_url.clone());
    }
    if let Some(is_admin) = body.is_admin {
        target.is_admin = is_admin;
    }
    if let Some(is_active) = body.is_active {
        if !is_active {
            let admins = UserTable::count_active_admins(pool).await?;
            policy::check_sole_admin(&target, admins)?;
        }
        target.is_active = is_active;
    }

    UserTable::update(pool, &target).await?;
    Ok(HttpResponse::Ok().json(target))
}

/// Accounts are deactivated rather than removed, so their uploads and
/// playlists keep a valid owner.
async fn delete_user(req: HttpRequest, path: web::Path<i64>) -> Result<HttpResponse, ApiError> {
    let actor = require_user(&req).await?;
    let target = fetch_user(path.into_inner()).await?;
    policy::authorize(&actor, &Resource::User(&target), Access::Modify)?;

    let engine = DbEngine::get()?;
    let admins = UserTable::count_active_admins(engine.pool()).await?;
    policy::check_sole_admin(&target, admins)?;

    UserTable::deactivate(engine.pool(), target.id).await?;
    tracing::info!(user_id = target.id, "deactivated user account");
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Account deactivated" })))
}

/// A user's playlists. Others only see the public ones.
async fn user_playlists(req: HttpRequest, path: web::Path<i64>) -> Result<HttpResponse, ApiError> {
    let actor = require_user(&req).await?;
    let target = fetch_user(path.into_inner()).await?;

    let public_only = !(actor.is_admin || actor.id == target.id);
    let engine = DbEngine::get()?;
    let playlists = PlaylistTable::get_for_owner(engine.pool(), target.id, public_only).await?;

    Ok(HttpResponse::Ok().json(playlists))
}

/// A user's uploads. Others only see the public ones.
async fn user_uploads(
    req: HttpRequest,
    path: web::Path<i64>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, ApiError> {
    let actor = require_user(&req).await?;
    let target = fetch_user(path.into_inner()).await?;

    let public_only = !(actor.is_admin || actor.id == target.id);
    let engine = DbEngine::get()?;
    let (page, per_page) = (query.page(), query.per_page());
    let (tracks, total) =
        MusicTable::paginate_uploads(engine.pool(), target.id, public_only, page, per_page).await?;

    Ok(HttpResponse::Ok().json(Paginated::new(tracks, total, page, per_page)))
}
