//! Authentication routes: register, login, tokens and account self-service

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde::Deserialize;

use crate::api::{app_context, bearer_token, require_user};
use crate::db::tables::{TaskListTable, UserTable};
use crate::db::DbEngine;
use crate::errors::ApiError;
use crate::models::{TaskList, User};
use crate::utils::auth::{
    create_jwt, hash_password, verify_jwt, verify_password, ACCESS_TOKEN_TTL, REFRESH_TOKEN_TTL,
};

const MIN_PASSWORD_LENGTH: usize = 6;
const MIN_USERNAME_LENGTH: usize = 3;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/register", web::post().to(register))
        .route("/login", web::post().to(login))
        .route("/refresh", web::post().to(refresh))
        .route("/logout", web::post().to(logout))
        .route("/me", web::get().to(me))
        .route("/change-password", web::post().to(change_password));
}

#[derive(Deserialize)]
struct RegisterRequest {
    username: String,
    email: String,
    password: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    /// Username or email
    username: String,
    password: String,
}

#[derive(Deserialize, Default)]
struct LogoutRequest {
    refresh_token: Option<String>,
}

#[derive(Deserialize)]
struct ChangePasswordRequest {
    current_password: String,
    new_password: String,
}

/// Good enough for catching typos; real validation happens when mail
/// delivery is attempted, which this server never does.
fn validate_email(email: &str) -> Result<(), ApiError> {
    let valid = email.split_once('@').is_some_and(|(local, domain)| {
        !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
    });
    if valid {
        Ok(())
    } else {
        Err(ApiError::validation("Invalid email address"))
    }
}

fn issue_tokens(user_id: i64, secret: &str) -> Result<serde_json::Value, ApiError> {
    let (access_token, _) = create_jwt(user_id, secret, "access", ACCESS_TOKEN_TTL)?;
    let (refresh_token, _) = create_jwt(user_id, secret, "refresh", REFRESH_TOKEN_TTL)?;
    Ok(serde_json::json!({
        "access_token": access_token,
        "refresh_token": refresh_token,
    }))
}

async fn register(
    req: HttpRequest,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let ctx = app_context(&req)?;
    let engine = DbEngine::get()?;
    let pool = engine.pool();

    let username = body.username.trim();
    let email = body.email.trim().to_lowercase();

    if username.len() < MIN_USERNAME_LENGTH {
        return Err(ApiError::validation("Username must be at least 3 characters"));
    }
    validate_email(&email)?;
    if body.password.len() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::validation("Password must be at least 6 characters"));
    }

    if UserTable::get_by_username(pool, username).await?.is_some() {
        return Err(ApiError::conflict("Username is already taken"));
    }
    if UserTable::get_by_email(pool, &email).await?.is_some() {
        return Err(ApiError::conflict("Email is already registered"));
    }

    let mut user = User::new(
        username.to_string(),
        email,
        hash_password(&body.password, &ctx.settings.server_id),
    );
    user.first_name = body.first_name.trim().to_string();
    user.last_name = body.last_name.trim().to_string();
    user.id = UserTable::insert(pool, &user).await?;

    // every account starts with a list to put tasks in
    let default_list = TaskList::default_for_user(user.id);
    TaskListTable::insert(pool, &default_list).await?;

    tracing::info!(user_id = user.id, username = %user.username, "registered new user");

    let mut response = issue_tokens(user.id, &ctx.settings.server_id)?;
    response["user"] = serde_json::to_value(&user).map_err(anyhow::Error::from)?;
    Ok(HttpResponse::Created().json(response))
}

async fn login(req: HttpRequest, body: web::Json<LoginRequest>) -> Result<HttpResponse, ApiError> {
    let ctx = app_context(&req)?;
    let engine = DbEngine::get()?;
    let pool = engine.pool();

    let user = UserTable::get_by_login(pool, body.username.trim())
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    if !verify_password(&body.password, &ctx.settings.server_id, &user.password) {
        return Err(ApiError::unauthorized("Invalid credentials"));
    }
    if !user.is_active {
        return Err(ApiError::forbidden("Account is deactivated"));
    }

    UserTable::update_last_login(pool, user.id, Utc::now()).await?;

    let mut response = issue_tokens(user.id, &ctx.settings.server_id)?;
    response["user"] = serde_json::to_value(&user).map_err(anyhow::Error::from)?;
    Ok(HttpResponse::Ok().json(response))
}

/// Trade a refresh token for a fresh access token
async fn refresh(req: HttpRequest) -> Result<HttpResponse, ApiError> {
    let ctx = app_context(&req)?;
    let token = bearer_token(&req)?;

    let claims = verify_jwt(token, &ctx.settings.server_id, Some("refresh"))
        .map_err(|_| ApiError::unauthorized("Invalid or expired refresh token"))?;

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

    let (access_token, _) = create_jwt(user.id, &ctx.settings.server_id, "access", ACCESS_TOKEN_TTL)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "access_token": access_token })))
}

/// Revoke the presented access token, and the refresh token too when the
/// client sends it along.
async fn logout(
    req: HttpRequest,
    body: Option<web::Json<LogoutRequest>>,
) -> Result<HttpResponse, ApiError> {
    let ctx = app_context(&req)?;
    let token = bearer_token(&req)?;

    let claims = verify_jwt(token, &ctx.settings.server_id, Some("access"))
        .map_err(|_| ApiError::unauthorized("Invalid or expired token"))?;
    ctx.revocations.revoke(&claims.jti).await;

    if let Some(refresh_token) = body.and_then(|b| b.into_inner().refresh_token) {
        if let Ok(refresh_claims) =
            verify_jwt(&refresh_token, &ctx.settings.server_id, Some("refresh"))
        {
            ctx.revocations.revoke(&refresh_claims.jti).await;
        }
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Logged out" })))
}

async fn me(req: HttpRequest) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req).await?;
    Ok(HttpResponse::Ok().json(user))
}

async fn change_password(
    req: HttpRequest,
    body: web::Json<ChangePasswordRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req).await?;
    let ctx = app_context(&req)?;

    if !verify_password(&body.current_password, &ctx.settings.server_id, &user.password) {
        return Err(ApiError::unauthorized("Current password is incorrect"));
    }
    if body.new_password.len() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::validation("Password must be at least 6 characters"));
    }

    let engine = DbEngine::get()?;
    let hash = hash_password(&body.new_password, &ctx.settings.server_id);
    UserTable::set_password(engine.pool(), user.id, &hash).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Password updated" })))
}
