//! Task list routes

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde::Deserialize;

use crate::api::require_user;
use crate::core::policy::{self, Access, Resource};
use crate::db::tables::{TaskListTable, TaskTable};
use crate::db::DbEngine;
use crate::errors::ApiError;
use crate::models::{Priority, TaskList, User};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("", web::get().to(list_lists))
        .route("", web::post().to(create_list))
        .route("/{id}", web::get().to(get_list))
        .route("/{id}", web::put().to(update_list))
        .route("/{id}", web::delete().to(delete_list))
        .route("/{id}/stats", web::get().to(list_stats));
}

#[derive(Deserialize)]
struct ListQuery {
    #[serde(default)]
    include_archived: bool,
}

#[derive(Deserialize)]
struct CreateListRequest {
    title: String,
    #[serde(default)]
    description: String,
    color: Option<String>,
}

#[derive(Deserialize)]
struct UpdateListRequest {
    title: Option<String>,
    description: Option<String>,
    color: Option<String>,
    is_archived: Option<bool>,
}

async fn fetch_owned_list(actor: &User, id: i64) -> Result<TaskList, ApiError> {
    let engine = DbEngine::get()?;
    let list = TaskListTable::get(engine.pool(), id)
        .await?
        .ok_or_else(|| ApiError::not_found("Task list not found"))?;
    policy::authorize(actor, &Resource::TaskOwned(list.user_id), Access::Read)?;
    Ok(list)
}

async fn list_lists(
    req: HttpRequest,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req).await?;
    let engine = DbEngine::get()?;
    let lists =
        TaskListTable::get_for_user(engine.pool(), user.id, query.include_archived).await?;
    Ok(HttpResponse::Ok().json(lists))
}

async fn create_list(
    req: HttpRequest,
    body: web::Json<CreateListRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req).await?;
    let engine = DbEngine::get()?;
    let pool = engine.pool();

    let title = body.title.trim();
    if title.is_empty() {
        return Err(ApiError::validation("Title is required"));
    }
    if TaskListTable::get_by_title(pool, user.id, title).await?.is_some() {
        return Err(ApiError::conflict("A list with this title already exists"));
    }

    let mut list = TaskList::new(title.to_string(), user.id);
    list.description = body.description.trim().to_string();
    if let Some(color) = &body.color {
        list.color = color.clone();
    }
    list.id = TaskListTable::insert(pool, &list).await?;

    Ok(HttpResponse::Created().json(list))
}

async fn get_list(req: HttpRequest, path: web::Path<i64>) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req).await?;
    let list = fetch_owned_list(&user, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(list))
}

async fn update_list(
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<UpdateListRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req).await?;
    let mut list = fetch_owned_list(&user, path.into_inner()).await?;
    let engine = DbEngine::get()?;
    let pool = engine.pool();

    if let Some(title) = &body.title {
        let title = title.trim();
        if title.is_empty() {
            return Err(ApiError::validation("Title cannot be empty"));
        }
        if title != list.title
            && TaskListTable::get_by_title(pool, list.user_id, title).await?.is_some()
        {
            return Err(ApiError::conflict("A list with this title already exists"));
        }
        list.title = title.to_string();
    }
    if let Some(description) = &body.description {
        list.description = description.trim().to_string();
    }
    if let Some(color) = &body.color {
        list.color = color.clone();
    }
    if let Some(is_archived) = body.is_archived {
        if is_archived && !list.is_archived {
            let active = TaskListTable::count_active_for_user(pool, list.user_id).await?;
            if active <= 1 {
                return Err(ApiError::conflict("Cannot archive the last active list"));
            }
        }
        list.is_archived = is_archived;
    }

    list.updated_at = Utc::now();
    TaskListTable::update(pool, &list).await?;
    Ok(HttpResponse::Ok().json(list))
}

/// Delete a list and, via the schema, its tasks. The last non-archived
/// list cannot be deleted so there is always somewhere for tasks to go.
async fn delete_list(req: HttpRequest, path: web::Path<i64>) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req).await?;
    let list = fetch_owned_list(&user, path.into_inner()).await?;
    let engine = DbEngine::get()?;
    let pool = engine.pool();

    if !list.is_archived {
        let active = TaskListTable::count_active_for_user(pool, list.user_id).await?;
        if active <= 1 {
            return Err(ApiError::conflict("Cannot delete the last active list"));
        }
    }

    TaskListTable::delete(pool, list.id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "List deleted" })))
}

async fn list_stats(req: HttpRequest, path: web::Path<i64>) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req).await?;
    let list = fetch_owned_list(&user, path.into_inner()).await?;

    let engine = DbEngine::get()?;
    let (total, completed) = TaskTable::counts_for_list(engine.pool(), list.id).await?;
    let completion_rate = if total > 0 {
        (completed as f64 / total as f64 * 10000.0).round() / 100.0
    } else {
        0.0
    };

    let counts = TaskTable::priority_counts_for_list(engine.pool(), list.id).await?;
    let mut by_priority = serde_json::Map::new();
    for priority in Priority::all() {
        let (p_total, p_completed) = counts
            .iter()
            .find(|(p, _, _)| *p == priority)
            .map(|(_, t, c)| (*t, *c))
            .unwrap_or((0, 0));
        by_priority.insert(
            priority.as_str().to_string(),
            serde_json::json!({
                "total": p_total,
                "completed": p_completed,
                "pending": p_total - p_completed,
            }),
        );
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "total_tasks": total,
        "completed_tasks": completed,
        "incomplete_tasks": total - completed,
        "completion_rate": completion_rate,
        "by_priority": by_priority,
    })))
}
