//! Task routes: CRUD, dashboard, bulk operations

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::api::{pagination, require_user, Paginated};
use crate::core::dashboard::DashboardStats;
use crate::core::policy::{self, Access, Resource};
use crate::db::tables::{TaskFilters, TaskListTable, TaskTable};
use crate::db::DbEngine;
use crate::errors::ApiError;
use crate::models::{BulkOperation, Priority, Task, User};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("", web::get().to(list_tasks))
        .route("", web::post().to(create_task))
        .route("/priorities", web::get().to(priorities))
        .route("/dashboard", web::get().to(dashboard))
        .route("/bulk", web::post().to(bulk))
        .route("/{id}", web::get().to(get_task))
        .route("/{id}", web::put().to(update_task))
        .route("/{id}", web::delete().to(delete_task))
        .route("/{id}/toggle", web::post().to(toggle_task));
}

#[derive(Deserialize)]
struct TaskListingQuery {
    task_list_id: Option<i64>,
    completed: Option<bool>,
    priority: Option<Priority>,
    search: Option<String>,
    overdue_only: Option<bool>,
    page: Option<i64>,
    per_page: Option<i64>,
}

#[derive(Deserialize)]
struct CreateTaskRequest {
    title: String,
    #[serde(default)]
    description: String,
    priority: Option<Priority>,
    due_date: Option<DateTime<Utc>>,
    task_list_id: i64,
}

#[derive(Deserialize)]
struct UpdateTaskRequest {
    title: Option<String>,
    description: Option<String>,
    completed: Option<bool>,
    priority: Option<Priority>,
    /// Double option: absent leaves the date alone, null clears it
    #[serde(default, deserialize_with = "deserialize_present")]
    due_date: Option<Option<DateTime<Utc>>>,
    task_list_id: Option<i64>,
}

/// Wraps a present field in `Some`, so a JSON null still arrives as
/// `Some(None)` instead of being folded into the absent case
fn deserialize_present<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: serde::Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    serde::Deserialize::deserialize(deserializer).map(Some)
}

#[derive(Deserialize)]
struct BulkRequest {
    task_ids: Vec<i64>,
    operation: BulkOperation,
    /// Target for `move`
    task_list_id: Option<i64>,
}

async fn fetch_owned_task(actor: &User, id: i64) -> Result<Task, ApiError> {
    let engine = DbEngine::get()?;
    let task = TaskTable::get(engine.pool(), id)
        .await?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;
    policy::authorize(actor, &Resource::TaskOwned(task.user_id), Access::Read)?;
    Ok(task)
}

async fn require_owned_list(actor: &User, list_id: i64) -> Result<(), ApiError> {
    let engine = DbEngine::get()?;
    let list = TaskListTable::get(engine.pool(), list_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Task list not found"))?;
    policy::authorize(actor, &Resource::TaskOwned(list.user_id), Access::Read)?;
    Ok(())
}

async fn list_tasks(
    req: HttpRequest,
    query: web::Query<TaskListingQuery>,
) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req).await?;
    let engine = DbEngine::get()?;

    let filters = TaskFilters {
        task_list_id: query.task_list_id,
        completed: query.completed,
        priority: query.priority,
        search: query.search.clone(),
        overdue_as_of: query.overdue_only.unwrap_or(false).then(Utc::now),
    };
    let (page, per_page) = pagination(query.page, query.per_page);
    let (tasks, total) =
        TaskTable::paginate_for_user(engine.pool(), user.id, &filters, page, per_page).await?;

    Ok(HttpResponse::Ok().json(Paginated::new(tasks, total, page, per_page)))
}

async fn create_task(
    req: HttpRequest,
    body: web::Json<CreateTaskRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req).await?;

    let title = body.title.trim();
    if title.is_empty() {
        return Err(ApiError::validation("Title is required"));
    }
    require_owned_list(&user, body.task_list_id).await?;

    let mut task = Task::new(title.to_string(), body.task_list_id, user.id);
    task.description = body.description.trim().to_string();
    if let Some(priority) = body.priority {
        task.priority = priority;
    }
    task.due_date = body.due_date;

    let engine = DbEngine::get()?;
    task.id = TaskTable::insert(engine.pool(), &task).await?;

    Ok(HttpResponse::Created().json(task))
}

async fn get_task(req: HttpRequest, path: web::Path<i64>) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req).await?;
    let task = fetch_owned_task(&user, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(task))
}

async fn update_task(
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<UpdateTaskRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req).await?;
    let mut task = fetch_owned_task(&user, path.into_inner()).await?;

    if let Some(title) = &body.title {
        let title = title.trim();
        if title.is_empty() {
            return Err(ApiError::validation("Title cannot be empty"));
        }
        task.title = title.to_string();
    }
    if let Some(description) = &body.description {
        task.description = description.trim().to_string();
    }
    if let Some(completed) = body.completed {
        if completed != task.completed {
            task.toggle_completion();
        }
    }
    if let Some(priority) = body.priority {
        task.priority = priority;
    }
    if let Some(due_date) = body.due_date {
        task.due_date = due_date;
    }
    if let Some(list_id) = body.task_list_id {
        require_owned_list(&user, list_id).await?;
        task.task_list_id = list_id;
    }

    task.updated_at = Utc::now();
    let engine = DbEngine::get()?;
    TaskTable::update(engine.pool(), &task).await?;
    Ok(HttpResponse::Ok().json(task))
}

async fn delete_task(req: HttpRequest, path: web::Path<i64>) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req).await?;
    let task = fetch_owned_task(&user, path.into_inner()).await?;
    let engine = DbEngine::get()?;
    TaskTable::delete(engine.pool(), task.id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Task deleted" })))
}

async fn toggle_task(req: HttpRequest, path: web::Path<i64>) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req).await?;
    let mut task = fetch_owned_task(&user, path.into_inner()).await?;

    task.toggle_completion();
    task.updated_at = Utc::now();
    let engine = DbEngine::get()?;
    TaskTable::update(engine.pool(), &task).await?;
    Ok(HttpResponse::Ok().json(task))
}

/// The priority scale, for clients building pickers
async fn priorities(req: HttpRequest) -> Result<HttpResponse, ApiError> {
    require_user(&req).await?;
    let priorities: Vec<_> = Priority::all()
        .iter()
        .map(|p| {
            serde_json::json!({
                "value": p.as_str(),
                "label": p.label(),
                "weight": p.weight(),
                "color": p.color(),
            })
        })
        .collect();
    Ok(HttpResponse::Ok().json(priorities))
}

async fn dashboard(req: HttpRequest) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req).await?;
    let engine = DbEngine::get()?;
    let tasks = TaskTable::get_all_for_user(engine.pool(), user.id).await?;
    let stats = DashboardStats::compute(&tasks, Utc::now());
    Ok(HttpResponse::Ok().json(stats))
}

/// Apply one operation to a batch of tasks. The batch is all-or-nothing:
/// if any id is missing or owned by someone else the whole request fails.
async fn bulk(req: HttpRequest, body: web::Json<BulkRequest>) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req).await?;

    if body.task_ids.is_empty() {
        return Err(ApiError::validation("No task ids given"));
    }

    let engine = DbEngine::get()?;
    let pool = engine.pool();
    let owned = TaskTable::get_many_for_user(pool, user.id, &body.task_ids).await?;
    if owned.len() != body.task_ids.len() {
        return Err(ApiError::not_found("One or more tasks were not found"));
    }

    let now = Utc::now();
    match body.operation {
        BulkOperation::Complete => {
            TaskTable::bulk_set_completed(pool, &body.task_ids, true, now).await?;
        }
        BulkOperation::Incomplete => {
            TaskTable::bulk_set_completed(pool, &body.task_ids, false, now).await?;
        }
        BulkOperation::Delete => {
            TaskTable::bulk_delete(pool, &body.task_ids).await?;
        }
        BulkOperation::Move => {
            let target = body
                .task_list_id
                .ok_or_else(|| ApiError::validation("task_list_id is required for move"))?;
            require_owned_list(&user, target).await?;
            TaskTable::bulk_move(pool, &body.task_ids, target, now).await?;
        }
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Bulk operation applied",
        "affected": body.task_ids.len(),
    })))
}
