//! Playlist routes

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde::Deserialize;

use crate::api::{pagination, require_user, PageQuery, Paginated};
use crate::core::playlistlib;
use crate::core::policy::{self, Access, Resource};
use crate::db::tables::{MusicTable, PlaylistEntryTable, PlaylistTable};
use crate::db::DbEngine;
use crate::errors::ApiError;
use crate::models::{Playlist, User};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("", web::get().to(list_playlists))
        .route("", web::post().to(create_playlist))
        .route("/{id}", web::get().to(get_playlist))
        .route("/{id}", web::put().to(update_playlist))
        .route("/{id}", web::delete().to(delete_playlist))
        .route("/{id}/tracks", web::get().to(get_tracks))
        .route("/{id}/tracks", web::post().to(add_track))
        .route("/{id}/tracks/{music_id}", web::delete().to(remove_track))
        .route("/{id}/tracks/{music_id}/position", web::put().to(reorder_track))
        .route("/{id}/play", web::post().to(play))
        .route("/{id}/duplicate", web::post().to(duplicate))
        .route("/{id}/refresh-duration", web::post().to(refresh_duration));
}

#[derive(Deserialize)]
struct PlaylistListingQuery {
    search: Option<String>,
    page: Option<i64>,
    per_page: Option<i64>,
}

#[derive(Deserialize)]
struct CreatePlaylistRequest {
    name: String,
    description: Option<String>,
    #[serde(default = "default_true")]
    is_public: bool,
    #[serde(default)]
    is_collaborative: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
struct UpdatePlaylistRequest {
    name: Option<String>,
    description: Option<String>,
    cover_image_url: Option<String>,
    is_public: Option<bool>,
    is_collaborative: Option<bool>,
}

#[derive(Deserialize)]
struct AddTrackRequest {
    music_id: i64,
    position: Option<i64>,
}

#[derive(Deserialize)]
struct ReorderRequest {
    position: i64,
}

async fn fetch_playlist(id: i64) -> Result<Playlist, ApiError> {
    let engine = DbEngine::get()?;
    PlaylistTable::get(engine.pool(), id)
        .await?
        .ok_or_else(|| ApiError::not_found("Playlist not found"))
}

async fn fetch_readable(actor: &User, id: i64) -> Result<Playlist, ApiError> {
    let playlist = fetch_playlist(id).await?;
    policy::authorize(actor, &Resource::Playlist(&playlist), Access::Read)?;
    Ok(playlist)
}

async fn list_playlists(
    req: HttpRequest,
    query: web::Query<PlaylistListingQuery>,
) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req).await?;
    let engine = DbEngine::get()?;

    let (page, per_page) = pagination(query.page, query.per_page);
    let (playlists, total) = PlaylistTable::paginate_visible(
        engine.pool(),
        user.id,
        user.is_admin,
        query.search.as_deref(),
        page,
        per_page,
    )
    .await?;

    Ok(HttpResponse::Ok().json(Paginated::new(playlists, total, page, per_page)))
}

async fn create_playlist(
    req: HttpRequest,
    body: web::Json<CreatePlaylistRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req).await?;

    let name = body.name.trim();
    if name.is_empty() {
        return Err(ApiError::validation("Name is required"));
    }

    let mut playlist = Playlist::new(name.to_string(), user.id);
    playlist.description = body.description.clone();
    playlist.is_public = body.is_public;
    playlist.is_collaborative = body.is_collaborative;

    let engine = DbEngine::get()?;
    playlist.id = PlaylistTable::insert(engine.pool(), &playlist).await?;

    Ok(HttpResponse::Created().json(playlist))
}

async fn get_playlist(req: HttpRequest, path: web::Path<i64>) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req).await?;
    let playlist = fetch_readable(&user, path.into_inner()).await?;

    let engine = DbEngine::get()?;
    let track_count = PlaylistEntryTable::count(engine.pool(), playlist.id).await?;

    let mut body = serde_json::to_value(&playlist).map_err(anyhow::Error::from)?;
    body["track_count"] = track_count.into();
    body["total_duration_formatted"] = playlist.total_duration_formatted().into();
    Ok(HttpResponse::Ok().json(body))
}

async fn update_playlist(
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<UpdatePlaylistRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req).await?;
    let mut playlist = fetch_playlist(path.into_inner()).await?;
    policy::authorize(&user, &Resource::Playlist(&playlist), Access::Modify)?;

    if let Some(name) = &body.name {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::validation("Name cannot be empty"));
        }
        playlist.name = name.to_string();
    }
    if let Some(description) = &body.description {
        playlist.description = Some(description.clone());
    }
    if let Some(cover) = &body.cover_image_url {
        playlist.cover_image_url = Some(cover.clone());
    }
    if let Some(is_public) = body.is_public {
        playlist.is_public = is_public;
    }
    if let Some(is_collaborative) = body.is_collaborative {
        playlist.is_collaborative = is_collaborative;
    }

    playlist.updated_at = Utc::now();
    let engine = DbEngine::get()?;
    PlaylistTable::update(engine.pool(), &playlist).await?;
    Ok(HttpResponse::Ok().json(playlist))
}

async fn delete_playlist(req: HttpRequest, path: web::Path<i64>) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req).await?;
    let playlist = fetch_playlist(path.into_inner()).await?;
    policy::authorize(&user, &Resource::Playlist(&playlist), Access::Modify)?;

    let engine = DbEngine::get()?;
    PlaylistTable::delete(engine.pool(), playlist.id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Playlist deleted" })))
}

/// Tracks in play order, each annotated with its position on the page
async fn get_tracks(
    req: HttpRequest,
    path: web::Path<i64>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req).await?;
    let playlist = fetch_readable(&user, path.into_inner()).await?;

    let engine = DbEngine::get()?;
    let (page, per_page) = (query.page(), query.per_page());
    let (tracks, total) =
        PlaylistEntryTable::tracks(engine.pool(), playlist.id, page, per_page).await?;

    let offset = (page - 1) * per_page;
    let items: Vec<serde_json::Value> = tracks
        .into_iter()
        .enumerate()
        .map(|(index, track)| {
            let mut value = serde_json::to_value(&track)?;
            value["position"] = (offset + index as i64 + 1).into();
            Ok(value)
        })
        .collect::<Result<_, serde_json::Error>>()
        .map_err(anyhow::Error::from)?;

    Ok(HttpResponse::Ok().json(Paginated::new(items, total, page, per_page)))
}

async fn add_track(
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<AddTrackRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req).await?;
    let playlist = fetch_playlist(path.into_inner()).await?;
    policy::authorize(&user, &Resource::PlaylistTracks(&playlist), Access::Modify)?;

    // the actor must be able to see a track to add it
    let engine = DbEngine::get()?;
    let music = MusicTable::get(engine.pool(), body.music_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Track not found"))?;
    policy::authorize(&user, &Resource::Music(&music), Access::Read)?;

    let entry = playlistlib::add_track(
        engine.pool(),
        playlist.id,
        body.music_id,
        body.position,
        Utc::now(),
    )
    .await?;

    Ok(HttpResponse::Created().json(entry))
}

async fn remove_track(
    req: HttpRequest,
    path: web::Path<(i64, i64)>,
) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req).await?;
    let (playlist_id, music_id) = path.into_inner();
    let playlist = fetch_playlist(playlist_id).await?;
    policy::authorize(&user, &Resource::PlaylistTracks(&playlist), Access::Modify)?;

    let engine = DbEngine::get()?;
    playlistlib::remove_track(engine.pool(), playlist.id, music_id, Utc::now()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Track removed" })))
}

async fn reorder_track(
    req: HttpRequest,
    path: web::Path<(i64, i64)>,
    body: web::Json<ReorderRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req).await?;
    let (playlist_id, music_id) = path.into_inner();
    let playlist = fetch_playlist(playlist_id).await?;
    policy::authorize(&user, &Resource::PlaylistTracks(&playlist), Access::Modify)?;

    let engine = DbEngine::get()?;
    playlistlib::reorder_track(engine.pool(), playlist.id, music_id, body.position, Utc::now())
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Track moved" })))
}

async fn play(req: HttpRequest, path: web::Path<i64>) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req).await?;
    let playlist = fetch_readable(&user, path.into_inner()).await?;

    let engine = DbEngine::get()?;
    PlaylistTable::increment_play_count(engine.pool(), playlist.id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Play recorded",
        "play_count": playlist.play_count + 1,
    })))
}

/// Copy a playlist into the caller's library, keeping only the tracks
/// they can see. An optional body overrides the copied metadata.
async fn duplicate(
    req: HttpRequest,
    path: web::Path<i64>,
    body: Option<web::Json<playlistlib::DuplicateOverrides>>,
) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req).await?;
    let playlist = fetch_readable(&user, path.into_inner()).await?;

    let overrides = body.map(web::Json::into_inner).unwrap_or_default();
    let engine = DbEngine::get()?;
    let copy =
        playlistlib::duplicate(engine.pool(), &playlist, &user, &overrides, Utc::now()).await?;

    tracing::info!(source = playlist.id, copy = copy.id, "duplicated playlist");
    Ok(HttpResponse::Created().json(copy))
}

/// Recompute the cached duration from the actual entries
async fn refresh_duration(req: HttpRequest, path: web::Path<i64>) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req).await?;
    let playlist = fetch_playlist(path.into_inner()).await?;
    policy::authorize(&user, &Resource::Playlist(&playlist), Access::Modify)?;

    let engine = DbEngine::get()?;
    let total = playlistlib::recompute_duration(engine.pool(), playlist.id, Utc::now()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "total_duration": total })))
}
