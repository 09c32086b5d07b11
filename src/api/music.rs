//! Music catalog routes: Spotify search and import, uploads, streaming

use std::path::{Path, PathBuf};

use actix_files::NamedFile;
use actix_multipart::Multipart;
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use futures::{StreamExt, TryStreamExt};
use serde::Deserialize;

use crate::api::{app_context, pagination, require_user, Paginated};
use crate::config::{Paths, ALLOWED_AUDIO_EXTENSIONS};
use crate::core::policy::{self, Access, Resource};
use crate::core::tagger;
use crate::db::tables::{MusicFilters, MusicTable};
use crate::db::DbEngine;
use crate::errors::ApiError;
use crate::models::{Music, User};
use crate::utils::auth::generate_random_string;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("", web::get().to(list_music))
        .route("/search", web::get().to(search_spotify))
        .route("/import", web::post().to(import_spotify))
        .route("/upload", web::post().to(upload))
        .route("/{id}", web::get().to(get_music))
        .route("/{id}", web::put().to(update_music))
        .route("/{id}", web::delete().to(delete_music))
        .route("/{id}/stream", web::get().to(stream))
        .route("/{id}/play", web::post().to(play));
}

#[derive(Deserialize)]
struct MusicListingQuery {
    search: Option<String>,
    genre: Option<String>,
    artist: Option<String>,
    year: Option<i64>,
    uploader_id: Option<i64>,
    is_local: Option<bool>,
    page: Option<i64>,
    per_page: Option<i64>,
}

#[derive(Deserialize)]
struct SearchQuery {
    q: String,
    limit: Option<i64>,
    offset: Option<i64>,
}

#[derive(Deserialize)]
struct ImportRequest {
    spotify_id: String,
}

#[derive(Deserialize)]
struct UpdateMusicRequest {
    title: Option<String>,
    artist: Option<String>,
    album: Option<String>,
    genre: Option<String>,
    year: Option<i64>,
    track_number: Option<i64>,
    is_public: Option<bool>,
    cover_image_url: Option<String>,
}

async fn fetch_music(id: i64) -> Result<Music, ApiError> {
    let engine = DbEngine::get()?;
    MusicTable::get(engine.pool(), id)
        .await?
        .ok_or_else(|| ApiError::not_found("Track not found"))
}

async fn fetch_readable(actor: &User, id: i64) -> Result<Music, ApiError> {
    let music = fetch_music(id).await?;
    policy::authorize(actor, &Resource::Music(&music), Access::Read)?;
    Ok(music)
}

async fn list_music(
    req: HttpRequest,
    query: web::Query<MusicListingQuery>,
) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req).await?;
    let engine = DbEngine::get()?;

    let filters = MusicFilters {
        search: query.search.clone(),
        genre: query.genre.clone(),
        artist: query.artist.clone(),
        year: query.year,
        uploader_id: query.uploader_id,
        is_local: query.is_local,
    };
    let (page, per_page) = pagination(query.page, query.per_page);
    let (tracks, total) = MusicTable::paginate_visible(
        engine.pool(),
        user.id,
        user.is_admin,
        &filters,
        page,
        per_page,
    )
    .await?;

    Ok(HttpResponse::Ok().json(Paginated::new(tracks, total, page, per_page)))
}

async fn search_spotify(
    req: HttpRequest,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse, ApiError> {
    require_user(&req).await?;
    let ctx = app_context(&req)?;

    let q = query.q.trim();
    if q.is_empty() {
        return Err(ApiError::validation("Search query is required"));
    }

    let results = ctx
        .spotify
        .search(q, query.limit.unwrap_or(20), query.offset.unwrap_or(0))
        .await?;
    Ok(HttpResponse::Ok().json(results))
}

/// Import a Spotify track into the catalog. Importing a track that is
/// already present returns the existing row.
async fn import_spotify(
    req: HttpRequest,
    body: web::Json<ImportRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req).await?;
    let ctx = app_context(&req)?;
    let engine = DbEngine::get()?;
    let pool = engine.pool();

    let spotify_id = body.spotify_id.trim();
    if spotify_id.is_empty() {
        return Err(ApiError::validation("spotify_id is required"));
    }

    if let Some(existing) = MusicTable::get_by_spotify_id(pool, spotify_id).await? {
        return Ok(HttpResponse::Ok().json(existing));
    }

    let track = ctx
        .spotify
        .get_track(spotify_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Track not found on Spotify"))?;

    let mut music = Music::new(track.title, track.artist);
    music.album = track.album;
    music.year = track.year;
    music.duration = track.duration;
    music.spotify_id = Some(track.spotify_id);
    music.external_url = track.external_url;
    music.preview_url = track.preview_url;
    music.cover_image_url = track.cover_image_url;
    music.is_local = false;
    music.uploaded_by_id = Some(user.id);
    music.id = MusicTable::insert(pool, &music).await?;

    tracing::info!(music_id = music.id, spotify_id = %body.spotify_id, "imported spotify track");
    Ok(HttpResponse::Created().json(music))
}

#[derive(Default)]
struct UploadForm {
    file_name: Option<String>,
    data: Vec<u8>,
    title: Option<String>,
    artist: Option<String>,
    album: Option<String>,
    genre: Option<String>,
    year: Option<i64>,
    is_public: Option<bool>,
}

fn sanitize_stem(stem: &str) -> String {
    let cleaned: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.chars().all(|c| c == '_') {
        "upload".to_string()
    } else {
        cleaned
    }
}

fn file_extension(name: &str) -> Result<String, ApiError> {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .ok_or_else(|| ApiError::validation("File has no extension"))?;

    if !ALLOWED_AUDIO_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ApiError::validation(format!(
            "Unsupported file type .{ext}, allowed: {}",
            ALLOWED_AUDIO_EXTENSIONS.join(", ")
        )));
    }
    Ok(ext)
}

async fn read_form(mut payload: Multipart, max_size: usize) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();

    while let Some(field) = payload.try_next().await.map_err(|e| ApiError::validation(e.to_string()))? {
        let name = field.name().to_string();
        if name == "file" {
            form.file_name = field
                .content_disposition()
                .get_filename()
                .map(|s| s.to_string());
            let mut field = field;
            while let Some(chunk) = field.next().await {
                let chunk = chunk.map_err(|e| ApiError::validation(e.to_string()))?;
                if form.data.len() + chunk.len() > max_size {
                    return Err(ApiError::validation("File exceeds the upload size limit"));
                }
                form.data.extend_from_slice(&chunk);
            }
        } else {
            let mut value = Vec::new();
            let mut field = field;
            while let Some(chunk) = field.next().await {
                value.extend_from_slice(&chunk.map_err(|e| ApiError::validation(e.to_string()))?);
            }
            let value = String::from_utf8_lossy(&value).trim().to_string();
            if value.is_empty() {
                continue;
            }
            match name.as_str() {
                "title" => form.title = Some(value),
                "artist" => form.artist = Some(value),
                "album" => form.album = Some(value),
                "genre" => form.genre = Some(value),
                "year" => form.year = value.parse().ok(),
                "is_public" => form.is_public = value.parse().ok(),
                _ => {}
            }
        }
    }

    Ok(form)
}

fn remove_upload(path: &PathBuf) {
    if let Err(err) = std::fs::remove_file(path) {
        tracing::warn!(path = %path.display(), "failed to clean up upload: {err}");
    }
}

/// Upload an audio file. Tags are read from the file; explicit form fields
/// win over tags. The stored file is removed again if anything downstream
/// fails.
async fn upload(req: HttpRequest, payload: Multipart) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req).await?;
    let ctx = app_context(&req)?;

    let form = read_form(payload, ctx.settings.max_upload_size).await?;
    let file_name = form
        .file_name
        .clone()
        .ok_or_else(|| ApiError::validation("No file in request"))?;
    if form.data.is_empty() {
        return Err(ApiError::validation("Uploaded file is empty"));
    }
    let ext = file_extension(&file_name)?;

    let stem = Path::new(&file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("upload");
    let stored_name = format!(
        "{}_{}_{}.{ext}",
        sanitize_stem(stem),
        Utc::now().timestamp(),
        generate_random_string(8),
    );

    let paths = Paths::get()?;
    let target = paths.uploads_dir().join(&stored_name);
    let file_size = form.data.len() as i64;
    tokio::fs::write(&target, &form.data)
        .await
        .map_err(anyhow::Error::from)?;

    // lofty does blocking io
    let tag_path = target.clone();
    let tags = match web::block(move || tagger::extract(&tag_path)).await {
        Ok(Ok(tags)) => tags,
        Ok(Err(err)) => {
            remove_upload(&target);
            tracing::warn!("rejecting unreadable audio upload: {err:#}");
            return Err(ApiError::validation("File is not a readable audio file"));
        }
        Err(err) => {
            remove_upload(&target);
            return Err(ApiError::Internal(err.into()));
        }
    };

    let title = form
        .title
        .or(tags.title)
        .unwrap_or_else(|| stem.to_string());
    let artist = form
        .artist
        .or(tags.artist)
        .unwrap_or_else(|| "Unknown Artist".to_string());

    let mut music = Music::new(title, artist);
    music.album = form.album.or(tags.album);
    music.genre = form.genre.or(tags.genre);
    music.year = form.year.or(tags.year);
    music.track_number = tags.track_number;
    music.duration = tags.duration;
    music.file_path = Some(target.display().to_string());
    music.file_size = Some(file_size);
    music.file_format = Some(ext);
    music.is_local = true;
    if let Some(is_public) = form.is_public {
        music.is_public = is_public;
    }
    music.uploaded_by_id = Some(user.id);

    let engine = DbEngine::get()?;
    music.id = match MusicTable::insert(engine.pool(), &music).await {
        Ok(id) => id,
        Err(err) => {
            remove_upload(&target);
            return Err(ApiError::Internal(err));
        }
    };

    tracing::info!(music_id = music.id, file = %stored_name, "stored uploaded track");
    Ok(HttpResponse::Created().json(music))
}

async fn get_music(req: HttpRequest, path: web::Path<i64>) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req).await?;
    let music = fetch_readable(&user, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(music))
}

async fn update_music(
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<UpdateMusicRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req).await?;
    let mut music = fetch_music(path.into_inner()).await?;
    policy::authorize(&user, &Resource::Music(&music), Access::Modify)?;

    if let Some(title) = &body.title {
        let title = title.trim();
        if title.is_empty() {
            return Err(ApiError::validation("Title cannot be empty"));
        }
        music.title = title.to_string();
    }
    if let Some(artist) = &body.artist {
        music.artist = artist.trim().to_string();
    }
    if let Some(album) = &body.album {
        music.album = Some(album.clone());
    }
    if let Some(genre) = &body.genre {
        music.genre = Some(genre.clone());
    }
    if let Some(year) = body.year {
        music.year = Some(year);
    }
    if let Some(track_number) = body.track_number {
        music.track_number = Some(track_number);
    }
    if let Some(is_public) = body.is_public {
        music.is_public = is_public;
    }
    if let Some(cover) = &body.cover_image_url {
        music.cover_image_url = Some(cover.clone());
    }

    music.updated_at = Utc::now();
    let engine = DbEngine::get()?;
    MusicTable::update(engine.pool(), &music).await?;
    Ok(HttpResponse::Ok().json(music))
}

/// Delete a track and, for uploads, its file on disk
async fn delete_music(req: HttpRequest, path: web::Path<i64>) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req).await?;
    let music = fetch_music(path.into_inner()).await?;
    policy::authorize(&user, &Resource::Music(&music), Access::Modify)?;

    let engine = DbEngine::get()?;
    MusicTable::delete(engine.pool(), music.id).await?;

    if let Some(file_path) = &music.file_path {
        remove_upload(&PathBuf::from(file_path));
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Track deleted" })))
}

/// Stream a locally stored file, with range support. Counts as a play.
async fn stream(req: HttpRequest, path: web::Path<i64>) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req).await?;
    let music = fetch_readable(&user, path.into_inner()).await?;

    let file_path = music
        .file_path
        .as_ref()
        .filter(|_| music.is_local)
        .ok_or_else(|| ApiError::not_found("Track has no local file"))?;

    let file = NamedFile::open_async(file_path)
        .await
        .map_err(|_| ApiError::not_found("Audio file is missing from disk"))?;

    let engine = DbEngine::get()?;
    MusicTable::increment_play_count(engine.pool(), music.id).await?;

    let mime = mime_guess::from_path(file_path).first_or_octet_stream();
    Ok(file.set_content_type(mime).into_response(&req))
}

/// Count a play without streaming, for external and preview playback
async fn play(req: HttpRequest, path: web::Path<i64>) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req).await?;
    let music = fetch_readable(&user, path.into_inner()).await?;

    let engine = DbEngine::get()?;
    MusicTable::increment_play_count(engine.pool(), music.id).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Play recorded",
        "play_count": music.play_count + 1,
    })))
}
