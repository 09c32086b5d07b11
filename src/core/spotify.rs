//! Spotify Web API client.
//!
//! Uses the client credentials flow. The app-level token is cached until
//! shortly before it expires; the cache sits behind a trait so a shared
//! backend can replace the in-process one.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::core::tagger::parse_year;

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_BASE: &str = "https://api.spotify.com/v1";

/// Tokens are treated as expired this long before they actually are, so a
/// request never goes out with a token about to die mid-flight.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

const MAX_SEARCH_LIMIT: i64 = 50;

/// A track as we store it, normalized from Spotify's response shape
#[derive(Debug, Clone, Serialize)]
pub struct SpotifyTrack {
    pub spotify_id: String,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub duration: Option<i64>,
    pub year: Option<i64>,
    pub external_url: Option<String>,
    pub preview_url: Option<String>,
    pub cover_image_url: Option<String>,
}

#[async_trait]
pub trait TokenCache: Send + Sync {
    async fn get(&self) -> Option<String>;
    async fn put(&self, token: String, expires_in: Duration);
}

/// Process-local token cache
#[derive(Default)]
pub struct InMemoryTokenCache {
    inner: RwLock<Option<(String, Instant)>>,
}

#[async_trait]
impl TokenCache for InMemoryTokenCache {
    async fn get(&self) -> Option<String> {
        let guard = self.inner.read();
        match guard.as_ref() {
            Some((token, expires_at)) if *expires_at > Instant::now() => Some(token.clone()),
            _ => None,
        }
    }

    async fn put(&self, token: String, expires_in: Duration) {
        let lifetime = expires_in.saturating_sub(TOKEN_EXPIRY_MARGIN);
        *self.inner.write() = Some((token, Instant::now() + lifetime));
    }
}

pub struct SpotifyClient {
    http: reqwest::Client,
    client_id: Option<String>,
    client_secret: Option<String>,
    cache: Box<dyn TokenCache>,
}

impl SpotifyClient {
    pub fn new(client_id: Option<String>, client_secret: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id,
            client_secret,
            cache: Box::new(InMemoryTokenCache::default()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some()
    }

    async fn token(&self) -> Result<String> {
        if let Some(token) = self.cache.get().await {
            return Ok(token);
        }

        let (client_id, client_secret) = match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) => (id, secret),
            _ => anyhow::bail!("Spotify credentials not configured"),
        };

        let response: TokenResponse = self
            .http
            .post(TOKEN_URL)
            .basic_auth(client_id, Some(client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .context("Spotify token request failed")?
            .error_for_status()
            .context("Spotify rejected the credentials")?
            .json()
            .await
            .context("Invalid Spotify token response")?;

        self.cache
            .put(
                response.access_token.clone(),
                Duration::from_secs(response.expires_in),
            )
            .await;

        Ok(response.access_token)
    }

    /// Search the Spotify catalog for tracks. Returns an empty list when
    /// credentials are not configured.
    pub async fn search(&self, query: &str, limit: i64, offset: i64) -> Result<Vec<SpotifyTrack>> {
        if !self.is_configured() {
            tracing::warn!("Spotify search skipped, credentials not configured");
            return Ok(Vec::new());
        }

        let token = self.token().await?;
        let limit = limit.clamp(1, MAX_SEARCH_LIMIT);
        let response: SearchResponse = self
            .http
            .get(format!("{API_BASE}/search"))
            .bearer_auth(token)
            .query(&[
                ("q", query),
                ("type", "track"),
                ("limit", &limit.to_string()),
                ("offset", &offset.max(0).to_string()),
            ])
            .send()
            .await
            .context("Spotify search request failed")?
            .error_for_status()
            .context("Spotify search returned an error")?
            .json()
            .await
            .context("Invalid Spotify search response")?;

        Ok(response
            .tracks
            .items
            .into_iter()
            .map(TrackObject::into_track)
            .collect())
    }

    /// Fetch a single track by its Spotify id. `None` when the track does
    /// not exist or credentials are not configured.
    pub async fn get_track(&self, spotify_id: &str) -> Result<Option<SpotifyTrack>> {
        if !self.is_configured() {
            tracing::warn!("Spotify lookup skipped, credentials not configured");
            return Ok(None);
        }

        let token = self.token().await?;
        let response = self
            .http
            .get(format!("{API_BASE}/tracks/{spotify_id}"))
            .bearer_auth(token)
            .send()
            .await
            .context("Spotify track request failed")?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let track: TrackObject = response
            .error_for_status()
            .context("Spotify track lookup returned an error")?
            .json()
            .await
            .context("Invalid Spotify track response")?;

        Ok(Some(track.into_track()))
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize)]
struct SearchResponse {
    tracks: TrackPage,
}

#[derive(Deserialize)]
struct TrackPage {
    items: Vec<TrackObject>,
}

#[derive(Deserialize)]
struct TrackObject {
    id: String,
    name: String,
    #[serde(default)]
    artists: Vec<ArtistObject>,
    album: Option<AlbumObject>,
    duration_ms: Option<i64>,
    #[serde(default)]
    external_urls: ExternalUrls,
    preview_url: Option<String>,
}

#[derive(Deserialize)]
struct ArtistObject {
    name: String,
}

#[derive(Deserialize)]
struct AlbumObject {
    name: String,
    release_date: Option<String>,
    #[serde(default)]
    images: Vec<ImageObject>,
}

#[derive(Deserialize)]
struct ImageObject {
    url: String,
    width: Option<i64>,
}

#[derive(Deserialize, Default)]
struct ExternalUrls {
    spotify: Option<String>,
}

impl TrackObject {
    fn into_track(self) -> SpotifyTrack {
        let artist = if self.artists.is_empty() {
            "Unknown Artist".to_string()
        } else {
            self.artists
                .iter()
                .map(|a| a.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };

        let (album, year, cover_image_url) = match self.album {
            Some(album) => {
                let cover = pick_cover(&album.images);
                let year = album.release_date.as_deref().and_then(parse_year);
                (Some(album.name), year, cover)
            }
            None => (None, None, None),
        };

        SpotifyTrack {
            spotify_id: self.id,
            title: self.name,
            artist,
            album,
            duration: self.duration_ms.map(|ms| ms / 1000),
            year,
            external_url: self.external_urls.spotify,
            preview_url: self.preview_url,
            cover_image_url,
        }
    }
}

/// Spotify sends covers in several sizes. A mid-size one (200 to 400 px
/// wide) is preferred; otherwise the first listed, which is the largest.
fn pick_cover(images: &[ImageObject]) -> Option<String> {
    images
        .iter()
        .find(|img| matches!(img.width, Some(w) if (200..=400).contains(&w)))
        .or_else(|| images.first())
        .map(|img| img.url.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_track() -> TrackObject {
        serde_json::from_str(
            r#"{
                "id": "4cOdK2wGLETKBW3PvgPWqT",
                "name": "Never Gonna Give You Up",
                "artists": [{"name": "Rick Astley"}, {"name": "Someone Else"}],
                "album": {
                    "name": "Whenever You Need Somebody",
                    "release_date": "1987-11-12",
                    "images": [
                        {"url": "https://img/640", "width": 640},
                        {"url": "https://img/300", "width": 300},
                        {"url": "https://img/64", "width": 64}
                    ]
                },
                "duration_ms": 213573,
                "external_urls": {"spotify": "https://open.spotify.com/track/x"},
                "preview_url": null
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_normalization() {
        let track = sample_track().into_track();
        assert_eq!(track.spotify_id, "4cOdK2wGLETKBW3PvgPWqT");
        assert_eq!(track.artist, "Rick Astley, Someone Else");
        assert_eq!(track.album.as_deref(), Some("Whenever You Need Somebody"));
        assert_eq!(track.duration, Some(213));
        assert_eq!(track.year, Some(1987));
        assert_eq!(track.cover_image_url.as_deref(), Some("https://img/300"));
        assert!(track.preview_url.is_none());
    }

    #[test]
    fn test_cover_fallback_to_largest() {
        let images = vec![
            ImageObject {
                url: "https://img/640".to_string(),
                width: Some(640),
            },
            ImageObject {
                url: "https://img/64".to_string(),
                width: Some(64),
            },
        ];
        assert_eq!(pick_cover(&images).as_deref(), Some("https://img/640"));
        assert_eq!(pick_cover(&[]), None);
    }

    #[test]
    fn test_minimal_track_shape() {
        let track: TrackObject = serde_json::from_str(
            r#"{"id": "x", "name": "Untitled", "artists": [], "album": null,
                "duration_ms": null, "preview_url": null}"#,
        )
        .unwrap();
        let track = track.into_track();
        assert_eq!(track.artist, "Unknown Artist");
        assert!(track.album.is_none());
        assert!(track.duration.is_none());
    }

    #[test]
    fn test_token_cache_expiry_margin() {
        tokio_test::block_on(async {
            let cache = InMemoryTokenCache::default();
            // shorter than the safety margin, so it is expired immediately
            cache.put("tok".to_string(), Duration::from_secs(30)).await;
            assert!(cache.get().await.is_none());

            cache.put("tok".to_string(), Duration::from_secs(3600)).await;
            assert_eq!(cache.get().await.as_deref(), Some("tok"));
        });
    }

    #[test]
    fn test_unconfigured_client() {
        let client = SpotifyClient::new(None, None);
        assert!(!client.is_configured());
    }
}
