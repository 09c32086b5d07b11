//! Server settings stored in settings.json, with environment overrides

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::Paths;

/// Server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Server ID used as the JWT secret and password salt
    #[serde(default)]
    pub server_id: String,

    /// Spotify client-credentials app id
    #[serde(default)]
    pub spotify_client_id: String,

    /// Spotify client-credentials app secret
    #[serde(default)]
    pub spotify_client_secret: String,

    /// Maximum upload size in bytes
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: usize,

    /// Allowed CORS origins; empty allows any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_id: String::new(),
            spotify_client_id: String::new(),
            spotify_client_secret: String::new(),
            max_upload_size: default_max_upload_size(),
            cors_origins: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings from file, creating defaults on first run.
    /// Environment variables override the file for deployment secrets.
    pub fn load() -> Result<Self> {
        let paths = Paths::get()?;
        let settings_path = paths.settings_path();

        let mut settings: Settings = if settings_path.exists() {
            let content =
                std::fs::read_to_string(&settings_path).context("Failed to read settings file")?;
            serde_json::from_str(&content).context("Failed to parse settings file")?
        } else {
            Settings::default()
        };

        if settings.server_id.is_empty() {
            settings.server_id = uuid::Uuid::new_v4().to_string();
            settings.save()?;
        }

        if let Ok(id) = std::env::var("SPOTIFY_CLIENT_ID") {
            settings.spotify_client_id = id;
        }
        if let Ok(secret) = std::env::var("SPOTIFY_CLIENT_SECRET") {
            settings.spotify_client_secret = secret;
        }
        if let Ok(origins) = std::env::var("CORS_ORIGINS") {
            settings.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(size) = std::env::var("MAX_UPLOAD_SIZE") {
            if let Ok(bytes) = size.parse() {
                settings.max_upload_size = bytes;
            }
        }

        Ok(settings)
    }

    /// Save settings to file
    pub fn save(&self) -> Result<()> {
        let paths = Paths::get()?;
        let content = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(paths.settings_path(), content).context("Failed to write settings file")?;
        Ok(())
    }
}

fn default_max_upload_size() -> usize {
    16 * 1024 * 1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_serialization() {
        let settings = Settings::default();
        let json = serde_json::to_string(&settings).unwrap();
        let parsed: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.max_upload_size, 16 * 1024 * 1024);
        assert!(parsed.cors_origins.is_empty());
    }
}
