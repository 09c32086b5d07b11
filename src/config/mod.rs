//! Configuration module for TaskTunes
//!
//! This module contains the application settings and path management.

mod paths;
mod settings;

pub use paths::Paths;
pub use settings::Settings;

/// Upload extensions accepted by the music upload endpoint
pub const ALLOWED_AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "aac", "ogg"];
