//! Domain logic shared by the API handlers

pub mod dashboard;
pub mod playlistlib;
pub mod policy;
pub mod revocation;
pub mod spotify;
pub mod tagger;
