//! Shared utilities

pub mod auth;
pub mod format;
