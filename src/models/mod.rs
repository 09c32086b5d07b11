//! Data models for TaskTunes
//!
//! This module contains all the core data structures used throughout the
//! application.

mod enums;
mod music;
mod playlist;
mod task;
mod task_list;
mod user;

pub use enums::{BulkOperation, Priority};
pub use music::Music;
pub use playlist::{Playlist, PlaylistEntry};
pub use task::Task;
pub use task_list::{TaskList, DEFAULT_LIST_COLOR};
pub use user::User;
