//! Table operation structs

pub mod music_table;
pub mod playlist_entry_table;
pub mod playlist_table;
pub mod task_list_table;
pub mod task_table;
pub mod user_table;

pub use music_table::{MusicFilters, MusicTable};
pub use playlist_entry_table::PlaylistEntryTable;
pub use playlist_table::PlaylistTable;
pub use task_list_table::TaskListTable;
pub use task_table::{TaskFilters, TaskTable};
pub use user_table::UserTable;
