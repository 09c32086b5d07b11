//! Database layer

pub mod engine;
pub mod tables;

pub use engine::{setup_sqlite, DbEngine};
