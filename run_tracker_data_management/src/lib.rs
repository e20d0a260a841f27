use std::path::PathBuf;

use const_format::concatcp;

pub mod database;
pub mod memory;
mod store;

pub use database::db::RunDatabase;
pub use memory::MemoryStore;
pub use store::*;

pub const DATA_DIR: &str = "data/";
pub const DATABASE_PATH: &str = concatcp!(DATA_DIR, "runs.db");

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DataManagerError {
    #[error("database error: {0}")]
    Database(String),
    #[error("no session with id {0}")]
    MissingSession(String),
    #[error("data directory error: {0}")]
    DataDirectory(String),
}

/// Default location of the run database, under the project root when there is one.
pub fn default_database_path() -> PathBuf {
    project_root::get_project_root()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(DATABASE_PATH)
}
