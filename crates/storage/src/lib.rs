#![forbid(unsafe_code)]

pub mod repository;
pub mod sqlite;

pub use repository::{
    CardSet, InMemoryRepository, ProgressRepository, SetRepository, Storage, StorageError,
};
pub use sqlite::{SqliteInitError, SqliteRepository};
