//! Durable key-value storage
//!
//! String keys to string values, the shape of a browser's local storage.

mod storage;

pub use storage::{Storage, InMemoryStorage, FileBackedStorage};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt store file {path}: {message}")]
    Corrupt { path: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage lock poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, StoreError>;
