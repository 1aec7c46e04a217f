//! Error types for the lifecycle subsystem.
//!
//! Nothing here is fatal to the host process: catalog I/O failures degrade to
//! an empty or unsaved catalog, and spawn failures leave records unrepresented
//! until the next reconciliation pass picks them up.

use std::{io::Error as IoError, path::PathBuf};
use thiserror::Error;

/// Catalog file persistence errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to create directory {0}: {1}")]
    DirectoryCreate(PathBuf, IoError),

    #[error("Failed to read file {0}: {1}")]
    FileRead(PathBuf, IoError),

    #[error("Failed to write to file {0}: {1}")]
    FileWrite(PathBuf, IoError),

    #[error("Failed to sync file {0}: {1}")]
    FileSync(PathBuf, IoError),

    #[error("Failed to rename file from {0} to {1}: {2}")]
    FileRename(PathBuf, PathBuf, IoError),

    #[error("Failed to serialize catalog {0}: {1}")]
    Serialize(PathBuf, serde_json::Error),

    #[error("Failed to deserialize file {0}: {1}")]
    Deserialize(PathBuf, serde_json::Error),
}

/// Spawn orchestration errors.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("Host rejected spawn for record {id}")]
    HostRejected { id: String },
}

/// Umbrella error for manager-level operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Spawn error: {0}")]
    Spawn(#[from] SpawnError),
}

pub type CatalogResult<T> = Result<T, CatalogError>;
pub type SpawnResult<T> = Result<T, SpawnError>;
pub type LifecycleResult<T> = Result<T, LifecycleError>;
