//! Error types for scene editing.

use std::path::PathBuf;

use thiserror::Error;

use crate::backend::BackendError;

/// Errors surfaced by scene-graph and editor operations.
///
/// Only [`SceneError::Resource`] is fatal. Everything else is reported and
/// the offending operation is abandoned with the scene left untouched.
#[derive(Error, Debug)]
pub enum SceneError {
    /// Missing rendering context or unknown program location.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Asset missing or unparseable.
    #[error("failed to import '{path}': {message}")]
    Import { path: PathBuf, message: String },

    /// The ray-tracing engine failed to create or update an object.
    #[error("render resource error: {0}")]
    Resource(#[from] BackendError),

    #[error("failed to export '{path}': {message}")]
    Export { path: PathBuf, message: String },
}

impl SceneError {
    /// Whether the session must end. Resource failures leave the engine in
    /// an unknown state; the rest are recoverable.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SceneError::Resource(_))
    }
}

pub type Result<T> = std::result::Result<T, SceneError>;
