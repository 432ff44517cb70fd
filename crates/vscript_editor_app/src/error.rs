// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types for the application layer.

use thiserror::Error;
use vscript_editor_timeline::TimelineError;

/// Project and settings errors
#[derive(Debug, Error)]
pub enum ProjectError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Project file could not be parsed
    #[error("Failed to parse project: {0}")]
    RonParse(#[from] ron::error::SpannedError),

    /// Project could not be serialized
    #[error("Failed to serialize project: {0}")]
    RonSerialize(#[from] ron::Error),

    /// Settings could not be read or written
    #[error("Settings error: {0}")]
    Json(#[from] serde_json::Error),

    /// Project was written by a newer version
    #[error("Project version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version in the file
        found: u32,
        /// Newest version this build reads
        supported: u32,
    },

    /// Project content is inconsistent
    #[error("Invalid project: {0}")]
    InvalidDocument(String),

    /// Operation needs an open project
    #[error("No project is open")]
    NoProjectOpen,

    /// Timeline content is invalid
    #[error(transparent)]
    Timeline(#[from] TimelineError),
}

/// Result type for application operations
pub type Result<T> = std::result::Result<T, ProjectError>;
