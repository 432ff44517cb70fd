// SPDX-License-Identifier: MIT OR Apache-2.0
//! Host layer of the video script editor.
//!
//! This crate wraps the timeline model with:
//! - Project documents stored as RON, with backups on save
//! - JSON application settings
//! - Logging initialisation
//! - An editing session shared safely between threads

pub mod error;
pub mod logging;
pub mod project;
pub mod session;
pub mod settings;

pub use error::{ProjectError, Result};
pub use project::{
    AspectRatio, ProjectDocument, ProjectManager, ResizeMode, Size, SubProject,
    VideoProcessingOptions, PROJECT_FILE_EXTENSION, PROJECT_FORMAT_VERSION,
};
pub use session::{EditorSession, SharedSession, SubProjectKind, TimelineSummary};
pub use settings::{AppSettings, SettingsStore, DEFAULT_SETTINGS_FILE, SETTINGS_PATH_ENV};
