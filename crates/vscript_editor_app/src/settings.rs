// SPDX-License-Identifier: MIT OR Apache-2.0
//! Application settings.
//!
//! Settings live in a small JSON file next to the executable or wherever
//! `VSCRIPT_EDITOR_SETTINGS` points. A missing file means defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use vscript_editor_timeline::{FrameNumber, MAX_HISTORY};

use crate::error::Result;

/// Settings file used when no path is configured
pub const DEFAULT_SETTINGS_FILE: &str = "settings.json";

/// Environment variable overriding the settings file path
pub const SETTINGS_PATH_ENV: &str = "VSCRIPT_EDITOR_SETTINGS";

/// Default log filter directive
pub const DEFAULT_LOG_FILTER: &str = "vscript_editor_app=info,vscript_editor_timeline=info";

/// User-adjustable application settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Length of newly added segments, in frames
    pub new_segment_frame_duration: FrameNumber,
    /// Keep the previous project file as a backup when saving
    pub create_project_backup_when_saving: bool,
    /// Undo history depth per timeline
    pub max_undo_depth: usize,
    /// Log filter directive used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            new_segment_frame_duration: 10,
            create_project_backup_when_saving: true,
            max_undo_depth: MAX_HISTORY,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl AppSettings {
    /// Clamp values into their valid ranges
    pub fn sanitize(&mut self) {
        self.new_segment_frame_duration = self.new_segment_frame_duration.max(1);
        self.max_undo_depth = self.max_undo_depth.max(1);
    }

    /// Set the new segment length, clamped to at least one frame
    pub fn set_new_segment_frame_duration(&mut self, frames: FrameNumber) {
        self.new_segment_frame_duration = frames.max(1);
    }
}

/// Settings bound to their file
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    /// Current settings
    pub settings: AppSettings,
    saved: Option<AppSettings>,
}

impl SettingsStore {
    /// Settings file path from the environment, or the default
    pub fn default_path() -> PathBuf {
        std::env::var_os(SETTINGS_PATH_ENV)
            .map_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE), PathBuf::from)
    }

    /// Load settings, falling back to defaults if the file does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No settings at {:?}, using defaults", path);
            return Ok(Self {
                path: path.to_path_buf(),
                settings: AppSettings::default(),
                saved: None,
            });
        }

        let content = std::fs::read_to_string(path)?;
        let mut settings: AppSettings = serde_json::from_str(&content)?;
        settings.sanitize();

        Ok(Self {
            path: path.to_path_buf(),
            saved: Some(settings.clone()),
            settings,
        })
    }

    /// Settings file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if settings differ from what is on disk
    pub fn is_modified(&self) -> bool {
        self.saved.as_ref() != Some(&self.settings)
    }

    /// Write settings if they changed or the file is missing. Returns whether the file was written.
    pub fn save(&mut self) -> Result<bool> {
        if !self.is_modified() && self.path.exists() {
            return Ok(false);
        }

        let content = serde_json::to_string_pretty(&self.settings)?;
        std::fs::write(&self.path, content)?;
        self.saved = Some(self.settings.clone());

        tracing::info!("Saved settings to {:?}", self.path);
        Ok(true)
    }
}
