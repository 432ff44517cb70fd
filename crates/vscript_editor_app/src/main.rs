// SPDX-License-Identifier: MIT OR Apache-2.0
//! Video Script Editor
//!
//! Opens a project file and reports the contents of its cropping and
//! masking timelines.
//!
//! ## Usage
//!
//! `vscript_editor <project file>`
//!
//! Settings are read from `settings.json` or the path in
//! `VSCRIPT_EDITOR_SETTINGS`.

use std::path::PathBuf;
use std::process::ExitCode;

use vscript_editor_app::{logging, EditorSession, SettingsStore, SubProjectKind};

fn main() -> ExitCode {
    // Settings first so their log filter applies
    let settings_path = SettingsStore::default_path();
    let loaded = SettingsStore::load(&settings_path);
    let settings = loaded
        .as_ref()
        .map(|store| store.settings.clone())
        .unwrap_or_default();

    if let Err(e) = logging::init(&settings.log_filter) {
        eprintln!("Failed to initialize logging: {e}");
    }
    tracing::info!("Starting Video Script Editor v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = &loaded {
        tracing::warn!("Failed to load settings from {:?}, using defaults: {e}", settings_path);
    }

    let Some(project_path) = std::env::args_os().nth(1).map(PathBuf::from) else {
        tracing::error!("Usage: vscript_editor <project file>");
        return ExitCode::FAILURE;
    };

    let mut session = EditorSession::new(settings);
    if let Err(e) = session.open(&project_path) {
        tracing::error!("Failed to open {:?}: {e}", project_path);
        return ExitCode::FAILURE;
    }

    if let Some(script) = &session.project().document.script_file_source {
        tracing::info!("Script: {:?}", script);
    }
    for kind in SubProjectKind::all() {
        let summary = session.summary(*kind);
        tracing::info!(
            "{}: {} tracks, {} segments, {} key frames",
            kind.display_name(),
            summary.tracks,
            summary.segments,
            summary.key_frames
        );
    }

    ExitCode::SUCCESS
}
