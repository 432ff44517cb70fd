// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editing session.
//!
//! [`EditorSession`] owns the open project, one [`Timeline`] and [`History`]
//! per sub-project and the key frame clipboard. Hosts that edit from
//! several threads go through [`SharedSession`], which serialises access.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use vscript_editor_timeline::{
    FrameNumber, History, KeyFramePayload, MemoryClipboard, SegmentId, SegmentKind, Timeline,
    TimelineError,
};

use crate::error::{ProjectError, Result};
use crate::project::{ProjectManager, SubProject};
use crate::settings::AppSettings;

/// Sub-project an edit targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SubProjectKind {
    /// Crop windows
    #[default]
    Cropping,
    /// Mask shapes
    Masking,
}

impl SubProjectKind {
    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Cropping => "Cropping",
            Self::Masking => "Masking",
        }
    }

    /// All sub-project kinds
    pub fn all() -> &'static [SubProjectKind] {
        &[Self::Cropping, Self::Masking]
    }

    /// Check if segments of `kind` belong in this sub-project
    pub fn accepts(&self, kind: SegmentKind) -> bool {
        match self {
            Self::Cropping => kind == SegmentKind::Crop,
            Self::Masking => kind != SegmentKind::Crop,
        }
    }
}

/// Counts describing one timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimelineSummary {
    /// Number of tracks
    pub tracks: u32,
    /// Number of segments
    pub segments: usize,
    /// Number of key frames across all segments
    pub key_frames: usize,
}

/// Open project with its editable timelines
pub struct EditorSession {
    project: ProjectManager,
    settings: AppSettings,
    cropping: Timeline,
    masking: Timeline,
    cropping_history: History,
    masking_history: History,
    clipboard: MemoryClipboard,
}

impl EditorSession {
    /// Create a session with no project open
    pub fn new(settings: AppSettings) -> Self {
        Self {
            project: ProjectManager::new(),
            cropping: Timeline::new(FrameNumber::MAX),
            masking: Timeline::new(FrameNumber::MAX),
            cropping_history: History::with_max_depth(settings.max_undo_depth),
            masking_history: History::with_max_depth(settings.max_undo_depth),
            clipboard: MemoryClipboard::new(),
            settings,
        }
    }

    /// Project lifecycle state
    pub fn project(&self) -> &ProjectManager {
        &self.project
    }

    /// Application settings
    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    /// Timeline of a sub-project
    pub fn timeline(&self, kind: SubProjectKind) -> &Timeline {
        match kind {
            SubProjectKind::Cropping => &self.cropping,
            SubProjectKind::Masking => &self.masking,
        }
    }

    /// Undo history of a sub-project
    pub fn history(&self, kind: SubProjectKind) -> &History {
        match kind {
            SubProjectKind::Cropping => &self.cropping_history,
            SubProjectKind::Masking => &self.masking_history,
        }
    }

    /// Key frame clipboard
    pub fn clipboard(&self) -> &MemoryClipboard {
        &self.clipboard
    }

    /// Check if the project has unsaved changes
    pub fn has_unsaved_changes(&self) -> bool {
        self.project.has_unsaved_changes()
    }

    /// Open a project file
    pub fn open(&mut self, path: &Path) -> Result<()> {
        self.project.open_project(path)?;
        if let Err(err) = self.load_timelines() {
            self.close();
            return Err(err);
        }
        Ok(())
    }

    /// Start a new project that is written on the first save
    pub fn create(&mut self, path: &Path, script_file_source: Option<PathBuf>) -> Result<()> {
        self.project.create_project(path, script_file_source);
        self.load_timelines()
    }

    /// Save to the current project file
    pub fn save(&mut self) -> Result<()> {
        self.sync_document();
        self.project.create_backup = self.settings.create_project_backup_when_saving;
        self.project.save_project()
    }

    /// Save under a new path
    pub fn save_as(&mut self, path: &Path) -> Result<()> {
        self.sync_document();
        self.project.create_backup = self.settings.create_project_backup_when_saving;
        self.project.save_project_as(path)
    }

    /// Close the project and reset the timelines
    pub fn close(&mut self) {
        self.project.close_project();
        self.cropping = Timeline::new(FrameNumber::MAX);
        self.masking = Timeline::new(FrameNumber::MAX);
        self.cropping_history.clear();
        self.masking_history.clear();
        self.clipboard.clear();
    }

    fn load_timelines(&mut self) -> Result<()> {
        let document = &self.project.document;
        let frame_count = document.frame_count();
        let cropping = document.cropping.to_timeline(frame_count)?;
        let masking = document.masking.to_timeline(frame_count)?;

        self.cropping = cropping;
        self.masking = masking;
        self.cropping_history = History::with_max_depth(self.settings.max_undo_depth);
        self.masking_history = History::with_max_depth(self.settings.max_undo_depth);
        Ok(())
    }

    fn sync_document(&mut self) {
        self.project.document.cropping = SubProject::from_timeline(&self.cropping);
        self.project.document.masking = SubProject::from_timeline(&self.masking);
    }

    /// Run an edit against a sub-project's timeline.
    ///
    /// The project is marked dirty only when the edit committed, undid or
    /// redid a change set.
    pub fn edit<R, F>(&mut self, kind: SubProjectKind, edit: F) -> Result<R>
    where
        F: FnOnce(&mut Timeline, &mut History, &mut MemoryClipboard) -> vscript_editor_timeline::Result<R>,
    {
        if !self.project.is_project_open() {
            return Err(ProjectError::NoProjectOpen);
        }

        let (timeline, history) = match kind {
            SubProjectKind::Cropping => (&mut self.cropping, &mut self.cropping_history),
            SubProjectKind::Masking => (&mut self.masking, &mut self.masking_history),
        };
        let last = (history.last_change_set_id(), history.redo_depth());
        let value = edit(timeline, history, &mut self.clipboard)?;
        if (history.last_change_set_id(), history.redo_depth()) != last {
            self.project.mark_dirty();
        }
        Ok(value)
    }

    /// Add a segment of the configured default length
    pub fn add_segment(
        &mut self,
        kind: SubProjectKind,
        track: u32,
        start: FrameNumber,
        payload: KeyFramePayload,
    ) -> Result<SegmentId> {
        if !kind.accepts(payload.kind()) {
            return Err(ProjectError::Timeline(TimelineError::PayloadMismatch {
                expected: match kind {
                    SubProjectKind::Cropping => SegmentKind::Crop,
                    SubProjectKind::Masking => SegmentKind::RectangleMask,
                },
                found: payload.kind(),
            }));
        }

        let duration = self.settings.new_segment_frame_duration;
        self.edit(kind, |timeline, history, _| {
            timeline.add_segment(track, start, duration, payload, None, history)
        })
    }

    /// Undo the last edit of a sub-project
    pub fn undo(&mut self, kind: SubProjectKind) -> Result<()> {
        self.edit(kind, |timeline, history, _| timeline.undo(history))
    }

    /// Redo the last undone edit of a sub-project
    pub fn redo(&mut self, kind: SubProjectKind) -> Result<()> {
        self.edit(kind, |timeline, history, _| timeline.redo(history))
    }

    /// Counts for a sub-project's timeline
    pub fn summary(&self, kind: SubProjectKind) -> TimelineSummary {
        let timeline = self.timeline(kind);
        TimelineSummary {
            tracks: timeline.track_count(),
            segments: timeline.segments().len(),
            key_frames: timeline
                .segments()
                .iter()
                .map(|s| s.key_frames().len())
                .sum(),
        }
    }
}

/// Session shared between threads
#[derive(Clone)]
pub struct SharedSession {
    inner: Arc<Mutex<EditorSession>>,
}

impl SharedSession {
    /// Wrap a session
    pub fn new(session: EditorSession) -> Self {
        Self {
            inner: Arc::new(Mutex::new(session)),
        }
    }

    /// Lock the session for exclusive access
    pub fn lock(&self) -> MutexGuard<'_, EditorSession> {
        self.inner.lock()
    }

    /// Run `f` with exclusive access to the session
    pub fn with<R>(&self, f: impl FnOnce(&mut EditorSession) -> R) -> R {
        f(&mut self.inner.lock())
    }
}
