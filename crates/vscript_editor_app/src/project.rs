// SPDX-License-Identifier: MIT OR Apache-2.0
//! Project documents and their lifecycle.
//!
//! A project ties a video script to two timelines:
//! - Cropping segments (crop windows)
//! - Masking segments (rectangle, ellipse and polygon shapes)
//!
//! Projects are stored as RON. Loading re-validates every segment, so a
//! hand-edited file with overlapping ranges or mixed payloads is rejected.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use vscript_editor_timeline::{FrameNumber, SegmentCollection, SegmentKind, Timeline};

use crate::error::{ProjectError, Result};

/// Current project file format version
pub const PROJECT_FORMAT_VERSION: u32 = 1;

/// Project file extension
pub const PROJECT_FILE_EXTENSION: &str = "vseproj";

/// Extension appended to the previous project file when saving
pub const BACKUP_EXTENSION: &str = "bak";

/// How the output video is resized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ResizeMode {
    /// Keep the source dimensions
    #[default]
    None,
    /// Letterbox to an exact pixel size
    LetterboxToSize,
    /// Letterbox to an aspect ratio
    LetterboxToAspectRatio,
}

impl ResizeMode {
    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::LetterboxToSize => "Letterbox to size",
            Self::LetterboxToAspectRatio => "Letterbox to aspect ratio",
        }
    }
}

/// Pixel dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Size {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

/// Greatest common divisor
pub fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Rational aspect ratio such as 16:9
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AspectRatio {
    /// Width part
    pub numerator: u32,
    /// Height part
    pub denominator: u32,
}

impl AspectRatio {
    /// Create a ratio reduced to its simplest form. Returns `None` for a zero denominator.
    pub fn new(numerator: u32, denominator: u32) -> Option<Self> {
        (denominator != 0).then(|| {
            Self {
                numerator,
                denominator,
            }
            .simplified()
        })
    }

    /// Reduce by the greatest common divisor
    pub fn simplified(self) -> Self {
        let divisor = gcd(self.numerator, self.denominator);
        if divisor <= 1 {
            return self;
        }
        Self {
            numerator: self.numerator / divisor,
            denominator: self.denominator / divisor,
        }
    }

    /// Ratio as a floating point value
    pub fn value(&self) -> f64 {
        f64::from(self.numerator) / f64::from(self.denominator)
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.numerator, self.denominator)
    }
}

/// Output video processing options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct VideoProcessingOptions {
    /// Resize method
    pub resize_mode: ResizeMode,
    /// Target size for [`ResizeMode::LetterboxToSize`]
    pub output_size: Option<Size>,
    /// Target ratio for [`ResizeMode::LetterboxToAspectRatio`]
    pub aspect_ratio: Option<AspectRatio>,
}

// The output size only means something when letterboxing to a size
impl Serialize for VideoProcessingOptions {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let output_size = self
            .output_size
            .filter(|_| self.resize_mode == ResizeMode::LetterboxToSize);

        let mut state = serializer.serialize_struct("VideoProcessingOptions", 3)?;
        state.serialize_field("resize_mode", &self.resize_mode)?;
        if output_size.is_some() {
            state.serialize_field("output_size", &output_size)?;
        } else {
            state.skip_field("output_size")?;
        }
        if self.aspect_ratio.is_some() {
            state.serialize_field("aspect_ratio", &self.aspect_ratio)?;
        } else {
            state.skip_field("aspect_ratio")?;
        }
        state.end()
    }
}

/// Segments of one timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubProject {
    /// Number of tracks
    pub track_count: u32,
    /// Segments in `(track, start)` order
    pub segments: SegmentCollection,
}

impl Default for SubProject {
    fn default() -> Self {
        Self {
            track_count: 1,
            segments: SegmentCollection::new(),
        }
    }
}

impl SubProject {
    /// Snapshot an edited timeline
    pub fn from_timeline(timeline: &Timeline) -> Self {
        Self {
            track_count: timeline.track_count(),
            segments: timeline.segments().clone(),
        }
    }

    /// Build an editable timeline for a video of `frame_count` frames
    pub fn to_timeline(&self, frame_count: FrameNumber) -> Result<Timeline> {
        Ok(Timeline::from_segments(
            self.segments.clone(),
            self.track_count,
            frame_count,
        )?)
    }

    /// Total key frames across all segments
    pub fn key_frame_count(&self) -> usize {
        self.segments.iter().map(|s| s.key_frames().len()).sum()
    }

    fn check_kinds(&self, allowed: impl Fn(SegmentKind) -> bool, label: &str) -> Result<()> {
        match self.segments.iter().find(|s| !allowed(s.kind())) {
            Some(segment) => Err(ProjectError::InvalidDocument(format!(
                "{} segment found in {label}",
                segment.kind().display_name()
            ))),
            None => Ok(()),
        }
    }
}

/// Complete project document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectDocument {
    /// Format version
    pub version: u32,
    /// Path of the video script the project edits
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_file_source: Option<PathBuf>,
    /// Number of frames in the source video, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_frame_count: Option<FrameNumber>,
    /// Output processing options
    pub video_processing_options: VideoProcessingOptions,
    /// Cropping timeline
    pub cropping: SubProject,
    /// Masking timeline
    pub masking: SubProject,
}

impl Default for ProjectDocument {
    fn default() -> Self {
        Self {
            version: PROJECT_FORMAT_VERSION,
            script_file_source: None,
            video_frame_count: None,
            video_processing_options: VideoProcessingOptions::default(),
            cropping: SubProject::default(),
            masking: SubProject::default(),
        }
    }
}

impl ProjectDocument {
    /// Create an empty project for a video script
    pub fn new(script_file_source: Option<PathBuf>) -> Self {
        Self {
            script_file_source,
            ..Self::default()
        }
    }

    /// Frame count used to bound the timelines
    pub fn frame_count(&self) -> FrameNumber {
        self.video_frame_count.unwrap_or(FrameNumber::MAX)
    }

    /// Parse and validate a project from RON text
    pub fn from_ron(text: &str) -> Result<Self> {
        let mut document: Self = ron::from_str(text)?;

        if document.version > PROJECT_FORMAT_VERSION {
            return Err(ProjectError::UnsupportedVersion {
                found: document.version,
                supported: PROJECT_FORMAT_VERSION,
            });
        }

        let options = &mut document.video_processing_options;
        if let Some(ratio) = options.aspect_ratio {
            options.aspect_ratio = Some(AspectRatio::new(ratio.numerator, ratio.denominator).ok_or_else(
                || ProjectError::InvalidDocument("aspect ratio has a zero denominator".into()),
            )?);
        }

        document.validate()?;
        Ok(document)
    }

    /// Serialize to pretty RON
    pub fn to_ron(&self) -> Result<String> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);
        Ok(ron::ser::to_string_pretty(self, config)?)
    }

    /// Check that segments fit the video and carry the right payloads
    pub fn validate(&self) -> Result<()> {
        self.cropping
            .check_kinds(|kind| kind == SegmentKind::Crop, "cropping")?;
        self.masking
            .check_kinds(|kind| kind != SegmentKind::Crop, "masking")?;

        let frame_count = self.frame_count();
        self.cropping.to_timeline(frame_count)?;
        self.masking.to_timeline(frame_count)?;
        Ok(())
    }

    /// Load a project file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_ron(&content).inspect_err(|e| {
            tracing::warn!("Rejected project {:?}: {e}", path);
        })
    }

    /// Save to a file, optionally keeping the previous file as a backup
    pub fn save(&self, path: &Path, backup: bool) -> Result<()> {
        let content = self.to_ron()?;
        if backup && path.exists() {
            let backup_path = Self::backup_path(path);
            std::fs::copy(path, &backup_path)?;
            tracing::debug!("Backed up project to {:?}", backup_path);
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Backup file path for a project file
    pub fn backup_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".");
        name.push(BACKUP_EXTENSION);
        PathBuf::from(name)
    }
}

/// Project manager for handling project lifecycle
pub struct ProjectManager {
    /// Current project file
    pub file_path: Option<PathBuf>,
    /// Current project document
    pub document: ProjectDocument,
    /// Whether the project has never been written to disk
    pub is_new: bool,
    /// Whether the document has been modified
    pub dirty: bool,
    /// Copy the previous file to a backup before overwriting
    pub create_backup: bool,
}

impl ProjectManager {
    /// Create a new project manager
    pub fn new() -> Self {
        Self {
            file_path: None,
            document: ProjectDocument::default(),
            is_new: false,
            dirty: false,
            create_backup: true,
        }
    }

    /// Check if a project is currently open
    pub fn is_project_open(&self) -> bool {
        self.file_path.is_some()
    }

    /// Get the project name, taken from the file name
    pub fn project_name(&self) -> Option<&str> {
        self.file_path
            .as_deref()
            .and_then(Path::file_stem)
            .and_then(std::ffi::OsStr::to_str)
    }

    /// Open an existing project
    pub fn open_project(&mut self, path: &Path) -> Result<()> {
        let document = ProjectDocument::load(path)?;

        self.file_path = Some(path.to_path_buf());
        self.document = document;
        self.is_new = false;
        self.dirty = false;

        tracing::info!("Opened project at {:?}", path);
        Ok(())
    }

    /// Create a new project that is written on the first save
    pub fn create_project(&mut self, path: &Path, script_file_source: Option<PathBuf>) {
        self.file_path = Some(path.to_path_buf());
        self.document = ProjectDocument::new(script_file_source);
        self.is_new = true;
        self.dirty = true;

        tracing::info!("Created new project at {:?}", path);
    }

    /// Save the current project
    pub fn save_project(&mut self) -> Result<()> {
        let Some(path) = &self.file_path else {
            return Err(ProjectError::NoProjectOpen);
        };

        let backup = self.create_backup && !self.is_new;
        self.document.save(path, backup)?;
        self.is_new = false;
        self.dirty = false;

        tracing::info!("Saved project to {:?}", path);
        Ok(())
    }

    /// Save the current project under a new path
    pub fn save_project_as(&mut self, path: &Path) -> Result<()> {
        if self.file_path.is_none() {
            return Err(ProjectError::NoProjectOpen);
        }
        self.file_path = Some(path.to_path_buf());
        self.is_new = !path.exists();
        self.save_project()
    }

    /// Close the current project
    pub fn close_project(&mut self) {
        if let Some(path) = self.file_path.take() {
            tracing::info!("Closed project {:?}", path);
        }
        self.document = ProjectDocument::default();
        self.is_new = false;
        self.dirty = false;
    }

    /// Mark document as modified
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Check if the document has unsaved changes
    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty
    }
}

impl Default for ProjectManager {
    fn default() -> Self {
        Self::new()
    }
}
