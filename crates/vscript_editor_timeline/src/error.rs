// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types for timeline operations.

use thiserror::Error;

use crate::keyframe::{FrameNumber, SegmentKind};
use crate::segment::SegmentId;

/// Timeline errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimelineError {
    /// Segment range overlaps another segment on the same track
    #[error("Segment {start}..={end} overlaps an existing segment on track {track}")]
    Overlap {
        /// Track number of the rejected segment
        track: u32,
        /// Start frame of the rejected segment
        start: FrameNumber,
        /// End frame of the rejected segment
        end: FrameNumber,
    },

    /// A key frame already occupies the frame number
    #[error("A key frame already exists at frame {0}")]
    DuplicateKey(FrameNumber),

    /// Frame range or frame number is out of bounds
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    /// Segment not found
    #[error("Segment not found: {0:?}")]
    SegmentNotFound(SegmentId),

    /// Key frame not found
    #[error("No key frame at frame {0}")]
    KeyFrameNotFound(FrameNumber),

    /// Key frame payload does not match the segment kind
    #[error("Payload mismatch: expected {expected:?}, found {found:?}")]
    PayloadMismatch {
        /// Kind required by the segment
        expected: SegmentKind,
        /// Kind of the offered payload
        found: SegmentKind,
    },

    /// Polygon payloads with different point counts cannot be interpolated
    #[error("Polygon point count mismatch: {0} vs {1}")]
    PointCountMismatch(usize, usize),

    /// Operation attempted although its precondition check failed
    #[error("Precondition not met: {0}")]
    PreconditionNotMet(String),

    /// Nothing to undo
    #[error("Nothing to undo")]
    NothingToUndo,

    /// Nothing to redo
    #[error("Nothing to redo")]
    NothingToRedo,

    /// Clipboard data could not be read or written
    #[error("Clipboard error: {0}")]
    Clipboard(String),
}

/// Result type for timeline operations
pub type Result<T> = std::result::Result<T, TimelineError>;
