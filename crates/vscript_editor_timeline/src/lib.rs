// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline segment and key frame model for the video script editor.
//!
//! This crate provides the editing core behind cropping and masking:
//! - Key frames holding crop windows or mask shapes
//! - Segments: non-overlapping frame ranges on numbered tracks
//! - Split, merge, move and resize with key frame retention
//! - Undo/redo through recorded change sets
//! - Key frame copy and paste
//!
//! ## Architecture
//!
//! The timeline is built on:
//! - Sorted collections with binary search by frame number
//! - Invertible primitive changes grouped per operation
//! - `can_*` predicates paired with every mutating operation

pub mod clipboard;
pub mod collection;
pub mod error;
pub mod history;
pub mod keyframe;
pub mod segment;
pub mod timeline;

pub use clipboard::{ClipboardStore, MemoryClipboard};
pub use collection::{encode_search_result, KeyFrameCollection, OrderedVec, SegmentCollection};
pub use error::{Result, TimelineError};
pub use history::{Change, ChangeSet, ChangeSetId, History, HistoryStats, UndoLog, MAX_HISTORY};
pub use keyframe::{
    CropData, EllipseData, FrameNumber, Interpolation, KeyFrame, KeyFramePayload, Point,
    PolygonData, RectangleData, SegmentKind,
};
pub use segment::{Segment, SegmentBounds, SegmentId};
pub use timeline::{Timeline, TimelineEvent};
