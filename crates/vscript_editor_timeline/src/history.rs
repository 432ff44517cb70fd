// SPDX-License-Identifier: MIT OR Apache-2.0
//! Undo/redo history built from change sets.
//!
//! Every timeline operation is recorded as a [`ChangeSet`]: the ordered list
//! of primitive [`Change`]s it applied. Each change knows its inverse, so
//! undo replays the inverses in reverse order and redo replays the changes
//! as recorded.

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TimelineError};
use crate::keyframe::KeyFrame;
use crate::segment::{Segment, SegmentBounds, SegmentId};

/// Maximum undo history depth
pub const MAX_HISTORY: usize = 100;

/// Unique change set ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct ChangeSetId(u64);

impl ChangeSetId {
    /// Get the raw ID value
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// A primitive, invertible edit of the timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Change {
    /// Segment added, with its key frames
    SegmentInserted(Segment),
    /// Segment removed, with its key frames
    SegmentRemoved(Segment),
    /// Start and/or end frame changed; key frames untouched
    SegmentResized {
        /// Segment
        id: SegmentId,
        /// Placement before
        before: SegmentBounds,
        /// Placement after
        after: SegmentBounds,
    },
    /// Segment translated to another track and/or start frame with its key frames
    SegmentMoved {
        /// Segment
        id: SegmentId,
        /// Placement before
        before: SegmentBounds,
        /// Placement after
        after: SegmentBounds,
    },
    /// Segment renamed
    SegmentRenamed {
        /// Segment
        id: SegmentId,
        /// Name before
        before: Option<String>,
        /// Name after
        after: Option<String>,
    },
    /// Key frame added to a segment
    KeyFrameInserted {
        /// Owning segment
        segment: SegmentId,
        /// Added key frame
        key_frame: KeyFrame,
    },
    /// Key frame removed from a segment
    KeyFrameRemoved {
        /// Owning segment
        segment: SegmentId,
        /// Removed key frame
        key_frame: KeyFrame,
    },
    /// Key frame payload replaced in place
    KeyFrameReplaced {
        /// Owning segment
        segment: SegmentId,
        /// Key frame before
        before: KeyFrame,
        /// Key frame after
        after: KeyFrame,
    },
    /// Selected segment changed
    SelectionChanged {
        /// Selection before
        before: Option<SegmentId>,
        /// Selection after
        after: Option<SegmentId>,
    },
    /// Active track changed
    ActiveTrackChanged {
        /// Track before
        before: u32,
        /// Track after
        after: u32,
    },
    /// Number of tracks changed
    TrackCountChanged {
        /// Count before
        before: u32,
        /// Count after
        after: u32,
    },
}

impl Change {
    /// The change that reverts this one
    pub fn inverse(&self) -> Change {
        match self {
            Self::SegmentInserted(segment) => Self::SegmentRemoved(segment.clone()),
            Self::SegmentRemoved(segment) => Self::SegmentInserted(segment.clone()),
            Self::SegmentResized { id, before, after } => Self::SegmentResized {
                id: *id,
                before: *after,
                after: *before,
            },
            Self::SegmentMoved { id, before, after } => Self::SegmentMoved {
                id: *id,
                before: *after,
                after: *before,
            },
            Self::SegmentRenamed { id, before, after } => Self::SegmentRenamed {
                id: *id,
                before: after.clone(),
                after: before.clone(),
            },
            Self::KeyFrameInserted { segment, key_frame } => Self::KeyFrameRemoved {
                segment: *segment,
                key_frame: key_frame.clone(),
            },
            Self::KeyFrameRemoved { segment, key_frame } => Self::KeyFrameInserted {
                segment: *segment,
                key_frame: key_frame.clone(),
            },
            Self::KeyFrameReplaced {
                segment,
                before,
                after,
            } => Self::KeyFrameReplaced {
                segment: *segment,
                before: after.clone(),
                after: before.clone(),
            },
            Self::SelectionChanged { before, after } => Self::SelectionChanged {
                before: *after,
                after: *before,
            },
            Self::ActiveTrackChanged { before, after } => Self::ActiveTrackChanged {
                before: *after,
                after: *before,
            },
            Self::TrackCountChanged { before, after } => Self::TrackCountChanged {
                before: *after,
                after: *before,
            },
        }
    }
}

/// Changes applied by one operation, undone and redone together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Change set ID, assigned on commit
    pub id: ChangeSetId,
    /// Human-readable description
    pub description: String,
    /// Changes in the order they were applied
    pub changes: Vec<Change>,
    /// Timestamp
    pub timestamp: u64,
}

impl ChangeSet {
    /// Create an empty change set
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: ChangeSetId::default(),
            description: description.into(),
            changes: Vec::new(),
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        }
    }

    /// Append an applied change
    pub fn push(&mut self, change: Change) {
        self.changes.push(change);
    }

    /// Get change count
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Check if nothing was changed
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Changes that revert this set, in the order they must be applied
    pub fn inverse_changes(&self) -> impl Iterator<Item = Change> + '_ {
        self.changes.iter().rev().map(Change::inverse)
    }
}

/// Receiver of committed change sets
pub trait UndoLog {
    /// Record a completed operation
    fn commit(&mut self, change_set: ChangeSet);
}

/// History statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryStats {
    /// Change sets in undo stack
    pub undo_count: usize,
    /// Change sets in redo stack
    pub redo_count: usize,
    /// Total primitive changes held
    pub change_count: usize,
    /// Maximum history depth
    pub max_depth: usize,
}

/// Undo/redo history manager
#[derive(Debug)]
pub struct History {
    undo_stack: VecDeque<ChangeSet>,
    redo_stack: VecDeque<ChangeSet>,
    next_id: u64,
    max_depth: usize,
}

impl History {
    /// Create a new history manager
    pub fn new() -> Self {
        Self::with_max_depth(MAX_HISTORY)
    }

    /// Create with custom maximum depth
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            next_id: 1,
            max_depth: max_depth.max(1),
        }
    }

    /// Take the last committed change set for undoing
    pub fn undo(&mut self) -> Result<ChangeSet> {
        let change_set = self
            .undo_stack
            .pop_back()
            .ok_or(TimelineError::NothingToUndo)?;

        self.redo_stack.push_back(change_set.clone());
        Ok(change_set)
    }

    /// Take the last undone change set for redoing
    pub fn redo(&mut self) -> Result<ChangeSet> {
        let change_set = self
            .redo_stack
            .pop_back()
            .ok_or(TimelineError::NothingToRedo)?;

        self.undo_stack.push_back(change_set.clone());
        Ok(change_set)
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Get undo stack depth
    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    /// Get redo stack depth
    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Clear all history
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    /// Get history statistics
    pub fn stats(&self) -> HistoryStats {
        HistoryStats {
            undo_count: self.undo_stack.len(),
            redo_count: self.redo_stack.len(),
            change_count: self
                .undo_stack
                .iter()
                .chain(&self.redo_stack)
                .map(ChangeSet::len)
                .sum(),
            max_depth: self.max_depth,
        }
    }

    /// ID of the change set the next undo would revert
    pub fn last_change_set_id(&self) -> Option<ChangeSetId> {
        self.undo_stack.back().map(|c| c.id)
    }

    /// Get description of next undo operation
    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.back().map(|c| c.description.as_str())
    }

    /// Get description of next redo operation
    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.back().map(|c| c.description.as_str())
    }
}

impl UndoLog for History {
    fn commit(&mut self, mut change_set: ChangeSet) {
        if change_set.is_empty() {
            return;
        }

        change_set.id = ChangeSetId(self.next_id);
        self.next_id += 1;
        tracing::debug!(
            "Committed '{}' ({} changes)",
            change_set.description,
            change_set.len()
        );

        self.redo_stack.clear();
        self.undo_stack.push_back(change_set);

        while self.undo_stack.len() > self.max_depth {
            self.undo_stack.pop_front();
        }
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}
