// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline editing operations.
//!
//! [`Timeline`] owns the segments of one sub-project (cropping or masking)
//! together with the editing context: track count, video length, current
//! frame, active track and selection.
//!
//! Every mutating operation comes in two halves:
//! - a `can_*` predicate for gating commands without side effects;
//! - the operation itself, which applies primitive [`Change`]s one by one
//!   and commits them to the supplied [`UndoLog`] as a single [`ChangeSet`].
//!
//! If any step fails, the steps already applied are reverted before the
//! error is returned, so callers never observe a half-applied operation.

use crate::collection::SegmentCollection;
use crate::error::{Result, TimelineError};
use crate::history::{Change, ChangeSet, History, UndoLog};
use crate::keyframe::{FrameNumber, KeyFrame, KeyFramePayload};
use crate::segment::{Segment, SegmentBounds, SegmentId};

/// Notification emitted when the timeline changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineEvent {
    /// Segment added
    SegmentAdded(SegmentId),
    /// Segment removed
    SegmentRemoved(SegmentId),
    /// Segment placement or name changed
    SegmentChanged(SegmentId),
    /// Key frames of a segment changed
    KeyFramesChanged(SegmentId),
    /// Selected segment changed
    SelectionChanged(Option<SegmentId>),
    /// Active track changed
    ActiveTrackChanged(u32),
    /// Track count changed
    TracksChanged(u32),
    /// Current frame changed
    CurrentFrameChanged(FrameNumber),
}

/// Last frame of a segment starting at `start` and spanning `duration` frames
fn segment_end(start: FrameNumber, duration: FrameNumber) -> Option<FrameNumber> {
    duration.checked_sub(1).and_then(|d| start.checked_add(d))
}

fn precondition(message: impl Into<String>) -> TimelineError {
    TimelineError::PreconditionNotMet(message.into())
}

/// Segments of one sub-project plus editing state
#[derive(Debug, Clone)]
pub struct Timeline {
    segments: SegmentCollection,
    track_count: u32,
    frame_count: FrameNumber,
    current_frame: FrameNumber,
    active_track: u32,
    selected: Option<SegmentId>,
    pending_events: Vec<TimelineEvent>,
}

impl Timeline {
    /// Create an empty timeline with one track for a video of `frame_count` frames
    pub fn new(frame_count: FrameNumber) -> Self {
        Self {
            segments: SegmentCollection::new(),
            track_count: 1,
            frame_count,
            current_frame: 0,
            active_track: 0,
            selected: None,
            pending_events: Vec::new(),
        }
    }

    /// Create a timeline from loaded segments.
    ///
    /// The track count grows to cover every segment's track.
    pub fn from_segments(
        segments: SegmentCollection,
        track_count: u32,
        frame_count: FrameNumber,
    ) -> Result<Self> {
        if let Some(segment) = segments.iter().find(|s| s.end() >= frame_count) {
            return Err(TimelineError::InvalidRange(format!(
                "segment ends at frame {} but the video has {frame_count} frames",
                segment.end()
            )));
        }

        let needed = segments.iter().map(|s| s.track() + 1).max().unwrap_or(1);
        Ok(Self {
            track_count: track_count.max(needed),
            segments,
            ..Self::new(frame_count)
        })
    }

    /// All segments in `(track, start)` order
    pub fn segments(&self) -> &SegmentCollection {
        &self.segments
    }

    /// Get segment by id
    pub fn segment(&self, id: SegmentId) -> Option<&Segment> {
        self.segments.get(id)
    }

    /// Number of tracks
    pub fn track_count(&self) -> u32 {
        self.track_count
    }

    /// Number of frames in the video
    pub fn frame_count(&self) -> FrameNumber {
        self.frame_count
    }

    /// Current frame
    pub fn current_frame(&self) -> FrameNumber {
        self.current_frame
    }

    /// Active track
    pub fn active_track(&self) -> u32 {
        self.active_track
    }

    /// Selected segment id
    pub fn selected_segment_id(&self) -> Option<SegmentId> {
        self.selected
    }

    /// Selected segment
    pub fn selected_segment(&self) -> Option<&Segment> {
        self.selected.and_then(|id| self.segments.get(id))
    }

    /// Drain pending change notifications
    pub fn take_events(&mut self) -> Vec<TimelineEvent> {
        std::mem::take(&mut self.pending_events)
    }

    fn segment_or_err(&self, id: SegmentId) -> Result<&Segment> {
        self.segments.get(id).ok_or(TimelineError::SegmentNotFound(id))
    }

    fn segment_mut(&mut self, id: SegmentId) -> Result<&mut Segment> {
        self.segments
            .get_mut(id)
            .ok_or(TimelineError::SegmentNotFound(id))
    }

    // ------------------------------------------------------------------
    // Navigation and selection (not undo-logged)
    // ------------------------------------------------------------------

    /// Move the current frame, clamped to the video length
    pub fn seek(&mut self, frame: FrameNumber) {
        let frame = frame.min(self.frame_count.saturating_sub(1));
        if frame != self.current_frame {
            self.current_frame = frame;
            self.pending_events
                .push(TimelineEvent::CurrentFrameChanged(frame));
        }
        self.refresh_selection();
    }

    /// Select a segment, making its track active, or clear the selection
    pub fn select_segment(&mut self, id: Option<SegmentId>) -> Result<()> {
        if let Some(id) = id {
            let track = self.segment_or_err(id)?.track();
            if track != self.active_track {
                self.active_track = track;
                self.pending_events
                    .push(TimelineEvent::ActiveTrackChanged(track));
            }
        }

        if self.selected != id {
            self.selected = id;
            self.pending_events.push(TimelineEvent::SelectionChanged(id));
        }
        Ok(())
    }

    /// Make a track active
    pub fn set_active_track(&mut self, track: u32) -> Result<()> {
        if track >= self.track_count {
            return Err(TimelineError::InvalidRange(format!(
                "track {track} does not exist"
            )));
        }

        if track != self.active_track {
            self.active_track = track;
            self.pending_events
                .push(TimelineEvent::ActiveTrackChanged(track));
            self.refresh_selection();
        }
        Ok(())
    }

    /// Keep the selection if it covers the current frame on the active track,
    /// otherwise select whatever does
    fn refresh_selection(&mut self) {
        let keep = self
            .selected_segment()
            .filter(|s| s.track() == self.active_track && s.contains_frame(self.current_frame))
            .map(Segment::id);
        let resolved = keep.or_else(|| {
            self.segments
                .at_frame(self.active_track, self.current_frame)
                .map(Segment::id)
        });

        if resolved != self.selected {
            self.selected = resolved;
            self.pending_events
                .push(TimelineEvent::SelectionChanged(resolved));
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Segments covering `frame`, at most one per track
    pub fn active_segments(&self, frame: FrameNumber) -> Vec<&Segment> {
        (0..self.track_count)
            .filter_map(|track| self.segments.at_frame(track, frame))
            .collect()
    }

    /// Nearest key frame on `track` strictly before `frame`
    pub fn seek_previous_key_frame(&self, track: u32, frame: FrameNumber) -> Option<FrameNumber> {
        self.segments
            .on_track(track)
            .filter(|segment| segment.start() < frame)
            .filter_map(|segment| segment.key_frames().previous(frame))
            .map(|kf| kf.frame)
            .max()
    }

    /// Nearest key frame on `track` strictly after `frame`
    pub fn seek_next_key_frame(&self, track: u32, frame: FrameNumber) -> Option<FrameNumber> {
        self.segments
            .on_track(track)
            .filter(|segment| segment.end() > frame)
            .filter_map(|segment| segment.key_frames().next(frame))
            .map(|kf| kf.frame)
            .min()
    }

    // ------------------------------------------------------------------
    // Change application
    // ------------------------------------------------------------------

    fn check_placement(&self, bounds: &SegmentBounds) -> Result<()> {
        if bounds.track >= self.track_count {
            return Err(TimelineError::InvalidRange(format!(
                "track {} does not exist",
                bounds.track
            )));
        }
        if bounds.end >= self.frame_count {
            return Err(TimelineError::InvalidRange(format!(
                "end frame {} is past the last video frame",
                bounds.end
            )));
        }
        Ok(())
    }

    /// Apply one primitive change
    fn apply(&mut self, change: &Change) -> Result<()> {
        match change {
            Change::SegmentInserted(segment) => {
                self.check_placement(&segment.bounds())?;
                self.segments.insert(segment.clone())?;
                self.pending_events
                    .push(TimelineEvent::SegmentAdded(segment.id()));
            }
            Change::SegmentRemoved(segment) => {
                self.segments
                    .remove(segment.id())
                    .ok_or(TimelineError::SegmentNotFound(segment.id()))?;
                self.pending_events
                    .push(TimelineEvent::SegmentRemoved(segment.id()));
            }
            Change::SegmentResized { id, after, .. } => {
                self.check_placement(after)?;
                self.segments
                    .reposition(*id, |segment| segment.set_bounds(after.start, after.end))?;
                self.pending_events.push(TimelineEvent::SegmentChanged(*id));
            }
            Change::SegmentMoved { id, after, .. } => {
                self.check_placement(after)?;
                self.segments
                    .reposition(*id, |segment| segment.translate_to(after.track, after.start))?;
                self.pending_events.push(TimelineEvent::SegmentChanged(*id));
            }
            Change::SegmentRenamed { id, after, .. } => {
                self.segment_mut(*id)?.set_name(after.clone());
                self.pending_events.push(TimelineEvent::SegmentChanged(*id));
            }
            Change::KeyFrameInserted { segment, key_frame } => {
                self.segment_mut(*segment)?
                    .insert_key_frame(key_frame.clone())?;
                self.pending_events
                    .push(TimelineEvent::KeyFramesChanged(*segment));
            }
            Change::KeyFrameRemoved { segment, key_frame } => {
                self.segment_mut(*segment)?
                    .remove_key_frame(key_frame.frame)?;
                self.pending_events
                    .push(TimelineEvent::KeyFramesChanged(*segment));
            }
            Change::KeyFrameReplaced { segment, after, .. } => {
                self.segment_mut(*segment)?
                    .replace_key_frame(after.clone())?;
                self.pending_events
                    .push(TimelineEvent::KeyFramesChanged(*segment));
            }
            Change::SelectionChanged { after, .. } => {
                self.selected = *after;
                self.pending_events
                    .push(TimelineEvent::SelectionChanged(*after));
            }
            Change::ActiveTrackChanged { after, .. } => {
                self.active_track = *after;
                self.pending_events
                    .push(TimelineEvent::ActiveTrackChanged(*after));
            }
            Change::TrackCountChanged { after, .. } => {
                if *after == 0 {
                    return Err(TimelineError::InvalidRange(
                        "a timeline keeps at least one track".into(),
                    ));
                }
                self.track_count = *after;
                self.pending_events.push(TimelineEvent::TracksChanged(*after));
            }
        }
        Ok(())
    }

    /// Apply a change and append it to the change set
    fn record(&mut self, changes: &mut ChangeSet, change: Change) -> Result<()> {
        self.apply(&change)?;
        changes.push(change);
        Ok(())
    }

    fn record_selection(&mut self, changes: &mut ChangeSet, after: Option<SegmentId>) -> Result<()> {
        if self.selected == after {
            return Ok(());
        }
        let before = self.selected;
        self.record(changes, Change::SelectionChanged { before, after })
    }

    fn record_active_track(&mut self, changes: &mut ChangeSet, after: u32) -> Result<()> {
        if self.active_track == after {
            return Ok(());
        }
        let before = self.active_track;
        self.record(changes, Change::ActiveTrackChanged { before, after })
    }

    /// Replace a key frame by a copy at another frame number
    fn record_renumber(
        &mut self,
        changes: &mut ChangeSet,
        segment: SegmentId,
        key_frame: &KeyFrame,
        frame: FrameNumber,
    ) -> Result<()> {
        self.record(
            changes,
            Change::KeyFrameRemoved {
                segment,
                key_frame: key_frame.clone(),
            },
        )?;
        self.record(
            changes,
            Change::KeyFrameInserted {
                segment,
                key_frame: key_frame.with_frame(frame),
            },
        )
    }

    fn rollback(&mut self, changes: &ChangeSet) {
        for change in changes.inverse_changes() {
            if let Err(err) = self.apply(&change) {
                tracing::error!("Rollback of '{}' failed: {err}", changes.description);
            }
        }
    }

    /// Run an operation as one atomic change set
    fn execute<R, L, F>(&mut self, description: &str, log: &mut L, build: F) -> Result<R>
    where
        L: UndoLog + ?Sized,
        F: FnOnce(&mut Self, &mut ChangeSet) -> Result<R>,
    {
        let mut changes = ChangeSet::new(description);
        let event_mark = self.pending_events.len();

        match build(self, &mut changes) {
            Ok(value) => {
                log.commit(changes);
                Ok(value)
            }
            Err(err) => {
                tracing::warn!("{description} failed: {err}");
                self.rollback(&changes);
                self.pending_events.truncate(event_mark);
                Err(err)
            }
        }
    }

    /// Apply recorded changes, reverting them all if one fails
    fn replay(&mut self, description: &str, changes: impl IntoIterator<Item = Change>) -> Result<()> {
        let mut applied = ChangeSet::new(description);
        let event_mark = self.pending_events.len();

        for change in changes {
            if let Err(err) = self.record(&mut applied, change) {
                self.rollback(&applied);
                self.pending_events.truncate(event_mark);
                return Err(err);
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Undo / redo
    // ------------------------------------------------------------------

    /// Revert the last committed operation
    pub fn undo(&mut self, history: &mut History) -> Result<()> {
        let change_set = history.undo()?;
        if let Err(err) = self.replay(&change_set.description, change_set.inverse_changes()) {
            tracing::warn!("Undo of '{}' failed: {err}", change_set.description);
            // Put the change set back on the undo stack
            history.redo()?;
            return Err(err);
        }
        Ok(())
    }

    /// Re-apply the last undone operation
    pub fn redo(&mut self, history: &mut History) -> Result<()> {
        let change_set = history.redo()?;
        if let Err(err) = self.replay(&change_set.description, change_set.changes.iter().cloned()) {
            tracing::warn!("Redo of '{}' failed: {err}", change_set.description);
            history.undo()?;
            return Err(err);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Tracks
    // ------------------------------------------------------------------

    /// Append a track and make it active. Returns the new track number.
    pub fn add_track(&mut self, log: &mut impl UndoLog) -> Result<u32> {
        let track = self.track_count;
        self.execute("Add track", log, |timeline, changes| {
            timeline.record(
                changes,
                Change::TrackCountChanged {
                    before: track,
                    after: track + 1,
                },
            )?;
            timeline.record_active_track(changes, track)?;
            Ok(track)
        })
    }

    /// Check if a track can be removed
    pub fn can_remove_track(&self, track: u32) -> bool {
        track < self.track_count
    }

    /// Remove a track and its segments, renumbering higher tracks down by one.
    ///
    /// An empty track is left behind when the last track is removed.
    pub fn remove_track(&mut self, track: u32, log: &mut impl UndoLog) -> Result<()> {
        if !self.can_remove_track(track) {
            return Err(TimelineError::InvalidRange(format!(
                "track {track} does not exist"
            )));
        }

        let removed: Vec<Segment> = self.segments.on_track(track).cloned().collect();
        let shifted: Vec<(SegmentId, SegmentBounds)> = self
            .segments
            .iter()
            .filter(|segment| segment.track() > track)
            .map(|segment| (segment.id(), segment.bounds()))
            .collect();

        self.execute("Remove track", log, |timeline, changes| {
            if removed.iter().any(|s| Some(s.id()) == timeline.selected) {
                timeline.record_selection(changes, None)?;
            }
            for segment in removed {
                timeline.record(changes, Change::SegmentRemoved(segment))?;
            }
            for (id, before) in shifted {
                let after = SegmentBounds {
                    track: before.track - 1,
                    ..before
                };
                timeline.record(changes, Change::SegmentMoved { id, before, after })?;
            }

            let before_count = timeline.track_count;
            let after_count = (before_count - 1).max(1);
            if after_count != before_count {
                timeline.record(
                    changes,
                    Change::TrackCountChanged {
                        before: before_count,
                        after: after_count,
                    },
                )?;
            }

            let active = timeline.active_track;
            let active = if active > track {
                active - 1
            } else {
                active.min(after_count - 1)
            };
            timeline.record_active_track(changes, active)
        })
    }

    // ------------------------------------------------------------------
    // Segments
    // ------------------------------------------------------------------

    /// Validate a destination range for a new or moved segment
    fn check_destination(
        &self,
        track: u32,
        start: FrameNumber,
        duration: FrameNumber,
        exclude: Option<SegmentId>,
    ) -> Result<SegmentBounds> {
        let end = segment_end(start, duration).ok_or_else(|| {
            TimelineError::InvalidRange(format!("no frames fit from {start} for duration {duration}"))
        })?;
        let bounds = SegmentBounds { track, start, end };
        self.check_placement(&bounds)?;

        if self.segments.overlaps(track, start, end, exclude) {
            return Err(TimelineError::Overlap { track, start, end });
        }
        Ok(bounds)
    }

    /// Check if a segment of `duration` frames fits at `(track, start)`
    pub fn can_add_segment(&self, track: u32, start: FrameNumber, duration: FrameNumber) -> bool {
        self.check_destination(track, start, duration, None).is_ok()
    }

    /// Add a segment with one key frame at its start frame
    pub fn add_segment(
        &mut self,
        track: u32,
        start: FrameNumber,
        duration: FrameNumber,
        payload: KeyFramePayload,
        name: Option<String>,
        log: &mut impl UndoLog,
    ) -> Result<SegmentId> {
        let bounds = self.check_destination(track, start, duration, None)?;
        let mut segment = Segment::new(track, start, bounds.end, vec![KeyFrame::new(start, payload)])?;
        if let Some(name) = name {
            segment = segment.with_name(name);
        }

        let id = segment.id();
        self.execute("Add segment", log, |timeline, changes| {
            timeline.record(changes, Change::SegmentInserted(segment))?;
            Ok(id)
        })
    }

    /// Check if a segment can be copied to `(track, start)`
    pub fn can_copy_segment(&self, id: SegmentId, track: u32, start: FrameNumber) -> bool {
        self.segments.get(id).is_some_and(|segment| {
            self.check_destination(track, start, segment.frame_duration(), None)
                .is_ok()
        })
    }

    /// Copy a segment with its key frames to `(track, start)`
    pub fn copy_segment(
        &mut self,
        id: SegmentId,
        track: u32,
        start: FrameNumber,
        log: &mut impl UndoLog,
    ) -> Result<SegmentId> {
        let source = self.segment_or_err(id)?;
        self.check_destination(track, start, source.frame_duration(), None)?;
        let copy = source.duplicate_to(track, start)?;

        let copy_id = copy.id();
        self.execute("Copy segment", log, |timeline, changes| {
            timeline.record(changes, Change::SegmentInserted(copy))?;
            Ok(copy_id)
        })
    }

    /// Remove a segment, clearing the selection if it was selected
    pub fn remove_segment(&mut self, id: SegmentId, log: &mut impl UndoLog) -> Result<()> {
        let segment = self.segment_or_err(id)?.clone();
        self.execute("Remove segment", log, |timeline, changes| {
            if timeline.selected == Some(id) {
                timeline.record_selection(changes, None)?;
            }
            timeline.record(changes, Change::SegmentRemoved(segment))
        })
    }

    /// Rename a segment
    pub fn rename_segment(
        &mut self,
        id: SegmentId,
        name: Option<String>,
        log: &mut impl UndoLog,
    ) -> Result<()> {
        let before = self.segment_or_err(id)?.name().map(str::to_owned);
        if before == name {
            return Ok(());
        }
        self.execute("Rename segment", log, |timeline, changes| {
            timeline.record(
                changes,
                Change::SegmentRenamed {
                    id,
                    before,
                    after: name,
                },
            )
        })
    }

    fn check_move(&self, id: SegmentId, track: u32, start: FrameNumber) -> Result<(SegmentBounds, SegmentBounds)> {
        let segment = self.segment_or_err(id)?;
        if segment.track() == track && segment.start() == start {
            return Err(precondition("segment is already at the destination"));
        }
        let after = self.check_destination(track, start, segment.frame_duration(), Some(id))?;
        Ok((segment.bounds(), after))
    }

    /// Check if a segment can be moved to `(track, start)`
    pub fn can_move_segment(&self, id: SegmentId, track: u32, start: FrameNumber) -> bool {
        self.check_move(id, track, start).is_ok()
    }

    /// Move a segment to another track and/or start frame.
    ///
    /// Key frames keep their offsets from the start frame. A selected segment
    /// that no longer covers the current frame on the active track is
    /// deselected.
    pub fn move_segment(
        &mut self,
        id: SegmentId,
        track: u32,
        start: FrameNumber,
        log: &mut impl UndoLog,
    ) -> Result<()> {
        let (before, after) = self.check_move(id, track, start)?;
        self.execute("Move segment", log, |timeline, changes| {
            timeline.record(changes, Change::SegmentMoved { id, before, after })?;

            let still_valid = after.track == timeline.active_track
                && after.start <= timeline.current_frame
                && timeline.current_frame <= after.end;
            if timeline.selected == Some(id) && !still_valid {
                timeline.record_selection(changes, None)?;
            }
            Ok(())
        })
    }

    fn check_start_frame(&self, id: SegmentId, new_start: FrameNumber) -> Result<&Segment> {
        let segment = self.segment_or_err(id)?;
        if new_start == segment.start() {
            return Err(precondition("start frame is unchanged"));
        }
        if new_start > segment.end() {
            return Err(TimelineError::InvalidRange(format!(
                "start frame {new_start} is after end frame {}",
                segment.end()
            )));
        }
        if let Some(previous) = self.segments.previous_on_track(id) {
            if previous.end() >= new_start {
                return Err(TimelineError::Overlap {
                    track: segment.track(),
                    start: new_start,
                    end: segment.end(),
                });
            }
        }
        Ok(segment)
    }

    /// Check if a segment's start frame can change to `new_start`
    pub fn can_change_start_frame(&self, id: SegmentId, new_start: FrameNumber) -> bool {
        self.check_start_frame(id, new_start).is_ok()
    }

    /// Move a segment's start frame.
    ///
    /// Growing moves a lone key frame to the new start.
    /// Shrinking cuts key frames before the new start; a key frame is
    /// interpolated at the new start unless one already sits there or none
    /// precede it.
    pub fn change_start_frame(
        &mut self,
        id: SegmentId,
        new_start: FrameNumber,
        log: &mut impl UndoLog,
    ) -> Result<()> {
        let segment = self.check_start_frame(id, new_start)?.clone();
        let before = segment.bounds();
        let after = SegmentBounds {
            start: new_start,
            ..before
        };

        self.execute("Change segment start frame", log, |timeline, changes| {
            let key_frames = segment.key_frames().as_slice();

            if new_start < before.start {
                timeline.record(changes, Change::SegmentResized { id, before, after })?;
                if let [only] = key_frames {
                    timeline.record_renumber(changes, id, only, new_start)?;
                }
                return Ok(());
            }

            let cut = match segment.key_frames().binary_search(new_start) {
                Ok(index) => index,
                Err(index) => {
                    if index > 0 {
                        let boundary = segment.sample_key_frame(new_start)?;
                        timeline.record(
                            changes,
                            Change::KeyFrameInserted {
                                segment: id,
                                key_frame: boundary,
                            },
                        )?;
                    }
                    index
                }
            };
            for key_frame in &key_frames[..cut] {
                timeline.record(
                    changes,
                    Change::KeyFrameRemoved {
                        segment: id,
                        key_frame: key_frame.clone(),
                    },
                )?;
            }
            timeline.record(changes, Change::SegmentResized { id, before, after })
        })
    }

    fn check_end_frame(&self, id: SegmentId, new_end: FrameNumber) -> Result<&Segment> {
        let segment = self.segment_or_err(id)?;
        if new_end == segment.end() {
            return Err(precondition("end frame is unchanged"));
        }
        if new_end < segment.start() {
            return Err(TimelineError::InvalidRange(format!(
                "end frame {new_end} is before start frame {}",
                segment.start()
            )));
        }
        if new_end >= self.frame_count {
            return Err(TimelineError::InvalidRange(format!(
                "end frame {new_end} is past the last video frame"
            )));
        }
        if let Some(next) = self.segments.next_on_track(id) {
            if next.start() <= new_end {
                return Err(TimelineError::Overlap {
                    track: segment.track(),
                    start: segment.start(),
                    end: new_end,
                });
            }
        }
        Ok(segment)
    }

    /// Check if a segment's end frame can change to `new_end`
    pub fn can_change_end_frame(&self, id: SegmentId, new_end: FrameNumber) -> bool {
        self.check_end_frame(id, new_end).is_ok()
    }

    /// Move a segment's end frame.
    ///
    /// Growing moves a lone key frame to the new end.
    /// Shrinking cuts key frames after the new end; if none would remain, one
    /// is sampled at the new end.
    pub fn change_end_frame(
        &mut self,
        id: SegmentId,
        new_end: FrameNumber,
        log: &mut impl UndoLog,
    ) -> Result<()> {
        let segment = self.check_end_frame(id, new_end)?.clone();
        let before = segment.bounds();
        let after = SegmentBounds {
            end: new_end,
            ..before
        };

        self.execute("Change segment end frame", log, |timeline, changes| {
            let key_frames = segment.key_frames().as_slice();

            if new_end > before.end {
                timeline.record(changes, Change::SegmentResized { id, before, after })?;
                if let [only] = key_frames {
                    timeline.record_renumber(changes, id, only, new_end)?;
                }
                return Ok(());
            }

            let keep = match segment.key_frames().binary_search(new_end) {
                Ok(index) => index + 1,
                Err(index) => index,
            };
            if keep == 0 {
                let boundary = segment.sample_key_frame(new_end)?;
                timeline.record(
                    changes,
                    Change::KeyFrameInserted {
                        segment: id,
                        key_frame: boundary,
                    },
                )?;
            }
            for key_frame in key_frames[keep..].iter().rev() {
                timeline.record(
                    changes,
                    Change::KeyFrameRemoved {
                        segment: id,
                        key_frame: key_frame.clone(),
                    },
                )?;
            }
            timeline.record(changes, Change::SegmentResized { id, before, after })
        })
    }

    fn check_split(&self, id: SegmentId, frame: FrameNumber) -> Result<&Segment> {
        let segment = self.segment_or_err(id)?;
        if frame <= segment.start() || frame > segment.end() {
            return Err(TimelineError::InvalidRange(format!(
                "split frame {frame} must lie in {}..={} after the start frame",
                segment.start(),
                segment.end()
            )));
        }
        Ok(segment)
    }

    /// Check if a segment can be split at `frame`
    pub fn can_split_segment(&self, id: SegmentId, frame: FrameNumber) -> bool {
        self.check_split(id, frame).is_ok()
    }

    /// Check if the selected segment can be split at `frame`
    pub fn can_split_selected_segment(&self, frame: FrameNumber) -> bool {
        self.selected
            .is_some_and(|id| self.can_split_segment(id, frame))
    }

    /// Split a segment in two at `frame` and select the right-hand part.
    ///
    /// The original segment keeps `[start, frame - 1]` and the key frames
    /// before `frame`. The new segment covers `[frame, end]` with the rest.
    /// Both halves end up with a key frame at their start if they would
    /// otherwise have none there. Returns the new segment's id.
    pub fn split_segment(
        &mut self,
        id: SegmentId,
        frame: FrameNumber,
        log: &mut impl UndoLog,
    ) -> Result<SegmentId> {
        let segment = self.check_split(id, frame)?.clone();
        let key_frames = segment.key_frames();
        let split_index = key_frames.lower_bound_index(frame);

        let mut right_key_frames = key_frames.as_slice()[split_index..].to_vec();
        if !key_frames.contains(frame) {
            right_key_frames.insert(0, segment.sample_key_frame(frame)?);
        }
        let left_fill = if split_index == 0 {
            Some(segment.sample_key_frame(segment.start())?)
        } else {
            None
        };

        let before = segment.bounds();
        let mut right = Segment::new(before.track, frame, before.end, right_key_frames)?;
        if let Some(name) = segment.name() {
            right = right.with_name(name);
        }
        let right_id = right.id();

        self.execute("Split segment", log, |timeline, changes| {
            if let Some(key_frame) = left_fill {
                timeline.record(changes, Change::KeyFrameInserted { segment: id, key_frame })?;
            }
            for key_frame in key_frames.as_slice()[split_index..].iter().rev() {
                timeline.record(
                    changes,
                    Change::KeyFrameRemoved {
                        segment: id,
                        key_frame: key_frame.clone(),
                    },
                )?;
            }
            let after = SegmentBounds {
                end: frame - 1,
                ..before
            };
            timeline.record(changes, Change::SegmentResized { id, before, after })?;
            timeline.record(changes, Change::SegmentInserted(right))?;
            timeline.record_selection(changes, Some(right_id))?;
            Ok(right_id)
        })
    }

    /// Split the selected segment at `frame`
    pub fn split_selected_segment(
        &mut self,
        frame: FrameNumber,
        log: &mut impl UndoLog,
    ) -> Result<SegmentId> {
        let id = self
            .selected
            .ok_or_else(|| precondition("no segment is selected"))?;
        self.split_segment(id, frame, log)
    }

    fn check_merge_left(&self, id: SegmentId) -> Result<(&Segment, &Segment)> {
        let right = self.segment_or_err(id)?;
        let left = self
            .segments
            .previous_on_track(id)
            .ok_or_else(|| precondition("no segment to the left on the same track"))?;
        if left.end().checked_add(1) != Some(right.start()) {
            return Err(precondition("segments are not adjacent"));
        }
        if left.kind() != right.kind() {
            return Err(precondition("segments hold different payload kinds"));
        }
        Ok((left, right))
    }

    /// Check if a segment can be merged into its left neighbour
    pub fn can_merge_left(&self, id: SegmentId) -> bool {
        self.check_merge_left(id).is_ok()
    }

    /// Merge a segment into the adjacent segment on its left.
    ///
    /// The left segment survives, extended to the right segment's end and
    /// holding both sets of key frames. Returns the surviving segment's id.
    pub fn merge_left(&mut self, id: SegmentId, log: &mut impl UndoLog) -> Result<SegmentId> {
        let (left, right) = self.check_merge_left(id)?;
        let (left, right) = (left.clone(), right.clone());
        let left_id = left.id();

        self.execute("Merge segments", log, |timeline, changes| {
            if timeline.selected == Some(right.id()) {
                timeline.record_selection(changes, Some(left_id))?;
            }

            let key_frames = right.key_frames().as_slice().to_vec();
            let before = left.bounds();
            let after = SegmentBounds {
                end: right.end(),
                ..before
            };
            timeline.record(changes, Change::SegmentRemoved(right))?;
            timeline.record(
                changes,
                Change::SegmentResized {
                    id: left_id,
                    before,
                    after,
                },
            )?;
            for key_frame in key_frames {
                timeline.record(
                    changes,
                    Change::KeyFrameInserted {
                        segment: left_id,
                        key_frame,
                    },
                )?;
            }
            Ok(left_id)
        })
    }

    /// Check if a segment can absorb its right neighbour
    pub fn can_merge_right(&self, id: SegmentId) -> bool {
        self.segments
            .next_on_track(id)
            .is_some_and(|next| self.can_merge_left(next.id()))
    }

    /// Merge the adjacent segment on the right into this one
    pub fn merge_right(&mut self, id: SegmentId, log: &mut impl UndoLog) -> Result<SegmentId> {
        let next = self
            .segments
            .next_on_track(id)
            .map(Segment::id)
            .ok_or_else(|| precondition("no segment to the right on the same track"))?;
        self.merge_left(next, log)
    }

    // ------------------------------------------------------------------
    // Key frames
    // ------------------------------------------------------------------

    fn check_add_key_frame(&self, id: SegmentId, frame: FrameNumber) -> Result<&Segment> {
        let segment = self.segment_or_err(id)?;
        if !segment.contains_frame(frame) {
            return Err(TimelineError::InvalidRange(format!(
                "frame {frame} lies outside {}..={}",
                segment.start(),
                segment.end()
            )));
        }
        if segment.key_frames().contains(frame) {
            return Err(TimelineError::DuplicateKey(frame));
        }
        Ok(segment)
    }

    /// Check if a key frame can be added at `frame`
    pub fn can_add_key_frame(&self, id: SegmentId, frame: FrameNumber) -> bool {
        self.check_add_key_frame(id, frame).is_ok()
    }

    /// Add a key frame holding the interpolated payload at `frame`
    pub fn add_key_frame(
        &mut self,
        id: SegmentId,
        frame: FrameNumber,
        log: &mut impl UndoLog,
    ) -> Result<()> {
        let key_frame = self.check_add_key_frame(id, frame)?.sample_key_frame(frame)?;
        self.execute("Add key frame", log, |timeline, changes| {
            timeline.record(changes, Change::KeyFrameInserted { segment: id, key_frame })
        })
    }

    fn check_remove_key_frame(&self, id: SegmentId, frame: FrameNumber) -> Result<&KeyFrame> {
        let key_frames = self.segment_or_err(id)?.key_frames();
        let key_frame = key_frames
            .find(frame)
            .ok_or(TimelineError::KeyFrameNotFound(frame))?;
        if key_frames.len() == 1 {
            return Err(precondition("a segment keeps at least one key frame"));
        }
        Ok(key_frame)
    }

    /// Check if the key frame at `frame` can be removed
    pub fn can_remove_key_frame(&self, id: SegmentId, frame: FrameNumber) -> bool {
        self.check_remove_key_frame(id, frame).is_ok()
    }

    /// Remove the key frame at `frame`
    pub fn remove_key_frame(
        &mut self,
        id: SegmentId,
        frame: FrameNumber,
        log: &mut impl UndoLog,
    ) -> Result<()> {
        let key_frame = self.check_remove_key_frame(id, frame)?.clone();
        self.execute("Remove key frame", log, |timeline, changes| {
            timeline.record(changes, Change::KeyFrameRemoved { segment: id, key_frame })
        })
    }

    /// Replace the payload of the key frame at `frame`
    pub fn set_key_frame_payload(
        &mut self,
        id: SegmentId,
        frame: FrameNumber,
        payload: KeyFramePayload,
        log: &mut impl UndoLog,
    ) -> Result<()> {
        self.replace_payload("Edit key frame", id, frame, payload, log)
    }

    fn replace_payload(
        &mut self,
        description: &str,
        id: SegmentId,
        frame: FrameNumber,
        payload: KeyFramePayload,
        log: &mut impl UndoLog,
    ) -> Result<()> {
        let segment = self.segment_or_err(id)?;
        segment.check_kind(&payload)?;
        let before = segment
            .key_frames()
            .find(frame)
            .cloned()
            .ok_or(TimelineError::KeyFrameNotFound(frame))?;
        if before.payload == payload {
            return Ok(());
        }

        let after = KeyFrame::new(frame, payload);
        self.execute(description, log, |timeline, changes| {
            timeline.record(
                changes,
                Change::KeyFrameReplaced {
                    segment: id,
                    before,
                    after,
                },
            )
        })
    }

    /// Check if the key frame at `frame` has a previous key frame to copy from
    pub fn can_copy_from_previous_key_frame(&self, id: SegmentId, frame: FrameNumber) -> bool {
        self.segments.get(id).is_some_and(|segment| {
            segment.key_frames().contains(frame) && segment.key_frames().previous(frame).is_some()
        })
    }

    /// Overwrite the key frame at `frame` with the previous key frame's payload
    pub fn copy_from_previous_key_frame(
        &mut self,
        id: SegmentId,
        frame: FrameNumber,
        log: &mut impl UndoLog,
    ) -> Result<()> {
        let payload = self
            .segment_or_err(id)?
            .key_frames()
            .previous(frame)
            .map(|kf| kf.payload.clone())
            .ok_or_else(|| precondition("no previous key frame"))?;
        self.replace_payload("Copy from previous key frame", id, frame, payload, log)
    }

    /// Check if the key frame at `frame` has a next key frame to copy from
    pub fn can_copy_from_next_key_frame(&self, id: SegmentId, frame: FrameNumber) -> bool {
        self.segments.get(id).is_some_and(|segment| {
            segment.key_frames().contains(frame) && segment.key_frames().next(frame).is_some()
        })
    }

    /// Overwrite the key frame at `frame` with the next key frame's payload
    pub fn copy_from_next_key_frame(
        &mut self,
        id: SegmentId,
        frame: FrameNumber,
        log: &mut impl UndoLog,
    ) -> Result<()> {
        let payload = self
            .segment_or_err(id)?
            .key_frames()
            .next(frame)
            .map(|kf| kf.payload.clone())
            .ok_or_else(|| precondition("no next key frame"))?;
        self.replace_payload("Copy from next key frame", id, frame, payload, log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyframe::{EllipseData, Point, PolygonData, RectangleData};
    use proptest::prelude::*;

    fn rect(left: f64) -> KeyFramePayload {
        KeyFramePayload::Rectangle(RectangleData {
            left,
            top: 0.0,
            width: 100.0,
            height: 100.0,
        })
    }

    fn left_of(payload: &KeyFramePayload) -> f64 {
        match payload {
            KeyFramePayload::Rectangle(data) => data.left,
            other => panic!("unexpected payload {other:?}"),
        }
    }

    fn segment(track: u32, start: FrameNumber, end: FrameNumber, key_frames: &[FrameNumber]) -> Segment {
        Segment::new(
            track,
            start,
            end,
            key_frames
                .iter()
                .map(|&frame| KeyFrame::new(frame, rect(f64::from(frame))))
                .collect(),
        )
        .unwrap()
    }

    /// Three tracks:
    /// - 0: a `[0,22]` {0,10,22}, b `[40,60]` {40}
    /// - 1: c `[0,30]` {0}, d `[31,50]` {31,45}
    /// - 2: e `[10,20]` {20}
    struct Fixture {
        timeline: Timeline,
        history: History,
        a: SegmentId,
        b: SegmentId,
        c: SegmentId,
        d: SegmentId,
        e: SegmentId,
    }

    fn fixture() -> Fixture {
        let segments = vec![
            segment(0, 0, 22, &[0, 10, 22]).with_name("Crop A"),
            segment(0, 40, 60, &[40]),
            segment(1, 0, 30, &[0]),
            segment(1, 31, 50, &[31, 45]),
            segment(2, 10, 20, &[20]),
        ];
        let ids: Vec<SegmentId> = segments.iter().map(Segment::id).collect();
        let collection = SegmentCollection::try_from(segments).unwrap();

        Fixture {
            timeline: Timeline::from_segments(collection, 3, 200).unwrap(),
            history: History::new(),
            a: ids[0],
            b: ids[1],
            c: ids[2],
            d: ids[3],
            e: ids[4],
        }
    }

    fn frames(timeline: &Timeline, id: SegmentId) -> Vec<FrameNumber> {
        timeline.segment(id).unwrap().key_frames().frames().collect()
    }

    fn bounds(timeline: &Timeline, id: SegmentId) -> (u32, FrameNumber, FrameNumber) {
        let b = timeline.segment(id).unwrap().bounds();
        (b.track, b.start, b.end)
    }

    #[test]
    fn test_from_segments_grows_track_count() {
        let collection = SegmentCollection::try_from(vec![segment(4, 0, 5, &[0])]).unwrap();
        let timeline = Timeline::from_segments(collection, 1, 10).unwrap();
        assert_eq!(timeline.track_count(), 5);

        let collection = SegmentCollection::try_from(vec![segment(0, 0, 10, &[0])]).unwrap();
        assert!(Timeline::from_segments(collection, 1, 10).is_err());
    }

    #[test]
    fn test_split_with_lerp_at_split_point() {
        let Fixture { mut timeline, mut history, a, .. } = fixture();
        timeline.select_segment(Some(a)).unwrap();
        let original = timeline.segments().clone();

        assert!(timeline.can_split_selected_segment(5));
        let right = timeline.split_selected_segment(5, &mut history).unwrap();

        assert_eq!(bounds(&timeline, a), (0, 0, 4));
        assert_eq!(bounds(&timeline, right), (0, 5, 22));
        assert_eq!(frames(&timeline, a), vec![0]);
        assert_eq!(frames(&timeline, right), vec![5, 10, 22]);
        assert_eq!(timeline.segment(right).unwrap().name(), Some("Crop A"));
        let synthesized = timeline.segment(right).unwrap().key_frames().first().unwrap();
        assert_eq!(left_of(&synthesized.payload), 5.0);
        assert_eq!(timeline.selected_segment_id(), Some(right));

        timeline.undo(&mut history).unwrap();
        assert_eq!(timeline.segments(), &original);
        assert_eq!(timeline.selected_segment_id(), Some(a));
        assert!(timeline.segment(right).is_none());

        timeline.redo(&mut history).unwrap();
        assert_eq!(frames(&timeline, right), vec![5, 10, 22]);
        assert_eq!(timeline.selected_segment_id(), Some(right));
    }

    #[test]
    fn test_split_on_existing_key_frame() {
        let Fixture { mut timeline, mut history, a, .. } = fixture();
        let right = timeline.split_segment(a, 10, &mut history).unwrap();

        assert_eq!(frames(&timeline, a), vec![0]);
        assert_eq!(frames(&timeline, right), vec![10, 22]);
    }

    #[test]
    fn test_split_single_key_frame_segment() {
        let Fixture { mut timeline, mut history, b, .. } = fixture();
        let right = timeline.split_segment(b, 45, &mut history).unwrap();

        assert_eq!(frames(&timeline, b), vec![40]);
        assert_eq!(frames(&timeline, right), vec![45]);
        assert_eq!(bounds(&timeline, right), (0, 45, 60));
    }

    #[test]
    fn test_split_fills_empty_left_half() {
        let Fixture { mut timeline, mut history, e, .. } = fixture();
        let original = timeline.segment(e).unwrap().clone();
        let right = timeline.split_segment(e, 15, &mut history).unwrap();

        assert_eq!(frames(&timeline, e), vec![10]);
        assert_eq!(frames(&timeline, right), vec![15, 20]);

        timeline.undo(&mut history).unwrap();
        assert_eq!(timeline.segment(e), Some(&original));
    }

    #[test]
    fn test_split_preconditions() {
        let Fixture { timeline, a, .. } = fixture();
        assert!(!timeline.can_split_segment(a, 0));
        assert!(timeline.can_split_segment(a, 22));
        assert!(!timeline.can_split_segment(a, 23));
        assert!(!timeline.can_split_segment(SegmentId::new(), 5));
        assert!(!timeline.can_split_selected_segment(5));
    }

    #[test]
    fn test_merge_left_and_undo() {
        let Fixture { mut timeline, mut history, c, d, .. } = fixture();
        timeline.select_segment(Some(d)).unwrap();
        let original = timeline.segments().clone();

        assert!(timeline.can_merge_left(d));
        assert!(timeline.can_merge_right(c));
        let survivor = timeline.merge_left(d, &mut history).unwrap();

        assert_eq!(survivor, c);
        assert!(timeline.segment(d).is_none());
        assert_eq!(bounds(&timeline, c), (1, 0, 50));
        assert_eq!(frames(&timeline, c), vec![0, 31, 45]);
        assert_eq!(timeline.selected_segment_id(), Some(c));

        timeline.undo(&mut history).unwrap();
        assert_eq!(timeline.segments(), &original);
        assert_eq!(timeline.selected_segment_id(), Some(d));
    }

    #[test]
    fn test_merge_right() {
        let Fixture { mut timeline, mut history, c, d, .. } = fixture();
        timeline.merge_right(c, &mut history).unwrap();
        assert!(timeline.segment(d).is_none());
        assert_eq!(bounds(&timeline, c), (1, 0, 50));
    }

    #[test]
    fn test_merge_requires_adjacency() {
        let Fixture { mut timeline, mut history, a, b, c, e, .. } = fixture();
        assert!(!timeline.can_merge_left(b));
        assert!(!timeline.can_merge_left(a));
        assert!(!timeline.can_merge_left(c));
        assert!(!timeline.can_merge_right(e));
        assert!(matches!(
            timeline.merge_left(b, &mut history),
            Err(TimelineError::PreconditionNotMet(_))
        ));
        assert!(!history.can_undo());
    }

    #[test]
    fn test_move_translates_key_frames() {
        let Fixture { mut timeline, mut history, b, .. } = fixture();
        let original = timeline.segments().clone();

        assert!(timeline.can_move_segment(b, 2, 100));
        timeline.move_segment(b, 2, 100, &mut history).unwrap();
        assert_eq!(bounds(&timeline, b), (2, 100, 120));
        assert_eq!(frames(&timeline, b), vec![100]);

        timeline.undo(&mut history).unwrap();
        assert_eq!(timeline.segments(), &original);
    }

    #[test]
    fn test_move_preconditions() {
        let Fixture { mut timeline, mut history, a, b, d, .. } = fixture();
        // Same place
        assert!(!timeline.can_move_segment(b, 0, 40));
        // Overlaps a on track 0 but not itself
        assert!(!timeline.can_move_segment(b, 0, 10));
        assert!(timeline.can_move_segment(b, 0, 30));
        // Past the end of the video
        assert!(!timeline.can_move_segment(b, 0, 190));
        // Unknown track
        assert!(!timeline.can_move_segment(b, 3, 100));
        assert!(!timeline.can_move_segment(d, 0, 20));

        let before = timeline.segments().clone();
        assert!(matches!(
            timeline.move_segment(a, 1, 20, &mut history),
            Err(TimelineError::Overlap { track: 1, .. })
        ));
        assert_eq!(timeline.segments(), &before);
    }

    #[test]
    fn test_move_clears_selection_when_leaving_current_frame() {
        let Fixture { mut timeline, mut history, a, .. } = fixture();
        timeline.select_segment(Some(a)).unwrap();
        timeline.seek(0);
        assert_eq!(timeline.selected_segment_id(), Some(a));

        timeline.move_segment(a, 1, 60, &mut history).unwrap();
        assert_eq!(timeline.selected_segment_id(), None);

        timeline.undo(&mut history).unwrap();
        assert_eq!(timeline.selected_segment_id(), Some(a));
        assert_eq!(bounds(&timeline, a), (0, 0, 22));
    }

    #[test]
    fn test_move_keeps_selection_when_still_current() {
        let Fixture { mut timeline, mut history, a, .. } = fixture();
        timeline.select_segment(Some(a)).unwrap();
        timeline.seek(12);

        timeline.move_segment(a, 0, 5, &mut history).unwrap();
        assert_eq!(timeline.selected_segment_id(), Some(a));
    }

    #[test]
    fn test_change_start_frame_cut_and_lerp() {
        let Fixture { mut timeline, mut history, a, .. } = fixture();

        timeline.change_start_frame(a, 10, &mut history).unwrap();
        assert_eq!(frames(&timeline, a), vec![10, 22]);
        assert_eq!(bounds(&timeline, a), (0, 10, 22));
        timeline.undo(&mut history).unwrap();
        assert_eq!(frames(&timeline, a), vec![0, 10, 22]);

        timeline.change_start_frame(a, 5, &mut history).unwrap();
        assert_eq!(frames(&timeline, a), vec![5, 10, 22]);
        let first = timeline.segment(a).unwrap().key_frames().first().unwrap();
        assert_eq!(left_of(&first.payload), 5.0);
        timeline.undo(&mut history).unwrap();
        assert_eq!(frames(&timeline, a), vec![0, 10, 22]);
        assert_eq!(bounds(&timeline, a), (0, 0, 22));
    }

    #[test]
    fn test_change_start_frame_single_key_frame_follows() {
        let Fixture { mut timeline, mut history, b, .. } = fixture();

        timeline.change_start_frame(b, 45, &mut history).unwrap();
        assert_eq!(frames(&timeline, b), vec![45]);

        timeline.change_start_frame(b, 35, &mut history).unwrap();
        assert_eq!(frames(&timeline, b), vec![35]);
        assert_eq!(bounds(&timeline, b), (0, 35, 60));

        timeline.undo(&mut history).unwrap();
        timeline.undo(&mut history).unwrap();
        assert_eq!(frames(&timeline, b), vec![40]);
        assert_eq!(bounds(&timeline, b), (0, 40, 60));
    }

    #[test]
    fn test_change_start_frame_boundaries() {
        let Fixture { mut timeline, mut history, d, b, .. } = fixture();
        assert!(!timeline.can_change_start_frame(d, 30));

        timeline.change_start_frame(b, 23, &mut history).unwrap();
        assert_eq!(frames(&timeline, b), vec![23]);
        assert!(!timeline.can_change_start_frame(b, 22));
        assert!(!timeline.can_change_start_frame(b, 61));

        timeline.change_end_frame(d, 40, &mut history).unwrap();
        assert_eq!(frames(&timeline, d), vec![31]);
    }

    #[test]
    fn test_change_end_frame_cut() {
        let Fixture { mut timeline, mut history, a, .. } = fixture();

        timeline.change_end_frame(a, 15, &mut history).unwrap();
        assert_eq!(frames(&timeline, a), vec![0, 10]);
        assert_eq!(bounds(&timeline, a), (0, 0, 15));

        timeline.undo(&mut history).unwrap();
        assert_eq!(frames(&timeline, a), vec![0, 10, 22]);
        assert_eq!(bounds(&timeline, a), (0, 0, 22));
    }

    #[test]
    fn test_change_end_frame_grow() {
        let Fixture { mut timeline, mut history, a, b, e, .. } = fixture();

        timeline.change_end_frame(a, 30, &mut history).unwrap();
        assert_eq!(frames(&timeline, a), vec![0, 10, 22]);

        // A lone key frame follows the end wherever it sat
        timeline.change_end_frame(b, 80, &mut history).unwrap();
        assert_eq!(frames(&timeline, b), vec![80]);
        let kf = timeline.segment(b).unwrap().key_frames().first().unwrap();
        assert_eq!(left_of(&kf.payload), 40.0);

        timeline.change_end_frame(e, 25, &mut history).unwrap();
        assert_eq!(frames(&timeline, e), vec![25]);

        timeline.undo(&mut history).unwrap();
        timeline.undo(&mut history).unwrap();
        assert_eq!(frames(&timeline, b), vec![40]);
        assert_eq!(bounds(&timeline, b), (0, 40, 60));
        assert_eq!(frames(&timeline, e), vec![20]);
    }

    #[test]
    fn test_change_start_frame_grow_moves_lone_key_frame() {
        let Fixture { mut timeline, mut history, e, .. } = fixture();

        timeline.change_start_frame(e, 5, &mut history).unwrap();
        assert_eq!(bounds(&timeline, e), (2, 5, 20));
        assert_eq!(frames(&timeline, e), vec![5]);
        let kf = timeline.segment(e).unwrap().key_frames().first().unwrap();
        assert_eq!(left_of(&kf.payload), 20.0);

        timeline.undo(&mut history).unwrap();
        assert_eq!(bounds(&timeline, e), (2, 10, 20));
        assert_eq!(frames(&timeline, e), vec![20]);
    }

    #[test]
    fn test_change_end_frame_synthesizes_when_emptied() {
        let Fixture { mut timeline, mut history, e, .. } = fixture();

        timeline.change_end_frame(e, 15, &mut history).unwrap();
        assert_eq!(frames(&timeline, e), vec![15]);
        let kf = timeline.segment(e).unwrap().key_frames().first().unwrap();
        assert_eq!(left_of(&kf.payload), 20.0);

        timeline.undo(&mut history).unwrap();
        assert_eq!(frames(&timeline, e), vec![20]);
    }

    #[test]
    fn test_change_end_frame_preconditions() {
        let Fixture { timeline, a, c, e, .. } = fixture();
        assert!(!timeline.can_change_end_frame(c, 31));
        assert!(timeline.can_change_end_frame(a, 39));
        assert!(!timeline.can_change_end_frame(a, 40));
        assert!(!timeline.can_change_end_frame(e, 9));
        assert!(timeline.can_change_end_frame(e, 10));
        assert!(!timeline.can_change_end_frame(e, 200));
        assert!(!timeline.can_change_end_frame(e, 20));
    }

    #[test]
    fn test_merge_rejects_mixed_kinds() {
        let ellipse = Segment::new(
            0,
            10,
            20,
            vec![KeyFrame::new(10, KeyFramePayload::Ellipse(EllipseData::default()))],
        )
        .unwrap();
        let ellipse_id = ellipse.id();
        let rectangle = segment(0, 0, 9, &[0]);
        let rectangle_id = rectangle.id();
        let collection = SegmentCollection::try_from(vec![rectangle, ellipse]).unwrap();
        let mut timeline = Timeline::from_segments(collection, 1, 100).unwrap();
        let mut history = History::new();
        let original = timeline.segments().clone();

        assert!(!timeline.can_merge_left(ellipse_id));
        assert!(!timeline.can_merge_right(rectangle_id));
        assert!(matches!(
            timeline.merge_left(ellipse_id, &mut history),
            Err(TimelineError::PreconditionNotMet(_))
        ));
        assert!(timeline.merge_right(rectangle_id, &mut history).is_err());
        assert_eq!(timeline.segments(), &original);
        assert!(!history.can_undo());
    }

    #[test]
    fn test_remove_track_renumbers_and_undo_restores() {
        let Fixture { mut timeline, mut history, a, b, c, d, e } = fixture();
        timeline.set_active_track(2).unwrap();
        let original = timeline.segments().clone();

        timeline.remove_track(0, &mut history).unwrap();
        assert_eq!(timeline.track_count(), 2);
        assert!(timeline.segment(a).is_none());
        assert!(timeline.segment(b).is_none());
        assert_eq!(bounds(&timeline, c).0, 0);
        assert_eq!(bounds(&timeline, d).0, 0);
        assert_eq!(bounds(&timeline, e).0, 1);
        assert_eq!(timeline.active_track(), 1);

        timeline.undo(&mut history).unwrap();
        assert_eq!(timeline.segments(), &original);
        assert_eq!(timeline.track_count(), 3);
        assert_eq!(timeline.active_track(), 2);
    }

    #[test]
    fn test_remove_last_track_keeps_one() {
        let mut timeline = Timeline::new(100);
        let mut history = History::new();
        let id = timeline
            .add_segment(0, 0, 10, rect(0.0), None, &mut history)
            .unwrap();
        timeline.select_segment(Some(id)).unwrap();

        timeline.remove_track(0, &mut history).unwrap();
        assert_eq!(timeline.track_count(), 1);
        assert!(timeline.segments().is_empty());
        assert_eq!(timeline.selected_segment_id(), None);
        assert!(!timeline.can_remove_track(1));
    }

    #[test]
    fn test_add_track_and_segment() {
        let mut timeline = Timeline::new(100);
        let mut history = History::new();

        assert!(!timeline.can_add_segment(1, 0, 10));
        let track = timeline.add_track(&mut history).unwrap();
        assert_eq!(track, 1);
        assert_eq!(timeline.active_track(), 1);

        assert!(timeline.can_add_segment(1, 90, 10));
        assert!(!timeline.can_add_segment(1, 91, 10));
        assert!(!timeline.can_add_segment(1, 0, 0));

        let id = timeline
            .add_segment(1, 90, 10, rect(1.0), Some("Mask".into()), &mut history)
            .unwrap();
        assert_eq!(bounds(&timeline, id), (1, 90, 99));
        assert_eq!(frames(&timeline, id), vec![90]);
        assert!(matches!(
            timeline.add_segment(1, 95, 2, rect(1.0), None, &mut history),
            Err(TimelineError::Overlap { .. })
        ));

        timeline.undo(&mut history).unwrap();
        assert!(timeline.segment(id).is_none());
        timeline.undo(&mut history).unwrap();
        assert_eq!(timeline.track_count(), 1);
        assert_eq!(timeline.active_track(), 0);
    }

    #[test]
    fn test_copy_rename_remove_segment() {
        let Fixture { mut timeline, mut history, a, .. } = fixture();

        assert!(!timeline.can_copy_segment(a, 0, 30));
        let copy = timeline.copy_segment(a, 2, 100, &mut history).unwrap();
        assert_eq!(bounds(&timeline, copy), (2, 100, 122));
        assert_eq!(frames(&timeline, copy), vec![100, 110, 122]);

        timeline
            .rename_segment(copy, Some("Copy".into()), &mut history)
            .unwrap();
        assert_eq!(timeline.segment(copy).unwrap().name(), Some("Copy"));

        timeline.select_segment(Some(a)).unwrap();
        timeline.remove_segment(a, &mut history).unwrap();
        assert!(timeline.segment(a).is_none());
        assert_eq!(timeline.selected_segment_id(), None);

        timeline.undo(&mut history).unwrap();
        assert_eq!(timeline.selected_segment_id(), Some(a));
        assert_eq!(frames(&timeline, a), vec![0, 10, 22]);

        timeline.undo(&mut history).unwrap();
        assert_eq!(timeline.segment(copy).unwrap().name(), Some("Crop A"));
    }

    #[test]
    fn test_key_frame_editing() {
        let Fixture { mut timeline, mut history, a, .. } = fixture();

        assert!(!timeline.can_add_key_frame(a, 10));
        assert!(!timeline.can_add_key_frame(a, 23));
        timeline.add_key_frame(a, 5, &mut history).unwrap();
        assert_eq!(frames(&timeline, a), vec![0, 5, 10, 22]);
        let added = timeline.segment(a).unwrap().key_frames().find(5).unwrap();
        assert_eq!(left_of(&added.payload), 5.0);

        timeline.copy_from_next_key_frame(a, 5, &mut history).unwrap();
        let copied = timeline.segment(a).unwrap().key_frames().find(5).unwrap();
        assert_eq!(left_of(&copied.payload), 10.0);

        timeline.copy_from_previous_key_frame(a, 5, &mut history).unwrap();
        let copied = timeline.segment(a).unwrap().key_frames().find(5).unwrap();
        assert_eq!(left_of(&copied.payload), 0.0);
        assert!(!timeline.can_copy_from_previous_key_frame(a, 0));
        assert!(!timeline.can_copy_from_next_key_frame(a, 22));

        timeline.remove_key_frame(a, 5, &mut history).unwrap();
        assert_eq!(frames(&timeline, a), vec![0, 10, 22]);

        for _ in 0..4 {
            timeline.undo(&mut history).unwrap();
        }
        assert_eq!(frames(&timeline, a), vec![0, 10, 22]);
        assert!(!history.can_undo());
    }

    #[test]
    fn test_last_key_frame_not_removable() {
        let Fixture { mut timeline, mut history, b, .. } = fixture();
        assert!(!timeline.can_remove_key_frame(b, 40));
        assert!(timeline.remove_key_frame(b, 40, &mut history).is_err());
        assert!(!timeline.can_remove_key_frame(b, 41));
    }

    #[test]
    fn test_set_payload_rejects_wrong_kind() {
        let Fixture { mut timeline, mut history, a, .. } = fixture();
        let polygon = KeyFramePayload::Polygon(PolygonData::default());
        assert!(matches!(
            timeline.set_key_frame_payload(a, 0, polygon, &mut history),
            Err(TimelineError::PayloadMismatch { .. })
        ));
        assert!(!history.can_undo());

        timeline
            .set_key_frame_payload(a, 0, rect(7.0), &mut history)
            .unwrap();
        let kf = timeline.segment(a).unwrap().key_frames().find(0).unwrap();
        assert_eq!(left_of(&kf.payload), 7.0);
    }

    #[test]
    fn test_failed_interpolation_leaves_timeline_unchanged() {
        let mut timeline = Timeline::new(100);
        let mut history = History::new();
        let triangle = KeyFramePayload::Polygon(PolygonData {
            points: vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(0.0, 1.0)],
        });
        let id = timeline
            .add_segment(0, 0, 20, triangle, None, &mut history)
            .unwrap();

        // Insert a key frame with a different point count at frame 10
        let square = KeyFramePayload::Polygon(PolygonData {
            points: vec![Point::new(0.0, 0.0); 4],
        });
        timeline.add_key_frame(id, 10, &mut history).unwrap();
        timeline
            .set_key_frame_payload(id, 10, square, &mut history)
            .unwrap();

        let snapshot = timeline.segments().clone();
        let depth = history.undo_depth();
        timeline.take_events();
        assert!(matches!(
            timeline.split_segment(id, 5, &mut history),
            Err(TimelineError::PointCountMismatch(3, 4))
        ));
        assert!(matches!(
            timeline.change_start_frame(id, 5, &mut history),
            Err(TimelineError::PointCountMismatch(3, 4))
        ));
        assert_eq!(timeline.segments(), &snapshot);
        assert_eq!(history.undo_depth(), depth);
        assert!(timeline.take_events().is_empty());
    }

    #[test]
    fn test_seek_refreshes_selection() {
        let Fixture { mut timeline, a, b, .. } = fixture();

        timeline.seek(5);
        assert_eq!(timeline.selected_segment_id(), Some(a));
        timeline.seek(30);
        assert_eq!(timeline.selected_segment_id(), None);
        timeline.seek(45);
        assert_eq!(timeline.selected_segment_id(), Some(b));
        timeline.seek(1000);
        assert_eq!(timeline.current_frame(), 199);
    }

    #[test]
    fn test_active_segments_and_key_frame_seeking() {
        let Fixture { timeline, a, c, e, .. } = fixture();

        let active: Vec<_> = timeline.active_segments(15).iter().map(|s| s.id()).collect();
        assert_eq!(active, vec![a, c, e]);

        assert_eq!(timeline.seek_next_key_frame(0, 10), Some(22));
        assert_eq!(timeline.seek_next_key_frame(0, 22), Some(40));
        assert_eq!(timeline.seek_next_key_frame(0, 40), None);
        assert_eq!(timeline.seek_previous_key_frame(0, 40), Some(22));
        assert_eq!(timeline.seek_previous_key_frame(1, 45), Some(31));
        assert_eq!(timeline.seek_previous_key_frame(0, 0), None);
    }

    #[test]
    fn test_events_emitted() {
        let Fixture { mut timeline, mut history, a, .. } = fixture();
        timeline.take_events();

        timeline.change_end_frame(a, 15, &mut history).unwrap();
        let events = timeline.take_events();
        assert!(events.contains(&TimelineEvent::KeyFramesChanged(a)));
        assert!(events.contains(&TimelineEvent::SegmentChanged(a)));
        assert!(timeline.take_events().is_empty());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Move(usize, u32, FrameNumber),
        Start(usize, FrameNumber),
        End(usize, FrameNumber),
        Split(usize, FrameNumber),
        Merge(usize),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0usize..8, 0u32..3, 0u32..180).prop_map(|(i, t, s)| Op::Move(i, t, s)),
            (0usize..8, 0u32..200).prop_map(|(i, f)| Op::Start(i, f)),
            (0usize..8, 0u32..200).prop_map(|(i, f)| Op::End(i, f)),
            (0usize..8, 0u32..200).prop_map(|(i, f)| Op::Split(i, f)),
            (0usize..8).prop_map(Op::Merge),
        ]
    }

    proptest! {
        #[test]
        fn operations_keep_invariants_and_undo_restores(ops in proptest::collection::vec(op_strategy(), 1..25)) {
            let Fixture { mut timeline, mut history, .. } = fixture();
            let original = timeline.segments().clone();

            for op in ops {
                let ids: Vec<SegmentId> = timeline.segments().iter().map(Segment::id).collect();
                let pick = |i: usize| ids[i % ids.len()];
                let result = match op {
                    Op::Move(i, track, start) if timeline.can_move_segment(pick(i), track, start) => {
                        timeline.move_segment(pick(i), track, start, &mut history)
                    }
                    Op::Start(i, frame) if timeline.can_change_start_frame(pick(i), frame) => {
                        timeline.change_start_frame(pick(i), frame, &mut history)
                    }
                    Op::End(i, frame) if timeline.can_change_end_frame(pick(i), frame) => {
                        timeline.change_end_frame(pick(i), frame, &mut history)
                    }
                    Op::Split(i, frame) if timeline.can_split_segment(pick(i), frame) => {
                        timeline.split_segment(pick(i), frame, &mut history).map(|_| ())
                    }
                    Op::Merge(i) if timeline.can_merge_left(pick(i)) => {
                        timeline.merge_left(pick(i), &mut history).map(|_| ())
                    }
                    _ => Ok(()),
                };
                prop_assert!(result.is_ok());

                for segment in timeline.segments() {
                    prop_assert!(segment.validate().is_ok());
                    prop_assert!(!segment.key_frames().is_empty());
                    prop_assert!(!timeline.segments().overlaps(
                        segment.track(),
                        segment.start(),
                        segment.end(),
                        Some(segment.id()),
                    ));
                }
            }

            while history.can_undo() {
                prop_assert!(timeline.undo(&mut history).is_ok());
            }
            prop_assert_eq!(timeline.segments(), &original);
        }
    }
}
