// SPDX-License-Identifier: MIT OR Apache-2.0
//! Timeline segments.
//!
//! A segment is an inclusive frame range on a numbered track. It owns the
//! key frames describing its geometry over that range.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::collection::{shift_frame, KeyFrameCollection};
use crate::error::{Result, TimelineError};
use crate::keyframe::{FrameNumber, KeyFrame, KeyFramePayload, SegmentKind};

/// Unique identifier for a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentId(pub Uuid);

impl SegmentId {
    /// Create a new random segment ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SegmentId {
    fn default() -> Self {
        Self::new()
    }
}

/// Placement of a segment on the timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentBounds {
    /// Track number
    pub track: u32,
    /// First frame (inclusive)
    pub start: FrameNumber,
    /// Last frame (inclusive)
    pub end: FrameNumber,
}

/// A frame range on a track with its key frames
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Segment {
    id: SegmentId,
    track: u32,
    start: FrameNumber,
    end: FrameNumber,
    name: Option<String>,
    kind: SegmentKind,
    key_frames: KeyFrameCollection,
}

impl Default for Segment {
    fn default() -> Self {
        Self {
            id: SegmentId::new(),
            track: 0,
            start: 0,
            end: 0,
            name: None,
            kind: SegmentKind::default(),
            key_frames: KeyFrameCollection::new(),
        }
    }
}

impl Segment {
    /// Create a segment from its key frames.
    ///
    /// The segment kind is taken from the first key frame. Fails if the range
    /// is reversed, no key frame is given, a key frame lies outside the range
    /// or the payload variants differ.
    pub fn new(
        track: u32,
        start: FrameNumber,
        end: FrameNumber,
        key_frames: Vec<KeyFrame>,
    ) -> Result<Self> {
        let kind = key_frames
            .first()
            .map(KeyFrame::kind)
            .ok_or_else(|| TimelineError::InvalidRange("segment needs at least one key frame".into()))?;

        let segment = Self {
            id: SegmentId::new(),
            track,
            start,
            end,
            name: None,
            kind,
            key_frames: KeyFrameCollection::try_from(key_frames)?,
        };
        segment.validate()?;
        Ok(segment)
    }

    /// Set the segment name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Unique segment ID
    pub fn id(&self) -> SegmentId {
        self.id
    }

    /// Track number
    pub fn track(&self) -> u32 {
        self.track
    }

    /// First frame (inclusive)
    pub fn start(&self) -> FrameNumber {
        self.start
    }

    /// Last frame (inclusive)
    pub fn end(&self) -> FrameNumber {
        self.end
    }

    /// Placement on the timeline
    pub fn bounds(&self) -> SegmentBounds {
        SegmentBounds {
            track: self.track,
            start: self.start,
            end: self.end,
        }
    }

    /// Optional display name
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Kind of geometry the key frames carry
    pub fn kind(&self) -> SegmentKind {
        self.kind
    }

    /// Key frames in frame order
    pub fn key_frames(&self) -> &KeyFrameCollection {
        &self.key_frames
    }

    /// Number of frames covered
    pub fn frame_duration(&self) -> FrameNumber {
        self.end.saturating_sub(self.start).saturating_add(1)
    }

    /// Check if `frame` lies within the segment
    pub fn contains_frame(&self, frame: FrameNumber) -> bool {
        self.start <= frame && frame <= self.end
    }

    /// Check the segment's own invariants
    pub fn validate(&self) -> Result<()> {
        if self.start > self.end {
            return Err(TimelineError::InvalidRange(format!(
                "start frame {} is after end frame {}",
                self.start, self.end
            )));
        }
        if self.end == FrameNumber::MAX {
            return Err(TimelineError::InvalidRange(format!(
                "end frame {} is out of range",
                self.end
            )));
        }
        if self.key_frames.is_empty() {
            return Err(TimelineError::InvalidRange(
                "segment needs at least one key frame".into(),
            ));
        }

        for key_frame in &self.key_frames {
            if !self.contains_frame(key_frame.frame) {
                return Err(TimelineError::InvalidRange(format!(
                    "key frame {} lies outside {}..={}",
                    key_frame.frame, self.start, self.end
                )));
            }
            self.check_kind(&key_frame.payload)?;
        }
        Ok(())
    }

    /// Payload at `frame`.
    ///
    /// Frames between key frames are interpolated. Frames before the first or
    /// after the last key frame hold that key frame's payload.
    pub fn sample(&self, frame: FrameNumber) -> Result<KeyFramePayload> {
        if !self.contains_frame(frame) {
            return Err(TimelineError::InvalidRange(format!(
                "frame {frame} lies outside {}..={}",
                self.start, self.end
            )));
        }

        let index = match self.key_frames.binary_search(frame) {
            Ok(index) => {
                return self
                    .key_frames
                    .get(index)
                    .map(|kf| kf.payload.clone())
                    .ok_or(TimelineError::KeyFrameNotFound(frame));
            }
            Err(index) => index,
        };

        let before = index.checked_sub(1).and_then(|i| self.key_frames.get(i));
        let after = self.key_frames.get(index);
        match (before, after) {
            (Some(from), Some(to)) => Ok(from.lerp_at(frame, to)?.payload),
            (Some(held), None) | (None, Some(held)) => Ok(held.payload.clone()),
            (None, None) => Err(TimelineError::KeyFrameNotFound(frame)),
        }
    }

    /// Interpolated key frame at `frame`
    pub fn sample_key_frame(&self, frame: FrameNumber) -> Result<KeyFrame> {
        Ok(KeyFrame::new(frame, self.sample(frame)?))
    }

    /// Deep copy with a fresh id placed at another track and start frame
    pub fn duplicate_to(&self, track: u32, start: FrameNumber) -> Result<Segment> {
        let mut copy = self.clone();
        copy.id = SegmentId::new();
        copy.translate_to(track, start)?;
        Ok(copy)
    }

    pub(crate) fn check_kind(&self, payload: &KeyFramePayload) -> Result<()> {
        if payload.kind() != self.kind {
            return Err(TimelineError::PayloadMismatch {
                expected: self.kind,
                found: payload.kind(),
            });
        }
        Ok(())
    }

    pub(crate) fn set_bounds(&mut self, start: FrameNumber, end: FrameNumber) -> Result<()> {
        self.start = start;
        self.end = end;
        self.validate()
    }

    /// Move to another track and start frame, shifting key frames along
    pub(crate) fn translate_to(&mut self, track: u32, start: FrameNumber) -> Result<()> {
        let offset = i64::from(start) - i64::from(self.start);
        let end = shift_frame(self.end, offset)?;
        self.key_frames.shift(offset)?;
        self.track = track;
        self.start = start;
        self.end = end;
        Ok(())
    }

    pub(crate) fn set_name(&mut self, name: Option<String>) {
        self.name = name;
    }

    pub(crate) fn insert_key_frame(&mut self, key_frame: KeyFrame) -> Result<usize> {
        if !self.contains_frame(key_frame.frame) {
            return Err(TimelineError::InvalidRange(format!(
                "key frame {} lies outside {}..={}",
                key_frame.frame, self.start, self.end
            )));
        }
        self.check_kind(&key_frame.payload)?;
        self.key_frames.insert(key_frame)
    }

    pub(crate) fn remove_key_frame(&mut self, frame: FrameNumber) -> Result<KeyFrame> {
        self.key_frames
            .remove(frame)
            .ok_or(TimelineError::KeyFrameNotFound(frame))
    }

    pub(crate) fn replace_key_frame(&mut self, key_frame: KeyFrame) -> Result<KeyFrame> {
        self.check_kind(&key_frame.payload)?;
        self.key_frames.replace(key_frame)
    }
}
