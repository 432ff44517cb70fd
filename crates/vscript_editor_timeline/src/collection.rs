// SPDX-License-Identifier: MIT OR Apache-2.0
//! Ordered containers for key frames and segments.
//!
//! Both collections sit on [`OrderedVec`], a vector kept sorted by a
//! caller-supplied comparison. Items that compare equal are rejected on
//! insertion: for key frames that means a duplicate frame number, for
//! segments an overlapping range on the same track.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TimelineError};
use crate::keyframe::{FrameNumber, KeyFrame};
use crate::segment::{Segment, SegmentId};

/// Encode a binary search result as `index` on a hit or `!insertion_index` on a miss
pub fn encode_search_result(result: std::result::Result<usize, usize>) -> isize {
    match result {
        Ok(index) => index as isize,
        Err(insertion) => !(insertion as isize),
    }
}

/// Vector kept sorted by a comparison supplied at each call site
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedVec<T> {
    items: Vec<T>,
}

impl<T> OrderedVec<T> {
    /// Create an empty collection
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the collection is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate in order
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Items as a sorted slice
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Get item by index
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// Binary search with a comparison against each element
    pub fn binary_search_by<F>(&self, compare: F) -> std::result::Result<usize, usize>
    where
        F: FnMut(&T) -> Ordering,
    {
        self.items.binary_search_by(compare)
    }

    /// Insert keeping order.
    ///
    /// Returns the index of the existing equal item, together with the
    /// rejected item, when `compare` reports a collision.
    pub fn insert_by<F>(&mut self, item: T, mut compare: F) -> std::result::Result<usize, (usize, T)>
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        match self.items.binary_search_by(|candidate| compare(candidate, &item)) {
            Ok(existing) => Err((existing, item)),
            Err(index) => {
                self.items.insert(index, item);
                Ok(index)
            }
        }
    }

    /// Remove item by index
    pub fn remove(&mut self, index: usize) -> T {
        self.items.remove(index)
    }

    /// Remove every item
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Put an item back at the index it was removed from
    fn restore(&mut self, index: usize, item: T) {
        self.items.insert(index, item);
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }
}

impl<T> Default for OrderedVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Key frames of one segment, sorted by frame number
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(into = "Vec<KeyFrame>", try_from = "Vec<KeyFrame>")]
pub struct KeyFrameCollection {
    inner: OrderedVec<KeyFrame>,
}

impl KeyFrameCollection {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of key frames
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if there are no key frames
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterate key frames in frame order
    pub fn iter(&self) -> std::slice::Iter<'_, KeyFrame> {
        self.inner.iter()
    }

    /// Key frames as a sorted slice
    pub fn as_slice(&self) -> &[KeyFrame] {
        self.inner.as_slice()
    }

    /// Get key frame by index
    pub fn get(&self, index: usize) -> Option<&KeyFrame> {
        self.inner.get(index)
    }

    /// First key frame
    pub fn first(&self) -> Option<&KeyFrame> {
        self.inner.as_slice().first()
    }

    /// Last key frame
    pub fn last(&self) -> Option<&KeyFrame> {
        self.inner.as_slice().last()
    }

    /// Frame numbers in order
    pub fn frames(&self) -> impl Iterator<Item = FrameNumber> + '_ {
        self.inner.iter().map(|kf| kf.frame)
    }

    /// Index of the key frame at `frame`, or the index it would be inserted at
    pub fn binary_search(&self, frame: FrameNumber) -> std::result::Result<usize, usize> {
        self.inner.binary_search_by(|kf| kf.frame.cmp(&frame))
    }

    /// [`Self::binary_search`] with a miss encoded as the complement of the insertion index
    pub fn binary_search_encoded(&self, frame: FrameNumber) -> isize {
        encode_search_result(self.binary_search(frame))
    }

    /// First index whose frame number is `>= frame`, or `len()` if none
    pub fn lower_bound_index(&self, frame: FrameNumber) -> usize {
        match self.binary_search(frame) {
            Ok(index) | Err(index) => index,
        }
    }

    /// Key frame at an exact frame number
    pub fn find(&self, frame: FrameNumber) -> Option<&KeyFrame> {
        self.binary_search(frame)
            .ok()
            .and_then(|index| self.inner.get(index))
    }

    /// Check if a key frame exists at `frame`
    pub fn contains(&self, frame: FrameNumber) -> bool {
        self.binary_search(frame).is_ok()
    }

    /// Nearest key frame strictly before `frame`
    pub fn previous(&self, frame: FrameNumber) -> Option<&KeyFrame> {
        self.lower_bound_index(frame)
            .checked_sub(1)
            .and_then(|index| self.inner.get(index))
    }

    /// Nearest key frame strictly after `frame`
    pub fn next(&self, frame: FrameNumber) -> Option<&KeyFrame> {
        let index = match self.binary_search(frame) {
            Ok(index) => index + 1,
            Err(index) => index,
        };
        self.inner.get(index)
    }

    /// Insert a key frame, rejecting an occupied frame number
    pub fn insert(&mut self, key_frame: KeyFrame) -> Result<usize> {
        self.inner
            .insert_by(key_frame, |a, b| a.frame.cmp(&b.frame))
            .map_err(|(_, rejected)| TimelineError::DuplicateKey(rejected.frame))
    }

    /// Remove key frame by index
    pub fn remove_at(&mut self, index: usize) -> Option<KeyFrame> {
        (index < self.inner.len()).then(|| self.inner.remove(index))
    }

    /// Remove the key frame at `frame`
    pub fn remove(&mut self, frame: FrameNumber) -> Option<KeyFrame> {
        let index = self.binary_search(frame).ok()?;
        Some(self.inner.remove(index))
    }

    /// Replace the key frame with the same frame number, returning the old one
    pub fn replace(&mut self, key_frame: KeyFrame) -> Result<KeyFrame> {
        let index = self
            .binary_search(key_frame.frame)
            .map_err(|_| TimelineError::KeyFrameNotFound(key_frame.frame))?;
        let slot = self
            .inner
            .get_mut(index)
            .ok_or(TimelineError::KeyFrameNotFound(key_frame.frame))?;
        Ok(std::mem::replace(slot, key_frame))
    }

    /// Shift every frame number by `offset`.
    ///
    /// Fails without changes if any frame would leave the `u32` range.
    pub fn shift(&mut self, offset: i64) -> Result<()> {
        if offset == 0 {
            return Ok(());
        }

        let shifted = self
            .inner
            .iter()
            .map(|kf| shift_frame(kf.frame, offset).map(|frame| kf.with_frame(frame)))
            .collect::<Result<Vec<_>>>()?;

        // Translation keeps relative order
        self.inner = OrderedVec { items: shifted };
        Ok(())
    }
}

/// Add a signed offset to a frame number
pub(crate) fn shift_frame(frame: FrameNumber, offset: i64) -> Result<FrameNumber> {
    FrameNumber::try_from(i64::from(frame) + offset).map_err(|_| {
        TimelineError::InvalidRange(format!("frame {frame} shifted by {offset} is out of range"))
    })
}

impl From<KeyFrameCollection> for Vec<KeyFrame> {
    fn from(collection: KeyFrameCollection) -> Self {
        collection.inner.items
    }
}

impl TryFrom<Vec<KeyFrame>> for KeyFrameCollection {
    type Error = TimelineError;

    fn try_from(key_frames: Vec<KeyFrame>) -> Result<Self> {
        let mut collection = Self::new();
        for key_frame in key_frames {
            collection.insert(key_frame)?;
        }
        Ok(collection)
    }
}

impl<'a> IntoIterator for &'a KeyFrameCollection {
    type Item = &'a KeyFrame;
    type IntoIter = std::slice::Iter<'a, KeyFrame>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Placement order of segments: track first, then frame range.
///
/// Overlapping ranges on the same track compare equal.
fn compare_placement(candidate: &Segment, item: &Segment) -> Ordering {
    candidate.track().cmp(&item.track()).then_with(|| {
        if candidate.end() < item.start() {
            Ordering::Less
        } else if candidate.start() > item.end() {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    })
}

/// Segments sorted by `(track, start)` with no overlap on a track
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(into = "Vec<Segment>", try_from = "Vec<Segment>")]
pub struct SegmentCollection {
    inner: OrderedVec<Segment>,
}

impl SegmentCollection {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if there are no segments
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterate segments in placement order
    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.inner.iter()
    }

    /// Segments as a sorted slice
    pub fn as_slice(&self) -> &[Segment] {
        self.inner.as_slice()
    }

    /// Get segment by index
    pub fn get_index(&self, index: usize) -> Option<&Segment> {
        self.inner.get(index)
    }

    /// Index of a segment by id
    pub fn index_of(&self, id: SegmentId) -> Option<usize> {
        self.inner.iter().position(|segment| segment.id() == id)
    }

    /// Get segment by id
    pub fn get(&self, id: SegmentId) -> Option<&Segment> {
        self.inner.iter().find(|segment| segment.id() == id)
    }

    pub(crate) fn get_mut(&mut self, id: SegmentId) -> Option<&mut Segment> {
        let index = self.index_of(id)?;
        self.inner.get_mut(index)
    }

    /// Segments on one track, in frame order
    pub fn on_track(&self, track: u32) -> impl Iterator<Item = &Segment> + '_ {
        self.inner.iter().filter(move |segment| segment.track() == track)
    }

    /// Binary search for the segment on `track` covering `frame`
    pub fn binary_search(&self, track: u32, frame: FrameNumber) -> std::result::Result<usize, usize> {
        self.inner.binary_search_by(|segment| {
            segment.track().cmp(&track).then_with(|| {
                if segment.end() < frame {
                    Ordering::Less
                } else if segment.start() > frame {
                    Ordering::Greater
                } else {
                    Ordering::Equal
                }
            })
        })
    }

    /// Segment on `track` covering `frame`
    pub fn at_frame(&self, track: u32, frame: FrameNumber) -> Option<&Segment> {
        self.binary_search(track, frame)
            .ok()
            .and_then(|index| self.inner.get(index))
    }

    /// Check if `[start, end]` on `track` overlaps a segment other than `exclude`
    pub fn overlaps(
        &self,
        track: u32,
        start: FrameNumber,
        end: FrameNumber,
        exclude: Option<SegmentId>,
    ) -> bool {
        self.on_track(track).any(|segment| {
            Some(segment.id()) != exclude && segment.start() <= end && start <= segment.end()
        })
    }

    /// Neighbour immediately before a segment on the same track
    pub fn previous_on_track(&self, id: SegmentId) -> Option<&Segment> {
        let index = self.index_of(id)?;
        let track = self.inner.get(index)?.track();
        index
            .checked_sub(1)
            .and_then(|prev| self.inner.get(prev))
            .filter(|segment| segment.track() == track)
    }

    /// Neighbour immediately after a segment on the same track
    pub fn next_on_track(&self, id: SegmentId) -> Option<&Segment> {
        let index = self.index_of(id)?;
        let track = self.inner.get(index)?.track();
        self.inner
            .get(index + 1)
            .filter(|segment| segment.track() == track)
    }

    /// Insert a segment.
    ///
    /// Fails with [`TimelineError::Overlap`] and leaves the collection
    /// unchanged if the range collides with another segment on its track.
    pub fn insert(&mut self, segment: Segment) -> Result<usize> {
        segment.validate()?;
        if self.get(segment.id()).is_some() {
            return Err(TimelineError::PreconditionNotMet(format!(
                "segment {:?} is already in the collection",
                segment.id()
            )));
        }

        self.inner
            .insert_by(segment, compare_placement)
            .map_err(|(_, rejected)| TimelineError::Overlap {
                track: rejected.track(),
                start: rejected.start(),
                end: rejected.end(),
            })
    }

    /// Remove segment by id
    pub fn remove(&mut self, id: SegmentId) -> Option<Segment> {
        let index = self.index_of(id)?;
        Some(self.inner.remove(index))
    }

    /// Remove segment by index
    pub fn remove_at(&mut self, index: usize) -> Option<Segment> {
        (index < self.inner.len()).then(|| self.inner.remove(index))
    }

    /// Update a segment whose placement may change.
    ///
    /// The segment is taken out, updated and re-inserted. On any failure the
    /// original is put back at its old index.
    pub(crate) fn reposition<F>(&mut self, id: SegmentId, update: F) -> Result<()>
    where
        F: FnOnce(&mut Segment) -> Result<()>,
    {
        let index = self.index_of(id).ok_or(TimelineError::SegmentNotFound(id))?;
        let original = self.inner.remove(index);
        let mut updated = original.clone();

        let outcome = update(&mut updated).and_then(|()| self.insert(updated));
        if let Err(err) = outcome {
            self.inner.restore(index, original);
            return Err(err);
        }
        Ok(())
    }
}

impl From<SegmentCollection> for Vec<Segment> {
    fn from(collection: SegmentCollection) -> Self {
        collection.inner.items
    }
}

impl TryFrom<Vec<Segment>> for SegmentCollection {
    type Error = TimelineError;

    fn try_from(segments: Vec<Segment>) -> Result<Self> {
        let mut collection = Self::new();
        for segment in segments {
            collection.insert(segment)?;
        }
        Ok(collection)
    }
}

impl<'a> IntoIterator for &'a SegmentCollection {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
