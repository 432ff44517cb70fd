// SPDX-License-Identifier: MIT OR Apache-2.0
//! Key frame copy and paste.
//!
//! Payloads travel through a [`ClipboardStore`] as JSON text, keyed by the
//! format name of the segment kind, so a crop key frame can only be pasted
//! into a crop segment.

use crate::error::{Result, TimelineError};
use crate::history::UndoLog;
use crate::keyframe::{FrameNumber, KeyFramePayload};
use crate::segment::SegmentId;
use crate::timeline::Timeline;

/// Typed text clipboard
pub trait ClipboardStore {
    /// Store `data` under `format`, replacing previous contents
    fn set_data(&mut self, format: &str, data: String);

    /// Data stored under `format`
    fn get_data(&self, format: &str) -> Option<String>;

    /// Check if data is stored under `format`
    fn contains_data(&self, format: &str) -> bool {
        self.get_data(format).is_some()
    }
}

/// In-process clipboard holding one entry
#[derive(Debug, Clone, Default)]
pub struct MemoryClipboard {
    entry: Option<(String, String)>,
}

impl MemoryClipboard {
    /// Create an empty clipboard
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the stored entry
    pub fn clear(&mut self) {
        self.entry = None;
    }
}

impl ClipboardStore for MemoryClipboard {
    fn set_data(&mut self, format: &str, data: String) {
        self.entry = Some((format.to_owned(), data));
    }

    fn get_data(&self, format: &str) -> Option<String> {
        self.entry
            .as_ref()
            .filter(|(stored, _)| stored == format)
            .map(|(_, data)| data.clone())
    }
}

impl Timeline {
    /// Check if the key frame at `frame` can be copied
    pub fn can_copy_key_frame(&self, id: SegmentId, frame: FrameNumber) -> bool {
        self.segment(id)
            .is_some_and(|segment| segment.key_frames().contains(frame))
    }

    /// Copy the payload of the key frame at `frame` to the clipboard
    pub fn copy_key_frame(
        &self,
        id: SegmentId,
        frame: FrameNumber,
        store: &mut impl ClipboardStore,
    ) -> Result<()> {
        let segment = self.segment(id).ok_or(TimelineError::SegmentNotFound(id))?;
        let key_frame = segment
            .key_frames()
            .find(frame)
            .ok_or(TimelineError::KeyFrameNotFound(frame))?;

        let data = serde_json::to_string(&key_frame.payload)
            .map_err(|e| TimelineError::Clipboard(e.to_string()))?;
        store.set_data(segment.kind().clipboard_format(), data);
        tracing::debug!("Copied key frame {frame} of segment {:?}", id);
        Ok(())
    }

    /// Check if the clipboard holds a payload the key frame at `frame` accepts
    pub fn can_paste_key_frame(
        &self,
        id: SegmentId,
        frame: FrameNumber,
        store: &impl ClipboardStore,
    ) -> bool {
        self.segment(id).is_some_and(|segment| {
            segment.key_frames().contains(frame)
                && store.contains_data(segment.kind().clipboard_format())
        })
    }

    /// Replace the payload of the key frame at `frame` with the clipboard contents
    pub fn paste_key_frame(
        &mut self,
        id: SegmentId,
        frame: FrameNumber,
        store: &impl ClipboardStore,
        log: &mut impl UndoLog,
    ) -> Result<()> {
        let format = self
            .segment(id)
            .ok_or(TimelineError::SegmentNotFound(id))?
            .kind()
            .clipboard_format();
        let data = store
            .get_data(format)
            .ok_or_else(|| TimelineError::Clipboard(format!("no {format} data on the clipboard")))?;
        let payload: KeyFramePayload =
            serde_json::from_str(&data).map_err(|e| TimelineError::Clipboard(e.to_string()))?;

        self.set_key_frame_payload(id, frame, payload, log)
    }
}
