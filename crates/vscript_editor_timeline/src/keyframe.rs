// SPDX-License-Identifier: MIT OR Apache-2.0
//! Key frame definitions for the timeline.
//!
//! A key frame pins a geometry payload (crop window or mask shape) to a
//! frame number. Frames between two key frames are derived by linear
//! interpolation of the payload's numeric fields.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TimelineError};

/// Zero-based video frame number
pub type FrameNumber = u32;

/// Kind of segment, fixed by the payload variant its key frames carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SegmentKind {
    /// Crop window
    #[default]
    Crop,
    /// Rectangular mask shape
    RectangleMask,
    /// Elliptical mask shape
    EllipseMask,
    /// Polygonal mask shape
    PolygonMask,
}

impl SegmentKind {
    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Crop => "Crop",
            Self::RectangleMask => "Rectangle",
            Self::EllipseMask => "Ellipse",
            Self::PolygonMask => "Polygon",
        }
    }

    /// Clipboard format name for a single key frame payload of this kind
    pub fn clipboard_format(&self) -> &'static str {
        match self {
            Self::Crop => "vscript.key_frame.crop",
            Self::RectangleMask => "vscript.key_frame.rectangle",
            Self::EllipseMask => "vscript.key_frame.ellipse",
            Self::PolygonMask => "vscript.key_frame.polygon",
        }
    }

    /// All segment kinds
    pub fn all() -> &'static [SegmentKind] {
        &[
            Self::Crop,
            Self::RectangleMask,
            Self::EllipseMask,
            Self::PolygonMask,
        ]
    }
}

/// Interpolation utilities
pub struct Interpolation;

impl Interpolation {
    /// Linear interpolation between two doubles.
    ///
    /// The end points are returned exactly for amounts of `0.0` and `1.0`.
    pub fn lerp(a: f64, b: f64, amount: f64) -> f64 {
        if amount == 0.0 {
            a
        } else if amount == 1.0 {
            b
        } else {
            a + (b - a) * amount
        }
    }

    /// Interpolation amount of `frame` between two key frame numbers.
    ///
    /// Degenerate (empty or reversed) ranges yield `0.0`.
    pub fn amount(frame: FrameNumber, from: FrameNumber, to: FrameNumber) -> f64 {
        if to <= from {
            return 0.0;
        }
        (f64::from(frame) - f64::from(from)) / (f64::from(to) - f64::from(from))
    }
}

/// 2D point with double precision coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
}

impl Point {
    /// Create a new point
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Interpolate towards another point
    pub fn lerp(&self, other: &Point, amount: f64) -> Point {
        Point {
            x: Interpolation::lerp(self.x, other.x, amount),
            y: Interpolation::lerp(self.y, other.y, amount),
        }
    }
}

/// Crop window with rotation
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CropData {
    /// Left edge in pixels
    pub left: f64,
    /// Top edge in pixels
    pub top: f64,
    /// Width in pixels
    pub width: f64,
    /// Height in pixels
    pub height: f64,
    /// Rotation angle in degrees
    pub angle: f64,
}

impl CropData {
    fn lerp(&self, other: &CropData, amount: f64) -> CropData {
        CropData {
            left: Interpolation::lerp(self.left, other.left, amount),
            top: Interpolation::lerp(self.top, other.top, amount),
            width: Interpolation::lerp(self.width, other.width, amount),
            height: Interpolation::lerp(self.height, other.height, amount),
            angle: if self.angle == other.angle {
                self.angle
            } else {
                Interpolation::lerp(self.angle, other.angle, amount)
            },
        }
    }
}

/// Axis-aligned rectangle mask
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RectangleData {
    /// Left edge in pixels
    pub left: f64,
    /// Top edge in pixels
    pub top: f64,
    /// Width in pixels
    pub width: f64,
    /// Height in pixels
    pub height: f64,
}

impl RectangleData {
    fn lerp(&self, other: &RectangleData, amount: f64) -> RectangleData {
        RectangleData {
            left: Interpolation::lerp(self.left, other.left, amount),
            top: Interpolation::lerp(self.top, other.top, amount),
            width: Interpolation::lerp(self.width, other.width, amount),
            height: Interpolation::lerp(self.height, other.height, amount),
        }
    }
}

/// Ellipse mask
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EllipseData {
    /// Center point
    pub center: Point,
    /// Horizontal radius
    pub radius_x: f64,
    /// Vertical radius
    pub radius_y: f64,
}

impl EllipseData {
    fn lerp(&self, other: &EllipseData, amount: f64) -> EllipseData {
        EllipseData {
            center: self.center.lerp(&other.center, amount),
            radius_x: Interpolation::lerp(self.radius_x, other.radius_x, amount),
            radius_y: Interpolation::lerp(self.radius_y, other.radius_y, amount),
        }
    }
}

/// Polygon mask
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolygonData {
    /// Polygon vertices in drawing order
    pub points: Vec<Point>,
}

impl PolygonData {
    fn lerp(&self, other: &PolygonData, amount: f64) -> Result<PolygonData> {
        if self.points.len() != other.points.len() {
            return Err(TimelineError::PointCountMismatch(
                self.points.len(),
                other.points.len(),
            ));
        }

        Ok(PolygonData {
            points: self
                .points
                .iter()
                .zip(&other.points)
                .map(|(a, b)| a.lerp(b, amount))
                .collect(),
        })
    }
}

/// Geometry stored in a key frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KeyFramePayload {
    /// Crop window
    Crop(CropData),
    /// Rectangle mask
    Rectangle(RectangleData),
    /// Ellipse mask
    Ellipse(EllipseData),
    /// Polygon mask
    Polygon(PolygonData),
}

impl Default for KeyFramePayload {
    fn default() -> Self {
        Self::Crop(CropData::default())
    }
}

impl KeyFramePayload {
    /// Segment kind this payload belongs to
    pub fn kind(&self) -> SegmentKind {
        match self {
            Self::Crop(_) => SegmentKind::Crop,
            Self::Rectangle(_) => SegmentKind::RectangleMask,
            Self::Ellipse(_) => SegmentKind::EllipseMask,
            Self::Polygon(_) => SegmentKind::PolygonMask,
        }
    }

    /// Interpolate towards another payload of the same variant
    pub fn lerp(&self, other: &KeyFramePayload, amount: f64) -> Result<KeyFramePayload> {
        match (self, other) {
            (Self::Crop(a), Self::Crop(b)) => Ok(Self::Crop(a.lerp(b, amount))),
            (Self::Rectangle(a), Self::Rectangle(b)) => Ok(Self::Rectangle(a.lerp(b, amount))),
            (Self::Ellipse(a), Self::Ellipse(b)) => Ok(Self::Ellipse(a.lerp(b, amount))),
            (Self::Polygon(a), Self::Polygon(b)) => Ok(Self::Polygon(a.lerp(b, amount)?)),
            _ => Err(TimelineError::PayloadMismatch {
                expected: self.kind(),
                found: other.kind(),
            }),
        }
    }
}

/// A key frame in a segment
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyFrame {
    /// Frame number
    pub frame: FrameNumber,
    /// Geometry at this frame
    pub payload: KeyFramePayload,
}

impl KeyFrame {
    /// Create a new key frame
    pub fn new(frame: FrameNumber, payload: KeyFramePayload) -> Self {
        Self { frame, payload }
    }

    /// Segment kind of the payload
    pub fn kind(&self) -> SegmentKind {
        self.payload.kind()
    }

    /// Copy of this key frame placed at another frame number
    pub fn with_frame(&self, frame: FrameNumber) -> Self {
        Self {
            frame,
            payload: self.payload.clone(),
        }
    }

    /// Interpolated key frame at `frame` between this key frame and `to`
    pub fn lerp_at(&self, frame: FrameNumber, to: &KeyFrame) -> Result<KeyFrame> {
        let amount = Interpolation::amount(frame, self.frame, to.frame);
        Ok(KeyFrame::new(frame, self.payload.lerp(&to.payload, amount)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crop(left: f64, angle: f64) -> KeyFramePayload {
        KeyFramePayload::Crop(CropData {
            left,
            top: 10.0,
            width: 100.0,
            height: 50.0,
            angle,
        })
    }

    #[test]
    fn test_lerp_end_points_exact() {
        assert_eq!(Interpolation::lerp(0.1, 0.7, 0.0), 0.1);
        assert_eq!(Interpolation::lerp(0.1, 0.7, 1.0), 0.7);
        assert_eq!(Interpolation::lerp(0.0, 10.0, 0.5), 5.0);
    }

    #[test]
    fn test_amount_degenerate_range() {
        assert_eq!(Interpolation::amount(5, 10, 10), 0.0);
        assert_eq!(Interpolation::amount(5, 0, 10), 0.5);
    }

    #[test]
    fn test_key_frame_lerp_midpoint() {
        let from = KeyFrame::new(0, crop(0.0, 0.0));
        let to = KeyFrame::new(10, crop(20.0, 90.0));

        let mid = from.lerp_at(5, &to).unwrap();
        assert_eq!(mid.frame, 5);
        let KeyFramePayload::Crop(data) = mid.payload else {
            panic!("expected crop payload");
        };
        assert_eq!(data.left, 10.0);
        assert_eq!(data.top, 10.0);
        assert_eq!(data.angle, 45.0);
    }

    #[test]
    fn test_equal_angles_not_interpolated() {
        let a = crop(0.0, 33.3);
        let b = crop(8.0, 33.3);
        let KeyFramePayload::Crop(data) = a.lerp(&b, 0.37).unwrap() else {
            panic!("expected crop payload");
        };
        assert_eq!(data.angle, 33.3);
    }

    #[test]
    fn test_polygon_pairwise_lerp() {
        let a = KeyFramePayload::Polygon(PolygonData {
            points: vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)],
        });
        let b = KeyFramePayload::Polygon(PolygonData {
            points: vec![Point::new(10.0, 10.0), Point::new(20.0, 30.0)],
        });

        let KeyFramePayload::Polygon(mid) = a.lerp(&b, 0.5).unwrap() else {
            panic!("expected polygon payload");
        };
        assert_eq!(mid.points, vec![Point::new(5.0, 5.0), Point::new(15.0, 15.0)]);
    }

    #[test]
    fn test_polygon_point_count_mismatch() {
        let a = KeyFramePayload::Polygon(PolygonData {
            points: vec![Point::new(0.0, 0.0)],
        });
        let b = KeyFramePayload::Polygon(PolygonData::default());
        assert_eq!(a.lerp(&b, 0.5), Err(TimelineError::PointCountMismatch(1, 0)));
    }

    #[test]
    fn test_variant_mismatch() {
        let a = crop(0.0, 0.0);
        let b = KeyFramePayload::Ellipse(EllipseData::default());
        assert!(matches!(
            a.lerp(&b, 0.5),
            Err(TimelineError::PayloadMismatch {
                expected: SegmentKind::Crop,
                found: SegmentKind::EllipseMask,
            })
        ));
    }

    #[test]
    fn test_ellipse_lerp() {
        let a = KeyFramePayload::Ellipse(EllipseData {
            center: Point::new(0.0, 0.0),
            radius_x: 10.0,
            radius_y: 20.0,
        });
        let b = KeyFramePayload::Ellipse(EllipseData {
            center: Point::new(4.0, 8.0),
            radius_x: 30.0,
            radius_y: 20.0,
        });
        let KeyFramePayload::Ellipse(mid) = a.lerp(&b, 0.25).unwrap() else {
            panic!("expected ellipse payload");
        };
        assert_eq!(mid.center, Point::new(1.0, 2.0));
        assert_eq!(mid.radius_x, 15.0);
        assert_eq!(mid.radius_y, 20.0);
    }
}
