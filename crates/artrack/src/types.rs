//! Shared vocabulary types crossing the tracking boundary.

use crate::pose::Pose;
use thiserror::Error;

/// Lifecycle state of the camera or of an anchor, as reported by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingState {
    /// Pose estimates are valid this frame.
    Tracking,
    /// Tracking is temporarily interrupted and may resume.
    Paused,
    /// Tracking has permanently ended.
    Stopped,
}

/// Why camera tracking is currently paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingFailureReason {
    None,
    InsufficientLight,
    ExcessiveMotion,
    InsufficientFeatures,
    BadState,
    CameraUnavailable,
}

impl TrackingFailureReason {
    /// Human-readable guidance shown on the HUD while tracking is paused.
    pub fn message(self) -> &'static str {
        match self {
            Self::None => "",
            Self::InsufficientLight => "Too dark. Move to a brighter area.",
            Self::ExcessiveMotion => "Moving too fast. Slow down.",
            Self::InsufficientFeatures => {
                "Can't find anything. Point the device at a surface with more texture."
            }
            Self::BadState => "Tracking lost due to bad internal state. Try restarting.",
            Self::CameraUnavailable => "Another app is using the camera.",
        }
    }
}

/// Physical display rotation, in 90-degree steps.
///
/// These four values are the only ones a device can report. Anything else
/// reaching the tracker is a programming error, so the conversion from raw
/// degrees panics instead of misrendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayRotation {
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl DisplayRotation {
    pub fn from_degrees(degrees: u32) -> Self {
        match degrees {
            0 => Self::Deg0,
            90 => Self::Deg90,
            180 => Self::Deg180,
            270 => Self::Deg270,
            other => panic!("unhandled display rotation: {other}"),
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    /// The next rotation step going clockwise.
    pub fn next_clockwise(self) -> Self {
        match self {
            Self::Deg0 => Self::Deg90,
            Self::Deg90 => Self::Deg180,
            Self::Deg180 => Self::Deg270,
            Self::Deg270 => Self::Deg0,
        }
    }
}

/// One 16-bit depth image, packed for direct RG8 texture upload.
///
/// Depth is millimetres from the camera plane. Each pixel stores the low byte
/// in the R channel and the high byte in G, so the GPU can reconstruct the
/// value as `r * 255 + g * 65280` from normalized samples.
#[derive(Debug, Clone)]
pub struct DepthImage {
    pub width: u32,
    pub height: u32,
    /// `width * height * 2` bytes, row-major.
    pub data: Vec<u8>,
    /// Sequence id of the frame this image was produced for.
    pub frame_seq: u64,
}

impl DepthImage {
    /// Packs millimetre values into the RG8 layout. `depth_mm` is row-major,
    /// `width * height` entries.
    pub fn from_millimeters(width: u32, height: u32, depth_mm: &[u16], frame_seq: u64) -> Self {
        debug_assert_eq!(depth_mm.len(), (width * height) as usize);
        let mut data = Vec::with_capacity(depth_mm.len() * 2);
        for &mm in depth_mm {
            let [lo, hi] = mm.to_le_bytes();
            data.push(lo);
            data.push(hi);
        }
        Self {
            width,
            height,
            data,
            frame_seq,
        }
    }

    /// Millimetre depth at a pixel.
    pub fn depth_mm_at(&self, x: u32, y: u32) -> u16 {
        let i = ((y * self.width + x) * 2) as usize;
        u16::from_le_bytes([self.data[i], self.data[i + 1]])
    }
}

/// RGBA8 camera color image for the background pass.
#[derive(Debug, Clone)]
pub struct ColorImage {
    pub width: u32,
    pub height: u32,
    /// `width * height * 4` bytes, row-major.
    pub data: Vec<u8>,
}

/// The depth image has not been produced yet this tick.
///
/// Expected and frequent near session start; callers skip their depth update
/// for the tick and keep whatever they published last.
#[derive(Debug, Clone, Copy, Error)]
#[error("depth image not yet available")]
pub struct DepthUnavailable;

/// Orientation mode of a feature-point trackable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointOrientation {
    /// Only the position is meaningful; the rotation is arbitrary.
    InitializedToIdentity,
    /// The pose's +Y axis approximates the surface normal at the point.
    EstimatedSurfaceNormal,
}

/// What a hit-test ray intersected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HitTarget {
    /// A detected planar surface. `pose_in_polygon` reports whether the hit
    /// pose falls inside the plane's detected boundary polygon.
    Plane { pose_in_polygon: bool },
    /// A free-space feature point.
    Point { orientation: PointOrientation },
}

/// One ray-cast intersection for a tap.
///
/// Candidate lists returned by a hit test are ordered by increasing
/// `distance` from the ray origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitCandidate {
    pub target: HitTarget,
    /// World pose of the hit; for planes the +Y axis is the plane normal.
    pub pose: Pose,
    /// Distance from the ray origin to the hit, in meters.
    pub distance: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_packs_low_byte_first() {
        let img = DepthImage::from_millimeters(2, 1, &[0x1234, 7], 0);
        assert_eq!(img.data, vec![0x34, 0x12, 7, 0]);
        assert_eq!(img.depth_mm_at(0, 0), 0x1234);
        assert_eq!(img.depth_mm_at(1, 0), 7);
    }

    #[test]
    #[should_panic(expected = "unhandled display rotation")]
    fn rotation_outside_the_four_values_is_fatal() {
        let _ = DisplayRotation::from_degrees(45);
    }

    #[test]
    fn rotation_degrees_round_trip() {
        for deg in [0, 90, 180, 270] {
            assert_eq!(DisplayRotation::from_degrees(deg).degrees(), deg);
        }
    }
}
