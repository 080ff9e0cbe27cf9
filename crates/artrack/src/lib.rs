//! World-tracking boundary for the depth viewer.
//!
//! A real AR device exposes its tracking stack (pose estimation, surface
//! detection, depth sensing) through a native runtime. This crate defines the
//! vocabulary the viewer consumes from that boundary — poses, frames, hit
//! candidates, anchors — together with a deterministic synthetic provider
//! ([`Session`]) that stands in for the device stack on a desktop: a ground
//! plane is detected after a short warm-up, depth images become available a
//! little later, and the camera drifts gently around the scene.
//!
//! Nothing in here touches the GPU; all images are plain byte buffers sized
//! for direct texture upload.

pub mod anchor;
pub mod pose;
pub mod session;
pub mod types;

pub use anchor::{Anchor, TrackedAnchor};
pub use pose::Pose;
pub use session::{Frame, Session, SessionConfig};
pub use types::{
    ColorImage, DepthImage, DepthUnavailable, DisplayRotation, HitCandidate, HitTarget,
    PointOrientation, TrackingFailureReason, TrackingState,
};
