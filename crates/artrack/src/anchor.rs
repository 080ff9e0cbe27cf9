//! Anchor handles and the viewer-facing anchor trait.

use crate::pose::Pose;
use crate::types::TrackingState;
use parking_lot::Mutex;
use std::sync::Arc;

/// Viewer-facing surface of an anchor handle.
///
/// The viewer's bounded anchor collection is generic over this trait so its
/// eviction logic can be exercised without a live session.
pub trait TrackedAnchor {
    fn tracking_state(&self) -> TrackingState;

    /// Current world pose. Refined by the tracker between frames.
    fn pose(&self) -> Pose;

    /// Releases the anchor. Fire-and-forget: there is no acknowledgment and
    /// the handle reports `Stopped` from then on.
    fn detach(&self);
}

#[derive(Debug)]
pub(crate) struct AnchorState {
    pub pose: Pose,
    pub state: TrackingState,
}

/// A tracked point in the physical world, owned by the [`Session`].
///
/// Cloning the handle does not duplicate the anchor; all clones observe the
/// same state.
///
/// [`Session`]: crate::session::Session
#[derive(Debug, Clone)]
pub struct Anchor {
    pub(crate) inner: Arc<Mutex<AnchorState>>,
    pub(crate) id: u64,
}

impl Anchor {
    /// Session-unique identity, usable for detach bookkeeping and logs.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl TrackedAnchor for Anchor {
    fn tracking_state(&self) -> TrackingState {
        self.inner.lock().state
    }

    fn pose(&self) -> Pose {
        self.inner.lock().pose
    }

    fn detach(&self) {
        self.inner.lock().state = TrackingState::Stopped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn anchor(pose: Pose) -> Anchor {
        Anchor {
            inner: Arc::new(Mutex::new(AnchorState {
                pose,
                state: TrackingState::Tracking,
            })),
            id: 1,
        }
    }

    #[test]
    fn detach_stops_all_clones() {
        let a = anchor(Pose::from_translation(Vec3::X));
        let b = a.clone();
        a.detach();
        assert_eq!(b.tracking_state(), TrackingState::Stopped);
        assert_eq!(b.pose().translation, Vec3::X);
    }
}
