//! Bounded, insertion-ordered collection of placed anchors.

use artrack::{TrackedAnchor, TrackingState};
use std::collections::VecDeque;

/// Upper bound on simultaneously live anchors. Keeps repeated taps from
/// overloading the renderer and the tracking subsystem.
pub const MAX_ANCHORS: usize = 20;

/// Owns the placed anchors in placement order, oldest first.
///
/// Insertion order is never compacted: the only removal path is overflow
/// eviction at the front, so index 0 is always the oldest anchor. If an
/// out-of-order removal API is ever added, "oldest" must become explicit
/// (e.g. a placement stamp) rather than positional.
pub struct AnchorManager<A: TrackedAnchor> {
    anchors: VecDeque<A>,
}

impl<A: TrackedAnchor> AnchorManager<A> {
    pub fn new() -> Self {
        Self {
            anchors: VecDeque::with_capacity(MAX_ANCHORS),
        }
    }

    /// Appends a newly created anchor, evicting the oldest when full.
    ///
    /// Eviction first notifies the tracking subsystem (`detach`), then drops
    /// the local entry; the two steps stay in that order.
    pub fn place(&mut self, anchor: A) {
        if self.anchors.len() >= MAX_ANCHORS {
            if let Some(oldest) = self.anchors.front() {
                oldest.detach();
            }
            self.anchors.pop_front();
        }
        self.anchors.push_back(anchor);
    }

    /// Visits every anchor currently tracking, oldest first. Non-tracking
    /// anchors are skipped, not removed: a paused anchor may resume.
    pub fn for_each_tracking(&self, mut f: impl FnMut(&A)) {
        for anchor in &self.anchors {
            if anchor.tracking_state() != TrackingState::Tracking {
                continue;
            }
            f(anchor);
        }
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use artrack::Pose;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Minimal anchor double recording detach calls in a shared log.
    #[derive(Clone)]
    struct FakeAnchor {
        id: u32,
        state: Rc<RefCell<TrackingState>>,
        detach_log: Rc<RefCell<Vec<u32>>>,
    }

    impl FakeAnchor {
        fn new(id: u32, log: &Rc<RefCell<Vec<u32>>>) -> Self {
            Self {
                id,
                state: Rc::new(RefCell::new(TrackingState::Tracking)),
                detach_log: log.clone(),
            }
        }
    }

    impl TrackedAnchor for FakeAnchor {
        fn tracking_state(&self) -> TrackingState {
            *self.state.borrow()
        }

        fn pose(&self) -> Pose {
            Pose::IDENTITY
        }

        fn detach(&self) {
            self.detach_log.borrow_mut().push(self.id);
            *self.state.borrow_mut() = TrackingState::Stopped;
        }
    }

    #[test]
    fn capacity_is_never_exceeded_and_oldest_is_evicted() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut manager = AnchorManager::new();

        for id in 0..21 {
            manager.place(FakeAnchor::new(id, &log));
            assert!(manager.len() <= MAX_ANCHORS);
        }

        assert_eq!(manager.len(), MAX_ANCHORS);
        // Exactly the first anchor was detached, nothing else.
        assert_eq!(*log.borrow(), vec![0]);

        // Survivors are 1..=20 in placement order.
        let mut seen = Vec::new();
        manager.for_each_tracking(|a| seen.push(a.id));
        assert_eq!(seen, (1..=20).collect::<Vec<_>>());
    }

    #[test]
    fn eviction_detaches_before_removal() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut manager = AnchorManager::new();
        for id in 0..20 {
            manager.place(FakeAnchor::new(id, &log));
        }

        let oldest = {
            let mut first = None;
            manager.for_each_tracking(|a| {
                if first.is_none() {
                    first = Some(a.clone());
                }
            });
            first.unwrap()
        };
        assert_eq!(oldest.tracking_state(), TrackingState::Tracking);

        manager.place(FakeAnchor::new(99, &log));
        // The evicted handle observed its own detach.
        assert_eq!(oldest.tracking_state(), TrackingState::Stopped);
        assert_eq!(*log.borrow(), vec![0]);
    }

    #[test]
    fn non_tracking_anchors_are_skipped_not_removed() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut manager = AnchorManager::new();
        let paused = FakeAnchor::new(0, &log);
        *paused.state.borrow_mut() = TrackingState::Paused;
        manager.place(paused.clone());
        manager.place(FakeAnchor::new(1, &log));

        let mut seen = Vec::new();
        manager.for_each_tracking(|a| seen.push(a.id));
        assert_eq!(seen, vec![1]);
        assert_eq!(manager.len(), 2);

        // Resuming brings the anchor back into the draw set.
        *paused.state.borrow_mut() = TrackingState::Tracking;
        let mut seen = Vec::new();
        manager.for_each_tracking(|a| seen.push(a.id));
        assert_eq!(seen, vec![0, 1]);
    }
}
