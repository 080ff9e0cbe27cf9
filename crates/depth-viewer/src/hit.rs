//! Turns one tap's ray-cast results into at most one placement pose.

use artrack::{HitCandidate, HitTarget, PointOrientation, Pose, TrackingState};
use glam::Vec3;

/// Picks the placement pose for one tap.
///
/// `candidates` must be ordered nearest-first; the first qualifying
/// candidate wins and the rest are not considered. Returns `None` while the
/// camera is not tracking, and `None` when nothing qualifies — both are
/// normal outcomes, not errors.
pub fn resolve(
    tracking: TrackingState,
    candidates: &[HitCandidate],
    camera_pose: &Pose,
) -> Option<Pose> {
    if tracking != TrackingState::Tracking {
        return None;
    }

    for hit in candidates {
        let accept = match hit.target {
            // A plane counts only when the hit lies inside its detected
            // polygon and the camera is on the normal-facing side. A camera
            // behind a visible surface is a tracking degeneracy.
            HitTarget::Plane { pose_in_polygon } => {
                pose_in_polygon && distance_to_plane(&hit.pose, camera_pose) > 0.0
            }
            // A free-space point counts only with an estimated surface
            // normal; a bare position has no orientation to anchor against.
            HitTarget::Point { orientation } => {
                orientation == PointOrientation::EstimatedSurfaceNormal
            }
        };
        if accept {
            return Some(hit.pose);
        }
    }
    None
}

/// Signed distance from the camera to the plane along the plane's normal.
///
/// The plane pose's local +Y axis is the plane normal by construction.
/// Positive means the camera is on the side the normal faces.
pub fn distance_to_plane(plane_pose: &Pose, camera_pose: &Pose) -> f32 {
    let normal = plane_pose.transformed_axis(Vec3::Y);
    (camera_pose.translation - plane_pose.translation).dot(normal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    fn camera_above() -> Pose {
        Pose::from_translation(Vec3::new(0.0, 1.5, 0.0))
    }

    fn plane_hit(at: Vec3, in_polygon: bool, distance: f32) -> HitCandidate {
        HitCandidate {
            target: HitTarget::Plane {
                pose_in_polygon: in_polygon,
            },
            pose: Pose::from_translation(at),
            distance,
        }
    }

    fn point_hit(at: Vec3, orientation: PointOrientation, distance: f32) -> HitCandidate {
        HitCandidate {
            target: HitTarget::Point { orientation },
            pose: Pose::from_translation(at),
            distance,
        }
    }

    #[test]
    fn nothing_resolves_while_not_tracking() {
        let hits = vec![plane_hit(Vec3::ZERO, true, 1.0)];
        assert!(resolve(TrackingState::Paused, &hits, &camera_above()).is_none());
        assert!(resolve(TrackingState::Stopped, &hits, &camera_above()).is_none());
    }

    #[test]
    fn nearest_qualifying_candidate_wins() {
        let hits = vec![
            // Nearest, but outside the polygon.
            plane_hit(Vec3::new(0.0, 0.0, -0.5), false, 0.8),
            plane_hit(Vec3::new(0.0, 0.0, -1.0), true, 1.4),
            point_hit(
                Vec3::new(0.0, 0.5, -2.0),
                PointOrientation::EstimatedSurfaceNormal,
                2.0,
            ),
        ];
        let pose = resolve(TrackingState::Tracking, &hits, &camera_above()).unwrap();
        assert_eq!(pose.translation, Vec3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn camera_behind_the_plane_is_rejected_even_when_nearest() {
        // Plane normal points up; put the camera below it.
        let camera = Pose::from_translation(Vec3::new(0.0, -1.0, 0.0));
        let hits = vec![
            plane_hit(Vec3::ZERO, true, 0.4),
            point_hit(
                Vec3::new(0.2, 0.1, -1.0),
                PointOrientation::EstimatedSurfaceNormal,
                1.1,
            ),
        ];
        assert!(distance_to_plane(&hits[0].pose, &camera) < 0.0);

        // Resolution skips the degenerate plane and falls through to the
        // oriented point.
        let pose = resolve(TrackingState::Tracking, &hits, &camera).unwrap();
        assert_eq!(pose.translation, Vec3::new(0.2, 0.1, -1.0));
    }

    #[test]
    fn unoriented_points_never_qualify() {
        let hits = vec![point_hit(
            Vec3::ONE,
            PointOrientation::InitializedToIdentity,
            1.0,
        )];
        assert!(resolve(TrackingState::Tracking, &hits, &camera_above()).is_none());
    }

    #[test]
    fn distance_uses_the_rotated_normal() {
        // Tilt the plane 90 degrees about X: its normal becomes +Z, so a
        // camera at +Z is in front regardless of height.
        let plane = Pose::new(Vec3::ZERO, Quat::from_rotation_x(std::f32::consts::FRAC_PI_2));
        let front = Pose::from_translation(Vec3::new(0.0, -3.0, 2.0));
        let behind = Pose::from_translation(Vec3::new(0.0, 3.0, -2.0));
        assert!(distance_to_plane(&plane, &front) > 0.0);
        assert!(distance_to_plane(&plane, &behind) < 0.0);
    }

    #[test]
    fn tap_pipeline_places_one_anchor_then_rejects_a_behind_plane_tap() {
        use crate::anchors::AnchorManager;
        use artrack::{DisplayRotation, Session, SessionConfig};

        let mut session = Session::new(SessionConfig {
            camera_warmup_frames: 0,
            plane_warmup_frames: 1,
            ..SessionConfig::default()
        });
        session.set_display_geometry(DisplayRotation::Deg0, 640, 480);
        session.update();
        let frame = session.update();

        let mut manager = AnchorManager::new();

        // Tap at screen center: one polygon-bounded plane hit with positive
        // camera distance places exactly one anchor.
        let hits = frame.hit_test(320.0, 240.0);
        let camera = frame.camera_pose();
        assert!(distance_to_plane(&hits[0].pose, &camera) > 0.0);
        if let Some(pose) = resolve(frame.tracking_state(), &hits, &camera) {
            manager.place(session.create_anchor(pose));
        }
        assert_eq!(manager.len(), 1);

        // The same hit seen from behind the plane must place nothing.
        let behind = Pose::from_translation(camera.translation - Vec3::new(0.0, 3.0, 0.0));
        assert!(distance_to_plane(&hits[0].pose, &behind) < 0.0);
        if let Some(pose) = resolve(frame.tracking_state(), &hits, &behind) {
            manager.place(session.create_anchor(pose));
        }
        assert_eq!(manager.len(), 1);
    }
}
