//! Synthetic tracking provider.
//!
//! Emulates the collaborator surface of a device tracking stack so the whole
//! viewer pipeline runs on a desktop: the camera starts paused and begins
//! tracking after a few frames, a ground plane is detected after a warm-up,
//! and depth images appear a little later still. The scene behind the
//! synthetic camera is a floor plane plus one solid occluder, which is enough
//! to exercise hit testing, placement and depth occlusion end to end.

use crate::anchor::{Anchor, AnchorState};
use crate::pose::Pose;
use crate::types::{
    ColorImage, DepthImage, DepthUnavailable, DisplayRotation, HitCandidate, HitTarget,
    PointOrientation, TrackingFailureReason, TrackingState,
};
use glam::{Mat4, Quat, Vec2, Vec3};
use parking_lot::Mutex;
use std::sync::Arc;

/// Vertical field of view of the synthetic camera.
const FOV_Y_RAD: f32 = 60.0 * std::f32::consts::PI / 180.0;

/// Taps count as hitting a feature point within this perpendicular distance.
const POINT_HIT_RADIUS_M: f32 = 0.06;

/// Half-extent of the detected floor polygon. The physical floor itself is
/// unbounded; only the trackable's boundary is limited.
const PLANE_HALF_EXTENT_M: f32 = 1.5;

const OCCLUDER_CENTER: Vec3 = Vec3::new(0.3, 0.28, -0.15);
const OCCLUDER_RADIUS_M: f32 = 0.22;

/// Build-time knobs for the synthetic provider.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Whether the simulated device exposes a depth sensor.
    pub depth_supported: bool,
    /// Frames before the camera starts tracking.
    pub camera_warmup_frames: u64,
    /// Frames before the ground plane is reported as detected.
    pub plane_warmup_frames: u64,
    /// Frames before the first depth image becomes available.
    pub depth_warmup_frames: u64,
    /// Dimensions of synthesized depth images.
    pub depth_size: (u32, u32),
    /// Dimensions of synthesized color images.
    pub color_size: (u32, u32),
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            depth_supported: true,
            camera_warmup_frames: 10,
            plane_warmup_frames: 90,
            depth_warmup_frames: 150,
            depth_size: (160, 120),
            color_size: (320, 240),
        }
    }
}

/// Synthetic world-tracking session.
///
/// One `update()` per displayed frame produces a [`Frame`] snapshot; the
/// session itself owns the trackables and every anchor ever created.
pub struct Session {
    config: SessionConfig,
    seq: u64,
    rotation: DisplayRotation,
    viewport: (u32, u32),
    geometry_dirty: bool,
    plane_detected: bool,
    forced_pause: Option<TrackingFailureReason>,
    anchors: Vec<Anchor>,
    next_anchor_id: u64,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        log::info!(
            "tracking session created (depth supported: {})",
            config.depth_supported
        );
        Self {
            config,
            seq: 0,
            rotation: DisplayRotation::Deg0,
            viewport: (1, 1),
            geometry_dirty: true,
            plane_detected: false,
            forced_pause: None,
            anchors: Vec::new(),
            next_anchor_id: 0,
        }
    }

    pub fn is_depth_supported(&self) -> bool {
        self.config.depth_supported
    }

    /// Records a display geometry change; the next frame reports it exactly
    /// once.
    pub fn set_display_geometry(&mut self, rotation: DisplayRotation, width: u32, height: u32) {
        self.rotation = rotation;
        self.viewport = (width.max(1), height.max(1));
        self.geometry_dirty = true;
    }

    pub fn display_rotation(&self) -> DisplayRotation {
        self.rotation
    }

    /// Forces the camera into a paused state, as a real tracker does when it
    /// loses its bearings.
    pub fn pause_tracking(&mut self, reason: TrackingFailureReason) {
        self.forced_pause = Some(reason);
    }

    pub fn resume_tracking(&mut self) {
        self.forced_pause = None;
    }

    /// True once at least one plane trackable is in the `Tracking` state.
    pub fn has_tracking_plane(&self) -> bool {
        self.plane_detected && self.camera_state() == TrackingState::Tracking
    }

    /// Registers a new anchor at `pose`. The tracker refines anchor poses
    /// over time; the synthetic world is static, so here the pose is held.
    pub fn create_anchor(&mut self, pose: Pose) -> Anchor {
        let anchor = Anchor {
            inner: Arc::new(Mutex::new(AnchorState {
                pose,
                state: self.camera_state(),
            })),
            id: self.next_anchor_id,
        };
        self.next_anchor_id += 1;
        self.anchors.push(anchor.clone());
        anchor
    }

    /// Advances the world by one tick and snapshots it into a [`Frame`].
    pub fn update(&mut self) -> Frame {
        self.seq += 1;

        let state = self.camera_state();
        if !self.plane_detected
            && state == TrackingState::Tracking
            && self.seq >= self.config.plane_warmup_frames
        {
            self.plane_detected = true;
            log::info!("plane detected after {} frames", self.seq);
        }

        // Anchors follow the camera state unless they were detached.
        for anchor in &self.anchors {
            let mut inner = anchor.inner.lock();
            if inner.state != TrackingState::Stopped {
                inner.state = state;
            }
        }

        let camera_pose = self.camera_pose();
        let aspect = self.viewport.0 as f32 / self.viewport.1 as f32;

        let depth = if self.config.depth_supported
            && state == TrackingState::Tracking
            && self.seq >= self.config.depth_warmup_frames
        {
            Some(synthesize_depth(
                &camera_pose,
                aspect,
                self.rotation,
                self.config.depth_size,
                self.seq,
            ))
        } else {
            None
        };

        let t = self.seq as f32 / 60.0;
        Frame {
            seq: self.seq,
            display_geometry_changed: std::mem::take(&mut self.geometry_dirty),
            camera_pose,
            camera_state: state,
            failure_reason: self.failure_reason(),
            viewport: self.viewport,
            rotation: self.rotation,
            plane_detected: self.plane_detected,
            depth,
            color: synthesize_color(&camera_pose, aspect, self.rotation, self.config.color_size),
            color_correction: [1.0, 1.0, 1.0, 0.9 + 0.08 * (t * 0.7).sin()],
        }
    }

    fn camera_state(&self) -> TrackingState {
        if self.forced_pause.is_some() || self.seq < self.config.camera_warmup_frames {
            TrackingState::Paused
        } else {
            TrackingState::Tracking
        }
    }

    fn failure_reason(&self) -> TrackingFailureReason {
        match self.camera_state() {
            TrackingState::Tracking => TrackingFailureReason::None,
            _ => self
                .forced_pause
                .unwrap_or(TrackingFailureReason::InsufficientFeatures),
        }
    }

    /// Camera slowly sways around the scene origin at head height.
    fn camera_pose(&self) -> Pose {
        let t = self.seq as f32 / 60.0;
        let azimuth = 0.35 * (0.3 * t).sin();
        let eye = Vec3::new(
            1.7 * azimuth.sin(),
            1.25 + 0.03 * (0.9 * t).sin(),
            1.7 * azimuth.cos(),
        );
        let view = Mat4::look_at_rh(eye, Vec3::ZERO, Vec3::Y);
        Pose::new(eye, Quat::from_mat4(&view.inverse()))
    }
}

/// One tracked frame: camera snapshot plus the images produced this tick.
///
/// Produced once per render tick and dropped at the end of it; the depth
/// image in particular can be acquired at most once.
pub struct Frame {
    seq: u64,
    display_geometry_changed: bool,
    camera_pose: Pose,
    camera_state: TrackingState,
    failure_reason: TrackingFailureReason,
    viewport: (u32, u32),
    rotation: DisplayRotation,
    plane_detected: bool,
    depth: Option<DepthImage>,
    color: ColorImage,
    color_correction: [f32; 4],
}

impl Frame {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// True exactly once after a rotation or surface-size change.
    pub fn has_display_geometry_changed(&self) -> bool {
        self.display_geometry_changed
    }

    pub fn tracking_state(&self) -> TrackingState {
        self.camera_state
    }

    pub fn failure_reason(&self) -> TrackingFailureReason {
        self.failure_reason
    }

    pub fn camera_pose(&self) -> Pose {
        self.camera_pose
    }

    /// World-to-camera matrix for this frame.
    pub fn view_matrix(&self) -> Mat4 {
        self.camera_pose.to_matrix().inverse()
    }

    /// Perspective projection matching the current viewport, depth in [0,1].
    pub fn projection_matrix(&self, near: f32, far: f32) -> Mat4 {
        let aspect = self.viewport.0 as f32 / self.viewport.1 as f32;
        Mat4::perspective_rh(FOV_Y_RAD, aspect, near, far)
    }

    /// Takes this frame's depth image. A second call, or any call before the
    /// sensor has warmed up, reports [`DepthUnavailable`].
    pub fn acquire_depth(&mut self) -> Result<DepthImage, DepthUnavailable> {
        self.depth.take().ok_or(DepthUnavailable)
    }

    pub fn color_image(&self) -> &ColorImage {
        &self.color
    }

    /// Light-estimate color correction: rgb scale factors plus average pixel
    /// intensity in the alpha channel.
    pub fn color_correction(&self) -> [f32; 4] {
        self.color_correction
    }

    /// Maps display-space NDC points to normalized texture coordinates for
    /// the current display rotation.
    pub fn map_ndc_to_texture(&self, points: &[[f32; 2]; 3]) -> [[f32; 2]; 3] {
        points.map(|p| {
            let s = display_to_sensor(self.rotation, Vec2::from(p));
            [0.5 + 0.5 * s.x, 0.5 - 0.5 * s.y]
        })
    }

    /// Ray-casts a tap at the given surface pixel against the trackables.
    /// Candidates are ordered by increasing distance from the camera.
    pub fn hit_test(&self, x_px: f32, y_px: f32) -> Vec<HitCandidate> {
        let (w, h) = (self.viewport.0 as f32, self.viewport.1 as f32);
        let ndc = Vec2::new(2.0 * x_px / w - 1.0, 1.0 - 2.0 * y_px / h);
        let aspect = w / h;
        let dir = ray_direction(&self.camera_pose, aspect, ndc);
        let origin = self.camera_pose.translation;

        let mut candidates = Vec::new();

        if self.plane_detected {
            if let Some(t) = intersect_floor(origin, dir) {
                let hit = origin + dir * t;
                candidates.push(HitCandidate {
                    target: HitTarget::Plane {
                        pose_in_polygon: hit.x.abs() <= PLANE_HALF_EXTENT_M
                            && hit.z.abs() <= PLANE_HALF_EXTENT_M,
                    },
                    pose: Pose::from_translation(hit),
                    distance: t,
                });
            }
        }

        for (point, orientation) in feature_points() {
            let along = (point - origin).dot(dir);
            if along <= 0.0 {
                continue;
            }
            let closest = origin + dir * along;
            if (closest - point).length() <= POINT_HIT_RADIUS_M {
                let rotation = match orientation {
                    PointOrientation::EstimatedSurfaceNormal => {
                        Quat::from_rotation_arc(Vec3::Y, (origin - point).normalize())
                    }
                    PointOrientation::InitializedToIdentity => Quat::IDENTITY,
                };
                candidates.push(HitCandidate {
                    target: HitTarget::Point { orientation },
                    pose: Pose::new(point, rotation),
                    distance: along,
                });
            }
        }

        candidates.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        candidates
    }
}

/// Fixed free-space feature points the tracker "sees".
fn feature_points() -> [(Vec3, PointOrientation); 2] {
    [
        (
            Vec3::new(-0.45, 0.35, -0.3),
            PointOrientation::EstimatedSurfaceNormal,
        ),
        (
            Vec3::new(0.55, 0.45, 0.25),
            PointOrientation::InitializedToIdentity,
        ),
    ]
}

/// Rotates display-space NDC into sensor-space NDC.
fn display_to_sensor(rotation: DisplayRotation, d: Vec2) -> Vec2 {
    match rotation {
        DisplayRotation::Deg0 => d,
        DisplayRotation::Deg90 => Vec2::new(d.y, -d.x),
        DisplayRotation::Deg180 => Vec2::new(-d.x, -d.y),
        DisplayRotation::Deg270 => Vec2::new(-d.y, d.x),
    }
}

/// Inverse of [`display_to_sensor`].
fn sensor_to_display(rotation: DisplayRotation, s: Vec2) -> Vec2 {
    match rotation {
        DisplayRotation::Deg0 => s,
        DisplayRotation::Deg90 => Vec2::new(-s.y, s.x),
        DisplayRotation::Deg180 => Vec2::new(-s.x, -s.y),
        DisplayRotation::Deg270 => Vec2::new(s.y, -s.x),
    }
}

/// World-space ray direction through a display NDC point.
fn ray_direction(camera: &Pose, aspect: f32, ndc: Vec2) -> Vec3 {
    let half_tan = (FOV_Y_RAD * 0.5).tan();
    let view_dir = Vec3::new(ndc.x * half_tan * aspect, ndc.y * half_tan, -1.0).normalize();
    camera.rotation * view_dir
}

/// Nearest intersection with the physical floor plane (y = 0).
fn intersect_floor(origin: Vec3, dir: Vec3) -> Option<f32> {
    if dir.y.abs() < 1e-6 {
        return None;
    }
    let t = -origin.y / dir.y;
    (t > 0.0).then_some(t)
}

/// Nearest intersection with the solid occluder sphere.
fn intersect_occluder(origin: Vec3, dir: Vec3) -> Option<f32> {
    let oc = origin - OCCLUDER_CENTER;
    let b = oc.dot(dir);
    let disc = b * b - (oc.length_squared() - OCCLUDER_RADIUS_M * OCCLUDER_RADIUS_M);
    if disc < 0.0 {
        return None;
    }
    let t = -b - disc.sqrt();
    (t > 0.0).then_some(t)
}

/// Nearest scene hit along a ray: floor or occluder, whichever is closer.
fn nearest_scene_hit(origin: Vec3, dir: Vec3) -> Option<f32> {
    match (intersect_floor(origin, dir), intersect_occluder(origin, dir)) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Renders the scene's millimetre depth into a sensor-oriented image.
fn synthesize_depth(
    camera: &Pose,
    aspect: f32,
    rotation: DisplayRotation,
    (width, height): (u32, u32),
    frame_seq: u64,
) -> DepthImage {
    let view = camera.to_matrix().inverse();
    let mut depth_mm = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        for x in 0..width {
            let u = (x as f32 + 0.5) / width as f32;
            let v = (y as f32 + 0.5) / height as f32;
            let sensor = Vec2::new(2.0 * u - 1.0, 1.0 - 2.0 * v);
            let dir = ray_direction(camera, aspect, sensor_to_display(rotation, sensor));
            let mm = match nearest_scene_hit(camera.translation, dir) {
                Some(t) => {
                    let hit = camera.translation + dir * t;
                    let view_z = view.transform_point3(hit).z;
                    (-view_z * 1000.0).clamp(0.0, u16::MAX as f32) as u16
                }
                // 0 marks "no depth data at this pixel".
                None => 0,
            };
            depth_mm.push(mm);
        }
    }
    DepthImage::from_millimeters(width, height, &depth_mm, frame_seq)
}

/// Renders a simple shaded view of the scene as the camera color feed,
/// sensor-oriented like the depth image.
fn synthesize_color(
    camera: &Pose,
    aspect: f32,
    rotation: DisplayRotation,
    (width, height): (u32, u32),
) -> ColorImage {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let u = (x as f32 + 0.5) / width as f32;
            let v = (y as f32 + 0.5) / height as f32;
            let sensor = Vec2::new(2.0 * u - 1.0, 1.0 - 2.0 * v);
            let dir = ray_direction(camera, aspect, sensor_to_display(rotation, sensor));
            let origin = camera.translation;

            let rgb = match (intersect_floor(origin, dir), intersect_occluder(origin, dir)) {
                (floor, Some(t)) if floor.map_or(true, |f| t < f) => {
                    let hit = origin + dir * t;
                    let normal = (hit - OCCLUDER_CENTER).normalize();
                    let light = normal.dot(Vec3::new(0.4, 0.8, 0.45).normalize()).max(0.15);
                    [0.75 * light, 0.45 * light, 0.25 * light]
                }
                (Some(t), _) => {
                    let hit = origin + dir * t;
                    let check =
                        ((hit.x * 2.0).floor() as i32 + (hit.z * 2.0).floor() as i32) & 1 == 0;
                    let base = if check { 0.42 } else { 0.3 };
                    let fade = (1.0 - t / 12.0).clamp(0.3, 1.0);
                    [base * fade, (base + 0.04) * fade, base * fade]
                }
                _ => {
                    let g = (0.5 + 0.5 * dir.y).clamp(0.0, 1.0);
                    [0.18 + 0.1 * g, 0.2 + 0.15 * g, 0.28 + 0.25 * g]
                }
            };
            data.extend_from_slice(&[
                (rgb[0] * 255.0) as u8,
                (rgb[1] * 255.0) as u8,
                (rgb[2] * 255.0) as u8,
                255,
            ]);
        }
    }
    ColorImage {
        width,
        height,
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::TrackedAnchor;

    fn warm_session() -> Session {
        let mut session = Session::new(SessionConfig {
            camera_warmup_frames: 0,
            plane_warmup_frames: 1,
            depth_warmup_frames: 2,
            ..SessionConfig::default()
        });
        session.set_display_geometry(DisplayRotation::Deg0, 640, 480);
        session
    }

    #[test]
    fn geometry_change_is_reported_exactly_once() {
        let mut session = warm_session();
        assert!(session.update().has_display_geometry_changed());
        assert!(!session.update().has_display_geometry_changed());

        session.set_display_geometry(DisplayRotation::Deg90, 640, 480);
        assert!(session.update().has_display_geometry_changed());
        assert!(!session.update().has_display_geometry_changed());
    }

    #[test]
    fn depth_is_unavailable_until_warmup_then_sized_to_config() {
        let mut session = warm_session();
        let mut first = session.update();
        assert!(first.acquire_depth().is_err());

        let mut second = session.update();
        let depth = second.acquire_depth().expect("depth after warmup");
        assert_eq!((depth.width, depth.height), (160, 120));
        assert_eq!(depth.data.len(), 160 * 120 * 2);
        // Double acquisition within one tick is refused.
        assert!(second.acquire_depth().is_err());

        // The center of the image looks at the scene, so it carries data.
        assert!(depth.depth_mm_at(80, 60) > 0);
    }

    #[test]
    fn center_tap_hits_the_floor_inside_its_polygon() {
        let mut session = warm_session();
        session.update();
        let frame = session.update();
        assert!(session.has_tracking_plane());

        let hits = frame.hit_test(320.0, 240.0);
        assert!(!hits.is_empty());
        let first = &hits[0];
        assert!(matches!(
            first.target,
            HitTarget::Plane {
                pose_in_polygon: true
            }
        ));
        assert!(first.distance > 0.0);
        assert!(first.pose.translation.y.abs() < 1e-3);
        // Ordered nearest-first.
        for pair in hits.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[test]
    fn ndc_basis_maps_per_rotation() {
        let mut session = warm_session();
        let frame = session.update();
        let basis = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];

        let mapped = frame.map_ndc_to_texture(&basis);
        assert_eq!(mapped[0], [0.5, 0.5]);
        assert_eq!(mapped[1], [1.0, 0.5]);
        assert_eq!(mapped[2], [0.5, 0.0]);

        session.set_display_geometry(DisplayRotation::Deg180, 640, 480);
        let frame = session.update();
        let mapped = frame.map_ndc_to_texture(&basis);
        assert_eq!(mapped[0], [0.5, 0.5]);
        assert_eq!(mapped[1], [0.0, 0.5]);
        assert_eq!(mapped[2], [0.5, 1.0]);
    }

    #[test]
    fn sensor_mapping_round_trips_for_every_rotation() {
        let p = Vec2::new(0.3, -0.7);
        for rotation in [
            DisplayRotation::Deg0,
            DisplayRotation::Deg90,
            DisplayRotation::Deg180,
            DisplayRotation::Deg270,
        ] {
            let there = display_to_sensor(rotation, p);
            let back = sensor_to_display(rotation, there);
            assert!((back - p).length() < 1e-6, "rotation {rotation:?}");
        }
    }

    #[test]
    fn paused_camera_pauses_anchors_but_not_detached_ones() {
        let mut session = warm_session();
        session.update();
        let kept = session.create_anchor(Pose::IDENTITY);
        let dropped = session.create_anchor(Pose::IDENTITY);
        dropped.detach();

        session.pause_tracking(TrackingFailureReason::ExcessiveMotion);
        let frame = session.update();
        assert_eq!(frame.tracking_state(), TrackingState::Paused);
        assert_eq!(
            frame.failure_reason(),
            TrackingFailureReason::ExcessiveMotion
        );
        assert_eq!(kept.tracking_state(), TrackingState::Paused);
        assert_eq!(dropped.tracking_state(), TrackingState::Stopped);

        session.resume_tracking();
        session.update();
        assert_eq!(kept.tracking_state(), TrackingState::Tracking);
        assert_eq!(dropped.tracking_state(), TrackingState::Stopped);
    }

    #[test]
    fn no_tracking_plane_before_warmup() {
        let mut session = Session::new(SessionConfig {
            camera_warmup_frames: 0,
            plane_warmup_frames: 100,
            ..SessionConfig::default()
        });
        session.set_display_geometry(DisplayRotation::Deg0, 640, 480);
        let frame = session.update();
        assert!(!session.has_tracking_plane());
        assert!(frame.hit_test(320.0, 240.0).is_empty());
    }
}
