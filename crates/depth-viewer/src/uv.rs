//! Derives and caches the NDC -> texture-coordinate transform.

use glam::{Mat3, Vec2};

/// Reference points spanning normalized device space: origin, +X endpoint,
/// +Y endpoint.
const NDC_BASIS: [[f32; 2]; 3] = [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];

/// Computes the affine mapping from display NDC to texture coordinates.
///
/// The mapping changes only when the display geometry does (rotation or
/// surface resize), so it is recomputed exactly then — and once on first
/// use — and cached in between. Recomputing every frame is waste;
/// recomputing too rarely leaves the camera feed misaligned after a
/// rotation.
pub struct UvTransformCalculator {
    cached: Option<Mat3>,
}

impl UvTransformCalculator {
    pub fn new() -> Self {
        Self { cached: None }
    }

    /// Returns a fresh transform when the geometry changed or none was ever
    /// computed; `None` means the cached value is still valid.
    ///
    /// `map` is the external display-to-texture primitive. It already
    /// encodes the device rotation, which is what lets this derivation work
    /// for all four rotations without branching: the basis points come back
    /// pre-rotated, and the affine matrix simply reads the new basis off
    /// them. `texture = M * ndc`, third row fixed at [0, 0, 1].
    pub fn recompute(
        &mut self,
        geometry_changed: bool,
        map: impl FnOnce(&[[f32; 2]; 3]) -> [[f32; 2]; 3],
    ) -> Option<Mat3> {
        if !geometry_changed && self.cached.is_some() {
            return None;
        }

        let [o, x, y] = map(&NDC_BASIS);
        let origin = Vec2::from(o);
        let basis_x = Vec2::from(x) - origin;
        let basis_y = Vec2::from(y) - origin;

        let m = Mat3::from_cols(
            basis_x.extend(0.0),
            basis_y.extend(0.0),
            origin.extend(1.0),
        );
        self.cached = Some(m);
        Some(m)
    }

    /// Most recently computed transform, if any.
    pub fn current(&self) -> Option<Mat3> {
        self.cached
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    /// Identity-style mapping: NDC into [0,1] with a flipped v axis.
    fn unrotated(points: &[[f32; 2]; 3]) -> [[f32; 2]; 3] {
        points.map(|p| [0.5 + 0.5 * p[0], 0.5 - 0.5 * p[1]])
    }

    /// Mapping for a display rotated 90 degrees: (x, y) -> (y, -x) before
    /// the texture normalization.
    fn rotated_90(points: &[[f32; 2]; 3]) -> [[f32; 2]; 3] {
        points.map(|p| [0.5 + 0.5 * p[1], 0.5 + 0.5 * p[0]])
    }

    #[test]
    fn recomputes_exactly_once_per_true_transition() {
        let mut calc = UvTransformCalculator::new();

        // First call computes regardless of the flag.
        assert!(calc.recompute(false, unrotated).is_some());
        // Unchanged geometry keeps the cache.
        assert!(calc.recompute(false, unrotated).is_none());
        assert!(calc.recompute(false, unrotated).is_none());
        // A change produces a value exactly once.
        assert!(calc.recompute(true, rotated_90).is_some());
        assert!(calc.recompute(false, rotated_90).is_none());
    }

    #[test]
    fn transform_agrees_with_the_mapping_primitive() {
        let mut calc = UvTransformCalculator::new();
        let m = calc.recompute(true, unrotated).unwrap();

        for probe in [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [-0.3, 0.7]] {
            let via_matrix = m * Vec3::new(probe[0], probe[1], 1.0);
            let direct = unrotated(&[probe, probe, probe])[0];
            assert!((via_matrix.x - direct[0]).abs() < 1e-6);
            assert!((via_matrix.y - direct[1]).abs() < 1e-6);
            assert!((via_matrix.z - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn rotated_mapping_produces_a_rotated_basis() {
        let mut calc = UvTransformCalculator::new();
        let m = calc.recompute(true, rotated_90).unwrap();

        // The NDC +X axis now advances the texture v coordinate.
        let x_axis = m * Vec3::new(1.0, 0.0, 1.0);
        assert!((x_axis.x - 0.5).abs() < 1e-6);
        assert!((x_axis.y - 1.0).abs() < 1e-6);
    }
}
