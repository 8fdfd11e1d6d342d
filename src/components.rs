//! Shared data types for everything placed in the world.
//!
//! Particles, terrain cells, portals and goal points all carry a `Transform`.
//! Systems read and write these through the owning resources.

use glam::{Mat3, Vec2};
use serde::{Deserialize, Serialize};

// ============================================================================
// SPATIAL
// ============================================================================

/// Position, scale and rotation of a world object plus its cached world matrix.
///
/// Rotation is stored in radians. The matrix is `translate * rotate * scale`
/// and must be refreshed with [`Transform::refresh`] after the fields change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec2,
    pub scale: Vec2,
    pub rotation: f32,
    pub world: Mat3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::new(Vec2::ZERO, Vec2::ONE, 0.0)
    }
}

impl Transform {
    pub fn new(position: Vec2, scale: Vec2, rotation: f32) -> Self {
        let mut transform = Self {
            position,
            scale,
            rotation,
            world: Mat3::IDENTITY,
        };
        transform.refresh();
        transform
    }

    /// Build from a rotation in degrees.
    pub fn from_degrees(position: Vec2, scale: Vec2, degrees: f32) -> Self {
        Self::new(position, scale, degrees.to_radians())
    }

    /// Recompute the cached world matrix.
    #[inline]
    pub fn refresh(&mut self) {
        self.world = Mat3::from_scale_angle_translation(self.scale, self.rotation, self.position);
    }

    /// Map a point in the unit local frame to world space (scale, rotate, translate).
    #[inline]
    pub fn local_to_world(&self, local: Vec2) -> Vec2 {
        self.world.transform_point2(local)
    }

    /// Unit vector along the local +x axis.
    #[inline]
    pub fn facing(&self) -> Vec2 {
        Vec2::from_angle(self.rotation)
    }

    /// Express a world point in this transform's rotated (but unscaled) frame.
    #[inline]
    pub fn to_local_unscaled(&self, world: Vec2) -> Vec2 {
        Vec2::from_angle(-self.rotation).rotate(world - self.position)
    }
}

// ============================================================================
// APPEARANCE
// ============================================================================

/// RGBA colour in the 0..1 range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::new(r, g, b, 1.0)
    }

    pub const WHITE: Rgba = Rgba::rgb(1.0, 1.0, 1.0);

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for Rgba {
    fn default() -> Self {
        Self::WHITE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec2, b: Vec2) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn test_local_to_world_scales_then_rotates() {
        let t = Transform::from_degrees(Vec2::new(10.0, 0.0), Vec2::new(2.0, 4.0), 90.0);
        // (0.5, 0) scaled -> (1, 0), rotated 90 -> (0, 1), translated
        assert!(approx(t.local_to_world(Vec2::new(0.5, 0.0)), Vec2::new(10.0, 1.0)));
        assert!(approx(t.facing(), Vec2::new(0.0, 1.0)));
    }

    #[test]
    fn test_to_local_unscaled_inverts_rotation() {
        let t = Transform::from_degrees(Vec2::new(3.0, -2.0), Vec2::splat(5.0), 30.0);
        let local = Vec2::new(1.5, -0.25);
        let world = t.position + Vec2::from_angle(t.rotation).rotate(local);
        assert!(approx(t.to_local_unscaled(world), local));
    }

    #[test]
    fn test_refresh_tracks_position() {
        let mut t = Transform::default();
        t.position = Vec2::new(7.0, 8.0);
        t.refresh();
        assert!(approx(t.local_to_world(Vec2::ZERO), Vec2::new(7.0, 8.0)));
    }
}
