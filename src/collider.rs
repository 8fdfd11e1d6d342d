//! Collider primitives and narrow-phase geometry.
//!
//! Terrain colliders are expressed in a cell's unit local frame (corners at
//! ±0.5) and mapped to world space with the owning cell's transform. The
//! narrow phase returns a [`Contact`] whose normal points from the collider
//! toward the circle centre.

use crate::components::Transform;
use glam::Vec2;

const MIN_DIST_SQ: f32 = 1e-8;
const DEGENERATE_EPS: f32 = 1e-8;

/// Fallback contact normal when the geometry gives no direction.
pub const FALLBACK_NORMAL: Vec2 = Vec2::Y;

/// Circle with a local-frame offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircleShape {
    pub offset: Vec2,
    pub radius: f32,
}

/// Axis-aligned box described by a local-frame offset and full size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxShape {
    pub offset: Vec2,
    pub size: Vec2,
}

/// Triangle in local-frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleShape {
    pub vertices: [Vec2; 3],
}

/// A single collider slot. Terrain cells hold up to three.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Collider2D {
    #[default]
    Empty,
    Circle(CircleShape),
    Box(BoxShape),
    Triangle(TriangleShape),
}

impl Collider2D {
    pub const fn aabb(offset: Vec2, size: Vec2) -> Self {
        Collider2D::Box(BoxShape { offset, size })
    }

    pub const fn triangle(a: Vec2, b: Vec2, c: Vec2) -> Self {
        Collider2D::Triangle(TriangleShape { vertices: [a, b, c] })
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Collider2D::Empty)
    }

    /// Test a world-space circle against this collider placed by `cell`.
    ///
    /// Boxes are treated as axis-aligned (offset and size scale with the
    /// cell). Triangle vertices go through the full cell transform.
    /// Circles are not used as terrain colliders and never report a hit.
    pub fn contact_with_circle(&self, cell: &Transform, center: Vec2, radius: f32) -> Option<Contact> {
        match self {
            Collider2D::Box(shape) => {
                let box_center = cell.position + shape.offset * cell.scale;
                let half_extents = shape.size * cell.scale * 0.5;
                circle_vs_aabb(center, radius, box_center, half_extents)
            }
            Collider2D::Triangle(shape) => {
                let [a, b, c] = shape.vertices.map(|v| cell.local_to_world(v));
                circle_vs_triangle(center, radius, a, b, c)
            }
            Collider2D::Empty | Collider2D::Circle(_) => None,
        }
    }
}

/// Result of a circle overlap test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// Unit vector pointing from the collider surface toward the circle centre.
    pub normal: Vec2,
    /// How far the circle must move along `normal` to just touch.
    pub penetration: f32,
}

impl Contact {
    fn from_closest_point(center: Vec2, radius: f32, closest: Vec2) -> Option<Contact> {
        let delta = center - closest;
        let dist_sq = delta.length_squared();
        if dist_sq > radius * radius {
            return None;
        }
        let dist = dist_sq.max(MIN_DIST_SQ).sqrt();
        Some(Contact {
            normal: (delta / dist).try_normalize().unwrap_or(FALLBACK_NORMAL),
            penetration: radius - dist,
        })
    }
}

/// Closest point to `p` on segment `ab`. Degenerate segments collapse to `a`.
pub fn closest_point_on_segment(p: Vec2, a: Vec2, b: Vec2) -> Vec2 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= DEGENERATE_EPS {
        return a;
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Barycentric point-in-triangle test. Degenerate triangles contain nothing.
pub fn point_in_triangle(p: Vec2, a: Vec2, b: Vec2, c: Vec2) -> bool {
    let v0 = c - a;
    let v1 = b - a;
    let v2 = p - a;

    let dot00 = v0.dot(v0);
    let dot01 = v0.dot(v1);
    let dot02 = v0.dot(v2);
    let dot11 = v1.dot(v1);
    let dot12 = v1.dot(v2);

    let denom = dot00 * dot11 - dot01 * dot01;
    if denom.abs() < DEGENERATE_EPS {
        return false;
    }
    let inv = 1.0 / denom;
    let u = (dot11 * dot02 - dot01 * dot12) * inv;
    let v = (dot00 * dot12 - dot01 * dot02) * inv;
    u >= 0.0 && v >= 0.0 && u + v <= 1.0
}

/// Circle against an axis-aligned box given by centre and half extents.
///
/// A centre inside the box has no closest surface direction and reports the
/// fallback (upward) normal with a penetration of about one radius.
pub fn circle_vs_aabb(center: Vec2, radius: f32, box_center: Vec2, half_extents: Vec2) -> Option<Contact> {
    let closest = center.clamp(box_center - half_extents, box_center + half_extents);
    Contact::from_closest_point(center, radius, closest)
}

/// Circle against a triangle. Inside the triangle the centre is its own
/// closest point; otherwise the nearest of the three edge points is used.
pub fn circle_vs_triangle(center: Vec2, radius: f32, a: Vec2, b: Vec2, c: Vec2) -> Option<Contact> {
    let closest = if point_in_triangle(center, a, b, c) {
        center
    } else {
        [(a, b), (b, c), (c, a)]
            .into_iter()
            .map(|(p, q)| closest_point_on_segment(center, p, q))
            .min_by(|p, q| {
                center
                    .distance_squared(*p)
                    .total_cmp(&center.distance_squared(*q))
            })
            .unwrap_or(a)
    };
    Contact::from_closest_point(center, radius, closest)
}

/// Circle against a box that may be rotated (used by portals and goal points).
pub fn circle_overlaps_obb(center: Vec2, radius: f32, frame: &Transform, half_extents: Vec2) -> bool {
    let local = frame.to_local_unscaled(center);
    let closest = local.clamp(-half_extents, half_extents);
    local.distance_squared(closest) < radius * radius
}

/// Point inside a possibly rotated box.
pub fn point_in_obb(point: Vec2, frame: &Transform, half_extents: Vec2) -> bool {
    let local = frame.to_local_unscaled(point);
    local.x.abs() <= half_extents.x && local.y.abs() <= half_extents.y
}
