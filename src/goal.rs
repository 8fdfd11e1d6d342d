//! Start points (fluid sources) and the end point (collector).

use crate::collider::{circle_overlaps_obb, point_in_obb};
use crate::components::{Rgba, Transform};
use crate::config::GoalParams;
use crate::fluid::{FluidPools, FluidType};
use bevy_ecs::prelude::*;
use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Visual kind of a goal point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoalKind {
    Pipe,
    Flower,
}

/// Which way a goal point faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoalDirection {
    Up,
    Down,
    Left,
    Right,
}

impl GoalDirection {
    /// Rotation in degrees, with Up as the unrotated sprite.
    pub fn degrees(self) -> f32 {
        match self {
            GoalDirection::Up => 0.0,
            GoalDirection::Left => 90.0,
            GoalDirection::Down => 180.0,
            GoalDirection::Right => 270.0,
        }
    }
}

pub const START_POINT_COLOR: Rgba = Rgba::rgb(0.5, 0.5, 0.5);
pub const END_POINT_COLOR: Rgba = Rgba::rgb(1.0, 0.0, 0.0);

/// A start or end point. The collider box matches the point's size and is
/// not rotated with the sprite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GoalPoint {
    pub transform: Transform,
    pub size: Vec2,
    pub kind: GoalKind,
    pub direction: GoalDirection,
    /// Fluid released by a start point.
    pub fluid: FluidType,
    /// Whether a start point is currently releasing fluid.
    pub releasing: bool,
    /// Set on a toggle click, cleared on button release.
    pub click_latch: bool,
    spawn_timer: f32,
}

impl GoalPoint {
    pub fn new(position: Vec2, size: Vec2, kind: GoalKind, direction: GoalDirection) -> Self {
        Self {
            transform: Transform::from_degrees(position, size, direction.degrees()),
            size,
            kind,
            direction,
            fluid: FluidType::Water,
            releasing: false,
            click_latch: false,
            spawn_timer: 0.0,
        }
    }

    pub fn with_fluid(mut self, fluid: FluidType) -> Self {
        self.fluid = fluid;
        self
    }

    pub fn position(&self) -> Vec2 {
        self.transform.position
    }

    fn collider_frame(&self) -> Transform {
        Transform::new(self.transform.position, self.size, 0.0)
    }

    pub fn contains_point(&self, point: Vec2) -> bool {
        point_in_obb(point, &self.collider_frame(), self.size * 0.5)
    }

    pub fn overlaps_circle(&self, center: Vec2, radius: f32) -> bool {
        circle_overlaps_obb(center, radius, &self.collider_frame(), self.size * 0.5)
    }
}

/// Goal state of the running level.
#[derive(Resource, Debug, Clone, Default)]
pub struct GoalPoints {
    pub start_points: Vec<GoalPoint>,
    pub end_point: Option<GoalPoint>,
    /// Particles consumed by the end point.
    pub collected: u32,
    /// Particles released by start points.
    pub spawned: u32,
    pub won: bool,
}

impl GoalPoints {
    pub fn add_start_point(&mut self, point: GoalPoint) {
        self.start_points.push(point);
    }

    pub fn set_end_point(&mut self, point: GoalPoint) {
        self.end_point = Some(point);
    }

    /// Toggle the first start point under the cursor that is not latched.
    /// Returns whether a start point toggled.
    pub fn toggle_at(&mut self, cursor: Vec2) -> bool {
        let Some(point) = self
            .start_points
            .iter_mut()
            .find(|p| !p.click_latch && p.contains_point(cursor))
        else {
            return false;
        };
        point.releasing = !point.releasing;
        point.click_latch = true;
        log::debug!(
            "start point at ({:.0}, {:.0}) releasing={}",
            point.position().x,
            point.position().y,
            point.releasing
        );
        true
    }

    /// Clear every start point's click latch.
    pub fn release_click(&mut self) {
        for point in &mut self.start_points {
            point.click_latch = false;
        }
    }

    /// Spawn from every releasing start point whose interval elapsed.
    ///
    /// Particles appear just below the point with a random horizontal offset
    /// across its width. Spawning stops once `particle_max_count` particles
    /// have been released in total. Returns the number spawned.
    pub fn spawn_due(
        &mut self,
        dt: f32,
        params: &GoalParams,
        pools: &mut FluidPools,
        rng: &mut impl Rng,
    ) -> u32 {
        let mut spawned = 0;
        for point in self.start_points.iter_mut().filter(|p| p.releasing) {
            point.spawn_timer -= dt;
            if point.spawn_timer > 0.0 {
                continue;
            }
            point.spawn_timer = params.spawn_interval;
            if self.spawned >= params.particle_max_count {
                continue;
            }

            let pos = point.position();
            let x = pos.x + rng.gen::<f32>() * point.size.x - point.size.x * 0.5;
            let y = pos.y - point.size.y * 0.5 - params.spawn_radius;
            pools.spawn(point.fluid, Vec2::new(x, y), params.spawn_radius);
            self.spawned += 1;
            spawned += 1;
        }
        spawned
    }

    /// Remove every particle touching the end point and count it as collected.
    pub fn consume(&mut self, pools: &mut FluidPools) -> u32 {
        let Some(end) = self.end_point else {
            return 0;
        };
        let mut consumed = 0;
        for kind in FluidType::ALL {
            consumed += pools.swap_remove_where(kind, |p| end.overlaps_circle(p.position(), p.radius)) as u32;
        }
        self.collected += consumed;
        consumed
    }

    /// Whether enough particles were collected: `collected / max >= num / den`.
    pub fn check_win(&self, params: &GoalParams) -> bool {
        let (num, den) = params.win_ratio;
        u64::from(self.collected) * u64::from(den) >= u64::from(params.particle_max_count) * u64::from(num)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn pipe() -> GoalPoint {
        GoalPoint::new(Vec2::new(-650.0, 400.0), Vec2::splat(50.0), GoalKind::Pipe, GoalDirection::Down)
    }

    fn flower() -> GoalPoint {
        GoalPoint::new(Vec2::new(650.0, -400.0), Vec2::splat(50.0), GoalKind::Flower, GoalDirection::Up)
    }

    #[test]
    fn test_win_threshold() {
        let params = GoalParams::default();
        let mut goals = GoalPoints {
            collected: 99,
            ..Default::default()
        };
        assert!(!goals.check_win(&params));
        goals.collected = 100;
        assert!(goals.check_win(&params));
    }

    #[test]
    fn test_toggle_latches_until_release() {
        let mut goals = GoalPoints::default();
        goals.add_start_point(pipe());

        assert!(goals.toggle_at(Vec2::new(-640.0, 410.0)));
        assert!(goals.start_points[0].releasing);
        // Held button: same click does nothing.
        assert!(!goals.toggle_at(Vec2::new(-640.0, 410.0)));
        assert!(goals.start_points[0].releasing);

        goals.release_click();
        assert!(goals.toggle_at(Vec2::new(-640.0, 410.0)));
        assert!(!goals.start_points[0].releasing);

        goals.release_click();
        assert!(!goals.toggle_at(Vec2::new(0.0, 0.0)));
    }

    #[test]
    fn test_spawn_cadence_and_placement() {
        let params = GoalParams::default();
        let mut rng = SmallRng::seed_from_u64(1);
        let mut pools = FluidPools::default();
        let mut goals = GoalPoints::default();
        goals.add_start_point(pipe());

        // Not releasing yet.
        assert_eq!(goals.spawn_due(0.1, &params, &mut pools, &mut rng), 0);

        goals.start_points[0].releasing = true;
        assert_eq!(goals.spawn_due(0.01, &params, &mut pools, &mut rng), 1);
        assert_eq!(goals.spawn_due(0.01, &params, &mut pools, &mut rng), 0);
        assert_eq!(goals.spawn_due(0.02, &params, &mut pools, &mut rng), 1);

        for p in pools.pool(FluidType::Water) {
            assert!(p.position().x >= -675.0 && p.position().x <= -625.0);
            assert_eq!(p.position().y, 400.0 - 25.0 - 5.0);
        }
    }

    #[test]
    fn test_spawn_stops_at_budget() {
        let params = GoalParams {
            particle_max_count: 3,
            ..Default::default()
        };
        let mut rng = SmallRng::seed_from_u64(1);
        let mut pools = FluidPools::default();
        let mut goals = GoalPoints::default();
        goals.add_start_point(pipe());
        goals.start_points[0].releasing = true;

        for _ in 0..10 {
            goals.spawn_due(params.spawn_interval, &params, &mut pools, &mut rng);
        }
        assert_eq!(pools.count(FluidType::Water), 3);
        assert_eq!(goals.spawned, 3);
    }

    #[test]
    fn test_consume_counts_every_touching_particle() {
        let mut pools = FluidPools::default();
        let mut goals = GoalPoints::default();
        goals.set_end_point(flower());

        // Inside, outside, inside, inside, outside: consecutive hits force a
        // swapped-in particle to be tested at the same index.
        for x in [650.0, 0.0, 660.0, 640.0, 100.0] {
            pools.spawn(FluidType::Water, Vec2::new(x, -400.0), 5.0);
        }
        pools.spawn(FluidType::Lava, Vec2::new(650.0, -378.0), 5.0);

        assert_eq!(goals.consume(&mut pools), 4);
        assert_eq!(goals.collected, 4);
        assert_eq!(pools.count(FluidType::Water), 2);
        assert_eq!(pools.count(FluidType::Lava), 0);
    }

    #[test]
    fn test_consume_without_end_point() {
        let mut pools = FluidPools::default();
        pools.spawn(FluidType::Water, Vec2::ZERO, 5.0);
        let mut goals = GoalPoints::default();
        assert_eq!(goals.consume(&mut pools), 0);
        assert_eq!(pools.count(FluidType::Water), 1);
    }
}
