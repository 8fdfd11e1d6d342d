//! Portal system: keep a portal waiting for a partner and teleport particles.

use crate::config::SimConfig;
use crate::fluid::FluidPools;
use crate::portal::PortalRegistry;
use bevy_ecs::prelude::*;

pub fn portal_teleport_system(
    config: Res<SimConfig>,
    mut portals: ResMut<PortalRegistry>,
    mut pools: ResMut<FluidPools>,
) {
    portals.refresh_current();
    let teleported = portals.teleport_particles(&mut pools, &config.portal);
    if teleported > 0 {
        log::trace!("{} particles teleported", teleported);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Rgba;
    use crate::fluid::FluidType;
    use crate::portal::Portal;
    use glam::Vec2;

    #[test]
    fn test_system_promotes_orphan_and_teleports() {
        let config = SimConfig::default();
        let mut world = World::new();
        world.insert_resource(FluidPools::new(&config.fluid));
        world.insert_resource(config);

        let mut registry = PortalRegistry::new();
        let a = registry.setup(Portal::new(Vec2::ZERO, Vec2::new(30.0, 60.0), 0.0, Rgba::WHITE, 0.9));
        let b = registry.setup(Portal::new(Vec2::new(200.0, 0.0), Vec2::new(30.0, 60.0), 0.0, Rgba::WHITE, 0.9));
        let c = registry.setup(Portal::new(Vec2::new(-200.0, 0.0), Vec2::new(30.0, 60.0), 0.0, Rgba::WHITE, 0.9));
        registry.remove(c);
        registry.remove(b);
        assert_eq!(registry.current(), None);
        world.insert_resource(registry);

        let mut schedule = Schedule::default();
        schedule.add_systems(portal_teleport_system);
        schedule.run(&mut world);
        assert_eq!(world.resource::<PortalRegistry>().current(), Some(a));

        let b = world
            .resource_mut::<PortalRegistry>()
            .setup(Portal::new(Vec2::new(200.0, 0.0), Vec2::new(30.0, 60.0), 0.0, Rgba::WHITE, 0.9));
        world.resource_mut::<FluidPools>().spawn(FluidType::Water, Vec2::new(200.0, 0.0), 5.0);
        schedule.run(&mut world);

        assert_eq!(world.resource::<PortalRegistry>().get(a).unwrap().linked, Some(b));
        let p = world.resource::<FluidPools>().pool(FluidType::Water)[0];
        assert!(p.position().x.abs() < 1.0);
        assert!(p.portal_iframe);
    }
}
