//! Paired portals.
//!
//! Portals live in a [`PortalRegistry`] and refer to their partner by
//! [`PortalId`], a generational index into the registry. Portals are created
//! in pairs: the first of a pair waits as the registry's "current" portal and
//! the next one links to it. Removal only happens through
//! [`PortalRegistry::remove`], which also unlinks the partner.

use crate::collider::{circle_overlaps_obb, point_in_obb};
use crate::components::{Rgba, Transform};
use crate::config::PortalParams;
use crate::fluid::{FluidParticle, FluidPools, FluidType};
use bevy_ecs::prelude::*;
use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Generational handle to a portal slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortalId {
    pub index: u32,
    pub generation: u32,
}

/// A single portal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Portal {
    pub transform: Transform,
    /// Collider box size (a fraction of the transform scale).
    pub collider_size: Vec2,
    pub color: Rgba,
    pub linked: Option<PortalId>,
}

impl Portal {
    pub fn new(position: Vec2, scale: Vec2, rotation_deg: f32, color: Rgba, collider_fraction: f32) -> Self {
        Self {
            transform: Transform::from_degrees(position, scale, rotation_deg),
            collider_size: scale * collider_fraction,
            color,
            linked: None,
        }
    }

    #[inline]
    fn half_extents(&self) -> Vec2 {
        self.collider_size * 0.5
    }

    /// Oriented circle overlap against the portal's collider.
    pub fn overlaps_circle(&self, center: Vec2, radius: f32) -> bool {
        circle_overlaps_obb(center, radius, &self.transform, self.half_extents())
    }

    /// Oriented point hit test against the portal's collider.
    pub fn contains_point(&self, point: Vec2) -> bool {
        point_in_obb(point, &self.transform, self.half_extents())
    }
}

/// Outcome of a placement click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortalClick {
    /// Click ignored until the button is released.
    Latched,
    Removed(PortalId),
    Placed(PortalId),
}

#[derive(Debug, Clone, Default)]
struct Slot {
    generation: u32,
    portal: Option<Portal>,
}

/// Every portal of the running level.
#[derive(Resource, Debug, Clone, Default)]
pub struct PortalRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    /// Portal waiting for a partner.
    current: Option<PortalId>,
    /// Set on a placement click, cleared on button release.
    click_latch: bool,
    /// Rotation (degrees) for the next placed portal.
    placement_rotation: f32,
}

impl PortalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: PortalId) -> Option<&Portal> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.portal.as_ref())
    }

    fn get_mut(&mut self, id: PortalId) -> Option<&mut Portal> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.portal.as_mut())
    }

    pub fn contains(&self, id: PortalId) -> bool {
        self.get(id).is_some()
    }

    /// Live portals in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (PortalId, &Portal)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.portal.as_ref().map(|portal| {
                (
                    PortalId {
                        index: i as u32,
                        generation: slot.generation,
                    },
                    portal,
                )
            })
        })
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn current(&self) -> Option<PortalId> {
        self.current
    }

    pub fn placement_rotation(&self) -> f32 {
        self.placement_rotation
    }

    fn insert(&mut self, portal: Portal) -> PortalId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.portal = Some(portal);
            PortalId {
                index,
                generation: slot.generation,
            }
        } else {
            self.slots.push(Slot {
                generation: 0,
                portal: Some(portal),
            });
            PortalId {
                index: (self.slots.len() - 1) as u32,
                generation: 0,
            }
        }
    }

    /// Add a portal and pair it.
    ///
    /// With no portal waiting, the new one becomes current. Otherwise it links
    /// both ways with the current portal, adopts its colour and current is
    /// cleared.
    pub fn setup(&mut self, mut portal: Portal) -> PortalId {
        let waiting = self.current.and_then(|id| self.get(id).map(|p| (id, p.color)));
        match waiting {
            None => {
                let id = self.insert(portal);
                self.current = Some(id);
                log::debug!("portal {:?} placed, waiting for a partner", id);
                id
            }
            Some((partner, color)) => {
                portal.color = color;
                portal.linked = Some(partner);
                let id = self.insert(portal);
                if let Some(p) = self.get_mut(partner) {
                    p.linked = Some(id);
                }
                self.current = None;
                log::debug!("portal {:?} linked with {:?}", id, partner);
                id
            }
        }
    }

    /// Remove a portal, unlinking its partner and clearing current if needed.
    pub fn remove(&mut self, id: PortalId) -> Option<Portal> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)?;
        let portal = slot.portal.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);

        if let Some(partner) = portal.linked.and_then(|p| self.get_mut(p)) {
            partner.linked = None;
        }
        if self.current == Some(id) {
            self.current = None;
        }
        log::debug!("portal {:?} removed", id);
        Some(portal)
    }

    /// With no portal waiting, promote the first unlinked portal to current.
    pub fn refresh_current(&mut self) {
        if self.current.is_some_and(|id| self.contains(id)) {
            return;
        }
        let next = self
            .iter()
            .find(|(_, portal)| portal.linked.is_none())
            .map(|(id, _)| id);
        self.current = next;
    }

    /// Linked (entry, exit) portal pairs, each direction listed once.
    pub fn linked_pairs(&self) -> Vec<(Portal, Portal)> {
        self.iter()
            .filter_map(|(_, entry)| {
                let exit = self.get(entry.linked?)?;
                Some((*entry, *exit))
            })
            .collect()
    }

    /// Teleport every eligible particle that touches a linked portal.
    ///
    /// Particles under portal immunity are skipped. A teleported particle
    /// starts its immunity window and is not tested against further portals
    /// this frame. Returns the number of teleports.
    pub fn teleport_particles(&self, pools: &mut FluidPools, params: &PortalParams) -> usize {
        let pairs = self.linked_pairs();
        if pairs.is_empty() {
            return 0;
        }

        let mut teleported = 0;
        for kind in FluidType::ALL {
            for particle in pools.pool_mut(kind).iter_mut() {
                if particle.portal_iframe {
                    continue;
                }
                let hit = pairs
                    .iter()
                    .find(|(entry, _)| entry.overlaps_circle(particle.position(), particle.radius));
                if let Some((entry, exit)) = hit {
                    teleport(particle, entry, exit, params.exit_boost);
                    teleported += 1;
                }
            }
        }
        teleported
    }

    /// Handle a placement click at a world point.
    ///
    /// Clicking an existing portal removes it, clicking elsewhere places a new
    /// portal with the current placement rotation. Further clicks are ignored
    /// until [`PortalRegistry::release_click`].
    pub fn click(&mut self, cursor: Vec2, params: &PortalParams, rng: &mut impl Rng) -> PortalClick {
        if self.click_latch {
            return PortalClick::Latched;
        }
        self.click_latch = true;

        let hit = self
            .iter()
            .find(|(_, portal)| portal.contains_point(cursor))
            .map(|(id, _)| id);
        if let Some(id) = hit {
            self.remove(id);
            return PortalClick::Removed(id);
        }

        let color = Rgba::rgb(rng.gen(), rng.gen(), rng.gen());
        let portal = Portal::new(
            cursor,
            params.placement_scale,
            self.placement_rotation,
            color,
            params.collider_fraction,
        );
        PortalClick::Placed(self.setup(portal))
    }

    pub fn release_click(&mut self) {
        self.click_latch = false;
    }

    /// Advance the placement rotation, wrapping to 0 at a full turn.
    pub fn rotate_placement(&mut self, step_deg: f32) {
        self.placement_rotation += step_deg;
        if self.placement_rotation >= 360.0 {
            self.placement_rotation = 0.0;
        }
    }

    pub fn clear(&mut self) {
        *self = Self {
            placement_rotation: self.placement_rotation,
            ..Self::default()
        };
    }
}

/// Map a particle from `entry` to `exit`.
///
/// The offset from the entry centre is divided by the entry scale, expressed
/// in the entry's rotated frame, rotated into the exit's frame and placed at
/// the exit centre. Velocity leaves along the exit's facing with the incoming
/// speed plus `boost`.
pub fn teleport(particle: &mut FluidParticle, entry: &Portal, exit: &Portal, boost: f32) {
    let relative = (particle.position() - entry.transform.position) / entry.transform.scale;
    let normalized = Vec2::from_angle(-entry.transform.rotation).rotate(relative);
    let adjusted = Vec2::from_angle(exit.transform.rotation).rotate(normalized);

    particle.transform.position = exit.transform.position + adjusted;
    let speed = particle.velocity.length();
    particle.velocity = exit.transform.facing() * (speed + boost);
    particle.start_iframe();
}
