//! Input systems: terrain edits, start-point toggles and portal placement.
//!
//! These run in their own schedule before the frame schedule, so every
//! terrain edit is fully rebuilt before the next collision query.

use crate::config::SimConfig;
use crate::goal::GoalPoints;
use crate::input::FrameInput;
use crate::portal::PortalRegistry;
use crate::systems::fluid::SimRng;
use crate::terrain::TerrainLayers;
use bevy_ecs::prelude::*;

/// Destroy destructible terrain around the cursor while the primary button is held.
pub fn terrain_edit_system(
    input: Res<FrameInput>,
    config: Res<SimConfig>,
    mut layers: ResMut<TerrainLayers>,
) {
    if input.primary.held {
        layers.destroy_at(input.cursor, config.terrain.edit_radius);
    }
}

/// Toggle start points on a primary press and clear the latch on release.
pub fn start_point_toggle_system(input: Res<FrameInput>, mut goals: ResMut<GoalPoints>) {
    if input.primary.pressed {
        goals.toggle_at(input.cursor);
    }
    if input.primary.released {
        goals.release_click();
    }
}

/// Place/remove portals on a secondary press and rotate on a middle press.
pub fn portal_input_system(
    input: Res<FrameInput>,
    config: Res<SimConfig>,
    mut portals: ResMut<PortalRegistry>,
    mut rng: ResMut<SimRng>,
) {
    if !config.portal.player_placement {
        return;
    }
    if input.secondary.pressed {
        portals.click(input.cursor, &config.portal, &mut rng.0);
    }
    if input.secondary.released {
        portals.release_click();
    }
    if input.middle.pressed {
        portals.rotate_placement(config.portal.rotation_step_deg);
    }
}
