//! ECS systems for the fluid sandbox.
//!
//! Systems run in two chained schedules owned by [`crate::api::SimWorld`].
//!
//! ## Input schedule
//!
//! Runs first, so terrain edits are rebuilt before any collision query:
//! - `terrain_edit_system` - Clears destructible terrain under the cursor
//! - `start_point_toggle_system` - Toggles start points
//! - `portal_input_system` - Places, removes and rotates portals
//!
//! ## Frame schedule
//!
//! - `start_point_spawn_system` - Releases particles from active start points
//! - `fluid_step_system` - Substepped collision and integration
//! - `end_point_collect_system` - Removes particles touching the end point
//! - `portal_teleport_system` - Moves particles between linked portals
//! - `win_condition_system` - Latches the win flag

pub mod collision;
pub mod fluid;
pub mod goals;
pub mod input;
pub mod portals;

pub use collision::*;
pub use fluid::*;
pub use goals::*;
pub use input::*;
pub use portals::*;
