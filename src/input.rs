//! Per-frame input supplied by the host.
//!
//! The core never polls devices. The host translates its window events into
//! a [`FrameInput`] (cursor already in world coordinates) and passes it to
//! every step.

use bevy_ecs::prelude::*;
use glam::Vec2;

/// Edge and level state of one button for the current frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonState {
    /// Went down this frame.
    pub pressed: bool,
    /// Is down this frame.
    pub held: bool,
    /// Went up this frame.
    pub released: bool,
}

impl ButtonState {
    pub const fn up() -> Self {
        Self {
            pressed: false,
            held: false,
            released: false,
        }
    }

    pub const fn just_pressed() -> Self {
        Self {
            pressed: true,
            held: true,
            released: false,
        }
    }

    pub const fn down() -> Self {
        Self {
            pressed: false,
            held: true,
            released: false,
        }
    }

    pub const fn just_released() -> Self {
        Self {
            pressed: false,
            held: false,
            released: true,
        }
    }
}

/// Keys with a meaning to the level driver. Each flag is a press edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyPresses {
    /// Return to the main menu.
    pub menu: bool,
    /// Restart the current level.
    pub restart: bool,
    /// Start the first level from the menu.
    pub start: bool,
    /// Advance after a win.
    pub confirm: bool,
    /// Toggle the collider overlay.
    pub debug: bool,
    /// Leave the game.
    pub quit: bool,
}

/// Input for one frame.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameInput {
    /// Cursor position in world units.
    pub cursor: Vec2,
    /// Destroys terrain while held, toggles start points on press.
    pub primary: ButtonState,
    /// Places or removes portals.
    pub secondary: ButtonState,
    /// Rotates the next portal.
    pub middle: ButtonState,
    pub keys: KeyPresses,
}

impl FrameInput {
    pub fn at(cursor: Vec2) -> Self {
        Self {
            cursor,
            ..Self::default()
        }
    }

    pub fn with_primary(mut self, state: ButtonState) -> Self {
        self.primary = state;
        self
    }

    pub fn with_secondary(mut self, state: ButtonState) -> Self {
        self.secondary = state;
        self
    }

    pub fn with_middle(mut self, state: ButtonState) -> Self {
        self.middle = state;
        self
    }

    pub fn with_keys(mut self, keys: KeyPresses) -> Self {
        self.keys = keys;
        self
    }
}
