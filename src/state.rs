//! Game state machine.
//!
//! A [`GameStateManager`] owns the running [`Level`] and applies state
//! requests at the end of each frame through an explicit transition table:
//!
//! | Request          | Effect                                              |
//! |------------------|-----------------------------------------------------|
//! | `Quit`           | free, unload, stop running                          |
//! | `Restart`        | free, initialize (same level, no reload)            |
//! | `Next`           | change to the next level in the cycle               |
//! | current level    | nothing                                             |
//! | other level      | free + unload old, load + initialize new            |
//!
//! The level cycle is MainMenu -> Level1 -> Level2 -> MainMenu.

use crate::config::SimConfig;
use crate::error::SimError;
use crate::input::FrameInput;
use crate::level::{Level, LevelLayout, MainMenu, PlayLevel};
use crate::render_bridge::RenderFrame;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateId {
    Quit,
    Next,
    Restart,
    MainMenu,
    Level1,
    Level2,
}

impl StateId {
    /// Whether this id names a level rather than a request.
    pub fn is_level(self) -> bool {
        matches!(self, StateId::MainMenu | StateId::Level1 | StateId::Level2)
    }

    /// Successor in the level cycle. Requests map to themselves.
    pub fn next_level(self) -> StateId {
        match self {
            StateId::MainMenu => StateId::Level1,
            StateId::Level1 => StateId::Level2,
            StateId::Level2 => StateId::MainMenu,
            other => other,
        }
    }
}

/// What a state request does to the running level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Stay,
    Restart,
    Change(StateId),
    Quit,
}

/// Resolve a request made while `current` is running.
pub fn resolve_transition(current: StateId, requested: StateId) -> Transition {
    match requested {
        StateId::Quit => Transition::Quit,
        StateId::Restart => Transition::Restart,
        StateId::Next => Transition::Change(current.next_level()),
        id if id == current => Transition::Stay,
        id => Transition::Change(id),
    }
}

/// Builds the level for a state id.
pub type LevelFactory = Box<dyn FnMut(StateId) -> Option<Box<dyn Level>>>;

/// Factory for the built-in levels.
pub fn default_factory(config: SimConfig) -> LevelFactory {
    Box::new(move |id| -> Option<Box<dyn Level>> {
        match id {
            StateId::MainMenu => Some(Box::new(MainMenu::new(config.clone()))),
            StateId::Level1 => Some(Box::new(PlayLevel::new(LevelLayout::level1(), config.clone()))),
            StateId::Level2 => Some(Box::new(PlayLevel::new(LevelLayout::level2(), config.clone()))),
            _ => None,
        }
    })
}

pub struct GameStateManager {
    factory: LevelFactory,
    level: Box<dyn Level>,
    current: StateId,
    previous: StateId,
    running: bool,
}

impl GameStateManager {
    /// Start the built-in levels at `start`.
    pub fn new(start: StateId, config: SimConfig) -> Result<Self, SimError> {
        config.validate()?;
        Self::with_factory(start, default_factory(config))
    }

    /// Start at `start` with a custom level factory. The first level is
    /// loaded and initialized immediately.
    pub fn with_factory(start: StateId, mut factory: LevelFactory) -> Result<Self, SimError> {
        let mut level = factory(start).ok_or(SimError::InvalidConfig("starting state must be a level"))?;
        level.load()?;
        level.initialize()?;
        log::info!("entered {:?}", start);
        Ok(Self {
            factory,
            level,
            current: start,
            previous: start,
            running: true,
        })
    }

    pub fn current(&self) -> StateId {
        self.current
    }

    pub fn previous(&self) -> StateId {
        self.previous
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn level(&self) -> &dyn Level {
        self.level.as_ref()
    }

    /// Update and draw the running level, then apply any state request.
    /// Returns `None` once the manager has quit.
    pub fn run_frame(&mut self, dt: f32, input: &FrameInput) -> Result<Option<RenderFrame>, SimError> {
        if !self.running {
            return Ok(None);
        }
        let request = self.level.update(dt, input);
        let frame = self.level.draw();
        if let Some(requested) = request {
            self.apply(requested)?;
        }
        Ok(Some(frame))
    }

    /// Apply a state request immediately.
    pub fn apply(&mut self, requested: StateId) -> Result<(), SimError> {
        if !self.running {
            return Ok(());
        }
        match resolve_transition(self.current, requested) {
            Transition::Stay => {}
            Transition::Restart => {
                log::info!("restarting {:?}", self.current);
                self.level.free();
                self.level.initialize()?;
            }
            Transition::Change(next) => {
                let Some(mut level) = (self.factory)(next) else {
                    log::warn!("no level registered for {:?}", next);
                    return Ok(());
                };
                self.level.free();
                self.level.unload();
                level.load()?;
                level.initialize()?;
                self.level = level;
                self.previous = self.current;
                self.current = next;
                log::info!("changed state {:?} -> {:?}", self.previous, self.current);
            }
            Transition::Quit => {
                self.level.free();
                self.level.unload();
                self.previous = self.current;
                self.current = StateId::Quit;
                self.running = false;
                log::info!("quit");
            }
        }
        Ok(())
    }
}
