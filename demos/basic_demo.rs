//! Scripted run of the Terrafluid sandbox.
//!
//! Run with: cargo run --example basic_demo
//!
//! Starts at the main menu, pours some water, enters level 1, digs a channel
//! from the pipe to the flower and opens the pipe.

use glam::Vec2;
use terrafluid_sim::{ButtonState, FrameInput, GameStateManager, KeyPresses, SimConfig, SimWorld, StateId};

const DT: f32 = 1.0 / 60.0;

fn main() -> Result<(), terrafluid_sim::SimError> {
    println!("=== Terrafluid - Simulation Demo ===\n");

    let config = SimConfig::default().with_seed(7);
    let mut manager = GameStateManager::new(StateId::MainMenu, config)?;

    // Pour water in the menu sandbox for one second.
    let pour = FrameInput::at(Vec2::new(0.0, 200.0)).with_primary(ButtonState::down());
    for _ in 0..60 {
        manager.run_frame(DT, &pour)?;
    }
    println!("Main menu:");
    print_status(manager.level().sim());

    let start = FrameInput::default().with_keys(KeyPresses {
        start: true,
        ..Default::default()
    });
    manager.run_frame(DT, &start)?;
    println!("\n--- Entered {:?} ---\n", manager.current());

    // Dig a sloped channel through the dirt band, one cursor sample per frame.
    let from = Vec2::new(-650.0, 320.0);
    let to = Vec2::new(650.0, -360.0);
    let samples = 260;
    for i in 0..=samples {
        let cursor = from.lerp(to, i as f32 / samples as f32);
        manager.run_frame(DT, &FrameInput::at(cursor).with_primary(ButtonState::down()))?;
    }
    manager.run_frame(DT, &FrameInput::at(to).with_primary(ButtonState::just_released()))?;
    println!("Channel dug.");

    // Open the pipe.
    let pipe = Vec2::new(-650.0, 400.0);
    manager.run_frame(DT, &FrameInput::at(pipe).with_primary(ButtonState::just_pressed()))?;
    manager.run_frame(DT, &FrameInput::at(pipe).with_primary(ButtonState::just_released()))?;

    println!("Running level for 30 seconds...\n");
    for frame in 0..1800 {
        let frame_out = manager.run_frame(DT, &FrameInput::default())?;
        if (frame + 1) % 300 == 0 {
            let items = frame_out.map(|f| f.len()).unwrap_or(0);
            println!("--- Frame {} ({} draw items) ---", frame + 1, items);
            print_status(manager.level().sim());
        }
    }

    if let Some(sim) = manager.level().sim() {
        if sim.has_won() {
            println!("\nLevel complete, advancing.");
            let confirm = FrameInput::default().with_keys(KeyPresses {
                confirm: true,
                ..Default::default()
            });
            manager.run_frame(DT, &confirm)?;
            println!("Now in {:?}", manager.current());
        }
    }

    let quit = FrameInput::default().with_keys(KeyPresses {
        quit: true,
        ..Default::default()
    });
    manager.run_frame(DT, &quit)?;
    println!("\nRunning: {}", manager.is_running());
    Ok(())
}

fn print_status(sim: Option<&SimWorld>) {
    let Some(sim) = sim else {
        println!("  (no simulation)");
        return;
    };
    let stats = sim.collision_stats();
    println!(
        "  particles={} collected={} won={} terrain_contacts={} pair_contacts={}",
        sim.particle_count(),
        sim.collected(),
        sim.has_won(),
        stats.terrain_contacts,
        stats.pair_contacts
    );
}
