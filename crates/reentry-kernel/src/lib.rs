//! # Reentry Kernel
//!
//! Presentation engines for the descent: a particle/visual simulation and a
//! procedural audio engine.
//!
//! Neither engine draws or plays on its own. Game events perturb them, the
//! per-frame tick advances them, and the binary reads the results:
//! - [`VisualEngine::frame`] returns everything the renderer needs for a frame;
//! - [`AudioEngine`] pushes drone targets and one-shot sounds into an
//!   [`AudioSink`], which is [`RodioSink`] at runtime.
//!
//! ## Deferred effects
//!
//! Staggered particle waves and layered sound sequences are queued on a
//! [`Scheduler`] owned by each engine. A reset clears the queue and every
//! decaying value, so nothing from the previous game leaks into the next.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod audio;
pub mod audio_backend;
pub mod palette;
pub mod particles;
pub mod scheduler;
pub mod synth;
pub mod visuals;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::audio::*;
    pub use crate::audio_backend::*;
    pub use crate::palette::*;
    pub use crate::particles::*;
    pub use crate::scheduler::*;
    pub use crate::synth::*;
    pub use crate::visuals::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;
    use reentry_gameplay::Direction;

    #[test]
    fn test_engines_reset_together() {
        let mut visuals = VisualEngine::new(
            VisualConfig::default(),
            Vec2::new(800.0, 600.0),
            fastrand::Rng::with_seed(5),
        );
        let mut audio = AudioEngine::new(AudioConfig::default());

        visuals.on_move(Direction::Up);
        visuals.on_game_over();
        audio.on_game_over();
        visuals.reset();
        audio.reset();

        assert_eq!(visuals.pending_tasks(), 0);
        assert!(visuals.energy().abs() < f32::EPSILON);
        assert_eq!(audio.pending_layers(), 0);
        assert_eq!(audio.drone_target(), DroneParams::CALM);
    }

    #[test]
    fn test_ambient_floor_survives_frames() {
        let config = VisualConfig::default();
        let floor = config.ambient_floor;
        let mut visuals = VisualEngine::new(config, Vec2::new(640.0, 480.0), fastrand::Rng::with_seed(9));
        for _ in 0..120 {
            visuals.tick(1.0 / 60.0);
        }
        assert!(visuals.particle_count() >= floor);
    }
}
