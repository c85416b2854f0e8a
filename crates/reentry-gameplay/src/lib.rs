//! # Reentry Gameplay
//!
//! Rules of the tile game and the signals it sends to the presentation layer.
//!
//! This crate provides:
//! - The board and its tiles
//! - Move resolution, scoring and win/loss detection
//! - Mission progress derived from the board
//! - A synchronous event bus
//! - Snapshot persistence
//! - Device-agnostic input commands

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod events;
pub mod game;
pub mod grid;
pub mod input;
pub mod progress;
pub mod store;
pub mod tile;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::*;
    pub use crate::events::*;
    pub use crate::game::*;
    pub use crate::grid::*;
    pub use crate::input::*;
    pub use crate::progress::*;
    pub use crate::store::*;
    pub use crate::tile::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;
    use reentry_common::CellCoord;

    #[test]
    fn test_new_game_has_start_tiles() {
        let bus = EventBus::new();
        let recorder = EventRecorder::attach(&bus);
        let mut engine = GameEngine::new(
            GameConfig::default(),
            bus,
            Box::new(MemoryStore::new()),
            Box::new(NullActuator),
            fastrand::Rng::with_seed(3),
        );
        engine.setup();

        assert_eq!(engine.grid().tile_count(), 2);
        assert!(engine.grid().tiles().all(|t| t.value() == 2 || t.value() == 4));
        assert_eq!(recorder.of_topic(EventTopic::Progression).len(), 1);
    }

    #[test]
    fn test_setup_resumes_saved_game() {
        let store = MemoryStore::new();
        let mut seeded = store.clone();
        let mut grid = Grid::new(4);
        grid.insert_tile(Tile::new(CellCoord::new(1, 1), 32));
        seeded
            .save_game(&GameSnapshot {
                version: reentry_common::SchemaVersion::GAME_SNAPSHOT,
                grid: grid.snapshot(),
                score: 100,
                over: false,
                won: false,
                keep_playing: false,
            })
            .expect("memory store");

        let mut engine = GameEngine::new(
            GameConfig::default(),
            EventBus::new(),
            Box::new(store),
            Box::new(NullActuator),
            fastrand::Rng::with_seed(3),
        );
        engine.setup();

        assert_eq!(engine.score(), 100);
        assert_eq!(engine.grid().max_tile(), 32);
        assert_eq!(engine.grid().tile_count(), 1);
    }
}
