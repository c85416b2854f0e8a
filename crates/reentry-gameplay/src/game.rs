//! The tile-merge game engine.
//!
//! [`GameEngine`] owns the board and the score, resolves moves, and reports
//! everything that happened through the [`EventBus`]. Persistence and drawing
//! are reached through the [`GameStore`] and [`Actuator`] traits; neither is
//! consulted for game logic.

use std::cell::RefCell;
use std::rc::Rc;

use reentry_common::{CellCoord, SchemaVersion, StoreResult};
use tracing::{debug, info, warn};

use crate::config::GameConfig;
use crate::events::{EventBus, GameEvent};
use crate::grid::Grid;
use crate::input::{Direction, GameCommand};
use crate::progress::{ProgressModel, ProgressState, ProgressUpdate};
use crate::store::{GameSnapshot, GameStore};
use crate::tile::Tile;

/// Non-board data handed to the display after every state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActuateMeta {
    /// Current score
    pub score: u64,
    /// No legal move remains
    pub over: bool,
    /// Win tile reached
    pub won: bool,
    /// Best score including the current game
    pub best_score: u64,
    /// Moves are no longer accepted
    pub terminated: bool,
}

/// Display collaborator of the engine.
pub trait Actuator {
    /// Presents the board after a state change.
    fn actuate(&mut self, grid: &Grid, meta: &ActuateMeta);

    /// Hides the win message after the player chose to keep playing.
    fn continue_game(&mut self) {}
}

impl<T: Actuator + ?Sized> Actuator for Rc<RefCell<T>> {
    fn actuate(&mut self, grid: &Grid, meta: &ActuateMeta) {
        self.borrow_mut().actuate(grid, meta);
    }

    fn continue_game(&mut self) {
        self.borrow_mut().continue_game();
    }
}

/// Actuator that displays nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullActuator;

impl Actuator for NullActuator {
    fn actuate(&mut self, _grid: &Grid, _meta: &ActuateMeta) {}
}

/// What a call to [`GameEngine::move_tiles`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveOutcome {
    /// At least one tile changed position
    pub moved: bool,
    /// Merged values in traversal order
    pub merges: Vec<u32>,
    /// Points gained by this move
    pub score_gained: u64,
    /// Cell of the spawned tile
    pub spawned: Option<CellCoord>,
    /// The move produced the first win
    pub won: bool,
    /// The move ended the game
    pub over: bool,
}

/// Cell visit order for one direction, farthest cells first.
#[derive(Debug, Clone)]
struct Traversals {
    xs: Vec<i32>,
    ys: Vec<i32>,
}

impl Traversals {
    fn build(size: usize, (dx, dy): (i32, i32)) -> Self {
        let mut xs: Vec<i32> = (0..size as i32).collect();
        let mut ys = xs.clone();
        if dx == 1 {
            xs.reverse();
        }
        if dy == 1 {
            ys.reverse();
        }
        Self { xs, ys }
    }

    fn cells(&self) -> impl Iterator<Item = CellCoord> + '_ {
        self.xs
            .iter()
            .flat_map(move |&x| self.ys.iter().map(move |&y| CellCoord::new(x, y)))
    }
}

/// Core game state machine.
pub struct GameEngine {
    config: GameConfig,
    grid: Grid,
    score: u64,
    best_score: u64,
    over: bool,
    won: bool,
    keep_playing: bool,
    progress: ProgressModel,
    bus: EventBus,
    store: Box<dyn GameStore>,
    actuator: Box<dyn Actuator>,
    rng: fastrand::Rng,
}

impl std::fmt::Debug for GameEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameEngine")
            .field("grid", &self.grid.to_rows())
            .field("score", &self.score)
            .field("best_score", &self.best_score)
            .field("over", &self.over)
            .field("won", &self.won)
            .field("keep_playing", &self.keep_playing)
            .finish_non_exhaustive()
    }
}

impl GameEngine {
    /// Creates an engine with an empty board. Call [`Self::setup`] to start.
    pub fn new(
        mut config: GameConfig,
        bus: EventBus,
        store: Box<dyn GameStore>,
        actuator: Box<dyn Actuator>,
        rng: fastrand::Rng,
    ) -> Self {
        config.validate();
        Self {
            grid: Grid::new(config.size),
            config,
            score: 0,
            best_score: 0,
            over: false,
            won: false,
            keep_playing: false,
            progress: ProgressModel::new(),
            bus,
            store,
            actuator,
            rng,
        }
    }

    /// Resumes the saved game, or starts a new one when none is saved.
    pub fn setup(&mut self) {
        self.best_score = self.store.best_score().unwrap_or_else(|e| {
            warn!("Failed to read best score: {e}");
            0
        });

        let restored = match self.store.load_game() {
            Ok(Some(snapshot)) => match self.apply_snapshot(&snapshot) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Discarding unreadable snapshot: {e}");
                    false
                }
            },
            Ok(None) => false,
            Err(e) => {
                warn!("Failed to load game snapshot: {e}");
                false
            }
        };

        if restored {
            info!(score = self.score, "Resumed saved game");
        } else {
            self.start_new_game();
            info!(size = self.config.size, "Started new game");
        }

        let state = self.progress.sync(&self.grid);
        self.bus.publish(&GameEvent::Progression(state));
        self.actuate();
    }

    /// Throws the current game away and starts over.
    pub fn restart(&mut self) {
        if let Err(e) = self.store.clear_game() {
            warn!("Failed to clear game snapshot: {e}");
        }
        self.actuator.continue_game();
        self.progress.reset();
        self.bus.publish(&GameEvent::Restart);
        info!("Restarting game");
        self.setup();
    }

    /// Continues after a win. Ignored unless the game has been won.
    pub fn keep_playing(&mut self) {
        if !self.won || self.keep_playing {
            return;
        }
        self.keep_playing = true;
        self.actuator.continue_game();
        self.bus.publish(&GameEvent::KeepPlaying);
        self.persist();
        self.actuate();
    }

    /// Whether moves are no longer accepted.
    #[must_use]
    pub const fn is_game_terminated(&self) -> bool {
        self.over || (self.won && !self.keep_playing)
    }

    /// Routes a player command.
    pub fn handle_command(&mut self, command: GameCommand) {
        match command {
            GameCommand::Move(direction) => {
                self.move_tiles(direction);
            }
            GameCommand::Restart => self.restart(),
            GameCommand::KeepPlaying => self.keep_playing(),
            GameCommand::DebugWin => self.debug_force_win(),
            GameCommand::DebugLose => self.debug_force_lose(),
        }
    }

    /// Slides every tile in `direction`, merging equal neighbours.
    ///
    /// A move that shifts nothing changes no state, persists nothing and
    /// publishes nothing.
    pub fn move_tiles(&mut self, direction: Direction) -> MoveOutcome {
        let mut outcome = MoveOutcome::default();
        if self.is_game_terminated() {
            return outcome;
        }

        let vector = direction.vector();
        let traversals = Traversals::build(self.grid.size(), vector);
        let untouched = self.grid.clone();

        for tile in self.grid.tiles_mut() {
            tile.save_position();
        }

        for cell in traversals.cells() {
            let Some(tile) = self.grid.cell_content(cell).copied() else {
                continue;
            };

            let (farthest, next) = self.find_farthest_position(cell, vector);
            let mergeable = self
                .grid
                .cell_content(next)
                .copied()
                .filter(|other| other.value() == tile.value() && !other.is_merge_product());

            if let Some(other) = mergeable {
                let merged = Tile::merged(&tile, &other);
                self.grid.remove_tile(cell);
                self.grid.remove_tile(next);
                self.grid.insert_tile(merged);

                self.score += u64::from(merged.value());
                outcome.score_gained += u64::from(merged.value());
                outcome.merges.push(merged.value());
                outcome.moved = true;

                if merged.value() == self.config.win_value && !self.won {
                    self.won = true;
                    outcome.won = true;
                }
            } else if farthest != cell {
                let mut moved = tile;
                self.grid.remove_tile(cell);
                moved.update_position(farthest);
                self.grid.insert_tile(moved);
                outcome.moved = true;
            }
        }

        if !outcome.moved {
            // Drop the animation bookkeeping too.
            self.grid = untouched;
            return outcome;
        }

        outcome.spawned = self.add_random_tile();

        if !self.moves_available() {
            self.over = true;
            outcome.over = true;
        }

        debug!(
            %direction,
            merges = ?outcome.merges,
            score = self.score,
            spawned = ?outcome.spawned,
            "Move resolved"
        );

        self.publish_move_events(direction, &outcome);

        if self.over {
            self.clear_saved_game();
        } else {
            self.persist();
        }
        self.update_best_score();

        let update = self.progress.update(&self.grid);
        self.publish_progress(update);
        self.actuate();
        outcome
    }

    /// Debug cheat: puts the win tile on the board, scores it as a merge and
    /// wins.
    pub fn debug_force_win(&mut self) {
        let cell = self
            .grid
            .random_available_cell(&mut self.rng)
            .unwrap_or_else(|| CellCoord::new(0, 0));
        self.grid.insert_tile(Tile::new(cell, self.config.win_value));
        self.score += u64::from(self.config.win_value);
        self.won = true;
        self.keep_playing = false;
        info!(score = self.score, "Debug: forced win");

        self.bus.publish(&GameEvent::Won { score: self.score });
        self.persist();
        self.update_best_score();
        let update = self.progress.update(&self.grid);
        self.publish_progress(update);
        self.actuate();
    }

    /// Debug cheat: fills the board so that no move remains and loses.
    pub fn debug_force_lose(&mut self) {
        let size = self.grid.size();
        self.grid.clear();
        for index in 0..size * size {
            let cell = CellCoord::from_index(index, size);
            let value = if (cell.x + cell.y) % 2 == 0 { 2 } else { 4 };
            self.grid.insert_tile(Tile::new(cell, value));
        }
        self.over = true;
        info!("Debug: forced game over");

        self.bus.publish(&GameEvent::Over { score: self.score });
        self.clear_saved_game();
        self.update_best_score();
        let update = self.progress.update(&self.grid);
        self.publish_progress(update);
        self.actuate();
    }

    /// Captures the persistable state.
    #[must_use]
    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            version: SchemaVersion::GAME_SNAPSHOT,
            grid: self.grid.snapshot(),
            score: self.score,
            over: self.over,
            won: self.won,
            keep_playing: self.keep_playing,
        }
    }

    /// Replaces the current state with a snapshot and redisplays it.
    pub fn restore(&mut self, snapshot: &GameSnapshot) -> StoreResult<()> {
        self.apply_snapshot(snapshot)?;
        let state = self.progress.sync(&self.grid);
        self.bus.publish(&GameEvent::Progression(state));
        self.actuate();
        Ok(())
    }

    /// Current board.
    #[must_use]
    pub const fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Current score.
    #[must_use]
    pub const fn score(&self) -> u64 {
        self.score
    }

    /// Best score seen, including the current game.
    #[must_use]
    pub const fn best_score(&self) -> u64 {
        self.best_score
    }

    /// Whether no legal move remains.
    #[must_use]
    pub const fn is_over(&self) -> bool {
        self.over
    }

    /// Whether the win tile has been reached.
    #[must_use]
    pub const fn is_won(&self) -> bool {
        self.won
    }

    /// Whether the player continued after winning.
    #[must_use]
    pub const fn is_keep_playing(&self) -> bool {
        self.keep_playing
    }

    /// Last computed progress.
    #[must_use]
    pub const fn progress(&self) -> ProgressState {
        self.progress.state()
    }

    /// Rules in effect.
    #[must_use]
    pub const fn config(&self) -> &GameConfig {
        &self.config
    }

    /// The bus this engine publishes on.
    #[must_use]
    pub const fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Whether any move would change the board.
    #[must_use]
    pub fn moves_available(&self) -> bool {
        self.grid.cells_available() || self.grid.has_adjacent_match()
    }

    fn start_new_game(&mut self) {
        self.grid = Grid::new(self.config.size);
        self.score = 0;
        self.over = false;
        self.won = false;
        self.keep_playing = false;
        for _ in 0..self.config.start_tiles {
            self.add_random_tile();
        }
    }

    fn apply_snapshot(&mut self, snapshot: &GameSnapshot) -> StoreResult<()> {
        let grid = Grid::from_snapshot(&snapshot.grid)?;
        self.grid = grid;
        self.score = snapshot.score;
        self.over = snapshot.over;
        self.won = snapshot.won;
        self.keep_playing = snapshot.keep_playing;
        self.best_score = self.best_score.max(self.score);
        Ok(())
    }

    /// Places a 2 (or sometimes a 4) on a random empty cell.
    fn add_random_tile(&mut self) -> Option<CellCoord> {
        let cell = self.grid.random_available_cell(&mut self.rng)?;
        let value = if self.rng.f32() < self.config.four_probability {
            4
        } else {
            2
        };
        self.grid.insert_tile(Tile::new(cell, value));
        Some(cell)
    }

    /// Farthest empty cell reachable from `cell`, and the cell just beyond it.
    fn find_farthest_position(&self, cell: CellCoord, (dx, dy): (i32, i32)) -> (CellCoord, CellCoord) {
        let mut previous = cell;
        let mut next = cell.offset(dx, dy);
        while self.grid.cell_available(next) {
            previous = next;
            next = next.offset(dx, dy);
        }
        (previous, next)
    }

    fn publish_move_events(&self, direction: Direction, outcome: &MoveOutcome) {
        self.bus.publish(&GameEvent::Move { direction });

        if let Some(&value) = outcome.merges.iter().max() {
            self.bus.publish(&GameEvent::Merge { value });
        }
        for &value in &outcome.merges {
            if value >= self.config.milestone_value {
                self.bus.publish(&GameEvent::Milestone { value });
            }
        }
        if outcome.won {
            self.bus.publish(&GameEvent::Won { score: self.score });
        }
        if outcome.over {
            self.bus.publish(&GameEvent::Over { score: self.score });
        }
    }

    fn publish_progress(&self, update: ProgressUpdate) {
        self.bus.publish(&GameEvent::Progression(update.state));
        if let Some(drop) = update.oxygen_drop {
            self.bus.publish(&GameEvent::OxygenChanged {
                from: drop.from,
                to: drop.to,
            });
        }
    }

    fn persist(&mut self) {
        let snapshot = self.snapshot();
        if let Err(e) = self.store.save_game(&snapshot) {
            warn!("Failed to save game: {e}");
        }
    }

    fn clear_saved_game(&mut self) {
        if let Err(e) = self.store.clear_game() {
            warn!("Failed to clear game snapshot: {e}");
        }
    }

    fn update_best_score(&mut self) {
        if self.score > self.best_score {
            self.best_score = self.score;
            if let Err(e) = self.store.set_best_score(self.score) {
                warn!("Failed to save best score: {e}");
            }
        }
    }

    fn actuate(&mut self) {
        let meta = ActuateMeta {
            score: self.score,
            over: self.over,
            won: self.won,
            best_score: self.best_score,
            terminated: self.is_game_terminated(),
        };
        self.actuator.actuate(&self.grid, &meta);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventRecorder, EventTopic};
    use crate::store::MemoryStore;

    fn engine_with(rows: &[&[u32]]) -> (GameEngine, MemoryStore, EventRecorder) {
        let bus = EventBus::new();
        let store = MemoryStore::new();
        let mut engine = GameEngine::new(
            GameConfig::default(),
            bus.clone(),
            Box::new(store.clone()),
            Box::new(NullActuator),
            fastrand::Rng::with_seed(42),
        );
        let mut snapshot = engine.snapshot();
        snapshot.grid = Grid::from_rows(rows).snapshot();
        engine.restore(&snapshot).expect("valid snapshot");
        let recorder = EventRecorder::attach(&bus);
        (engine, store, recorder)
    }

    #[test]
    fn test_traversal_order_farthest_first() {
        let right = Traversals::build(4, Direction::Right.vector());
        assert_eq!(right.xs, vec![3, 2, 1, 0]);
        assert_eq!(right.ys, vec![0, 1, 2, 3]);

        let up = Traversals::build(4, Direction::Up.vector());
        assert_eq!(up.xs, vec![0, 1, 2, 3]);
        assert_eq!(up.ys, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_find_farthest_position() {
        let (engine, _, _) = engine_with(&[&[0, 0, 2, 0], &[0; 4], &[0; 4], &[0; 4]]);
        let (farthest, next) = engine.find_farthest_position(CellCoord::new(2, 0), (-1, 0));
        assert_eq!(farthest, CellCoord::new(0, 0));
        assert_eq!(next, CellCoord::new(-1, 0));
    }

    #[test]
    fn test_no_double_merge_in_one_move() {
        let (mut engine, _, _) = engine_with(&[&[2, 2, 4, 0], &[0; 4], &[0; 4], &[0; 4]]);
        let outcome = engine.move_tiles(Direction::Right);

        assert_eq!(outcome.merges, vec![4]);
        let row = &engine.grid().to_rows()[0];
        assert_eq!(&row[2..], &[4, 4]);
    }

    #[test]
    fn test_two_merges_in_one_row() {
        let (mut engine, _, recorder) = engine_with(&[&[2, 2, 2, 2], &[0; 4], &[0; 4], &[0; 4]]);
        let outcome = engine.move_tiles(Direction::Left);

        assert_eq!(outcome.merges, vec![4, 4]);
        assert_eq!(outcome.score_gained, 8);
        assert_eq!(&engine.grid().to_rows()[0][..2], &[4, 4]);
        assert_eq!(recorder.of_topic(EventTopic::Merge).len(), 1);
    }

    #[test]
    fn test_milestone_per_merge() {
        let (mut engine, _, recorder) =
            engine_with(&[&[64, 64, 32, 32], &[128, 128, 0, 0], &[0; 4], &[0; 4]]);
        engine.move_tiles(Direction::Left);

        assert_eq!(
            recorder.of_topic(EventTopic::Milestone),
            vec![
                GameEvent::Milestone { value: 128 },
                GameEvent::Milestone { value: 256 },
                GameEvent::Milestone { value: 64 },
            ]
        );
        assert_eq!(
            recorder.of_topic(EventTopic::Merge),
            vec![GameEvent::Merge { value: 256 }]
        );
    }

    #[test]
    fn test_event_order() {
        let (mut engine, _, recorder) = engine_with(&[&[1024, 1024, 0, 0], &[0; 4], &[0; 4], &[0; 4]]);
        engine.move_tiles(Direction::Left);

        let topics: Vec<EventTopic> = recorder.events().iter().map(GameEvent::topic).collect();
        assert_eq!(
            &topics[..5],
            &[
                EventTopic::Move,
                EventTopic::Merge,
                EventTopic::Milestone,
                EventTopic::Won,
                EventTopic::Progression,
            ]
        );
        assert!(engine.is_won());
        assert!(engine.is_game_terminated());
    }

    #[test]
    fn test_terminated_game_rejects_moves() {
        let (mut engine, store, recorder) = engine_with(&[&[2, 0, 0, 0], &[0; 4], &[0; 4], &[0; 4]]);
        engine.debug_force_win();
        recorder.clear();
        let writes = store.writes();

        let outcome = engine.move_tiles(Direction::Right);
        assert!(!outcome.moved);
        assert!(recorder.events().is_empty());
        assert_eq!(store.writes(), writes);

        engine.keep_playing();
        assert!(!engine.is_game_terminated());
        assert_eq!(recorder.of_topic(EventTopic::KeepPlaying).len(), 1);
    }

    #[test]
    fn test_force_win_scores_and_keeps_best() {
        let (mut engine, store, recorder) = engine_with(&[&[2, 0, 0, 0], &[0; 4], &[0; 4], &[0; 4]]);
        engine.debug_force_win();

        assert_eq!(engine.score(), 2048);
        assert_eq!(engine.best_score(), 2048);
        assert_eq!(store.best_score().expect("best score"), 2048);
        assert_eq!(
            recorder.of_topic(EventTopic::Won),
            vec![GameEvent::Won { score: 2048 }]
        );
    }

    #[test]
    fn test_force_lose() {
        let (mut engine, store, recorder) = engine_with(&[&[2, 0, 0, 0], &[0; 4], &[0; 4], &[0; 4]]);
        engine.debug_force_lose();

        assert!(engine.is_over());
        assert!(!engine.moves_available());
        assert!(store.game().is_none());
        assert_eq!(recorder.of_topic(EventTopic::Over).len(), 1);
    }

    #[test]
    fn test_restart_clears_and_starts_fresh() {
        let (mut engine, store, recorder) = engine_with(&[&[512, 256, 0, 0], &[0; 4], &[0; 4], &[0; 4]]);
        engine.move_tiles(Direction::Right);
        assert!(store.game().is_some());

        engine.restart();
        assert_eq!(engine.score(), 0);
        assert_eq!(engine.grid().tile_count(), 2);
        assert_eq!(recorder.of_topic(EventTopic::Restart).len(), 1);
        assert!(engine.progress().progress_factor < 0.01);
    }

    #[test]
    fn test_best_score_tracks_maximum() {
        let (mut engine, store, _) = engine_with(&[&[8, 8, 0, 0], &[0; 4], &[0; 4], &[0; 4]]);
        engine.move_tiles(Direction::Left);
        assert_eq!(engine.best_score(), 16);
        assert_eq!(store.best_score().expect("memory store"), 16);

        engine.restart();
        assert_eq!(engine.best_score(), 16);
    }
}
