//! Persistence of the single game snapshot and the best score.
//!
//! There is exactly one canonical snapshot. It is overwritten after every
//! successful move and removed when the game ends; the best score lives in a
//! separate record that survives game over.

use std::cell::RefCell;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use reentry_common::{SchemaVersion, StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::grid::GridSnapshot;

/// File name of the game snapshot.
pub const GAME_STATE_FILE: &str = "game_state.json";
/// File name of the best score record.
pub const BEST_SCORE_FILE: &str = "best_score.json";

/// Persisted state of a game in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSnapshot {
    /// Schema version of the snapshot
    #[serde(default)]
    pub version: SchemaVersion,
    /// Board contents
    pub grid: GridSnapshot,
    /// Current score
    pub score: u64,
    /// No legal move remains
    pub over: bool,
    /// Win tile reached
    pub won: bool,
    /// Player continued after winning
    pub keep_playing: bool,
}

impl GameSnapshot {
    /// Serializes to JSON.
    pub fn to_json(&self) -> StoreResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Parses JSON and checks the schema version.
    pub fn from_json(json: &str) -> StoreResult<Self> {
        let snapshot: Self =
            serde_json::from_str(json).map_err(|e| StoreError::Corrupted(e.to_string()))?;

        if !SchemaVersion::GAME_SNAPSHOT.can_read(&snapshot.version) {
            return Err(StoreError::VersionMismatch {
                expected: SchemaVersion::GAME_SNAPSHOT,
                found: snapshot.version,
            });
        }
        Ok(snapshot)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct BestScoreRecord {
    best_score: u64,
}

/// Storage backend for the snapshot and best score.
pub trait GameStore {
    /// Loads the snapshot, `None` when no game is saved.
    fn load_game(&self) -> StoreResult<Option<GameSnapshot>>;

    /// Replaces the snapshot.
    fn save_game(&mut self, snapshot: &GameSnapshot) -> StoreResult<()>;

    /// Removes the snapshot. Removing a missing snapshot is not an error.
    fn clear_game(&mut self) -> StoreResult<()>;

    /// Best score ever recorded, 0 when none.
    fn best_score(&self) -> StoreResult<u64>;

    /// Stores a new best score.
    fn set_best_score(&mut self, score: u64) -> StoreResult<()>;
}

/// JSON files in a directory, written atomically.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Creates a store rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        info!("Game store at {}", dir.display());
        Self { dir }
    }

    /// Directory holding the files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether a snapshot file exists.
    #[must_use]
    pub fn has_game(&self) -> bool {
        self.dir.join(GAME_STATE_FILE).exists()
    }

    fn write_atomic(&self, name: &str, contents: &str) -> StoreResult<()> {
        fs::create_dir_all(&self.dir)?;

        let temp_path = self.dir.join(format!("{name}.tmp"));
        let final_path = self.dir.join(name);

        let mut file = fs::File::create(&temp_path)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &final_path)?;
        Ok(())
    }

    fn read(&self, name: &str) -> StoreResult<Option<String>> {
        let path = self.dir.join(name);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }
}

impl GameStore for FileStore {
    fn load_game(&self) -> StoreResult<Option<GameSnapshot>> {
        self.read(GAME_STATE_FILE)?
            .map(|json| GameSnapshot::from_json(&json))
            .transpose()
    }

    fn save_game(&mut self, snapshot: &GameSnapshot) -> StoreResult<()> {
        self.write_atomic(GAME_STATE_FILE, &snapshot.to_json()?)?;
        debug!(score = snapshot.score, "Saved game snapshot");
        Ok(())
    }

    fn clear_game(&mut self) -> StoreResult<()> {
        let path = self.dir.join(GAME_STATE_FILE);
        if path.exists() {
            fs::remove_file(path)?;
            debug!("Cleared game snapshot");
        }
        Ok(())
    }

    fn best_score(&self) -> StoreResult<u64> {
        match self.read(BEST_SCORE_FILE)? {
            Some(json) => serde_json::from_str::<BestScoreRecord>(&json)
                .map(|record| record.best_score)
                .map_err(|e| StoreError::Corrupted(e.to_string())),
            None => Ok(0),
        }
    }

    fn set_best_score(&mut self, score: u64) -> StoreResult<()> {
        let json = serde_json::to_string(&BestScoreRecord { best_score: score })
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.write_atomic(BEST_SCORE_FILE, &json)
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    game: Option<GameSnapshot>,
    best_score: u64,
    writes: usize,
}

/// In-memory store.
///
/// Clones share the same contents, so a test can keep a handle after passing
/// the store to an engine.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Rc<RefCell<MemoryInner>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot, if any.
    #[must_use]
    pub fn game(&self) -> Option<GameSnapshot> {
        self.inner.borrow().game.clone()
    }

    /// Number of writes (saves, clears, best-score updates) so far.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.inner.borrow().writes
    }
}

impl GameStore for MemoryStore {
    fn load_game(&self) -> StoreResult<Option<GameSnapshot>> {
        Ok(self.inner.borrow().game.clone())
    }

    fn save_game(&mut self, snapshot: &GameSnapshot) -> StoreResult<()> {
        let mut inner = self.inner.borrow_mut();
        inner.game = Some(snapshot.clone());
        inner.writes += 1;
        Ok(())
    }

    fn clear_game(&mut self) -> StoreResult<()> {
        let mut inner = self.inner.borrow_mut();
        inner.game = None;
        inner.writes += 1;
        Ok(())
    }

    fn best_score(&self) -> StoreResult<u64> {
        Ok(self.inner.borrow().best_score)
    }

    fn set_best_score(&mut self, score: u64) -> StoreResult<()> {
        let mut inner = self.inner.borrow_mut();
        inner.best_score = score;
        inner.writes += 1;
        Ok(())
    }
}
