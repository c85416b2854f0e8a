//! Rules configuration for a game session.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::grid::{DEFAULT_GRID_SIZE, GRID_SIZE_RANGE};

/// Rule parameters of the tile game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Board edge length
    pub size: usize,
    /// Tiles placed on a fresh board
    pub start_tiles: usize,
    /// Merge value that wins the game
    pub win_value: u32,
    /// Smallest merge value announced as a milestone
    pub milestone_value: u32,
    /// Chance that a spawned tile is a 4 instead of a 2
    pub four_probability: f32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_GRID_SIZE,
            start_tiles: 2,
            win_value: 2048,
            milestone_value: 64,
            four_probability: 0.1,
        }
    }
}

impl GameConfig {
    /// Clamps out-of-range values, logging each correction.
    pub fn validate(&mut self) {
        if !GRID_SIZE_RANGE.contains(&self.size) {
            warn!("Invalid board size {}, clamping to {GRID_SIZE_RANGE:?}", self.size);
            self.size = self.size.clamp(*GRID_SIZE_RANGE.start(), *GRID_SIZE_RANGE.end());
        }
        let cells = self.size * self.size;
        if self.start_tiles > cells {
            warn!("start_tiles {} exceeds board capacity", self.start_tiles);
            self.start_tiles = cells;
        }
        if self.win_value < 4 || !self.win_value.is_power_of_two() {
            warn!("Invalid win value {}, using 2048", self.win_value);
            self.win_value = 2048;
        }
        if self.milestone_value < 4 || !self.milestone_value.is_power_of_two() {
            warn!("Invalid milestone value {}, using 64", self.milestone_value);
            self.milestone_value = 64;
        }
        if !(0.0..=1.0).contains(&self.four_probability) {
            warn!("Invalid four probability {}", self.four_probability);
            self.four_probability = self.four_probability.clamp(0.0, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules() {
        let config = GameConfig::default();
        assert_eq!(config.size, 4);
        assert_eq!(config.start_tiles, 2);
        assert_eq!(config.win_value, 2048);
        assert_eq!(config.milestone_value, 64);
        assert!((config.four_probability - 0.1).abs() < 0.0001);
    }

    #[test]
    fn test_validate_clamps() {
        let mut config = GameConfig {
            size: 40,
            start_tiles: 500,
            win_value: 1000,
            milestone_value: 0,
            four_probability: 3.0,
        };
        config.validate();

        assert_eq!(config.size, 8);
        assert_eq!(config.start_tiles, 64);
        assert_eq!(config.win_value, 2048);
        assert_eq!(config.milestone_value, 64);
        assert!((config.four_probability - 1.0).abs() < 0.0001);
    }

    #[test]
    fn test_partial_deserialize_uses_defaults() {
        let config: GameConfig =
            serde_json::from_str(r#"{"win_value": 512}"#).expect("valid json");
        assert_eq!(config.win_value, 512);
        assert_eq!(config.size, 4);
    }
}
