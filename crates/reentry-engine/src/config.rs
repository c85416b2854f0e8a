//! Engine configuration.
//!
//! Window, audio, visual, game and debug settings, loaded from `reentry.toml`
//! and saved back on exit.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use reentry_gameplay::GameConfig;
use reentry_kernel::{AudioConfig, VisualConfig};

/// Configuration file name.
const CONFIG_FILE: &str = "reentry.toml";

/// Application directory under the platform config/data dirs.
const APP_DIR: &str = "reentry";

/// Window settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window width in pixels
    pub width: u32,
    /// Window height in pixels
    pub height: u32,
    /// Enable VSync
    pub vsync: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 720,
            height: 900,
            vsync: true,
        }
    }
}

/// Debug settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Show the debug panel (F3) and enable the win/lose cheats
    pub show_debug_overlay: bool,
}

/// Engine configuration parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Where the game snapshot and best score are kept (None = platform data dir)
    pub save_dir: Option<PathBuf>,
    /// Window settings
    pub window: WindowConfig,
    /// Audio settings
    pub audio: AudioConfig,
    /// Particle and effect settings
    pub visuals: VisualConfig,
    /// Board rules
    pub game: GameConfig,
    /// Debug settings
    pub debug: DebugConfig,
}

impl EngineConfig {
    /// Load configuration from the default file location.
    /// Returns default config if file doesn't exist.
    pub fn load() -> Self {
        Self::load_from(Self::config_path())
    }

    /// Load configuration from a specific path.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        match fs::File::open(path) {
            Ok(mut file) => {
                let mut contents = String::new();
                if let Err(e) = file.read_to_string(&mut contents) {
                    warn!("Failed to read config file: {e}");
                    return Self::default();
                }

                match toml::from_str(&contents) {
                    Ok(config) => {
                        info!("Loaded config from {}", path.display());
                        config
                    }
                    Err(e) => {
                        warn!("Failed to parse config file: {e}");
                        Self::default()
                    }
                }
            }
            Err(e) => {
                warn!("Failed to open config file: {e}");
                Self::default()
            }
        }
    }

    /// Save configuration to the default file location.
    pub fn save(&self) -> io::Result<()> {
        self.save_to(Self::config_path())
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path.
    fn config_path() -> PathBuf {
        dirs::config_dir().map_or_else(
            || PathBuf::from(CONFIG_FILE),
            |dir| dir.join(APP_DIR).join(CONFIG_FILE),
        )
    }

    /// Directory for the game snapshot and best score.
    #[must_use]
    pub fn resolved_save_dir(&self) -> PathBuf {
        if let Some(dir) = &self.save_dir {
            return dir.clone();
        }
        dirs::data_dir().map_or_else(|| PathBuf::from("saves"), |dir| dir.join(APP_DIR))
    }

    /// Validate and clamp configuration values to sensible ranges.
    pub fn validate(&mut self) {
        self.window.width = self.window.width.clamp(320, 7680);
        self.window.height = self.window.height.clamp(400, 4320);

        self.audio.validate();
        self.visuals.validate();
        self.game.validate();
    }

    /// Applies `--debug` and similar command-line switches.
    pub fn apply_args<I, S>(&mut self, args: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            match arg.as_ref() {
                "--debug" => self.debug.show_debug_overlay = true,
                "--mute" => self.audio.mute = true,
                other => warn!("Ignoring unknown argument: {other}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.window.width, 720);
        assert!(config.window.vsync);
        assert_eq!(config.game.size, 4);
        assert!(!config.debug.show_debug_overlay);
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();

        config.window.width = 100;
        config.audio.master_volume = 2.0;
        config.game.size = 20;

        config.validate();

        assert_eq!(config.window.width, 320);
        assert!((config.audio.master_volume - 1.0).abs() < f32::EPSILON);
        assert_eq!(config.game.size, 8);
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("test_config.toml");

        let mut config = EngineConfig::default();
        config.window.width = 1024;
        config.audio.mute = true;
        config.save_dir = Some(temp_dir.path().join("saves"));

        config.save_to(&config_path).expect("Failed to save config");

        let loaded = EngineConfig::load_from(&config_path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("partial.toml");
        fs::write(&config_path, "[visuals]\nmax_particles = 300\n").expect("write config");

        let loaded = EngineConfig::load_from(&config_path);
        assert_eq!(loaded.visuals.max_particles, 300);
        assert_eq!(loaded.window, WindowConfig::default());
    }

    #[test]
    fn test_invalid_file_falls_back() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("broken.toml");
        fs::write(&config_path, "window = 5").expect("write config");

        assert_eq!(EngineConfig::load_from(&config_path), EngineConfig::default());
    }

    #[test]
    fn test_config_load_missing_file() {
        let config = EngineConfig::load_from("/nonexistent/path/config.toml");
        assert_eq!(config.window.width, 720);
    }

    #[test]
    fn test_debug_flag() {
        let mut config = EngineConfig::default();
        config.apply_args(["--debug"]);
        assert!(config.debug.show_debug_overlay);
    }

    #[test]
    fn test_explicit_save_dir() {
        let config = EngineConfig {
            save_dir: Some(PathBuf::from("/tmp/reentry-saves")),
            ..EngineConfig::default()
        };
        assert_eq!(config.resolved_save_dir(), PathBuf::from("/tmp/reentry-saves"));
    }
}
