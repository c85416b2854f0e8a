//! Mission progress derived from the board.
//!
//! The board is reduced to two numbers, the tile sum and the largest tile, and
//! those are mapped onto a normalized progress factor that drives every
//! presentation layer. The curve is convex so the opening stays quiet, and it
//! is hard-capped during the early and mid phases.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::grid::Grid;
use crate::tile::tile_rank;

/// Tile sum at which the base curve saturates.
pub const SUM_CAP: u64 = 4000;
/// Exponent of the base curve.
pub const CURVE_EXPONENT: f32 = 2.5;
/// Tile sum below which the early ceiling applies.
pub const EARLY_PHASE_END: u64 = 200;
/// Tile sum below which the mid ceiling applies.
pub const MID_PHASE_END: u64 = 1000;
/// Progress ceiling during the early phase.
pub const EARLY_CEILING: f32 = 0.08;
/// Progress ceiling during the mid phase.
pub const MID_CEILING: f32 = 0.35;
/// Smallest max tile that adds a boost.
pub const BOOST_MIN_TILE: u32 = 512;
/// Boost per doubling of the max tile above 256.
pub const BOOST_PER_DOUBLING: f32 = 0.06;
/// Tile sum at which oxygen becomes critical.
pub const CRITICAL_OXYGEN_SUM: u64 = 2500;

/// Computes the progress factor for a tile sum and max tile.
#[must_use]
pub fn progress_factor(tile_sum: u64, max_tile: u32) -> f32 {
    let normalized = tile_sum.min(SUM_CAP) as f32 / SUM_CAP as f32;
    let base = normalized.powf(CURVE_EXPONENT);

    let boost = if max_tile >= BOOST_MIN_TILE {
        BOOST_PER_DOUBLING * (tile_rank(max_tile) as f32 - 8.0)
    } else {
        0.0
    };

    let mut value = base + boost;
    if tile_sum < EARLY_PHASE_END {
        value = value.min(EARLY_CEILING);
    } else if tile_sum < MID_PHASE_END {
        value = value.min(MID_CEILING);
    }
    value.clamp(0.0, 1.0)
}

/// Board totals and the progress factor computed from them.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProgressState {
    /// Sum of all tile values
    pub tile_sum: u64,
    /// Largest tile value
    pub max_tile: u32,
    /// Normalized progress in `[0, 1]`
    pub progress_factor: f32,
}

impl ProgressState {
    /// Computes the state for the given totals.
    #[must_use]
    pub fn from_totals(tile_sum: u64, max_tile: u32) -> Self {
        Self {
            tile_sum,
            max_tile,
            progress_factor: progress_factor(tile_sum, max_tile),
        }
    }

    /// Scans a board.
    #[must_use]
    pub fn from_grid(grid: &Grid) -> Self {
        Self::from_totals(grid.tile_sum(), grid.max_tile())
    }

    /// Oxygen classification of this state.
    #[must_use]
    pub fn oxygen(&self) -> OxygenLevel {
        OxygenLevel::from_tile_sum(self.tile_sum)
    }

    /// Atmosphere stage of this state.
    #[must_use]
    pub fn stage(&self) -> AtmosphereStage {
        AtmosphereStage::from_progress(self.progress_factor)
    }
}

/// Narrative oxygen gauge. Lower oxygen means a fuller board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum OxygenLevel {
    /// Tile sum below 200
    #[default]
    Stable,
    /// Tile sum below 1000
    Medium,
    /// Tile sum below 2500
    Low,
    /// Everything above
    Critical,
}

impl OxygenLevel {
    /// Classifies a tile sum.
    #[must_use]
    pub const fn from_tile_sum(tile_sum: u64) -> Self {
        if tile_sum < EARLY_PHASE_END {
            Self::Stable
        } else if tile_sum < MID_PHASE_END {
            Self::Medium
        } else if tile_sum < CRITICAL_OXYGEN_SUM {
            Self::Low
        } else {
            Self::Critical
        }
    }

    /// 0 for stable up to 3 for critical.
    #[must_use]
    pub const fn severity(self) -> u8 {
        self as u8
    }

    /// Display label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Stable => "STABLE",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
            Self::Critical => "CRITICAL",
        }
    }
}

/// Named bands of the progress factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AtmosphereStage {
    /// Orbit, before descent
    Space,
    /// Upper atmosphere
    Thermosphere,
    /// Meteor layer
    Mesosphere,
    /// Ozone layer
    Stratosphere,
    /// Plasma blackout
    Ionization,
    /// Full re-entry heating
    Reentry,
}

impl AtmosphereStage {
    /// Every stage, outermost first.
    pub const ALL: [Self; 6] = [
        Self::Space,
        Self::Thermosphere,
        Self::Mesosphere,
        Self::Stratosphere,
        Self::Ionization,
        Self::Reentry,
    ];

    /// Lower progress bound of each stage, indexed like [`Self::ALL`].
    const STARTS: [f32; 6] = [0.0, 0.15, 0.30, 0.45, 0.60, 0.80];

    /// Stage containing a progress factor.
    #[must_use]
    pub fn from_progress(progress: f32) -> Self {
        let progress = progress.clamp(0.0, 1.0);
        Self::ALL
            .iter()
            .zip(Self::STARTS)
            .rev()
            .find(|(_, start)| progress >= *start)
            .map_or(Self::Space, |(stage, _)| *stage)
    }

    /// Position in [`Self::ALL`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Progress range `[start, end)` covered by the stage.
    #[must_use]
    pub fn range(self) -> (f32, f32) {
        let i = self.index();
        let end = Self::STARTS.get(i + 1).copied().unwrap_or(1.0);
        (Self::STARTS[i], end)
    }

    /// Where a progress factor sits inside this stage, in `[0, 1]`.
    #[must_use]
    pub fn local_t(self, progress: f32) -> f32 {
        let (start, end) = self.range();
        ((progress - start) / (end - start)).clamp(0.0, 1.0)
    }

    /// Display label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Space => "Space",
            Self::Thermosphere => "Thermosphere",
            Self::Mesosphere => "Mesosphere",
            Self::Stratosphere => "Stratosphere",
            Self::Ionization => "Ionization",
            Self::Reentry => "Re-entry",
        }
    }
}

/// Change of oxygen level between two updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OxygenTransition {
    /// Level before the update
    pub from: OxygenLevel,
    /// Level after the update
    pub to: OxygenLevel,
}

/// Result of [`ProgressModel::update`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressUpdate {
    /// Fresh progress state
    pub state: ProgressState,
    /// Set when oxygen dropped to a more severe level
    pub oxygen_drop: Option<OxygenTransition>,
}

/// Tracks progress across moves and reports oxygen drops.
#[derive(Debug, Clone, Default)]
pub struct ProgressModel {
    state: ProgressState,
    oxygen: OxygenLevel,
}

impl ProgressModel {
    /// Creates a model at zero progress.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recomputes progress from the board.
    pub fn update(&mut self, grid: &Grid) -> ProgressUpdate {
        let state = ProgressState::from_grid(grid);
        let level = state.oxygen();
        let previous = self.oxygen;

        let oxygen_drop = (level > previous).then_some(OxygenTransition {
            from: previous,
            to: level,
        });
        if let Some(drop) = oxygen_drop {
            debug!(from = ?drop.from, to = ?drop.to, "Oxygen level dropped");
        }

        self.state = state;
        self.oxygen = level;
        ProgressUpdate { state, oxygen_drop }
    }

    /// Adopts the board's level without reporting a transition. Used after a
    /// restore so a loaded game does not replay alerts.
    pub fn sync(&mut self, grid: &Grid) -> ProgressState {
        self.state = ProgressState::from_grid(grid);
        self.oxygen = self.state.oxygen();
        self.state
    }

    /// Back to zero progress and stable oxygen.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Last computed state.
    #[must_use]
    pub const fn state(&self) -> ProgressState {
        self.state
    }

    /// Last oxygen level.
    #[must_use]
    pub const fn oxygen(&self) -> OxygenLevel {
        self.oxygen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EPS: f32 = 1e-5;

    #[test]
    fn test_empty_board_is_zero() {
        assert!(progress_factor(0, 0).abs() < EPS);
    }

    #[test]
    fn test_saturates_at_cap() {
        assert!((progress_factor(SUM_CAP, 1024) - 1.0).abs() < EPS);
        assert!((progress_factor(SUM_CAP * 3, 2048) - 1.0).abs() < EPS);
    }

    #[test]
    fn test_early_ceiling_ignores_max_tile() {
        assert!(progress_factor(150, 4096) <= EARLY_CEILING + EPS);
    }

    #[test]
    fn test_mid_ceiling() {
        assert!(progress_factor(900, 512) <= MID_CEILING + EPS);
    }

    #[test]
    fn test_boost_starts_at_512() {
        let sum = 2000;
        let without = progress_factor(sum, 256);
        let with = progress_factor(sum, 512);
        assert!((with - without - BOOST_PER_DOUBLING).abs() < EPS);
    }

    #[test]
    fn test_oxygen_levels() {
        assert_eq!(OxygenLevel::from_tile_sum(0), OxygenLevel::Stable);
        assert_eq!(OxygenLevel::from_tile_sum(200), OxygenLevel::Medium);
        assert_eq!(OxygenLevel::from_tile_sum(999), OxygenLevel::Medium);
        assert_eq!(OxygenLevel::from_tile_sum(1000), OxygenLevel::Low);
        assert_eq!(OxygenLevel::from_tile_sum(2500), OxygenLevel::Critical);
    }

    #[test]
    fn test_stage_bands() {
        assert_eq!(AtmosphereStage::from_progress(0.0), AtmosphereStage::Space);
        assert_eq!(AtmosphereStage::from_progress(0.15), AtmosphereStage::Thermosphere);
        assert_eq!(AtmosphereStage::from_progress(0.44), AtmosphereStage::Mesosphere);
        assert_eq!(AtmosphereStage::from_progress(0.5), AtmosphereStage::Stratosphere);
        assert_eq!(AtmosphereStage::from_progress(0.79), AtmosphereStage::Ionization);
        assert_eq!(AtmosphereStage::from_progress(1.0), AtmosphereStage::Reentry);
    }

    #[test]
    fn test_stage_local_t() {
        let stage = AtmosphereStage::Mesosphere;
        assert!(stage.local_t(0.30).abs() < EPS);
        assert!((stage.local_t(0.375) - 0.5).abs() < EPS);
        assert!((AtmosphereStage::Reentry.local_t(1.0) - 1.0).abs() < EPS);
    }

    #[test]
    fn test_model_reports_oxygen_drop_once() {
        let mut model = ProgressModel::new();
        let quiet = Grid::from_rows(&[&[2, 2], &[0, 0]]);
        assert!(model.update(&quiet).oxygen_drop.is_none());

        let fuller = Grid::from_rows(&[&[128, 64], &[8, 0]]);
        let update = model.update(&fuller);
        assert_eq!(
            update.oxygen_drop,
            Some(OxygenTransition {
                from: OxygenLevel::Stable,
                to: OxygenLevel::Medium
            })
        );
        assert!(model.update(&fuller).oxygen_drop.is_none());

        model.reset();
        assert_eq!(model.oxygen(), OxygenLevel::Stable);
    }

    #[test]
    fn test_sync_is_silent() {
        let mut model = ProgressModel::new();
        let grid = Grid::from_rows(&[&[1024, 1024], &[512, 0]]);
        let state = model.sync(&grid);
        assert_eq!(state.tile_sum, 2560);
        assert_eq!(model.oxygen(), OxygenLevel::Critical);
        assert!(model.update(&grid).oxygen_drop.is_none());
    }

    fn phase(sum: u64) -> u8 {
        if sum < EARLY_PHASE_END {
            0
        } else if sum < MID_PHASE_END {
            1
        } else {
            2
        }
    }

    proptest! {
        #[test]
        fn prop_factor_in_unit_range(sum in 0u64..20_000, rank in 1u32..17) {
            let factor = progress_factor(sum, 1 << rank);
            prop_assert!((0.0..=1.0).contains(&factor));
        }

        #[test]
        fn prop_monotonic_within_phase(a in 0u64..6000, b in 0u64..6000, rank in 1u32..14) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assume!(phase(lo) == phase(hi));
            let max_tile = 1 << rank;
            prop_assert!(progress_factor(lo, max_tile) <= progress_factor(hi, max_tile) + EPS);
        }
    }
}
