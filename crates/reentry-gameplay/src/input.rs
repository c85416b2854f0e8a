//! Device-agnostic player commands.
//!
//! The engine never sees keys or touches. Front-ends translate their raw input
//! into [`GameCommand`]s; pointer drags go through [`SwipeDetector`].

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Direction of a move on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Towards row 0
    Up,
    /// Towards the last column
    Right,
    /// Towards the last row
    Down,
    /// Towards column 0
    Left,
}

impl Direction {
    /// All directions, in clockwise order starting from `Up`.
    pub const ALL: [Self; 4] = [Self::Up, Self::Right, Self::Down, Self::Left];

    /// Unit step on the board for this direction.
    #[must_use]
    pub const fn vector(self) -> (i32, i32) {
        match self {
            Self::Up => (0, -1),
            Self::Right => (1, 0),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
        }
    }

    /// Unit vector in screen space (y grows downwards).
    #[must_use]
    pub fn unit(self) -> Vec2 {
        let (x, y) = self.vector();
        Vec2::new(x as f32, y as f32)
    }

    /// Lowercase name used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Right => "right",
            Self::Down => "down",
            Self::Left => "left",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Abstract command fed into the game engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameCommand {
    /// Slide all tiles in a direction
    Move(Direction),
    /// Throw away the current game and start over
    Restart,
    /// Continue after reaching the win tile
    KeepPlaying,
    /// Debug cheat: place the win tile and win immediately
    DebugWin,
    /// Debug cheat: fill the board and lose immediately
    DebugLose,
}

impl GameCommand {
    /// Whether this command is a debug cheat.
    #[must_use]
    pub const fn is_debug(self) -> bool {
        matches!(self, Self::DebugWin | Self::DebugLose)
    }
}

/// Minimum drag distance, in logical pixels, before a drag counts as a swipe.
pub const SWIPE_THRESHOLD: f32 = 10.0;

/// Turns a pointer or touch drag into a move direction.
///
/// The dominant axis of the drag decides the direction; drags shorter than
/// [`SWIPE_THRESHOLD`] are ignored.
#[derive(Debug, Clone, Default)]
pub struct SwipeDetector {
    start: Option<Vec2>,
    threshold: f32,
}

impl SwipeDetector {
    /// Creates a detector with the default threshold.
    #[must_use]
    pub fn new() -> Self {
        Self {
            start: None,
            threshold: SWIPE_THRESHOLD,
        }
    }

    /// Creates a detector with a custom threshold.
    #[must_use]
    pub fn with_threshold(threshold: f32) -> Self {
        Self {
            start: None,
            threshold: threshold.max(0.0),
        }
    }

    /// Records the start of a drag.
    pub fn begin(&mut self, position: Vec2) {
        self.start = Some(position);
    }

    /// Whether a drag is in progress.
    #[must_use]
    pub fn is_tracking(&self) -> bool {
        self.start.is_some()
    }

    /// Abandons the current drag.
    pub fn cancel(&mut self) {
        self.start = None;
    }

    /// Finishes a drag and returns the swipe direction, if any.
    pub fn end(&mut self, position: Vec2) -> Option<Direction> {
        let start = self.start.take()?;
        let delta = position - start;
        let (abs_x, abs_y) = (delta.x.abs(), delta.y.abs());

        if abs_x.max(abs_y) <= self.threshold {
            return None;
        }

        Some(if abs_x > abs_y {
            if delta.x > 0.0 {
                Direction::Right
            } else {
                Direction::Left
            }
        } else if delta.y > 0.0 {
            Direction::Down
        } else {
            Direction::Up
        })
    }
}
