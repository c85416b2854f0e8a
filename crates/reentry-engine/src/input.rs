//! Input handling for the engine.
//!
//! Bridges winit window events to [`GameCommand`]s. Keys map directly; mouse
//! drags and touches go through a [`SwipeDetector`].

use glam::Vec2;
use winit::event::{ElementState, MouseButton, TouchPhase, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use reentry_gameplay::{Direction, GameCommand, SwipeDetector};

/// What a key press asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// A game command
    Command(GameCommand),
    /// Show/hide the debug panel
    ToggleDebug,
}

/// Maps a physical key to an action.
///
/// Debug cheats only map when `debug_enabled` is set.
#[must_use]
pub fn map_key(key: KeyCode, debug_enabled: bool) -> Option<KeyAction> {
    let command = match key {
        KeyCode::ArrowUp | KeyCode::KeyW | KeyCode::KeyK => GameCommand::Move(Direction::Up),
        KeyCode::ArrowRight | KeyCode::KeyD | KeyCode::KeyL => GameCommand::Move(Direction::Right),
        KeyCode::ArrowDown | KeyCode::KeyS | KeyCode::KeyJ => GameCommand::Move(Direction::Down),
        KeyCode::ArrowLeft | KeyCode::KeyA | KeyCode::KeyH => GameCommand::Move(Direction::Left),
        KeyCode::KeyR => GameCommand::Restart,
        KeyCode::KeyC | KeyCode::Enter => GameCommand::KeepPlaying,
        KeyCode::F9 if debug_enabled => GameCommand::DebugWin,
        KeyCode::F10 if debug_enabled => GameCommand::DebugLose,
        KeyCode::F3 => return Some(KeyAction::ToggleDebug),
        _ => return None,
    };
    Some(KeyAction::Command(command))
}

/// Turns window events into game commands.
#[derive(Debug)]
pub struct InputHandler {
    /// Commands collected since the last drain
    pending: Vec<GameCommand>,
    /// Mouse/touch drag tracking
    swipe: SwipeDetector,
    /// Last known cursor position
    cursor: Vec2,
    /// Touch id being tracked, if the swipe came from a touch
    touch_id: Option<u64>,
    /// Whether F3 was pressed this frame
    debug_toggle_pressed: bool,
    /// Whether debug cheats are accepted
    debug_enabled: bool,
    /// Whether the player has interacted yet
    interacted: bool,
}

impl InputHandler {
    /// Create a new input handler.
    #[must_use]
    pub fn new(debug_enabled: bool) -> Self {
        Self {
            pending: Vec::new(),
            swipe: SwipeDetector::new(),
            cursor: Vec2::ZERO,
            touch_id: None,
            debug_toggle_pressed: false,
            debug_enabled,
            interacted: false,
        }
    }

    /// Handle a winit window event. Returns true if the event was handled.
    pub fn handle_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                let PhysicalKey::Code(key) = event.physical_key else {
                    return false;
                };
                if event.state != ElementState::Pressed {
                    return false;
                }
                self.interacted = true;
                // Holding a key repeats moves but not one-shot actions.
                match map_key(key, self.debug_enabled) {
                    Some(KeyAction::Command(command @ GameCommand::Move(_))) => {
                        self.pending.push(command);
                        true
                    }
                    Some(KeyAction::Command(command)) if !event.repeat => {
                        self.pending.push(command);
                        true
                    }
                    Some(KeyAction::ToggleDebug) if !event.repeat => {
                        self.debug_toggle_pressed = true;
                        true
                    }
                    _ => false,
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = Vec2::new(position.x as f32, position.y as f32);
                false
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                self.interacted = true;
                match state {
                    ElementState::Pressed => self.swipe.begin(self.cursor),
                    ElementState::Released => self.finish_swipe(self.cursor),
                }
                true
            }
            WindowEvent::Touch(touch) => {
                self.interacted = true;
                let position = Vec2::new(touch.location.x as f32, touch.location.y as f32);
                match touch.phase {
                    TouchPhase::Started => {
                        // Only one finger drives a swipe.
                        if self.touch_id.is_none() {
                            self.touch_id = Some(touch.id);
                            self.swipe.begin(position);
                        } else {
                            self.swipe.cancel();
                        }
                    }
                    TouchPhase::Ended if self.touch_id == Some(touch.id) => {
                        self.touch_id = None;
                        self.finish_swipe(position);
                    }
                    TouchPhase::Cancelled => {
                        self.touch_id = None;
                        self.swipe.cancel();
                    }
                    _ => {}
                }
                true
            }
            _ => false,
        }
    }

    fn finish_swipe(&mut self, position: Vec2) {
        if let Some(direction) = self.swipe.end(position) {
            self.pending.push(GameCommand::Move(direction));
        }
    }

    /// Takes the commands collected so far.
    pub fn drain_commands(&mut self) -> Vec<GameCommand> {
        std::mem::take(&mut self.pending)
    }

    /// Check if debug overlay was toggled (F3).
    #[must_use]
    pub fn debug_toggle_pressed(&self) -> bool {
        self.debug_toggle_pressed
    }

    /// Whether any key, click or touch has been seen.
    #[must_use]
    pub fn has_interacted(&self) -> bool {
        self.interacted
    }

    /// Reset per-frame state. Call at the end of each frame.
    pub fn end_frame(&mut self) {
        self.debug_toggle_pressed = false;
    }
}
