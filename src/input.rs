use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::camera::{CameraMovement, DEFAULT_SENSITIVITY};
use crate::state::ProgramState;

/// Scroll distance, in pixels, treated as one wheel line.
pub const PIXELS_PER_LINE: f32 = 20.0;

/// Keys the viewer reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    W,
    A,
    S,
    D,
    F1,
    F2,
    Escape,
}

impl KeyCode {
    fn movement(self) -> Option<CameraMovement> {
        match self {
            Self::W => Some(CameraMovement::Forward),
            Self::S => Some(CameraMovement::Backward),
            Self::A => Some(CameraMovement::Left),
            Self::D => Some(CameraMovement::Right),
            _ => None,
        }
    }
}

/// What the window layer should do after an input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    None,
    /// Hide and confine the cursor; the camera follows the mouse.
    CaptureCursor,
    /// Show the cursor for the overlay.
    ReleaseCursor,
    Exit,
}

/// Held keys plus the mapping from raw events to state changes.
#[derive(Debug, Clone)]
pub struct InputState {
    keys: HashSet<KeyCode>,
    sensitivity: f32,
}

impl Default for InputState {
    fn default() -> Self {
        Self {
            keys: HashSet::new(),
            sensitivity: DEFAULT_SENSITIVITY,
        }
    }
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sensitivity(sensitivity: f32) -> Self {
        Self {
            sensitivity,
            ..Self::default()
        }
    }

    pub fn sensitivity(&self) -> f32 {
        self.sensitivity
    }

    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.keys.contains(&key)
    }

    /// Handles a key press. Auto-repeat only refreshes the held set.
    pub fn key_pressed(
        &mut self,
        key: KeyCode,
        repeat: bool,
        state: &mut ProgramState,
    ) -> InputAction {
        self.keys.insert(key);
        if repeat {
            return InputAction::None;
        }
        match key {
            KeyCode::Escape => InputAction::Exit,
            KeyCode::F1 => {
                if state.toggle_overlay() {
                    InputAction::ReleaseCursor
                } else {
                    InputAction::CaptureCursor
                }
            }
            KeyCode::F2 if state.overlay_enabled => {
                state.camera_mouse_update_enabled = !state.camera_mouse_update_enabled;
                InputAction::None
            }
            _ => InputAction::None,
        }
    }

    pub fn key_released(&mut self, key: KeyCode) {
        self.keys.remove(&key);
    }

    /// Drops every held key, e.g. when the window loses focus.
    pub fn release_all(&mut self) {
        self.keys.clear();
    }

    /// Raw mouse delta in pixels. Screen y grows downwards, so it is
    /// negated before becoming pitch.
    pub fn mouse_motion(&self, dx: f64, dy: f64, state: &mut ProgramState) {
        if !state.camera_mouse_update_enabled {
            return;
        }
        state.camera.process_mouse_movement(
            dx as f32 * self.sensitivity,
            -dy as f32 * self.sensitivity,
        );
    }

    /// Vertical wheel movement in lines.
    pub fn scroll_lines(&self, lines: f32, state: &mut ProgramState) {
        state.camera.process_mouse_scroll(lines);
    }

    pub fn scroll_pixels(&self, pixels: f64, state: &mut ProgramState) {
        self.scroll_lines(pixels as f32 / PIXELS_PER_LINE, state);
    }

    /// Moves the camera for every held movement key.
    pub fn apply_held_keys(&self, dt: f32, state: &mut ProgramState) {
        for key in [KeyCode::W, KeyCode::S, KeyCode::A, KeyCode::D] {
            if let Some(direction) = key.movement().filter(|_| self.is_key_down(key)) {
                state.camera.process_keyboard(direction, dt);
            }
        }
    }
}
