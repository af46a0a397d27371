//! Viewer state that survives between runs.
//!
//! The file is plain text with ten whitespace-separated values and no
//! header: clear colour (r, g, b), overlay flag (`0`/`1`), camera position
//! (x, y, z) and camera front (x, y, z).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use glam::Vec3;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::camera::Camera;
use crate::lighting::LightingModel;

/// Number of values in the persisted file.
pub const PERSISTED_FIELDS: usize = 10;

const FIELD_NAMES: [&str; PERSISTED_FIELDS] = [
    "clear_color.r",
    "clear_color.g",
    "clear_color.b",
    "overlay_enabled",
    "camera.position.x",
    "camera.position.y",
    "camera.position.z",
    "camera.front.x",
    "camera.front.y",
    "camera.front.z",
];

#[derive(Debug, Error)]
pub enum StateError {
    #[error("unable to access state file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid value {value:?} for {field}")]
    Parse { field: &'static str, value: String },
    #[error("state file ends before {field}")]
    Truncated { field: &'static str },
}

/// Result of reading a state file.
#[derive(Debug)]
pub enum LoadOutcome {
    /// No file; every field keeps its current value.
    Missing,
    Complete,
    /// Reading stopped early. The first `fields_read` values were applied,
    /// the rest keep their current value.
    Partial { fields_read: usize, error: StateError },
}

/// Everything the frame loop mutates: camera, lights and UI flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramState {
    pub clear_color: Vec3,
    pub overlay_enabled: bool,
    pub camera_mouse_update_enabled: bool,
    pub camera: Camera,
    pub lighting: LightingModel,
}

impl Default for ProgramState {
    fn default() -> Self {
        Self {
            clear_color: Vec3::ZERO,
            overlay_enabled: false,
            camera_mouse_update_enabled: true,
            camera: Camera::new(Vec3::new(0.0, 0.0, 3.0)),
            lighting: LightingModel::default(),
        }
    }
}

impl ProgramState {
    /// Text written by [`ProgramState::save_to_file`].
    pub fn to_persisted_string(&self) -> String {
        let position = self.camera.position();
        let front = self.camera.front();
        let colour = self.clear_color.to_array().map(|value| value.to_string());
        let overlay = u8::from(self.overlay_enabled).to_string();
        let camera = position
            .to_array()
            .into_iter()
            .chain(front.to_array())
            .map(|value| value.to_string());
        let mut lines: Vec<String> = colour.into_iter().collect();
        lines.push(overlay);
        lines.extend(camera);
        let mut out = lines.join("\n");
        out.push('\n');
        out
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), StateError> {
        let path = path.as_ref();
        fs::write(path, self.to_persisted_string()).map_err(|source| StateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("saved program state to {}", path.display());
        Ok(())
    }

    /// Overlays values read from `path` onto `self`.
    ///
    /// A missing file is not an error. Reading stops at the first missing or
    /// malformed value; everything before it is applied.
    pub fn load_from_file(&mut self, path: impl AsRef<Path>) -> Result<LoadOutcome, StateError> {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                info!("no state file at {}, using defaults", path.display());
                return Ok(LoadOutcome::Missing);
            }
            Err(source) => {
                return Err(StateError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let outcome = self.apply_persisted(&contents);
        match &outcome {
            LoadOutcome::Partial { fields_read, error } => warn!(
                "state file {} read partially ({fields_read} of {PERSISTED_FIELDS} values): {error}",
                path.display()
            ),
            _ => info!("loaded program state from {}", path.display()),
        }
        Ok(outcome)
    }

    /// Applies persisted text to `self`. See [`ProgramState::load_from_file`].
    pub fn apply_persisted(&mut self, contents: &str) -> LoadOutcome {
        let mut reader = FieldReader::new(contents);
        match self.read_fields(&mut reader) {
            Ok(()) => LoadOutcome::Complete,
            Err(error) => LoadOutcome::Partial {
                fields_read: reader.read,
                error,
            },
        }
    }

    fn read_fields(&mut self, reader: &mut FieldReader<'_>) -> Result<(), StateError> {
        self.clear_color.x = reader.next_f32()?;
        self.clear_color.y = reader.next_f32()?;
        self.clear_color.z = reader.next_f32()?;

        let overlay = reader.next_bool()?;
        self.set_overlay(overlay);

        let mut position = self.camera.position();
        position.x = reader.next_f32()?;
        self.camera.set_position(position);
        position.y = reader.next_f32()?;
        self.camera.set_position(position);
        position.z = reader.next_f32()?;
        self.camera.set_position(position);

        // each component lands on the current front as soon as it is read;
        // the raw vector is kept so later components are not skewed by the
        // normalisation in `look_along`
        let mut front = self.camera.front();
        for axis in 0..3 {
            front[axis] = reader.next_f32()?;
            self.apply_front(front);
        }
        Ok(())
    }

    fn apply_front(&mut self, front: Vec3) {
        if !self.camera.look_along(front) {
            warn!("ignoring degenerate camera front {front}");
        }
    }

    /// Flips the overlay. Returns the new value.
    ///
    /// Opening the overlay hands the mouse to it, so the camera stops
    /// following mouse motion; closing gives the mouse back to the camera.
    pub fn toggle_overlay(&mut self) -> bool {
        self.set_overlay(!self.overlay_enabled);
        self.overlay_enabled
    }

    fn set_overlay(&mut self, enabled: bool) {
        self.overlay_enabled = enabled;
        self.camera_mouse_update_enabled = !enabled;
    }
}

struct FieldReader<'a> {
    tokens: std::str::SplitWhitespace<'a>,
    read: usize,
}

impl<'a> FieldReader<'a> {
    fn new(contents: &'a str) -> Self {
        Self {
            tokens: contents.split_whitespace(),
            read: 0,
        }
    }

    fn next_token(&mut self) -> Result<(&'static str, &'a str), StateError> {
        let field = FIELD_NAMES[self.read.min(PERSISTED_FIELDS - 1)];
        let token = self
            .tokens
            .next()
            .ok_or(StateError::Truncated { field })?;
        Ok((field, token))
    }

    fn next_f32(&mut self) -> Result<f32, StateError> {
        let (field, token) = self.next_token()?;
        let value = token
            .parse::<f32>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| StateError::Parse {
                field,
                value: token.to_string(),
            })?;
        self.read += 1;
        Ok(value)
    }

    fn next_bool(&mut self) -> Result<bool, StateError> {
        let (field, token) = self.next_token()?;
        let value = match token {
            "0" => false,
            "1" => true,
            _ => {
                return Err(StateError::Parse {
                    field,
                    value: token.to_string(),
                })
            }
        };
        self.read += 1;
        Ok(value)
    }
}
