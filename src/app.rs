use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{info, warn};

use crate::input::InputState;
use crate::render::pipeline::{Frame, OverlayInfo, RenderPipeline};
use crate::scene::Scene;
use crate::state::{ProgramState, StateError};

/// Seconds elapsed between consecutive frames.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Instant,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self {
            last: Instant::now(),
        }
    }
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let dt = now.duration_since(self.last).as_secs_f32();
        self.last = now;
        dt
    }
}

/// Owns everything one run of the viewer mutates and draws.
#[derive(Debug)]
pub struct Viewer {
    pub state: ProgramState,
    pub input: InputState,
    pub scene: Scene,
    pipeline: RenderPipeline,
    state_path: PathBuf,
    clock: FrameClock,
}

impl Viewer {
    /// Loads the persisted state (keeping defaults for anything unreadable)
    /// and the scene below `resources`.
    pub fn new(state_path: impl Into<PathBuf>, resources: impl AsRef<Path>) -> Self {
        let state_path = state_path.into();
        let mut state = ProgramState::default();
        if let Err(err) = state.load_from_file(&state_path) {
            warn!("keeping default program state: {err}");
        }
        let scene = Scene::load(resources);
        info!(
            "scene ready: {} model(s), {} instance(s)",
            scene.models.len(),
            scene.instances.len()
        );
        Self {
            state,
            input: InputState::new(),
            scene,
            pipeline: RenderPipeline::new(),
            state_path,
            clock: FrameClock::new(),
        }
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    pub fn pipeline(&self) -> &RenderPipeline {
        &self.pipeline
    }

    /// Advances the clock and applies held movement keys.
    pub fn update(&mut self) -> f32 {
        let dt = self.clock.tick();
        self.input.apply_held_keys(dt, &mut self.state);
        dt
    }

    pub fn plan_frame(&self, aspect_ratio: f32) -> Frame {
        self.pipeline.plan(&self.state, &self.scene, aspect_ratio)
    }

    pub fn save_state(&self) -> Result<(), StateError> {
        self.state.save_to_file(&self.state_path)
    }
}

pub fn print_final_state(state: &ProgramState) {
    let info = OverlayInfo::from_state(state);
    println!("Final camera state:");
    println!(" - {}", info.summary());
    println!(" - zoom {:.1}", state.camera.zoom());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::KeyCode;
    use glam::Vec3;
    use tempfile::tempdir;

    #[test]
    fn viewer_saves_where_it_loaded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("program_state.txt");
        std::fs::write(&path, "0.1 0.2 0.3 0 1 2 3 0 0 -1").unwrap();

        let mut viewer = Viewer::new(&path, dir.path());
        assert_eq!(viewer.state.camera.position(), Vec3::new(1.0, 2.0, 3.0));
        viewer
            .input
            .key_pressed(KeyCode::W, false, &mut viewer.state);
        viewer.update();
        viewer.save_state().unwrap();

        let mut reloaded = ProgramState::default();
        reloaded.load_from_file(viewer.state_path()).unwrap();
        assert_eq!(reloaded.camera.position(), viewer.state.camera.position());
        assert_eq!(reloaded.clear_color, Vec3::new(0.1, 0.2, 0.3));
    }

    #[test]
    fn planned_frame_uses_viewer_state() {
        let dir = tempdir().unwrap();
        let viewer = Viewer::new(dir.path().join("missing.txt"), dir.path());
        let frame = viewer.plan_frame(800.0 / 600.0);
        assert_eq!(frame.draws().count(), 6);
        assert_eq!(viewer.pipeline().passes().len(), 4);
    }
}
