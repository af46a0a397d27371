use glam::{Mat4, Vec3};

use super::pipeline::{
    DrawCall, MeshId, OverlayInfo, PassKind, PipelineState, Program, RenderBackend, StateChange,
};

/// One call received by a [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Clear(Vec3),
    State(StateChange),
    Draw {
        pass: PassKind,
        program: Program,
        mesh: MeshId,
        /// Pipeline state in effect when the draw was issued.
        state: PipelineState,
        view: Mat4,
    },
    Overlay(OverlayInfo),
}

/// Backend that tracks pipeline state and keeps a log of every call instead
/// of touching a GPU.
#[derive(Debug, Clone, Default)]
pub struct RecordingBackend {
    state: PipelineState,
    entries: Vec<Recorded>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[Recorded] {
        &self.entries
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn clear_log(&mut self) {
        self.entries.clear();
    }

    /// Passes in the order their draws were issued, without repeats.
    pub fn pass_order(&self) -> Vec<PassKind> {
        let mut order: Vec<PassKind> = Vec::new();
        for entry in &self.entries {
            if let Recorded::Draw { pass, .. } = entry {
                if order.last() != Some(pass) {
                    order.push(*pass);
                }
            }
        }
        order
    }

    pub fn draw_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(entry, Recorded::Draw { .. }))
            .count()
    }

    /// Human readable trace, one call per line.
    pub fn trace(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| match entry {
                Recorded::Clear(color) => {
                    format!("clear ({:.2}, {:.2}, {:.2})", color.x, color.y, color.z)
                }
                Recorded::State(change) => format!("state {change:?}"),
                Recorded::Draw {
                    pass,
                    program,
                    mesh,
                    state,
                    ..
                } => format!(
                    "draw {} {program:?} {mesh:?} blend={} depth_write={} depth={:?} cull={:?}",
                    pass.name(),
                    state.blend.is_some(),
                    state.depth_write,
                    state.depth_compare,
                    state.cull
                ),
                Recorded::Overlay(info) => format!("overlay {}", info.summary()),
            })
            .collect()
    }
}

impl RenderBackend for RecordingBackend {
    fn clear(&mut self, color: Vec3) {
        self.entries.push(Recorded::Clear(color));
    }

    fn apply(&mut self, change: StateChange) {
        self.state.apply(change);
        self.entries.push(Recorded::State(change));
    }

    fn draw(&mut self, call: &DrawCall) {
        self.entries.push(Recorded::Draw {
            pass: call.pass,
            program: call.program,
            mesh: call.mesh,
            state: self.state,
            view: call.view,
        });
    }

    fn overlay(&mut self, info: &OverlayInfo) {
        self.entries.push(Recorded::Overlay(*info));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::pipeline::RenderPipeline;
    use crate::scene::Scene;
    use crate::state::ProgramState;

    #[test]
    fn records_passes_in_plan_order() {
        let dir = tempfile::tempdir().unwrap();
        let scene = Scene::load(dir.path());
        let frame = RenderPipeline::new().plan(&ProgramState::default(), &scene, 1.0);

        let mut backend = RecordingBackend::new();
        frame.replay(&mut backend);
        assert_eq!(
            backend.pass_order(),
            vec![
                PassKind::Foliage,
                PassKind::Water,
                PassKind::Models,
                PassKind::Skybox
            ]
        );
        assert_eq!(backend.draw_count(), 6);
        assert_eq!(backend.trace().len(), backend.entries().len());
        assert!(backend.trace()[0].starts_with("clear"));
    }

    #[test]
    fn consecutive_frames_start_from_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let scene = Scene::load(dir.path());
        let pipeline = RenderPipeline::new();
        let state = ProgramState::default();

        let mut backend = RecordingBackend::new();
        pipeline.plan(&state, &scene, 1.0).replay(&mut backend);
        let first = backend.entries().to_vec();
        backend.clear_log();
        pipeline.plan(&state, &scene, 1.0).replay(&mut backend);
        assert_eq!(backend.entries(), first.as_slice());
        assert_eq!(backend.state(), PipelineState::BASELINE);
    }
}
