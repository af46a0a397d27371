//! Per-frame pass ordering and the fixed-function state each pass needs.
//!
//! A frame is planned as a flat list of [`Command`]s. State is tracked while
//! planning, so the list only contains the transitions that actually change
//! something; replaying it on any [`RenderBackend`] reproduces the exact
//! sequence of state changes and draws.

use glam::{Mat4, Vec3};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::lighting::LightUniform;
use crate::scene::Scene;
use crate::state::ProgramState;

/// Colour blending equation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlendMode {
    /// `src * src_alpha + dst * (1 - src_alpha)`
    Alpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DepthCompare {
    Less,
    /// Passes for fragments at the same depth as the buffer, used to draw
    /// the skybox at the far plane.
    LessEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CullFace {
    Front,
    Back,
}

/// Snapshot of the fixed-function state that affects a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PipelineState {
    pub blend: Option<BlendMode>,
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare: DepthCompare,
    pub cull: Option<CullFace>,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::BASELINE
    }
}

/// One transition of the fixed-function state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateChange {
    EnableBlend(BlendMode),
    DisableBlend,
    EnableDepthTest,
    DisableDepthTest,
    DepthMask(bool),
    DepthFunc(DepthCompare),
    EnableCull(CullFace),
    DisableCull,
}

impl PipelineState {
    /// State every frame starts and ends in.
    pub const BASELINE: Self = Self {
        blend: None,
        depth_test: true,
        depth_write: true,
        depth_compare: DepthCompare::Less,
        cull: None,
    };

    pub const fn with_blend(mut self, blend: BlendMode) -> Self {
        self.blend = Some(blend);
        self
    }

    pub const fn with_cull(mut self, face: CullFace) -> Self {
        self.cull = Some(face);
        self
    }

    pub const fn with_depth(mut self, write: bool, compare: DepthCompare) -> Self {
        self.depth_write = write;
        self.depth_compare = compare;
        self
    }

    /// Minimal list of changes that turns `self` into `target`.
    pub fn transitions_to(&self, target: &Self) -> Vec<StateChange> {
        let mut changes = Vec::new();
        if self.blend != target.blend {
            changes.push(match target.blend {
                Some(mode) => StateChange::EnableBlend(mode),
                None => StateChange::DisableBlend,
            });
        }
        if self.depth_test != target.depth_test {
            changes.push(if target.depth_test {
                StateChange::EnableDepthTest
            } else {
                StateChange::DisableDepthTest
            });
        }
        if self.depth_write != target.depth_write {
            changes.push(StateChange::DepthMask(target.depth_write));
        }
        if self.depth_compare != target.depth_compare {
            changes.push(StateChange::DepthFunc(target.depth_compare));
        }
        if self.cull != target.cull {
            changes.push(match target.cull {
                Some(face) => StateChange::EnableCull(face),
                None => StateChange::DisableCull,
            });
        }
        changes
    }

    pub fn apply(&mut self, change: StateChange) {
        match change {
            StateChange::EnableBlend(mode) => self.blend = Some(mode),
            StateChange::DisableBlend => self.blend = None,
            StateChange::EnableDepthTest => self.depth_test = true,
            StateChange::DisableDepthTest => self.depth_test = false,
            StateChange::DepthMask(write) => self.depth_write = write,
            StateChange::DepthFunc(compare) => self.depth_compare = compare,
            StateChange::EnableCull(face) => self.cull = Some(face),
            StateChange::DisableCull => self.cull = None,
        }
    }
}

/// Shader program a draw runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Program {
    /// Unlit, single texture.
    Foliage,
    /// Directional light, diffuse and specular maps.
    Water,
    /// Directional and point light.
    Model,
    /// Cube texture, view without translation.
    Skybox,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PassKind {
    Foliage,
    Water,
    Models,
    Skybox,
}

impl PassKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Foliage => "foliage",
            Self::Water => "water",
            Self::Models => "models",
            Self::Skybox => "skybox",
        }
    }
}

/// Mesh a draw call references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeshId {
    Foliage,
    Water,
    Skybox,
    /// Index into [`Scene::models`].
    Model(usize),
}

/// What a pass needs from the pipeline and what it leaves behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassDescriptor {
    pub kind: PassKind,
    pub program: Program,
    /// State established before the first draw. For the model pass the cull
    /// face is further set per instance.
    pub state: PipelineState,
    /// State re-established once the pass has drawn, if any.
    pub restore: Option<PipelineState>,
}

/// Passes in the only order that produces a correct image.
pub const PASS_ORDER: [PassDescriptor; 4] = [
    PassDescriptor {
        kind: PassKind::Foliage,
        program: Program::Foliage,
        state: PipelineState::BASELINE.with_blend(BlendMode::Alpha),
        restore: None,
    },
    PassDescriptor {
        kind: PassKind::Water,
        program: Program::Water,
        state: PipelineState::BASELINE,
        restore: None,
    },
    PassDescriptor {
        kind: PassKind::Models,
        program: Program::Model,
        state: PipelineState::BASELINE,
        restore: Some(PipelineState::BASELINE),
    },
    PassDescriptor {
        kind: PassKind::Skybox,
        program: Program::Skybox,
        state: PipelineState::BASELINE.with_depth(false, DepthCompare::LessEqual),
        restore: Some(PipelineState::BASELINE),
    },
];

/// Everything a backend needs to issue one draw.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub pass: PassKind,
    pub program: Program,
    pub mesh: MeshId,
    pub model: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
    pub view_position: Vec3,
    pub lights: Option<LightUniform>,
}

/// Camera readout handed to the debug overlay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayInfo {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub front: Vec3,
    pub mouse_follow: bool,
}

impl OverlayInfo {
    pub fn from_state(state: &ProgramState) -> Self {
        let camera = &state.camera;
        Self {
            position: camera.position(),
            yaw: camera.yaw(),
            pitch: camera.pitch(),
            front: camera.front(),
            mouse_follow: state.camera_mouse_update_enabled,
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "Camera position: ({:.2}, {:.2}, {:.2}) | (Yaw, Pitch): ({:.1}, {:.1}) | Camera front: ({:.2}, {:.2}, {:.2}) | mouse update: {}",
            self.position.x,
            self.position.y,
            self.position.z,
            self.yaw,
            self.pitch,
            self.front.x,
            self.front.y,
            self.front.z,
            if self.mouse_follow { "on" } else { "off" },
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Clear(Vec3),
    SetState(StateChange),
    Draw(DrawCall),
    Overlay(OverlayInfo),
}

/// Consumer of a planned frame.
pub trait RenderBackend {
    fn clear(&mut self, color: Vec3);
    fn apply(&mut self, change: StateChange);
    fn draw(&mut self, call: &DrawCall);
    fn overlay(&mut self, info: &OverlayInfo);
}

/// Ordered commands for one frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    pub commands: Vec<Command>,
    state: PipelineState,
}

impl Frame {
    fn new() -> Self {
        Self {
            commands: Vec::new(),
            state: PipelineState::BASELINE,
        }
    }

    fn transition(&mut self, target: PipelineState) {
        for change in self.state.transitions_to(&target) {
            self.state.apply(change);
            self.commands.push(Command::SetState(change));
        }
    }

    /// State the pipeline is left in after the last command.
    pub fn final_state(&self) -> PipelineState {
        self.state
    }

    pub fn draws(&self) -> impl Iterator<Item = &DrawCall> {
        self.commands.iter().filter_map(|command| match command {
            Command::Draw(call) => Some(call),
            _ => None,
        })
    }

    pub fn replay(&self, backend: &mut impl RenderBackend) {
        for command in &self.commands {
            match command {
                Command::Clear(color) => backend.clear(*color),
                Command::SetState(change) => backend.apply(*change),
                Command::Draw(call) => backend.draw(call),
                Command::Overlay(info) => backend.overlay(info),
            }
        }
    }
}

/// Plans frames from the program state and the scene.
#[derive(Debug, Clone)]
pub struct RenderPipeline {
    passes: Vec<PassDescriptor>,
}

impl Default for RenderPipeline {
    fn default() -> Self {
        Self {
            passes: PASS_ORDER.to_vec(),
        }
    }
}

impl RenderPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn passes(&self) -> &[PassDescriptor] {
        &self.passes
    }

    /// Plans one frame. Assumes the pipeline starts in
    /// [`PipelineState::BASELINE`] and leaves it there.
    pub fn plan(&self, state: &ProgramState, scene: &Scene, aspect_ratio: f32) -> Frame {
        let camera = &state.camera;
        let view = camera.view_matrix();
        let projection = camera.projection(aspect_ratio);
        let view_position = camera.position();

        let mut frame = Frame::new();
        frame.commands.push(Command::Clear(state.clear_color));

        for pass in &self.passes {
            frame.transition(pass.state);
            let draw = |frame: &mut Frame, mesh: MeshId, model: Mat4, lights: Option<LightUniform>| {
                let view = match pass.program {
                    Program::Skybox => camera.rotation_only_view(),
                    _ => view,
                };
                frame.commands.push(Command::Draw(DrawCall {
                    pass: pass.kind,
                    program: pass.program,
                    mesh,
                    model,
                    view,
                    projection,
                    view_position,
                    lights,
                }));
            };

            match pass.kind {
                PassKind::Foliage => draw(&mut frame, MeshId::Foliage, Mat4::IDENTITY, None),
                PassKind::Water => draw(
                    &mut frame,
                    MeshId::Water,
                    Mat4::IDENTITY,
                    Some(state.lighting.water_uniform()),
                ),
                PassKind::Models => {
                    let lights = state.lighting.model_uniform();
                    for instance in &scene.instances {
                        if instance.model >= scene.models.len() {
                            continue;
                        }
                        frame.transition(PipelineState {
                            cull: Some(instance.cull),
                            ..pass.state
                        });
                        draw(
                            &mut frame,
                            MeshId::Model(instance.model),
                            instance.model_matrix(),
                            Some(lights),
                        );
                    }
                }
                PassKind::Skybox => draw(&mut frame, MeshId::Skybox, Mat4::IDENTITY, None),
            }

            if let Some(restore) = pass.restore {
                frame.transition(restore);
            }
        }

        if state.overlay_enabled {
            frame
                .commands
                .push(Command::Overlay(OverlayInfo::from_state(state)));
        }

        debug!(
            "planned frame: {} commands, {} draws",
            frame.commands.len(),
            frame.draws().count()
        );
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::recording::{Recorded, RecordingBackend};
    use crate::scene::{AxisAngle, ModelInstance};
    use tempfile::tempdir;

    fn scene() -> Scene {
        let dir = tempdir().unwrap();
        Scene::load(dir.path())
    }

    fn position_of(commands: &[Command], predicate: impl Fn(&Command) -> bool) -> usize {
        commands
            .iter()
            .position(predicate)
            .expect("command not found")
    }

    fn first_draw_of(frame: &Frame, pass: PassKind) -> usize {
        position_of(&frame.commands, |c| matches!(c, Command::Draw(d) if d.pass == pass))
    }

    #[test]
    fn passes_run_in_fixed_order() {
        let frame = RenderPipeline::new().plan(&ProgramState::default(), &scene(), 4.0 / 3.0);
        assert!(matches!(frame.commands[0], Command::Clear(_)));

        let blend = position_of(&frame.commands, |c| {
            matches!(c, Command::SetState(StateChange::EnableBlend(BlendMode::Alpha)))
        });
        let cull = position_of(&frame.commands, |c| {
            matches!(c, Command::SetState(StateChange::EnableCull(_)))
        });
        let sky_func = position_of(&frame.commands, |c| {
            matches!(c, Command::SetState(StateChange::DepthFunc(DepthCompare::LessEqual)))
        });
        let restored = frame
            .commands
            .iter()
            .rposition(|c| matches!(c, Command::SetState(StateChange::DepthFunc(DepthCompare::Less))))
            .unwrap();

        let foliage = first_draw_of(&frame, PassKind::Foliage);
        let water = first_draw_of(&frame, PassKind::Water);
        let models = first_draw_of(&frame, PassKind::Models);
        let skybox = first_draw_of(&frame, PassKind::Skybox);

        assert!(blend < foliage && foliage < water);
        assert!(water < cull && cull < models);
        assert!(models < sky_func && sky_func < skybox);
        assert!(skybox < restored);
        assert_eq!(frame.final_state(), PipelineState::BASELINE);
    }

    #[test]
    fn blending_is_off_for_opaque_water() {
        let frame = RenderPipeline::new().plan(&ProgramState::default(), &scene(), 1.0);
        let mut recorder = RecordingBackend::default();
        frame.replay(&mut recorder);
        let water = recorder
            .entries()
            .iter()
            .find_map(|entry| match entry {
                Recorded::Draw { pass: PassKind::Water, state, .. } => Some(*state),
                _ => None,
            })
            .unwrap();
        assert_eq!(water, PipelineState::BASELINE);
    }

    #[test]
    fn skybox_draws_without_depth_writes_and_translation() {
        let mut state = ProgramState::default();
        state.camera.set_position(Vec3::new(7.0, 3.0, -2.0));
        let frame = RenderPipeline::new().plan(&state, &scene(), 1.0);
        let mut recorder = RecordingBackend::default();
        frame.replay(&mut recorder);

        let (sky_state, sky_view) = recorder
            .entries()
            .iter()
            .find_map(|entry| match entry {
                Recorded::Draw { pass: PassKind::Skybox, state, view, .. } => Some((*state, *view)),
                _ => None,
            })
            .unwrap();
        assert!(!sky_state.depth_write);
        assert_eq!(sky_state.depth_compare, DepthCompare::LessEqual);
        assert_eq!(sky_state.blend, None);
        assert_eq!(sky_view.w_axis, glam::Vec4::W);
        assert_eq!(recorder.state(), PipelineState::BASELINE);
    }

    #[test]
    fn cull_face_follows_instance_groups() {
        let mut scene = scene();
        scene.instances.push(ModelInstance {
            model: 0,
            translation: Vec3::new(0.0, 0.0, -4.0),
            rotations: vec![AxisAngle::new(Vec3::X, 10.0)],
            scale: Vec3::ONE,
            cull: CullFace::Back,
        });
        let frame = RenderPipeline::new().plan(&ProgramState::default(), &scene, 1.0);
        let mut recorder = RecordingBackend::default();
        frame.replay(&mut recorder);

        let culls: Vec<Option<CullFace>> = recorder
            .entries()
            .iter()
            .filter_map(|entry| match entry {
                Recorded::Draw { pass: PassKind::Models, state, .. } => Some(state.cull),
                _ => None,
            })
            .collect();
        assert_eq!(
            culls,
            vec![
                Some(CullFace::Front),
                Some(CullFace::Front),
                Some(CullFace::Front),
                Some(CullFace::Back)
            ]
        );
        // three trees share one cull transition
        let enables = frame
            .commands
            .iter()
            .filter(|c| matches!(c, Command::SetState(StateChange::EnableCull(_))))
            .count();
        assert_eq!(enables, 2);
        let skybox = recorder
            .entries()
            .iter()
            .find_map(|entry| match entry {
                Recorded::Draw { pass: PassKind::Skybox, state, .. } => Some(*state),
                _ => None,
            })
            .unwrap();
        assert_eq!(skybox.cull, None);
    }

    #[test]
    fn instances_of_unknown_models_are_skipped() {
        let mut scene = scene();
        scene.instances[1].model = 7;
        let frame = RenderPipeline::new().plan(&ProgramState::default(), &scene, 1.0);
        let models = frame.draws().filter(|d| d.pass == PassKind::Models).count();
        assert_eq!(models, 2);
    }

    #[test]
    fn overlay_is_drawn_last_only_when_enabled() {
        let mut state = ProgramState::default();
        let frame = RenderPipeline::new().plan(&state, &scene(), 1.0);
        assert!(!frame.commands.iter().any(|c| matches!(c, Command::Overlay(_))));

        state.overlay_enabled = true;
        let frame = RenderPipeline::new().plan(&state, &scene(), 1.0);
        assert!(matches!(frame.commands.last(), Some(Command::Overlay(_))));
    }

    #[test]
    fn lighting_uniforms_follow_programs() {
        let frame = RenderPipeline::new().plan(&ProgramState::default(), &scene(), 1.0);
        for draw in frame.draws() {
            match draw.program {
                Program::Foliage | Program::Skybox => assert!(draw.lights.is_none()),
                Program::Water => {
                    assert_eq!(draw.lights.unwrap().point_attenuation[3], 0.0)
                }
                Program::Model => assert_eq!(draw.lights.unwrap().point_attenuation[3], 1.0),
            }
        }
    }

    #[test]
    fn transitions_are_minimal() {
        let target = PipelineState::BASELINE.with_depth(false, DepthCompare::LessEqual);
        assert_eq!(
            PipelineState::BASELINE.transitions_to(&target),
            vec![
                StateChange::DepthMask(false),
                StateChange::DepthFunc(DepthCompare::LessEqual)
            ]
        );
        assert!(target.transitions_to(&target).is_empty());
    }
}
