//! Free-look viewer for a small lit outdoor scene.
//!
//! The crate is split so that everything except the window and the GPU can
//! run headless: the camera, the lighting model, frame planning and the
//! persisted program state are plain data and functions. A frame is planned
//! as an ordered list of state changes and draws which any
//! [`render::RenderBackend`] can replay; the wgpu backend lives behind the
//! `viewer` feature.

pub mod app;
pub mod camera;
pub mod input;
pub mod lighting;
pub mod mesh;
pub mod obj;
pub mod render;
pub mod scene;
pub mod state;
pub mod texture;

pub use app::{FrameClock, Viewer};
pub use camera::{orientation_from_yaw_pitch, Basis, Camera, CameraMovement};
pub use input::{InputAction, InputState, KeyCode};
pub use lighting::{DirectionalLight, LightUniform, LightingModel, PointLight, SpecularModel};
pub use mesh::{Mesh, VertexLayout};
pub use obj::load_obj_from_str;
pub use render::{Frame, RenderBackend, RenderPipeline};
pub use scene::{ModelInstance, Scene};
pub use state::{LoadOutcome, ProgramState, StateError};
