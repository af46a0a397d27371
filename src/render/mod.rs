pub mod pipeline;
pub mod recording;
pub mod shaders;

#[cfg(feature = "viewer")]
pub mod native;

#[cfg(feature = "viewer")]
pub use native::Renderer;
pub use pipeline::{
    Command, DrawCall, Frame, OverlayInfo, PassDescriptor, PassKind, PipelineState, Program,
    RenderBackend, RenderPipeline, StateChange, PASS_ORDER,
};
pub use recording::{Recorded, RecordingBackend};
