use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use log::info;

use scene_viewer::app::print_final_state;
use scene_viewer::render::RecordingBackend;
use scene_viewer::Viewer;

const USAGE: &str = "Usage: scene-viewer [--state <file>] [--resources <dir>] [--size <W>x<H>] [--headless] [--frames <N>]";

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse(env::args().skip(1))?;
    let mut viewer = Viewer::new(&options.state, &options.resources);

    println!(
        "Loaded scene with {} model(s) and {} instance(s)",
        viewer.scene.models.len(),
        viewer.scene.instances.len()
    );

    if options.headless {
        run_headless(&mut viewer, &options)
    } else {
        run_interactive(&mut viewer, &options)
    }
}

fn run_headless(viewer: &mut Viewer, options: &CliOptions) -> Result<()> {
    let aspect = options.aspect_ratio();
    let mut backend = RecordingBackend::new();
    for _ in 0..options.frames {
        backend.clear_log();
        viewer.update();
        viewer.plan_frame(aspect).replay(&mut backend);
    }
    info!("rendered {} headless frame(s)", options.frames);

    let order: Vec<&str> = backend.pass_order().iter().map(|pass| pass.name()).collect();
    println!("Pass order: {}", order.join(" -> "));
    for line in backend.trace() {
        println!("  {line}");
    }

    print_final_state(&viewer.state);
    viewer
        .save_state()
        .context("failed to save program state")?;
    println!("Saved state to {}", viewer.state_path().display());
    Ok(())
}

#[cfg(feature = "viewer")]
fn run_interactive(viewer: &mut Viewer, options: &CliOptions) -> Result<()> {
    interactive::run(viewer, options.size)
}

#[cfg(not(feature = "viewer"))]
fn run_interactive(_viewer: &mut Viewer, _options: &CliOptions) -> Result<()> {
    Err(anyhow!(
        "built without the `viewer` feature; rerun with --headless"
    ))
}

#[cfg(feature = "viewer")]
mod interactive {
    use std::sync::Arc;

    use anyhow::{anyhow, Context, Result};
    use log::{error, warn};
    use pollster::block_on;
    use winit::dpi::LogicalSize;
    use winit::event::{DeviceEvent, ElementState, Event, KeyEvent, MouseScrollDelta, WindowEvent};
    use winit::event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget};
    use winit::keyboard::{KeyCode as WinitKey, PhysicalKey};
    use winit::platform::run_on_demand::EventLoopExtRunOnDemand;
    use winit::window::{CursorGrabMode, WindowBuilder};

    use scene_viewer::app::print_final_state;
    use scene_viewer::render::native::WINDOW_TITLE;
    use scene_viewer::render::Renderer;
    use scene_viewer::{InputAction, KeyCode, Viewer};

    pub fn run(viewer: &mut Viewer, size: (u32, u32)) -> Result<()> {
        let mut event_loop = EventLoop::new().context("failed to create event loop")?;
        let window = Arc::new(
            WindowBuilder::new()
                .with_title(WINDOW_TITLE)
                .with_inner_size(LogicalSize::new(f64::from(size.0), f64::from(size.1)))
                .build(&event_loop)
                .context("failed to create window")?,
        );
        let renderer = block_on(Renderer::new(Arc::clone(&window), &viewer.scene))?;

        let mut app = AppState {
            renderer,
            viewer,
            focused: true,
            last_error: None,
        };
        app.set_cursor_captured(app.viewer.state.camera_mouse_update_enabled);

        let loop_result = event_loop.run_on_demand(|event, elwt| {
            elwt.set_control_flow(ControlFlow::Poll);
            if let Err(err) = app.process_event(event, elwt) {
                app.last_error = Some(err);
                elwt.exit();
            }
        });

        // the current frame has finished; persist before reporting anything
        print_final_state(&app.viewer.state);
        let saved = app.viewer.save_state();

        loop_result.context("event loop failed")?;
        if let Some(err) = app.last_error {
            return Err(err);
        }
        saved.context("failed to save program state")?;
        Ok(())
    }

    struct AppState<'a> {
        renderer: Renderer,
        viewer: &'a mut Viewer,
        focused: bool,
        last_error: Option<anyhow::Error>,
    }

    impl AppState<'_> {
        fn process_event(
            &mut self,
            event: Event<()>,
            elwt: &EventLoopWindowTarget<()>,
        ) -> Result<()> {
            match event {
                Event::WindowEvent { window_id, event } if window_id == self.renderer.window_id() => {
                    match event {
                        WindowEvent::CloseRequested => elwt.exit(),
                        WindowEvent::Resized(size) => self.renderer.resize(size),
                        WindowEvent::Focused(focused) => {
                            self.focused = focused;
                            if !focused {
                                self.viewer.input.release_all();
                            }
                        }
                        WindowEvent::KeyboardInput { event, .. } => self.handle_key(event, elwt),
                        WindowEvent::MouseWheel { delta, .. } => {
                            let viewer = &mut *self.viewer;
                            match delta {
                                MouseScrollDelta::LineDelta(_, y) => {
                                    viewer.input.scroll_lines(y, &mut viewer.state)
                                }
                                MouseScrollDelta::PixelDelta(position) => {
                                    viewer.input.scroll_pixels(position.y, &mut viewer.state)
                                }
                            }
                        }
                        WindowEvent::RedrawRequested => self.redraw()?,
                        _ => {}
                    }
                }
                Event::DeviceEvent {
                    event: DeviceEvent::MouseMotion { delta: (dx, dy) },
                    ..
                } if self.focused => {
                    let viewer = &mut *self.viewer;
                    viewer.input.mouse_motion(dx, dy, &mut viewer.state);
                }
                Event::AboutToWait => {
                    self.renderer.window().request_redraw();
                }
                _ => {}
            }
            Ok(())
        }

        fn handle_key(&mut self, event: KeyEvent, elwt: &EventLoopWindowTarget<()>) {
            let PhysicalKey::Code(code) = event.physical_key else {
                return;
            };
            let Some(key) = map_keycode(code) else {
                return;
            };
            let viewer = &mut *self.viewer;
            match event.state {
                ElementState::Pressed => {
                    match viewer.input.key_pressed(key, event.repeat, &mut viewer.state) {
                        InputAction::None => {}
                        InputAction::Exit => elwt.exit(),
                        InputAction::CaptureCursor => self.set_cursor_captured(true),
                        InputAction::ReleaseCursor => self.set_cursor_captured(false),
                    }
                }
                ElementState::Released => viewer.input.key_released(key),
            }
        }

        fn redraw(&mut self) -> Result<()> {
            self.viewer.update();
            let frame = self.viewer.plan_frame(self.renderer.aspect_ratio());
            frame.replay(&mut self.renderer);
            match self.renderer.present() {
                Ok(()) => {}
                Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                    self.renderer.reconfigure();
                }
                Err(wgpu::SurfaceError::Timeout) => {
                    warn!("surface timeout; skipping frame");
                }
                Err(wgpu::SurfaceError::OutOfMemory) => {
                    return Err(anyhow!("GPU is out of memory"));
                }
            }
            Ok(())
        }

        fn set_cursor_captured(&self, captured: bool) {
            let window = self.renderer.window();
            let grab = if captured {
                window
                    .set_cursor_grab(CursorGrabMode::Confined)
                    .or_else(|_| window.set_cursor_grab(CursorGrabMode::Locked))
            } else {
                window.set_cursor_grab(CursorGrabMode::None)
            };
            if let Err(err) = grab {
                error!("unable to change cursor grab: {err}");
            }
            window.set_cursor_visible(!captured);
        }
    }

    fn map_keycode(code: WinitKey) -> Option<KeyCode> {
        Some(match code {
            WinitKey::KeyW => KeyCode::W,
            WinitKey::KeyA => KeyCode::A,
            WinitKey::KeyS => KeyCode::S,
            WinitKey::KeyD => KeyCode::D,
            WinitKey::F1 => KeyCode::F1,
            WinitKey::F2 => KeyCode::F2,
            WinitKey::Escape => KeyCode::Escape,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct CliOptions {
    state: PathBuf,
    resources: PathBuf,
    size: (u32, u32),
    headless: bool,
    frames: u32,
}

impl Default for CliOptions {
    fn default() -> Self {
        Self {
            state: PathBuf::from("resources/program_state.txt"),
            resources: PathBuf::from("resources"),
            size: (800, 600),
            headless: false,
            frames: 1,
        }
    }
}

impl CliOptions {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut options = Self::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let mut value = |name: &str| {
                args.next()
                    .ok_or_else(|| anyhow!("{name} expects a value\n{USAGE}"))
            };
            match arg.as_str() {
                "--state" => options.state = PathBuf::from(value("--state")?),
                "--resources" => options.resources = PathBuf::from(value("--resources")?),
                "--size" => options.size = parse_size(&value("--size")?)?,
                "--frames" => {
                    let frames = value("--frames")?;
                    options.frames = frames
                        .parse::<u32>()
                        .ok()
                        .filter(|frames| *frames > 0)
                        .ok_or_else(|| anyhow!("invalid frame count {frames:?}\n{USAGE}"))?;
                }
                "--headless" => options.headless = true,
                other => return Err(anyhow!("Unknown argument: {other}\n{USAGE}")),
            }
        }
        Ok(options)
    }

    fn aspect_ratio(&self) -> f32 {
        self.size.0 as f32 / self.size.1 as f32
    }
}

fn parse_size(value: &str) -> Result<(u32, u32)> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| anyhow!("size must look like 800x600, got {value:?}"))?;
    let parse = |part: &str| -> Result<u32> {
        part.trim()
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| anyhow!("invalid size component {part:?}"))
    };
    Ok((parse(width)?, parse(height)?))
}
