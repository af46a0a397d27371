use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Vec3};
use log::{debug, info, warn};
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::{Window, WindowId};

use super::pipeline::{
    BlendMode, CullFace, DepthCompare, DrawCall, MeshId, OverlayInfo, PipelineState, Program,
    RenderBackend, StateChange,
};
use super::shaders;
use crate::lighting::LightUniform;
use crate::mesh::{Mesh, VertexLayout};
use crate::scene::Scene;
use crate::texture::{
    load_image_or, CubeFaces, ImageData, MISSING_DIFFUSE, MISSING_SPECULAR,
};

pub const WINDOW_TITLE: &str = "scene-viewer";

/// wgpu backend. Draws are collected while a frame is replayed and encoded
/// into a single render pass by [`Renderer::present`].
pub struct Renderer {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,
    depth: DepthBuffer,
    uniform_layout: wgpu::BindGroupLayout,
    surface_pipeline_layout: wgpu::PipelineLayout,
    sky_pipeline_layout: wgpu::PipelineLayout,
    modules: ProgramModules,
    pipelines: HashMap<(Program, PipelineState), wgpu::RenderPipeline>,
    meshes: HashMap<MeshId, GpuMesh>,
    materials: HashMap<MeshId, Material>,
    state: PipelineState,
    clear_color: Vec3,
    pending: Vec<PendingDraw>,
    overlay_title: Option<String>,
    title: String,
}

impl Renderer {
    /// Initializes the GPU and uploads every mesh and texture of `scene`.
    pub async fn new(window: Arc<Window>, scene: &Scene) -> Result<Self> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(anyhow!("window has zero area"));
        }

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance
            .create_surface(Arc::clone(&window))
            .context("failed to create window surface")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;
        let adapter_info = adapter.get_info();
        info!(
            "using adapter {} ({:?})",
            adapter_info.name, adapter_info.backend
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("renderer-device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .context("failed to create GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or_else(|| anyhow!("surface reports no supported formats"))?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            // frames are paced by vertical sync
            present_mode: wgpu::PresentMode::Fifo,
            desired_maximum_frame_latency: 2,
            alpha_mode,
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let depth = DepthBuffer::create(&device, config.width, config.height);

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("draw-uniform-layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<DrawUniform>() as u64,
                    ),
                },
                count: None,
            }],
        });

        // diffuse map, specular map, sampler
        let surface_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("surface-texture-layout"),
            entries: &[
                texture_entry(0, wgpu::TextureViewDimension::D2),
                texture_entry(1, wgpu::TextureViewDimension::D2),
                sampler_entry(2),
            ],
        });
        let sky_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sky-texture-layout"),
            entries: &[
                texture_entry(0, wgpu::TextureViewDimension::Cube),
                sampler_entry(1),
            ],
        });

        let surface_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("surface-pipeline-layout"),
                bind_group_layouts: &[&uniform_layout, &surface_layout],
                push_constant_ranges: &[],
            });
        let sky_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("sky-pipeline-layout"),
            bind_group_layouts: &[&uniform_layout, &sky_layout],
            push_constant_ranges: &[],
        });

        let modules = ProgramModules::compile(&device);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("scene-sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let mut meshes = HashMap::new();
        let mut materials = HashMap::new();
        let uploader = Uploader {
            device: &device,
            queue: &queue,
            surface_layout: &surface_layout,
            sky_layout: &sky_layout,
            sampler: &sampler,
        };

        meshes.insert(MeshId::Foliage, GpuMesh::upload(&device, &scene.foliage, "foliage"));
        materials.insert(
            MeshId::Foliage,
            uploader.surface_material(
                "foliage",
                &load_image_or(&scene.resolve(&scene.assets.foliage), MISSING_DIFFUSE),
                &ImageData::solid(MISSING_SPECULAR),
            ),
        );

        meshes.insert(MeshId::Water, GpuMesh::upload(&device, &scene.water, "water"));
        materials.insert(
            MeshId::Water,
            uploader.surface_material(
                "water",
                &load_image_or(&scene.resolve(&scene.assets.water_diffuse), MISSING_DIFFUSE),
                &load_image_or(&scene.resolve(&scene.assets.water_specular), MISSING_SPECULAR),
            ),
        );

        for (index, model) in scene.models.iter().enumerate() {
            let id = MeshId::Model(index);
            meshes.insert(id, GpuMesh::upload(&device, &model.mesh, &model.name));
            let specular = match &model.specular {
                Some(path) => load_image_or(&scene.resolve(path), MISSING_SPECULAR),
                None => ImageData::solid(MISSING_SPECULAR),
            };
            materials.insert(
                id,
                uploader.surface_material(
                    &model.name,
                    &load_image_or(&scene.resolve(&model.diffuse), MISSING_DIFFUSE),
                    &specular,
                ),
            );
        }

        meshes.insert(MeshId::Skybox, GpuMesh::upload(&device, &scene.skybox, "skybox"));
        let faces = scene.assets.skybox.clone().map(|path| scene.resolve(&path));
        materials.insert(
            MeshId::Skybox,
            uploader.sky_material(&CubeFaces::load_or(&faces, MISSING_DIFFUSE)),
        );

        info!(
            "uploaded {} meshes and {} materials",
            meshes.len(),
            materials.len()
        );

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            size,
            depth,
            uniform_layout,
            surface_pipeline_layout,
            sky_pipeline_layout,
            modules,
            pipelines: HashMap::new(),
            meshes,
            materials,
            state: PipelineState::BASELINE,
            clear_color: Vec3::ZERO,
            pending: Vec::new(),
            overlay_title: None,
            title: WINDOW_TITLE.to_string(),
        })
    }

    /// Returns the identifier of the window owned by the renderer.
    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    /// Exposes the inner window for event handling.
    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.size.width as f32 / self.size.height.max(1) as f32
    }

    /// Resizes the swap chain to match the new dimensions.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        self.depth = DepthBuffer::create(&self.device, new_size.width, new_size.height);
    }

    /// Reconfigures the surface after it was lost or became outdated.
    pub fn reconfigure(&mut self) {
        self.resize(self.size);
    }

    /// Encodes every draw collected since the last call and presents.
    pub fn present(&mut self) -> Result<(), wgpu::SurfaceError> {
        let draws = std::mem::take(&mut self.pending);
        self.update_title();

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        for draw in &draws {
            self.ensure_pipeline(draw.key);
        }

        let uniform_groups: Vec<wgpu::BindGroup> = draws
            .iter()
            .map(|draw| {
                let buffer = self
                    .device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("draw-uniform"),
                        contents: bytemuck::bytes_of(&draw.uniform),
                        usage: wgpu::BufferUsages::UNIFORM,
                    });
                self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("draw-bind-group"),
                    layout: &self.uniform_layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.as_entire_binding(),
                    }],
                })
            })
            .collect();

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame-encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: f64::from(self.clear_color.x),
                            g: f64::from(self.clear_color.y),
                            b: f64::from(self.clear_color.z),
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for (draw, uniforms) in draws.iter().zip(&uniform_groups) {
                let (Some(pipeline), Some(mesh), Some(material)) = (
                    self.pipelines.get(&draw.key),
                    self.meshes.get(&draw.mesh),
                    self.materials.get(&draw.mesh),
                ) else {
                    warn!("skipping draw of unknown mesh {:?}", draw.mesh);
                    continue;
                };
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, uniforms, &[]);
                pass.set_bind_group(1, &material.bind_group, &[]);
                mesh.draw(&mut pass);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    fn update_title(&mut self) {
        let title = self
            .overlay_title
            .take()
            .unwrap_or_else(|| WINDOW_TITLE.to_string());
        if title != self.title {
            self.window.set_title(&title);
            self.title = title;
        }
    }

    fn ensure_pipeline(&mut self, key: (Program, PipelineState)) {
        if self.pipelines.contains_key(&key) {
            return;
        }
        let (program, state) = key;
        debug!("building pipeline for {program:?} with {state:?}");
        let pipeline = self.build_pipeline(program, state);
        self.pipelines.insert(key, pipeline);
    }

    fn build_pipeline(&self, program: Program, state: PipelineState) -> wgpu::RenderPipeline {
        let module = self.modules.get(program);
        let layout = match program {
            Program::Skybox => &self.sky_pipeline_layout,
            _ => &self.surface_pipeline_layout,
        };
        self.device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&format!("{program:?}-pipeline")),
                layout: Some(layout),
                vertex: wgpu::VertexState {
                    module,
                    entry_point: "vs_main",
                    buffers: &[vertex_buffer_layout(program_vertex_layout(program))],
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: cull_mode(state),
                    polygon_mode: wgpu::PolygonMode::Fill,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DepthBuffer::FORMAT,
                    depth_write_enabled: state.depth_test && state.depth_write,
                    depth_compare: depth_compare(state),
                    stencil: Default::default(),
                    bias: Default::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module,
                    entry_point: "fs_main",
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.config.format,
                        blend: blend_state(state),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                multiview: None,
            })
    }
}

impl RenderBackend for Renderer {
    fn clear(&mut self, color: Vec3) {
        self.clear_color = color;
    }

    fn apply(&mut self, change: StateChange) {
        self.state.apply(change);
    }

    fn draw(&mut self, call: &DrawCall) {
        self.pending.push(PendingDraw {
            key: (call.program, self.state),
            mesh: call.mesh,
            uniform: DrawUniform::from_call(call),
        });
    }

    fn overlay(&mut self, info: &OverlayInfo) {
        self.overlay_title = Some(format!("{WINDOW_TITLE} | {}", info.summary()));
    }
}

struct PendingDraw {
    key: (Program, PipelineState),
    mesh: MeshId,
    uniform: DrawUniform,
}

struct ProgramModules {
    foliage: wgpu::ShaderModule,
    water: wgpu::ShaderModule,
    model: wgpu::ShaderModule,
    skybox: wgpu::ShaderModule,
}

impl ProgramModules {
    fn compile(device: &wgpu::Device) -> Self {
        let compile = |program: Program| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&format!("{program:?}-shader")),
                source: wgpu::ShaderSource::Wgsl(shaders::source(program).into()),
            })
        };
        Self {
            foliage: compile(Program::Foliage),
            water: compile(Program::Water),
            model: compile(Program::Model),
            skybox: compile(Program::Skybox),
        }
    }

    fn get(&self, program: Program) -> &wgpu::ShaderModule {
        match program {
            Program::Foliage => &self.foliage,
            Program::Water => &self.water,
            Program::Model => &self.model,
            Program::Skybox => &self.skybox,
        }
    }
}

fn program_vertex_layout(program: Program) -> VertexLayout {
    match program {
        Program::Foliage => VertexLayout::PositionUv,
        Program::Water | Program::Model => VertexLayout::PositionNormalUv,
        Program::Skybox => VertexLayout::Position,
    }
}

const POSITION_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];
const POSITION_UV_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2];
const POSITION_NORMAL_UV_ATTRIBUTES: [wgpu::VertexAttribute; 3] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

fn vertex_buffer_layout(layout: VertexLayout) -> wgpu::VertexBufferLayout<'static> {
    let attributes: &'static [wgpu::VertexAttribute] = match layout {
        VertexLayout::Position => &POSITION_ATTRIBUTES,
        VertexLayout::PositionUv => &POSITION_UV_ATTRIBUTES,
        VertexLayout::PositionNormalUv => &POSITION_NORMAL_UV_ATTRIBUTES,
    };
    wgpu::VertexBufferLayout {
        array_stride: layout.stride() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes,
    }
}

fn depth_compare(state: PipelineState) -> wgpu::CompareFunction {
    if !state.depth_test {
        return wgpu::CompareFunction::Always;
    }
    match state.depth_compare {
        DepthCompare::Less => wgpu::CompareFunction::Less,
        DepthCompare::LessEqual => wgpu::CompareFunction::LessEqual,
    }
}

fn blend_state(state: PipelineState) -> Option<wgpu::BlendState> {
    state.blend.map(|mode| match mode {
        BlendMode::Alpha => wgpu::BlendState::ALPHA_BLENDING,
    })
}

fn cull_mode(state: PipelineState) -> Option<wgpu::Face> {
    state.cull.map(|face| match face {
        CullFace::Front => wgpu::Face::Front,
        CullFace::Back => wgpu::Face::Back,
    })
}

fn texture_entry(binding: u32, view_dimension: wgpu::TextureViewDimension) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

/// Vertex and optional index buffer of one mesh. Dropping releases both.
struct GpuMesh {
    vertex: wgpu::Buffer,
    index: Option<wgpu::Buffer>,
    element_count: u32,
}

impl GpuMesh {
    fn upload(device: &wgpu::Device, mesh: &Mesh, label: &str) -> Self {
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-vertices")),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = mesh.indices.as_ref().map(|indices| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{label}-indices")),
                contents: bytemuck::cast_slice(indices),
                usage: wgpu::BufferUsages::INDEX,
            })
        });
        Self {
            vertex,
            index,
            element_count: mesh.element_count() as u32,
        }
    }

    fn draw<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>) {
        pass.set_vertex_buffer(0, self.vertex.slice(..));
        match &self.index {
            Some(index) => {
                pass.set_index_buffer(index.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..self.element_count, 0, 0..1);
            }
            None => pass.draw(0..self.element_count, 0..1),
        }
    }
}

/// Texture together with its default view.
struct GpuTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

impl GpuTexture {
    fn from_image(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        image: &ImageData,
        label: &str,
    ) -> Self {
        let size = wgpu::Extent3d {
            width: image.width,
            height: image.height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: COLOR_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        write_layer(queue, &texture, image, 0);
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }

    fn from_cube(device: &wgpu::Device, queue: &wgpu::Queue, cube: &CubeFaces, label: &str) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: cube.size,
                height: cube.size,
                depth_or_array_layers: 6,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: COLOR_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        for (layer, face) in cube.faces.iter().enumerate() {
            write_layer(queue, &texture, face, layer as u32);
        }
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });
        Self {
            _texture: texture,
            view,
        }
    }
}

fn write_layer(queue: &wgpu::Queue, texture: &wgpu::Texture, image: &ImageData, layer: u32) {
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d {
                x: 0,
                y: 0,
                z: layer,
            },
            aspect: wgpu::TextureAspect::All,
        },
        &image.pixels,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * image.width),
            rows_per_image: Some(image.height),
        },
        wgpu::Extent3d {
            width: image.width,
            height: image.height,
            depth_or_array_layers: 1,
        },
    );
}

/// Textures sampled by one mesh and the bind group exposing them.
struct Material {
    _textures: Vec<GpuTexture>,
    bind_group: wgpu::BindGroup,
}

struct Uploader<'a> {
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
    surface_layout: &'a wgpu::BindGroupLayout,
    sky_layout: &'a wgpu::BindGroupLayout,
    sampler: &'a wgpu::Sampler,
}

impl Uploader<'_> {
    fn surface_material(&self, label: &str, diffuse: &ImageData, specular: &ImageData) -> Material {
        let diffuse = GpuTexture::from_image(self.device, self.queue, diffuse, &format!("{label}-diffuse"));
        let specular =
            GpuTexture::from_image(self.device, self.queue, specular, &format!("{label}-specular"));
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{label}-material")),
            layout: self.surface_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&diffuse.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&specular.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(self.sampler),
                },
            ],
        });
        Material {
            _textures: vec![diffuse, specular],
            bind_group,
        }
    }

    fn sky_material(&self, cube: &CubeFaces) -> Material {
        let texture = GpuTexture::from_cube(self.device, self.queue, cube, "skybox-cube");
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("skybox-material"),
            layout: self.sky_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(self.sampler),
                },
            ],
        });
        Material {
            _textures: vec![texture],
            bind_group,
        }
    }
}

struct DepthBuffer {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthBuffer {
    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

    fn create(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth-texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

/// Per-draw uniform block, mirrored by `DrawUniform` in the WGSL sources.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct DrawUniform {
    model: [[f32; 4]; 4],
    view: [[f32; 4]; 4],
    projection: [[f32; 4]; 4],
    normal: [[f32; 4]; 3],
    view_position: [f32; 4],
    lights: LightUniform,
}

impl DrawUniform {
    fn from_call(call: &DrawCall) -> Self {
        let normal = Mat3::from_mat4(call.model).inverse().transpose();
        Self {
            model: call.model.to_cols_array_2d(),
            view: call.view.to_cols_array_2d(),
            projection: call.projection.to_cols_array_2d(),
            normal: mat3_to_3x4(normal),
            view_position: call.view_position.extend(1.0).into(),
            lights: call.lights.unwrap_or_else(LightUniform::zeroed),
        }
    }
}

fn mat3_to_3x4(matrix: Mat3) -> [[f32; 4]; 3] {
    let cols = matrix.to_cols_array();
    [
        [cols[0], cols[1], cols[2], 0.0],
        [cols[3], cols[4], cols[5], 0.0],
        [cols[6], cols[7], cols[8], 0.0],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Mat4;

    use crate::render::pipeline::{PassKind, PASS_ORDER};

    #[test]
    fn skybox_state_maps_to_less_equal_without_writes() {
        let sky = PASS_ORDER[3].state;
        assert_eq!(depth_compare(sky), wgpu::CompareFunction::LessEqual);
        assert!(!(sky.depth_test && sky.depth_write));
        assert_eq!(depth_compare(PipelineState::BASELINE), wgpu::CompareFunction::Less);
    }

    #[test]
    fn disabled_depth_test_always_passes() {
        let state = PipelineState {
            depth_test: false,
            ..PipelineState::BASELINE
        };
        assert_eq!(depth_compare(state), wgpu::CompareFunction::Always);
    }

    #[test]
    fn blend_and_cull_follow_state() {
        assert_eq!(blend_state(PASS_ORDER[0].state), Some(wgpu::BlendState::ALPHA_BLENDING));
        assert_eq!(blend_state(PipelineState::BASELINE), None);
        assert_eq!(
            cull_mode(PipelineState::BASELINE.with_cull(CullFace::Front)),
            Some(wgpu::Face::Front)
        );
    }

    #[test]
    fn vertex_layouts_match_mesh_strides() {
        for (program, stride) in [
            (Program::Foliage, 20),
            (Program::Water, 32),
            (Program::Model, 32),
            (Program::Skybox, 12),
        ] {
            let layout = vertex_buffer_layout(program_vertex_layout(program));
            assert_eq!(layout.array_stride, stride);
            let last = layout.attributes.last().unwrap();
            assert!(last.offset + last.format.size() <= layout.array_stride);
        }
    }

    #[test]
    fn draw_uniform_matches_wgsl_layout() {
        assert_eq!(std::mem::size_of::<DrawUniform>(), 64 * 3 + 48 + 16 + 160);
        let call = DrawCall {
            pass: PassKind::Models,
            program: Program::Model,
            mesh: MeshId::Model(0),
            model: Mat4::from_scale(Vec3::splat(2.0)),
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            view_position: Vec3::new(1.0, 2.0, 3.0),
            lights: None,
        };
        let uniform = DrawUniform::from_call(&call);
        assert_eq!(uniform.normal[0], [0.5, 0.0, 0.0, 0.0]);
        assert_eq!(uniform.view_position, [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(uniform.lights.material, [0.0; 4]);
    }
}
