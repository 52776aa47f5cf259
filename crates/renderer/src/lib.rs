//! Renderer: wgpu init, MSAA + depth targets, baked unlit scene pass.
//! wgpu = 23.x, winit = 0.30.x

pub mod mesh;
pub mod texture;

use std::num::NonZeroU64;
use std::sync::Arc;

use anyhow::{Context, Result};
use asset::TextureData;
use bytemuck::{Pod, Zeroable};
use corelib::camera::Camera;
use corelib::scene::Scene;
use glam::Mat4;
use wgpu::{
    Backends, BindGroup, BindGroupLayout, BindGroupLayoutDescriptor, BindGroupLayoutEntry,
    BindingType, BlendState, Buffer, BufferBindingType, BufferUsages, ColorTargetState, ColorWrites,
    CommandBuffer, CommandEncoder, CommandEncoderDescriptor, DepthBiasState, DepthStencilState,
    Device, DeviceDescriptor, Extent3d, Features, FragmentState, Instance, InstanceDescriptor,
    LoadOp, Operations, PipelineLayoutDescriptor, PowerPreference, PresentMode, Queue,
    RenderPassColorAttachment, RenderPassDescriptor, RenderPipeline, RenderPipelineDescriptor,
    Sampler, ShaderModuleDescriptor, ShaderSource, ShaderStages, StoreOp, Surface,
    SurfaceConfiguration, SurfaceError, TextureDescriptor, TextureDimension, TextureFormat,
    TextureSampleType, TextureUsages, TextureView, TextureViewDescriptor, TextureViewDimension,
    VertexState, util::DeviceExt,
};
use winit::{dpi::PhysicalSize, window::Window};

use crate::mesh::{GpuMesh, Vertex};

/// Camera UBO (16-byte aligned).
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct CameraUniform {
    view_proj: [[f32; 4]; 4],
}

/// Per-node model matrix, addressed with a dynamic offset.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct ModelUniform {
    model: [[f32; 4]; 4],
}

const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;
const MSAA_SAMPLES: u32 = 4;
const INITIAL_MODEL_SLOTS: usize = 64;

/// Round `size` up to the next multiple of `align` (a power of two).
#[inline]
pub fn align_to(size: u64, align: u64) -> u64 {
    (size + align - 1) & !(align - 1)
}

/// Everything the overlay needs to draw on top of the scene this frame.
pub struct OverlayTarget<'a> {
    pub device: &'a Device,
    pub queue: &'a Queue,
    pub encoder: &'a mut CommandEncoder,
    /// Resolved, single-sampled surface view.
    pub view: &'a TextureView,
    pub size_in_pixels: [u32; 2],
}

pub struct GpuState {
    // Surface
    surface: Surface<'static>,
    surface_format: TextureFormat,
    surface_config: SurfaceConfiguration,

    // Device/queue
    device: Device,
    queue: Queue,

    // Pipelines
    pipeline: RenderPipeline,
    mirrored_pipeline: RenderPipeline,
    sample_count: u32,

    // Camera
    camera_bg: BindGroup,
    camera_buf: Buffer,

    // Material
    texture_bgl: BindGroupLayout,
    texture_bg: BindGroup,
    sampler: Sampler,

    // Per-node model matrices
    model_bgl: BindGroupLayout,
    model_bg: BindGroup,
    model_buf: Buffer,
    model_stride: u64,
    model_slots: usize,
    model_staging: Vec<u8>,

    // Scene geometry
    meshes: Vec<GpuMesh>,
    uploaded_revision: Option<u64>,

    // Targets
    depth_view: TextureView,
    msaa_view: Option<TextureView>,

    // Size cache
    width: u32,
    height: u32,
}

impl GpuState {
    /// Create GPU state bound to an Arc<Window>.
    pub async fn new(window: Arc<Window>, backends: Backends) -> Result<Self> {
        let PhysicalSize { width, height } = window.inner_size();
        let width = width.max(1);
        let height = height.max(1);

        // Instance & surface
        let instance = Instance::new(InstanceDescriptor {
            backends,
            ..Default::default()
        });
        let surface: Surface<'static> = instance
            .create_surface(window.clone())
            .context("create_surface failed")?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("No suitable GPU adapter")?;
        log::info!("Adapter: {:?}", adapter.get_info());

        let (device, queue) = adapter
            .request_device(
                &DeviceDescriptor {
                    label: Some("Roomview Device"),
                    required_features: Features::empty(),
                    required_limits: adapter.limits(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .context("request_device failed")?;

        // Surface format (prefer sRGB)
        let caps = surface.get_capabilities(&adapter);
        let surface_format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .context("Surface reports no formats")?;

        let msaa_ok = |format: TextureFormat| {
            adapter
                .get_texture_format_features(format)
                .flags
                .sample_count_supported(MSAA_SAMPLES)
        };
        let sample_count = if msaa_ok(surface_format) && msaa_ok(DEPTH_FORMAT) {
            MSAA_SAMPLES
        } else {
            log::warn!("{MSAA_SAMPLES}x MSAA unsupported for {surface_format:?}; antialiasing off");
            1
        };

        // Configure surface
        let surface_config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: PresentMode::AutoVsync,
            alpha_mode: caps.alpha_modes.first().copied().unwrap_or_default(),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let depth_view = create_depth_view(&device, &surface_config, sample_count);
        let msaa_view = create_msaa_view(&device, &surface_config, sample_count);

        // ==== Shaders ====
        let shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("Baked WGSL"),
            source: ShaderSource::Wgsl(include_str!("shaders/baked.wgsl").into()),
        });

        // ==== Camera BGL/BG ====
        let camera_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Camera BGL"),
            entries: &[uniform_entry::<CameraUniform>(false)],
        });
        let camera_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera UBO"),
            contents: bytemuck::bytes_of(&CameraUniform {
                view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            }),
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        });
        let camera_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Camera BG"),
            layout: &camera_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buf.as_entire_binding(),
            }],
        });

        // ==== Material BGL/BG (placeholder until the baked texture arrives) ====
        let texture_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Baked BGL"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: true },
                        view_dimension: TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let sampler = texture::create_sampler(&device);
        let texture_bg = texture::upload(
            &device,
            &queue,
            &texture_bgl,
            &sampler,
            &TextureData::solid([255, 255, 255, 255]),
        );

        // ==== Model BGL/BG (dynamic offsets) ====
        let model_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Model BGL"),
            entries: &[uniform_entry::<ModelUniform>(true)],
        });
        let model_stride = align_to(
            std::mem::size_of::<ModelUniform>() as u64,
            device.limits().min_uniform_buffer_offset_alignment as u64,
        );
        let (model_buf, model_bg) =
            create_model_buffer(&device, &model_bgl, model_stride, INITIAL_MODEL_SLOTS);

        // ==== Pipeline ====
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("Baked PipelineLayout"),
            bind_group_layouts: &[&camera_bgl, &texture_bgl, &model_bgl],
            push_constant_ranges: &[],
        });
        let pipeline = create_scene_pipeline(
            &device,
            &pipeline_layout,
            &shader,
            surface_format,
            sample_count,
            wgpu::FrontFace::Ccw,
        );
        // Nodes with a negative world determinant wind clockwise.
        let mirrored_pipeline = create_scene_pipeline(
            &device,
            &pipeline_layout,
            &shader,
            surface_format,
            sample_count,
            wgpu::FrontFace::Cw,
        );

        log::info!(
            "GPU ready: {}x{}, format={:?}, msaa={}",
            width,
            height,
            surface_format,
            sample_count
        );

        Ok(Self {
            surface,
            surface_format,
            surface_config,
            device,
            queue,
            pipeline,
            mirrored_pipeline,
            sample_count,
            camera_bg,
            camera_buf,
            texture_bgl,
            texture_bg,
            sampler,
            model_bgl,
            model_bg,
            model_buf,
            model_stride,
            model_slots: INITIAL_MODEL_SLOTS,
            model_staging: Vec::new(),
            meshes: Vec::new(),
            uploaded_revision: None,
            depth_view,
            msaa_view,
            width,
            height,
        })
    }

    #[inline]
    pub fn device(&self) -> &Device {
        &self.device
    }

    #[inline]
    pub fn surface_format(&self) -> TextureFormat {
        self.surface_format
    }

    /// Resize: reconfigure surface & recreate depth/MSAA views.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.surface_config.width = self.width;
        self.surface_config.height = self.height;
        self.surface.configure(&self.device, &self.surface_config);
        self.depth_view = create_depth_view(&self.device, &self.surface_config, self.sample_count);
        self.msaa_view = create_msaa_view(&self.device, &self.surface_config, self.sample_count);
    }

    /// Replace the material texture used by every mesh.
    pub fn set_texture(&mut self, data: &TextureData) {
        self.texture_bg = texture::upload(
            &self.device,
            &self.queue,
            &self.texture_bgl,
            &self.sampler,
            data,
        );
        log::info!("Baked texture uploaded ({}x{})", data.width, data.height);
    }

    /// Upload meshes added to `scene` since the last call.
    pub fn sync_scene(&mut self, scene: &Scene) {
        if self.uploaded_revision == Some(scene.revision()) {
            return;
        }
        for (i, mesh) in scene.meshes().iter().enumerate().skip(self.meshes.len()) {
            self.meshes
                .push(GpuMesh::upload(&self.device, &format!("Mesh {i}"), mesh));
        }
        self.uploaded_revision = Some(scene.revision());
        log::info!("Scene synced: {} meshes on GPU", self.meshes.len());
    }

    fn ensure_model_slots(&mut self, needed: usize) {
        if needed <= self.model_slots {
            return;
        }
        let slots = needed.next_power_of_two();
        let (buf, bg) = create_model_buffer(&self.device, &self.model_bgl, self.model_stride, slots);
        self.model_buf = buf;
        self.model_bg = bg;
        self.model_slots = slots;
    }

    /// Render one frame: scene pass, then `overlay` on the resolved view.
    /// Command buffers returned by `overlay` are submitted before the frame's.
    pub fn render<F>(&mut self, scene: &Scene, camera: &Camera, overlay: F) -> Result<(), SurfaceError>
    where
        F: FnOnce(OverlayTarget<'_>) -> Vec<CommandBuffer>,
    {
        // --- camera
        let cam = CameraUniform {
            view_proj: camera.proj_view().to_cols_array_2d(),
        };
        self.queue
            .write_buffer(&self.camera_buf, 0, bytemuck::bytes_of(&cam));

        // --- per-node model matrices
        let draws: Vec<_> = scene
            .mesh_nodes()
            .into_iter()
            .filter(|(_, mesh, _)| *mesh < self.meshes.len())
            .collect();
        self.ensure_model_slots(draws.len());
        let stride = self.model_stride as usize;
        self.model_staging.clear();
        self.model_staging.resize(draws.len() * stride, 0);
        for (i, (_, _, world)) in draws.iter().enumerate() {
            let m = ModelUniform {
                model: world.to_cols_array_2d(),
            };
            let at = i * stride;
            self.model_staging[at..at + std::mem::size_of::<ModelUniform>()]
                .copy_from_slice(bytemuck::bytes_of(&m));
        }
        if !self.model_staging.is_empty() {
            self.queue
                .write_buffer(&self.model_buf, 0, &self.model_staging);
        }

        // --- frame & pass
        let frame = self.surface.get_current_texture()?;
        let view = frame.texture.create_view(&Default::default());

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("MainEncoder"),
            });

        {
            let (target, resolve_target) = match &self.msaa_view {
                Some(msaa) => (msaa, Some(&view)),
                None => (&view, None),
            };
            let mut rpass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("ScenePass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: target,
                    resolve_target,
                    ops: Operations {
                        load: LoadOp::Clear(wgpu::Color::BLACK),
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(Operations {
                        load: LoadOp::Clear(1.0),
                        store: StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            rpass.set_bind_group(0, &self.camera_bg, &[]);
            rpass.set_bind_group(1, &self.texture_bg, &[]);
            let mut bound_mirrored = None;
            for (i, (_, mesh, world)) in draws.iter().enumerate() {
                let mirrored = is_mirrored(world);
                if bound_mirrored != Some(mirrored) {
                    rpass.set_pipeline(if mirrored {
                        &self.mirrored_pipeline
                    } else {
                        &self.pipeline
                    });
                    bound_mirrored = Some(mirrored);
                }
                let gpu = &self.meshes[*mesh];
                let offset = (i as u64 * self.model_stride) as u32;
                rpass.set_bind_group(2, &self.model_bg, &[offset]);
                rpass.set_vertex_buffer(0, gpu.vertex_buf.slice(..));
                rpass.set_index_buffer(gpu.index_buf.slice(..), wgpu::IndexFormat::Uint32);
                rpass.draw_indexed(0..gpu.index_count, 0, 0..1);
            }
        }

        let extra = overlay(OverlayTarget {
            device: &self.device,
            queue: &self.queue,
            encoder: &mut encoder,
            view: &view,
            size_in_pixels: [self.width, self.height],
        });

        self.queue
            .submit(extra.into_iter().chain(std::iter::once(encoder.finish())));
        frame.present();
        Ok(())
    }

    pub fn is_surface_lost(err: &SurfaceError) -> bool {
        matches!(err, SurfaceError::Lost | SurfaceError::Outdated)
    }

    pub fn recreate_surface(&mut self) {
        self.resize(self.width, self.height);
    }
}

/// Negative scale on an odd number of axes flips the winding.
#[inline]
fn is_mirrored(world: &Mat4) -> bool {
    world.determinant() < 0.0
}

fn create_scene_pipeline(
    device: &Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: TextureFormat,
    sample_count: u32,
    front_face: wgpu::FrontFace,
) -> RenderPipeline {
    let label = match front_face {
        wgpu::FrontFace::Ccw => "Baked Pipeline",
        wgpu::FrontFace::Cw => "Baked Pipeline (mirrored)",
    };
    device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[Vertex::LAYOUT],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(ColorTargetState {
                format,
                blend: Some(BlendState::REPLACE),
                write_mask: ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            front_face,
            cull_mode: Some(wgpu::Face::Back),
            ..Default::default()
        },
        depth_stencil: Some(DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: sample_count,
            ..Default::default()
        },
        multiview: None,
        cache: None,
    })
}

fn uniform_entry<T>(dynamic: bool) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding: 0,
        visibility: ShaderStages::VERTEX,
        ty: BindingType::Buffer {
            ty: BufferBindingType::Uniform,
            has_dynamic_offset: dynamic,
            min_binding_size: NonZeroU64::new(std::mem::size_of::<T>() as u64),
        },
        count: None,
    }
}

fn create_model_buffer(
    device: &Device,
    layout: &BindGroupLayout,
    stride: u64,
    slots: usize,
) -> (Buffer, BindGroup) {
    let buf = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Model UBO"),
        size: stride * slots as u64,
        usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Model BG"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &buf,
                offset: 0,
                size: NonZeroU64::new(std::mem::size_of::<ModelUniform>() as u64),
            }),
        }],
    });
    (buf, bg)
}

/// Create a depth texture view matching the surface config.
fn create_depth_view(device: &Device, sc: &SurfaceConfiguration, sample_count: u32) -> TextureView {
    let tex = device.create_texture(&TextureDescriptor {
        label: Some("DepthTex"),
        size: Extent3d {
            width: sc.width.max(1),
            height: sc.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count,
        dimension: TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    tex.create_view(&TextureViewDescriptor::default())
}

/// Multisampled colour target, or `None` when MSAA is off.
fn create_msaa_view(
    device: &Device,
    sc: &SurfaceConfiguration,
    sample_count: u32,
) -> Option<TextureView> {
    if sample_count <= 1 {
        return None;
    }
    let tex = device.create_texture(&TextureDescriptor {
        label: Some("MsaaColorTex"),
        size: Extent3d {
            width: sc.width.max(1),
            height: sc.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count,
        dimension: TextureDimension::D2,
        format: sc.format,
        usage: TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    Some(tex.create_view(&TextureViewDescriptor::default()))
}
