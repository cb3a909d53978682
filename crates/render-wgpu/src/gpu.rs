use crate::shaders;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, UVec2, Vec3};
use std::sync::Arc;
use voxelfront_common::Transform;
use voxelfront_mesh::{Geometry, MeshCategory, MeshVertex};
use voxelfront_render::{
    FlyCamera, MeshUpload, RenderBackend, RenderError, SceneSettings, WorldFrame,
};
use wgpu::util::DeviceExt;
use winit::window::Window;

const SHADOW_MAP_SIZE: u32 = 2048;
const MAX_ENTITY_INSTANCES: u32 = 4096;

const GBUFFER_ALBEDO_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const GBUFFER_VEC_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct FrameUniforms {
    view_proj: [[f32; 4]; 4],
    light_view_proj: [[f32; 4]; 4],
    // xyz camera position, w fog range
    camera_fog: [f32; 4],
    light_dir: [f32; 4],
    light_diffuse: [f32; 4],
    ambient: [f32; 4],
    fog_color: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct CubeVertex {
    position: [f32; 3],
    normal: [f32; 3],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct EntityInstance {
    model_0: [f32; 4],
    model_1: [f32; 4],
    model_2: [f32; 4],
    model_3: [f32; 4],
    color: [f32; 4],
}

/// Unit cube for entity rendering.
fn cube_mesh() -> (Vec<CubeVertex>, Vec<u16>) {
    let p = 0.5_f32;
    #[rustfmt::skip]
    let vertices = vec![
        // +Z face
        CubeVertex { position: [-p, -p,  p], normal: [0.0, 0.0, 1.0] },
        CubeVertex { position: [ p, -p,  p], normal: [0.0, 0.0, 1.0] },
        CubeVertex { position: [ p,  p,  p], normal: [0.0, 0.0, 1.0] },
        CubeVertex { position: [-p,  p,  p], normal: [0.0, 0.0, 1.0] },
        // -Z face
        CubeVertex { position: [ p, -p, -p], normal: [0.0, 0.0, -1.0] },
        CubeVertex { position: [-p, -p, -p], normal: [0.0, 0.0, -1.0] },
        CubeVertex { position: [-p,  p, -p], normal: [0.0, 0.0, -1.0] },
        CubeVertex { position: [ p,  p, -p], normal: [0.0, 0.0, -1.0] },
        // +X face
        CubeVertex { position: [ p, -p,  p], normal: [1.0, 0.0, 0.0] },
        CubeVertex { position: [ p, -p, -p], normal: [1.0, 0.0, 0.0] },
        CubeVertex { position: [ p,  p, -p], normal: [1.0, 0.0, 0.0] },
        CubeVertex { position: [ p,  p,  p], normal: [1.0, 0.0, 0.0] },
        // -X face
        CubeVertex { position: [-p, -p, -p], normal: [-1.0, 0.0, 0.0] },
        CubeVertex { position: [-p, -p,  p], normal: [-1.0, 0.0, 0.0] },
        CubeVertex { position: [-p,  p,  p], normal: [-1.0, 0.0, 0.0] },
        CubeVertex { position: [-p,  p, -p], normal: [-1.0, 0.0, 0.0] },
        // +Y face
        CubeVertex { position: [-p,  p,  p], normal: [0.0, 1.0, 0.0] },
        CubeVertex { position: [ p,  p,  p], normal: [0.0, 1.0, 0.0] },
        CubeVertex { position: [ p,  p, -p], normal: [0.0, 1.0, 0.0] },
        CubeVertex { position: [-p,  p, -p], normal: [0.0, 1.0, 0.0] },
        // -Y face
        CubeVertex { position: [-p, -p, -p], normal: [0.0, -1.0, 0.0] },
        CubeVertex { position: [ p, -p, -p], normal: [0.0, -1.0, 0.0] },
        CubeVertex { position: [ p, -p,  p], normal: [0.0, -1.0, 0.0] },
        CubeVertex { position: [-p, -p,  p], normal: [0.0, -1.0, 0.0] },
    ];
    #[rustfmt::skip]
    let indices: Vec<u16> = vec![
        0,1,2, 2,3,0,       // +Z
        4,5,6, 6,7,4,       // -Z
        8,9,10, 10,11,8,    // +X
        12,13,14, 14,15,12, // -X
        16,17,18, 18,19,16, // +Y
        20,21,22, 22,23,20, // -Y
    ];
    (vertices, indices)
}

/// Orthographic view-projection along the light direction, centered on the
/// camera. Everything the shadow pass should cover fits in `extent`.
fn light_matrix(camera_pos: Vec3, light_dir: Vec3, extent: f32) -> Mat4 {
    let dir = light_dir.normalize_or(Vec3::NEG_Y);
    // look_at degenerates when the light is straight down.
    let up = if dir.x.abs() < 1e-3 && dir.z.abs() < 1e-3 {
        Vec3::Z
    } else {
        Vec3::Y
    };
    let eye = camera_pos - dir * extent;
    let proj = Mat4::orthographic_rh(-extent, extent, -extent, extent, 0.1, extent * 2.5);
    proj * Mat4::look_at_rh(eye, camera_pos, up)
}

struct MeshBuffers {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
}

/// Chunk geometry uploaded to the GPU. Buffers release via `Drop` on the
/// owning thread when the cache evicts the mesh.
pub struct GpuMesh {
    buffers: Option<MeshBuffers>,
    index_count: u32,
    vertex_count: u32,
}

impl GpuMesh {
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }
}

fn frame_vertex_tally(frame: &WorldFrame<'_, GpuMesh>) -> u32 {
    frame
        .opaque
        .iter()
        .chain(&frame.water)
        .chain(&frame.plant)
        .map(|m| m.vertex_count)
        .sum()
}

struct Targets {
    albedo: wgpu::TextureView,
    position: wgpu::TextureView,
    normal: wgpu::TextureView,
    depth: wgpu::TextureView,
}

struct Pipelines {
    shadow: wgpu::RenderPipeline,
    geometry_opaque: wgpu::RenderPipeline,
    geometry_plant: wgpu::RenderPipeline,
    lighting: wgpu::RenderPipeline,
    water: wgpu::RenderPipeline,
    entity: wgpu::RenderPipeline,
}

struct FrameInFlight {
    surface_texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
}

struct Gpu {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pipelines: Pipelines,
    targets: Targets,
    shadow_map: wgpu::TextureView,
    uniform_buffer: wgpu::Buffer,
    frame_bind_group: wgpu::BindGroup,
    lighting_bind_group_layout: wgpu::BindGroupLayout,
    lighting_bind_group: wgpu::BindGroup,
    shadow_sampler: wgpu::Sampler,
    cube_vertex_buffer: wgpu::Buffer,
    cube_index_buffer: wgpu::Buffer,
    cube_index_count: u32,
    instance_buffer: wgpu::Buffer,
}

/// wgpu implementation of [`RenderBackend`].
///
/// Owns the surface, device, and every pipeline. Created against a window,
/// brought up by `init`; `render_world` leaves the frame in flight so
/// `render_entities` can composite on top before `present`.
pub struct WgpuBackend {
    window: Arc<Window>,
    gpu: Option<Gpu>,
    frame: Option<FrameInFlight>,
    frame_vertices: u32,
}

impl WgpuBackend {
    pub fn new(window: Arc<Window>) -> Self {
        Self {
            window,
            gpu: None,
            frame: None,
            frame_vertices: 0,
        }
    }

    /// Chunk vertices submitted by the most recent `render_world` call.
    pub fn last_frame_vertices(&self) -> u32 {
        self.frame_vertices
    }

    fn acquire_frame(gpu: &Gpu) -> Result<FrameInFlight, RenderError> {
        let surface_texture = match gpu.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                gpu.surface.configure(&gpu.device, &gpu.config);
                gpu.surface
                    .get_current_texture()
                    .map_err(|e| RenderError::Surface(e.to_string()))?
            }
            Err(e) => return Err(RenderError::Surface(e.to_string())),
        };
        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        Ok(FrameInFlight {
            surface_texture,
            view,
        })
    }

    fn draw_meshes<'a>(pass: &mut wgpu::RenderPass<'a>, meshes: &'a [&'a GpuMesh]) {
        for mesh in meshes {
            let Some(buffers) = &mesh.buffers else {
                debug_assert!(false, "mesh drawn without GPU buffers");
                continue;
            };
            pass.set_vertex_buffer(0, buffers.vertex.slice(..));
            pass.set_index_buffer(buffers.index.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
    }
}

impl MeshUpload for WgpuBackend {
    type Resource = GpuMesh;

    fn upload(&mut self, category: MeshCategory, geometry: &Geometry) -> GpuMesh {
        let Some(gpu) = &self.gpu else {
            debug_assert!(false, "upload before init");
            return GpuMesh {
                buffers: None,
                index_count: 0,
                vertex_count: 0,
            };
        };
        let label = match category {
            MeshCategory::Opaque => "chunk_opaque",
            MeshCategory::Water => "chunk_water",
            MeshCategory::Plant => "chunk_plant",
        };
        let vertex = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(&geometry.vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(&geometry.indices),
                usage: wgpu::BufferUsages::INDEX,
            });
        GpuMesh {
            buffers: Some(MeshBuffers { vertex, index }),
            index_count: geometry.indices.len() as u32,
            vertex_count: geometry.vertices.len() as u32,
        }
    }
}

impl RenderBackend for WgpuBackend {
    fn init(&mut self, dimension: UVec2) -> Result<(), RenderError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let surface = instance
            .create_surface(Arc::clone(&self.window))
            .map_err(|e| RenderError::Surface(e.to_string()))?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .ok_or(RenderError::NoAdapter)?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("voxelfront_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))
        .map_err(|e| RenderError::DeviceRequest(e.to_string()))?;

        let width = dimension.x.max(1);
        let height = dimension.y.max(1);
        let config = surface
            .get_default_config(&adapter, width, height)
            .ok_or(RenderError::NoAdapter)?;
        surface.configure(&device, &config);

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("frame_uniforms"),
            contents: bytemuck::bytes_of(&FrameUniforms::zeroed()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let frame_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("frame_bind_group_layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frame_bind_group"),
            layout: &frame_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let lighting_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("lighting_bind_group_layout"),
                entries: &[
                    texture_entry(0),
                    texture_entry(1),
                    texture_entry(2),
                    wgpu::BindGroupLayoutEntry {
                        binding: 3,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Depth,
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 4,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                        count: None,
                    },
                ],
            });

        let shadow_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("shadow_sampler"),
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });

        let shadow_map = create_depth_target(&device, SHADOW_MAP_SIZE, SHADOW_MAP_SIZE, true);
        let targets = create_targets(&device, width, height);
        let lighting_bind_group = create_lighting_bind_group(
            &device,
            &lighting_bind_group_layout,
            &targets,
            &shadow_map,
            &shadow_sampler,
        );

        let pipelines = create_pipelines(
            &device,
            config.format,
            &frame_bind_group_layout,
            &lighting_bind_group_layout,
        );

        let (cube_verts, cube_indices) = cube_mesh();
        let cube_vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("entity_cube_vertices"),
            contents: bytemuck::cast_slice(&cube_verts),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let cube_index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("entity_cube_indices"),
            contents: bytemuck::cast_slice(&cube_indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        let instance_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("entity_instances"),
            size: (MAX_ENTITY_INSTANCES as u64) * std::mem::size_of::<EntityInstance>() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        tracing::info!(width, height, format = ?config.format, "wgpu backend initialized");
        self.gpu = Some(Gpu {
            surface,
            device,
            queue,
            config,
            pipelines,
            targets,
            shadow_map,
            uniform_buffer,
            frame_bind_group,
            lighting_bind_group_layout,
            lighting_bind_group,
            shadow_sampler,
            cube_vertex_buffer,
            cube_index_buffer,
            cube_index_count: cube_indices.len() as u32,
            instance_buffer,
        });
        Ok(())
    }

    fn resize(&mut self, dimension: UVec2) {
        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };
        gpu.config.width = dimension.x.max(1);
        gpu.config.height = dimension.y.max(1);
        gpu.surface.configure(&gpu.device, &gpu.config);
        gpu.targets = create_targets(&gpu.device, gpu.config.width, gpu.config.height);
        gpu.lighting_bind_group = create_lighting_bind_group(
            &gpu.device,
            &gpu.lighting_bind_group_layout,
            &gpu.targets,
            &gpu.shadow_map,
            &gpu.shadow_sampler,
        );
    }

    fn render_world(
        &mut self,
        camera: &FlyCamera,
        settings: &SceneSettings,
        frame: &WorldFrame<'_, GpuMesh>,
    ) -> Result<(), RenderError> {
        let gpu = self.gpu.as_ref().ok_or(RenderError::NotInitialized)?;

        self.frame_vertices = frame_vertex_tally(frame);
        tracing::trace!(
            vertices = self.frame_vertices,
            draws = frame.draw_count(),
            "world pass"
        );

        let shadow_extent = settings.fog_range.max(64.0);
        let uniforms = FrameUniforms {
            view_proj: camera.view_projection().to_cols_array_2d(),
            light_view_proj: light_matrix(camera.position, settings.light_direction, shadow_extent)
                .to_cols_array_2d(),
            camera_fog: [
                camera.position.x,
                camera.position.y,
                camera.position.z,
                settings.fog_range,
            ],
            light_dir: {
                let d = settings.light_direction.normalize_or(Vec3::NEG_Y);
                [d.x, d.y, d.z, 0.0]
            },
            light_diffuse: [
                settings.light_diffuse[0],
                settings.light_diffuse[1],
                settings.light_diffuse[2],
                0.0,
            ],
            ambient: [
                settings.ambient[0],
                settings.ambient[1],
                settings.ambient[2],
                0.0,
            ],
            fog_color: settings.fog_color,
        };
        gpu.queue
            .write_buffer(&gpu.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        if self.frame.is_none() {
            self.frame = Some(Self::acquire_frame(gpu)?);
        }
        let Some(frame_in_flight) = self.frame.as_ref() else {
            return Err(RenderError::Surface("no frame in flight".into()));
        };
        let surface_view = &frame_in_flight.view;

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("world_encoder"),
            });

        // Shadow pass: opaque + plant, depth only, from the light.
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("shadow_pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &gpu.shadow_map,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });
            pass.set_pipeline(&gpu.pipelines.shadow);
            pass.set_bind_group(0, &gpu.frame_bind_group, &[]);
            Self::draw_meshes(&mut pass, &frame.opaque);
            Self::draw_meshes(&mut pass, &frame.plant);
        }

        // Geometry pass: fill the G-buffer.
        {
            let color_attachment = |view| {
                Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })
            };
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("geometry_pass"),
                color_attachments: &[
                    color_attachment(&gpu.targets.albedo),
                    color_attachment(&gpu.targets.position),
                    color_attachment(&gpu.targets.normal),
                ],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &gpu.targets.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });
            pass.set_bind_group(0, &gpu.frame_bind_group, &[]);
            pass.set_pipeline(&gpu.pipelines.geometry_opaque);
            Self::draw_meshes(&mut pass, &frame.opaque);
            pass.set_pipeline(&gpu.pipelines.geometry_plant);
            Self::draw_meshes(&mut pass, &frame.plant);
        }

        // Lighting pass: fullscreen directional light + fog over the G-buffer.
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("lighting_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: surface_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: settings.clear_color[0] as f64,
                            g: settings.clear_color[1] as f64,
                            b: settings.clear_color[2] as f64,
                            a: settings.clear_color[3] as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                ..Default::default()
            });
            pass.set_pipeline(&gpu.pipelines.lighting);
            pass.set_bind_group(0, &gpu.frame_bind_group, &[]);
            pass.set_bind_group(1, &gpu.lighting_bind_group, &[]);
            pass.draw(0..3, 0..1);
        }

        // Water pass: forward, blended, depth-tested against the world.
        if !frame.water.is_empty() {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("water_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: surface_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &gpu.targets.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });
            pass.set_pipeline(&gpu.pipelines.water);
            pass.set_bind_group(0, &gpu.frame_bind_group, &[]);
            Self::draw_meshes(&mut pass, &frame.water);
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn render_entities(
        &mut self,
        camera: &FlyCamera,
        entities: &[Transform],
    ) -> Result<(), RenderError> {
        let gpu = self.gpu.as_ref().ok_or(RenderError::NotInitialized)?;
        if entities.is_empty() {
            return Ok(());
        }

        let instances: Vec<EntityInstance> = entities
            .iter()
            .take(MAX_ENTITY_INSTANCES as usize)
            .map(|t| {
                let cols = t.matrix().to_cols_array_2d();
                EntityInstance {
                    model_0: cols[0],
                    model_1: cols[1],
                    model_2: cols[2],
                    model_3: cols[3],
                    color: [0.85, 0.3, 0.25, 1.0],
                }
            })
            .collect();
        gpu.queue
            .write_buffer(&gpu.instance_buffer, 0, bytemuck::cast_slice(&instances));
        // Refresh the view projection in case entities render without a
        // preceding world pass this frame.
        gpu.queue.write_buffer(
            &gpu.uniform_buffer,
            0,
            bytemuck::cast_slice(&camera.view_projection().to_cols_array_2d()),
        );

        if self.frame.is_none() {
            self.frame = Some(Self::acquire_frame(gpu)?);
        }
        let Some(frame_in_flight) = self.frame.as_ref() else {
            return Err(RenderError::Surface("no frame in flight".into()));
        };
        let surface_view = &frame_in_flight.view;

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("entity_encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("entity_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: surface_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &gpu.targets.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });
            pass.set_pipeline(&gpu.pipelines.entity);
            pass.set_bind_group(0, &gpu.frame_bind_group, &[]);
            pass.set_vertex_buffer(0, gpu.cube_vertex_buffer.slice(..));
            pass.set_vertex_buffer(1, gpu.instance_buffer.slice(..));
            pass.set_index_buffer(gpu.cube_index_buffer.slice(..), wgpu::IndexFormat::Uint16);
            pass.draw_indexed(0..gpu.cube_index_count, 0, 0..instances.len() as u32);
        }
        gpu.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn present(&mut self) {
        if let Some(frame) = self.frame.take() {
            drop(frame.view);
            frame.surface_texture.present();
        }
    }

    fn shutdown(&mut self) {
        debug_assert!(self.gpu.is_some(), "shutdown without init");
        self.frame = None;
        self.gpu = None;
        tracing::info!("wgpu backend shut down");
    }
}

fn create_targets(device: &wgpu::Device, width: u32, height: u32) -> Targets {
    let color = |label, format| create_color_target(device, label, format, width, height);
    Targets {
        albedo: color("gbuffer_albedo", GBUFFER_ALBEDO_FORMAT),
        position: color("gbuffer_position", GBUFFER_VEC_FORMAT),
        normal: color("gbuffer_normal", GBUFFER_VEC_FORMAT),
        depth: create_depth_target(device, width, height, false),
    }
}

fn create_color_target(
    device: &wgpu::Device,
    label: &str,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    texture.create_view(&Default::default())
}

fn create_depth_target(
    device: &wgpu::Device,
    width: u32,
    height: u32,
    sampled: bool,
) -> wgpu::TextureView {
    let mut usage = wgpu::TextureUsages::RENDER_ATTACHMENT;
    if sampled {
        usage |= wgpu::TextureUsages::TEXTURE_BINDING;
    }
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth_target"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage,
        view_formats: &[],
    });
    texture.create_view(&Default::default())
}

fn create_lighting_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    targets: &Targets,
    shadow_map: &wgpu::TextureView,
    shadow_sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("lighting_bind_group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&targets.albedo),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(&targets.position),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(&targets.normal),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::TextureView(shadow_map),
            },
            wgpu::BindGroupEntry {
                binding: 4,
                resource: wgpu::BindingResource::Sampler(shadow_sampler),
            },
        ],
    })
}

fn mesh_vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Float32x4,
    ];
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<MeshVertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &ATTRIBUTES,
    }
}

fn create_pipelines(
    device: &wgpu::Device,
    surface_format: wgpu::TextureFormat,
    frame_layout: &wgpu::BindGroupLayout,
    lighting_layout: &wgpu::BindGroupLayout,
) -> Pipelines {
    let frame_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("frame_pipeline_layout"),
        bind_group_layouts: &[frame_layout],
        push_constant_ranges: &[],
    });
    let lighting_pipeline_layout =
        device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("lighting_pipeline_layout"),
            bind_group_layouts: &[frame_layout, lighting_layout],
            push_constant_ranges: &[],
        });

    let module = |label: &str, source: String| {
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        })
    };
    let geometry_shader = module("geometry_shader", shaders::geometry_shader());
    let shadow_shader = module("shadow_shader", shaders::shadow_shader());
    let lighting_shader = module("lighting_shader", shaders::lighting_shader());
    let water_shader = module("water_shader", shaders::water_shader());
    let entity_shader = module("entity_shader", shaders::entity_shader());

    let depth_state = |write| {
        Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: write,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: Default::default(),
            bias: Default::default(),
        })
    };
    let gbuffer_target = |format| {
        Some(wgpu::ColorTargetState {
            format,
            blend: Some(wgpu::BlendState::REPLACE),
            write_mask: wgpu::ColorWrites::ALL,
        })
    };

    let geometry = |label: &str, cull_mode: Option<wgpu::Face>| {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&frame_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &geometry_shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[mesh_vertex_layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &geometry_shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[
                    gbuffer_target(GBUFFER_ALBEDO_FORMAT),
                    gbuffer_target(GBUFFER_VEC_FORMAT),
                    gbuffer_target(GBUFFER_VEC_FORMAT),
                ],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode,
                ..Default::default()
            },
            depth_stencil: depth_state(true),
            multisample: Default::default(),
            multiview: None,
            cache: None,
        })
    };

    let shadow = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("shadow_pipeline"),
        layout: Some(&frame_pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shadow_shader,
            entry_point: Some("vs_shadow"),
            compilation_options: Default::default(),
            buffers: &[mesh_vertex_layout()],
        },
        fragment: None,
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            // Plants are double-sided; no culling in the shadow pass.
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: depth_state(true),
        multisample: Default::default(),
        multiview: None,
        cache: None,
    });

    let lighting = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("lighting_pipeline"),
        layout: Some(&lighting_pipeline_layout),
        vertex: wgpu::VertexState {
            module: &lighting_shader,
            entry_point: Some("vs_light"),
            compilation_options: Default::default(),
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module: &lighting_shader,
            entry_point: Some("fs_light"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: surface_format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: Default::default(),
        multiview: None,
        cache: None,
    });

    let water = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("water_pipeline"),
        layout: Some(&frame_pipeline_layout),
        vertex: wgpu::VertexState {
            module: &water_shader,
            entry_point: Some("vs_water"),
            compilation_options: Default::default(),
            buffers: &[mesh_vertex_layout()],
        },
        fragment: Some(wgpu::FragmentState {
            module: &water_shader,
            entry_point: Some("fs_water"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: surface_format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: None,
            ..Default::default()
        },
        // Test against world depth, never write it.
        depth_stencil: depth_state(false),
        multisample: Default::default(),
        multiview: None,
        cache: None,
    });

    let entity = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("entity_pipeline"),
        layout: Some(&frame_pipeline_layout),
        vertex: wgpu::VertexState {
            module: &entity_shader,
            entry_point: Some("vs_entity"),
            compilation_options: Default::default(),
            buffers: &[
                wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<CubeVertex>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![
                        0 => Float32x3,
                        1 => Float32x3,
                    ],
                },
                wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<EntityInstance>() as u64,
                    step_mode: wgpu::VertexStepMode::Instance,
                    attributes: &wgpu::vertex_attr_array![
                        2 => Float32x4,
                        3 => Float32x4,
                        4 => Float32x4,
                        5 => Float32x4,
                        6 => Float32x4,
                    ],
                },
            ],
        },
        fragment: Some(wgpu::FragmentState {
            module: &entity_shader,
            entry_point: Some("fs_entity"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: surface_format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: Some(wgpu::Face::Back),
            ..Default::default()
        },
        depth_stencil: depth_state(true),
        multisample: Default::default(),
        multiview: None,
        cache: None,
    });

    Pipelines {
        shadow,
        geometry_opaque: geometry("geometry_opaque_pipeline", Some(wgpu::Face::Back)),
        geometry_plant: geometry("geometry_plant_pipeline", None),
        lighting,
        water,
        entity,
    }
}
