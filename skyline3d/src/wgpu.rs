use anyhow::Context;
use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use wgpu::util::DeviceExt;

use crate::camera::CameraPose;
use crate::controller::{FrameUpdate, SceneController};
use crate::generator::{Atmosphere, Building};
use crate::mesh::{SceneMesh, Vertex};
use crate::twinkle::WindowMaterialPool;

const MAX_POINT_LIGHTS: usize = 16;
/// Building slots in the placement uniforms. Profiles generate at most 50 buildings.
pub const MAX_BUILDINGS: usize = 64;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct CameraUniforms {
    view_proj: [[f32; 4]; 4],
    /// xyz: eye, w: fog density
    camera: [f32; 4],
    /// rgb: background, w: exposure
    background: [f32; 4],
    ambient: [f32; 4],
    /// xyz: direction toward the sun, w: intensity
    sun: [f32; 4],
    /// x: point light count, y: point light range
    light_params: [f32; 4],
    point_lights: [[f32; 4]; MAX_POINT_LIGHTS],
}

impl CameraUniforms {
    fn new(view_proj: Mat4, pose: CameraPose, atmosphere: &Atmosphere, exposure: f32) -> Self {
        let mut point_lights = [[0.0; 4]; MAX_POINT_LIGHTS];
        let count = atmosphere.point_lights.len().min(MAX_POINT_LIGHTS);
        for (slot, light) in point_lights.iter_mut().zip(&atmosphere.point_lights) {
            *slot = light.position.extend(light.intensity).to_array();
        }
        let range = atmosphere
            .point_lights
            .first()
            .map(|light| light.range)
            .unwrap_or(1.0);
        let ambient = atmosphere.ambient.map(|c| c * atmosphere.ambient_intensity);
        let sun_dir = atmosphere.sun_position.normalize_or_zero();

        Self {
            view_proj: view_proj.to_cols_array_2d(),
            camera: pose.eye.extend(atmosphere.fog_density).to_array(),
            background: [
                atmosphere.background[0],
                atmosphere.background[1],
                atmosphere.background[2],
                exposure,
            ],
            ambient: [ambient[0], ambient[1], ambient[2], 0.0],
            sun: sun_dir.extend(atmosphere.sun_intensity).to_array(),
            light_params: [count as f32, range, 0.0, 0.0],
            point_lights,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
struct GlowUniforms {
    /// x: time of the last twinkle update
    params: [f32; 4],
    /// Per colour slot, x: opacity, y: emissive
    shared: [[f32; 4]; 2],
}

impl GlowUniforms {
    fn new(materials: &WindowMaterialPool) -> Self {
        let glow = materials.shared();
        Self {
            params: [materials.time() as f32, 0.0, 0.0, 0.0],
            shared: glow.map(|g| [g.opacity, g.emissive, 0.0, 0.0]),
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
struct BuildingUniforms {
    /// Per building slot, xyz: world position of the base, w: yaw
    placement: [[f32; 4]; MAX_BUILDINGS],
}

impl BuildingUniforms {
    fn new(buildings: &[Building]) -> Self {
        let mut placement = [[0.0; 4]; MAX_BUILDINGS];
        for building in buildings {
            if let Some(slot) = placement.get_mut(building.index) {
                *slot = building.position().extend(building.yaw).to_array();
            }
        }
        Self { placement }
    }
}

/// GPU side of the skyline. Geometry is uploaded once; each frame only writes uniforms, and
/// glow or building placement only when the controller reports a change.
pub struct SceneRenderer {
    pipeline: wgpu::RenderPipeline,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    camera_buffer: wgpu::Buffer,
    glow_buffer: wgpu::Buffer,
    building_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    depth_texture: wgpu::Texture,
    depth_view: wgpu::TextureView,
    clear_color: wgpu::Color,
}

impl SceneRenderer {
    pub fn new(
        device: &wgpu::Device,
        config: &wgpu::SurfaceConfiguration,
        mesh: &SceneMesh,
        controller: &SceneController,
    ) -> Self {
        let atmosphere = &controller.skyline().atmosphere;
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Skyline Shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER_SOURCE.into()),
        });

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Skyline Vertex Buffer"),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Skyline Index Buffer"),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let pose = controller.rig().pose(0.0);
        let camera = CameraUniforms::new(controller.view_projection(pose), pose, atmosphere, 1.0);
        let camera_buffer = uniform_buffer(device, "Skyline Camera Buffer", &[camera]);
        let glow = GlowUniforms::new(controller.materials());
        let glow_buffer = uniform_buffer(device, "Skyline Glow Buffer", &[glow]);
        let buildings = BuildingUniforms::new(&controller.skyline().buildings);
        let building_buffer = uniform_buffer(device, "Skyline Building Buffer", &[buildings]);

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Skyline Bind Group Layout"),
            entries: &[
                uniform_layout_entry(0, wgpu::ShaderStages::VERTEX_FRAGMENT),
                uniform_layout_entry(1, wgpu::ShaderStages::VERTEX),
                uniform_layout_entry(2, wgpu::ShaderStages::VERTEX),
            ],
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Skyline Bind Group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: glow_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: building_buffer.as_entire_binding(),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Skyline Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let depth_texture = create_depth_texture(device, config);
        let depth_view = depth_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Skyline Render Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::desc()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: wgpu::TextureFormat::Depth24Plus,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let [r, g, b] = atmosphere.background;
        Self {
            pipeline,
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
            camera_buffer,
            glow_buffer,
            building_buffer,
            bind_group,
            depth_texture,
            depth_view,
            clear_color: wgpu::Color {
                r: r as f64,
                g: g as f64,
                b: b as f64,
                a: 1.0,
            },
        }
    }

    pub fn update_frame(
        &self,
        queue: &wgpu::Queue,
        controller: &SceneController,
        update: &FrameUpdate,
        exposure: f32,
    ) {
        let camera = CameraUniforms::new(
            controller.view_projection(update.pose),
            update.pose,
            &controller.skyline().atmosphere,
            exposure,
        );
        queue.write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&[camera]));
        if update.glow_dirty {
            let glow = GlowUniforms::new(controller.materials());
            queue.write_buffer(&self.glow_buffer, 0, bytemuck::cast_slice(&[glow]));
        }
        if update.buildings_dirty {
            let buildings = BuildingUniforms::new(&controller.skyline().buildings);
            queue.write_buffer(&self.building_buffer, 0, bytemuck::cast_slice(&[buildings]));
        }
    }

    pub fn resize(&mut self, device: &wgpu::Device, config: &wgpu::SurfaceConfiguration) {
        self.depth_texture.destroy();
        self.depth_texture = create_depth_texture(device, config);
        self.depth_view = self
            .depth_texture
            .create_view(&wgpu::TextureViewDescriptor::default());
    }

    pub fn render(&self, encoder: &mut wgpu::CommandEncoder, target_view: &wgpu::TextureView) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Skyline Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(self.clear_color),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.bind_group, &[]);
        render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        if self.index_count > 0 {
            render_pass.draw_indexed(0..self.index_count, 0, 0..1);
        }
    }

    /// Releases GPU memory immediately instead of waiting for the handles to drop.
    pub fn destroy(&self) {
        self.vertex_buffer.destroy();
        self.index_buffer.destroy();
        self.camera_buffer.destroy();
        self.glow_buffer.destroy();
        self.building_buffer.destroy();
        self.depth_texture.destroy();
    }
}

/// Device, queue and configured surface for one canvas.
pub struct GpuContext {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
}

impl GpuContext {
    pub async fn connect(
        instance: &wgpu::Instance,
        surface: wgpu::Surface<'static>,
        width: u32,
        height: u32,
    ) -> anyhow::Result<Self> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no compatible graphics adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Skyline Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_webgl2_defaults(),
                memory_hints: Default::default(),
                trace: Default::default(),
            })
            .await
            .context("requesting graphics device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("surface reports no texture formats")?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let (width, height) = clamp_size(&device, width, height);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self {
            surface,
            device,
            queue,
            config,
        })
    }

    /// Reconfigures the surface and returns the size actually used.
    pub fn resize(&mut self, width: u32, height: u32) -> (u32, u32) {
        let (width, height) = clamp_size(&self.device, width, height);
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        (width, height)
    }

    pub fn present(&self, renderer: &SceneRenderer) -> anyhow::Result<()> {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                self.surface.get_current_texture()?
            }
            Err(err) => return Err(anyhow::anyhow!("surface error: {err:?}")),
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Skyline Render Encoder"),
            });

        renderer.render(&mut encoder, &view);
        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

fn clamp_size(device: &wgpu::Device, width: u32, height: u32) -> (u32, u32) {
    let max_texture_size = device.limits().max_texture_dimension_2d;
    (
        width.min(max_texture_size).max(1),
        height.min(max_texture_size).max(1),
    )
}

fn uniform_buffer<T: Pod>(device: &wgpu::Device, label: &str, contents: &[T]) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::cast_slice(contents),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    })
}

fn uniform_layout_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn create_depth_texture(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Skyline Depth Texture"),
        size: wgpu::Extent3d {
            width: config.width,
            height: config.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Depth24Plus,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    })
}

const SHADER_SOURCE: &str = r#"
struct CameraUniforms {
    view_proj: mat4x4<f32>,
    camera: vec4<f32>,
    background: vec4<f32>,
    ambient: vec4<f32>,
    sun: vec4<f32>,
    light_params: vec4<f32>,
    point_lights: array<vec4<f32>, 16>,
}

struct GlowUniforms {
    params: vec4<f32>,
    shared_glow: array<vec4<f32>, 2>,
}

struct BuildingUniforms {
    placement: array<vec4<f32>, 64>,
}

@group(0) @binding(0)
var<uniform> uniforms: CameraUniforms;
@group(0) @binding(1)
var<uniform> glow: GlowUniforms;
@group(0) @binding(2)
var<uniform> buildings: BuildingUniforms;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) color: vec3<f32>,
    @location(3) material: vec3<f32>,
    @location(4) slots: vec3<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) color: vec3<f32>,
    @location(3) material: vec3<f32>,
}

// Same rotation as glam's Quat::from_rotation_y.
fn rotate_y(v: vec3<f32>, angle: f32) -> vec3<f32> {
    let c = cos(angle);
    let s = sin(angle);
    return vec3<f32>(c * v.x + s * v.z, v.y, -s * v.x + c * v.z);
}

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var position = in.position;
    var normal = in.normal;
    if (in.slots.x > -0.5) {
        let placement = buildings.placement[u32(in.slots.x + 0.5)];
        position = rotate_y(position, placement.w) + placement.xyz;
        normal = rotate_y(normal, placement.w);
    }

    var material = in.material;
    if (in.slots.y > 1.5) {
        // Mirrors twinkle(): sin(t * 2 + k * 0.1) * 0.3 + 0.7
        let wave = sin(glow.params.x * 2.0 + in.slots.z * 0.1) * 0.3 + 0.7;
        material.x = clamp(wave * 0.8, 0.0, 0.8);
        material.y = clamp(wave * 1.5, 0.0, 1.5);
    } else if (in.slots.y > -0.5) {
        let shared_glow = glow.shared_glow[u32(in.slots.y + 0.5)];
        material.x = shared_glow.x;
        material.y = shared_glow.y;
    }

    var out: VertexOutput;
    out.clip_position = uniforms.view_proj * vec4<f32>(position, 1.0);
    out.world_position = position;
    out.normal = normal;
    out.color = in.color;
    out.material = material;
    return out;
}

fn aces_filmic(x: vec3<f32>) -> vec3<f32> {
    let a = 2.51;
    let b = 0.03;
    let c = 2.43;
    let d = 0.59;
    let e = 0.14;
    return clamp((x * (a * x + b)) / (x * (c * x + d) + e), vec3<f32>(0.0), vec3<f32>(1.0));
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    var rgb = in.color * in.material.y;
    if (in.material.z > 0.5) {
        let n = normalize(in.normal);
        var light = uniforms.ambient.rgb
            + vec3<f32>(uniforms.sun.w * max(dot(n, uniforms.sun.xyz), 0.0));
        let count = u32(uniforms.light_params.x);
        for (var i = 0u; i < count; i = i + 1u) {
            let to_light = uniforms.point_lights[i].xyz - in.world_position;
            let dist = max(length(to_light), 0.0001);
            let falloff = clamp(1.0 - dist / uniforms.light_params.y, 0.0, 1.0);
            let lambert = max(dot(n, to_light / dist), 0.0);
            light = light + vec3<f32>(uniforms.point_lights[i].w * falloff * falloff * lambert);
        }
        rgb = in.color * light + rgb;
    }

    let fog_distance = distance(in.world_position, uniforms.camera.xyz) * uniforms.camera.w;
    let fog = clamp(1.0 - exp(-fog_distance * fog_distance), 0.0, 1.0);
    rgb = mix(rgb, uniforms.background.rgb, fog);
    return vec4<f32>(aces_filmic(rgb * uniforms.background.w), in.material.x);
}
"#;

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{Profile, TwinkleMode};
    use crate::generator::test::t_skyline;
    use crate::resources::ResourceLedger;
    use crate::twinkle::twinkle;
    use crate::windows::LightColor;

    #[test]
    fn every_profile_fits_the_building_slots() {
        for profile in [Profile::Lean, Profile::Detailed] {
            assert!(profile.params().building_count <= MAX_BUILDINGS);
        }
    }

    #[test]
    fn building_uniforms_follow_parallax_and_sway() {
        let (mut skyline, _) = t_skyline(Profile::Detailed, 5);
        skyline.buildings[3].offset = glam::Vec2::new(2.0, -4.0);
        skyline.buildings[3].yaw = 0.0015;
        let uniforms = BuildingUniforms::new(&skyline.buildings);
        for building in &skyline.buildings {
            let expected = building.position().extend(building.yaw).to_array();
            assert_eq!(uniforms.placement[building.index], expected);
        }
        let moved = uniforms.placement[3];
        assert_eq!(moved[3], 0.0015);
        assert_eq!(moved[0], skyline.buildings[3].base.x + 2.0);
        assert_eq!(uniforms.placement[skyline.buildings.len()], [0.0; 4]);
    }

    #[test]
    fn glow_uniforms_carry_shared_colors_and_time() {
        let mut ledger = ResourceLedger::new();
        let mut pool = WindowMaterialPool::new(TwinkleMode::SharedByColor, &mut ledger);
        pool.update(2.5);
        let uniforms = GlowUniforms::new(&pool);
        assert_eq!(uniforms.params[0], 2.5);
        for color in LightColor::ALL {
            let glow = twinkle(2.5, color.slot());
            let slot = uniforms.shared[color.slot()];
            assert_eq!([slot[0], slot[1]], [glow.opacity, glow.emissive]);
        }
    }
}
