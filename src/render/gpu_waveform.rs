use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use eframe::egui;
use eframe::egui_wgpu;
use eframe::wgpu;
use eframe::wgpu::util::DeviceExt;

use super::gpu_types::{ChannelDrawList, DrawMode, WaveformGpuData, WaveformUniforms};
use crate::processing::geometry::BufferId;

/// Uploaded vertex buffers not drawn for this long are dropped.
const BUFFER_IDLE_TIMEOUT: Duration = Duration::from_secs(30);
const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// WGSL shader source (embedded)
// ---------------------------------------------------------------------------

const WAVEFORM_SHADER_SRC: &str = r#"
struct Uniforms {
    view_proj: mat4x4<f32>,
    color: vec4<f32>,
    resolution: vec2<f32>,
    line_width: f32,
    point_radius: f32,
};

@group(0) @binding(0) var<uniform> u: Uniforms;
@group(0) @binding(1) var<storage, read> points: array<vec2<f32>>;

struct FlatOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) color: vec4<f32>,
};

struct DiscOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) color: vec4<f32>,
    @location(1) uv: vec2<f32>,
};

// Two triangles covering [-1, 1]^2.
fn corner(vert: u32) -> vec2<f32> {
    switch vert {
        case 0u: { return vec2<f32>(-1.0, -1.0); }
        case 1u: { return vec2<f32>(1.0, -1.0); }
        case 2u: { return vec2<f32>(-1.0, 1.0); }
        case 3u: { return vec2<f32>(1.0, -1.0); }
        case 4u: { return vec2<f32>(1.0, 1.0); }
        case 5u: { return vec2<f32>(-1.0, 1.0); }
        default: { return vec2<f32>(0.0, 0.0); }
    }
}

fn project(p: vec2<f32>) -> vec2<f32> {
    let clip = u.view_proj * vec4<f32>(p, 0.0, 1.0);
    return clip.xy / clip.w;
}

fn to_px(ndc: vec2<f32>) -> vec2<f32> {
    return (ndc + vec2<f32>(1.0, 1.0)) * 0.5 * u.resolution;
}

fn from_px(px: vec2<f32>) -> vec4<f32> {
    return vec4<f32>(px / u.resolution * 2.0 - vec2<f32>(1.0, 1.0), 0.0, 1.0);
}

// Instance i is the segment from sample i to sample i + 1, widened to
// line_width pixels. corner.x picks the end, corner.y the side.
@vertex
fn vs_line(@builtin(instance_index) inst: u32, @builtin(vertex_index) vert: u32) -> FlatOut {
    let a = to_px(project(points[inst]));
    let b = to_px(project(points[inst + 1u]));
    let c = corner(vert);

    let d = b - a;
    var normal = vec2<f32>(0.0, 1.0);
    if length(d) > 0.001 {
        normal = normalize(vec2<f32>(-d.y, d.x));
    }
    let tip = select(a, b, c.x > 0.0);

    var out: FlatOut;
    out.pos = from_px(tip + normal * c.y * u.line_width * 0.5);
    out.color = u.color;
    return out;
}

@vertex
fn vs_point(@builtin(instance_index) inst: u32, @builtin(vertex_index) vert: u32) -> DiscOut {
    let c = corner(vert);
    var out: DiscOut;
    out.pos = from_px(to_px(project(points[inst])) + c * u.point_radius);
    out.color = u.color;
    out.uv = c;
    return out;
}

// Storage holds one [min, max] corner pair per mask.
@vertex
fn vs_mask(@builtin(instance_index) inst: u32, @builtin(vertex_index) vert: u32) -> FlatOut {
    let t = corner(vert) * 0.5 + vec2<f32>(0.5, 0.5);
    var out: FlatOut;
    out.pos = vec4<f32>(project(mix(points[inst * 2u], points[inst * 2u + 1u], t)), 0.0, 1.0);
    out.color = u.color;
    return out;
}

@fragment
fn fs_flat(frag: FlatOut) -> @location(0) vec4<f32> {
    return frag.color;
}

@fragment
fn fs_disc(frag: DiscOut) -> @location(0) vec4<f32> {
    let r = length(frag.uv);
    if r > 1.0 {
        discard;
    }
    return vec4<f32>(frag.color.rgb, frag.color.a * (1.0 - smoothstep(0.8, 1.0, r)));
}
"#;

// ---------------------------------------------------------------------------
// Resources shared by every channel callback
// ---------------------------------------------------------------------------

struct CachedBuffer {
    buffer: wgpu::Buffer,
    last_used: Instant,
}

/// Pipelines plus the vertex buffers uploaded so far, keyed by the CPU-side
/// buffer id. Lives in egui's `CallbackResources`.
pub struct GpuWaveformResources {
    pipelines: [wgpu::RenderPipeline; 3],
    bind_group_layout: wgpu::BindGroupLayout,
    vertex_buffers: HashMap<BufferId, CachedBuffer>,
    last_sweep: Instant,
}

impl GpuWaveformResources {
    fn pipeline(&self, kind: PipelineType) -> &wgpu::RenderPipeline {
        &self.pipelines[kind as usize]
    }

    fn evict(&mut self, ids: &[BufferId]) {
        for id in ids {
            self.vertex_buffers.remove(id);
        }
    }

    fn sweep_idle(&mut self, now: Instant) {
        if now.duration_since(self.last_sweep) < SWEEP_INTERVAL {
            return;
        }
        self.last_sweep = now;
        let before = self.vertex_buffers.len();
        self.vertex_buffers
            .retain(|_, cached| now.duration_since(cached.last_used) < BUFFER_IDLE_TIMEOUT);
        let dropped = before - self.vertex_buffers.len();
        if dropped > 0 {
            tracing::debug!("Dropped {dropped} idle vertex buffers");
        }
    }
}

/// Draw order within a channel: masks under lines under points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineType {
    Mask = 0,
    Line = 1,
    Point = 2,
}

struct DrawCall {
    bind_group: wgpu::BindGroup,
    instances: u32,
    pipeline: PipelineType,
}

// ---------------------------------------------------------------------------
// Setup
// ---------------------------------------------------------------------------

fn buffer_layout_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
    ty: wgpu::BufferBindingType,
    min_size: u64,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty,
            has_dynamic_offset: false,
            min_binding_size: std::num::NonZeroU64::new(min_size),
        },
        count: None,
    }
}

/// Builds the waveform pipelines and registers them with egui's renderer.
/// Call once, before the first frame.
pub fn init_gpu_resources(render_state: &egui_wgpu::RenderState) {
    let device = &render_state.device;

    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("waveform_shader"),
        source: wgpu::ShaderSource::Wgsl(WAVEFORM_SHADER_SRC.into()),
    });

    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("waveform_bind_group_layout"),
        entries: &[
            buffer_layout_entry(
                0,
                wgpu::ShaderStages::VERTEX_FRAGMENT,
                wgpu::BufferBindingType::Uniform,
                std::mem::size_of::<WaveformUniforms>() as u64,
            ),
            buffer_layout_entry(
                1,
                wgpu::ShaderStages::VERTEX,
                wgpu::BufferBindingType::Storage { read_only: true },
                MIN_STORAGE_BYTES as u64,
            ),
        ],
    });

    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("waveform_pipeline_layout"),
        bind_group_layouts: &[&bind_group_layout],
        push_constant_ranges: &[],
    });

    // Overlapping masks compound: src * dst_alpha + dst * src_color.
    let compound = wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::DstAlpha,
        dst_factor: wgpu::BlendFactor::Src,
        operation: wgpu::BlendOperation::Add,
    };
    let mask_blend = wgpu::BlendState {
        color: compound,
        alpha: compound,
    };

    let pipeline = |label: &str, vs: &str, fs: &str, blend: wgpu::BlendState| {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some(vs),
                buffers: &[],
                compilation_options: Default::default(),
            },
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some(fs),
                targets: &[Some(wgpu::ColorTargetState {
                    format: render_state.target_format,
                    blend: Some(blend),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            multiview: None,
            cache: None,
        })
    };

    let resources = GpuWaveformResources {
        pipelines: [
            pipeline("waveform_mask", "vs_mask", "fs_flat", mask_blend),
            pipeline("waveform_line", "vs_line", "fs_flat", wgpu::BlendState::ALPHA_BLENDING),
            pipeline("waveform_point", "vs_point", "fs_disc", wgpu::BlendState::ALPHA_BLENDING),
        ],
        bind_group_layout,
        vertex_buffers: HashMap::new(),
        last_sweep: Instant::now(),
    };

    render_state
        .renderer
        .write()
        .callback_resources
        .insert(resources);

    tracing::info!("Waveform GPU pipelines initialized");
}

/// Storage bindings must hold at least one `vec2<f32>`.
const MIN_STORAGE_BYTES: usize = 8;

fn storage_buffer(device: &wgpu::Device, label: &str, data: &[u8]) -> wgpu::Buffer {
    let mut contents = data.to_vec();
    if contents.len() < MIN_STORAGE_BYTES {
        contents.resize(MIN_STORAGE_BYTES, 0);
    }
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: &contents,
        usage: wgpu::BufferUsages::STORAGE,
    })
}

/// Uploads a waveform's vertices unless they are cached already.
fn upload<'a>(
    cache: &'a mut HashMap<BufferId, CachedBuffer>,
    device: &wgpu::Device,
    waveform: &WaveformGpuData,
    now: Instant,
) -> &'a wgpu::Buffer {
    let cached = cache.entry(waveform.buffer.id()).or_insert_with(|| CachedBuffer {
        buffer: storage_buffer(
            device,
            "waveform_vertices",
            bytemuck::cast_slice(waveform.buffer.points()),
        ),
        last_used: now,
    });
    cached.last_used = now;
    &cached.buffer
}

fn bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    uniforms: &WaveformUniforms,
    storage: &wgpu::Buffer,
) -> wgpu::BindGroup {
    let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("waveform_uniforms"),
        contents: bytemuck::bytes_of(uniforms),
        usage: wgpu::BufferUsages::UNIFORM,
    });
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("waveform_bind_group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: storage.as_entire_binding(),
            },
        ],
    })
}

// ---------------------------------------------------------------------------
// Paint callback
// ---------------------------------------------------------------------------

/// One channel's draw for one frame, scoped to the channel's on-screen rect.
pub struct GpuWaveformCallback {
    draw_list: ChannelDrawList,
    /// Built in `prepare`, replayed in `paint`.
    draw_calls: Mutex<Vec<DrawCall>>,
}

impl GpuWaveformCallback {
    fn mask_calls(&self, device: &wgpu::Device, resources: &GpuWaveformResources, out: &mut Vec<DrawCall>) {
        for mask in &self.draw_list.masks {
            let corners = storage_buffer(device, "mask_corners", bytemuck::cast_slice(&mask.corners));
            let uniforms = WaveformUniforms {
                color: mask.color,
                ..self.draw_list.uniforms_base
            };
            out.push(DrawCall {
                bind_group: bind_group(device, &resources.bind_group_layout, &uniforms, &corners),
                instances: 1,
                pipeline: PipelineType::Mask,
            });
        }
    }

    fn waveform_calls(&self, device: &wgpu::Device, resources: &mut GpuWaveformResources, now: Instant, out: &mut Vec<DrawCall>) {
        for waveform in &self.draw_list.waveforms {
            let vertices = waveform.buffer.vertex_count();
            let (instances, pipeline) = match waveform.draw_mode {
                DrawMode::Polyline => (vertices.saturating_sub(1), PipelineType::Line),
                DrawMode::Points => (vertices, PipelineType::Point),
            };
            if instances == 0 {
                continue;
            }
            let uniforms = WaveformUniforms {
                color: waveform.color,
                line_width: waveform.line_width,
                point_radius: waveform.point_radius,
                ..self.draw_list.uniforms_base
            };
            let storage = upload(&mut resources.vertex_buffers, device, waveform, now);
            out.push(DrawCall {
                bind_group: bind_group(device, &resources.bind_group_layout, &uniforms, storage),
                instances: instances as u32,
                pipeline,
            });
        }
    }
}

impl egui_wgpu::CallbackTrait for GpuWaveformCallback {
    fn prepare(
        &self,
        device: &wgpu::Device,
        _queue: &wgpu::Queue,
        _screen_descriptor: &egui_wgpu::ScreenDescriptor,
        _encoder: &mut wgpu::CommandEncoder,
        callback_resources: &mut egui_wgpu::CallbackResources,
    ) -> Vec<wgpu::CommandBuffer> {
        let Some(resources) = callback_resources.get_mut::<GpuWaveformResources>() else {
            return Vec::new();
        };

        let now = Instant::now();
        resources.evict(&self.draw_list.retired);
        resources.sweep_idle(now);

        let mut calls = Vec::with_capacity(self.draw_list.masks.len() + self.draw_list.waveforms.len());
        self.mask_calls(device, resources, &mut calls);
        self.waveform_calls(device, resources, now, &mut calls);

        if let Ok(mut slot) = self.draw_calls.lock() {
            *slot = calls;
        }
        Vec::new()
    }

    fn paint(
        &self,
        info: egui::PaintCallbackInfo,
        render_pass: &mut wgpu::RenderPass<'static>,
        callback_resources: &egui_wgpu::CallbackResources,
    ) {
        let Some(resources) = callback_resources.get::<GpuWaveformResources>() else {
            return;
        };
        let Ok(calls) = self.draw_calls.lock() else {
            return;
        };

        let vp = info.viewport_in_pixels();
        let clip = info.clip_rect_in_pixels();
        if calls.is_empty() || vp.width_px <= 0 || vp.height_px <= 0 || clip.width_px <= 0 || clip.height_px <= 0 {
            return;
        }
        render_pass.set_viewport(
            vp.left_px as f32,
            vp.top_px as f32,
            vp.width_px as f32,
            vp.height_px as f32,
            0.0,
            1.0,
        );
        render_pass.set_scissor_rect(
            clip.left_px as u32,
            clip.top_px as u32,
            clip.width_px as u32,
            clip.height_px as u32,
        );

        for call in calls.iter() {
            render_pass.set_pipeline(resources.pipeline(call.pipeline));
            render_pass.set_bind_group(0, &call.bind_group, &[]);
            render_pass.draw(0..6, 0..call.instances);
        }
    }
}

/// Wraps a channel's draw list in an egui paint callback covering `rect`.
pub fn create_waveform_paint_callback(rect: egui::Rect, draw_list: ChannelDrawList) -> egui::PaintCallback {
    egui_wgpu::Callback::new_paint_callback(
        rect,
        GpuWaveformCallback {
            draw_list,
            draw_calls: Mutex::new(Vec::new()),
        },
    )
}
