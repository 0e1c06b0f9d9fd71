use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};

use crate::draw::{ClipRect, DrawCmd, DrawIndex, TextureId, Vertex};
use crate::manager::DrawManager;

use super::backend::RenderBackend;

/// Per-command uniform stride. Dynamic offsets must respect the device's
/// uniform alignment; 256 satisfies every backend wgpu supports.
const UNIFORM_STRIDE: u64 = 256;

/// wgpu implementation of [`RenderBackend`].
///
/// One triangle pipeline draws everything; per-command state (transform,
/// circular scissor, key color) rides in a dynamic-offset uniform block and
/// textures are bound per command, with a 1×1 white fallback for untextured
/// geometry. Vertex/index/uniform buffers grow power-of-two and are reused
/// across frames.
///
/// The caller owns the device/queue and points the renderer at a target view
/// each frame via [`set_render_target`](Self::set_render_target); `draw`
/// without a target skips the frame.
pub struct WgpuRenderer {
    device: wgpu::Device,
    queue: wgpu::Queue,

    pipeline: wgpu::RenderPipeline,
    uniform_bgl: wgpu::BindGroupLayout,
    texture_bgl: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,

    uniform_buf: Option<wgpu::Buffer>,
    uniform_bg: Option<wgpu::BindGroup>,
    uniform_capacity: usize,

    vtx_buf: Option<wgpu::Buffer>,
    vtx_capacity: usize,
    idx_buf: Option<wgpu::Buffer>,
    idx_capacity: usize,

    textures: HashMap<TextureId, TextureEntry>,
    next_tex_id: u64,
    white_tex: TextureEntry,

    target: Option<RenderTarget>,
}

struct TextureEntry {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    width: u32,
    height: u32,
}

struct RenderTarget {
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

/// GPU-side vertex layout; the core's backend-agnostic [`Vertex`] is
/// converted at submission time.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct GpuVertex {
    pos: [f32; 2],
    uv: [f32; 2],
    col: u32,
}

impl GpuVertex {
    const ATTRS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x2, // pos
        1 => Float32x2, // uv
        2 => Unorm8x4   // col
    ];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<GpuVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }

    fn from_vertex(v: &Vertex) -> Self {
        Self {
            pos: [v.pos.x, v.pos.y],
            uv: [v.uv.x, v.uv.y],
            col: v.col.to_rgba_le(),
        }
    }
}

/// Mirrors `CmdUniform` in `shaders/draw.wgsl`.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct CmdUniform {
    matrix: [[f32; 4]; 4],
    circle: [f32; 4],
    key_color: [f32; 4],
    screen: [f32; 4],
}

impl CmdUniform {
    fn for_cmd(cmd: &DrawCmd, target_w: u32, target_h: u32) -> Self {
        let circle = if cmd.circle_scissor {
            // The stored clip rect is the circle's bound.
            let r = cmd.clip_rect;
            let cx = (r.x0 + r.x1) as f32 * 0.5;
            let cy = (r.y0 + r.y1) as f32 * 0.5;
            let radius = (r.x1 - r.x0) as f32 * 0.5;
            [cx, cy, radius * radius, 1.0]
        } else {
            [0.0; 4]
        };
        let key = if cmd.key_color.a != 0 {
            [
                cmd.key_color.r as f32 / 255.0,
                cmd.key_color.g as f32 / 255.0,
                cmd.key_color.b as f32 / 255.0,
                1.0,
            ]
        } else {
            [0.0; 4]
        };
        Self {
            matrix: cmd.matrix.rows,
            circle,
            key_color: key,
            screen: [target_w.max(1) as f32, target_h.max(1) as f32, 0.0, 0.0],
        }
    }
}

/// One command ready for submission: its uniform slot, index window, vertex
/// base, and the source command for texture/scissor state.
struct PendingDraw {
    cmd: DrawCmd,
    first_index: u32,
    base_vertex: i32,
}

impl WgpuRenderer {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("nabu draw shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/draw.wgsl").into()),
        });

        let uniform_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("nabu cmd uniform bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: cmd_uniform_size(),
                },
                count: None,
            }],
        });

        let texture_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("nabu texture bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("nabu pipeline layout"),
            bind_group_layouts: &[&uniform_bgl, &texture_bgl],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("nabu pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[GpuVertex::layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(straight_alpha_blend()),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("nabu sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let white_tex = make_texture(&device, &texture_bgl, &sampler, 1, 1);
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &white_tex.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &[255u8; 4],
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4),
                rows_per_image: Some(1),
            },
            wgpu::Extent3d { width: 1, height: 1, depth_or_array_layers: 1 },
        );

        Self {
            device,
            queue,
            pipeline,
            uniform_bgl,
            texture_bgl,
            sampler,
            uniform_buf: None,
            uniform_bg: None,
            uniform_capacity: 0,
            vtx_buf: None,
            vtx_capacity: 0,
            idx_buf: None,
            idx_capacity: 0,
            textures: HashMap::new(),
            next_tex_id: 0,
            white_tex,
            target: None,
        }
    }

    /// Points the renderer at the view [`draw`](RenderBackend::draw) renders
    /// into. Must be re-set when the swapchain recreates its views.
    pub fn set_render_target(&mut self, view: wgpu::TextureView, width: u32, height: u32) {
        self.target = Some(RenderTarget { view, width, height });
    }

    // ── frame helpers ─────────────────────────────────────────────────────

    fn upload_font_texture(&mut self, manager: &DrawManager) {
        let fonts = manager.fonts();
        let tex_missing = fonts
            .tex_id()
            .is_none_or(|id| !self.textures.contains_key(&id));
        if !fonts.take_updated() && !tex_missing {
            return;
        }

        let (rgba, w, h) = fonts.tex_data_rgba32();
        let id = match fonts.tex_id().filter(|id| self.textures.contains_key(id)) {
            Some(id) => id,
            None => {
                let Some(id) = self.create_texture(w, h) else {
                    return;
                };
                fonts.set_tex_id(id);
                id
            }
        };
        self.set_texture_rgba(id, &rgba, w, h);
    }

    fn ensure_vertex_capacity(&mut self, count: usize) {
        if count <= self.vtx_capacity && self.vtx_buf.is_some() {
            return;
        }
        let cap = count.next_power_of_two().max(4096);
        self.vtx_buf = Some(self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("nabu vertex buffer"),
            size: (cap * std::mem::size_of::<GpuVertex>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }));
        self.vtx_capacity = cap;
    }

    fn ensure_index_capacity(&mut self, count: usize) {
        if count <= self.idx_capacity && self.idx_buf.is_some() {
            return;
        }
        let cap = count.next_power_of_two().max(8192);
        self.idx_buf = Some(self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("nabu index buffer"),
            size: (cap * std::mem::size_of::<DrawIndex>()) as u64,
            usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }));
        self.idx_capacity = cap;
    }

    fn ensure_uniform_capacity(&mut self, cmd_count: usize) {
        if cmd_count <= self.uniform_capacity && self.uniform_buf.is_some() {
            return;
        }
        let cap = cmd_count.next_power_of_two().max(64);
        let buf = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("nabu cmd uniform buffer"),
            size: cap as u64 * UNIFORM_STRIDE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.uniform_bg = Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("nabu cmd uniform bind group"),
            layout: &self.uniform_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buf,
                    offset: 0,
                    size: cmd_uniform_size(),
                }),
            }],
        }));
        self.uniform_buf = Some(buf);
        self.uniform_capacity = cap;
    }

    /// Bind group for a command's texture; unknown or absent handles fall
    /// back to the white texture. Font commands were already re-pointed at
    /// the atlas handle during collection.
    fn texture_bind_group(&self, cmd: &DrawCmd) -> &wgpu::BindGroup {
        cmd.tex
            .and_then(|id| self.textures.get(&id))
            .map_or(&self.white_tex.bind_group, |entry| &entry.bind_group)
    }
}

impl RenderBackend for WgpuRenderer {
    fn create_texture(&mut self, width: u32, height: u32) -> Option<TextureId> {
        if width == 0 || height == 0 {
            return None;
        }
        let max = self.device.limits().max_texture_dimension_2d;
        if width > max || height > max {
            log::warn!("create_texture: {width}x{height} exceeds device limit {max}");
            return None;
        }
        let entry = make_texture(&self.device, &self.texture_bgl, &self.sampler, width, height);
        self.next_tex_id += 1;
        let id = TextureId(self.next_tex_id);
        self.textures.insert(id, entry);
        Some(id)
    }

    fn set_texture_rgba(&mut self, id: TextureId, rgba: &[u8], width: u32, height: u32) -> bool {
        let Some(entry) = self.textures.get(&id) else {
            return false;
        };
        if entry.width != width || entry.height != height
            || rgba.len() != (width * height * 4) as usize
        {
            return false;
        }
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &entry.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        );
        true
    }

    fn set_texture_bgra(&mut self, id: TextureId, bgra: &[u8], width: u32, height: u32) -> bool {
        let mut rgba = bgra.to_vec();
        for px in rgba.chunks_exact_mut(4) {
            px.swap(0, 2);
        }
        self.set_texture_rgba(id, &rgba, width, height)
    }

    fn delete_texture(&mut self, id: TextureId) -> bool {
        self.textures.remove(&id).is_some()
    }

    fn draw(&mut self, manager: &DrawManager) {
        let Some(target) = self.target.take() else {
            log::warn!("draw() without a render target; skipping frame");
            return;
        };

        self.upload_font_texture(manager);
        let font_tex = manager.fonts().tex_id();

        // Flatten the active tree into one vertex/index upload plus the
        // per-command submission list.
        let mut vertices: Vec<GpuVertex> = Vec::new();
        let mut indices: Vec<DrawIndex> = Vec::new();
        let mut draws: Vec<PendingDraw> = Vec::new();

        manager.visit_active(|buf| {
            let base_vertex = vertices.len() as i32;
            vertices.extend(buf.vertices.iter().map(GpuVertex::from_vertex));
            let mut first_index = indices.len() as u32;
            indices.extend_from_slice(&buf.indices);

            for cmd in &buf.cmds {
                let mut cmd = cmd.clone();
                if cmd.font_texture {
                    cmd.tex = font_tex;
                }
                let elem_count = cmd.elem_count;
                draws.push(PendingDraw { cmd, first_index, base_vertex });
                first_index += elem_count;
            }
        });

        if indices.is_empty() {
            // Nothing visible; still run callbacks so custom work is not
            // starved by an empty scene.
            for draw in &draws {
                if let Some(cb) = &draw.cmd.callback {
                    (cb.0)(&draw.cmd);
                }
            }
            self.target = Some(target);
            return;
        }

        self.ensure_vertex_capacity(vertices.len());
        self.ensure_index_capacity(indices.len());
        self.ensure_uniform_capacity(draws.len());

        let (Some(vtx_buf), Some(idx_buf), Some(uniform_buf), Some(uniform_bg)) = (
            self.vtx_buf.as_ref(),
            self.idx_buf.as_ref(),
            self.uniform_buf.as_ref(),
            self.uniform_bg.as_ref(),
        ) else {
            self.target = Some(target);
            return;
        };

        self.queue.write_buffer(vtx_buf, 0, bytemuck::cast_slice(&vertices));
        self.queue.write_buffer(idx_buf, 0, bytemuck::cast_slice(&indices));

        let mut uniform_data = vec![0u8; draws.len() * UNIFORM_STRIDE as usize];
        for (i, draw) in draws.iter().enumerate() {
            let block = CmdUniform::for_cmd(&draw.cmd, target.width, target.height);
            let offset = i * UNIFORM_STRIDE as usize;
            uniform_data[offset..offset + std::mem::size_of::<CmdUniform>()]
                .copy_from_slice(bytemuck::bytes_of(&block));
        }
        self.queue.write_buffer(uniform_buf, 0, &uniform_data);

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("nabu draw encoder"),
        });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("nabu draw pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            rpass.set_pipeline(&self.pipeline);
            rpass.set_vertex_buffer(0, vtx_buf.slice(..));
            rpass.set_index_buffer(idx_buf.slice(..), wgpu::IndexFormat::Uint32);

            for (i, draw) in draws.iter().enumerate() {
                let cmd = &draw.cmd;
                if let Some(cb) = &cmd.callback {
                    (cb.0)(cmd);
                    continue;
                }
                if cmd.elem_count == 0 {
                    continue;
                }

                // Circular commands scissor on their outer axis-aligned
                // bound; the distance test runs in the fragment shader.
                let clip = if cmd.circle_scissor { cmd.circle_outer_clip } else { cmd.clip_rect };
                let Some((sx, sy, sw, sh)) = clip_to_scissor(clip, target.width, target.height)
                else {
                    continue;
                };
                rpass.set_scissor_rect(sx, sy, sw, sh);

                rpass.set_bind_group(0, uniform_bg, &[(i as u64 * UNIFORM_STRIDE) as u32]);
                rpass.set_bind_group(1, self.texture_bind_group(cmd), &[]);

                // Multi-pass blur approximated by repeated accumulation; the
                // original's backbuffer-resolve step has no direct wgpu
                // counterpart.
                let passes = if cmd.blur_strength > 0 { cmd.blur_passes.max(1) } else { 1 };
                let range = draw.first_index..draw.first_index + cmd.elem_count;
                for _ in 0..passes {
                    rpass.draw_indexed(range.clone(), draw.base_vertex, 0..1);
                }
            }
        }

        self.queue.submit(Some(encoder.finish()));
        self.target = Some(target);
    }
}

fn cmd_uniform_size() -> Option<std::num::NonZeroU64> {
    std::num::NonZeroU64::new(std::mem::size_of::<CmdUniform>() as u64)
}

fn straight_alpha_blend() -> wgpu::BlendState {
    wgpu::BlendState {
        color: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::SrcAlpha,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
        alpha: wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        },
    }
}

fn make_texture(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    width: u32,
    height: u32,
) -> TextureEntry {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("nabu texture"),
        size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("nabu texture bind group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    });
    TextureEntry { texture, bind_group, width, height }
}

/// Clamps an integer clip rect to the target and converts it to scissor
/// arguments. `None` for zero-area results (the draw is skipped).
fn clip_to_scissor(clip: ClipRect, target_w: u32, target_h: u32) -> Option<(u32, u32, u32, u32)> {
    let x0 = clip.x0.clamp(0, target_w as i32) as u32;
    let y0 = clip.y0.clamp(0, target_h as i32) as u32;
    let x1 = clip.x1.clamp(0, target_w as i32) as u32;
    let y1 = clip.y1.clamp(0, target_h as i32) as u32;
    let w = x1.saturating_sub(x0);
    let h = y1.saturating_sub(y0);
    if w == 0 || h == 0 { None } else { Some((x0, y0, w, h)) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scissor_clamps_to_target() {
        let clip = ClipRect { x0: -10, y0: 5, x1: 900, y1: 700 };
        assert_eq!(clip_to_scissor(clip, 800, 600), Some((0, 5, 800, 595)));
    }

    #[test]
    fn empty_scissor_is_skipped() {
        let clip = ClipRect { x0: 100, y0: 100, x1: 100, y1: 400 };
        assert_eq!(clip_to_scissor(clip, 800, 600), None);
        let offscreen = ClipRect { x0: 900, y0: 0, x1: 1000, y1: 100 };
        assert_eq!(clip_to_scissor(offscreen, 800, 600), None);
    }

    #[test]
    fn cmd_uniform_fits_the_stride() {
        assert!(std::mem::size_of::<CmdUniform>() as u64 <= UNIFORM_STRIDE);
        // 16-byte alignment required by WGSL uniform layout.
        assert_eq!(std::mem::size_of::<CmdUniform>() % 16, 0);
    }

    #[test]
    fn circle_uniform_derives_from_the_clip_rect() {
        let mut cmd = DrawCmd::default();
        cmd.circle_scissor = true;
        cmd.clip_rect = ClipRect { x0: 100, y0: 200, x1: 300, y1: 400 };
        let u = CmdUniform::for_cmd(&cmd, 800, 600);
        assert_eq!(u.circle, [200.0, 300.0, 100.0 * 100.0, 1.0]);

        cmd.circle_scissor = false;
        let u = CmdUniform::for_cmd(&cmd, 800, 600);
        assert_eq!(u.circle[3], 0.0);
    }
}
