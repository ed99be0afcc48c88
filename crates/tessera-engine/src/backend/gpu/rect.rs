use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::coords::{Color, Rect, Viewport};

/// A rectangle queued for the next flush, with the clip it was recorded under.
#[derive(Debug, Copy, Clone)]
pub(crate) struct PendingRect {
    pub instance: RectInstance,
    pub clip: Option<Rect>,
}

impl PendingRect {
    pub fn new(rect: Rect, color: Color, clip: Option<Rect>) -> Self {
        let r = rect.normalized();
        Self {
            instance: RectInstance {
                origin: [r.x, r.y],
                size: [r.width, r.height],
                color: [color.r, color.g, color.b, color.a],
            },
            clip,
        }
    }
}

/// Where a flush renders to.
pub(crate) struct RectTarget<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub view: &'a wgpu::TextureView,
    pub format: wgpu::TextureFormat,
    pub viewport: Viewport,
}

/// Smallest instance buffer ever allocated.
const MIN_INSTANCES: usize = 64;

/// Bump allocation of instance ranges within one frame.
///
/// `queue.write_buffer` lands before the submitted encoder runs, so every
/// batch flushed before a submit needs its own range. The cursor rewinds only
/// when a new frame begins.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
struct InstanceArena {
    capacity: usize,
    cursor: usize,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Reservation {
    /// The batch fits at `base` in the current buffer.
    Within { base: usize },
    /// A new buffer of `capacity` instances is needed; the batch goes at 0.
    /// Passes recorded earlier keep the old buffer alive.
    Grow { capacity: usize },
}

impl InstanceArena {
    fn rewind(&mut self) {
        self.cursor = 0;
    }

    fn reserve(&mut self, len: usize) -> Reservation {
        if self.capacity > 0 && self.cursor + len <= self.capacity {
            let base = self.cursor;
            self.cursor += len;
            return Reservation::Within { base };
        }

        let capacity = (self.cursor + len).next_power_of_two().max(MIN_INSTANCES);
        self.capacity = capacity;
        self.cursor = len;
        Reservation::Grow { capacity }
    }
}

/// Instanced solid-rectangle renderer shared by every canvas of a backend.
///
/// The pipeline is rebuilt only when the target format changes; the instance
/// buffer grows geometrically and is dropped by [`trim`](Self::trim).
#[derive(Default)]
pub(crate) struct RectRenderer {
    pipeline_format: Option<wgpu::TextureFormat>,
    pipeline: Option<wgpu::RenderPipeline>,

    bind_group_layout: Option<wgpu::BindGroupLayout>,
    bind_group: Option<wgpu::BindGroup>,
    viewport_ubo: Option<wgpu::Buffer>,

    quad_vbo: Option<wgpu::Buffer>,
    quad_ibo: Option<wgpu::Buffer>,

    instance_vbo: Option<wgpu::Buffer>,
    instances: InstanceArena,
}

impl RectRenderer {
    /// Starts a new frame; instance ranges from the previous submit may be reused.
    pub fn begin_frame(&mut self) {
        self.instances.rewind();
    }

    /// Draws `rects` in order, one instanced call per run of equal clips.
    pub fn render(&mut self, target: RectTarget<'_>, rects: &[PendingRect]) {
        if rects.is_empty() || target.viewport.is_empty() {
            return;
        }

        self.ensure_pipeline(target.device, target.format);
        self.ensure_static_buffers(target.device);
        self.ensure_bindings(target.device);
        let base = self.reserve_instances(target.device, rects.len());

        let (Some(pipeline), Some(bind_group), Some(ubo), Some(quad_vbo), Some(quad_ibo), Some(instance_vbo)) = (
            self.pipeline.as_ref(),
            self.bind_group.as_ref(),
            self.viewport_ubo.as_ref(),
            self.quad_vbo.as_ref(),
            self.quad_ibo.as_ref(),
            self.instance_vbo.as_ref(),
        ) else {
            return;
        };

        let uniform = ViewportUniform {
            viewport: [target.viewport.width as f32, target.viewport.height as f32],
            _pad: [0.0; 2],
        };
        target.queue.write_buffer(ubo, 0, bytemuck::bytes_of(&uniform));

        let raw: Vec<RectInstance> = rects.iter().map(|r| r.instance).collect();
        let offset = (base * std::mem::size_of::<RectInstance>()) as u64;
        target.queue.write_buffer(instance_vbo, offset, bytemuck::cast_slice(&raw));

        let mut rpass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("tessera rect pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.view,
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

        rpass.set_pipeline(pipeline);
        rpass.set_bind_group(0, bind_group, &[]);
        rpass.set_vertex_buffer(0, quad_vbo.slice(..));
        rpass.set_vertex_buffer(1, instance_vbo.slice(..));
        rpass.set_index_buffer(quad_ibo.slice(..), wgpu::IndexFormat::Uint16);

        let mut i = 0usize;
        while i < rects.len() {
            let clip = rects[i].clip;
            let mut j = i + 1;
            while j < rects.len() && rects[j].clip == clip {
                j += 1;
            }
            if let Some((sx, sy, sw, sh)) = clip_to_scissor(clip, target.viewport) {
                rpass.set_scissor_rect(sx, sy, sw, sh);
                rpass.draw_indexed(0..6, 0, (base + i) as u32..(base + j) as u32);
            }
            i = j;
        }
    }

    /// Releases the instance buffer; it is recreated on the next render.
    pub fn trim(&mut self) {
        self.instance_vbo = None;
        self.instances = InstanceArena::default();
    }

    fn ensure_pipeline(&mut self, device: &wgpu::Device, format: wgpu::TextureFormat) {
        if self.pipeline_format == Some(format) && self.pipeline.is_some() {
            return;
        }

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("tessera rect shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/rect.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("tessera rect bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<ViewportUniform>() as u64),
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("tessera rect pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("tessera rect pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[QuadVertex::layout(), RectInstance::layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        self.pipeline_format = Some(format);
        self.pipeline = Some(pipeline);
        self.bind_group_layout = Some(bind_group_layout);

        // Bindings reference the old layout.
        self.bind_group = None;
        self.viewport_ubo = None;
    }

    fn ensure_bindings(&mut self, device: &wgpu::Device) {
        if self.bind_group.is_some() && self.viewport_ubo.is_some() {
            return;
        }
        let Some(bgl) = self.bind_group_layout.as_ref() else { return };

        let viewport_ubo = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("tessera rect viewport ubo"),
            size: std::mem::size_of::<ViewportUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("tessera rect bind group"),
            layout: bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: viewport_ubo.as_entire_binding(),
            }],
        });

        self.viewport_ubo = Some(viewport_ubo);
        self.bind_group = Some(bind_group);
    }

    fn ensure_static_buffers(&mut self, device: &wgpu::Device) {
        if self.quad_vbo.is_some() && self.quad_ibo.is_some() {
            return;
        }

        self.quad_vbo = Some(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("tessera rect quad vbo"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        }));
        self.quad_ibo = Some(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("tessera rect quad ibo"),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        }));
    }

    /// Returns the first instance index of a range of `len` for this frame.
    fn reserve_instances(&mut self, device: &wgpu::Device, len: usize) -> usize {
        if self.instance_vbo.is_none() {
            self.instances = InstanceArena::default();
        }
        match self.instances.reserve(len) {
            Reservation::Within { base } => base,
            Reservation::Grow { capacity } => {
                self.instance_vbo = Some(device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("tessera rect instance vbo"),
                    size: (capacity * std::mem::size_of::<RectInstance>()) as u64,
                    usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                }));
                0
            }
        }
    }
}

/// Converts a pixel clip to scissor arguments clamped to the viewport.
///
/// `None` clip = the whole viewport. Returns `None` for zero-area results, in
/// which case the draw is skipped.
fn clip_to_scissor(clip: Option<Rect>, viewport: Viewport) -> Option<(u32, u32, u32, u32)> {
    let bounds = match clip {
        None => Rect::new(0.0, 0.0, viewport.width as f32, viewport.height as f32)
            .pixel_bounds(viewport.width, viewport.height)?,
        Some(r) => r.pixel_bounds(viewport.width, viewport.height)?,
    };
    Some((bounds.x0, bounds.y0, bounds.width(), bounds.height()))
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct ViewportUniform {
    viewport: [f32; 2],
    _pad: [f32; 2], // 16-byte alignment
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct QuadVertex {
    corner: [f32; 2], // 0..1
}

impl QuadVertex {
    const ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

const QUAD_VERTICES: [QuadVertex; 4] = [
    QuadVertex { corner: [0.0, 0.0] },
    QuadVertex { corner: [1.0, 0.0] },
    QuadVertex { corner: [1.0, 1.0] },
    QuadVertex { corner: [0.0, 1.0] },
];

const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(crate) struct RectInstance {
    origin: [f32; 2],
    size: [f32; 2],
    color: [f32; 4],
}

impl RectInstance {
    const ATTRS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        1 => Float32x2, // origin
        2 => Float32x2, // size
        3 => Float32x4  // color
    ];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<RectInstance>() as u64,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scissor_defaults_to_viewport() {
        assert_eq!(clip_to_scissor(None, Viewport::new(800, 600)), Some((0, 0, 800, 600)));
    }

    #[test]
    fn scissor_clamps_and_skips_empty() {
        let vp = Viewport::new(100, 100);
        assert_eq!(
            clip_to_scissor(Some(Rect::new(90.0, -10.0, 50.0, 20.0)), vp),
            Some((90, 0, 10, 10))
        );
        assert_eq!(clip_to_scissor(Some(Rect::new(0.0, 0.0, 0.0, 0.0)), vp), None);
    }

    #[test]
    fn batches_in_one_frame_get_disjoint_ranges() {
        let mut arena = InstanceArena::default();
        assert_eq!(arena.reserve(2), Reservation::Grow { capacity: MIN_INSTANCES });
        assert_eq!(arena.reserve(1), Reservation::Within { base: 2 });
        assert_eq!(arena.reserve(3), Reservation::Within { base: 3 });

        arena.rewind();
        assert_eq!(arena.reserve(1), Reservation::Within { base: 0 });
    }

    #[test]
    fn overflowing_batch_moves_to_a_larger_buffer() {
        let mut arena = InstanceArena::default();
        assert_eq!(arena.reserve(60), Reservation::Grow { capacity: 64 });
        assert_eq!(arena.reserve(10), Reservation::Grow { capacity: 128 });
        // The new buffer holds only the latest batch, at the front.
        assert_eq!(arena.reserve(5), Reservation::Within { base: 10 });
    }

    #[test]
    fn pending_rect_normalizes_geometry() {
        let p = PendingRect::new(Rect::new(10.0, 10.0, -4.0, 2.0), Color::WHITE, None);
        assert_eq!(p.instance.origin, [6.0, 10.0]);
        assert_eq!(p.instance.size, [4.0, 2.0]);
    }
}
