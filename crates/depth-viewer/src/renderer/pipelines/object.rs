//! Anchored-object rendering: a procedural mesh plus the two draw paths.
//!
//! Which path runs is decided once per session from the depth capability and
//! fixed behind the [`ObjectPass`] trait; the per-anchor draw loop never
//! re-checks the flag.

use crate::anchors::MAX_ANCHORS;
use crate::renderer::depth_texture::DepthTextureIngestor;
use wgpu::util::DeviceExt;

/// Dynamic-offset stride per staged object; the minimum uniform alignment
/// guaranteed by the default device limits.
const UNIFORM_STRIDE: u64 = 256;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ObjectVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

/// Per-object uniform data, respecting std140 layout. Must match
/// `ObjectUniform` in `object.wgsl` / `object_occluded.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ObjectUniform {
    pub mvp: [[f32; 4]; 4],
    pub model_view: [[f32; 4]; 4],
    pub color: [f32; 4],
    /// Light-estimate rgb scale factors; average intensity in alpha.
    pub color_correction: [f32; 4],
    /// NDC -> depth-texture transform, three vec4-aligned columns.
    pub uv_transform: [[f32; 4]; 3],
    /// x: occlusion tolerance (mm), y: soft band (mm), zw: viewport (px).
    pub depth_params: [f32; 4],
}

/// The placed object: a box sitting base-down on its anchor pose, generated
/// in code since asset loading is out of scope.
pub struct ObjectMesh {
    vtx: wgpu::Buffer,
    idx: wgpu::Buffer,
    index_count: u32,
}

impl ObjectMesh {
    pub fn new(device: &wgpu::Device) -> Self {
        let (vertices, indices) = box_mesh(0.1, 0.2);
        let vtx = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Object VB"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let idx = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Object IB"),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vtx,
            idx,
            index_count: indices.len() as u32,
        }
    }
}

/// Axis-aligned box, x/z in [-half, half], y in [0, height], flat normals.
fn box_mesh(half: f32, height: f32) -> (Vec<ObjectVertex>, Vec<u16>) {
    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    let mut face = |corners: [[f32; 3]; 4], normal: [f32; 3]| {
        let base = vertices.len() as u16;
        for position in corners {
            vertices.push(ObjectVertex { position, normal });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    };

    let (h, t) = (half, height);
    face(
        [[-h, 0.0, h], [h, 0.0, h], [h, t, h], [-h, t, h]],
        [0.0, 0.0, 1.0],
    );
    face(
        [[h, 0.0, -h], [-h, 0.0, -h], [-h, t, -h], [h, t, -h]],
        [0.0, 0.0, -1.0],
    );
    face(
        [[h, 0.0, h], [h, 0.0, -h], [h, t, -h], [h, t, h]],
        [1.0, 0.0, 0.0],
    );
    face(
        [[-h, 0.0, -h], [-h, 0.0, h], [-h, t, h], [-h, t, -h]],
        [-1.0, 0.0, 0.0],
    );
    face(
        [[-h, t, h], [h, t, h], [h, t, -h], [-h, t, -h]],
        [0.0, 1.0, 0.0],
    );
    face(
        [[-h, 0.0, -h], [h, 0.0, -h], [h, 0.0, h], [-h, 0.0, h]],
        [0.0, -1.0, 0.0],
    );

    (vertices, indices)
}

/// Draw path for anchored objects, selected once per session.
pub trait ObjectPass {
    /// Refreshes bindings that depend on per-frame resources.
    fn prepare(&mut self, device: &wgpu::Device, depth: &DepthTextureIngestor);

    /// Writes one object's uniform data into the given slot.
    fn stage(&self, queue: &wgpu::Queue, slot: u32, uniform: &ObjectUniform);

    /// Records the draw for the object staged in `slot`.
    fn draw<'p>(&'p self, rpass: &mut wgpu::RenderPass<'p>, mesh: &'p ObjectMesh, slot: u32);
}

fn object_vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<ObjectVertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            wgpu::VertexAttribute {
                shader_location: 0,
                offset: 0,
                format: wgpu::VertexFormat::Float32x3,
            },
            wgpu::VertexAttribute {
                shader_location: 1,
                offset: 12,
                format: wgpu::VertexFormat::Float32x3,
            },
        ],
    }
}

fn object_uniform_layout(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: true,
                min_binding_size: wgpu::BufferSize::new(
                    std::mem::size_of::<ObjectUniform>() as u64
                ),
            },
            count: None,
        }],
    })
}

fn object_uniform_buffer(device: &wgpu::Device, label: &str) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: UNIFORM_STRIDE * MAX_ANCHORS as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn object_uniform_bind(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    ubo: &wgpu::Buffer,
    label: &str,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: ubo,
                offset: 0,
                size: wgpu::BufferSize::new(std::mem::size_of::<ObjectUniform>() as u64),
            }),
        }],
    })
}

fn object_pipeline(
    device: &wgpu::Device,
    label: &str,
    layouts: &[&wgpu::BindGroupLayout],
    shader_src: &str,
    color_fmt: wgpu::TextureFormat,
    depth_fmt: wgpu::TextureFormat,
    blend: Option<wgpu::BlendState>,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(shader_src.into()),
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: layouts,
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: "vs_main",
            buffers: &[object_vertex_layout()],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: Some(wgpu::DepthStencilState {
            format: depth_fmt,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: "fs_main",
            targets: &[Some(wgpu::ColorTargetState {
                format: color_fmt,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
    })
}

/// Opaque path used when the session has no depth support.
pub struct PlainObjectPipeline {
    pipeline: wgpu::RenderPipeline,
    ubo: wgpu::Buffer,
    bind: wgpu::BindGroup,
}

impl PlainObjectPipeline {
    pub fn new(
        device: &wgpu::Device,
        color_fmt: wgpu::TextureFormat,
        depth_fmt: wgpu::TextureFormat,
    ) -> Self {
        let layout = object_uniform_layout(device, "Plain Object UBO Layout");
        let pipeline = object_pipeline(
            device,
            "Plain Object Pipeline",
            &[&layout],
            include_str!("../../../shaders/object.wgsl"),
            color_fmt,
            depth_fmt,
            None,
        );
        let ubo = object_uniform_buffer(device, "Plain Object UBO");
        let bind = object_uniform_bind(device, &layout, &ubo, "Plain Object Bind");
        Self {
            pipeline,
            ubo,
            bind,
        }
    }
}

impl ObjectPass for PlainObjectPipeline {
    fn prepare(&mut self, _device: &wgpu::Device, _depth: &DepthTextureIngestor) {}

    fn stage(&self, queue: &wgpu::Queue, slot: u32, uniform: &ObjectUniform) {
        queue.write_buffer(
            &self.ubo,
            slot as u64 * UNIFORM_STRIDE,
            bytemuck::bytes_of(uniform),
        );
    }

    fn draw<'p>(&'p self, rpass: &mut wgpu::RenderPass<'p>, mesh: &'p ObjectMesh, slot: u32) {
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &self.bind, &[slot * UNIFORM_STRIDE as u32]);
        rpass.set_vertex_buffer(0, mesh.vtx.slice(..));
        rpass.set_index_buffer(mesh.idx.slice(..), wgpu::IndexFormat::Uint16);
        rpass.draw_indexed(0..mesh.index_count, 0, 0..1);
    }
}

/// Occlusion-tested path: fragments compare against the ingested depth
/// texture, sampled through the uv transform.
pub struct OccludedObjectPipeline {
    pipeline: wgpu::RenderPipeline,
    ubo: wgpu::Buffer,
    bind: wgpu::BindGroup,
    depth_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    /// Depth bind group plus the ingestor generation it was built against.
    depth_bind: Option<(wgpu::BindGroup, u64)>,
}

impl OccludedObjectPipeline {
    pub fn new(
        device: &wgpu::Device,
        color_fmt: wgpu::TextureFormat,
        depth_fmt: wgpu::TextureFormat,
    ) -> Self {
        let layout = object_uniform_layout(device, "Occluded Object UBO Layout");
        let depth_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Occluded Object Depth Layout"),
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

        let pipeline = object_pipeline(
            device,
            "Occluded Object Pipeline",
            &[&layout, &depth_layout],
            include_str!("../../../shaders/object_occluded.wgsl"),
            color_fmt,
            depth_fmt,
            Some(wgpu::BlendState::ALPHA_BLENDING),
        );

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Occlusion Depth Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let ubo = object_uniform_buffer(device, "Occluded Object UBO");
        let bind = object_uniform_bind(device, &layout, &ubo, "Occluded Object Bind");

        Self {
            pipeline,
            ubo,
            bind,
            depth_layout,
            sampler,
            depth_bind: None,
        }
    }
}

impl ObjectPass for OccludedObjectPipeline {
    fn prepare(&mut self, device: &wgpu::Device, depth: &DepthTextureIngestor) {
        let stale = match &self.depth_bind {
            Some((_, generation)) => *generation != depth.generation(),
            None => true,
        };
        if stale {
            let bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Occluded Object Depth Bind"),
                layout: &self.depth_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(depth.view()),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                ],
            });
            self.depth_bind = Some((bind, depth.generation()));
        }
    }

    fn stage(&self, queue: &wgpu::Queue, slot: u32, uniform: &ObjectUniform) {
        queue.write_buffer(
            &self.ubo,
            slot as u64 * UNIFORM_STRIDE,
            bytemuck::bytes_of(uniform),
        );
    }

    fn draw<'p>(&'p self, rpass: &mut wgpu::RenderPass<'p>, mesh: &'p ObjectMesh, slot: u32) {
        let Some((depth_bind, _)) = &self.depth_bind else {
            return;
        };
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &self.bind, &[slot * UNIFORM_STRIDE as u32]);
        rpass.set_bind_group(1, depth_bind, &[]);
        rpass.set_vertex_buffer(0, mesh.vtx.slice(..));
        rpass.set_index_buffer(mesh.idx.slice(..), wgpu::IndexFormat::Uint16);
        rpass.draw_indexed(0..mesh.index_count, 0, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_struct_fits_the_dynamic_stride() {
        let size = std::mem::size_of::<ObjectUniform>() as u64;
        assert!(size <= UNIFORM_STRIDE);
        // std140: two mat4, two vec4, a padded mat3, one vec4.
        assert_eq!(size, 224);
    }

    #[test]
    fn box_mesh_is_closed_and_grounded() {
        let (vertices, indices) = box_mesh(0.1, 0.2);
        assert_eq!(vertices.len(), 24);
        assert_eq!(indices.len(), 36);

        // Base sits on y = 0, top at the requested height.
        let min_y = vertices.iter().map(|v| v.position[1]).fold(f32::MAX, f32::min);
        let max_y = vertices.iter().map(|v| v.position[1]).fold(f32::MIN, f32::max);
        assert_eq!(min_y, 0.0);
        assert_eq!(max_y, 0.2);

        // Every index refers to a vertex.
        assert!(indices.iter().all(|&i| (i as usize) < vertices.len()));
    }
}
