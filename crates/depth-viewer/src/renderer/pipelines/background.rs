//! Fullscreen passes: camera color background and the optional depth-map
//! visualization overlay.

use crate::renderer::depth_texture::DepthTextureIngestor;
use artrack::ColorImage;
use wgpu::util::DeviceExt;

/// Full-screen triangle vertices.
const FS_TRI: [[f32; 2]; 3] = [[-1.0, -1.0], [3.0, -1.0], [-1.0, 3.0]];

/// Column-major 3x3 affine NDC -> uv transform in std140 layout: three
/// vec4-aligned columns.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct UvUniformStd140 {
    pub cols: [[f32; 4]; 3],
}

impl UvUniformStd140 {
    pub fn from_mat3(m: glam::Mat3) -> Self {
        let c = m.to_cols_array_2d();
        Self {
            cols: [
                [c[0][0], c[0][1], c[0][2], 0.0],
                [c[1][0], c[1][1], c[1][2], 0.0],
                [c[2][0], c[2][1], c[2][2], 0.0],
            ],
        }
    }
}

/// Shared layout for both fullscreen passes: uv uniform + one sampled
/// texture.
fn fullscreen_layout(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<UvUniformStd140>() as u64,
                    ),
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

fn fullscreen_pipeline(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::BindGroupLayout,
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
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: "vs_main",
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<[f32; 2]>() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &[wgpu::VertexAttribute {
                    shader_location: 0,
                    offset: 0,
                    format: wgpu::VertexFormat::Float32x2,
                }],
            }],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState::default(),
        // The scene z-buffer is shared with the object passes; fullscreen
        // passes neither test nor write it.
        depth_stencil: Some(wgpu::DepthStencilState {
            format: depth_fmt,
            depth_write_enabled: false,
            depth_compare: wgpu::CompareFunction::Always,
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

/// Draws the camera color feed behind everything else. Owns the color
/// texture and re-uploads it every frame.
pub struct ColorBackgroundPass {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    ubo: wgpu::Buffer,
    fs_vbo: wgpu::Buffer,
    texture: wgpu::Texture,
    bind: wgpu::BindGroup,
    size: (u32, u32),
}

impl ColorBackgroundPass {
    pub fn new(
        device: &wgpu::Device,
        color_fmt: wgpu::TextureFormat,
        depth_fmt: wgpu::TextureFormat,
    ) -> Self {
        let layout = fullscreen_layout(device, "Background Layout");
        let pipeline = fullscreen_pipeline(
            device,
            "Background Pipeline",
            &layout,
            include_str!("../../../shaders/background.wgsl"),
            color_fmt,
            depth_fmt,
            None,
        );

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Background Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let ubo = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Background UV UBO"),
            size: std::mem::size_of::<UvUniformStd140>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let fs_vbo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Fullscreen Triangle VB"),
            contents: bytemuck::cast_slice(&FS_TRI),
            usage: wgpu::BufferUsages::VERTEX,
        });

        // Placeholder texture until the first color frame arrives.
        let texture = create_color_texture(device, 1, 1);
        let bind = create_sampled_bind(
            device,
            &layout,
            &ubo,
            &texture.create_view(&wgpu::TextureViewDescriptor::default()),
            &sampler,
            "Background Bind",
        );

        Self {
            pipeline,
            layout,
            sampler,
            ubo,
            fs_vbo,
            texture,
            bind,
            size: (1, 1),
        }
    }

    /// Writes the uv transform used to align the feed with the display.
    pub fn set_uv(&self, queue: &wgpu::Queue, uv: &UvUniformStd140) {
        queue.write_buffer(&self.ubo, 0, bytemuck::bytes_of(uv));
    }

    /// Uploads this frame's color image, re-allocating on dimension change.
    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, image: &ColorImage) {
        if self.size != (image.width, image.height) {
            self.texture = create_color_texture(device, image.width, image.height);
            self.bind = create_sampled_bind(
                device,
                &self.layout,
                &self.ubo,
                &self.texture.create_view(&wgpu::TextureViewDescriptor::default()),
                &self.sampler,
                "Background Bind",
            );
            self.size = (image.width, image.height);
        }

        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &image.data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(image.width * 4),
                rows_per_image: Some(image.height),
            },
            wgpu::Extent3d {
                width: image.width,
                height: image.height,
                depth_or_array_layers: 1,
            },
        );
    }

    pub fn draw<'p>(&'p self, rpass: &mut wgpu::RenderPass<'p>) {
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &self.bind, &[]);
        rpass.set_vertex_buffer(0, self.fs_vbo.slice(..));
        rpass.draw(0..3, 0..1);
    }
}

/// Overlays a color-ramped view of the ingested depth texture.
pub struct DepthOverlayPass {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    ubo: wgpu::Buffer,
    fs_vbo: wgpu::Buffer,
    /// Bind group plus the ingestor generation it was built against.
    bind: Option<(wgpu::BindGroup, u64)>,
}

impl DepthOverlayPass {
    pub fn new(
        device: &wgpu::Device,
        color_fmt: wgpu::TextureFormat,
        depth_fmt: wgpu::TextureFormat,
    ) -> Self {
        let layout = fullscreen_layout(device, "Depth Overlay Layout");
        let pipeline = fullscreen_pipeline(
            device,
            "Depth Overlay Pipeline",
            &layout,
            include_str!("../../../shaders/depth_overlay.wgsl"),
            color_fmt,
            depth_fmt,
            Some(wgpu::BlendState::ALPHA_BLENDING),
        );

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Depth Overlay Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let ubo = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Depth Overlay UV UBO"),
            size: std::mem::size_of::<UvUniformStd140>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let fs_vbo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Fullscreen Triangle VB"),
            contents: bytemuck::cast_slice(&FS_TRI),
            usage: wgpu::BufferUsages::VERTEX,
        });

        Self {
            pipeline,
            layout,
            sampler,
            ubo,
            fs_vbo,
            bind: None,
        }
    }

    pub fn set_uv(&self, queue: &wgpu::Queue, uv: &UvUniformStd140) {
        queue.write_buffer(&self.ubo, 0, bytemuck::bytes_of(uv));
    }

    /// Rebuilds the bind group if the ingestor re-allocated its texture.
    pub fn prepare(&mut self, device: &wgpu::Device, depth: &DepthTextureIngestor) {
        let stale = match &self.bind {
            Some((_, generation)) => *generation != depth.generation(),
            None => true,
        };
        if stale {
            let bind = create_sampled_bind(
                device,
                &self.layout,
                &self.ubo,
                depth.view(),
                &self.sampler,
                "Depth Overlay Bind",
            );
            self.bind = Some((bind, depth.generation()));
        }
    }

    pub fn draw<'p>(&'p self, rpass: &mut wgpu::RenderPass<'p>) {
        let Some((bind, _)) = &self.bind else {
            return;
        };
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, bind, &[]);
        rpass.set_vertex_buffer(0, self.fs_vbo.slice(..));
        rpass.draw(0..3, 0..1);
    }
}

fn create_color_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Camera Color Texture"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    })
}

fn create_sampled_bind(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    ubo: &wgpu::Buffer,
    view: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
    label: &str,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: ubo.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}
