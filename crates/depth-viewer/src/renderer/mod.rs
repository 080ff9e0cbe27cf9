//! The occlusion-aware renderer. Owns the GPU context, the depth-ingest
//! texture, and the background/overlay/object pipelines; one `draw` call
//! composites a full frame.

pub mod context;
pub mod depth_texture;
pub mod pipelines;

use self::{
    context::GfxContext,
    depth_texture::DepthTextureIngestor,
    pipelines::background::{ColorBackgroundPass, DepthOverlayPass, UvUniformStd140},
    pipelines::object::{
        ObjectMesh, ObjectPass, ObjectUniform, OccludedObjectPipeline, PlainObjectPipeline,
    },
};
use crate::anchors::{AnchorManager, MAX_ANCHORS};
use anyhow::Result;
use artrack::{DepthImage, DepthUnavailable, Frame, TrackedAnchor, TrackingState};
use glam::{Mat3, Mat4, Vec3};
use std::sync::Arc;
use winit::window::Window;

/// Near/far planes for the virtual-object projection.
const NEAR_PLANE: f32 = 0.1;
const FAR_PLANE: f32 = 100.0;

/// Uniform scale applied to every placed object.
const OBJECT_SCALE: f32 = 1.0;

/// Placed-object tint.
const OBJECT_COLOR: [f32; 4] = [0.545, 0.765, 0.29, 1.0];

/// Occlusion compare tolerance and fade band, millimetres. The tolerance
/// absorbs depth-sensor noise at contact edges; the band keeps the cutoff
/// from shimmering.
const OCCLUSION_TOLERANCE_MM: f32 = 30.0;
const OCCLUSION_BAND_MM: f32 = 80.0;

/// Scene z-buffer shared by all passes in the frame.
struct DepthTarget {
    // Keep the texture alive for the lifetime of the view.
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    format: wgpu::TextureFormat,
}

impl DepthTarget {
    fn new(device: &wgpu::Device, size: winit::dpi::PhysicalSize<u32>) -> Self {
        let format = wgpu::TextureFormat::Depth32Float;
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Scene Depth Target"),
            size: wgpu::Extent3d {
                width: size.width.max(1),
                height: size.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        Self {
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
            _texture: texture,
            format,
        }
    }
}

/// Owns all rendering state for the viewer.
pub struct OcclusionRenderer {
    pub gfx: GfxContext,
    depth_target: DepthTarget,
    background: ColorBackgroundPass,
    depth_overlay: DepthOverlayPass,
    depth_ingestor: DepthTextureIngestor,
    mesh: ObjectMesh,
    /// Draw path for anchored objects, fixed at construction from the depth
    /// capability.
    objects: Box<dyn ObjectPass>,
    uv_cols: [[f32; 4]; 3],
    depth_supported: bool,
    pub show_depth_map: bool,
    pub egui_renderer: egui_wgpu::Renderer,
}

impl OcclusionRenderer {
    pub async fn new(window: Arc<Window>, depth_supported: bool, show_depth_map: bool) -> Result<Self> {
        let gfx = GfxContext::new(window).await?;
        let depth_target = DepthTarget::new(&gfx.device, gfx.size);

        let background =
            ColorBackgroundPass::new(&gfx.device, gfx.config.format, depth_target.format);
        let depth_overlay =
            DepthOverlayPass::new(&gfx.device, gfx.config.format, depth_target.format);
        let depth_ingestor = DepthTextureIngestor::new(&gfx.device);
        let mesh = ObjectMesh::new(&gfx.device);

        let objects: Box<dyn ObjectPass> = if depth_supported {
            Box::new(OccludedObjectPipeline::new(
                &gfx.device,
                gfx.config.format,
                depth_target.format,
            ))
        } else {
            Box::new(PlainObjectPipeline::new(
                &gfx.device,
                gfx.config.format,
                depth_target.format,
            ))
        };

        let egui_renderer = egui_wgpu::Renderer::new(&gfx.device, gfx.config.format, None, 1);

        Ok(Self {
            gfx,
            depth_target,
            background,
            depth_overlay,
            depth_ingestor,
            mesh,
            objects,
            uv_cols: UvUniformStd140::from_mat3(Mat3::IDENTITY).cols,
            depth_supported,
            show_depth_map,
            egui_renderer,
        })
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.gfx.resize(new_size);
            self.depth_target = DepthTarget::new(&self.gfx.device, new_size);
        }
    }

    /// Publishes a freshly recomputed uv transform to every consumer.
    pub fn set_uv_transform(&mut self, m: Mat3) {
        let uniform = UvUniformStd140::from_mat3(m);
        self.uv_cols = uniform.cols;
        self.background.set_uv(&self.gfx.queue, &uniform);
        self.depth_overlay.set_uv(&self.gfx.queue, &uniform);
    }

    /// Forwards this tick's depth acquisition to the ingest texture.
    pub fn ingest_depth(
        &mut self,
        depth: Result<DepthImage, DepthUnavailable>,
    ) -> Result<(), DepthUnavailable> {
        self.depth_ingestor
            .update(&self.gfx.device, &self.gfx.queue, depth)
    }

    /// Published dimensions of the depth texture.
    pub fn depth_texture_size(&self) -> (u32, u32) {
        self.depth_ingestor.size()
    }

    /// Composites one frame: color background, optional depth overlay, then
    /// every tracking anchor's object through the session's draw path.
    pub fn draw<A: TrackedAnchor>(
        &mut self,
        swap_view: &wgpu::TextureView,
        frame: &Frame,
        anchors: &AnchorManager<A>,
    ) {
        self.background
            .upload(&self.gfx.device, &self.gfx.queue, frame.color_image());
        self.depth_overlay.prepare(&self.gfx.device, &self.depth_ingestor);
        self.objects.prepare(&self.gfx.device, &self.depth_ingestor);

        // Stage one uniform slot per tracking anchor, oldest first. While
        // tracking is interrupted no objects are drawn; the anchors stay.
        let mut slots: u32 = 0;
        if frame.tracking_state() == TrackingState::Tracking {
            let view = frame.view_matrix();
            let proj = frame.projection_matrix(NEAR_PLANE, FAR_PLANE);
            let color_correction = frame.color_correction();
            let viewport = [self.gfx.size.width as f32, self.gfx.size.height as f32];

            anchors.for_each_tracking(|anchor| {
                if slots as usize >= MAX_ANCHORS {
                    return;
                }
                let model =
                    anchor.pose().to_matrix() * Mat4::from_scale(Vec3::splat(OBJECT_SCALE));
                let uniform = ObjectUniform {
                    mvp: (proj * view * model).to_cols_array_2d(),
                    model_view: (view * model).to_cols_array_2d(),
                    color: OBJECT_COLOR,
                    color_correction,
                    uv_transform: self.uv_cols,
                    depth_params: [
                        OCCLUSION_TOLERANCE_MM,
                        OCCLUSION_BAND_MM,
                        viewport[0],
                        viewport[1],
                    ],
                };
                self.objects.stage(&self.gfx.queue, slots, &uniform);
                slots += 1;
            });
        }

        let mut encoder = self
            .gfx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: swap_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.1,
                            g: 0.1,
                            b: 0.1,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_target.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            // Background first, always.
            self.background.draw(&mut pass);

            if self.depth_supported && self.show_depth_map {
                self.depth_overlay.draw(&mut pass);
            }

            for slot in 0..slots {
                self.objects.draw(&mut pass, &self.mesh, slot);
            }
        }

        self.gfx.queue.submit(std::iter::once(encoder.finish()));
    }
}
