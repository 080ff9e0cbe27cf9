//! Per-frame orchestration: one `render_tick` per display refresh drives
//! tap resolution, depth ingestion, transform upkeep and the composited
//! draw, strictly sequentially on the render thread.

use crate::{
    anchors::AnchorManager,
    hit,
    renderer::OcclusionRenderer,
    status::SessionStatus,
    tap::{TapEvent, TapQueue},
    ui,
    uv::UvTransformCalculator,
};
use anyhow::Result;
use artrack::{Anchor, DisplayRotation, Frame, Session, SessionConfig};
use std::sync::Arc;
use winit::{
    event::{ElementState, MouseButton, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};

/// Runtime options from the command line.
#[derive(Debug, Clone, Copy)]
pub struct ViewerOptions {
    /// Simulated device depth capability.
    pub depth_supported: bool,
    /// Initial state of the depth-map overlay.
    pub show_depth_map: bool,
}

pub struct App {
    pub session: Session,
    pub renderer: OcclusionRenderer,
    pub taps: TapQueue,
    anchors: AnchorManager<Anchor>,
    uv: UvTransformCalculator,
    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    status_line: String,
    cursor: (f32, f32),
}

impl App {
    pub async fn new(window: Arc<Window>, opts: ViewerOptions) -> Result<Self> {
        let renderer =
            OcclusionRenderer::new(window.clone(), opts.depth_supported, opts.show_depth_map)
                .await?;
        let size = renderer.gfx.size;

        let mut session = Session::new(SessionConfig {
            depth_supported: opts.depth_supported,
            ..SessionConfig::default()
        });
        session.set_display_geometry(DisplayRotation::Deg0, size.width, size.height);

        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui_ctx.viewport_id(),
            &*window,
            None,
            None,
        );

        Ok(Self {
            session,
            renderer,
            taps: TapQueue::new(),
            anchors: AnchorManager::new(),
            uv: UvTransformCalculator::new(),
            egui_ctx,
            egui_state,
            status_line: String::new(),
            cursor: (0.0, 0.0),
        })
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.renderer.resize(new_size);
            let rotation = self.session.display_rotation();
            self.session
                .set_display_geometry(rotation, new_size.width, new_size.height);
        }
    }

    /// Steps the simulated display rotation one quarter turn, as a physical
    /// device rotation would.
    pub fn rotate_display(&mut self) {
        let next = self.session.display_rotation().next_clockwise();
        let size = self.renderer.gfx.size;
        self.session
            .set_display_geometry(next, size.width, size.height);
        log::info!("display rotation -> {} degrees", next.degrees());
    }

    /// Routes a window event. Returns true when the event was consumed.
    pub fn handle_event(&mut self, window: &Window, event: &WindowEvent) -> bool {
        let response = self.egui_state.on_window_event(window, event);
        if response.consumed {
            return true;
        }

        match event {
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = (position.x as f32, position.y as f32);
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => {
                // Producer side of the tap queue; lossy when full.
                if !self.taps.enqueue(TapEvent::new(self.cursor.0, self.cursor.1)) {
                    log::debug!("tap queue full, tap dropped");
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed
                    && event.physical_key == PhysicalKey::Code(KeyCode::KeyR)
                {
                    self.rotate_display();
                }
            }
            WindowEvent::Resized(physical_size) => {
                self.resize(*physical_size);
            }
            _ => {}
        }

        false
    }

    pub fn status_line(&self) -> &str {
        &self.status_line
    }

    /// Runs one display tick end to end.
    pub fn render_tick(&mut self, window: &Window) -> Result<(), wgpu::SurfaceError> {
        let mut frame = self.session.update();

        // At most one tap per tick; taps are rare next to display refreshes.
        self.handle_tap(&frame);

        // Depth refresh. Unavailability is routine near session start and
        // leaves the previous texture in place.
        if self.session.is_depth_supported() {
            if let Err(e) = self.renderer.ingest_depth(frame.acquire_depth()) {
                log::debug!("frame {}: {}", frame.seq(), e);
            }
        }

        // Transform upkeep: recomputed only when the display geometry
        // changed or on the very first frame.
        let geometry_changed = frame.has_display_geometry_changed();
        if let Some(m) = self
            .uv
            .recompute(geometry_changed, |points| frame.map_ndc_to_texture(points))
        {
            self.renderer.set_uv_transform(m);
        }

        self.status_line = SessionStatus::derive(
            frame.tracking_state(),
            frame.failure_reason(),
            self.session.has_tracking_plane(),
        )
        .message(self.session.is_depth_supported());

        let surface_tex = self.renderer.gfx.surface.get_current_texture()?;
        let swap_view = surface_tex
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.renderer.draw(&swap_view, &frame, &self.anchors);
        self.draw_hud(window, &swap_view);

        surface_tex.present();
        Ok(())
    }

    /// Drains at most one tap and resolves it into at most one new anchor.
    fn handle_tap(&mut self, frame: &Frame) {
        let Some(tap) = self.taps.poll() else {
            return;
        };

        let candidates = frame.hit_test(tap.x, tap.y);
        match hit::resolve(frame.tracking_state(), &candidates, &frame.camera_pose()) {
            Some(pose) => {
                let anchor = self.session.create_anchor(pose);
                self.anchors.place(anchor);
                log::info!(
                    "tap ({:.0}, {:.0}) placed an anchor ({} live)",
                    tap.x,
                    tap.y,
                    self.anchors.len()
                );
            }
            // No qualifying candidate is a normal outcome, not an error.
            None => log::debug!("tap ({:.0}, {:.0}) resolved to no placement", tap.x, tap.y),
        }
    }

    fn draw_hud(&mut self, window: &Window, swap_view: &wgpu::TextureView) {
        let egui_input = self.egui_state.take_egui_input(window);
        self.egui_ctx.begin_frame(egui_input);

        ui::draw_hud(
            &self.egui_ctx,
            &self.status_line,
            self.anchors.len(),
            self.session.is_depth_supported(),
            &mut self.renderer.show_depth_map,
        );

        let egui_output = self.egui_ctx.end_frame();
        let shapes = self
            .egui_ctx
            .tessellate(egui_output.shapes, self.egui_ctx.pixels_per_point());

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [
                self.renderer.gfx.config.width,
                self.renderer.gfx.config.height,
            ],
            pixels_per_point: self.egui_ctx.pixels_per_point(),
        };

        let mut encoder =
            self.renderer
                .gfx
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("HUD Encoder"),
                });

        for (id, delta) in &egui_output.textures_delta.set {
            self.renderer.egui_renderer.update_texture(
                &self.renderer.gfx.device,
                &self.renderer.gfx.queue,
                *id,
                delta,
            );
        }

        self.renderer.egui_renderer.update_buffers(
            &self.renderer.gfx.device,
            &self.renderer.gfx.queue,
            &mut encoder,
            &shapes,
            &screen_descriptor,
        );

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("HUD Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: swap_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            self.renderer
                .egui_renderer
                .render(&mut render_pass, &shapes, &screen_descriptor);
        }

        for id in &egui_output.textures_delta.free {
            self.renderer.egui_renderer.free_texture(id);
        }

        self.renderer
            .gfx
            .queue
            .submit(std::iter::once(encoder.finish()));
    }
}
