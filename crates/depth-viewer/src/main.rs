//! Entry point for the depth-aware anchor viewer.

use anyhow::Result;
use clap::Parser;
use depth_viewer::app::{App, ViewerOptions};
use std::sync::Arc;
use winit::{
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::WindowBuilder,
};

#[derive(Parser, Debug)]
#[command(about = "Depth-aware AR anchor viewer with a synthetic tracking provider")]
struct Args {
    /// Initial window width in logical pixels.
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Initial window height in logical pixels.
    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Simulate a device without depth support (plain object path).
    #[arg(long)]
    no_depth: bool,

    /// Start with the depth-map overlay hidden.
    #[arg(long)]
    hide_depth_map: bool,
}

fn main() -> Result<()> {
    // Initialize logging; default to "info" if RUST_LOG is unset.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("Depth Anchor Viewer")
            .with_inner_size(winit::dpi::LogicalSize::new(args.width, args.height))
            .build(&event_loop)?,
    );

    let mut app = pollster::block_on(App::new(
        window.clone(),
        ViewerOptions {
            depth_supported: !args.no_depth,
            show_depth_map: !args.hide_depth_map,
        },
    ))?;

    event_loop.run(move |event, elwt| {
        elwt.set_control_flow(ControlFlow::Poll);

        match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => {
                if !app.handle_event(&window, &event) {
                    match event {
                        WindowEvent::CloseRequested => elwt.exit(),
                        WindowEvent::KeyboardInput { event, .. } => {
                            if event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
                                elwt.exit();
                            }
                        }
                        WindowEvent::RedrawRequested => {
                            // A failing tick is logged and abandoned; the
                            // session continues with the next one.
                            match app.render_tick(&window) {
                                Ok(()) => {}
                                Err(wgpu::SurfaceError::Lost) => {
                                    app.resize(app.renderer.gfx.size);
                                }
                                Err(wgpu::SurfaceError::OutOfMemory) => {
                                    log::error!("GPU out of memory, exiting");
                                    elwt.exit();
                                }
                                Err(e) => log::error!("render tick failed: {e:?}"),
                            }
                        }
                        _ => {}
                    }
                }
            }
            Event::AboutToWait => {
                window.request_redraw();
            }
            _ => {}
        }
    })?;

    Ok(())
}
