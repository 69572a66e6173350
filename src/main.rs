// Demo shell: bring up the Vulkan substrate against a winit window and
// keep it alive across resize events.
//
// FRAME FLOW (once a command facade is attached):
// acquire back buffer -> wait frame fence -> submit -> present

use anyhow::Result;
use flint::{Config, Graphics, VulkanContext};
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use winit::{
    dpi::PhysicalSize,
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    window::{Fullscreen, WindowBuilder},
};

fn main() -> Result<()> {
    // Load configuration from config.toml
    let config = Config::load();

    init_logging();
    log::info!("Starting flint");
    log::info!(
        "Window: {}x{} ({})",
        config.window.width,
        config.window.height,
        if config.window.fullscreen { "fullscreen" } else { "windowed" }
    );

    let event_loop = EventLoop::new();

    let mut window_builder = WindowBuilder::new()
        .with_title(&config.window.title)
        .with_inner_size(PhysicalSize::new(config.window.width, config.window.height));
    if config.window.fullscreen {
        window_builder = window_builder.with_fullscreen(Some(Fullscreen::Borderless(None)));
    }
    let window = window_builder.build(&event_loop)?;

    let mut graphics = VulkanContext::new(&config);
    graphics.initialize(window.raw_display_handle(), window.raw_window_handle())?;

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Wait;

        match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => {
                    log::info!("Close requested, shutting down...");
                    *control_flow = ControlFlow::Exit;
                }
                WindowEvent::Resized(size) => {
                    log::debug!("Window resized to {}x{}", size.width, size.height);

                    // Skip while minimized; a zero-extent swapchain is invalid
                    if size.width > 0 && size.height > 0 {
                        if let Err(e) = graphics.resize(size.width, size.height) {
                            log::error!("Resize failed: {:#}", e);
                            *control_flow = ControlFlow::Exit;
                        }
                    }
                }
                _ => {}
            },
            _ => {}
        }
    });
}

fn init_logging() {
    use env_logger::Builder;
    use log::LevelFilter;

    let mut builder = Builder::from_default_env();
    builder.filter_level(LevelFilter::Info);
    builder.init();
}
