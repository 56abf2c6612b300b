//! Reflective and refractive water over a procedural pool, rendered in three passes per frame.

mod config;
mod events;
mod state;

use anyhow::Result;
use std::sync::Arc;
use winit::{
    application::ApplicationHandler,
    event::{DeviceEvent, DeviceId, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use config::DemoConfig;
use state::DemoState;

struct App {
    config: DemoConfig,
    state: Option<DemoState>,
}

impl App {
    fn new(config: DemoConfig) -> Self {
        Self { config, state: None }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        let window_attrs = Window::default_attributes()
            .with_title("dudv water")
            .with_inner_size(winit::dpi::LogicalSize::new(
                self.config.window_width,
                self.config.window_height,
            ))
            .with_resizable(false);

        let window = match event_loop.create_window(window_attrs) {
            Ok(w) => Arc::new(w),
            Err(e) => {
                log::error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        match pollster::block_on(DemoState::new(window.clone(), self.config.clone())) {
            Ok(s) => {
                self.state = Some(s);
                window.request_redraw();
            }
            Err(e) => {
                log::error!("Failed to initialize: {:#}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if let Some(state) = &mut self.state {
            if state.handle_window_event(event) || !state.running {
                event_loop.exit();
            }
        }
    }

    fn device_event(&mut self, _: &ActiveEventLoop, _: DeviceId, event: DeviceEvent) {
        if let Some(state) = &mut self.state {
            state.handle_device_event(event);
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = DemoConfig::load();
    if std::env::args().skip(1).any(|a| a == "--write-config") {
        let path = config.save()?;
        log::info!("Wrote {}", path.display());
        return Ok(());
    }

    println!("╔══════════════════════════════════════════════╗");
    println!("║                  dudv water                  ║");
    println!("╠══════════════════════════════════════════════╣");
    println!("║  WASD / Arrows - Move   │  Mouse - Look      ║");
    println!("║  P - Pause scroll       │  R - Reset scroll  ║");
    println!("║  T - Target previews    │  Y - Capture PNGs  ║");
    println!("║  I - Print camera       │  Escape - Quit     ║");
    println!("╚══════════════════════════════════════════════╝");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    Ok(())
}
