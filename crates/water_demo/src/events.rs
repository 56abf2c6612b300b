//! Window and device event handling for DemoState.

use winit::event::{DeviceEvent, ElementState, MouseButton, WindowEvent};
use winit::keyboard::PhysicalKey;

use crate::state::DemoState;

impl DemoState {
    /// Handle a window event. Returns true if the app should exit.
    pub(crate) fn handle_window_event(&mut self, event: WindowEvent) -> bool {
        match event {
            WindowEvent::CloseRequested => {
                self.running = false;
                true
            }
            WindowEvent::Resized(size) => {
                self.resize(size);
                false
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    self.input.process_keyboard(key, event.state);
                }
                false
            }
            WindowEvent::Focused(false) => {
                self.grab_cursor(false);
                false
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => {
                if !self.input.is_cursor_locked() {
                    self.grab_cursor(true);
                }
                false
            }
            WindowEvent::RedrawRequested => {
                self.update();
                if let Err(e) = self.render() {
                    log::error!("Render error: {:#}", e);
                }
                self.input.end_frame();
                self.ctx.window.request_redraw();
                !self.running
            }
            _ => false,
        }
    }

    /// Raw mouse motion drives the camera while the cursor is grabbed.
    pub(crate) fn handle_device_event(&mut self, event: DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta } = event {
            if self.input.is_cursor_locked() {
                self.input.process_mouse_motion(delta);
            }
        }
    }
}
