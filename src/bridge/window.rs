//! Window and audio imports
//!
//! The guest draws into a single canvas that fills the page. It never owns
//! the event loop: `web_raf` hands its frame callback to the `FrameDriver`
//! and unwinds the entry point. Audio is not supported; every call reports
//! "no device" and does nothing.

use super::Bridge;
use super::error::{BridgeError, BridgeResult};
use super::graphics::Graphics;
use crate::platform::Platform;

impl<P: Platform> Bridge<P> {
    /// Create the canvas and its context; a second call keeps the first
    pub(super) fn web_create_canvas(&mut self) -> BridgeResult<()> {
        if self.graphics.is_some() {
            return Ok(());
        }
        let gl = self
            .platform
            .create_canvas(&self.config.canvas_id, &self.config.context)?;
        self.graphics = Some(Graphics::new(gl));
        crate::console_log!("[window] canvas '{}' created", self.config.canvas_id);
        Ok(())
    }

    pub(super) fn web_get_size(&mut self, width: u32, height: u32) -> BridgeResult<()> {
        let (w, h) = self.platform.viewport_size();
        let mut mem = Self::view(&mut self.memory)?;
        mem.write_u32(width, w)?;
        mem.write_u32(height, h)
    }

    pub(super) fn web_resize_canvas(&mut self) {
        self.platform.resize_canvas();
    }

    pub(super) fn web_set_title(&mut self, title: u32) -> BridgeResult<()> {
        let title = Self::view(&mut self.memory)?.string(title)?;
        self.platform.set_title(&title);
        Ok(())
    }

    /// Start accepting dropped files; they reach the guest at the next tick
    pub(super) fn web_register_drag(&mut self) -> BridgeResult<()> {
        self.platform.register_drop_target()?;
        Ok(())
    }

    /// Register the frame callback and unwind the caller
    pub(super) fn web_raf(&mut self, func: u32, opaque: u32) -> BridgeError {
        self.frame.schedule(func, opaque);
        BridgeError::Unwind
    }

    pub(super) fn audio_stub(&mut self, name: &str, result: i32) -> i32 {
        if self.config.trace_stubs {
            self.platform
                .warn(&format!("[audio] {} (stub) -> {}", name, result));
        }
        result
    }

    /// Copy a dropped file into guest memory the guest allocated for it
    pub fn deliver_file(&mut self, ptr: u32, data: &[u8]) -> BridgeResult<()> {
        Self::view(&mut self.memory)?.write_bytes(ptr, data)
    }
}
