//! Browser Platform Implementation
//!
//! Provides platform support for running in web browsers via:
//! - a full-page canvas with a WebGL2 context
//! - the console for guest output and diagnostics
//! - `performance.now()` for the clock
//! - drag and drop for handing files to the guest

use super::webgl::WebGl2Backend;
use super::{DroppedFile, LineBuffer, Platform, PlatformError, PlatformResult};
use crate::bridge::memory::JsMemory;
use crate::config::ContextAttributes;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{HtmlCanvasElement, HtmlElement, WebGl2RenderingContext};

/// Browser platform state
pub struct WebPlatform {
    canvas: Option<HtmlCanvasElement>,
    /// Filled by drop listeners, drained once per frame
    drops: Rc<RefCell<VecDeque<DroppedFile>>>,
    drop_target: bool,
    stdout: LineBuffer,
    stderr: LineBuffer,
}

impl WebPlatform {
    pub fn new() -> Self {
        Self {
            canvas: None,
            drops: Rc::new(RefCell::new(VecDeque::new())),
            drop_target: false,
            stdout: LineBuffer::new(),
            stderr: LineBuffer::new(),
        }
    }
}

impl Default for WebPlatform {
    fn default() -> Self {
        Self::new()
    }
}

fn window() -> PlatformResult<web_sys::Window> {
    web_sys::window().ok_or_else(|| PlatformError::InitFailed("No window object".to_string()))
}

fn js_err(context: &str, e: JsValue) -> PlatformError {
    PlatformError::InitFailed(format!("{}: {:?}", context, e))
}

/// Make an element fill the viewport with no margin
fn fill_viewport(element: &HtmlElement) -> PlatformResult<()> {
    let style = element.style();
    for (property, value) in [("width", "100%"), ("height", "100%"), ("margin", "0")] {
        style
            .set_property(property, value)
            .map_err(|e| js_err("Failed to style page", e))?;
    }
    Ok(())
}

/// Context creation attributes as a JS object
fn context_options(attributes: &ContextAttributes) -> PlatformResult<js_sys::Object> {
    let options = js_sys::Object::new();
    for (key, value) in [
        ("depth", attributes.depth),
        ("antialias", attributes.antialias),
        ("alpha", attributes.alpha),
        ("preserveDrawingBuffer", attributes.preserve_drawing_buffer),
    ] {
        js_sys::Reflect::set(&options, &key.into(), &JsValue::from_bool(value))
            .map_err(|e| js_err("Failed to build context options", e))?;
    }
    Ok(options)
}

impl Platform for WebPlatform {
    type Gl = WebGl2Backend;
    type Memory = JsMemory;

    fn viewport_size(&self) -> (u32, u32) {
        let Ok(window) = window() else {
            return (0, 0);
        };
        let width = window.inner_width().ok().and_then(|v| v.as_f64()).unwrap_or(0.0) as u32;
        let height = window.inner_height().ok().and_then(|v| v.as_f64()).unwrap_or(0.0) as u32;
        (width, height)
    }

    fn create_canvas(
        &mut self,
        canvas_id: &str,
        attributes: &ContextAttributes,
    ) -> PlatformResult<WebGl2Backend> {
        let document = window()?
            .document()
            .ok_or_else(|| PlatformError::InitFailed("No document".to_string()))?;
        let body = document
            .body()
            .ok_or_else(|| PlatformError::InitFailed("No body".to_string()))?;

        if let Some(html) = document
            .document_element()
            .and_then(|e| e.dyn_into::<HtmlElement>().ok())
        {
            fill_viewport(&html)?;
        }
        fill_viewport(&body)?;

        let canvas: HtmlCanvasElement = document
            .create_element("canvas")
            .map_err(|e| js_err("Failed to create canvas", e))?
            .dyn_into()
            .map_err(|_| PlatformError::InitFailed("Failed to cast to HtmlCanvasElement".to_string()))?;
        canvas.set_id(canvas_id);
        body.append_child(&canvas)
            .map_err(|e| js_err("Failed to attach canvas", e))?;

        let context: WebGl2RenderingContext = canvas
            .get_context_with_context_options("webgl2", &context_options(attributes)?)
            .map_err(|e| js_err("getContext failed", e))?
            .ok_or_else(|| PlatformError::NotSupported("WebGL2".to_string()))?
            .dyn_into()
            .map_err(|_| PlatformError::InitFailed("Failed to cast to WebGl2RenderingContext".to_string()))?;

        self.canvas = Some(canvas);
        self.resize_canvas();
        Ok(WebGl2Backend::new(context))
    }

    fn resize_canvas(&mut self) {
        let (width, height) = self.viewport_size();
        if let Some(canvas) = &self.canvas {
            canvas.set_width(width);
            canvas.set_height(height);
        }
    }

    fn set_title(&mut self, title: &str) {
        if let Some(document) = web_sys::window().and_then(|w| w.document()) {
            document.set_title(title);
        }
    }

    fn register_drop_target(&mut self) -> PlatformResult<()> {
        if self.drop_target {
            return Ok(());
        }
        let canvas = self
            .canvas
            .as_ref()
            .ok_or_else(|| PlatformError::InitFailed("No canvas to drop onto".to_string()))?;

        // Drop: read the first file and queue it
        {
            let drops = self.drops.clone();
            let closure = Closure::wrap(Box::new(move |event: web_sys::DragEvent| {
                event.prevent_default();
                if let Some(file) = first_dropped_file(&event) {
                    wasm_bindgen_futures::spawn_local(read_dropped_file(file, drops.clone()));
                }
            }) as Box<dyn FnMut(_)>);

            canvas
                .add_event_listener_with_callback("drop", closure.as_ref().unchecked_ref())
                .map_err(|e| js_err("Failed to add drop listener", e))?;
            closure.forget(); // Leak intentionally - lives for page lifetime
        }

        // Dragover must be cancelled for drop to fire
        {
            let closure = Closure::wrap(Box::new(|event: web_sys::DragEvent| {
                event.prevent_default();
            }) as Box<dyn FnMut(_)>);

            canvas
                .add_event_listener_with_callback("dragover", closure.as_ref().unchecked_ref())
                .map_err(|e| js_err("Failed to add dragover listener", e))?;
            closure.forget();
        }

        self.drop_target = true;
        Ok(())
    }

    fn take_dropped_files(&mut self) -> Vec<DroppedFile> {
        self.drops.borrow_mut().drain(..).collect()
    }

    fn now_ns(&self) -> u64 {
        let ms = web_sys::window()
            .and_then(|w| w.performance())
            .map(|p| p.now())
            .unwrap_or(0.0);
        (ms * 1_000_000.0) as u64
    }

    fn write_stdout(&mut self, text: &str) {
        for line in self.stdout.push(text) {
            web_sys::console::log_1(&line.into());
        }
    }

    fn write_stderr(&mut self, text: &str) {
        for line in self.stderr.push(text) {
            web_sys::console::error_1(&line.into());
        }
    }

    fn warn(&mut self, text: &str) {
        web_sys::console::warn_1(&text.into());
    }
}

/// The first item of kind "file" in a drop
fn first_dropped_file(event: &web_sys::DragEvent) -> Option<web_sys::File> {
    let items = event.data_transfer()?.items();
    (0..items.length())
        .filter_map(|i| items.get(i))
        .find(|item| item.kind() == "file")
        .and_then(|item| item.get_as_file().ok().flatten())
}

async fn read_dropped_file(file: web_sys::File, drops: Rc<RefCell<VecDeque<DroppedFile>>>) {
    let buffer = match JsFuture::from(file.array_buffer()).await {
        Ok(buffer) => buffer,
        Err(e) => {
            crate::console_error!("[drop] Failed to read {}: {:?}", file.name(), e);
            return;
        }
    };

    let data = js_sys::Uint8Array::new(&buffer).to_vec();
    crate::console_log!("[drop] {} ({} bytes) queued", file.name(), data.len());
    drops.borrow_mut().push_back(DroppedFile {
        name: file.name(),
        data,
    });
}
