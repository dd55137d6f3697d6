//! Platform Abstraction Layer
//!
//! The bridge never talks to the host environment directly. Everything it
//! needs from the outside world (a canvas with a GL context, the viewport,
//! a clock, somewhere to print) goes through `Platform`:
//!
//! - Browser (wasm32-unknown-unknown): DOM canvas, WebGL2, console, rAF
//! - Headless (native): recording GL backend, captured output, manual clock
//!
//! The bridge and its dispatch logic are platform-agnostic.

use crate::bridge::graphics::GlBackend;
use crate::bridge::memory::LinearMemory;
use crate::config::ContextAttributes;

pub mod headless;

#[cfg(target_arch = "wasm32")]
pub mod web;

#[cfg(target_arch = "wasm32")]
pub mod webgl;

/// Result type for platform operations
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Platform-specific errors
#[derive(Debug, Clone)]
pub enum PlatformError {
    /// Feature not supported on this platform
    NotSupported(String),
    /// Initialization failed
    InitFailed(String),
}

impl std::fmt::Display for PlatformError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlatformError::NotSupported(s) => write!(f, "Not supported: {}", s),
            PlatformError::InitFailed(s) => write!(f, "Init failed: {}", s),
        }
    }
}

impl std::error::Error for PlatformError {}

/// A file dropped onto the page, waiting to be copied into the guest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedFile {
    pub name: String,
    pub data: Vec<u8>,
}

/// Splits a byte stream into console lines
///
/// The console adds its own line break per message, so only complete lines
/// are emitted; a trailing partial line waits for the next write. Empty
/// lines are kept.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `text` and return every line it completed
    pub fn push(&mut self, text: &str) -> Vec<String> {
        self.pending.push_str(text);
        let Some(last) = self.pending.rfind('\n') else {
            return Vec::new();
        };
        let rest = self.pending.split_off(last + 1);
        let done = std::mem::replace(&mut self.pending, rest);
        done[..last].split('\n').map(str::to_owned).collect()
    }
}

/// Platform abstraction trait
///
/// Each platform provides:
/// - A rendering surface and its GL context
/// - Window state (viewport size, title)
/// - Timing
/// - Output streams for the guest's stdout/stderr and bridge diagnostics
pub trait Platform {
    /// Rendering context created by `create_canvas`
    type Gl: GlBackend;

    /// Linear memory type of an instantiated guest
    type Memory: LinearMemory;

    // ===== Window =====

    /// Size of the visible viewport in CSS pixels
    fn viewport_size(&self) -> (u32, u32);

    /// Create the canvas, attach it to the page and create its context
    fn create_canvas(&mut self, canvas_id: &str, attributes: &ContextAttributes)
    -> PlatformResult<Self::Gl>;

    /// Match the canvas backing size to the viewport
    fn resize_canvas(&mut self);

    fn set_title(&mut self, title: &str);

    // ===== Drag and drop =====

    /// Start accepting files dropped onto the page
    fn register_drop_target(&mut self) -> PlatformResult<()>;

    /// Files dropped since the last call
    fn take_dropped_files(&mut self) -> Vec<DroppedFile>;

    // ===== Timing =====

    /// High-resolution time in nanoseconds since some epoch
    fn now_ns(&self) -> u64;

    // ===== Output =====

    fn write_stdout(&mut self, text: &str);

    fn write_stderr(&mut self, text: &str);

    /// Diagnostics produced by the bridge itself (shader logs, traces)
    fn warn(&mut self, text: &str);
}
