//! mty-bridge - host imports for libmatoya modules, in Rust
//!
//! A libmatoya application compiled to `wasm32-wasi` expects its host to
//! provide WebGL-backed GL calls, a window, a frame loop and a handful of
//! WASI syscalls. This crate is that host:
//!
//! - `bridge`: the import surface, platform-agnostic and testable natively
//! - `platform`: browser (canvas + WebGL2) and headless implementations
//! - `boot`/`runtime`: fetch, instantiate and drive the guest in a browser
//!
//! The host page calls the exported `start(module_url, config_json)`.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

pub mod bridge;
pub mod config;
pub mod platform;

#[cfg(target_arch = "wasm32")]
mod boot;

#[cfg(target_arch = "wasm32")]
mod runtime;

pub use bridge::{Bridge, BridgeError, BridgeResult, Import};
pub use config::BridgeConfig;

/// Initialize panic hook for better error messages in browser console
#[cfg(target_arch = "wasm32")]
fn init_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Fetch, instantiate and run a guest module. Resolves once the guest's
/// entry point has handed control to the frame loop or exited.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub async fn start(module_url: String, config_json: Option<String>) -> Result<(), JsValue> {
    init_panic_hook();
    let config = BridgeConfig::from_optional_json(config_json.as_deref())
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    boot::boot(&module_url, config)
        .await
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Log to browser console (WASM)
#[cfg(target_arch = "wasm32")]
#[macro_export]
macro_rules! console_log {
    ($($t:tt)*) => {
        web_sys::console::log_1(&format!($($t)*).into())
    };
}

/// Log to stderr (native)
#[cfg(not(target_arch = "wasm32"))]
#[macro_export]
macro_rules! console_log {
    ($($t:tt)*) => {
        eprintln!($($t)*)
    };
}

#[cfg(target_arch = "wasm32")]
#[macro_export]
macro_rules! console_warn {
    ($($t:tt)*) => {
        web_sys::console::warn_1(&format!($($t)*).into())
    };
}

#[cfg(not(target_arch = "wasm32"))]
#[macro_export]
macro_rules! console_warn {
    ($($t:tt)*) => {
        eprintln!($($t)*)
    };
}

#[cfg(target_arch = "wasm32")]
#[macro_export]
macro_rules! console_error {
    ($($t:tt)*) => {
        web_sys::console::error_1(&format!($($t)*).into())
    };
}

#[cfg(not(target_arch = "wasm32"))]
#[macro_export]
macro_rules! console_error {
    ($($t:tt)*) => {
        eprintln!($($t)*)
    };
}
