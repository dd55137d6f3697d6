//! Bridge configuration
//!
//! The host page may pass a JSON object to `start`; every field is optional
//! and falls back to the behaviour the guest was built against.

use crate::bridge::error::{BridgeError, BridgeResult};
use serde::{Deserialize, Serialize};

/// WebGL context creation attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextAttributes {
    pub depth: bool,
    pub antialias: bool,
    pub alpha: bool,
    pub preserve_drawing_buffer: bool,
}

impl Default for ContextAttributes {
    fn default() -> Self {
        Self {
            depth: false,
            antialias: false,
            alpha: true,
            preserve_drawing_buffer: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Log every call into a stubbed import
    pub trace_stubs: bool,
    /// Attributes for the context `web_create_canvas` creates
    pub context: ContextAttributes,
    /// DOM id given to the canvas
    pub canvas_id: String,
    /// Exported guest allocator used to hand over dropped files
    pub malloc_export: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            trace_stubs: false,
            context: ContextAttributes::default(),
            canvas_id: "mty-canvas".to_string(),
            malloc_export: crate::bridge::abi::exports::MALLOC.to_string(),
        }
    }
}

impl BridgeConfig {
    pub fn builder() -> BridgeConfigBuilder {
        BridgeConfigBuilder::new()
    }

    /// Parse a JSON object; missing fields take their defaults
    pub fn from_json(json: &str) -> BridgeResult<Self> {
        serde_json::from_str(json).map_err(|e| BridgeError::Config {
            reason: e.to_string(),
        })
    }

    /// Parse an optional JSON object, defaulting when absent or blank
    pub fn from_optional_json(json: Option<&str>) -> BridgeResult<Self> {
        match json.map(str::trim) {
            None | Some("") => Ok(Self::default()),
            Some(json) => Self::from_json(json),
        }
    }
}

/// Builder for a `BridgeConfig`
pub struct BridgeConfigBuilder {
    config: BridgeConfig,
}

impl BridgeConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: BridgeConfig::default(),
        }
    }

    /// Log calls into stubbed imports
    pub fn trace_stubs(mut self, enabled: bool) -> Self {
        self.config.trace_stubs = enabled;
        self
    }

    /// Request a depth buffer
    pub fn depth(mut self, enabled: bool) -> Self {
        self.config.context.depth = enabled;
        self
    }

    /// Request multisampling
    pub fn antialias(mut self, enabled: bool) -> Self {
        self.config.context.antialias = enabled;
        self
    }

    pub fn canvas_id(mut self, id: &str) -> Self {
        self.config.canvas_id = id.to_string();
        self
    }

    pub fn malloc_export(mut self, name: &str) -> Self {
        self.config.malloc_export = name.to_string();
        self
    }

    pub fn build(self) -> BridgeConfig {
        self.config
    }
}

impl Default for BridgeConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
